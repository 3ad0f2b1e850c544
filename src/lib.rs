//! Asynchronous video-to-audio conversion.
//!
//! The `converter` binary consumes conversion jobs from the video queue,
//! extracts the audio track with ffmpeg, stores it and announces it on the
//! mp3 queue. The `notifier` binary consumes those announcements.

pub mod app;
pub mod common;
pub mod config;
pub mod infrastructure;
pub mod modules;
pub mod routes;
pub mod state;
pub mod workers;
