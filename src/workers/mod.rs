pub mod consumer;
pub mod converter;
pub mod notifier;
