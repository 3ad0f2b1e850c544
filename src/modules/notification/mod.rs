pub mod service;

pub use service::{Notification, NotificationError, Notifier};
