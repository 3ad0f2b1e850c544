pub mod conversion;
pub mod notification;
