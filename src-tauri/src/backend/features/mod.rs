pub mod deep_link;
pub mod notification;
pub mod windows;
