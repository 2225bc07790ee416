pub mod connect_event;
pub mod error_event;
