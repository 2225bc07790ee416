pub mod connection;
pub mod connection_config;
pub mod decoder;
pub mod encoder;
pub mod error;
