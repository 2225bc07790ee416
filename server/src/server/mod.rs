mod server;
pub use server::Server;
pub(crate) use server::ServerShared;

mod server_config;
pub use server_config::ServerConfig;
