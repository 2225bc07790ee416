use std::{
    default::Default,
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the listening socket binds to; the port is given to
    /// [`listen`](crate::Server::listen)
    pub bind_address: IpAddr,
    /// Longest the accept thread waits for readiness before checking whether
    /// the Engine still runs. Stopping the Server wakes it right away.
    pub accept_poll_interval: Duration,
    /// Number of readiness events the accept thread takes per wakeup
    pub accept_events_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            accept_poll_interval: Duration::from_millis(50),
            accept_events_capacity: 128,
        }
    }
}
