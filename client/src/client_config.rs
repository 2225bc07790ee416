use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    /// Upper bound for establishing the TCP connection in
    /// [`connect`](crate::Client::connect). `None` waits as long as the OS
    /// does.
    pub connect_timeout: Option<Duration>,
}
