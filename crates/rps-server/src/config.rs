//! Runtime settings for the server.

use std::time::Duration;

/// Tunables for one server instance. `Default` gives the values the
/// binary uses when no flag or `RPS_*` variable overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// Messages buffered per connection before it is dropped as a slow
    /// consumer.
    pub outbound_capacity: usize,
    /// How often the sweep task runs.
    pub sweep_interval: Duration,
    /// Games idle for longer than this are removed by the sweep.
    pub game_max_age: Duration,
    /// Players waiting in the match queue longer than this are removed.
    pub queue_max_wait: Duration,
    /// Sockets that have not finished the WebSocket upgrade within this
    /// window are dropped.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            outbound_capacity: 256,
            sweep_interval: Duration::from_secs(60),
            game_max_age: Duration::from_secs(60 * 60),
            queue_max_wait: Duration::from_secs(5 * 60),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}
