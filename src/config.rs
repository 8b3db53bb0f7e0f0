use std::time::Duration;

/// Tunables for a single client connection.
///
/// There is no config file and no env var parsing (spec §6) -- this is
/// constructed programmatically, with defaults matching the recommended
/// values in spec §4.4, §4.5 and §9 open question 4 (the source has no
/// receive-side size cap; this crate adds one).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overall timeout for the HTTP Upgrade handshake (spec §4.4).
    pub handshake_timeout: Duration,
    /// After sending a local Close, how long to wait for the peer's echo
    /// before closing the transport unilaterally (spec §4.5, §5).
    pub close_grace_period: Duration,
    /// Receive-side cap on a single frame's payload length. Frames
    /// exceeding this close with code 1009 (spec §9 open question 4).
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            handshake_timeout: Duration::from_secs(30),
            close_grace_period: Duration::from_secs(30),
            max_message_size: 16 << 20,
        }
    }
}
