/// Gateway-level configuration for outbound backend calls.
///
/// Controls call timeouts, concurrency limits and transport limits.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Default timeout for a single backend call in milliseconds.
    pub default_call_timeout_ms: u64,
    /// Maximum number of concurrent backend calls before load shedding.
    pub max_concurrent_calls: u32,
    /// Timeout applied to each `health` probe in milliseconds.
    pub health_probe_timeout_ms: u64,
    /// Maximum time to wait for a TCP connection to a backend.
    pub connect_timeout_ms: u64,
    /// Largest frame body accepted from a backend, in bytes.
    pub max_frame_len: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_call_timeout_ms: 5_000,
            max_concurrent_calls: 1000,
            health_probe_timeout_ms: 2_000,
            connect_timeout_ms: 3_000,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_call_timeout_ms, 5_000);
        assert_eq!(config.max_concurrent_calls, 1000);
        assert_eq!(config.health_probe_timeout_ms, 2_000);
        assert_eq!(config.connect_timeout_ms, 3_000);
        assert_eq!(config.max_frame_len, 16_777_216);
    }
}
