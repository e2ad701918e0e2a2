use crate::types::{ScanMode, Transport};

/// Platform request parameters used by the bridges.
///
/// The defaults are what the bridge has always requested: low latency scans, and
/// LE connections that are not re-established automatically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BridgeConfig {
    /// Duty cycle of LE scans.
    pub scan_mode: ScanMode,
    /// Whether the platform should reconnect on its own after a disconnection.
    pub auto_connect: bool,
    /// Transport requested for GATT connections.
    pub transport: Transport,
}

impl BridgeConfig {
    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_request_low_latency_le_without_auto_connect() {
        let config = BridgeConfig::default();
        assert_eq!(config.scan_mode, ScanMode::LowLatency);
        assert!(!config.auto_connect);
        assert_eq!(config.transport, Transport::Le);
    }

    #[test]
    fn builder_overrides() {
        let config = BridgeConfig::default()
            .with_scan_mode(ScanMode::Balanced)
            .with_transport(Transport::Auto)
            .with_auto_connect(true);
        assert_eq!(config.scan_mode, ScanMode::Balanced);
        assert_eq!(config.transport, Transport::Auto);
        assert!(config.auto_connect);
    }
}
