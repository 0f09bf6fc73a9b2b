use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical name of a backend microservice the gateway can route to.
///
/// The set is closed: adding a backend means adding a variant here, which
/// forces every dispatch table that matches on it to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceName {
    /// Notification delivery service.
    #[serde(rename = "notification")]
    Notification,
    /// Inventory synchronization service.
    #[serde(rename = "inventory")]
    Inventory,
    /// AI/ML prediction service.
    #[serde(rename = "aiMl")]
    AiMl,
}

impl ServiceName {
    /// Every known backend, in registry order.
    pub const ALL: [ServiceName; 3] = [
        ServiceName::Notification,
        ServiceName::Inventory,
        ServiceName::AiMl,
    ];

    /// Wire name used in configuration, logs and HTTP responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceName::Notification => "notification",
            ServiceName::Inventory => "inventory",
            ServiceName::AiMl => "aiMl",
        }
    }

    /// Prefix of the `<PREFIX>_HOST` / `<PREFIX>_PORT` environment variables.
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            ServiceName::Notification => "NOTIFICATION_SERVICE",
            ServiceName::Inventory => "INVENTORY_SERVICE",
            ServiceName::AiMl => "AI_ML_SERVICE",
        }
    }

    /// Port used when the environment does not provide one.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            ServiceName::Notification => 3001,
            ServiceName::Inventory => 3002,
            ServiceName::AiMl => 3003,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
