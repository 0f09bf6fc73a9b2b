//! Backend target registry: the static name -> host/port table.
//!
//! Built once at startup and never mutated. Iteration order is the order
//! targets were supplied in, which is also the broadcast dispatch order.

use std::fmt;

use gatehouse_core::ServiceName;
use tracing::warn;

/// Host used when a target's `<PREFIX>_HOST` variable is unset.
pub const DEFAULT_HOST: &str = "localhost";

/// Connection parameters of a single backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: ServiceName,
    pub host: String,
    pub port: u16,
}

impl Target {
    #[must_use]
    pub fn new(name: ServiceName, host: impl Into<String>, port: u16) -> Self {
        Self {
            name,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

/// Errors detected while wiring targets and clients together at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("target {0} is registered more than once")]
    DuplicateTarget(ServiceName),
    #[error("no client provisioned for registered target {0}")]
    MissingClient(ServiceName),
    #[error("client provided for unregistered target {0}")]
    UnregisteredClient(ServiceName),
}

/// Immutable, ordered set of backend targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Builds a registry from an explicit list, preserving its order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateTarget` if a name appears twice.
    pub fn new(targets: Vec<Target>) -> Result<Self, ConfigError> {
        for (i, target) in targets.iter().enumerate() {
            if targets[..i].iter().any(|t| t.name == target.name) {
                return Err(ConfigError::DuplicateTarget(target.name));
            }
        }
        Ok(Self { targets })
    }

    /// Reads every known backend from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every known backend through `lookup`, falling back to
    /// `localhost` and the backend's default port.
    ///
    /// Never fails: an unparsable port is logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets = ServiceName::ALL
            .iter()
            .map(|&name| {
                let prefix = name.env_prefix();
                let host = lookup(&format!("{prefix}_HOST"))
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_HOST.to_string());
                let port = match lookup(&format!("{prefix}_PORT")) {
                    None => name.default_port(),
                    Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                        warn!(
                            target_name = name.as_str(),
                            value = %raw,
                            "invalid {prefix}_PORT, using default {}",
                            name.default_port()
                        );
                        name.default_port()
                    }),
                };
                Target { name, host, port }
            })
            .collect();
        Self { targets }
    }

    /// Looks up a target by name.
    #[must_use]
    pub fn get(&self, name: ServiceName) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: ServiceName) -> bool {
        self.get(name).is_some()
    }

    /// Targets in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// Target names in registry order.
    pub fn names(&self) -> impl Iterator<Item = ServiceName> + '_ {
        self.targets.iter().map(|t| t.name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let registry = TargetRegistry::default();
        let targets: Vec<_> = registry.iter().cloned().collect();
        assert_eq!(
            targets,
            vec![
                Target::new(ServiceName::Notification, "localhost", 3001),
                Target::new(ServiceName::Inventory, "localhost", 3002),
                Target::new(ServiceName::AiMl, "localhost", 3003),
            ]
        );
    }

    #[test]
    fn reads_hosts_and_ports_from_lookup() {
        let registry = TargetRegistry::from_lookup(lookup_from(&[
            ("NOTIFICATION_SERVICE_HOST", "notify.internal"),
            ("NOTIFICATION_SERVICE_PORT", "4001"),
            ("AI_ML_SERVICE_HOST", "ml.internal"),
        ]));

        let notification = registry.get(ServiceName::Notification).unwrap();
        assert_eq!(notification.address(), "notify.internal:4001");

        let inventory = registry.get(ServiceName::Inventory).unwrap();
        assert_eq!(inventory.address(), "localhost:3002");

        let ai = registry.get(ServiceName::AiMl).unwrap();
        assert_eq!(ai.address(), "ml.internal:3003");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let registry = TargetRegistry::from_lookup(lookup_from(&[
            ("INVENTORY_SERVICE_PORT", "not-a-port"),
            ("AI_ML_SERVICE_PORT", "70000"),
        ]));
        assert_eq!(registry.get(ServiceName::Inventory).unwrap().port, 3002);
        assert_eq!(registry.get(ServiceName::AiMl).unwrap().port, 3003);
    }

    #[test]
    fn blank_host_falls_back_to_localhost() {
        let registry =
            TargetRegistry::from_lookup(lookup_from(&[("NOTIFICATION_SERVICE_HOST", "  ")]));
        assert_eq!(registry.get(ServiceName::Notification).unwrap().host, "localhost");
    }

    #[test]
    fn explicit_list_preserves_order() {
        let registry = TargetRegistry::new(vec![
            Target::new(ServiceName::AiMl, "a", 1),
            Target::new(ServiceName::Notification, "b", 2),
        ])
        .unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec![ServiceName::AiMl, ServiceName::Notification]);
        assert!(!registry.contains(ServiceName::Inventory));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let err = TargetRegistry::new(vec![
            Target::new(ServiceName::Inventory, "a", 1),
            Target::new(ServiceName::Inventory, "b", 2),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateTarget(ServiceName::Inventory));
    }

    #[test]
    fn target_display_includes_address() {
        let target = Target::new(ServiceName::AiMl, "ml", 9000);
        assert_eq!(target.to_string(), "aiMl@ml:9000");
    }
}
