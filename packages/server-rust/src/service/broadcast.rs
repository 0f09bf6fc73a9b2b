//! Broadcast results: one outcome per registered target.

use std::fmt;

use gatehouse_core::ServiceName;
use serde_json::Value;

use super::call::RouteError;

/// Result of delivering a broadcast to one target.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: ServiceName,
    pub result: Result<Value, RouteError>,
}

impl TargetOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a broadcast, in registry order regardless of the order in
/// which targets completed.
#[derive(Debug)]
pub struct BroadcastReport {
    outcomes: Vec<TargetOutcome>,
}

impl BroadcastReport {
    #[must_use]
    pub fn new(outcomes: Vec<TargetOutcome>) -> Self {
        Self { outcomes }
    }

    #[must_use]
    pub fn outcomes(&self) -> &[TargetOutcome] {
        &self.outcomes
    }

    /// `true` when every target acknowledged the event.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_delivered)
    }

    /// Targets that acknowledged the event.
    #[must_use]
    pub fn delivered(&self) -> Vec<ServiceName> {
        self.outcomes
            .iter()
            .filter(|o| o.is_delivered())
            .map(|o| o.target)
            .collect()
    }

    /// Targets whose delivery failed, with their errors.
    #[must_use]
    pub fn failed(&self) -> Vec<(ServiceName, &RouteError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.target, e)))
            .collect()
    }

    /// All-or-nothing view: the acknowledgements in registry order, or an
    /// error naming every failed target.
    ///
    /// # Errors
    ///
    /// Returns `BroadcastError` if any target failed.
    pub fn into_values(self) -> Result<Vec<Value>, BroadcastError> {
        if self.is_complete() {
            return Ok(self
                .outcomes
                .into_iter()
                .filter_map(|o| o.result.ok())
                .collect());
        }

        let mut failed = Vec::new();
        let mut delivered = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(_) => delivered.push(outcome.target),
                Err(e) => failed.push((outcome.target, e)),
            }
        }
        Err(BroadcastError { failed, delivered })
    }
}

/// A broadcast that did not reach every target.
#[derive(Debug)]
pub struct BroadcastError {
    pub failed: Vec<(ServiceName, RouteError)>,
    pub delivered: Vec<ServiceName>,
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broadcast failed for ")?;
        for (i, (target, err)) in self.failed.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{target} ({err})")?;
        }
        write!(f, "; delivered to {} target(s)", self.delivered.len())
    }
}

impl std::error::Error for BroadcastError {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn closed(target: ServiceName) -> RouteError {
        RouteError::ConnectionClosed { target }
    }

    fn mixed_report() -> BroadcastReport {
        BroadcastReport::new(vec![
            TargetOutcome {
                target: ServiceName::Notification,
                result: Ok(json!({"success": true})),
            },
            TargetOutcome {
                target: ServiceName::Inventory,
                result: Err(closed(ServiceName::Inventory)),
            },
            TargetOutcome {
                target: ServiceName::AiMl,
                result: Ok(json!(null)),
            },
        ])
    }

    #[test]
    fn complete_report_yields_values_in_order() {
        let report = BroadcastReport::new(vec![
            TargetOutcome {
                target: ServiceName::Notification,
                result: Ok(json!(1)),
            },
            TargetOutcome {
                target: ServiceName::Inventory,
                result: Ok(json!(2)),
            },
        ]);
        assert!(report.is_complete());
        assert_eq!(report.into_values().unwrap(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn partial_report_lists_failed_and_delivered() {
        let report = mixed_report();
        assert!(!report.is_complete());
        assert_eq!(
            report.delivered(),
            vec![ServiceName::Notification, ServiceName::AiMl]
        );
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, ServiceName::Inventory);

        let err = report.into_values().unwrap_err();
        assert_eq!(err.delivered.len(), 2);
        assert_eq!(
            err.to_string(),
            "broadcast failed for inventory (connection to inventory closed before a reply arrived); delivered to 2 target(s)"
        );
    }
}
