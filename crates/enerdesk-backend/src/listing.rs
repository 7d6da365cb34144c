//! Classification helpers for the read-only listings.

use serde::Serialize;
use strum::Display;

use crate::types::RenewalAlert;

/// Coarse state of a switching request, derived from its free-text status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwitchingStatus {
    Requested,
    Activated,
    Rejected,
}

impl SwitchingStatus {
    /// `02`/"activad…" means activated, `03`/"rechaz…" means rejected, anything
    /// else is still requested.
    #[must_use]
    pub fn classify(status: &str) -> Self {
        let lower = status.to_lowercase();
        if status.contains("02") || lower.contains("activad") {
            SwitchingStatus::Activated
        } else if status.contains("03") || lower.contains("rechaz") {
            SwitchingStatus::Rejected
        } else {
            SwitchingStatus::Requested
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Urgency {
    Critical,
    Warning,
}

impl Urgency {
    #[must_use]
    pub fn for_days(days_remaining: i64, critical_days: i64) -> Self {
        if days_remaining <= critical_days {
            Urgency::Critical
        } else {
            Urgency::Warning
        }
    }
}

/// Alerts expiring within `window_days`, most urgent first.
#[must_use]
pub fn within_renewal_window(mut alerts: Vec<RenewalAlert>, window_days: i64) -> Vec<RenewalAlert> {
    alerts.retain(|alert| alert.days_remaining <= window_days);
    alerts.sort_by_key(|alert| alert.days_remaining);
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    fn alert(id: i64, days: i64) -> RenewalAlert {
        RenewalAlert {
            id: EntityId::Numeric(id),
            client: format!("client {id}"),
            phone: None,
            cups: "ES0000000000000000XX".to_string(),
            retailer: "Naturgy".to_string(),
            end_date: None,
            days_remaining: days,
        }
    }

    #[test]
    fn test_switching_status_classification() {
        assert_eq!(SwitchingStatus::classify("01-Solicitado"), SwitchingStatus::Requested);
        assert_eq!(SwitchingStatus::classify("02-Aceptado"), SwitchingStatus::Activated);
        assert_eq!(SwitchingStatus::classify("Activado"), SwitchingStatus::Activated);
        assert_eq!(SwitchingStatus::classify("03-Rechazo"), SwitchingStatus::Rejected);
        assert_eq!(SwitchingStatus::classify("RECHAZADA"), SwitchingStatus::Rejected);
        assert_eq!(SwitchingStatus::classify("pendiente"), SwitchingStatus::Requested);
    }

    #[test]
    fn test_urgency_boundary() {
        assert_eq!(Urgency::for_days(15, 15), Urgency::Critical);
        assert_eq!(Urgency::for_days(16, 15), Urgency::Warning);
        assert_eq!(Urgency::for_days(-2, 15), Urgency::Critical);
    }

    #[test]
    fn test_window_filters_and_sorts() {
        let alerts = vec![alert(1, 40), alert(2, 60), alert(3, 5)];
        let kept = within_renewal_window(alerts, 45);
        let days: Vec<i64> = kept.iter().map(|a| a.days_remaining).collect();
        assert_eq!(days, vec![5, 40]);
    }
}
