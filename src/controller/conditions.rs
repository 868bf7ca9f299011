//! # Conditions
//!
//! Upserts the mutually exclusive `Available` / `Degraded` conditions.
//!
//! `lastTransitionTime` only moves when a condition's status flips, matching
//! `meta.SetStatusCondition` in the Kubernetes API machinery.

use crate::constants::{CONDITION_AVAILABLE, CONDITION_DEGRADED};
use crate::crd::Condition;

const STATUS_TRUE: &str = "True";

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

#[must_use]
pub fn is_condition_true(conditions: &[Condition], r#type: &str) -> bool {
    find_condition(conditions, r#type).is_some_and(|c| c.status == STATUS_TRUE)
}

/// Insert or update a condition by type
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            if existing.status != new.status {
                existing.status = new.status;
                existing.last_transition_time = new.last_transition_time.or_else(|| Some(now()));
            }
            existing.reason = new.reason;
            existing.message = new.message;
        }
        None => {
            if new.last_transition_time.is_none() {
                new.last_transition_time = Some(now());
            }
            conditions.push(new);
        }
    }
}

pub fn remove_condition(conditions: &mut Vec<Condition>, r#type: &str) {
    conditions.retain(|c| c.r#type != r#type);
}

fn set_exclusive(conditions: &mut Vec<Condition>, set: &str, clear: &str, reason: &str, message: &str) {
    set_condition(
        conditions,
        Condition {
            r#type: set.to_string(),
            status: STATUS_TRUE.to_string(),
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        },
    );
    remove_condition(conditions, clear);
}

/// Mark the object Available and drop any Degraded condition
pub fn set_available(conditions: &mut Vec<Condition>, reason: &str, message: &str) {
    set_exclusive(conditions, CONDITION_AVAILABLE, CONDITION_DEGRADED, reason, message);
}

/// Mark the object Degraded and drop any Available condition
pub fn set_degraded(conditions: &mut Vec<Condition>, reason: &str, message: &str) {
    set_exclusive(conditions, CONDITION_DEGRADED, CONDITION_AVAILABLE, reason, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(r#type: &str, status: &str, time: &str) -> Condition {
        Condition {
            r#type: r#type.to_string(),
            status: status.to_string(),
            last_transition_time: Some(time.to_string()),
            reason: Some("Old".to_string()),
            message: Some("old".to_string()),
        }
    }

    #[test]
    fn test_available_and_degraded_are_exclusive() {
        let mut conditions = Vec::new();
        set_degraded(&mut conditions, "ClientResolutionFailed", "boom");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, CONDITION_DEGRADED);

        set_available(&mut conditions, "TorrentActive", "ok");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, CONDITION_AVAILABLE);
        assert!(is_condition_true(&conditions, CONDITION_AVAILABLE));
        assert!(find_condition(&conditions, CONDITION_DEGRADED).is_none());

        set_degraded(&mut conditions, "FailedToAddTorrent", "nope");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason.as_deref(), Some("FailedToAddTorrent"));
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut conditions = vec![condition(CONDITION_AVAILABLE, "True", "2024-01-01T00:00:00Z")];
        set_available(&mut conditions, "Connected", "still fine");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("Connected"));
        assert_eq!(conditions[0].message.as_deref(), Some("still fine"));
    }

    #[test]
    fn test_transition_time_moves_when_status_flips() {
        let mut conditions = vec![condition(CONDITION_AVAILABLE, "False", "2024-01-01T00:00:00Z")];
        set_available(&mut conditions, "Connected", "back");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(is_condition_true(&conditions, CONDITION_AVAILABLE));
    }

    #[test]
    fn test_is_condition_true_requires_true_status() {
        let conditions = vec![condition(CONDITION_AVAILABLE, "False", "2024-01-01T00:00:00Z")];
        assert!(!is_condition_true(&conditions, CONDITION_AVAILABLE));
        assert!(!is_condition_true(&[], CONDITION_AVAILABLE));
    }
}
