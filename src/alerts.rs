use crate::models::entity::TrackedEntity;
use serde::Serialize;

/// Urgency ranking. Variant order is the rank: `Info < Warn < Danger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Danger,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info   => "INFO",
            Severity::Warn   => "WARN",
            Severity::Danger => "DANGER",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "INFO"   => Some(Severity::Info),
            "WARN"   => Some(Severity::Warn),
            "DANGER" => Some(Severity::Danger),
            _        => None,
        }
    }
}

/// An entity that needs attention under the current threshold.
/// Derived state: rebuilt from scratch on every evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub entity:         TrackedEntity,
    pub severity:       Severity,
    pub message:        String,
    pub days_remaining: i64,
}

impl Alert {
    /// Stable string key identifying this alert condition (for the alert log).
    pub fn key(&self) -> String {
        format!("{}[{}]{}", self.severity.label(), self.entity.id, self.message)
    }
}

/// Whether an entity belongs in the alert list at all.
pub fn requires_attention(entity: &TrackedEntity, threshold_days: u32) -> bool {
    entity.requires_tracking
        && (entity.is_overdue || entity.days_remaining <= i64::from(threshold_days))
}

pub fn classify(entity: &TrackedEntity, threshold_days: u32) -> Severity {
    if entity.is_overdue || entity.days_remaining <= 1 {
        Severity::Danger
    } else if entity.days_remaining <= i64::from(threshold_days) {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Human-readable message for one entity. A negative day count is worded as
/// overdue even when the overdue flag disagrees.
pub fn format_message(entity: &TrackedEntity) -> String {
    let name = entity.display_name();
    let days = entity.days_remaining;
    if entity.is_overdue || days < 0 {
        format!("{}: overdue by {} day(s)", name, days.unsigned_abs())
    } else if days == 0 {
        format!("{}: expires today!", name)
    } else if days == 1 {
        format!("{}: 1 day remaining", name)
    } else {
        format!("{}: {} days remaining", name, days)
    }
}

/// Filter and classify `entities` against `threshold_days`.
/// Pure and order-preserving: ordering is the data source's business.
pub fn evaluate(entities: &[TrackedEntity], threshold_days: u32) -> Vec<Alert> {
    entities.iter()
        .filter(|e| requires_attention(e, threshold_days))
        .map(|e| Alert {
            entity:         e.clone(),
            severity:       classify(e, threshold_days),
            message:        format_message(e),
            days_remaining: e.days_remaining,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::Owner;

    fn entity(id: &str, tracked: bool, overdue: bool, days: i64) -> TrackedEntity {
        TrackedEntity {
            id:                id.into(),
            requires_tracking: tracked,
            is_overdue:        overdue,
            days_remaining:    days,
            owner: Some(Owner { display_name: Some(format!("Op {}", id)), ..Owner::default() }),
        }
    }

    #[test]
    fn untracked_entities_are_always_excluded() {
        let alerts = evaluate(&[entity("a", false, true, -10), entity("b", false, false, 0)], 3);
        assert!(alerts.is_empty());
    }

    #[test]
    fn filter_keeps_overdue_and_within_threshold() {
        let list = [
            entity("overdue", true, true, -2),
            entity("edge",    true, false, 3),
            entity("far",     true, false, 4),
        ];
        let ids: Vec<_> = evaluate(&list, 3).into_iter().map(|a| a.entity.id).collect();
        assert_eq!(ids, vec!["overdue", "edge"]);
    }

    #[test]
    fn overdue_flag_alone_keeps_entity() {
        // Contract violation: flagged overdue but many days left.
        let alerts = evaluate(&[entity("x", true, true, 30)], 3);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Danger);
    }

    #[test]
    fn severity_classification() {
        assert_eq!(classify(&entity("a", true, true, -1), 3),  Severity::Danger);
        assert_eq!(classify(&entity("a", true, false, 0), 3),  Severity::Danger);
        assert_eq!(classify(&entity("a", true, false, 1), 3),  Severity::Danger);
        assert_eq!(classify(&entity("a", true, false, 2), 3),  Severity::Warn);
        assert_eq!(classify(&entity("a", true, false, 3), 3),  Severity::Warn);
        assert_eq!(classify(&entity("a", true, false, 4), 3),  Severity::Info);
    }

    #[test]
    fn message_literals() {
        assert!(format_message(&entity("a", true, true, -4)).ends_with("overdue by 4 day(s)"));
        assert!(format_message(&entity("a", true, false, 0)).ends_with("expires today!"));
        assert!(format_message(&entity("a", true, false, 1)).ends_with("1 day remaining"));
        assert!(format_message(&entity("a", true, false, 5)).ends_with("5 days remaining"));
        assert_eq!(format_message(&entity("7", true, false, 5)), "Op 7: 5 days remaining");
    }

    #[test]
    fn negative_days_without_flag_read_as_overdue() {
        assert_eq!(format_message(&entity("a", true, false, -2)), "Op a: overdue by 2 day(s)");
    }

    #[test]
    fn nameless_entity_still_formats() {
        let e = TrackedEntity { id: "n".into(), requires_tracking: true, days_remaining: 2, ..Default::default() };
        let alerts = evaluate(&[e], 3);
        assert_eq!(alerts[0].message, ": 2 days remaining");
    }

    #[test]
    fn days_remaining_copied_from_entity() {
        let alerts = evaluate(&[entity("a", true, true, -6)], 3);
        assert_eq!(alerts[0].days_remaining, -6);
    }

    #[test]
    fn severity_labels_round_trip() {
        for s in [Severity::Info, Severity::Warn, Severity::Danger] {
            assert_eq!(Severity::from_label(s.label()), Some(s));
        }
        assert!(Severity::Info < Severity::Warn && Severity::Warn < Severity::Danger);
    }
}
