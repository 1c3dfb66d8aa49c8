//! Valves — motorized dampers and the messages broadcast about them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Timestamp;

/// Aperture is a percentage where `0` is fully open and `100` fully closed.
pub const APERTURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// Reject apertures outside [`APERTURE_RANGE`] (and NaN).
///
/// # Errors
///
/// Returns [`ValidationError::ApertureOutOfRange`].
pub fn validate_aperture(value: f64) -> Result<(), ValidationError> {
    if APERTURE_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ApertureOutOfRange(value))
    }
}

/// Last known state of one damper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValveSnapshot {
    pub id: String,
    pub value: f64,
    /// Raw state string as reported by the control surface.
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub last_updated: Timestamp,
}

impl ValveSnapshot {
    #[must_use]
    pub fn new(id: impl Into<String>, value: f64, last_updated: Timestamp) -> Self {
        Self {
            id: id.into(),
            value,
            state: format_state(value),
            attributes: serde_json::Map::new(),
            last_updated,
        }
    }

    /// Apply a state-change notification.
    pub fn apply(&mut self, change: &ValveStateChange) {
        self.value = change.value;
        self.state.clone_from(&change.state);
        if let Some(attributes) = &change.attributes {
            self.attributes.clone_from(attributes);
        }
        self.last_updated = change.at;
    }
}

/// Render an aperture the way numeric entities report their state.
#[must_use]
pub fn format_state(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// A state-changed notification from the external control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValveStateChange {
    pub id: String,
    pub value: f64,
    pub state: String,
    #[serde(default)]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
    pub at: Timestamp,
}

/// Broadcast to live subscribers: `{"type": "snapshot" | "update", "payload": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ValveMessage {
    Snapshot(Vec<ValveSnapshot>),
    Update(ValveSnapshot),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap()
    }

    #[test]
    fn should_accept_aperture_bounds() {
        assert!(validate_aperture(0.0).is_ok());
        assert!(validate_aperture(100.0).is_ok());
    }

    #[test]
    fn should_reject_aperture_out_of_range() {
        assert!(matches!(
            validate_aperture(100.5),
            Err(ValidationError::ApertureOutOfRange(_))
        ));
        assert!(validate_aperture(-1.0).is_err());
        assert!(validate_aperture(f64::NAN).is_err());
    }

    #[test]
    fn should_format_whole_apertures_without_fraction() {
        assert_eq!(format_state(40.0), "40");
        assert_eq!(format_state(12.5), "12.5");
    }

    #[test]
    fn should_apply_state_change() {
        let mut snapshot = ValveSnapshot::new("number.bedroom", 10.0, at());
        let later = at() + chrono::Duration::minutes(1);
        snapshot.apply(&ValveStateChange {
            id: "number.bedroom".to_string(),
            value: 60.0,
            state: "60".to_string(),
            attributes: None,
            at: later,
        });
        assert!((snapshot.value - 60.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.state, "60");
        assert_eq!(snapshot.last_updated, later);
    }

    #[test]
    fn should_serialize_update_message_with_type_and_payload() {
        let message = ValveMessage::Update(ValveSnapshot::new("number.kitchen", 25.0, at()));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["payload"]["id"], "number.kitchen");
    }

    #[test]
    fn should_serialize_snapshot_message_as_array_payload() {
        let message = ValveMessage::Snapshot(vec![ValveSnapshot::new("a", 0.0, at())]);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert!(json["payload"].is_array());
    }
}
