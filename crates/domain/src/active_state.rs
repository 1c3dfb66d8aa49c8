//! Active state — the resolver's view of what currently drives the unit.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, ModeId};
use crate::time::Timestamp;

/// Where the applied configuration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveSource {
    /// Nothing is managed; the unit keeps whatever it was set to.
    #[default]
    Manual,
    Schedule,
    Boost,
}

impl std::fmt::Display for ActiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Schedule => f.write_str("schedule"),
            Self::Boost => f.write_str("boost"),
        }
    }
}

/// Output of one resolver evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub source: ActiveSource,
    pub mode_name: Option<String>,
    pub mode_id: Option<ModeId>,
    pub event_id: Option<EventId>,
    /// Minutes left on the active boost, `0` otherwise.
    pub boost_remaining: u32,
    pub evaluated_at: Option<Timestamp>,
}

impl ActiveState {
    #[must_use]
    pub fn manual(at: Timestamp) -> Self {
        Self {
            evaluated_at: Some(at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_boosting(&self) -> bool {
        self.source == ActiveSource::Boost
    }

    /// Name of the boost mode while boosting.
    #[must_use]
    pub fn boost_name(&self) -> Option<&str> {
        if self.is_boosting() {
            self.mode_name.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_manual() {
        let state = ActiveState::default();
        assert_eq!(state.source, ActiveSource::Manual);
        assert!(!state.is_boosting());
    }

    #[test]
    fn should_expose_boost_name_only_when_boosting() {
        let mut state = ActiveState {
            source: ActiveSource::Schedule,
            mode_name: Some("Night".to_string()),
            ..ActiveState::default()
        };
        assert_eq!(state.boost_name(), None);
        state.source = ActiveSource::Boost;
        assert_eq!(state.boost_name(), Some("Night"));
    }

    #[test]
    fn should_serialize_source_lowercase() {
        let json = serde_json::to_string(&ActiveSource::Boost).unwrap();
        assert_eq!(json, "\"boost\"");
    }
}
