//! HRU state — what the synchronizer reads back and publishes.

use serde::{Deserialize, Serialize};

use crate::active_state::{ActiveSource, ActiveState};

/// Scaled values read from the unit in one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HruReading {
    pub power: f64,
    pub temperature: f64,
    /// Raw mode register value.
    pub mode_code: u16,
    /// Enum label of `mode_code`, `"Unknown"` when absent from the table.
    pub mode: String,
}

/// Payload of the `luftuj/hru/{unit}/state` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HruState {
    pub power: f64,
    pub temperature: f64,
    pub mode: String,
    pub mode_formatted: String,
    pub source: ActiveSource,
    pub boost_remaining: u32,
    pub boost_name: Option<String>,
}

impl HruState {
    /// Merge a device reading with the resolver's active state.
    ///
    /// `mode_formatted` shows the managing mode's name while a schedule or
    /// boost is in control, otherwise the unit's own mode label.
    #[must_use]
    pub fn merge(reading: HruReading, active: &ActiveState) -> Self {
        let mode_formatted = match (active.source, active.mode_name.as_deref()) {
            (ActiveSource::Manual, _) | (_, None) => reading.mode.clone(),
            (_, Some(name)) => name.to_string(),
        };
        Self {
            power: reading.power,
            temperature: reading.temperature,
            mode: reading.mode,
            mode_formatted,
            source: active.source,
            boost_remaining: active.boost_remaining,
            boost_name: active.boost_name().map(str::to_string),
        }
    }
}
