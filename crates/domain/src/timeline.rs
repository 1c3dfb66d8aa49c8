//! Timeline — the weekly schedule, named modes and the boost override.
//!
//! Timeline data is created and edited through the settings store and is
//! read-only to the resolver.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{EventId, ModeId};
use crate::time::{MINUTES_PER_DAY, Timestamp};
use crate::valve::validate_aperture;

/// Mode register setting: a raw code or an enum label.
///
/// Codes stored by other clients may come back as `2.0`; integral floats
/// decode as codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "StoredModeSetting")]
pub enum ModeSetting {
    Code(u16),
    Name(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredModeSetting {
    Code(u16),
    Float(f64),
    Name(String),
}

impl TryFrom<StoredModeSetting> for ModeSetting {
    type Error = String;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn try_from(value: StoredModeSetting) -> Result<Self, Self::Error> {
        match value {
            StoredModeSetting::Code(code) => Ok(Self::Code(code)),
            StoredModeSetting::Float(value)
                if value.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&value) =>
            {
                Ok(Self::Code(value as u16))
            }
            StoredModeSetting::Float(value) => Err(format!("mode code {value} is not a register value")),
            StoredModeSetting::Name(name) => Ok(Self::Name(name)),
        }
    }
}

/// What the HRU itself should be set to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub mode: Option<ModeSetting>,
    pub power: Option<f64>,
    pub temperature: Option<f64>,
}

impl TargetConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.power.is_none() && self.temperature.is_none()
    }
}

/// Damper id → aperture (0 = fully open, 100 = fully closed).
pub type ValveConfig = BTreeMap<String, f64>;

/// Check every aperture of a valve configuration.
///
/// # Errors
///
/// Returns [`ValidationError::ApertureOutOfRange`] for the first value
/// outside `0..=100`.
pub fn validate_valves(valves: &ValveConfig) -> Result<(), ValidationError> {
    valves.values().try_for_each(|value| validate_aperture(*value))
}

/// One entry of the weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    /// Minute of the day, `0..=1439`.
    pub start_time: u16,
    /// `0` = Monday … `6` = Sunday; `None` applies every day.
    #[serde(default)]
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub target_config: TargetConfig,
    #[serde(default)]
    pub valve_config: ValveConfig,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: u8,
}

fn default_true() -> bool {
    true
}

impl TimelineEvent {
    /// Whether the event applies on `day` (Monday = 0).
    #[must_use]
    pub fn runs_on(&self, day: u8) -> bool {
        self.day_of_week.is_none_or(|d| d == day)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the start time, day, priority or
    /// an aperture is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_time >= MINUTES_PER_DAY {
            return Err(ValidationError::StartTimeOutOfRange(self.start_time));
        }
        if let Some(day) = self.day_of_week
            && day > 6
        {
            return Err(ValidationError::DayOutOfRange(day));
        }
        if self.priority > 100 {
            return Err(ValidationError::PriorityOutOfRange(self.priority));
        }
        validate_valves(&self.valve_config)
    }
}

/// A named preset, optionally offered as a boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub id: ModeId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_boost: bool,
    #[serde(default)]
    pub target_config: TargetConfig,
    #[serde(default)]
    pub valve_config: ValveConfig,
}

impl Mode {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] or an aperture error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        validate_valves(&self.valve_config)
    }
}

/// Bounds accepted for a boost duration, in minutes.
pub const BOOST_DURATION_RANGE: std::ops::RangeInclusive<u32> = 1..=1440;

/// Boost duration used when none was stored.
pub const DEFAULT_BOOST_DURATION: u32 = 30;

/// Time-limited override of the schedule. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostOverride {
    pub mode_id: ModeId,
    pub end_time: Timestamp,
    pub duration_minutes: u32,
}

impl BoostOverride {
    /// Start a boost at `now` lasting `duration_minutes`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BoostDurationOutOfRange`] outside
    /// [`BOOST_DURATION_RANGE`].
    pub fn start(
        mode_id: ModeId,
        now: Timestamp,
        duration_minutes: u32,
    ) -> Result<Self, ValidationError> {
        validate_boost_duration(duration_minutes)?;
        Ok(Self {
            mode_id,
            end_time: now + Duration::minutes(i64::from(duration_minutes)),
            duration_minutes,
        })
    }

    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.end_time
    }

    /// Whole minutes left, rounded up; `0` once expired.
    #[must_use]
    pub fn remaining_minutes(&self, now: Timestamp) -> u32 {
        let secs = (self.end_time - now).num_seconds();
        if secs <= 0 {
            return 0;
        }
        u32::try_from((secs + 59) / 60).unwrap_or(u32::MAX)
    }
}

/// Check a boost duration.
///
/// # Errors
///
/// Returns [`ValidationError::BoostDurationOutOfRange`] outside
/// [`BOOST_DURATION_RANGE`].
pub fn validate_boost_duration(minutes: u32) -> Result<(), ValidationError> {
    if BOOST_DURATION_RANGE.contains(&minutes) {
        Ok(())
    } else {
        Err(ValidationError::BoostDurationOutOfRange(minutes))
    }
}
