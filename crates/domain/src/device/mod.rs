//! Device definitions — static, per-model descriptions of an HRU.
//!
//! A [`DeviceDefinition`] names the unit and says how its power,
//! temperature and mode are reached ([`Access`]): either a fixed register
//! map with ordered write steps, or command scripts for units that pack
//! several values into one register or need a handshake around a write.
//! A field without a write path is read-only.

pub mod catalog;
mod write;

pub use write::{Transform, ValueSource, WriteStep};

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::script::CommandScript;
use crate::timeline::ModeSetting;

/// Modbus register class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    Holding,
    Input,
}

/// `(code, label)` pairs describing an enumerated register.
pub type EnumTable = &'static [(u16, &'static str)];

/// Label used when a register value has no entry in its enum table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Where and how to read one logical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterRead {
    pub address: u16,
    pub kind: RegisterKind,
    /// Multiplier applied to the raw register value.
    pub scale: f64,
    /// Decimal places kept after scaling.
    pub precision: u8,
}

impl RegisterRead {
    #[must_use]
    pub const fn holding(address: u16) -> Self {
        Self {
            address,
            kind: RegisterKind::Holding,
            scale: 1.0,
            precision: 0,
        }
    }

    #[must_use]
    pub const fn input(address: u16) -> Self {
        Self {
            address,
            kind: RegisterKind::Input,
            scale: 1.0,
            precision: 0,
        }
    }

    #[must_use]
    pub const fn scaled(mut self, scale: f64, precision: u8) -> Self {
        self.scale = scale;
        self.precision = precision;
        self
    }

    /// Scale a raw register value and round it to the configured precision.
    #[must_use]
    pub fn decode(&self, raw: u16) -> f64 {
        round_to(f64::from(raw) * self.scale, self.precision)
    }
}

/// Round `value` to `precision` decimal places.
#[must_use]
pub fn round_to(value: f64, precision: u8) -> f64 {
    let factor = 10_f64.powi(i32::from(precision));
    (value * factor).round() / factor
}

/// Encode a numeric value as a 16-bit register word.
///
/// The value is rounded first. Negative values down to `i16::MIN` are
/// stored in two's complement. Returns `None` when the value cannot fit.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_word(value: f64) -> Option<u16> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if (0.0..=f64::from(u16::MAX)).contains(&rounded) {
        Some(rounded as u16)
    } else if (f64::from(i16::MIN)..0.0).contains(&rounded) {
        Some((rounded as i16) as u16)
    } else {
        None
    }
}

/// The logical values a unit exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Power,
    Temperature,
    Mode,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Temperature => "temperature",
            Self::Mode => "mode",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register locations for the three logical values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadMap {
    pub power: RegisterRead,
    pub temperature: RegisterRead,
    pub mode: RegisterRead,
}

impl ReadMap {
    #[must_use]
    pub fn get(&self, field: Field) -> &RegisterRead {
        match field {
            Field::Power => &self.power,
            Field::Temperature => &self.temperature,
            Field::Mode => &self.mode,
        }
    }
}

/// Ordered write sequences; `None` means read-only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WriteMap {
    pub power: Option<&'static [WriteStep]>,
    pub temperature: Option<&'static [WriteStep]>,
    pub mode: Option<&'static [WriteStep]>,
}

impl WriteMap {
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&'static [WriteStep]> {
        match field {
            Field::Power => self.power,
            Field::Temperature => self.temperature,
            Field::Mode => self.mode,
        }
    }
}

/// How a mode setting was turned into a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeResolution {
    /// Matched an enum label or was given as a code.
    Resolved(u16),
    /// Not a known label, but parsed as a number.
    Numeric(u16),
    /// Neither; the default code `0` is used.
    Fallback,
}

impl ModeResolution {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Resolved(code) | Self::Numeric(code) => code,
            Self::Fallback => 0,
        }
    }
}

/// Command scripts of a scripted unit.
///
/// The read script assigns `$power`, `$temperature` and `$mode`; a value
/// it leaves unassigned reads as `0`. Write scripts find the requested
/// value bound to `$value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptedAccess {
    pub read: &'static str,
    pub power: Option<&'static str>,
    pub temperature: Option<&'static str>,
    pub mode: Option<&'static str>,
}

impl ScriptedAccess {
    /// Write script of `field`, `None` when read-only.
    #[must_use]
    pub fn write(&self, field: Field) -> Option<&'static str> {
        match field {
            Field::Power => self.power,
            Field::Temperature => self.temperature,
            Field::Mode => self.mode,
        }
    }

    /// Parse the read script.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Parse`] for a malformed script.
    pub fn read_script(&self) -> Result<CommandScript, ScriptError> {
        CommandScript::from_json(self.read)
    }

    /// Parse the write script of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Parse`] for a malformed script.
    pub fn write_script(&self, field: Field) -> Result<Option<CommandScript>, ScriptError> {
        self.write(field).map(CommandScript::from_json).transpose()
    }
}

/// How the three logical values are reached on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Access {
    /// One register per value, written through ordered steps.
    Registers { read: ReadMap, write: WriteMap },
    /// Read and write procedures run by the command interpreter.
    Scripted(ScriptedAccess),
}

/// Static descriptor of one HRU model.
#[derive(Debug, PartialEq)]
pub struct DeviceDefinition {
    /// Stable identifier, e.g. `atrea-rd5`.
    pub code: &'static str,
    pub name: &'static str,
    pub manufacturer: &'static str,
    /// Labels of the mode values; empty when the unit reports raw codes.
    pub modes: EnumTable,
    pub access: Access,
}

impl DeviceDefinition {
    /// Label of a raw mode value, [`UNKNOWN_LABEL`] when absent.
    #[must_use]
    pub fn mode_label(&self, raw: u16) -> &'static str {
        self.modes
            .iter()
            .find(|(code, _)| *code == raw)
            .map_or(UNKNOWN_LABEL, |(_, label)| label)
    }

    /// Reverse mode lookup, case-insensitive.
    #[must_use]
    pub fn mode_code(&self, label: &str) -> Option<u16> {
        let label = label.trim();
        self.modes
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(label))
            .map(|(code, _)| *code)
    }

    /// Turn a configured mode (code or enum label) into a register value.
    #[must_use]
    pub fn resolve_mode(&self, setting: &ModeSetting) -> ModeResolution {
        match setting {
            ModeSetting::Code(code) => ModeResolution::Resolved(*code),
            ModeSetting::Name(name) => {
                if let Some(code) = self.mode_code(name) {
                    ModeResolution::Resolved(code)
                } else if let Ok(code) = name.trim().parse::<u16>() {
                    ModeResolution::Numeric(code)
                } else {
                    ModeResolution::Fallback
                }
            }
        }
    }

    /// Whether `field` has a write path.
    #[must_use]
    pub fn is_writable(&self, field: Field) -> bool {
        match &self.access {
            Access::Registers { write, .. } => write.get(field).is_some(),
            Access::Scripted(scripts) => scripts.write(field).is_some(),
        }
    }
}
