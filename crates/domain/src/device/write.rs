//! Write steps — one register write in an ordered sequence.

use std::time::Duration;

use super::RegisterKind;

/// Pure function of the requested input value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// `round(input)`
    Round,
    /// `round(input * factor)`, e.g. `Scale(10.0)` for tenths of a degree.
    Scale(f64),
}

impl Transform {
    #[must_use]
    pub fn apply(self, input: f64) -> f64 {
        match self {
            Self::Round => input.round(),
            Self::Scale(factor) => (input * factor).round(),
        }
    }
}

/// Value written by a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueSource {
    /// Fixed value, the input is ignored.
    Constant(u16),
    /// Derived from the input value.
    Transform(Transform),
}

impl ValueSource {
    #[must_use]
    pub fn resolve(self, input: f64) -> f64 {
        match self {
            Self::Constant(value) => f64::from(value),
            Self::Transform(transform) => transform.apply(input),
        }
    }
}

/// One write of a sequence.
///
/// `kind` records how the register is declared by the vendor; both kinds
/// are written with a holding-register write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteStep {
    pub address: u16,
    pub kind: RegisterKind,
    pub value: ValueSource,
    pub delay_after: Option<Duration>,
}

impl WriteStep {
    #[must_use]
    pub const fn constant(address: u16, value: u16) -> Self {
        Self {
            address,
            kind: RegisterKind::Holding,
            value: ValueSource::Constant(value),
            delay_after: None,
        }
    }

    #[must_use]
    pub const fn transform(address: u16, transform: Transform) -> Self {
        Self {
            address,
            kind: RegisterKind::Holding,
            value: ValueSource::Transform(transform),
            delay_after: None,
        }
    }

    /// Mark the register as vendor-declared input.
    #[must_use]
    pub const fn input(mut self) -> Self {
        self.kind = RegisterKind::Input;
        self
    }

    #[must_use]
    pub const fn delay_ms(mut self, millis: u64) -> Self {
        self.delay_after = Some(Duration::from_millis(millis));
        self
    }
}
