//! Command scripts — a small language for ad-hoc device procedures.
//!
//! A script is an ordered list of statements. An `assignment` binds a
//! variable to the value of an expression; an `action` evaluates an
//! expression for its side effects (register I/O, delays) and drops the
//! result.
//!
//! ```json
//! [
//!   {"type": "assignment", "variable": "$raw", "value": {"function": "modbus_read_holding", "args": ["0x9C40"]}},
//!   {"type": "assignment", "variable": "$speed", "value": {"function": "bit_and", "args": [{"function": "bit_rshift", "args": ["$raw", 6]}, 15]}},
//!   {"type": "action", "expression": {"function": "modbus_write_holding", "args": [40960, "$speed"]}}
//! ]
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

/// Variable bindings, keyed by name without the leading `$`.
pub type Variables = HashMap<String, f64>;

/// One statement of a [`CommandScript`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    Assignment { variable: String, value: Expr },
    Action { expression: Expr },
}

/// A value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Number(f64),
    /// Hex literal (`0x..`), variable reference (`$name`) or numeric text.
    Text(String),
    Call(Call),
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Call> for Expr {
    fn from(value: Call) -> Self {
        Self::Call(value)
    }
}

/// A function call `{function, args}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl Call {
    #[must_use]
    pub fn new(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// An ordered list of statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandScript {
    pub statements: Vec<Statement>,
}

impl CommandScript {
    /// Parse a script from its JSON document form.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Parse`] when the document is malformed.
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(text).map_err(ScriptError::Parse)
    }

    #[must_use]
    pub fn assign(mut self, variable: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.statements.push(Statement::Assignment {
            variable: variable.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn action(mut self, expression: impl Into<Expr>) -> Self {
        self.statements.push(Statement::Action {
            expression: expression.into(),
        });
        self
    }
}

/// Strip the optional `$` sigil from a variable name.
#[must_use]
pub fn variable_name(raw: &str) -> &str {
    raw.strip_prefix('$').unwrap_or(raw)
}

/// Parse a `0x`/`0X` hex literal.
#[must_use]
pub fn parse_hex(text: &str) -> Option<i64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    i64::from_str_radix(digits, 16).ok()
}

/// Functions understood by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    BitAnd,
    BitOr,
    BitLshift,
    BitRshift,
    Round,
    Multiply,
    Divide,
    NonZero,
    Delay,
    ReadHolding,
    ReadInput,
    WriteHolding,
    WriteHoldingMulti,
    WriteCoil,
}

impl Function {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BitAnd => "bit_and",
            Self::BitOr => "bit_or",
            Self::BitLshift => "bit_lshift",
            Self::BitRshift => "bit_rshift",
            Self::Round => "round",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::NonZero => "non_zero",
            Self::Delay => "delay",
            Self::ReadHolding => "modbus_read_holding",
            Self::ReadInput => "modbus_read_input",
            Self::WriteHolding => "modbus_write_holding",
            Self::WriteHoldingMulti => "modbus_write_holding_multi",
            Self::WriteCoil => "modbus_write_coil",
        }
    }

    /// Minimum number of arguments.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::Round
            | Self::NonZero
            | Self::Delay
            | Self::ReadHolding
            | Self::ReadInput
            | Self::WriteHoldingMulti => 1,
            _ => 2,
        }
    }
}

impl FromStr for Function {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let function = match s {
            "bit_and" => Self::BitAnd,
            "bit_or" => Self::BitOr,
            "bit_lshift" => Self::BitLshift,
            "bit_rshift" => Self::BitRshift,
            "round" => Self::Round,
            "multiply" => Self::Multiply,
            "divide" => Self::Divide,
            "non_zero" => Self::NonZero,
            "delay" => Self::Delay,
            "modbus_read_holding" => Self::ReadHolding,
            "modbus_read_input" => Self::ReadInput,
            "modbus_write_holding" => Self::WriteHolding,
            "modbus_write_holding_multi" => Self::WriteHoldingMulti,
            "modbus_write_coil" => Self::WriteCoil,
            other => return Err(ScriptError::UnknownFunction(other.to_string())),
        };
        Ok(function)
    }
}
