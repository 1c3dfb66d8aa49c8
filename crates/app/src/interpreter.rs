//! Command script interpreter.
//!
//! Statements run in order against one register client. Arguments are
//! evaluated left to right and may nest. Unknown functions are logged and
//! evaluate to `0` so that a partly wrong script degrades instead of
//! aborting; register I/O failures and malformed arguments do abort.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use luftuj_domain::device::encode_word;
use luftuj_domain::error::{LuftujError, ScriptError};
use luftuj_domain::script::{
    Call, CommandScript, Expr, Function, Statement, Variables, parse_hex, variable_name,
};

use crate::ports::RegisterClient;

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<f64, LuftujError>> + Send + 'a>>;

/// Evaluates [`CommandScript`]s against a register client.
pub struct Interpreter<'c, C> {
    client: &'c C,
    variables: Variables,
}

impl<'c, C: RegisterClient> Interpreter<'c, C> {
    /// Create an interpreter seeded with caller-supplied variables.
    pub fn new(client: &'c C, variables: Variables) -> Self {
        Self { client, variables }
    }

    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Run every statement and return the final variable bindings.
    ///
    /// # Errors
    ///
    /// Returns the first register I/O error, or a [`ScriptError`] for
    /// missing arguments and values that do not fit a register.
    pub async fn run(mut self, script: &CommandScript) -> Result<Variables, LuftujError> {
        for (index, statement) in script.statements.iter().enumerate() {
            match statement {
                Statement::Assignment { variable, value } => {
                    let value = self.evaluate(value).await?;
                    tracing::trace!(step = index, variable = %variable, value, "assigned");
                    self.variables
                        .insert(variable_name(variable).to_string(), value);
                }
                Statement::Action { expression } => {
                    self.evaluate(expression).await?;
                }
            }
        }
        Ok(self.variables)
    }

    /// Evaluate one expression.
    ///
    /// Literals evaluate to themselves, `0x..` strings to their integer
    /// value, `$name` to the bound variable (`0` when unbound).
    pub fn evaluate<'a>(&'a self, expr: &'a Expr) -> EvalFuture<'a> {
        Box::pin(async move {
            match expr {
                Expr::Number(value) => Ok(*value),
                Expr::Text(text) => Ok(self.evaluate_text(text)),
                Expr::Call(call) => self.evaluate_call(call).await,
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn evaluate_text(&self, text: &str) -> f64 {
        let text = text.trim();
        if let Some(value) = parse_hex(text) {
            return value as f64;
        }
        if text.starts_with('$') {
            return self
                .variables
                .get(variable_name(text))
                .copied()
                .unwrap_or(0.0);
        }
        text.parse().unwrap_or_else(|_| {
            tracing::warn!(literal = %text, "unparseable literal, using 0");
            0.0
        })
    }

    async fn evaluate_call(&self, call: &Call) -> Result<f64, LuftujError> {
        // Arguments run first so that their side effects happen even when
        // the outer function is unknown.
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.evaluate(arg).await?);
        }

        let function = match call.function.parse::<Function>() {
            Ok(function) => function,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unknown script function");
                return Ok(0.0);
            }
        };
        if args.len() < function.arity() {
            return Err(ScriptError::MissingArgument {
                function: function.name(),
                expected: function.arity(),
                actual: args.len(),
            }
            .into());
        }

        self.dispatch(function, &args).await
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    async fn dispatch(&self, function: Function, args: &[f64]) -> Result<f64, LuftujError> {
        let int = |value: f64| value as i64;
        let value = match function {
            Function::BitAnd => (int(args[0]) & int(args[1])) as f64,
            Function::BitOr => (int(args[0]) | int(args[1])) as f64,
            Function::BitLshift => (int(args[0]) << shift_amount(args[1])) as f64,
            Function::BitRshift => (int(args[0]) >> shift_amount(args[1])) as f64,
            Function::Round => args[0].round(),
            Function::Multiply => args[0] * args[1],
            Function::Divide => {
                if args[1] == 0.0 {
                    args[0]
                } else {
                    args[0] / args[1]
                }
            }
            Function::NonZero => {
                if args[0] == 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Function::Delay => {
                let millis = args[0].max(0.0) as u64;
                tokio::time::sleep(Duration::from_millis(millis)).await;
                0.0
            }
            Function::ReadHolding => {
                let address = register_address(function, args[0])?;
                let words = self
                    .client
                    .read_holding(address, read_count(function, args)?)
                    .await?;
                words.first().copied().map_or(0.0, f64::from)
            }
            Function::ReadInput => {
                let address = register_address(function, args[0])?;
                let words = self
                    .client
                    .read_input(address, read_count(function, args)?)
                    .await?;
                words.first().copied().map_or(0.0, f64::from)
            }
            Function::WriteHolding => {
                let address = register_address(function, args[0])?;
                let value = register_word(function, args[1])?;
                self.client.write_holding(address, value).await?;
                0.0
            }
            Function::WriteHoldingMulti => {
                let address = register_address(function, args[0])?;
                let mut values = args[1..]
                    .iter()
                    .map(|value| register_word(function, *value))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.is_empty() {
                    values.push(0);
                }
                self.client.write_holding_multi(address, &values).await?;
                0.0
            }
            Function::WriteCoil => {
                let address = register_address(function, args[0])?;
                self.client.write_coil(address, args[1] != 0.0).await?;
                0.0
            }
        };
        Ok(value)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn shift_amount(value: f64) -> u32 {
    value.clamp(0.0, 63.0) as u32
}

fn register_word(function: Function, value: f64) -> Result<u16, ScriptError> {
    encode_word(value).ok_or(ScriptError::ValueOutOfRange {
        function: function.name(),
        value,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn register_address(function: Function, value: f64) -> Result<u16, ScriptError> {
    let rounded = value.round();
    if (0.0..=f64::from(u16::MAX)).contains(&rounded) {
        Ok(rounded as u16)
    } else {
        Err(ScriptError::ValueOutOfRange {
            function: function.name(),
            value,
        })
    }
}

fn read_count(function: Function, args: &[f64]) -> Result<u16, ScriptError> {
    match args.get(1) {
        Some(count) => register_address(function, *count).map(|count| count.max(1)),
        None => Ok(1),
    }
}

/// Run `script` on a single-use client for `endpoint`; the client is
/// disconnected whether the script succeeds or fails.
///
/// # Errors
///
/// Propagates the script's error after the client has been closed.
pub async fn run_scoped<R: crate::ports::ClientRegistry>(
    registry: &R,
    endpoint: &crate::ports::Endpoint,
    script: &CommandScript,
    variables: Variables,
) -> Result<Variables, LuftujError> {
    let client = registry.open_temporary(endpoint);
    let result = Interpreter::new(&client, variables).run(script).await;
    client.disconnect().await;
    if let Err(err) = &result {
        tracing::warn!(endpoint = %endpoint, error = %err, "script failed");
    }
    result
}
