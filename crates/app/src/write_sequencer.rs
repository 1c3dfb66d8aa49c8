//! Write sequencer — realizes "set power/temperature/mode" as ordered
//! register writes.

use luftuj_domain::device::{WriteStep, encode_word};
use luftuj_domain::error::{LuftujError, ValidationError};

use crate::ports::RegisterClient;

/// Execute `steps` in order for the requested `input` value.
///
/// Every step is written with a holding-register write whatever kind the
/// vendor declares. The first failure aborts the remaining steps; steps
/// already written stay written.
///
/// # Errors
///
/// Returns [`ValidationError::RegisterValueOutOfRange`] when a computed
/// value does not fit a register, or the client's error.
pub async fn apply<C: RegisterClient>(
    client: &C,
    steps: &[WriteStep],
    input: f64,
) -> Result<(), LuftujError> {
    for (index, step) in steps.iter().enumerate() {
        let value = step.value.resolve(input);
        let word = encode_word(value).ok_or(ValidationError::RegisterValueOutOfRange(value))?;
        tracing::debug!(
            step = index,
            address = step.address,
            kind = ?step.kind,
            value = word,
            "writing register"
        );
        client.write_holding(step.address, word).await?;
        if let Some(delay) = step.delay_after {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(())
}
