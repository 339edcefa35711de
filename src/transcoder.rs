use crate::engine::{Engine, StepOutcome, StepReport};
use crate::error::{IconvError, Result};
use crate::types::Conversion;

/// Streams `input` through `handle` using a scratch buffer of
/// `scratch_capacity` bytes.
///
/// Only [`StepOutcome::OutputBufferFull`] is retried. Every other failure
/// stops the loop and the error carries the output accumulated so far.
pub(crate) fn drain<E: Engine>(
    engine: &E,
    handle: &mut E::Handle,
    input: &[u8],
    scratch_capacity: usize,
) -> Result<Conversion> {
    let mut conversion = Conversion::default();
    if input.is_empty() {
        return Ok(conversion);
    }

    let mut scratch = vec![0u8; scratch_capacity];
    let mut position = 0usize;

    while position < input.len() {
        let remaining = &input[position..];
        let report = engine.step(handle, remaining, &mut scratch);
        conversion.steps += 1;
        check_report(&report, remaining.len(), scratch.len(), &mut conversion)?;

        conversion
            .output
            .extend_from_slice(&scratch[..report.produced]);
        position += report.consumed;

        tracing::trace!(
            step = conversion.steps,
            consumed = report.consumed,
            produced = report.produced,
            outcome = ?report.outcome,
            "conversion step"
        );

        match report.outcome {
            StepOutcome::Success | StepOutcome::OutputBufferFull => {
                if report.consumed == 0 && report.produced == 0 {
                    return Err(IconvError::Resource {
                        message: format!(
                            "engine made no progress at input offset {position} with a \
                             {scratch_capacity}-byte scratch buffer"
                        ),
                        output: conversion.output,
                    });
                }
            }
            outcome => return Err(step_failure(outcome, position, conversion.output)),
        }
    }

    Ok(conversion)
}

/// Collects the shift-reset sequence of a stateful converter.
pub(crate) fn drain_flush<E: Engine>(
    engine: &E,
    handle: &mut E::Handle,
    scratch_capacity: usize,
) -> Result<Vec<u8>> {
    let mut conversion = Conversion::default();
    let mut scratch = vec![0u8; scratch_capacity];

    loop {
        let report = engine.flush(handle, &mut scratch);
        conversion.steps += 1;
        check_report(&report, 0, scratch.len(), &mut conversion)?;
        conversion
            .output
            .extend_from_slice(&scratch[..report.produced]);

        match report.outcome {
            StepOutcome::Success => return Ok(conversion.output),
            StepOutcome::OutputBufferFull if report.produced > 0 => continue,
            StepOutcome::OutputBufferFull => {
                return Err(IconvError::Resource {
                    message: format!(
                        "shift reset sequence does not fit a {scratch_capacity}-byte scratch buffer"
                    ),
                    output: conversion.output,
                })
            }
            outcome => {
                return Err(IconvError::Resource {
                    message: format!("flushing shift state failed: {outcome:?}"),
                    output: conversion.output,
                })
            }
        }
    }
}

fn check_report(
    report: &StepReport,
    offered: usize,
    capacity: usize,
    conversion: &mut Conversion,
) -> Result<()> {
    if report.consumed > offered || report.produced > capacity {
        return Err(IconvError::Resource {
            message: format!(
                "engine reported {} consumed of {offered} and {} produced of {capacity}",
                report.consumed, report.produced
            ),
            output: std::mem::take(&mut conversion.output),
        });
    }
    Ok(())
}

fn step_failure(outcome: StepOutcome, position: usize, output: Vec<u8>) -> IconvError {
    match outcome {
        StepOutcome::InvalidSequence => IconvError::InvalidSequence { position, output },
        StepOutcome::IncompleteSequence => IconvError::IncompleteSequence { position, output },
        StepOutcome::Unrepresentable => IconvError::Unrepresentable { position, output },
        StepOutcome::EngineFailure(code) => IconvError::Resource {
            message: format!("conversion failed at input offset {position} (code {code})"),
            output,
        },
        StepOutcome::Success | StepOutcome::OutputBufferFull => IconvError::Resource {
            message: format!("unexpected retryable outcome {outcome:?}"),
            output,
        },
    }
}
