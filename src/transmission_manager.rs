//! Decides whether a single exposure transmits the pathogen.
//!
//! `interact` never mutates the population. The caller buffers targets that
//! were infected and applies them at the end of the time step, so a newly
//! infected individual cannot spread the pathogen in the step it caught it.
use serde::Serialize;

use crate::error::HerdError;
use crate::people::Individual;
use crate::rand::Rng;

/// What happened when an infected individual met someone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionResult {
    /// The target will be infected at the end of the step.
    pub infected: bool,
    pub target_vaccinated: bool,
    pub target_previously_infected: bool,
}

/// Resolves one interaction trial between an infected `source` and `target`.
///
/// Vaccinated and already infected targets are unaffected and consume no
/// random draw. A susceptible target consumes one uniform draw `r` and is
/// infected if `r < transmission_rate` of the source's pathogen.
///
/// # Errors
///
/// Returns `HerdError::InvariantViolation` if either party is dead or the
/// source is not infected.
pub fn interact<R: Rng + ?Sized>(
    source: &Individual,
    target: &Individual,
    rng: &mut R,
) -> Result<InteractionResult, HerdError> {
    if !source.is_alive() || !target.is_alive() {
        return Err(HerdError::InvariantViolation(format!(
            "interaction between {} and {} involves a dead person",
            source.id(),
            target.id()
        )));
    }
    let Some(pathogen) = source.infection() else {
        return Err(HerdError::InvariantViolation(format!(
            "person {} is not infected and cannot transmit",
            source.id()
        )));
    };

    let mut result = InteractionResult {
        infected: false,
        target_vaccinated: target.is_vaccinated(),
        target_previously_infected: target.is_infected(),
    };
    if result.target_vaccinated || result.target_previously_infected {
        return Ok(result);
    }

    let r: f64 = rng.random();
    result.infected = r < pathogen.transmission_rate();
    Ok(result)
}
