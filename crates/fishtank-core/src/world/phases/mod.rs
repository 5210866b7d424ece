mod food;
mod inference;
mod lifecycle;
mod physics;
mod records;

#[cfg(test)]
pub(in crate::world) use physics::integrate;

use crate::entity::Generation;
use crate::genome::Genome;

/// Tallies from one lifecycle pass.
#[derive(Debug, Default)]
pub(in crate::world) struct LifecycleSummary {
    pub births: usize,
    pub deaths: usize,
    pub food_eaten: usize,
    /// Highest generation seen during the pass, when it beat the standing record.
    pub leader: Option<(Generation, Genome)>,
}
