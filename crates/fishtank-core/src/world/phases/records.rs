use crate::entity::Generation;
use crate::genome::Genome;
use crate::stats::StatsSample;

use super::super::World;

impl World {
    /// Raise the generation high-water mark and notify the record sink.
    pub(in crate::world) fn stage_generation_record(
        &mut self,
        leader: Option<(Generation, Genome)>,
    ) -> Option<Generation> {
        let (generation, genome) = leader?;
        if generation <= self.generation_record {
            return None;
        }
        self.generation_record = generation;
        self.record_sink.on_new_generation_record(generation, &genome);
        Some(generation)
    }

    /// Sample population statistics whenever the simulated clock enters a new second.
    pub(in crate::world) fn stage_stats(&mut self) -> Option<StatsSample> {
        let second = self.time.floor() as u64;
        if second == self.stats_second {
            return None;
        }
        self.stats_second = second;
        let sample = StatsSample::collect(self.time, &self.fish, &self.food);
        self.stats_sink.on_sample(&sample);
        Some(sample)
    }
}
