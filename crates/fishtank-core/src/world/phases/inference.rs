use std::collections::HashMap;

use crate::entity::FishId;
use crate::perception::encode_all;
use crate::workers::DispatchOutcome;

use super::super::World;

impl World {
    /// Encode every fish's perception, evaluate all networks on the worker pool, and write
    /// the outputs back by id once every batch is in. Fish without a fresh output keep the
    /// previous one.
    pub(in crate::world) fn stage_inference(&mut self) -> DispatchOutcome {
        let perceptions = encode_all(&self.fish, &self.food, &self.config);
        let mut inputs: HashMap<FishId, Vec<f64>> = HashMap::with_capacity(perceptions.len());
        for (fish, perception) in self.fish.iter_mut().zip(perceptions) {
            fish.nearby_food = perception.nearby_food;
            inputs.insert(fish.id(), perception.input);
        }

        let mut outcome = self.pool.dispatch(&self.fish, inputs).join();
        for fish in &mut self.fish {
            if let Some(output) = outcome.outputs.remove(&fish.id()) {
                fish.network_output = output;
            }
        }
        outcome
    }
}
