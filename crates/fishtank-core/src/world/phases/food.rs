use rand::Rng;

use super::super::World;

impl World {
    /// Drop every food item eaten during this step.
    pub(in crate::world) fn stage_remove_eaten_food(&mut self) {
        self.food.retain(|item| !item.eaten);
    }

    /// Add one random food item with probability `food_regeneration * dt`.
    pub(in crate::world) fn stage_food_regeneration(&mut self) -> bool {
        let chance = self.config.food_regeneration * self.config.dt;
        if self.rng.random::<f64>() < chance {
            self.add_random_food();
            true
        } else {
            false
        }
    }
}
