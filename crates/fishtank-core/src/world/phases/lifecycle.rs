use rand::Rng;
use std::f64::consts::TAU;
use tracing::{debug, warn};

use crate::entity::{FishBody, FishId, Food};
use crate::genome::GenomeError;
use crate::math::Vec2;

use super::super::World;
use super::LifecycleSummary;

/// Raw network outputs are divided by this before driving accelerations.
const ACTION_SCALE: f64 = 3.0;

/// Quadratic age penalty; zero at three seconds old.
fn age_penalty(age: f64) -> f64 {
    ((age - 3.0) / 300.0).powi(2)
}

impl World {
    /// Add one random fish when spawning is enabled and the population is below the floor.
    pub(in crate::world) fn stage_auto_spawn(&mut self) -> usize {
        if !self.config.auto_fish_spawn || self.fish.len() >= self.config.population_floor {
            return 0;
        }
        match self.spawn_random_fish() {
            Ok(id) => {
                debug!(fish = %id, "spawned fish below population floor");
                1
            }
            Err(err) => {
                warn!(?err, "failed to spawn fish");
                0
            }
        }
    }

    /// Health decay, action decoding, feeding, death, and reproduction.
    ///
    /// Fish are visited in reverse population order so removals never skip an entry.
    /// Offspring are appended and first act on the next step. Contested food goes to the
    /// first fish visited.
    pub(in crate::world) fn stage_lifecycle(&mut self) -> LifecycleSummary {
        let dt = self.config.dt;
        let immortal =
            self.config.auto_immortal_fish && self.fish.len() < self.config.population_floor;
        let mut summary = LifecycleSummary::default();
        let mut best = self.generation_record;

        let mut index = self.fish.len();
        while index > 0 {
            index -= 1;
            let config = &self.config;
            let fish = &mut self.fish[index];

            if fish.generation > best {
                best = fish.generation;
                summary.leader = Some((fish.generation, fish.genome().clone()));
            }

            if !immortal {
                fish.health -= config.time_health_decrease * dt * age_penalty(fish.age);
            }
            fish.age += dt;

            if let [linear, angular, ..] = fish.network_output[..] {
                fish.acceleration = linear / ACTION_SCALE;
                fish.angular_acceleration = angular / ACTION_SCALE;
            }
            if !immortal {
                fish.health -= fish.acceleration.abs() * dt * config.linear_acceleration_health_cost;
                fish.health -= fish.angular_acceleration.abs()
                    * dt
                    * config.angular_acceleration_health_cost;
            }

            for nearby in &fish.nearby_food {
                let Some(item) = self.food.get_mut(nearby.index) else {
                    continue;
                };
                if nearby.distance > item.pickup_radius {
                    break;
                }
                if !item.eaten {
                    item.eaten = true;
                    fish.health += item.magnitude;
                    summary.food_eaten += 1;
                }
            }

            if fish.health <= 0.0 {
                let dead = self.fish.remove(index);
                self.pool.unassign(dead.id());
                self.food.push(Food::new(
                    dead.position,
                    self.config.food_pickup_radius,
                    self.config.fish_to_food_conversion,
                ));
                debug!(fish = %dead.id(), age = dead.age, "fish died");
                summary.deaths += 1;
            } else if fish.health > config.reproduction_health {
                match self.spawn_offspring(index) {
                    Ok(_) => summary.births += 1,
                    Err(err) => warn!(?err, "failed to spawn offspring"),
                }
            }
        }
        summary
    }

    /// Copy the parent's genome (possibly mutated) into a new fish placed near it, then
    /// charge the parent the reproduction cost.
    fn spawn_offspring(&mut self, parent_index: usize) -> Result<FishId, GenomeError> {
        let parent = &self.fish[parent_index];
        let (genome, perturbations) = parent
            .genome()
            .offspring(&mut self.rng, &self.config.mutation);
        if perturbations > 0 {
            debug!(parent = %parent.id(), perturbations, "genome mutated");
        }
        let spread = 2.0 * self.config.food_pickup_radius;
        let offset = Vec2::new(self.rng.random::<f64>(), self.rng.random::<f64>()).scale(spread);
        let body = FishBody {
            position: (parent.position + offset).wrapped(),
            velocity: 0.0,
            heading: self.rng.random_range(0.0..TAU),
            angular_velocity: 0.0,
            health: self.config.offspring_health,
            age: 0.0,
            generation: parent.generation.next(),
        };
        let id = self.insert_fish(body, genome)?;
        self.fish[parent_index].health -= self.config.reproduction_cost;
        Ok(id)
    }
}
