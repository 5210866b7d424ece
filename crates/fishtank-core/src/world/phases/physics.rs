use crate::config::FishtankConfig;
use crate::entity::Fish;

use super::super::World;

/// Explicit Euler step for one fish. Viscosity decays the velocities before the current
/// accelerations are applied, then the position is wrapped onto the torus.
pub(in crate::world) fn integrate(fish: &mut Fish, config: &FishtankConfig) {
    let dt = config.dt;
    let moved = fish.position + fish.direction().scale(fish.velocity * dt);
    fish.heading += dt * fish.angular_velocity;

    fish.velocity *= 1.0 - config.linear_viscosity * dt;
    fish.angular_velocity *= 1.0 - config.angular_viscosity * dt;
    fish.velocity += fish.acceleration * dt;
    fish.angular_velocity += fish.angular_acceleration * dt;

    fish.position = moved.wrapped();
}

impl World {
    pub(in crate::world) fn stage_physics(&mut self) {
        let config = &self.config;
        for fish in &mut self.fish {
            integrate(fish, config);
        }
    }
}
