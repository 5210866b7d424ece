//! Fish and food entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::NetworkLayout;
use crate::genome::{Genome, GenomeError};
use crate::math::Vec2;
use crate::network::Network;

/// Globally unique, monotonically assigned fish identifier.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct FishId(pub u64);

impl fmt::Display for FishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fish#{}", self.0)
    }
}

/// Lineage counter (offspring are one generation past their parent).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Kinematic and physiological state used to construct a fish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FishBody {
    pub position: Vec2,
    pub velocity: f64,
    pub heading: f64,
    pub angular_velocity: f64,
    pub health: f64,
    pub age: f64,
    pub generation: Generation,
}

impl Default for FishBody {
    fn default() -> Self {
        Self {
            position: Vec2::new(0.5, 0.5),
            velocity: 0.0,
            heading: 0.0,
            angular_velocity: 0.0,
            health: 1.0,
            age: 0.0,
            generation: Generation::default(),
        }
    }
}

/// A food item within sight, cached by perception for the feeding pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyFood {
    /// Index into the world's food list at perception time.
    pub index: usize,
    /// Toroidal distance from the fish.
    pub distance: f64,
}

/// An agent with a decoded controller.
#[derive(Debug, Clone)]
pub struct Fish {
    id: FishId,
    pub position: Vec2,
    /// Forward speed along `heading`.
    pub velocity: f64,
    pub heading: f64,
    pub angular_velocity: f64,
    pub acceleration: f64,
    pub angular_acceleration: f64,
    pub health: f64,
    /// Accumulated simulated seconds.
    pub age: f64,
    pub generation: Generation,
    genome: Genome,
    network: Network,
    /// Most recent usable network output (already trimmed by the worker).
    pub network_output: Vec<f64>,
    pub(crate) nearby_food: Vec<NearbyFood>,
}

impl Fish {
    /// Decode `genome` and build a fish. The network exists from construction onwards.
    pub fn new(
        id: FishId,
        body: FishBody,
        genome: Genome,
        layout: &NetworkLayout,
    ) -> Result<Self, GenomeError> {
        let network = genome.decode(layout)?;
        Ok(Self {
            id,
            position: body.position,
            velocity: body.velocity,
            heading: body.heading,
            angular_velocity: body.angular_velocity,
            acceleration: 0.0,
            angular_acceleration: 0.0,
            health: body.health,
            age: body.age,
            generation: body.generation,
            genome,
            network,
            network_output: Vec::new(),
            nearby_food: Vec::new(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> FishId {
        self.id
    }

    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Food within sight sorted by ascending toroidal distance, from the last perception pass.
    #[must_use]
    pub fn nearby_food(&self) -> &[NearbyFood] {
        &self.nearby_food
    }

    /// Unit vector along the current heading.
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }
}

/// An edible item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Food {
    pub position: Vec2,
    /// Feeding reach, fixed from the config when the item is created.
    pub pickup_radius: f64,
    /// Health granted when eaten.
    pub magnitude: f64,
    /// Set when consumed during the current step; such items are removed after feeding.
    #[serde(skip)]
    pub eaten: bool,
}

impl Food {
    #[must_use]
    pub const fn new(position: Vec2, pickup_radius: f64, magnitude: f64) -> Self {
        Self {
            position,
            pickup_radius,
            magnitude,
            eaten: false,
        }
    }
}
