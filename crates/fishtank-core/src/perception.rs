//! Toroidal perception: encodes nearby food, neighbours, and self-state into a
//! fixed-width network input.
//!
//! Layout of the input vector (offsets come from [`NetworkLayout`]):
//!
//! | field | contents per entry |
//! |-------|--------------------|
//! | food  | heading-relative x, y, `2·magnitude − 1` |
//! | fish  | heading-relative x, y, `health − 1` |
//! | self  | `health − 1` |
//!
//! Fields are zero-padded to their configured start. Remaining width is filled with the
//! fish's previous output starting at `feedback_offset`, then zeros.

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::config::{FishtankConfig, NetworkLayout};
use crate::entity::{Fish, Food, NearbyFood};
use crate::math::Vec2;

/// Basis determinants with a smaller magnitude are treated as degenerate.
const MIN_DETERMINANT: f64 = 1e-12;

fn wrap_axis(delta: f64) -> f64 {
    if delta > 0.5 {
        delta - 1.0
    } else if delta < -0.5 {
        delta + 1.0
    } else {
        delta
    }
}

/// Shortest offset from `from` to `to` on the unit torus.
#[must_use]
pub fn toroidal_offset(from: Vec2, to: Vec2) -> Vec2 {
    let naive = to - from;
    Vec2::new(wrap_axis(naive.x), wrap_axis(naive.y))
}

#[must_use]
pub fn toroidal_distance(a: Vec2, b: Vec2) -> f64 {
    toroidal_offset(a, b).norm()
}

/// Express a world-space offset in the basis `(forward, lateral)` where
/// `forward = sight_radius · (cos θ, sin θ)` and `lateral` is its perpendicular.
///
/// A degenerate basis yields the zero vector.
#[must_use]
pub fn relative_position(offset: Vec2, heading: f64, sight_radius: f64) -> Vec2 {
    let forward = Vec2::from_angle(heading).scale(sight_radius);
    let lateral = forward.perp();
    let det = forward.x * lateral.y - forward.y * lateral.x;
    if det.abs() < MIN_DETERMINANT {
        return Vec2::ZERO;
    }
    Vec2::new(
        (offset.x * lateral.y - offset.y * lateral.x) / det,
        (forward.x * offset.y - forward.y * offset.x) / det,
    )
}

/// Perception result for one fish.
#[derive(Debug, Clone, PartialEq)]
pub struct Perception {
    pub input: Vec<f64>,
    /// Food within sight in ascending toroidal distance (stable on ties).
    pub nearby_food: Vec<NearbyFood>,
}

fn pad_to(input: &mut Vec<f64>, len: usize) {
    if input.len() < len {
        input.resize(len, 0.0);
    }
}

/// Food within `sight_radius` of `position`, sorted by distance with ties kept in list order.
#[must_use]
pub fn sorted_food_in_sight(position: Vec2, food: &[Food], sight_radius: f64) -> Vec<NearbyFood> {
    let mut nearby: Vec<NearbyFood> = food
        .iter()
        .enumerate()
        .map(|(index, item)| NearbyFood {
            index,
            distance: toroidal_distance(position, item.position),
        })
        .filter(|entry| entry.distance <= sight_radius)
        .collect();
    nearby.sort_by_key(|entry| OrderedFloat(entry.distance));
    nearby
}

/// Encode the perception of `fish[subject]`.
#[must_use]
pub fn encode(subject: usize, fish: &[Fish], food: &[Food], config: &FishtankConfig) -> Perception {
    let layout: &NetworkLayout = &config.network;
    let sight = config.food_sight_radius;
    let me = &fish[subject];

    let nearby_food = sorted_food_in_sight(me.position, food, sight);

    let mut neighbours: Vec<(Vec2, f64, f64)> = fish
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != subject)
        .map(|(_, other)| {
            let offset = toroidal_offset(me.position, other.position);
            (offset, offset.norm(), other.health)
        })
        .collect();
    neighbours.sort_by_key(|(_, distance, _)| OrderedFloat(*distance));

    let mut input = Vec::with_capacity(layout.width);
    pad_to(&mut input, layout.food_start);
    for entry in nearby_food.iter().take(layout.food_count()) {
        let item = &food[entry.index];
        let offset = toroidal_offset(me.position, item.position);
        let relative = relative_position(offset, me.heading, sight);
        input.extend([relative.x, relative.y, item.magnitude * 2.0 - 1.0]);
    }
    pad_to(&mut input, layout.fish_start);
    for (offset, _, health) in neighbours.iter().take(layout.fish_count()) {
        let relative = relative_position(*offset, me.heading, sight);
        input.extend([relative.x, relative.y, health - 1.0]);
    }
    pad_to(&mut input, layout.self_start);
    if layout.self_width > 0 {
        input.push(me.health - 1.0);
    }
    pad_to(&mut input, layout.self_start + layout.self_width);

    let mut echo = me.network_output.iter().skip(layout.feedback_offset);
    while input.len() < layout.width {
        match echo.next() {
            Some(value) => input.push(*value),
            None => break,
        }
    }
    pad_to(&mut input, layout.width);
    debug_assert_eq!(input.len(), layout.width);

    Perception { input, nearby_food }
}

/// Encode every fish in parallel; results follow population order.
#[must_use]
pub fn encode_all(fish: &[Fish], food: &[Food], config: &FishtankConfig) -> Vec<Perception> {
    (0..fish.len())
        .into_par_iter()
        .map(|subject| encode(subject, fish, food, config))
        .collect()
}
