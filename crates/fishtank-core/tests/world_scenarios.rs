use fishtank_core::{FishBody, FishtankConfig, Generation, Genome, Vec2, World};

fn scenario_config() -> FishtankConfig {
    FishtankConfig {
        initial_fish_count: 0,
        initial_food_count: 0,
        food_regeneration: 0.0,
        worker_count: Some(2),
        rng_seed: Some(0x5EED),
        ..FishtankConfig::default()
    }
}

fn zero_brained(world: &mut World, position: Vec2, health: f64) -> fishtank_core::FishId {
    let genome = Genome::zeroed(&world.config().network);
    world
        .spawn_fish(
            FishBody {
                position,
                health,
                ..FishBody::default()
            },
            genome,
        )
        .expect("spawn")
}

#[test]
fn idle_fish_decays_by_the_age_penalty_alone() {
    let config = FishtankConfig {
        auto_immortal_fish: false,
        ..scenario_config()
    };
    let dt = config.dt;
    let rate = config.time_health_decrease;
    let mut world = World::new(config).expect("world");
    let id = zero_brained(&mut world, Vec2::new(0.5, 0.5), 1.0);

    let mut expected = 1.0_f64;
    let mut age = 0.0_f64;
    let mut previous = 1.0_f64;
    for _ in 0..1_000 {
        let report = world.step();
        assert_eq!(report.births, 0);
        assert_eq!(report.deaths, 0);
        expected -= rate * dt * ((age - 3.0) / 300.0).powi(2);
        age += dt;

        let fish = world.fish_by_id(id).expect("fish alive");
        assert_eq!(fish.acceleration, 0.0);
        assert!(fish.health <= previous);
        previous = fish.health;
    }
    let health = world.fish_by_id(id).map(|fish| fish.health).expect("fish");
    assert!(
        (health - expected).abs() < 1e-12,
        "health {health} expected {expected}"
    );
    assert!(health < 1.0);
}

#[test]
fn fish_eats_food_within_pickup_radius() {
    let config = scenario_config();
    let radius = config.food_pickup_radius;
    let mut world = World::new(config).expect("world");
    let id = zero_brained(&mut world, Vec2::new(0.5, 0.5), 1.0);
    world.add_food(Vec2::new(0.5, 0.5 + radius / 2.0), 0.5);

    let report = world.step();
    assert_eq!(report.food_eaten, 1);
    assert!(world.food().is_empty());
    assert_eq!(world.fish_by_id(id).map(|fish| fish.health), Some(1.5));
}

#[test]
fn healthy_fish_reproduces_once_per_step() {
    let config = scenario_config();
    let cost = config.reproduction_cost;
    let mut world = World::new(config).expect("world");
    let parent = zero_brained(&mut world, Vec2::new(0.3, 0.7), 5.0);

    let report = world.step();
    assert_eq!(report.births, 1);
    assert_eq!(world.fish().len(), 2);
    let child = world
        .fish()
        .iter()
        .find(|fish| fish.id() != parent)
        .expect("child");
    assert_eq!(child.generation, Generation(1));
    assert_eq!(child.health, 1.0);
    assert_eq!(
        world.fish_by_id(parent).map(|fish| fish.health),
        Some(5.0 - cost)
    );
}

#[test]
fn workers_stay_balanced_as_fish_arrive() {
    let config = FishtankConfig {
        worker_count: Some(4),
        ..scenario_config()
    };
    let mut world = World::new(config).expect("world");
    for _ in 0..23 {
        world.spawn_random_fish().expect("spawn");
        let load = world.worker_load();
        let max = load.iter().copied().max().unwrap_or(0);
        let min = load.iter().copied().min().unwrap_or(0);
        assert!(max - min <= 1, "unbalanced {load:?}");
        assert_eq!(load.iter().sum::<usize>(), world.fish().len());
    }
}

#[test]
fn populated_world_keeps_invariants_over_many_steps() {
    let config = FishtankConfig {
        initial_fish_count: 15,
        initial_food_count: 200,
        food_regeneration: 0.2,
        ..scenario_config()
    };
    let mut world = World::new(config).expect("world");
    for _ in 0..150 {
        let report = world.step();
        assert!(report.timed_out_workers.is_empty());
        assert_eq!(report.missing_outputs, 0);
        for fish in world.fish() {
            assert!((0.0..1.0).contains(&fish.position.x));
            assert!((0.0..1.0).contains(&fish.position.y));
            assert!(fish.health > 0.0);
            assert_eq!(fish.genome().len(), world.config().network.genome_len());
        }
        assert!(world.food().iter().all(|item| !item.eaten));
        let mut ids: Vec<_> = world.fish().iter().map(|fish| fish.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), world.fish().len());
        assert_eq!(world.worker_load().iter().sum::<usize>(), world.fish().len());
    }
    assert_eq!(world.tick().0, 150);
}

#[test]
fn same_seed_reproduces_the_same_world() {
    let config = FishtankConfig {
        initial_fish_count: 12,
        initial_food_count: 80,
        food_regeneration: 0.2,
        ..scenario_config()
    };
    let mut a = World::new(config.clone()).expect("world");
    let mut b = World::new(config).expect("world");
    for _ in 0..40 {
        a.step();
        b.step();
    }
    assert_eq!(a.snapshot(), b.snapshot());
}
