//! Headless foraging world.
//!
//! Agents wander a square arena looking for food. Each tick an agent observes the
//! direction to the nearest food item and its own energy, and its brain returns a
//! step. Eating restores energy, well-fed agents breed with a random partner and
//! agents that run out of energy die, so brains that steer towards food spread
//! through the population.
//!
//! Run with: `cargo run --example foraging [config.toml]`
//! Set `RUST_LOG=debug` to see births and structural mutations.

use std::path::Path;
use std::process;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use symbios_brain::{persist, AgentId, NeatConfig, Population};

const ARENA: f32 = 100.0;
const FOOD_COUNT: usize = 40;
const START_AGENTS: usize = 30;
const MAX_AGENTS: usize = 120;
const TICKS: usize = 3_000;
const SPEED: f32 = 1.5;
const EAT_RADIUS: f32 = 2.0;
const START_ENERGY: f32 = 60.0;
const BREED_ENERGY: f32 = 120.0;
const FOOD_ENERGY: f32 = 25.0;

#[derive(Debug, Clone, Copy)]
struct Body {
    x: f32,
    y: f32,
    energy: f32,
}

fn random_point(rng: &mut ChaCha8Rng) -> (f32, f32) {
    (rng.random_range(0.0..ARENA), rng.random_range(0.0..ARENA))
}

/// Observation: unit vector to the nearest food, its distance and the agent's energy.
fn observe(body: &Body, food: &[(f32, f32)]) -> [f32; 4] {
    let nearest = food.iter().min_by(|a, b| {
        let da = (a.0 - body.x).hypot(a.1 - body.y);
        let db = (b.0 - body.x).hypot(b.1 - body.y);
        da.total_cmp(&db)
    });
    let Some(&(fx, fy)) = nearest else {
        return [0.0, 0.0, 1.0, body.energy / BREED_ENERGY];
    };
    let (dx, dy) = (fx - body.x, fy - body.y);
    let dist = dx.hypot(dy).max(1e-3);
    [dx / dist, dy / dist, dist / ARENA, body.energy / BREED_ENERGY]
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match NeatConfig::load(Path::new(&path)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Failed to load configuration from {path}: {e}");
                process::exit(1);
            }
        },
        None => NeatConfig {
            add_node_prob: 0.15,
            add_connection_prob: 0.3,
            weight_mutation_power: 0.3,
            ..NeatConfig::new(4, 2)
        },
    };
    if config.num_inputs != 4 || config.num_outputs != 2 {
        log::error!(
            "The foraging world needs 4 inputs and 2 outputs, config has {} and {}",
            config.num_inputs,
            config.num_outputs
        );
        process::exit(1);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut population = match Population::new(config) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    let mut bodies: Vec<(AgentId, Body)> = Vec::new();
    for _ in 0..START_AGENTS {
        match population.spawn(&mut rng) {
            Ok(id) => {
                let (x, y) = random_point(&mut rng);
                bodies.push((id, Body { x, y, energy: START_ENERGY }));
            }
            Err(e) => log::error!("Failed to spawn founder: {e}"),
        }
    }
    let mut food: Vec<(f32, f32)> = (0..FOOD_COUNT).map(|_| random_point(&mut rng)).collect();
    let mut births = 0usize;
    let mut deaths = 0usize;

    log::info!("World ready: {} agents, {} food", bodies.len(), food.len());

    for tick in 0..TICKS {
        let mut parents = Vec::new();

        for (id, body) in &mut bodies {
            let observation = observe(body, &food);
            let actions = match population.think(*id, &observation) {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("Agent {id:?} could not think: {e}");
                    continue;
                }
            };
            body.x = (body.x + actions[0] * SPEED).clamp(0.0, ARENA);
            body.y = (body.y + actions[1] * SPEED).clamp(0.0, ARENA);
            body.energy -= 0.5 + 0.25 * actions[0].hypot(actions[1]);

            if let Some(i) = food
                .iter()
                .position(|&(fx, fy)| (fx - body.x).hypot(fy - body.y) < EAT_RADIUS)
            {
                food.swap_remove(i);
                body.energy += FOOD_ENERGY;
            }
            if body.energy >= BREED_ENERGY {
                parents.push(*id);
            }
        }

        let before = bodies.len();
        bodies.retain(|(id, body)| {
            let alive = body.energy > 0.0;
            if !alive {
                population.remove(*id);
            }
            alive
        });
        deaths += before - bodies.len();

        for parent in parents {
            if bodies.len() >= MAX_AGENTS {
                break;
            }
            let Some(index) = bodies.iter().position(|(id, _)| *id == parent) else {
                continue;
            };
            let partner = bodies[rng.random_range(0..bodies.len())].0;
            match population.breed(parent, partner, &mut rng) {
                Ok(child) => {
                    let body = &mut bodies[index].1;
                    body.energy -= START_ENERGY;
                    let spawn = Body {
                        x: body.x,
                        y: body.y,
                        energy: START_ENERGY,
                    };
                    bodies.push((child, spawn));
                    births += 1;
                }
                Err(e) => log::error!("Breeding failed: {e}"),
            }
        }

        while food.len() < FOOD_COUNT && rng.random_bool(0.5) {
            food.push(random_point(&mut rng));
        }

        if bodies.is_empty() {
            log::info!("Tick {tick}: population died out, reseeding");
            for _ in 0..START_AGENTS {
                if let Ok(id) = population.spawn(&mut rng) {
                    let (x, y) = random_point(&mut rng);
                    bodies.push((id, Body { x, y, energy: START_ENERGY }));
                }
            }
        }

        if tick % 500 == 0 {
            let oldest = population.iter().map(|(_, a)| a.generation).max().unwrap_or(0);
            let hidden: usize = population.iter().map(|(_, a)| a.genome.hidden_keys().len()).sum();
            log::info!(
                "Tick {tick}: {} agents, {births} births, {deaths} deaths, generation {oldest}, {:.2} hidden nodes per brain",
                population.len(),
                hidden as f32 / population.len().max(1) as f32
            );
        }
    }

    let champion = population.iter().max_by_key(|(_, a)| a.generation);
    if let Some((id, agent)) = champion {
        log::info!(
            "Deepest lineage: agent {id:?}, generation {}, {} nodes, {} enabled connections, {} layers",
            agent.generation,
            agent.genome.node_count(),
            agent.genome.num_enabled_connections(),
            agent.network.num_layers()
        );
        match persist::to_json(&agent.genome) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Failed to serialize champion: {e}"),
        }
    }
}
