//! Integration tests for symbios-brain.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use symbios_brain::{
    connection_key, crossover, mutate, persist, repair, reproduce, split_node_key,
    ConnectionGene, Genome, NeatConfig, Network, NetworkError, NodeGene, NodeRole, Population,
};

fn busy_config(num_inputs: usize, num_outputs: usize) -> NeatConfig {
    NeatConfig {
        add_node_prob: 0.4,
        delete_node_prob: 0.1,
        modify_bias_prob: 0.5,
        add_connection_prob: 0.5,
        delete_connection_prob: 0.2,
        modify_weight_prob: 0.8,
        ..NeatConfig::new(num_inputs, num_outputs)
    }
}

#[test]
fn test_full_evolution_cycle() {
    let config = busy_config(4, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut population = Population::new(config).unwrap();

    let mut living: Vec<_> = (0..10).map(|_| population.spawn(&mut rng).unwrap()).collect();

    for tick in 0..30 {
        let observation = [0.1 * tick as f32, -0.5, 0.25, 1.0];
        for &id in &living {
            let actions = population.think(id, &observation).unwrap();
            assert_eq!(actions.len(), 2);
            assert!(actions.iter().all(|a| a.is_finite() && (-1.0..=1.0).contains(a)));
        }

        // Two random agents breed, the oldest one dies.
        let a = living[rng.random_range(0..living.len())];
        let b = living[rng.random_range(0..living.len())];
        let child = population.breed(a, b, &mut rng).unwrap();
        living.push(child);
        let dead = living.remove(0);
        assert!(population.remove(dead).is_some());
    }

    assert_eq!(population.len(), 10);
    for (_, agent) in population.iter() {
        assert!(agent.genome.validate(population.config()).is_ok());
    }
}

#[test]
fn test_single_connection_scenario() {
    let genome = Genome::from_genes(
        [NodeGene::input(0), NodeGene::output(1, 1).with_bias(0.5)],
        [ConnectionGene::new(0, 0, 1, 1.0)],
    )
    .unwrap();
    let network = Network::build(&genome).unwrap();

    assert!((network.activate(&[0.0]).unwrap()[0] - 0.5f32.tanh()).abs() < 1e-6);
    assert!((network.activate(&[1.0]).unwrap()[0] - 1.5f32.tanh()).abs() < 1e-6);
}

#[test]
fn test_add_node_scenario_keeps_behavior_valid() {
    let config = NeatConfig::new(1, 1);
    let mut genome = Genome::from_genes(
        [NodeGene::input(0), NodeGene::output(1, 1).with_bias(0.5)],
        [ConnectionGene::new(0, 0, 1, 1.0)],
    )
    .unwrap();

    let hidden = genome.split_connection(0).unwrap();
    assert_eq!(genome.node_count(), 3);
    assert_eq!(genome.connection_count(), 3);
    assert!(!genome.connection(0).unwrap().enabled);
    assert!(genome.validate(&config).is_ok());

    let hidden_layer = genome.node(hidden).unwrap().layer;
    let output_layer = genome.node(1).unwrap().layer;
    assert!(0 < hidden_layer && hidden_layer < output_layer);

    // input -> tanh(x) -> tanh(tanh(x) + 0.5)
    let network = Network::build(&genome).unwrap();
    let out = network.activate(&[0.3]).unwrap()[0];
    assert!((out - (0.3f32.tanh() + 0.5).tanh()).abs() < 1e-6);
}

#[test]
fn test_delete_connection_scenario() {
    // Only input->output connections: nothing is deletable.
    let config = NeatConfig {
        delete_connection_prob: 1.0,
        ..NeatConfig::frozen(3, 2)
    };
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let genome = Genome::initial(&config, &mut rng);
    assert_eq!(genome.connection_count(), 6);

    let mutated = mutate(genome.clone(), &config, &mut rng);
    assert_eq!(mutated, genome);
}

#[test]
fn test_structural_innovation_consistency() {
    let config = NeatConfig::new(2, 1);
    let mut rng1 = ChaCha8Rng::seed_from_u64(100);
    let mut rng2 = ChaCha8Rng::seed_from_u64(200);

    let mut genome1 = Genome::initial(&config, &mut rng1);
    let mut genome2 = Genome::initial(&config, &mut rng2);

    // Same structure, same keys, different weights.
    let keys1: Vec<_> = genome1.connections().map(|c| c.key).collect();
    let keys2: Vec<_> = genome2.connections().map(|c| c.key).collect();
    assert_eq!(keys1, keys2);

    // The same split in two lineages yields the same node key.
    let split = connection_key(0, 2);
    let node1 = genome1.split_connection(split).unwrap();
    let node2 = genome2.split_connection(split).unwrap();
    assert_eq!(node1, node2);
    assert_eq!(node1, split_node_key(split));
    assert_eq!(genome1.hidden_keys(), genome2.hidden_keys());

    // Crossover sees the new genes as matching, not disjoint.
    let child = crossover(&genome1, &genome2, &config, &mut rng1);
    assert_eq!(child.node_count(), genome1.node_count());
    assert_eq!(child.connection_count(), genome1.connection_count());
}

#[test]
fn test_feed_forward_after_every_operation() {
    let config = busy_config(3, 3);
    for seed in 0..25 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut a = Genome::initial(&config, &mut rng);
        let mut b = Genome::initial(&config, &mut rng);

        for _ in 0..15 {
            a = mutate(a, &config, &mut rng);
            b = mutate(b, &config, &mut rng);
            let child = repair(crossover(&a, &b, &config, &mut rng), &config, &mut rng);

            for genome in [&a, &b, &child] {
                for conn in genome.connections() {
                    let from = genome.node(conn.input_key).unwrap().layer;
                    let to = genome.node(conn.output_key).unwrap().layer;
                    assert!(from < to, "seed {seed}: connection {} is not forward", conn.key);
                }
                let max_layer = genome.max_layer();
                for node in genome.nodes() {
                    match node.role {
                        NodeRole::Input => assert_eq!(node.layer, 0),
                        NodeRole::Output => assert_eq!(node.layer, max_layer),
                        NodeRole::Hidden => assert!(node.layer > 0 && node.layer < max_layer),
                    }
                }
            }
            b = child;
        }
    }
}

#[test]
fn test_shape_contract() {
    let config = busy_config(5, 3);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut genome = Genome::initial(&config, &mut rng);

    for _ in 0..40 {
        genome = mutate(genome, &config, &mut rng);
        let network = Network::build(&genome).unwrap();
        assert_eq!(network.num_inputs(), 5);
        assert_eq!(network.num_outputs(), 3);
        assert_eq!(network.activate(&[0.0; 5]).unwrap().len(), 3);
        assert_eq!(
            network.activate(&[0.0; 4]),
            Err(NetworkError::InvalidInputShape {
                expected: 5,
                actual: 4
            })
        );
    }
}

#[test]
fn test_activation_is_deterministic() {
    let config = busy_config(3, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut genome = Genome::initial(&config, &mut rng);
    for _ in 0..20 {
        genome = mutate(genome, &config, &mut rng);
    }

    let first = Network::build(&genome).unwrap();
    let second = Network::build(&genome.clone()).unwrap();
    let inputs = [0.7, -0.2, 0.05];
    let out = first.activate(&inputs).unwrap();
    assert_eq!(out, first.activate(&inputs).unwrap());
    assert_eq!(out, second.activate(&inputs).unwrap());
}

#[test]
fn test_serialization_preserves_behavior() {
    let config = busy_config(3, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(999);
    let mut genome = Genome::initial(&config, &mut rng);
    for _ in 0..25 {
        genome = mutate(genome, &config, &mut rng);
    }

    let json = persist::to_json(&genome).unwrap();
    let restored = persist::from_json(&json, &config).unwrap();
    assert_eq!(restored, genome);

    let original = Network::build(&genome).unwrap();
    let loaded = Network::build(&restored).unwrap();
    for inputs in [[0.0, 0.0, 0.0], [1.0, -1.0, 0.5], [-0.3, 0.8, 0.2]] {
        assert_eq!(
            original.activate(&inputs).unwrap(),
            loaded.activate(&inputs).unwrap()
        );
    }
}

#[test]
fn test_save_and_load_file() {
    let config = NeatConfig::new(2, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let genome = Genome::initial(&config, &mut rng);

    let path = std::env::temp_dir().join(format!(
        "symbios-brain-integration-{}.json",
        std::process::id()
    ));
    persist::save(&genome, &path).unwrap();
    let loaded = persist::load(&path, &config).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, genome);

    let mut population = Population::new(config).unwrap();
    let id = population.insert(loaded).unwrap();
    assert_eq!(population.think(id, &[0.5, 0.5]).unwrap().len(), 2);
}

#[test]
fn test_parents_survive_reproduction() {
    let config = busy_config(2, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let a = Genome::initial(&config, &mut rng);
    let b = Genome::initial(&config, &mut rng);
    let network_a = Network::build(&a).unwrap();
    let before = network_a.activate(&[0.4, -0.4]).unwrap();

    for _ in 0..10 {
        let child = reproduce(&a, &b, &config, &mut rng).unwrap();
        assert!(child.genome.validate(&config).is_ok());
    }

    assert_eq!(network_a.activate(&[0.4, -0.4]).unwrap(), before);
    assert_eq!(Network::build(&a).unwrap().activate(&[0.4, -0.4]).unwrap(), before);
}
