//! Invariant repair pass.
//!
//! Crossover can drop a required node that neither parent carried, and mixes
//! layers from two genomes that were laid out independently. Mutation can leave an
//! input or output without a live connection. The simulation needs a fixed-shape
//! observation and action vector at all times, so such genomes are repaired, not
//! rejected.
//!
//! After [`repair`] a genome satisfies [`Genome::validate`]:
//! - every required input key is an `Input` node on layer 0
//! - every required output key is an `Output` node on the maximum layer
//! - hidden nodes sit strictly between those layers
//! - every connection has both endpoints and runs to a strictly higher layer
//! - every required input has an enabled outgoing connection and every required
//!   output an enabled incoming one
//!
//! Repairing an already valid genome changes nothing and draws no randomness.

use rand::Rng;

use crate::config::NeatConfig;
use crate::gene::{ConnectionGene, NodeGene, NodeKey, NodeRole};
use crate::genome::Genome;
use crate::innovation::{connection_key, resolve_key};

/// Restore the structural invariants of `genome`.
#[must_use]
pub fn repair<R: Rng>(mut genome: Genome, config: &NeatConfig, rng: &mut R) -> Genome {
    let required_inputs = config.input_keys();
    let required_outputs = config.output_keys();

    // Input/output nodes outside the required ranges would change the vector shapes.
    let strays: Vec<NodeKey> = genome
        .nodes()
        .filter(|n| match n.role {
            NodeRole::Input => !required_inputs.contains(&n.key),
            NodeRole::Output => !required_outputs.contains(&n.key),
            NodeRole::Hidden => false,
        })
        .map(|n| n.key)
        .collect();
    for key in strays {
        log::debug!("repair: removing stray I/O node {key}");
        genome.remove_node(key);
    }

    for key in required_inputs.clone() {
        ensure_role(&mut genome, key, NodeRole::Input, || NodeGene::input(key));
        if let Some(node) = genome.node_mut(key) {
            node.layer = 0;
        }
    }

    for node in genome.nodes.values_mut() {
        if node.role == NodeRole::Hidden && node.layer == 0 {
            node.layer = 1;
        }
    }

    let output_layer = output_layer(&genome, config);
    for key in required_outputs.clone() {
        ensure_role(&mut genome, key, NodeRole::Output, || {
            NodeGene::output(key, output_layer)
        });
        if let Some(node) = genome.node_mut(key) {
            node.layer = output_layer;
        }
    }

    let before = genome.connection_count();
    let nodes = &genome.nodes;
    genome.connections.retain(|_, c| {
        match (nodes.get(&c.input_key), nodes.get(&c.output_key)) {
            (Some(input), Some(output)) => input.layer < output.layer,
            _ => false,
        }
    });
    let removed = before - genome.connection_count();
    if removed > 0 {
        log::debug!("repair: removed {removed} dangling or backward connections");
    }

    let first_output = required_outputs.start;
    for key in required_inputs.clone() {
        let wired = genome.connections().any(|c| c.enabled && c.input_key == key);
        if !wired {
            wire(&mut genome, key, first_output, rng);
        }
    }

    let first_input = required_inputs.start;
    for key in required_outputs {
        let wired = genome
            .connections()
            .any(|c| c.enabled && c.output_key == key);
        if !wired {
            wire(&mut genome, first_input, key, rng);
        }
    }

    genome
}

/// Layer all output nodes are placed on.
///
/// Existing outputs keep their (highest) layer so a valid genome stays untouched;
/// a genome without any output starts from the configured layer. Either way the
/// layer is raised above every hidden node.
fn output_layer(genome: &Genome, config: &NeatConfig) -> u32 {
    let existing = genome
        .nodes()
        .filter(|n| n.role == NodeRole::Output)
        .map(|n| n.layer)
        .max()
        .unwrap_or(config.output_layer);
    let above_hidden = genome
        .nodes()
        .filter(|n| n.role == NodeRole::Hidden)
        .map(|n| n.layer + 1)
        .max()
        .unwrap_or(1);
    existing.max(above_hidden).max(1)
}

fn ensure_role(
    genome: &mut Genome,
    key: NodeKey,
    role: NodeRole,
    fresh: impl FnOnce() -> NodeGene,
) {
    match genome.node(key) {
        Some(node) if node.role == role => {}
        Some(node) => {
            log::debug!(
                "repair: node {key} is {:?}, rebuilding it as {role:?}",
                node.role
            );
            genome.remove_node(key);
            genome.insert_node(fresh());
        }
        None => {
            log::debug!("repair: required {role:?} node {key} missing, recreating it");
            genome.insert_node(fresh());
        }
    }
}

/// Make sure an enabled connection runs from `input_key` to `output_key`,
/// re-enabling a dormant one before creating a new gene.
fn wire<R: Rng>(genome: &mut Genome, input_key: NodeKey, output_key: NodeKey, rng: &mut R) {
    let dormant = genome
        .connection_between(input_key, output_key)
        .map(|c| c.key);
    if let Some(key) = dormant {
        if let Some(conn) = genome.connection_mut(key) {
            conn.enabled = true;
        }
        return;
    }

    let key = resolve_key(connection_key(input_key, output_key), |k| {
        genome.contains_connection(k)
    });
    let weight = rng.random_range(-1.0..=1.0);
    genome.insert_connection(ConnectionGene::new(key, input_key, output_key, weight));
    log::trace!("repair: wired {input_key} -> {output_key} with weight {weight:.3}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_repair_recreates_missing_nodes() {
        let config = NeatConfig::new(2, 2);
        let mut rng = test_rng();
        let genome = repair(Genome::new(), &config, &mut rng);

        assert_eq!(genome.input_keys(), vec![0, 1]);
        assert_eq!(genome.output_keys(), vec![2, 3]);
        assert!(genome.validate(&config).is_ok());
        for key in 0..4 {
            assert!(genome.node(key).unwrap().bias.abs() < 1e-6);
        }
    }

    #[test]
    fn test_repair_replaces_wrong_role() {
        let config = NeatConfig::new(1, 1);
        let mut rng = test_rng();
        let genome = Genome::from_genes(
            [NodeGene::hidden(0, 1), NodeGene::output(1, 2)],
            [ConnectionGene::new(9, 0, 1, 0.5)],
        )
        .unwrap();

        let genome = repair(genome, &config, &mut rng);
        assert_eq!(genome.node(0).unwrap().role, NodeRole::Input);
        // The old hidden node's connection went with it; a fresh one was wired.
        assert!(!genome.contains_connection(9));
        assert!(genome.validate(&config).is_ok());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let config = NeatConfig::new(3, 2);
        let mut rng = test_rng();
        let genome = Genome::from_genes(
            [NodeGene::input(0), NodeGene::hidden(40_000, 0)],
            [ConnectionGene::new(1, 0, 40_000, 0.2)],
        )
        .unwrap();

        let once = repair(genome, &config, &mut rng);
        let twice = repair(once.clone(), &config, &mut rng);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_repair_is_idempotent_on_crossover_children() {
        let config = NeatConfig {
            add_node_prob: 0.5,
            delete_node_prob: 0.2,
            add_connection_prob: 0.5,
            delete_connection_prob: 0.3,
            ..NeatConfig::new(3, 2)
        };
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut a = Genome::initial(&config, &mut rng);
            let mut b = Genome::initial(&config, &mut rng);
            for _ in 0..8 {
                a = crate::mutation::mutate(a, &config, &mut rng);
                b = crate::mutation::mutate(b, &config, &mut rng);
            }
            if seed % 3 == 0 {
                b.remove_node(1);
            }

            let raw = crate::crossover::crossover(&a, &b, &config, &mut rng);
            let once = repair(raw, &config, &mut rng);
            let twice = repair(once.clone(), &config, &mut rng);
            assert_eq!(once, twice, "seed {seed}");
            assert_eq!(once.validate(&config), Ok(()), "seed {seed}");
        }
    }

    #[test]
    fn test_repair_leaves_valid_genome_alone() {
        let config = NeatConfig::new(2, 1);
        let mut rng = test_rng();
        let genome = Genome::initial(&config, &mut rng);
        assert!(genome.validate(&config).is_ok());

        // A fresh rng: a valid genome must not consume any draws.
        let mut other_rng = ChaCha8Rng::seed_from_u64(7);
        let repaired = repair(genome.clone(), &config, &mut other_rng);
        assert_eq!(repaired, genome);
    }

    #[test]
    fn test_repair_lifts_outputs_above_hidden_nodes() {
        // Outputs from one parent on layer 2, a hidden node from the other on 3.
        let config = NeatConfig::new(1, 1);
        let mut rng = test_rng();
        let genome = Genome::from_genes(
            [
                NodeGene::input(0),
                NodeGene::hidden(70_000, 3),
                NodeGene::output(1, 2),
            ],
            [
                ConnectionGene::new(100, 0, 70_000, 0.5),
                ConnectionGene::new(101, 70_000, 1, 0.5),
            ],
        )
        .unwrap();

        let genome = repair(genome, &config, &mut rng);
        assert_eq!(genome.node(1).unwrap().layer, 4);
        assert!(genome.contains_connection(101));
        assert!(genome.validate(&config).is_ok());
    }

    #[test]
    fn test_repair_drops_invalid_connections() {
        let config = NeatConfig::new(1, 1);
        let mut rng = test_rng();
        let genome = Genome::from_genes(
            [NodeGene::input(0), NodeGene::output(1, 1)],
            [
                ConnectionGene::new(100, 0, 1, 0.5),
                ConnectionGene::new(101, 1, 0, 0.5),
                ConnectionGene::new(102, 0, 99, 0.5),
            ],
        )
        .unwrap();

        let genome = repair(genome, &config, &mut rng);
        assert_eq!(genome.connection_count(), 1);
        assert!(genome.contains_connection(100));
    }

    #[test]
    fn test_repair_removes_stray_io_nodes() {
        let config = NeatConfig::new(1, 1);
        let mut rng = test_rng();
        let genome = Genome::from_genes(
            [
                NodeGene::input(0),
                NodeGene::output(1, 1),
                NodeGene::output(5, 1),
            ],
            [
                ConnectionGene::new(100, 0, 1, 0.5),
                ConnectionGene::new(101, 0, 5, 0.5),
            ],
        )
        .unwrap();

        let genome = repair(genome, &config, &mut rng);
        assert!(!genome.contains_node(5));
        assert_eq!(genome.output_keys(), vec![1]);
        assert!(genome.validate(&config).is_ok());
    }

    #[test]
    fn test_repair_reenables_dormant_connection() {
        let config = NeatConfig::new(1, 1);
        let mut rng = test_rng();
        let mut conn = ConnectionGene::new(100, 0, 1, 0.7);
        conn.enabled = false;
        let genome =
            Genome::from_genes([NodeGene::input(0), NodeGene::output(1, 1)], [conn]).unwrap();

        let genome = repair(genome, &config, &mut rng);
        assert_eq!(genome.connection_count(), 1);
        let conn = genome.connection(100).unwrap();
        assert!(conn.enabled);
        assert!((conn.weight - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_unrepaired_genome_reports_missing_node() {
        let config = NeatConfig::new(2, 1);
        let genome = Genome::from_genes([NodeGene::input(0)], []).unwrap();
        assert_eq!(
            genome.validate(&config),
            Err(GenomeError::MissingRequiredNode { key: 1 })
        );
    }
}
