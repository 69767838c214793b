//! Crossover: merge two parent genomes into one child genome.
//!
//! Genes are aligned by key. A key present in both parents is inherited from one
//! of them with an independent fair coin flip per gene; a key present in only one
//! parent is inherited from that parent. Parents are borrowed and never modified.
//!
//! The raw child can still violate invariants (layers come from two different
//! layouts, a required node may be missing from both parents), so callers run it
//! through [`mutate`](crate::mutate) or [`repair`](crate::repair) before building
//! a network.

use std::collections::BTreeSet;

use rand::Rng;

use crate::config::NeatConfig;
use crate::gene::{NodeGene, NodeRole};
use crate::genome::Genome;

/// Merge `parent_a` and `parent_b` into a new, unrepaired child genome.
#[must_use]
pub fn crossover<R: Rng>(
    parent_a: &Genome,
    parent_b: &Genome,
    config: &NeatConfig,
    rng: &mut R,
) -> Genome {
    let mut child = Genome::new();

    let node_keys: BTreeSet<_> = parent_a
        .nodes
        .keys()
        .chain(parent_b.nodes.keys())
        .copied()
        .collect();
    for key in node_keys {
        let gene = match (parent_a.nodes.get(&key), parent_b.nodes.get(&key)) {
            (Some(a), Some(b)) => pick(a, b, rng),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => continue,
        };
        child.insert_node(gene.clone());
    }

    // Synthesize required nodes neither parent carried.
    for key in config.input_keys() {
        if !child.contains_node(key) {
            log::debug!("crossover: input {key} missing from both parents");
            child.insert_node(NodeGene::input(key));
        }
    }
    let output_layer = child
        .nodes()
        .filter(|n| n.role == NodeRole::Output)
        .map(|n| n.layer)
        .max()
        .unwrap_or(config.output_layer);
    for key in config.output_keys() {
        if !child.contains_node(key) {
            log::debug!("crossover: output {key} missing from both parents");
            child.insert_node(NodeGene::output(key, output_layer));
        }
    }

    let conn_keys: BTreeSet<_> = parent_a
        .connections
        .keys()
        .chain(parent_b.connections.keys())
        .copied()
        .collect();
    let mut dropped = 0usize;
    for key in conn_keys {
        let gene = match (
            parent_a.connections.get(&key),
            parent_b.connections.get(&key),
        ) {
            (Some(a), Some(b)) => pick(a, b, rng),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => continue,
        };
        if child.contains_node(gene.input_key) && child.contains_node(gene.output_key) {
            child.insert_connection(gene.clone());
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        log::trace!("crossover: dropped {dropped} connections with missing endpoints");
    }

    child
}

fn pick<'a, T, R: Rng>(a: &'a T, b: &'a T, rng: &mut R) -> &'a T {
    if rng.random_bool(0.5) {
        a
    } else {
        b
    }
}
