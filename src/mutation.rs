//! Structural and parametric mutation.
//!
//! [`mutate`] takes ownership of a genome, which in practice is a fresh clone of
//! a parent. Each operator fires independently with its own probability from
//! [`NeatConfig`], then the repair pass runs unconditionally. The individual
//! operators are also available as `Genome` methods for callers that want to
//! drive topology changes directly.

use rand::Rng;

use crate::config::NeatConfig;
use crate::gene::{ConnectionGene, ConnectionKey, NodeGene, NodeKey, NodeRole};
use crate::genome::Genome;
use crate::innovation::{connection_key, resolve_key, split_node_key};
use crate::repair::repair;

/// Apply every mutation operator once, each gated by its probability, then repair.
#[must_use]
pub fn mutate<R: Rng>(mut genome: Genome, config: &NeatConfig, rng: &mut R) -> Genome {
    if rng.random::<f32>() < config.add_node_prob {
        genome.mutate_add_node(rng);
    }
    if rng.random::<f32>() < config.delete_node_prob {
        genome.mutate_delete_node(rng);
    }
    if rng.random::<f32>() < config.modify_bias_prob {
        genome.mutate_bias(config.bias_mutation_power, rng);
    }
    if rng.random::<f32>() < config.add_connection_prob {
        genome.mutate_add_connection(config.add_connection_attempts, rng);
    }
    if rng.random::<f32>() < config.delete_connection_prob {
        genome.mutate_delete_connection(rng);
    }
    if rng.random::<f32>() < config.modify_weight_prob {
        genome.mutate_weight(config.weight_mutation_power, rng);
    }

    repair(genome, config, rng)
}

/// Uniform draw from `[-power, power]`; zero when the power is zero.
fn perturbation<R: Rng>(power: f32, rng: &mut R) -> f32 {
    if power > 0.0 {
        rng.random_range(-power..=power)
    } else {
        0.0
    }
}

impl Genome {
    /// Split a connection with a new hidden node.
    ///
    /// The original connection is disabled, and two new connections are created:
    /// input -> new_node (weight 1.0) and new_node -> output (original weight).
    /// The new node lands on `max(L_in + 1, (L_in + L_out) / 2)`. If no integer
    /// layer is free between the endpoints, every node from `L_out` upward moves
    /// up one layer first.
    ///
    /// # Arguments
    ///
    /// * `key` - The connection to split
    ///
    /// # Returns
    ///
    /// The key of the new hidden node, or `None` if the connection doesn't exist
    /// or is disabled.
    pub fn split_connection(&mut self, key: ConnectionKey) -> Option<NodeKey> {
        let conn = self.connections.get(&key)?;
        if !conn.enabled {
            return None;
        }
        let (input_key, output_key, weight) = (conn.input_key, conn.output_key, conn.weight);
        let in_layer = self.nodes.get(&input_key)?.layer;
        let out_layer = self.nodes.get(&output_key)?.layer;

        let mut layer = (in_layer + 1).max((in_layer + out_layer) / 2);
        if layer >= out_layer {
            for node in self.nodes.values_mut() {
                if node.layer >= out_layer {
                    node.layer += 1;
                }
            }
            layer = out_layer;
        }

        if let Some(conn) = self.connections.get_mut(&key) {
            conn.enabled = false;
        }

        let node_key = resolve_key(split_node_key(key), |k| self.contains_node(k));
        self.insert_node(NodeGene::hidden(node_key, layer));

        let in_conn = resolve_key(connection_key(input_key, node_key), |k| {
            self.contains_connection(k)
        });
        self.insert_connection(ConnectionGene::new(in_conn, input_key, node_key, 1.0));

        let out_conn = resolve_key(connection_key(node_key, output_key), |k| {
            self.contains_connection(k)
        });
        self.insert_connection(ConnectionGene::new(out_conn, node_key, output_key, weight));

        log::trace!("split connection {key} with node {node_key} on layer {layer}");
        Some(node_key)
    }

    /// Remove a hidden node and every connection touching it.
    ///
    /// Returns `false` (and changes nothing) for input, output or unknown nodes.
    pub fn remove_hidden_node(&mut self, key: NodeKey) -> bool {
        if self.node(key).map(|n| n.role) != Some(NodeRole::Hidden) {
            return false;
        }
        self.remove_node(key);
        log::trace!("removed hidden node {key}");
        true
    }

    /// Whether a new connection from `source` to `target` would be legal.
    #[must_use]
    pub fn can_connect(&self, source: NodeKey, target: NodeKey) -> bool {
        let (Some(src), Some(tgt)) = (self.node(source), self.node(target)) else {
            return false;
        };
        src.layer < tgt.layer
            && src.role != NodeRole::Output
            && tgt.role != NodeRole::Input
            && self.connection_between(source, target).is_none()
    }

    /// Add an enabled connection with a uniform random weight in `[-1, 1]`.
    ///
    /// # Arguments
    ///
    /// * `source` - Key of the source node (not an output)
    /// * `target` - Key of the target node (not an input, on a higher layer)
    /// * `rng` - Source of the initial weight
    ///
    /// # Returns
    ///
    /// The new connection's key, or `None` if the pair fails
    /// [`can_connect`](Self::can_connect). No randomness is drawn in that case.
    pub fn add_connection<R: Rng>(
        &mut self,
        source: NodeKey,
        target: NodeKey,
        rng: &mut R,
    ) -> Option<ConnectionKey> {
        if !self.can_connect(source, target) {
            return None;
        }
        let key = resolve_key(connection_key(source, target), |k| {
            self.contains_connection(k)
        });
        let weight = rng.random_range(-1.0..=1.0);
        self.insert_connection(ConnectionGene::new(key, source, target, weight));
        log::trace!("added connection {key}: {source} -> {target}");
        Some(key)
    }

    /// Connections that may be deleted: neither leaving an input node nor
    /// entering an output node, so no required I/O path gets severed.
    #[must_use]
    pub fn deletable_connections(&self) -> Vec<ConnectionKey> {
        let role_of = |key| self.node(key).map(|n| n.role);
        self.connections()
            .filter(|c| {
                role_of(c.input_key) != Some(NodeRole::Input)
                    && role_of(c.output_key) != Some(NodeRole::Output)
            })
            .map(|c| c.key)
            .collect()
    }

    /// Add `delta` to a node's bias. Returns `false` for unknown nodes.
    pub fn perturb_bias(&mut self, key: NodeKey, delta: f32) -> bool {
        match self.node_mut(key) {
            Some(node) => {
                node.bias += delta;
                true
            }
            None => false,
        }
    }

    /// Add `delta` to a connection's weight and clamp it to `[-1, 1]`.
    /// Returns `false` for unknown connections.
    pub fn perturb_weight(&mut self, key: ConnectionKey, delta: f32) -> bool {
        match self.connection_mut(key) {
            Some(conn) => {
                conn.weight = (conn.weight + delta).clamp(-1.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Split a random enabled connection.
    fn mutate_add_node<R: Rng>(&mut self, rng: &mut R) {
        let enabled: Vec<ConnectionKey> = self
            .connections()
            .filter(|c| c.enabled)
            .map(|c| c.key)
            .collect();
        if enabled.is_empty() {
            return;
        }
        let key = enabled[rng.random_range(0..enabled.len())];
        self.split_connection(key);
    }

    /// Delete a random hidden node.
    fn mutate_delete_node<R: Rng>(&mut self, rng: &mut R) {
        let hidden = self.hidden_keys();
        if hidden.is_empty() {
            return;
        }
        let key = hidden[rng.random_range(0..hidden.len())];
        self.remove_hidden_node(key);
    }

    /// Perturb the bias of a random node.
    fn mutate_bias<R: Rng>(&mut self, power: f32, rng: &mut R) {
        if self.nodes.is_empty() {
            return;
        }
        let index = rng.random_range(0..self.nodes.len());
        let key = self.nodes.keys().nth(index).copied();
        if let Some(key) = key {
            let delta = perturbation(power, rng);
            self.perturb_bias(key, delta);
        }
    }

    /// Try up to `attempts` random pairs for a new connection.
    fn mutate_add_connection<R: Rng>(&mut self, attempts: usize, rng: &mut R) {
        let sources: Vec<NodeKey> = self
            .nodes()
            .filter(|n| n.role != NodeRole::Output)
            .map(|n| n.key)
            .collect();
        let targets: Vec<NodeKey> = self
            .nodes()
            .filter(|n| n.role != NodeRole::Input)
            .map(|n| n.key)
            .collect();
        if sources.is_empty() || targets.is_empty() {
            return;
        }

        for _ in 0..attempts {
            let source = sources[rng.random_range(0..sources.len())];
            let target = targets[rng.random_range(0..targets.len())];
            if self.add_connection(source, target, rng).is_some() {
                return;
            }
        }
    }

    /// Delete a random unprotected connection, keeping at least one.
    fn mutate_delete_connection<R: Rng>(&mut self, rng: &mut R) {
        if self.connection_count() < 2 {
            return;
        }
        let candidates = self.deletable_connections();
        if candidates.is_empty() {
            return;
        }
        let key = candidates[rng.random_range(0..candidates.len())];
        self.remove_connection(key);
        log::trace!("deleted connection {key}");
    }

    /// Perturb the weight of a random connection.
    fn mutate_weight<R: Rng>(&mut self, power: f32, rng: &mut R) {
        if self.connections.is_empty() {
            return;
        }
        let index = rng.random_range(0..self.connections.len());
        let key = self.connections.keys().nth(index).copied();
        if let Some(key) = key {
            let delta = perturbation(power, rng);
            self.perturb_weight(key, delta);
        }
    }
}
