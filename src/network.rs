//! Executable, layer-ordered form of a genome.
//!
//! [`Network::build`] compiles a [`Genome`] into flat arrays: node slots sorted by
//! `(layer, key)`, plus incoming connections in Compressed Sparse Row (CSR) form.
//! [`Network::activate`] then walks the layers in ascending order. Every source
//! of a node lives on a strictly lower layer, so one pass over the slots is a
//! complete forward evaluation. There is no recursion over the connection graph.
//!
//! ## Determinism
//!
//! Incoming connections are summed in ascending connection-key order, so
//! equivalent genomes produce bit-identical outputs regardless of how they were
//! assembled. Floating-point addition is not associative.

use std::collections::HashMap;
use std::ops::Range;

use thiserror::Error;

use crate::gene::{NodeKey, NodeRole};
use crate::genome::{Genome, GenomeError};

/// Errors raised while building or activating a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// The observation vector does not match the number of input nodes.
    ///
    /// Recoverable: the caller can substitute a zero action vector.
    #[error("expected {expected} input values, got {actual}")]
    InvalidInputShape {
        /// Number of input nodes.
        expected: usize,
        /// Length of the supplied vector.
        actual: usize,
    },
    /// The output buffer does not match the number of output nodes.
    #[error("expected an output buffer of {expected} values, got {actual}")]
    InvalidOutputShape {
        /// Number of output nodes.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
    /// The genome is not a valid layered feed-forward graph.
    ///
    /// A repaired genome never triggers this; seeing it means a logic error
    /// upstream, not a condition to retry.
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] GenomeError),
}

/// A compiled, evaluation-ready brain.
///
/// Immutable after [`build`](Self::build); activation borrows it shared, so one
/// network can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Network {
    /// Node key per slot, slots sorted by `(layer, key)`.
    node_keys: Vec<NodeKey>,
    /// Bias per slot.
    biases: Vec<f32>,
    /// Slot ranges of each non-input layer, ascending by layer.
    layers: Vec<Range<usize>>,
    // For slot i, incoming connections are at [csr_offsets[i]..csr_offsets[i+1]).
    /// CSR: source slot of every enabled connection.
    csr_sources: Vec<usize>,
    /// CSR: weights, parallel to `csr_sources`.
    csr_weights: Vec<f32>,
    /// CSR: offsets into the flat arrays (len = slot count + 1).
    csr_offsets: Vec<usize>,
    /// Input slots in ascending input-key order.
    input_slots: Vec<usize>,
    /// Output slots in ascending output-key order.
    output_slots: Vec<usize>,
}

impl Network {
    /// Compile a genome.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidTopology`] if any connection (enabled or not)
    /// is dangling or does not run to a strictly higher layer, if an input node is
    /// off layer 0, if a hidden or output node sits on layer 0, or if a connection
    /// leaves an output node.
    pub fn build(genome: &Genome) -> Result<Self, NetworkError> {
        genome.check_connections()?;

        // Layer 0 holds exactly the inputs; anything else there would share a
        // layer range with an input slot and overwrite the observation.
        for node in genome.nodes() {
            if (node.role == NodeRole::Input) != (node.layer == 0) {
                return Err(GenomeError::MisplacedNode {
                    key: node.key,
                    role: node.role,
                    layer: node.layer,
                }
                .into());
            }
        }

        let mut nodes: Vec<_> = genome.nodes().collect();
        nodes.sort_by_key(|n| (n.layer, n.key));

        let slot_of: HashMap<NodeKey, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.key, i)).collect();

        for conn in genome.connections() {
            if let Some(source) = genome.node(conn.input_key) {
                if source.role == NodeRole::Output {
                    let target_layer = genome.node(conn.output_key).map_or(0, |n| n.layer);
                    return Err(GenomeError::InvalidTopology {
                        connection: conn.key,
                        input_layer: source.layer,
                        output_layer: target_layer,
                    }
                    .into());
                }
            }
        }

        let node_keys: Vec<NodeKey> = nodes.iter().map(|n| n.key).collect();
        let biases: Vec<f32> = nodes.iter().map(|n| n.bias).collect();

        // Group the evaluated (non-input) slots into contiguous layer ranges.
        let mut layers: Vec<Range<usize>> = Vec::new();
        let mut current_layer = None;
        for (slot, node) in nodes.iter().enumerate() {
            if node.role == NodeRole::Input {
                continue;
            }
            match (current_layer, layers.last_mut()) {
                (Some(layer), Some(range)) if layer == node.layer => range.end = slot + 1,
                _ => {
                    layers.push(slot..slot + 1);
                    current_layer = Some(node.layer);
                }
            }
        }

        let input_slots: Vec<usize> = genome
            .input_keys()
            .iter()
            .filter_map(|k| slot_of.get(k).copied())
            .collect();
        let output_slots: Vec<usize> = genome
            .output_keys()
            .iter()
            .filter_map(|k| slot_of.get(k).copied())
            .collect();

        // Connections iterate in ascending key order, which fixes the summation
        // order inside each CSR row.
        let mut incoming: Vec<Vec<(usize, f32)>> = vec![Vec::new(); nodes.len()];
        for conn in genome.connections().filter(|c| c.enabled) {
            if let (Some(&from), Some(&to)) =
                (slot_of.get(&conn.input_key), slot_of.get(&conn.output_key))
            {
                incoming[to].push((from, conn.weight));
            }
        }

        let mut csr_offsets = Vec::with_capacity(nodes.len() + 1);
        let mut csr_sources = Vec::new();
        let mut csr_weights = Vec::new();
        csr_offsets.push(0);
        for row in incoming {
            for (from, weight) in row {
                csr_sources.push(from);
                csr_weights.push(weight);
            }
            csr_offsets.push(csr_sources.len());
        }

        Ok(Self {
            node_keys,
            biases,
            layers,
            csr_sources,
            csr_weights,
            csr_offsets,
            input_slots,
            output_slots,
        })
    }

    /// Evaluate the network, writing outputs into a caller-provided buffer.
    ///
    /// `values` is scratch space for per-node activations; it is resized as
    /// needed, so a buffer kept by the caller makes repeated calls allocation-free.
    /// Its previous contents never influence the result.
    ///
    /// # Arguments
    ///
    /// * `inputs` - One value per input node, in ascending input-key order
    /// * `values` - Scratch buffer for per-node activations
    /// * `outputs` - Receives one value per output node, in ascending output-key order
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidInputShape`] or
    /// [`NetworkError::InvalidOutputShape`] if a slice length does not match the
    /// network. `outputs` is left untouched in that case.
    pub fn activate_into(
        &self,
        inputs: &[f32],
        values: &mut Vec<f32>,
        outputs: &mut [f32],
    ) -> Result<(), NetworkError> {
        if inputs.len() != self.input_slots.len() {
            return Err(NetworkError::InvalidInputShape {
                expected: self.input_slots.len(),
                actual: inputs.len(),
            });
        }
        if outputs.len() != self.output_slots.len() {
            return Err(NetworkError::InvalidOutputShape {
                expected: self.output_slots.len(),
                actual: outputs.len(),
            });
        }

        values.clear();
        values.resize(self.node_keys.len(), 0.0);

        for (&slot, &value) in self.input_slots.iter().zip(inputs) {
            values[slot] = value;
        }

        for layer in &self.layers {
            for slot in layer.clone() {
                let mut sum = self.biases[slot];
                let row = self.csr_offsets[slot]..self.csr_offsets[slot + 1];
                for i in row {
                    sum += self.csr_weights[i] * values[self.csr_sources[i]];
                }
                values[slot] = sum.tanh();
            }
        }

        for (out, &slot) in outputs.iter_mut().zip(&self.output_slots) {
            *out = values[slot];
        }
        Ok(())
    }

    /// Evaluate the network for one observation vector.
    ///
    /// Returns one raw `tanh` value per output node, ordered by output key.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidInputShape`] if `inputs.len()` differs from
    /// the number of input nodes.
    pub fn activate(&self, inputs: &[f32]) -> Result<Vec<f32>, NetworkError> {
        let mut values = Vec::with_capacity(self.node_keys.len());
        let mut outputs = vec![0.0; self.output_slots.len()];
        self.activate_into(inputs, &mut values, &mut outputs)?;
        Ok(outputs)
    }

    /// Number of input nodes.
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_slots.len()
    }

    /// Number of output nodes.
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_slots.len()
    }

    /// Number of evaluated layers (the input layer is not counted).
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_keys.len()
    }

    /// Number of enabled connections compiled into the network.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.csr_sources.len()
    }
}
