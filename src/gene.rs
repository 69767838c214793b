//! Gene types for agent genomes.
//!
//! This module defines the fundamental building blocks of an agent brain:
//! - [`NodeGene`]: a neuron with a fixed role, a topological layer and a bias
//! - [`ConnectionGene`]: a weighted, directed edge between two node keys
//!
//! Genes refer to each other through plain integer keys rather than references.
//! Two genomes holding a gene with the same key hold "the same" gene, which is
//! what crossover matches on.

use serde::{Deserialize, Serialize};

/// Stable identity of a node gene, unique within a genome.
pub type NodeKey = u64;

/// Stable identity of a connection gene, unique within a genome.
pub type ConnectionKey = u64;

/// The role of a node in the network. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Receives one observation value; no bias or activation is applied.
    Input,
    /// Internal node added through mutation.
    Hidden,
    /// Produces one action value.
    Output,
}

/// A node gene representing a neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    /// Stable identity, shared with homologous nodes in other genomes.
    pub key: NodeKey,
    /// The role of this node in the network.
    pub role: NodeRole,
    /// Topological depth. Inputs sit on layer 0, outputs on the genome's
    /// maximum layer, hidden nodes strictly between.
    pub layer: u32,
    /// Bias added to the weighted input sum before activation.
    pub bias: f32,
}

impl NodeGene {
    /// Create a new input node on layer 0.
    #[must_use]
    pub fn input(key: NodeKey) -> Self {
        Self {
            key,
            role: NodeRole::Input,
            layer: 0,
            bias: 0.0,
        }
    }

    /// Create a new output node on the given layer.
    #[must_use]
    pub fn output(key: NodeKey, layer: u32) -> Self {
        Self {
            key,
            role: NodeRole::Output,
            layer,
            bias: 0.0,
        }
    }

    /// Create a new hidden node on the given layer.
    #[must_use]
    pub fn hidden(key: NodeKey, layer: u32) -> Self {
        Self {
            key,
            role: NodeRole::Hidden,
            layer,
            bias: 0.0,
        }
    }

    /// Set the bias, builder style.
    #[must_use]
    pub fn with_bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }
}

/// A connection gene representing a weighted link between two nodes.
///
/// Persisted with camel-cased endpoint fields (`inputKey`, `outputKey`), which is
/// the record shape save files use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionGene {
    /// Stable identity, shared with homologous connections in other genomes.
    pub key: ConnectionKey,
    /// The source node.
    pub input_key: NodeKey,
    /// The target node.
    pub output_key: NodeKey,
    /// The connection weight, kept in `[-1, 1]` by mutation.
    pub weight: f32,
    /// Whether this connection is active.
    /// Disabled connections are skipped during evaluation but preserved for crossover.
    pub enabled: bool,
}

impl ConnectionGene {
    /// Create a new enabled connection.
    #[must_use]
    pub fn new(key: ConnectionKey, input_key: NodeKey, output_key: NodeKey, weight: f32) -> Self {
        Self {
            key,
            input_key,
            output_key,
            weight,
            enabled: true,
        }
    }

    /// Whether this connection touches the given node at either end.
    #[must_use]
    pub fn touches(&self, node: NodeKey) -> bool {
        self.input_key == node || self.output_key == node
    }
}
