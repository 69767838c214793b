//! Agent genome: node and connection genes keyed by stable integer keys.
//!
//! A [`Genome`] owns its genes directly in ordered maps. Crossover matches genes
//! across genomes by key lookup, and ordered iteration keeps seeded runs
//! reproducible. Genetic operators work on owned values: a genome handed to
//! [`Network::build`](crate::Network::build) is never modified underneath it.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::NeatConfig;
use crate::gene::{ConnectionGene, ConnectionKey, NodeGene, NodeKey, NodeRole};
use crate::innovation::connection_key;
use crate::persist::GenomeDocument;
use crate::repair::repair;

/// Structural problems found in a genome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenomeError {
    /// Two genes of the same kind share a key.
    #[error("duplicate gene key {key}")]
    DuplicateKey {
        /// The repeated key.
        key: u64,
    },
    /// A required input or output node is absent.
    #[error("required node {key} is missing")]
    MissingRequiredNode {
        /// Key of the missing node.
        key: NodeKey,
    },
    /// A required node exists but holds the wrong role.
    #[error("node {key} should be {expected:?} but is {found:?}")]
    WrongRole {
        /// Key of the node.
        key: NodeKey,
        /// Role its key requires.
        expected: NodeRole,
        /// Role it actually has.
        found: NodeRole,
    },
    /// An input or output node sits outside the required key ranges.
    #[error("{role:?} node {key} is not part of the required input/output set")]
    UnexpectedIoNode {
        /// Key of the node.
        key: NodeKey,
        /// Its role.
        role: NodeRole,
    },
    /// A node sits on a layer its role does not allow.
    #[error("{role:?} node {key} sits on layer {layer}")]
    MisplacedNode {
        /// Key of the node.
        key: NodeKey,
        /// Its role.
        role: NodeRole,
        /// Its layer.
        layer: u32,
    },
    /// A connection references a node that does not exist.
    #[error("connection {connection} references missing node {node}")]
    DanglingConnection {
        /// Key of the connection.
        connection: ConnectionKey,
        /// The missing endpoint.
        node: NodeKey,
    },
    /// A connection does not point strictly forward through the layers.
    #[error(
        "connection {connection} runs from layer {input_layer} to layer {output_layer}; \
         feed-forward evaluation requires a strictly increasing layer"
    )]
    InvalidTopology {
        /// Key of the connection.
        connection: ConnectionKey,
        /// Layer of its source node.
        input_layer: u32,
        /// Layer of its target node.
        output_layer: u32,
    },
    /// A required node has no enabled connection on its open side.
    #[error("required node {key} has no enabled connection")]
    UnwiredNode {
        /// Key of the isolated node.
        key: NodeKey,
    },
}

/// The heritable description of an agent brain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GenomeDocument", into = "GenomeDocument")]
pub struct Genome {
    pub(crate) nodes: BTreeMap<NodeKey, NodeGene>,
    pub(crate) connections: BTreeMap<ConnectionKey, ConnectionGene>,
}

impl Genome {
    /// Create an empty genome with no genes at all.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a genome from gene lists.
    ///
    /// No structural checks run here; call [`validate`](Self::validate) or
    /// [`repair`](crate::repair) before building a network.
    ///
    /// # Errors
    ///
    /// Returns [`GenomeError::DuplicateKey`] if two node genes or two connection
    /// genes share a key.
    pub fn from_genes(
        nodes: impl IntoIterator<Item = NodeGene>,
        connections: impl IntoIterator<Item = ConnectionGene>,
    ) -> Result<Self, GenomeError> {
        let mut genome = Self::new();
        for node in nodes {
            let key = node.key;
            if genome.nodes.insert(key, node).is_some() {
                return Err(GenomeError::DuplicateKey { key });
            }
        }
        for conn in connections {
            let key = conn.key;
            if genome.connections.insert(key, conn).is_some() {
                return Err(GenomeError::DuplicateKey { key });
            }
        }
        Ok(genome)
    }

    /// Create a genome holding only the required input and output nodes.
    #[must_use]
    pub fn minimal(config: &NeatConfig) -> Self {
        let mut genome = Self::new();
        for key in config.input_keys() {
            genome.insert_node(NodeGene::input(key));
        }
        for key in config.output_keys() {
            genome.insert_node(NodeGene::output(key, config.output_layer));
        }
        genome
    }

    /// Create a starting genome for a new agent.
    ///
    /// Each input/output pair is connected with probability
    /// `initial_connection_prob` and a uniform weight in `[-1, 1]`. The result is
    /// repaired, so every required node ends up wired even at low densities.
    #[must_use]
    pub fn initial<R: Rng>(config: &NeatConfig, rng: &mut R) -> Self {
        let mut genome = Self::minimal(config);

        for input in config.input_keys() {
            for output in config.output_keys() {
                if rng.random::<f32>() < config.initial_connection_prob {
                    let weight = rng.random_range(-1.0..=1.0);
                    genome.insert_connection(ConnectionGene::new(
                        connection_key(input, output),
                        input,
                        output,
                        weight,
                    ));
                }
            }
        }

        repair(genome, config, rng)
    }

    /// All node genes in ascending key order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeGene> {
        self.nodes.values()
    }

    /// All connection genes in ascending key order.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.connections.values()
    }

    /// Look up a node by key.
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&NodeGene> {
        self.nodes.get(&key)
    }

    /// Look up a node by key for modification.
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut NodeGene> {
        self.nodes.get_mut(&key)
    }

    /// Look up a connection by key.
    #[must_use]
    pub fn connection(&self, key: ConnectionKey) -> Option<&ConnectionGene> {
        self.connections.get(&key)
    }

    /// Look up a connection by key for modification.
    pub fn connection_mut(&mut self, key: ConnectionKey) -> Option<&mut ConnectionGene> {
        self.connections.get_mut(&key)
    }

    /// Insert a node, returning any node it replaced.
    pub fn insert_node(&mut self, node: NodeGene) -> Option<NodeGene> {
        self.nodes.insert(node.key, node)
    }

    /// Insert a connection, returning any connection it replaced.
    pub fn insert_connection(&mut self, conn: ConnectionGene) -> Option<ConnectionGene> {
        self.connections.insert(conn.key, conn)
    }

    /// Remove a node together with every connection that references it.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<NodeGene> {
        let node = self.nodes.remove(&key)?;
        self.connections.retain(|_, c| !c.touches(key));
        Some(node)
    }

    /// Remove a single connection.
    pub fn remove_connection(&mut self, key: ConnectionKey) -> Option<ConnectionGene> {
        self.connections.remove(&key)
    }

    /// Whether a node with this key exists.
    #[must_use]
    pub fn contains_node(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Whether a connection with this key exists.
    #[must_use]
    pub fn contains_connection(&self, key: ConnectionKey) -> bool {
        self.connections.contains_key(&key)
    }

    /// Number of node genes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connection genes, enabled or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of enabled connections.
    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.values().filter(|c| c.enabled).count()
    }

    /// Keys of all nodes with the given role, ascending.
    #[must_use]
    pub fn keys_with_role(&self, role: NodeRole) -> Vec<NodeKey> {
        self.nodes
            .values()
            .filter(|n| n.role == role)
            .map(|n| n.key)
            .collect()
    }

    /// Keys of all input nodes, ascending.
    #[must_use]
    pub fn input_keys(&self) -> Vec<NodeKey> {
        self.keys_with_role(NodeRole::Input)
    }

    /// Keys of all output nodes, ascending.
    #[must_use]
    pub fn output_keys(&self) -> Vec<NodeKey> {
        self.keys_with_role(NodeRole::Output)
    }

    /// Keys of all hidden nodes, ascending.
    #[must_use]
    pub fn hidden_keys(&self) -> Vec<NodeKey> {
        self.keys_with_role(NodeRole::Hidden)
    }

    /// Highest layer any node occupies.
    #[must_use]
    pub fn max_layer(&self) -> u32 {
        self.nodes.values().map(|n| n.layer).max().unwrap_or(0)
    }

    /// Find the connection from `input_key` to `output_key`, enabled or not.
    #[must_use]
    pub fn connection_between(
        &self,
        input_key: NodeKey,
        output_key: NodeKey,
    ) -> Option<&ConnectionGene> {
        self.connections
            .values()
            .find(|c| c.input_key == input_key && c.output_key == output_key)
    }

    /// Check the genome against every structural invariant the executor and the
    /// simulation rely on. Repaired genomes always pass.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: a missing or wrongly typed required
    /// node, an I/O node outside the required keys, a node on a layer its role
    /// does not allow, a dangling or non-forward connection, or a required node
    /// with no enabled connection.
    pub fn validate(&self, config: &NeatConfig) -> Result<(), GenomeError> {
        let required_inputs = config.input_keys();
        let required_outputs = config.output_keys();

        for key in required_inputs.clone() {
            self.check_required(key, NodeRole::Input)?;
        }
        for key in required_outputs.clone() {
            self.check_required(key, NodeRole::Output)?;
        }

        let max_layer = self.max_layer();
        for node in self.nodes.values() {
            let placed = match node.role {
                NodeRole::Input => {
                    if !required_inputs.contains(&node.key) {
                        return Err(GenomeError::UnexpectedIoNode {
                            key: node.key,
                            role: node.role,
                        });
                    }
                    node.layer == 0
                }
                NodeRole::Output => {
                    if !required_outputs.contains(&node.key) {
                        return Err(GenomeError::UnexpectedIoNode {
                            key: node.key,
                            role: node.role,
                        });
                    }
                    node.layer == max_layer && node.layer > 0
                }
                NodeRole::Hidden => node.layer > 0 && node.layer < max_layer,
            };
            if !placed {
                return Err(GenomeError::MisplacedNode {
                    key: node.key,
                    role: node.role,
                    layer: node.layer,
                });
            }
        }

        self.check_connections()?;

        for key in required_inputs {
            if !self.connections.values().any(|c| c.enabled && c.input_key == key) {
                return Err(GenomeError::UnwiredNode { key });
            }
        }
        for key in required_outputs {
            if !self.connections.values().any(|c| c.enabled && c.output_key == key) {
                return Err(GenomeError::UnwiredNode { key });
            }
        }
        Ok(())
    }

    /// Check that every connection has both endpoints and runs strictly forward.
    ///
    /// # Errors
    ///
    /// Returns [`GenomeError::DanglingConnection`] or
    /// [`GenomeError::InvalidTopology`] for the first offending connection.
    pub fn check_connections(&self) -> Result<(), GenomeError> {
        for conn in self.connections.values() {
            let input = self
                .nodes
                .get(&conn.input_key)
                .ok_or(GenomeError::DanglingConnection {
                    connection: conn.key,
                    node: conn.input_key,
                })?;
            let output = self
                .nodes
                .get(&conn.output_key)
                .ok_or(GenomeError::DanglingConnection {
                    connection: conn.key,
                    node: conn.output_key,
                })?;
            if input.layer >= output.layer {
                return Err(GenomeError::InvalidTopology {
                    connection: conn.key,
                    input_layer: input.layer,
                    output_layer: output.layer,
                });
            }
        }
        Ok(())
    }

    fn check_required(&self, key: NodeKey, expected: NodeRole) -> Result<(), GenomeError> {
        match self.nodes.get(&key) {
            None => Err(GenomeError::MissingRequiredNode { key }),
            Some(node) if node.role != expected => Err(GenomeError::WrongRole {
                key,
                expected,
                found: node.role,
            }),
            Some(_) => Ok(()),
        }
    }
}
