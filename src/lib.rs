//! # Symbios Brain
//!
//! A NEAT-style evolution engine for the brains of simulated agents. Each agent
//! carries a [`Genome`] describing a layered, strictly feed-forward network; the
//! genome is compiled once into an immutable [`Network`] and queried every tick.
//!
//! ## Features
//!
//! - **Layered Feed-Forward Networks**: Every node has a layer index and every
//!   connection points to a strictly higher layer, so a single pass over the
//!   layers evaluates the whole network
//! - **Hash-Based Innovation**: New genes are keyed by hashes of the structural
//!   event, so the same mutation in two lineages yields the same key and
//!   crossover aligns genes without a global counter
//! - **Repair, Don't Reject**: Crossover and mutation may leave a genome without
//!   a required node or a live path; [`repair`] restores the invariants so the
//!   observation and action shapes never change
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_brain::{reproduce, Genome, NeatConfig, Network};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = NeatConfig::new(3, 2);
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! let mother = Genome::initial(&config, &mut rng);
//! let father = Genome::initial(&config, &mut rng);
//!
//! let brain = Network::build(&mother).unwrap();
//! let actions = brain.activate(&[0.2, -0.4, 1.0]).unwrap();
//! assert_eq!(actions.len(), 2);
//!
//! let child = reproduce(&mother, &father, &config, &mut rng).unwrap();
//! assert_eq!(child.network.num_outputs(), 2);
//! ```
//!
//! ## Architecture
//!
//! ### Keys
//!
//! Input nodes use keys `0..num_inputs`, outputs use
//! `num_inputs..num_inputs + num_outputs`. Keys created by mutation are hashed
//! into the range above [`innovation::RESERVED_KEY_RANGE`]:
//!
//! - **Connections**: `key = Hash(input_key, output_key)`
//! - **Nodes (from split)**: `key = Hash(connection_key, SPLIT_MARKER)`
//!
//! ### Evaluation
//!
//! [`Network::build`] sorts nodes by layer and packs incoming connections in CSR
//! form. [`Network::activate`] evaluates one layer at a time with `tanh`; inputs
//! pass through unchanged and outputs are returned in ascending key order.

pub mod config;
pub mod crossover;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod mutation;
pub mod network;
pub mod persist;
pub mod population;
pub mod repair;
pub mod reproduction;

// Re-exports for convenience
pub use config::{ConfigError, NeatConfig};
pub use crossover::crossover;
pub use gene::{ConnectionGene, ConnectionKey, NodeGene, NodeKey, NodeRole};
pub use genome::{Genome, GenomeError};
pub use innovation::{connection_key, split_node_key};
pub use mutation::mutate;
pub use network::{Network, NetworkError};
pub use persist::PersistError;
pub use population::{Agent, AgentId, Population, PopulationError};
pub use repair::repair;
pub use reproduction::{reproduce, Offspring};
