//! Genome save/load.
//!
//! A genome is stored as a JSON document with two arrays, each ordered by key:
//!
//! ```json
//! {
//!   "nodes": [{ "key": 0, "role": "Input", "layer": 0, "bias": 0.0 }],
//!   "connections": [{ "key": 65561, "inputKey": 0, "outputKey": 1, "weight": 0.5, "enabled": true }]
//! }
//! ```
//!
//! Loading builds a brand new [`Genome`] and validates it before returning, so a
//! failed load never touches a genome that is already in use.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::NeatConfig;
use crate::gene::{ConnectionGene, NodeGene};
use crate::genome::{Genome, GenomeError};

/// Errors raised while saving or loading a genome.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The file could not be read or written.
    #[error("genome file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not well-formed.
    #[error("malformed genome document: {0}")]
    Json(#[from] serde_json::Error),
    /// The document parsed but describes an invalid genome.
    #[error("genome document violates a structural invariant: {0}")]
    Invalid(#[from] GenomeError),
}

/// On-disk record shape of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeDocument {
    /// Node records in ascending key order.
    pub nodes: Vec<NodeGene>,
    /// Connection records in ascending key order.
    pub connections: Vec<ConnectionGene>,
}

impl From<Genome> for GenomeDocument {
    fn from(genome: Genome) -> Self {
        Self {
            nodes: genome.nodes.into_values().collect(),
            connections: genome.connections.into_values().collect(),
        }
    }
}

impl TryFrom<GenomeDocument> for Genome {
    type Error = GenomeError;

    fn try_from(doc: GenomeDocument) -> Result<Self, Self::Error> {
        Genome::from_genes(doc.nodes, doc.connections)
    }
}

/// Serialize a genome to a JSON string.
///
/// # Errors
///
/// Returns [`PersistError::Json`] if serialization fails.
pub fn to_json(genome: &Genome) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(genome)?)
}

/// Parse a genome from a JSON string and validate it against `config`.
///
/// # Errors
///
/// Returns [`PersistError::Json`] for a malformed document and
/// [`PersistError::Invalid`] for duplicate keys or a genome that fails
/// [`Genome::validate`].
pub fn from_json(json: &str, config: &NeatConfig) -> Result<Genome, PersistError> {
    let genome: Genome = serde_json::from_str(json)?;
    genome.validate(config)?;
    Ok(genome)
}

/// Write a genome to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`PersistError::Json`] if serialization fails and
/// [`PersistError::Io`] if the file cannot be written.
pub fn save(genome: &Genome, path: &Path) -> Result<(), PersistError> {
    fs::write(path, to_json(genome)?)?;
    log::debug!(
        "saved genome ({} nodes, {} connections) to {}",
        genome.node_count(),
        genome.connection_count(),
        path.display()
    );
    Ok(())
}

/// Read and validate a genome from `path`.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the file cannot be read, otherwise the same
/// errors as [`from_json`].
pub fn load(path: &Path, config: &NeatConfig) -> Result<Genome, PersistError> {
    let content = fs::read_to_string(path)?;
    from_json(&content, config)
}
