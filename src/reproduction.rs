//! Reproduction pipeline: crossover, mutation, repair, build.

use rand::Rng;

use crate::config::NeatConfig;
use crate::crossover::crossover;
use crate::genome::Genome;
use crate::mutation::mutate;
use crate::network::{Network, NetworkError};

/// A child genome together with its ready-to-use network.
#[derive(Debug, Clone)]
pub struct Offspring {
    /// The repaired child genome.
    pub genome: Genome,
    /// The network compiled from `genome`.
    pub network: Network,
}

/// Produce one child from two parents.
///
/// The parents are only borrowed; their live networks are unaffected.
///
/// # Errors
///
/// [`NetworkError::InvalidTopology`] means the repair pass let an invalid genome
/// through. That is a bug, and it is logged at error level before being returned.
pub fn reproduce<R: Rng>(
    parent_a: &Genome,
    parent_b: &Genome,
    config: &NeatConfig,
    rng: &mut R,
) -> Result<Offspring, NetworkError> {
    let child = crossover(parent_a, parent_b, config, rng);
    let genome = mutate(child, config, rng);

    let network = Network::build(&genome).inspect_err(|err| {
        log::error!("repaired child genome failed to build: {err}");
    })?;

    log::debug!(
        "offspring: {} nodes, {} enabled connections, {} layers",
        genome.node_count(),
        genome.num_enabled_connections(),
        network.num_layers()
    );
    Ok(Offspring { genome, network })
}
