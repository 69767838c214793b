//! Agent registry: one genome and one network per living agent.
//!
//! Agents live in a `SlotMap` arena. Handles are generational, so an [`AgentId`]
//! kept by the simulation after the agent died simply stops resolving instead of
//! pointing at whatever agent reused the slot.

use rand::Rng;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::config::{ConfigError, NeatConfig};
use crate::genome::{Genome, GenomeError};
use crate::network::{Network, NetworkError};
use crate::reproduction::reproduce;

new_key_type! {
    /// Handle of an agent inside a [`Population`].
    pub struct AgentId;
}

/// Errors raised by population operations.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// The handle does not name a living agent.
    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),
    /// A genome offered to the population is structurally invalid.
    #[error("invalid genome: {0}")]
    InvalidGenome(#[from] GenomeError),
    /// A network could not be built or activated.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// A living agent.
#[derive(Debug, Clone)]
pub struct Agent {
    /// The agent's heritable description.
    pub genome: Genome,
    /// The network compiled from `genome` at birth, reused for the agent's lifetime.
    pub network: Network,
    /// 0 for founders, one more than the older parent otherwise.
    pub generation: u32,
    /// Handles of both parents, if the agent was bred.
    pub parents: Option<(AgentId, AgentId)>,
}

/// All living agents sharing one I/O layout and mutation config.
#[derive(Debug, Clone)]
pub struct Population {
    config: NeatConfig,
    agents: SlotMap<AgentId, Agent>,
}

impl Population {
    /// Create an empty population.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails validation.
    pub fn new(config: NeatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            agents: SlotMap::with_key(),
        })
    }

    /// The config shared by every agent.
    #[must_use]
    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    /// Create a founder agent with a fresh genome.
    ///
    /// # Errors
    ///
    /// A fresh genome is always valid, so an error here signals a bug in the
    /// genome constructors. Errors are those of [`insert`](Self::insert).
    pub fn spawn<R: Rng>(&mut self, rng: &mut R) -> Result<AgentId, PopulationError> {
        let genome = Genome::initial(&self.config, rng);
        self.insert(genome)
    }

    /// Add a founder agent with a given genome, e.g. one loaded from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidGenome`] if the genome does not fit this
    /// population's config, and [`PopulationError::Network`] if it cannot be built.
    pub fn insert(&mut self, genome: Genome) -> Result<AgentId, PopulationError> {
        genome.validate(&self.config)?;
        let network = Network::build(&genome)?;
        Ok(self.agents.insert(Agent {
            genome,
            network,
            generation: 0,
            parents: None,
        }))
    }

    /// Breed two living agents and add the child.
    ///
    /// The same agent may be passed as both parents.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::UnknownAgent`] if either handle is stale, and
    /// [`PopulationError::Network`] if the repaired child fails to build.
    pub fn breed<R: Rng>(
        &mut self,
        a: AgentId,
        b: AgentId,
        rng: &mut R,
    ) -> Result<AgentId, PopulationError> {
        let parent_a = self.agents.get(a).ok_or(PopulationError::UnknownAgent(a))?;
        let parent_b = self.agents.get(b).ok_or(PopulationError::UnknownAgent(b))?;

        let offspring = reproduce(&parent_a.genome, &parent_b.genome, &self.config, rng)?;
        let generation = parent_a.generation.max(parent_b.generation) + 1;

        let id = self.agents.insert(Agent {
            genome: offspring.genome,
            network: offspring.network,
            generation,
            parents: Some((a, b)),
        });
        log::debug!("agent {id:?} born to {a:?} and {b:?} (generation {generation})");
        Ok(id)
    }

    /// Run one decision for an agent.
    ///
    /// A wrongly sized observation is not fatal for the tick: the agent gets a
    /// zero action vector and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::UnknownAgent`] if `id` does not name a living
    /// agent.
    pub fn think(&self, id: AgentId, observation: &[f32]) -> Result<Vec<f32>, PopulationError> {
        let agent = self.agents.get(id).ok_or(PopulationError::UnknownAgent(id))?;
        match agent.network.activate(observation) {
            Ok(actions) => Ok(actions),
            Err(err @ NetworkError::InvalidInputShape { .. }) => {
                log::warn!("agent {id:?}: {err}; using zero actions");
                Ok(vec![0.0; agent.network.num_outputs()])
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Look up a living agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Remove an agent, returning it.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(id)
    }

    /// Iterate over living agents.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    /// Number of living agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
