//! Configuration for genome layout and mutation.
//!
//! The input and output counts fix the contract between the brain and the
//! simulation: required input keys are `0..num_inputs`, required output keys are
//! `num_inputs..num_inputs + num_outputs`. The probabilities are tuning values.

use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gene::NodeKey;

/// Errors raised while loading or validating a [`NeatConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for this struct.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Configuration for genome creation, mutation and repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatConfig {
    /// Number of observation values, one input node each.
    pub num_inputs: usize,
    /// Number of action values, one output node each.
    pub num_outputs: usize,
    /// Layer freshly synthesized output nodes start on. Outputs move higher only
    /// when a node split needs room beneath them.
    pub output_layer: u32,
    /// Probability that a fresh genome connects a given input/output pair.
    pub initial_connection_prob: f32,
    /// Probability of splitting a connection with a new hidden node.
    pub add_node_prob: f32,
    /// Probability of deleting a hidden node.
    pub delete_node_prob: f32,
    /// Probability of perturbing one node's bias.
    pub modify_bias_prob: f32,
    /// Probability of adding a connection.
    pub add_connection_prob: f32,
    /// Probability of deleting a connection.
    pub delete_connection_prob: f32,
    /// Probability of perturbing one connection's weight.
    pub modify_weight_prob: f32,
    /// Half-width of the uniform bias perturbation.
    pub bias_mutation_power: f32,
    /// Half-width of the uniform weight perturbation.
    pub weight_mutation_power: f32,
    /// Random source/target pairs tried before add-connection gives up.
    pub add_connection_attempts: usize,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 1,
            output_layer: 1,
            initial_connection_prob: 1.0,
            add_node_prob: 0.1,
            delete_node_prob: 0.05,
            modify_bias_prob: 0.3,
            add_connection_prob: 0.2,
            delete_connection_prob: 0.05,
            modify_weight_prob: 0.6,
            bias_mutation_power: 0.1,
            weight_mutation_power: 0.2,
            add_connection_attempts: 10,
        }
    }
}

impl NeatConfig {
    /// Create a config with default tuning for the given I/O shape.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            ..Default::default()
        }
    }

    /// Create a config with every mutation switched off. Useful for tests that
    /// enable one operator at a time.
    #[must_use]
    pub fn frozen(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            add_node_prob: 0.0,
            delete_node_prob: 0.0,
            modify_bias_prob: 0.0,
            add_connection_prob: 0.0,
            delete_connection_prob: 0.0,
            modify_weight_prob: 0.0,
            ..Self::new(num_inputs, num_outputs)
        }
    }

    /// Load a config from a TOML file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid TOML for this struct, and
    /// [`ConfigError::Invalid`] if a field is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_inputs == 0 {
            return Err(invalid("num_inputs", "must be at least 1"));
        }
        if self.num_outputs == 0 {
            return Err(invalid("num_outputs", "must be at least 1"));
        }
        if self.output_layer == 0 {
            return Err(invalid("output_layer", "layer 0 belongs to inputs"));
        }
        if self.num_inputs + self.num_outputs > crate::innovation::RESERVED_KEY_RANGE as usize {
            return Err(invalid(
                "num_inputs",
                "input and output keys exceed the reserved key range",
            ));
        }

        let probabilities = [
            ("initial_connection_prob", self.initial_connection_prob),
            ("add_node_prob", self.add_node_prob),
            ("delete_node_prob", self.delete_node_prob),
            ("modify_bias_prob", self.modify_bias_prob),
            ("add_connection_prob", self.add_connection_prob),
            ("delete_connection_prob", self.delete_connection_prob),
            ("modify_weight_prob", self.modify_weight_prob),
        ];
        for (field, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is not a probability")));
            }
        }

        if !(self.bias_mutation_power >= 0.0 && self.bias_mutation_power.is_finite()) {
            return Err(invalid("bias_mutation_power", "must be finite and >= 0"));
        }
        if !(self.weight_mutation_power >= 0.0 && self.weight_mutation_power.is_finite()) {
            return Err(invalid("weight_mutation_power", "must be finite and >= 0"));
        }
        if self.add_connection_attempts == 0 {
            return Err(invalid("add_connection_attempts", "must be at least 1"));
        }
        Ok(())
    }

    /// Keys of the required input nodes.
    #[must_use]
    pub fn input_keys(&self) -> Range<NodeKey> {
        0..self.num_inputs as NodeKey
    }

    /// Keys of the required output nodes.
    #[must_use]
    pub fn output_keys(&self) -> Range<NodeKey> {
        let start = self.num_inputs as NodeKey;
        start..start + self.num_outputs as NodeKey
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(NeatConfig::default().validate().is_ok());
        assert!(NeatConfig::frozen(4, 3).validate().is_ok());
    }

    #[test]
    fn test_required_key_ranges() {
        let config = NeatConfig::new(3, 2);
        assert_eq!(config.input_keys(), 0..3);
        assert_eq!(config.output_keys(), 3..5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = NeatConfig {
            add_node_prob: 1.5,
            ..NeatConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "add_node_prob",
                ..
            })
        ));

        let config = NeatConfig {
            num_outputs: 0,
            ..NeatConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NeatConfig {
            weight_mutation_power: f32::NAN,
            ..NeatConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NeatConfig {
            add_connection_attempts: 0,
            ..NeatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: NeatConfig = toml::from_str(
            r"
            num_inputs = 6
            num_outputs = 3
            add_node_prob = 0.25
            ",
        )
        .unwrap();

        assert_eq!(config.num_inputs, 6);
        assert_eq!(config.num_outputs, 3);
        assert!((config.add_node_prob - 0.25).abs() < 1e-6);
        assert_eq!(
            config.add_connection_attempts,
            NeatConfig::default().add_connection_attempts
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = NeatConfig::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
