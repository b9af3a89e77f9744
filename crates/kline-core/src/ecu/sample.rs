//! Sampled values

use std::sync::Arc;

use super::codec::decode;
use super::variable::{Variable, VariableError};

/// A decoded snapshot of one variable.
///
/// Samples own their raw bytes; decoding never touches the shared definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    variable: Arc<Variable>,
    raw: Vec<u8>,
    value: f64,
}

impl Sample {
    /// Decode `raw` against `variable`
    pub fn decode(variable: Arc<Variable>, raw: &[u8]) -> Result<Self, VariableError> {
        let value = decode(&variable, raw)?;
        Ok(Self {
            variable,
            raw: raw.to_vec(),
            value,
        })
    }

    /// Definition this sample was decoded with
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// Variable name
    pub fn name(&self) -> &str {
        self.variable.name()
    }

    /// Unit label
    pub fn unit(&self) -> &str {
        self.variable.unit()
    }

    /// Exactly `size` bytes as received
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Scaled value
    pub fn value(&self) -> f64 {
        self.value
    }
}
