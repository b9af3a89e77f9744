//! Variable definitions
//!
//! A variable names an ECU memory location and says how to turn its raw
//! bytes into an engineering value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::MAX_ADDRESS;

/// Errors raised by variable definitions and decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Invalid variable size {0} (must be 1 or 2 bytes)")]
    InvalidSize(u8),

    #[error("Address {0:#x} does not fit in 24 bits")]
    AddressOutOfRange(u32),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Division by zero decoding inverse variable '{name}'")]
    DivisionByZero { name: String },

    #[error("Value {value} cannot be represented by variable '{name}'")]
    ValueOutOfRange { name: String, value: i64 },
}

/// Width of a variable in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VariableSize {
    /// One byte
    Byte,
    /// Two bytes, big-endian
    Word,
}

impl VariableSize {
    /// Number of bytes
    pub fn bytes(self) -> usize {
        match self {
            VariableSize::Byte => 1,
            VariableSize::Word => 2,
        }
    }

    /// Number of bits
    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Mask with every bit of this width set
    pub fn full_mask(self) -> u16 {
        match self {
            VariableSize::Byte => 0x00FF,
            VariableSize::Word => 0xFFFF,
        }
    }
}

impl TryFrom<u8> for VariableSize {
    type Error = VariableError;

    fn try_from(size: u8) -> Result<Self, Self::Error> {
        match size {
            1 => Ok(VariableSize::Byte),
            2 => Ok(VariableSize::Word),
            other => Err(VariableError::InvalidSize(other)),
        }
    }
}

impl From<VariableSize> for u8 {
    fn from(size: VariableSize) -> u8 {
        size.bytes() as u8
    }
}

/// An immutable variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariableSpec")]
pub struct Variable {
    name: String,
    address: u32,
    size: VariableSize,
    bitmask: u16,
    unit: String,
    factor: f64,
    offset: f64,
    signed: bool,
    inverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

/// Serialized form of a [`Variable`], validated on conversion
#[derive(Debug, Deserialize)]
struct VariableSpec {
    name: String,
    address: u32,
    size: u8,
    #[serde(default)]
    bitmask: Option<u16>,
    #[serde(default)]
    unit: String,
    #[serde(default = "default_factor")]
    factor: f64,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    signed: bool,
    #[serde(default)]
    inverse: bool,
    #[serde(default)]
    comment: Option<String>,
}

fn default_factor() -> f64 {
    1.0
}

impl TryFrom<VariableSpec> for Variable {
    type Error = VariableError;

    fn try_from(raw: VariableSpec) -> Result<Self, Self::Error> {
        let size = VariableSize::try_from(raw.size)?;
        let mut variable = Variable::new(raw.name, raw.address, size)?
            .with_unit(raw.unit)
            .with_scaling(raw.factor, raw.offset);
        if let Some(mask) = raw.bitmask {
            variable = variable.with_bitmask(mask);
        }
        variable.signed = raw.signed;
        variable.inverse = raw.inverse;
        variable.comment = raw.comment;
        Ok(variable)
    }
}

impl Variable {
    /// Define a variable with identity scaling and a full bitmask
    pub fn new(name: impl Into<String>, address: u32, size: VariableSize) -> Result<Self, VariableError> {
        if address > MAX_ADDRESS {
            return Err(VariableError::AddressOutOfRange(address));
        }
        Ok(Self {
            name: name.into(),
            address,
            size,
            bitmask: size.full_mask(),
            unit: String::new(),
            factor: 1.0,
            offset: 0.0,
            signed: false,
            inverse: false,
            comment: None,
        })
    }

    /// Restrict the decoded bits; bits beyond the variable width are dropped
    pub fn with_bitmask(mut self, bitmask: u16) -> Self {
        self.bitmask = bitmask & self.size.full_mask();
        self
    }

    /// Set factor and offset
    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Interpret the masked value as two's complement
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Use `factor / (value - offset)` scaling
    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }

    /// Attach a free-form comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Unique name within a log session
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 24-bit memory address
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Width in bytes
    pub fn size(&self) -> VariableSize {
        self.size
    }

    /// Mask applied before sign conversion
    pub fn bitmask(&self) -> u16 {
        self.bitmask
    }

    /// Unit label, possibly empty
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Scaling factor
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Scaling offset
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Whether the value is two's complement
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Whether inverse scaling applies
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// Free-form comment
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_size_validation() {
        assert_eq!(VariableSize::try_from(1).unwrap(), VariableSize::Byte);
        assert_eq!(VariableSize::try_from(2).unwrap(), VariableSize::Word);
        assert_eq!(VariableSize::try_from(4), Err(VariableError::InvalidSize(4)));
        assert_eq!(VariableSize::try_from(0), Err(VariableError::InvalidSize(0)));
    }

    #[test]
    fn test_default_bitmask_follows_size() {
        let byte = Variable::new("nmot", 0x380000, VariableSize::Byte).unwrap();
        assert_eq!(byte.bitmask(), 0xFF);
        let word = Variable::new("rl", 0x380002, VariableSize::Word).unwrap();
        assert_eq!(word.bitmask(), 0xFFFF);
        assert_eq!(byte.with_bitmask(0x0F0F).bitmask(), 0x0F);
    }

    #[test]
    fn test_address_range() {
        assert!(Variable::new("top", 0xFFFFFF, VariableSize::Byte).is_ok());
        assert_eq!(
            Variable::new("over", 0x1000000, VariableSize::Byte),
            Err(VariableError::AddressOutOfRange(0x1000000))
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let v: Variable = serde_json::from_str(
            r#"{"name": "tmot", "address": 3670019, "size": 1, "factor": 0.75, "offset": 48, "unit": "C"}"#,
        )
        .unwrap();
        assert_eq!(v.name(), "tmot");
        assert_eq!(v.address(), 0x380003);
        assert_eq!(v.bitmask(), 0xFF);
        assert_eq!(v.factor(), 0.75);
        assert_eq!(v.offset(), 48.0);
        assert!(!v.is_signed());
        assert_eq!(v.comment(), None);
    }

    #[test]
    fn test_deserialize_rejects_bad_size() {
        let err = serde_json::from_str::<Variable>(r#"{"name": "x", "address": 0, "size": 3}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid variable size 3"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let v = Variable::new("ub", 0x380010, VariableSize::Word)
            .unwrap()
            .with_scaling(0.0704, 0.0)
            .with_unit("V")
            .with_comment("battery voltage");
        let json = serde_json::to_string(&v).unwrap();
        let back: Variable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
