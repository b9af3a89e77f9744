//! ECU Variables
//!
//! Variable definitions, raw value decoding and sample snapshots.

pub mod codec;
mod sample;
mod variable;

pub use codec::{decode, encode_raw};
pub use sample::Sample;
pub use variable::{Variable, VariableError, VariableSize};
