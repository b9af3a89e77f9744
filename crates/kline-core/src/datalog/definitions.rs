//! Variable definition files
//!
//! Definitions are stored as a JSON array of variable objects:
//!
//! ```json
//! [
//!   { "name": "nmot", "address": 3670016, "size": 1, "factor": 40, "unit": "rpm" },
//!   { "name": "tmot", "address": 3670017, "size": 1, "factor": 0.75, "offset": 48, "unit": "C" }
//! ]
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use crate::ecu::Variable;
use crate::protocol::ProtocolError;

/// Parse definitions from JSON text
pub fn parse_variables(json: &str) -> Result<Vec<Variable>, ProtocolError> {
    let variables: Vec<Variable> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for variable in &variables {
        if !seen.insert(variable.name()) {
            return Err(ProtocolError::DuplicateVariable(variable.name().to_string()));
        }
    }
    Ok(variables)
}

/// Load definitions from a JSON file
pub fn load_variables<P: AsRef<Path>>(path: P) -> Result<Vec<Variable>, ProtocolError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ProtocolError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
    })?;
    let variables = parse_variables(&text)?;
    debug!("Loaded {} variables from {}", variables.len(), path.display());
    Ok(variables)
}

/// Save definitions as pretty-printed JSON
pub fn save_variables<P: AsRef<Path>>(path: P, variables: &[Variable]) -> Result<(), ProtocolError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, variables)?;
    Ok(())
}
