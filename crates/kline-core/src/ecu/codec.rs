//! Raw value decoding
//!
//! Converts sampled bytes to engineering values using a variable's width,
//! bitmask, sign and scaling rules.

use byteorder::{BigEndian, ByteOrder};

use super::variable::{Variable, VariableError, VariableSize};

/// Masked, sign-adjusted integer value of `raw`, before scaling
pub fn raw_value(variable: &Variable, raw: &[u8]) -> Result<i64, VariableError> {
    let size = variable.size();
    if raw.len() != size.bytes() {
        return Err(VariableError::SizeMismatch {
            expected: size.bytes(),
            actual: raw.len(),
        });
    }

    let unsigned = match size {
        VariableSize::Byte => raw[0] as u16,
        VariableSize::Word => BigEndian::read_u16(raw),
    };

    // Mask first, then sign-extend from the full variable width
    let masked = unsigned & variable.bitmask();
    let value = if variable.is_signed() {
        match size {
            VariableSize::Byte => masked as u8 as i8 as i64,
            VariableSize::Word => masked as i16 as i64,
        }
    } else {
        masked as i64
    };
    Ok(value)
}

/// Decode `raw` into a scaled value
pub fn decode(variable: &Variable, raw: &[u8]) -> Result<f64, VariableError> {
    let value = raw_value(variable, raw)? as f64;

    if variable.is_inverse() {
        let divisor = value - variable.offset();
        if divisor == 0.0 {
            return Err(VariableError::DivisionByZero {
                name: variable.name().to_string(),
            });
        }
        Ok(variable.factor() / divisor)
    } else {
        Ok(variable.factor() * value - variable.offset())
    }
}

/// Encode an unscaled integer into the variable's raw bytes.
///
/// The value must survive the variable's bitmask and sign rules unchanged.
pub fn encode_raw(variable: &Variable, value: i64) -> Result<Vec<u8>, VariableError> {
    let size = variable.size();
    let out_of_range = || VariableError::ValueOutOfRange {
        name: variable.name().to_string(),
        value,
    };

    let bits = size.bits();
    let (min, max) = if variable.is_signed() {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    } else {
        (0, (1i64 << bits) - 1)
    };
    if value < min || value > max {
        return Err(out_of_range());
    }

    let unsigned = (value as u64 & size.full_mask() as u64) as u16;
    if unsigned & !variable.bitmask() != 0 {
        return Err(out_of_range());
    }

    let bytes = match size {
        VariableSize::Byte => vec![unsigned as u8],
        VariableSize::Word => {
            let mut buf = vec![0u8; 2];
            BigEndian::write_u16(&mut buf, unsigned);
            buf
        }
    };

    // A sign bit hidden by the mask would decode differently
    if raw_value(variable, &bytes)? != value {
        return Err(out_of_range());
    }
    Ok(bytes)
}
