//! CSV output for recorded logs
//!
//! One header row of `name (unit)` labels after a leading `Time` column, then
//! one row per entry: seconds since start with millisecond precision and each
//! value to four decimals.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::{Channel, LogEntry};

/// Output formats a log can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Comma-separated values
    Csv,
}

impl LogFormat {
    /// Pick a format from the file extension, case-insensitively
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.eq_ignore_ascii_case("csv").then_some(LogFormat::Csv)
    }
}

/// Quote a field when it holds a separator, quote or line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Write entries to a CSV file at `path`
pub fn write_csv<'a, P, I>(path: P, channels: &[Channel], entries: I) -> io::Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv_to(&mut writer, channels, entries)?;
    writer.flush()
}

/// Write entries as CSV to `writer`.
///
/// Entries carrying fewer values than there are channels get empty cells.
pub fn write_csv_to<'a, W, I>(writer: &mut W, channels: &[Channel], entries: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut header = String::from("Time");
    for channel in channels {
        header.push(',');
        header.push_str(&escape_field(&channel.label()));
    }
    writeln!(writer, "{}", header)?;

    for entry in entries {
        write!(writer, "{:.3}", entry.timestamp.as_secs_f64())?;
        for i in 0..channels.len() {
            match entry.values.get(i) {
                Some(value) => write!(writer, ",{:.4}", value)?,
                None => write!(writer, ",")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}
