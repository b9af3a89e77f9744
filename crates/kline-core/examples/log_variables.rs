//! K-line Logging Tool
//!
//! Connects to an ECU, registers variables from a definition file and logs
//! them to CSV.
//!
//! Usage:
//!   cargo run --example log_variables -- [OPTIONS] VARIABLES.json
//!
//! Options:
//!   --port PORT       Serial port (default: first detected adapter)
//!   --config FILE     Connection configuration JSON
//!   --baud RATE       Switch to RATE after connecting (19200, 38400, 56000, 57600)
//!   --samples N       Number of records to read (default: 100)
//!   --rate HZ         Logging rate in Hz (default: 10)
//!   --out FILE        CSV output (default: log.csv)
//!
//! Set `RUST_LOG=kline_core=debug` to see the exchanged frames.

use anyhow::{bail, Context, Result};
use kline_core::datalog::{load_variables, DataLogger, LogSession};
use kline_core::protocol::{Connection, ConnectionConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    port: Option<String>,
    config: Option<String>,
    baud: Option<u32>,
    samples: usize,
    rate: f64,
    out: String,
    variables: String,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut port = None;
    let mut config = None;
    let mut baud = None;
    let mut samples = 100;
    let mut rate = 10.0;
    let mut out = "log.csv".to_string();
    let mut variables = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--port" | "-p" => port = Some(value("--port")?),
            "--config" | "-c" => config = Some(value("--config")?),
            "--baud" | "-b" => baud = Some(value("--baud")?.parse().context("invalid --baud")?),
            "--samples" | "-n" => samples = value("--samples")?.parse().context("invalid --samples")?,
            "--rate" | "-r" => rate = value("--rate")?.parse().context("invalid --rate")?,
            "--out" | "-o" => out = value("--out")?,
            other if other.starts_with('-') => bail!("unknown option {}", other),
            other => variables = Some(other.to_string()),
        }
    }

    Ok(Args {
        port,
        config,
        baud,
        samples,
        rate,
        out,
        variables: variables.context("missing variable definition file")?,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kline_core=info")),
        )
        .init();

    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => ConnectionConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path))?,
        None => ConnectionConfig::default(),
    };
    if let Some(port) = args.port {
        config.port_name = port;
    }
    if config.port_name.is_empty() {
        let ports = Connection::list_ports();
        let first = ports.first().context("no serial ports found")?;
        config.port_name = first.name.clone();
    }
    info!("Using port {}", config.port_name);

    let variables = load_variables(&args.variables)
        .with_context(|| format!("loading {}", args.variables))?;

    let mut conn = Connection::serial(config);
    conn.connect("slow-init").context("ECU handshake failed")?;

    if let Some(baud) = args.baud {
        let response = conn.start_diag_session(baud)?;
        if response.is_negative() {
            conn.close()?;
            bail!("ECU refused {} baud: {:02X?}", baud, response.as_bytes());
        }
    }

    let mut session = LogSession::new();
    session.prepare_log_variables(&mut conn, variables)?;

    let mut logger = DataLogger::new(session.variables());
    logger.set_sample_rate(args.rate);
    logger.start();

    let interval = Duration::from_secs_f64(1.0 / logger.sample_rate());
    for _ in 0..args.samples {
        let record = session.sample(&mut conn)?;
        logger.record(&record);
        std::thread::sleep(interval);
    }
    logger.stop();

    logger.export_csv(&args.out)?;
    info!("Wrote {} records to {}", logger.entry_count(), args.out);

    conn.close()?;
    Ok(())
}
