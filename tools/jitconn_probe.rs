// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Run a single JIT connectivity operator from the command line.
//!
//! Builds the host arrays, sends them through the [`Dispatcher`] and prints a
//! summary of the output (length, sum, mean, nonzero count, elapsed time).
//!
//! ```text
//! jitconn_probe --rows 1000 --cols 1000 --conn-prob 0.1 --seed 7
//! jitconn_probe --rows 4096 --cols 4096 --clen 39 --operand events \
//!     --event-density 0.05 --column-parallel --device auto --json
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use jitconn::config::{load_config_or_default, validate_config};
use jitconn::connectivity::clen_for_conn_prob;
use jitconn::kernels::{Device, Dispatcher, HostArray, MatvecCall, OperandKind, WeightArgs};
use jitconn::observability::{env_debug_flags, init_logging, LoggingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Homo,
    Uniform,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operand {
    Dense,
    Events,
    FloatEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Precision {
    F32,
    F64,
}

/// Probe a JIT connectivity matvec
#[derive(Parser, Debug)]
#[command(name = "jitconn_probe", version, about, long_about = None)]
struct Args {
    /// Logical number of rows
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// Logical number of columns
    #[arg(long, default_value_t = 1000)]
    cols: usize,

    /// Connection probability in (0, 1], ignored when --clen is given
    #[arg(long, default_value_t = 0.1)]
    conn_prob: f64,

    /// Connection length (overrides --conn-prob)
    #[arg(long)]
    clen: Option<i64>,

    /// Connectivity seed
    #[arg(long, default_value_t = 0)]
    seed: i64,

    /// Weight distribution
    #[arg(long, value_enum, default_value_t = Mode::Homo)]
    mode: Mode,

    /// Weight (homo), low (uniform) or mu (normal)
    #[arg(long, default_value_t = 1.0)]
    w0: f64,

    /// High (uniform) or sigma (normal)
    #[arg(long, default_value_t = 1.0)]
    w1: f64,

    /// Operand kind
    #[arg(long, value_enum, default_value_t = Operand::Dense)]
    operand: Operand,

    /// Fraction of active events for event operands
    #[arg(long, default_value_t = 0.1)]
    event_density: f64,

    /// Value type
    #[arg(long, value_enum, default_value_t = Precision::F32)]
    dtype: Precision,

    /// Multiply by the transposed matrix
    #[arg(long, default_value_t = false)]
    transpose: bool,

    /// Stream over input columns instead of output rows
    #[arg(long, default_value_t = false)]
    column_parallel: bool,

    /// Device (cpu, lanes, gpu, auto); defaults to the configured device
    #[arg(long)]
    device: Option<String>,

    /// Path to jitconn.toml (discovered when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logs for a crate (repeatable, "all" for every crate);
    /// adds to JITCONN_DEBUG
    #[arg(long)]
    debug: Vec<String>,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    operator: String,
    device: String,
    shape: (usize, usize),
    clen: i64,
    seed: i64,
    output_len: usize,
    sum: f64,
    mean: f64,
    nonzero: usize,
    elapsed_ms: f64,
}

fn scalar(value: f64, dtype: Precision) -> HostArray {
    match dtype {
        Precision::F32 => HostArray::scalar(value as f32),
        Precision::F64 => HostArray::scalar(value),
    }
}

fn float_vector(values: Vec<f64>, dtype: Precision) -> HostArray {
    match dtype {
        Precision::F32 => HostArray::from(values.into_iter().map(|v| v as f32).collect::<Vec<_>>()),
        Precision::F64 => HostArray::from(values),
    }
}

fn build_operand(args: &Args, len: usize) -> (HostArray, OperandKind) {
    let mut rng = StdRng::seed_from_u64(args.seed as u64);
    match args.operand {
        Operand::Dense => {
            let values = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
            (float_vector(values, args.dtype), OperandKind::Dense)
        }
        Operand::Events => {
            let events: Vec<bool> = (0..len).map(|_| rng.gen_bool(args.event_density)).collect();
            (HostArray::from(events), OperandKind::BoolEvents)
        }
        Operand::FloatEvents => {
            let values = (0..len)
                .map(|_| if rng.gen_bool(args.event_density) { 1.0 } else { 0.0 })
                .collect();
            (float_vector(values, args.dtype), OperandKind::FloatEvents)
        }
    }
}

fn output_values(out: &HostArray) -> Result<Vec<f64>> {
    match out {
        HostArray::F32(values) => Ok(values.iter().map(|&v| v as f64).collect()),
        HostArray::F64(values) => Ok(values.iter().copied().collect()),
        other => bail!("unexpected output dtype {}", other.dtype()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !(0.0..=1.0).contains(&args.event_density) {
        bail!("--event-density must be in [0, 1], got {}", args.event_density);
    }

    let mut cli_overrides = HashMap::new();
    if let Some(device) = &args.device {
        cli_overrides.insert("device".to_string(), device.clone());
    }
    let config = load_config_or_default(args.config.as_deref(), Some(&cli_overrides))
        .context("Failed to load jitconn configuration")?;
    validate_config(&config).context("Invalid jitconn configuration")?;

    let mut debug_flags = env_debug_flags();
    for crate_name in &args.debug {
        if crate_name == "all" {
            debug_flags.enable_all();
        } else {
            debug_flags.enable(crate_name);
        }
    }
    let logging = LoggingConfig::default()
        .with_level(config.logging.level.clone())
        .with_log_dir(config.logging.log_dir.clone())
        .with_retention_runs(config.logging.retention_runs);

    #[cfg(feature = "file-logging")]
    let _guard = if config.logging.file_logging {
        Some(jitconn::observability::init_file_logging(&debug_flags, &logging)?)
    } else {
        init_logging(&debug_flags, &logging)?;
        None
    };
    #[cfg(not(feature = "file-logging"))]
    init_logging(&debug_flags, &logging)?;

    let dispatcher = Dispatcher::from_config(&config).context("Failed to create dispatcher")?;
    let device: Device = dispatcher.default_device();

    let clen = match args.clen {
        Some(clen) => clen,
        None => clen_for_conn_prob(args.conn_prob)? as i64,
    };
    info!(
        "🚀 jitconn_probe {}x{} clen={} seed={} mode={:?} operand={:?} device={}",
        args.rows, args.cols, clen, args.seed, args.mode, args.operand, device
    );

    let input_len = if args.transpose { args.rows } else { args.cols };
    let (operand, operand_kind) = build_operand(&args, input_len);
    let w0 = scalar(args.w0, args.dtype);
    let w1 = scalar(args.w1, args.dtype);
    let weights = match args.mode {
        Mode::Homo => WeightArgs::Homogeneous { weight: &w0 },
        Mode::Uniform => WeightArgs::Uniform { low: &w0, high: &w1 },
        Mode::Normal => WeightArgs::Normal { mu: &w0, sigma: &w1 },
    };
    let clen_array = HostArray::scalar(clen);
    let seed_array = HostArray::scalar(args.seed);
    let shape = [args.rows, args.cols];

    let call = MatvecCall::new(
        &operand,
        operand_kind,
        weights,
        &clen_array,
        &seed_array,
        &shape,
    )
    .transpose(args.transpose)
    .outdim_parallel(!args.column_parallel);

    let start = Instant::now();
    let out = dispatcher.invoke(&call)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!("Output dtype {}, shape {:?}", out.dtype(), out.shape());

    let values = output_values(&out)?;
    let sum: f64 = values.iter().sum();
    let summary = Summary {
        operator: call.id().variant_name(),
        device: device.to_string(),
        shape: (args.rows, args.cols),
        clen,
        seed: args.seed,
        output_len: values.len(),
        sum,
        mean: if values.is_empty() {
            0.0
        } else {
            sum / values.len() as f64
        },
        nonzero: values.iter().filter(|&&v| v != 0.0).count(),
        elapsed_ms,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("operator:   {}", summary.operator);
        println!("device:     {}", summary.device);
        println!("shape:      {} x {}", summary.shape.0, summary.shape.1);
        println!("clen/seed:  {} / {}", summary.clen, summary.seed);
        println!("length:     {}", summary.output_len);
        println!("sum:        {:.6}", summary.sum);
        println!("mean:       {:.6}", summary.mean);
        println!("nonzero:    {}", summary.nonzero);
        println!("elapsed:    {:.3} ms", summary.elapsed_ms);
    }

    Ok(())
}
