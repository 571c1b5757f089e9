use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossbeam_channel::unbounded;
use dotenvy::dotenv;
use std::fs::File;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use taq_decode::{load, Column, DecoderConfig, LoadedFile, RecordKind};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Decode extracted NYSE TAQ record files")]
struct Args {
    /// Extracted TAQ record files; `-` reads stdin
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Record kind (master|mtr, quotes|qts, trades|trd, bbo)
    #[arg(long, short = 'k', env = "TAQ_KIND", default_value = "bbo")]
    kind: RecordKind,

    /// Record lines read per I/O call
    #[arg(long, env = "TAQ_CHUNK_ROWS", default_value_t = taq_decode::config::DEFAULT_CHUNK_ROWS)]
    chunk_rows: NonZeroUsize,

    /// Split the table into numeric and categorical views
    #[arg(long, env = "TAQ_PROCESSED", default_value_t = true, action = ArgAction::Set)]
    processed: bool,

    /// Shorthand for `--processed false`
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Rows to print per file
    #[arg(long, default_value_t = 5)]
    head: usize,

    /// Print composed epoch-millisecond timestamps with each row
    #[arg(long, default_value_t = false)]
    timestamps: bool,
}

impl Args {
    fn config(&self) -> DecoderConfig {
        DecoderConfig { kind: self.kind, chunk_rows: self.chunk_rows, processed: self.processed && !self.raw }
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let f = File::open(path).with_context(|| format!("open {:?}", path))?;
    Ok(Box::new(f))
}

fn decode_file(path: &Path, config: &DecoderConfig) -> Result<LoadedFile> {
    let input = open_input(path)?;
    load(input, config).with_context(|| format!("decode {:?}", path))
}

fn cell(col: &Column, row: usize) -> String {
    match col.get(row) {
        Some(taq_decode::FieldValue::Numeric(v)) => v.to_string(),
        Some(taq_decode::FieldValue::Categorical(b)) => format!("{:?}", String::from_utf8_lossy(b)),
        None => "-".to_string(),
    }
}

fn report(path: &Path, file: &LoadedFile, args: &Args) -> Result<()> {
    let h = &file.header;
    let base = OffsetDateTime::from_unix_timestamp(file.base_time.epoch_seconds)?
        .to_offset(time::UtcOffset::from_whole_seconds(file.base_time.utc_offset_seconds)?);
    let base_str = base.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"))?;
    println!(
        "{}: {:04}-{:02}-{:02} declared={} decoded={} line_len={} base={} ({})",
        path.display(),
        h.year,
        h.month,
        h.day,
        h.record_count,
        file.table.len(),
        h.line_length,
        file.base_time.epoch_seconds,
        base_str
    );

    let ts = if args.timestamps { file.timestamps_ms() } else { None };
    let rows = args.head.min(file.table.len());
    if let (Some(nums), Some(cats)) = (file.numeric(), file.categorical()) {
        println!("  numeric: {}", nums.schema().join(","));
        println!("  categorical: {}", cats.schema().join(","));
        for i in 0..rows {
            let n = nums.columns().map(|(_, c)| cell(c, i)).collect::<Vec<_>>().join(" ");
            let c = cats.columns().map(|(_, c)| cell(c, i)).collect::<Vec<_>>().join(" ");
            match &ts {
                Some(ts) => println!("  {:>6} {} | {} | {}", i, ts[i], n, c),
                None => println!("  {:>6} {} | {}", i, n, c),
            }
        }
    } else {
        println!("  columns: {}", file.table.schema().join(","));
        for i in 0..rows {
            let r = file.table.columns().map(|(_, c)| cell(c, i)).collect::<Vec<_>>().join(" ");
            match &ts {
                Some(ts) => println!("  {:>6} {} | {}", i, ts[i], r),
                None => println!("  {:>6} {}", i, r),
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    let config = args.config();

    // One decode session per input; sessions share nothing but the layout registry.
    let (tx, rx) = unbounded::<(usize, Result<LoadedFile>)>();
    std::thread::scope(|s| {
        for (idx, path) in args.inputs.iter().enumerate() {
            let tx = tx.clone();
            let config = config.clone();
            s.spawn(move || {
                let _ = tx.send((idx, decode_file(path, &config)));
            });
        }
    });
    drop(tx);

    let mut results: Vec<_> = rx.iter().collect();
    results.sort_by_key(|(idx, _)| *idx);
    let mut failed = 0usize;
    for (idx, res) in results {
        let path = &args.inputs[idx];
        match res {
            Ok(file) => report(path, &file, &args)?,
            Err(e) => {
                failed += 1;
                error!("{e:#}");
            }
        }
    }
    info!(files = args.inputs.len(), failed, "done");
    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed to decode", args.inputs.len());
    }
    Ok(())
}
