//! Inspect and extract search-mode PSRFITS data
//!
//! # Usage Examples
//!
//! ## Observation summary
//! ```bash
//! psrdump info obs.sf
//! psrdump info obs.sf --json
//! ```
//!
//! ## Extract rows 10 to 19, 16x time and 4x frequency downsampled
//! ```bash
//! psrdump extract obs.sf -o obs.f32 --start 10 --end 19 -t 16 -f 4 --axes
//! ```
//!
//! The output file holds raw little-endian `f32` values in `[time, pol, chan]`
//! order. With `--axes`, `<output>.times` and `<output>.freqs` hold one value
//! per line.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use psrsearch::{ByteOrder, DataRequest, ObservationParams, PsrFits};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Endian {
    Big,
    Little,
}

impl From<Endian> for ByteOrder {
    fn from(e: Endian) -> Self {
        match e {
            Endian::Big => ByteOrder::Big,
            Endian::Little => ByteOrder::Little,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Search-mode PSRFITS inspection and extraction", long_about = None)]
struct Args {
    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the observation parameters of a file
    Info {
        file: String,

        /// Print as a JSON object
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode rows into a raw f32 file
    Extract {
        file: String,

        /// Output path for the raw samples
        #[arg(short, long)]
        output: PathBuf,

        /// First row (0-based)
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last row, inclusive; negative counts from the end (default: all rows)
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        end: i64,

        /// Samples averaged per output step (0 integrates whole rows)
        #[arg(short, long, default_value_t = 1)]
        time_downsample: usize,

        /// Channels averaged per output channel
        #[arg(short, long, default_value_t = 1)]
        freq_downsample: usize,

        /// Skip DAT_SCL, DAT_OFFS and DAT_WTS
        #[arg(long, default_value_t = false)]
        no_scales: bool,

        /// Drop length-1 axes
        #[arg(long, default_value_t = false)]
        squeeze: bool,

        /// Also write time and frequency axes next to the output
        #[arg(long, default_value_t = false)]
        axes: bool,

        /// Byte order of 16 and 32-bit samples
        #[arg(long, default_value = "big")]
        byte_order: Endian,
    },
}

#[derive(Serialize)]
struct InfoReport<'a> {
    file: &'a str,
    obs_mode: &'a str,
    search_mode: bool,
    nrows: usize,
    nsblk: usize,
    npol: usize,
    nchan: usize,
    nbits: u32,
    tbin: f64,
    pol_type: &'a str,
    duration: f64,
    freq_lo: Option<f64>,
    freq_hi: Option<f64>,
}

impl<'a> InfoReport<'a> {
    fn new(file: &'a str, obs: &'a ObservationParams, freqs: &[f64]) -> Self {
        Self {
            file,
            obs_mode: &obs.obs_mode,
            search_mode: obs.is_search_mode(),
            nrows: obs.nrows,
            nsblk: obs.nsblk,
            npol: obs.npol,
            nchan: obs.nchan,
            nbits: obs.nbits,
            tbin: obs.tbin,
            pol_type: &obs.pol_type,
            duration: obs.duration(),
            freq_lo: freqs.iter().copied().reduce(f64::min),
            freq_hi: freqs.iter().copied().reduce(f64::max),
        }
    }
}

fn main() -> psrsearch::Result<()> {
    let args = Args::parse();

    // 0 = WARN (quiet), 1 = INFO, 2 = DEBUG, 3+ = TRACE
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    match args.command {
        Command::Info { file, json } => print_info(&file, json),
        Command::Extract {
            file,
            output,
            start,
            end,
            time_downsample,
            freq_downsample,
            no_scales,
            squeeze,
            axes,
            byte_order,
        } => {
            let psr = PsrFits::open(&file)?.with_byte_order(byte_order.into());
            let req = DataRequest::new()
                .start_row(start)
                .end_row(end)
                .time_downsample(time_downsample)
                .freq_downsample(freq_downsample)
                .apply_scales(!no_scales)
                .squeeze(squeeze)
                .get_axes(axes);
            extract(&psr, &req, &output)
        }
    }
}

fn print_info(file: &str, json: bool) -> psrsearch::Result<()> {
    let psr = PsrFits::open(file)?;
    let obs = psr.observation()?;
    let freqs = if obs.nrows > 0 {
        psr.get_freqs(0)?
    } else {
        Vec::new()
    };
    let report = InfoReport::new(file, &obs, &freqs);

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        println!("{text}");
        return Ok(());
    }

    let mode = if report.search_mode { "search" } else { "not search" };
    println!("{}", report.file);
    println!("  mode       {} ({mode})", report.obs_mode);
    println!("  rows       {} x {} samples", report.nrows, report.nsblk);
    println!("  tbin       {:.6e} s", report.tbin);
    println!("  duration   {:.3} s", report.duration);
    println!("  pols       {} ({})", report.npol, report.pol_type);
    println!("  channels   {}", report.nchan);
    println!("  bits       {}", report.nbits);
    if let (Some(lo), Some(hi)) = (report.freq_lo, report.freq_hi) {
        println!("  band       {lo:.3} - {hi:.3} MHz");
    }
    Ok(())
}

fn extract(psr: &PsrFits, req: &DataRequest, output: &Path) -> psrsearch::Result<()> {
    let data = psr.get_data(req)?;
    info!(shape = ?data.data.shape(), output = %output.display(), "writing samples");

    let mut out = BufWriter::new(File::create(output)?);
    for v in data.data.iter() {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()?;

    if let Some(times) = &data.times {
        write_axis(&output.with_extension("times"), times)?;
    }
    if let Some(freqs) = &data.freqs {
        write_axis(&output.with_extension("freqs"), freqs)?;
    }
    Ok(())
}

fn write_axis(path: &Path, values: &[f64]) -> psrsearch::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(out, "{v}")?;
    }
    out.flush()?;
    info!(path = %path.display(), len = values.len(), "wrote axis");
    Ok(())
}
