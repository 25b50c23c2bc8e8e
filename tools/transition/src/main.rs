/// Land-cover transition tool: compares a "from" and a "to" class raster and
/// writes a per-pixel transition-code raster, a count matrix and a legend.
mod logging;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use lulc_core::engine::PixelStats;
use lulc_core::{
    run_transition, AlignMode, ClassValue, LogProgress, OutputPaths, TransitionConfig,
    TransitionOutcome,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug, Clone)]
#[command(
    name = "transition",
    about = "Compute land-cover transitions between two aligned class rasters"
)]
struct Args {
    /// Earlier class raster (GeoTIFF)
    #[arg(short, long)]
    from: PathBuf,

    /// Later class raster (GeoTIFF)
    #[arg(short, long)]
    to: PathBuf,

    /// Directory for the three outputs (created if absent)
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Rows per streamed band (default: the "from" raster's strip height)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    block_rows: Option<u64>,

    /// Nodata value of the "from" raster, overriding the file's
    #[arg(long, value_parser = parse_nodata, allow_hyphen_values = true)]
    from_nodata: Option<f64>,

    /// Nodata value of the "to" raster, overriding the file's
    #[arg(long, value_parser = parse_nodata, allow_hyphen_values = true)]
    to_nodata: Option<f64>,

    /// How to reconcile the two grids
    #[arg(long, value_enum)]
    align: Option<AlignArg>,

    /// JSON config file; flags given here take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a JSON summary to stdout when done
    #[arg(long)]
    summary: bool,

    /// Increase verbosity (default info, -v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum AlignArg {
    Strict,
    Intersection,
}

impl From<AlignArg> for AlignMode {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Strict => AlignMode::Strict,
            AlignArg::Intersection => AlignMode::Intersection,
        }
    }
}

fn parse_nodata(text: &str) -> std::result::Result<f64, String> {
    lulc_core::nodata::parse_value(text).map_err(|e| e.to_string())
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Summary<'a> {
    outputs: &'a OutputPaths,
    pixels: PixelStats,
    transition_codes: usize,
    from_classes: &'a [ClassValue],
    to_classes: &'a [ClassValue],
}

impl<'a> Summary<'a> {
    fn new(outcome: &'a TransitionOutcome, outputs: &'a OutputPaths) -> Self {
        Self {
            outputs,
            pixels: outcome.stats,
            transition_codes: outcome.legend.transition_count(),
            from_classes: outcome.matrix.from_values(),
            to_classes: outcome.matrix.to_values(),
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!(?args, "transition failed: {e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let mut progress = LogProgress::new(config.progress_interval());

    let outcome = run_transition(&args.from, &args.to, &args.output_dir, &config, &mut progress)
        .with_context(|| {
            format!(
                "computing transitions from {} to {}",
                args.from.display(),
                args.to.display()
            )
        })?;

    let outputs = OutputPaths::in_dir(&args.output_dir);
    eprintln!(
        "{} pixels: {} unchanged, {} changed, {} nodata; {} transition codes -> {}",
        outcome.stats.total,
        outcome.stats.unchanged,
        outcome.stats.changed,
        outcome.stats.nodata,
        outcome.legend.transition_count(),
        args.output_dir.display()
    );
    if args.summary {
        let json = serde_json::to_string_pretty(&Summary::new(&outcome, &outputs))
            .context("serialising summary")?;
        println!("{json}");
    }
    Ok(())
}

/// Config file (if any) with command-line flags layered on top.
fn build_config(args: &Args) -> Result<TransitionConfig> {
    let mut config = match &args.config {
        Some(path) => TransitionConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TransitionConfig::default(),
    };
    if let Some(rows) = args.block_rows {
        config.block_rows =
            Some(usize::try_from(rows).context("--block-rows does not fit this platform")?);
    }
    if args.from_nodata.is_some() {
        config.from_nodata = args.from_nodata;
    }
    if args.to_nodata.is_some() {
        config.to_nodata = args.to_nodata;
    }
    if let Some(align) = args.align {
        config.align = align.into();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    fn parse(extra: &[&str]) -> std::result::Result<Args, clap::Error> {
        let mut argv = vec!["transition", "-f", "a.tif", "-t", "b.tif", "-o", "out"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn minimal_invocation() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.from, PathBuf::from("a.tif"));
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert!(!args.summary);
        let config = build_config(&args).unwrap();
        assert_eq!(config, TransitionConfig::default());
    }

    #[test]
    fn output_flags_are_required() {
        assert!(Args::try_parse_from(["transition", "-f", "a.tif", "-t", "b.tif"]).is_err());
    }

    #[test]
    fn negative_and_nan_nodata_parse() {
        let args = parse(&["--from-nodata", "-9999", "--to-nodata", "nan"]).unwrap();
        assert_eq!(args.from_nodata, Some(-9999.0));
        assert!(args.to_nodata.unwrap().is_nan());
    }

    #[test]
    fn non_numeric_nodata_is_rejected() {
        assert!(parse(&["--from-nodata", "none"]).is_err());
    }

    #[test]
    fn zero_block_rows_is_rejected() {
        assert!(parse(&["--block-rows", "0"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "block_rows": 8, "align": "intersection", "to_nodata": 0 }}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let args = parse(&[
            "--config",
            path.as_str(),
            "--block-rows",
            "32",
            "--align",
            "strict",
        ])
        .unwrap();

        let config = build_config(&args).unwrap();
        assert_eq!(config.block_rows, Some(32));
        assert_eq!(config.align, AlignMode::Strict);
        assert_eq!(config.to_nodata, Some(0.0));
    }

    #[test]
    fn verbosity_counts() {
        assert_eq!(parse(&["-vv"]).unwrap().verbose, 2);
    }
}
