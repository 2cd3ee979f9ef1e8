//! trackrec: extract straight tracks from TPC hit dumps and refine them.
//!
//! Input is a JSON array of events, each an array of hits. Every event is
//! extracted (RANSAC or DBSCAN) and then passed through the configured
//! action pipeline.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use trackrec_actions::{ActionRegistry, Pipeline, PipelineConfig, PipelineError};
use trackrec_algorithms::{
    extract_events, DbscanConfig, ExtractionAlgorithm, ExtractionError, ExtractionParams,
    RansacConfig, SamplerConfig, SamplingMethod,
};
use trackrec_core::{coalesce_hits, Hit, TrackEvent};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] trackrec_core::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Extraction algorithm selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Random sample consensus (default)
    Ransac,
    /// Density-based clustering
    Dbscan,
}

impl From<Algorithm> for ExtractionAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Ransac => ExtractionAlgorithm::Ransac,
            Algorithm::Dbscan => ExtractionAlgorithm::Dbscan,
        }
    }
}

/// Hypothesis sampler selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sampling {
    /// Uniform over all hits
    Uniform,
    /// Gaussian around a uniformly drawn reference hit
    Gaussian,
    /// Proportional to charge
    Charge,
    /// Gaussian around a charge-weighted reference hit
    WeightedGaussian,
}

impl From<Sampling> for SamplingMethod {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::Uniform => SamplingMethod::Uniform,
            Sampling::Gaussian => SamplingMethod::Gaussian,
            Sampling::Charge => SamplingMethod::Charge,
            Sampling::WeightedGaussian => SamplingMethod::WeightedGaussian,
        }
    }
}

/// Extraction parameters shared by `process` and `benchmark`.
#[derive(Args, Debug, Clone)]
struct ExtractionArgs {
    /// Extraction algorithm
    #[arg(short, long, value_enum, default_value = "ransac")]
    algorithm: Algorithm,

    /// RANSAC iterations per event
    #[arg(long, default_value = "1000")]
    iterations: usize,

    /// Minimum inliers for a RANSAC pattern
    #[arg(long, default_value = "30")]
    min_pattern_points: usize,

    /// RANSAC inlier distance
    #[arg(long, default_value = "15.0")]
    distance_threshold: f64,

    /// Charge floor applied to the final fits
    #[arg(long)]
    charge_threshold: Option<f64>,

    /// Hypothesis sampler
    #[arg(long, value_enum, default_value = "uniform")]
    sampler: Sampling,

    /// Width of the Gaussian samplers
    #[arg(long, default_value = "30.0")]
    sigma: f64,

    /// DBSCAN neighbourhood radius
    #[arg(long, default_value = "5.0")]
    epsilon: f64,

    /// DBSCAN core-point neighbourhood size
    #[arg(long, default_value = "2")]
    min_points: usize,

    /// DBSCAN minimum cluster size
    #[arg(long, default_value = "1")]
    min_cluster_size: usize,
}

impl ExtractionArgs {
    fn params(&self) -> ExtractionParams {
        let sampler = SamplerConfig::default()
            .with_method(self.sampler.into())
            .with_sigma(self.sigma);
        let mut ransac = RansacConfig::default()
            .with_iterations(self.iterations)
            .with_min_pattern_points(self.min_pattern_points)
            .with_distance_threshold(self.distance_threshold)
            .with_sampler(sampler);
        if let Some(threshold) = self.charge_threshold {
            ransac = ransac.with_charge_threshold(threshold);
        }
        ExtractionParams::default()
            .with_algorithm(self.algorithm.into())
            .with_ransac(ransac)
            .with_dbscan(
                DbscanConfig::default()
                    .with_epsilon(self.epsilon)
                    .with_min_points(self.min_points)
                    .with_min_cluster_size(self.min_cluster_size),
            )
    }
}

/// TPC track reconstruction.
#[derive(Parser)]
#[command(name = "trackrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tracks and run the action pipeline over every event
    Process {
        /// Input JSON file (array of events, each an array of hits)
        input: PathBuf,

        /// Write processed events as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pipeline configuration (JSON); no actions run without one
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        #[command(flatten)]
        extraction: ExtractionArgs,

        /// Merge hits sharing a voxel of this pitch before extraction
        #[arg(long)]
        coalesce: Option<f64>,

        /// Base seed; event i uses seed + i
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Show information about an input file
    Info {
        /// Input JSON file
        input: PathBuf,
    },

    /// List the built-in actions
    Actions,

    /// Time both extraction algorithms
    Benchmark {
        /// Input JSON file
        input: PathBuf,

        /// Timed runs per algorithm
        #[arg(short, long, default_value = "3")]
        runs: usize,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },
}

fn load_events(path: &Path) -> Result<Vec<Vec<Hit>>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn load_pipeline(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn write_events(path: &Path, events: &[TrackEvent]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, events)?;
    writer.flush()?;
    Ok(())
}

fn coalesce(events: Vec<Vec<Hit>>, pitch: Option<f64>) -> Result<Vec<Vec<Hit>>> {
    let Some(pitch) = pitch else {
        return Ok(events);
    };
    let coalesced = events
        .iter()
        .map(|hits| coalesce_hits(hits, pitch))
        .collect::<trackrec_core::Result<Vec<_>>>()?;
    Ok(coalesced)
}

/// Extracts every event and runs a private pipeline instance over each.
///
/// Events the extractor refuses are kept with all hits as noise.
fn process_events(
    events: &[Vec<Hit>],
    params: &ExtractionParams,
    config: &PipelineConfig,
    seed: u64,
) -> Result<Vec<TrackEvent>> {
    let registry = ActionRegistry::with_builtins();
    let pipeline = Pipeline::from_config(config, &registry)?;
    debug!("pipeline:\n{}", pipeline.describe());

    let extractions = extract_events(events, params, seed);
    let processed = extractions
        .into_par_iter()
        .zip(events.par_iter())
        .enumerate()
        .map_init(
            || Pipeline::from_config(config, &registry),
            |pipeline, (idx, (extraction, hits))| -> std::result::Result<TrackEvent, PipelineError> {
                let pipeline = pipeline.as_mut().map_err(|err| err.clone())?;
                let mut event = match extraction {
                    Ok(extraction) => extraction.into_event(),
                    Err(err) => {
                        warn!("event {idx}: {err}; keeping all hits as noise");
                        TrackEvent::new(Vec::new(), hits.clone())
                    }
                };
                pipeline.run(&mut event)?;
                Ok(event)
            },
        )
        .collect::<std::result::Result<Vec<_>, PipelineError>>()?;
    Ok(processed)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Process {
            input,
            output,
            pipeline,
            extraction,
            coalesce: pitch,
            seed,
        } => {
            let start = Instant::now();
            let events = coalesce(load_events(&input)?, pitch)?;
            let config = load_pipeline(pipeline.as_deref())?;
            info!(
                "{} events from {}, algorithm {:?}, {} pipeline steps",
                events.len(),
                input.display(),
                extraction.algorithm,
                config.actions.len()
            );

            let processed = process_events(&events, &extraction.params(), &config, seed)?;

            let mut total_clusters = 0usize;
            let mut total_noise = 0usize;
            for (idx, event) in processed.iter().enumerate() {
                total_clusters += event.len();
                total_noise += event.noise.len();
                println!(
                    "event {}: {} clusters, {} clustered hits, {} noise hits, {} reaction points",
                    idx,
                    event.len(),
                    event.clustered_hits(),
                    event.noise.len(),
                    event.reaction_points.len()
                );
            }

            if let Some(path) = output {
                write_events(&path, &processed)?;
                info!("wrote {}", path.display());
            }

            println!(
                "Processed {} events in {:.2}s",
                processed.len(),
                start.elapsed().as_secs_f64()
            );
            println!("Total clusters: {}", total_clusters);
            println!("Total noise hits: {}", total_noise);
        }

        Commands::Info { input } => {
            let events = load_events(&input)?;
            let hits: Vec<&Hit> = events.iter().flatten().collect();

            println!("File: {}", input.display());
            println!("Events: {}", events.len());
            println!("Hits: {}", hits.len());
            if let (Some(min), Some(max)) = (
                events.iter().map(Vec::len).min(),
                events.iter().map(Vec::len).max(),
            ) {
                println!("Hits per event: {} - {}", min, max);
            }
            if !hits.is_empty() {
                let range = |f: fn(&Hit) -> f64| {
                    hits.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
                        (lo.min(f(h)), hi.max(f(h)))
                    })
                };
                let (x0, x1) = range(|h| h.pos.x);
                let (y0, y1) = range(|h| h.pos.y);
                let (z0, z1) = range(|h| h.pos.z);
                println!("X range: {:.2} - {:.2}", x0, x1);
                println!("Y range: {:.2} - {:.2}", y0, y1);
                println!("Z range: {:.2} - {:.2}", z0, z1);
                println!("Total charge: {:.2}", hits.iter().map(|h| h.charge).sum::<f64>());
                println!("Saturated: {}", hits.iter().filter(|h| h.saturated).count());
            }
        }

        Commands::Actions => {
            for name in ActionRegistry::with_builtins().names() {
                println!("{}", name);
            }
        }

        Commands::Benchmark {
            input,
            runs,
            extraction,
        } => {
            let events = load_events(&input)?;
            let runs = runs.max(1);
            println!("Benchmarking with {} events, {} runs", events.len(), runs);
            println!(
                "{:<10} | {:<15} | {:<15} | {:<15}",
                "Algorithm", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<65}", "");

            for (algorithm, name) in [(Algorithm::Ransac, "RANSAC"), (Algorithm::Dbscan, "DBSCAN")] {
                let params = ExtractionArgs {
                    algorithm,
                    ..extraction.clone()
                }
                .params();

                let mut times = Vec::with_capacity(runs);
                for run in 0..runs {
                    let start = Instant::now();
                    let results = extract_events(&events, &params, run as u64);
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                    let failed = results.iter().filter(|r| r.is_err()).count();
                    if failed > 0 {
                        debug!("{}: {} events refused", name, failed);
                    }
                }

                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len() as f64;
                println!(
                    "{:<10} | {:<15.2} | {:<15.2} | {:<15.2}",
                    name, mean_time, min_time, max_time
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn two_tracks() -> Vec<Hit> {
        let mut hits: Vec<Hit> = (0..40).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 5.0)).collect();
        hits.extend((0..40).map(|i| Hit::at(f64::from(i), 30.0, 10.0, 5.0)));
        hits
    }

    fn write_json<T: serde::Serialize>(value: &T) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        serde_json::to_writer(file.as_file(), value).unwrap();
        file
    }

    fn dbscan_params() -> ExtractionParams {
        ExtractionParams::default()
            .with_algorithm(ExtractionAlgorithm::Dbscan)
            .with_dbscan(DbscanConfig::default().with_epsilon(1.5))
    }

    #[test]
    fn test_process_round_trip() {
        let input = write_json(&vec![two_tracks(), vec![Hit::at(0.0, 0.0, 0.0, 1.0)]]);
        let pipeline_json = r#"{
            "actions": [
                { "name": "clean", "options": { "min_hits": 5 } },
                { "name": "clean-bad-fits" }
            ]
        }"#;
        let pipeline = NamedTempFile::new().unwrap();
        std::fs::write(pipeline.path(), pipeline_json).unwrap();

        let events = load_events(input.path()).unwrap();
        let config = load_pipeline(Some(pipeline.path())).unwrap();
        assert_eq!(config.actions.len(), 2);

        let processed = process_events(&events, &dbscan_params(), &config, 3).unwrap();
        assert_eq!(processed.len(), 2);
        assert_eq!(processed[0].len(), 2);
        assert!(processed[0].clusters.iter().all(|c| c.len() == 40));
        assert!(processed[1].is_empty());
        assert_eq!(processed[1].noise.len(), 1);

        let output = NamedTempFile::new().unwrap();
        write_events(output.path(), &processed).unwrap();
        let text = std::fs::read_to_string(output.path()).unwrap();
        let read_back: Vec<TrackEvent> = serde_json::from_str(&text).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].clustered_hits(), 80);
    }

    #[test]
    fn test_refused_event_kept_as_noise() {
        let events = vec![vec![Hit::at(0.0, 0.0, 0.0, 1.0); 3]];
        let params = ExtractionParams::default();
        let processed = process_events(&events, &params, &PipelineConfig::default(), 0).unwrap();
        assert!(processed[0].is_empty());
        assert_eq!(processed[0].noise.len(), 3);
    }

    #[test]
    fn test_unknown_action_fails_before_extraction() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "actions": [ { "name": "nope" } ] }"#).unwrap();
        let err = process_events(&[two_tracks()], &dbscan_params(), &config, 0).unwrap_err();
        assert!(matches!(err, CliError::Pipeline(PipelineError::UnknownAction(_))));
    }

    #[test]
    fn test_coalesce_rejects_bad_pitch() {
        assert!(matches!(
            coalesce(vec![two_tracks()], Some(0.0)),
            Err(CliError::Core(trackrec_core::Error::Config(_)))
        ));
        let merged = coalesce(vec![two_tracks()], Some(100.0)).unwrap();
        assert!(merged[0].len() < 80);
    }

    #[test]
    fn test_cli_parses_process_flags() {
        let cli = Cli::try_parse_from([
            "trackrec",
            "-v",
            "process",
            "events.json",
            "--algorithm",
            "dbscan",
            "--sampler",
            "weighted-gaussian",
            "--charge-threshold",
            "2.5",
            "--seed",
            "9",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process {
                extraction, seed, ..
            } => {
                assert_eq!(seed, 9);
                let params = extraction.params();
                assert_eq!(params.algorithm, ExtractionAlgorithm::Dbscan);
                assert_eq!(params.ransac.sampler.method, SamplingMethod::WeightedGaussian);
                assert_eq!(params.ransac.charge_threshold, Some(2.5));
            }
            _ => panic!("expected the process command"),
        }
    }
}
