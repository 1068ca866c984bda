use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use log::info;
use tracing_subscriber::filter::LevelFilter;

use phdiag_rips::{
    compute_batch, Amplitude, AmplitudeMetric, CoefficientField, DiagramCollection, FailurePolicy,
    FiltrationKind, Metric, MetricInput, PaddingMode, PersistenceConfig, PersistenceEntropy,
    PersistenceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputKind {
    /// One point per row
    Points,
    /// Square distance matrix
    Distances,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Euclidean,
    Manhattan,
    Chebyshev,
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PaddingArg {
    Total,
    PerDimension,
}

/// Compute persistence diagrams of CSV point clouds or distance matrices.
///
/// Writes `sample,dimension,birth,death,padding` rows to stdout; padding rows without a dimension use -1.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// CSV files without headers, one input sample per file
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Maximum homology dimension
    #[arg(short = 'd', long, default_value_t = 1)]
    max_dim: usize,

    /// Maximum filtration value (unbounded if omitted)
    #[arg(short, long)]
    threshold: Option<f64>,

    #[arg(short, long, value_enum, default_value_t = InputKind::Points)]
    input_kind: InputKind,

    #[arg(short, long, value_enum, default_value_t = MetricArg::Euclidean)]
    metric: MetricArg,

    /// Characteristic of the coefficient field
    #[arg(short, long, default_value_t = 2)]
    field: u8,

    /// Restrict to the k nearest neighbours of each point
    #[arg(long, value_name = "K")]
    sparse: Option<usize>,

    /// Number of worker threads, 0 for all available cores
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    #[arg(long, value_enum, default_value_t = PaddingArg::Total)]
    padding: PaddingArg,

    /// Run every sample and report all failures instead of stopping at the first
    #[arg(long)]
    collect_all: bool,

    /// Print the persistence entropy of each sample instead of the diagrams
    #[arg(long, conflicts_with = "amplitude")]
    entropy: bool,

    /// Print the L2 landscape amplitude of each sample instead of the diagrams
    #[arg(long)]
    amplitude: bool,

    /// Increase logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> Result<PersistenceConfig, PersistenceError> {
        let metric = match (self.input_kind, self.metric) {
            (InputKind::Distances, _) => Metric::Precomputed,
            (_, MetricArg::Euclidean) => Metric::Euclidean,
            (_, MetricArg::Manhattan) => Metric::Manhattan,
            (_, MetricArg::Chebyshev) => Metric::Chebyshev,
            (_, MetricArg::Cosine) => Metric::Cosine,
        };
        let filtration = match self.sparse {
            Some(n_neighbours) => FiltrationKind::SparseRips { n_neighbours },
            None => FiltrationKind::Rips,
        };
        let padding = match self.padding {
            PaddingArg::Total => PaddingMode::Total,
            PaddingArg::PerDimension => PaddingMode::PerDimension,
        };
        let failure_policy = if self.collect_all {
            FailurePolicy::CollectAll
        } else {
            FailurePolicy::FailFast
        };
        let mut builder = PersistenceConfig::builder()
            .with_max_homology_dimension(self.max_dim)
            .with_metric(metric)
            .with_coefficient_field(CoefficientField::from_characteristic(self.field)?)
            .with_filtration(filtration)
            .with_n_workers(self.workers)
            .with_padding(padding)
            .with_failure_policy(failure_policy);
        if let Some(threshold) = self.threshold {
            builder = builder.with_max_filtration(threshold);
        }
        builder.build()
    }
}

fn read_sample(path: &Path) -> Result<MetricInput, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|entry| {
                entry.parse::<f64>().map_err(|_| {
                    PersistenceError::invalid_input(format!(
                        "{}: cannot parse {entry:?} as a number",
                        path.display()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(MetricInput::PointCloud(rows))
}

fn write_diagrams(collection: &DiagramCollection) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["sample", "dimension", "birth", "death", "padding"])?;
    for (sample, row) in collection.rows().enumerate() {
        for point in row {
            let dimension = point
                .dimension()
                .map_or_else(|| "-1".to_string(), |dim| dim.to_string());
            writer.write_record([
                sample.to_string(),
                dimension,
                point.birth().to_string(),
                point.death().to_string(),
                u8::from(point.is_padding()).to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_features(
    collection: &DiagramCollection,
    name: &str,
    features: &[Vec<f64>],
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["sample", "dimension", name])?;
    for (sample, row) in features.iter().enumerate() {
        for (dimension, value) in collection.homology_dimensions().iter().zip(row) {
            writer.write_record([
                sample.to_string(),
                dimension.to_string(),
                value.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // Logs go to stderr so that stdout stays valid CSV
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let config = args.config()?;
    let inputs = args
        .files
        .iter()
        .map(|path| read_sample(path))
        .collect::<Result<Vec<_>, _>>()?;
    info!("Read {} samples", inputs.len());

    let collection = compute_batch(&inputs, &config)?;
    if args.entropy {
        let entropy = PersistenceEntropy::new().transform(&collection);
        write_features(&collection, "entropy", &entropy)
    } else if args.amplitude {
        let amplitude = Amplitude::new(AmplitudeMetric::default()).transform(&collection)?;
        write_features(&collection, "amplitude", &amplitude)
    } else {
        write_diagrams(&collection)
    }
}
