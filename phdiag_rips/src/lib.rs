//! Persistence diagrams of point clouds, distance matrices and weighted graphs.
//!
//! Each input is turned into a [`DistanceMatrix`] (or used directly as a graph), expanded into a filtered clique
//! complex up to one dimension above the highest requested homology, and its boundary matrix is reduced with
//! [`phdiag`].
//! Batches are processed by a pool of worker threads and returned as a padded [`DiagramCollection`] in input order.
//!
//! ```no_run
//! use phdiag_rips::{compute_batch, MetricInput, PersistenceConfig};
//!
//! let config = PersistenceConfig::builder()
//!     .with_max_homology_dimension(1)
//!     .build()?;
//! let square = MetricInput::PointCloud(vec![
//!     vec![0.0, 0.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//!     vec![0.0, 1.0],
//! ]);
//! let diagrams = compute_batch(&[square], &config)?;
//! # Ok::<(), phdiag_rips::PersistenceError>(())
//! ```

pub mod batch;
pub mod config;
pub mod diagram;
pub mod distance;
pub mod error;
pub mod features;
pub mod filtration;
pub mod homology;
pub mod simplex;

use std::sync::atomic::AtomicBool;

use phdiag::fields::{Z11, Z13, Z2, Z3, Z5, Z7};

pub use batch::CancellationToken;
pub use config::{
    CoefficientField, FailurePolicy, PersistenceConfig, PersistenceConfigBuilder,
    ReductionAlgorithm,
};
pub use diagram::{DiagramCollection, DiagramPoint, PaddingMode, PersistenceDiagram, PersistencePair};
pub use distance::{DistanceMatrix, Metric, MetricInput, WeightedGraph};
pub use error::{PersistenceError, Result};
pub use features::{Amplitude, AmplitudeMetric, PersistenceEntropy};
pub use filtration::FiltrationKind;

fn compute_interruptible(
    input: &MetricInput,
    config: &PersistenceConfig,
    interrupt: &AtomicBool,
) -> Result<PersistenceDiagram> {
    use homology::compute_diagram;
    match config.coefficient_field() {
        CoefficientField::Z2 => compute_diagram::<Z2>(input, config, interrupt),
        CoefficientField::Z3 => compute_diagram::<Z3>(input, config, interrupt),
        CoefficientField::Z5 => compute_diagram::<Z5>(input, config, interrupt),
        CoefficientField::Z7 => compute_diagram::<Z7>(input, config, interrupt),
        CoefficientField::Z11 => compute_diagram::<Z11>(input, config, interrupt),
        CoefficientField::Z13 => compute_diagram::<Z13>(input, config, interrupt),
    }
}

/// Persistence diagram of a single input.
pub fn compute(input: &MetricInput, config: &PersistenceConfig) -> Result<PersistenceDiagram> {
    compute_cancellable(input, config, &CancellationToken::new())
}

pub fn compute_cancellable(
    input: &MetricInput,
    config: &PersistenceConfig,
    token: &CancellationToken,
) -> Result<PersistenceDiagram> {
    compute_interruptible(input, config, token.flag())
}

/// Persistence diagrams of every input, in input order and padded according to the configuration.
pub fn compute_batch(inputs: &[MetricInput], config: &PersistenceConfig) -> Result<DiagramCollection> {
    compute_batch_cancellable(inputs, config, &CancellationToken::new())
}

/// As [`compute_batch`], stopping early once `token` is cancelled.
pub fn compute_batch_cancellable(
    inputs: &[MetricInput],
    config: &PersistenceConfig,
    token: &CancellationToken,
) -> Result<DiagramCollection> {
    if !config.allow_ragged_features() {
        distance::check_feature_dimensions(inputs, config.metric())?;
    }
    let diagrams = batch::run_batch(
        inputs,
        config.n_workers(),
        config.failure_policy(),
        token,
        |_, input, interrupt| compute_interruptible(input, config, interrupt),
    )?;
    Ok(DiagramCollection::new(
        diagrams,
        (0..=config.max_homology_dimension()).collect(),
        config.padding(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        compute, compute_batch, compute_batch_cancellable, Amplitude, AmplitudeMetric,
        CancellationToken, CoefficientField, FailurePolicy, MetricInput, PaddingMode,
        PersistenceConfig, PersistenceEntropy, PersistenceError,
    };

    fn cloud(n_points: usize, spacing: f64) -> MetricInput {
        MetricInput::PointCloud(
            (0..n_points)
                .map(|i| {
                    let angle = std::f64::consts::TAU * i as f64 / n_points as f64;
                    vec![spacing * angle.cos(), spacing * angle.sin()]
                })
                .collect(),
        )
    }

    #[test]
    fn test_batch_pads_to_largest_diagram() {
        let inputs = vec![cloud(3, 1.0), cloud(7, 2.0), cloud(5, 1.5)];
        let config = PersistenceConfig::builder().with_n_workers(2).build().unwrap();
        let collection = compute_batch(&inputs, &config).unwrap();

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.homology_dimensions(), &[0, 1]);
        let largest = collection.diagrams().iter().map(|d| d.len()).max().unwrap();
        assert_eq!(collection.width(), largest);
        for (index, input) in inputs.iter().enumerate() {
            // Each slot holds the diagram of the input at the same index
            assert_eq!(collection.diagram(index), Some(&compute(input, &config).unwrap()));
            assert_eq!(collection.diagram(index).unwrap().count_in_dimension(0), input.n_points());
            let padded = collection.padded(index).unwrap();
            assert_eq!(padded.len(), largest);
            for point in padded.iter().filter(|point| point.is_padding()) {
                assert_eq!(point.birth(), point.death());
            }
        }
    }

    #[test]
    fn test_per_dimension_padding() {
        let inputs = vec![cloud(4, 1.0), cloud(6, 1.0)];
        let config = PersistenceConfig::builder()
            .with_padding(PaddingMode::PerDimension)
            .build()
            .unwrap();
        let collection = compute_batch(&inputs, &config).unwrap();
        for row in collection.rows() {
            assert_eq!(row.iter().filter(|p| p.dimension() == Some(0)).count(), 6);
        }
        let entropy = PersistenceEntropy::new().transform(&collection);
        assert_eq!(entropy.len(), 2);
        assert!(entropy.iter().all(|row| row.len() == 2));

        let amplitude = Amplitude::new(AmplitudeMetric::Bottleneck)
            .transform(&collection)
            .unwrap();
        assert!(amplitude.iter().all(|row| row.len() == 2));
        assert!(amplitude.iter().all(|row| row[0] > 0.0));
    }

    #[test]
    fn test_batch_validation_fails_before_work() {
        let inputs = vec![
            cloud(3, 1.0),
            MetricInput::PointCloud(vec![vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]]),
        ];
        let token = CancellationToken::new();
        let config = PersistenceConfig::builder().build().unwrap();
        let err = compute_batch_cancellable(&inputs, &config, &token).unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert!(!token.is_cancelled());

        let ragged = PersistenceConfig::builder()
            .with_allow_ragged_features(true)
            .build()
            .unwrap();
        assert_eq!(compute_batch(&inputs, &ragged).unwrap().len(), 2);
    }

    #[test]
    fn test_failing_input_is_reported() {
        let inputs = vec![
            cloud(3, 1.0),
            cloud(4, 1.0),
            MetricInput::DistanceMatrix(vec![vec![0.0, 1.0], vec![2.0, 0.0]]),
            cloud(5, 1.0),
        ];
        let config = PersistenceConfig::builder().build().unwrap();
        let err = compute_batch(&inputs, &config).unwrap_err();
        assert_eq!(err.index(), Some(2));
        assert!(matches!(err.root(), PersistenceError::InvalidInput { .. }));

        let collect = PersistenceConfig::builder()
            .with_failure_policy(FailurePolicy::CollectAll)
            .build()
            .unwrap();
        let Err(PersistenceError::Batch { failures }) = compute_batch(&inputs, &collect) else {
            panic!("expected a batch failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 2);
    }

    #[test]
    fn test_fields_agree_on_batch() {
        let inputs = vec![cloud(6, 1.0), cloud(8, 1.0)];
        let z2 = PersistenceConfig::builder().build().unwrap();
        let z7 = PersistenceConfig::builder()
            .with_coefficient_field(CoefficientField::Z7)
            .build()
            .unwrap();
        assert_eq!(
            compute_batch(&inputs, &z2).unwrap(),
            compute_batch(&inputs, &z7).unwrap()
        );
    }
}
