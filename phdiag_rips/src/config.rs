//! Run configuration, validated once and then shared read-only by every worker.

use std::num::NonZeroUsize;
use std::thread;

use ordered_float::NotNan;

use crate::{
    diagram::PaddingMode,
    distance::Metric,
    error::{PersistenceError, Result},
    filtration::FiltrationKind,
};

/// Highest homology dimension accepted by [`PersistenceConfigBuilder::build`].
pub const MAX_HOMOLOGY_DIMENSION: usize = 10;

/// Prime field used for the boundary matrix reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoefficientField {
    #[default]
    Z2,
    Z3,
    Z5,
    Z7,
    Z11,
    Z13,
}

impl CoefficientField {
    pub fn from_characteristic(characteristic: u8) -> Result<Self> {
        match characteristic {
            2 => Ok(Self::Z2),
            3 => Ok(Self::Z3),
            5 => Ok(Self::Z5),
            7 => Ok(Self::Z7),
            11 => Ok(Self::Z11),
            13 => Ok(Self::Z13),
            other => Err(PersistenceError::configuration(format!(
                "unsupported coefficient field characteristic {other}, expected one of 2, 3, 5, 7, 11, 13"
            ))),
        }
    }

    pub fn characteristic(self) -> u8 {
        match self {
            Self::Z2 => 2,
            Self::Z3 => 3,
            Self::Z5 => 5,
            Self::Z7 => 7,
            Self::Z11 => 11,
            Self::Z13 => 13,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReductionAlgorithm {
    /// Reduce from the top dimension down, clearing columns paired in the dimension above.
    #[default]
    Clearing,
    /// Left-to-right reduction of every column.
    Standard,
}

/// What a batch does when one of its inputs fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Cancel outstanding work and report the failing input with the lowest index.
    #[default]
    FailFast,
    /// Run every input and report all failures together.
    CollectAll,
}

/// Validated configuration of a persistence computation.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    max_homology_dimension: usize,
    max_filtration: Option<NotNan<f64>>,
    metric: Metric,
    coefficient_field: CoefficientField,
    filtration: FiltrationKind,
    n_workers: NonZeroUsize,
    max_simplices: Option<NonZeroUsize>,
    failure_policy: FailurePolicy,
    padding: PaddingMode,
    drop_zero_persistence: bool,
    reduced_homology: bool,
    infinity_value: Option<f64>,
    algorithm: ReductionAlgorithm,
    allow_ragged_features: bool,
}

/// Zero requests one worker per available core, falling back to a single worker.
fn resolve_workers(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested)
        .or_else(|| thread::available_parallelism().ok())
        .unwrap_or(NonZeroUsize::MIN)
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_homology_dimension: 1,
            max_filtration: None,
            metric: Metric::default(),
            coefficient_field: CoefficientField::default(),
            filtration: FiltrationKind::default(),
            n_workers: resolve_workers(0),
            max_simplices: None,
            failure_policy: FailurePolicy::default(),
            padding: PaddingMode::default(),
            drop_zero_persistence: false,
            reduced_homology: false,
            infinity_value: None,
            algorithm: ReductionAlgorithm::default(),
            allow_ragged_features: false,
        }
    }
}

impl PersistenceConfig {
    #[must_use]
    pub fn builder() -> PersistenceConfigBuilder {
        PersistenceConfigBuilder::new()
    }

    pub fn max_homology_dimension(&self) -> usize {
        self.max_homology_dimension
    }

    /// `None` when the filtration is unbounded.
    pub fn max_filtration(&self) -> Option<NotNan<f64>> {
        self.max_filtration
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn coefficient_field(&self) -> CoefficientField {
        self.coefficient_field
    }

    pub fn filtration(&self) -> FiltrationKind {
        self.filtration
    }

    /// Dimension of the largest simplices needed to compute every requested homology group.
    pub fn max_simplex_dimension(&self) -> usize {
        match self.filtration {
            FiltrationKind::WeightedGraph {
                expand_cliques: false,
            } => 1,
            _ => self.max_homology_dimension + 1,
        }
    }

    /// Number of worker threads, fixed when the configuration was built.
    pub fn n_workers(&self) -> usize {
        self.n_workers.get()
    }

    pub fn max_simplices(&self) -> Option<usize> {
        self.max_simplices.map(NonZeroUsize::get)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn padding(&self) -> PaddingMode {
        self.padding
    }

    pub fn drop_zero_persistence(&self) -> bool {
        self.drop_zero_persistence
    }

    pub fn reduced_homology(&self) -> bool {
        self.reduced_homology
    }

    /// Finite value substituted for the death of essential classes.
    pub fn infinity_value(&self) -> Option<f64> {
        self.infinity_value
    }

    pub fn algorithm(&self) -> ReductionAlgorithm {
        self.algorithm
    }

    pub fn allow_ragged_features(&self) -> bool {
        self.allow_ragged_features
    }
}

/// Builder for [`PersistenceConfig`]; nothing is checked until [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct PersistenceConfigBuilder {
    max_homology_dimension: usize,
    max_filtration: Option<f64>,
    metric: Metric,
    coefficient_field: CoefficientField,
    filtration: FiltrationKind,
    n_workers: usize,
    max_simplices: Option<usize>,
    failure_policy: FailurePolicy,
    padding: PaddingMode,
    drop_zero_persistence: bool,
    reduced_homology: bool,
    infinity_value: Option<f64>,
    algorithm: ReductionAlgorithm,
    allow_ragged_features: bool,
}

impl Default for PersistenceConfigBuilder {
    fn default() -> Self {
        Self {
            max_homology_dimension: 1,
            max_filtration: None,
            metric: Metric::default(),
            coefficient_field: CoefficientField::default(),
            filtration: FiltrationKind::default(),
            n_workers: 0,
            max_simplices: None,
            failure_policy: FailurePolicy::default(),
            padding: PaddingMode::default(),
            drop_zero_persistence: false,
            reduced_homology: false,
            infinity_value: None,
            algorithm: ReductionAlgorithm::default(),
            allow_ragged_features: false,
        }
    }
}

impl PersistenceConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_homology_dimension(mut self, dimension: usize) -> Self {
        self.max_homology_dimension = dimension;
        self
    }

    /// Largest filtration value included; infinity means unbounded.
    #[must_use]
    pub fn with_max_filtration(mut self, threshold: f64) -> Self {
        self.max_filtration = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_coefficient_field(mut self, field: CoefficientField) -> Self {
        self.coefficient_field = field;
        self
    }

    #[must_use]
    pub fn with_filtration(mut self, filtration: FiltrationKind) -> Self {
        self.filtration = filtration;
        self
    }

    /// Zero selects the available parallelism.
    #[must_use]
    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Bound on the number of simplices in any single filtered complex.
    #[must_use]
    pub fn with_max_simplices(mut self, budget: usize) -> Self {
        self.max_simplices = Some(budget);
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_drop_zero_persistence(mut self, drop: bool) -> Self {
        self.drop_zero_persistence = drop;
        self
    }

    #[must_use]
    pub fn with_reduced_homology(mut self, reduced: bool) -> Self {
        self.reduced_homology = reduced;
        self
    }

    #[must_use]
    pub fn with_infinity_value(mut self, value: f64) -> Self {
        self.infinity_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: ReductionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_allow_ragged_features(mut self, allow: bool) -> Self {
        self.allow_ragged_features = allow;
        self
    }

    pub fn build(self) -> Result<PersistenceConfig> {
        if self.max_homology_dimension > MAX_HOMOLOGY_DIMENSION {
            return Err(PersistenceError::DimensionExceeded {
                dimension: self.max_homology_dimension,
                reason: format!("at most dimension {MAX_HOMOLOGY_DIMENSION} can be enumerated"),
            });
        }

        let max_filtration = match self.max_filtration {
            None => None,
            Some(threshold) if threshold.is_nan() || threshold <= 0.0 => {
                return Err(PersistenceError::configuration(format!(
                    "maximum filtration value must be positive, got {threshold}"
                )))
            }
            Some(threshold) if threshold.is_infinite() => None,
            Some(threshold) => NotNan::new(threshold).ok(),
        };

        self.metric.validate()?;

        if let FiltrationKind::SparseRips { n_neighbours: 0 } = self.filtration {
            return Err(PersistenceError::configuration(
                "sparse Rips needs at least one neighbour per point",
            ));
        }

        let max_simplices = match self.max_simplices {
            None => None,
            Some(budget) => Some(NonZeroUsize::new(budget).ok_or_else(|| {
                PersistenceError::configuration("simplex budget must be positive")
            })?),
        };

        if let Some(value) = self.infinity_value {
            if value.is_nan() {
                return Err(PersistenceError::configuration(
                    "infinity value must not be NaN",
                ));
            }
        }

        Ok(PersistenceConfig {
            max_homology_dimension: self.max_homology_dimension,
            max_filtration,
            metric: self.metric,
            coefficient_field: self.coefficient_field,
            filtration: self.filtration,
            n_workers: resolve_workers(self.n_workers),
            max_simplices,
            failure_policy: self.failure_policy,
            padding: self.padding,
            drop_zero_persistence: self.drop_zero_persistence,
            reduced_homology: self.reduced_homology,
            infinity_value: self.infinity_value,
            algorithm: self.algorithm,
            allow_ragged_features: self.allow_ragged_features,
        })
    }
}
