//! Scalar features of persistence diagrams.

use crate::{
    diagram::{DiagramCollection, PersistenceDiagram, PersistencePair},
    error::{PersistenceError, Result},
};

/// Shannon entropy (base 2) of the lifetimes in each homology dimension.
///
/// Padding and infinite points carry no lifetime and are ignored.
/// An entropy is undefined when a dimension has no positive total lifetime, or when normalising by a
/// total lifetime of one; such values become `nan_fill_value` (left as NaN when it is `None`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistenceEntropy {
    pub normalize: bool,
    pub nan_fill_value: Option<f64>,
}

impl Default for PersistenceEntropy {
    fn default() -> Self {
        Self {
            normalize: false,
            nan_fill_value: Some(-1.0),
        }
    }
}

impl PersistenceEntropy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    #[must_use]
    pub fn with_nan_fill_value(mut self, value: Option<f64>) -> Self {
        self.nan_fill_value = value;
        self
    }

    /// One row per sample, one column per entry of [`DiagramCollection::homology_dimensions`].
    pub fn transform(&self, collection: &DiagramCollection) -> Vec<Vec<f64>> {
        collection
            .diagrams()
            .iter()
            .map(|diagram| {
                collection
                    .homology_dimensions()
                    .iter()
                    .map(|&dimension| self.entropy(diagram, dimension))
                    .collect()
            })
            .collect()
    }

    /// Entropy of the finite lifetimes of one diagram in one dimension.
    pub fn entropy(&self, diagram: &PersistenceDiagram, dimension: usize) -> f64 {
        let lifetimes: Vec<f64> = diagram
            .in_dimension(dimension)
            .map(|pair| pair.persistence())
            .filter(|lifetime| lifetime.is_finite())
            .collect();
        let total: f64 = lifetimes.iter().sum();
        let mut entropy = if total > 0.0 {
            -lifetimes
                .iter()
                .filter(|&&lifetime| lifetime > 0.0)
                .map(|lifetime| {
                    let p = lifetime / total;
                    p * p.log2()
                })
                .sum::<f64>()
        } else {
            f64::NAN
        };
        if self.normalize {
            // Dividing by log2(1) = 0 leaves an undefined entropy
            entropy /= total.log2();
        }
        match self.nan_fill_value {
            Some(fill) if !entropy.is_finite() => fill,
            _ => entropy,
        }
    }
}

/// How far a diagram in one dimension is from the empty diagram.
///
/// The curve based metrics sample their curve on `n_bins` evenly spaced values spanning the births and
/// deaths seen in that dimension across the whole collection, and take an `L^p` norm scaled by the step size.
/// `p` may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmplitudeMetric {
    /// Largest distance of a point to the diagonal.
    Bottleneck,
    /// `L^p` norm of the distances of the points to the diagonal.
    Wasserstein { p: f64 },
    /// Number of features alive at each sample.
    Betti { p: f64, n_bins: usize },
    /// The first `n_layers` persistence landscapes.
    Landscape { p: f64, n_bins: usize, n_layers: usize },
    /// Average of the tent functions weighted by lifetime to the given power.
    Silhouette { p: f64, power: f64, n_bins: usize },
}

impl Default for AmplitudeMetric {
    fn default() -> Self {
        Self::Landscape {
            p: 2.0,
            n_bins: 100,
            n_layers: 1,
        }
    }
}

impl AmplitudeMetric {
    fn validate(&self) -> Result<()> {
        let (p, n_bins) = match *self {
            Self::Bottleneck => return Ok(()),
            Self::Wasserstein { p } => (p, None),
            Self::Betti { p, n_bins } => (p, Some(n_bins)),
            Self::Landscape { p, n_bins, n_layers } => {
                if n_layers == 0 {
                    return Err(PersistenceError::configuration(
                        "landscape amplitude needs at least one layer",
                    ));
                }
                (p, Some(n_bins))
            }
            Self::Silhouette { p, power, n_bins } => {
                if !power.is_finite() {
                    return Err(PersistenceError::configuration(format!(
                        "silhouette power must be finite, got {power}"
                    )));
                }
                (p, Some(n_bins))
            }
        };
        if p.is_nan() || p < 1.0 {
            return Err(PersistenceError::configuration(format!(
                "amplitude norm needs p >= 1, got {p}"
            )));
        }
        if matches!(n_bins, Some(n) if n < 2) {
            return Err(PersistenceError::configuration(
                "amplitude sampling needs at least two bins",
            ));
        }
        Ok(())
    }

    fn n_bins(&self) -> Option<usize> {
        match *self {
            Self::Bottleneck | Self::Wasserstein { .. } => None,
            Self::Betti { n_bins, .. }
            | Self::Landscape { n_bins, .. }
            | Self::Silhouette { n_bins, .. } => Some(n_bins),
        }
    }
}

/// Evenly spaced sample values, both ends included.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sampling {
    start: f64,
    end: f64,
    n_bins: usize,
}

impl Sampling {
    /// Spans every finite birth and death in `dimension`; `None` when there are none.
    fn spanning(collection: &DiagramCollection, dimension: usize, n_bins: usize) -> Option<Self> {
        let (start, end) = collection
            .diagrams()
            .iter()
            .flat_map(|diagram| finite_pairs(diagram, dimension))
            .fold(None, |range: Option<(f64, f64)>, pair| match range {
                None => Some((pair.birth, pair.death)),
                Some((lo, hi)) => Some((lo.min(pair.birth), hi.max(pair.death))),
            })?;
        Some(Self { start, end, n_bins })
    }

    fn step(&self) -> f64 {
        (self.end - self.start) / (self.n_bins - 1) as f64
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let step = self.step();
        let last = self.n_bins - 1;
        (0..self.n_bins).map(move |i| {
            if i == last {
                self.end
            } else {
                self.start + step * i as f64
            }
        })
    }
}

fn finite_pairs(
    diagram: &PersistenceDiagram,
    dimension: usize,
) -> impl Iterator<Item = &PersistencePair> + '_ {
    diagram
        .in_dimension(dimension)
        .filter(|pair| pair.death.is_finite())
}

fn tent(pair: &PersistencePair, t: f64) -> f64 {
    (t - pair.birth).min(pair.death - t).max(0.0)
}

fn lp_norm(values: impl Iterator<Item = f64>, p: f64) -> f64 {
    if p.is_infinite() {
        values.fold(0.0, |max, value| max.max(value.abs()))
    } else {
        values.map(|value| value.abs().powf(p)).sum::<f64>().powf(p.recip())
    }
}

/// Amplitude of each diagram in each homology dimension, optionally reduced to a single norm.
///
/// Infinite and padding points are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Amplitude {
    pub metric: AmplitudeMetric,
    /// Norm taken over the per-dimension amplitudes of a sample; `None` keeps one value per dimension.
    pub order: Option<f64>,
}

impl Amplitude {
    pub fn new(metric: AmplitudeMetric) -> Self {
        Self {
            metric,
            order: None,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: Option<f64>) -> Self {
        self.order = order;
        self
    }

    /// One row per sample, with one column per entry of [`DiagramCollection::homology_dimensions`], or a
    /// single column when an order is set.
    pub fn transform(&self, collection: &DiagramCollection) -> Result<Vec<Vec<f64>>> {
        self.metric.validate()?;
        if let Some(order) = self.order {
            if order.is_nan() || order <= 0.0 {
                return Err(PersistenceError::configuration(format!(
                    "amplitude order must be positive, got {order}"
                )));
            }
        }

        let samplings: Vec<Option<Sampling>> = collection
            .homology_dimensions()
            .iter()
            .map(|&dimension| {
                self.metric
                    .n_bins()
                    .and_then(|n_bins| Sampling::spanning(collection, dimension, n_bins))
            })
            .collect();

        Ok(collection
            .diagrams()
            .iter()
            .map(|diagram| {
                let row: Vec<f64> = collection
                    .homology_dimensions()
                    .iter()
                    .zip(&samplings)
                    .map(|(&dimension, sampling)| self.amplitude(diagram, dimension, sampling.as_ref()))
                    .collect();
                match self.order {
                    Some(order) => vec![lp_norm(row.into_iter(), order)],
                    None => row,
                }
            })
            .collect())
    }

    fn amplitude(
        &self,
        diagram: &PersistenceDiagram,
        dimension: usize,
        sampling: Option<&Sampling>,
    ) -> f64 {
        let pairs: Vec<&PersistencePair> = finite_pairs(diagram, dimension).collect();
        let to_diagonal = || pairs.iter().map(|pair| pair.persistence() / 2.0);
        let (p, curve): (f64, Vec<f64>) = match (self.metric, sampling) {
            (AmplitudeMetric::Bottleneck, _) => return lp_norm(to_diagonal(), f64::INFINITY),
            (AmplitudeMetric::Wasserstein { p }, _) => return lp_norm(to_diagonal(), p),
            // Nothing finite in this dimension anywhere in the collection
            (_, None) => return 0.0,
            (AmplitudeMetric::Betti { p, .. }, Some(sampling)) => (
                p,
                sampling
                    .values()
                    .map(|t| {
                        let alive = pairs.iter().filter(|pair| pair.birth <= t && t < pair.death);
                        alive.count() as f64
                    })
                    .collect(),
            ),
            (AmplitudeMetric::Landscape { p, n_layers, .. }, Some(sampling)) => {
                let mut curve = Vec::with_capacity(sampling.n_bins * n_layers);
                let mut tents = Vec::with_capacity(pairs.len());
                for t in sampling.values() {
                    tents.clear();
                    tents.extend(pairs.iter().map(|pair| tent(pair, t)));
                    tents.sort_unstable_by(|a, b| b.total_cmp(a));
                    curve.extend((0..n_layers).map(|k| tents.get(k).copied().unwrap_or(0.0)));
                }
                (p, curve)
            }
            (AmplitudeMetric::Silhouette { p, power, .. }, Some(sampling)) => {
                // Points on the diagonal have no tent and would otherwise weigh infinitely for negative powers
                let weighted: Vec<(&PersistencePair, f64)> = pairs
                    .iter()
                    .filter(|pair| pair.persistence() > 0.0)
                    .map(|&pair| (pair, pair.persistence().powf(power)))
                    .collect();
                let total: f64 = weighted.iter().map(|(_, weight)| weight).sum();
                let curve = sampling
                    .values()
                    .map(|t| {
                        if total > 0.0 {
                            let sum: f64 = weighted.iter().map(|(pair, weight)| weight * tent(pair, t)).sum();
                            sum / total
                        } else {
                            0.0
                        }
                    })
                    .collect();
                (p, curve)
            }
        };
        let step = sampling.map_or(0.0, Sampling::step);
        step.powf(p.recip()) * lp_norm(curve.into_iter(), p)
    }
}

#[cfg(test)]
mod tests {
    use super::{Amplitude, AmplitudeMetric, PersistenceEntropy};
    use crate::{
        diagram::{DiagramCollection, PaddingMode, PersistenceDiagram, PersistencePair},
        error::PersistenceError,
    };

    fn collection() -> DiagramCollection {
        let diagrams: Vec<PersistenceDiagram> = vec![
            [
                PersistencePair::new(0, 0.0, 1.0),
                PersistencePair::new(0, 0.0, 1.0),
                PersistencePair::essential(0, 0.0),
                PersistencePair::new(1, 1.0, 3.0),
            ]
            .into_iter()
            .collect(),
            [PersistencePair::essential(0, 0.0)].into_iter().collect(),
        ];
        DiagramCollection::new(diagrams, vec![0, 1], PaddingMode::Total)
    }

    #[test]
    fn test_entropy() {
        let features = PersistenceEntropy::new().transform(&collection());
        assert_eq!(features.len(), 2);
        // Two equal lifetimes carry one bit
        assert!((features[0][0] - 1.0).abs() < 1e-12);
        // A single lifetime carries none
        assert_eq!(features[0][1], 0.0);
        // Nothing finite to measure
        assert_eq!(features[1], vec![-1.0, -1.0]);
    }

    #[test]
    fn test_normalized_entropy() {
        let entropy = PersistenceEntropy::new().with_normalize(true);
        let features = entropy.transform(&collection());
        // Total lifetime 2 in both dimensions so log2(total) = 1
        assert!((features[0][0] - 1.0).abs() < 1e-12);
        assert_eq!(features[0][1], 0.0);

        let unfilled = entropy.with_nan_fill_value(None);
        assert!(unfilled.transform(&collection())[1][0].is_nan());
    }

    fn close(actual: &[Vec<f64>], expected: &[Vec<f64>]) -> bool {
        actual.len() == expected.len()
            && actual.iter().zip(expected).all(|(a, e)| {
                a.len() == e.len() && a.iter().zip(e).all(|(x, y)| (x - y).abs() < 1e-9)
            })
    }

    #[test]
    fn test_distance_to_diagonal_amplitudes() {
        let bottleneck = Amplitude::new(AmplitudeMetric::Bottleneck)
            .transform(&collection())
            .unwrap();
        assert!(close(&bottleneck, &[vec![0.5, 1.0], vec![0.0, 0.0]]));

        let wasserstein = Amplitude::new(AmplitudeMetric::Wasserstein { p: 2.0 })
            .transform(&collection())
            .unwrap();
        assert!(close(&wasserstein, &[vec![0.5_f64.sqrt(), 1.0], vec![0.0, 0.0]]));

        let total = Amplitude::new(AmplitudeMetric::Bottleneck)
            .with_order(Some(1.0))
            .transform(&collection())
            .unwrap();
        assert!(close(&total, &[vec![1.5], vec![0.0]]));
    }

    #[test]
    fn test_betti_amplitude() {
        let betti = Amplitude::new(AmplitudeMetric::Betti { p: 1.0, n_bins: 11 });
        let features = betti.transform(&collection()).unwrap();
        // With p = 1 the sampled Betti curve integrates to the total lifetime
        assert!(close(&features, &[vec![2.0, 2.0], vec![0.0, 0.0]]));
    }

    #[test]
    fn test_landscape_and_silhouette_peaks() {
        let landscape = Amplitude::new(AmplitudeMetric::Landscape {
            p: f64::INFINITY,
            n_bins: 11,
            n_layers: 2,
        });
        let peaks = landscape.transform(&collection()).unwrap();
        assert!(close(&peaks, &[vec![0.5, 1.0], vec![0.0, 0.0]]));

        // The two identical H0 bars fill the second layer as much as the first
        let layers = |n_layers| {
            Amplitude::new(AmplitudeMetric::Landscape {
                p: 1.0,
                n_bins: 11,
                n_layers,
            })
            .transform(&collection())
            .unwrap()
        };
        let (one, two) = (layers(1), layers(2));
        assert!((two[0][0] - 2.0 * one[0][0]).abs() < 1e-9);
        assert!((two[0][1] - one[0][1]).abs() < 1e-9);

        let silhouette = Amplitude::new(AmplitudeMetric::Silhouette {
            p: f64::INFINITY,
            power: 1.0,
            n_bins: 11,
        });
        let peaks = silhouette.transform(&collection()).unwrap();
        assert!(close(&peaks, &[vec![0.5, 1.0], vec![0.0, 0.0]]));
    }

    #[test]
    fn test_amplitude_parameters_are_checked() {
        let bad = [
            Amplitude::new(AmplitudeMetric::Betti { p: 2.0, n_bins: 1 }),
            Amplitude::new(AmplitudeMetric::Wasserstein { p: 0.5 }),
            Amplitude::new(AmplitudeMetric::Landscape {
                p: 2.0,
                n_bins: 10,
                n_layers: 0,
            }),
            Amplitude::default().with_order(Some(0.0)),
        ];
        for amplitude in bad {
            assert!(matches!(
                amplitude.transform(&collection()),
                Err(PersistenceError::Configuration { .. })
            ));
        }
        assert_eq!(Amplitude::default().transform(&collection()).unwrap().len(), 2);
    }
}
