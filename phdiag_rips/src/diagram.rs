//! Persistence diagrams in terms of filtration values, and fixed-shape collections of them.

use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;
use ordered_float::NotNan;
use phdiag::reduction::Diagram;

use crate::{config::PersistenceConfig, error::Result, simplex::SimplexIndex};

/// One topological feature; `death` is infinite for essential classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistencePair {
    pub dimension: usize,
    pub birth: f64,
    pub death: f64,
}

impl PersistencePair {
    pub fn new(dimension: usize, birth: f64, death: f64) -> Self {
        Self {
            dimension,
            birth,
            death,
        }
    }

    pub fn essential(dimension: usize, birth: f64) -> Self {
        Self::new(dimension, birth, f64::INFINITY)
    }

    pub fn is_essential(&self) -> bool {
        self.death == f64::INFINITY
    }

    pub fn persistence(&self) -> f64 {
        self.death - self.birth
    }

    fn cmp_key(&self, other: &Self) -> Ordering {
        self.dimension
            .cmp(&other.dimension)
            .then(self.birth.total_cmp(&other.birth))
            .then(self.death.total_cmp(&other.death))
    }
}

/// The persistence diagram of one input, sorted by dimension, then birth, then death.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistenceDiagram {
    pairs: Vec<PersistencePair>,
}

impl FromIterator<PersistencePair> for PersistenceDiagram {
    fn from_iter<I: IntoIterator<Item = PersistencePair>>(iter: I) -> Self {
        let mut pairs: Vec<_> = iter.into_iter().collect();
        pairs.sort_by(PersistencePair::cmp_key);
        Self { pairs }
    }
}

impl PersistenceDiagram {
    pub fn pairs(&self) -> &[PersistencePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn in_dimension(&self, dimension: usize) -> impl Iterator<Item = &PersistencePair> + '_ {
        self.pairs
            .iter()
            .filter(move |pair| pair.dimension == dimension)
    }

    pub fn count_in_dimension(&self, dimension: usize) -> usize {
        self.in_dimension(dimension).count()
    }

    pub fn essential(&self) -> impl Iterator<Item = &PersistencePair> + '_ {
        self.pairs.iter().filter(|pair| pair.is_essential())
    }
}

/// Translate a pairing of simplices into filtration values.
///
/// Classes above the configured homology dimension are discarded; they only exist because the
/// complex is built one dimension higher than the homology it is asked for.
pub fn assemble(
    diagram: &Diagram<SimplexIndex>,
    filtration_value: impl Fn(SimplexIndex) -> Result<NotNan<f64>>,
    config: &PersistenceConfig,
) -> Result<PersistenceDiagram> {
    let max_dimension = config.max_homology_dimension();
    let mut pairs = Vec::with_capacity(diagram.pairings.len() + diagram.essential.len());

    for &(birth, death) in &diagram.pairings {
        if birth.dimension() > max_dimension {
            continue;
        }
        let pair = PersistencePair::new(
            birth.dimension(),
            filtration_value(birth)?.into_inner(),
            filtration_value(death)?.into_inner(),
        );
        if config.drop_zero_persistence() && pair.birth == pair.death {
            continue;
        }
        pairs.push(pair);
    }

    let mut essential: Vec<_> = diagram
        .essential
        .iter()
        .filter(|simplex| simplex.dimension() <= max_dimension)
        .map(|&simplex| Ok((filtration_value(simplex)?, simplex)))
        .collect::<Result<_>>()?;
    essential.sort_unstable();
    let mut dropped_component = !config.reduced_homology();
    for (birth, simplex) in essential {
        if !dropped_component && simplex.dimension() == 0 {
            // The first vertex to enter represents the component that never dies
            dropped_component = true;
            continue;
        }
        let death = config.infinity_value().unwrap_or(f64::INFINITY);
        pairs.push(PersistencePair::new(
            simplex.dimension(),
            birth.into_inner(),
            death,
        ));
    }

    let diagram: PersistenceDiagram = pairs.into_iter().collect();
    debug!(
        "Assembled diagram with {} points: {:?}",
        diagram.len(),
        (0..=max_dimension)
            .map(|dim| diagram.count_in_dimension(dim))
            .collect_vec()
    );
    Ok(diagram)
}

// ======== Collections ========================================

/// How diagrams of unequal size are brought to a common shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// Append padding to each diagram up to the largest diagram in the batch.
    #[default]
    Total,
    /// Pad each homology dimension separately up to its largest count in the batch,
    /// so every diagram holds the same number of points per dimension.
    PerDimension,
}

/// A point of a padded diagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagramPoint {
    Feature(PersistencePair),
    /// Placeholder on the diagonal carrying no topological information.
    /// The dimension is set when padding is done per dimension.
    Padding { dimension: Option<usize> },
}

impl DiagramPoint {
    pub fn is_padding(&self) -> bool {
        matches!(self, Self::Padding { .. })
    }

    pub fn dimension(&self) -> Option<usize> {
        match self {
            Self::Feature(pair) => Some(pair.dimension),
            Self::Padding { dimension } => *dimension,
        }
    }

    pub fn birth(&self) -> f64 {
        match self {
            Self::Feature(pair) => pair.birth,
            Self::Padding { .. } => 0.0,
        }
    }

    pub fn death(&self) -> f64 {
        match self {
            Self::Feature(pair) => pair.death,
            Self::Padding { .. } => 0.0,
        }
    }

    pub fn as_feature(&self) -> Option<&PersistencePair> {
        match self {
            Self::Feature(pair) => Some(pair),
            Self::Padding { .. } => None,
        }
    }
}

/// Diagrams of a batch, in input order, padded to a common number of points.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramCollection {
    homology_dimensions: Vec<usize>,
    diagrams: Vec<PersistenceDiagram>,
    rows: Vec<Vec<DiagramPoint>>,
}

impl DiagramCollection {
    pub fn new(
        diagrams: Vec<PersistenceDiagram>,
        homology_dimensions: Vec<usize>,
        padding: PaddingMode,
    ) -> Self {
        let rows = match padding {
            PaddingMode::Total => {
                let width = diagrams.iter().map(PersistenceDiagram::len).max().unwrap_or(0);
                diagrams
                    .iter()
                    .map(|diagram| {
                        let mut row: Vec<_> = diagram
                            .pairs()
                            .iter()
                            .copied()
                            .map(DiagramPoint::Feature)
                            .collect();
                        row.resize(width, DiagramPoint::Padding { dimension: None });
                        row
                    })
                    .collect()
            }
            PaddingMode::PerDimension => {
                let widths: Vec<usize> = homology_dimensions
                    .iter()
                    .map(|&dim| {
                        diagrams
                            .iter()
                            .map(|diagram| diagram.count_in_dimension(dim))
                            .max()
                            .unwrap_or(0)
                    })
                    .collect();
                diagrams
                    .iter()
                    .map(|diagram| {
                        let mut row = Vec::with_capacity(widths.iter().sum());
                        for (&dim, &width) in homology_dimensions.iter().zip(&widths) {
                            let start = row.len();
                            row.extend(
                                diagram
                                    .in_dimension(dim)
                                    .copied()
                                    .map(DiagramPoint::Feature),
                            );
                            row.resize(
                                start + width,
                                DiagramPoint::Padding {
                                    dimension: Some(dim),
                                },
                            );
                        }
                        row
                    })
                    .collect()
            }
        };
        Self {
            homology_dimensions,
            diagrams,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }

    /// Number of points (features plus padding) in every padded diagram.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// The homology dimensions that were computed, in increasing order.
    pub fn homology_dimensions(&self) -> &[usize] {
        &self.homology_dimensions
    }

    pub fn diagram(&self, sample: usize) -> Option<&PersistenceDiagram> {
        self.diagrams.get(sample)
    }

    pub fn diagrams(&self) -> &[PersistenceDiagram] {
        &self.diagrams
    }

    pub fn padded(&self, sample: usize) -> Option<&[DiagramPoint]> {
        self.rows.get(sample).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[DiagramPoint]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_diagrams(self) -> Vec<PersistenceDiagram> {
        self.diagrams
    }
}
