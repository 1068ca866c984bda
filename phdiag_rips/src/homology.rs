//! The boundary matrix of a filtered clique complex, and the pipeline computing the diagram of a single input.

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;

use log::debug;
use ordered_float::NotNan;
use phdiag::{
    columns::ColumnEntry,
    fields::{Invertible, NonZeroCoefficient},
    matrices::{
        adaptors::MatrixWithBasis, ColBasis, HasColBasis, HasRowFiltration, MatrixOracle,
        RowEntry,
    },
    reduction::{standard_algo_with_diagram_interruptible, ClearedReductionMatrix},
    PhdiagError,
};

use crate::{
    config::{PersistenceConfig, ReductionAlgorithm},
    diagram::{assemble, PersistenceDiagram},
    distance::{DistanceMatrix, MetricInput},
    error::{PersistenceError, Result},
    filtration::{enumerate_cliques, FilteredBasis, FiltrationKind, Neighbourhood},
    simplex::{Binomials, SimplexIndex},
};

/// Boundary oracle of the clique complex of a [`Neighbourhood`].
///
/// Columns and rows are indexed by [`SimplexIndex`]; the row filtration is the clique's filtration value.
pub struct RipsBoundary<CF: NonZeroCoefficient> {
    neighbourhood: Neighbourhood,
    binomials: Binomials,
    phantom: PhantomData<CF>,
}

impl<CF: NonZeroCoefficient> RipsBoundary<CF> {
    pub fn new(neighbourhood: Neighbourhood, binomials: Binomials) -> Self {
        Self {
            neighbourhood,
            binomials,
            phantom: PhantomData,
        }
    }

    pub fn neighbourhood(&self) -> &Neighbourhood {
        &self.neighbourhood
    }

    pub fn binomials(&self) -> &Binomials {
        &self.binomials
    }

    fn vertices(&self, simplex: SimplexIndex) -> Result<Vec<usize>, PhdiagError> {
        self.binomials
            .decode(simplex)
            .ok_or(PhdiagError::NotInDomain)
    }

    fn parity(removed: usize) -> CF {
        if removed % 2 == 0 {
            CF::one()
        } else {
            CF::one().additive_inverse()
        }
    }
}

impl<CF: NonZeroCoefficient> MatrixOracle for RipsBoundary<CF> {
    type CoefficientField = CF;
    type ColT = SimplexIndex;
    type RowT = SimplexIndex;

    fn column(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = (Self::CoefficientField, Self::RowT)>, PhdiagError> {
        let vertices = self.vertices(col)?;
        let facets = self
            .binomials
            .facets(&vertices)
            .map(|(removed, facet)| {
                facet
                    .map(|facet| (Self::parity(removed), facet))
                    .ok_or(PhdiagError::NotInDomain)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facets.into_iter())
    }
}

impl<CF: NonZeroCoefficient> HasRowFiltration for RipsBoundary<CF> {
    type FiltrationT = NotNan<f64>;

    fn filtration_value(&self, row: Self::RowT) -> Result<Self::FiltrationT, PhdiagError> {
        let vertices = self.vertices(row)?;
        self.neighbourhood
            .simplex_value(&vertices)
            .ok_or(PhdiagError::NotInDomain)
    }

    // Decodes the column once rather than once per facet
    fn column_with_filtration(
        &self,
        col: Self::ColT,
    ) -> Result<impl Iterator<Item = RowEntry<Self>>, PhdiagError> {
        let vertices = self.vertices(col)?;
        let mut facet = Vec::with_capacity(vertices.len());
        let mut entries = Vec::with_capacity(vertices.len());
        if vertices.len() > 1 {
            for removed in 0..vertices.len() {
                facet.clear();
                facet.extend(
                    vertices
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != removed)
                        .map(|(_, v)| *v),
                );
                let row_index = self
                    .binomials
                    .encode(&facet)
                    .ok_or(PhdiagError::NotInDomain)?;
                let filtration_value = self
                    .neighbourhood
                    .simplex_value(&facet)
                    .ok_or(PhdiagError::NotInDomain)?;
                entries.push(ColumnEntry {
                    filtration_value,
                    row_index,
                    coeff: Self::parity(removed),
                });
            }
        }
        Ok(entries.into_iter())
    }
}

/// The boundary matrix in every dimension, with its columns ordered by filtration.
pub type RipsBoundaryAllDims<CF> = MatrixWithBasis<RipsBoundary<CF>, FilteredBasis>;

/// Threshold graph of one input, according to the configured filtration.
pub fn build_neighbourhood(input: &MetricInput, config: &PersistenceConfig) -> Result<Neighbourhood> {
    let threshold = config.max_filtration();
    let vertex_values = || {
        input
            .as_graph()
            .filter(|graph| graph.vertex_weights.is_some())
            .map(|graph| graph.vertex_values())
    };
    match config.filtration() {
        FiltrationKind::Rips => {
            let distances = DistanceMatrix::from_input(input, config.metric())?;
            Ok(Neighbourhood::rips(&distances, vertex_values(), threshold))
        }
        FiltrationKind::SparseRips { n_neighbours } => {
            let distances = DistanceMatrix::from_input(input, config.metric())?;
            Ok(Neighbourhood::sparse_rips(
                &distances,
                vertex_values(),
                threshold,
                n_neighbours,
            ))
        }
        FiltrationKind::WeightedGraph { .. } => {
            let graph = input.as_graph().ok_or_else(|| {
                PersistenceError::invalid_input("weighted graph filtration needs a graph input")
            })?;
            Neighbourhood::graph(graph, threshold)
        }
    }
}

/// Build the filtered complex of one input and wrap it as a boundary matrix.
pub fn build_boundary<CF: NonZeroCoefficient>(
    input: &MetricInput,
    config: &PersistenceConfig,
    interrupt: &AtomicBool,
) -> Result<RipsBoundaryAllDims<CF>> {
    let neighbourhood = build_neighbourhood(input, config)?;
    let max_dimension = config.max_simplex_dimension();
    let binomials = Binomials::for_dimension(neighbourhood.n_vertices(), max_dimension)?;
    let basis = enumerate_cliques(
        &neighbourhood,
        &binomials,
        max_dimension,
        config.max_simplices(),
        interrupt,
    )?;
    debug!(
        "Built complex on {} vertices and {} edges with sizes {:?}",
        neighbourhood.n_vertices(),
        neighbourhood.n_edges(),
        basis.sizes()
    );
    Ok(MatrixWithBasis::new(
        RipsBoundary::new(neighbourhood, binomials),
        basis,
    ))
}

/// Compute the persistence diagram of one input over the field `CF`.
pub fn compute_diagram<CF: Invertible + 'static>(
    input: &MetricInput,
    config: &PersistenceConfig,
    interrupt: &AtomicBool,
) -> Result<PersistenceDiagram> {
    let boundary = build_boundary::<CF>(input, config, interrupt)?;

    let diagram = match config.algorithm() {
        ReductionAlgorithm::Clearing => {
            let top = boundary.basis().max_dimension();
            let (v, diagram) = ClearedReductionMatrix::build_with_diagram_interruptible(
                &boundary,
                (0..=top).rev(),
                interrupt,
            )?;
            debug!("Cleared {} of {} columns", v.n_cleared(), boundary.basis().size());
            diagram
        }
        ReductionAlgorithm::Standard => {
            let (_v, diagram) = standard_algo_with_diagram_interruptible(&boundary, interrupt)?;
            diagram
        }
    };

    assemble(
        &diagram,
        |simplex| Ok(boundary.filtration_value(simplex)?),
        config,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use phdiag::{
        fields::{Z2, Z3},
        matrices::{combinators::product, ColBasis, HasColBasis, HasRowFiltration},
        reduction::{
            standard_algo_with_diagram, standard_algo_with_diagram_interruptible,
            ClearedReductionMatrix,
        },
    };

    use super::{build_boundary, compute_diagram};
    use crate::{
        config::{PersistenceConfig, ReductionAlgorithm},
        diagram::{PersistenceDiagram, PersistencePair},
        distance::{Metric, MetricInput, WeightedGraph},
        error::PersistenceError,
        filtration::FiltrationKind,
    };

    fn unit_square() -> MetricInput {
        MetricInput::PointCloud(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ])
    }

    fn noisy_circle(n_points: usize) -> MetricInput {
        MetricInput::PointCloud(
            (0..n_points)
                .map(|i| {
                    let angle = std::f64::consts::TAU * i as f64 / n_points as f64;
                    let radius = 1.0 + 0.05 * ((i * 7) % 5) as f64;
                    vec![radius * angle.cos(), radius * angle.sin()]
                })
                .collect(),
        )
    }

    fn run(input: &MetricInput, config: &PersistenceConfig) -> PersistenceDiagram {
        let never = AtomicBool::new(false);
        compute_diagram::<Z2>(input, config, &never).unwrap()
    }

    fn non_trivial(diagram: &PersistenceDiagram, dimension: usize) -> Vec<PersistencePair> {
        diagram
            .in_dimension(dimension)
            .filter(|pair| pair.persistence() > 0.0)
            .copied()
            .collect()
    }

    #[test]
    fn test_rips_total_boundary() {
        let never = AtomicBool::new(false);
        let config = PersistenceConfig::builder()
            .with_max_homology_dimension(1)
            .build()
            .unwrap();
        let boundary = build_boundary::<Z2>(&unit_square(), &config, &never).unwrap();
        assert_eq!(boundary.basis().size(), 14);

        let (v, diagram) = standard_algo_with_diagram(&boundary).unwrap();
        let r = product(&boundary, &v);

        assert_eq!(diagram.pairings.len(), 6);
        // Additional essential idx because we don't fill in a 2-void
        assert_eq!(diagram.essential.len(), 2);
        assert_eq!(diagram.n_accounted(), boundary.basis().size());
        for (birth, death) in &diagram.pairings {
            assert_eq!(birth.dimension() + 1, death.dimension());
            assert!(
                boundary.filtration_value(*birth).unwrap()
                    <= boundary.filtration_value(*death).unwrap()
            );
            // The death column of R = DV has its pivot at the birth
            let pivot = r.build_bhcol(*death).unwrap().pop_pivot().unwrap();
            assert_eq!(pivot.row_index, *birth);
        }
    }

    #[test]
    fn test_unit_square() {
        let config = PersistenceConfig::builder().build().unwrap();
        let diagram = run(&unit_square(), &config);

        let h0: Vec<_> = diagram.in_dimension(0).copied().collect();
        assert_eq!(h0.len(), 4);
        assert_eq!(diagram.essential().count(), 1);
        assert!(h0.iter().filter(|pair| !pair.is_essential()).all(|pair| pair.death == 1.0));

        let h1 = non_trivial(&diagram, 1);
        assert_eq!(h1, vec![PersistencePair::new(1, 1.0, 2.0_f64.sqrt())]);
    }

    #[test]
    fn test_point_order_does_not_matter() {
        let MetricInput::PointCloud(mut points) = unit_square() else {
            unreachable!()
        };
        points.push(vec![0.5, 2.5]);
        let forward = MetricInput::PointCloud(points.clone());
        points.reverse();
        let reversed = MetricInput::PointCloud(points);

        for algorithm in [ReductionAlgorithm::Clearing, ReductionAlgorithm::Standard] {
            let config = PersistenceConfig::builder()
                .with_max_homology_dimension(2)
                .with_algorithm(algorithm)
                .build()
                .unwrap();
            let diagram = run(&forward, &config);
            assert_eq!(diagram.count_in_dimension(0), 5);
            assert_eq!(run(&reversed, &config), diagram);
        }
    }

    #[test]
    fn test_single_point() {
        let config = PersistenceConfig::builder().build().unwrap();
        let diagram = run(&MetricInput::PointCloud(vec![vec![3.0, -1.0]]), &config);
        assert_eq!(diagram.pairs(), &[PersistencePair::essential(0, 0.0)]);
    }

    #[test]
    fn test_identical_points() {
        let config = PersistenceConfig::builder().build().unwrap();
        let input = MetricInput::PointCloud(vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        let diagram = run(&input, &config);
        assert_eq!(
            diagram.pairs(),
            &[
                PersistencePair::new(0, 0.0, 0.0),
                PersistencePair::essential(0, 0.0)
            ]
        );

        let dropped = PersistenceConfig::builder()
            .with_drop_zero_persistence(true)
            .build()
            .unwrap();
        assert_eq!(run(&input, &dropped).len(), 1);
    }

    #[test]
    fn test_algorithms_and_fields_agree() {
        let input = noisy_circle(12);
        let clearing = PersistenceConfig::builder()
            .with_max_homology_dimension(2)
            .build()
            .unwrap();
        let standard = PersistenceConfig::builder()
            .with_max_homology_dimension(2)
            .with_algorithm(ReductionAlgorithm::Standard)
            .build()
            .unwrap();
        let never = AtomicBool::new(false);
        let expected = run(&input, &clearing);
        assert_eq!(run(&input, &standard), expected);
        assert_eq!(
            compute_diagram::<Z3>(&input, &clearing, &never).unwrap(),
            expected
        );
        let loops: Vec<_> = expected
            .in_dimension(1)
            .filter(|pair| pair.persistence() > 0.5)
            .collect();
        assert_eq!(loops.len(), 1);
        assert!(!loops[0].is_essential());
    }

    #[test]
    fn test_pairing_totality() {
        let never = AtomicBool::new(false);
        let config = PersistenceConfig::builder()
            .with_max_homology_dimension(2)
            .build()
            .unwrap();
        let boundary = build_boundary::<Z2>(&noisy_circle(9), &config, &never).unwrap();
        let (reduction, diagram) =
            ClearedReductionMatrix::build_with_diagram(&boundary, (0..=3).rev()).unwrap();
        assert_eq!(diagram.n_accounted(), boundary.basis().size());
        for essential in &diagram.essential {
            assert!(reduction.col_is_cycle(*essential).unwrap());
        }
        for (birth, death) in &diagram.pairings {
            assert!(!diagram.essential.contains(birth));
            assert!(!diagram.essential.contains(death));
        }
    }

    #[test]
    fn test_threshold_keeps_components_apart() {
        let config = PersistenceConfig::builder()
            .with_max_filtration(1.2)
            .build()
            .unwrap();
        let input = MetricInput::PointCloud(vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]]);
        let diagram = run(&input, &config);
        assert_eq!(diagram.essential().count(), 2);
        assert_eq!(diagram.count_in_dimension(0), 4);
    }

    #[test]
    fn test_sparse_rips_on_circle() {
        let config = PersistenceConfig::builder()
            .with_filtration(FiltrationKind::SparseRips { n_neighbours: 3 })
            .build()
            .unwrap();
        let diagram = run(&noisy_circle(16), &config);
        let components = diagram.in_dimension(0).filter(|pair| pair.is_essential());
        assert_eq!(components.count(), 1);
        // Without long edges the circle is never filled in
        let h1 = non_trivial(&diagram, 1);
        assert_eq!(h1.iter().filter(|pair| pair.is_essential()).count(), 1);
    }

    fn triangle_graph() -> MetricInput {
        MetricInput::Graph(WeightedGraph::new(
            3,
            vec![(0, 1, 1.0), (1, 2, 2.0), (0, 2, 3.0)],
        ))
    }

    #[test]
    fn test_weighted_graph() {
        let edges_only = PersistenceConfig::builder()
            .with_filtration(FiltrationKind::WeightedGraph {
                expand_cliques: false,
            })
            .build()
            .unwrap();
        let diagram = run(&triangle_graph(), &edges_only);
        assert_eq!(
            diagram.pairs(),
            &[
                PersistencePair::new(0, 0.0, 1.0),
                PersistencePair::new(0, 0.0, 2.0),
                PersistencePair::essential(0, 0.0),
                PersistencePair::essential(1, 3.0),
            ]
        );

        let cliques = PersistenceConfig::builder()
            .with_filtration(FiltrationKind::WeightedGraph {
                expand_cliques: true,
            })
            .build()
            .unwrap();
        let diagram = run(&triangle_graph(), &cliques);
        let h1: Vec<_> = diagram.in_dimension(1).copied().collect();
        assert_eq!(h1, vec![PersistencePair::new(1, 3.0, 3.0)]);
    }

    #[test]
    fn test_graph_components_without_expansion() {
        let config = PersistenceConfig::builder()
            .with_max_homology_dimension(0)
            .with_filtration(FiltrationKind::WeightedGraph {
                expand_cliques: false,
            })
            .build()
            .unwrap();
        let diagram = run(&triangle_graph(), &config);
        assert_eq!(diagram.essential().count(), 1);
        assert_eq!(
            diagram.pairs(),
            &[
                PersistencePair::new(0, 0.0, 1.0),
                PersistencePair::new(0, 0.0, 2.0),
                PersistencePair::essential(0, 0.0),
            ]
        );
    }

    #[test]
    fn test_graph_filtration_needs_graph() {
        let never = AtomicBool::new(false);
        let config = PersistenceConfig::builder()
            .with_filtration(FiltrationKind::WeightedGraph {
                expand_cliques: true,
            })
            .build()
            .unwrap();
        let result = compute_diagram::<Z2>(&unit_square(), &config, &never);
        assert!(matches!(result, Err(PersistenceError::InvalidInput { .. })));
    }

    #[test]
    fn test_precomputed_matches_points() {
        let sqrt2 = 2.0_f64.sqrt();
        let distances = vec![
            vec![0.0, 1.0, sqrt2, 1.0],
            vec![1.0, 0.0, 1.0, sqrt2],
            vec![sqrt2, 1.0, 0.0, 1.0],
            vec![1.0, sqrt2, 1.0, 0.0],
        ];
        let config = PersistenceConfig::builder().build().unwrap();
        let from_points = run(&unit_square(), &config);
        let from_matrix = run(&MetricInput::DistanceMatrix(distances.clone()), &config);
        let precomputed = PersistenceConfig::builder()
            .with_metric(Metric::Precomputed)
            .build()
            .unwrap();
        let from_precomputed = run(&MetricInput::PointCloud(distances), &precomputed);
        assert_eq!(non_trivial(&from_points, 1), non_trivial(&from_matrix, 1));
        assert_eq!(from_matrix, from_precomputed);
    }

    #[test]
    fn test_standard_reduction_stops_when_interrupted() {
        let never = AtomicBool::new(false);
        let config = PersistenceConfig::builder().build().unwrap();
        let boundary = build_boundary::<Z2>(&noisy_circle(8), &config, &never).unwrap();

        let raised = AtomicBool::new(true);
        let Err(err) = standard_algo_with_diagram_interruptible(&boundary, &raised) else {
            panic!("reduction should stop on a raised flag");
        };
        assert_eq!(err, phdiag::PhdiagError::Interrupted);
        assert!(matches!(PersistenceError::from(err), PersistenceError::Cancelled));

        let standard = PersistenceConfig::builder()
            .with_algorithm(ReductionAlgorithm::Standard)
            .build()
            .unwrap();
        let result = compute_diagram::<Z2>(&noisy_circle(8), &standard, &raised);
        assert!(matches!(result, Err(PersistenceError::Cancelled)));
    }

    #[test]
    fn test_cancelled_and_budget() {
        let config = PersistenceConfig::builder().build().unwrap();
        let raised = AtomicBool::new(true);
        let result = compute_diagram::<Z2>(&unit_square(), &config, &raised);
        assert!(matches!(result, Err(PersistenceError::Cancelled)));

        let small = PersistenceConfig::builder()
            .with_max_simplices(5)
            .build()
            .unwrap();
        let never = AtomicBool::new(false);
        let result = compute_diagram::<Z2>(&unit_square(), &small, &never);
        assert!(matches!(result, Err(PersistenceError::OutOfMemory { .. })));
    }
}
