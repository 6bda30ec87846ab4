//! Conservation tests for the remapping operators.
//!
//! These check that mapping a field preserves what it should:
//! - Length-weighted averages and constants for 1D axis weights
//! - Global integrals for sparse grid operators

use approx::assert_relative_eq;
use inputgen_core::axis_remap::{gen_remap_weights_1d, interval_overlap};
use inputgen_core::config::RegridConfig;
use inputgen_core::conservation::DiagnosticTimes;
use inputgen_core::field::{Dataset, Field};
use inputgen_core::mapping::{GridOperator, GridShape, MappingFields};
use inputgen_core::regrid::SparseRegridder;
use inputgen_core::sparse::CsrMatrix;
use inputgen_core::InputgenError;
use ndarray::{array, Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random contiguous cells covering `[0, length]`.
fn random_edges(rng: &mut StdRng, ncells: usize, length: f64) -> Array1<f64> {
    let mut cuts: Vec<f64> = (0..ncells - 1).map(|_| rng.gen_range(0.0..length)).collect();
    cuts.sort_by(|a, b| a.total_cmp(b));
    let mut edges = vec![0.0];
    edges.extend(cuts);
    edges.push(length);
    Array1::from(edges)
}

fn bounds_from_edges(edges: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((edges.len() - 1, 2), |(i, side)| edges[i + side])
}

mod axis_weights {
    use super::*;

    #[test]
    fn test_overlap_is_symmetric_and_order_free() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let a = [rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)];
            let b = [rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)];

            let overlap = interval_overlap(a, b);
            assert!(overlap >= 0.0);
            assert_eq!(overlap, interval_overlap(b, a));
            assert_eq!(overlap, interval_overlap([a[1], a[0]], b));
            assert_eq!(overlap, interval_overlap(a, [b[1], b[0]]));
        }
    }

    #[test]
    fn test_rows_sum_to_one_when_covered() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let src = bounds_from_edges(&random_edges(&mut rng, 20, 5000.0));
            let dst = bounds_from_edges(&random_edges(&mut rng, 13, 5000.0));

            let weights = gen_remap_weights_1d(src.view(), dst.view(), "m", "m").unwrap();

            assert_eq!(weights.shape(), (13, 20));
            for sum in weights.row_sums().iter() {
                assert_relative_eq!(*sum, 1.0, epsilon = 1e-9);
            }
            let dense = weights.to_dense();
            assert!(dense.iter().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn test_constant_field_round_trips() {
        let mut rng = StdRng::seed_from_u64(3);
        let src = bounds_from_edges(&random_edges(&mut rng, 40, 1.0));
        let dst = bounds_from_edges(&random_edges(&mut rng, 25, 1.0));

        let weights = gen_remap_weights_1d(src.view(), dst.view(), "km", "km").unwrap();
        let mapped = weights.mul_vec(Array1::ones(40).view()).unwrap();

        for value in mapped.iter() {
            assert_relative_eq!(*value, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_length_weighted_integral_is_conserved() {
        // When dst covers src exactly, sum(dst_len * mapped) == sum(src_len * values)
        let mut rng = StdRng::seed_from_u64(11);
        let src_edges = random_edges(&mut rng, 30, 100.0);
        let dst_edges = random_edges(&mut rng, 12, 100.0);
        let src = bounds_from_edges(&src_edges);
        let dst = bounds_from_edges(&dst_edges);
        let values = Array1::from_shape_fn(30, |_| rng.gen_range(0.0..50.0));

        let weights = gen_remap_weights_1d(src.view(), dst.view(), "m", "m").unwrap();
        let mapped = weights.mul_vec(values.view()).unwrap();

        let src_total: f64 = (0..30)
            .map(|i| (src_edges[i + 1] - src_edges[i]) * values[i])
            .sum();
        let dst_total: f64 = (0..12)
            .map(|i| (dst_edges[i + 1] - dst_edges[i]) * mapped[i])
            .sum();
        assert_relative_eq!(src_total, dst_total, max_relative = 1e-9);
    }

    #[test]
    fn test_decreasing_source_axis() {
        let src = array![[100.0, 50.0], [50.0, 0.0]];
        let dst = array![[0.0, 25.0], [25.0, 75.0], [75.0, 100.0]];
        let weights = gen_remap_weights_1d(src.view(), dst.view(), "m", "m").unwrap();

        assert_eq!(weights.to_dense(), array![[0.0, 1.0], [0.5, 0.5], [1.0, 0.0]]);
    }
}

mod grid_operators {
    use super::*;

    fn identity_operator(n: usize) -> GridOperator {
        let diagonal: Vec<usize> = (0..n).collect();
        let weights = CsrMatrix::from_triplets(n, n, &diagonal, &diagonal, &vec![1.0; n]).unwrap();
        GridOperator::new(
            weights,
            GridShape::new(1, n),
            GridShape::new(1, n),
            Array1::from_elem(n, 4.0 * std::f64::consts::PI / n as f64),
            Array1::from_elem(n, 4.0 * std::f64::consts::PI / n as f64),
        )
        .unwrap()
    }

    fn river_dataset(name: &str, data: Array3<f64>) -> Dataset {
        let field = Field::new(name, &["time", "nlat", "nlon"], data.into_dyn())
            .unwrap()
            .with_attr("units", "nmol/cm^2/s");
        let mut ds = Dataset::new();
        ds.insert(field);
        ds
    }

    #[test]
    fn test_identity_operator_conserves() {
        let ds = river_dataset("din_riv_flux", array![[[1.0, 2.0, 3.0, 4.0]]]);
        let regridder = SparseRegridder::new(
            identity_operator(4),
            RegridConfig {
                scale_factor: 1.0,
                ..RegridConfig::default()
            },
        );

        let (mapped, reports) = regridder
            .map_variable_with_reports(&ds, "din_riv_flux")
            .unwrap();

        assert_eq!(
            mapped.data.iter().copied().collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(reports.len(), 1);
        assert!(reports[0].rel_err < 1e-12);
        assert!(reports[0].native_sum > 0.0);
    }

    #[test]
    fn test_esmf_operator_conserves_global_integral() {
        // 2x2 source cells of unequal area merged into one destination cell
        let fields = MappingFields {
            src_grid_dims: Some(vec![2, 2]),
            dst_grid_dims: Some(vec![1, 1]),
            s: Some(vec![0.1, 0.2, 0.3, 0.4]),
            row: Some(vec![1, 1, 1, 1]),
            col: Some(vec![1, 2, 3, 4]),
            area_a: Some(vec![0.1, 0.2, 0.3, 0.4]),
            area_b: Some(vec![1.0]),
        };
        let regridder = SparseRegridder::from_source(
            &fields,
            RegridConfig {
                diagnostic_times: DiagnosticTimes::All,
                max_relative_error: Some(1e-12),
                ..RegridConfig::default()
            },
        )
        .unwrap();
        let data =
            Array3::from_shape_fn((5, 2, 2), |(t, j, i)| (t + 1) as f64 * (j * 2 + i + 1) as f64);
        let ds = river_dataset("dfe_riv_flux", data);

        let (mapped, reports) = regridder
            .map_variable_with_reports(&ds, "dfe_riv_flux")
            .unwrap();

        assert_eq!(mapped.shape(), &[5, 1, 1]);
        assert_eq!(reports.len(), 5);
        for report in &reports {
            assert_relative_eq!(report.native_sum, report.mapped_sum, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_lossy_operator_fails_strict_check() {
        let fields = MappingFields {
            src_grid_dims: Some(vec![2, 1]),
            dst_grid_dims: Some(vec![1, 1]),
            s: Some(vec![1.0]),
            row: Some(vec![1]),
            col: Some(vec![1]),
            area_a: Some(vec![1.0, 1.0]),
            area_b: Some(vec![1.0]),
        };
        let regridder = SparseRegridder::from_source(
            &fields,
            RegridConfig {
                max_relative_error: Some(0.1),
                ..RegridConfig::default()
            },
        )
        .unwrap();
        let ds = river_dataset("doc_riv_flux", Array3::from_elem((2, 1, 2), 1.0));

        let error = regridder.map_variable(&ds, "doc_riv_flux").unwrap_err();
        match error {
            InputgenError::ConservationViolation {
                variable, rel_err, ..
            } => {
                assert_eq!(variable, "doc_riv_flux");
                assert_relative_eq!(rel_err, 0.5, max_relative = 1e-12);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_cases() {
        let regridder = SparseRegridder::new(identity_operator(4), RegridConfig::default());
        let ds = river_dataset("din_riv_flux", Array3::zeros((2, 1, 3)));

        assert!(matches!(
            regridder.map_variable(&ds, "dip_riv_flux"),
            Err(InputgenError::NotFound { .. })
        ));
        assert!(matches!(
            regridder.map_variable(&ds, "din_riv_flux"),
            Err(InputgenError::DimensionMismatch(_))
        ));
    }
}
