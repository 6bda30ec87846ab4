//! Applying a [`GridOperator`] to time-varying fields.
//!
//! Each time step of the source variable is flattened row-major, multiplied by
//! the configured scale factor and pushed through the sparse weights. The
//! mapped steps are stacked back into a `("time", "y", "x")` field on the
//! destination grid. Selected time steps also get a [`ConservationReport`]
//! comparing global integrals before and after mapping.

use crate::config::RegridConfig;
use crate::conservation::{global_integral, ConservationReport, Conversion, ConversionTable};
use crate::errors::{InputgenError, InputgenResult};
use crate::field::{AttrValue, Dataset, Field, FillValue};
use crate::mapping::{GridOperator, MappingSource};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Maps variables from a source grid onto a destination grid.
///
/// The operator is read-only, so one regridder can be shared across threads.
#[derive(Debug, Clone)]
pub struct SparseRegridder {
    operator: GridOperator,
    config: RegridConfig,
    conversions: ConversionTable,
}

impl SparseRegridder {
    pub fn new(operator: GridOperator, config: RegridConfig) -> Self {
        let conversions = config.conversion_table();
        Self {
            operator,
            config,
            conversions,
        }
    }

    /// Loads the operator from `source` and wraps it.
    pub fn from_source(source: &impl MappingSource, config: RegridConfig) -> InputgenResult<Self> {
        config.validate()?;
        Ok(Self::new(GridOperator::load(source)?, config))
    }

    pub fn operator(&self) -> &GridOperator {
        &self.operator
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    /// Maps `variable` from `dataset` onto the destination grid.
    ///
    /// See [`SparseRegridder::map_variable_with_reports`] for the checks made.
    pub fn map_variable(&self, dataset: &Dataset, variable: &str) -> InputgenResult<Field> {
        self.map_variable_with_reports(dataset, variable)
            .map(|(field, _)| field)
    }

    /// Maps `variable` and returns the conservation reports that were printed.
    ///
    /// # Errors
    ///
    /// * [`InputgenError::NotFound`] if the dataset has no such variable
    /// * [`InputgenError::DimensionMismatch`] if the variable's first dimension
    ///   is not `time` or a time step does not have `src_grid_size` values
    /// * [`InputgenError::ConservationViolation`] if `max_relative_error` is
    ///   configured and a report exceeds it
    pub fn map_variable_with_reports(
        &self,
        dataset: &Dataset,
        variable: &str,
    ) -> InputgenResult<(Field, Vec<ConservationReport>)> {
        let field = dataset.get(variable)?;
        let native = self.native_steps(field)?;
        let ntime = native.nrows();
        debug!(variable, ntime, parallel = self.config.parallel, "mapping variable");

        let scale_factor = self.config.scale_factor;
        let weights = self.operator.weights();
        let map_step = |t: usize| -> InputgenResult<Array1<f64>> {
            let scaled = native.row(t).mapv(|value| value * scale_factor);
            weights.mul_vec(scaled.view())
        };
        let mapped: Vec<Array1<f64>> = if self.config.parallel {
            (0..ntime)
                .into_par_iter()
                .map(map_step)
                .collect::<InputgenResult<_>>()?
        } else {
            (0..ntime).map(map_step).collect::<InputgenResult<_>>()?
        };

        let reports = self.check_conservation(variable, &native, &mapped)?;

        let dst_shape = self.operator.dst_shape();
        let stacked = Array3::from_shape_vec(
            (ntime, dst_shape.rows, dst_shape.cols),
            mapped.iter().flat_map(|step| step.iter().copied()).collect(),
        )
        .map_err(|e| InputgenError::DimensionMismatch(e.to_string()))?;

        let mut output = Field::new(variable, &["time", "y", "x"], stacked.into_dyn())?;
        if let Some(time) = dataset.coord_for(field, "time") {
            output = output.with_coord("time", time)?;
        }
        output.attrs = field.attrs.clone();
        output.attrs.insert(
            "units".to_string(),
            AttrValue::from(self.config.destination_units.as_str()),
        );
        output.encoding.fill_value = FillValue::Disabled;

        Ok((output, reports))
    }

    /// Maps several variables into a new dataset sharing the time coordinate.
    pub fn map_variables(&self, dataset: &Dataset, variables: &[&str]) -> InputgenResult<Dataset> {
        let mut mapped = Dataset::new();
        if let Some(time) = dataset.coords.get("time") {
            mapped = mapped.with_coord("time", time.clone());
        }
        for variable in variables {
            mapped.insert(self.map_variable(dataset, variable)?);
        }
        Ok(mapped)
    }

    /// The field's values as `(ntime, src_grid_size)`, row-major per step.
    fn native_steps(&self, field: &Field) -> InputgenResult<Array2<f64>> {
        if field.dims.first().map(String::as_str) != Some("time") {
            return Err(InputgenError::DimensionMismatch(format!(
                "variable '{}' must have 'time' as its first dimension, has {:?}",
                field.name, field.dims
            )));
        }

        let ntime = field.shape()[0];
        let step_size: usize = field.shape()[1..].iter().product();
        let src_size = self.operator.src_grid_size();
        if step_size != src_size {
            return Err(InputgenError::DimensionMismatch(format!(
                "variable '{}' has {step_size} values per time step but the source grid has {src_size} cells",
                field.name
            )));
        }

        Array2::from_shape_vec((ntime, src_size), field.data.iter().copied().collect())
            .map_err(|e| InputgenError::DimensionMismatch(e.to_string()))
    }

    fn check_conservation(
        &self,
        variable: &str,
        native: &Array2<f64>,
        mapped: &[Array1<f64>],
    ) -> InputgenResult<Vec<ConservationReport>> {
        let factor = match self.conversions.lookup(variable) {
            Conversion::Skip => return Ok(Vec::new()),
            Conversion::Factor(factor) => factor,
        };
        let radius = self.config.earth_radius;

        let mut reports = Vec::new();
        for t in self.config.diagnostic_times.select(mapped.len()) {
            let native_sum = global_integral(
                native.row(t),
                self.operator.src_area().view(),
                self.config.scale_factor * factor,
                radius,
            );
            let mapped_sum = global_integral(
                mapped[t].view(),
                self.operator.dst_area().view(),
                factor,
                radius,
            );
            let report = ConservationReport::new(variable, t, native_sum, mapped_sum);

            println!("{report}");
            debug!(
                variable,
                time_index = t,
                native_sum,
                mapped_sum,
                rel_err = report.rel_err,
                "conservation check"
            );
            if native_sum == 0.0 && mapped_sum != 0.0 {
                warn!(variable, time_index = t, "native global sum is zero");
            }

            if let Some(threshold) = self.config.max_relative_error {
                if report.rel_err > threshold {
                    return Err(InputgenError::ConservationViolation {
                        variable: variable.to_string(),
                        time_index: t,
                        rel_err: report.rel_err,
                        threshold,
                    });
                }
            }
            reports.push(report);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conservation::DiagnosticTimes;
    use crate::mapping::{GridShape, MappingFields};
    use crate::sparse::CsrMatrix;
    use is_close::is_close;
    use ndarray::{array, Array, Array1};

    /// Averages pairs of cells of a 1x4 grid onto a 1x2 grid.
    fn pairwise_operator() -> GridOperator {
        let weights =
            CsrMatrix::from_dense(array![[0.5, 0.5, 0.0, 0.0], [0.0, 0.0, 0.5, 0.5]].view());
        GridOperator::new(
            weights,
            GridShape::new(1, 4),
            GridShape::new(1, 2),
            Array1::from_elem(4, 1.0),
            Array1::from_elem(2, 2.0),
        )
        .unwrap()
    }

    fn dataset(name: &str, data: Array3<f64>) -> Dataset {
        let ntime = data.shape()[0];
        let field = Field::new(name, &["time", "lat", "lon"], data.into_dyn())
            .unwrap()
            .with_attr("units", "nmol/cm^2/s")
            .with_attr("long_name", "river flux");
        let mut ds = Dataset::new().with_coord("time", Array::range(0.0, ntime as f64, 1.0));
        ds.insert(field);
        ds
    }

    #[test]
    fn test_map_variable_shape_and_metadata() {
        let values = vec![1.0, 3.0, 5.0, 7.0, 2.0, 2.0, 4.0, 4.0];
        let data = Array3::from_shape_vec((2, 1, 4), values).unwrap();
        let ds = dataset("din_riv_flux", data);
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());

        let mapped = regridder.map_variable(&ds, "din_riv_flux").unwrap();

        assert_eq!(mapped.dims, vec!["time", "y", "x"]);
        assert_eq!(mapped.shape(), &[2, 1, 2]);
        assert!(is_close!(mapped.data[[0, 0, 0]], 0.02));
        assert!(is_close!(mapped.data[[0, 0, 1]], 0.06));
        assert!(is_close!(mapped.data[[1, 0, 1]], 0.04));
        assert_eq!(mapped.units(), Some("mmol/m^2/s"));
        assert_eq!(mapped.attrs["long_name"], AttrValue::from("river flux"));
        assert_eq!(mapped.encoding.fill_value, FillValue::Disabled);
        assert_eq!(mapped.coords["time"], array![0.0, 1.0]);

        // Input untouched
        assert_eq!(ds.get("din_riv_flux").unwrap().units(), Some("nmol/cm^2/s"));
    }

    #[test]
    fn test_serial_matches_parallel() {
        let data = Array3::from_shape_fn((6, 1, 4), |(t, _, x)| (t * 4 + x) as f64);
        let ds = dataset("dic_riv_flux", data);
        let parallel = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        let serial = SparseRegridder::new(
            pairwise_operator(),
            RegridConfig {
                parallel: false,
                ..RegridConfig::default()
            },
        );

        assert_eq!(
            parallel.map_variable(&ds, "dic_riv_flux").unwrap(),
            serial.map_variable(&ds, "dic_riv_flux").unwrap()
        );
    }

    #[test]
    fn test_reports_first_and_last() {
        let data = Array3::from_elem((3, 1, 4), 1.0);
        let ds = dataset("dip_riv_flux", data);
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());

        let (_, reports) = regridder.map_variable_with_reports(&ds, "dip_riv_flux").unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].time_index, 0);
        assert_eq!(reports[1].time_index, 2);
        // Source area 4 sr, destination 4 sr: the operator conserves
        for report in &reports {
            assert!(report.rel_err < 1e-12);
        }
    }

    #[test]
    fn test_skipped_variable_has_no_reports() {
        let ds = dataset("alk_riv_flux", Array3::from_elem((2, 1, 4), 1.0));
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        let (_, reports) = regridder.map_variable_with_reports(&ds, "alk_riv_flux").unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn test_unknown_variable_reports_zero() {
        let ds = dataset("my_tracer", Array3::from_elem((1, 1, 4), 1.0));
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        let (_, reports) = regridder.map_variable_with_reports(&ds, "my_tracer").unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].native_sum, 0.0);
        assert_eq!(reports[0].rel_err, 0.0);
    }

    #[test]
    fn test_strict_conservation() {
        // Drops the last two source cells, so half the mass is lost
        let weights =
            CsrMatrix::from_dense(array![[0.5, 0.5, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]].view());
        let operator = GridOperator::new(
            weights,
            GridShape::new(1, 4),
            GridShape::new(1, 2),
            Array1::from_elem(4, 1.0),
            Array1::from_elem(2, 2.0),
        )
        .unwrap();
        let ds = dataset("dsi_riv_flux", Array3::from_elem((2, 1, 4), 1.0));

        let lenient = SparseRegridder::new(operator.clone(), RegridConfig::default());
        let (_, reports) = lenient.map_variable_with_reports(&ds, "dsi_riv_flux").unwrap();
        assert!(is_close!(reports[0].rel_err, 0.5));

        let strict = SparseRegridder::new(
            operator,
            RegridConfig {
                max_relative_error: Some(1e-6),
                diagnostic_times: DiagnosticTimes::All,
                ..RegridConfig::default()
            },
        );
        let result = strict.map_variable(&ds, "dsi_riv_flux");
        assert!(matches!(
            result,
            Err(InputgenError::ConservationViolation { time_index: 0, .. })
        ));
    }

    #[test]
    fn test_not_found() {
        let ds = dataset("din_riv_flux", Array3::zeros((1, 1, 4)));
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        assert!(matches!(
            regridder.map_variable(&ds, "don_riv_flux"),
            Err(InputgenError::NotFound { .. })
        ));
    }

    #[test]
    fn test_wrong_grid_size() {
        let ds = dataset("din_riv_flux", Array3::zeros((1, 2, 3)));
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        assert!(matches!(
            regridder.map_variable(&ds, "din_riv_flux"),
            Err(InputgenError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_missing_time_dimension() {
        let field =
            Field::new("din_riv_flux", &["lat", "lon"], Array2::zeros((1, 4)).into_dyn()).unwrap();
        let mut ds = Dataset::new();
        ds.insert(field);
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());
        assert!(matches!(
            regridder.map_variable(&ds, "din_riv_flux"),
            Err(InputgenError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_map_variables() {
        let mut ds = dataset("din_riv_flux", Array3::from_elem((2, 1, 4), 1.0));
        let other = Field::new(
            "dfe_riv_flux",
            &["time", "lat", "lon"],
            Array3::from_elem((2, 1, 4), 2.0).into_dyn(),
        )
        .unwrap();
        ds.insert(other);
        let regridder = SparseRegridder::new(pairwise_operator(), RegridConfig::default());

        let mapped = regridder.map_variables(&ds, &["din_riv_flux", "dfe_riv_flux"]).unwrap();
        assert_eq!(mapped.variables.len(), 2);
        assert!(is_close!(mapped.get("dfe_riv_flux").unwrap().data[[1, 0, 0]], 0.02));
        assert_eq!(mapped.coords["time"], array![0.0, 1.0]);
    }

    #[test]
    fn test_from_source() {
        let fields = MappingFields {
            src_grid_dims: Some(vec![4, 1]),
            dst_grid_dims: Some(vec![2, 1]),
            s: Some(vec![0.5, 0.5, 0.5, 0.5]),
            row: Some(vec![1, 1, 2, 2]),
            col: Some(vec![1, 2, 3, 4]),
            area_a: Some(vec![1.0; 4]),
            area_b: Some(vec![2.0; 2]),
        };
        let regridder = SparseRegridder::from_source(&fields, RegridConfig::default()).unwrap();
        assert_eq!(regridder.operator(), &pairwise_operator());
    }
}
