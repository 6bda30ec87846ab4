//! Metadata cleanup before datasets are written.

use crate::field::{Dataset, FillValue};
use tracing::debug;

/// Coupler history names and the data-atmosphere stream names they map to.
pub const COUPLER_TO_DATM: [(&str, &str); 14] = [
    ("a2x1d_Faxa_bcphiwet", "BCDEPWET"),
    ("a2x1d_Faxa_bcphodry", "BCPHODRY"),
    ("a2x1d_Faxa_bcphidry", "BCPHIDRY"),
    ("a2x1d_Faxa_ocphiwet", "OCDEPWET"),
    ("a2x1d_Faxa_ocphidry", "OCPHIDRY"),
    ("a2x1d_Faxa_ocphodry", "OCPHODRY"),
    ("a2x1d_Faxa_dstwet1", "DSTX01WD"),
    ("a2x1d_Faxa_dstdry1", "DSTX01DD"),
    ("a2x1d_Faxa_dstwet2", "DSTX02WD"),
    ("a2x1d_Faxa_dstdry2", "DSTX02DD"),
    ("a2x1d_Faxa_dstwet3", "DSTX03WD"),
    ("a2x1d_Faxa_dstdry3", "DSTX03DD"),
    ("a2x1d_Faxa_dstwet4", "DSTX04WD"),
    ("a2x1d_Faxa_dstdry4", "DSTX04DD"),
];

/// Marks every variable without an explicit fill value as having none, so a
/// writer does not add its default `_FillValue`.
pub fn clean_fill_values(dataset: &mut Dataset) {
    for field in dataset.variables.values_mut() {
        if field.encoding.fill_value == FillValue::Default {
            field.encoding.fill_value = FillValue::Disabled;
        }
    }
}

/// Renames coupler history fields to their data-atmosphere names.
pub fn rename_coupler_fields(mut dataset: Dataset) -> Dataset {
    for (coupler_name, datm_name) in COUPLER_TO_DATM {
        if let Some(mut field) = dataset.variables.remove(coupler_name) {
            debug!(from = coupler_name, to = datm_name, "renaming variable");
            field.name = datm_name.to_string();
            dataset.insert(field);
        }
    }
    dataset
}
