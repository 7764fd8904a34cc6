// Feature domain model - warehouse rows and chart records
use serde::Serialize;

/// One row of `feature_analysis` as returned by the point lookup
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub feature: String,
    pub current_value: Option<f64>,
    pub optimal_value: Option<f64>,
}

impl FeatureRow {
    pub fn new(feature: String, current_value: Option<f64>, optimal_value: Option<f64>) -> Self {
        Self {
            feature,
            current_value,
            optimal_value,
        }
    }
}

/// Chart-ready record: one category with its two bars
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub category: String,
    pub current_value: f64,
    pub optimal_value: f64,
}

impl ChartRecord {
    pub fn new(category: String, current_value: f64, optimal_value: f64) -> Self {
        Self {
            category,
            current_value,
            optimal_value,
        }
    }
}

/// Format the first row of a point lookup into chart records.
///
/// Yields at most one record. A row with either value missing or NaN counts
/// as no data at all rather than a half-drawn chart.
pub fn format_chart_data(feature_name: Option<&str>, row: Option<&FeatureRow>) -> Vec<ChartRecord> {
    let (Some(feature_name), Some(row)) = (feature_name, row) else {
        return Vec::new();
    };

    match (present(row.current_value), present(row.optimal_value)) {
        (Some(current), Some(optimal)) => {
            vec![ChartRecord::new(feature_name.to_string(), current, optimal)]
        }
        _ => {
            tracing::warn!(
                "Missing Current_Value or Optimal_Value for feature {}",
                feature_name
            );
            Vec::new()
        }
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}
