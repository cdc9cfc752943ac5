use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geojson::{Feature, FeatureCollection};
use crate::geometry::Bounds;

/// Errors kept per run; later ones are only counted.
pub const MAX_RECORDED_ERRORS: usize = 100;

/// A recoverable failure noted during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub chunk_index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    pub feature_count: usize,
    pub layer_count: usize,
    /// Feature count per geometry type.
    pub feature_types: BTreeMap<String, usize>,
    pub failed_transformations: usize,
    /// Malformed features the store refused.
    pub dropped_features: usize,
    pub errors: Vec<ProcessingError>,
}

/// Output of a `process()` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorResult {
    pub features: FeatureCollection,
    pub bounds: Option<Bounds>,
    /// Distinct `layer` properties, sorted.
    pub layers: Vec<String>,
    /// System the features are expressed in.
    pub coordinate_system: String,
    pub statistics: ProcessingStatistics,
}

/// Sorted distinct layer names.
pub fn collect_layers(features: &[Feature]) -> Vec<String> {
    features
        .iter()
        .filter_map(Feature::layer)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn count_feature_types(features: &[Feature]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for kind in features.iter().filter_map(Feature::geometry_type) {
        *counts.entry(kind.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::Geometry;

    #[test]
    fn test_layers_and_types() {
        let features = vec![
            Feature::new(Geometry::Point(vec![0.0, 0.0])).with_property("layer", "walls"),
            Feature::new(Geometry::LineString(vec![vec![0.0, 0.0], vec![1.0, 1.0]]))
                .with_property("layer", "doors"),
            Feature::new(Geometry::Point(vec![1.0, 0.0])).with_property("layer", "walls"),
            Feature::new(Geometry::Point(vec![2.0, 0.0])),
        ];
        assert_eq!(collect_layers(&features), vec!["doors", "walls"]);

        let types = count_feature_types(&features);
        assert_eq!(types.get("Point"), Some(&3));
        assert_eq!(types.get("LineString"), Some(&1));
    }
}
