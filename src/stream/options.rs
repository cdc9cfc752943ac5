use serde::{Deserialize, Serialize};

use crate::config::{env_parse, process_env};
use crate::crs::WGS84;
use crate::feature_manager::{FeatureManagerOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MEMORY_MB};

pub const DEFAULT_PREVIEW_SAMPLE_SIZE: usize = 1000;

/// DXF import settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DxfOptions {
    /// Layers to keep; empty keeps every layer.
    pub layers: Vec<String>,
    /// Whether block references are exploded into their entities.
    pub explode_blocks: bool,
}

/// CSV / XYZ import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter; detected from the first record when unset.
    pub delimiter: Option<char>,
    pub has_header: bool,
    pub x_column: String,
    pub y_column: String,
    pub z_column: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            z_column: None,
        }
    }
}

/// Shapefile import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapefileOptions {
    /// DBF text encoding label.
    pub encoding: String,
    /// Whether DBF attributes become feature properties.
    pub import_attributes: bool,
}

impl Default for ShapefileOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            import_attributes: true,
        }
    }
}

/// Format-specific settings handed to the chunk parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatOptions {
    #[default]
    Generic,
    Dxf(DxfOptions),
    Csv(CsvOptions),
    Shapefile(ShapefileOptions),
}

impl FormatOptions {
    /// Layer filter, when one applies.
    pub fn layer_filter(&self) -> Option<&[String]> {
        match self {
            FormatOptions::Dxf(dxf) if !dxf.layers.is_empty() => Some(&dxf.layers),
            _ => None,
        }
    }
}

/// Settings for one [`StreamProcessor`](super::StreamProcessor).
///
/// Serialized to canonical JSON to key preview results, so two processors
/// with equal options share cached previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Source system; detected from the first chunk when unset.
    pub coordinate_system: Option<String>,
    /// System the output features are expressed in.
    pub target_system: String,
    /// Features per stored chunk.
    pub chunk_size: usize,
    pub max_memory_mb: usize,
    pub monitor_memory: bool,
    /// Feature limit for `analyze`.
    pub preview_sample_size: usize,
    pub format: FormatOptions,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            coordinate_system: None,
            target_system: WGS84.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            monitor_memory: true,
            preview_sample_size: DEFAULT_PREVIEW_SAMPLE_SIZE,
            format: FormatOptions::Generic,
        }
    }
}

impl ProcessorOptions {
    /// Defaults overridden by the `GEOLOADER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let memory = FeatureManagerOptions::from_lookup(&lookup);
        Self {
            chunk_size: memory.chunk_size,
            max_memory_mb: memory.max_memory_mb,
            monitor_memory: memory.monitor_memory,
            target_system: env_parse(&lookup, "GEOLOADER_TARGET_SYSTEM").unwrap_or_else(|| WGS84.to_string()),
            ..Self::default()
        }
    }

    pub fn with_coordinate_system(mut self, code: impl Into<String>) -> Self {
        self.coordinate_system = Some(code.into());
        self
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    pub fn feature_manager_options(&self) -> FeatureManagerOptions {
        FeatureManagerOptions {
            chunk_size: self.chunk_size,
            max_memory_mb: self.max_memory_mb,
            monitor_memory: self.monitor_memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = ProcessorOptions::default();
        assert_eq!(options.target_system, WGS84);
        assert_eq!(options.chunk_size, 1000);
        assert_eq!(options.preview_sample_size, 1000);
        assert!(options.monitor_memory);
        assert!(options.coordinate_system.is_none());
    }

    #[test]
    fn test_format_is_tagged() {
        let options = ProcessorOptions::default().with_format(FormatOptions::Dxf(DxfOptions {
            layers: vec!["roads".to_string()],
            explode_blocks: false,
        }));
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["format"]["kind"], "dxf");
        assert_eq!(value["format"]["layers"], json!(["roads"]));

        let parsed: ProcessorOptions =
            serde_json::from_value(json!({"format": {"kind": "csv", "delimiter": ";"}})).unwrap();
        let FormatOptions::Csv(csv) = parsed.format else {
            panic!("expected csv options");
        };
        assert_eq!(csv.delimiter, Some(';'));
        assert_eq!(csv.x_column, "x");
        assert_eq!(parsed.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_layer_filter() {
        assert!(FormatOptions::Generic.layer_filter().is_none());
        assert!(FormatOptions::Dxf(DxfOptions::default()).layer_filter().is_none());
        let dxf = FormatOptions::Dxf(DxfOptions {
            layers: vec!["0".to_string()],
            ..Default::default()
        });
        assert_eq!(dxf.layer_filter(), Some(&["0".to_string()][..]));
    }

    #[test]
    fn test_from_lookup() {
        let options = ProcessorOptions::from_lookup(crate::config::map_lookup(&[
            ("GEOLOADER_TARGET_SYSTEM", "EPSG:2056"),
            ("GEOLOADER_CHUNK_SIZE", "250"),
        ]));

        assert_eq!(options.target_system, "EPSG:2056");
        assert_eq!(options.chunk_size, 250);
        assert_eq!(options.feature_manager_options().chunk_size, 250);
    }
}
