use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{DEFAULT_SENSOR_DEVIATION, GridError};

/// Settings for building a likelihood grid, usually read from YAML:
///
/// ```yaml
/// map_path: maps/lab.bt
/// sensor_deviation: 0.05
/// use_cache: true
/// global_frame_id: map
/// slice_z: 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridConfig {
    /// Standard deviation (meters) of the Gaussian sensor model.
    #[serde(
        default = "default_sensor_deviation",
        deserialize_with = "deserialize_sensor_deviation"
    )]
    pub sensor_deviation: f32,
    #[serde(default)]
    pub map_path: Option<PathBuf>,
    /// Read and write the grid cache next to the map.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    /// Cache location; defaults to the map path with a `grid` extension.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_global_frame_id")]
    pub global_frame_id: String,
    #[serde(default = "default_grid_frame_id")]
    pub grid_frame_id: String,
    /// Height of the slice to export for visualization.
    #[serde(default)]
    pub slice_z: Option<f32>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sensor_deviation: DEFAULT_SENSOR_DEVIATION,
            map_path: None,
            use_cache: default_use_cache(),
            cache_path: None,
            global_frame_id: default_global_frame_id(),
            grid_frame_id: default_grid_frame_id(),
            slice_z: None,
        }
    }
}

impl GridConfig {
    pub fn new(sensor_deviation: f32) -> Self {
        Self {
            sensor_deviation,
            ..Default::default()
        }
    }

    /// Read a YAML config. Relative paths are resolved against the file's directory.
    pub fn load(yaml_path: impl AsRef<Path>) -> Result<Self, GridError> {
        let yaml_path = yaml_path.as_ref();
        let yaml_str = std::fs::read_to_string(yaml_path)?;
        let mut config: GridConfig = serde_yaml::from_str(&yaml_str)?;

        config.map_path = config.map_path.map(|p| resolve_path(yaml_path, p));
        config.cache_path = config.cache_path.map(|p| resolve_path(yaml_path, p));
        Ok(config)
    }
}

fn default_sensor_deviation() -> f32 {
    DEFAULT_SENSOR_DEVIATION
}

fn default_use_cache() -> bool {
    true
}

fn default_global_frame_id() -> String {
    "map".to_string()
}

fn default_grid_frame_id() -> String {
    "grid3d".to_string()
}

fn deserialize_sensor_deviation<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f32::deserialize(deserializer)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(
            "sensor_deviation must be a positive number",
        ))
    }
}

fn resolve_path(yaml_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    match yaml_path.parent() {
        Some(parent) => parent.join(path),
        None => path,
    }
}
