use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub endpoint: Option<String>, // Remote geo-data endpoint
    pub file: Option<PathBuf>,    // Local .json / .csv dump
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where city records come from, resolved from [`InputConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataInput {
    Endpoint(String),
    File(PathBuf),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub container: String,
    pub style: PathBuf,
    pub access_token: Option<String>,
    pub max_bounds: [[f64; 2]; 2], // [[west, south], [east, north]]
    pub source_id: String,
    pub layer_id: String,
    pub circle_opacity: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            container: "map-container".to_string(),
            style: PathBuf::from("assets/map-style.json"),
            access_token: None,
            max_bounds: [[-230.0, -60.0], [230.0, 70.0]],
            source_id: "dataPoints".to_string(),
            layer_id: "circle-layer".to_string(),
            circle_opacity: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_point_scale")]
    pub point_scale: f64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    512
}

fn default_point_scale() -> f64 {
    4.0
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.input.data_input()?;
        Ok(config)
    }
}

impl InputConfig {
    pub fn data_input(&self) -> Result<DataInput> {
        match (&self.endpoint, &self.file) {
            (Some(url), None) => Ok(DataInput::Endpoint(url.clone())),
            (None, Some(path)) => Ok(DataInput::File(path.clone())),
            (Some(_), Some(_)) => Err(anyhow!("Set either input.endpoint or input.file, not both")),
            (None, None) => Err(anyhow!("No data input configured (input.endpoint or input.file)")),
        }
    }
}
