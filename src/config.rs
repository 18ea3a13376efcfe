use envconfig::Envconfig;
use log::debug;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "SEMANTIC_MODEL_DIR", default = "semantic_models")]
    pub model_dir: String,

    #[envconfig(from = "SEMANTIC_MODEL")]
    pub default_model: Option<String>,
}

impl Config {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        debug!(
            "Config loaded: model_dir={}, default_model={:?}",
            config.model_dir, config.default_model
        );
        Ok(config)
    }
}

/// Bounds for how many result rows are handed to a chart.
#[derive(Envconfig, Clone, Debug, PartialEq)]
pub struct ChartConfig {
    #[envconfig(from = "CHART_MIN_ROWS", default = "3000")]
    pub min_rows: usize,

    #[envconfig(from = "CHART_MAX_ROWS", default = "20000")]
    pub max_rows: usize,

    #[envconfig(from = "CHART_TARGET_BYTES", default = "8388608")]
    pub target_bytes: usize,
}

impl ChartConfig {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        debug!(
            "ChartConfig loaded: min_rows={}, max_rows={}, target_bytes={}",
            config.min_rows, config.max_rows, config.target_bytes
        );
        Ok(config)
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            min_rows: 3000,
            max_rows: 20000,
            target_bytes: 8 * 1024 * 1024,
        }
    }
}
