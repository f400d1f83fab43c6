use serde::Deserialize;

/// Root configuration. Loaded from environment variables with the prefix
/// `AUTOFLOW__` and nested-key separator `__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub experiments: ExperimentsConfig,
}

/// Tunables for rule evaluation and workflow traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Hard ceiling on walker steps per traversal, guarding redirect chains.
    #[serde(default = "default_max_walk_steps")]
    pub max_walk_steps: usize,
    /// Cap applied to `Until`-bounded loops so a predicate that never flips
    /// cannot walk forever.
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u32,
    /// Threshold used at evaluation time when a confidence-bearing rule has
    /// none stored.
    #[serde(default = "default_confidence_threshold")]
    pub default_confidence_threshold: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentsConfig {
    #[serde(default = "default_min_sample_size")]
    pub default_min_sample_size: u64,
    #[serde(default = "default_max_variants")]
    pub max_variants: usize,
}

fn default_max_walk_steps() -> usize {
    256
}
fn default_max_loop_iterations() -> u32 {
    100
}
fn default_confidence_threshold() -> u8 {
    70
}
fn default_min_sample_size() -> u64 {
    100
}
fn default_max_variants() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_walk_steps: default_max_walk_steps(),
            max_loop_iterations: default_max_loop_iterations(),
            default_confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            default_min_sample_size: default_min_sample_size(),
            max_variants: default_max_variants(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            experiments: ExperimentsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("AUTOFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
