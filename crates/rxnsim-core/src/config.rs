use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SimError};

/// Top-level configuration for an rxnsim batch run.
///
/// Every file location and seed that a batch phase needs is carried here and
/// passed explicitly to the phase; nothing is read from process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl SimConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make a batch phase fail later.
    pub fn validate(&self) -> Result<()> {
        if self.search.default_k == 0 {
            return Err(SimError::Config("search.default_k must be positive".into()));
        }
        if self.search.probe_k == 0 {
            return Err(SimError::Config("search.probe_k must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(SimError::Config(
                "embedding.batch_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Locations of the artifacts exchanged between batch phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw embedding vectors, a JSON array of arrays in identifier order.
    pub vectors_file: PathBuf,
    /// Reaction metadata, a JSON array of reaction records.
    pub metadata_file: PathBuf,
    /// Serialized similarity index.
    pub index_file: PathBuf,
    /// Serialized full similarity matrix.
    pub matrix_file: PathBuf,
    /// Ranked output of the single-reaction search.
    pub results_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vectors_file: PathBuf::from("rxn_fingerprints.json"),
            metadata_file: PathBuf::from("rxn_data.json"),
            index_file: PathBuf::from("reaction_embeddings.idx"),
            matrix_file: PathBuf::from("pair_cos_sim.mat"),
            results_file: PathBuf::from("query_result.json"),
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of neighbours returned by the single-reaction search.
    pub default_k: usize,
    /// Number of neighbours returned by the random probe query.
    pub probe_k: usize,
    /// Seed for the random probe query.
    pub probe_seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 30,
            probe_k: 3,
            probe_seed: 10,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Number of reactions sent to the provider per call.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Group analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// EC number prefix selecting the analysed group.
    pub ec_prefix: String,
    /// Largest store for which the full N x N matrix may be materialized.
    pub max_materialized_vectors: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ec_prefix: "3.5.1.".to_string(),
            max_materialized_vectors: 20_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.paths.index_file, PathBuf::from("reaction_embeddings.idx"));
        assert_eq!(config.search.default_k, 30);
        assert_eq!(config.search.probe_k, 3);
        assert_eq!(config.search.probe_seed, 10);
        assert_eq!(config.embedding.batch_size, 1000);
        assert_eq!(config.analysis.ec_prefix, "3.5.1.");
        assert_eq!(config.analysis.max_materialized_vectors, 20_000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[paths]
vectors_file = "/data/fps.json"
metadata_file = "/data/rxn.json"
index_file = "/data/rxn.idx"
matrix_file = "/data/rxn.mat"
results_file = "/data/out.json"

[search]
default_k = 10
probe_k = 5
probe_seed = 42

[embedding]
batch_size = 256

[analysis]
ec_prefix = "2.7.1."
max_materialized_vectors = 5000
"#;
        let file = create_temp_config(content);
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.paths.vectors_file, PathBuf::from("/data/fps.json"));
        assert_eq!(config.paths.results_file, PathBuf::from("/data/out.json"));
        assert_eq!(config.search.default_k, 10);
        assert_eq!(config.search.probe_seed, 42);
        assert_eq!(config.embedding.batch_size, 256);
        assert_eq!(config.analysis.ec_prefix, "2.7.1.");
        assert_eq!(config.analysis.max_materialized_vectors, 5000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[search]
default_k = 5
"#;
        let file = create_temp_config(content);
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.search.default_k, 5);
        assert_eq!(config.search.probe_k, 3);
        assert_eq!(config.embedding.batch_size, 1000);
        assert_eq!(config.paths.matrix_file, PathBuf::from("pair_cos_sim.mat"));
    }

    #[test]
    fn test_load_rejects_zero_k() {
        let file = create_temp_config("[search]\ndefault_k = 0\n");
        let result = SimConfig::load(file.path());
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_load_rejects_zero_batch_size() {
        let file = create_temp_config("[embedding]\nbatch_size = 0\n");
        assert!(SimConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(matches!(
            SimConfig::load(file.path()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SimConfig::load_or_default(Path::new("/nonexistent/rxnsim.toml"));
        assert_eq!(config.search.default_k, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rxnsim.toml");

        let mut config = SimConfig::default();
        config.analysis.ec_prefix = "1.1.1.".to_string();
        config.save(&path).unwrap();

        let reloaded = SimConfig::load(&path).unwrap();
        assert_eq!(reloaded.analysis.ec_prefix, "1.1.1.");
        assert_eq!(reloaded.paths.index_file, config.paths.index_file);
        assert_eq!(reloaded.search.probe_seed, config.search.probe_seed);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.search.default_k, 30);
    }
}
