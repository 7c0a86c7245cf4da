use serde::{Deserialize, Serialize};
use singularity_core::{SingularityError, SingularityOptions};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub backup: Option<BackupConfig>,
    #[serde(default)]
    pub replication: Option<ReplicationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub connection: String,
    #[serde(default = "default_compression_level")]
    pub compression_level: f64,
    #[serde(default = "default_quantum_storage")]
    pub quantum_storage: bool,
}

fn default_compression_level() -> f64 {
    0.9
}

fn default_quantum_storage() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Connection string of the default target store.
    pub target: String,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, SingularityError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("SINGULARITY").separator("__"))
            .build()
            .map_err(|e| SingularityError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| SingularityError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn store_options(&self) -> SingularityOptions {
        SingularityOptions {
            connection: self.store.connection.clone(),
            compression_level: self.store.compression_level,
            quantum_storage: self.store.quantum_storage,
        }
    }

    pub fn backup_dir(&self) -> Option<&PathBuf> {
        self.backup.as_ref().map(|backup| &backup.dir)
    }

    pub fn replication_target(&self) -> Option<&str> {
        self.replication.as_ref().map(|replication| replication.target.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file_applies_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("singularity.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "store:\n  connection: \"sqlite:///blackhole.db\"").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        let options = config.store_options();
        assert_eq!(options.connection, "sqlite:///blackhole.db");
        assert_eq!(options.compression_level, 0.9);
        assert!(options.quantum_storage);
        assert!(config.backup_dir().is_none());
        assert!(config.replication_target().is_none());
    }

    #[test]
    fn test_from_file_reads_sections() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("singularity.yaml");
        std::fs::write(
            &path,
            "store:\n  connection: \":memory:\"\n  compression_level: 0.5\n  quantum_storage: false\n\
             backup:\n  dir: /var/backups/singularity\n\
             replication:\n  target: \"sqlite:///mirror.db\"\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.store.compression_level, 0.5);
        assert!(!config.store.quantum_storage);
        assert_eq!(
            config.backup_dir(),
            Some(&PathBuf::from("/var/backups/singularity"))
        );
        assert_eq!(config.replication_target(), Some("sqlite:///mirror.db"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/singularity.yaml").unwrap_err();
        assert!(matches!(err, SingularityError::Config(_)));
    }
}
