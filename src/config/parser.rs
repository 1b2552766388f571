use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use device_catalog::config::load_config;
///
/// let config = load_config(Path::new("catalog.toml")).unwrap();
/// println!("Output directory: {}", config.output.directory);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// File in the output directory holding the hash of the last run's config
pub const CONFIG_STAMP_FILE: &str = ".config-hash";

/// How the current configuration compares with the last run into a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStamp {
    /// No earlier run left a stamp
    New,
    Unchanged,
    /// The configuration differs from the one that wrote the existing files
    Changed { previous: String },
}

/// Computes a SHA-256 hash of the configuration file content
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Records the config hash in the output directory and reports whether it changed
///
/// Existing files keep the header they were created with, so a changed
/// policy or selector set only shows up in files created from now on.
pub fn stamp_output_dir(output_dir: &Path, hash: &str) -> Result<ConfigStamp, ConfigError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(CONFIG_STAMP_FILE);

    let stamp = match std::fs::read_to_string(&path) {
        Ok(previous) if previous.trim() == hash => ConfigStamp::Unchanged,
        Ok(previous) => ConfigStamp::Changed {
            previous: previous.trim().to_string(),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigStamp::New,
        Err(e) => return Err(e.into()),
    };

    if stamp != ConfigStamp::Unchanged {
        std::fs::write(&path, format!("{}\n", hash))?;
    }
    Ok(stamp)
}
