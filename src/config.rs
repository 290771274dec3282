//! Run configuration
//!
//! The converter has one tunable, the A/Z length-delta threshold, loaded
//! from a TOML file with the search order `$JSON2OPM_CONFIG` →
//! `./json2opm.toml` → built-in defaults. The loaded value is passed
//! explicitly into the analysis; nothing reads configuration ambiently,
//! which keeps the comparison a pure function.
//!
//! Unknown keys are detected with a raw-TOML pre-pass and reported with
//! "did you mean?" suggestions. Warnings never break an existing config.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming a config file path.
pub const CONFIG_ENV_VAR: &str = "JSON2OPM_CONFIG";
/// Config file searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "json2opm.toml";
/// Default A/Z length-delta threshold in meters.
pub const DEFAULT_LENGTH_THRESHOLD_M: f64 = 0.25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// `[compare]` section.
    #[serde(default)]
    pub compare: CompareConfig,
}

/// A/Z comparison tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Maximum tolerated |length_A − length_Z| in meters. Deltas strictly
    /// above this flag the pair; a delta equal to the threshold passes.
    #[serde(default = "default_length_threshold")]
    pub length_delta_threshold_m: f64,
}

fn default_length_threshold() -> f64 {
    DEFAULT_LENGTH_THRESHOLD_M
}

impl Default for CompareConfig {
    fn default() -> Self {
        CompareConfig {
            length_delta_threshold_m: DEFAULT_LENGTH_THRESHOLD_M,
        }
    }
}

impl ConvertConfig {
    /// Load using the standard search order.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from JSON2OPM_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from JSON2OPM_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "JSON2OPM_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./json2opm.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./json2opm.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./json2opm.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No json2opm.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        for warning in validate_unknown_keys(&contents) {
            warn!(path = %path.display(), "{warning}");
        }

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks on loaded values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.compare.length_delta_threshold_m;
        if !threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "compare.length_delta_threshold_m must be finite, got {threshold}"
            )));
        }
        if threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "compare.length_delta_threshold_m must be non-negative, got {threshold}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Unknown Key Validation
// ============================================================================

/// A non-fatal config warning (typo, unknown key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

/// The complete set of valid dotted key paths.
///
/// Maintained manually to match the struct hierarchy above. Any new
/// field added to `ConvertConfig` must be added here too.
fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [compare]
        "compare",
        "compare.length_delta_threshold_m",
    ];
    keys.iter().copied().collect()
}

/// Recursively walk a `toml::Value` tree and collect all dotted key paths.
fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Levenshtein edit distance, single-row rolling implementation.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit
/// distance 3.
fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((k, dist)),
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

/// Parse a raw TOML string and return warnings for unknown config keys.
/// Unknown keys never fail the load; existing configs keep working.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            warnings.push(ValidationWarning {
                field: key.clone(),
                message: format!("Unknown config key '{key}'"),
                suggestion,
            });
        }
    }

    warnings
}
