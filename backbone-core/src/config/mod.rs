//! Configuration types for the backbone build and matching

use crate::BackboneError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizerConfig {
    /// Delimiter splitting multi-valued (pro parte) accepted ids
    #[serde(default = "default_multi_value_delimiter")]
    pub multi_value_delimiter: String,
    /// Insert implicit genus or species parents for binomials and trinomials
    #[serde(default = "default_create_implicit_names")]
    pub create_implicit_names: bool,
    /// Create missing autonyms for species with infraspecific children
    #[serde(default = "default_create_autonyms")]
    pub create_autonyms: bool,
    /// Supersede implicit and placeholder nodes that end up empty
    #[serde(default = "default_clean_implicit_names")]
    pub clean_implicit_names: bool,
    /// Merge records into matching nodes of earlier sources
    #[serde(default = "default_source_priority_merge")]
    pub source_priority_merge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchingConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: i32,
    #[serde(default = "default_min_confidence_higher")]
    pub min_confidence_higher: i32,
    /// Confidence distance within which differently classified candidates are ambiguous
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: i32,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
    /// Record scoring notes on every candidate
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_include_alternatives")]
    pub include_alternatives: bool,
}

// Default value functions
fn default_multi_value_delimiter() -> String { "|".to_string() }
fn default_create_implicit_names() -> bool { true }
fn default_create_autonyms() -> bool { true }
fn default_clean_implicit_names() -> bool { true }
fn default_source_priority_merge() -> bool { true }
fn default_min_confidence() -> i32 { 80 }
fn default_min_confidence_higher() -> i32 { 90 }
fn default_ambiguity_margin() -> i32 { 1 }
fn default_max_matches() -> usize { 50 }
fn default_min_name_length() -> usize { 2 }
fn default_min_chunk_size() -> usize { 50 }
fn default_chunk_size() -> usize { 500 }
fn default_format() -> String { "text".to_string() }
fn default_include_alternatives() -> bool { true }

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            multi_value_delimiter: default_multi_value_delimiter(),
            create_implicit_names: default_create_implicit_names(),
            create_autonyms: default_create_autonyms(),
            clean_implicit_names: default_clean_implicit_names(),
            source_priority_merge: default_source_priority_merge(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            min_confidence_higher: default_min_confidence_higher(),
            ambiguity_margin: default_ambiguity_margin(),
            max_matches: default_max_matches(),
            min_name_length: default_min_name_length(),
            verbose: false,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: default_min_chunk_size(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            include_alternatives: default_include_alternatives(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), BackboneError> {
        if self.chunk_size == 0 {
            return Err(BackboneError::Configuration(
                "chunk size needs to be at least 1".to_string(),
            ));
        }
        if self.min_chunk_size >= self.chunk_size {
            return Err(BackboneError::Configuration(format!(
                "minimum chunk size {} needs to be smaller than the chunk size {}",
                self.min_chunk_size, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Reject settings no run can work with.
    pub fn validate(&self) -> Result<(), BackboneError> {
        self.chunking.validate()?;
        if self.normalizer.multi_value_delimiter.is_empty() {
            return Err(BackboneError::Configuration(
                "multi value delimiter must not be empty".to_string(),
            ));
        }
        if !(0..=100).contains(&self.matching.min_confidence)
            || !(0..=100).contains(&self.matching.min_confidence_higher)
        {
            return Err(BackboneError::Configuration(
                "confidence thresholds must be within 0..=100".to_string(),
            ));
        }
        if self.matching.ambiguity_margin < 0 {
            return Err(BackboneError::Configuration(
                "ambiguity margin must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, BackboneError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| BackboneError::Configuration(format!("Failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), BackboneError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| BackboneError::Configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.normalizer.multi_value_delimiter, "|");
        assert!(config.normalizer.create_implicit_names);
        assert!(config.normalizer.create_autonyms);

        assert_eq!(config.matching.min_confidence, 80);
        assert_eq!(config.matching.min_confidence_higher, 90);
        assert_eq!(config.matching.ambiguity_margin, 1);
        assert_eq!(config.matching.max_matches, 50);

        assert_eq!(config.chunking.min_chunk_size, 50);
        assert_eq!(config.chunking.chunk_size, 500);

        assert_eq!(config.output.format, "text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = Config::default();
        config.matching.min_confidence = 70;
        config.chunking.chunk_size = 1000;
        config.normalizer.create_autonyms = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(temp_file.path(), &config).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[chunking]").unwrap();
        writeln!(temp_file, "min_chunk_size = 5").unwrap();
        writeln!(temp_file, "chunk_size = 10").unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.chunking.min_chunk_size, 5);
        assert_eq!(config.chunking.chunk_size, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.matching.min_confidence, 80);
        assert_eq!(config.normalizer.multi_value_delimiter, "|");
    }

    #[test]
    fn test_invalid_chunk_sizes_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[chunking]").unwrap();
        writeln!(temp_file, "min_chunk_size = 500").unwrap();
        writeln!(temp_file, "chunk_size = 500").unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(matches!(err, BackboneError::Configuration(_)));

        let zero = ChunkingConfig { min_chunk_size: 0, chunk_size: 0 };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[matching").unwrap();
        temp_file.flush().unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/backbone.toml").unwrap_err();
        assert!(matches!(err, BackboneError::Io(_)));
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = Config::default();
        config.matching.min_confidence = 120;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.normalizer.multi_value_delimiter = String::new();
        assert!(config.validate().is_err());
    }
}
