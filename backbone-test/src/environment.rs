//! Test environment management
//!
//! Provides isolated test directories with automatic cleanup using RAII.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Configuration for test environment
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Keep the directory after the test (for debugging)
    pub preserve: bool,
    /// Export `BACKBONE_LOG=debug` while the environment lives
    pub verbose: bool,
    /// Custom prefix for test directories
    pub prefix: Option<String>,
}

/// Isolated test environment with automatic cleanup
pub struct TestEnvironment {
    temp_dir: Option<TempDir>,
    root_path: PathBuf,
    /// Saved environment variables for restoration
    saved_env: HashMap<String, Option<String>>,
    config: TestConfig,
}

impl TestEnvironment {
    /// Create a new test environment with default config
    pub fn new() -> Result<Self> {
        Self::with_config(TestConfig::default())
    }

    /// Create a new test environment with custom config
    pub fn with_config(config: TestConfig) -> Result<Self> {
        let prefix = config.prefix.as_deref().unwrap_or("backbone-test");
        let temp_dir = TempDir::with_prefix(prefix).context("Failed to create temporary directory")?;
        let root_path = temp_dir.path().to_path_buf();

        for dir in ["sources", "fixtures", "output"] {
            std::fs::create_dir_all(root_path.join(dir))
                .with_context(|| format!("Failed to create {} directory", dir))?;
        }

        let mut env = Self {
            temp_dir: Some(temp_dir),
            root_path,
            saved_env: HashMap::new(),
            config,
        };
        if env.config.verbose {
            env.set_var("BACKBONE_LOG", "debug");
        }
        Ok(env)
    }

    fn set_var(&mut self, key: &str, value: &str) {
        self.saved_env
            .entry(key.to_string())
            .or_insert_with(|| std::env::var(key).ok());
        std::env::set_var(key, value);
    }

    /// Get the root path of the test environment
    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Directory for source checklists
    pub fn sources_dir(&self) -> PathBuf {
        self.root_path.join("sources")
    }

    /// Directory for assertion fixtures
    pub fn fixtures_dir(&self) -> PathBuf {
        self.root_path.join("fixtures")
    }

    /// Directory for reports and snapshots
    pub fn output_dir(&self) -> PathBuf {
        self.root_path.join("output")
    }

    /// Write a file relative to the root, creating parent directories
    pub fn write_file(&self, path: impl AsRef<Path>, content: &[u8]) -> Result<PathBuf> {
        let full_path = self.root_path.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, content)
            .with_context(|| format!("Failed to write {}", full_path.display()))?;
        Ok(full_path)
    }

    /// Read a file relative to the root
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let full_path = self.root_path.join(path);
        std::fs::read_to_string(&full_path).with_context(|| format!("Failed to read {}", full_path.display()))
    }

    /// Keep the directory on drop and return its path
    pub fn preserve(&mut self) -> PathBuf {
        match self.temp_dir.take() {
            Some(temp_dir) => temp_dir.keep(),
            None => self.root_path.clone(),
        }
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        for (key, value) in &self.saved_env {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        if self.config.preserve {
            if let Some(temp_dir) = self.temp_dir.take() {
                let path = temp_dir.keep();
                eprintln!("Test environment preserved at: {}", path.display());
            }
        }
        // Otherwise temp_dir is cleaned up when dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creation() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.root().exists());
        assert!(env.sources_dir().exists());
        assert!(env.fixtures_dir().exists());
        assert!(env.output_dir().exists());
    }

    #[test]
    fn test_environment_isolation() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.root(), env2.root());

        env1.write_file("sources/a.tsv", b"taxonID\n").unwrap();
        assert_eq!(env1.read_file("sources/a.tsv").unwrap(), "taxonID\n");
        assert!(!env2.sources_dir().join("a.tsv").exists());
    }

    #[test]
    fn test_environment_cleanup() {
        let path = {
            let env = TestEnvironment::new().unwrap();
            env.root().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_preserve_keeps_directory() {
        let path = {
            let mut env = TestEnvironment::new().unwrap();
            env.preserve()
        };
        assert!(path.exists());
        std::fs::remove_dir_all(path).unwrap();
    }
}
