//! Resolver configuration
//!
//! Every tunable used by the extraction tiers lives here instead of being
//! hard-coded. A JSON file may override any subset of fields; missing
//! fields keep their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domain::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Token that opens an embedded mapping blob
    pub blob_start_token: String,
    /// Token that closes an embedded mapping blob
    pub blob_end_token: String,
    /// Header line introducing the blob in the disassembler's output
    pub debug_section_header: String,
    /// Disassembler command, e.g. `["javap", "-v"]`; the artifact path is appended.
    /// Empty disables the tool tier.
    pub tool_command: Vec<String>,
    pub tool_timeout_ms: u64,
    pub max_tool_output_bytes: usize,
    /// Widest template-line gap that comment annotations are densified across
    pub densify_max_gap: u32,
    /// Token marking the generated method that hosts the template body
    pub structural_anchor: String,
    /// Generated lines per template line inside the anchor method
    pub structural_divisor: u32,
    /// Leading boilerplate assumed when no anchor is found
    pub boilerplate_lines: u32,
    /// Upper bound on the boilerplate as a fraction of the generated source
    pub boilerplate_fraction: f64,
    /// Extension of the generated source next to the compiled artifact
    pub generated_source_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            blob_start_token: "SMAP".to_string(),
            blob_end_token: "*E".to_string(),
            debug_section_header: "SourceDebugExtension:".to_string(),
            tool_command: Vec::new(),
            tool_timeout_ms: 10_000,
            max_tool_output_bytes: 10 * 1024 * 1024,
            densify_max_gap: 20,
            structural_anchor: "_jspService".to_string(),
            structural_divisor: 3,
            boilerplate_lines: 50,
            boilerplate_fraction: 0.2,
            generated_source_extension: "java".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load a JSON config file and validate it
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`ResolverConfig::validate`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that would make a tier misbehave
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blob_start_token.is_empty() || self.blob_end_token.is_empty() {
            return Err(ConfigError::Invalid("blob tokens must not be empty".to_string()));
        }
        if self.structural_divisor == 0 {
            return Err(ConfigError::Invalid("structural_divisor must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.boilerplate_fraction) {
            return Err(ConfigError::Invalid(format!(
                "boilerplate_fraction must be within [0, 1], got {}",
                self.boilerplate_fraction
            )));
        }
        if self.max_tool_output_bytes == 0 {
            return Err(ConfigError::Invalid("max_tool_output_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Replace the tool command with a shell-style string (`"javap -v"`)
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the string has unbalanced quotes
    /// or contains no program
    pub fn set_tool_command(&mut self, command: &str) -> Result<(), ConfigError> {
        let parts = shlex::split(command)
            .ok_or_else(|| ConfigError::Invalid(format!("cannot parse tool command {command:?}")))?;
        if parts.is_empty() {
            return Err(ConfigError::Invalid("tool command is empty".to_string()));
        }
        self.tool_command = parts;
        Ok(())
    }

    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.densify_max_gap, 20);
        assert_eq!(config.structural_divisor, 3);
        assert_eq!(config.tool_timeout(), Duration::from_secs(10));
        assert!(config.tool_command.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"densify_max_gap": 5, "tool_command": ["/opt/jdk/bin/javap", "-v"]}}"#)
            .unwrap();

        let config = ResolverConfig::load(file.path()).unwrap();
        assert_eq!(config.densify_max_gap, 5);
        assert_eq!(config.tool_command, vec!["/opt/jdk/bin/javap", "-v"]);
        assert_eq!(config.blob_start_token, "SMAP");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ResolverConfig { structural_divisor: 0, ..ResolverConfig::default() };
        assert!(config.validate().is_err());

        let config = ResolverConfig { boilerplate_fraction: 1.5, ..ResolverConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("boilerplate_fraction"));

        let config = ResolverConfig { blob_end_token: String::new(), ..ResolverConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(ResolverConfig::load(file.path()), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_set_tool_command_splits_quotes() {
        let mut config = ResolverConfig::default();
        config.set_tool_command(r#""/opt/my jdk/bin/javap" -v"#).unwrap();
        assert_eq!(config.tool_command, vec!["/opt/my jdk/bin/javap", "-v"]);

        assert!(config.set_tool_command("").is_err());
        assert!(config.set_tool_command("\"unterminated").is_err());
    }
}
