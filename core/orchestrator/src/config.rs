use std::env;
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),
}

/// The §6 configuration surface, deserialized from a TOML file with
/// `{{VAR}}`/`${VAR}` environment interpolation, mirroring the teacher's
/// `config_service::load_single_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub emergency_patterns_path: PathBuf,
    pub handler_rules_path: PathBuf,
    pub disclaimers_path: PathBuf,
    pub prohibited_phrases_path: PathBuf,
    pub audit_store_dsn: String,
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,
    #[serde(default = "default_fallback_handler_name")]
    pub fallback_handler_name: String,
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_fallback_handler_name() -> String {
    "communication".to_string()
}

/// Loads a single TOML config file, substituting `{{VAR}}`/`${VAR}`
/// occurrences from the process environment before parsing.
pub fn load_config(path: &std::path::Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let interpolated = interpolate_env(&content);
    let config: OrchestratorConfig = toml::from_str(&interpolated)?;
    Ok(config)
}

fn interpolate_env(content: &str) -> String {
    let re = Regex::new(r"(\{\{|\$\{)([a-zA-Z0-9_]+)(\}\}|\})").expect("static regex is valid");
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[2];
        env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn load_config_substitutes_brace_syntax() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            emergency_patterns_path = "data/emergency.toml"
            handler_rules_path = "data/handlers.toml"
            disclaimers_path = "data/disclaimers.toml"
            prohibited_phrases_path = "data/prohibited.toml"
            audit_store_dsn = "{{{{AUDIT_DB_PATH}}}}"
            "#
        )
        .expect("write config");

        env::set_var("AUDIT_DB_PATH", "/tmp/audit.sqlite");
        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.audit_store_dsn, "/tmp/audit.sqlite");
        assert_eq!(config.default_deadline_ms, 30_000);
        assert_eq!(config.fallback_handler_name, "communication");
    }

    #[test]
    fn load_config_substitutes_dollar_syntax() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            emergency_patterns_path = "data/emergency.toml"
            handler_rules_path = "data/handlers.toml"
            disclaimers_path = "data/disclaimers.toml"
            prohibited_phrases_path = "data/prohibited.toml"
            audit_store_dsn = "${{AUDIT_DB_PATH_2}}"
            default_deadline_ms = 5000
            "#
        )
        .expect("write config");

        env::set_var("AUDIT_DB_PATH_2", "/tmp/other.sqlite");
        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.audit_store_dsn, "/tmp/other.sqlite");
        assert_eq!(config.default_deadline_ms, 5000);
    }
}
