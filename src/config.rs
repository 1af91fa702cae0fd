//! Registry configuration.
//!
//! Settings are read from `<root>/registry.json` when present, with environment
//! overrides for the common knobs:
//! - `ENTITY_REGISTRY_ROOT`     root folder of the table tree (default `dbs`)
//! - `ENTITY_REGISTRY_DATABASE` database segment of qualified table paths
//! - `ENTITY_REGISTRY_SCHEMA`   schema segment of qualified table paths
//! - `ENTITY_REGISTRY_CLEANUP`  `true`/`false`, drop tables of failed registrations

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CHAR_LENGTH;
use crate::ident::{DEFAULT_DB, DEFAULT_SCHEMA, FIELDS_TABLE_SUFFIX};

pub const CONFIG_FILE: &str = "registry.json";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RegistryConfig {
    /// Root folder of the on-disk table tree. Not persisted in `registry.json`.
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default = "RegistryConfig::default_database")]
    pub database: String,
    #[serde(default = "RegistryConfig::default_schema")]
    pub schema: String,
    /// Table holding the registry rows themselves.
    #[serde(default = "RegistryConfig::default_registry_table")]
    pub registry_table: String,
    /// Appended to the type name before snake-casing the field metadata table name.
    #[serde(default = "RegistryConfig::default_fields_suffix")]
    pub fields_table_suffix: String,
    #[serde(default = "RegistryConfig::default_char_length")]
    pub default_char_length: u32,
    /// Drop tables created by a registration that fails part way through.
    #[serde(default = "RegistryConfig::default_cleanup")]
    pub cleanup_on_failure: bool,
}

impl RegistryConfig {
    fn default_database() -> String { DEFAULT_DB.to_string() }
    fn default_schema() -> String { DEFAULT_SCHEMA.to_string() }
    fn default_registry_table() -> String { "entity_types".to_string() }
    fn default_fields_suffix() -> String { FIELDS_TABLE_SUFFIX.to_string() }
    fn default_char_length() -> u32 { DEFAULT_CHAR_LENGTH }
    fn default_cleanup() -> bool { true }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), ..Self::default() }
    }

    /// Read `<root>/registry.json` if it exists, otherwise defaults.
    pub fn load_or_default<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let path = root.join(CONFIG_FILE);
        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str::<RegistryConfig>(&text).with_context(|| format!("parse {}", path.display()))?
        } else {
            Self::default()
        };
        if cfg.default_char_length == 0 {
            anyhow::bail!("{}: default_char_length must be positive", path.display());
        }
        cfg.root = root;
        Ok(cfg)
    }

    /// Resolve the root from `ENTITY_REGISTRY_ROOT`, load its config file, then
    /// apply the remaining environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let root = std::env::var("ENTITY_REGISTRY_ROOT").unwrap_or_else(|_| "dbs".to_string());
        let mut cfg = Self::load_or_default(root)?;
        if let Ok(db) = std::env::var("ENTITY_REGISTRY_DATABASE") { cfg.database = db; }
        if let Ok(schema) = std::env::var("ENTITY_REGISTRY_SCHEMA") { cfg.schema = schema; }
        if let Ok(v) = std::env::var("ENTITY_REGISTRY_CLEANUP") {
            cfg.cleanup_on_failure = parse_bool(&v).with_context(|| format!("ENTITY_REGISTRY_CLEANUP='{}'", v))?;
        }
        Ok(cfg)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.root).with_context(|| format!("create {}", self.root.display()))?;
        let path = self.root.join(CONFIG_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(self)?).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dbs"),
            database: Self::default_database(),
            schema: Self::default_schema(),
            registry_table: Self::default_registry_table(),
            fields_table_suffix: Self::default_fields_suffix(),
            default_char_length: Self::default_char_length(),
            cleanup_on_failure: Self::default_cleanup(),
        }
    }
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RegistryConfig::default();
        assert_eq!(cfg.database, "entities");
        assert_eq!(cfg.schema, "public");
        assert_eq!(cfg.fields_table_suffix, "Fields");
        assert_eq!(cfg.default_char_length, 16);
        assert!(cfg.cleanup_on_failure);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), r#"{"schema":"crm","cleanup_on_failure":false}"#).unwrap();
        let cfg = RegistryConfig::load_or_default(tmp.path()).unwrap();
        assert_eq!(cfg.root, tmp.path());
        assert_eq!(cfg.schema, "crm");
        assert_eq!(cfg.database, "entities");
        assert!(!cfg.cleanup_on_failure);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = RegistryConfig::with_root(tmp.path());
        cfg.default_char_length = 32;
        cfg.save().unwrap();
        assert_eq!(RegistryConfig::load_or_default(tmp.path()).unwrap(), cfg);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(RegistryConfig::load_or_default(tmp.path()).is_err());
    }

    #[test]
    fn zero_char_length_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), r#"{"default_char_length":0}"#).unwrap();
        let err = RegistryConfig::load_or_default(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("default_char_length"));
    }

    // The only test touching these variables, so parallel tests cannot race on them.
    #[test]
    fn env_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), r#"{"database":"crm"}"#).unwrap();
        std::env::set_var("ENTITY_REGISTRY_ROOT", tmp.path());
        std::env::set_var("ENTITY_REGISTRY_SCHEMA", "sales");
        std::env::set_var("ENTITY_REGISTRY_CLEANUP", "off");
        let cfg = RegistryConfig::from_env().unwrap();
        assert_eq!(cfg.root, tmp.path());
        assert_eq!(cfg.database, "crm");
        assert_eq!(cfg.schema, "sales");
        assert!(!cfg.cleanup_on_failure);

        std::env::set_var("ENTITY_REGISTRY_CLEANUP", "sometimes");
        let err = RegistryConfig::from_env().unwrap_err();
        assert!(format!("{:#}", err).contains("ENTITY_REGISTRY_CLEANUP='sometimes'"));

        for var in ["ENTITY_REGISTRY_ROOT", "ENTITY_REGISTRY_SCHEMA", "ENTITY_REGISTRY_CLEANUP"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("YES").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
