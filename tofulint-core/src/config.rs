//! Configuration loading from tofulint.toml.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{fs, path::Path};

use crate::runner::RuleConfigs;

pub const CONFIG_FILE: &str = "tofulint.toml";

/// Main configuration structure for tofulint.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TofulintConfig {
    /// Rule preset: "all" or "recommended".
    pub preset: Option<String>,
    /// File name patterns to skip.
    pub ignore: Option<Vec<String>>,
    /// Which module calls to follow: "none" or "local".
    pub call_module_type: Option<CallModuleType>,
    /// Per-rule tables; `enabled` toggles the rule, other keys are rule options.
    #[serde(default)]
    pub rules: BTreeMap<String, toml::Table>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallModuleType {
    #[default]
    None,
    Local,
}

impl std::str::FromStr for CallModuleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "local" => Ok(Self::Local),
            other => bail!("unknown module call type '{other}' (expected none or local)"),
        }
    }
}

impl TofulintConfig {
    /// The `enabled` key of a rule's table, if set.
    pub fn rule_enabled(&self, rule: &str) -> Option<bool> {
        self.rules
            .get(rule)
            .and_then(|t| t.get("enabled"))
            .and_then(toml::Value::as_bool)
    }

    pub fn rule_configs(&self) -> RuleConfigs {
        self.rules.clone()
    }
}

/// Loads configuration from tofulint.toml if it exists.
pub fn load_config(root: &Path) -> Result<Option<TofulintConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg = toml::from_str(&content).context("Invalid tofulint.toml")?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let cfg: TofulintConfig = toml::from_str(
            r#"
preset = "all"
ignore = ["_override.tf"]
call_module_type = "local"

[rules.opentofu_required_providers]
enabled = true
version = false

[rules.opentofu_unused_required_providers]
enabled = false

[output]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(cfg.preset.as_deref(), Some("all"));
        assert_eq!(cfg.call_module_type, Some(CallModuleType::Local));
        assert_eq!(cfg.rule_enabled("opentofu_required_providers"), Some(true));
        assert_eq!(cfg.rule_enabled("opentofu_unused_required_providers"), Some(false));
        assert_eq!(cfg.rule_enabled("other"), None);
        assert_eq!(cfg.output.unwrap().format.as_deref(), Some("json"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(toml::from_str::<TofulintConfig>("colour = true").is_err());
    }

    #[test]
    fn test_call_module_type_from_str() {
        assert_eq!("local".parse::<CallModuleType>().unwrap(), CallModuleType::Local);
        assert!("all".parse::<CallModuleType>().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let dir = std::env::temp_dir().join(format!("tofulint_config_missing_{}", std::process::id()));
        assert!(load_config(&dir).unwrap().is_none());
    }
}
