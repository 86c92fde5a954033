//! `opentofu_required_providers`: every provider a module uses must have a
//! source and version constraint in `terraform { required_providers {} }`.
//!
//! The rule can also hold entries to an expected source and version, and
//! restrict the module to an allow list of providers.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::CONFIG_FILE;
use crate::error::{TofulintError, TofulintResult};
use crate::fix::Fixer;
use crate::issue::Severity;
use crate::model::parse_version_constraint;
use crate::rules::Rule;
use crate::runner::Runner;
use crate::syntax::{Attribute, BlockSchema, BodySchema, Range, Value};

const BUILTIN_SOURCE_PREFIX: &str = "terraform.io/builtin/";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequiredProvidersOptions {
    /// Require `source` in each entry.
    pub source: bool,
    /// Require `version` in each entry.
    pub version: bool,
    /// Only allow the providers listed in `providers`.
    pub provider_whitelist: bool,
    pub providers: BTreeMap<String, ProviderRequirement>,
}

impl Default for RequiredProvidersOptions {
    fn default() -> Self {
        Self {
            source: true,
            version: true,
            provider_whitelist: false,
            providers: BTreeMap::new(),
        }
    }
}

/// Expected `source` and `version` of one provider. Unset or empty fields are not checked.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderRequirement {
    pub source: Option<String>,
    pub version: Option<String>,
}

impl ProviderRequirement {
    fn expected_source(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }

    fn expected_version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

pub struct RequiredProvidersRule;

impl RequiredProvidersRule {
    pub const NAME: &'static str = "opentofu_required_providers";
}

/// Entries of all `required_providers` blocks in the module. A later entry replaces an earlier one.
pub fn required_provider_entries(runner: &Runner) -> TofulintResult<BTreeMap<String, Attribute>> {
    let schema = BodySchema::new().block(
        BlockSchema::new("terraform", &[]).body(
            BodySchema::new()
                .block(BlockSchema::new("required_providers", &[]).body(BodySchema::just_attributes())),
        ),
    );
    let content = runner.get_module_content(&schema)?;

    let mut entries = BTreeMap::new();
    for terraform in content.blocks_of("terraform") {
        for block in terraform.body.blocks_of("required_providers") {
            for attr in &block.body.attributes {
                entries.insert(attr.name.clone(), attr.clone());
            }
        }
    }
    Ok(entries)
}

/// Leading whitespace of the line a range starts on.
fn line_indent(source: &str, range: &Range) -> String {
    let line_start = source[..range.start.byte].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..range.start.byte]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

/// An entry written as an object constructor.
struct ObjectEntry {
    range: Range,
    indent: String,
    /// Key name, key range and value range of each argument.
    args: Vec<(Option<String>, Range, Range)>,
}

impl ObjectEntry {
    fn value_range(&self, key: &str) -> Option<&Range> {
        self.args
            .iter()
            .find(|(name, _, _)| name.as_deref() == Some(key))
            .map(|(_, _, value)| value)
    }

    /// Replace the whole object with one that sets `source` and `version`.
    /// Arguments that are not replaced keep their text.
    fn rewrite(&self, f: &mut Fixer, source: Option<&str>, version: Option<&str>) -> TofulintResult<()> {
        if source.is_none() && version.is_none() {
            return Err(TofulintError::fix("no source or version to fix"));
        }

        let mut lines = Vec::new();
        for (key, expected) in [("source", source), ("version", version)] {
            let value = match expected {
                Some(v) => Some(format!("{v:?}")),
                None => self.value_range(key).map(|r| f.text_at(r)).transpose()?,
            };
            if let Some(value) = value {
                lines.push((key.to_string(), value));
            }
        }
        for (name, key, value) in &self.args {
            if !matches!(name.as_deref(), Some("source" | "version")) {
                lines.push((f.text_at(key)?, f.text_at(value)?));
            }
        }

        let width = lines.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let indent = &self.indent;
        let mut text = String::from("{\n");
        for (key, value) in &lines {
            text.push_str(&format!("{indent}  {key:<width$} = {value}\n"));
        }
        text.push_str(&format!("{indent}}}"));
        f.replace_text(&self.range, text)
    }
}

impl RequiredProvidersRule {
    fn check_entry(
        &self,
        runner: &mut Runner,
        name: &str,
        attr: &Attribute,
        options: &RequiredProvidersOptions,
    ) -> TofulintResult<()> {
        let source = runner
            .get_file(&attr.range.filename)
            .map(|f| f.source().to_string())
            .unwrap_or_default();
        let indent = line_indent(&source, &attr.range);
        let expr_range = attr.expr.range();
        let expected = options.providers.get(name);

        let pairs = match attr.expr.object_pairs() {
            Ok(pairs) => pairs,
            Err(_) => {
                if let Value::String(constraint) = runner.evaluate_expr(&attr.expr)? {
                    self.check_legacy(runner, name, &constraint, &expr_range, &indent, expected)?;
                }
                return Ok(());
            }
        };

        let source_value = pairs
            .iter()
            .find(|p| p.key_name.as_deref() == Some("source"))
            .map(|p| runner.evaluate_expr(&p.value))
            .transpose()?;
        if let Some(Value::String(s)) = &source_value {
            if s.starts_with(BUILTIN_SOURCE_PREFIX) {
                return Ok(());
            }
        }

        if options.source && source_value.is_none() {
            let message = format!("Missing `source` for provider \"{name}\" in `required_providers`");
            let source_line = match expected.and_then(ProviderRequirement::expected_source) {
                Some(want) => format!("{want:?}"),
                None => format!("\"hashicorp/{name}\""),
            };
            match pairs.first() {
                None => {
                    let target = expr_range.clone();
                    let indent = indent.clone();
                    runner.emit_issue_with_fix(self, message, expr_range.clone(), move |f| {
                        f.replace_text(
                            &target,
                            format!("{{\n{indent}  source = {source_line}\n{indent}}}"),
                        )
                    })?;
                }
                Some(first) => {
                    // align with the key that follows
                    let key_range = first.key.range();
                    let key_indent = line_indent(&source, &key_range);
                    let width = first.key_name.as_ref().map_or(0, |k| k.len()).max("source".len());
                    runner.emit_issue_with_fix(self, message, expr_range.clone(), move |f| {
                        f.insert_text_before(
                            &key_range,
                            format!("{:<width$} = {source_line}\n{key_indent}", "source"),
                        )
                    })?;
                }
            }
        }

        let version_value = pairs
            .iter()
            .find(|p| p.key_name.as_deref() == Some("version"))
            .map(|p| runner.evaluate_expr(&p.value))
            .transpose()?;
        if options.version && version_value.is_none() {
            runner.emit_issue(
                self,
                format!("Missing version constraint for provider \"{name}\" in `required_providers`"),
                expr_range.clone(),
            )?;
        }

        let Some(expected) = expected else {
            return Ok(());
        };
        let entry = ObjectEntry {
            range: expr_range.clone(),
            indent,
            args: pairs
                .iter()
                .map(|p| (p.key_name.clone(), p.key.range(), p.value.range()))
                .collect(),
        };

        let actual_source = source_value.as_ref().and_then(Value::as_str).unwrap_or_default();
        if let Some(want) = expected.expected_source() {
            if actual_source != want {
                let message = if actual_source.is_empty() {
                    format!("Provider \"{name}\" missing required source {want:?}")
                } else {
                    format!(
                        "Provider \"{name}\" has incorrect source (expected: {want:?}, found: {actual_source:?})"
                    )
                };
                let version = expected.expected_version();
                return runner.emit_issue_with_fix(self, message, expr_range, |f| {
                    entry.rewrite(f, Some(want), version)
                });
            }
        }

        let actual_version = version_value.as_ref().and_then(Value::as_str).unwrap_or_default();
        self.check_version(runner, name, expected, actual_version, &expr_range, |f, version| {
            entry.rewrite(f, None, Some(version))
        })
    }

    /// `NAME = "constraint"`, the form from before providers had sources.
    fn check_legacy(
        &self,
        runner: &mut Runner,
        name: &str,
        constraint: &str,
        range: &Range,
        indent: &str,
        expected: Option<&ProviderRequirement>,
    ) -> TofulintResult<()> {
        let source = match expected.and_then(ProviderRequirement::expected_source) {
            Some(want) => want.to_string(),
            None => format!("hashicorp/{name}"),
        };
        let version = expected
            .and_then(ProviderRequirement::expected_version)
            .map(|v| format!("{v:?}"));
        runner.emit_issue_with_fix(
            self,
            format!("Legacy version constraint for provider \"{name}\" in `required_providers`"),
            range.clone(),
            |f| {
                let version = match version {
                    Some(v) => v,
                    None => f.text_at(range)?,
                };
                f.replace_text(
                    range,
                    format!(
                        "{{\n{indent}  source  = {source:?}\n{indent}  version = {version}\n{indent}}}"
                    ),
                )
            },
        )?;

        match expected {
            Some(expected) => self.check_version(runner, name, expected, constraint, range, |f, version| {
                f.replace_text(range, format!("{version:?}"))
            }),
            None => Ok(()),
        }
    }

    /// Compare an entry's version constraint with the expected one, ignoring
    /// order and spelling differences such as `~> 2` against `~>2.0`.
    fn check_version<F>(
        &self,
        runner: &mut Runner,
        name: &str,
        expected: &ProviderRequirement,
        actual: &str,
        range: &Range,
        fix: F,
    ) -> TofulintResult<()>
    where
        F: FnOnce(&mut Fixer, &str) -> TofulintResult<()>,
    {
        let Some(want) = expected.expected_version() else {
            return Ok(());
        };
        if actual.is_empty() {
            return Ok(());
        }
        let Some(want_constraint) = parse_version_constraint(want) else {
            return Err(TofulintError::config(
                CONFIG_FILE,
                format!("invalid version constraint {want:?} for provider \"{name}\""),
            ));
        };

        let message = match parse_version_constraint(actual) {
            None => format!("Provider \"{name}\" has invalid version constraint {actual:?}"),
            Some(found) if found != want_constraint => format!(
                "Provider \"{name}\" version constraint does not match expected (expected: {want:?}, found: {actual:?})"
            ),
            Some(_) => return Ok(()),
        };
        runner.emit_issue_with_fix(self, message, range.clone(), |f| fix(f, want))
    }
}

impl Rule for RequiredProvidersRule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, runner: &mut Runner) -> TofulintResult<()> {
        // child modules inherit their providers
        if !runner.module_path().is_root() {
            return Ok(());
        }

        let options: RequiredProvidersOptions = runner.decode_rule_config(self.name())?;

        let providers = runner.get_module_content(
            &BodySchema::new()
                .block(BlockSchema::new("provider", &["name"]).body(BodySchema::new().attribute("version"))),
        )?;
        for provider in providers.blocks_of("provider") {
            if provider.body.attribute("version").is_some() {
                runner.emit_issue(
                    self,
                    "provider version constraint should be specified via `required_providers`",
                    provider.def_range.clone(),
                )?;
            }
        }

        let refs = runner.get_provider_refs()?;
        let required = required_provider_entries(runner)?;

        for (name, provider_ref) in &refs {
            // the builtin provider needs no requirement
            if name == "terraform" {
                continue;
            }

            if options.provider_whitelist && !options.providers.contains_key(name) {
                runner.emit_issue(
                    self,
                    format!("Provider \"{name}\" is not in the allowed provider list"),
                    provider_ref.def_range.clone(),
                )?;
            }

            match required.get(name) {
                None => {
                    runner.emit_issue(
                        self,
                        format!("Missing version constraint for provider \"{name}\" in `required_providers`"),
                        provider_ref.def_range.clone(),
                    )?;
                }
                Some(attr) => self.check_entry(runner, name, attr, &options)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;
    use crate::module::{Module, ModulePath};
    use crate::runner::RuleConfigs;

    fn run_with(name: &str, src: &str, config: &str) -> (Vec<Issue>, BTreeMap<String, String>) {
        let module = Module::from_sources(ModulePath::root(), [(name, src)]).unwrap();
        let mut configs = RuleConfigs::new();
        if !config.is_empty() {
            configs.insert(RequiredProvidersRule::NAME.to_string(), toml::from_str(config).unwrap());
        }
        let mut runner = Runner::new(&module).with_fix(true).with_rule_configs(configs);
        RequiredProvidersRule.check(&mut runner).unwrap();
        let (mut issues, fixer) = runner.into_parts();
        crate::issue::sort_issues(&mut issues);
        (issues, fixer.changes().unwrap())
    }

    fn run(src: &str) -> (Vec<Issue>, BTreeMap<String, String>) {
        run_with("module.tf", src, "")
    }

    fn summary(issues: &[Issue]) -> Vec<(String, (usize, usize, usize, usize))> {
        issues
            .iter()
            .map(|i| {
                (
                    i.message.clone(),
                    (i.range.start.line, i.range.start.column, i.range.end.line, i.range.end.column),
                )
            })
            .collect()
    }

    fn missing(name: &str) -> String {
        format!("Missing version constraint for provider \"{name}\" in `required_providers`")
    }

    #[test]
    fn test_no_version() {
        let (issues, _) = run("\nprovider \"template\" {}\n");
        assert_eq!(summary(&issues), vec![(missing("template"), (2, 1, 2, 20))]);
    }

    #[test]
    fn test_implicit_providers() {
        let (issues, _) = run("\nresource \"random_string\" \"foo\" {\n  length = 16\n}\n");
        assert_eq!(summary(&issues), vec![(missing("random"), (2, 1, 2, 31))]);

        let (issues, _) = run("\nephemeral \"random_string\" \"foo\" {\n  length = 16\n}\n");
        assert_eq!(summary(&issues), vec![(missing("random"), (2, 1, 2, 32))]);

        let (issues, _) = run("\ndata \"template_file\" \"foo\" {\n  template = \"\"\n}\n");
        assert_eq!(summary(&issues), vec![(missing("template"), (2, 1, 2, 27))]);
    }

    #[test]
    fn test_complete_object() {
        let (issues, _) = run(
            r#"
terraform {
  required_providers {
    template = {
      source  = "hashicorp/template"
      version = "~> 2"
    }
  }
}
provider "template" {}
"#,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_legacy_string() {
        let (issues, changes) = run(
            r#"
terraform {
  required_providers {
    template = "~> 2"
  }
}
provider "template" {}
"#,
        );
        assert_eq!(
            summary(&issues),
            vec![(
                "Legacy version constraint for provider \"template\" in `required_providers`".to_string(),
                (4, 16, 4, 22)
            )]
        );
        assert_eq!(
            changes["module.tf"],
            r#"
terraform {
  required_providers {
    template = {
      source  = "hashicorp/template"
      version = "~> 2"
    }
  }
}
provider "template" {}
"#
        );
    }

    #[test]
    fn test_missing_version_in_object() {
        let src = r#"
terraform {
  required_providers {
    template = {
      source = "hashicorp/template"
    }
  }
}

provider "template" {}
"#;
        let (issues, _) = run(src);
        assert_eq!(summary(&issues), vec![(missing("template"), (4, 16, 6, 6))]);

        let (issues, _) = run_with("module.tf", src, "enabled = true\nversion = false");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_missing_source_in_object() {
        let src = r#"
terraform {
  required_providers {
    template = {
      version = "~> 2"
    }
  }
}

provider "template" {}
"#;
        let (issues, changes) = run(src);
        assert_eq!(
            summary(&issues),
            vec![(
                "Missing `source` for provider \"template\" in `required_providers`".to_string(),
                (4, 16, 6, 6)
            )]
        );
        assert_eq!(
            changes["module.tf"],
            r#"
terraform {
  required_providers {
    template = {
      source  = "hashicorp/template"
      version = "~> 2"
    }
  }
}

provider "template" {}
"#
        );

        let (issues, _) = run_with("module.tf", src, "source = false");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_empty_object() {
        let (issues, changes) = run(
            r#"
terraform {
  required_providers {
    template = {}
  }
}

provider "template" {}
"#,
        );
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Missing `source` for provider \"template\" in `required_providers`",
                "Missing version constraint for provider \"template\" in `required_providers`",
            ]
        );
        assert!(issues.iter().all(|i| (i.range.start.column, i.range.end.column) == (16, 18)));
        assert_eq!(
            changes["module.tf"],
            r#"
terraform {
  required_providers {
    template = {
      source = "hashicorp/template"
    }
  }
}

provider "template" {}
"#
        );
    }

    #[test]
    fn test_provider_version_attribute() {
        let (issues, _) = run(
            r#"
terraform {
  required_providers {
    template = {
      source = "hashicorp/template"
      version = "~> 2"
    }
  }
}

provider "template" {
  alias   = "foo"
  version = "~> 2"
}
"#,
        );
        assert_eq!(
            summary(&issues),
            vec![(
                "provider version constraint should be specified via `required_providers`".to_string(),
                (11, 1, 11, 20)
            )]
        );
    }

    #[test]
    fn test_configuration_aliases() {
        let (issues, _) = run(
            r#"
terraform {
  required_providers {
    template = {
      source = "hashicorp/template"
      version = "~> 2"
      configuration_aliases = [template.alias]
    }
  }
}

data "template_file" "foo" {
  provider = template.alias
}
"#,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_terraform_and_builtin_providers() {
        let (issues, _) = run("\ndata \"terraform_remote_state\" \"foo\" {}\n");
        assert!(issues.is_empty());

        let (issues, _) = run(
            r#"
terraform {
  required_providers {
    test = {
      source = "terraform.io/builtin/test"
    }
  }
}
resource "test_assertions" "foo" {}
"#,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_resource_provider_ref() {
        for provider in ["google-beta", "\"google-beta\""] {
            let src = format!(
                "\nterraform {{\n  required_providers {{\n    google = {{\n      version = \"~> 4.27.0\"\n    }}\n  }}\n}}\n\nresource \"google_compute_instance\" \"foo\" {{\n  provider = {provider}\n}}"
            );
            let (issues, _) = run(&src);
            assert_eq!(summary(&issues), vec![(missing("google-beta"), (10, 1, 10, 41))]);
        }
    }

    #[test]
    fn test_json_legacy_is_not_fixed() {
        let (issues, changes) = run_with(
            "module.tf.json",
            "\n{\n  \"terraform\": {\n    \"required_providers\": {\n      \"template\": \"~> 2\"\n\t}\n  },\n  \"provider\": {\n    \"template\": {}\n  }\n}",
            "",
        );
        assert_eq!(
            summary(&issues),
            vec![(
                "Legacy version constraint for provider \"template\" in `required_providers`".to_string(),
                (5, 19, 5, 25)
            )]
        );
        assert!(!issues[0].fixed);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_provider_function() {
        let (issues, _) = run(
            "\noutput \"foo\" {\n\tvalue = provider::time::rfc3339_parse(\"2023-07-25T23:43:16Z\")\n}",
        );
        assert_eq!(summary(&issues), vec![(missing("time"), (3, 10, 3, 63))]);
    }

    #[test]
    fn test_multiple_required_providers_blocks() {
        let (issues, changes) = run(
            r#"
terraform {
  required_providers {
    template = "~> 2"
  }

  required_providers {
    aws = "~> 5.0"
  }
}

provider "template" {}
provider "aws" {}
provider "google" {}

terraform {
  required_providers {
    google = "~> 6.0"
  }
}
"#,
        );
        let spans: Vec<_> = summary(&issues).into_iter().map(|(_, s)| s).collect();
        assert_eq!(spans, vec![(4, 16, 4, 22), (8, 11, 8, 19), (18, 14, 18, 22)]);
        assert_eq!(
            changes["module.tf"],
            r#"
terraform {
  required_providers {
    template = {
      source  = "hashicorp/template"
      version = "~> 2"
    }
  }

  required_providers {
    aws = {
      source  = "hashicorp/aws"
      version = "~> 5.0"
    }
  }
}

provider "template" {}
provider "aws" {}
provider "google" {}

terraform {
  required_providers {
    google = {
      source  = "hashicorp/google"
      version = "~> 6.0"
    }
  }
}
"#
        );
    }

    #[test]
    fn test_provider_whitelist() {
        let src = "terraform {\n  required_providers {\n    aws = {\n      source  = \"hashicorp/aws\"\n      version = \"~> 5\"\n    }\n  }\n}\nprovider \"aws\" {}\n";

        let (issues, _) = run_with("module.tf", src, "provider_whitelist = true\n[providers.google]\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Provider \"aws\" is not in the allowed provider list");

        let (issues, _) = run_with("module.tf", src, "provider_whitelist = true\n[providers.aws]\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_child_module_is_skipped() {
        let module = Module::from_sources(
            ModulePath::root().child("child"),
            [("main.tf", "resource \"aws_instance\" \"x\" {}\n")],
        )
        .unwrap();
        let mut runner = Runner::new(&module);
        RequiredProvidersRule.check(&mut runner).unwrap();
        assert!(runner.into_parts().0.is_empty());
    }

    const VERSION_ONLY: &str = r#"
terraform {
  required_providers {
    template = {
      version = "~> 2"
    }
  }
}

provider "template" {}
"#;

    const WITH_EXAMPLE_SOURCE: &str = r#"
terraform {
  required_providers {
    template = {
      source  = "example/template"
      version = "~> 2"
    }
  }
}

provider "template" {}
"#;

    #[test]
    fn test_missing_required_source() {
        let (issues, changes) = run_with(
            "module.tf",
            VERSION_ONLY,
            "source = false\n[providers.template]\nsource = \"example/template\"\n",
        );
        assert_eq!(
            summary(&issues),
            vec![(
                "Provider \"template\" missing required source \"example/template\"".to_string(),
                (4, 16, 6, 6)
            )]
        );
        assert!(issues[0].fixed);
        assert_eq!(changes["module.tf"], WITH_EXAMPLE_SOURCE);
    }

    #[test]
    fn test_missing_source_uses_required_source() {
        let (issues, changes) = run_with(
            "module.tf",
            VERSION_ONLY,
            "[providers.template]\nsource = \"example/template\"\n",
        );
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Missing `source` for provider \"template\" in `required_providers`",
                "Provider \"template\" missing required source \"example/template\"",
            ]
        );
        // both fixes edit the same entry, so only the first one applies
        assert!(issues[0].fixed);
        assert!(!issues[1].fixed);
        assert_eq!(changes["module.tf"], WITH_EXAMPLE_SOURCE);
    }

    #[test]
    fn test_incorrect_source() {
        let src = WITH_EXAMPLE_SOURCE.replace("example/template", "hashicorp/template");
        let (issues, changes) = run_with(
            "module.tf",
            &src,
            "[providers.template]\nsource = \"example/template\"\nversion = \"~> 3\"\n",
        );
        // the version is not compared while the source is wrong
        assert_eq!(
            summary(&issues),
            vec![(
                "Provider \"template\" has incorrect source (expected: \"example/template\", found: \"hashicorp/template\")".to_string(),
                (4, 16, 7, 6)
            )]
        );
        assert_eq!(
            changes["module.tf"],
            WITH_EXAMPLE_SOURCE.replace("\"~> 2\"", "\"~> 3\"")
        );
    }

    #[test]
    fn test_invalid_version_constraint() {
        let src = WITH_EXAMPLE_SOURCE.replace("\"~> 2\"", "\"latest\"");
        let (issues, changes) = run_with("module.tf", &src, "[providers.template]\nversion = \"~> 2\"\n");
        assert_eq!(
            summary(&issues),
            vec![(
                "Provider \"template\" has invalid version constraint \"latest\"".to_string(),
                (4, 16, 7, 6)
            )]
        );
        assert_eq!(changes["module.tf"], WITH_EXAMPLE_SOURCE);
    }

    const ALIASED: &str = r#"
terraform {
  required_providers {
    template = {
      source                = "hashicorp/template"
      version               = "~> 2.0"
      configuration_aliases = [template.alias]
    }
  }
}

provider "template" {}
"#;

    #[test]
    fn test_version_constraint_mismatch() {
        let (issues, changes) = run_with("module.tf", ALIASED, "[providers.template]\nversion = \"~> 3\"\n");
        assert_eq!(
            summary(&issues),
            vec![(
                "Provider \"template\" version constraint does not match expected (expected: \"~> 3\", found: \"~> 2.0\")".to_string(),
                (4, 16, 8, 6)
            )]
        );
        assert_eq!(changes["module.tf"], ALIASED.replace("\"~> 2.0\"", "\"~> 3\""));
    }

    #[test]
    fn test_version_constraint_compared_structurally() {
        let (issues, _) = run_with("module.tf", ALIASED, "[providers.template]\nversion = \"~>2.0.0\"\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_legacy_string_with_expected_version() {
        let (issues, changes) = run_with(
            "module.tf",
            "terraform {\n  required_providers {\n    template = \"~> 2\"\n  }\n}\nprovider \"template\" {}\n",
            "[providers.template]\nversion = \"~> 3\"\n",
        );
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Legacy version constraint for provider \"template\" in `required_providers`",
                "Provider \"template\" version constraint does not match expected (expected: \"~> 3\", found: \"~> 2\")",
            ]
        );
        assert!(issues[0].fixed);
        assert!(!issues[1].fixed);
        assert_eq!(
            changes["module.tf"],
            "terraform {\n  required_providers {\n    template = {\n      source  = \"hashicorp/template\"\n      version = \"~> 3\"\n    }\n  }\n}\nprovider \"template\" {}\n"
        );
    }

    #[test]
    fn test_json_version_mismatch_is_not_fixed() {
        let (issues, changes) = run_with(
            "module.tf.json",
            r#"{
  "terraform": {
    "required_providers": {
      "template": {"source": "hashicorp/template", "version": "~> 2"}
    }
  },
  "provider": {"template": {}}
}"#,
            "[providers.template]\nversion = \"~> 3\"\n",
        );
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("Provider \"template\" version constraint does not match"));
        assert!(!issues[0].fixed);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_invalid_expected_constraint_is_an_error() {
        let module = Module::from_sources(ModulePath::root(), [("module.tf", ALIASED)]).unwrap();
        let mut configs = RuleConfigs::new();
        configs.insert(
            RequiredProvidersRule::NAME.to_string(),
            toml::from_str("[providers.template]\nversion = \"latest\"\n").unwrap(),
        );
        let mut runner = Runner::new(&module).with_rule_configs(configs);
        assert!(RequiredProvidersRule.check(&mut runner).is_err());
    }
}
