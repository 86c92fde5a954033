//! The host side of a rule check: module access, evaluation and the issue sink.

use crate::error::{TofulintError, TofulintResult};
use crate::fix::Fixer;
use crate::issue::Issue;
use crate::model::{self, Local, ModuleCall};
use crate::module::{Module, ModulePath};
use crate::providers::{self, ProviderRefs};
use crate::rules::Rule;
use crate::syntax::{Body, BodySchema, Expr, File, Range, Value};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-rule option tables, keyed by rule name.
pub type RuleConfigs = BTreeMap<String, toml::Table>;

pub struct Runner<'m> {
    module: &'m Module,
    rule_configs: RuleConfigs,
    fix: bool,
    fixer: Fixer,
    issues: Vec<Issue>,
}

impl<'m> Runner<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            rule_configs: RuleConfigs::new(),
            fix: false,
            fixer: Fixer::new(module.files().values()),
            issues: Vec::new(),
        }
    }

    /// Run fix closures passed to [`Runner::emit_issue_with_fix`].
    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_rule_configs(mut self, configs: RuleConfigs) -> Self {
        self.rule_configs = configs;
        self
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn module_path(&self) -> &ModulePath {
        self.module.path()
    }

    pub fn get_module_content(&self, schema: &BodySchema) -> TofulintResult<Body> {
        self.module.content(schema)
    }

    pub fn walk_expressions<F: FnMut(&Expr)>(&self, f: F) {
        self.module.walk_expressions(f)
    }

    pub fn evaluate_expr(&self, expr: &Expr) -> TofulintResult<Value> {
        expr.evaluate()
    }

    pub fn get_files(&self) -> &BTreeMap<String, File> {
        self.module.files()
    }

    pub fn get_file(&self, name: &str) -> Option<&File> {
        self.module.file(name)
    }

    pub fn get_locals(&self) -> TofulintResult<BTreeMap<String, Vec<Local>>> {
        model::get_locals(self.module)
    }

    pub fn get_module_calls(&self) -> TofulintResult<Vec<ModuleCall>> {
        model::get_module_calls(self.module)
    }

    pub fn get_provider_refs(&self) -> TofulintResult<ProviderRefs> {
        providers::get_provider_refs(self.module)
    }

    /// Decode the `[rules.<name>]` table into `T`; a missing table yields `T::default()`.
    pub fn decode_rule_config<T: DeserializeOwned + Default>(&self, rule: &str) -> TofulintResult<T> {
        match self.rule_configs.get(rule) {
            None => Ok(T::default()),
            Some(table) => toml::Value::Table(table.clone())
                .try_into()
                .map_err(|e| TofulintError::config("tofulint.toml", format!("rules.{rule}: {e}"))),
        }
    }

    pub fn emit_issue(
        &mut self,
        rule: &dyn Rule,
        message: impl Into<String>,
        range: Range,
    ) -> TofulintResult<()> {
        self.push_issue(rule, message.into(), range, false, false);
        Ok(())
    }

    /// Emit an issue and, when fixing, run `fix` against the module's fixer.
    ///
    /// A failing fix is rolled back and the issue is reported unfixed.
    pub fn emit_issue_with_fix<F>(
        &mut self,
        rule: &dyn Rule,
        message: impl Into<String>,
        range: Range,
        fix: F,
    ) -> TofulintResult<()>
    where
        F: FnOnce(&mut Fixer) -> TofulintResult<()>,
    {
        let message = message.into();
        let mut fixed = false;

        if self.fix {
            let checkpoint = self.fixer.checkpoint();
            match fix(&mut self.fixer) {
                Ok(()) => fixed = true,
                Err(err) => {
                    self.fixer.rollback(checkpoint);
                    match err {
                        TofulintError::FixNotSupported { .. } => {
                            debug!(rule = rule.name(), range = %range, "fix not supported: {}", err)
                        }
                        _ => warn!(rule = rule.name(), range = %range, "fix skipped: {}", err),
                    }
                }
            }
        }

        self.push_issue(rule, message, range, true, fixed);
        Ok(())
    }

    fn push_issue(&mut self, rule: &dyn Rule, message: String, range: Range, fixable: bool, fixed: bool) {
        self.issues.push(Issue {
            rule: rule.name().to_string(),
            severity: rule.severity(),
            message,
            range,
            link: rule.link(),
            fixable,
            fixed,
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_parts(self) -> (Vec<Issue>, Fixer) {
        (self.issues, self.fixer)
    }
}
