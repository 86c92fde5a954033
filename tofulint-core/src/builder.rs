//! Builder pattern API for tofulint runs.
//!
//! Provides a fluent interface for configuring and running the rules:
//!
//! ```rust,ignore
//! use tofulint_core::prelude::*;
//!
//! let result = Tofulint::new("/path/to/config")
//!     .preset("all")
//!     .recursive(true)
//!     .fix(true)
//!     .analyze()?;
//!
//! for issue in &result.issues {
//!     println!("{}: {}", issue.range, issue.message);
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::{load_config, CallModuleType, TofulintConfig};
use crate::error::TofulintError;
use crate::fix::{write_changes, FixResult};
use crate::issue::{sort_issues, Issue};
use crate::module::{Module, ModulePath};
use crate::rules::{self, Rule};
use crate::runner::Runner;
use crate::scan::{gather_module_dirs, gather_tf_files};

/// Maximum depth of followed local module calls.
const MAX_MODULE_DEPTH: usize = 32;

/// Builder for configuring a lint run.
#[derive(Debug, Clone)]
pub struct Tofulint {
    /// Directory to lint
    root: PathBuf,

    /// Preset name; falls back to the config file, then "recommended"
    preset: Option<String>,

    /// Rules switched on in addition to the preset
    enabled_rules: Vec<String>,

    /// Rules switched off
    disabled_rules: Vec<String>,

    /// When non-empty, run exactly these rules
    only_rules: Vec<String>,

    /// Lint every module directory below the root
    recursive: bool,

    /// Which module calls to load as child modules
    call_module_type: Option<CallModuleType>,

    /// Queue fixes and write them
    fix: bool,

    /// Report what would be written without writing
    dry_run: bool,

    /// File name patterns to skip
    ignored_patterns: Vec<String>,

    /// Read tofulint.toml from the root
    use_config: bool,
}

impl Tofulint {
    /// Create a new lint builder for the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            preset: None,
            enabled_rules: Vec::new(),
            disabled_rules: Vec::new(),
            only_rules: Vec::new(),
            recursive: false,
            call_module_type: None,
            fix: false,
            dry_run: false,
            ignored_patterns: Vec::new(),
            use_config: true,
        }
    }

    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    pub fn enable_rule(mut self, name: impl Into<String>) -> Self {
        self.enabled_rules.push(name.into());
        self
    }

    pub fn disable_rule(mut self, name: impl Into<String>) -> Self {
        self.disabled_rules.push(name.into());
        self
    }

    /// Run only the given rules, ignoring presets and toggles.
    pub fn only(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.only_rules.extend(names.into_iter().map(Into::into));
        self
    }

    /// Lint every module directory below the root, each as a root module.
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    pub fn call_module_type(mut self, kind: CallModuleType) -> Self {
        self.call_module_type = Some(kind);
        self
    }

    /// Apply fixes to the files on disk.
    pub fn fix(mut self, enabled: bool) -> Self {
        self.fix = enabled;
        self
    }

    /// Enable dry-run mode (fixes are computed, files are not modified).
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Add file name patterns to skip.
    pub fn ignore_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Whether to read tofulint.toml from the root directory.
    pub fn with_config(mut self, enabled: bool) -> Self {
        self.use_config = enabled;
        self
    }

    fn fixing(&self) -> bool {
        self.fix || self.dry_run
    }

    /// Resolve the rule set from `only`, the preset, the config file and the toggles.
    pub fn select_rules(&self, config: &TofulintConfig) -> Result<Vec<Box<dyn Rule>>> {
        for name in self
            .only_rules
            .iter()
            .chain(&self.enabled_rules)
            .chain(&self.disabled_rules)
            .chain(config.rules.keys())
        {
            if rules::find_rule(name).is_none() {
                bail!("unknown rule '{name}'");
            }
        }

        if !self.only_rules.is_empty() {
            return Ok(rules::all_rules()
                .into_iter()
                .filter(|r| self.only_rules.iter().any(|n| n == r.name()))
                .collect());
        }

        let preset_name = self
            .preset
            .as_deref()
            .or(config.preset.as_deref())
            .unwrap_or("recommended");
        let Some(preset) = rules::preset(preset_name) else {
            bail!(
                "unknown preset '{preset_name}' (expected one of: {})",
                rules::PRESETS.join(", ")
            );
        };
        let in_preset: BTreeSet<&str> = preset.iter().map(|r| r.name()).collect();

        Ok(rules::all_rules()
            .into_iter()
            .filter(|r| {
                let name = r.name();
                if self.disabled_rules.iter().any(|n| n == name) {
                    return false;
                }
                if self.enabled_rules.iter().any(|n| n == name) {
                    return true;
                }
                config
                    .rule_enabled(name)
                    .unwrap_or(in_preset.contains(name) && r.enabled())
            })
            .collect())
    }

    /// Run the rules and return results. With `fix`, changed files are written.
    pub fn analyze(&self) -> Result<LintResult> {
        // 1. Load config
        let config = if self.use_config {
            load_config(&self.root)?.unwrap_or_default()
        } else {
            TofulintConfig::default()
        };

        // 2. Select rules
        let rules = self.select_rules(&config)?;
        let mut ignore = self.ignored_patterns.clone();
        ignore.extend(config.ignore.clone().unwrap_or_default());
        let call_module_type = self
            .call_module_type
            .or(config.call_module_type)
            .unwrap_or_default();

        // 3. Find module directories
        let dirs = if self.recursive {
            gather_module_dirs(&self.root)?
        } else {
            vec![self.root.clone()]
        };

        // 4. Check every module
        let mut ctx = RunContext {
            root: &self.root,
            rules: &rules,
            config: &config,
            ignore: &ignore,
            call_module_type,
            fix: self.fixing(),
            visited: BTreeSet::new(),
            reports: Vec::new(),
        };
        for dir in dirs {
            ctx.check_dir(&dir, ModulePath::root(), 0)?;
        }
        let reports = ctx.reports;

        // 5. Write fixes
        let fix_result = if self.fixing() {
            let mut result = FixResult::default();
            for report in &reports {
                let written = write_changes(&report.dir, &report.changes, self.dry_run);
                result.files_changed.extend(written.files_changed);
                result.errors.extend(written.errors);
                result.errors.extend(report.fix_errors.iter().cloned());
            }
            Some(result)
        } else {
            None
        };

        let mut issues: Vec<Issue> = reports.iter().flat_map(|r| r.issues.iter().cloned()).collect();
        sort_issues(&mut issues);
        info!(
            modules = reports.len(),
            rules = rules.len(),
            issues = issues.len(),
            "lint complete"
        );

        Ok(LintResult {
            root: self.root.clone(),
            modules: reports,
            issues,
            fix_result,
        })
    }
}

struct RunContext<'a> {
    root: &'a Path,
    rules: &'a [Box<dyn Rule>],
    config: &'a TofulintConfig,
    ignore: &'a [String],
    call_module_type: CallModuleType,
    fix: bool,
    visited: BTreeSet<(PathBuf, ModulePath)>,
    reports: Vec<ModuleReport>,
}

impl RunContext<'_> {
    fn check_dir(&mut self, dir: &Path, path: ModulePath, depth: usize) -> Result<()> {
        if !self.visited.insert((dir.to_path_buf(), path.clone())) {
            return Ok(());
        }

        let files = gather_tf_files(dir, self.ignore)?;
        if files.is_empty() && !path.is_root() {
            warn!(dir = %dir.display(), module = %path, "module directory has no configuration files");
            return Ok(());
        }
        let module = Module::load(dir, path.clone(), &files)
            .with_context(|| format!("Failed to load module {} from {}", path, dir.display()))?;

        let mut runner = Runner::new(&module)
            .with_fix(self.fix)
            .with_rule_configs(self.config.rule_configs());
        for rule in self.rules {
            rule.check(&mut runner)
                .with_context(|| format!("{} failed on {}", rule.name(), dir.display()))?;
        }

        let calls = if self.call_module_type == CallModuleType::Local && depth < MAX_MODULE_DEPTH {
            runner.get_module_calls()?
        } else {
            Vec::new()
        };

        let (mut issues, fixer) = runner.into_parts();
        let (changes, fix_errors) = match fixer.changes() {
            Ok(changes) => (changes, Vec::new()),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "discarding fixes");
                // nothing of this module gets written
                for issue in &mut issues {
                    issue.fixed = false;
                }
                (BTreeMap::new(), vec![e.to_string()])
            }
        };

        let relative = dir.strip_prefix(self.root).unwrap_or(dir);
        if !relative.as_os_str().is_empty() {
            for issue in &mut issues {
                issue.range.filename = relative.join(&issue.range.filename).display().to_string();
            }
        }
        sort_issues(&mut issues);

        self.reports.push(ModuleReport {
            dir: dir.to_path_buf(),
            path: path.clone(),
            issues,
            changes,
            fix_errors,
        });

        for call in calls.iter().filter(|c| c.is_local()) {
            let child_dir = dir.join(&call.source);
            match self.contained(&child_dir) {
                Ok(child_dir) => self.check_dir(&child_dir, path.child(&call.name), depth + 1)?,
                Err(e) => warn!(module = %call.name, error = %e, "skipping module call"),
            }
        }
        Ok(())
    }

    /// Resolve a child module directory, refusing anything outside the linted root.
    fn contained(&self, dir: &Path) -> Result<PathBuf, TofulintError> {
        let resolved = dir
            .canonicalize()
            .map_err(|e| TofulintError::io(dir, e))?;
        let root = self
            .root
            .canonicalize()
            .map_err(|e| TofulintError::io(self.root, e))?;
        if !resolved.starts_with(&root) {
            return Err(TofulintError::security(format!(
                "{} is outside {}",
                resolved.display(),
                root.display()
            )));
        }
        let relative = resolved.strip_prefix(&root).unwrap_or(&resolved);
        Ok(self.root.join(relative))
    }
}

/// Issues and pending changes of one module.
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub dir: PathBuf,
    pub path: ModulePath,
    pub issues: Vec<Issue>,
    /// New contents of changed files, by file name
    pub changes: BTreeMap<String, String>,
    /// Fixes that were discarded because the result did not parse
    pub fix_errors: Vec<String>,
}

/// Result of a lint run.
#[derive(Debug, Clone)]
pub struct LintResult {
    /// Root path that was linted
    pub root: PathBuf,

    /// One report per checked module, in check order
    pub modules: Vec<ModuleReport>,

    /// Issues of all modules, sorted by file, position and rule
    pub issues: Vec<Issue>,

    /// Files written (or that would be written) when fixing
    pub fix_result: Option<FixResult>,
}

impl LintResult {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues left after fixing.
    pub fn unfixed_count(&self) -> usize {
        self.issues.iter().filter(|i| !i.fixed).count()
    }

    pub fn has_changes(&self) -> bool {
        self.modules.iter().any(|m| !m.changes.is_empty())
    }
}
