//! tofulint CLI - unused declaration linter for OpenTofu configurations.
//!
//! Features:
//! - Unused variables, data sources, locals and provider aliases
//! - `required_providers` completeness checks
//! - Range-based autofix with dry-run
//! - Recursive linting of every module directory
//! - Plain and JSON output

use anyhow::{bail, Result};
use clap::Parser;
use serde_json::json;
use std::path::Path;

use tofulint_core::{
    all_rules, init_structured_logging, load_config, preset, print_fix_summary, print_json,
    print_plain, CallModuleType, LintResult, Tofulint, TofulintConfig, PRESETS,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Unused declaration linter for OpenTofu configurations")]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(default_value = ".")]
    path: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Apply fixes to the files
    #[arg(long)]
    fix: bool,

    /// Show which files would be fixed without writing them
    #[arg(long)]
    fix_dry_run: bool,

    /// Rule preset: all or recommended
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Enable rules in addition to the preset
    #[arg(long, num_args = 1.., value_name = "RULE")]
    enable_rule: Vec<String>,

    /// Disable rules
    #[arg(long, num_args = 1.., value_name = "RULE")]
    disable_rule: Vec<String>,

    /// Run only these rules
    #[arg(long, num_args = 1.., value_name = "RULE")]
    only: Vec<String>,

    /// Lint every module directory below PATH
    #[arg(long)]
    recursive: bool,

    /// Which module calls to load as child modules: none or local
    #[arg(long, value_name = "TYPE")]
    call_module_type: Option<CallModuleType>,

    /// List the available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// File name patterns to ignore
    #[arg(long, num_args = 1..)]
    ignore: Vec<String>,
}

impl Cli {
    /// Build the linter from flags. Unset flags fall back to the config file.
    fn linter(&self) -> Tofulint {
        let mut linter = Tofulint::new(&self.path)
            .recursive(self.recursive)
            .fix(self.fix)
            .dry_run(self.fix_dry_run)
            .ignore_patterns(self.ignore.iter().cloned())
            .only(self.only.iter().cloned());

        if let Some(name) = &self.preset {
            linter = linter.preset(name);
        }
        if let Some(kind) = self.call_module_type {
            linter = linter.call_module_type(kind);
        }
        for rule in &self.enable_rule {
            linter = linter.enable_rule(rule);
        }
        for rule in &self.disable_rule {
            linter = linter.disable_rule(rule);
        }
        linter
    }

    fn json_output(&self, config: Option<&TofulintConfig>) -> bool {
        self.json
            || config
                .and_then(|c| c.output.as_ref())
                .and_then(|o| o.format.as_deref())
                == Some("json")
    }
}

/// Names of the presets that include `rule`.
fn presets_of(rule: &str) -> Vec<&'static str> {
    PRESETS
        .iter()
        .copied()
        .filter(|p| {
            preset(p)
                .map(|rules| rules.iter().any(|r| r.name() == rule))
                .unwrap_or(false)
        })
        .collect()
}

/// One line per rule: name, severity and the presets that include it.
fn rule_listing() -> String {
    let mut out = String::new();
    for rule in all_rules() {
        out.push_str(&format!(
            "{:<40} {:<8} {}\n",
            rule.name(),
            rule.severity(),
            presets_of(rule.name()).join(",")
        ));
    }
    out
}

fn rule_listing_json() -> serde_json::Value {
    let rules: Vec<_> = all_rules()
        .iter()
        .map(|rule| {
            json!({
                "name": rule.name(),
                "severity": rule.severity(),
                "enabled": rule.enabled(),
                "presets": presets_of(rule.name()),
                "link": rule.link(),
            })
        })
        .collect();
    json!({ "rules": rules })
}

/// 0 when nothing is left to fix, 1 otherwise.
fn exit_code(result: &LintResult, fixing: bool) -> i32 {
    let remaining = if fixing {
        result.unfixed_count()
    } else {
        result.issues.len()
    };
    if remaining == 0 {
        0
    } else {
        1
    }
}

fn run(cli: &Cli) -> Result<i32> {
    if cli.list_rules {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&rule_listing_json())?);
        } else {
            print!("{}", rule_listing());
        }
        return Ok(0);
    }

    let root = Path::new(&cli.path);
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    // Only needed here for the output format; the builder reads it again for everything else.
    let config = load_config(root)?;
    let json = cli.json_output(config.as_ref());

    let result = cli.linter().analyze()?;

    if json {
        print_json(&result.issues);
    } else {
        print_plain(&result.issues);
        if let Some(fix_result) = &result.fix_result {
            print_fix_summary(fix_result, cli.fix_dry_run && !cli.fix);
        }
    }

    // Dry runs change nothing, so their issues still count.
    Ok(exit_code(&result, cli.fix))
}

fn main() {
    // Global panic guard
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] tofulint internal error: {}", info);
        eprintln!("[PANIC] The process will exit safely with code 2.");
        std::process::exit(2);
    }));

    // Initialize structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[ERROR] {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir()
            .join("tofulint_cli_test")
            .join(format!("{}_{}_{}", name, std::process::id(), id));
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).ok();
        }
        fs::create_dir_all(&temp_dir).unwrap();
        temp_dir
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tofulint").chain(args.iter().copied())).unwrap()
    }

    // --- argument parsing TESTS ---

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.path, ".");
        assert!(!cli.json && !cli.fix && !cli.fix_dry_run && !cli.recursive);
        assert!(cli.preset.is_none());
        assert!(cli.call_module_type.is_none());
    }

    #[test]
    fn test_rule_lists() {
        let cli = parse(&[
            "dir",
            "--only",
            "opentofu_unused_declarations",
            "opentofu_required_providers",
            "--disable-rule",
            "opentofu_unused_required_providers",
        ]);
        assert_eq!(cli.path, "dir");
        assert_eq!(cli.only.len(), 2);
        assert_eq!(cli.disable_rule, vec!["opentofu_unused_required_providers"]);
    }

    #[test]
    fn test_call_module_type() {
        let cli = parse(&["--call-module-type", "local"]);
        assert_eq!(cli.call_module_type, Some(CallModuleType::Local));
        assert!(
            Cli::try_parse_from(["tofulint", "--call-module-type", "all"]).is_err()
        );
    }

    // --- output TESTS ---

    #[test]
    fn test_json_from_config() {
        let cfg: TofulintConfig = toml_config("[output]\nformat = \"json\"\n");
        assert!(parse(&[]).json_output(Some(&cfg)));
        assert!(!parse(&[]).json_output(None));
        assert!(parse(&["--json"]).json_output(None));
    }

    fn toml_config(src: &str) -> TofulintConfig {
        let dir = create_temp_dir("config");
        fs::write(dir.join("tofulint.toml"), src).unwrap();
        load_config(&dir).unwrap().unwrap()
    }

    #[test]
    fn test_rule_listing() {
        let listing = rule_listing();
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.contains("opentofu_unused_declarations"));
        let unused_required = listing
            .lines()
            .find(|l| l.starts_with("opentofu_unused_required_providers"))
            .unwrap();
        assert!(unused_required.ends_with(" all"));
    }

    #[test]
    fn test_rule_listing_json() {
        let listing = rule_listing_json();
        let rules = listing["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0]["name"], "opentofu_required_providers");
        assert_eq!(rules[0]["severity"], "warning");
        assert_eq!(rules[0]["presets"], json!(["all", "recommended"]));
    }

    // --- run TESTS ---

    #[test]
    fn test_exit_codes() {
        let dir = create_temp_dir("exit");
        fs::write(dir.join("main.tf"), "variable \"unused\" {}\n").unwrap();
        let path = dir.display().to_string();

        assert_eq!(run(&parse(&[&path, "--fix-dry-run"])).unwrap(), 1);
        assert_eq!(run(&parse(&[&path])).unwrap(), 1);
        assert_eq!(run(&parse(&[&path, "--fix"])).unwrap(), 0);
        assert_eq!(run(&parse(&[&path])).unwrap(), 0);
    }

    #[test]
    fn test_unknown_rule_is_an_error() {
        let dir = create_temp_dir("unknown");
        let path = dir.display().to_string();
        assert!(run(&parse(&[&path, "--only", "nope"])).is_err());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = create_temp_dir("missing").join("absent");
        let path = dir.display().to_string();
        assert!(run(&parse(&[&path])).is_err());
    }
}
