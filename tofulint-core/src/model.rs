//! Locals and module calls of a module.

use crate::error::{TofulintError, TofulintResult};
use crate::module::Module;
use crate::syntax::{Attribute, BlockSchema, BodySchema, Range, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One entry of a `locals` block.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub attribute: Attribute,
    pub def_range: Range,
}

/// A `module` block.
#[derive(Debug, Clone)]
pub struct ModuleCall {
    pub name: String,
    pub def_range: Range,
    pub source: String,
    pub source_attr: Attribute,
    pub version: Option<String>,
    pub version_attr: Option<Attribute>,
}

impl ModuleCall {
    /// Whether the source is a path on the local filesystem.
    pub fn is_local(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }
}

/// All locals of the module by name. Repeated names keep every occurrence.
pub fn get_locals(module: &Module) -> TofulintResult<BTreeMap<String, Vec<Local>>> {
    let schema =
        BodySchema::new().block(BlockSchema::new("locals", &[]).body(BodySchema::just_attributes()));
    let content = module.content(&schema)?;

    let mut locals: BTreeMap<String, Vec<Local>> = BTreeMap::new();
    for block in content.blocks_of("locals") {
        for attr in &block.body.attributes {
            locals.entry(attr.name.clone()).or_default().push(Local {
                name: attr.name.clone(),
                attribute: attr.clone(),
                def_range: attr.range.clone(),
            });
        }
    }
    Ok(locals)
}

pub fn get_module_calls(module: &Module) -> TofulintResult<Vec<ModuleCall>> {
    let schema = BodySchema::new().block(
        BlockSchema::new("module", &["name"])
            .body(BodySchema::new().attribute("source").attribute("version")),
    );
    let content = module.content(&schema)?;

    let mut calls = Vec::new();
    for block in content.blocks_of("module") {
        let name = block.labels[0].clone();

        let Some(source_attr) = block.body.attribute("source") else {
            return Err(TofulintError::diagnostic(
                &block.def_range,
                "Missing required argument",
                format!("The argument \"source\" is required for module \"{name}\"."),
            ));
        };
        let source = match source_attr.expr.evaluate()? {
            Value::String(s) => s,
            _ => {
                return Err(TofulintError::diagnostic(
                    &source_attr.expr.range(),
                    "Invalid module source",
                    "The module source must be a literal string.",
                ))
            }
        };

        let version_attr = block.body.attribute("version").cloned();
        let version = match &version_attr {
            None => None,
            Some(attr) => match attr.expr.evaluate()? {
                Value::String(v) if is_valid_version_constraint(&v) => Some(v),
                _ => {
                    return Err(TofulintError::diagnostic(
                        &attr.expr.range(),
                        "Invalid version constraint",
                        "This string does not use correct version constraint syntax.",
                    ))
                }
            },
        };

        calls.push(ModuleCall {
            name,
            def_range: block.def_range.clone(),
            source,
            source_attr: source_attr.clone(),
            version,
            version_attr,
        });
    }
    Ok(calls)
}

fn constraint_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: This regex pattern is hardcoded and covered by tests.
    REGEX.get_or_init(|| {
        Regex::new(
            r"^\s*(=|!=|>=|<=|>|<|~>)?\s*v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z.\-]+))?(?:\+[0-9A-Za-z.\-]+)?\s*$",
        )
        .expect("Hardcoded regex pattern is valid")
    })
}

/// One comparison of a version constraint, such as `~> 1.2`.
///
/// Missing segments are zero and build metadata is dropped, so `~> 2` and
/// `~>2.0.0` are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionConstraint {
    pub op: String,
    pub segments: [u64; 3],
    pub prerelease: Option<String>,
}

/// Parse a comma separated list like `>= 1.2, < 2.0.0`.
///
/// The comparisons come back sorted, so two lists that differ only in order compare equal.
pub fn parse_version_constraint(constraint: &str) -> Option<Vec<VersionConstraint>> {
    let mut parsed = constraint
        .split(',')
        .map(|part| {
            let caps = constraint_regex().captures(part)?;
            let mut segments = [0u64; 3];
            for (i, segment) in segments.iter_mut().enumerate() {
                if let Some(m) = caps.get(i + 2) {
                    *segment = m.as_str().parse().ok()?;
                }
            }
            Some(VersionConstraint {
                op: caps.get(1).map_or("=", |m| m.as_str()).to_string(),
                segments,
                prerelease: caps.get(5).map(|m| m.as_str().to_string()),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    parsed.sort();
    Some(parsed)
}

pub fn is_valid_version_constraint(constraint: &str) -> bool {
    parse_version_constraint(constraint).is_some()
}
