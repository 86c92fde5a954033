//! Declaration extraction.
//!
//! Collects the four kinds of symbol that can go unused in a module:
//! - `variable "NAME" {}` blocks, with the ranges of their validation expressions
//! - `data "TYPE" "NAME" {}` blocks, including those nested in `check` blocks
//! - `locals { NAME = ... }` attributes
//! - `provider "NAME" { alias = "..." }` blocks (aliasless providers are never tracked)

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::TofulintResult;
use crate::model::Local;
use crate::runner::Runner;
use crate::syntax::{Block, BlockSchema, BodySchema, Range, Value};

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub block: Block,
    /// `condition` and `error_message` expressions of the variable's own validation blocks.
    pub validation_ranges: Vec<Range>,
}

#[derive(Debug, Clone)]
pub struct DataResourceDecl {
    /// `data.TYPE.NAME`
    pub address: String,
    pub ty: String,
    pub name: String,
    pub block: Block,
    /// Name of the enclosing `check` block, if any.
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderAliasDecl {
    pub provider: String,
    pub alias: String,
    pub block: Block,
}

impl ProviderAliasDecl {
    /// `PROVIDER.ALIAS`
    pub fn address(&self) -> String {
        format!("{}.{}", self.provider, self.alias)
    }
}

/// Every tracked declaration of a module, keyed by address.
///
/// Repeated addresses keep every occurrence.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub variables: BTreeMap<String, Vec<VariableDecl>>,
    pub data_resources: BTreeMap<String, Vec<DataResourceDecl>>,
    pub locals: BTreeMap<String, Vec<Local>>,
    pub provider_aliases: BTreeMap<String, Vec<ProviderAliasDecl>>,
}

impl Declarations {
    /// Number of declared addresses across all kinds.
    pub fn len(&self) -> usize {
        self.variables.len()
            + self.data_resources.len()
            + self.locals.len()
            + self.provider_aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn data_schema() -> BlockSchema {
    BlockSchema::new("data", &["type", "name"])
}

pub fn declaration_schema() -> BodySchema {
    BodySchema::new()
        .block(
            BlockSchema::new("variable", &["name"]).body(
                BodySchema::new().block(
                    BlockSchema::new("validation", &[]).body(
                        BodySchema::new()
                            .attribute("condition")
                            .attribute("error_message"),
                    ),
                ),
            ),
        )
        .block(data_schema())
        .block(BlockSchema::new("check", &["name"]).body(BodySchema::new().block(data_schema())))
        .block(BlockSchema::new("provider", &["name"]).body(BodySchema::new().attribute("alias")))
}

/// Convert a constant alias value the way a string decode would.
fn alias_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn data_decl(block: &Block, scope: Option<&str>) -> DataResourceDecl {
    let ty = block.labels[0].clone();
    let name = block.labels[1].clone();
    DataResourceDecl {
        address: format!("data.{ty}.{name}"),
        ty,
        name,
        block: block.clone(),
        scope: scope.map(str::to_string),
    }
}

/// Extract all declarations of the runner's module.
///
/// Label count mismatches abort with a diagnostic. An alias that does not
/// decode to a string only drops that provider block.
pub fn extract_declarations(runner: &Runner) -> TofulintResult<Declarations> {
    let content = runner.get_module_content(&declaration_schema())?;
    let mut decls = Declarations::default();

    for block in &content.blocks {
        match block.ty.as_str() {
            "variable" => {
                let validation_ranges = block
                    .body
                    .blocks_of("validation")
                    .flat_map(|v| v.body.attributes.iter().map(|a| a.expr.range()))
                    .collect();
                decls
                    .variables
                    .entry(block.labels[0].clone())
                    .or_default()
                    .push(VariableDecl {
                        name: block.labels[0].clone(),
                        block: block.clone(),
                        validation_ranges,
                    });
            }
            "data" => {
                let decl = data_decl(block, None);
                decls.data_resources.entry(decl.address.clone()).or_default().push(decl);
            }
            "check" => {
                // scoped data sources share the module's address space
                for nested in block.body.blocks_of("data") {
                    let decl = data_decl(nested, Some(&block.labels[0]));
                    decls.data_resources.entry(decl.address.clone()).or_default().push(decl);
                }
            }
            "provider" => {
                let Some(attr) = block.body.attribute("alias") else {
                    continue;
                };
                let alias = match runner.evaluate_expr(&attr.expr).map(alias_string) {
                    Ok(Some(alias)) => alias,
                    Ok(None) => {
                        debug!(range = %attr.expr.range(), "skipping provider with non-string alias");
                        continue;
                    }
                    Err(e) => {
                        debug!(range = %attr.expr.range(), error = %e, "skipping provider with invalid alias");
                        continue;
                    }
                };
                let decl = ProviderAliasDecl {
                    provider: block.labels[0].clone(),
                    alias,
                    block: block.clone(),
                };
                decls.provider_aliases.entry(decl.address()).or_default().push(decl);
            }
            _ => {}
        }
    }

    decls.locals = runner.get_locals()?;
    Ok(decls)
}
