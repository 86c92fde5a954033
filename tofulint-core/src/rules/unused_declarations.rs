//! `opentofu_unused_declarations`: variables, data sources, locals and
//! provider aliases that are declared but never referenced.

use crate::declarations::{extract_declarations, extract_references, DeclarationGraph};
use crate::error::TofulintResult;
use crate::issue::Severity;
use crate::rules::Rule;
use crate::runner::Runner;
use tracing::debug;

pub struct UnusedDeclarationsRule;

impl UnusedDeclarationsRule {
    pub const NAME: &'static str = "opentofu_unused_declarations";
}

impl Rule for UnusedDeclarationsRule {
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
        // child modules are not evaluated
        if !runner.module_path().is_root() {
            return Ok(());
        }

        let mut graph = DeclarationGraph::new(extract_declarations(runner)?);
        runner.walk_expressions(|expr| graph.apply(&extract_references(expr)));
        let result = graph.analyze();
        debug!(
            module = %runner.module_path(),
            declared = result.stats.total_declared,
            unused = result.stats.unused_count,
            "declaration analysis complete"
        );
        let unused = result.unused;

        for decl in unused.variables.values().flatten() {
            let block = decl.block.clone();
            runner.emit_issue_with_fix(
                self,
                format!("variable \"{}\" is declared but not used", decl.name),
                decl.block.def_range.clone(),
                move |f| f.remove_block(&block),
            )?;
        }
        for decl in unused.data_resources.values().flatten() {
            let block = decl.block.clone();
            runner.emit_issue_with_fix(
                self,
                format!("data \"{}\" \"{}\" is declared but not used", decl.ty, decl.name),
                decl.block.def_range.clone(),
                move |f| f.remove_block(&block),
            )?;
        }
        for local in unused.locals.values().flatten() {
            let attribute = local.attribute.clone();
            runner.emit_issue_with_fix(
                self,
                format!("local.{} is declared but not used", local.name),
                local.def_range.clone(),
                move |f| f.remove_attribute(&attribute),
            )?;
        }
        for decl in unused.provider_aliases.values().flatten() {
            let block = decl.block.clone();
            runner.emit_issue_with_fix(
                self,
                format!(
                    "provider \"{}\" with alias \"{}\" is declared but not used",
                    decl.provider, decl.alias
                ),
                decl.block.def_range.clone(),
                move |f| f.remove_block(&block),
            )?;
        }

        Ok(())
    }
}
