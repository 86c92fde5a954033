//! Reference extraction from expressions.
//!
//! Detects:
//! - Input variables: `var.NAME`
//! - Locals: `local.NAME`
//! - Data sources: `data.TYPE.NAME`, also indexed
//! - Managed resources: `TYPE.NAME`
//! - Provider alias candidates: any static `X.Y` traversal
//! - Provider functions: `provider::NAME::fn(...)`
//!
//! JSON expressions have no expression tree of their own: every string in a
//! JSON value, object keys included, is re-parsed as a template and walked.

use crate::syntax::json::{JsonKind, JsonValue};
use crate::syntax::expr::{expr_span, template_literal};
use crate::syntax::{
    json_string_origin, reparse_expression, reparse_template, Expr, Range, SourceMap, TextOrigin,
};
use hcl_edit::expr::{Expression, ForExpr, FuncCall, Traversal, TraversalOperator};
use hcl_edit::template::ForTemplateExpr;
use hcl_edit::visit::{self, Visit};
use hcl_edit::{Decorated, Ident, Span};
use std::ops;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    InputVariable(String),
    LocalValue(String),
    Resource {
        mode: ResourceMode,
        ty: String,
        name: String,
    },
    /// An indexed resource; resolves to the same address as its resource.
    ResourceInstance {
        mode: ResourceMode,
        ty: String,
        name: String,
    },
    /// A static two-part traversal that may name a provider configuration.
    ProviderAlias(String),
}

impl Subject {
    pub fn address(&self) -> String {
        match self {
            Subject::InputVariable(name) => format!("var.{name}"),
            Subject::LocalValue(name) => format!("local.{name}"),
            Subject::Resource { mode, ty, name } | Subject::ResourceInstance { mode, ty, name } => {
                match mode {
                    ResourceMode::Data => format!("data.{ty}.{name}"),
                    ResourceMode::Managed => format!("{ty}.{name}"),
                }
            }
            Subject::ProviderAlias(address) => address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub subject: Subject,
    pub range: Range,
}

/// A `provider::NAME::fn(...)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFunctionCall {
    pub provider: String,
    pub function: String,
    pub range: Range,
}

/// References found in one expression.
#[derive(Debug, Clone, Default)]
pub struct UsageResult {
    pub references: Vec<Reference>,
    pub provider_functions: Vec<ProviderFunctionCall>,
}

impl UsageResult {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.provider_functions.is_empty()
    }
}

/// Expression visitor collecting references.
struct UsageExtractor {
    src: Arc<SourceMap>,
    /// Where the text currently being walked lies in the file.
    origin: TextOrigin,
    /// Names bound by enclosing `for` expressions and directives.
    scope: Vec<String>,
    result: UsageResult,
}

impl UsageExtractor {
    fn new(src: Arc<SourceMap>) -> Self {
        Self {
            src,
            origin: TextOrigin::default(),
            scope: Vec::new(),
            result: UsageResult::default(),
        }
    }

    fn range(&self, span: ops::Range<usize>) -> Range {
        self.src.range(self.origin.file_span(span))
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scope.iter().any(|s| s == name)
    }

    fn with_scope<F: FnOnce(&mut Self)>(&mut self, names: Vec<String>, f: F) {
        let depth = self.scope.len();
        self.scope.extend(names);
        f(self);
        self.scope.truncate(depth);
    }

    fn record_traversal(&mut self, traversal: &Traversal) {
        let Expression::Variable(root) = &traversal.expr else {
            return;
        };
        let root = root.value().as_str();

        // The leading run of attribute and constant-index steps forms one static reference.
        let mut steps = Vec::new();
        for op in &traversal.operators {
            let step = match op.value() {
                TraversalOperator::GetAttr(ident) => Step::Attr(ident.value().as_str().to_string()),
                TraversalOperator::LegacyIndex(_) => Step::Index,
                TraversalOperator::Index(key) if is_constant_key(key) => Step::Index,
                _ => break,
            };
            steps.push((step, op.span()));
        }
        if steps.is_empty() {
            return;
        }

        let start = traversal.expr.span().map_or(0, |s| s.start);
        let end_of = |n: usize| {
            steps[..n]
                .iter()
                .rev()
                .find_map(|(_, span)| span.clone())
                .map_or(start, |s| s.end)
        };

        if traversal.operators.len() == 1 {
            if let Step::Attr(attr) = &steps[0].0 {
                let range = self.range(start..end_of(1));
                self.result.references.push(Reference {
                    subject: Subject::ProviderAlias(format!("{root}.{attr}")),
                    range,
                });
            }
        }

        if self.is_shadowed(root) {
            return;
        }

        let attr = |i: usize| match steps.get(i).map(|(s, _)| s) {
            Some(Step::Attr(name)) => Some(name.clone()),
            _ => None,
        };
        let indexed = |i: usize| matches!(steps.get(i).map(|(s, _)| s), Some(Step::Index));

        let (subject, len) = match root {
            "var" => match attr(0) {
                Some(name) => (Subject::InputVariable(name), 1),
                None => return,
            },
            "local" => match attr(0) {
                Some(name) => (Subject::LocalValue(name), 1),
                None => return,
            },
            "data" => match (attr(0), attr(1)) {
                (Some(ty), Some(name)) if indexed(2) => (
                    Subject::ResourceInstance {
                        mode: ResourceMode::Data,
                        ty,
                        name,
                    },
                    3,
                ),
                (Some(ty), Some(name)) => (
                    Subject::Resource {
                        mode: ResourceMode::Data,
                        ty,
                        name,
                    },
                    2,
                ),
                _ => return,
            },
            "count" | "each" | "path" | "module" | "self" | "terraform" | "provider" => return,
            ty => match attr(0) {
                Some(name) if indexed(1) => (
                    Subject::ResourceInstance {
                        mode: ResourceMode::Managed,
                        ty: ty.to_string(),
                        name,
                    },
                    2,
                ),
                Some(name) => (
                    Subject::Resource {
                        mode: ResourceMode::Managed,
                        ty: ty.to_string(),
                        name,
                    },
                    1,
                ),
                None => return,
            },
        };

        let range = self.range(start..end_of(len));
        self.result.references.push(Reference { subject, range });
    }

    fn record_func_call(&mut self, expr: &Expression, call: &FuncCall) {
        let namespace = &call.name.namespace;
        if namespace.len() < 2 || namespace[0].value().as_str() != "provider" {
            return;
        }
        let provider = namespace[1].value().as_str();
        if provider.is_empty() {
            return;
        }
        let span = expr_span(expr).unwrap_or(0..0);
        self.result.provider_functions.push(ProviderFunctionCall {
            provider: provider.to_string(),
            function: call.name.name.value().as_str().to_string(),
            range: self.range(span),
        });
    }

    fn visit_json(&mut self, value: &JsonValue) {
        match &value.kind {
            JsonKind::String(text) => self.visit_json_string(text, &value.span),
            JsonKind::Array(items) => {
                for item in items {
                    self.visit_json(item);
                }
            }
            JsonKind::Object(props) => {
                for prop in props {
                    self.visit_json_string(&prop.name, &prop.name_span);
                    self.visit_json(&prop.value);
                }
            }
            JsonKind::Null | JsonKind::Bool(_) | JsonKind::Number(_) => {}
        }
    }

    /// `span` covers the string in the file, quotes included.
    fn visit_json_string(&mut self, text: &str, span: &ops::Range<usize>) {
        let origin = json_string_origin(&self.src, span);
        let saved = std::mem::replace(&mut self.origin, origin.clone());

        match reparse_template(text, &self.src, origin.clone()) {
            Ok(template) => self.visit_template(&template.template),
            Err(e) => debug!(error = %e, "skipping JSON string that is not a valid template"),
        }

        // a bare "X.Y" string may name a provider configuration
        if !text.contains("${") {
            if let Ok(expr) = reparse_expression(text, &self.src, origin) {
                if let Ok(traversal) = Expr::Native(expr).abs_traversal() {
                    if let (2, Some(root), Some(attr)) =
                        (traversal.len(), traversal.root_name(), traversal.attr(1))
                    {
                        self.result.references.push(Reference {
                            subject: Subject::ProviderAlias(format!("{root}.{attr}")),
                            range: traversal.range.clone(),
                        });
                    }
                }
            }
        }

        self.origin = saved;
    }
}

#[derive(Debug)]
enum Step {
    Attr(String),
    Index,
}

fn is_constant_key(key: &Expression) -> bool {
    matches!(
        key,
        Expression::String(_) | Expression::Number(_) | Expression::Bool(_)
    ) || matches!(key, Expression::StringTemplate(t) if template_literal(t).is_some())
}

fn bound_names(key: Option<&Decorated<Ident>>, value: &Decorated<Ident>) -> Vec<String> {
    key.into_iter()
        .chain(std::iter::once(value))
        .map(|ident| ident.value().as_str().to_string())
        .collect()
}

impl Visit for UsageExtractor {
    fn visit_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Traversal(t) => self.record_traversal(t),
            Expression::FuncCall(call) => self.record_func_call(expr, call),
            _ => {}
        }
        visit::visit_expr(self, expr);
    }

    fn visit_for_expr(&mut self, node: &ForExpr) {
        self.visit_expr(&node.intro.collection_expr);
        let names = bound_names(node.intro.key_var.as_ref(), &node.intro.value_var);
        self.with_scope(names, |v| {
            if let Some(key_expr) = &node.key_expr {
                v.visit_expr(key_expr);
            }
            v.visit_expr(&node.value_expr);
            if let Some(cond) = &node.cond {
                v.visit_expr(&cond.expr);
            }
        });
    }

    fn visit_for_template_expr(&mut self, node: &ForTemplateExpr) {
        self.visit_expr(&node.collection_expr);
        let names = bound_names(node.key_var.as_ref(), &node.value_var);
        self.with_scope(names, |v| v.visit_template(&node.template));
    }
}

/// Extract every reference in an expression of either syntax.
pub fn extract_references(expr: &Expr) -> UsageResult {
    match expr {
        Expr::Native(native) => {
            let mut extractor = UsageExtractor::new(native.src.clone());
            extractor.origin = native.origin.clone();
            extractor.visit_expr(&native.expr);
            extractor.result
        }
        Expr::Json(json) => {
            let mut extractor = UsageExtractor::new(json.src.clone());
            extractor.visit_json(&json.value);
            extractor.result
        }
    }
}
