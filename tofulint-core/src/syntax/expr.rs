//! Expressions of both syntaxes behind one type.
//!
//! Native expressions are hcl-edit trees plus the origin of the tree's own
//! text inside the file. The origin is not the file start for text that was
//! re-parsed out of a JSON string or a quoted literal.

use super::json::{JsonKind, JsonValue};
use super::position::{Range, SourceMap, TextOrigin};
use crate::error::{TofulintError, TofulintResult};
use hcl_edit::expr::{Expression, ObjectKey, TraversalOperator};
use hcl_edit::template::{Element, Template};
use hcl_edit::Span;
use std::collections::BTreeMap;
use std::fmt;
use std::ops;
use std::sync::Arc;

/// An expression from a `.tf` or `.tf.json` file.
#[derive(Debug, Clone)]
pub enum Expr {
    Native(NativeExpr),
    Json(JsonExpr),
}

#[derive(Debug, Clone)]
pub struct NativeExpr {
    pub expr: Expression,
    pub src: Arc<SourceMap>,
    /// Where the text `expr` was parsed from lies in the file.
    pub origin: TextOrigin,
}

#[derive(Debug, Clone)]
pub struct JsonExpr {
    pub value: JsonValue,
    pub src: Arc<SourceMap>,
}

/// A template re-parsed from a JSON string leaf.
#[derive(Debug, Clone)]
pub struct NativeTemplate {
    pub template: Template,
    pub src: Arc<SourceMap>,
    pub origin: TextOrigin,
}

impl NativeExpr {
    pub fn new(expr: Expression, src: Arc<SourceMap>, origin: TextOrigin) -> Self {
        Self { expr, src, origin }
    }

    /// Wrap a sub-expression of this one.
    pub fn sub(&self, expr: &Expression) -> NativeExpr {
        NativeExpr::new(expr.clone(), self.src.clone(), self.origin.clone())
    }

    pub fn range(&self) -> Range {
        self.range_of(&self.expr)
    }

    /// Range of any node that belongs to this expression's text.
    pub fn range_of(&self, expr: &Expression) -> Range {
        self.range_of_span(expr_span(expr))
    }

    pub fn range_of_span(&self, span: Option<ops::Range<usize>>) -> Range {
        self.src.range(self.origin.file_span(span.unwrap_or(0..0)))
    }
}

impl JsonExpr {
    pub fn new(value: JsonValue, src: Arc<SourceMap>) -> Self {
        Self { value, src }
    }

    pub fn sub(&self, value: &JsonValue) -> JsonExpr {
        JsonExpr::new(value.clone(), self.src.clone())
    }

    pub fn range(&self) -> Range {
        self.src.range(self.value.span.clone())
    }

    /// Origin of a string value's decoded contents.
    pub fn content_origin(&self) -> TextOrigin {
        json_string_origin(&self.src, &self.value.span)
    }
}

impl NativeTemplate {
    pub fn range_of(&self, expr: &Expression) -> Range {
        self.src.range(self.origin.file_span(expr_span(expr).unwrap_or(0..0)))
    }
}

impl Expr {
    pub fn range(&self) -> Range {
        match self {
            Expr::Native(e) => e.range(),
            Expr::Json(e) => e.range(),
        }
    }

    /// Constant-fold the expression without any evaluation context.
    pub fn evaluate(&self) -> TofulintResult<Value> {
        match self {
            Expr::Native(e) => Ok(evaluate_native(&e.expr)),
            Expr::Json(e) => evaluate_json(e, &e.value),
        }
    }

    /// Interpret the expression as an object constructor and return its members.
    pub fn object_pairs(&self) -> TofulintResult<Vec<ObjectPair>> {
        match self {
            Expr::Native(e) => match unwrap_parens(&e.expr) {
                Expression::Object(object) => Ok(object
                    .iter()
                    .map(|(key, value)| {
                        let (key_expr, key_name) = match key {
                            ObjectKey::Ident(ident) => (
                                Expression::Variable(ident.clone()),
                                Some(ident.value().as_str().to_string()),
                            ),
                            ObjectKey::Expression(expr) => {
                                let name = match evaluate_native(expr) {
                                    Value::String(s) => Some(s),
                                    _ => None,
                                };
                                (expr.clone(), name)
                            }
                        };
                        ObjectPair {
                            key: Expr::Native(e.sub(&key_expr)),
                            key_name,
                            value: Expr::Native(e.sub(value.expr())),
                        }
                    })
                    .collect()),
                _ => Err(TofulintError::diagnostic(
                    &self.range(),
                    "Invalid expression",
                    "A static map expression is required.",
                )),
            },
            Expr::Json(e) => match &e.value.kind {
                JsonKind::Object(props) => Ok(props
                    .iter()
                    .map(|prop| ObjectPair {
                        key: Expr::Json(JsonExpr::new(
                            JsonValue {
                                kind: JsonKind::String(prop.name.clone()),
                                span: prop.name_span.clone(),
                            },
                            e.src.clone(),
                        )),
                        key_name: Some(prop.name.clone()),
                        value: Expr::Json(e.sub(&prop.value)),
                    })
                    .collect()),
                _ => Err(TofulintError::diagnostic(
                    &self.range(),
                    "Invalid expression",
                    "A static map expression is required.",
                )),
            },
        }
    }

    /// Whether this is a native quoted string or heredoc.
    pub fn is_native_quoted_string(&self) -> bool {
        matches!(
            self,
            Expr::Native(NativeExpr {
                expr: Expression::String(_)
                    | Expression::StringTemplate(_)
                    | Expression::HeredocTemplate(_),
                ..
            })
        )
    }

    /// Interpret the expression as an absolute traversal such as `aws.west` or `a.b[0]`.
    pub fn abs_traversal(&self) -> TofulintResult<AbsTraversal> {
        match self {
            Expr::Native(e) => native_abs_traversal(e, &e.expr),
            Expr::Json(e) => match &e.value.kind {
                JsonKind::String(text) => {
                    let native = reparse_expression(text, &e.src, e.content_origin())?;
                    native_abs_traversal(&native, &native.expr)
                }
                _ => Err(traversal_required(&self.range())),
            },
        }
    }
}

/// One member of an object constructor.
#[derive(Debug, Clone)]
pub struct ObjectPair {
    pub key: Expr,
    /// The key's static name, when it has one.
    pub key_name: Option<String>,
    pub value: Expr,
}

/// Byte span of an expression node.
///
/// Operators built inside the expression parser loop carry no span of their
/// own, so those are rebuilt from their outermost parts.
pub fn expr_span(expr: &Expression) -> Option<ops::Range<usize>> {
    if let Some(span) = expr.span() {
        return Some(span);
    }

    let join = |a: Option<ops::Range<usize>>, b: Option<ops::Range<usize>>| match (a, b) {
        (Some(a), Some(b)) => Some(a.start..b.end),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    match expr {
        Expression::Traversal(t) => join(
            expr_span(&t.expr),
            t.operators.last().and_then(|op| op.span()),
        ),
        Expression::BinaryOp(op) => join(expr_span(&op.lhs_expr), expr_span(&op.rhs_expr)),
        Expression::Conditional(c) => join(expr_span(&c.cond_expr), expr_span(&c.false_expr)),
        Expression::UnaryOp(op) => join(op.operator.span(), expr_span(&op.expr)),
        _ => None,
    }
}

fn unwrap_parens(expr: &Expression) -> &Expression {
    match expr {
        Expression::Parenthesis(p) => unwrap_parens(p.inner()),
        other => other,
    }
}

/// Origin of the decoded contents of the JSON string at `span`, quotes included.
pub fn json_string_origin(src: &SourceMap, span: &ops::Range<usize>) -> TextOrigin {
    let start = span.start + 1;
    let raw = src.source().get(start..span.end.saturating_sub(1)).unwrap_or_default();
    TextOrigin::json_string(raw, start)
}

/// Re-parse the contents of a JSON string as a native template.
pub fn reparse_template(
    text: &str,
    src: &Arc<SourceMap>,
    origin: TextOrigin,
) -> TofulintResult<NativeTemplate> {
    let template = hcl_edit::parser::parse_template(text)
        .map_err(|e| reparse_error(src, &origin, e))?;
    Ok(NativeTemplate {
        template,
        src: src.clone(),
        origin,
    })
}

/// Re-parse text as a single native expression.
pub fn reparse_expression(
    text: &str,
    src: &Arc<SourceMap>,
    origin: TextOrigin,
) -> TofulintResult<NativeExpr> {
    let expr =
        hcl_edit::parser::parse_expr(text).map_err(|e| reparse_error(src, &origin, e))?;
    Ok(NativeExpr::new(expr, src.clone(), origin))
}

fn reparse_error(src: &SourceMap, origin: &TextOrigin, e: hcl_edit::parser::Error) -> TofulintError {
    let pos = src.pos(origin.file_offset(e.location().offset()));
    TofulintError::parse(src.filename(), pos.line, pos.column, e.message())
}

/// Text of a template made only of literal parts.
pub fn template_literal(template: &Template) -> Option<String> {
    let mut out = String::new();
    for element in template.iter() {
        match element {
            Element::Literal(lit) => out.push_str(lit.value()),
            _ => return None,
        }
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Constant values
// ---------------------------------------------------------------------------

/// A statically known value, or `Unknown` when evaluation would need context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Unknown,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?} = {v}")?;
                }
                write!(f, "}}")
            }
            Value::Unknown => write!(f, "(unknown)"),
        }
    }
}

fn evaluate_native(expr: &Expression) -> Value {
    match expr {
        Expression::Null(_) => Value::Null,
        Expression::Bool(b) => Value::Bool(*b.value()),
        Expression::Number(n) => Value::Number(n.value().to_string()),
        Expression::String(s) => Value::String(s.value().clone()),
        Expression::StringTemplate(t) => {
            template_literal(t).map_or(Value::Unknown, Value::String)
        }
        Expression::HeredocTemplate(h) => {
            template_literal(&h.template).map_or(Value::Unknown, Value::String)
        }
        Expression::Array(items) => Value::List(items.iter().map(evaluate_native).collect()),
        Expression::Object(object) => {
            let mut map = BTreeMap::new();
            for (key, value) in object.iter() {
                let key = match key {
                    ObjectKey::Ident(ident) => ident.value().as_str().to_string(),
                    ObjectKey::Expression(expr) => match evaluate_native(expr) {
                        Value::String(s) => s,
                        _ => return Value::Unknown,
                    },
                };
                map.insert(key, evaluate_native(value.expr()));
            }
            Value::Map(map)
        }
        Expression::Parenthesis(p) => evaluate_native(p.inner()),
        _ => Value::Unknown,
    }
}

fn evaluate_json(owner: &JsonExpr, value: &JsonValue) -> TofulintResult<Value> {
    Ok(match &value.kind {
        JsonKind::Null => Value::Null,
        JsonKind::Bool(b) => Value::Bool(*b),
        JsonKind::Number(n) => Value::Number(n.clone()),
        JsonKind::String(s) => {
            if !s.contains("${") && !s.contains("%{") {
                Value::String(s.clone())
            } else {
                let origin = json_string_origin(&owner.src, &value.span);
                let template = reparse_template(s, &owner.src, origin)?;
                template_literal(&template.template).map_or(Value::Unknown, Value::String)
            }
        }
        JsonKind::Array(items) => Value::List(
            items
                .iter()
                .map(|item| evaluate_json(owner, item))
                .collect::<TofulintResult<_>>()?,
        ),
        JsonKind::Object(props) => {
            let mut map = BTreeMap::new();
            for prop in props {
                map.insert(prop.name.clone(), evaluate_json(owner, &prop.value)?);
            }
            Value::Map(map)
        }
    })
}

// ---------------------------------------------------------------------------
// Absolute traversals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Root(String),
    Attr(String),
    Index(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraversalStep {
    pub kind: StepKind,
    pub range: Range,
}

/// A static reference like `data.aws_ami.ubuntu` or `aws.west`.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsTraversal {
    pub steps: Vec<TraversalStep>,
    pub range: Range,
}

impl AbsTraversal {
    pub fn root_name(&self) -> Option<&str> {
        match self.steps.first().map(|s| &s.kind) {
            Some(StepKind::Root(name)) => Some(name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the attribute step at `index`.
    pub fn attr(&self, index: usize) -> Option<&str> {
        match self.steps.get(index).map(|s| &s.kind) {
            Some(StepKind::Attr(name)) => Some(name),
            _ => None,
        }
    }
}

fn traversal_required(range: &Range) -> TofulintError {
    TofulintError::diagnostic(
        range,
        "Invalid expression",
        "A single static variable reference is required: only attribute access and indexing with constant keys. No calculations, function calls, template expressions, etc are allowed here.",
    )
}

fn native_abs_traversal(owner: &NativeExpr, expr: &Expression) -> TofulintResult<AbsTraversal> {
    match expr {
        Expression::Variable(ident) => {
            let range = owner.range_of(expr);
            Ok(AbsTraversal {
                steps: vec![TraversalStep {
                    kind: StepKind::Root(ident.value().as_str().to_string()),
                    range: range.clone(),
                }],
                range,
            })
        }
        Expression::Traversal(t) => {
            let Expression::Variable(root) = &t.expr else {
                return Err(traversal_required(&owner.range_of(expr)));
            };

            let mut steps = vec![TraversalStep {
                kind: StepKind::Root(root.value().as_str().to_string()),
                range: owner.range_of(&t.expr),
            }];
            for op in &t.operators {
                let range = owner.range_of_span(op.span());
                let kind = match op.value() {
                    TraversalOperator::GetAttr(ident) => {
                        StepKind::Attr(ident.value().as_str().to_string())
                    }
                    TraversalOperator::Index(key) => match evaluate_native(key) {
                        v @ (Value::String(_) | Value::Number(_)) => StepKind::Index(v),
                        _ => return Err(traversal_required(&owner.range_of(expr))),
                    },
                    TraversalOperator::LegacyIndex(n) => {
                        StepKind::Index(Value::Number(n.value().to_string()))
                    }
                    TraversalOperator::AttrSplat(_) | TraversalOperator::FullSplat(_) => {
                        return Err(traversal_required(&owner.range_of(expr)))
                    }
                };
                steps.push(TraversalStep { kind, range });
            }

            Ok(AbsTraversal {
                steps,
                range: owner.range_of(expr),
            })
        }
        _ => Err(traversal_required(&owner.range_of(expr))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::json;

    fn native(src: &str) -> Expr {
        let map = Arc::new(SourceMap::new("main.tf", src));
        let expr = hcl_edit::parser::parse_expr(src).unwrap();
        Expr::Native(NativeExpr::new(expr, map, TextOrigin::default()))
    }

    fn json_expr(src: &str) -> Expr {
        let map = Arc::new(SourceMap::new("main.tf.json", src));
        let value = json::parse("main.tf.json", src).unwrap();
        Expr::Json(JsonExpr::new(value, map))
    }

    #[test]
    fn test_composite_traversal_range() {
        let expr = native("data.aws_ami.ubuntu.id");
        let range = expr.range();
        assert_eq!(range.start.byte, 0);
        assert_eq!(range.end.byte, 22);
    }

    #[test]
    fn test_binary_op_range() {
        let expr = native("var.a + var.b");
        assert_eq!(expr.range().bytes(), 0..13);
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(
            native(r#""hashicorp/aws""#).evaluate().unwrap(),
            Value::String("hashicorp/aws".to_string())
        );
        assert_eq!(native("true").evaluate().unwrap(), Value::Bool(true));
        assert_eq!(native("var.x").evaluate().unwrap(), Value::Unknown);
        assert_eq!(
            native(r#""${var.x}-suffix""#).evaluate().unwrap(),
            Value::Unknown
        );
    }

    #[test]
    fn test_evaluate_object() {
        let value = native(r#"{ source = "hashicorp/aws", version = "~> 5" }"#)
            .evaluate()
            .unwrap();
        match value {
            Value::Map(map) => {
                assert_eq!(map.get("source").and_then(Value::as_str), Some("hashicorp/aws"));
                assert_eq!(map.len(), 2);
            }
            other => panic!("expected map, got {}", other),
        }
    }

    #[test]
    fn test_evaluate_json_template_string() {
        assert_eq!(
            json_expr(r#""${var.x}""#).evaluate().unwrap(),
            Value::Unknown
        );
        assert_eq!(
            json_expr(r#""plain""#).evaluate().unwrap(),
            Value::String("plain".to_string())
        );
    }

    #[test]
    fn test_abs_traversal_native() {
        let t = native("aws.west").abs_traversal().unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.root_name(), Some("aws"));
        assert_eq!(t.attr(1), Some("west"));

        let t = native(r#"aws.west["k"]"#).abs_traversal().unwrap();
        assert_eq!(t.steps[2].kind, StepKind::Index(Value::String("k".into())));
    }

    #[test]
    fn test_abs_traversal_rejects_calls() {
        assert!(native("lookup(a, b)").abs_traversal().is_err());
        assert!(native("aws.west[*].id").abs_traversal().is_err());
    }

    #[test]
    fn test_abs_traversal_json_string() {
        let t = json_expr(r#""google.beta""#).abs_traversal().unwrap();
        assert_eq!(t.root_name(), Some("google"));
        // the root starts after the opening quote
        assert_eq!(t.range.start.byte, 1);
    }

    #[test]
    fn test_object_pairs_keys() {
        let pairs = native("{ aws.primary = aws.east, google = google }")
            .object_pairs()
            .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key_name, None);
        assert_eq!(pairs[1].key_name.as_deref(), Some("google"));
        assert_eq!(
            pairs[0].value.abs_traversal().unwrap().attr(1),
            Some("east")
        );
    }

    #[test]
    fn test_reparse_template_offsets() {
        let src = r#"{"a": "${var.x}"}"#;
        let map = Arc::new(SourceMap::new("main.tf.json", src));
        let template = reparse_template("${var.x}", &map, TextOrigin::at(7)).unwrap();
        let Some(Element::Interpolation(interp)) = template.template.iter().next() else {
            panic!("expected interpolation");
        };
        let range = template.range_of(&interp.expr);
        assert_eq!(&src[range.bytes()], "var.x");
    }
}
