//! Provider references: which providers a module needs, and under which alias.

use crate::declarations::decl_usage::extract_references;
use crate::error::{TofulintError, TofulintResult};
use crate::module::Module;
use crate::syntax::{
    reparse_expression, AbsTraversal, Block, BlockSchema, BodySchema, Expr, JsonExpr, NativeExpr, Range,
    StepKind, TextOrigin, Value,
};
use hcl_edit::expr::{Expression, TraversalOperator};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

/// "Some configuration needs provider `name`".
#[derive(Debug, Clone)]
pub struct ProviderRef {
    pub name: String,
    pub alias: Option<String>,
    /// Instance key of `name.alias[key]`.
    pub key_expr: Option<Expr>,
    pub def_range: Range,
}

impl ProviderRef {
    fn implied(name: &str, def_range: &Range) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            key_expr: None,
            def_range: def_range.clone(),
        }
    }
}

/// Provider references by local name; a later reference replaces an earlier one.
pub type ProviderRefs = BTreeMap<String, ProviderRef>;

const INVALID_REF: &str = "Invalid provider configuration reference";

/// The provider implied by a resource type: the part before the first underscore.
pub fn implied_provider(resource_type: &str) -> &str {
    resource_type
        .split_once('_')
        .map_or(resource_type, |(prefix, _)| prefix)
}

fn provider_part_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: This regex pattern is hardcoded and covered by tests.
    REGEX.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{N}]([\p{L}\p{N}-]*[\p{L}\p{N}])?$")
            .expect("Hardcoded regex pattern is valid")
    })
}

/// Normalize one part of a provider address (a local name or type).
pub fn parse_provider_part(given: &str) -> Result<String, String> {
    if given.is_empty() {
        return Err("must have at least one character".to_string());
    }
    if given.contains('.') {
        return Err("dots are not allowed".to_string());
    }
    if given.contains("--") {
        return Err("cannot use multiple consecutive dashes".to_string());
    }
    if !provider_part_regex().is_match(given) {
        return Err(
            "must contain only letters, digits, and dashes, and may not use leading or trailing dashes"
                .to_string(),
        );
    }
    Ok(given.to_lowercase())
}

fn check_provider_name_normalized(name: &str, range: &Range) -> TofulintResult<()> {
    match parse_provider_part(name) {
        Err(reason) => Err(TofulintError::diagnostic(
            range,
            "Invalid provider local name",
            format!("{name} is an invalid provider local name: {reason}"),
        )),
        Ok(normalized) if normalized != name => Err(TofulintError::diagnostic(
            range,
            "Invalid provider local name",
            format!(
                "Provider names must be normalized. Replace {name:?} with {normalized:?} to fix this error."
            ),
        )),
        Ok(_) => Ok(()),
    }
}

/// Re-lex a single-literal quoted string (or a wrapped object key) as a traversal.
///
/// Returns `None` when the expression is not a literal string or does not lex.
fn shim_traversal_in_string(expr: &NativeExpr) -> Option<NativeExpr> {
    let text = match &expr.expr {
        Expression::String(s) => s.value().clone(),
        Expression::StringTemplate(t) => crate::syntax::expr::template_literal(t)?,
        _ => return None,
    };
    let origin = TextOrigin::at(expr.range().start.byte + 1);
    match reparse_expression(&text, &expr.src, origin) {
        Ok(native) if matches!(native.expr, Expression::Variable(_) | Expression::Traversal(_)) => {
            Some(native)
        }
        _ => None,
    }
}

/// Split a trailing non-constant index `E[K]` into `E` and `K`.
fn split_dynamic_index(expr: &NativeExpr) -> Option<(NativeExpr, NativeExpr)> {
    let Expression::Traversal(t) = &expr.expr else {
        return None;
    };
    let (last, rest) = t.operators.split_last()?;
    let TraversalOperator::Index(key) = last.value() else {
        return None;
    };
    if matches!(
        Expr::Native(expr.sub(key)).evaluate(),
        Ok(Value::String(_) | Value::Number(_))
    ) {
        return None;
    }

    let collection = if rest.is_empty() {
        t.expr.clone()
    } else {
        Expression::Traversal(Box::new(hcl_edit::expr::Traversal::new(
            t.expr.clone(),
            rest.to_vec(),
        )))
    };
    Some((expr.sub(&collection), expr.sub(key)))
}

/// Decode `name[.alias[[key]]]` from a `provider` argument or a `providers` map value.
pub fn decode_provider_ref(expr: &Expr, def_range: &Range) -> TofulintResult<ProviderRef> {
    let mut native = match expr {
        Expr::Native(n) => n.clone(),
        Expr::Json(j) => convert_json_expression(j)?,
    };

    let mut key_expr = None;
    let mut max_len = 3;
    if let Some((collection, key)) = split_dynamic_index(&native) {
        max_len = 2;
        key_expr = Some(Expr::Native(key));
        native = collection;
    }

    let shimmed = shim_traversal_in_string(&native);
    let subject = shimmed.as_ref().unwrap_or(&native);
    let expr_range = native.range();

    let traversal: Option<AbsTraversal> = Expr::Native(subject.clone()).abs_traversal().ok();
    let traversal = match traversal {
        Some(t) if !t.is_empty() && t.len() <= max_len => t,
        _ => {
            let quoted = shimmed.is_none() && Expr::Native(native.clone()).is_native_quoted_string();
            let detail = if quoted {
                "A provider configuration reference must not be given in quotes."
            } else {
                "The provider argument requires a provider type name, optionally followed by a period and then a configuration alias and optional instance key."
            };
            return Err(TofulintError::diagnostic(&expr_range, INVALID_REF, detail));
        }
    };

    let name = traversal.root_name().unwrap_or_default().to_string();
    check_provider_name_normalized(&name, &traversal.steps[0].range)?;

    let mut provider_ref = ProviderRef {
        name,
        alias: None,
        key_expr,
        def_range: def_range.clone(),
    };

    if let Some(step) = traversal.steps.get(1) {
        let StepKind::Attr(alias) = &step.kind else {
            return Err(TofulintError::diagnostic(
                &step.range,
                INVALID_REF,
                "Provider name must either stand alone or be followed by a period and then a configuration alias.",
            ));
        };
        provider_ref.alias = Some(alias.clone());
    }

    if let Some(step) = traversal.steps.get(2) {
        let StepKind::Index(_) = &step.kind else {
            return Err(TofulintError::diagnostic(
                &step.range,
                INVALID_REF,
                "Provider name must either stand alone or be followed by a period and then a configuration alias.",
            ));
        };
        let Expression::Traversal(t) = &subject.expr else {
            return Err(TofulintError::internal("indexed provider reference without traversal"));
        };
        let key = match t.operators.get(1).map(|op| op.value()) {
            Some(TraversalOperator::Index(key)) => key.clone(),
            Some(TraversalOperator::LegacyIndex(n)) => Expression::from(*n.value()),
            _ => return Err(TofulintError::internal("indexed provider reference without index")),
        };
        provider_ref.key_expr = Some(Expr::Native(subject.sub(&key)));
    }

    if provider_ref.alias.is_none() && provider_ref.key_expr.is_some() {
        return Err(TofulintError::diagnostic(
            &traversal.range,
            INVALID_REF,
            "Provider assignment requires an alias when specifying an instance key, in the form of provider.name[instance_key]",
        ));
    }

    Ok(provider_ref)
}

/// Turn a JSON string into the native expression it spells.
fn convert_json_expression(expr: &JsonExpr) -> TofulintResult<NativeExpr> {
    match Expr::Json(expr.clone()).evaluate()? {
        Value::String(text) => reparse_expression(&text, &expr.src, expr.content_origin()),
        other => Err(TofulintError::diagnostic(
            &expr.range(),
            "Expected string expression",
            format!("This value must be a string, but got {}.", other.type_name()),
        )),
    }
}

fn provider_refs_schema() -> BodySchema {
    let with_provider = || BodySchema::new().attribute("provider");
    BodySchema::new()
        .block(BlockSchema::new("resource", &["type", "name"]).body(with_provider()))
        .block(BlockSchema::new("ephemeral", &["type", "name"]).body(with_provider()))
        .block(BlockSchema::new("data", &["type", "name"]).body(with_provider()))
        .block(BlockSchema::new("provider", &["name"]))
        .block(BlockSchema::new("module", &["name"]).body(BodySchema::new().attribute("providers")))
        .block(
            BlockSchema::new("check", &["name"]).body(
                BodySchema::new()
                    .block(BlockSchema::new("data", &["type", "name"]).body(with_provider())),
            ),
        )
}

/// Reference from a resource-like block: its `provider` argument or the type's prefix.
fn add_block_ref(refs: &mut ProviderRefs, block: &Block) -> TofulintResult<()> {
    if let Some(attr) = block.body.attribute("provider") {
        let provider_ref = decode_provider_ref(&attr.expr, &block.def_range)?;
        refs.insert(provider_ref.name.clone(), provider_ref);
    } else {
        let name = implied_provider(&block.labels[0]);
        refs.insert(name.to_string(), ProviderRef::implied(name, &block.def_range));
    }
    Ok(())
}

/// Every provider the module refers to.
///
/// Sources, in order: resource/ephemeral/data blocks, provider blocks,
/// module `providers` maps, check-scoped data blocks and `provider::P::fn` calls.
pub fn get_provider_refs(module: &Module) -> TofulintResult<ProviderRefs> {
    let content = module.content(&provider_refs_schema())?;
    let mut refs = ProviderRefs::new();

    // later kinds take precedence over earlier ones
    let passes: [&[&str]; 4] = [&["resource", "ephemeral", "data"], &["provider"], &["module"], &["check"]];
    for pass in passes {
        for block in content.blocks.iter().filter(|b| pass.contains(&b.ty.as_str())) {
            match block.ty.as_str() {
                "resource" | "ephemeral" | "data" => add_block_ref(&mut refs, block)?,
                "provider" => {
                    let name = &block.labels[0];
                    refs.insert(name.clone(), ProviderRef::implied(name, &block.def_range));
                }
                "module" => {
                    if let Some(attr) = block.body.attribute("providers") {
                        for pair in attr.expr.object_pairs()? {
                            let provider_ref = decode_provider_ref(&pair.value, &block.def_range)?;
                            refs.insert(provider_ref.name.clone(), provider_ref);
                        }
                    }
                }
                "check" => {
                    for data in &block.body.blocks {
                        add_block_ref(&mut refs, data)?;
                    }
                }
                other => debug!(block = other, "unexpected block in provider schema"),
            }
        }
    }

    module.walk_expressions(|expr| {
        for call in extract_references(expr).provider_functions {
            refs.insert(call.provider.clone(), ProviderRef::implied(&call.provider, &call.range));
        }
    });

    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModulePath;
    use crate::syntax::{File, SourceMap};

    fn provider_attr(src: &str) -> (Expr, Range) {
        let file = File::parse("main.tf", src).unwrap();
        let body = file
            .content(&BodySchema::new().block(
                BlockSchema::new("resource", &["type", "name"])
                    .body(BodySchema::new().attribute("provider")),
            ))
            .unwrap();
        let block = &body.blocks[0];
        (
            block.body.attribute("provider").unwrap().expr.clone(),
            block.def_range.clone(),
        )
    }

    #[test]
    fn test_decode_bare_name() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = google\n}\n");
        let r = decode_provider_ref(&expr, &def).unwrap();
        assert_eq!(r.name, "google");
        assert!(r.alias.is_none());
    }

    #[test]
    fn test_decode_alias() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = aws.west\n}\n");
        let r = decode_provider_ref(&expr, &def).unwrap();
        assert_eq!(r.name, "aws");
        assert_eq!(r.alias.as_deref(), Some("west"));
    }

    #[test]
    fn test_decode_alias_with_key() {
        let (expr, def) =
            provider_attr("resource \"a\" \"b\" {\n  provider = aws.west[\"k\"]\n}\n");
        let r = decode_provider_ref(&expr, &def).unwrap();
        assert_eq!(r.alias.as_deref(), Some("west"));
        assert!(r.key_expr.is_some());

        let (expr, def) =
            provider_attr("resource \"a\" \"b\" {\n  provider = aws.west[each.key]\n}\n");
        let r = decode_provider_ref(&expr, &def).unwrap();
        assert_eq!(r.alias.as_deref(), Some("west"));
        assert!(r.key_expr.is_some());
    }

    #[test]
    fn test_decode_quoted_string_is_shimmed() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = \"google-beta\"\n}\n");
        let r = decode_provider_ref(&expr, &def).unwrap();
        assert_eq!(r.name, "google-beta");
    }

    #[test]
    fn test_decode_quoted_template_is_rejected() {
        let (expr, def) =
            provider_attr("resource \"a\" \"b\" {\n  provider = \"${var.name}\"\n}\n");
        let err = decode_provider_ref(&expr, &def).unwrap_err();
        assert!(err.to_string().contains("must not be given in quotes"));
    }

    #[test]
    fn test_decode_too_long() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = a.b.c.d\n}\n");
        let err = decode_provider_ref(&expr, &def).unwrap_err();
        assert!(err.to_string().contains("requires a provider type name"));
    }

    #[test]
    fn test_decode_not_normalized() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = Google\n}\n");
        let err = decode_provider_ref(&expr, &def).unwrap_err();
        assert!(err.to_string().contains("Replace \"Google\" with \"google\""));
    }

    #[test]
    fn test_decode_key_without_alias() {
        let (expr, def) = provider_attr("resource \"a\" \"b\" {\n  provider = aws[0]\n}\n");
        assert!(decode_provider_ref(&expr, &def).is_err());
    }

    #[test]
    fn test_decode_json_string() {
        let src = r#"{"resource": {"a": {"b": {"provider": "aws.west"}}}}"#;
        let map = std::sync::Arc::new(SourceMap::new("main.tf.json", src));
        let value = crate::syntax::json::parse("main.tf.json", src).unwrap();
        let props = value.as_object().unwrap();
        let provider = props[0].value.as_object().unwrap()[0].value.as_object().unwrap()[0]
            .value
            .as_object()
            .unwrap()[0]
            .value
            .clone();
        let expr = Expr::Json(JsonExpr::new(provider, map.clone()));
        let r = decode_provider_ref(&expr, &map.range(0..1)).unwrap();
        assert_eq!(r.name, "aws");
        assert_eq!(r.alias.as_deref(), Some("west"));
    }

    #[test]
    fn test_decode_json_non_string() {
        let src = r#"{"provider": 1}"#;
        let map = std::sync::Arc::new(SourceMap::new("main.tf.json", src));
        let value = crate::syntax::json::parse("main.tf.json", src).unwrap();
        let one = value.as_object().unwrap()[0].value.clone();
        let err = decode_provider_ref(&Expr::Json(JsonExpr::new(one, map.clone())), &map.range(0..1))
            .unwrap_err();
        assert!(err.to_string().contains("Expected string expression"));
    }

    #[test]
    fn test_parse_provider_part() {
        assert_eq!(parse_provider_part("aws").unwrap(), "aws");
        assert_eq!(parse_provider_part("AWS").unwrap(), "aws");
        assert_eq!(parse_provider_part("google-beta").unwrap(), "google-beta");
        assert!(parse_provider_part("").is_err());
        assert!(parse_provider_part("-aws").is_err());
        assert!(parse_provider_part("a--b").is_err());
        assert!(parse_provider_part("google_beta").is_err());
    }

    #[test]
    fn test_implied_provider() {
        assert_eq!(implied_provider("aws_instance"), "aws");
        assert_eq!(implied_provider("google_compute_instance"), "google");
        assert_eq!(implied_provider("null"), "null");
    }

    #[test]
    fn test_get_provider_refs_sources() {
        let module = Module::from_sources(
            ModulePath::root(),
            [(
                "main.tf",
                r#"
resource "aws_instance" "web" {}
data "template_file" "t" {
  provider = template.alt
}
provider "google" {}
module "m" {
  source    = "./m"
  providers = {
    azurerm = azurerm.primary
  }
}
check "health" {
  data "http_request" "ping" {}
}
output "t" {
  value = provider::time::rfc3339_parse("2023-07-25T23:43:16Z")
}
"#,
            )],
        )
        .unwrap();

        let refs = get_provider_refs(&module).unwrap();
        let names: Vec<_> = refs.keys().cloned().collect();
        assert_eq!(
            names,
            vec!["aws", "azurerm", "google", "http", "template", "time"]
        );
        assert_eq!(refs["template"].alias.as_deref(), Some("alt"));
        assert_eq!(refs["time"].def_range.start.column, 11);
    }
}
