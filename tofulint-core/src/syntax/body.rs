//! Parsed files and schema-driven content extraction.
//!
//! A [`BodySchema`] names the attributes and blocks a caller cares about.
//! Content extraction returns only those, for either syntax, and rejects
//! blocks whose label count does not match the schema.

use super::expr::{Expr, JsonExpr, NativeExpr};
use super::json::{self, JsonKind, JsonValue};
use super::position::{Range, SourceMap, TextOrigin};
use crate::error::{TofulintError, TofulintResult};
use hcl_edit::structure::{self as hcl, Structure};
use hcl_edit::Span;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// Only the named attributes and blocks are extracted.
    #[default]
    Partial,
    /// Every attribute is extracted; blocks are an error.
    JustAttributes,
}

#[derive(Debug, Clone, Default)]
pub struct BodySchema {
    pub mode: SchemaMode,
    pub attributes: Vec<String>,
    pub blocks: Vec<BlockSchema>,
}

#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub ty: String,
    pub label_names: Vec<String>,
    pub body: BodySchema,
}

impl BodySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn just_attributes() -> Self {
        Self {
            mode: SchemaMode::JustAttributes,
            ..Self::default()
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attributes.push(name.to_string());
        self
    }

    pub fn block(mut self, block: BlockSchema) -> Self {
        self.blocks.push(block);
        self
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    fn find_block(&self, ty: &str) -> Option<&BlockSchema> {
        self.blocks.iter().find(|b| b.ty == ty)
    }
}

impl BlockSchema {
    pub fn new(ty: &str, label_names: &[&str]) -> Self {
        Self {
            ty: ty.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            body: BodySchema::default(),
        }
    }

    pub fn body(mut self, body: BodySchema) -> Self {
        self.body = body;
        self
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub expr: Expr,
    /// From the start of the name to the end of the expression.
    pub range: Range,
    pub name_range: Range,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub ty: String,
    pub labels: Vec<String>,
    pub label_ranges: Vec<Range>,
    /// Block header: type through the last label, or the JSON body's opening brace.
    pub def_range: Range,
    /// The whole block through its closing brace.
    pub range: Range,
    pub body: Body,
}

#[derive(Debug, Clone, Default)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn blocks_of<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.ty == ty)
    }

    pub fn merge(&mut self, other: Body) {
        self.attributes.extend(other.attributes);
        self.blocks.extend(other.blocks);
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum FileBody {
    Native(hcl::Body),
    Json(JsonValue),
}

/// One parsed configuration file.
#[derive(Debug, Clone)]
pub struct File {
    src: Arc<SourceMap>,
    body: FileBody,
}

pub fn is_json_filename(name: &str) -> bool {
    name.ends_with(".tf.json")
}

pub fn is_config_filename(name: &str) -> bool {
    name.ends_with(".tf") || is_json_filename(name)
}

impl File {
    /// Parse a file; the syntax is chosen by its name.
    pub fn parse(name: &str, source: &str) -> TofulintResult<File> {
        let body = if is_json_filename(name) {
            FileBody::Json(json::parse(name, source)?)
        } else {
            FileBody::Native(hcl_edit::parser::parse_body(source).map_err(|e| {
                TofulintError::parse(
                    name,
                    e.location().line(),
                    e.location().column(),
                    e.message(),
                )
            })?)
        };

        Ok(File {
            src: Arc::new(SourceMap::new(name, source)),
            body,
        })
    }

    pub fn name(&self) -> &str {
        self.src.filename()
    }

    pub fn source(&self) -> &str {
        self.src.source()
    }

    pub fn source_map(&self) -> &Arc<SourceMap> {
        &self.src
    }

    /// Extract the content a schema asks for.
    pub fn content(&self, schema: &BodySchema) -> TofulintResult<Body> {
        match &self.body {
            FileBody::Native(body) => native_content(&self.src, body, schema),
            FileBody::Json(value) => json_content(&self.src, value, schema),
        }
    }

    /// Call `f` once for every attribute expression in every body of the file.
    ///
    /// JSON files have no attribute/block distinction without a schema, so each
    /// top-level property value is one expression.
    pub fn walk_expressions<F: FnMut(&Expr)>(&self, f: &mut F) {
        match &self.body {
            FileBody::Native(body) => walk_native_body(&self.src, body, f),
            FileBody::Json(value) => {
                if let Some(props) = value.as_object() {
                    for prop in props {
                        f(&Expr::Json(JsonExpr::new(prop.value.clone(), self.src.clone())));
                    }
                }
            }
        }
    }
}

fn walk_native_body<F: FnMut(&Expr)>(src: &Arc<SourceMap>, body: &hcl::Body, f: &mut F) {
    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => {
                f(&Expr::Native(NativeExpr::new(attr.value.clone(), src.clone(), TextOrigin::default())));
            }
            Structure::Block(block) => walk_native_body(src, &block.body, f),
        }
    }
}

fn span_range(src: &SourceMap, span: Option<std::ops::Range<usize>>) -> Range {
    src.range(span.unwrap_or(0..0))
}

fn label_count_error(range: &Range, ty: &str, schema: &BlockSchema, got: usize) -> TofulintError {
    let want = schema.label_names.len();
    if got > want {
        TofulintError::diagnostic(
            range,
            format!("Extraneous label for {ty}"),
            format!(
                "Only {want} labels ({}) are expected for {ty} blocks.",
                schema.label_names.join(", ")
            ),
        )
    } else {
        let missing = schema.label_names.get(got).map_or("label", String::as_str);
        TofulintError::diagnostic(
            range,
            format!("Missing {missing} for {ty}"),
            format!(
                "All {ty} blocks must have {want} labels ({}).",
                schema.label_names.join(", ")
            ),
        )
    }
}

fn native_content(
    src: &Arc<SourceMap>,
    body: &hcl::Body,
    schema: &BodySchema,
) -> TofulintResult<Body> {
    let mut content = Body::default();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => {
                let name = attr.key.value().as_str();
                if schema.mode == SchemaMode::JustAttributes || schema.has_attribute(name) {
                    content.attributes.push(Attribute {
                        name: name.to_string(),
                        expr: Expr::Native(NativeExpr::new(attr.value.clone(), src.clone(), TextOrigin::default())),
                        range: span_range(src, attr.span()),
                        name_range: span_range(src, attr.key.span()),
                    });
                }
            }
            Structure::Block(block) => {
                let ty = block.ident.value().as_str();
                let ident_range = span_range(src, block.ident.span());
                if schema.mode == SchemaMode::JustAttributes {
                    return Err(TofulintError::diagnostic(
                        &ident_range,
                        format!("Unexpected \"{ty}\" block"),
                        "Blocks are not allowed here.",
                    ));
                }
                let Some(block_schema) = schema.find_block(ty) else {
                    continue;
                };

                let label_ranges: Vec<Range> = block
                    .labels
                    .iter()
                    .map(|l| span_range(src, l.span()))
                    .collect();
                let header_end = label_ranges
                    .last()
                    .map_or(ident_range.end.byte, |r| r.end.byte);

                if block.labels.len() != block_schema.label_names.len() {
                    let range = src.range(ident_range.start.byte..header_end);
                    return Err(label_count_error(&range, ty, block_schema, block.labels.len()));
                }

                content.blocks.push(Block {
                    ty: ty.to_string(),
                    labels: block.labels.iter().map(|l| l.as_str().to_string()).collect(),
                    label_ranges,
                    def_range: src.range(ident_range.start.byte..header_end),
                    range: span_range(src, block.span()),
                    body: native_content(src, &block.body, &block_schema.body)?,
                });
            }
        }
    }

    Ok(content)
}

fn json_content(
    src: &Arc<SourceMap>,
    value: &JsonValue,
    schema: &BodySchema,
) -> TofulintResult<Body> {
    let JsonKind::Object(props) = &value.kind else {
        return Err(TofulintError::diagnostic(
            &src.range(value.span.clone()),
            "Incorrect JSON value type",
            "A JSON object is required here, to define arguments and child blocks.",
        ));
    };

    let mut content = Body::default();
    for prop in props {
        // "//" keys are comments
        if prop.name == "//" {
            continue;
        }

        let is_attribute = schema.mode == SchemaMode::JustAttributes
            || (schema.find_block(&prop.name).is_none() && schema.has_attribute(&prop.name));

        if is_attribute {
            if content.attribute(&prop.name).is_some() {
                return Err(TofulintError::diagnostic(
                    &src.range(prop.name_span.clone()),
                    "Duplicate argument",
                    format!("The argument \"{}\" was already set.", prop.name),
                ));
            }
            content.attributes.push(Attribute {
                name: prop.name.clone(),
                expr: Expr::Json(JsonExpr::new(prop.value.clone(), src.clone())),
                range: src.range(prop.name_span.start..prop.value.span.end),
                name_range: src.range(prop.name_span.clone()),
            });
        } else if let Some(block_schema) = schema.find_block(&prop.name) {
            let mut labels = Vec::new();
            json_blocks(
                src,
                &prop.value,
                block_schema,
                prop.name_span.start,
                &mut labels,
                &mut content.blocks,
            )?;
        }
    }

    Ok(content)
}

/// Decode the value under a block-type key, consuming one nested object level per label.
fn json_blocks(
    src: &Arc<SourceMap>,
    value: &JsonValue,
    schema: &BlockSchema,
    start: usize,
    labels: &mut Vec<(String, Range)>,
    out: &mut Vec<Block>,
) -> TofulintResult<()> {
    if let JsonKind::Array(items) = &value.kind {
        for item in items {
            json_blocks(src, item, schema, start, labels, out)?;
        }
        return Ok(());
    }

    let JsonKind::Object(props) = &value.kind else {
        return Err(TofulintError::diagnostic(
            &src.range(value.span.clone()),
            "Incorrect JSON value type",
            format!("A JSON object is required here, to define a {} block.", schema.ty),
        ));
    };

    if labels.len() == schema.label_names.len() {
        out.push(Block {
            ty: schema.ty.clone(),
            labels: labels.iter().map(|(l, _)| l.clone()).collect(),
            label_ranges: labels.iter().map(|(_, r)| r.clone()).collect(),
            def_range: src.range(value.span.start..value.span.start + 1),
            range: src.range(start..value.span.end),
            body: json_content(src, value, &schema.body)?,
        });
        return Ok(());
    }

    if props.is_empty() {
        let range = src.range(value.span.clone());
        return Err(label_count_error(&range, &schema.ty, schema, labels.len()));
    }

    for prop in props {
        labels.push((prop.name.clone(), src.range(prop.name_span.clone())));
        let result = json_blocks(src, &prop.value, schema, start, labels, out);
        labels.pop();
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> BodySchema {
        BodySchema::new()
            .attribute("top")
            .block(
                BlockSchema::new("variable", &["name"]).body(
                    BodySchema::new()
                        .attribute("default")
                        .block(BlockSchema::new("validation", &[]).body(
                            BodySchema::new().attribute("condition").attribute("error_message"),
                        )),
                ),
            )
            .block(BlockSchema::new("data", &["type", "name"]))
    }

    #[test]
    fn test_native_content_ranges() {
        let src = "\nvariable \"not_used\" {}\n";
        let file = File::parse("config.tf", src).unwrap();
        let body = file.content(&schema()).unwrap();
        assert_eq!(body.blocks.len(), 1);

        let block = &body.blocks[0];
        assert_eq!(block.labels, vec!["not_used"]);
        assert_eq!(block.def_range.to_string(), "config.tf:2,1-20");
        assert_eq!(&src[block.range.bytes()], "variable \"not_used\" {}");
    }

    #[test]
    fn test_native_content_nested_blocks() {
        let src = r#"
variable "x" {
  default = 1
  validation {
    condition     = var.x > 0
    error_message = "positive"
  }
}
"#;
        let file = File::parse("main.tf", src).unwrap();
        let body = file.content(&schema()).unwrap();
        let var = &body.blocks[0];
        assert!(var.body.attribute("default").is_some());
        let validation = var.body.blocks_of("validation").next().unwrap();
        let condition = validation.body.attribute("condition").unwrap();
        assert_eq!(&src[condition.expr.range().bytes()], "var.x > 0");
    }

    #[test]
    fn test_label_count_mismatch_is_error() {
        let file = File::parse("main.tf", "data \"aws_ami\" {}\n").unwrap();
        let err = file.content(&schema()).unwrap_err();
        assert!(err.to_string().contains("Missing name for data"));
    }

    #[test]
    fn test_unknown_blocks_are_skipped() {
        let file = File::parse("main.tf", "resource \"a\" \"b\" {}\n").unwrap();
        let body = file.content(&schema()).unwrap();
        assert!(body.blocks.is_empty());
    }

    #[test]
    fn test_just_attributes_rejects_blocks() {
        let file = File::parse("main.tf", "x = 1\ninner {}\n").unwrap();
        assert!(file.content(&BodySchema::just_attributes()).is_err());
    }

    #[test]
    fn test_json_content_labels() {
        let src = r#"{
  "variable": {
    "again": {}
  },
  "data": {"aws_ami": {"ubuntu": {}}}
}"#;
        let file = File::parse("config.tf.json", src).unwrap();
        let body = file.content(&schema()).unwrap();
        assert_eq!(body.blocks.len(), 2);

        let var = &body.blocks[0];
        assert_eq!(var.labels, vec!["again"]);
        assert_eq!(var.def_range.to_string(), "config.tf.json:3,14-15");

        let data = &body.blocks[1];
        assert_eq!(data.labels, vec!["aws_ami", "ubuntu"]);
    }

    #[test]
    fn test_json_skips_comment_keys() {
        let src = r#"{"//": "note", "top": "x"}"#;
        let file = File::parse("main.tf.json", src).unwrap();
        let body = file.content(&schema()).unwrap();
        assert_eq!(body.attributes.len(), 1);
        assert_eq!(body.attributes[0].name, "top");
    }

    #[test]
    fn test_walk_expressions_native_nested() {
        let src = "locals {\n  a = 1\n}\nresource \"x\" \"y\" {\n  b = 2\n  nested {\n    c = 3\n  }\n}\n";
        let file = File::parse("main.tf", src).unwrap();
        let mut count = 0;
        file.walk_expressions(&mut |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_parse_error() {
        let err = File::parse("main.tf", "variable \"x\" {\n").unwrap_err();
        assert!(matches!(err, TofulintError::Parse { .. }));
    }
}
