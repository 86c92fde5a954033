//! Syntax access for native (`.tf`) and JSON (`.tf.json`) configuration files.
//!
//! ```text
//!   .tf  ──► hcl-edit ──┐
//!                       ├──► File ──► content(schema) ──► Body / Block / Attribute
//!   .tf.json ──► json ──┘                                        │
//!                                                                 ▼
//!                                                   Expr (Native | Json) ──► Value
//! ```

pub mod body;
pub mod expr;
pub mod json;
pub mod position;

pub use body::{
    is_config_filename, is_json_filename, Attribute, Block, BlockSchema, Body, BodySchema, File,
    SchemaMode,
};
pub use expr::{
    json_string_origin, reparse_expression, reparse_template, AbsTraversal, Expr, JsonExpr,
    NativeExpr, NativeTemplate, ObjectPair, StepKind, TraversalStep, Value,
};
pub use position::{Pos, Range, SourceMap, TextOrigin};
