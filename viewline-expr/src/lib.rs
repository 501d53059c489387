//! The viewline expression language.
//!
//! Controllers describe their pipelines with a small expression
//! language over semi-structured documents. Surface syntax is plain
//! JSON/YAML: scalars are literals, sequences are lists, mappings are
//! either operator calls (single `@`-key) or dict literals whose keys
//! may be JSONPath setters. Parsing elaborates this into the canonical
//! [`Expression`] tree; [`Expression::evaluate`] runs it against an
//! [`EvalCtx`].
//!
//! ```
//! use serde_json::json;
//! use viewline_expr::{EvalCtx, Expression};
//!
//! let exp: Expression = serde_json::from_str(r#"{"@eq": [{"@len": ["$.spec.x"]}, 3]}"#).unwrap();
//! let obj = json!({"spec": {"x": [1, 2, 3]}});
//! let res = exp.evaluate(&EvalCtx::new(&obj)).unwrap();
//! assert_eq!(res, json!(true));
//! ```

#![warn(clippy::all)]

pub mod eval;
pub mod expression;
pub mod path;
pub mod selector;

pub use eval::EvalCtx;
pub use expression::{Expression, Literal};
pub use path::Path;
pub use selector::Selector;
