//! Viewline core library.
//!
//! Foundational types for the viewline controller runtime: the
//! semi-structured document model, the object/identity model, change
//! deltas, and the keyed view stores that back incremental pipeline
//! evaluation.
//!
//! # Overview
//!
//! Viewline controllers translate deltas observed on *source* objects
//! into deltas on *target* view objects. Everything the pipeline layer
//! touches is expressed with the types in this crate:
//!
//! - [`Object`]: an unstructured document with a group/version/kind and
//!   a `namespace/name` identity
//! - [`Delta`]: a typed change event carrying one object
//! - [`Store`]: the per-kind shadow state of the last observed objects
//! - [`Error`]: the categorized error surface shared by all crates

#![warn(clippy::all)]

pub mod delta;
pub mod error;
pub mod gvk;
pub mod object;
pub mod store;
pub mod value;

pub use delta::{Delta, DeltaType};
pub use error::{Error, Result};
pub use gvk::GroupVersionKind;
pub use object::Object;
pub use store::Store;
