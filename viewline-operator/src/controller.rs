//! Controller assembly.
//!
//! A [`Controller`] is one compiled controller declaration: the engine
//! with its view stores, the pipeline, and the target write planner.
//! It processes source deltas one at a time; a failed event returns
//! the error and leaves the engine state untouched.

use tracing::debug;

use viewline_core::{Delta, Object, Result};
use viewline_engine::{Engine, Pipeline};

use crate::config::ControllerSpec;
use crate::target::{Target, WriteOp};

/// A compiled controller: engine, pipeline and target planner.
#[derive(Debug)]
pub struct Controller {
    name: String,
    engine: Engine,
    pipeline: Pipeline,
    target: Target,
}

impl Controller {
    /// Compiles a controller declaration.
    pub fn from_spec(spec: &ControllerSpec) -> Result<Self> {
        spec.validate()?;
        let engine = Engine::new(spec.target.kind.clone(), spec.source_gvks()?);
        let pipeline = Pipeline::new(spec.pipeline.join.clone(), spec.pipeline.aggregate.clone());
        let target = Target::from_spec(&spec.target)?;
        Ok(Self {
            name: spec.name.clone(),
            engine,
            pipeline,
            target,
        })
    }

    /// The controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seeds the engine's view stores, for bootstrapping and tests.
    pub fn with_objects(mut self, objects: impl IntoIterator<Item = Object>) -> Self {
        self.engine.add_objects(objects);
        self
    }

    /// Processes one source delta into planned target writes.
    pub fn process(&mut self, delta: Delta) -> Result<Vec<WriteOp>> {
        let deltas = self.pipeline.evaluate(&mut self.engine, delta)?;
        let mut ops = Vec::with_capacity(deltas.len());
        for d in &deltas {
            if let Some(op) = self.target.plan(d)? {
                ops.push(op);
            }
        }
        debug!(controller = %self.name, writes = ops.len(), "controller: event processed");
        Ok(ops)
    }
}
