//! The delta engine.
//!
//! The engine owns the per-source view stores and the gather state of
//! one pipeline. It classifies incoming deltas (deduplication, upsert
//! resolution), replays them through the join and aggregation
//! operators, and recovers delete/update semantics by evaluating
//! against the previously observed object versions.
//!
//! Updates are processed as a delete-half against the stored version
//! followed by an add-half with the incoming one; the two output sets
//! are then consolidated by identity. Both operators are generally
//! non-injective, so this is the simplest strategy that emits the
//! correct minimal delta set. All store and gather mutations happen
//! after the whole event evaluated successfully; a failed event leaves
//! the engine state untouched.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use viewline_core::value::{self, Map};
use viewline_core::{Delta, DeltaType, Error, GroupVersionKind, Object, Result, Store};
use viewline_expr::{EvalCtx, Expression, Literal};

use crate::aggregation::{self, Aggregation};
use crate::gather::{GatherTable, GroupChange};
use crate::join::{Join, JOINED_VIEW};

/// Which half of a replay a document is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Add,
    Delete,
}

/// A document flowing through the stage chain, with the delta kind a
/// stateful stage decided for it (`None` means the replay direction
/// decides).
struct StagedDoc {
    doc: Value,
    kind: Option<DeltaType>,
}

/// The per-pipeline delta engine.
#[derive(Debug)]
pub struct Engine {
    target_view: String,
    baseviews: Vec<GroupVersionKind>,
    stores: HashMap<GroupVersionKind, Store>,
    gather: GatherTable,
}

impl Engine {
    /// Creates an engine emitting into the given target view, with the
    /// declared source kinds.
    pub fn new(target_view: impl Into<String>, baseviews: Vec<GroupVersionKind>) -> Self {
        Self {
            target_view: target_view.into(),
            baseviews,
            stores: HashMap::new(),
            gather: GatherTable::new(),
        }
    }

    /// Seeds the view stores with source objects.
    pub fn with_objects(mut self, objects: impl IntoIterator<Item = Object>) -> Self {
        self.add_objects(objects);
        self
    }

    /// Adds source objects to their view stores.
    pub fn add_objects(&mut self, objects: impl IntoIterator<Item = Object>) {
        for obj in objects {
            self.store_mut(obj.gvk()).add(obj);
        }
    }

    /// The name of the target view output objects are stamped into.
    pub fn target_view(&self) -> &str {
        &self.target_view
    }

    /// Rejects null events and duplicates: an add/update/upsert/replace
    /// whose object deep-equals the currently stored version carries no
    /// new information.
    pub fn is_valid_event(&self, delta: &Delta) -> bool {
        let Some(obj) = &delta.object else {
            return false;
        };
        if matches!(
            delta.delta_type,
            DeltaType::Added | DeltaType::Updated | DeltaType::Upserted | DeltaType::Replaced
        ) {
            if let Some(stored) = self.store(&obj.gvk()).and_then(|s| s.get(obj)) {
                return stored != obj;
            }
        }
        true
    }

    /// Evaluates an aggregation on one delta.
    pub fn evaluate_aggregation(&mut self, a: &Aggregation, delta: Delta) -> Result<Vec<Delta>> {
        if delta.is_unchanged() {
            return Ok(vec![delta]);
        }
        if !self.is_valid_event(&delta) {
            debug!(event_type = ?delta.delta_type, "aggregation: ignoring duplicate event");
            return Ok(vec![]);
        }
        let delta = self.classify_upsert(delta);
        let Some(obj) = delta.object else {
            return Ok(vec![]);
        };
        let gvk = obj.gvk();

        match delta.delta_type {
            DeltaType::Added => {
                trace!(object = %obj.key(), "aggregation: add using new object");
                let mut gather = self.gather.clone();
                let out = self.run_aggregation(a, &obj, Direction::Add, &mut gather)?;
                self.gather = gather;
                self.store_mut(gvk).add(obj);
                Ok(out)
            }
            DeltaType::Updated | DeltaType::Replaced => {
                trace!(object = %obj.key(),
                    "aggregation: replaying event as a delete followed by an add");
                let mut gather = self.gather.clone();
                let old = self.store(&gvk).and_then(|s| s.get(&obj)).cloned();
                let dels = match &old {
                    Some(old) => self.run_aggregation(a, old, Direction::Delete, &mut gather)?,
                    None => vec![],
                };
                let adds = self.run_aggregation(a, &obj, Direction::Add, &mut gather)?;
                self.gather = gather;
                self.store_mut(gvk).add(obj);
                Ok(consolidate(dels, adds))
            }
            DeltaType::Deleted => {
                let Some(old) = self.store(&gvk).and_then(|s| s.get(&obj)).cloned() else {
                    debug!(object = %obj.key(),
                        "aggregation: ignoring delete event for an unknown object");
                    return Ok(vec![]);
                };
                let mut gather = self.gather.clone();
                let out = self.run_aggregation(a, &old, Direction::Delete, &mut gather)?;
                self.gather = gather;
                self.store_mut(gvk).delete(&old);
                Ok(out)
            }
            _ => {
                debug!(event_type = ?delta.delta_type, "aggregation: ignoring event");
                Ok(vec![])
            }
        }
    }

    /// Evaluates a join on one delta.
    pub fn evaluate_join(&mut self, j: &Join, delta: Delta) -> Result<Vec<Delta>> {
        if delta.is_unchanged() {
            return Ok(vec![delta]);
        }
        if !self.is_valid_event(&delta) {
            debug!(event_type = ?delta.delta_type, "join: ignoring duplicate event");
            return Ok(vec![]);
        }
        let delta = self.classify_upsert(delta);
        let Some(obj) = delta.object else {
            return Ok(vec![]);
        };
        let gvk = obj.gvk();
        debug!(event_type = ?delta.delta_type, object = %obj.key(), "join: processing event");

        match delta.delta_type {
            DeltaType::Added => {
                let os = self.eval_join(j, &obj).map_err(Error::join)?;
                self.store_mut(gvk).add(obj);
                Ok(os.into_iter().map(Delta::added).collect())
            }
            DeltaType::Updated | DeltaType::Replaced => {
                let old = self.store(&gvk).and_then(|s| s.get(&obj)).cloned();
                let dels = match &old {
                    Some(old) => self
                        .eval_join(j, old)
                        .map_err(Error::join)?
                        .into_iter()
                        .map(Delta::deleted)
                        .collect(),
                    None => vec![],
                };
                let adds = self
                    .eval_join(j, &obj)
                    .map_err(Error::join)?
                    .into_iter()
                    .map(Delta::added)
                    .collect();
                self.store_mut(gvk).add(obj);
                Ok(consolidate(dels, adds))
            }
            DeltaType::Deleted => {
                let Some(old) = self.store(&gvk).and_then(|s| s.get(&obj)).cloned() else {
                    debug!(object = %obj.key(),
                        "join: ignoring delete event for an unknown object");
                    return Ok(vec![]);
                };
                let os = self.eval_join(j, &old).map_err(Error::join)?;
                self.store_mut(gvk).delete(&old);
                Ok(os.into_iter().map(Delta::deleted).collect())
            }
            _ => {
                debug!(event_type = ?delta.delta_type, "join: ignoring event");
                Ok(vec![])
            }
        }
    }

    /// Recasts an aggregation result into a target view object.
    ///
    /// The document must carry a non-empty string `metadata.name`; the
    /// namespace defaults to the empty string. `apiVersion` and `kind`
    /// are stamped from the target view.
    pub fn normalize(&self, doc: &Value) -> Result<Object> {
        let Value::Object(content) = doc else {
            return Err(Error::InvalidObject(format!(
                "aggregation result must be a mapping, got {doc}"
            )));
        };
        let meta = match content.get("metadata") {
            Some(Value::Object(m)) => m,
            Some(other) => {
                return Err(Error::InvalidObject(format!(
                    "invalid metadata in object: {other}"
                )))
            }
            None => return Err(Error::InvalidObject("no metadata in object".into())),
        };
        let namespace = match meta.get("namespace") {
            None => "",
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(Error::InvalidObject(format!(
                    "metadata/namespace must be a string (current value {other})"
                )))
            }
        };
        let name = match meta.get("name") {
            None => return Err(Error::InvalidObject("missing /metadata/name".into())),
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(Error::InvalidObject(format!(
                    "metadata/name must be a string (current value {other})"
                )))
            }
        };
        if name.is_empty() {
            return Err(Error::InvalidObject(
                "empty metadata/name in aggregation result".into(),
            ));
        }

        let namespace = namespace.to_string();
        let name = name.to_string();
        let mut obj = Object::new_view(&self.target_view);
        obj.set_content(content.clone());
        obj.set_namespace(namespace);
        obj.set_name(name);
        Ok(obj)
    }

    fn classify_upsert(&self, delta: Delta) -> Delta {
        if delta.delta_type != DeltaType::Upserted {
            return delta;
        }
        let Some(obj) = delta.object else {
            return Delta::unchanged();
        };
        let known = self.store(&obj.gvk()).is_some_and(|s| s.contains(&obj));
        if known {
            Delta::updated(obj)
        } else {
            Delta::added(obj)
        }
    }

    fn store(&self, gvk: &GroupVersionKind) -> Option<&Store> {
        self.stores.get(gvk)
    }

    fn store_mut(&mut self, gvk: GroupVersionKind) -> &mut Store {
        self.stores.entry(gvk).or_default()
    }

    /// Runs one half of a replay: the object through every stage, then
    /// normalization. Gather mutations land in the caller's working
    /// copy of the table.
    fn run_aggregation(
        &self,
        a: &Aggregation,
        obj: &Object,
        dir: Direction,
        gather: &mut GatherTable,
    ) -> Result<Vec<Delta>> {
        let mut docs = vec![StagedDoc {
            doc: obj.to_value(),
            kind: None,
        }];
        for (idx, stage) in a.stages.iter().enumerate() {
            let mut next = Vec::new();
            for staged in docs {
                next.extend(
                    self.eval_stage(idx, stage, staged, dir, gather)
                        .map_err(|e| Error::aggregation(stage, e))?,
                );
            }
            docs = next;
        }

        let mut out = Vec::new();
        for staged in docs {
            let obj = self.normalize(&staged.doc)?;
            let kind = staged.kind.unwrap_or(match dir {
                Direction::Add => DeltaType::Added,
                Direction::Delete => DeltaType::Deleted,
            });
            out.push(Delta::new(kind, obj));
        }

        // several objects can fold into the same gather group within
        // one event; only the final group state counts
        if a.stages.iter().any(|s| s.op == "@gather") {
            out = dedupe_keep_last(out);
        }

        trace!(aggregation = %a, results = out.len(), "aggregation: eval ready");
        Ok(out)
    }

    fn eval_stage(
        &self,
        idx: usize,
        stage: &Expression,
        staged: StagedDoc,
        dir: Direction,
        gather: &mut GatherTable,
    ) -> Result<Vec<StagedDoc>> {
        match stage.op.as_str() {
            "@select" | "@filter" => {
                if aggregation::eval_select(stage, &staged.doc)? {
                    Ok(vec![staged])
                } else {
                    Ok(vec![])
                }
            }
            "@project" => {
                let doc = aggregation::eval_project(stage, &staged.doc)?;
                Ok(vec![StagedDoc {
                    doc,
                    kind: staged.kind,
                }])
            }
            "@map" => {
                let doc = aggregation::eval_map(stage, &staged.doc)?;
                Ok(vec![StagedDoc {
                    doc,
                    kind: staged.kind,
                }])
            }
            "@unwind" => {
                let docs = aggregation::eval_unwind(stage, &staged.doc)?;
                Ok(docs
                    .into_iter()
                    .map(|doc| StagedDoc {
                        doc,
                        kind: staged.kind,
                    })
                    .collect())
            }
            "@gather" => self.eval_gather(idx, stage, staged, dir, gather),
            other => Err(Error::InvalidArguments(format!(
                "unknown aggregation stage {other}"
            ))),
        }
    }

    fn eval_gather(
        &self,
        idx: usize,
        stage: &Expression,
        staged: StagedDoc,
        dir: Direction,
        gather: &mut GatherTable,
    ) -> Result<Vec<StagedDoc>> {
        let args = gather_args(stage)?;
        let (key_expr, target_expr) = args;
        let target = aggregation::expression_path(target_expr)?;
        let key = key_expr.evaluate(&EvalCtx::new(&staged.doc))?;
        let Some(element) = target.get(&staged.doc) else {
            return Err(Error::InvalidArguments(format!(
                "@gather target {target} does not resolve"
            )));
        };

        match dir {
            Direction::Add => {
                let (group, change) = gather.add(idx, &key, element);
                let kind = match change {
                    GroupChange::Created => DeltaType::Added,
                    _ => DeltaType::Updated,
                };
                Ok(vec![StagedDoc {
                    doc: group.to_document(&target)?,
                    kind: Some(kind),
                }])
            }
            Direction::Delete => match gather.remove(idx, &key, &element) {
                None => {
                    debug!(key = %key, "gather: ignoring removal of an unknown element");
                    Ok(vec![])
                }
                Some((group, GroupChange::Emptied)) => Ok(vec![StagedDoc {
                    doc: group.to_document(&target)?,
                    kind: Some(DeltaType::Deleted),
                }]),
                Some((group, _)) => Ok(vec![StagedDoc {
                    doc: group.to_document(&target)?,
                    kind: Some(DeltaType::Updated),
                }]),
            },
        }
    }

    /// Enumerates the Cartesian product of the base view stores with
    /// the incoming object fixed at its own slot, and collects the
    /// combinations the join condition accepts.
    fn eval_join(&self, j: &Join, obj: &Object) -> Result<Vec<Object>> {
        if self.baseviews.len() < 2 {
            return Err(Error::InvalidArguments(
                "join requires at least two source views".into(),
            ));
        }
        let mut ret = Vec::new();
        let mut current: Vec<Option<&Object>> = Vec::with_capacity(self.baseviews.len());
        self.recurse_product(j, obj, &mut current, &mut ret, 0)?;
        trace!(join = %j, results = ret.len(), "join: eval ready");
        Ok(ret)
    }

    fn recurse_product<'a>(
        &'a self,
        j: &Join,
        obj: &'a Object,
        current: &mut Vec<Option<&'a Object>>,
        ret: &mut Vec<Object>,
        depth: usize,
    ) -> Result<()> {
        if depth == self.baseviews.len() {
            if let Some(joined) = self.eval_join_candidate(j, current)? {
                ret.push(joined);
            }
            return Ok(());
        }

        let gvk = &self.baseviews[depth];

        // the object's own slot is never taken from the store
        if obj.gvk() == *gvk {
            current.push(Some(obj));
            self.recurse_product(j, obj, current, ret, depth + 1)?;
            current.pop();
            return Ok(());
        }

        match self.stores.get(gvk) {
            // no object of this kind seen yet: contribute a null slot
            None => {
                current.push(None);
                self.recurse_product(j, obj, current, ret, depth + 1)?;
                current.pop();
            }
            Some(store) => {
                for o in store.list() {
                    current.push(Some(o));
                    self.recurse_product(j, obj, current, ret, depth + 1)?;
                    current.pop();
                }
            }
        }
        Ok(())
    }

    fn eval_join_candidate(
        &self,
        j: &Join,
        current: &[Option<&Object>],
    ) -> Result<Option<Object>> {
        let mut input = Map::new();
        let mut ids = Vec::new();
        for slot in current.iter().flatten() {
            let kind = slot.gvk().kind;
            ids.push(format!("{}:{}:{}", kind, slot.namespace(), slot.name()));
            input.insert(kind, slot.to_value());
        }

        // the synthetic name disambiguates combinations when deltas
        // are diffed later
        ids.sort();
        let name = ids.join("--");
        let mut meta = Map::new();
        meta.insert("name".into(), Value::String(name));
        input.insert("metadata".into(), Value::Object(meta));

        let input = Value::Object(input);
        let res = match j.expression.evaluate(&EvalCtx::new(&input)) {
            Ok(res) => res,
            Err(e) => {
                // combinations the condition cannot evaluate (usually
                // null slots) are not matches
                trace!(error = %e, "join: condition failed, dropping combination");
                return Ok(None);
            }
        };
        let matched = match value::as_bool(&res) {
            Ok(b) => b,
            Err(e) => {
                trace!(error = %e, "join: non-boolean condition result, dropping combination");
                return Ok(None);
            }
        };
        if !matched {
            return Ok(None);
        }

        let Value::Object(content) = input else {
            return Ok(None);
        };
        let mut joined = Object::new_view(JOINED_VIEW);
        joined.set_content(content);
        Ok(Some(joined))
    }
}

fn gather_args(stage: &Expression) -> Result<(&Expression, &Expression)> {
    let Some(arg) = stage.arg.as_deref() else {
        return Err(Error::InvalidArguments(
            "no expression found in aggregation stage".into(),
        ));
    };
    let Some(Literal::List(items)) = &arg.literal else {
        return Err(Error::InvalidArguments(
            "@gather takes [key, target] arguments".into(),
        ));
    };
    if items.len() != 2 {
        return Err(Error::InvalidArguments(format!(
            "@gather takes [key, target] arguments, got {} entries",
            items.len()
        )));
    }
    Ok((&items[0], &items[1]))
}

/// Consolidates the delete-half and add-half outputs of a replay into
/// the minimal delta set, ordered deletes, updates, adds.
///
/// An identity present in both halves with an unchanged object emits
/// nothing: the source update did not touch any projected field.
fn consolidate(dels: Vec<Delta>, adds: Vec<Delta>) -> Vec<Delta> {
    fn identity(d: &Delta) -> Option<(GroupVersionKind, String)> {
        d.object.as_ref().map(|o| (o.gvk(), o.key()))
    }

    let del_objects: HashMap<_, _> = dels
        .iter()
        .filter_map(|d| Some((identity(d)?, d.object.clone()?)))
        .collect();
    let add_ids: HashSet<_> = adds.iter().filter_map(identity).collect();

    let mut deletes = Vec::new();
    let mut updates = Vec::new();
    let mut creates = Vec::new();

    for d in dels {
        let Some(id) = identity(&d) else { continue };
        if add_ids.contains(&id) {
            continue;
        }
        match d.delta_type {
            // a gather group that survives its delete-half is an update
            DeltaType::Updated => updates.push(d),
            _ => {
                let Some(obj) = d.object else { continue };
                deletes.push(Delta::deleted(obj));
            }
        }
    }

    for a in adds {
        let Some(id) = identity(&a) else { continue };
        let Some(obj) = a.object else { continue };
        match del_objects.get(&id) {
            Some(old) if *old == obj => {
                // present in both halves, unchanged: no delta
            }
            Some(_) => updates.push(Delta::updated(obj)),
            None => match a.delta_type {
                DeltaType::Updated => updates.push(Delta::updated(obj)),
                _ => creates.push(Delta::added(obj)),
            },
        }
    }

    deletes.into_iter().chain(updates).chain(creates).collect()
}

/// Keeps only the last delta per output identity, preserving order.
fn dedupe_keep_last(deltas: Vec<Delta>) -> Vec<Delta> {
    let mut seen = HashMap::new();
    for (i, d) in deltas.iter().enumerate() {
        if let Some(obj) = &d.object {
            seen.insert((obj.gvk(), obj.key()), i);
        }
    }
    deltas
        .into_iter()
        .enumerate()
        .filter(|(i, d)| match &d.object {
            Some(obj) => seen.get(&(obj.gvk(), obj.key())) == Some(i),
            None => true,
        })
        .map(|(_, d)| d)
        .collect()
}
