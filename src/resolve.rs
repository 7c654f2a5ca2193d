//! Reference resolution.
//!
//! Walks a sub-tree and replaces every internal `$ref` object with the object
//! it points to inside the full document. Resolution is in place and merge
//! based: the `$ref` key is removed and the target's keys are inserted into the
//! referencing object, overwriting same-named siblings.
//!
//! Failures are per reference. An unresolvable reference stays in the tree
//! untouched, is logged, and is recorded in the returned [`Resolution`]; the
//! walk carries on with everything else.
//!
//! By default the merged content is not walked again. [`ResolveOptions::deep`]
//! expands nested references too, guarded by a trail of the pointers currently
//! being expanded and a depth limit.
use indexmap::IndexSet;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::jq_exec::{PreparedJaq, QueryError, QueryEvaluator};
use crate::pointer;

pub const REF_KEY: &str = "$ref";
pub const ITEMS_KEY: &str = "items";
pub const RESPONSES_KEY: &str = "responses";

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum RefError {
    #[error("cannot evaluate reference `{pointer}` (query `{expression}`)")]
    Query {
        pointer: String,
        expression: String,
        #[source]
        source: QueryError,
    },
    #[error("reference `{pointer}` points at nothing")]
    NotFound { pointer: String },
    #[error("reference `{pointer}` resolved to {found}, expected an object")]
    NotAnObject { pointer: String, found: &'static str },
    #[error("reference `{pointer}` is cyclic ({chain})")]
    Cycle { pointer: String, chain: String },
    #[error("reference `{pointer}` exceeds the expansion depth of {depth}")]
    DepthExceeded { pointer: String, depth: usize },
}

impl RefError {
    pub fn pointer(&self) -> &str {
        match self {
            RefError::Query { pointer, .. }
            | RefError::NotFound { pointer }
            | RefError::NotAnObject { pointer, .. }
            | RefError::Cycle { pointer, .. }
            | RefError::DepthExceeded { pointer, .. } => pointer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub deep: bool,
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { deep: false, max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// What a resolve pass did.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: usize,
    pub failures: Vec<RefError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolve `node` in place against `full` with the jq evaluator and default options.
pub fn resolve(node: &mut Value, full: &Value) -> Resolution {
    Resolver::new(full).resolve(node)
}

pub struct Resolver<'a, E = PreparedJaq<'a>> {
    full: &'a Value,
    evaluator: E,
    options: ResolveOptions,
}

impl<'a> Resolver<'a, PreparedJaq<'a>> {
    /// A resolver that queries `full` through one [`PreparedJaq`] for the whole pass.
    pub fn new(full: &'a Value) -> Self {
        Self { full, evaluator: PreparedJaq::new(full), options: ResolveOptions::default() }
    }
}

impl<'a, E: QueryEvaluator> Resolver<'a, E> {
    pub fn with_evaluator<F: QueryEvaluator>(self, evaluator: F) -> Resolver<'a, F> {
        Resolver { full: self.full, evaluator, options: self.options }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn resolve(&self, node: &mut Value) -> Resolution {
        let mut report = Resolution::default();
        let mut trail = IndexSet::new();
        self.walk(node, &mut trail, &mut report);
        report
    }

    fn walk(&self, node: &mut Value, trail: &mut IndexSet<String>, report: &mut Resolution) {
        match node {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(item, trail, report);
                }
            }
            Value::Object(map) => self.walk_object(map, trail, report),
        }
    }

    fn walk_object(
        &self,
        map: &mut Map<String, Value>,
        trail: &mut IndexSet<String>,
        report: &mut Resolution,
    ) {
        let mut merged: IndexSet<String> = IndexSet::new();

        if let Some(Value::String(pointer)) = map.get(REF_KEY) {
            let pointer = pointer.clone();
            match self.lookup(&pointer, trail, report) {
                Ok(target) => {
                    tracing::debug!(%pointer, keys = target.len(), "resolved reference");
                    map.shift_remove(REF_KEY);
                    for (key, value) in target {
                        merged.insert(key.clone());
                        map.insert(key, value);
                    }
                    report.resolved += 1;
                }
                Err(err) => {
                    match &err {
                        RefError::NotAnObject { .. } => {
                            tracing::error!(error = %err, "reference left unresolved")
                        }
                        _ => tracing::warn!(error = %err, "reference left unresolved"),
                    }
                    report.failures.push(err);
                }
            }
        }

        for (key, value) in map.iter_mut() {
            if merged.contains(key) {
                continue;
            }
            match (key.as_str(), value) {
                (ITEMS_KEY, items) if !items.is_null() => {
                    if items.get(REF_KEY).is_some() {
                        tracing::debug!("descending into referenced items");
                    }
                    self.walk(items, trail, report);
                }
                (RESPONSES_KEY, Value::Object(responses)) => {
                    for (name, response) in responses.iter_mut() {
                        tracing::debug!(response = %name, "descending into response");
                        self.walk(response, trail, report);
                    }
                }
                (_, value) => self.walk(value, trail, report),
            }
        }
    }

    /// Find the object `pointer` names; in deep mode also expand it.
    fn lookup(
        &self,
        pointer: &str,
        trail: &mut IndexSet<String>,
        report: &mut Resolution,
    ) -> Result<Map<String, Value>, RefError> {
        if self.options.deep {
            if trail.contains(pointer) {
                let chain = trail
                    .iter()
                    .map(String::as_str)
                    .chain([pointer])
                    .collect::<Vec<_>>();
                return Err(RefError::Cycle {
                    pointer: pointer.to_string(),
                    chain: chain.join(" -> "),
                });
            }
            if trail.len() >= self.options.max_depth {
                return Err(RefError::DepthExceeded {
                    pointer: pointer.to_string(),
                    depth: self.options.max_depth,
                });
            }
        }

        let expression = pointer::transform(pointer);
        let found = self
            .evaluator
            .evaluate(&pointer::to_filter(&expression), self.full)
            .map_err(|source| RefError::Query {
                pointer: pointer.to_string(),
                expression: expression.clone(),
                source,
            })?;

        let mut target = match found {
            None => return Err(RefError::NotFound { pointer: pointer.to_string() }),
            Some(Value::Object(target)) => target,
            Some(other) => {
                return Err(RefError::NotAnObject {
                    pointer: pointer.to_string(),
                    found: kind(&other),
                });
            }
        };

        if self.options.deep {
            trail.insert(pointer.to_string());
            self.walk_object(&mut target, trail, report);
            trail.pop();
        }
        Ok(target)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
