//! The extraction pipeline: validate → select → resolve → prune.
use serde_json::Value;
use thiserror::Error;

use crate::jq_exec::{PreparedJaq, QueryError, QueryEvaluator};
use crate::prune::{prune, PruneOptions};
use crate::resolve::{Resolution, ResolveOptions, Resolver};
use crate::validate::{validate, ValidationError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid API description")]
    Invalid(#[from] ValidationError),
    #[error("selection query `{filter}` failed")]
    Select {
        filter: String,
        #[source]
        source: QueryError,
    },
    #[error("{} reference(s) left unresolved: {}", .0.len(), .0.join(", "))]
    Unresolved(Vec<String>),
}

/// How the sub-tree is chosen from the full document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Any jq filter, e.g. `.paths["/pets"].get`.
    Query(String),
    /// An endpoint path under `paths`, e.g. `/pets` (a missing leading `/` is added).
    Endpoint(String),
}

impl Selector {
    pub fn filter(&self) -> String {
        match self {
            Selector::Query(filter) => filter.clone(),
            Selector::Endpoint(path) => {
                let path = if path.starts_with('/') { path.clone() } else { format!("/{path}") };
                format!(".paths[{}]", Value::String(path))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub selector: Selector,
    pub validate: bool,
    /// `None` skips reference resolution entirely.
    pub resolve: Option<ResolveOptions>,
    pub prune: PruneOptions,
    /// Treat any unresolved reference as an error.
    pub strict: bool,
}

impl Extraction {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            validate: false,
            resolve: Some(ResolveOptions::default()),
            prune: PruneOptions::default(),
            strict: false,
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub value: Value,
    pub resolution: Resolution,
}

impl Extraction {
    /// Run the pipeline with jq, converting `full` for jaq once for both
    /// selection and resolution.
    pub fn run(&self, full: &Value) -> Result<Outcome, ExtractError> {
        self.run_with(full, PreparedJaq::new(full))
    }

    pub fn run_with<E: QueryEvaluator>(
        &self,
        full: &Value,
        evaluator: E,
    ) -> Result<Outcome, ExtractError> {
        if self.validate {
            validate(full)?;
        }

        let filter = self.selector.filter();
        tracing::debug!(%filter, "selecting sub-tree");
        let selected = evaluator
            .evaluate(&filter, full)
            .map_err(|source| ExtractError::Select { filter: filter.clone(), source })?;
        let mut value = selected.unwrap_or_else(|| {
            tracing::warn!(%filter, "selection matched nothing");
            Value::Null
        });

        let resolution = match self.resolve {
            Some(options) => {
                let resolution = Resolver::new(full)
                    .with_evaluator(evaluator)
                    .with_options(options)
                    .resolve(&mut value);
                tracing::info!(
                    resolved = resolution.resolved,
                    unresolved = resolution.failures.len(),
                    "reference resolution finished"
                );
                resolution
            }
            None => Resolution::default(),
        };

        if self.strict && !resolution.is_complete() {
            let pointers = resolution.failures.iter().map(|f| f.pointer().to_string()).collect();
            return Err(ExtractError::Unresolved(pointers));
        }

        prune(&mut value, self.prune);
        Ok(Outcome { value, resolution })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/pets": {
                    "get": {
                        "summary": "list",
                        "responses": {
                            "200": {"$ref": "#/components/responses/ok"},
                            "default": {"$ref": "#/components/responses/missing"}
                        }
                    }
                }
            },
            "components": {"responses": {"ok": {"description": "fine", "x-owner": "pets"}}}
        })
    }

    #[test]
    fn endpoint_selector_builds_bracketed_filter() {
        assert_eq!(Selector::Endpoint("pets".into()).filter(), r#".paths["/pets"]"#);
        assert_eq!(Selector::Endpoint("/pets/{id}".into()).filter(), r#".paths["/pets/{id}"]"#);
        assert_eq!(Selector::Query(".info".into()).filter(), ".info");
    }

    #[test]
    fn selects_and_resolves() {
        let outcome = Extraction::new(Selector::Endpoint("/pets".into())).run(&full()).unwrap();
        assert_eq!(outcome.resolution.resolved, 1);
        assert_eq!(outcome.resolution.failures.len(), 1);
        assert_eq!(
            outcome.value["get"]["responses"]["200"],
            json!({"description": "fine", "x-owner": "pets"})
        );
        assert_eq!(
            outcome.value["get"]["responses"]["default"],
            json!({"$ref": "#/components/responses/missing"})
        );
    }

    #[test]
    fn full_document_is_left_untouched() {
        let full = full();
        let before = full.clone();
        Extraction::new(Selector::Query(".paths".into())).run(&full).unwrap();
        assert_eq!(full, before);
    }

    #[test]
    fn resolution_can_be_disabled() {
        let mut extraction = Extraction::new(Selector::Endpoint("/pets".into()));
        extraction.resolve = None;
        let outcome = extraction.run(&full()).unwrap();
        assert_eq!(outcome.resolution.resolved, 0);
        assert_eq!(
            outcome.value["get"]["responses"]["200"],
            json!({"$ref": "#/components/responses/ok"})
        );
    }

    #[test]
    fn strict_mode_fails_on_unresolved() {
        let mut extraction = Extraction::new(Selector::Endpoint("/pets".into()));
        extraction.strict = true;
        match extraction.run(&full()) {
            Err(ExtractError::Unresolved(pointers)) => {
                assert_eq!(pointers, vec!["#/components/responses/missing".to_string()])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pruning_runs_after_resolution() {
        let mut extraction = Extraction::new(Selector::Endpoint("/pets".into()));
        extraction.prune = PruneOptions { docs: true, extensions: true, ..PruneOptions::default() };
        let outcome = extraction.run(&full()).unwrap();
        assert_eq!(outcome.value["get"]["responses"]["200"], json!({}));
        assert!(outcome.value["get"].get("summary").is_none());
    }

    #[test]
    fn validation_gate() {
        let mut extraction = Extraction::new(Selector::Query(".".into()));
        extraction.validate = true;
        assert!(matches!(
            extraction.run(&full()),
            Err(ExtractError::Invalid(ValidationError::DanglingRefs(_)))
        ));
    }

    #[test]
    fn unmatched_selection_is_null() {
        let outcome = Extraction::new(Selector::Endpoint("/nope".into())).run(&full()).unwrap();
        assert_eq!(outcome.value, Value::Null);
    }

    #[test]
    fn bad_selection_is_an_error() {
        let err = Extraction::new(Selector::Query(".paths[[".into())).run(&full()).unwrap_err();
        assert!(matches!(err, ExtractError::Select { .. }));
    }
}
