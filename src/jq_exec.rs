//! jq evaluation over `serde_json::Value` documents (via `jaq`).
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use once_cell::unsync::OnceCell;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("compile error: {0}")]
    Compile(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("query produced invalid JSON")]
    Output(#[source] serde_json::Error),
}

/// Anything that can answer "what does `expression` select in `document`?".
///
/// `Ok(None)` means the expression matched nothing.
pub trait QueryEvaluator {
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, QueryError>;
}

/// The jq implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaq;

impl QueryEvaluator for Jaq {
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, QueryError> {
        run_jaq(expression, document).map(collapse)
    }
}

/// jq bound to one document that is queried many times.
///
/// The document is converted to a jaq value on first use and shared by every
/// later query. Answers are memoized per expression, so a pointer referenced
/// from many places is compiled and run once. Queries against any other
/// document fall through to [`Jaq`].
pub struct PreparedJaq<'a> {
    source: &'a Value,
    doc: OnceCell<Val>,
    conversions: Cell<usize>,
    memo: RefCell<HashMap<String, Option<Value>>>,
}

impl<'a> PreparedJaq<'a> {
    pub fn new(source: &'a Value) -> Self {
        Self {
            source,
            doc: OnceCell::new(),
            conversions: Cell::new(0),
            memo: RefCell::default(),
        }
    }

    /// How many times a whole document was converted for jaq.
    pub fn conversions(&self) -> usize {
        self.conversions.get()
    }

    /// Number of distinct expressions answered from the bound document.
    pub fn memoized(&self) -> usize {
        self.memo.borrow().len()
    }

    fn doc(&self) -> Val {
        self.doc
            .get_or_init(|| {
                self.conversions.set(self.conversions.get() + 1);
                Val::from(self.source.clone())
            })
            .clone()
    }
}

impl QueryEvaluator for PreparedJaq<'_> {
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, QueryError> {
        if !std::ptr::eq(document, self.source) {
            self.conversions.set(self.conversions.get() + 1);
            return Jaq.evaluate(expression, document);
        }
        if let Some(hit) = self.memo.borrow().get(expression) {
            return Ok(hit.clone());
        }
        let found = run_filter(expression, self.doc()).map(collapse)?;
        self.memo
            .borrow_mut()
            .insert(expression.to_string(), found.clone());
        Ok(found)
    }
}

impl<F> QueryEvaluator for F
where
    F: Fn(&str, &Value) -> Result<Option<Value>, QueryError>,
{
    fn evaluate(&self, expression: &str, document: &Value) -> Result<Option<Value>, QueryError> {
        self(expression, document)
    }
}

/// Run `filter_src` against `input`, collecting every output.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>, QueryError> {
    run_filter(filter_src, Val::from(input.clone()))
}

fn run_filter(filter_src: &str, input: Val) -> Result<Vec<Value>, QueryError> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let mut it = filter.run((Ctx::new([], &inputs), input));

    let mut out = Vec::new();
    while let Some(item) = it.next() {
        let v = item.map_err(|e| QueryError::Runtime(format!("{e:?}")))?;
        // Val: Display -> JSON text
        let v = serde_json::from_str::<Value>(&v.to_string()).map_err(QueryError::Output)?;
        out.push(v);
    }
    Ok(out)
}

// No output, or a lone `null`, is "matched nothing". Several outputs become an array.
fn collapse(mut outputs: Vec<Value>) -> Option<Value> {
    match outputs.len() {
        0 => None,
        1 => outputs.pop().filter(|v| !v.is_null()),
        _ => Some(Value::Array(outputs)),
    }
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> QueryError {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("{err:?} in `{}`; ", file.code));
    }
    QueryError::Parse(s.trim_end_matches("; ").to_string())
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> QueryError {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!("undefined `{name}`: {undef:?} in `{}`; ", file.code));
        }
    }
    QueryError::Compile(s.trim_end_matches("; ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "components": {"schemas": {"Widget": {"type": "object"}}},
            "paths": {"/pets": {"get": {"operationId": "listPets"}}},
            "count": 42
        })
    }

    #[test]
    fn member_access_finds_object() {
        let found = Jaq.evaluate(".components.schemas.Widget", &doc()).unwrap();
        assert_eq!(found, Some(json!({"type": "object"})));
    }

    #[test]
    fn bracketed_member_access() {
        let found = Jaq.evaluate(r#".paths["/pets"].get.operationId"#, &doc()).unwrap();
        assert_eq!(found, Some(json!("listPets")));
    }

    #[test]
    fn missing_member_is_none() {
        assert_eq!(Jaq.evaluate(".components.schemas.Nope", &doc()).unwrap(), None);
        assert_eq!(Jaq.evaluate("empty", &doc()).unwrap(), None);
    }

    #[test]
    fn null_member_is_none() {
        let input = json!({"a": {"n": null}});
        assert_eq!(Jaq.evaluate(".a.n", &input).unwrap(), None);
        assert_eq!(PreparedJaq::new(&input).evaluate(".a.n", &input).unwrap(), None);
    }

    #[test]
    fn many_outputs_collect_into_array() {
        let input = json!({"paths": {"/a": {"get": {"operationId": "a"}}}, "count": 1});
        let found = Jaq.evaluate(".paths[].get.operationId, .count", &input).unwrap();
        assert_eq!(found, Some(json!(["a", 1])));
    }

    #[test]
    fn malformed_expression_is_parse_error() {
        let err = Jaq.evaluate(".components.[[", &doc()).unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)), "{err}");
    }

    #[test]
    fn unknown_function_is_compile_error() {
        let err = Jaq.evaluate("no_such_function_here", &doc()).unwrap_err();
        assert!(matches!(err, QueryError::Compile(_)), "{err}");
    }

    #[test]
    fn indexing_a_number_is_runtime_error() {
        let err = Jaq.evaluate(".count.inner", &doc()).unwrap_err();
        assert!(matches!(err, QueryError::Runtime(_)), "{err}");
    }

    #[test]
    fn closures_are_evaluators() {
        let fixed =
            |_: &str, _: &Value| -> Result<Option<Value>, QueryError> { Ok(Some(json!(1))) };
        assert_eq!(fixed.evaluate("anything", &doc()).unwrap(), Some(json!(1)));
    }

    #[test]
    fn prepared_document_is_converted_once() {
        let full = doc();
        let prepared = PreparedJaq::new(&full);
        assert_eq!(prepared.conversions(), 0);

        for _ in 0..50 {
            let found = prepared.evaluate(".components.schemas.Widget", &full).unwrap();
            assert_eq!(found, Some(json!({"type": "object"})));
            let found = prepared.evaluate(r#".paths["/pets"].get.operationId"#, &full).unwrap();
            assert_eq!(found, Some(json!("listPets")));
        }
        assert_eq!(prepared.conversions(), 1);
        assert_eq!(prepared.memoized(), 2);
    }

    #[test]
    fn prepared_answers_match_plain_jaq() {
        let full = doc();
        let prepared = PreparedJaq::new(&full);
        for expr in [".count", ".components.schemas.Nope", ".paths[].get.operationId, .count"] {
            assert_eq!(
                prepared.evaluate(expr, &full).unwrap(),
                Jaq.evaluate(expr, &full).unwrap(),
                "{expr}"
            );
        }
        let err = prepared.evaluate(".count.inner", &full).unwrap_err();
        assert!(matches!(err, QueryError::Runtime(_)), "{err}");
        assert_eq!(prepared.memoized(), 3);
    }

    #[test]
    fn prepared_falls_back_for_other_documents() {
        let full = doc();
        let other = json!({"components": {"schemas": {"Widget": {"type": "string"}}}});
        let prepared = PreparedJaq::new(&full);
        let found = prepared.evaluate(".components.schemas.Widget", &other).unwrap();
        assert_eq!(found, Some(json!({"type": "string"})));
        assert_eq!(prepared.memoized(), 0);
        assert_eq!(prepared.conversions(), 1);
    }
}
