//! `$ref` pointer → jq member-access expression.
//!
//! `#/components/schemas/Widget` becomes `components.schemas.Widget`. Segments
//! that are not plain identifiers are emitted in bracketed string form, so
//! `#/paths/~1pets/get/responses/200` becomes
//! `paths["/pets"].get.responses["200"]`.
//!
//! No validation happens here. A malformed pointer produces an expression that
//! fails (or matches nothing) at evaluation time.
use once_cell::sync::Lazy;
use regex::Regex;

/// Root marker stripped from the front of a pointer.
pub const ROOT_MARKER: &str = "#/";

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

// words jq refuses after a bare `.`
const JQ_KEYWORDS: &[&str] = &[
    "def", "if", "then", "elif", "else", "end", "as", "reduce", "foreach", "try", "catch",
    "label", "import", "include", "and", "or", "__loc__",
];

pub fn transform(pointer: &str) -> String {
    let path = pointer.strip_prefix(ROOT_MARKER).unwrap_or(pointer);
    let mut out = String::with_capacity(path.len() + 8);
    for (ix, raw) in path.split('/').enumerate() {
        let segment = unescape(raw);
        if is_bare_member(&segment) {
            if ix > 0 {
                out.push('.');
            }
            out.push_str(&segment);
        } else {
            out.push('[');
            out.push_str(&quote(&segment));
            out.push(']');
        }
    }
    out
}

/// Turn a member-access expression into a runnable jq filter rooted at `.`.
pub fn to_filter(expression: &str) -> String {
    format!(".{expression}")
}

/// RFC 6901 segment decoding; `~1` must be handled before `~0`.
fn unescape(segment: &str) -> String {
    if segment.contains('~') {
        segment.replace("~1", "/").replace("~0", "~")
    } else {
        segment.to_string()
    }
}

fn is_bare_member(segment: &str) -> bool {
    IDENT.is_match(segment) && !JQ_KEYWORDS.contains(&segment)
}

fn quote(segment: &str) -> String {
    serde_json::Value::String(segment.to_string()).to_string()
}
