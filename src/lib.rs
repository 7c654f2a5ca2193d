//! Extract a self-contained piece of an OpenAPI description.
//!
//! The document is loaded ([`source`]), optionally validated ([`validate`]),
//! narrowed with a jq filter ([`jq_exec`]), and every internal `$ref` in the
//! selection is replaced by what it points at ([`resolve`], using
//! [`pointer`] to turn `#/a/b` into a query). [`extract`] ties those steps
//! together; [`cli`] is the command-line front end.
pub mod cli;
pub mod config;
pub mod extract;
pub mod jq_exec;
pub mod output;
pub mod pointer;
pub mod prune;
pub mod resolve;
pub mod source;
pub mod validate;

pub use extract::{Extraction, Outcome, Selector};
pub use resolve::{resolve, Resolution, ResolveOptions, Resolver};
