//! Dropping documentation, examples and vendor extensions from a resolved tree.
use serde_json::Value;

const DOC_KEYS: &[&str] = &["description", "summary", "externalDocs"];
const EXAMPLE_KEYS: &[&str] = &["example", "examples"];
const EXTENSION_PREFIX: &str = "x-";

// children of this map are property names, not keywords
const PROPERTIES_KEY: &str = "properties";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOptions {
    pub docs: bool,
    pub examples: bool,
    pub extensions: bool,
}

impl PruneOptions {
    pub fn is_noop(&self) -> bool {
        !(self.docs || self.examples || self.extensions)
    }

    fn drops(&self, key: &str) -> bool {
        (self.docs && DOC_KEYS.contains(&key))
            || (self.examples && EXAMPLE_KEYS.contains(&key))
            || (self.extensions && key.starts_with(EXTENSION_PREFIX))
    }
}

pub fn prune(node: &mut Value, options: PruneOptions) {
    if options.is_noop() {
        return;
    }
    walk(node, options);
}

fn walk(node: &mut Value, options: PruneOptions) {
    match node {
        Value::Object(map) => {
            map.retain(|key, _| !options.drops(key));
            for (key, value) in map.iter_mut() {
                match (key.as_str(), value) {
                    (PROPERTIES_KEY, Value::Object(properties)) => {
                        for property in properties.values_mut() {
                            walk(property, options);
                        }
                    }
                    (_, value) => walk(value, options),
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk(item, options);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}
