//! A deferred backend for tests: expressions are a small JSON query AST
//! evaluated in-process, one batch at a time, with a call counter so tests
//! can assert on round-trips.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use deferql::{
    AbstractCandidate, DeferredBackend, Error, ExpandedChild, ExpandedChildren, ExpandedConcrete, ExprSetter,
    QueryPathSegment, SelectedField,
};
use serde_json::{json, Value};

const ERROR_KEY: &str = "__deferredError";

/// An expression the mock database can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExpr {
    /// A literal value.
    Lit(Value),
    /// Select a property of an object.
    Get(Box<JsonExpr>, String),
    /// The element bound by the `n`th enclosing `Map`, innermost first.
    Var(usize),
    /// Map the body over every element of an array.
    Map(Box<JsonExpr>, Box<JsonExpr>),
    /// Build an object with the given entries.
    Object(Vec<(String, JsonExpr)>),
    /// Branch on the source's `__typename`: evaluate the entries of the
    /// matching case, always carrying the type tag along.
    TypeCase(Box<JsonExpr>, Vec<(String, Vec<(String, JsonExpr)>)>),
    /// Concatenate string results.
    Concat(Vec<JsonExpr>),
    /// Evaluate to an embedded error annotation.
    Fail(String),
}

impl JsonExpr {
    pub fn lit(value: impl Into<Value>) -> Self {
        JsonExpr::Lit(value.into())
    }

    #[must_use]
    pub fn get(self, field: impl Into<String>) -> Self {
        JsonExpr::Get(Box::new(self), field.into())
    }

    pub fn concat(parts: impl IntoIterator<Item = JsonExpr>) -> Self {
        JsonExpr::Concat(parts.into_iter().collect())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        JsonExpr::Fail(message.into())
    }
}

fn error_value(message: &str) -> Value {
    json!({ ERROR_KEY: message })
}

fn is_error(value: &Value) -> bool {
    value.get(ERROR_KEY).is_some()
}

fn eval(expr: &JsonExpr, env: &mut Vec<Value>) -> Value {
    match expr {
        JsonExpr::Lit(value) => value.clone(),
        JsonExpr::Get(parent, key) => {
            let parent = eval(parent, env);
            if is_error(&parent) {
                return parent;
            }
            parent.get(key).cloned().unwrap_or(Value::Null)
        }
        JsonExpr::Var(level) => env
            .len()
            .checked_sub(1 + level)
            .and_then(|index| env.get(index))
            .cloned()
            .unwrap_or(Value::Null),
        JsonExpr::Map(source, body) => {
            let source = eval(source, env);
            if is_error(&source) || source.is_null() {
                return source;
            }
            let Value::Array(elements) = source else {
                return Value::Null;
            };
            let mut mapped = Vec::with_capacity(elements.len());
            for element in elements {
                env.push(element);
                mapped.push(eval(body, env));
                env.pop();
            }
            Value::Array(mapped)
        }
        JsonExpr::Object(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (key, entry) in entries {
                map.insert(key.clone(), eval(entry, env));
            }
            Value::Object(map)
        }
        JsonExpr::TypeCase(source, cases) => {
            let source = eval(source, env);
            if is_error(&source) || source.is_null() {
                return source;
            }
            let typename = source.get("__typename").cloned().unwrap_or(Value::Null);
            let mut map = serde_json::Map::new();
            map.insert("__typename".to_string(), typename.clone());
            if let Some(type_name) = typename.as_str() {
                if let Some((_, entries)) = cases.iter().find(|(name, _)| name == type_name) {
                    for (key, entry) in entries {
                        map.insert(key.clone(), eval(entry, env));
                    }
                }
            }
            Value::Object(map)
        }
        JsonExpr::Concat(parts) => {
            let mut joined = String::new();
            for part in parts {
                let part = eval(part, env);
                if is_error(&part) {
                    return part;
                }
                match part {
                    Value::Null => return Value::Null,
                    Value::String(s) => joined.push_str(&s),
                    other => joined.push_str(&other.to_string()),
                }
            }
            Value::String(joined)
        }
        JsonExpr::Fail(message) => error_value(message),
    }
}

/// Wraps the entry body into one `Map` per list layer; the innermost body
/// sees the element as `Var(0)`.
fn wrap_in_maps(parent: &JsonExpr, list_depth: usize, body: JsonExpr) -> JsonExpr {
    let mut expr = body;
    for level in 0..list_depth {
        let source = if level == list_depth - 1 {
            parent.clone()
        } else {
            JsonExpr::Var(0)
        };
        expr = JsonExpr::Map(Box::new(source), Box::new(expr));
    }
    expr
}

fn element_source(parent: &JsonExpr, list_depth: usize) -> JsonExpr {
    if list_depth == 0 {
        parent.clone()
    } else {
        JsonExpr::Var(0)
    }
}

#[derive(Default)]
struct Inner {
    calls: AtomicUsize,
    fail_next: Mutex<Option<String>>,
}

/// The mock backend. Cheap to clone; clones share the call counter, so a
/// test can keep a handle after handing the backend to a schema.
#[derive(Clone, Default)]
pub struct JsonBackend {
    inner: Arc<Inner>,
}

impl JsonBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many batches have been submitted so far.
    pub fn batch_calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Make the next batch fail wholesale with the given message.
    pub fn fail_next_batch(&self, message: impl Into<String>) {
        *self.inner.fail_next.lock().unwrap() = Some(message.into());
    }
}

#[async_trait::async_trait]
impl DeferredBackend for JsonBackend {
    type Expr = JsonExpr;

    fn lit(&self, value: Value) -> JsonExpr {
        JsonExpr::Lit(value)
    }

    fn project(&self, parent: &JsonExpr, field: &str) -> JsonExpr {
        parent.clone().get(field)
    }

    async fn resolve_deferred(&self, batch: Vec<JsonExpr>) -> Result<Vec<Value>, Error> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.inner.fail_next.lock().unwrap().take() {
            return Err(Error::new(message));
        }
        Ok(batch.iter().map(|expr| eval(expr, &mut Vec::new())).collect())
    }

    fn expand_children(
        &self,
        parent: &JsonExpr,
        list_depth: usize,
        fields: &[SelectedField],
        set_parent: ExprSetter<JsonExpr>,
    ) -> Result<ExpandedChildren<JsonExpr>, Error> {
        let entries: Arc<Mutex<Vec<(String, JsonExpr)>>> = Arc::new(Mutex::new(Vec::new()));
        let source = element_source(parent, list_depth);

        let children = fields
            .iter()
            .map(|field| {
                let key = field.response_key.clone();
                let entries = Arc::clone(&entries);
                let set_parent = Arc::clone(&set_parent);
                let parent = parent.clone();
                let set_data: ExprSetter<JsonExpr> = Arc::new(move |expr| {
                    let mut entries = entries.lock().unwrap();
                    match entries.iter_mut().find(|(name, _)| *name == key) {
                        Some((_, slot)) => *slot = expr,
                        None => entries.push((key.clone(), expr)),
                    }
                    let body = JsonExpr::Object(entries.clone());
                    set_parent(wrap_in_maps(&parent, list_depth, body));
                });
                ExpandedChild {
                    response_key: field.response_key.clone(),
                    source: source.clone(),
                    set_data,
                }
            })
            .collect();

        Ok(ExpandedChildren {
            appended: vec![QueryPathSegment::Flatten; list_depth],
            children,
        })
    }

    fn expand_abstract_type(
        &self,
        parent: &JsonExpr,
        _abstract_type: &str,
        candidates: &[AbstractCandidate],
        list_depth: usize,
        set_parent: ExprSetter<JsonExpr>,
    ) -> Result<Vec<ExpandedConcrete<JsonExpr>>, Error> {
        let cases: Arc<Mutex<Vec<(String, Vec<(String, JsonExpr)>)>>> = Arc::new(Mutex::new(
            candidates
                .iter()
                .map(|candidate| (candidate.type_name.clone(), Vec::new()))
                .collect(),
        ));
        let source = element_source(parent, list_depth);

        let expanded = candidates
            .iter()
            .map(|candidate| {
                let children = candidate
                    .fields
                    .iter()
                    .map(|field| {
                        let key = field.response_key.clone();
                        let type_name = candidate.type_name.clone();
                        let cases = Arc::clone(&cases);
                        let set_parent = Arc::clone(&set_parent);
                        let parent = parent.clone();
                        let case_source = source.clone();
                        let set_data: ExprSetter<JsonExpr> = Arc::new(move |expr| {
                            let mut cases = cases.lock().unwrap();
                            if let Some((_, entries)) = cases.iter_mut().find(|(name, _)| *name == type_name) {
                                match entries.iter_mut().find(|(name, _)| *name == key) {
                                    Some((_, slot)) => *slot = expr,
                                    None => entries.push((key.clone(), expr)),
                                }
                            }
                            let body =
                                JsonExpr::TypeCase(Box::new(case_source.clone()), cases.clone());
                            set_parent(wrap_in_maps(&parent, list_depth, body));
                        });
                        ExpandedChild {
                            response_key: field.response_key.clone(),
                            source: source.clone(),
                            set_data,
                        }
                    })
                    .collect();
                ExpandedConcrete {
                    type_name: candidate.type_name.clone(),
                    appended: vec![QueryPathSegment::Flatten; list_depth],
                    children,
                }
            })
            .collect();

        Ok(expanded)
    }

    fn error_message(&self, value: &Value) -> Option<String> {
        value.get(ERROR_KEY).and_then(Value::as_str).map(str::to_string)
    }
}
