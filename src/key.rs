//! Cache key derivation.
//!
//! A call is identified by the arguments it binds to after resolution
//! against the computation's [`Signature`]: defaults are filled in, keyword
//! and positional arguments naming the same parameter are equivalent, and
//! argument order is irrelevant. The bound mapping is encoded as JSON with
//! object members sorted by name and prefixed with the registered name.

use std::collections::BTreeMap;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::CacheError;

/// One named parameter of a computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    default: Option<Value>,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// The parameter list a computation is called with.
///
/// # Example
/// ```ignore
/// // fn report(region, days = 7, *extra, **filters)
/// let sig = Signature::new()
///     .required("region")
///     .optional("days", 7)
///     .var_positional("extra")
///     .var_keyword("filters");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    var_positional: Option<String>,
    var_keyword: Option<String>,
}

impl Signature {
    pub fn new() -> Self {
        Signature::default()
    }

    /// Append a parameter without a default.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Append a parameter with a default value.
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Collect surplus positional arguments into an array bound to `name`.
    pub fn var_positional(mut self, name: impl Into<String>) -> Self {
        self.var_positional = Some(name.into());
        self
    }

    /// Collect unknown keyword arguments into an object bound to `name`.
    pub fn var_keyword(mut self, name: impl Into<String>) -> Self {
        self.var_keyword = Some(name.into());
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Check that every parameter and collector name is distinct.
    pub fn validate(&self) -> Result<(), CacheError> {
        let mut seen = std::collections::BTreeSet::new();
        let names = self
            .params
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.var_positional.as_deref())
            .chain(self.var_keyword.as_deref());

        for name in names {
            if !seen.insert(name) {
                return Err(CacheError::InvalidOptions(format!(
                    "duplicate parameter '{}' in signature",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Resolve call arguments to a mapping from parameter name to value.
    pub fn bind(&self, args: CallArgs) -> Result<BoundArgs, CacheError> {
        let given = args.positional.len();
        let mut bound = BTreeMap::new();
        let mut positional = args.positional.into_iter();

        for (param, value) in self.params.iter().zip(positional.by_ref()) {
            bound.insert(param.name.clone(), value);
        }

        let surplus: Vec<Value> = positional.collect();
        if !surplus.is_empty() && self.var_positional.is_none() {
            return Err(CacheError::Binding(format!(
                "takes {} positional arguments but {} were given",
                self.params.len(),
                given
            )));
        }

        let mut extra_keywords = Map::new();
        for (name, value) in args.keyword {
            if self.has_param(&name) {
                if bound.contains_key(&name) {
                    return Err(CacheError::Binding(format!(
                        "got multiple values for argument '{}'",
                        name
                    )));
                }
                bound.insert(name, value);
            } else if self.var_keyword.is_some() {
                if extra_keywords.contains_key(&name) {
                    return Err(CacheError::Binding(format!(
                        "got multiple values for keyword argument '{}'",
                        name
                    )));
                }
                extra_keywords.insert(name, value);
            } else {
                return Err(CacheError::Binding(format!(
                    "got an unexpected keyword argument '{}'",
                    name
                )));
            }
        }

        let mut missing = Vec::new();
        for param in &self.params {
            if bound.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    bound.insert(param.name.clone(), default.clone());
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }
        if !missing.is_empty() {
            return Err(CacheError::Binding(format!(
                "missing required argument(s): {}",
                missing.join(", ")
            )));
        }

        if let Some(name) = &self.var_positional {
            bound.insert(name.clone(), Value::Array(surplus));
        }
        if let Some(name) = &self.var_keyword {
            bound.insert(name.clone(), Value::Object(extra_keywords));
        }

        Ok(BoundArgs(bound))
    }
}

/// Arguments of a single call, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        CallArgs::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Append a positional argument of any serializable type.
    pub fn try_arg<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, CacheError> {
        Ok(self.arg(to_value(value)?))
    }

    /// Append a keyword argument of any serializable type.
    pub fn try_kwarg<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, CacheError> {
        Ok(self.kwarg(name, to_value(value)?))
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, CacheError> {
    serde_json::to_value(value)
        .map_err(|e| CacheError::Serialization(format!("Argument serialization failed: {}", e)))
}

/// Arguments resolved against a [`Signature`], keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs(BTreeMap<String, Value>);

impl BoundArgs {
    /// Raw value bound to `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Deserialize the value bound to `name`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CacheError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| CacheError::Binding(format!("no argument named '{}'", name)))?;
        T::deserialize(value).map_err(|e| {
            CacheError::Serialization(format!("Argument '{}' has the wrong type: {}", name, e))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON encoding with every object's members sorted by name.
    pub fn canonical_json(&self) -> String {
        let object = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect::<Map<_, _>>();
        Value::Object(object).to_string()
    }
}

// `Map` keeps insertion order when serde_json's `preserve_order` feature is
// unified into the build, so nested objects are rebuilt in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Build the cache key for already-bound arguments.
///
/// Format: `@{name}_{canonical json}`
pub fn derive_key(name: &str, bound: &BoundArgs) -> String {
    format!("@{}_{}", name, bound.canonical_json())
}

/// Bind `args` against `signature` and build the cache key.
pub fn derive(name: &str, signature: &Signature, args: CallArgs) -> Result<String, CacheError> {
    let bound = signature.bind(args)?;
    Ok(derive_key(name, &bound))
}
