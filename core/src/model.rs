//! Generic response model: decoded JSON wrapped into `Model` objects.
//!
//! # Design
//! `materialize` walks a `serde_json::Value` once. Mappings become `Model`s,
//! sequences whose first element is a mapping become `ModelValue::List`,
//! everything else is kept as a `ModelValue::Scalar`. `Model::serialize` is
//! the exact inverse for payloads without `_`-prefixed keys.
//!
//! Every `Model` carries a `ClientHandle` so resources built on top of it
//! can call back into the client that fetched them. The handle is weak and
//! never serialized.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};

use crate::client::ClientHandle;

/// Keys starting with this prefix are internal and never serialized.
pub const INTERNAL_PREFIX: char = '_';

const ANNOTATIONS: &str = "annotations";

/// A materialized JSON value.
#[derive(Clone, PartialEq)]
pub enum ModelValue {
    /// Strings, numbers, booleans, null, and sequences that do not start with a mapping.
    Scalar(Value),
    Object(Model),
    List(Vec<ModelValue>),
}

impl ModelValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ModelValue::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ModelValue::Scalar(v) => v.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            ModelValue::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            ModelValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ModelValue::Scalar(Value::Null))
    }

    /// Plain JSON for this value.
    pub fn serialize(&self) -> Value {
        match self {
            ModelValue::Scalar(v) => v.clone(),
            ModelValue::Object(m) => m.serialize(),
            ModelValue::List(items) => Value::Array(items.iter().map(ModelValue::serialize).collect()),
        }
    }
}

impl fmt::Debug for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Scalar(v) => write!(f, "{v}"),
            ModelValue::Object(m) => m.fmt(f),
            ModelValue::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<Value> for ModelValue {
    fn from(value: Value) -> Self {
        ModelValue::Scalar(value)
    }
}

impl From<Model> for ModelValue {
    fn from(model: Model) -> Self {
        ModelValue::Object(model)
    }
}

impl From<&str> for ModelValue {
    fn from(value: &str) -> Self {
        ModelValue::Scalar(Value::from(value))
    }
}

impl From<String> for ModelValue {
    fn from(value: String) -> Self {
        ModelValue::Scalar(Value::from(value))
    }
}

/// Recursively wrap a decoded JSON value.
pub fn materialize(raw: Value, client: &ClientHandle) -> ModelValue {
    match raw {
        Value::Object(map) => ModelValue::Object(Model::from_map(map, client)),
        Value::Array(items) if matches!(items.first(), Some(Value::Object(_))) => {
            ModelValue::List(items.into_iter().map(|item| materialize(item, client)).collect())
        }
        other => ModelValue::Scalar(other),
    }
}

fn annotation_index(entries: Option<&ModelValue>, client: &ClientHandle) -> BTreeMap<String, Vec<ModelValue>> {
    let mut index: BTreeMap<String, Vec<ModelValue>> = BTreeMap::new();
    let Some(ModelValue::List(entries)) = entries else {
        return index;
    };
    for entry in entries {
        let Some(annotation) = entry.as_model() else {
            continue;
        };
        let Some(kind) = annotation.get_str("type") else {
            continue;
        };
        let value = annotation
            .get("value")
            .cloned()
            .unwrap_or_else(|| ModelValue::Object(Model::new(client)));
        index.entry(kind.to_string()).or_default().push(value);
    }
    index
}

/// Mutable borrow of one `Model` field, returned by [`Model::get_mut`].
pub struct FieldMut<'a> {
    value: &'a mut ModelValue,
    index: Option<(&'a mut BTreeMap<String, Vec<ModelValue>>, &'a ClientHandle)>,
}

impl Deref for FieldMut<'_> {
    type Target = ModelValue;

    fn deref(&self) -> &ModelValue {
        self.value
    }
}

impl DerefMut for FieldMut<'_> {
    fn deref_mut(&mut self) -> &mut ModelValue {
        self.value
    }
}

impl Drop for FieldMut<'_> {
    fn drop(&mut self) {
        if let Some((index, client)) = self.index.take() {
            *index = annotation_index(Some(&*self.value), client);
        }
    }
}

/// A JSON mapping with accessor methods and an annotation index.
#[derive(Clone, Default)]
pub struct Model {
    fields: BTreeMap<String, ModelValue>,
    annotations: BTreeMap<String, Vec<ModelValue>>,
    client: ClientHandle,
}

impl Model {
    pub fn new(client: &ClientHandle) -> Self {
        Self {
            client: client.clone(),
            ..Self::default()
        }
    }

    /// Wrap a decoded JSON mapping.
    pub fn from_map(map: Map<String, Value>, client: &ClientHandle) -> Self {
        let fields = map
            .into_iter()
            .map(|(key, value)| (key, materialize(value, client)))
            .collect();
        let mut model = Self {
            fields,
            annotations: BTreeMap::new(),
            client: client.clone(),
        };
        model.index_annotations();
        model
    }

    /// Wrap any decoded JSON value that should be a mapping. `null` gives an empty model.
    pub fn from_value(raw: Value, client: &ClientHandle) -> Result<Self, crate::PnutError> {
        match raw {
            Value::Object(map) => Ok(Self::from_map(map, client)),
            Value::Null => Ok(Self::new(client)),
            other => Err(crate::PnutError::conversion(
                "data",
                format!("expected an object, got {other}"),
            )),
        }
    }

    fn index_annotations(&mut self) {
        self.annotations = annotation_index(self.fields.get(ANNOTATIONS), &self.client);
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.fields.get(key)
    }

    /// Mutable access to a field. Edits made through `annotations` are
    /// reindexed when the guard is dropped.
    pub fn get_mut(&mut self, key: &str) -> Option<FieldMut<'_>> {
        let Self {
            fields,
            annotations,
            client,
        } = self;
        let value = fields.get_mut(key)?;
        let index = (key == ANNOTATIONS).then_some((annotations, &*client));
        Some(FieldMut { value, index })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ModelValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ModelValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ModelValue::as_bool)
    }

    pub fn get_model(&self, key: &str) -> Option<&Model> {
        self.get(key).and_then(ModelValue::as_model)
    }

    pub fn get_list(&self, key: &str) -> Option<&[ModelValue]> {
        self.get(key).and_then(ModelValue::as_list)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field. Replacing `annotations` rebuilds the annotation index.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ModelValue>) -> Option<ModelValue> {
        let key = key.into();
        let reindex = key == ANNOTATIONS;
        let previous = self.fields.insert(key, value.into());
        if reindex {
            self.index_annotations();
        }
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<ModelValue> {
        let removed = self.fields.remove(key);
        if key == ANNOTATIONS {
            self.index_annotations();
        }
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All values of annotations with `annotation_type`, in payload order.
    pub fn get_annotation(&self, annotation_type: &str) -> Option<&[ModelValue]> {
        self.annotations
            .get(annotation_type)
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }

    /// The first value of annotations with `annotation_type`.
    pub fn get_annotation_one(&self, annotation_type: &str) -> Option<&ModelValue> {
        self.get_annotation(annotation_type).and_then(|values| values.first())
    }

    /// Plain JSON without internal keys or the client handle.
    pub fn serialize(&self) -> Value {
        Value::Object(self.serialize_map())
    }

    pub(crate) fn serialize_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| !key.starts_with(INTERNAL_PREFIX))
            .map(|(key, value)| (key.clone(), value.serialize()))
            .collect()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}
