//! Patch payloads.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{PatchError, Result};
use crate::value::Value;

use super::tag::{Tag, CLEAR_TAG};

/// A partial tree mirroring the shape of the value it updates.
#[derive(Debug, Clone)]
pub enum Patch {
    /// A non-composite value to assign.
    Scalar(Value),
    /// An array: merged element-wise, resizing the target.
    List(Vec<Patch>),
    /// A map: tags apply first, in order, then fields merge.
    Map {
        tags: Vec<Tag>,
        fields: IndexMap<String, Patch>,
    },
}

impl Patch {
    /// Parse a wire payload, validating every tag argument.
    pub fn parse(json: &Json) -> Result<Patch, PatchError> {
        Ok(match json {
            Json::Object(entries) => {
                let mut tags = Vec::new();
                let mut fields = IndexMap::new();
                for (key, arg) in entries {
                    match Tag::from_wire(key, arg)? {
                        Some(tag) => tags.push(tag),
                        None => {
                            fields.insert(key.clone(), Patch::parse(arg)?);
                        }
                    }
                }
                Patch::Map { tags, fields }
            }
            Json::Array(items) => {
                Patch::List(items.iter().map(Patch::parse).collect::<Result<_, _>>()?)
            }
            Json::String(s) if s == CLEAR_TAG => Patch::tag(Tag::Clear),
            scalar => Patch::Scalar(Value::from(scalar.clone())),
        })
    }

    /// A map carrying a single tag.
    pub fn tag(tag: Tag) -> Patch {
        Patch::Map {
            tags: vec![tag],
            fields: IndexMap::new(),
        }
    }

    /// A map of fields.
    pub fn fields<K, I>(fields: I) -> Patch
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Patch)>,
    {
        Patch::Map {
            tags: Vec::new(),
            fields: fields.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        }
    }

    /// Add a field, turning a non-map patch into a map.
    pub fn with_field(self, key: impl Into<String>, patch: Patch) -> Patch {
        let (tags, mut fields) = self.into_parts();
        fields.insert(key.into(), patch);
        Patch::Map { tags, fields }
    }

    /// Add a tag, turning a non-map patch into a map.
    pub fn with_tag(self, tag: Tag) -> Patch {
        let (mut tags, fields) = self.into_parts();
        tags.push(tag);
        Patch::Map { tags, fields }
    }

    fn into_parts(self) -> (Vec<Tag>, IndexMap<String, Patch>) {
        match self {
            Patch::Map { tags, fields } => (tags, fields),
            _ => (Vec::new(), IndexMap::new()),
        }
    }
}

impl From<Value> for Patch {
    /// Plain data merges into the target; it never carries tags.
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Patch::List(items.iter().cloned().map(Patch::from).collect()),
            Value::Object(map) => Patch::Map {
                tags: Vec::new(),
                fields: map
                    .iter()
                    .map(|(k, v)| (k.clone(), Patch::from(v.clone())))
                    .collect(),
            },
            scalar => Patch::Scalar(scalar),
        }
    }
}

/// One payload or an ordered list of payloads applied in sequence.
#[derive(Debug, Clone)]
pub enum Changes {
    One(Patch),
    Many(Vec<Patch>),
}

impl Changes {
    /// Parse a wire payload. A top-level array is a list of payloads.
    pub fn parse(json: &Json) -> Result<Changes, PatchError> {
        match json {
            Json::Array(items) => Ok(Changes::Many(
                items.iter().map(Patch::parse).collect::<Result<_, _>>()?,
            )),
            other => Patch::parse(other).map(Changes::One),
        }
    }

    /// Parse a textual JSON payload.
    pub fn from_json_str(source: &str) -> Result<Changes> {
        let json: Json = serde_json::from_str(source)?;
        Ok(Changes::parse(&json)?)
    }

    /// Payloads in application order.
    pub fn patches(&self) -> &[Patch] {
        match self {
            Changes::One(patch) => std::slice::from_ref(patch),
            Changes::Many(patches) => patches,
        }
    }
}

impl From<Patch> for Changes {
    fn from(patch: Patch) -> Self {
        Changes::One(patch)
    }
}

impl From<Vec<Patch>> for Changes {
    fn from(patches: Vec<Patch>) -> Self {
        Changes::Many(patches)
    }
}

impl From<Value> for Changes {
    fn from(value: Value) -> Self {
        Changes::One(Patch::from(value))
    }
}

impl TryFrom<&Json> for Changes {
    type Error = PatchError;

    fn try_from(json: &Json) -> Result<Self, Self::Error> {
        Changes::parse(json)
    }
}
