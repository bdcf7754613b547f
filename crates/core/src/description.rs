//! Immutable description trees.
//!
//! A [`Description`] is the declarative input of a render: a type tag, a
//! property map and an ordered list of child descriptions. Descriptions are
//! built fresh for every render and never mutated afterwards; cloning one
//! only bumps a reference count.

use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;
use crate::result::Result;
use crate::value::{PropValue, Props};

/// Property key holding the value of a text description.
pub const TEXT_VALUE_KEY: &str = "nodeValue";

/// Reserved key for child descriptions. Never forwarded to a host.
pub const CHILDREN_KEY: &str = "children";

/// Type tag of a description.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    /// A host element kind such as `div`.
    Host(String),
    /// The canonical text kind produced for primitive children.
    Text,
}

impl ElementType {
    /// Tag used when a text kind is printed or serialized.
    pub const TEXT_TAG: &'static str = "#text";

    /// Create a host element tag.
    pub fn host(name: impl Into<String>) -> Self {
        Self::Host(name.into())
    }

    /// Whether this is the text kind.
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Tag as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Host(name) => name,
            Self::Text => Self::TEXT_TAG,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElementType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for ElementType {
    fn from(name: &str) -> Self {
        Self::host(name)
    }
}

impl From<String> for ElementType {
    fn from(name: String) -> Self {
        Self::Host(name)
    }
}

#[derive(Debug, PartialEq)]
struct Node {
    kind: ElementType,
    props: Props,
    children: Vec<Description>,
}

/// An immutable node of a declarative tree.
#[derive(Clone, PartialEq)]
pub struct Description(Rc<Node>);

impl Description {
    /// Type tag.
    pub fn kind(&self) -> &ElementType {
        &self.0.kind
    }

    /// Properties, excluding children.
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    /// Ordered child descriptions.
    pub fn children(&self) -> &[Self] {
        &self.0.children
    }

    /// Whether both values share the same underlying node.
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        self.children()
            .iter()
            .map(Self::node_count)
            .fold(1, usize::saturating_add)
    }

    /// Load a description from a JSON value.
    ///
    /// Objects take the form `{"type": "div", "props": {...}, "children": [...]}`.
    /// Children may also be given under `props.children`. Strings, numbers
    /// and booleans become text descriptions; `null` children are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescription`] when the type tag is missing,
    /// `props` is not a mapping, or a value cannot be represented.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) => Self::from_json_object(object),
            Value::Null | Value::Array(_) => Err(Error::malformed(format!(
                "expected an object or primitive, found {value}"
            ))),
            primitive => json_primitive(primitive).map(text),
        }
    }

    /// Parse and load a description from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on invalid JSON and
    /// [`Error::MalformedDescription`] on an invalid tree.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_json(&value)
    }

    fn from_json_object(object: &Map<String, Value>) -> Result<Self> {
        let kind = match object.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(Error::malformed(format!("type tag must be a string, found {other}")));
            }
            None => return Err(Error::malformed("missing type tag")),
        };

        let props_object = match object.get("props") {
            None | Some(Value::Null) => None,
            Some(Value::Object(props)) => Some(props),
            Some(other) => {
                return Err(Error::malformed(format!(
                    "props of '{kind}' must be a mapping, found {other}"
                )));
            }
        };

        let mut props = Props::new();
        for (key, value) in props_object.into_iter().flatten() {
            if key != CHILDREN_KEY {
                props.insert(key.clone(), json_prop(&kind, key, value)?);
            }
        }

        let children_value = object
            .get(CHILDREN_KEY)
            .or_else(|| props_object.and_then(|props| props.get(CHILDREN_KEY)));
        let children = match children_value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(Self::from_json)
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::malformed(format!(
                    "children of '{kind}' must be a list, found {other}"
                )));
            }
        };

        build(
            kind.as_str(),
            props,
            children.into_iter().map(Child::Node),
        )
    }
}

impl fmt::Debug for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Description")
            .field("kind", self.kind())
            .field("props", self.props())
            .field("children", &self.children())
            .finish()
    }
}

fn json_primitive(value: &Value) -> Result<PropValue> {
    match value {
        Value::Null => Ok(PropValue::Null),
        Value::Bool(flag) => Ok(PropValue::Bool(*flag)),
        Value::Number(number) => number
            .as_f64()
            .map(PropValue::Number)
            .ok_or_else(|| Error::malformed(format!("number {number} is not representable"))),
        Value::String(text) => Ok(PropValue::Str(text.clone())),
        other => Err(Error::malformed(format!("expected a primitive, found {other}"))),
    }
}

fn json_prop(kind: &str, key: &str, value: &Value) -> Result<PropValue> {
    json_primitive(value).map_err(|_| {
        Error::malformed(format!(
            "property '{key}' of '{kind}' must be null, a boolean, a number or a string"
        ))
    })
}

/// One argument in a builder's child list.
#[derive(Clone, Debug)]
pub enum Child {
    /// A nested description.
    Node(Description),
    /// A primitive value, wrapped into a text description.
    Value(PropValue),
}

impl From<Description> for Child {
    fn from(node: Description) -> Self {
        Self::Node(node)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Self::Value(value.into())
    }
}

impl From<bool> for Child {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

/// Build a normalized description.
///
/// Primitive children are wrapped into text descriptions and `Null`
/// children are dropped. A `children` entry in `props` is discarded in
/// favour of the explicit child list.
///
/// # Errors
///
/// Returns [`Error::MalformedDescription`] when the type tag is empty, a
/// child is an event handler, or a text kind is given children.
pub fn build<I>(kind: impl Into<ElementType>, props: Props, children: I) -> Result<Description>
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    let kind = kind.into();
    if kind.as_str().is_empty() {
        return Err(Error::malformed("missing type tag"));
    }

    let mut props = props;
    if props.remove(CHILDREN_KEY).is_some() {
        debug!(kind = %kind, "discarding 'children' property in favour of child list");
    }

    let children = children
        .into_iter()
        .map(Into::<Child>::into)
        .filter_map(|child| match child {
            Child::Node(node) => Some(Ok(node)),
            Child::Value(PropValue::Null) => None,
            Child::Value(value) if value.is_primitive() => Some(Ok(text(value))),
            Child::Value(_) => Some(Err(Error::malformed(format!(
                "event handler passed as a child of '{kind}'"
            )))),
        })
        .collect::<Result<Vec<_>>>()?;

    if kind.is_text() && !children.is_empty() {
        return Err(Error::malformed("text descriptions cannot have children"));
    }

    Ok(Description(Rc::new(Node {
        kind,
        props,
        children,
    })))
}

/// Build a leaf element without properties or children.
///
/// # Errors
///
/// Returns [`Error::MalformedDescription`] when the type tag is empty.
pub fn leaf(kind: impl Into<ElementType>) -> Result<Description> {
    build(kind, Props::new(), Vec::<Child>::new())
}

/// Wrap a primitive value into the canonical text description.
pub fn text(value: impl Into<PropValue>) -> Description {
    Description(Rc::new(Node {
        kind: ElementType::Text,
        props: Props::new().with(TEXT_VALUE_KEY, value),
        children: Vec::new(),
    }))
}
