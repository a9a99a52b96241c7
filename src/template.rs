use crate::event::HandlerRef;
use core::fmt::{self, Display, Formatter};

/// A typed property value.
///
/// Attributes are always strings; properties carry one of these instead, so that a
/// boolean or numeric binding survives the trip into the widget tree without a
/// round trip through string serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Text(Box<str>),
	Flag(bool),
	Number(f64),
}
impl Value {
	#[must_use]
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(text) => Some(text),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_flag(&self) -> Option<bool> {
		match self {
			Value::Flag(flag) => Some(*flag),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(number) => Some(*number),
			_ => None,
		}
	}
}
impl From<&str> for Value {
	fn from(text: &str) -> Self {
		Value::Text(text.into())
	}
}
impl From<String> for Value {
	fn from(text: String) -> Self {
		Value::Text(text.into())
	}
}
impl From<bool> for Value {
	fn from(flag: bool) -> Self {
		Value::Flag(flag)
	}
}
impl From<f64> for Value {
	fn from(number: f64) -> Self {
		Value::Number(number)
	}
}
#[allow(clippy::cast_precision_loss)]
impl From<usize> for Value {
	fn from(number: usize) -> Self {
		Value::Number(number as f64)
	}
}

/// An opaque sibling identity.
///
/// Keys are compared, hashed and reported in errors, but never otherwise interpreted.
/// When present they must be unique within one sibling list; see
/// [`DiffError::DuplicateKey`](`crate::error::DiffError::DuplicateKey`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Number(u64),
	Text(Box<str>),
}
impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Key::Number(number) => write!(f, "{}", number),
			Key::Text(text) => write!(f, "{:?}", text),
		}
	}
}
impl From<u64> for Key {
	fn from(number: u64) -> Self {
		Key::Number(number)
	}
}
impl From<&str> for Key {
	fn from(text: &str) -> Self {
		Key::Text(text.into())
	}
}
impl From<String> for Key {
	fn from(text: String) -> Self {
		Key::Text(text.into())
	}
}

/// A plain string attribute, as externally visible on a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: Box<str>,
	pub value: Box<str>,
}

/// A typed property passthrough, delivered to the widget without string serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
	pub name: Box<str>,
	pub value: Value,
}

/// Binds a registered handler to an event kind on one widget.
///
/// Bind order is preserved into the widget and determines delivery order on dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventBinding {
	pub event: Box<str>,
	pub handler: HandlerRef,
}

/// One node of a tree description.
///
/// Descriptions are produced fresh on every render pass and never mutated in place;
/// the [`TreeDiffer`](`crate::diff::TreeDiffer`) compares two of them to derive patch
/// operations for the retained widget tree.
///
/// Children may be embedded positionally (no [`Key`]s, pairing by index across
/// renders) or keyed (every child carries a [`Key`], identity follows the key across
/// reorders). Which one to use is the caller's contract about whether child widgets
/// hold state of their own; it is not an implementation detail of the differ.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeDescription {
	pub tag: Box<str>,
	pub key: Option<Key>,
	pub attributes: Vec<Attribute>,
	pub properties: Vec<Property>,
	pub event_bindings: Vec<EventBinding>,
	pub children: Vec<TreeDescription>,
}
impl TreeDescription {
	#[must_use]
	pub fn new(tag: impl Into<Box<str>>) -> Self {
		Self {
			tag: tag.into(),
			key: None,
			attributes: Vec::new(),
			properties: Vec::new(),
			event_bindings: Vec::new(),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn attribute(mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
		self.attributes.push(Attribute {
			name: name.into(),
			value: value.into(),
		});
		self
	}

	/// Boolean-presence binding: the attribute is included (with an empty value) when
	/// `present` is `true` and omitted entirely otherwise.
	#[must_use]
	pub fn flag(mut self, name: impl Into<Box<str>>, present: bool) -> Self {
		if present {
			self.attributes.push(Attribute {
				name: name.into(),
				value: "".into(),
			});
		}
		self
	}

	#[must_use]
	pub fn property(mut self, name: impl Into<Box<str>>, value: impl Into<Value>) -> Self {
		self.properties.push(Property {
			name: name.into(),
			value: value.into(),
		});
		self
	}

	#[must_use]
	pub fn on(mut self, event: impl Into<Box<str>>, handler: HandlerRef) -> Self {
		self.event_bindings.push(EventBinding {
			event: event.into(),
			handler,
		});
		self
	}

	#[must_use]
	pub fn child(mut self, child: TreeDescription) -> Self {
		self.children.push(child);
		self
	}

	#[must_use]
	pub fn children(mut self, children: impl IntoIterator<Item = TreeDescription>) -> Self {
		self.children.extend(children);
		self
	}

	#[must_use]
	pub fn attribute_value(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|attribute| &*attribute.name == name)
			.map(|attribute| &*attribute.value)
	}

	#[must_use]
	pub fn property_value(&self, name: &str) -> Option<&Value> {
		self.properties
			.iter()
			.find(|property| &*property.name == name)
			.map(|property| &property.value)
	}
}
