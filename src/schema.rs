use crate::{error::ParseError, template::Value};
use hashbrown::HashMap;
use std::rc::Rc;

/// How an attribute's string representation maps onto a typed property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
	/// Passthrough. An absent attribute parses as the empty string.
	Text,
	/// The attribute's presence encodes the boolean; its value is ignored.
	FlagPresence,
	/// Numeric parse of the attribute value. Absent or malformed values fail with
	/// [`ParseError`] and leave the property untouched.
	Number,
}
impl ValueKind {
	pub fn parse(self, name: &str, raw: Option<&str>) -> Result<Value, ParseError> {
		match self {
			ValueKind::Text => Ok(Value::Text(raw.unwrap_or("").into())),
			ValueKind::FlagPresence => Ok(Value::Flag(raw.is_some())),
			ValueKind::Number => match raw {
				Some(raw) => match raw.trim().parse::<f64>() {
					Ok(number) if number.is_finite() => Ok(Value::Number(number)),
					_ => Err(ParseError {
						name: name.into(),
						raw: Some(raw.into()),
					}),
				},
				None => Err(ParseError {
					name: name.into(),
					raw: None,
				}),
			},
		}
	}

	#[must_use]
	pub fn default_value(self) -> Value {
		match self {
			ValueKind::Text => Value::Text("".into()),
			ValueKind::FlagPresence => Value::Flag(false),
			ValueKind::Number => Value::Number(0.0),
		}
	}
}

/// Serializes a property value back into its external attribute representation.
///
/// The inverse of [`ValueKind::parse`]: `None` means the attribute is absent, which
/// is how a `false` flag reflects.
#[must_use]
pub fn serialize(value: &Value) -> Option<Box<str>> {
	match value {
		Value::Text(text) => Some(text.clone()),
		Value::Flag(true) => Some("".into()),
		Value::Flag(false) => None,
		Value::Number(number) => Some(number.to_string().into()),
	}
}

/// One declared property of a component class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
	pub name: &'static str,
	pub kind: ValueKind,
	/// Whether property writes are mirrored back into the external attribute.
	pub reflect: bool,
}

#[must_use]
pub fn find<'a>(schema: &'a [PropertySchema], name: &str) -> Option<&'a PropertySchema> {
	schema.iter().find(|entry| entry.name == name)
}

/// Tag name → declared schema, as known to one differ.
///
/// Snapshotted off a [`ComponentRegistry`](`crate::registry::ComponentRegistry`) when
/// an instance is created; widgets for unlisted tags carry no schema and bridge
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
	entries: HashMap<Box<str>, Rc<[PropertySchema]>>,
}
impl SchemaMap {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, tag: impl Into<Box<str>>, schema: impl Into<Rc<[PropertySchema]>>) {
		self.entries.insert(tag.into(), schema.into());
	}

	#[must_use]
	pub fn get(&self, tag: &str) -> Option<Rc<[PropertySchema]>> {
		self.entries.get(tag).cloned()
	}
}
