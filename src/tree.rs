use crate::{
	schema::{self, PropertySchema},
	template::{EventBinding, Value},
};
use core::convert::TryInto;
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{error, trace, warn};

/// Identifies one live widget in a [`WidgetTree`].
///
/// Slots are reused, but the generation tag makes a stale id resolve to nothing
/// rather than to whatever widget took the slot over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
	index: u32,
	generation: u32,
}
impl WidgetId {
	fn index(self) -> usize {
		self.index as usize
	}
}

/// One retained widget.
///
/// `attributes` is the externally visible string form; `properties` holds the *live*
/// typed values. The two can diverge: the platform distinguishes a declared value
/// from the current interactive one. An interactive write never reflects back into
/// the attribute and pins the live value against later attribute-driven syncs, the
/// way a toggle control ignores its declared default once the user has touched it.
/// Only a typed property patch overrides that pin. This split is the platform
/// behavior positional diffing is documented to expose.
#[derive(Debug)]
pub struct Widget {
	tag: Box<str>,
	schema: Option<Rc<[PropertySchema]>>,
	attributes: HashMap<Box<str>, Box<str>>,
	properties: HashMap<Box<str>, Value>,
	/// Property names with an interactive write since the last typed patch.
	interactive: HashSet<Box<str>>,
	bindings: Vec<EventBinding>,
	children: Vec<WidgetId>,
}
impl Widget {
	fn new(tag: Box<str>, schema: Option<Rc<[PropertySchema]>>) -> Self {
		Self {
			tag,
			schema,
			attributes: HashMap::new(),
			properties: HashMap::new(),
			interactive: HashSet::new(),
			bindings: Vec::new(),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(|value| &**value)
	}

	#[must_use]
	pub fn property(&self, name: &str) -> Option<&Value> {
		self.properties.get(name)
	}

	#[must_use]
	pub fn children(&self) -> &[WidgetId] {
		&self.children
	}

	pub(crate) fn bindings(&self) -> &[EventBinding] {
		&self.bindings
	}

	pub(crate) fn push_binding(&mut self, binding: EventBinding) {
		self.bindings.push(binding);
	}

	pub(crate) fn remove_binding(&mut self, binding: &EventBinding) -> bool {
		match self.bindings.iter().position(|bound| bound == binding) {
			Some(position) => {
				self.bindings.remove(position);
				true
			}
			None => {
				error!("Expected to remove binding {:?} of <{}> but it is not bound.", binding, self.tag);
				false
			}
		}
	}

	pub(crate) fn apply_attribute(&mut self, name: &str, value: &str) {
		if self.attributes.get(name).map(|current| &**current) == Some(value) {
			trace!("Attribute {:?} of <{}> unchanged.", name, self.tag);
			return;
		}
		self.attributes.insert(name.into(), value.into());
		self.parse_into_property(name, Some(value));
	}

	pub(crate) fn remove_attribute(&mut self, name: &str) {
		if self.attributes.remove(name).is_none() {
			trace!("Attribute {:?} of <{}> already absent.", name, self.tag);
			return;
		}
		self.parse_into_property(name, None);
	}

	fn parse_into_property(&mut self, name: &str, raw: Option<&str>) {
		let entry = match self.schema.as_deref().and_then(|schema| schema::find(schema, name)) {
			Some(entry) => entry,
			None => return,
		};
		if self.interactive.contains(name) {
			trace!("Property {:?} of <{}> was written interactively; the attribute only changes the declared value.", name, self.tag);
			return;
		}
		match entry.kind.parse(name, raw) {
			Ok(parsed) => {
				if self.properties.get(name) != Some(&parsed) {
					trace!("Bridging attribute {:?} of <{}> into its property.", name, self.tag);
					self.properties.insert(name.into(), parsed);
				}
			}
			Err(parse_error) => warn!("Keeping previous property value of <{}>: {}", self.tag, parse_error),
		}
	}

	pub(crate) fn apply_property(&mut self, name: &str, value: &Value) {
		self.interactive.remove(name);
		if self.properties.get(name) == Some(value) {
			trace!("Property {:?} of <{}> unchanged.", name, self.tag);
			return;
		}
		self.properties.insert(name.into(), value.clone());
		if self.reflects(name) {
			match schema::serialize(value) {
				Some(serialized) => {
					if self.attributes.get(name).map(|current| &**current) != Some(&*serialized) {
						self.attributes.insert(name.into(), serialized);
					}
				}
				None => {
					self.attributes.remove(name);
				}
			}
		}
	}

	pub(crate) fn remove_property(&mut self, name: &str) {
		self.interactive.remove(name);
		if self.properties.remove(name).is_none() {
			trace!("Property {:?} of <{}> already absent.", name, self.tag);
			return;
		}
		if self.reflects(name) {
			self.attributes.remove(name);
		}
	}

	fn reflects(&self, name: &str) -> bool {
		self.schema
			.as_deref()
			.and_then(|schema| schema::find(schema, name))
			.map_or(false, |entry| entry.reflect)
	}
}

#[derive(Debug)]
struct Slot {
	generation: u32,
	widget: Option<Widget>,
}

/// The retained widget tree of one component instance.
///
/// A generational slot arena with a free pool; the root container widget exists for
/// the tree's whole lifetime and hosts the instance's committed children.
#[derive(Debug)]
pub struct WidgetTree {
	slots: Vec<Slot>,
	free: Vec<u32>,
	root: WidgetId,
}
impl WidgetTree {
	#[must_use]
	pub(crate) fn new() -> Self {
		Self {
			slots: vec![Slot {
				generation: 0,
				widget: Some(Widget::new("#root".into(), None)),
			}],
			free: Vec::new(),
			root: WidgetId { index: 0, generation: 0 },
		}
	}

	#[must_use]
	pub fn root(&self) -> WidgetId {
		self.root
	}

	#[must_use]
	pub fn get(&self, id: WidgetId) -> Option<&Widget> {
		self.slots
			.get(id.index())
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.widget.as_ref())
	}

	pub(crate) fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
		self.slots
			.get_mut(id.index())
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.widget.as_mut())
	}

	#[must_use]
	pub fn children(&self, id: WidgetId) -> &[WidgetId] {
		self.get(id).map_or(&[], Widget::children)
	}

	#[must_use]
	pub fn child_at(&self, parent: WidgetId, index: usize) -> Option<WidgetId> {
		self.children(parent).get(index).copied()
	}

	/// Count of live widgets, the root container included.
	#[must_use]
	pub fn live_count(&self) -> usize {
		self.slots.iter().filter(|slot| slot.widget.is_some()).count()
	}

	pub(crate) fn alloc(&mut self, tag: &str, schema: Option<Rc<[PropertySchema]>>) -> WidgetId {
		let widget = Widget::new(tag.into(), schema);
		match self.free.pop() {
			Some(index) => {
				let slot = &mut self.slots[index as usize];
				slot.generation += 1;
				slot.widget = Some(widget);
				WidgetId {
					index,
					generation: slot.generation,
				}
			}
			None => {
				self.slots.push(Slot {
					generation: 0,
					widget: Some(widget),
				});
				WidgetId {
					index: (self.slots.len() - 1).try_into().expect("widget arena exceeds u32 indices"),
					generation: 0,
				}
			}
		}
	}

	pub(crate) fn free(&mut self, id: WidgetId) {
		match self.slots.get_mut(id.index()) {
			Some(slot) if slot.generation == id.generation && slot.widget.is_some() => {
				slot.widget = None;
				self.free.push(id.index);
			}
			_ => error!("Expected to free widget {:?} but the slot is already empty.", id),
		}
	}

	/// All widget ids of the subtree rooted at `id`, parents before children.
	pub(crate) fn collect_subtree(&self, id: WidgetId) -> Vec<WidgetId> {
		let mut collected = Vec::new();
		let mut pending = vec![id];
		while let Some(current) = pending.pop() {
			match self.get(current) {
				Some(widget) => {
					collected.push(current);
					pending.extend(widget.children().iter().copied());
				}
				None => error!("Widget {:?} is missing from its own subtree.", current),
			}
		}
		collected
	}

	pub(crate) fn insert_child(&mut self, parent: WidgetId, index: usize, child: WidgetId) {
		match self.get_mut(parent) {
			Some(widget) => {
				let clamped = index.min(widget.children.len());
				if clamped != index {
					warn!("Insertion index {} of {:?} is past the end; appending at {} instead.", index, parent, clamped);
				}
				widget.children.insert(clamped, child);
			}
			None => error!("Expected to insert into missing widget {:?}.", parent),
		}
	}

	pub(crate) fn remove_child(&mut self, parent: WidgetId, index: usize) -> Option<WidgetId> {
		match self.get_mut(parent) {
			Some(widget) => {
				if index < widget.children.len() {
					Some(widget.children.remove(index))
				} else {
					warn!("Removal index {} of {:?} is out of range ({} children); nothing removed.", index, parent, widget.children.len());
					None
				}
			}
			None => {
				error!("Expected to remove from missing widget {:?}.", parent);
				None
			}
		}
	}

	pub(crate) fn move_child(&mut self, parent: WidgetId, from: usize, to: usize) -> bool {
		match self.get_mut(parent) {
			Some(widget) => {
				if from < widget.children.len() && to < widget.children.len() {
					let child = widget.children.remove(from);
					widget.children.insert(to, child);
					true
				} else {
					warn!(
						"Move {} -> {} of {:?} is out of range ({} children); nothing moved.",
						from,
						to,
						parent,
						widget.children.len()
					);
					false
				}
			}
			None => {
				error!("Expected to reorder missing widget {:?}.", parent);
				false
			}
		}
	}

	/// A user-interaction write: mutates the live property only, never the attribute,
	/// and pins the property against later attribute-driven syncs until a typed
	/// property patch reasserts it.
	pub fn write_interactive(&mut self, id: WidgetId, name: &str, value: impl Into<Value>) {
		match self.get_mut(id) {
			Some(widget) => {
				let value = value.into();
				trace!("Interactive write of {:?} on <{}>: {:?}", name, widget.tag, value);
				widget.properties.insert(name.into(), value);
				widget.interactive.insert(name.into());
			}
			None => error!("Interactive write against missing widget {:?}.", id),
		}
	}
}
