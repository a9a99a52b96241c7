use crate::{
	diff::{TreeDiffer, DEFAULT_DEPTH_LIMIT},
	error::{EngineError, LifecycleError},
	event::{Event, EventBus},
	patch::PatchOp,
	schema::{self, PropertySchema, SchemaMap},
	scheduler::{PendingChange, RenderPolicy, RenderQueue, UpdateHandle},
	template::{TreeDescription, Value},
	tree::{WidgetId, WidgetTree},
};
use core::{
	fmt::{self, Debug, Formatter},
	slice,
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, trace_span, warn};

/// The capability set a component class implements.
///
/// Instances are dispatched through a [`ComponentRegistry`](`crate::registry::ComponentRegistry`)
/// lookup by tag, not an inheritance hierarchy.
pub trait Component {
	/// The declared properties the attribute/property bridge manages.
	fn schema(&self) -> &'static [PropertySchema];

	/// Builds the tree description for the current state.
	///
	/// Must be referentially transparent: equal `props` (and equal internal state)
	/// yield a structurally identical description. Side effects belong to the
	/// collaborator that owns the state, never in here.
	fn build(&self, props: &PropertyValues) -> TreeDescription;
}

/// The bridge-managed property values of one instance.
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
	values: HashMap<Box<str>, Value>,
}
impl PropertyValues {
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	pub(crate) fn set(&mut self, name: &str, value: Value) {
		self.values.insert(name.into(), value);
	}

	#[must_use]
	pub fn text(&self, name: &str) -> &str {
		self.get(name).and_then(Value::as_text).unwrap_or("")
	}

	#[must_use]
	pub fn flag(&self, name: &str) -> bool {
		self.get(name).and_then(Value::as_flag).unwrap_or(false)
	}

	#[must_use]
	pub fn number(&self, name: &str) -> f64 {
		self.get(name).and_then(Value::as_number).unwrap_or(0.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Unmounted,
	Mounted,
}

/// One mounted (or mountable) component.
///
/// Owns its committed description and retained widget tree exclusively. The host
/// drives it through [`mount`](`ComponentInstance::mount`),
/// [`attribute_changed`](`ComponentInstance::attribute_changed`),
/// [`set_property`](`ComponentInstance::set_property`),
/// [`flush`](`ComponentInstance::flush`) and
/// [`unmount`](`ComponentInstance::unmount`); event handlers reach it through the
/// queue behind [`update_handle`](`ComponentInstance::update_handle`).
pub struct ComponentInstance {
	behavior: Box<dyn Component>,
	schema: &'static [PropertySchema],
	props: PropertyValues,
	attributes: HashMap<Box<str>, Box<str>>,
	committed: Option<TreeDescription>,
	differ: TreeDiffer,
	schemas: Rc<SchemaMap>,
	state: LifecycleState,
	queue: RenderQueue,
}
impl Debug for ComponentInstance {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentInstance")
			.field("state", &self.state)
			.field("props", &self.props)
			.field("attributes", &self.attributes)
			.field("differ", &self.differ)
			.finish()
	}
}
impl ComponentInstance {
	#[must_use]
	pub fn new(behavior: Box<dyn Component>, policy: RenderPolicy, schemas: Rc<SchemaMap>) -> Self {
		let schema = behavior.schema();
		Self {
			behavior,
			schema,
			props: PropertyValues::default(),
			attributes: HashMap::new(),
			committed: None,
			differ: TreeDiffer::new(Rc::clone(&schemas)),
			schemas,
			state: LifecycleState::Unmounted,
			queue: RenderQueue::new(policy),
		}
	}

	pub fn observed_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.schema.iter().map(|entry| entry.name)
	}

	#[must_use]
	pub fn lifecycle(&self) -> LifecycleState {
		self.state
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.state == LifecycleState::Mounted
	}

	#[must_use]
	pub fn policy(&self) -> RenderPolicy {
		self.queue.policy()
	}

	/// The instance's externally visible attribute, reflected writes included.
	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(|value| &**value)
	}

	#[must_use]
	pub fn property(&self, name: &str) -> Option<&Value> {
		self.props.get(name)
	}

	#[must_use]
	pub fn committed(&self) -> Option<&TreeDescription> {
		self.committed.as_ref()
	}

	#[must_use]
	pub fn tree(&self) -> &WidgetTree {
		self.differ.tree()
	}

	#[must_use]
	pub fn root(&self) -> WidgetId {
		self.differ.root()
	}

	#[must_use]
	pub fn update_handle(&self) -> UpdateHandle {
		self.queue.handle()
	}

	/// Delivers an event to the listeners bound on `source`; see
	/// [`TreeDiffer::dispatch`].
	pub fn dispatch(&self, source: WidgetId, event: &Event) -> usize {
		self.differ.dispatch(source, event)
	}

	/// See [`WidgetTree::write_interactive`].
	pub fn write_interactive(&mut self, id: WidgetId, name: &str, value: impl Into<Value>) {
		self.differ.write_interactive(id, name, value);
	}

	/// Attaches the instance: seeds schema defaults for properties not already set,
	/// parses the initial attributes and performs the first render.
	///
	/// Malformed initial attribute values keep their schema default (logged), so a
	/// sloppy host document cannot prevent the mount.
	///
	/// # Errors
	///
	/// [`LifecycleError::AlreadyMounted`] when mounted, and whatever the first
	/// render surfaces.
	pub fn mount(&mut self, bus: &EventBus, initial: &[(&str, &str)]) -> Result<Vec<PatchOp>, EngineError> {
		if self.state == LifecycleState::Mounted {
			return Err(LifecycleError::AlreadyMounted.into());
		}
		let span = trace_span!("Mounting");
		let _enter = span.enter();

		for entry in self.schema {
			if self.props.get(entry.name).is_none() {
				self.props.set(entry.name, entry.kind.default_value());
			}
		}
		for &(name, value) in initial {
			self.attributes.insert(name.into(), value.into());
			match schema::find(self.schema, name) {
				Some(entry) => match entry.kind.parse(name, Some(value)) {
					Ok(parsed) => self.props.set(name, parsed),
					Err(parse_error) => warn!("Keeping the schema default: {}", parse_error),
				},
				None => trace!("Initial attribute {:?} is not declared; stored but not bridged.", name),
			}
		}
		self.state = LifecycleState::Mounted;
		self.render_now(bus)
	}

	/// Detaches the instance and discards its committed description, widget tree and
	/// property state. No committed state survives; a later
	/// [`mount`](`ComponentInstance::mount`) starts from scratch.
	pub fn unmount(&mut self) {
		if self.state == LifecycleState::Unmounted {
			trace!("Already unmounted.");
			return;
		}
		self.committed = None;
		self.differ = TreeDiffer::new(Rc::clone(&self.schemas));
		self.props = PropertyValues::default();
		self.attributes.clear();
		self.queue.clear();
		self.state = LifecycleState::Unmounted;
		trace!("Unmounted; committed tree discarded.");
	}

	/// The host's attribute-changed callback.
	///
	/// Parses per the declared schema and re-renders, unless the parsed value equals
	/// the current property — the guard that terminates reflection loops.
	///
	/// # Errors
	///
	/// [`LifecycleError::NotMounted`] while unmounted (the change is never applied),
	/// [`ParseError`](`crate::error::ParseError`) for malformed numeric values (the
	/// property keeps its previous value).
	pub fn attribute_changed(&mut self, bus: &EventBus, name: &str, old: Option<&str>, new: Option<&str>) -> Result<Vec<PatchOp>, EngineError> {
		if self.state != LifecycleState::Mounted {
			return Err(LifecycleError::NotMounted.into());
		}
		if old == new {
			trace!("Attribute {:?} unchanged.", name);
			return Ok(Vec::new());
		}
		if self.queue.in_pass() {
			self.queue.defer(PendingChange::Attribute {
				name: name.into(),
				value: new.map(Into::into),
			});
			return Ok(Vec::new());
		}

		match new {
			Some(value) => {
				self.attributes.insert(name.into(), value.into());
			}
			None => {
				self.attributes.remove(name);
			}
		}
		let entry = match schema::find(self.schema, name) {
			Some(entry) => entry,
			None => {
				trace!("Attribute {:?} is not declared; stored but not bridged.", name);
				return Ok(Vec::new());
			}
		};
		let parsed = entry.kind.parse(name, new)?;
		if self.props.get(name) == Some(&parsed) {
			trace!("Parsed value of {:?} unchanged; skipping the re-render.", name);
			return Ok(Vec::new());
		}
		self.props.set(name, parsed);
		self.request_render(bus)
	}

	/// Assigns a declared property.
	///
	/// Reflecting entries serialize back into the external attribute exactly once,
	/// guarded against redundant writes. Permitted while unmounted (the value is
	/// kept for the first render); rendering only happens when mounted.
	pub fn set_property(&mut self, bus: &EventBus, name: &str, value: impl Into<Value>) -> Result<Vec<PatchOp>, EngineError> {
		let value = value.into();
		if self.queue.in_pass() {
			self.queue.defer(PendingChange::Property { name: name.into(), value });
			return Ok(Vec::new());
		}
		let entry = match schema::find(self.schema, name) {
			Some(entry) => entry,
			None => {
				warn!("Property {:?} is not declared; ignored.", name);
				return Ok(Vec::new());
			}
		};
		if self.props.get(name) == Some(&value) {
			trace!("Property {:?} unchanged.", name);
			return Ok(Vec::new());
		}
		self.props.set(name, value.clone());
		if entry.reflect {
			match schema::serialize(&value) {
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
		if self.state == LifecycleState::Mounted {
			self.request_render(bus)
		} else {
			trace!("Not mounted; property stored without rendering.");
			Ok(Vec::new())
		}
	}

	/// Requests a re-render for collaborator-state mutations the bridge cannot see.
	///
	/// # Errors
	///
	/// [`LifecycleError::NotMounted`] while unmounted.
	pub fn refresh(&mut self, bus: &EventBus) -> Result<Vec<PatchOp>, EngineError> {
		if self.state != LifecycleState::Mounted {
			return Err(LifecycleError::NotMounted.into());
		}
		if self.queue.in_pass() {
			self.queue.defer(PendingChange::Refresh);
			return Ok(Vec::new());
		}
		self.request_render(bus)
	}

	/// End-of-turn entry point: drains queued changes, then renders once if anything
	/// left the instance dirty. Under [`RenderPolicy::Batched`] this is where
	/// coalesced mutations become one pass.
	pub fn flush(&mut self, bus: &EventBus) -> Result<Vec<PatchOp>, EngineError> {
		if self.state != LifecycleState::Mounted {
			trace!("Not mounted; nothing to flush.");
			return Ok(Vec::new());
		}
		let mut patches = self.drain_pending(bus);
		if self.queue.take_dirty() {
			patches.extend(self.render_now(bus)?);
		}
		Ok(patches)
	}

	fn request_render(&mut self, bus: &EventBus) -> Result<Vec<PatchOp>, EngineError> {
		match self.queue.policy() {
			RenderPolicy::Immediate => self.render_now(bus),
			RenderPolicy::Batched => {
				self.queue.set_dirty(true);
				trace!("Marked dirty; coalescing until flush.");
				Ok(Vec::new())
			}
		}
	}

	fn render_now(&mut self, bus: &EventBus) -> Result<Vec<PatchOp>, EngineError> {
		let span = trace_span!("Render pass");
		let _enter = span.enter();

		self.queue.begin_pass();
		self.queue.set_dirty(false);
		let next = self.behavior.build(&self.props);
		let prev = match &self.committed {
			Some(committed) => slice::from_ref(committed),
			None => &[],
		};
		let result = self.differ.update_children(bus, prev, slice::from_ref(&next), DEFAULT_DEPTH_LIMIT);
		self.queue.end_pass();
		match result {
			Ok(mut patches) => {
				self.committed = Some(next);
				patches.extend(self.drain_pending(bus));
				Ok(patches)
			}
			// The tree and committed description stay at the last successful pass.
			Err(diff_error) => Err(diff_error.into()),
		}
	}

	fn drain_pending(&mut self, bus: &EventBus) -> Vec<PatchOp> {
		let mut patches = Vec::new();
		while let Some(change) = self.queue.pop() {
			let result = match change {
				PendingChange::Attribute { name, value } => {
					let old: Option<Box<str>> = self.attributes.get(&*name).cloned();
					self.attribute_changed(bus, &name, old.as_deref(), value.as_deref())
				}
				PendingChange::Property { name, value } => self.set_property(bus, &name, value),
				PendingChange::Refresh => self.refresh(bus),
			};
			match result {
				Ok(more) => patches.extend(more),
				Err(deferred_error) => warn!("Deferred change failed: {}", deferred_error),
			}
		}
		patches
	}
}
