use crate::{
	error::DiffError,
	event::{Event, EventBus, HandlerRef, ListenerFn},
	patch::PatchOp,
	ref_count_map::RefCountMap,
	schema::SchemaMap,
	template::{EventBinding, Key, TreeDescription, Value},
	tree::{WidgetId, WidgetTree},
};
use core::{
	fmt::{self, Debug, Formatter},
	ptr,
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{error, info, trace, trace_span, warn};

/// Plenty for the flat-ish trees this engine is built for.
pub const DEFAULT_DEPTH_LIMIT: usize = 32;

/// Reconciles tree descriptions against a retained [`WidgetTree`] it owns.
///
/// The committed description stays with the caller, which must pass the previously
/// committed value as `prev` on the next pass; the differ pairs it with its retained
/// widgets by position so matching nodes keep the same widget instance across
/// renders.
///
/// # Correct Use
///
/// Patch operations are the only channel through which the tree is mutated. A pass
/// first emits its full patch sequence (validating sibling keys), then applies it, so
/// a refused pass leaves the tree exactly as the last successful one did.
///
/// Listener handles are reference-counted per differ instance. Binding clones the
/// listener out of the [`EventBus`], so dispatch keeps working for bound widgets even
/// if the registration is dropped afterwards; handles are freed once no binding
/// references them at the end of a pass.
pub struct TreeDiffer {
	tree: WidgetTree,
	schemas: Rc<SchemaMap>,
	handler_handles: RefCountMap<HandlerRef, u16, Rc<ListenerFn>>,
}
impl Debug for TreeDiffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("TreeDiffer")
			.field("tree", &self.tree)
			.field("handler_handles", &self.handler_handles.len())
			.finish()
	}
}
impl TreeDiffer {
	#[must_use]
	pub fn new(schemas: Rc<SchemaMap>) -> Self {
		Self {
			tree: WidgetTree::new(),
			schemas,
			handler_handles: RefCountMap::new(),
		}
	}

	#[must_use]
	pub fn tree(&self) -> &WidgetTree {
		&self.tree
	}

	#[must_use]
	pub fn root(&self) -> WidgetId {
		self.tree.root()
	}

	/// Forwards a user-interaction write to the tree; see
	/// [`WidgetTree::write_interactive`].
	pub fn write_interactive(&mut self, id: WidgetId, name: &str, value: impl Into<Value>) {
		self.tree.write_interactive(id, name, value);
	}

	/// Reconciles the root child list from `prev` to `next` and applies the result.
	///
	/// `prev` must be the description committed by the previous pass (or empty on the
	/// first one). Returns the applied patch sequence in application order.
	///
	/// # Errors
	///
	/// [`DiffError::DuplicateKey`] if a sibling list anywhere in `next` repeats a
	/// key. Nothing is applied in that case.
	pub fn update_children(&mut self, bus: &EventBus, prev: &[TreeDescription], next: &[TreeDescription], depth_limit: usize) -> Result<Vec<PatchOp>, DiffError> {
		if ptr::eq(prev, next) {
			trace!("Identical references; nothing to do.");
			return Ok(Vec::new());
		}

		validate_keys(next)?;

		let mut patches = Vec::new();
		let root = self.tree.root();
		self.emit_child_list(&mut patches, root, prev, next, depth_limit)?;
		self.apply(bus, &patches);

		{
			let drain = self.handler_handles.drain_unreferenced();
			trace!("Freed {} event listener(s).", drain.count());
		}
		info!(
			"Event listener count/cached capacity: {}/{}",
			self.handler_handles.len(),
			self.handler_handles.capacity()
		);
		Ok(patches)
	}

	/// Delivers `event` to the listeners bound on `source`, in bind order.
	///
	/// Returns the number of listeners that ran. One hop only: whoever built the
	/// binding receives the event; there is no further propagation.
	pub fn dispatch(&self, source: WidgetId, event: &Event) -> usize {
		let span = trace_span!("Dispatching", kind = &*event.kind, source = ?source);
		let _enter = span.enter();

		let widget = match self.tree.get(source) {
			Some(widget) => widget,
			None => {
				error!("Dispatch against missing widget {:?}.", source);
				return 0;
			}
		};

		let mut delivered = 0;
		for binding in widget.bindings() {
			if binding.event != event.kind {
				continue;
			}
			match self.handler_handles.get(&binding.handler) {
				Some(listener) => {
					(&**listener)(event);
					delivered += 1;
				}
				None => error!("Bound handler {:?} has no live handle.", binding.handler),
			}
		}
		trace!("Delivered to {} listener(s).", delivered);
		delivered
	}

	fn emit_child_list(&self, patches: &mut Vec<PatchOp>, parent: WidgetId, prev: &[TreeDescription], next: &[TreeDescription], depth_limit: usize) -> Result<(), DiffError> {
		if depth_limit == 0 {
			error!("Depth limit reached");
			return Ok(());
		}
		if ptr::eq(prev, next) {
			return Ok(());
		}

		match child_policy(prev, next) {
			ChildPolicy::Positional => self.emit_positional(patches, parent, prev, next, depth_limit),
			ChildPolicy::Keyed => self.emit_keyed(patches, parent, prev, next, depth_limit),
		}
	}

	/// Index pairing. The widget instance at a given index is preserved regardless of
	/// content change, so intrinsic widget state does not follow reordered content.
	/// That is this policy's contract: minimal node churn, not content identity.
	fn emit_positional(&self, patches: &mut Vec<PatchOp>, parent: WidgetId, prev: &[TreeDescription], next: &[TreeDescription], depth_limit: usize) -> Result<(), DiffError> {
		let span = trace_span!("Diffing positional", "prev.len()" = prev.len(), "next.len()" = next.len());
		let _enter = span.enter();

		let children: Vec<WidgetId> = self.tree.children(parent).to_vec();
		if children.len() != prev.len() {
			error!(
				"Retained child list of {:?} has {} entries but the committed description has {}.",
				parent,
				children.len(),
				prev.len()
			);
		}

		let shared = prev.len().min(next.len());
		for index in 0..shared {
			match children.get(index).copied() {
				Some(widget) => self.emit_node(patches, parent, index, widget, &prev[index], &next[index], depth_limit)?,
				None => {
					error!("Expected <{}> beyond end of the retained child list. Switching to insertions.", prev[index].tag);
					for (tail, node) in next.iter().enumerate().skip(index) {
						patches.push(PatchOp::Insert {
							parent,
							index: tail,
							node: node.clone(),
						});
					}
					return Ok(());
				}
			}
		}

		for index in (shared..prev.len()).rev() {
			if index < children.len() {
				patches.push(PatchOp::Remove { parent, index });
			} else {
				error!("Expected to remove <{}> beyond end of the retained child list. Skipping.", prev[index].tag);
			}
		}

		for (index, node) in next.iter().enumerate().skip(shared) {
			patches.push(PatchOp::Insert {
				parent,
				index,
				node: node.clone(),
			});
		}
		Ok(())
	}

	/// Key pairing. Widget identity (and with it any intrinsic state) follows the key
	/// across arbitrary reorders, at the cost of `Move` operations.
	fn emit_keyed(&self, patches: &mut Vec<PatchOp>, parent: WidgetId, prev: &[TreeDescription], next: &[TreeDescription], depth_limit: usize) -> Result<(), DiffError> {
		let span = trace_span!("Diffing keyed", "prev.len()" = prev.len(), "next.len()" = next.len());
		let _enter = span.enter();

		let mut upcoming: HashSet<&Key> = HashSet::new();
		for node in next {
			let fresh = upcoming.insert(node.key.as_ref().expect("keyed policy requires keys on all children"));
			debug_assert!(fresh, "duplicate key slipped past validation");
		}
		debug_assert_eq!(
			prev.len(),
			prev.iter().map(|node| node.key.as_ref()).collect::<HashSet<_>>().len(),
			"Duplicate key survived a previous pass"
		);

		let children: Vec<WidgetId> = self.tree.children(parent).to_vec();
		if children.len() != prev.len() {
			error!(
				"Retained child list of {:?} has {} entries but the committed description has {}.",
				parent,
				children.len(),
				prev.len()
			);
		}

		let settled: HashMap<&Key, (usize, Option<WidgetId>)> = prev
			.iter()
			.enumerate()
			.map(|(index, node)| {
				(
					node.key.as_ref().expect("keyed policy requires keys on all children"),
					(index, children.get(index).copied()),
				)
			})
			.collect();

		// Simulated child order, updated alongside emission so every op carries the
		// index it will see at application time.
		let mut working: Vec<&Key> = prev.iter().map(|node| node.key.as_ref().expect("keyed policy requires keys on all children")).collect();

		for index in (0..working.len()).rev() {
			if !upcoming.contains(working[index]) {
				patches.push(PatchOp::Remove { parent, index });
				working.remove(index);
			}
		}

		for (position, node) in next.iter().enumerate() {
			let key = node.key.as_ref().expect("keyed policy requires keys on all children");
			match settled.get(key) {
				None => {
					patches.push(PatchOp::Insert {
						parent,
						index: position,
						node: node.clone(),
					});
					working.insert(position, key);
				}
				Some(&(previous_index, widget)) => {
					// Help wanted: this scan is quadratic over displaced spans.
					match working.iter().position(|candidate| *candidate == key) {
						Some(current) => {
							if current != position {
								patches.push(PatchOp::Move {
									parent,
									from: current,
									to: position,
								});
								let moved = working.remove(current);
								working.insert(position, moved);
							}
						}
						None => {
							error!("Matched key {} is missing from the working order; skipping its move.", key);
							continue;
						}
					}
					match widget {
						Some(widget) => self.emit_node(patches, parent, position, widget, &prev[previous_index], node, depth_limit)?,
						None => {
							error!("No retained widget for key {}; recreating.", key);
							patches.push(PatchOp::Remove { parent, index: position });
							patches.push(PatchOp::Insert {
								parent,
								index: position,
								node: node.clone(),
							});
						}
					}
				}
			}
		}
		debug_assert_eq!(working.len(), next.len());
		Ok(())
	}

	fn emit_node(&self, patches: &mut Vec<PatchOp>, parent: WidgetId, index: usize, widget: WidgetId, prev: &TreeDescription, next: &TreeDescription, depth_limit: usize) -> Result<(), DiffError> {
		if ptr::eq(prev, next) {
			trace!("Identical references; nothing to do.");
			return Ok(());
		}

		if prev.tag != next.tag {
			let span = trace_span!("Replacing mismatching node", from = &*prev.tag, to = &*next.tag);
			let _enter = span.enter();
			patches.push(PatchOp::Remove { parent, index });
			patches.push(PatchOp::Insert {
				parent,
				index,
				node: next.clone(),
			});
			return Ok(());
		}

		let span = trace_span!("Diffing node", tag = &*next.tag);
		let _enter = span.enter();
		self.emit_updates(patches, widget, prev, next);
		self.emit_child_list(patches, widget, &prev.children, &next.children, depth_limit - 1)
	}

	#[allow(clippy::similar_names)]
	#[allow(clippy::too_many_lines)]
	fn emit_updates(&self, patches: &mut Vec<PatchOp>, target: WidgetId, prev: &TreeDescription, next: &TreeDescription) {
		let mut a_1 = &prev.attributes[..];
		let mut a_2 = &next.attributes[..];
		while !a_1.is_empty() && a_1.first() == a_2.first() {
			a_1 = &a_1[1..];
			a_2 = &a_2[1..];
		}
		while !a_1.is_empty() && a_1.last() == a_2.last() {
			a_1 = &a_1[..a_1.len() - 1];
			a_2 = &a_2[..a_2.len() - 1];
		}
		if !a_1.is_empty() || !a_2.is_empty() {
			let previous: HashMap<&str, &str> = a_1.iter().map(|attribute| (&*attribute.name, &*attribute.value)).collect();
			let upcoming: HashSet<&str> = a_2.iter().map(|attribute| &*attribute.name).collect();
			for removed in a_1 {
				if !upcoming.contains(&*removed.name) {
					patches.push(PatchOp::UnsetAttribute {
						target,
						name: removed.name.clone(),
					});
				}
			}
			for added in a_2 {
				if previous.get(&*added.name).copied() != Some(&*added.value) {
					patches.push(PatchOp::SetAttribute {
						target,
						name: added.name.clone(),
						value: added.value.clone(),
					});
				}
			}
		}

		let mut p_1 = &prev.properties[..];
		let mut p_2 = &next.properties[..];
		while !p_1.is_empty() && p_1.first() == p_2.first() {
			p_1 = &p_1[1..];
			p_2 = &p_2[1..];
		}
		while !p_1.is_empty() && p_1.last() == p_2.last() {
			p_1 = &p_1[..p_1.len() - 1];
			p_2 = &p_2[..p_2.len() - 1];
		}
		if !p_1.is_empty() || !p_2.is_empty() {
			let previous: HashMap<&str, &Value> = p_1.iter().map(|property| (&*property.name, &property.value)).collect();
			let upcoming: HashSet<&str> = p_2.iter().map(|property| &*property.name).collect();
			for removed in p_1 {
				if !upcoming.contains(&*removed.name) {
					patches.push(PatchOp::UnsetProperty {
						target,
						name: removed.name.clone(),
					});
				}
			}
			for added in p_2 {
				if previous.get(&*added.name).copied() != Some(&added.value) {
					patches.push(PatchOp::SetProperty {
						target,
						name: added.name.clone(),
						value: added.value.clone(),
					});
				}
			}
		}

		let mut eb_1 = &prev.event_bindings[..];
		let mut eb_2 = &next.event_bindings[..];
		while !eb_1.is_empty() && eb_1.first() == eb_2.first() {
			eb_1 = &eb_1[1..];
			eb_2 = &eb_2[1..];
		}
		while !eb_1.is_empty() && eb_1.last() == eb_2.last() {
			eb_1 = &eb_1[..eb_1.len() - 1];
			eb_2 = &eb_2[..eb_2.len() - 1];
		}
		if !eb_1.is_empty() || !eb_2.is_empty() {
			let previous: HashSet<&EventBinding> = eb_1.iter().collect();
			let upcoming: HashSet<&EventBinding> = eb_2.iter().collect();
			let mut released: HashSet<&EventBinding> = HashSet::new();
			for removed in eb_1 {
				if !released.insert(removed) {
					continue;
				}
				if !upcoming.contains(removed) {
					patches.push(PatchOp::RemoveListener {
						target,
						event: removed.event.clone(),
						handler: removed.handler,
					});
				}
			}
			let mut added_once: HashSet<&EventBinding> = HashSet::new();
			for added in eb_2 {
				if !added_once.insert(added) {
					// Disambiguating duplicates would be expensive, so they aren't supported.
					warn!("Duplicate event binding {:?}; the duplicate is ignored.", added);
					continue;
				}
				if !previous.contains(added) {
					patches.push(PatchOp::AddListener {
						target,
						event: added.event.clone(),
						handler: added.handler,
					});
				}
			}
		}
	}

	fn apply(&mut self, bus: &EventBus, patches: &[PatchOp]) {
		for op in patches {
			match op {
				PatchOp::Insert { parent, index, node } => {
					let widget = self.create_subtree(bus, node);
					self.tree.insert_child(*parent, *index, widget);
				}
				PatchOp::Remove { parent, index } => {
					if let Some(removed) = self.tree.remove_child(*parent, *index) {
						self.release_subtree(removed);
					}
				}
				PatchOp::Move { parent, from, to } => {
					self.tree.move_child(*parent, *from, *to);
				}
				PatchOp::SetAttribute { target, name, value } => match self.tree.get_mut(*target) {
					Some(widget) => widget.apply_attribute(name, value),
					None => error!("Expected to update attribute {:?} of missing widget {:?}.", name, target),
				},
				PatchOp::UnsetAttribute { target, name } => match self.tree.get_mut(*target) {
					Some(widget) => widget.remove_attribute(name),
					None => error!("Expected to unset attribute {:?} of missing widget {:?}.", name, target),
				},
				PatchOp::SetProperty { target, name, value } => match self.tree.get_mut(*target) {
					Some(widget) => widget.apply_property(name, value),
					None => error!("Expected to update property {:?} of missing widget {:?}.", name, target),
				},
				PatchOp::UnsetProperty { target, name } => match self.tree.get_mut(*target) {
					Some(widget) => widget.remove_property(name),
					None => error!("Expected to unset property {:?} of missing widget {:?}.", name, target),
				},
				PatchOp::AddListener { target, event, handler } => self.bind_listener(bus, *target, event, *handler),
				PatchOp::RemoveListener { target, event, handler } => self.unbind_listener(*target, event, *handler),
			}
		}
	}

	fn create_subtree(&mut self, bus: &EventBus, node: &TreeDescription) -> WidgetId {
		let span = trace_span!("Creating widget", tag = &*node.tag);
		let _enter = span.enter();

		let schema = self.schemas.get(&node.tag);
		let id = self.tree.alloc(&node.tag, schema);
		if let Some(widget) = self.tree.get_mut(id) {
			for attribute in &node.attributes {
				widget.apply_attribute(&attribute.name, &attribute.value);
			}
			for property in &node.properties {
				widget.apply_property(&property.name, &property.value);
			}
		}
		for binding in &node.event_bindings {
			self.bind_listener(bus, id, &binding.event, binding.handler);
		}
		for (index, child) in node.children.iter().enumerate() {
			let child_id = self.create_subtree(bus, child);
			self.tree.insert_child(id, index, child_id);
		}
		id
	}

	/// Releases listener handles for a detached subtree, then frees its slots.
	fn release_subtree(&mut self, id: WidgetId) {
		let subtree = self.tree.collect_subtree(id);
		for widget_id in &subtree {
			let bindings: Vec<EventBinding> = match self.tree.get(*widget_id) {
				Some(widget) => widget.bindings().to_vec(),
				None => continue,
			};
			for binding in bindings {
				match self.handler_handles.weak_decrement(&binding.handler) {
					Ok(Some(_)) => (),
					Ok(None) => error!("Tried to release a listener handle that does not exist."),
					Err(_) => error!("Tried to release a listener handle more often than it was bound."),
				}
			}
		}
		for widget_id in subtree {
			self.tree.free(widget_id);
		}
	}

	fn bind_listener(&mut self, bus: &EventBus, target: WidgetId, event: &str, handler: HandlerRef) {
		let listener = match bus.resolve(handler) {
			Some(listener) => listener,
			None => return error!("Handler {:?} is not registered on the bus; binding skipped.", handler),
		};
		if self.handler_handles.increment_or_insert_with(handler, move || listener).is_err() {
			return error!("Too many (more than 65k) active references to the same handler.");
		}
		match self.tree.get_mut(target) {
			Some(widget) => widget.push_binding(EventBinding {
				event: event.into(),
				handler,
			}),
			None => error!("Expected to bind {:?} on missing widget {:?}.", event, target),
		}
	}

	fn unbind_listener(&mut self, target: WidgetId, event: &str, handler: HandlerRef) {
		match self.tree.get_mut(target) {
			Some(widget) => {
				widget.remove_binding(&EventBinding {
					event: event.into(),
					handler,
				});
			}
			None => error!("Expected to unbind {:?} on missing widget {:?}.", event, target),
		}
		match self.handler_handles.weak_decrement(&handler) {
			Ok(Some(_)) => (),
			Ok(None) => error!("Tried to release a listener handle that does not exist."),
			Err(_) => error!("Tried to release a listener handle more often than it was bound."),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildPolicy {
	Positional,
	Keyed,
}

fn child_policy(prev: &[TreeDescription], next: &[TreeDescription]) -> ChildPolicy {
	let fully_keyed = |list: &[TreeDescription]| list.iter().all(|child| child.key.is_some());
	let any_keyed = |list: &[TreeDescription]| list.iter().any(|child| child.key.is_some());

	if !any_keyed(prev) && !any_keyed(next) {
		ChildPolicy::Positional
	} else if fully_keyed(prev) && fully_keyed(next) {
		ChildPolicy::Keyed
	} else {
		warn!("Mixed keyed and unkeyed siblings; falling back to positional pairing.");
		ChildPolicy::Positional
	}
}

fn validate_keys(list: &[TreeDescription]) -> Result<(), DiffError> {
	let mut seen: HashSet<&Key> = HashSet::new();
	for node in list {
		if let Some(key) = &node.key {
			if !seen.insert(key) {
				return Err(DiffError::DuplicateKey(key.clone()));
			}
		}
	}
	for node in list {
		validate_keys(&node.children)?;
	}
	Ok(())
}
