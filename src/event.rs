use crate::template::Value;
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;

/// A typed, opaque notification.
///
/// `detail` is payload whose meaning is a contract between the emitting child
/// template and the consuming handler (for list widgets, conventionally the item's
/// index). The engine carries it but never interprets it, and its validity is bounded
/// by the dispatch turn it is delivered in.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	pub kind: Box<str>,
	pub detail: Value,
}
impl Event {
	#[must_use]
	pub fn new(kind: impl Into<Box<str>>, detail: impl Into<Value>) -> Self {
		Self {
			kind: kind.into(),
			detail: detail.into(),
		}
	}
}

/// An opaque reference to a handler registered on an [`EventBus`].
///
/// Cheap to copy, hash and compare; templates embed these in
/// [`EventBinding`](`crate::template::EventBinding`)s instead of the closures
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(u32);

pub type ListenerFn = dyn Fn(&Event);

/// Registry half of the event dispatch bus.
///
/// An ancestor registers its handlers here and embeds the returned [`HandlerRef`]s in
/// the child descriptions it builds. Binding a handler to a widget clones the
/// listener into the differ's bound-listener table, so a bound widget keeps
/// delivering even if the registration is dropped afterwards — mirror the
/// registration's lifetime to the binding's if that is not wanted.
pub struct EventBus {
	listeners: HashMap<HandlerRef, Rc<ListenerFn>>,
	next: u32,
}
impl Debug for EventBus {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus").field("listeners", &self.listeners.len()).finish()
	}
}
impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}
impl EventBus {
	#[must_use]
	pub fn new() -> Self {
		Self {
			listeners: HashMap::new(),
			next: 0,
		}
	}

	pub fn register(&mut self, listener: impl Fn(&Event) + 'static) -> HandlerRef {
		let handler = HandlerRef(self.next);
		self.next += 1;
		self.listeners.insert(handler, Rc::new(listener));
		trace!("Registered handler {:?}.", handler);
		handler
	}

	pub fn unregister(&mut self, handler: HandlerRef) -> bool {
		let removed = self.listeners.remove(&handler).is_some();
		trace!("Unregistered handler {:?}: {}.", handler, removed);
		removed
	}

	#[must_use]
	pub(crate) fn resolve(&self, handler: HandlerRef) -> Option<Rc<ListenerFn>> {
		self.listeners.get(&handler).cloned()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}
