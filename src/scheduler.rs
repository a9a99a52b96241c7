use crate::template::Value;
use std::{
	cell::{Cell, RefCell},
	collections::VecDeque,
	rc::Rc,
};
use tracing::trace;

/// When re-render requests run.
///
/// Fixed per instance at creation; the engine never mixes policies within one
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPolicy {
	/// Every triggering mutation synchronously runs build → reconcile → patch before
	/// returning. A compound change touching several properties pays one pass each.
	Immediate,
	/// Triggering mutations mark the instance dirty; one pass over the final state
	/// runs at [`flush`](`crate::component::ComponentInstance::flush`).
	Batched,
}

/// A mutation that arrived while it could not run: either mid-pass, or from an event
/// handler that only holds an [`UpdateHandle`]. Drained in arrival order once the
/// in-flight pass completes.
#[derive(Debug)]
pub(crate) enum PendingChange {
	Attribute { name: Box<str>, value: Option<Box<str>> },
	Property { name: Box<str>, value: Value },
	Refresh,
}

/// A cheap handle event handlers capture to request changes without borrowing the
/// instance they target.
///
/// Requests only enqueue; the host drives them through
/// [`flush`](`crate::component::ComponentInstance::flush`), which applies each one
/// under the instance's render policy.
#[derive(Debug, Clone)]
pub struct UpdateHandle {
	pending: Rc<RefCell<VecDeque<PendingChange>>>,
}
impl UpdateHandle {
	pub fn set_property(&self, name: &str, value: impl Into<Value>) {
		self.pending.borrow_mut().push_back(PendingChange::Property {
			name: name.into(),
			value: value.into(),
		});
	}

	pub fn set_attribute(&self, name: &str, value: Option<&str>) {
		self.pending.borrow_mut().push_back(PendingChange::Attribute {
			name: name.into(),
			value: value.map(Into::into),
		});
	}

	/// Requests a re-render without a property change, for mutations of collaborator
	/// state the instance cannot see.
	pub fn refresh(&self) {
		self.pending.borrow_mut().push_back(PendingChange::Refresh);
	}
}

#[derive(Debug)]
pub(crate) struct RenderQueue {
	policy: RenderPolicy,
	dirty: Cell<bool>,
	in_pass: bool,
	pending: Rc<RefCell<VecDeque<PendingChange>>>,
}
impl RenderQueue {
	pub fn new(policy: RenderPolicy) -> Self {
		Self {
			policy,
			dirty: Cell::new(false),
			in_pass: false,
			pending: Rc::new(RefCell::new(VecDeque::new())),
		}
	}

	pub fn policy(&self) -> RenderPolicy {
		self.policy
	}

	pub fn handle(&self) -> UpdateHandle {
		UpdateHandle {
			pending: Rc::clone(&self.pending),
		}
	}

	pub fn set_dirty(&self, dirty: bool) {
		self.dirty.set(dirty);
	}

	/// Reads and clears the dirty flag.
	pub fn take_dirty(&self) -> bool {
		let dirty = self.dirty.get();
		self.dirty.set(false);
		dirty
	}

	pub fn in_pass(&self) -> bool {
		self.in_pass
	}

	pub fn begin_pass(&mut self) {
		debug_assert!(!self.in_pass, "render pass entered reentrantly");
		self.in_pass = true;
	}

	pub fn end_pass(&mut self) {
		self.in_pass = false;
	}

	pub fn defer(&self, change: PendingChange) {
		trace!("Deferring {:?} until the in-flight pass completes.", change);
		self.pending.borrow_mut().push_back(change);
	}

	pub fn pop(&self) -> Option<PendingChange> {
		self.pending.borrow_mut().pop_front()
	}

	pub fn clear(&self) {
		self.pending.borrow_mut().clear();
		self.dirty.set(false);
	}
}
