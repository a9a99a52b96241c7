use crate::{
	event::HandlerRef,
	template::{TreeDescription, Value},
	tree::WidgetId,
};

/// One atomic mutation of the retained widget tree.
///
/// Patch operations are the only channel through which the tree changes. A
/// reconciliation pass emits its full sequence before applying any of it, and the
/// sequence is applied (and returned) in emission order: a node's attribute,
/// property and listener updates precede the list operations on its children.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
	/// Create the described subtree and splice it in at `index`.
	Insert {
		parent: WidgetId,
		index: usize,
		node: TreeDescription,
	},
	Remove {
		parent: WidgetId,
		index: usize,
	},
	Move {
		parent: WidgetId,
		from: usize,
		to: usize,
	},
	SetAttribute {
		target: WidgetId,
		name: Box<str>,
		value: Box<str>,
	},
	UnsetAttribute {
		target: WidgetId,
		name: Box<str>,
	},
	SetProperty {
		target: WidgetId,
		name: Box<str>,
		value: Value,
	},
	UnsetProperty {
		target: WidgetId,
		name: Box<str>,
	},
	AddListener {
		target: WidgetId,
		event: Box<str>,
		handler: HandlerRef,
	},
	RemoveListener {
		target: WidgetId,
		event: Box<str>,
		handler: HandlerRef,
	},
}
impl PatchOp {
	/// `true` for the child-list operations (`Insert`/`Remove`/`Move`).
	#[must_use]
	pub fn is_structural(&self) -> bool {
		matches!(self, PatchOp::Insert { .. } | PatchOp::Remove { .. } | PatchOp::Move { .. })
	}
}
