use espalier::{
	diff::{TreeDiffer, DEFAULT_DEPTH_LIMIT},
	event::EventBus,
	patch::PatchOp,
	schema::{PropertySchema, SchemaMap, ValueKind},
	template::{TreeDescription, Value},
	tree::WidgetId,
};
use std::rc::Rc;

const TOGGLE_ITEM: &[PropertySchema] = &[
	PropertySchema {
		name: "text",
		kind: ValueKind::Text,
		reflect: true,
	},
	PropertySchema {
		name: "checked",
		kind: ValueKind::FlagPresence,
		reflect: true,
	},
];

fn schemas() -> Rc<SchemaMap> {
	let mut schemas = SchemaMap::new();
	schemas.insert("toggle-item", TOGGLE_ITEM);
	Rc::new(schemas)
}

fn property_bound(items: &[(&str, bool)]) -> TreeDescription {
	TreeDescription::new("list").children(
		items
			.iter()
			.map(|(text, checked)| TreeDescription::new("toggle-item").attribute("text", *text).property("checked", *checked)),
	)
}

fn attribute_bound(items: &[(&str, bool)]) -> TreeDescription {
	TreeDescription::new("list").children(
		items
			.iter()
			.map(|(text, checked)| TreeDescription::new("toggle-item").attribute("text", *text).flag("checked", *checked)),
	)
}

fn slots(differ: &TreeDiffer) -> Vec<WidgetId> {
	let list_id = differ.tree().child_at(differ.root(), 0).unwrap();
	differ.tree().children(list_id).to_vec()
}

fn touches_checked(op: &PatchOp) -> bool {
	match op {
		PatchOp::SetAttribute { name, .. }
		| PatchOp::UnsetAttribute { name, .. }
		| PatchOp::SetProperty { name, .. }
		| PatchOp::UnsetProperty { name, .. } => &**name == "checked",
		_ => false,
	}
}

// Toggle the last of three items (interactively, then through the data model), then
// remove the head. Positional pairing keeps every widget at its index, so the
// engine has to re-assert the displaced boolean as a typed property patch; relying
// on attribute text would leave the old widget's live state behind.
#[test]
fn property_patch_realigns_live_state_after_head_removal() {
	let bus = EventBus::new();
	let mut differ = TreeDiffer::new(schemas());

	let initial = [property_bound(&[("A", false), ("B", false), ("C", false)])];
	differ.update_children(&bus, &[], &initial, DEFAULT_DEPTH_LIMIT).unwrap();
	let (a_id, b_id, c_id) = match slots(&differ)[..] {
		[a, b, c] => (a, b, c),
		_ => unreachable!(),
	};

	differ.write_interactive(c_id, "checked", true);
	let toggled = [property_bound(&[("A", false), ("B", false), ("C", true)])];
	let patches = differ.update_children(&bus, &initial, &toggled, DEFAULT_DEPTH_LIMIT).unwrap();
	assert!(patches.contains(&PatchOp::SetProperty {
		target: c_id,
		name: "checked".into(),
		value: Value::Flag(true),
	}));

	let shrunk = [property_bound(&[("B", false), ("C", true)])];
	let patches = differ.update_children(&bus, &toggled, &shrunk, DEFAULT_DEPTH_LIMIT).unwrap();

	let removals: Vec<_> = patches.iter().filter(|op| matches!(op, PatchOp::Remove { .. })).collect();
	assert_eq!(removals.len(), 1);
	assert!(matches!(removals[0], PatchOp::Remove { index: 2, .. }));
	assert!(!patches.iter().any(|op| matches!(op, PatchOp::Insert { .. } | PatchOp::Move { .. })));

	// The displaced slot is patched as a typed property, not merely attribute text.
	assert!(patches.contains(&PatchOp::SetProperty {
		target: b_id,
		name: "checked".into(),
		value: Value::Flag(true),
	}));

	// Widget identity stayed with the index, live values align with the new data.
	assert_eq!(slots(&differ), [a_id, b_id]);
	let tree = differ.tree();
	assert_eq!(tree.get(a_id).unwrap().attribute("text"), Some("B"));
	assert_eq!(tree.get(a_id).unwrap().property("checked"), Some(&Value::Flag(false)));
	assert_eq!(tree.get(b_id).unwrap().attribute("text"), Some("C"));
	assert_eq!(tree.get(b_id).unwrap().property("checked"), Some(&Value::Flag(true)));
}

// The same shape with boolean-presence bindings and a toggle the data model never
// learns about: the checkbox-like state stays at its index while the text shifts.
// Documented positional behavior, not a failure.
#[test]
fn attribute_only_bindings_leave_intrinsic_state_behind() {
	let bus = EventBus::new();
	let mut differ = TreeDiffer::new(schemas());

	let initial = [attribute_bound(&[("A", false), ("B", false), ("C", false)])];
	differ.update_children(&bus, &[], &initial, DEFAULT_DEPTH_LIMIT).unwrap();
	let b_id = slots(&differ)[1];

	differ.write_interactive(b_id, "checked", true);

	let shrunk = [attribute_bound(&[("B", false), ("C", false)])];
	let patches = differ.update_children(&bus, &initial, &shrunk, DEFAULT_DEPTH_LIMIT).unwrap();
	assert!(!patches.iter().any(touches_checked), "{:?}", patches);

	// The widget now shows C's text with B's interactive toggle state.
	let tree = differ.tree();
	assert_eq!(tree.get(b_id).unwrap().attribute("text"), Some("C"));
	assert_eq!(tree.get(b_id).unwrap().property("checked"), Some(&Value::Flag(true)));
}

// Once a property was written interactively, attribute syncs only change the
// declared value; a typed property patch reasserts control.
#[test]
fn interactive_writes_pin_the_live_value_against_attributes() {
	let bus = EventBus::new();
	let mut differ = TreeDiffer::new(schemas());

	let declared_on = [attribute_bound(&[("X", true)])];
	differ.update_children(&bus, &[], &declared_on, DEFAULT_DEPTH_LIMIT).unwrap();
	let x_id = slots(&differ)[0];
	assert_eq!(differ.tree().get(x_id).unwrap().property("checked"), Some(&Value::Flag(true)));

	// The user unchecks it.
	differ.write_interactive(x_id, "checked", false);

	let declared_off = [attribute_bound(&[("X", false)])];
	differ.update_children(&bus, &declared_on, &declared_off, DEFAULT_DEPTH_LIMIT).unwrap();
	let declared_on_again = [attribute_bound(&[("X", true)])];
	differ.update_children(&bus, &declared_off, &declared_on_again, DEFAULT_DEPTH_LIMIT).unwrap();

	// The declared value is back, the live value is not.
	let tree = differ.tree();
	assert_eq!(tree.get(x_id).unwrap().attribute("checked"), Some(""));
	assert_eq!(tree.get(x_id).unwrap().property("checked"), Some(&Value::Flag(false)));

	let property_on = [property_bound(&[("X", true)])];
	differ.update_children(&bus, &declared_on_again, &property_on, DEFAULT_DEPTH_LIMIT).unwrap();
	assert_eq!(differ.tree().get(x_id).unwrap().property("checked"), Some(&Value::Flag(true)));
}
