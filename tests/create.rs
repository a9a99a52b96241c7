use espalier::{
	diff::{TreeDiffer, DEFAULT_DEPTH_LIMIT},
	event::EventBus,
	patch::PatchOp,
	schema::SchemaMap,
	template::TreeDescription,
};
use std::{rc::Rc, slice};

fn plain_differ() -> TreeDiffer {
	TreeDiffer::new(Rc::new(SchemaMap::new()))
}

#[test]
fn first_commit_is_a_single_insert() {
	let bus = EventBus::new();
	let mut differ = plain_differ();

	let list = TreeDescription::new("list")
		.child(TreeDescription::new("item").attribute("text", "Buy milk"))
		.child(TreeDescription::new("item").attribute("text", "Walk dog"));
	let patches = differ.update_children(&bus, &[], slice::from_ref(&list), DEFAULT_DEPTH_LIMIT).unwrap();

	assert_eq!(patches.len(), 1);
	assert!(matches!(&patches[0], PatchOp::Insert { index: 0, .. }));

	let tree = differ.tree();
	let list_id = tree.child_at(differ.root(), 0).unwrap();
	assert_eq!(tree.get(list_id).unwrap().tag(), "list");
	assert_eq!(tree.children(list_id).len(), 2);
	let first = tree.child_at(list_id, 0).unwrap();
	assert_eq!(tree.get(first).unwrap().attribute("text"), Some("Buy milk"));
	let second = tree.child_at(list_id, 1).unwrap();
	assert_eq!(tree.get(second).unwrap().attribute("text"), Some("Walk dog"));
}

#[test]
fn empty_next_is_a_pure_remove() {
	let bus = EventBus::new();
	let mut differ = plain_differ();

	let list = [TreeDescription::new("list").child(TreeDescription::new("item").attribute("text", "Buy milk"))];
	differ.update_children(&bus, &[], &list, DEFAULT_DEPTH_LIMIT).unwrap();
	assert_eq!(differ.tree().live_count(), 3);

	let patches = differ.update_children(&bus, &list, &[], DEFAULT_DEPTH_LIMIT).unwrap();
	assert!(matches!(patches[..], [PatchOp::Remove { index: 0, .. }]));
	assert!(differ.tree().children(differ.root()).is_empty());
	// only the root container survives
	assert_eq!(differ.tree().live_count(), 1);
}

#[test]
fn identical_references_are_a_no_op() {
	let bus = EventBus::new();
	let mut differ = plain_differ();

	let committed = [TreeDescription::new("list").child(TreeDescription::new("item"))];
	differ.update_children(&bus, &[], &committed, DEFAULT_DEPTH_LIMIT).unwrap();

	let patches = differ.update_children(&bus, &committed, &committed, DEFAULT_DEPTH_LIMIT).unwrap();
	assert!(patches.is_empty());
}

#[test]
fn tag_change_replaces_the_node() {
	let bus = EventBus::new();
	let mut differ = plain_differ();

	let label = [TreeDescription::new("label").attribute("text", "Buy milk")];
	differ.update_children(&bus, &[], &label, DEFAULT_DEPTH_LIMIT).unwrap();
	let old_id = differ.tree().child_at(differ.root(), 0).unwrap();

	let button = [TreeDescription::new("button").attribute("text", "Buy milk")];
	let patches = differ.update_children(&bus, &label, &button, DEFAULT_DEPTH_LIMIT).unwrap();
	assert!(matches!(patches[..], [PatchOp::Remove { index: 0, .. }, PatchOp::Insert { index: 0, .. }]));

	let new_id = differ.tree().child_at(differ.root(), 0).unwrap();
	assert_ne!(old_id, new_id);
	assert_eq!(differ.tree().get(new_id).unwrap().tag(), "button");
}
