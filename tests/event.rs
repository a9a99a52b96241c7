use espalier::{
	diff::{TreeDiffer, DEFAULT_DEPTH_LIMIT},
	event::{Event, EventBus},
	schema::SchemaMap,
	template::TreeDescription,
};
use std::{cell::RefCell, rc::Rc};

fn plain_differ() -> TreeDiffer {
	TreeDiffer::new(Rc::new(SchemaMap::new()))
}

fn init_logging() {
	use std::sync::Once;
	static LOG_INITIALIZED: Once = Once::new();
	//TODO: Fail on Warning or Error.
	LOG_INITIALIZED.call_once(|| tracing_subscriber::fmt().with_test_writer().init());
}

#[test]
fn press() {
	init_logging();

	let mut bus = EventBus::new();

	let press_count = Rc::new(RefCell::new(0));
	let callback = {
		let press_count = Rc::clone(&press_count);
		bus.register(move |event: &Event| {
			assert_eq!(&*event.kind, "press");
			*press_count.borrow_mut() += 1;
		})
	};

	let mut differ = plain_differ();
	let button = [TreeDescription::new("button").attribute("id", "test-button").on("press", callback)];

	assert_eq!(*press_count.borrow(), 0);
	differ.update_children(&bus, &[], &button, DEFAULT_DEPTH_LIMIT).unwrap();
	assert_eq!(*press_count.borrow(), 0);

	let button_id = differ.tree().child_at(differ.root(), 0).unwrap();
	assert_eq!(differ.dispatch(button_id, &Event::new("press", 0usize)), 1);
	assert_eq!(*press_count.borrow(), 1);

	differ.update_children(&bus, &button, &[], DEFAULT_DEPTH_LIMIT).unwrap();
	assert_eq!(*press_count.borrow(), 1);
}

#[test]
fn delivery_follows_bind_order() {
	let mut bus = EventBus::new();

	let order = Rc::new(RefCell::new(Vec::new()));
	let first = {
		let order = Rc::clone(&order);
		bus.register(move |_: &Event| order.borrow_mut().push(1))
	};
	let second = {
		let order = Rc::clone(&order);
		bus.register(move |_: &Event| order.borrow_mut().push(2))
	};
	let other = {
		let order = Rc::clone(&order);
		bus.register(move |_: &Event| order.borrow_mut().push(3))
	};

	let mut differ = plain_differ();
	let item = [TreeDescription::new("item").on("toggle", first).on("toggle", second).on("remove", other)];
	differ.update_children(&bus, &[], &item, DEFAULT_DEPTH_LIMIT).unwrap();

	let item_id = differ.tree().child_at(differ.root(), 0).unwrap();
	assert_eq!(differ.dispatch(item_id, &Event::new("toggle", 0usize)), 2);
	assert_eq!(*order.borrow(), vec![1, 2]);
}

#[test]
fn one_hop_only() {
	let mut bus = EventBus::new();

	let deliveries = Rc::new(RefCell::new(0));
	let callback = {
		let deliveries = Rc::clone(&deliveries);
		bus.register(move |_: &Event| *deliveries.borrow_mut() += 1)
	};

	let mut differ = plain_differ();
	// The binding sits on the list; its child has none.
	let list = [TreeDescription::new("list").on("toggle", callback).child(TreeDescription::new("item"))];
	differ.update_children(&bus, &[], &list, DEFAULT_DEPTH_LIMIT).unwrap();

	let list_id = differ.tree().child_at(differ.root(), 0).unwrap();
	let item_id = differ.tree().child_at(list_id, 0).unwrap();

	assert_eq!(differ.dispatch(item_id, &Event::new("toggle", 0usize)), 0);
	assert_eq!(*deliveries.borrow(), 0);
	assert_eq!(differ.dispatch(list_id, &Event::new("toggle", 0usize)), 1);
	assert_eq!(*deliveries.borrow(), 1);
}

#[test]
fn bound_listeners_survive_unregistration() {
	let mut bus = EventBus::new();

	let deliveries = Rc::new(RefCell::new(0));
	let callback = {
		let deliveries = Rc::clone(&deliveries);
		bus.register(move |_: &Event| *deliveries.borrow_mut() += 1)
	};

	let mut differ = plain_differ();
	let bound = [TreeDescription::new("button").on("press", callback)];
	differ.update_children(&bus, &[], &bound, DEFAULT_DEPTH_LIMIT).unwrap();
	let button_id = differ.tree().child_at(differ.root(), 0).unwrap();

	// The differ holds its own handle; the bus registration is no longer needed.
	assert!(bus.unregister(callback));
	assert_eq!(differ.dispatch(button_id, &Event::new("press", 0usize)), 1);

	// Unbinding through a re-render does drop delivery.
	let unbound = [TreeDescription::new("button")];
	differ.update_children(&bus, &bound, &unbound, DEFAULT_DEPTH_LIMIT).unwrap();
	assert_eq!(differ.dispatch(button_id, &Event::new("press", 0usize)), 0);
	assert_eq!(*deliveries.borrow(), 1);
}
