use crate::{
	component::{Component, ComponentInstance},
	schema::SchemaMap,
	scheduler::RenderPolicy,
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, warn};

pub type Constructor = fn() -> Box<dyn Component>;

/// Maps tag names to component definitions.
///
/// An explicit value: create one during bootstrap, [`define`](`ComponentRegistry::define`)
/// the tags the host uses, hand it to instance creation, drop it on teardown.
/// Nothing here is process-global.
///
/// Defining a tag also records its schema, so widgets created for that tag inside
/// any instance's tree bridge their attributes and properties.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
	constructors: HashMap<Box<str>, Constructor>,
	schemas: SchemaMap,
}
impl ComponentRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `tag`. Returns `false` (keeping the existing definition) if the tag
	/// is already taken.
	pub fn define(&mut self, tag: &str, construct: Constructor) -> bool {
		if self.constructors.contains_key(tag) {
			warn!("Tag {:?} is already defined; keeping the existing definition.", tag);
			return false;
		}
		let probe = construct();
		self.schemas.insert(tag, probe.schema());
		self.constructors.insert(tag.into(), construct);
		trace!("Defined tag {:?}.", tag);
		true
	}

	#[must_use]
	pub fn contains(&self, tag: &str) -> bool {
		self.constructors.contains_key(tag)
	}

	/// A snapshot of the schemas defined so far, as differs consume them.
	#[must_use]
	pub fn schemas(&self) -> Rc<SchemaMap> {
		Rc::new(self.schemas.clone())
	}

	/// Instantiates the component defined for `tag`, unmounted.
	#[must_use]
	pub fn create(&self, tag: &str, policy: RenderPolicy) -> Option<ComponentInstance> {
		let construct = self.constructors.get(tag)?;
		Some(ComponentInstance::new(construct(), policy, self.schemas()))
	}
}
