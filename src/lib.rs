#![doc(html_root_url = "https://docs.rs/espalier/0.1.0")]
#![warn(clippy::pedantic)]

//! A declarative template differ for retained widget trees.
//!
//! Component state is turned into a [`TreeDescription`](`template::TreeDescription`),
//! diffed against the previously committed description with positional or keyed
//! child identity, and applied to a retained [`WidgetTree`](`tree::WidgetTree`) as a
//! minimal, ordered [`PatchOp`](`patch::PatchOp`) sequence. A schema-driven bridge
//! keeps external string attributes and internal typed properties consistent in both
//! directions, and a single-hop event bus carries `{kind, detail}` notifications
//! from child widgets to the listeners their parent bound.
//!
//! Everything is single-threaded and cooperative; each
//! [`ComponentInstance`](`component::ComponentInstance`) owns its committed tree
//! exclusively.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod component;
pub mod diff;
pub mod error;
pub mod event;
pub mod patch;
mod ref_count_map;
pub mod registry;
pub mod scheduler;
pub mod schema;
pub mod template;
pub mod tree;
