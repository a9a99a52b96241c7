use crate::template::Key;
use thiserror::Error;

/// A numeric attribute value that does not parse.
///
/// The affected property retains its previous value and the instance remains usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attribute {name:?} does not parse as a number: {raw:?}")]
pub struct ParseError {
	pub name: Box<str>,
	pub raw: Option<Box<str>>,
}

/// Reconciliation refusals.
///
/// Emitted before any patch of the failing pass is applied, so the retained tree
/// still matches the last committed description afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
	/// Two siblings in one keyed list carry the same [`Key`]. Identity would be
	/// ambiguous, so the differ refuses to guess.
	#[error("duplicate sibling key {0}")]
	DuplicateKey(Key),
}

/// Illegal lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
	#[error("the instance is not mounted")]
	NotMounted,
	#[error("the instance is already mounted")]
	AlreadyMounted,
}

/// Any error a [`ComponentInstance`](`crate::component::ComponentInstance`) entry
/// point can surface. All variants are local and recoverable; the instance continues
/// operating on its last-known-good state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error(transparent)]
	Diff(#[from] DiffError),
	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),
}
