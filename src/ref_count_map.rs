use core::{
	borrow::Borrow,
	hash::{BuildHasher, Hash},
};
use hashbrown::{
	hash_map::{DefaultHashBuilder, DrainFilter, Entry},
	HashMap,
};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

/// A hash map that counts references to each entry.
///
/// Used for listener handles: every binding of a handler to a widget increments,
/// every unbinding decrements, and entries that reach zero stay cached until
/// [`drain_unreferenced`](`RefCountMap::drain_unreferenced`) runs at the end of a
/// reconciliation pass, so a handler that is unbound and immediately rebound keeps
/// its resolved listener.
pub struct RefCountMap<K, C, V, S = DefaultHashBuilder>(HashMap<K, (C, V), S>)
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher;
impl<K, C, V, S> Default for RefCountMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, C, V, S> RefCountMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	#[must_use]
	pub fn new() -> Self
	where
		S: Default,
	{
		Self(HashMap::with_hasher(S::default()))
	}

	pub fn increment_or_insert_with<F: FnOnce() -> V>(&mut self, k: K, v: F) -> Result<&mut V, CountSaturatedError> {
		match self.0.entry(k) {
			Entry::Occupied(occupied) => {
				let (c, v) = occupied.into_mut();
				*c = c.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(v)
			}
			Entry::Vacant(vacant) => {
				let (_, v) = vacant.insert((C::one(), v()));
				Ok(v)
			}
		}
	}

	/// Decrements the count for `k` without removing the entry, even at zero.
	pub fn weak_decrement<Q: ?Sized>(&mut self, k: &Q) -> Result<Option<&mut V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(k) {
			Some((c, v)) => {
				*c = c.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(v))
			}
			None => Ok(None),
		}
	}

	#[must_use]
	pub fn get<Q: ?Sized>(&self, k: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		self.0.get(k).map(|(_, v)| v)
	}

	pub fn drain_unreferenced(&mut self) -> DrainUnreferenced<'_, K, C, V> {
		DrainUnreferenced(self.0.drain_filter(DrainUnreferenced::zero_filter))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}

pub struct DrainUnreferenced<'a, K, C, V>(DrainFilter<'a, K, (C, V), fn(&K, &mut (C, V)) -> bool>);
impl<'a, K, C, V> DrainUnreferenced<'a, K, C, V>
where
	C: Zero,
{
	fn zero_filter(_: &K, (c, _): &mut (C, V)) -> bool {
		c.is_zero()
	}
}
impl<'a, K, C, V> Iterator for DrainUnreferenced<'a, K, C, V> {
	type Item = (K, V);

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next().map(|(k, (_, v))| (k, v))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}

#[derive(Debug)]
pub struct CountSaturatedError;
