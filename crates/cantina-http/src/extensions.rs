//! Type-keyed values attached to a request.
//!
//! Middleware stores what it resolved (the authenticated principal) and views
//! read it back by type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Extensions {
	map: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a value, replacing any previous value of the same type.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(42u32);
	/// assert_eq!(extensions.get::<u32>(), Some(42));
	/// assert_eq!(extensions.get::<String>(), None);
	/// ```
	pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
		let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.insert(TypeId::of::<T>(), Box::new(value));
	}

	pub fn get<T>(&self) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.get(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast_ref::<T>())
			.cloned()
	}
}

impl std::fmt::Debug for Extensions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let len = self.map.lock().map(|map| map.len()).unwrap_or(0);
		f.debug_struct("Extensions").field("len", &len).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[derive(Debug, Clone, PartialEq)]
	struct Caller(i64);

	#[rstest]
	fn test_insert_replaces_same_type() {
		let extensions = Extensions::new();
		extensions.insert(Caller(1));
		extensions.insert(Caller(2));
		assert_eq!(extensions.get::<Caller>(), Some(Caller(2)));
	}

	#[rstest]
	fn test_clones_share_storage() {
		let extensions = Extensions::new();
		let cloned = extensions.clone();
		cloned.insert(Caller(7));
		assert_eq!(extensions.get::<Caller>(), Some(Caller(7)));
		extensions.insert(Caller(8));
		assert_eq!(cloned.get::<Caller>(), Some(Caller(8)));
	}
}
