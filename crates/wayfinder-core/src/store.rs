//! Store - Observable State Container
//!
//! `Store<T>` holds one value that is only ever replaced wholesale. Every
//! replacement is published to the subscribers registered through
//! [`Store::subscribe`].
//!
//! ## Key Features
//!
//! - **Whole-state replacement**: [`Store::set_state`] receives the previous
//!   value and returns the next one. Callers keep unchanged parts shared.
//! - **Batching**: updates made inside [`Store::batch`] are coalesced into a
//!   single notification delivered when the outermost batch returns.
//! - **Re-entrancy**: listeners receive a snapshot, so they may read the store
//!   or schedule further updates while being notified.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use wayfinder_core::Store;
//!
//! let store = Store::new(0);
//! let seen = Rc::new(Cell::new(0));
//! let sink = seen.clone();
//! let subscription = store.subscribe(move |value: &i32| sink.set(*value));
//!
//! store.batch(|| {
//!     store.set_state(|n| n + 1);
//!     store.set_state(|n| n + 1);
//! });
//!
//! assert_eq!(seen.get(), 2);
//! subscription.unsubscribe();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::subscription::Subscription;

type Listener<T> = Rc<dyn Fn(&T)>;

/// An observable value container.
///
/// Cloning a `Store` yields another handle to the same state and listeners.
pub struct Store<T: 'static> {
	inner: Rc<StoreInner<T>>,
}

struct StoreInner<T> {
	state: RefCell<T>,
	listeners: RefCell<Vec<(u64, Listener<T>)>>,
	next_listener_id: Cell<u64>,
	batch_depth: Cell<usize>,
	dirty: Cell<bool>,
}

impl<T: 'static> Clone for Store<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<T: Clone + 'static> Store<T> {
	/// Creates a store holding `value`.
	pub fn new(value: T) -> Self {
		Self {
			inner: Rc::new(StoreInner {
				state: RefCell::new(value),
				listeners: RefCell::new(Vec::new()),
				next_listener_id: Cell::new(0),
				batch_depth: Cell::new(0),
				dirty: Cell::new(false),
			}),
		}
	}

	/// Returns a clone of the current state.
	pub fn get(&self) -> T {
		self.inner.state.borrow().clone()
	}

	/// Reads the current state without cloning it.
	///
	/// `f` must not call [`Store::set_state`] on the same store.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.state.borrow())
	}

	/// Replaces the state with the value returned by `updater`.
	///
	/// Subscribers are notified immediately, or once the enclosing
	/// [`Store::batch`] returns.
	pub fn set_state(&self, updater: impl FnOnce(&T) -> T) {
		let next = {
			let current = self.inner.state.borrow();
			updater(&current)
		};
		*self.inner.state.borrow_mut() = next;

		if self.inner.batch_depth.get() > 0 {
			self.inner.dirty.set(true);
			return;
		}
		self.notify();
	}

	/// Registers a listener invoked with the new state after every update.
	pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
		let id = self.inner.next_listener_id.get();
		self.inner.next_listener_id.set(id + 1);
		self.inner
			.listeners
			.borrow_mut()
			.push((id, Rc::new(listener)));

		let inner: Weak<StoreInner<T>> = Rc::downgrade(&self.inner);
		Subscription::new(move || {
			if let Some(inner) = inner.upgrade() {
				inner
					.listeners
					.borrow_mut()
					.retain(|(listener_id, _)| *listener_id != id);
			}
		})
	}

	/// Runs `f`, deferring notifications until the outermost batch returns.
	///
	/// Listeners fire at most once per outermost batch, and only if some
	/// update happened inside it.
	pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
		self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
		let result = f();
		let depth = self.inner.batch_depth.get() - 1;
		self.inner.batch_depth.set(depth);

		if depth == 0 && self.inner.dirty.replace(false) {
			self.notify();
		}
		result
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.borrow().len()
	}

	/// Returns `true` when both handles point at the same store.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.inner, &b.inner)
	}

	fn notify(&self) {
		let snapshot = self.get();
		let listeners: Vec<Listener<T>> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.map(|(_, listener)| Rc::clone(listener))
			.collect();

		for listener in listeners {
			listener(&snapshot);
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Store<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.inner.state.borrow())
			.field("listeners", &self.inner.listeners.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn recorder<T: Clone + 'static>(store: &Store<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = seen.clone();
		let subscription = store.subscribe(move |value: &T| sink.borrow_mut().push(value.clone()));
		(seen, subscription)
	}

	#[rstest]
	fn test_store_get_and_set_state() {
		let store = Store::new(1);
		store.set_state(|n| n * 10);
		assert_eq!(store.get(), 10);
		assert_eq!(store.with(|n| n + 1), 11);
	}

	#[rstest]
	fn test_subscribers_receive_each_update() {
		let store = Store::new(String::from("a"));
		let (seen, _subscription) = recorder(&store);

		store.set_state(|s| format!("{s}b"));
		store.set_state(|s| format!("{s}c"));

		assert_eq!(*seen.borrow(), vec!["ab".to_string(), "abc".to_string()]);
	}

	#[rstest]
	fn test_unsubscribe_stops_notifications() {
		let store = Store::new(0);
		let (seen, subscription) = recorder(&store);

		store.set_state(|n| n + 1);
		subscription.unsubscribe();
		store.set_state(|n| n + 1);

		assert_eq!(*seen.borrow(), vec![1]);
		assert_eq!(store.listener_count(), 0);
	}

	#[rstest]
	fn test_batch_coalesces_notifications() {
		let store = Store::new(0);
		let (seen, _subscription) = recorder(&store);

		store.batch(|| {
			store.set_state(|n| n + 1);
			store.batch(|| store.set_state(|n| n + 1));
			// nested batch must not flush early
			assert!(seen.borrow().is_empty());
			store.set_state(|n| n + 1);
		});

		assert_eq!(*seen.borrow(), vec![3]);
	}

	#[rstest]
	fn test_batch_without_updates_does_not_notify() {
		let store = Store::new(0);
		let (seen, _subscription) = recorder(&store);

		let value = store.batch(|| store.get() + 5);

		assert_eq!(value, 5);
		assert!(seen.borrow().is_empty());
	}

	#[rstest]
	fn test_listener_may_update_store() {
		let store = Store::new(0);
		let handle = store.clone();
		let _subscription = store.subscribe(move |value: &i32| {
			if *value == 1 {
				handle.set_state(|n| n + 1);
			}
		});

		store.set_state(|_| 1);

		assert_eq!(store.get(), 2);
	}
}
