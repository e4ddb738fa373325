//! In-memory history stack.
//!
//! Used for tests, server rendering and any host without a browser. The
//! stack behaves like a browser session history: pushing drops the forward
//! entries, and `go` never leaves the stack.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use wayfinder_core::Subscription;

use crate::location::{HistoryLocation, HistoryState, parse_href};
use crate::{History, HistoryAction, HistoryEvent};

type Listener = Rc<dyn Fn(&HistoryEvent)>;

/// A history stack held in memory.
///
/// Clones share the same stack.
#[derive(Clone)]
pub struct MemoryHistory {
	inner: Rc<MemoryInner>,
}

struct MemoryInner {
	entries: RefCell<Vec<HistoryLocation>>,
	index: Cell<usize>,
	listeners: RefCell<Vec<(u64, Listener)>>,
	next_listener_id: Cell<u64>,
	next_key: Cell<u64>,
}

impl MemoryHistory {
	/// Creates a stack holding a single `/` entry.
	pub fn new() -> Self {
		Self::with_entries(["/"], 0)
	}

	/// Creates a stack from `entries`, positioned at `initial_index`.
	///
	/// The index is clamped into the stack. An empty list behaves like
	/// [`MemoryHistory::new`].
	pub fn with_entries<I, S>(entries: I, initial_index: usize) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let inner = MemoryInner {
			entries: RefCell::new(Vec::new()),
			index: Cell::new(0),
			listeners: RefCell::new(Vec::new()),
			next_listener_id: Cell::new(0),
			next_key: Cell::new(0),
		};

		let mut stack: Vec<HistoryLocation> = Vec::new();
		for href in entries {
			let state = HistoryState {
				key: inner.create_key(),
				index: stack.len(),
				data: serde_json::Value::Null,
			};
			stack.push(parse_href(href.as_ref(), state));
		}
		if stack.is_empty() {
			stack.push(parse_href(
				"/",
				HistoryState {
					key: inner.create_key(),
					..HistoryState::default()
				},
			));
		}

		inner.index.set(initial_index.min(stack.len() - 1));
		*inner.entries.borrow_mut() = stack;

		Self {
			inner: Rc::new(inner),
		}
	}

	/// Snapshot of every entry in the stack.
	pub fn entries(&self) -> Vec<HistoryLocation> {
		self.inner.entries.borrow().clone()
	}

	/// Current position in the stack.
	pub fn index(&self) -> usize {
		self.inner.index.get()
	}

	fn traverse(&self, delta: isize, action: HistoryAction) {
		let len = self.length();
		let current = self.inner.index.get();
		let target = (current as isize).saturating_add(delta).clamp(0, len as isize - 1) as usize;
		if target == current {
			tracing::trace!(delta, index = current, "history traversal out of range, ignoring");
			return;
		}

		self.inner.index.set(target);
		self.notify(action);
	}

	fn notify(&self, action: HistoryAction) {
		let event = HistoryEvent {
			action,
			location: self.location(),
		};
		let listeners: Vec<Listener> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.map(|(_, listener)| Rc::clone(listener))
			.collect();

		for listener in listeners {
			listener(&event);
		}
	}
}

impl Default for MemoryHistory {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryInner {
	fn create_key(&self) -> String {
		let key = self.next_key.get();
		self.next_key.set(key + 1);
		format!("{key:06x}")
	}
}

impl History for MemoryHistory {
	fn location(&self) -> HistoryLocation {
		let entries = self.inner.entries.borrow();
		entries[self.inner.index.get()].clone()
	}

	fn listen(&self, listener: Box<dyn Fn(&HistoryEvent)>) -> Subscription {
		let id = self.inner.next_listener_id.get();
		self.inner.next_listener_id.set(id + 1);
		self.inner.listeners.borrow_mut().push((id, Rc::from(listener)));

		let inner: Weak<MemoryInner> = Rc::downgrade(&self.inner);
		Subscription::new(move || {
			if let Some(inner) = inner.upgrade() {
				inner
					.listeners
					.borrow_mut()
					.retain(|(listener_id, _)| *listener_id != id);
			}
		})
	}

	fn push(&self, path: &str, data: serde_json::Value) {
		let index = self.inner.index.get() + 1;
		let state = HistoryState {
			key: self.inner.create_key(),
			index,
			data,
		};
		{
			let mut entries = self.inner.entries.borrow_mut();
			entries.truncate(index);
			entries.push(parse_href(path, state));
		}
		self.inner.index.set(index);
		tracing::trace!(path, index, "history push");
		self.notify(HistoryAction::Push);
	}

	fn replace(&self, path: &str, data: serde_json::Value) {
		let index = self.inner.index.get();
		let state = HistoryState {
			key: self.inner.create_key(),
			index,
			data,
		};
		self.inner.entries.borrow_mut()[index] = parse_href(path, state);
		tracing::trace!(path, index, "history replace");
		self.notify(HistoryAction::Replace);
	}

	fn go(&self, delta: isize) {
		self.traverse(delta, HistoryAction::Go);
	}

	fn back(&self) {
		self.traverse(-1, HistoryAction::Back);
	}

	fn forward(&self) {
		self.traverse(1, HistoryAction::Forward);
	}

	fn length(&self) -> usize {
		self.inner.entries.borrow().len()
	}
}

impl fmt::Debug for MemoryHistory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryHistory")
			.field("index", &self.inner.index.get())
			.field("length", &self.length())
			.field("listeners", &self.inner.listeners.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_initial_index_is_clamped() {
		let history = MemoryHistory::with_entries(["/a", "/b"], 10);

		assert_eq!(history.index(), 1);
		assert_eq!(history.location().pathname, "/b");
	}

	#[rstest]
	fn test_empty_entries_fall_back_to_root() {
		let history = MemoryHistory::with_entries(Vec::<String>::new(), 0);

		assert_eq!(history.length(), 1);
		assert_eq!(history.location().href, "/");
	}

	#[rstest]
	fn test_keys_are_unique() {
		let history = MemoryHistory::new();
		history.push("/a", serde_json::Value::Null);
		history.push("/a", serde_json::Value::Null);

		let keys: Vec<String> = history.entries().into_iter().map(|e| e.state.key).collect();
		assert_eq!(keys.len(), 3);
		assert_ne!(keys[1], keys[2]);
		assert_ne!(keys[0], keys[1]);
	}
}
