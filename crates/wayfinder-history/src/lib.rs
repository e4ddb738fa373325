//! # wayfinder-history
//!
//! The history stack the router reads locations from and writes
//! navigations to.
//!
//! The router never touches a global: a [`History`] implementation is
//! constructed by the application and handed to the router. This crate ships
//! [`MemoryHistory`]; browser-backed implementations live with the host
//! integration.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use wayfinder_history::{History, HistoryAction, HistoryEvent, MemoryHistory};
//!
//! let history = MemoryHistory::new();
//! let actions = Rc::new(RefCell::new(Vec::new()));
//! let sink = actions.clone();
//! let subscription = history.listen(Box::new(move |event: &HistoryEvent| sink.borrow_mut().push(event.action)));
//!
//! history.push("/posts", serde_json::Value::Null);
//! history.back();
//!
//! assert_eq!(*actions.borrow(), [HistoryAction::Push, HistoryAction::Back]);
//! assert_eq!(history.location().pathname, "/");
//! subscription.unsubscribe();
//! ```

pub mod location;
pub mod memory;

pub use location::{HistoryLocation, HistoryState, parse_href};
pub use memory::MemoryHistory;

use serde::{Deserialize, Serialize};
use wayfinder_core::Subscription;

/// What caused a history change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
	Push,
	Replace,
	Back,
	Forward,
	Go,
}

impl HistoryAction {
	/// Returns `true` for back, forward and go.
	pub fn is_traversal(self) -> bool {
		matches!(self, Self::Back | Self::Forward | Self::Go)
	}
}

/// Delivered to [`History::listen`] listeners after the stack changed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
	pub action: HistoryAction,
	/// The location after the change.
	pub location: HistoryLocation,
}

/// A session history stack.
///
/// `push` and `replace` update [`History::location`] before any listener
/// runs. Listeners fire after every change, programmatic or traversal.
pub trait History {
	/// The current entry.
	fn location(&self) -> HistoryLocation;

	/// Registers a listener for every change to the stack.
	fn listen(&self, listener: Box<dyn Fn(&HistoryEvent)>) -> Subscription;

	/// Adds an entry after the current one, dropping any forward entries.
	fn push(&self, path: &str, data: serde_json::Value);

	/// Overwrites the current entry.
	fn replace(&self, path: &str, data: serde_json::Value);

	/// Moves `delta` entries through the stack.
	fn go(&self, delta: isize);

	fn back(&self) {
		self.go(-1);
	}

	fn forward(&self) {
		self.go(1);
	}

	/// Number of entries in the stack.
	fn length(&self) -> usize;

	fn can_go_back(&self) -> bool {
		self.location().state.index > 0
	}

	/// Turns a router href into the href written to the stack.
	fn create_href(&self, href: &str) -> String {
		href.to_string()
	}
}
