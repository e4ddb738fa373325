//! Unsubscribe handles.

use std::cell::Cell;
use std::fmt;

/// Handle returned by listener registrations.
///
/// [`Subscription::unsubscribe`] removes the listener. Dropping the handle
/// leaves the listener registered, which is what long-lived listeners (for
/// example a router mounted for the whole application lifetime) want.
pub struct Subscription {
	teardown: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
	/// Wraps the closure that removes the listener.
	pub fn new(teardown: impl FnOnce() + 'static) -> Self {
		Self {
			teardown: Cell::new(Some(Box::new(teardown))),
		}
	}

	/// A handle with nothing to tear down.
	pub fn noop() -> Self {
		Self {
			teardown: Cell::new(None),
		}
	}

	/// Removes the listener. Calling this more than once is a no-op.
	pub fn unsubscribe(&self) {
		if let Some(teardown) = self.teardown.take() {
			teardown();
		}
	}

	/// Returns `true` until [`Subscription::unsubscribe`] has been called.
	pub fn is_active(&self) -> bool {
		let teardown = self.teardown.take();
		let active = teardown.is_some();
		self.teardown.set(teardown);
		active
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.is_active())
			.finish()
	}
}
