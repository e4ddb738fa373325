//! # wayfinder-core
//!
//! Shared primitives used by every wayfinder crate.
//!
//! ## Contents
//!
//! - [`Store`]: an observable container whose value is replaced wholesale and
//!   published to subscribers, with batched notifications
//! - [`SearchValue`]: a JSON-like value whose strings, arrays and objects live
//!   behind `Rc`, so structural sharing can be observed through [`SearchValue::ptr_eq`]
//! - [`Subscription`]: the unsubscribe handle handed out by `subscribe`/`listen`
//!
//! ## Example
//!
//! ```rust
//! use wayfinder_core::{SearchValue, Store, replace_equal_deep};
//!
//! let store = Store::new(SearchValue::from([("page", 1)]));
//! let previous = store.get();
//!
//! store.set_state(|prev| replace_equal_deep(prev, &SearchValue::from([("page", 1)])));
//!
//! // Deep-equal updates keep the previous allocation.
//! assert!(SearchValue::ptr_eq(&previous, &store.get()));
//! ```

pub mod store;
pub mod subscription;
pub mod value;

pub use store::Store;
pub use subscription::Subscription;
pub use value::{SearchMap, SearchValue, format_number, partial_deep_equal, replace_equal_deep};
