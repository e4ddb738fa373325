//! # Wayfinder
//!
//! Route matching and navigation with nested, parent-aware data loading.
//!
//! Wayfinder matches locations against a tree of declared routes, runs
//! their guards and loaders in parent-to-child order and keeps the result in
//! an observable store. Navigations that are overtaken by newer ones never
//! commit.
//!
//! ## Feature Flags
//!
//! - `core` - State store and structured search values
//! - `urls` - Path templates, relative resolution and search codecs
//! - `history` - History contract and the in-memory history
//! - `router` - Route tree, location builder and navigation engine
//! - `full` (default) - Everything
//!
//! ## Quick Example
//!
//! ```rust
//! use wayfinder::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RouterError> {
//! let root = Route::root(RouteOptions::new());
//! let about = Route::new(&root, RouteOptions::new().path("about"));
//! let root = root.add_children([about]);
//!
//! let router = Router::new(RouterOptions::new(root))?;
//! router.navigate(NavigateOptions::to("/about")).await?;
//!
//! assert_eq!(router.state().current_location.href, "/about");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "core")]
pub use wayfinder_core as core;
#[cfg(feature = "history")]
pub use wayfinder_history as history;
#[cfg(feature = "router")]
pub use wayfinder_router as router;
#[cfg(feature = "urls")]
pub use wayfinder_urls as urls;

#[cfg(feature = "core")]
pub use wayfinder_core::{SearchValue, Store, Subscription};

#[cfg(feature = "history")]
pub use wayfinder_history::{History, HistoryAction, HistoryEvent, HistoryLocation, MemoryHistory};

#[cfg(feature = "router")]
pub use wayfinder_router::{
	MatchStatus, NavigateOptions, NavigationSignal, NotFound, Redirect, Route, RouteMatch,
	RouteOptions, Router, RouterError, RouterOptions, RouterSettings, RouterState,
};

/// The types most applications need.
pub mod prelude {
	#[cfg(feature = "core")]
	pub use wayfinder_core::{SearchValue, Subscription};

	#[cfg(feature = "urls")]
	pub use wayfinder_urls::{PathParams, TrailingSlash};

	#[cfg(feature = "history")]
	pub use wayfinder_history::{History, MemoryHistory};

	#[cfg(feature = "router")]
	pub use wayfinder_router::{
		BeforeLoadContext, HashIntent, LoaderContext, MatchRouteOptions, NavigateOptions,
		NavigationSignal, NotFound, ParamsIntent, Redirect, Route, RouteContext, RouteMatch,
		RouteOptions, Router, RouterError, RouterOptions, RouterSettings, SearchIntent, StateIntent,
	};
}
