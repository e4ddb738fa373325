//! # wayfinder-router
//!
//! Nested route matching with parent-aware data loading.
//!
//! Routes are declared as a tree of [`Route`]s, each carrying an optional
//! search validator, guard (`before_load`), loader and context getter. A
//! [`Router`] matches locations against the tree, runs guards and loaders
//! for the matched chain and commits the result to its state store.
//!
//! ## Control flow
//!
//! Callbacks return `Result<_, NavigationSignal>`. A [`Redirect`] or
//! [`NotFound`] signal steers the navigation; any other error becomes a
//! [`MatchError`] on the failing match and cuts off the matches below it.
//!
//! ## Example
//!
//! ```rust
//! use wayfinder_history::MemoryHistory;
//! use wayfinder_router::{NavigateOptions, Route, RouteOptions, Router, RouterOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wayfinder_router::RouterError> {
//! let root = Route::root(RouteOptions::new());
//! let post = Route::new(
//! 	&root,
//! 	RouteOptions::new()
//! 		.path("posts/$postId")
//! 		.loader(|ctx| async move { Ok(serde_json::json!({ "id": ctx.params["postId"] })) }),
//! );
//! let root = root.add_children([post]);
//!
//! let router = Router::new(RouterOptions::new(root).history(MemoryHistory::new()))?;
//! router.navigate(NavigateOptions::to("/posts/7")).await?;
//!
//! let state = router.state();
//! assert_eq!(state.current_location.pathname, "/posts/7");
//! assert_eq!(
//! 	state.current_matches[1].loader_data(),
//! 	Some(serde_json::json!({ "id": "7" }))
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod location;
pub mod route;
pub mod route_match;
pub mod router;
pub mod tree;

pub use config::{PreloadStrategy, RouteChangeHook, RouterOptions, RouterSettings};
pub use error::{
	ConfigError, Fault, MatchError, NavigationSignal, NotFound, Redirect, Result, RouterError,
};
pub use location::{
	BuildContext, HashIntent, NavigateOptions, ParamsIntent, ParsedLocation, SearchIntent,
	StateIntent, build_location,
};
pub use route::{
	BeforeLoadContext, ContextArgs, LoaderContext, MatchInfo, Route, RouteContext, RouteOptions,
};
pub use route_match::{LoadOutcome, MatchStatus, RouteMatch, RouteMatchState};
pub use router::{
	LoadMatchesOutcome, MatchRouteOptions, RouteLoadOutcome, Router, RouterState, RouterStatus,
};
pub use tree::{ROOT_ROUTE_ID, RouteNode, RouteTree, TreeMatch};
