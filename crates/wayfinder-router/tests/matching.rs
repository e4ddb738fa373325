//! Route selection and active-link matching.

use proptest::prelude::*;
use rstest::{fixture, rstest};
use wayfinder_core::SearchValue;
use wayfinder_history::MemoryHistory;
use wayfinder_router::{
	ConfigError, MatchRouteOptions, NavigateOptions, Route, RouteOptions, Router, RouterError,
	RouterOptions, RouterSettings, SearchIntent,
};

fn route(parent: &Route, path: &str) -> Route {
	Route::new(parent, RouteOptions::new().path(path))
}

/// Siblings declared least specific first.
fn build_router() -> Router {
	let root = Route::root(RouteOptions::new());
	let wildcard = route(&root, "$");
	let param = route(&root, "$x");
	let literal = route(&root, "a");
	let posts = route(&root, "posts");
	let post = route(&posts, "$postId");
	let posts = posts.add_children([post]);
	let root = root.add_children([wildcard, param, literal, posts]);
	Router::new(RouterOptions::new(root).history(MemoryHistory::new())).unwrap()
}

#[fixture]
fn router() -> Router {
	build_router()
}

#[rstest]
#[case("/a", "/a")]
#[case("/b", "/$x")]
#[case("/b/c", "/$")]
#[case("/posts/7", "/posts/$postId")]
#[case("/posts", "/posts")]
fn test_most_specific_route_wins(router: Router, #[case] pathname: &str, #[case] route_id: &str) {
	let matches = router.match_routes(pathname, &SearchValue::object());

	assert_eq!(matches.last().unwrap().route_id(), route_id);
}

#[rstest]
fn test_wildcard_captures_remainder(router: Router) {
	let matches = router.match_routes("/docs/guide/intro", &SearchValue::object());

	assert_eq!(matches[1].params()["*"], "docs/guide/intro");
}

#[rstest]
#[tokio::test]
async fn test_match_route_checks_committed_location(router: Router) {
	// Arrange
	let comments = SearchIntent::Set(SearchValue::from([("tab", "comments")]));
	router
		.navigate(NavigateOptions::to("/posts/42").search(comments))
		.await
		.unwrap();
	let exact = MatchRouteOptions::default();
	let fuzzy = MatchRouteOptions {
		fuzzy: true,
		..MatchRouteOptions::default()
	};

	// Act / Assert
	assert!(router.match_route(&NavigateOptions::to("/posts/42"), exact).is_some());
	assert!(router.match_route(&NavigateOptions::to("/posts/7"), exact).is_none());
	assert!(router.match_route(&NavigateOptions::to("/posts"), exact).is_none());
	assert!(router.match_route(&NavigateOptions::to("/posts"), fuzzy).is_some());

	let files = SearchIntent::Set(SearchValue::from([("tab", "files")]));
	let other_tab = NavigateOptions::to("/posts/42").search(files);
	assert!(router.match_route(&other_tab, exact).is_none());
	let ignore_search = MatchRouteOptions {
		include_search: false,
		..MatchRouteOptions::default()
	};
	assert!(router.match_route(&other_tab, ignore_search).is_some());
}

#[rstest]
fn test_match_route_without_pending_location(router: Router) {
	let pending = MatchRouteOptions {
		pending: true,
		..MatchRouteOptions::default()
	};

	assert!(router.match_route(&NavigateOptions::to("/"), pending).is_none());
}

#[rstest]
fn test_get_route(router: Router) {
	let post = router.get_route("/posts/$postId").unwrap();
	let node = router.tree().get("/posts/$postId").unwrap();

	assert!(Route::ptr_eq(&post, &node.route));
	assert_eq!(node.full_path, "/posts/$postId");
	assert!(matches!(
		router.get_route("/missing"),
		Err(RouterError::RouteNotFound(ref id)) if id == "/missing"
	));
}

#[rstest]
#[tokio::test]
async fn test_basepath_is_kept_in_locations() {
	let root = Route::root(RouteOptions::new());
	let users = route(&root, "users");
	let root = root.add_children([users]);
	let history = MemoryHistory::with_entries(["/app"], 0);
	let settings = RouterSettings::default().with_basepath("app/");
	let options = RouterOptions::from_settings(root, settings).history(history);
	let router = Router::new(options).unwrap();

	router.navigate(NavigateOptions::to("users")).await.unwrap();

	let state = router.state();
	assert_eq!(router.basepath(), "/app");
	assert_eq!(state.current_location.pathname, "/app/users");
	assert_eq!(state.current_matches.last().unwrap().route_id(), "/users");
}

#[rstest]
fn test_literal_star_in_initial_url_survives_construction() {
	let root = Route::root(RouteOptions::new());
	let files = route(&root, "files");
	let rest = route(&files, "$");
	let files = files.add_children([rest]);
	let root = root.add_children([files]);
	let history = MemoryHistory::with_entries(["/files/*"], 0);

	let router = Router::new(RouterOptions::new(root).history(history.clone())).unwrap();

	assert_eq!(history.entries()[0].pathname, "/files/*");
	assert_eq!(router.state().latest_location.pathname, "/files/*");
}

#[rstest]
fn test_invalid_tree_fails_construction() {
	let root = Route::root(RouteOptions::new());
	let first = Route::new(&root, RouteOptions::new().path("same"));
	let second = Route::new(&root, RouteOptions::new().path("same"));
	let root = root.add_children([first, second]);

	let error = Router::new(RouterOptions::new(root)).unwrap_err();

	assert!(matches!(
		error,
		RouterError::Config(ConfigError::DuplicateRouteId(ref id)) if id == "/same"
	));
}

proptest! {
	#[test]
	fn prop_build_location_is_deterministic(post_id in "[a-z0-9]{1,8}", page in 0i32..50) {
		let router = build_router();
		let options = NavigateOptions::to("/posts/$postId")
			.with_params([("postId", post_id.as_str())])
			.search(SearchIntent::Set(SearchValue::from([("page", page)])));

		let first = router.build_location(&options);
		let second = router.build_location(&options);

		prop_assert_eq!(&first.href, &second.href);
		prop_assert_eq!(first.pathname, format!("/posts/{post_id}"));
	}
}
