//! Match loading: ordering, validation, context, guards and preloading.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use rstest::rstest;
use wayfinder_core::SearchValue;
use wayfinder_history::{History, MemoryHistory};
use wayfinder_router::{
	Fault, MatchStatus, NavigateOptions, PreloadStrategy, Redirect, Route, RouteContext, RouteMatch,
	RouteOptions, Router, RouterOptions, RouterSettings, RouterStatus, SearchIntent,
};

fn delayed_route(
	path: &str,
	log: &Rc<RefCell<Vec<&'static str>>>,
	name: &'static str,
	delay_ms: u64,
) -> RouteOptions {
	let log = log.clone();
	RouteOptions::new().path(path).loader(move |_| {
		let log = log.clone();
		async move {
			tokio::time::sleep(Duration::from_millis(delay_ms)).await;
			log.borrow_mut().push(name);
			Ok(serde_json::json!(name))
		}
	})
}

#[rstest]
#[tokio::test]
async fn test_child_settles_after_parent() {
	// Arrange
	let finished = Rc::new(RefCell::new(Vec::new()));
	let root = Route::root(RouteOptions::new());
	let parent = Route::new(&root, delayed_route("p", &finished, "parent", 25));
	let child = Route::new(&parent, delayed_route("c", &finished, "child", 1));
	let parent = parent.add_children([child]);
	let root = root.add_children([parent]);
	let router = Router::new(RouterOptions::new(root)).unwrap();
	let location = router.build_location(&NavigateOptions::to("/p/c"));
	let matches = router.match_routes(&location.pathname, &location.search);

	// Act
	let outcome = router.load_matches(&matches, &location, false).await;

	// Assert
	assert_eq!(*finished.borrow(), ["child", "parent"]);
	assert_eq!(outcome.settle_order, ["__root__", "/p", "/p/c"]);
	assert!(outcome.redirect.is_none());
	assert!(matches.iter().all(|m| m.status() == MatchStatus::Success));
}

#[rstest]
#[tokio::test]
async fn test_guard_error_cuts_off_descendants() {
	// Arrange
	let child_loads = Rc::new(Cell::new(0));
	let counter = child_loads.clone();
	let root = Route::root(RouteOptions::new());
	let parent = Route::new(
		&root,
		RouteOptions::new()
			.path("p")
			.before_load(|_| async { Err(anyhow::anyhow!("forbidden").into()) }),
	);
	let child = Route::new(
		&parent,
		RouteOptions::new().path("c").loader(move |_| {
			counter.set(counter.get() + 1);
			async { Ok(serde_json::Value::Null) }
		}),
	);
	let parent = parent.add_children([child]);
	let root = root.add_children([parent]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	// Act
	router.navigate(NavigateOptions::to("/p/c")).await.unwrap();

	// Assert
	let matches = router.state().current_matches;
	assert_eq!(child_loads.get(), 0);
	assert_eq!(matches[1].status(), MatchStatus::Error);
	let error = matches[1].error().unwrap();
	assert_eq!(error.code(), "BEFORE_LOAD");
	assert_eq!(error.route_id(), Some("/p"));
	assert_eq!(error.cause().unwrap().to_string(), "forbidden");
	assert_eq!(matches[2].status(), MatchStatus::Idle);
}

#[rstest]
#[tokio::test]
async fn test_root_search_defaults_flow_into_children() {
	// Arrange
	let root = Route::root(RouteOptions::new().validate_search(|search| {
		let page = search.get("page").cloned().unwrap_or(SearchValue::from(0));
		Ok(SearchValue::from([("page", page)]))
	}));
	let posts = Route::new(
		&root,
		RouteOptions::new().path("posts").validate_search(|search| {
			match search.get("q").and_then(SearchValue::as_str) {
				Some(q) if !q.is_empty() => Ok(SearchValue::from([("q", q)])),
				_ => Err(anyhow::anyhow!("missing query").into()),
			}
		}),
	);
	let root = root.add_children([posts]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	// Act
	let query = SearchIntent::Set(SearchValue::from([("q", "rust")]));
	router
		.navigate(NavigateOptions::to("/posts").search(query))
		.await
		.unwrap();

	// Assert
	let matches = router.state().current_matches;
	assert_eq!(matches[0].route_search(), SearchValue::from([("page", 0)]));
	assert_eq!(matches[1].route_search(), SearchValue::from([("q", "rust")]));
	assert_eq!(matches[1].search().get("page"), Some(&SearchValue::from(0)));
	assert_eq!(matches[1].search().get("q"), Some(&SearchValue::from("rust")));
}

#[rstest]
#[tokio::test]
async fn test_invalid_search_is_reported_with_stable_code() {
	let root = Route::root(RouteOptions::new());
	let posts = Route::new(
		&root,
		RouteOptions::new()
			.path("posts")
			.validate_search(|_| Err(anyhow::anyhow!("bad page").into()))
			.loader(|_| async { Ok(serde_json::Value::Null) }),
	);
	let root = root.add_children([posts]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	router.navigate(NavigateOptions::to("/posts")).await.unwrap();

	let error = router.state().current_matches[1].error().unwrap();
	assert_eq!(error.code(), "INVALID_SEARCH_PARAMS");
}

#[rstest]
#[tokio::test]
async fn test_error_hook_may_redirect() {
	let root = Route::root(RouteOptions::new());
	let reports = Route::new(
		&root,
		RouteOptions::new()
			.path("reports")
			.loader(|_| async { Err(anyhow::anyhow!("session expired").into()) })
			.on_load_error(|fault: &Fault| {
				assert_eq!(fault.to_string(), "session expired");
				Err(Redirect::to("/login").into())
			}),
	);
	let login = Route::new(&root, RouteOptions::new().path("login"));
	let root = root.add_children([reports, login]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	router.navigate(NavigateOptions::to("/reports")).await.unwrap();

	assert_eq!(router.state().current_location.pathname, "/login");
}

#[rstest]
#[tokio::test]
async fn test_context_layers_router_parent_and_route() {
	// Arrange
	let mut router_context = RouteContext::new();
	router_context.insert("app".into(), serde_json::json!("wayfinder"));
	let seen = Rc::new(RefCell::new(None));
	let recorder = seen.clone();

	let root = Route::root(RouteOptions::new().get_context(|args| {
		let mut context = RouteContext::new();
		context.insert("user".into(), serde_json::json!("ana"));
		context.insert("seen_app".into(), args.context["app"].clone());
		Ok(context)
	}));
	let dashboard = Route::new(
		&root,
		RouteOptions::new().path("dashboard").loader(move |ctx| {
			*recorder.borrow_mut() = Some(ctx.context.clone());
			async { Ok(serde_json::Value::Null) }
		}),
	);
	let root = root.add_children([dashboard]);
	let router = Router::new(RouterOptions::new(root).context(router_context)).unwrap();

	// Act
	router
		.navigate(NavigateOptions::to("/dashboard"))
		.await
		.unwrap();

	// Assert
	let context = seen.borrow().clone().unwrap();
	assert_eq!(context["app"], "wayfinder");
	assert_eq!(context["user"], "ana");
	assert_eq!(context["seen_app"], "wayfinder");
	let matches = router.state().current_matches;
	assert!(!matches[0].route_context().contains_key("app"));
}

#[rstest]
#[tokio::test]
async fn test_preload_records_redirect_without_navigating() {
	let root = Route::root(RouteOptions::new());
	let secret = Route::new(
		&root,
		RouteOptions::new()
			.path("secret")
			.before_load(|ctx| async move {
				assert!(ctx.preload);
				Err(Redirect::to("/login").into())
			}),
	);
	let root = root.add_children([secret]);
	let history = MemoryHistory::new();
	let router = Router::new(RouterOptions::new(root).history(history.clone())).unwrap();

	let outcome = router
		.preload_route(NavigateOptions::to("/secret"))
		.await
		.unwrap();

	assert_eq!(outcome.redirect, Some(Redirect::to("/login")));
	assert_eq!(history.length(), 1);
	assert_eq!(router.state().current_location.pathname, "/");
}

#[rstest]
#[tokio::test]
async fn test_preloaded_data_is_reused_once() {
	// Arrange
	let loads = Rc::new(Cell::new(0));
	let counter = loads.clone();
	let root = Route::root(RouteOptions::new());
	let posts = Route::new(
		&root,
		RouteOptions::new().path("posts").loader(move |ctx| {
			counter.set(counter.get() + 1);
			async move { Ok(serde_json::json!({ "preload": ctx.preload })) }
		}),
	);
	let root = root.add_children([posts]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	// Act
	let preloaded = router
		.preload_route(NavigateOptions::to("/posts"))
		.await
		.unwrap();
	router.navigate(NavigateOptions::to("/posts")).await.unwrap();
	let after_navigate = loads.get();
	router.reload().await.unwrap();

	// Assert
	assert_eq!(preloaded.matches.len(), 2);
	assert_eq!(after_navigate, 1);
	assert_eq!(loads.get(), 2);
	assert_eq!(
		router.state().current_matches[1].loader_data(),
		Some(serde_json::json!({ "preload": false }))
	);
}

fn page_list_router(max_page: i64) -> Router {
	let root = Route::root(RouteOptions::new());
	let list = Route::new(
		&root,
		RouteOptions::new()
			.path("list")
			.validate_search(move |search| {
				let page = search.get("page").and_then(SearchValue::as_f64).unwrap_or(1.0);
				if page > max_page as f64 {
					return Err(anyhow::anyhow!("page {page} out of range").into());
				}
				Ok(SearchValue::from([("page", page as i64)]))
			})
			.loader(|ctx| async move {
				tokio::time::sleep(Duration::from_millis(5)).await;
				Ok(ctx.search.get("page").map(SearchValue::to_json).unwrap_or_default())
			}),
	);
	let root = root.add_children([list]);
	Router::new(RouterOptions::new(root)).unwrap()
}

fn list_page(page: i64) -> NavigateOptions {
	NavigateOptions::to("/list").search(SearchIntent::Set(SearchValue::from([("page", page)])))
}

#[rstest]
#[tokio::test]
async fn test_preloaded_data_is_not_reused_for_other_search() {
	let router = page_list_router(10);

	router.preload_route(list_page(2)).await.unwrap();
	router.navigate(list_page(3)).await.unwrap();

	let state = router.state();
	assert_eq!(state.current_location.search, SearchValue::from([("page", 3)]));
	assert_eq!(state.current_matches[1].loader_data(), Some(serde_json::json!(3)));
}

#[rstest]
#[tokio::test]
async fn test_navigation_does_not_join_pending_preload() {
	let router = page_list_router(10);

	let (preloaded, navigated) = futures::join!(
		router.preload_route(list_page(2)),
		router.navigate(list_page(2)),
	);

	preloaded.unwrap();
	navigated.unwrap();
	let current = &router.state().current_matches[1];
	assert_eq!(current.status(), MatchStatus::Success);
	assert_eq!(current.loader_data(), Some(serde_json::json!(2)));
}

#[rstest]
#[tokio::test]
async fn test_failed_preload_leaves_committed_matches_alone() {
	// Arrange
	let router = page_list_router(3);
	router.navigate(list_page(1)).await.unwrap();
	let committed = router.state().current_matches[1].clone();

	// Act
	let outcome = router.preload_route(list_page(9)).await.unwrap();

	// Assert
	assert_eq!(outcome.matches[1].error().unwrap().code(), "INVALID_SEARCH_PARAMS");
	assert!(!RouteMatch::ptr_eq(&outcome.matches[1], &committed));
	let state = router.state();
	assert_eq!(state.status, RouterStatus::Idle);
	assert!(RouteMatch::ptr_eq(&state.current_matches[1], &committed));
	assert_eq!(committed.status(), MatchStatus::Success);
	assert!(committed.error().is_none());
	assert_eq!(committed.search().get("page"), Some(&SearchValue::from(1)));
	assert_eq!(committed.loader_data(), Some(serde_json::json!(1)));
}

#[rstest]
#[case(None, false)]
#[case(Some(PreloadStrategy::Intent), true)]
#[tokio::test]
async fn test_preload_on_intent_follows_settings(
	#[case] strategy: Option<PreloadStrategy>,
	#[case] expected: bool,
) {
	let root = Route::root(RouteOptions::new());
	let posts = Route::new(&root, RouteOptions::new().path("posts"));
	let root = root.add_children([posts]);
	let settings = RouterSettings::default()
		.with_default_preload(strategy)
		.with_default_preload_delay_ms(1);
	let router = Router::new(RouterOptions::from_settings(root, settings)).unwrap();

	let outcome = router
		.preload_on_intent(NavigateOptions::to("/posts"))
		.await
		.unwrap();

	assert_eq!(outcome.is_some(), expected);
}

#[rstest]
#[tokio::test]
async fn test_component_loader_runs_once_per_load() {
	let loaded = Rc::new(RefCell::new(Vec::new()));
	let recorder = loaded.clone();
	let root = Route::root(RouteOptions::new());
	let page = Route::new(&root, RouteOptions::new().path("page").component("PageView"));
	let root = root.add_children([page]);
	let options = RouterOptions::new(root).load_component(move |component| {
		recorder.borrow_mut().push(component.to_string());
		async { Ok(()) }
	});
	let router = Router::new(options).unwrap();

	router.navigate(NavigateOptions::to("/page")).await.unwrap();

	assert_eq!(*loaded.borrow(), ["PageView"]);
	assert!(router.state().current_matches[1].has_loaders());
}

#[rstest]
#[tokio::test]
async fn test_cancelled_matches_get_fresh_abort_signal() {
	let signals = Rc::new(RefCell::new(Vec::new()));
	let recorder = signals.clone();
	let root = Route::root(RouteOptions::new());
	let page = Route::new(
		&root,
		RouteOptions::new().path("page").loader(move |ctx| {
			recorder.borrow_mut().push(ctx.abort.clone());
			async { Ok(serde_json::Value::Null) }
		}),
	);
	let root = root.add_children([page]);
	let router = Router::new(RouterOptions::new(root)).unwrap();

	router.navigate(NavigateOptions::to("/page")).await.unwrap();
	router.reload().await.unwrap();

	let signals = signals.borrow();
	assert_eq!(signals.len(), 2);
	assert!(signals[0].is_cancelled());
	assert!(!signals[1].is_cancelled());
}
