//! Route matches and their load state machine.
//!
//! A [`RouteMatch`] binds one route to concrete params. Its state moves
//! `Idle -> Pending -> Success | Error` and may go back to `Pending` when
//! loaded again. Matches are cached by id across navigations, so an
//! in-flight load is shared instead of restarted.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared, ready};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use wayfinder_core::{SearchValue, Store, Subscription, replace_equal_deep};
use wayfinder_urls::PathParams;

use crate::error::{MatchError, NavigationSignal, Redirect};
use crate::location::ParsedLocation;
use crate::route::{ComponentLoader, ExitHook, FaultStage, LoaderContext, Route, RouteContext};

/// Load status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
	Idle,
	Pending,
	Success,
	Error,
}

/// Observable state of a match.
#[derive(Debug, Clone)]
pub struct RouteMatchState {
	pub status: MatchStatus,
	pub error: Option<MatchError>,
	/// What this route's search validator returned.
	pub route_search: SearchValue,
	/// The parent's search with `route_search` layered on top.
	pub search: SearchValue,
	pub loader_data: Option<serde_json::Value>,
	/// Epoch milliseconds of the last state change.
	pub updated_at: i64,
}

impl RouteMatchState {
	fn initial(has_loaders: bool) -> Self {
		Self {
			status: if has_loaders {
				MatchStatus::Idle
			} else {
				MatchStatus::Success
			},
			error: None,
			route_search: SearchValue::object(),
			search: SearchValue::object(),
			loader_data: None,
			updated_at: now_millis(),
		}
	}
}

pub(crate) fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

/// How one load of a match ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
	Loaded,
	/// A newer load of the same match started; this result was discarded.
	Stale,
	/// The loader (or its error hook) redirected.
	Redirected(Redirect),
	NotFound,
	Failed,
}

pub(crate) type SharedLoad = Shared<LocalBoxFuture<'static, LoadOutcome>>;

/// A load in flight and what it was started for.
struct PendingLoad {
	future: SharedLoad,
	href: String,
	preload: bool,
}

impl PendingLoad {
	/// A preload only ever serves other preloads, and only for its own href.
	fn serves(&self, options: &MatchLoadOptions) -> bool {
		self.href == options.location.href && (options.preload || !self.preload)
	}
}

/// Inputs of [`RouteMatch::load`].
#[derive(Clone)]
pub(crate) struct MatchLoadOptions {
	pub location: ParsedLocation,
	pub preload: bool,
	pub load_component: Option<ComponentLoader>,
}

/// One route matched against one pathname.
///
/// Cloning yields another handle to the same match.
#[derive(Clone)]
pub struct RouteMatch {
	inner: Rc<MatchInner>,
}

struct MatchInner {
	id: String,
	route_id: String,
	route_index: usize,
	route: Route,
	pathname: String,
	params: PathParams,
	has_loaders: bool,
	store: Store<RouteMatchState>,
	abort: RefCell<CancellationToken>,
	parent: RefCell<Weak<MatchInner>>,
	params_error: RefCell<Option<NavigationSignal>>,
	load_future: RefCell<Option<PendingLoad>>,
	latest_load_id: Cell<u64>,
	/// Href of the preload whose data has not been consumed yet.
	fresh_preload: RefCell<Option<String>>,
	on_exit: RefCell<Option<ExitHook>>,
	route_context: RefCell<RouteContext>,
	context: RefCell<RouteContext>,
}

impl RouteMatch {
	pub(crate) fn new(
		id: String,
		route_id: String,
		route_index: usize,
		route: Route,
		pathname: String,
		params: PathParams,
		can_load_component: bool,
	) -> Self {
		let options = route.options();
		let has_loaders =
			options.has_guard_or_loader() || (options.component.is_some() && can_load_component);

		Self {
			inner: Rc::new(MatchInner {
				id,
				route_id,
				route_index,
				route,
				pathname,
				params,
				has_loaders,
				store: Store::new(RouteMatchState::initial(has_loaders)),
				abort: RefCell::new(CancellationToken::new()),
				parent: RefCell::new(Weak::new()),
				params_error: RefCell::new(None),
				load_future: RefCell::new(None),
				latest_load_id: Cell::new(0),
				fresh_preload: RefCell::new(None),
				on_exit: RefCell::new(None),
				route_context: RefCell::new(RouteContext::new()),
				context: RefCell::new(RouteContext::new()),
			}),
		}
	}

	/// Route id interpolated with the params, plus the route's key.
	pub fn id(&self) -> &str {
		&self.inner.id
	}

	pub fn route_id(&self) -> &str {
		&self.inner.route_id
	}

	pub(crate) fn route_index(&self) -> usize {
		self.inner.route_index
	}

	pub fn route(&self) -> &Route {
		&self.inner.route
	}

	pub fn pathname(&self) -> &str {
		&self.inner.pathname
	}

	pub fn params(&self) -> &PathParams {
		&self.inner.params
	}

	/// `false` when the route has no guard, loader or loadable component.
	pub fn has_loaders(&self) -> bool {
		self.inner.has_loaders
	}

	pub fn state(&self) -> RouteMatchState {
		self.inner.store.get()
	}

	pub fn status(&self) -> MatchStatus {
		self.inner.store.with(|state| state.status)
	}

	pub fn error(&self) -> Option<MatchError> {
		self.inner.store.with(|state| state.error.clone())
	}

	pub fn search(&self) -> SearchValue {
		self.inner.store.with(|state| state.search.clone())
	}

	pub fn route_search(&self) -> SearchValue {
		self.inner.store.with(|state| state.route_search.clone())
	}

	pub fn loader_data(&self) -> Option<serde_json::Value> {
		self.inner.store.with(|state| state.loader_data.clone())
	}

	/// Context visible to this route: the parent's context with this
	/// route's own contribution layered on top.
	pub fn context(&self) -> RouteContext {
		self.inner.context.borrow().clone()
	}

	/// What this route's `get_context` contributed.
	pub fn route_context(&self) -> RouteContext {
		self.inner.route_context.borrow().clone()
	}

	pub fn parent(&self) -> Option<RouteMatch> {
		self.inner
			.parent
			.borrow()
			.upgrade()
			.map(|inner| RouteMatch { inner })
	}

	/// Listens to state changes of this match.
	pub fn subscribe(&self, listener: impl Fn(&RouteMatchState) + 'static) -> Subscription {
		self.inner.store.subscribe(listener)
	}

	/// Abort signal of the current load cycle.
	pub fn abort_signal(&self) -> CancellationToken {
		self.inner.abort.borrow().clone()
	}

	/// Signals the current load cycle to stop.
	pub fn cancel(&self) {
		self.inner.abort.borrow().cancel();
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.inner, &b.inner)
	}

	pub(crate) fn set_parent(&self, parent: Option<&RouteMatch>) {
		*self.inner.parent.borrow_mut() =
			parent.map_or_else(Weak::new, |parent| Rc::downgrade(&parent.inner));
	}

	pub(crate) fn set_params_error(&self, error: Option<NavigationSignal>) {
		*self.inner.params_error.borrow_mut() = error;
	}

	pub(crate) fn params_error(&self) -> Option<NavigationSignal> {
		self.inner.params_error.borrow().clone()
	}

	pub(crate) fn set_search(&self, route_search: SearchValue, search: SearchValue) {
		self.inner.store.set_state(|state| RouteMatchState {
			route_search: replace_equal_deep(&state.route_search, &route_search),
			search: replace_equal_deep(&state.search, &search),
			..state.clone()
		});
	}

	pub(crate) fn set_context(&self, route_context: RouteContext, context: RouteContext) {
		*self.inner.route_context.borrow_mut() = route_context;
		*self.inner.context.borrow_mut() = context;
	}

	/// Stores `error` and moves to `Error`.
	pub(crate) fn fail(&self, error: MatchError) {
		self.inner.store.set_state(|state| RouteMatchState {
			status: MatchStatus::Error,
			error: Some(error),
			updated_at: now_millis(),
			..state.clone()
		});
	}

	/// Drops an error left over from an earlier navigation.
	pub(crate) fn clear_error(&self) {
		if self.status() != MatchStatus::Error {
			return;
		}
		let status = if self.inner.has_loaders {
			MatchStatus::Idle
		} else {
			MatchStatus::Success
		};
		self.inner.store.set_state(|state| RouteMatchState {
			status,
			error: None,
			..state.clone()
		});
	}

	/// Handles a signal raised by this route's code at `stage`.
	///
	/// Faults pass through the route's error hooks and are stored. Returns
	/// the redirect to follow, if the signal (or a hook) asked for one.
	pub(crate) fn settle_signal(
		&self,
		signal: NavigationSignal,
		stage: FaultStage,
	) -> Option<Redirect> {
		let options = self.inner.route.options();
		let signal = match signal {
			NavigationSignal::Fault(fault) => match options.handle_fault(stage, fault) {
				Ok(fault) => NavigationSignal::Fault(fault),
				Err(signal) => signal,
			},
			signal => signal,
		};

		match signal {
			NavigationSignal::Redirect(redirect) => Some(redirect),
			NavigationSignal::NotFound(not_found) => {
				self.fail(MatchError::NotFound {
					route_id: not_found
						.route_id
						.or_else(|| Some(self.inner.route_id.clone())),
					pathname: self.inner.pathname.clone(),
				});
				None
			}
			NavigationSignal::Fault(cause) => {
				let route_id = self.inner.route_id.clone();
				let error = match stage {
					FaultStage::ValidateSearch => {
						MatchError::InvalidSearchParams { route_id, cause }
					}
					FaultStage::ParseParams => MatchError::ParseParams { route_id, cause },
					FaultStage::Context => MatchError::Context { route_id, cause },
					FaultStage::BeforeLoad => MatchError::BeforeLoad { route_id, cause },
					FaultStage::Load => MatchError::Loader { route_id, cause },
				};
				tracing::warn!(
					match_id = %self.inner.id,
					code = error.code(),
					error = %error,
					"route failed"
				);
				self.fail(error);
				None
			}
		}
	}

	pub(crate) fn set_exit_hook(&self, hook: Option<ExitHook>) {
		*self.inner.on_exit.borrow_mut() = hook;
	}

	pub(crate) fn run_exit_hook(&self) {
		let hook = self.inner.on_exit.borrow_mut().take();
		if let Some(hook) = hook {
			hook();
		}
	}

	pub(crate) fn invalidate(&self) {
		self.inner.fresh_preload.borrow_mut().take();
	}

	/// Replaces a cancelled abort signal. A load still pending under the old
	/// signal is abandoned; its result will be discarded.
	pub(crate) fn renew_abort(&self) {
		if self.inner.abort.borrow().is_cancelled() {
			*self.inner.abort.borrow_mut() = CancellationToken::new();
			self.inner.load_future.borrow_mut().take();
		}
	}

	/// Starts (or joins) a load of this match.
	///
	/// While a load for the same href is pending and not cancelled, its
	/// future is returned; a pending preload is never joined by a real load.
	/// A cancelled match starts over with a fresh abort signal. Data of a
	/// preload is reused once, by a load of the same href. Only the most
	/// recent load may write its result.
	pub(crate) fn load(&self, options: MatchLoadOptions) -> SharedLoad {
		self.renew_abort();
		if self.status() == MatchStatus::Pending {
			let existing = self
				.inner
				.load_future
				.borrow()
				.as_ref()
				.filter(|pending| pending.serves(&options))
				.map(|pending| pending.future.clone());
			if let Some(existing) = existing {
				return existing;
			}
		}

		let fresh = self.inner.fresh_preload.borrow_mut().take();
		let reuse = !options.preload
			&& self.status() == MatchStatus::Success
			&& fresh.as_deref() == Some(options.location.href.as_str());
		if !self.inner.has_loaders || reuse {
			return ready(LoadOutcome::Loaded).boxed_local().shared();
		}

		let load_id = self.inner.latest_load_id.get() + 1;
		self.inner.latest_load_id.set(load_id);
		self.inner.store.set_state(|state| RouteMatchState {
			status: MatchStatus::Pending,
			..state.clone()
		});

		let href = options.location.href.clone();
		let preload = options.preload;
		let inner = Rc::downgrade(&self.inner);
		let future = async move {
			match inner.upgrade() {
				Some(inner) => RouteMatch { inner }.run_load(load_id, options).await,
				None => LoadOutcome::Stale,
			}
		}
		.boxed_local()
		.shared();

		*self.inner.load_future.borrow_mut() = Some(PendingLoad {
			future: future.clone(),
			href,
			preload,
		});
		future
	}

	async fn run_load(self, load_id: u64, options: MatchLoadOptions) -> LoadOutcome {
		let route = self.inner.route.clone();
		let ctx = LoaderContext {
			match_id: self.inner.id.clone(),
			params: self.inner.params.clone(),
			search: self.search(),
			location: options.location.clone(),
			context: self.context(),
			preload: options.preload,
			abort: self.abort_signal(),
		};

		let component = async {
			match (route.options().component.as_deref(), options.load_component.as_ref()) {
				(Some(component), Some(load_component)) => load_component(component).await,
				_ => Ok(()),
			}
		};
		let data = async {
			match &route.options().loader {
				Some(loader) => loader(ctx).await.map(Some),
				None => Ok(None),
			}
		};
		let (component_result, data_result) = futures::join!(component, data);

		if self.inner.latest_load_id.get() != load_id {
			tracing::trace!(match_id = %self.inner.id, load_id, "discarding superseded match load");
			return LoadOutcome::Stale;
		}
		self.inner.load_future.borrow_mut().take();

		match component_result.and(data_result) {
			Ok(data) => {
				self.inner.store.set_state(|state| RouteMatchState {
					status: MatchStatus::Success,
					error: None,
					loader_data: data.or_else(|| state.loader_data.clone()),
					updated_at: now_millis(),
					..state.clone()
				});
				*self.inner.fresh_preload.borrow_mut() =
					options.preload.then(|| options.location.href.clone());
				LoadOutcome::Loaded
			}
			Err(signal) => {
				let not_found = signal.is_not_found();
				match self.settle_signal(signal, FaultStage::Load) {
					Some(redirect) => {
						self.inner.store.set_state(|state| RouteMatchState {
							status: MatchStatus::Idle,
							..state.clone()
						});
						LoadOutcome::Redirected(redirect)
					}
					None if not_found || self.error().is_some_and(|error| error.is_not_found()) => {
						LoadOutcome::NotFound
					}
					None => LoadOutcome::Failed,
				}
			}
		}
	}
}

impl fmt::Debug for RouteMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteMatch")
			.field("id", &self.inner.id)
			.field("route_id", &self.inner.route_id)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Fault;
	use crate::route::RouteOptions;
	use rstest::rstest;
	use std::time::Duration;

	fn make_match(options: RouteOptions) -> RouteMatch {
		let root = Route::root(RouteOptions::new());
		let route = Route::new(&root, options.path("item"));
		let (id, route_id, pathname) = ("/item".into(), "/item".into(), "/item".into());
		RouteMatch::new(id, route_id, 1, route, pathname, PathParams::new(), false)
	}

	fn load_options() -> MatchLoadOptions {
		MatchLoadOptions {
			location: ParsedLocation::root(),
			preload: false,
			load_component: None,
		}
	}

	fn load_at(href: &str, preload: bool) -> MatchLoadOptions {
		MatchLoadOptions {
			location: ParsedLocation {
				href: href.into(),
				..ParsedLocation::root()
			},
			preload,
			load_component: None,
		}
	}

	/// Loader returning how many times it ran.
	fn counting_match(delay_ms: u64) -> (RouteMatch, Rc<Cell<u64>>) {
		let calls = Rc::new(Cell::new(0u64));
		let counter = calls.clone();
		let route_match = make_match(RouteOptions::new().loader(move |_| {
			let call = counter.get() + 1;
			counter.set(call);
			async move {
				tokio::time::sleep(Duration::from_millis(delay_ms)).await;
				Ok(serde_json::json!(call))
			}
		}));
		(route_match, calls)
	}

	#[rstest]
	#[case("/item?page=2", 1)]
	#[case("/item?page=3", 2)]
	#[tokio::test]
	async fn test_preloaded_data_is_reused_only_for_same_href(
		#[case] href: &str,
		#[case] expected_calls: u64,
	) {
		// Arrange
		let (route_match, calls) = counting_match(1);
		route_match.load(load_at("/item?page=2", true)).await;

		// Act
		let outcome = route_match.load(load_at(href, false)).await;

		// Assert
		assert_eq!(outcome, LoadOutcome::Loaded);
		assert_eq!(calls.get(), expected_calls);
		assert_eq!(route_match.loader_data(), Some(serde_json::json!(expected_calls)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_pending_preload_is_not_joined_by_real_load() {
		let (route_match, calls) = counting_match(5);

		let preload = route_match.load(load_at("/item", true));
		let real = route_match.load(load_at("/item", false));
		let (preload, real) = futures::join!(preload, real);

		assert_eq!(preload, LoadOutcome::Stale);
		assert_eq!(real, LoadOutcome::Loaded);
		assert_eq!(calls.get(), 2);
		assert_eq!(route_match.loader_data(), Some(serde_json::json!(2)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_pending_real_load_serves_preload_of_same_href() {
		let (route_match, calls) = counting_match(5);

		let real = route_match.load(load_at("/item", false));
		let preload = route_match.load(load_at("/item", true));
		let (real, preload) = futures::join!(real, preload);

		assert_eq!((real, preload), (LoadOutcome::Loaded, LoadOutcome::Loaded));
		assert_eq!(calls.get(), 1);
	}

	#[rstest]
	fn test_match_without_loaders_starts_successful() {
		let route_match = make_match(RouteOptions::new());

		assert!(!route_match.has_loaders());
		assert_eq!(route_match.status(), MatchStatus::Success);
	}

	#[rstest]
	#[tokio::test]
	async fn test_loader_data_is_stored() {
		let route_match = make_match(RouteOptions::new().loader(|ctx: LoaderContext| async move {
			Ok(serde_json::json!({ "id": ctx.match_id }))
		}));
		assert_eq!(route_match.status(), MatchStatus::Idle);

		let outcome = route_match.load(load_options()).await;

		assert_eq!(outcome, LoadOutcome::Loaded);
		assert_eq!(route_match.status(), MatchStatus::Success);
		assert_eq!(route_match.loader_data(), Some(serde_json::json!({ "id": "/item" })));
	}

	#[rstest]
	#[tokio::test]
	async fn test_pending_load_is_shared() {
		let calls = Rc::new(Cell::new(0));
		let counter = calls.clone();
		let route_match = make_match(RouteOptions::new().loader(move |_| {
			counter.set(counter.get() + 1);
			async {
				tokio::time::sleep(Duration::from_millis(5)).await;
				Ok(serde_json::Value::Null)
			}
		}));

		let first = route_match.load(load_options());
		let second = route_match.load(load_options());
		let (a, b) = futures::join!(first, second);

		assert_eq!((a, b), (LoadOutcome::Loaded, LoadOutcome::Loaded));
		assert_eq!(calls.get(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cancelled_match_restarts_and_discards_older_result() {
		let calls = Rc::new(Cell::new(0u64));
		let counter = calls.clone();
		let route_match = make_match(RouteOptions::new().loader(move |_| {
			let call = counter.get() + 1;
			counter.set(call);
			async move {
				// the first call finishes last
				let delay = if call == 1 { 20 } else { 1 };
				tokio::time::sleep(Duration::from_millis(delay)).await;
				Ok(serde_json::json!(call))
			}
		}));

		let first = route_match.load(load_options());
		route_match.cancel();
		let second = route_match.load(load_options());
		let (a, b) = futures::join!(first, second);

		assert_eq!(a, LoadOutcome::Stale);
		assert_eq!(b, LoadOutcome::Loaded);
		assert_eq!(route_match.loader_data(), Some(serde_json::json!(2)));
		assert!(!route_match.abort_signal().is_cancelled());
	}

	#[rstest]
	#[tokio::test]
	async fn test_loader_fault_goes_through_hook() {
		let route_match = make_match(
			RouteOptions::new()
				.loader(|_| async { Err(anyhow::anyhow!("offline").into()) })
				.on_load_error(|fault| Err(Fault::msg(format!("wrapped: {fault}")).into())),
		);

		let outcome = route_match.load(load_options()).await;

		assert_eq!(outcome, LoadOutcome::Failed);
		let error = route_match.error().unwrap();
		assert_eq!(error.code(), "LOADER");
		assert_eq!(error.cause().unwrap().to_string(), "wrapped: offline");
	}

	#[rstest]
	#[tokio::test]
	async fn test_loader_redirect_leaves_match_idle() {
		let route_match = make_match(
			RouteOptions::new()
				.loader(|_| async { Err(Redirect::to("/login").into()) })
				.on_error(|_| panic!("redirects never reach error hooks")),
		);

		let outcome = route_match.load(load_options()).await;

		assert_eq!(outcome, LoadOutcome::Redirected(Redirect::to("/login")));
		assert_eq!(route_match.status(), MatchStatus::Idle);
		assert!(route_match.error().is_none());
	}

	#[rstest]
	fn test_clear_error_restores_resting_status() {
		let route_match = make_match(RouteOptions::new());
		route_match.fail(MatchError::NotFound {
			route_id: None,
			pathname: "/item".into(),
		});
		assert_eq!(route_match.status(), MatchStatus::Error);

		route_match.clear_error();

		assert_eq!(route_match.status(), MatchStatus::Success);
		assert!(route_match.error().is_none());
	}

	#[rstest]
	fn test_exit_hook_runs_once() {
		let route_match = make_match(RouteOptions::new());
		let exits = Rc::new(Cell::new(0));
		let counter = exits.clone();
		route_match.set_exit_hook(Some(Box::new(move || counter.set(counter.get() + 1))));

		route_match.run_exit_hook();
		route_match.run_exit_hook();

		assert_eq!(exits.get(), 1);
	}
}
