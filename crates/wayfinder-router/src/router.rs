//! The navigation engine.
//!
//! A [`Router`] owns the route tree, a history and the router state. Every
//! navigation funnels through [`Router::load`]: the location is read from
//! the history, matched against the tree, guarded, loaded and committed.
//! Loads are tagged with a generation number; a load that finishes after a
//! newer one started never commits.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{LocalBoxFuture, Shared, join_all};
use serde::{Deserialize, Serialize};
use wayfinder_core::{SearchValue, Store, Subscription, partial_deep_equal, replace_equal_deep};
use wayfinder_history::{History, HistoryEvent, MemoryHistory};
use wayfinder_urls::{
	MatchOptions, PathParams, SearchParser, SearchStringifier, default_parse_search,
	default_stringify_search, interpolate_path, is_external_url, join_paths, match_pathname,
	remove_basepath, trim_path,
};

use crate::config::{PreloadStrategy, RouteChangeHook, RouterOptions, RouterSettings};
use crate::error::{MatchError, NavigationSignal, Redirect, RouterError, Result};
use crate::location::{
	BuildContext, HashIntent, NavigateOptions, ParamsIntent, ParsedLocation, SearchIntent,
	build_location,
};
use crate::route::{
	BeforeLoadContext, ComponentLoader, ContextArgs, FaultStage, MatchInfo, Route, RouteContext,
};
use crate::route_match::{LoadOutcome, MatchLoadOptions, RouteMatch, now_millis};
use crate::tree::RouteTree;

/// Whether a navigation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
	Idle,
	Pending,
}

/// Observable router state.
#[derive(Debug, Clone)]
pub struct RouterState {
	pub status: RouterStatus,
	/// The location most recently read from the history.
	pub latest_location: ParsedLocation,
	/// The committed location.
	pub current_location: ParsedLocation,
	/// Matches of the committed location, root first.
	pub current_matches: Vec<RouteMatch>,
	pub pending_location: Option<ParsedLocation>,
	pub pending_matches: Option<Vec<RouteMatch>>,
	/// Epoch milliseconds of the last commit.
	pub last_updated: i64,
}

impl RouterState {
	fn initial(location: ParsedLocation) -> Self {
		Self {
			status: RouterStatus::Idle,
			latest_location: location.clone(),
			current_location: location,
			current_matches: Vec::new(),
			pending_location: None,
			pending_matches: None,
			last_updated: now_millis(),
		}
	}
}

/// Result of [`Router::load_matches`].
#[derive(Debug, Clone, Default)]
pub struct LoadMatchesOutcome {
	/// First redirect raised by a guard or loader. It has not been followed.
	pub redirect: Option<Redirect>,
	/// Ids of the loaded matches in the order they reported settled.
	pub settle_order: Vec<String>,
}

/// Result of [`Router::preload_route`] and [`Router::load_route`].
#[derive(Debug, Clone)]
pub struct RouteLoadOutcome {
	pub matches: Vec<RouteMatch>,
	/// Redirect the load asked for. Recorded only, never followed.
	pub redirect: Option<Redirect>,
}

/// Options of [`Router::match_route`].
#[derive(Debug, Clone, Copy)]
pub struct MatchRouteOptions {
	/// Compare against the pending location instead of the committed one.
	pub pending: bool,
	/// Accept when the location is deeper than the target.
	pub fuzzy: bool,
	/// Overrides the router's case sensitivity.
	pub case_sensitive: Option<bool>,
	/// Also require the target's search to be contained in the location's.
	pub include_search: bool,
}

impl Default for MatchRouteOptions {
	fn default() -> Self {
		Self {
			pending: false,
			fuzzy: false,
			case_sensitive: None,
			include_search: true,
		}
	}
}

/// The navigation engine. Cloning yields another handle to the same router.
///
/// All work happens on the current thread. [`Router::mount`] spawns
/// history-driven loads with [`tokio::task::spawn_local`], so a mounted
/// router has to live inside a [`tokio::task::LocalSet`].
#[derive(Clone)]
pub struct Router {
	inner: Rc<RouterInner>,
}

struct RouterInner {
	tree: RouteTree,
	history: Rc<dyn History>,
	basepath: String,
	settings: RouterSettings,
	context: RouteContext,
	parse_search: SearchParser,
	stringify_search: SearchStringifier,
	load_component: Option<ComponentLoader>,
	on_route_change: Option<RouteChangeHook>,
	store: Store<RouterState>,
	generation: Cell<u64>,
	committed_generation: Cell<u64>,
	registry: RefCell<HashMap<String, RouteMatch>>,
	waiters: RefCell<Vec<oneshot::Sender<()>>>,
	committing: Cell<bool>,
}

struct CollectedMatches {
	matches: Vec<RouteMatch>,
}

impl Router {
	/// Builds the route tree and reads the initial location.
	///
	/// When the canonical form of the history's location differs (for
	/// example a trailing slash the router drops), the history entry is
	/// replaced. Nothing is loaded until [`Router::load`] is called.
	pub fn new(options: RouterOptions) -> Result<Self> {
		let RouterOptions {
			route,
			history,
			settings,
			context,
			parse_search,
			stringify_search,
			load_component,
			on_route_change,
		} = options;

		let tree = RouteTree::build(&route)?;
		let basepath = normalize_basepath(&settings.basepath);
		let history = history.unwrap_or_else(|| Rc::new(MemoryHistory::new()));
		let parse_search = parse_search.unwrap_or_else(default_parse_search);
		let stringify_search = stringify_search.unwrap_or_else(default_stringify_search);

		let location = read_location(&*history, &parse_search, None);
		let router = Self {
			inner: Rc::new(RouterInner {
				tree,
				history,
				basepath,
				settings,
				context,
				parse_search,
				stringify_search,
				load_component,
				on_route_change,
				store: Store::new(RouterState::initial(location.clone())),
				generation: Cell::new(0),
				committed_generation: Cell::new(0),
				registry: RefCell::new(HashMap::new()),
				waiters: RefCell::new(Vec::new()),
				committing: Cell::new(false),
			}),
		};

		let canonical = router.build_location(&NavigateOptions::current());
		if canonical.href != location.href {
			tracing::debug!(
				from = %location.href,
				to = %canonical.href,
				"normalizing initial location"
			);
			router
				.inner
				.history
				.replace(&canonical.href, canonical.state.clone());
			let location = router.read_location(None);
			router
				.inner
				.store
				.set_state(|_| RouterState::initial(location));
		}

		Ok(router)
	}

	/// Listens to the history and loads every location it moves to.
	///
	/// Pushes and replaces made by the router itself are ignored here; the
	/// router loads those directly.
	pub fn mount(&self) -> Subscription {
		let router = Rc::downgrade(&self.inner);
		self.inner
			.history
			.listen(Box::new(move |event: &HistoryEvent| {
				let Some(inner) = router.upgrade() else {
					return;
				};
				if inner.committing.get() {
					return;
				}
				tracing::debug!(
					action = ?event.action,
					href = %event.location.href,
					"history changed"
				);
				let router = Router { inner };
				tokio::task::spawn_local(router.load());
			}))
	}

	pub fn tree(&self) -> &RouteTree {
		&self.inner.tree
	}

	pub fn history(&self) -> Rc<dyn History> {
		Rc::clone(&self.inner.history)
	}

	pub fn basepath(&self) -> &str {
		&self.inner.basepath
	}

	pub fn settings(&self) -> &RouterSettings {
		&self.inner.settings
	}

	/// Snapshot of the router state.
	pub fn state(&self) -> RouterState {
		self.inner.store.get()
	}

	pub fn subscribe(&self, listener: impl Fn(&RouterState) + 'static) -> Subscription {
		self.inner.store.subscribe(listener)
	}

	/// Looks up a route by id.
	pub fn get_route(&self, id: &str) -> Result<Route> {
		self.inner
			.tree
			.get(id)
			.map(|node| node.route.clone())
			.ok_or_else(|| RouterError::RouteNotFound(id.to_string()))
	}

	/// Loads the history's current location and commits it.
	///
	/// Resolves once this navigation committed or, when a newer navigation
	/// superseded it, once that one settled.
	pub fn load(&self) -> LocalBoxFuture<'static, ()> {
		let router = self.clone();
		async move { router.run_load().await }.boxed_local()
	}

	async fn run_load(&self) {
		let generation = self.inner.generation.get() + 1;
		self.inner.generation.set(generation);

		let previous = self.state();
		let location = self.read_location(Some(&previous.latest_location));
		tracing::debug!(generation, href = %location.href, "navigation started");

		for route_match in previous
			.current_matches
			.iter()
			.chain(previous.pending_matches.iter().flatten())
		{
			route_match.cancel();
		}

		let store = &self.inner.store;
		let matches = store.batch(|| {
			store.set_state(|state| RouterState {
				latest_location: location.clone(),
				..state.clone()
			});
			let collected = self.collect_matches(&location.pathname, &location.search, false);
			store.set_state(|state| RouterState {
				status: RouterStatus::Pending,
				pending_location: Some(location.clone()),
				pending_matches: Some(collected.matches.clone()),
				..state.clone()
			});
			collected.matches
		});

		let outcome = self.load_matches(&matches, &location, false).await;

		if self.inner.generation.get() != generation {
			let latest = self.inner.generation.get();
			tracing::debug!(generation, latest, "navigation superseded");
			self.wait_for_commit().await;
			return;
		}

		if let Some(redirect) = outcome.redirect {
			tracing::debug!(to = %redirect.to, code = redirect.code, "following redirect");
			if let Err(error) = self.navigate(redirect_options(redirect)).await {
				tracing::error!(%error, "redirect target rejected");
				self.resolve_waiters();
			}
			return;
		}

		self.commit(generation, location, matches);
	}

	fn commit(&self, generation: u64, location: ParsedLocation, matches: Vec<RouteMatch>) {
		let previous = self.inner.store.with(|state| state.current_matches.clone());
		let previous_ids: HashSet<&str> = previous.iter().map(RouteMatch::id).collect();
		let next_ids: HashSet<&str> = matches.iter().map(RouteMatch::id).collect();

		for exiting in previous.iter().filter(|m| !next_ids.contains(m.id())) {
			exiting.run_exit_hook();
			exiting.clear_error();
		}
		for route_match in &matches {
			let options = route_match.route().options();
			if previous_ids.contains(route_match.id()) {
				if let Some(on_transition) = &options.on_transition {
					on_transition(route_match);
				}
			} else if let Some(on_loaded) = &options.on_loaded {
				route_match.set_exit_hook(on_loaded(route_match));
			}
		}

		let href_changed = self
			.inner
			.store
			.with(|state| state.current_location.href != location.href);
		self.inner.store.set_state(|state| RouterState {
			status: RouterStatus::Idle,
			current_location: location.clone(),
			current_matches: matches.clone(),
			pending_location: None,
			pending_matches: None,
			last_updated: now_millis(),
			..state.clone()
		});
		self.inner.committed_generation.set(generation);
		tracing::debug!(
			generation,
			href = %location.href,
			matches = matches.len(),
			"navigation committed"
		);

		self.inner.registry.borrow_mut().retain(|id, _| {
			let keep = next_ids.contains(id.as_str());
			if !keep {
				tracing::trace!(match_id = %id, "evicting match");
			}
			keep
		});

		if href_changed {
			if let Some(on_route_change) = &self.inner.on_route_change {
				on_route_change(&location);
			}
		}
		self.resolve_waiters();
	}

	async fn wait_for_commit(&self) {
		if self.inner.committed_generation.get() >= self.inner.generation.get() {
			return;
		}
		let (sender, receiver) = oneshot::channel();
		self.inner.waiters.borrow_mut().push(sender);
		// a dropped sender means the router was reset
		let _ = receiver.await;
	}

	fn resolve_waiters(&self) {
		let waiters: Vec<_> = self.inner.waiters.borrow_mut().drain(..).collect();
		for waiter in waiters {
			let _ = waiter.send(());
		}
	}

	/// Matches `pathname` against the tree and returns the matches, root
	/// first.
	///
	/// Matches are reused by id across calls. When no route claims the
	/// pathname the list holds only the root match, carrying a not-found
	/// error.
	pub fn match_routes(&self, pathname: &str, search: &SearchValue) -> Vec<RouteMatch> {
		let collected = self.collect_matches(pathname, search, false);
		if let [root] = collected.matches.as_slice() {
			root.fail(not_found_error(pathname));
		}
		collected.matches
	}

	/// Builds the matches for `pathname`, reusing registered ones by id.
	///
	/// With `isolate_live`, ids that are committed or pending get a new,
	/// unregistered match so the caller cannot disturb their state.
	fn collect_matches(
		&self,
		pathname: &str,
		search: &SearchValue,
		isolate_live: bool,
	) -> CollectedMatches {
		let live: HashSet<String> = if isolate_live {
			self.inner.store.with(|state| {
				state
					.current_matches
					.iter()
					.chain(state.pending_matches.iter().flatten())
					.map(|route_match| route_match.id().to_string())
					.collect()
			})
		} else {
			HashSet::new()
		};
		let tree = &self.inner.tree;
		let (basepath, case_sensitive) = (&self.inner.basepath, self.inner.settings.case_sensitive);
		let (chain, raw_params) = match tree.match_pathname(basepath, pathname, case_sensitive) {
			Some(tree_match) => (tree_match.chain, tree_match.params),
			None => {
				tracing::debug!(pathname, "no route matches");
				(vec![0], PathParams::new())
			}
		};

		let mut params = raw_params.clone();
		let mut parse_errors = Vec::with_capacity(chain.len());
		for &index in &chain {
			let parsed = match &tree.node(index).route.options().parse_params {
				Some(parse_params) => parse_params(&raw_params),
				None => Ok(PathParams::new()),
			};
			match parsed {
				Ok(parsed) => {
					params.extend(parsed);
					parse_errors.push(None);
				}
				Err(signal) => parse_errors.push(Some(signal)),
			}
		}

		let mut matches: Vec<RouteMatch> = Vec::with_capacity(chain.len());
		for (&index, parse_error) in chain.iter().zip(parse_errors) {
			let node = tree.node(index);
			let key = match &node.route.options().get_key {
				Some(get_key) => {
					let key = get_key(&MatchInfo {
						params: params.clone(),
						search: search.clone(),
					});
					if key.is_empty() {
						String::new()
					} else {
						serde_json::Value::from(key).to_string()
					}
				}
				None => String::new(),
			};
			let id = format!("{}{key}", interpolate_path(&node.id, &params, true));
			if matches.iter().any(|existing| existing.id() == id) {
				continue;
			}

			let create = |id: String| {
				let pathname = join_paths([
					self.inner.basepath.as_str(),
					interpolate_path(&node.full_path, &params, false).as_str(),
				]);
				RouteMatch::new(
					id,
					node.id.clone(),
					index,
					node.route.clone(),
					pathname,
					params.clone(),
					self.inner.load_component.is_some(),
				)
			};
			let existing = self.inner.registry.borrow().get(&id).cloned();
			let route_match = match existing {
				Some(_) if live.contains(&id) => {
					tracing::trace!(match_id = %id, "isolating live match");
					create(id)
				}
				Some(existing) => existing,
				None => {
					let created = create(id.clone());
					self.inner
						.registry
						.borrow_mut()
						.insert(id, created.clone());
					created
				}
			};
			route_match.set_parent(matches.last());
			route_match.set_params_error(parse_error);
			matches.push(route_match);
		}

		CollectedMatches { matches }
	}

	/// Validates, guards and loads `matches` for `location`.
	///
	/// Search validation and context run first, parent to child, and stop
	/// at the first failing match. Guards of the remaining matches run
	/// concurrently; the first redirect ends the load before any loader
	/// runs, the first error cuts off that match and everything below it.
	/// Loaders then run concurrently, but a match only reports settled once
	/// its parent has.
	pub async fn load_matches(
		&self,
		matches: &[RouteMatch],
		location: &ParsedLocation,
		preload: bool,
	) -> LoadMatchesOutcome {
		// The root never matches on its own.
		let not_found = matches.len() == 1;
		for route_match in matches {
			route_match.renew_abort();
		}

		let mut cut = matches.len();
		for (index, route_match) in matches.iter().enumerate() {
			let parent = index.checked_sub(1).map(|parent| &matches[parent]);
			let parent_search =
				parent.map_or_else(|| location.search.clone(), RouteMatch::search);
			let parent_context =
				parent.map_or_else(|| self.inner.context.clone(), RouteMatch::context);

			match prepare_match(route_match, &parent_search, parent_context) {
				Ok(()) => route_match.clear_error(),
				Err((signal, stage)) => {
					if let Some(redirect) = route_match.settle_signal(signal, stage) {
						return LoadMatchesOutcome {
							redirect: Some(redirect),
							settle_order: Vec::new(),
						};
					}
					cut = index;
					break;
				}
			}
		}

		let guards = matches[..cut]
			.iter()
			.map(|route_match| run_guard(route_match, location, preload));
		let results = join_all(guards).await;
		for (index, result) in results.into_iter().enumerate() {
			if let Err(signal) = result {
				match matches[index].settle_signal(signal, FaultStage::BeforeLoad) {
					Some(redirect) => {
						return LoadMatchesOutcome {
							redirect: Some(redirect),
							settle_order: Vec::new(),
						};
					}
					None => {
						cut = index;
						break;
					}
				}
			}
		}

		let settle_order = Rc::new(RefCell::new(Vec::new()));
		let mut previous: Option<Shared<LocalBoxFuture<'static, LoadOutcome>>> = None;
		let mut loads = Vec::with_capacity(cut);
		for route_match in &matches[..cut] {
			let load = route_match.load(MatchLoadOptions {
				location: location.clone(),
				preload,
				load_component: self.inner.load_component.clone(),
			});
			let parent = previous.take();
			let order = Rc::clone(&settle_order);
			let id = route_match.id().to_string();
			let settled = async move {
				let outcome = load.await;
				if let Some(parent) = parent {
					parent.await;
				}
				order.borrow_mut().push(id);
				outcome
			}
			.boxed_local()
			.shared();
			previous = Some(settled.clone());
			loads.push(settled);
		}
		drop(previous);

		let redirect = join_all(loads)
			.await
			.into_iter()
			.find_map(|outcome| match outcome {
				LoadOutcome::Redirected(redirect) => Some(redirect),
				_ => None,
			});

		if not_found {
			if let Some(root) = matches.first() {
				root.fail(not_found_error(&location.pathname));
			}
		}

		let settle_order = settle_order.borrow().clone();
		LoadMatchesOutcome {
			redirect,
			settle_order,
		}
	}

	/// Navigates to the location described by `options`.
	///
	/// Absolute URLs are rejected; leaving the application is up to the
	/// caller. Resolves once the navigation settled.
	pub async fn navigate(&self, options: NavigateOptions) -> Result<()> {
		if let Some(to) = options.to.as_deref() {
			if is_external_url(to) {
				return Err(RouterError::ExternalNavigation(to.to_string()));
			}
		}

		let location = self.build_location(&options);
		self.commit_location(location, options.replace).await;
		Ok(())
	}

	/// Writes `location` to the history and loads it.
	///
	/// A location with the current href and no key replaces the entry
	/// instead of pushing a duplicate.
	pub fn commit_location(
		&self,
		location: ParsedLocation,
		replace: bool,
	) -> LocalBoxFuture<'static, ()> {
		let same_href = self
			.inner
			.store
			.with(|state| state.latest_location.href == location.href);

		self.inner.committing.set(true);
		if replace || (same_href && location.key.is_none()) {
			self.inner
				.history
				.replace(&location.href, location.state.clone());
		} else {
			self.inner
				.history
				.push(&location.href, location.state.clone());
		}
		self.inner.committing.set(false);

		self.load()
	}

	/// Resolves `options` against the latest location.
	///
	/// The destination is built twice: once to find its routes, then again
	/// with those routes' param stringifiers and search filters.
	pub fn build_location(&self, options: &NavigateOptions) -> ParsedLocation {
		let (current, current_params) = self.inner.store.with(|state| {
			let params = state
				.pending_matches
				.as_ref()
				.unwrap_or(&state.current_matches)
				.last()
				.map(|route_match| route_match.params().clone())
				.unwrap_or_default();
			(state.latest_location.clone(), params)
		});

		let first = self.build_with_routes(&current, &current_params, &[], options);
		let case_sensitive = self.inner.settings.case_sensitive;
		let routes: Vec<Route> = self
			.inner
			.tree
			.match_pathname(&self.inner.basepath, &first.pathname, case_sensitive)
			.map(|tree_match| {
				tree_match
					.chain
					.iter()
					.map(|&index| self.inner.tree.node(index).route.clone())
					.collect()
			})
			.unwrap_or_default();

		self.build_with_routes(&current, &current_params, &routes, options)
	}

	fn build_with_routes(
		&self,
		current: &ParsedLocation,
		current_params: &PathParams,
		routes: &[Route],
		options: &NavigateOptions,
	) -> ParsedLocation {
		let ctx = BuildContext {
			basepath: &self.inner.basepath,
			trailing_slash: self.inner.settings.trailing_slash,
			current,
			current_params,
			routes,
			stringify_search: &self.inner.stringify_search,
			history: &*self.inner.history,
		};
		build_location(&ctx, options)
	}

	/// Tests whether the committed (or pending) location matches the
	/// destination of `options`, returning the params on success.
	pub fn match_route(
		&self,
		options: &NavigateOptions,
		match_options: MatchRouteOptions,
	) -> Option<PathParams> {
		let next = self.build_location(options);
		let base = self.inner.store.with(|state| {
			if match_options.pending {
				state.pending_location.clone()
			} else {
				Some(state.current_location.clone())
			}
		})?;

		let to = remove_basepath(&self.inner.basepath, &next.pathname);
		let params = match_pathname(
			&self.inner.basepath,
			&base.pathname,
			&to,
			MatchOptions {
				fuzzy: match_options.fuzzy,
				case_sensitive: match_options
					.case_sensitive
					.unwrap_or(self.inner.settings.case_sensitive),
			},
		)?;

		if match_options.include_search && !partial_deep_equal(&base.search, &next.search) {
			return None;
		}
		Some(params)
	}

	/// Loads the destination of `options` speculatively.
	///
	/// Nothing is committed and a redirect is only recorded. Matches that
	/// are committed or pending are loaded on private copies and never
	/// touched. A later navigation to the same href reuses the preloaded
	/// data once.
	pub async fn preload_route(&self, options: NavigateOptions) -> Result<RouteLoadOutcome> {
		let outcome = self.load_destination(options, true).await?;
		if let Some(redirect) = &outcome.redirect {
			tracing::debug!(to = %redirect.to, "preload redirect recorded");
		}
		Ok(outcome)
	}

	/// Loads the destination of `options` without committing it.
	pub async fn load_route(&self, options: NavigateOptions) -> Result<RouteLoadOutcome> {
		self.load_destination(options, false).await
	}

	/// Preloads after the configured intent delay.
	///
	/// Returns `None` when intent preloading is disabled.
	pub async fn preload_on_intent(
		&self,
		options: NavigateOptions,
	) -> Result<Option<RouteLoadOutcome>> {
		let settings = &self.inner.settings;
		match settings.default_preload {
			Some(PreloadStrategy::Intent) => {
				tokio::time::sleep(Duration::from_millis(settings.default_preload_delay_ms)).await;
				self.preload_route(options).await.map(Some)
			}
			None => Ok(None),
		}
	}

	async fn load_destination(
		&self,
		options: NavigateOptions,
		preload: bool,
	) -> Result<RouteLoadOutcome> {
		if let Some(to) = options.to.as_deref() {
			if is_external_url(to) {
				return Err(RouterError::ExternalNavigation(to.to_string()));
			}
		}

		let location = self.build_location(&options);
		let CollectedMatches { matches } =
			self.collect_matches(&location.pathname, &location.search, preload);
		let outcome = self.load_matches(&matches, &location, preload).await;

		Ok(RouteLoadOutcome {
			matches,
			redirect: outcome.redirect,
		})
	}

	/// Drops preloaded data and loads the latest location again.
	pub async fn invalidate(&self) {
		let matches: Vec<RouteMatch> = self.inner.registry.borrow().values().cloned().collect();
		for route_match in &matches {
			route_match.invalidate();
		}
		self.load().await;
	}

	/// Navigates to the current location, replacing the history entry.
	pub async fn reload(&self) -> Result<()> {
		self.navigate(NavigateOptions::current().replace(true)).await
	}

	/// Cancels everything in flight, forgets all matches and returns to the
	/// initial state for the history's current location.
	pub fn reset(&self) {
		let previous = self.state();
		for route_match in previous
			.current_matches
			.iter()
			.chain(previous.pending_matches.iter().flatten())
		{
			route_match.cancel();
		}
		self.inner.registry.borrow_mut().clear();

		let generation = self.inner.generation.get() + 1;
		self.inner.generation.set(generation);
		self.inner.committed_generation.set(generation);

		let location = self.read_location(None);
		self.inner
			.store
			.set_state(|_| RouterState::initial(location));
		self.resolve_waiters();
	}

	fn read_location(&self, previous: Option<&ParsedLocation>) -> ParsedLocation {
		read_location(&*self.inner.history, &self.inner.parse_search, previous)
	}
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("basepath", &self.inner.basepath)
			.field("routes", &self.inner.tree.len())
			.field("generation", &self.inner.generation.get())
			.finish_non_exhaustive()
	}
}

fn normalize_basepath(basepath: &str) -> String {
	let trimmed = trim_path(basepath);
	if trimmed.is_empty() || trimmed == "/" {
		"/".to_string()
	} else {
		format!("/{trimmed}")
	}
}

fn read_location(
	history: &dyn History,
	parse_search: &SearchParser,
	previous: Option<&ParsedLocation>,
) -> ParsedLocation {
	let raw = history.location();
	let search = parse_search(&raw.search);
	let search = match previous {
		Some(previous) => replace_equal_deep(&previous.search, &search),
		None => search,
	};

	ParsedLocation {
		href: raw.href,
		pathname: raw.pathname,
		search,
		search_str: raw.search,
		hash: raw.hash.trim_start_matches('#').to_string(),
		state: raw.state.data,
		key: Some(raw.state.key),
	}
}

fn not_found_error(pathname: &str) -> MatchError {
	MatchError::NotFound {
		route_id: None,
		pathname: pathname.to_string(),
	}
}

fn redirect_options(redirect: Redirect) -> NavigateOptions {
	let mut options = NavigateOptions::to(redirect.to).replace(redirect.replace);
	if let Some(from) = redirect.from {
		options = options.from(from);
	}
	if let Some(params) = redirect.params {
		options = options.params(ParamsIntent::Set(params));
	}
	if let Some(search) = redirect.search {
		options = options.search(SearchIntent::Set(search));
	}
	if let Some(hash) = redirect.hash {
		options = options.hash(HashIntent::Set(hash));
	}
	options
}

/// Validates search and builds context for one match.
fn prepare_match(
	route_match: &RouteMatch,
	parent_search: &SearchValue,
	parent_context: RouteContext,
) -> Result<(), (NavigationSignal, FaultStage)> {
	if let Some(signal) = route_match.params_error() {
		return Err((signal, FaultStage::ParseParams));
	}

	let options = route_match.route().options();
	let route_search = match &options.validate_search {
		Some(validate) => {
			validate(parent_search).map_err(|signal| (signal, FaultStage::ValidateSearch))?
		}
		None => SearchValue::object(),
	};
	let search = parent_search.merged(&route_search);
	route_match.set_search(route_search, search);

	let route_context = match &options.get_context {
		Some(get_context) => get_context(&ContextArgs {
			params: route_match.params().clone(),
			search: route_match.search(),
			context: parent_context.clone(),
		})
		.map_err(|signal| (signal, FaultStage::Context))?,
		None => RouteContext::new(),
	};
	let mut context = parent_context;
	context.extend(route_context.clone());
	route_match.set_context(route_context, context);
	Ok(())
}

fn run_guard(
	route_match: &RouteMatch,
	location: &ParsedLocation,
	preload: bool,
) -> LocalBoxFuture<'static, Result<(), NavigationSignal>> {
	match &route_match.route().options().before_load {
		Some(before_load) => before_load(BeforeLoadContext {
			match_id: route_match.id().to_string(),
			params: route_match.params().clone(),
			search: route_match.search(),
			location: location.clone(),
			context: route_match.context(),
			preload,
			abort: route_match.abort_signal(),
		}),
		None => futures::future::ready(Ok(())).boxed_local(),
	}
}
