//! Route declarations.
//!
//! A route is declared once at startup with [`RouteOptions`] and linked
//! into a tree with [`Route::new`] and [`Route::add_children`]. The router
//! turns the declared tree into an immutable [`crate::RouteTree`].
//!
//! ```rust
//! use wayfinder_router::{Route, RouteOptions};
//!
//! let root = Route::root(RouteOptions::new());
//! let posts = Route::new(&root, RouteOptions::new().path("posts"));
//! let post = Route::new(&posts, RouteOptions::new().path("$postId"));
//!
//! let root = root.add_children([posts.add_children([post])]);
//! assert_eq!(root.children().len(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio_util::sync::CancellationToken;
use wayfinder_core::SearchValue;
use wayfinder_urls::PathParams;

use crate::error::{Fault, NavigationSignal};
use crate::location::ParsedLocation;
use crate::route_match::RouteMatch;

/// Context object passed down the match chain.
pub type RouteContext = serde_json::Map<String, serde_json::Value>;

/// Validates the search inherited from the parent and returns this route's slice.
pub type SearchValidator = Rc<dyn Fn(&SearchValue) -> Result<SearchValue, NavigationSignal>>;
/// Parses raw path params. The output is layered over the raw params.
pub type ParamsParser = Rc<dyn Fn(&PathParams) -> Result<PathParams, NavigationSignal>>;
/// Turns typed params back into their path form before interpolation.
pub type ParamsStringifier = Rc<dyn Fn(&PathParams) -> PathParams>;
pub type BeforeLoadFn =
	Rc<dyn Fn(BeforeLoadContext) -> LocalBoxFuture<'static, Result<(), NavigationSignal>>>;
pub type LoaderFn = Rc<
	dyn Fn(LoaderContext) -> LocalBoxFuture<'static, Result<serde_json::Value, NavigationSignal>>,
>;
pub type ContextFn = Rc<dyn Fn(&ContextArgs) -> Result<RouteContext, NavigationSignal>>;
/// Rewrites a search value while building a location.
pub type SearchFilter = Rc<dyn Fn(&SearchValue) -> SearchValue>;
pub type KeyFn = Rc<dyn Fn(&MatchInfo) -> String>;
/// Receives a failure. `Ok` keeps the original fault, `Err` replaces it
/// (or turns it into a redirect or not-found).
pub type ErrorHook = Rc<dyn Fn(&Fault) -> Result<(), NavigationSignal>>;
/// Runs when a match leaves the committed match list.
pub type ExitHook = Box<dyn FnOnce()>;
pub type LoadedHook = Rc<dyn Fn(&RouteMatch) -> Option<ExitHook>>;
pub type TransitionHook = Rc<dyn Fn(&RouteMatch)>;
/// Loads the component a route refers to by name.
pub type ComponentLoader =
	Rc<dyn Fn(&str) -> LocalBoxFuture<'static, Result<(), NavigationSignal>>>;

/// Argument of a `before_load` guard.
#[derive(Debug, Clone)]
pub struct BeforeLoadContext {
	pub match_id: String,
	pub params: PathParams,
	/// Search merged from the ancestors and this route.
	pub search: SearchValue,
	pub location: ParsedLocation,
	pub context: RouteContext,
	/// `true` for speculative loads.
	pub preload: bool,
	/// Cancelled when the navigation is superseded.
	pub abort: CancellationToken,
}

/// Argument of a loader.
#[derive(Debug, Clone)]
pub struct LoaderContext {
	pub match_id: String,
	pub params: PathParams,
	pub search: SearchValue,
	pub location: ParsedLocation,
	pub context: RouteContext,
	pub preload: bool,
	pub abort: CancellationToken,
}

/// Argument of `get_context`.
#[derive(Debug, Clone)]
pub struct ContextArgs {
	pub params: PathParams,
	pub search: SearchValue,
	/// The parent's context, layered over the router context.
	pub context: RouteContext,
}

/// Argument of `get_key`.
#[derive(Debug, Clone)]
pub struct MatchInfo {
	pub params: PathParams,
	pub search: SearchValue,
}

/// Declarative configuration of one route.
#[derive(Clone, Default)]
pub struct RouteOptions {
	pub(crate) path: Option<String>,
	pub(crate) id: Option<String>,
	pub(crate) case_sensitive: Option<bool>,
	pub(crate) validate_search: Option<SearchValidator>,
	pub(crate) parse_params: Option<ParamsParser>,
	pub(crate) stringify_params: Option<ParamsStringifier>,
	pub(crate) before_load: Option<BeforeLoadFn>,
	pub(crate) loader: Option<LoaderFn>,
	pub(crate) get_context: Option<ContextFn>,
	pub(crate) pre_search_filters: Vec<SearchFilter>,
	pub(crate) post_search_filters: Vec<SearchFilter>,
	pub(crate) get_key: Option<KeyFn>,
	pub(crate) component: Option<String>,
	pub(crate) on_error: Option<ErrorHook>,
	pub(crate) on_before_load_error: Option<ErrorHook>,
	pub(crate) on_load_error: Option<ErrorHook>,
	pub(crate) on_validate_search_error: Option<ErrorHook>,
	pub(crate) on_loaded: Option<LoadedHook>,
	pub(crate) on_transition: Option<TransitionHook>,
}

impl RouteOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Path template relative to the parent. Omit it for a pathless
	/// layout route, which then needs an [`RouteOptions::id`].
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	/// Custom id segment used instead of the path.
	pub fn id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	/// Overrides the router's case sensitivity for this route.
	pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
		self.case_sensitive = Some(case_sensitive);
		self
	}

	pub fn validate_search<F>(mut self, validate: F) -> Self
	where
		F: Fn(&SearchValue) -> Result<SearchValue, NavigationSignal> + 'static,
	{
		self.validate_search = Some(Rc::new(validate));
		self
	}

	pub fn parse_params<F>(mut self, parse: F) -> Self
	where
		F: Fn(&PathParams) -> Result<PathParams, NavigationSignal> + 'static,
	{
		self.parse_params = Some(Rc::new(parse));
		self
	}

	pub fn stringify_params<F>(mut self, stringify: F) -> Self
	where
		F: Fn(&PathParams) -> PathParams + 'static,
	{
		self.stringify_params = Some(Rc::new(stringify));
		self
	}

	/// Guard run before any loader of the navigation.
	pub fn before_load<F, Fut>(mut self, guard: F) -> Self
	where
		F: Fn(BeforeLoadContext) -> Fut + 'static,
		Fut: Future<Output = Result<(), NavigationSignal>> + 'static,
	{
		self.before_load = Some(Rc::new(move |ctx| guard(ctx).boxed_local()));
		self
	}

	pub fn loader<F, Fut>(mut self, loader: F) -> Self
	where
		F: Fn(LoaderContext) -> Fut + 'static,
		Fut: Future<Output = Result<serde_json::Value, NavigationSignal>> + 'static,
	{
		self.loader = Some(Rc::new(move |ctx| loader(ctx).boxed_local()));
		self
	}

	pub fn get_context<F>(mut self, get_context: F) -> Self
	where
		F: Fn(&ContextArgs) -> Result<RouteContext, NavigationSignal> + 'static,
	{
		self.get_context = Some(Rc::new(get_context));
		self
	}

	/// Adds a filter applied to the current search before the caller's
	/// search intent.
	pub fn pre_search_filter<F>(mut self, filter: F) -> Self
	where
		F: Fn(&SearchValue) -> SearchValue + 'static,
	{
		self.pre_search_filters.push(Rc::new(filter));
		self
	}

	/// Adds a filter applied after the caller's search intent.
	pub fn post_search_filter<F>(mut self, filter: F) -> Self
	where
		F: Fn(&SearchValue) -> SearchValue + 'static,
	{
		self.post_search_filters.push(Rc::new(filter));
		self
	}

	/// Suffix appended to match ids, so one path can hold several matches
	/// (for example one per search value).
	pub fn get_key<F>(mut self, get_key: F) -> Self
	where
		F: Fn(&MatchInfo) -> String + 'static,
	{
		self.get_key = Some(Rc::new(get_key));
		self
	}

	/// Component reference handed to the router's component loader.
	pub fn component(mut self, component: impl Into<String>) -> Self {
		self.component = Some(component.into());
		self
	}

	pub fn on_error<F>(mut self, hook: F) -> Self
	where
		F: Fn(&Fault) -> Result<(), NavigationSignal> + 'static,
	{
		self.on_error = Some(Rc::new(hook));
		self
	}

	pub fn on_before_load_error<F>(mut self, hook: F) -> Self
	where
		F: Fn(&Fault) -> Result<(), NavigationSignal> + 'static,
	{
		self.on_before_load_error = Some(Rc::new(hook));
		self
	}

	pub fn on_load_error<F>(mut self, hook: F) -> Self
	where
		F: Fn(&Fault) -> Result<(), NavigationSignal> + 'static,
	{
		self.on_load_error = Some(Rc::new(hook));
		self
	}

	pub fn on_validate_search_error<F>(mut self, hook: F) -> Self
	where
		F: Fn(&Fault) -> Result<(), NavigationSignal> + 'static,
	{
		self.on_validate_search_error = Some(Rc::new(hook));
		self
	}

	/// Runs when a match of this route enters the committed list. The
	/// returned closure runs when it leaves again.
	pub fn on_loaded<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteMatch) -> Option<ExitHook> + 'static,
	{
		self.on_loaded = Some(Rc::new(hook));
		self
	}

	/// Runs when a match of this route stays committed across a navigation.
	pub fn on_transition<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteMatch) + 'static,
	{
		self.on_transition = Some(Rc::new(hook));
		self
	}

	pub(crate) fn has_guard_or_loader(&self) -> bool {
		self.before_load.is_some() || self.loader.is_some()
	}
}

impl fmt::Debug for RouteOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteOptions")
			.field("path", &self.path)
			.field("id", &self.id)
			.field("case_sensitive", &self.case_sensitive)
			.field("has_validate_search", &self.validate_search.is_some())
			.field("has_before_load", &self.before_load.is_some())
			.field("has_loader", &self.loader.is_some())
			.field("component", &self.component)
			.finish_non_exhaustive()
	}
}

/// Which hook a fault is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultStage {
	ValidateSearch,
	BeforeLoad,
	Load,
	/// Only the generic `on_error` hook applies to the remaining stages.
	ParseParams,
	Context,
}

impl RouteOptions {
	/// Passes `fault` through the stage hook (or `on_error`).
	///
	/// Returns the fault to store, or the signal the hook raised instead.
	pub(crate) fn handle_fault(
		&self,
		stage: FaultStage,
		fault: Fault,
	) -> Result<Fault, NavigationSignal> {
		let specific = match stage {
			FaultStage::ValidateSearch => self.on_validate_search_error.as_ref(),
			FaultStage::BeforeLoad => self.on_before_load_error.as_ref(),
			FaultStage::Load => self.on_load_error.as_ref(),
			FaultStage::ParseParams | FaultStage::Context => None,
		};
		let Some(hook) = specific.or(self.on_error.as_ref()) else {
			return Ok(fault);
		};

		match hook(&fault) {
			Ok(()) => Ok(fault),
			Err(NavigationSignal::Fault(replacement)) => Ok(replacement),
			Err(signal) => Err(signal),
		}
	}
}

/// A declared route. Cloning yields another handle to the same route.
#[derive(Clone)]
pub struct Route {
	inner: Rc<RouteInner>,
}

struct RouteInner {
	parent: Option<Weak<RouteInner>>,
	options: RouteOptions,
	children: RefCell<Vec<Route>>,
	children_assigned: Cell<usize>,
}

impl Route {
	/// Declares the root of a route tree. The root always has the path `/`.
	pub fn root(options: RouteOptions) -> Self {
		Self {
			inner: Rc::new(RouteInner {
				parent: None,
				options,
				children: RefCell::new(Vec::new()),
				children_assigned: Cell::new(0),
			}),
		}
	}

	/// Declares a route under `parent`.
	///
	/// The route still has to be passed to the parent's
	/// [`Route::add_children`].
	pub fn new(parent: &Route, options: RouteOptions) -> Self {
		Self {
			inner: Rc::new(RouteInner {
				parent: Some(Rc::downgrade(&parent.inner)),
				options,
				children: RefCell::new(Vec::new()),
				children_assigned: Cell::new(0),
			}),
		}
	}

	/// Assigns the children of this route. Children may be assigned once;
	/// a second assignment is reported when the tree is built.
	pub fn add_children(self, children: impl IntoIterator<Item = Route>) -> Self {
		*self.inner.children.borrow_mut() = children.into_iter().collect();
		self.inner
			.children_assigned
			.set(self.inner.children_assigned.get() + 1);
		self
	}

	pub fn options(&self) -> &RouteOptions {
		&self.inner.options
	}

	pub fn is_root(&self) -> bool {
		self.inner.parent.is_none()
	}

	/// The route this one was declared under, if it is still alive.
	pub fn parent(&self) -> Option<Route> {
		self.inner
			.parent
			.as_ref()
			.and_then(Weak::upgrade)
			.map(|inner| Route { inner })
	}

	pub(crate) fn has_dangling_parent(&self) -> bool {
		self.inner
			.parent
			.as_ref()
			.is_some_and(|parent| parent.upgrade().is_none())
	}

	pub fn children(&self) -> Vec<Route> {
		self.inner.children.borrow().clone()
	}

	pub(crate) fn children_assigned(&self) -> usize {
		self.inner.children_assigned.get()
	}

	/// Human-readable label used in configuration errors.
	pub(crate) fn label(&self) -> String {
		if self.is_root() {
			return crate::tree::ROOT_ROUTE_ID.to_string();
		}
		self.inner
			.options
			.id
			.clone()
			.or_else(|| self.inner.options.path.clone())
			.unwrap_or_else(|| "<pathless>".to_string())
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.inner, &b.inner)
	}
}

impl fmt::Debug for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("label", &self.label())
			.field("children", &self.inner.children.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parent_link_is_weak() {
		let root = Route::root(RouteOptions::new());
		let child = Route::new(&root, RouteOptions::new().path("a"));

		assert!(child.parent().is_some_and(|parent| Route::ptr_eq(&parent, &root)));
		drop(root);
		assert!(child.parent().is_none());
		assert!(child.has_dangling_parent());
	}

	#[rstest]
	fn test_add_children_counts_assignments() {
		let root = Route::root(RouteOptions::new());
		let a = Route::new(&root, RouteOptions::new().path("a"));
		let root = root.add_children([a.clone()]).add_children([a]);

		assert_eq!(root.children_assigned(), 2);
		assert_eq!(root.children().len(), 1);
	}

	#[rstest]
	#[case(FaultStage::Load, "load")]
	#[case(FaultStage::BeforeLoad, "generic")]
	#[case(FaultStage::Context, "generic")]
	fn test_handle_fault_prefers_stage_hook(#[case] stage: FaultStage, #[case] expected: &str) {
		let options = RouteOptions::new()
			.on_error(|_| Err(Fault::msg("generic").into()))
			.on_load_error(|_| Err(Fault::msg("load").into()));

		let stored = options.handle_fault(stage, Fault::msg("original"));

		assert!(matches!(stored, Ok(fault) if fault.to_string() == expected));
	}

	#[rstest]
	fn test_handle_fault_keeps_original_when_hook_accepts() {
		let original = Fault::msg("original");
		let options = RouteOptions::new().on_error(|_| Ok(()));

		let stored = options.handle_fault(FaultStage::Load, original.clone());

		assert!(matches!(stored, Ok(fault) if Fault::ptr_eq(&fault, &original)));
	}

	#[rstest]
	fn test_handle_fault_may_redirect() {
		let options = RouteOptions::new()
			.on_error(|_| Err(crate::error::Redirect::to("/login").into()));

		let stored = options.handle_fault(FaultStage::BeforeLoad, Fault::msg("denied"));

		assert!(matches!(
			stored,
			Err(NavigationSignal::Redirect(redirect)) if redirect.to == "/login"
		));
	}
}
