//! Locations and the location builder.
//!
//! [`build_location`] turns the current location plus a [`NavigateOptions`]
//! intent into the next [`ParsedLocation`]. It is a pure function of its
//! inputs: building twice from the same state yields the same `href`.

use std::fmt;
use std::rc::Rc;

use wayfinder_core::{SearchValue, replace_equal_deep};
use wayfinder_history::History;
use wayfinder_urls::{PathParams, SearchStringifier, TrailingSlash, interpolate_path, resolve_path};

use crate::route::Route;

/// A fully resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLocation {
	/// `pathname + search_str + #hash`, as written to the history.
	pub href: String,
	pub pathname: String,
	pub search: SearchValue,
	/// Serialized search, `?...` or empty.
	pub search_str: String,
	/// Fragment without the leading `#`.
	pub hash: String,
	pub state: serde_json::Value,
	/// Distinguishes two navigations to the same href.
	pub key: Option<String>,
}

impl ParsedLocation {
	/// A location for `/` with nothing else set.
	pub fn root() -> Self {
		Self {
			href: "/".to_string(),
			pathname: "/".to_string(),
			search: SearchValue::object(),
			search_str: String::new(),
			hash: String::new(),
			state: serde_json::Value::Null,
			key: None,
		}
	}
}

/// How the destination params are derived from the current ones.
#[derive(Clone, Default)]
pub enum ParamsIntent {
	/// Reuse the current params.
	#[default]
	Keep,
	/// Use exactly these params.
	Set(PathParams),
	/// Derive the params from the current ones.
	Update(Rc<dyn Fn(&PathParams) -> PathParams>),
}

/// How the destination search is derived from the current one.
#[derive(Clone, Default)]
pub enum SearchIntent {
	/// Start from an empty search. Routes with pre-filters still carry
	/// over what their filters keep.
	#[default]
	Unset,
	/// Reuse the current search.
	Keep,
	/// Use exactly this search.
	Set(SearchValue),
	/// Layer these keys over the current search.
	Merge(SearchValue),
	/// Derive the search from the current one.
	Update(Rc<dyn Fn(&SearchValue) -> SearchValue>),
}

/// How the destination hash is derived.
#[derive(Clone, Default)]
pub enum HashIntent {
	#[default]
	Clear,
	Keep,
	Set(String),
	Update(Rc<dyn Fn(&str) -> String>),
}

/// How the destination history state is derived.
#[derive(Debug, Clone, Default)]
pub enum StateIntent {
	#[default]
	Clear,
	Keep,
	Set(serde_json::Value),
}

/// A navigation intent.
///
/// ```rust
/// use wayfinder_router::{NavigateOptions, SearchIntent};
/// use wayfinder_core::SearchValue;
///
/// let options = NavigateOptions::to("../settings")
///     .search(SearchIntent::Merge(SearchValue::from([("tab", "profile")])))
///     .replace(true);
/// assert_eq!(options.to.as_deref(), Some("../settings"));
/// ```
#[derive(Clone, Default)]
pub struct NavigateOptions {
	/// Pathname the target is resolved against. Defaults to the current one.
	pub from: Option<String>,
	/// Target path, possibly relative. `None` stays on the `from` path.
	pub to: Option<String>,
	pub params: ParamsIntent,
	pub search: SearchIntent,
	pub hash: HashIntent,
	pub state: StateIntent,
	/// Forces a new history entry even when the href is unchanged.
	pub key: Option<String>,
	pub replace: bool,
}

impl NavigateOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn to(to: impl Into<String>) -> Self {
		Self {
			to: Some(to.into()),
			..Self::default()
		}
	}

	/// Options that rebuild the current location unchanged.
	pub fn current() -> Self {
		Self {
			params: ParamsIntent::Keep,
			search: SearchIntent::Keep,
			hash: HashIntent::Keep,
			state: StateIntent::Keep,
			..Self::default()
		}
	}

	pub fn from(mut self, from: impl Into<String>) -> Self {
		self.from = Some(from.into());
		self
	}

	pub fn params(mut self, params: ParamsIntent) -> Self {
		self.params = params;
		self
	}

	/// Shorthand for [`ParamsIntent::Set`].
	pub fn with_params<K, V>(self, params: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.params(ParamsIntent::Set(
			params
				.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		))
	}

	pub fn search(mut self, search: SearchIntent) -> Self {
		self.search = search;
		self
	}

	pub fn hash(mut self, hash: HashIntent) -> Self {
		self.hash = hash;
		self
	}

	pub fn state(mut self, state: StateIntent) -> Self {
		self.state = state;
		self
	}

	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	pub fn replace(mut self, replace: bool) -> Self {
		self.replace = replace;
		self
	}
}

impl fmt::Debug for NavigateOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NavigateOptions")
			.field("from", &self.from)
			.field("to", &self.to)
			.field("state", &self.state)
			.field("key", &self.key)
			.field("replace", &self.replace)
			.finish_non_exhaustive()
	}
}

/// Inputs of [`build_location`] taken from the router.
pub struct BuildContext<'a> {
	pub basepath: &'a str,
	pub trailing_slash: TrailingSlash,
	pub current: &'a ParsedLocation,
	/// Params of the deepest current match.
	pub current_params: &'a PathParams,
	/// Routes of the destination, root first. Supplies param stringifiers
	/// and search filters.
	pub routes: &'a [Route],
	pub stringify_search: &'a SearchStringifier,
	pub history: &'a dyn History,
}

/// Resolves `dest` against the current location.
pub fn build_location(ctx: &BuildContext<'_>, dest: &NavigateOptions) -> ParsedLocation {
	let from = dest.from.as_deref().unwrap_or(&ctx.current.pathname);
	let template = resolve_path(
		ctx.basepath,
		from,
		dest.to.as_deref().unwrap_or_default(),
		ctx.trailing_slash,
	);

	let mut params = match &dest.params {
		ParamsIntent::Keep => ctx.current_params.clone(),
		ParamsIntent::Set(params) => params.clone(),
		ParamsIntent::Update(update) => update(ctx.current_params),
	};
	for route in ctx.routes {
		if let Some(stringify) = &route.options().stringify_params {
			let stringified = stringify(&params);
			params.extend(stringified);
		}
	}
	// Staying on the current location: its pathname is concrete, and
	// segments such as `*` or `$x` in it are literal.
	let pathname = if dest.to.is_none() && dest.from.is_none() {
		template
	} else {
		interpolate_path(&template, &params, false)
	};

	let filtered = ctx
		.routes
		.iter()
		.flat_map(|route| route.options().pre_search_filters.iter())
		.fold(ctx.current.search.clone(), |search, filter| filter(&search));
	let has_pre_filters = ctx
		.routes
		.iter()
		.any(|route| !route.options().pre_search_filters.is_empty());

	let intended = match &dest.search {
		SearchIntent::Unset if has_pre_filters => filtered,
		SearchIntent::Unset => SearchValue::object(),
		SearchIntent::Keep => filtered,
		SearchIntent::Set(search) => search.clone(),
		SearchIntent::Merge(search) => filtered.merged(search),
		SearchIntent::Update(update) => update(&filtered),
	};
	let next_search = ctx
		.routes
		.iter()
		.flat_map(|route| route.options().post_search_filters.iter())
		.fold(intended, |search, filter| filter(&search));
	let search = replace_equal_deep(&ctx.current.search, &next_search);
	let search_str = (ctx.stringify_search)(&search);

	let hash = match &dest.hash {
		HashIntent::Clear => String::new(),
		HashIntent::Keep => ctx.current.hash.clone(),
		HashIntent::Set(hash) => hash.trim_start_matches('#').to_string(),
		HashIntent::Update(update) => update(&ctx.current.hash),
	};
	let state = match &dest.state {
		StateIntent::Clear => serde_json::Value::Null,
		StateIntent::Keep => ctx.current.state.clone(),
		StateIntent::Set(state) => state.clone(),
	};

	let hash_part = if hash.is_empty() {
		String::new()
	} else {
		format!("#{hash}")
	};
	let href = ctx
		.history
		.create_href(&format!("{pathname}{search_str}{hash_part}"));

	ParsedLocation {
		href,
		pathname,
		search,
		search_str,
		hash,
		state,
		key: dest.key.clone(),
	}
}
