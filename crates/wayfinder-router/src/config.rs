//! Router configuration.
//!
//! [`RouterSettings`] holds the declarative part and can be read from TOML:
//!
//! ```toml
//! [router]
//! basepath = "/app"
//! case_sensitive = false
//! default_preload = "intent"
//! default_preload_delay_ms = 100
//! trailing_slash = "preserve"
//! ```
//!
//! [`RouterOptions`] adds the collaborators that cannot be serialized: the
//! route tree, the history and the various hooks.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use wayfinder_history::History;
use wayfinder_urls::{SearchParser, SearchStringifier, TrailingSlash};

use crate::error::{NavigationSignal, Result};
use crate::location::ParsedLocation;
use crate::route::{ComponentLoader, Route, RouteContext};

/// When routes are preloaded without an explicit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStrategy {
	/// On hover or focus of a link, after `default_preload_delay_ms`.
	Intent,
}

/// Declarative router settings.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
	/// Prefix under which the application is mounted.
	pub basepath: String,
	/// Compare static path segments case-sensitively.
	pub case_sensitive: bool,
	/// `false` or `"intent"`.
	#[serde(with = "preload_setting")]
	pub default_preload: Option<PreloadStrategy>,
	pub default_preload_delay_ms: u64,
	pub trailing_slash: TrailingSlash,
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			basepath: "/".to_string(),
			case_sensitive: false,
			default_preload: None,
			default_preload_delay_ms: 50,
			trailing_slash: TrailingSlash::Never,
		}
	}
}

impl RouterSettings {
	/// Parses settings from a TOML document holding the fields at top level.
	pub fn from_toml_str(content: &str) -> Result<Self> {
		Ok(toml::from_str(content)?)
	}

	/// Parses settings from the `[table]` section of a TOML document.
	///
	/// A missing section yields the defaults.
	pub fn from_toml_table(content: &str, table: &str) -> Result<Self> {
		let mut document: toml::Table = toml::from_str(content)?;
		match document.remove(table) {
			Some(section) => Ok(section.try_into()?),
			None => Ok(Self::default()),
		}
	}

	pub fn with_basepath(mut self, basepath: impl Into<String>) -> Self {
		self.basepath = basepath.into();
		self
	}

	pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
		self.case_sensitive = case_sensitive;
		self
	}

	pub fn with_default_preload(mut self, strategy: Option<PreloadStrategy>) -> Self {
		self.default_preload = strategy;
		self
	}

	pub fn with_default_preload_delay_ms(mut self, delay_ms: u64) -> Self {
		self.default_preload_delay_ms = delay_ms;
		self
	}

	pub fn with_trailing_slash(mut self, trailing_slash: TrailingSlash) -> Self {
		self.trailing_slash = trailing_slash;
		self
	}
}

mod preload_setting {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	use super::PreloadStrategy;

	#[derive(Serialize, Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Flag(bool),
		Strategy(PreloadStrategy),
	}

	pub fn serialize<S: Serializer>(
		value: &Option<PreloadStrategy>,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		match value {
			Some(strategy) => Raw::Strategy(*strategy),
			None => Raw::Flag(false),
		}
		.serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<PreloadStrategy>, D::Error> {
		Ok(match Raw::deserialize(deserializer)? {
			Raw::Flag(false) => None,
			Raw::Flag(true) | Raw::Strategy(PreloadStrategy::Intent) => {
				Some(PreloadStrategy::Intent)
			}
		})
	}
}

pub type RouteChangeHook = Rc<dyn Fn(&ParsedLocation)>;

/// Everything needed to construct a [`crate::Router`].
#[derive(Clone)]
pub struct RouterOptions {
	pub(crate) route: Route,
	pub(crate) history: Option<Rc<dyn History>>,
	pub(crate) settings: RouterSettings,
	pub(crate) context: RouteContext,
	pub(crate) parse_search: Option<SearchParser>,
	pub(crate) stringify_search: Option<SearchStringifier>,
	pub(crate) load_component: Option<ComponentLoader>,
	pub(crate) on_route_change: Option<RouteChangeHook>,
}

impl RouterOptions {
	/// Options for the tree rooted at `route`, with default settings and an
	/// in-memory history.
	pub fn new(route: Route) -> Self {
		Self::from_settings(route, RouterSettings::default())
	}

	pub fn from_settings(route: Route, settings: RouterSettings) -> Self {
		Self {
			route,
			history: None,
			settings,
			context: RouteContext::new(),
			parse_search: None,
			stringify_search: None,
			load_component: None,
			on_route_change: None,
		}
	}

	pub fn history(mut self, history: impl History + 'static) -> Self {
		self.history = Some(Rc::new(history));
		self
	}

	pub fn settings(mut self, settings: RouterSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn basepath(mut self, basepath: impl Into<String>) -> Self {
		self.settings.basepath = basepath.into();
		self
	}

	/// Context every route's `get_context` starts from.
	pub fn context(mut self, context: RouteContext) -> Self {
		self.context = context;
		self
	}

	pub fn parse_search(mut self, parser: SearchParser) -> Self {
		self.parse_search = Some(parser);
		self
	}

	pub fn stringify_search(mut self, stringifier: SearchStringifier) -> Self {
		self.stringify_search = Some(stringifier);
		self
	}

	/// Hook loading a route's component by name. Called once per load of a
	/// match whose route declares a component.
	pub fn load_component<F, Fut>(mut self, load: F) -> Self
	where
		F: Fn(&str) -> Fut + 'static,
		Fut: Future<Output = std::result::Result<(), NavigationSignal>> + 'static,
	{
		self.load_component = Some(Rc::new(move |component: &str| load(component).boxed_local()));
		self
	}

	/// Runs after every commit that changed the href.
	pub fn on_route_change<F>(mut self, hook: F) -> Self
	where
		F: Fn(&ParsedLocation) + 'static,
	{
		self.on_route_change = Some(Rc::new(hook));
		self
	}
}

impl fmt::Debug for RouterOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterOptions")
			.field("route", &self.route)
			.field("settings", &self.settings)
			.field("has_history", &self.history.is_some())
			.field("context", &self.context)
			.finish_non_exhaustive()
	}
}
