//! Error and control-flow types.
//!
//! Route callbacks return `Result<_, NavigationSignal>`. Redirects and
//! not-found are signals, not failures: the engine handles them at every
//! level and never passes them to error hooks. Anything else is a
//! [`Fault`], stored on the failing match as a [`MatchError`].

use std::fmt;
use std::rc::Rc;

use wayfinder_core::SearchValue;
use wayfinder_urls::PathParams;

/// Result alias for engine operations.
pub type Result<T, E = RouterError> = std::result::Result<T, E>;

/// A failure raised by route code.
///
/// Wraps [`anyhow::Error`] behind an `Rc` so the same failure can sit on
/// match state and be cloned into snapshots.
#[derive(Clone)]
pub struct Fault(Rc<anyhow::Error>);

impl Fault {
	pub fn new(error: anyhow::Error) -> Self {
		Self(Rc::new(error))
	}

	/// Builds a fault from a plain message.
	pub fn msg<M>(message: M) -> Self
	where
		M: fmt::Display + fmt::Debug + Send + Sync + 'static,
	{
		Self::new(anyhow::Error::msg(message))
	}

	pub fn inner(&self) -> &anyhow::Error {
		&self.0
	}

	/// Returns `true` when both handles carry the same failure.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

impl From<anyhow::Error> for Fault {
	fn from(error: anyhow::Error) -> Self {
		Self::new(error)
	}
}

impl fmt::Debug for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&*self.0, f)
	}
}

impl std::error::Error for Fault {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.0.source()
	}
}

/// A request to navigate somewhere else instead.
///
/// ```rust
/// use wayfinder_router::Redirect;
///
/// let redirect = Redirect::to("/login").replace(true);
/// assert_eq!(redirect.to, "/login");
/// assert_eq!(redirect.code, 307);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
	pub to: String,
	pub from: Option<String>,
	pub params: Option<PathParams>,
	pub search: Option<SearchValue>,
	pub hash: Option<String>,
	/// Replace the current history entry instead of pushing.
	pub replace: bool,
	/// HTTP-style status code, `307` unless set.
	pub code: u16,
}

impl Redirect {
	pub fn to(to: impl Into<String>) -> Self {
		Self {
			to: to.into(),
			from: None,
			params: None,
			search: None,
			hash: None,
			replace: false,
			code: 307,
		}
	}

	pub fn from(mut self, from: impl Into<String>) -> Self {
		self.from = Some(from.into());
		self
	}

	pub fn params(mut self, params: PathParams) -> Self {
		self.params = Some(params);
		self
	}

	pub fn search(mut self, search: impl Into<SearchValue>) -> Self {
		self.search = Some(search.into());
		self
	}

	pub fn hash(mut self, hash: impl Into<String>) -> Self {
		self.hash = Some(hash.into());
		self
	}

	pub fn replace(mut self, replace: bool) -> Self {
		self.replace = replace;
		self
	}

	pub fn code(mut self, code: u16) -> Self {
		self.code = code;
		self
	}
}

/// Signals that the requested content does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotFound {
	/// Route that raised it, when known.
	pub route_id: Option<String>,
}

impl NotFound {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn in_route(route_id: impl Into<String>) -> Self {
		Self {
			route_id: Some(route_id.into()),
		}
	}
}

/// What a route callback may return instead of a value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NavigationSignal {
	/// Navigate to another location.
	#[error("redirect to {}", .0.to)]
	Redirect(Redirect),

	/// The content does not exist.
	#[error("not found")]
	NotFound(NotFound),

	/// Any other failure.
	#[error(transparent)]
	Fault(#[from] Fault),
}

impl NavigationSignal {
	/// Wraps any error as a fault.
	pub fn fault(error: impl Into<anyhow::Error>) -> Self {
		Self::Fault(Fault::new(error.into()))
	}

	pub fn is_redirect(&self) -> bool {
		matches!(self, Self::Redirect(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}

impl From<anyhow::Error> for NavigationSignal {
	fn from(error: anyhow::Error) -> Self {
		Self::Fault(Fault::new(error))
	}
}

impl From<Redirect> for NavigationSignal {
	fn from(redirect: Redirect) -> Self {
		Self::Redirect(redirect)
	}
}

impl From<NotFound> for NavigationSignal {
	fn from(not_found: NotFound) -> Self {
		Self::NotFound(not_found)
	}
}

/// Failure stored on a route match.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchError {
	#[error("invalid search params for route '{route_id}': {cause}")]
	InvalidSearchParams { route_id: String, cause: Fault },

	#[error("failed to parse params for route '{route_id}': {cause}")]
	ParseParams { route_id: String, cause: Fault },

	#[error("failed to build context for route '{route_id}': {cause}")]
	Context { route_id: String, cause: Fault },

	#[error("before_load failed for route '{route_id}': {cause}")]
	BeforeLoad { route_id: String, cause: Fault },

	#[error("loader failed for route '{route_id}': {cause}")]
	Loader { route_id: String, cause: Fault },

	#[error("not found: {pathname}")]
	NotFound {
		route_id: Option<String>,
		pathname: String,
	},
}

impl MatchError {
	/// Stable error code.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidSearchParams { .. } => "INVALID_SEARCH_PARAMS",
			Self::ParseParams { .. } => "PARSE_PARAMS",
			Self::Context { .. } => "CONTEXT",
			Self::BeforeLoad { .. } => "BEFORE_LOAD",
			Self::Loader { .. } => "LOADER",
			Self::NotFound { .. } => "NOT_FOUND",
		}
	}

	pub fn route_id(&self) -> Option<&str> {
		match self {
			Self::InvalidSearchParams { route_id, .. }
			| Self::ParseParams { route_id, .. }
			| Self::Context { route_id, .. }
			| Self::BeforeLoad { route_id, .. }
			| Self::Loader { route_id, .. } => Some(route_id),
			Self::NotFound { route_id, .. } => route_id.as_deref(),
		}
	}

	/// The underlying fault, absent for not-found.
	pub fn cause(&self) -> Option<&Fault> {
		match self {
			Self::InvalidSearchParams { cause, .. }
			| Self::ParseParams { cause, .. }
			| Self::Context { cause, .. }
			| Self::BeforeLoad { cause, .. }
			| Self::Loader { cause, .. } => Some(cause),
			Self::NotFound { .. } => None,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

/// Invalid route tree declarations. Raised while building the tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error("Duplicate route id '{0}': route ids must be unique across the tree")]
	DuplicateRouteId(String),

	#[error(
		"Route '{child}' was created under '{declared}' but added to the children of '{actual}'"
	)]
	ParentMismatch {
		child: String,
		declared: String,
		actual: String,
	},

	#[error("Route '{0}' has no live parent; only the root route may omit one")]
	MissingParent(String),

	#[error("A pathless route under '{0}' must declare an id")]
	MissingIdentity(String),

	#[error("Route '{0}' is not a root route")]
	NotRoot(String),

	#[error("Children of route '{0}' were assigned more than once")]
	ChildrenAlreadySet(String),
}

/// Errors returned by [`crate::Router`] operations.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("Refusing to navigate to external URL '{0}'; use the history directly")]
	ExternalNavigation(String),

	#[error("Route not found: {0}")]
	RouteNotFound(String),

	#[error("Invalid router settings: {0}")]
	Settings(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn fault() -> Fault {
		Fault::msg("boom")
	}

	#[rstest]
	#[case(
		MatchError::InvalidSearchParams { route_id: "/a".into(), cause: fault() },
		"INVALID_SEARCH_PARAMS"
	)]
	#[case(MatchError::ParseParams { route_id: "/a".into(), cause: fault() }, "PARSE_PARAMS")]
	#[case(MatchError::Context { route_id: "/a".into(), cause: fault() }, "CONTEXT")]
	#[case(MatchError::BeforeLoad { route_id: "/a".into(), cause: fault() }, "BEFORE_LOAD")]
	#[case(MatchError::Loader { route_id: "/a".into(), cause: fault() }, "LOADER")]
	#[case(MatchError::NotFound { route_id: None, pathname: "/x".into() }, "NOT_FOUND")]
	fn test_match_error_codes(#[case] error: MatchError, #[case] code: &str) {
		assert_eq!(error.code(), code);
	}

	#[rstest]
	fn test_match_error_display_names_route() {
		let error = MatchError::Loader {
			route_id: "/posts/$postId".into(),
			cause: fault(),
		};
		assert_eq!(error.to_string(), "loader failed for route '/posts/$postId': boom");
		assert_eq!(error.route_id(), Some("/posts/$postId"));
	}

	#[rstest]
	fn test_anyhow_errors_become_faults() {
		fn failing() -> std::result::Result<(), NavigationSignal> {
			let io: anyhow::Result<()> = Err(anyhow::anyhow!("disk on fire"));
			io?;
			Ok(())
		}

		let signal = failing().unwrap_err();
		assert!(matches!(
			&signal,
			NavigationSignal::Fault(fault) if fault.to_string() == "disk on fire"
		));
	}

	#[rstest]
	fn test_redirect_is_not_a_fault() {
		let signal = NavigationSignal::from(Redirect::to("/login"));

		assert!(signal.is_redirect());
		assert!(!signal.is_not_found());
		assert_eq!(signal.to_string(), "redirect to /login");
	}

	#[rstest]
	fn test_config_error_names_both_ids() {
		let error = ConfigError::ParentMismatch {
			child: "posts".into(),
			declared: "/users".into(),
			actual: "__root__".into(),
		};
		let message = error.to_string();
		assert!(message.contains("posts"));
		assert!(message.contains("/users"));
		assert!(message.contains("__root__"));
	}
}
