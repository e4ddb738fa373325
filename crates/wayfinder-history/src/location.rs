//! History entries and href parsing.

use serde::{Deserialize, Serialize};
use url::{Position, Url};

/// State attached to one history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
	/// Unique per entry. Two pushes of the same href get different keys.
	pub key: String,
	/// Position of the entry in the stack.
	pub index: usize,
	/// Caller data passed to `push`/`replace`.
	#[serde(default)]
	pub data: serde_json::Value,
}

/// A location as seen by the history stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLocation {
	/// `pathname + search + hash`.
	pub href: String,
	pub pathname: String,
	/// `?...` or empty.
	pub search: String,
	/// `#...` or empty.
	pub hash: String,
	pub state: HistoryState,
}

/// Splits `href` into its parts.
///
/// Absolute URLs lose their origin; only the path, query and fragment are
/// kept.
///
/// ```rust
/// use wayfinder_history::{HistoryState, parse_href};
///
/// let location = parse_href("https://example.com/posts?page=2#top", HistoryState::default());
/// assert_eq!(location.href, "/posts?page=2#top");
/// assert_eq!(location.pathname, "/posts");
/// assert_eq!(location.search, "?page=2");
/// assert_eq!(location.hash, "#top");
/// ```
pub fn parse_href(href: &str, state: HistoryState) -> HistoryLocation {
	let relative = match Url::parse(href) {
		Ok(url) => url[Position::BeforePath..].to_string(),
		Err(_) => href.to_string(),
	};

	let (rest, hash) = match relative.find('#') {
		Some(at) => (&relative[..at], &relative[at..]),
		None => (relative.as_str(), ""),
	};
	let (pathname, search) = match rest.find('?') {
		Some(at) => (&rest[..at], &rest[at..]),
		None => (rest, ""),
	};

	let pathname = if pathname.is_empty() { "/" } else { pathname };
	let search = if search == "?" { "" } else { search };
	let hash = if hash == "#" { "" } else { hash };

	HistoryLocation {
		href: format!("{pathname}{search}{hash}"),
		pathname: pathname.to_string(),
		search: search.to_string(),
		hash: hash.to_string(),
		state,
	}
}
