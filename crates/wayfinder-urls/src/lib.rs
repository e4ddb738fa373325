//! # wayfinder-urls
//!
//! URL plumbing for the router: path templates, relative resolution and
//! search-string codecs. Everything in here is pure and synchronous.
//!
//! ## Path templates
//!
//! A template such as `/posts/$postId/{-$lang}/$` is made of segments:
//!
//! - static text (`posts`)
//! - `$name` params capturing exactly one segment
//! - `{-$name}` optional params that may be skipped
//! - a trailing `$` (or `*`) wildcard capturing the rest as `*`
//!
//! ```rust
//! use wayfinder_urls::{MatchOptions, interpolate_path, match_pathname};
//!
//! let params = match_pathname("/", "/posts/42", "/posts/$postId", MatchOptions::exact()).unwrap();
//! assert_eq!(params["postId"], "42");
//! assert_eq!(interpolate_path("/posts/$postId/edit", &params, false), "/posts/42/edit");
//! ```
//!
//! ## Search strings
//!
//! ```rust
//! use wayfinder_core::SearchValue;
//! use wayfinder_urls::{parse_search, stringify_search};
//!
//! let search = parse_search("?page=2&sort=asc");
//! assert_eq!(search.get("page"), Some(&SearchValue::from(2)));
//! assert_eq!(stringify_search(&search), "?page=2&sort=asc");
//! ```

pub mod path;
pub mod qss;
pub mod search;

pub use path::{
	FUZZY_REMAINDER_PARAM, MatchOptions, PathParams, Segment, SegmentKind, TrailingSlash,
	WILDCARD_PARAM, clean_path, interpolate_path, is_external_url, join_paths, match_pathname,
	parse_pathname, remove_basepath, resolve_path, segment_weight, specificity_score, trim_path,
	trim_path_left, trim_path_right,
};
pub use search::{
	SearchParser, SearchStringifier, default_parse_search, default_stringify_search, parse_search,
	parse_search_with, stringify_search, stringify_search_with,
};
