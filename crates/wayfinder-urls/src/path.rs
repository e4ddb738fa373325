//! Segment-based path templates.
//!
//! Templates and concrete pathnames parse into the same [`Segment`] sequence,
//! so matching is a pairwise walk over segments rather than a regex.
//!
//! # Template syntax
//!
//! - `posts` - static segment, compared literally
//! - `$postId` - required parameter
//! - `{-$lang}` - optional parameter, skipped when the pathname lacks it
//! - `$` or `*` - wildcard, captures the rest of the pathname as `*`
//!
//! A leading and a trailing `/` each become an explicit `/` segment, which
//! is how the root path and trailing-slash paths are matched.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parameters captured by a match, keyed by name. Wildcards use `*`.
pub type PathParams = HashMap<String, String>;

/// Parameter name under which a wildcard stores the captured remainder.
pub const WILDCARD_PARAM: &str = "*";

/// Parameter name under which a fuzzy match stores the unmatched remainder.
pub const FUZZY_REMAINDER_PARAM: &str = "**";

/// Kind of a path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
	/// Literal text, or the `/` marker.
	Static,
	/// `$name`.
	Param,
	/// `{-$name}`.
	OptionalParam,
	/// `$` or `*`.
	Wildcard,
}

/// One token of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
	pub kind: SegmentKind,
	/// Raw text. Parameters keep their `$` prefix (`$postId`), optional
	/// parameters are stored as `$name` as well.
	pub value: String,
}

impl Segment {
	fn slash() -> Self {
		Self {
			kind: SegmentKind::Static,
			value: "/".to_string(),
		}
	}

	fn classify(part: &str) -> Self {
		let (kind, value) = if part == "$" || part == "*" {
			(SegmentKind::Wildcard, part.to_string())
		} else if let Some(name) = optional_param_name(part) {
			(SegmentKind::OptionalParam, format!("${name}"))
		} else if part.starts_with('$') {
			(SegmentKind::Param, part.to_string())
		} else {
			(SegmentKind::Static, part.to_string())
		};
		Self { kind, value }
	}

	/// Returns `true` for the `/` marker segment.
	pub fn is_slash(&self) -> bool {
		self.kind == SegmentKind::Static && self.value == "/"
	}

	/// Parameter name for params, optional params and wildcards.
	pub fn param_name(&self) -> Option<&str> {
		match self.kind {
			SegmentKind::Param | SegmentKind::OptionalParam => self.value.strip_prefix('$'),
			SegmentKind::Wildcard => Some(WILDCARD_PARAM),
			SegmentKind::Static => None,
		}
	}
}

fn optional_param_name(part: &str) -> Option<&str> {
	part.strip_prefix("{-$")
		.and_then(|rest| rest.strip_suffix('}'))
		.filter(|name| !name.is_empty())
}

/// How resolved paths treat a trailing slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingSlash {
	/// Always drop it.
	#[default]
	Never,
	/// Always add one (except for the root path).
	Always,
	/// Keep whatever the destination had.
	Preserve,
}

/// Options for [`match_pathname`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
	/// Accept pathnames longer than the template. The unmatched remainder is
	/// reported as [`FUZZY_REMAINDER_PARAM`].
	pub fuzzy: bool,
	/// Compare static segments case-sensitively.
	pub case_sensitive: bool,
}

impl MatchOptions {
	pub fn exact() -> Self {
		Self::default()
	}

	pub fn fuzzy() -> Self {
		Self {
			fuzzy: true,
			..Self::default()
		}
	}

	pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
		self.case_sensitive = case_sensitive;
		self
	}
}

/// Collapses runs of `/` into one.
pub fn clean_path(path: &str) -> String {
	let mut cleaned = String::with_capacity(path.len());
	let mut previous_slash = false;
	for c in path.chars() {
		if c == '/' {
			if previous_slash {
				continue;
			}
			previous_slash = true;
		} else {
			previous_slash = false;
		}
		cleaned.push(c);
	}
	cleaned
}

/// Trims leading slashes. The root path `/` is returned unchanged.
pub fn trim_path_left(path: &str) -> String {
	if path == "/" {
		return path.to_string();
	}
	path.trim_start_matches('/').to_string()
}

/// Trims trailing slashes. The root path `/` is returned unchanged.
pub fn trim_path_right(path: &str) -> String {
	if path == "/" {
		return path.to_string();
	}
	path.trim_end_matches('/').to_string()
}

/// Trims slashes on both ends. The root path `/` is returned unchanged.
pub fn trim_path(path: &str) -> String {
	trim_path_right(&trim_path_left(path))
}

/// Joins parts with `/` and collapses duplicate slashes.
pub fn join_paths<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
	clean_path(&parts.into_iter().collect::<Vec<_>>().join("/"))
}

/// Strips `basepath` from the front of `pathname`.
///
/// Only whole segments are stripped: `/app` is removed from `/app/users`
/// but not from `/application`. Pathnames outside the basepath are returned
/// unchanged.
pub fn remove_basepath(basepath: &str, pathname: &str) -> String {
	let base = trim_path_right(basepath);
	if base.is_empty() || base == "/" {
		return pathname.to_string();
	}

	match pathname.strip_prefix(base.as_str()) {
		Some("") => "/".to_string(),
		Some(rest) if rest.starts_with('/') => rest.to_string(),
		_ => pathname.to_string(),
	}
}

/// Resolves `to` against `base`, honoring `basepath`.
///
/// A leading `/` restarts from the root, `..` drops the last segment, `.`
/// and empty segments are ignored and anything else is appended. The
/// basepath is stripped from both inputs before resolution and re-applied
/// afterwards.
///
/// ```rust
/// use wayfinder_urls::path::{TrailingSlash, resolve_path};
///
/// assert_eq!(resolve_path("/", "/a/b/c", "../d", TrailingSlash::Never), "/a/b/d");
/// assert_eq!(resolve_path("/", "/a/b/c", "/d/", TrailingSlash::Never), "/d");
/// assert_eq!(resolve_path("/app", "/app/a", "b", TrailingSlash::Never), "/app/a/b");
/// ```
pub fn resolve_path(basepath: &str, base: &str, to: &str, trailing_slash: TrailingSlash) -> String {
	let base = remove_basepath(basepath, base);
	let to = remove_basepath(basepath, to);

	let mut segments: Vec<&str> = if to.starts_with('/') {
		Vec::new()
	} else {
		base.split('/').filter(|part| !part.is_empty()).collect()
	};

	for part in to.split('/') {
		match part {
			"" | "." => {}
			".." => {
				segments.pop();
			}
			part => segments.push(part),
		}
	}

	let ends_with_slash = if to.is_empty() {
		base.ends_with('/')
	} else {
		to.ends_with('/')
	};
	let keep_trailing = match trailing_slash {
		TrailingSlash::Never => false,
		TrailingSlash::Always => true,
		TrailingSlash::Preserve => ends_with_slash,
	};

	let mut resolved = format!("/{}", segments.join("/"));
	if keep_trailing && !segments.is_empty() {
		resolved.push('/');
	}

	let basepath = trim_path_right(basepath);
	if basepath.is_empty() || basepath == "/" {
		return resolved;
	}
	if resolved == "/" {
		return basepath;
	}
	join_paths([basepath.as_str(), resolved.as_str()])
}

/// Parses a template or pathname into segments.
///
/// ```rust
/// use wayfinder_urls::path::{SegmentKind, parse_pathname};
///
/// let kinds: Vec<SegmentKind> = parse_pathname("/files/$").iter().map(|s| s.kind).collect();
/// assert_eq!(kinds, [SegmentKind::Static, SegmentKind::Static, SegmentKind::Wildcard]);
/// ```
pub fn parse_pathname(pathname: &str) -> Vec<Segment> {
	if pathname.is_empty() {
		return Vec::new();
	}

	let cleaned = clean_path(pathname);
	let mut segments = Vec::new();
	let mut rest = cleaned.as_str();

	if let Some(stripped) = rest.strip_prefix('/') {
		segments.push(Segment::slash());
		rest = stripped;
	}
	if rest.is_empty() {
		return segments;
	}

	segments.extend(
		rest.split('/')
			.filter(|part| !part.is_empty())
			.map(Segment::classify),
	);

	if rest.ends_with('/') {
		segments.push(Segment::slash());
	}
	segments
}

/// Substitutes `params` into `path`.
///
/// Parameters are percent-encoded. A missing required parameter keeps its
/// `$name` placeholder, a missing optional parameter drops its segment.
/// Wildcards render the `*` parameter (slashes preserved); with
/// `leave_wildcard` they keep their `$` marker in front of the value, which
/// is the form match identifiers use.
///
/// ```rust
/// use wayfinder_urls::path::{PathParams, interpolate_path};
///
/// let params = PathParams::from([("postId".to_string(), "42".to_string())]);
/// assert_eq!(interpolate_path("/posts/$postId", &params, false), "/posts/42");
/// ```
pub fn interpolate_path(path: &str, params: &PathParams, leave_wildcard: bool) -> String {
	let rendered: Vec<String> = parse_pathname(path)
		.into_iter()
		.filter_map(|segment| match segment.kind {
			SegmentKind::Static => Some(segment.value),
			SegmentKind::Param => {
				let name = segment.param_name().unwrap_or_default();
				Some(match params.get(name) {
					Some(value) => urlencoding::encode(value).into_owned(),
					None => segment.value.clone(),
				})
			}
			SegmentKind::OptionalParam => {
				let name = segment.param_name().unwrap_or_default();
				params
					.get(name)
					.filter(|value| !value.is_empty())
					.map(|value| urlencoding::encode(value).into_owned())
			}
			SegmentKind::Wildcard => {
				let value = params
					.get(WILDCARD_PARAM)
					.map(String::as_str)
					.map(encode_splat)
					.unwrap_or_default();
				if leave_wildcard {
					Some(format!("${value}"))
				} else {
					Some(value).filter(|value| !value.is_empty())
				}
			}
		})
		.collect();

	let joined = join_paths(rendered.iter().map(String::as_str));
	if joined.is_empty() {
		"/".to_string()
	} else {
		joined
	}
}

fn encode_splat(value: &str) -> String {
	value
		.split('/')
		.map(|part| urlencoding::encode(part).into_owned())
		.collect::<Vec<_>>()
		.join("/")
}

fn decode_segment(raw: &str) -> String {
	match urlencoding::decode(raw) {
		Ok(decoded) => decoded.into_owned(),
		Err(error) => {
			tracing::trace!(segment = raw, %error, "keeping undecodable path segment as-is");
			raw.to_string()
		}
	}
}

fn with_leading_slash(path: &str) -> Cow<'_, str> {
	if path.starts_with('/') {
		Cow::Borrowed(path)
	} else {
		Cow::Owned(format!("/{path}"))
	}
}

/// Matches `pathname` against the template `to`.
///
/// `basepath` is stripped from `pathname` first. Returns the captured
/// parameters, or `None` when the template does not match. The function is
/// pure: identical inputs always produce equal results.
///
/// ```rust
/// use wayfinder_urls::path::{MatchOptions, match_pathname};
///
/// let params = match_pathname("/", "/posts/42", "/posts/$postId", MatchOptions::exact()).unwrap();
/// assert_eq!(params["postId"], "42");
/// assert!(match_pathname("/", "/posts/42/edit", "/posts/$postId", MatchOptions::exact()).is_none());
/// ```
pub fn match_pathname(
	basepath: &str,
	pathname: &str,
	to: &str,
	options: MatchOptions,
) -> Option<PathParams> {
	let pathname = remove_basepath(basepath, pathname);
	let base_segments = parse_pathname(&with_leading_slash(&pathname));
	let route_segments = parse_pathname(&with_leading_slash(to));

	let mut params = PathParams::new();
	match_segments(&base_segments, 0, &route_segments, 0, &mut params, options).then_some(params)
}

fn static_equal(route: &str, base: &str, case_sensitive: bool) -> bool {
	if case_sensitive {
		route == base
	} else {
		route == base || route.to_lowercase() == base.to_lowercase()
	}
}

fn capturable(segment: &Segment) -> bool {
	!segment.is_slash() && !segment.value.starts_with('$')
}

fn match_segments(
	base: &[Segment],
	mut base_index: usize,
	route: &[Segment],
	mut route_index: usize,
	params: &mut PathParams,
	options: MatchOptions,
) -> bool {
	loop {
		let base_segment = base.get(base_index);
		let Some(route_segment) = route.get(route_index) else {
			if base_index >= base.len() {
				return true;
			}
			let remainder: Vec<&str> = base[base_index..]
				.iter()
				.map(|s| s.value.as_str())
				.collect();
			params.insert(FUZZY_REMAINDER_PARAM.to_string(), join_paths(remainder));
			return options.fuzzy && route.last().is_some_and(|last| !last.is_slash());
		};

		match route_segment.kind {
			SegmentKind::Wildcard => {
				let remaining: Vec<&str> = base[base_index.min(base.len())..]
					.iter()
					.filter(|segment| !segment.is_slash())
					.map(|segment| segment.value.as_str())
					.collect();
				if remaining.is_empty() {
					return false;
				}
				params.insert(WILDCARD_PARAM.to_string(), decode_segment(&remaining.join("/")));
				return true;
			}
			SegmentKind::Static => {
				if route_segment.is_slash() && base_segment.is_none() {
					route_index += 1;
					continue;
				}
				let Some(base_segment) = base_segment else {
					return false;
				};
				let case_sensitive = options.case_sensitive;
				if !static_equal(&route_segment.value, &base_segment.value, case_sensitive) {
					return false;
				}
				base_index += 1;
				route_index += 1;
			}
			SegmentKind::Param => {
				let Some(base_segment) = base_segment else {
					return false;
				};
				if !capturable(base_segment) {
					return false;
				}
				let name = route_segment.param_name().unwrap_or_default();
				params.insert(name.to_string(), decode_segment(&base_segment.value));
				base_index += 1;
				route_index += 1;
			}
			SegmentKind::OptionalParam => {
				if let Some(base_segment) = base_segment.filter(|segment| capturable(segment)) {
					let mut attempt = params.clone();
					let name = route_segment.param_name().unwrap_or_default();
					attempt.insert(name.to_string(), decode_segment(&base_segment.value));
					let (next_base, next_route) = (base_index + 1, route_index + 1);
					if match_segments(base, next_base, route, next_route, &mut attempt, options) {
						*params = attempt;
						return true;
					}
				}
				route_index += 1;
			}
		}
	}
}

/// Returns `true` when `to` parses as an absolute URL (it has a scheme).
pub fn is_external_url(to: &str) -> bool {
	url::Url::parse(to).is_ok()
}

/// Specificity weight of a segment kind. Lower sorts first.
pub fn segment_weight(kind: SegmentKind) -> f64 {
	match kind {
		SegmentKind::Static => 1.0,
		SegmentKind::Param => 2.0,
		SegmentKind::OptionalParam => 2.5,
		SegmentKind::Wildcard => 3.0,
	}
}

/// Specificity score of a path: `Σ weight(kind) · 0.001^position`.
///
/// Earlier segments dominate, so `a/$id` scores below `$id/a`. Lower scores
/// are more specific.
pub fn specificity_score(path: &str) -> f64 {
	parse_pathname(path)
		.iter()
		.enumerate()
		.map(|(position, segment)| segment_weight(segment.kind) * 0.001f64.powi(position as i32))
		.sum()
}
