//! Search-string parsing and serialization.
//!
//! The raw codec in [`crate::qss`] only knows flat scalars and repeated keys.
//! This layer adds JSON on top of it: while parsing, every string value is
//! offered to a JSON parser (failures are ignored), and while stringifying,
//! object and array values are written as JSON text. Nested search state
//! such as `?filters={"tags":["a"]}` therefore survives a round trip.

use std::rc::Rc;

use wayfinder_core::{SearchMap, SearchValue};

use crate::qss;

/// Parses a search string (with or without its leading `?`).
pub type SearchParser = Rc<dyn Fn(&str) -> SearchValue>;

/// Serializes a search value into a search string (`?...` or empty).
pub type SearchStringifier = Rc<dyn Fn(&SearchValue) -> String>;

/// Builds a parser that runs `parser` over every decoded string value.
pub fn parse_search_with<F, E>(parser: F) -> SearchParser
where
	F: Fn(&str) -> Result<SearchValue, E> + 'static,
{
	Rc::new(move |search: &str| {
		let search = search.strip_prefix('?').unwrap_or(search);
		let mut query = qss::decode(search);

		for value in query.values_mut() {
			let parsed = match &*value {
				SearchValue::String(text) => parser(text).ok(),
				_ => None,
			};
			if let Some(parsed) = parsed {
				*value = parsed;
			}
		}

		SearchValue::from(query)
	})
}

/// Builds a stringifier that writes object and array values with `stringify`.
pub fn stringify_search_with<F>(stringify: F) -> SearchStringifier
where
	F: Fn(&SearchValue) -> String + 'static,
{
	Rc::new(move |search: &SearchValue| {
		let Some(object) = search.as_object() else {
			return String::new();
		};

		let prepared: SearchMap = object
			.iter()
			.map(|(key, value)| {
				let value = match value {
					SearchValue::Array(_) | SearchValue::Object(_) => {
						SearchValue::from(stringify(value))
					}
					scalar => scalar.clone(),
				};
				(key.clone(), value)
			})
			.collect();

		let encoded = qss::encode(&prepared);
		if encoded.is_empty() {
			String::new()
		} else {
			format!("?{encoded}")
		}
	})
}

/// Parser backed by `serde_json`.
pub fn default_parse_search() -> SearchParser {
	parse_search_with(|text: &str| {
		serde_json::from_str::<serde_json::Value>(text).map(SearchValue::from)
	})
}

/// Stringifier backed by `serde_json`.
pub fn default_stringify_search() -> SearchStringifier {
	stringify_search_with(|value: &SearchValue| value.to_json().to_string())
}

/// Parses `search` with the default JSON-aware parser.
pub fn parse_search(search: &str) -> SearchValue {
	default_parse_search()(search)
}

/// Serializes `search` with the default JSON-aware stringifier.
pub fn stringify_search(search: &SearchValue) -> String {
	default_stringify_search()(search)
}
