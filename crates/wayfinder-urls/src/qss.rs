//! Raw query-string codec.
//!
//! `encode` writes `key=value` pairs joined by `&`, repeating the key for
//! array values. `decode` reverses it, collecting repeated keys into arrays
//! and coercing scalar strings with [`to_value`].

use std::rc::Rc;

use wayfinder_core::{SearchMap, SearchValue, format_number};

/// Encodes an object into a query string without the leading `?`.
pub fn encode(object: &SearchMap) -> String {
	let mut pairs = Vec::new();
	for (key, value) in object {
		let key = urlencoding::encode(key);
		match value {
			SearchValue::Array(items) => {
				for item in items.iter() {
					pairs.push(format!("{key}={}", urlencoding::encode(&scalar_text(item))));
				}
			}
			other => pairs.push(format!("{key}={}", urlencoding::encode(&scalar_text(other)))),
		}
	}
	pairs.join("&")
}

fn scalar_text(value: &SearchValue) -> String {
	match value {
		SearchValue::Null => "null".to_string(),
		SearchValue::Bool(value) => value.to_string(),
		SearchValue::Number(value) => format_number(*value),
		SearchValue::String(value) => value.to_string(),
		nested => nested.to_string(),
	}
}

/// Decodes a query string (without the leading `?`) into an object.
pub fn decode(query: &str) -> SearchMap {
	let mut out = SearchMap::new();
	for pair in query.split('&').filter(|pair| !pair.is_empty()) {
		let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
		let key = decode_component(raw_key);
		let value = to_value(raw_value);

		match out.get_mut(&key) {
			Some(SearchValue::Array(items)) => Rc::make_mut(items).push(value),
			Some(existing) => {
				let first = std::mem::take(existing);
				*existing = SearchValue::from(vec![first, value]);
			}
			None => {
				out.insert(key, value);
			}
		}
	}
	out
}

fn decode_component(raw: &str) -> String {
	urlencoding::decode(raw)
		.map(|decoded| decoded.into_owned())
		.unwrap_or_else(|_| raw.to_string())
}

/// Coerces one raw (still percent-encoded) query value.
///
/// `true`/`false` become booleans. A string becomes a number only when the
/// number prints back to the exact same text, so `007` and `1.50` stay
/// strings.
pub fn to_value(raw: &str) -> SearchValue {
	if raw.is_empty() {
		return SearchValue::from("");
	}

	let text = decode_component(raw);
	match text.as_str() {
		"true" => return SearchValue::Bool(true),
		"false" => return SearchValue::Bool(false),
		_ => {}
	}

	match text.parse::<f64>() {
		Ok(number) if number.is_finite() && format_number(number) == text => {
			SearchValue::Number(number)
		}
		_ => SearchValue::from(text),
	}
}
