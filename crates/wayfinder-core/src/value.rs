//! Structured search values with structural sharing.
//!
//! [`SearchValue`] models the JSON-like values carried in a location's search
//! string. Strings, arrays and objects are reference counted so two versions
//! of a search can share unchanged children, and [`SearchValue::ptr_eq`] can
//! tell whether they do.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Object entries, kept in insertion order.
pub type SearchMap = IndexMap<String, SearchValue>;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A JSON-like value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchValue {
	/// `null`.
	#[default]
	Null,
	/// `true` or `false`.
	Bool(bool),
	/// Any finite or non-finite number.
	Number(f64),
	/// A string.
	String(Rc<str>),
	/// An ordered list.
	Array(Rc<Vec<SearchValue>>),
	/// An insertion-ordered map.
	Object(Rc<SearchMap>),
}

impl SearchValue {
	/// An empty object.
	pub fn object() -> Self {
		Self::Object(Rc::new(SearchMap::new()))
	}

	/// Reference identity for containers and strings, value equality for scalars.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		match (a, b) {
			(Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
			(Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
			(Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b,
			_ => false,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn is_object(&self) -> bool {
		matches!(self, Self::Object(_))
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[SearchValue]> {
		match self {
			Self::Array(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&SearchMap> {
		match self {
			Self::Object(map) => Some(map),
			_ => None,
		}
	}

	/// Looks up `key` when this value is an object.
	pub fn get(&self, key: &str) -> Option<&SearchValue> {
		self.as_object().and_then(|map| map.get(key))
	}

	/// Shallow merge: keys of `other` override keys of `self`.
	///
	/// Non-object operands are treated as empty objects.
	pub fn merged(&self, other: &SearchValue) -> SearchValue {
		let mut map = self.as_object().cloned().unwrap_or_default();
		if let Some(overrides) = other.as_object() {
			for (key, value) in overrides {
				map.insert(key.clone(), value.clone());
			}
		}
		Self::Object(Rc::new(map))
	}

	/// Returns a copy of this object with `key` set to `value`.
	pub fn with(&self, key: impl Into<String>, value: impl Into<SearchValue>) -> SearchValue {
		let mut map = self.as_object().cloned().unwrap_or_default();
		map.insert(key.into(), value.into());
		Self::Object(Rc::new(map))
	}

	/// Returns a copy of this object without `key`.
	pub fn without(&self, key: &str) -> SearchValue {
		let mut map = self.as_object().cloned().unwrap_or_default();
		map.shift_remove(key);
		Self::Object(Rc::new(map))
	}

	/// Converts to a `serde_json::Value`. Non-finite numbers become `null`.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Self::Null => serde_json::Value::Null,
			Self::Bool(value) => serde_json::Value::Bool(*value),
			Self::Number(value) => number_to_json(*value),
			Self::String(value) => serde_json::Value::String(value.to_string()),
			Self::Array(items) => {
				serde_json::Value::Array(items.iter().map(Self::to_json).collect())
			}
			Self::Object(map) => serde_json::Value::Object(
				map.iter()
					.map(|(key, value)| (key.clone(), value.to_json()))
					.collect(),
			),
		}
	}
}

fn exact_integer(value: f64) -> Option<i64> {
	(value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER)
		.then_some(value as i64)
}

fn number_to_json(value: f64) -> serde_json::Value {
	if let Some(integer) = exact_integer(value) {
		return serde_json::Value::from(integer);
	}
	serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Formats a number the way query strings and JSON text expect.
///
/// Integral values print without a fractional part (`42`, not `42.0`).
pub fn format_number(value: f64) -> String {
	match exact_integer(value) {
		Some(integer) => integer.to_string(),
		None => value.to_string(),
	}
}

impl fmt::Display for SearchValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_json())
	}
}

impl From<serde_json::Value> for SearchValue {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(value) => Self::Bool(value),
			serde_json::Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
			serde_json::Value::String(value) => Self::String(Rc::from(value)),
			serde_json::Value::Array(items) => {
				Self::Array(Rc::new(items.into_iter().map(Self::from).collect()))
			}
			serde_json::Value::Object(map) => Self::Object(Rc::new(
				map.into_iter()
					.map(|(key, value)| (key, Self::from(value)))
					.collect(),
			)),
		}
	}
}

impl From<bool> for SearchValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for SearchValue {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<i32> for SearchValue {
	fn from(value: i32) -> Self {
		Self::Number(f64::from(value))
	}
}

impl From<i64> for SearchValue {
	fn from(value: i64) -> Self {
		Self::Number(value as f64)
	}
}

impl From<&str> for SearchValue {
	fn from(value: &str) -> Self {
		Self::String(Rc::from(value))
	}
}

impl From<String> for SearchValue {
	fn from(value: String) -> Self {
		Self::String(Rc::from(value))
	}
}

impl<T: Into<SearchValue>> From<Option<T>> for SearchValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl From<Vec<SearchValue>> for SearchValue {
	fn from(items: Vec<SearchValue>) -> Self {
		Self::Array(Rc::new(items))
	}
}

impl From<SearchMap> for SearchValue {
	fn from(map: SearchMap) -> Self {
		Self::Object(Rc::new(map))
	}
}

impl<K: Into<String>, V: Into<SearchValue>, const N: usize> From<[(K, V); N]> for SearchValue {
	fn from(entries: [(K, V); N]) -> Self {
		entries.into_iter().collect()
	}
}

impl<K: Into<String>, V: Into<SearchValue>> FromIterator<(K, V)> for SearchValue {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::Object(Rc::new(
			iter.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		))
	}
}

impl Serialize for SearchValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Null => serializer.serialize_unit(),
			Self::Bool(value) => serializer.serialize_bool(*value),
			Self::Number(value) => match exact_integer(*value) {
				Some(integer) => serializer.serialize_i64(integer),
				None => serializer.serialize_f64(*value),
			},
			Self::String(value) => serializer.serialize_str(value),
			Self::Array(items) => serializer.collect_seq(items.iter()),
			Self::Object(map) => serializer.collect_map(map.iter()),
		}
	}
}

impl<'de> Deserialize<'de> for SearchValue {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		serde_json::Value::deserialize(deserializer).map(Self::from)
	}
}

/// Returns `next`, reusing every part of `prev` that is deep-equal to it.
///
/// When the whole value is deep-equal the result is `prev` itself, so
/// [`SearchValue::ptr_eq`] holds between them. Otherwise unchanged array items
/// and object entries keep `prev`'s allocations.
pub fn replace_equal_deep(prev: &SearchValue, next: &SearchValue) -> SearchValue {
	if SearchValue::ptr_eq(prev, next) {
		return prev.clone();
	}

	match (prev, next) {
		(SearchValue::Array(prev_items), SearchValue::Array(next_items)) => {
			let mut equal_items = 0;
			let copy: Vec<SearchValue> = next_items
				.iter()
				.enumerate()
				.map(|(index, item)| match prev_items.get(index) {
					Some(previous) => {
						let shared = replace_equal_deep(previous, item);
						if SearchValue::ptr_eq(&shared, previous) {
							equal_items += 1;
						}
						shared
					}
					None => item.clone(),
				})
				.collect();

			if prev_items.len() == next_items.len() && equal_items == prev_items.len() {
				prev.clone()
			} else {
				SearchValue::Array(Rc::new(copy))
			}
		}
		(SearchValue::Object(prev_map), SearchValue::Object(next_map)) => {
			let mut equal_items = 0;
			let copy: SearchMap = next_map
				.iter()
				.map(|(key, value)| {
					let shared = match prev_map.get(key) {
						Some(previous) => {
							let shared = replace_equal_deep(previous, value);
							if SearchValue::ptr_eq(&shared, previous) {
								equal_items += 1;
							}
							shared
						}
						None => value.clone(),
					};
					(key.clone(), shared)
				})
				.collect();

			if prev_map.len() == next_map.len() && equal_items == prev_map.len() {
				prev.clone()
			} else {
				SearchValue::Object(Rc::new(copy))
			}
		}
		(SearchValue::String(a), SearchValue::String(b)) if a == b => prev.clone(),
		_ => next.clone(),
	}
}

/// Returns `true` when every key of `b` is deep-equal in `a`.
///
/// Objects are compared partially, arrays element by element, scalars by value.
pub fn partial_deep_equal(a: &SearchValue, b: &SearchValue) -> bool {
	if SearchValue::ptr_eq(a, b) {
		return true;
	}

	match (a, b) {
		(SearchValue::Object(a), SearchValue::Object(b)) => b.iter().all(|(key, expected)| {
			a.get(key)
				.is_some_and(|actual| partial_deep_equal(actual, expected))
		}),
		(SearchValue::Array(a), SearchValue::Array(b)) => {
			a.len() == b.len()
				&& a.iter()
					.zip(b.iter())
					.all(|(actual, expected)| partial_deep_equal(actual, expected))
		}
		(SearchValue::String(a), SearchValue::String(b)) => a == b,
		_ => false,
	}
}
