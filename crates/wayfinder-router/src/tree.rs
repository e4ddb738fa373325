//! Route tree construction and pathname matching.
//!
//! [`RouteTree::build`] walks a declared [`Route`] tree once and produces an
//! immutable arena of [`RouteNode`]s. Ids, paths and full paths are derived
//! from tree position, sibling lists are sorted by specificity, and the
//! declaration is validated (duplicate ids, routes added under the wrong
//! parent, pathless routes without an id).

use std::collections::HashMap;

use wayfinder_urls::{
	FUZZY_REMAINDER_PARAM, MatchOptions, PathParams, join_paths, match_pathname, specificity_score,
	trim_path, trim_path_right,
};

use crate::error::ConfigError;
use crate::route::Route;

/// Id of the root route.
pub const ROOT_ROUTE_ID: &str = "__root__";

/// One route of a built tree.
#[derive(Debug, Clone)]
pub struct RouteNode {
	pub route: Route,
	/// Derived from the ancestry: `/posts/$postId`, or [`ROOT_ROUTE_ID`].
	pub id: String,
	/// The route's own template, trimmed. Empty for pathless routes, `/`
	/// for the root and for index routes.
	pub path: String,
	/// Template including every ancestor path, trailing slash trimmed.
	pub full_path: String,
	pub parent: Option<usize>,
	/// Children in matching order.
	pub children: Vec<usize>,
	/// Position among the declared siblings.
	pub original_index: usize,
	pub depth: usize,
}

impl RouteNode {
	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}

	pub fn is_pathless(&self) -> bool {
		!self.is_root() && self.path.is_empty()
	}
}

/// Result of matching a pathname against the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeMatch {
	/// Node indices from the root to the deepest matched route.
	pub chain: Vec<usize>,
	/// Raw params captured by the deepest route.
	pub params: PathParams,
}

/// Immutable arena of routes.
#[derive(Debug, Clone)]
pub struct RouteTree {
	nodes: Vec<RouteNode>,
	by_id: HashMap<String, usize>,
	by_path: HashMap<String, usize>,
}

impl RouteTree {
	/// Builds the tree rooted at `root`.
	pub fn build(root: &Route) -> Result<Self, ConfigError> {
		if !root.is_root() {
			return Err(ConfigError::NotRoot(root.label()));
		}

		let mut tree = Self {
			nodes: Vec::new(),
			by_id: HashMap::new(),
			by_path: HashMap::new(),
		};
		tree.add_node(root, None, 0)?;

		tracing::debug!(routes = tree.nodes.len(), "built route tree");
		Ok(tree)
	}

	fn add_node(
		&mut self,
		route: &Route,
		parent: Option<usize>,
		original_index: usize,
	) -> Result<usize, ConfigError> {
		if route.children_assigned() > 1 {
			return Err(ConfigError::ChildrenAlreadySet(route.label()));
		}
		if parent.is_some() && route.has_dangling_parent() {
			return Err(ConfigError::MissingParent(route.label()));
		}

		let (id, path, full_path, depth) = match parent {
			None => (ROOT_ROUTE_ID.to_string(), "/".to_string(), "/".to_string(), 0),
			Some(parent_index) => self.derive_identity(route, parent_index)?,
		};

		if self.by_id.contains_key(&id) {
			return Err(ConfigError::DuplicateRouteId(id));
		}

		let index = self.nodes.len();
		self.by_id.insert(id.clone(), index);
		let is_index_route = path == "/";
		if !self.by_path.contains_key(&full_path) || is_index_route {
			self.by_path.insert(full_path.clone(), index);
		}
		self.nodes.push(RouteNode {
			route: route.clone(),
			id,
			path,
			full_path,
			parent,
			children: Vec::new(),
			original_index,
			depth,
		});

		let mut children = Vec::new();
		for (position, child) in route.children().iter().enumerate() {
			match child.parent() {
				Some(declared) if Route::ptr_eq(&declared, route) => {}
				Some(declared) => {
					return Err(ConfigError::ParentMismatch {
						child: child.label(),
						declared: declared.label(),
						actual: self.nodes[index].id.clone(),
					});
				}
				None if child.is_root() => {
					return Err(ConfigError::ParentMismatch {
						child: child.label(),
						declared: ROOT_ROUTE_ID.to_string(),
						actual: self.nodes[index].id.clone(),
					});
				}
				None => return Err(ConfigError::MissingParent(child.label())),
			}
			children.push(self.add_node(child, Some(index), position)?);
		}

		children.sort_by(|&a, &b| {
			let (a, b) = (&self.nodes[a], &self.nodes[b]);
			specificity_score(&a.path)
				.total_cmp(&specificity_score(&b.path))
				.then(a.original_index.cmp(&b.original_index))
		});
		self.nodes[index].children = children;

		Ok(index)
	}

	fn derive_identity(
		&self,
		route: &Route,
		parent_index: usize,
	) -> Result<(String, String, String, usize), ConfigError> {
		let parent = &self.nodes[parent_index];
		let options = route.options();

		let path = match options.path.as_deref() {
			Some("/") => "/".to_string(),
			Some(path) => trim_path(path),
			None => String::new(),
		};
		let custom_id = match (options.id.as_deref(), path.as_str()) {
			(Some(id), _) => id.to_string(),
			(None, "") => return Err(ConfigError::MissingIdentity(parent.id.clone())),
			(None, path) => path.to_string(),
		};

		let parent_id = if parent.is_root() { "" } else { parent.id.as_str() };
		let id = join_paths(["/", parent_id, custom_id.as_str()]);
		let full_path = trim_path_right(&join_paths([parent.full_path.as_str(), path.as_str()]));
		let full_path = if full_path.is_empty() { "/".to_string() } else { full_path };

		Ok((id, path, full_path, parent.depth + 1))
	}

	pub fn root(&self) -> &RouteNode {
		&self.nodes[0]
	}

	pub fn node(&self, index: usize) -> &RouteNode {
		&self.nodes[index]
	}

	pub fn get(&self, id: &str) -> Option<&RouteNode> {
		self.by_id.get(id).map(|&index| &self.nodes[index])
	}

	pub fn index_of(&self, id: &str) -> Option<usize> {
		self.by_id.get(id).copied()
	}

	/// Looks a route up by full path. Index routes win over the layout
	/// route sharing their full path.
	pub fn get_by_path(&self, full_path: &str) -> Option<&RouteNode> {
		self.by_path
			.get(&trim_path_right(full_path))
			.map(|&index| &self.nodes[index])
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &RouteNode> {
		self.nodes.iter()
	}

	/// Indices from the root down to `index`.
	pub fn ancestry(&self, index: usize) -> Vec<usize> {
		let mut chain = vec![index];
		let mut current = index;
		while let Some(parent) = self.nodes[current].parent {
			chain.push(parent);
			current = parent;
		}
		chain.reverse();
		chain
	}

	/// Finds the route chain for `pathname`.
	///
	/// Siblings are tried in specificity order and the first match wins.
	/// Pathless routes delegate to their children. Routes with children
	/// match fuzzily and try their children first, falling back to an exact
	/// match of their own. The root only ever matches through its children,
	/// so `None` means no route claims the pathname.
	pub fn match_pathname(
		&self,
		basepath: &str,
		pathname: &str,
		case_sensitive: bool,
	) -> Option<TreeMatch> {
		let pathname = trim_path_right(pathname);
		let mut chain = vec![0];
		let params = self.match_children(0, basepath, &pathname, case_sensitive, &mut chain)?;
		Some(TreeMatch { chain, params })
	}

	fn match_children(
		&self,
		index: usize,
		basepath: &str,
		pathname: &str,
		case_sensitive: bool,
		chain: &mut Vec<usize>,
	) -> Option<PathParams> {
		for &child_index in &self.nodes[index].children {
			let child = &self.nodes[child_index];
			let options = MatchOptions::exact()
				.case_sensitive(child.route.options().case_sensitive.unwrap_or(case_sensitive));

			chain.push(child_index);

			if child.is_pathless() {
				if let Some(params) =
					self.match_children(child_index, basepath, pathname, case_sensitive, chain)
				{
					return Some(params);
				}
			} else if child.children.is_empty() {
				if let Some(params) =
					match_pathname(basepath, pathname, &child.full_path, options)
				{
					return Some(params);
				}
			} else {
				let fuzzy = MatchOptions {
					fuzzy: true,
					..options
				};
				if match_pathname(basepath, pathname, &child.full_path, fuzzy).is_some() {
					if let Some(params) =
						self.match_children(child_index, basepath, pathname, case_sensitive, chain)
					{
						return Some(params);
					}
					if let Some(mut params) =
						match_pathname(basepath, pathname, &child.full_path, options)
					{
						params.remove(FUZZY_REMAINDER_PARAM);
						return Some(params);
					}
				}
			}

			chain.pop();
		}
		None
	}
}
