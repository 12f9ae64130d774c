use std::collections::HashSet;

use crate::markup::NodeId;
use crate::markup::SyntaxNode;
use crate::markup::SyntaxTree;
use crate::position::Point;

/// The chain of nodes from the tree root down to the node under a cursor,
/// ordered root first. The final id is the focused node; the ids before it
/// are its ancestors.
#[derive(Clone, Debug)]
pub struct FocusPath<'tree> {
	tree: &'tree SyntaxTree,
	ids: Vec<NodeId>,
}

impl<'tree> FocusPath<'tree> {
	/// Resolve the node path for a cursor position.
	///
	/// Descent is depth-first over each node's children in declaration
	/// order, committing to the first child whose span contains the point.
	/// Span containment is inclusive at both ends, so a cursor sitting on a
	/// boundary shared by two siblings resolves into the earlier one.
	/// Subtrees whose root span does not contain the point are never
	/// entered. Nodes without a span are transparent: their children are
	/// searched but the node itself never appears on the path.
	///
	/// Returns `None` when the point is outside every spanned node.
	pub fn resolve(tree: &'tree SyntaxTree, point: Point) -> Option<Self> {
		let mut seen = HashSet::new();
		let mut ids = Vec::new();

		if visit(tree, tree.root(), point, &mut seen, &mut ids) && !ids.is_empty() {
			Some(Self { tree, ids })
		} else {
			None
		}
	}

	/// The focused node's id.
	pub fn node_id(&self) -> NodeId {
		self.ids[self.ids.len() - 1]
	}

	/// The focused node.
	pub fn node(&self) -> &'tree SyntaxNode {
		self.tree.node(self.node_id())
	}

	/// Id of the focused node's nearest spanned ancestor.
	pub fn parent_id(&self) -> Option<NodeId> {
		(self.ids.len() >= 2).then(|| self.ids[self.ids.len() - 2])
	}

	pub fn parent(&self) -> Option<&'tree SyntaxNode> {
		self.parent_id().map(|id| self.tree.node(id))
	}

	/// The path with its focused node removed, or `None` when the path
	/// holds only the root.
	pub fn parent_path(&self) -> Option<Self> {
		if self.ids.len() < 2 {
			return None;
		}
		let mut ids = self.ids.clone();
		ids.pop();
		Some(Self {
			tree: self.tree,
			ids,
		})
	}

	pub fn ids(&self) -> &[NodeId] {
		&self.ids
	}

	pub fn tree(&self) -> &'tree SyntaxTree {
		self.tree
	}
}

/// Returns true when the point landed in this subtree. A node already seen
/// counts as a miss; the check happens before any span test so a malformed
/// tree with a node cycle terminates instead of recursing forever.
fn visit(
	tree: &SyntaxTree,
	id: NodeId,
	point: Point,
	seen: &mut HashSet<NodeId>,
	ids: &mut Vec<NodeId>,
) -> bool {
	if !seen.insert(id) {
		return false;
	}

	let node = tree.node(id);
	match node.span {
		Some(span) => {
			if !span.contains(point) {
				return false;
			}
			ids.push(id);
			for child in tree.child_ids(id) {
				if visit(tree, child, point, seen, ids) {
					break;
				}
			}
			true
		}
		None => {
			for child in tree.child_ids(id) {
				if visit(tree, child, point, seen, ids) {
					return true;
				}
			}
			false
		}
	}
}
