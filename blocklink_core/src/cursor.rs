use serde::Deserialize;
use serde::Serialize;

use crate::focus::FocusPath;
use crate::markup::NodeKind;
use crate::markup::SyntaxTree;
use crate::markup::parse_markup;
use crate::position::Point;
use crate::position::Span;

/// A `block.class` or bare `class` token split into its parts.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ClassReference {
	/// Alias of the referenced block when the token is `alias.class`. `None`
	/// for tokens that name a class of the file's own block.
	pub referenced_block: Option<String>,
	pub class_name: String,
}

impl ClassReference {
	/// Split a raw token on `.`: `alias.name` refers into a referenced
	/// block, a bare `name` into the file's own block. Segments past the
	/// second are ignored.
	pub fn from_token(token: &str) -> Self {
		let mut segments = token.split('.');
		let first = segments.next().unwrap_or_default();
		match segments.next() {
			Some(second) => Self {
				referenced_block: Some(first.to_string()),
				class_name: second.to_string(),
			},
			None => Self {
				referenced_block: None,
				class_name: first.to_string(),
			},
		}
	}
}

/// What the cursor sits on inside a template, from the point of view of
/// block-aware tooling.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub enum CursorContext {
	/// Inside a `class="..."` attribute value, on or beside one
	/// whitespace-delimited token.
	Class(ClassReference),
	/// Inside a `state="..."` attribute value. Carries the class references
	/// parsed from the sibling `class` attribute of the same element, in
	/// attribute order.
	State { sibling_classes: Vec<ClassReference> },
}

/// Parse template source and classify the cursor position.
///
/// Returns `None` for every position that is not inside the value of a
/// `class` or `state` attribute, including cursors on attribute names,
/// quotes, mustache values, and plain element content.
pub fn classify(source: &str, point: Point) -> Option<CursorContext> {
	let tree = parse_markup(source);
	classify_in_tree(&tree, point)
}

/// Classify a cursor position against an already parsed tree.
pub fn classify_in_tree(tree: &SyntaxTree, point: Point) -> Option<CursorContext> {
	let path = FocusPath::resolve(tree, point)?;
	let NodeKind::Attribute { name, .. } = &path.parent()?.kind else {
		return None;
	};

	if name == "state" {
		return Some(state_context(tree, &path));
	}

	if name == "class" {
		let NodeKind::Text { chars } = &path.node().kind else {
			return None;
		};
		let span = path.node().span?;
		let offset = offset_within(chars, span, point)?;
		return Some(CursorContext::Class(token_at(chars, offset)));
	}

	None
}

/// Build the state context from the focused path: collect class references
/// from the first `class` attribute on the enclosing element. An element
/// without a literal class list yields an empty reference list.
fn state_context(tree: &SyntaxTree, path: &FocusPath<'_>) -> CursorContext {
	let ids = path.ids();
	let mut sibling_classes = Vec::new();

	if ids.len() >= 3 {
		let element_id = ids[ids.len() - 3];
		if let NodeKind::Element { attributes, .. } = &tree.node(element_id).kind {
			for attr_id in attributes {
				let NodeKind::Attribute { name, value } = &tree.node(*attr_id).kind else {
					continue;
				};
				if name != "class" {
					continue;
				}
				if let Some(value_id) = value {
					if let NodeKind::Text { chars } = &tree.node(*value_id).kind {
						sibling_classes = chars
							.split_whitespace()
							.map(ClassReference::from_token)
							.collect();
					}
				}
				break;
			}
		}
	}

	CursorContext::State { sibling_classes }
}

/// Byte offset of `point` within a text node's chars, derived from the
/// node's span. Returns `None` when the offset falls outside the text or
/// off a char boundary.
fn offset_within(chars: &str, span: Span, point: Point) -> Option<usize> {
	let offset = if point.line == span.start.line {
		point.column.checked_sub(span.start.column)?
	} else {
		let skip_lines = point.line.checked_sub(span.start.line)?;
		let mut offset = 0usize;
		let mut lines = chars.split_inclusive('\n');
		for _ in 0..skip_lines {
			offset += lines.next()?.len();
		}
		offset + point.column
	};

	(offset <= chars.len() && chars.is_char_boundary(offset)).then_some(offset)
}

/// The whitespace-delimited token around a byte offset. The backward half
/// runs to the previous whitespace, the forward half to the next; a cursor
/// on whitespace yields only the adjacent half, and a cursor between two
/// spaces yields the empty token.
fn token_at(chars: &str, offset: usize) -> ClassReference {
	let prefix = chars[..offset]
		.rsplit(char::is_whitespace)
		.next()
		.unwrap_or_default();
	let suffix = chars[offset..]
		.split(char::is_whitespace)
		.next()
		.unwrap_or_default();
	let token = format!("{prefix}{suffix}");

	ClassReference::from_token(&token)
}
