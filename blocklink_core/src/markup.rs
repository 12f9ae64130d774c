use std::ops::Range;

use logos::Logos;
use serde::Deserialize;
use serde::Serialize;

use crate::position::LineIndex;
use crate::position::Span;

/// Raw tokens produced by logos for flat tokenization of template source.
/// Context-dependent meaning (text vs tag vs attribute value) is resolved by
/// the tree builder below.
#[derive(Clone, Debug, Logos, PartialEq)]
enum RawToken {
	#[token("<!--")]
	CommentOpen,
	#[token("-->")]
	CommentClose,
	#[token("</")]
	EndTagOpen,
	#[token("<")]
	TagOpen,
	#[token("/>")]
	SelfClose,
	#[token(">")]
	TagClose,
	#[token("=")]
	Equals,
	#[token("{{")]
	MustacheOpen,
	#[token("}}")]
	MustacheClose,
	#[token("\"")]
	DoubleQuote,
	#[token("'")]
	SingleQuote,
	#[regex(r"[A-Za-z][A-Za-z0-9_\-:.@]*")]
	Ident,
	#[regex(r"[ \t\r\n]+")]
	Whitespace,
	#[regex(r".", priority = 0)]
	Other,
}

/// Elements that never take a closing tag.
const VOID_TAGS: [&str; 14] = [
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

fn is_void_tag(tag: &str) -> bool {
	VOID_TAGS.iter().any(|void| tag.eq_ignore_ascii_case(void))
}

/// Index of a node within its [`SyntaxTree`] arena. Ids double as the
/// identity keys used by position resolution to guard against re-visiting.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	pub fn index(self) -> usize {
		self.0
	}
}

/// A single node in the syntax tree.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SyntaxNode {
	pub kind: NodeKind,
	/// Present on every parser-produced node. Nodes without a span are
	/// transparent to position resolution: their children are searched but
	/// the node itself is never part of a focus path.
	pub span: Option<Span>,
}

/// The node variants of the template grammar.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub enum NodeKind {
	/// The document root. Its span covers the whole source text.
	Template { body: Vec<NodeId> },
	/// An element. Attribute nodes are listed before child nodes, matching
	/// the field declaration order used for traversal.
	Element {
		tag: String,
		attributes: Vec<NodeId>,
		children: Vec<NodeId>,
		self_closing: bool,
	},
	/// A `name` or `name=value` attribute. The value is a `Text`, `Concat`,
	/// or `Mustache` node; bare attributes carry none.
	Attribute { name: String, value: Option<NodeId> },
	/// A literal text run. For quoted attribute values the span covers the
	/// region between the quotes, so a cursor immediately after the opening
	/// quote or immediately before the closing quote is inside the value.
	Text { chars: String },
	/// A quoted attribute value mixing literal text and mustaches.
	Concat { parts: Vec<NodeId> },
	/// A `{{...}}` expression, kept as a leaf with its inner text verbatim.
	Mustache { path: String },
	/// An HTML comment.
	Comment,
}

/// An arena-backed syntax tree for one template source.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SyntaxTree {
	pub(crate) nodes: Vec<SyntaxNode>,
	pub(crate) root: NodeId,
}

impl SyntaxTree {
	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn node(&self, id: NodeId) -> &SyntaxNode {
		&self.nodes[id.0]
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Child ids of a node in declaration order. For elements this is the
	/// attribute list followed by the child list.
	pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
		match &self.node(id).kind {
			NodeKind::Template { body } => body.clone(),
			NodeKind::Element {
				attributes,
				children,
				..
			} => attributes.iter().chain(children.iter()).copied().collect(),
			NodeKind::Attribute { value, .. } => value.iter().copied().collect(),
			NodeKind::Concat { parts } => parts.clone(),
			NodeKind::Text { .. } | NodeKind::Mustache { .. } | NodeKind::Comment => Vec::new(),
		}
	}
}

/// Parse template source into a syntax tree.
///
/// Parsing is total: malformed input degrades instead of failing. Unclosed
/// elements extend to the end of the enclosing construct, stray close tags
/// are dropped, and a `<` that does not open a tag is treated as text.
pub fn parse_markup(source: &str) -> SyntaxTree {
	TreeBuilder::new(source).build()
}

/// How an element's opening tag ended.
enum TagEnding {
	/// `/>` was consumed; byte offset one past it.
	SelfClosed(usize),
	/// `>` was consumed; byte offset one past it.
	Opened(usize),
	/// The source ended inside the tag.
	Eof(usize),
}

/// Walks the raw token stream and builds the node arena.
struct TreeBuilder<'src> {
	source: &'src str,
	raw_tokens: Vec<(Result<RawToken, ()>, Range<usize>)>,
	cursor: usize,
	line_index: LineIndex,
	nodes: Vec<SyntaxNode>,
}

impl<'src> TreeBuilder<'src> {
	fn new(source: &'src str) -> Self {
		let raw_tokens: Vec<_> = RawToken::lexer(source).spanned().collect();

		Self {
			source,
			raw_tokens,
			cursor: 0,
			line_index: LineIndex::new(source),
			nodes: Vec::new(),
		}
	}

	fn build(mut self) -> SyntaxTree {
		let root = self.alloc(NodeKind::Template { body: Vec::new() }, None);
		let mut stack = Vec::new();
		let body = self.parse_nodes(&mut stack);

		let span = self.span(0, self.source.len());
		let node = &mut self.nodes[root.0];
		node.span = Some(span);
		if let NodeKind::Template { body: slot } = &mut node.kind {
			*slot = body;
		}

		SyntaxTree {
			nodes: self.nodes,
			root,
		}
	}

	fn alloc(&mut self, kind: NodeKind, span: Option<Span>) -> NodeId {
		self.nodes.push(SyntaxNode { kind, span });
		NodeId(self.nodes.len() - 1)
	}

	fn alloc_text(&mut self, start: usize, end: usize) -> NodeId {
		let chars = self.source[start..end].to_string();
		let span = self.span(start, end);
		self.alloc(NodeKind::Text { chars }, Some(span))
	}

	fn span(&self, start: usize, end: usize) -> Span {
		self.line_index.span_at(start, end)
	}

	fn peek_at(&self, ahead: usize) -> Option<RawToken> {
		self.raw_tokens
			.get(self.cursor + ahead)
			.map(|(token, _)| token.clone().unwrap_or(RawToken::Other))
	}

	fn peek(&self) -> Option<RawToken> {
		self.peek_at(0)
	}

	/// Byte range of the current token; collapses to `len..len` at the end
	/// of input.
	fn current_range(&self) -> Range<usize> {
		self.raw_tokens
			.get(self.cursor)
			.map_or(self.source.len()..self.source.len(), |(_, range)| {
				range.clone()
			})
	}

	/// Byte offset where the current token starts.
	fn offset(&self) -> usize {
		self.current_range().start
	}

	/// Byte offset one past the most recently consumed token.
	fn previous_end(&self) -> usize {
		if self.cursor == 0 {
			0
		} else {
			self.raw_tokens[self.cursor - 1].1.end
		}
	}

	fn advance(&mut self) {
		self.cursor += 1;
	}

	/// Parse content nodes until the end of input or a close tag matching an
	/// enclosing element. The matching close tag is left unconsumed for the
	/// element that owns it.
	fn parse_nodes(&mut self, stack: &mut Vec<String>) -> Vec<NodeId> {
		let mut body = Vec::new();

		loop {
			let Some(token) = self.peek() else {
				break;
			};

			match token {
				RawToken::CommentOpen => {
					let id = self.parse_comment();
					body.push(id);
				}
				RawToken::TagOpen if self.peek_at(1) == Some(RawToken::Ident) => {
					let id = self.parse_element(stack);
					body.push(id);
				}
				RawToken::EndTagOpen => {
					if self.end_tag_matches_enclosing(stack) {
						break;
					}
					self.skip_stray_end_tag();
				}
				RawToken::MustacheOpen => {
					let id = self.parse_mustache();
					body.push(id);
				}
				_ => {
					let id = self.parse_text_run();
					body.push(id);
				}
			}
		}

		body
	}

	/// Whether the cursor sits on a `</name` whose name matches any element
	/// currently being parsed.
	fn end_tag_matches_enclosing(&self, stack: &[String]) -> bool {
		if self.peek_at(1) != Some(RawToken::Ident) {
			return false;
		}
		let Some((_, range)) = self.raw_tokens.get(self.cursor + 1) else {
			return false;
		};
		let name = &self.source[range.clone()];
		stack.iter().any(|tag| tag == name)
	}

	/// Drop a close tag that matches no open element.
	fn skip_stray_end_tag(&mut self) {
		self.advance();
		while let Some(token) = self.peek() {
			match token {
				RawToken::TagClose => {
					self.advance();
					return;
				}
				RawToken::TagOpen
				| RawToken::EndTagOpen
				| RawToken::CommentOpen
				| RawToken::MustacheOpen => return,
				_ => self.advance(),
			}
		}
	}

	/// Collect a contiguous run of tokens that belong to text content.
	fn parse_text_run(&mut self) -> NodeId {
		let start = self.offset();
		self.advance();

		while let Some(token) = self.peek() {
			let breaks = match token {
				RawToken::CommentOpen | RawToken::EndTagOpen | RawToken::MustacheOpen => true,
				RawToken::TagOpen => self.peek_at(1) == Some(RawToken::Ident),
				_ => false,
			};
			if breaks {
				break;
			}
			self.advance();
		}

		let end = self.previous_end();
		self.alloc_text(start, end)
	}

	fn parse_comment(&mut self) -> NodeId {
		let start = self.offset();
		self.advance();

		let mut end = self.source.len();
		while let Some(token) = self.peek() {
			if token == RawToken::CommentClose {
				end = self.current_range().end;
				self.advance();
				break;
			}
			self.advance();
		}

		let span = self.span(start, end);
		self.alloc(NodeKind::Comment, Some(span))
	}

	fn parse_mustache(&mut self) -> NodeId {
		let open_range = self.current_range();
		let start = open_range.start;
		let inner_start = open_range.end;
		self.advance();

		let mut inner_end = self.source.len();
		let mut end = self.source.len();
		while let Some(token) = self.peek() {
			if token == RawToken::MustacheClose {
				let range = self.current_range();
				inner_end = range.start;
				end = range.end;
				self.advance();
				break;
			}
			self.advance();
		}

		let path = self.source[inner_start..inner_end].trim().to_string();
		let span = self.span(start, end);
		self.alloc(NodeKind::Mustache { path }, Some(span))
	}

	/// Consume a mustache without recording a node, for positions where the
	/// grammar has no slot for it (for example a dynamic attribute splat).
	fn skip_mustache(&mut self) {
		self.advance();
		while let Some(token) = self.peek() {
			self.advance();
			if token == RawToken::MustacheClose {
				return;
			}
		}
	}

	fn parse_element(&mut self, stack: &mut Vec<String>) -> NodeId {
		let start = self.offset();
		self.advance();

		let tag_range = self.current_range();
		let tag = self.source[tag_range].to_string();
		self.advance();

		let id = self.alloc(
			NodeKind::Element {
				tag: tag.clone(),
				attributes: Vec::new(),
				children: Vec::new(),
				self_closing: false,
			},
			None,
		);

		let (attributes, ending) = self.parse_attributes();

		let mut children = Vec::new();
		let mut self_closing = false;
		let end = match ending {
			TagEnding::SelfClosed(end) => {
				self_closing = true;
				end
			}
			TagEnding::Eof(end) => end,
			TagEnding::Opened(end) => {
				if is_void_tag(&tag) {
					end
				} else {
					stack.push(tag.clone());
					children = self.parse_nodes(stack);
					stack.pop();
					self.consume_end_tag(&tag)
				}
			}
		};

		let span = self.span(start, end);
		let node = &mut self.nodes[id.0];
		node.span = Some(span);
		if let NodeKind::Element {
			attributes: attr_slot,
			children: child_slot,
			self_closing: closing_slot,
			..
		} = &mut node.kind
		{
			*attr_slot = attributes;
			*child_slot = children;
			*closing_slot = self_closing;
		}

		id
	}

	/// Consume `</tag ... >` when the pending close tag belongs to `tag`,
	/// returning the element's end offset. When it belongs to an outer
	/// element (or the source ended) the element auto-closes where its
	/// content stopped.
	fn consume_end_tag(&mut self, tag: &str) -> usize {
		if self.peek() == Some(RawToken::EndTagOpen) && self.peek_at(1) == Some(RawToken::Ident) {
			if let Some((_, range)) = self.raw_tokens.get(self.cursor + 1) {
				if &self.source[range.clone()] == tag {
					self.advance();
					self.advance();
					if self.peek() == Some(RawToken::Whitespace) {
						self.advance();
					}
					if self.peek() == Some(RawToken::TagClose) {
						let end = self.current_range().end;
						self.advance();
						return end;
					}
					return self.offset();
				}
			}
		}

		self.offset()
	}

	fn parse_attributes(&mut self) -> (Vec<NodeId>, TagEnding) {
		let mut attributes = Vec::new();

		loop {
			match self.peek() {
				None => return (attributes, TagEnding::Eof(self.source.len())),
				Some(RawToken::Whitespace) => self.advance(),
				Some(RawToken::SelfClose) => {
					let end = self.current_range().end;
					self.advance();
					return (attributes, TagEnding::SelfClosed(end));
				}
				Some(RawToken::TagClose) => {
					let end = self.current_range().end;
					self.advance();
					return (attributes, TagEnding::Opened(end));
				}
				Some(RawToken::Ident) => {
					let id = self.parse_attribute();
					attributes.push(id);
				}
				Some(RawToken::MustacheOpen) => self.skip_mustache(),
				Some(_) => self.advance(),
			}
		}
	}

	fn parse_attribute(&mut self) -> NodeId {
		let name_range = self.current_range();
		let name = self.source[name_range.clone()].to_string();
		let attr_start = name_range.start;
		let mut attr_end = name_range.end;
		self.advance();

		while self.peek() == Some(RawToken::Whitespace) {
			self.advance();
		}

		let mut value = None;
		if self.peek() == Some(RawToken::Equals) {
			self.advance();
			while self.peek() == Some(RawToken::Whitespace) {
				self.advance();
			}

			match self.peek() {
				Some(quote @ (RawToken::DoubleQuote | RawToken::SingleQuote)) => {
					value = Some(self.parse_quoted_value(&quote));
					attr_end = self.previous_end();
				}
				Some(RawToken::MustacheOpen) => {
					value = Some(self.parse_mustache());
					attr_end = self.previous_end();
				}
				Some(RawToken::Ident | RawToken::Other) => {
					value = Some(self.parse_unquoted_value());
					attr_end = self.previous_end();
				}
				_ => {}
			}
		}

		let span = self.span(attr_start, attr_end);
		self.alloc(NodeKind::Attribute { name, value }, Some(span))
	}

	fn parse_quoted_value(&mut self, quote: &RawToken) -> NodeId {
		let open_range = self.current_range();
		let inner_start = open_range.end;
		self.advance();

		enum Piece {
			Text(usize, usize),
			Mustache(NodeId),
		}

		let mut pieces: Vec<Piece> = Vec::new();
		let mut saw_mustache = false;
		let inner_end;

		loop {
			match self.peek() {
				None => {
					inner_end = self.source.len();
					break;
				}
				Some(token) if token == *quote => {
					inner_end = self.current_range().start;
					self.advance();
					break;
				}
				Some(RawToken::MustacheOpen) => {
					saw_mustache = true;
					let id = self.parse_mustache();
					pieces.push(Piece::Mustache(id));
				}
				Some(_) => {
					let range = self.current_range();
					self.advance();
					match pieces.last_mut() {
						Some(Piece::Text(_, end)) => *end = range.end,
						_ => pieces.push(Piece::Text(range.start, range.end)),
					}
				}
			}
		}

		if saw_mustache {
			let parts = pieces
				.into_iter()
				.map(|piece| {
					match piece {
						Piece::Text(start, end) => self.alloc_text(start, end),
						Piece::Mustache(id) => id,
					}
				})
				.collect();
			let span = self.span(inner_start, inner_end);
			self.alloc(NodeKind::Concat { parts }, Some(span))
		} else {
			self.alloc_text(inner_start, inner_end)
		}
	}

	fn parse_unquoted_value(&mut self) -> NodeId {
		let start = self.offset();
		self.advance();

		while matches!(self.peek(), Some(RawToken::Ident | RawToken::Other)) {
			self.advance();
		}

		let end = self.previous_end();
		self.alloc_text(start, end)
	}
}
