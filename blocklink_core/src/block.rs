use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::iter;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use logos::Logos;
use serde::Deserialize;
use serde::Serialize;

use crate::cursor::ClassReference;
use crate::error::BlocklinkError;
use crate::error::BlocklinkResult;
use crate::pairing::is_block_path;
use crate::position::LineIndex;
use crate::position::Span;

/// Raw tokens for block stylesheet source. Strings and comments get their
/// own tokens so braces inside them never confuse rule skipping.
#[derive(Clone, Debug, Logos, PartialEq)]
enum BlockToken {
	#[token("/*")]
	CommentOpen,
	#[token("*/")]
	CommentClose,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token("[")]
	BracketOpen,
	#[token("]")]
	BracketClose,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token("|")]
	Pipe,
	#[token(";")]
	Semicolon,
	#[token(":")]
	Colon,
	#[token(",")]
	Comma,
	#[token("=")]
	Equals,
	#[token(".")]
	Dot,
	#[token("#")]
	Hash,
	#[token("*")]
	Star,
	#[token("@")]
	At,
	#[token(">")]
	Gt,
	#[token("+")]
	Plus,
	#[token("~")]
	Tilde,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuoted,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuoted,
	#[regex(r"-?[A-Za-z_][A-Za-z0-9_\-]*")]
	Ident,
	#[regex(r"[ \t\r\n]+")]
	Whitespace,
	#[regex(r".", priority = 0)]
	Other,
}

/// The block name for a file path: the file name with its block suffix
/// stripped. `nav.block.css` names the block `nav`.
pub fn block_name(path: &Path) -> String {
	let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
		return String::new();
	};
	if let Some(stem) = file_name
		.strip_suffix(".block.css")
		.or_else(|| file_name.strip_suffix(".block.scss"))
	{
		return stem.to_string();
	}

	path.file_stem()
		.and_then(OsStr::to_str)
		.unwrap_or(file_name)
		.to_string()
}

/// One attribute selector recorded on a class, identified by its
/// `namespace|name` pair. Attribute values do not distinguish entries.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct BlockAttribute {
	pub namespace: String,
	pub name: String,
}

impl fmt::Display for BlockAttribute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.namespace, self.name)
	}
}

/// A class declared in a block file, with the attributes seen on it across
/// all rules. The root class is the one selected by `:scope`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlockClass {
	pub name: String,
	pub is_root: bool,
	pub attributes: Vec<BlockAttribute>,
}

impl BlockClass {
	fn root(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			is_root: true,
			attributes: Vec::new(),
		}
	}

	fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			is_root: false,
			attributes: Vec::new(),
		}
	}

	fn add_attribute(&mut self, namespace: &str, name: &str) {
		let exists = self
			.attributes
			.iter()
			.any(|attribute| attribute.namespace == namespace && attribute.name == name);
		if !exists {
			self.attributes.push(BlockAttribute {
				namespace: namespace.to_string(),
				name: name.to_string(),
			});
		}
	}
}

/// An `@block <alias> from "<path>";` declaration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlockReference {
	pub alias: String,
	/// Target path exactly as written, relative to the declaring file.
	pub target: PathBuf,
	pub span: Span,
}

/// The declarations parsed out of one block file, before references are
/// resolved against the filesystem.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlockSource {
	pub root: BlockClass,
	pub classes: Vec<BlockClass>,
	pub references: Vec<BlockReference>,
}

/// Parse one block file in isolation. The first structural problem aborts
/// the parse and is reported with the span it was found at.
pub fn parse_block_source(path: &Path, source: &str) -> BlocklinkResult<BlockSource> {
	BlockParser::new(path, source).parse()
}

/// A compiled block: the declarations of one block file with its `@block`
/// references resolved to other compiled blocks.
#[derive(Clone, Debug)]
pub struct BlockModel {
	identifier: PathBuf,
	name: String,
	root: BlockClass,
	classes: Vec<BlockClass>,
	references: HashMap<String, Arc<BlockModel>>,
}

impl BlockModel {
	pub(crate) fn new(
		identifier: PathBuf,
		source: BlockSource,
		references: HashMap<String, Arc<BlockModel>>,
	) -> Self {
		let name = block_name(&identifier);

		Self {
			identifier,
			name,
			root: source.root,
			classes: source.classes,
			references,
		}
	}

	/// The path this block was compiled from.
	pub fn identifier(&self) -> &Path {
		&self.identifier
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn root_class(&self) -> &BlockClass {
		&self.root
	}

	/// All classes of this block, root first, then in declaration order.
	pub fn classes(&self) -> impl Iterator<Item = &BlockClass> {
		iter::once(&self.root).chain(self.classes.iter())
	}

	pub fn get_class(&self, name: &str) -> Option<&BlockClass> {
		self.classes().find(|class| class.name == name)
	}

	pub fn get_referenced_block(&self, alias: &str) -> Option<&Arc<BlockModel>> {
		self.references.get(alias)
	}

	/// Resolve a class reference against this block: aliased references go
	/// through the referenced block, bare ones name a class of this block.
	pub fn resolve(&self, reference: &ClassReference) -> BlocklinkResult<&BlockClass> {
		match &reference.referenced_block {
			Some(alias) => {
				let Some(referenced) = self.get_referenced_block(alias) else {
					return Err(BlocklinkError::UnknownReference {
						alias: alias.clone(),
						block: self.name.clone(),
					});
				};
				referenced
					.get_class(&reference.class_name)
					.ok_or_else(|| BlocklinkError::UnknownClass {
						class: reference.class_name.clone(),
						block: referenced.name().to_string(),
					})
			}
			None => {
				self.get_class(&reference.class_name)
					.ok_or_else(|| BlocklinkError::UnknownClass {
						class: reference.class_name.clone(),
						block: self.name.clone(),
					})
			}
		}
	}

	/// Resolve a raw `[alias.]class` token.
	pub fn lookup(&self, token: &str) -> BlocklinkResult<&BlockClass> {
		self.resolve(&ClassReference::from_token(token))
	}

	/// Whether compiling this block read `path`, directly or through its
	/// reference chain.
	pub fn depends_on(&self, path: &Path) -> bool {
		self.identifier == path
			|| self
				.references
				.values()
				.any(|referenced| referenced.depends_on(path))
	}
}

/// The part of a compound selector that attribute selectors attach to.
enum SelectorTarget {
	Root,
	Class(String),
}

/// Walks the raw token stream of one block file and records the classes,
/// attributes, and references it declares. Rule bodies are skipped; only
/// selectors and at-rules are modeled.
struct BlockParser<'src> {
	path: String,
	source: &'src str,
	raw_tokens: Vec<(Result<BlockToken, ()>, Range<usize>)>,
	cursor: usize,
	line_index: LineIndex,
	root: BlockClass,
	classes: Vec<BlockClass>,
	references: Vec<BlockReference>,
}

impl<'src> BlockParser<'src> {
	fn new(path: &Path, source: &'src str) -> Self {
		let raw_tokens: Vec<_> = BlockToken::lexer(source).spanned().collect();

		Self {
			path: path.display().to_string(),
			source,
			raw_tokens,
			cursor: 0,
			line_index: LineIndex::new(source),
			root: BlockClass::root(block_name(path)),
			classes: Vec::new(),
			references: Vec::new(),
		}
	}

	fn parse(mut self) -> BlocklinkResult<BlockSource> {
		loop {
			self.skip_trivia()?;
			let Some(token) = self.peek() else {
				break;
			};
			match token {
				BlockToken::At => self.parse_at_rule()?,
				_ => self.parse_rule()?,
			}
		}

		Ok(BlockSource {
			root: self.root,
			classes: self.classes,
			references: self.references,
		})
	}

	fn peek(&self) -> Option<BlockToken> {
		self.raw_tokens
			.get(self.cursor)
			.map(|(token, _)| token.clone().unwrap_or(BlockToken::Other))
	}

	fn current_range(&self) -> Range<usize> {
		self.raw_tokens
			.get(self.cursor)
			.map_or(self.source.len()..self.source.len(), |(_, range)| {
				range.clone()
			})
	}

	fn current_slice(&self) -> &'src str {
		&self.source[self.current_range()]
	}

	fn advance(&mut self) {
		self.cursor += 1;
	}

	fn syntax_error(&self, start: usize, end: usize, message: impl Into<String>) -> BlocklinkError {
		BlocklinkError::BlockSyntax {
			path: self.path.clone(),
			span: self.line_index.span_at(start, end),
			message: message.into(),
		}
	}

	fn error_at_current(&self, message: impl Into<String>) -> BlocklinkError {
		let range = self.current_range();
		self.syntax_error(range.start, range.end, message)
	}

	/// Skip whitespace and comments. An unterminated comment is an error
	/// anchored at its opening `/*`.
	fn skip_trivia(&mut self) -> BlocklinkResult<()> {
		loop {
			match self.peek() {
				Some(BlockToken::Whitespace) => self.advance(),
				Some(BlockToken::CommentOpen) => {
					let open = self.current_range();
					self.advance();
					loop {
						match self.peek() {
							Some(BlockToken::CommentClose) => {
								self.advance();
								break;
							}
							Some(_) => self.advance(),
							None => {
								return Err(self.syntax_error(
									open.start,
									open.end,
									"unterminated comment",
								));
							}
						}
					}
				}
				_ => return Ok(()),
			}
		}
	}

	fn parse_at_rule(&mut self) -> BlocklinkResult<()> {
		let at_range = self.current_range();
		self.advance();

		let name = match self.peek() {
			Some(BlockToken::Ident) => {
				let name = self.current_slice().to_string();
				self.advance();
				name
			}
			_ => {
				return Err(self.syntax_error(
					at_range.start,
					at_range.end,
					"expected at-rule name after `@`",
				));
			}
		};

		if name == "block" {
			self.parse_block_reference(at_range.start)
		} else {
			self.skip_at_rule()
		}
	}

	fn parse_block_reference(&mut self, start: usize) -> BlocklinkResult<()> {
		self.skip_trivia()?;
		let alias = match self.peek() {
			Some(BlockToken::Ident) => {
				let alias = self.current_slice().to_string();
				self.advance();
				alias
			}
			_ => return Err(self.error_at_current("expected reference alias after `@block`")),
		};

		self.skip_trivia()?;
		match self.peek() {
			Some(BlockToken::Ident) if self.current_slice() == "from" => self.advance(),
			_ => return Err(self.error_at_current("expected `from` after the reference alias")),
		}

		self.skip_trivia()?;
		let target_range = self.current_range();
		let raw = match self.peek() {
			Some(BlockToken::DoubleQuoted | BlockToken::SingleQuoted) => {
				let raw = self.current_slice().to_string();
				self.advance();
				raw
			}
			_ => return Err(self.error_at_current("expected a quoted path after `from`")),
		};
		let target = snailquote::unescape(&raw).map_err(|error| {
			self.syntax_error(
				target_range.start,
				target_range.end,
				format!("invalid path literal: {error}"),
			)
		})?;
		if !is_block_path(Path::new(&target)) {
			return Err(self.syntax_error(
				target_range.start,
				target_range.end,
				"reference target must be a `.block.css` or `.block.scss` file",
			));
		}

		self.skip_trivia()?;
		let end = match self.peek() {
			Some(BlockToken::Semicolon) => {
				let end = self.current_range().end;
				self.advance();
				end
			}
			_ => return Err(self.error_at_current("expected `;` to end the `@block` reference")),
		};

		if self
			.references
			.iter()
			.any(|reference| reference.alias == alias)
		{
			return Err(self.syntax_error(
				start,
				end,
				format!("duplicate `@block` reference alias `{alias}`"),
			));
		}

		self.references.push(BlockReference {
			alias,
			target: PathBuf::from(target),
			span: self.line_index.span_at(start, end),
		});

		Ok(())
	}

	/// Consume a foreign at-rule up to its `;` or balanced `{...}` group.
	fn skip_at_rule(&mut self) -> BlocklinkResult<()> {
		loop {
			self.skip_trivia()?;
			match self.peek() {
				None => return Ok(()),
				Some(BlockToken::Semicolon) => {
					self.advance();
					return Ok(());
				}
				Some(BlockToken::BraceOpen) => return self.skip_braced_block(),
				Some(_) => self.advance(),
			}
		}
	}

	/// Consume a `{...}` group, tracking nesting depth. Comments and strings
	/// inside the group cannot unbalance it.
	fn skip_braced_block(&mut self) -> BlocklinkResult<()> {
		let open = self.current_range();
		self.advance();
		let mut depth = 1usize;

		loop {
			match self.peek() {
				None => return Err(self.syntax_error(open.start, open.end, "unbalanced `{`")),
				Some(BlockToken::BraceOpen) => {
					depth += 1;
					self.advance();
				}
				Some(BlockToken::BraceClose) => {
					depth -= 1;
					self.advance();
					if depth == 0 {
						return Ok(());
					}
				}
				Some(BlockToken::CommentOpen) => self.skip_trivia()?,
				Some(_) => self.advance(),
			}
		}
	}

	/// Parse one rule: record what its selectors declare, then skip the
	/// body.
	fn parse_rule(&mut self) -> BlocklinkResult<()> {
		let mut target: Option<SelectorTarget> = None;

		loop {
			match self.peek() {
				None => {
					return Err(self.syntax_error(
						self.source.len(),
						self.source.len(),
						"unexpected end of file in selector",
					));
				}
				Some(BlockToken::Whitespace) => {
					self.advance();
					target = None;
				}
				Some(BlockToken::CommentOpen) => {
					self.skip_trivia()?;
					target = None;
				}
				Some(BlockToken::Comma) => {
					self.advance();
					target = None;
				}
				Some(BlockToken::Gt | BlockToken::Plus | BlockToken::Tilde) => {
					self.advance();
					target = None;
				}
				Some(BlockToken::BraceOpen) => return self.skip_braced_block(),
				Some(BlockToken::Colon) => self.parse_colon_segment(&mut target)?,
				Some(BlockToken::Dot) => self.parse_class_segment(&mut target)?,
				Some(BlockToken::BracketOpen) => self.parse_attribute_segment(target.as_ref())?,
				Some(BlockToken::Ident) => {
					return Err(self.error_at_current(
						"tag selectors are not allowed in block files; use `:scope` or a class",
					));
				}
				Some(BlockToken::Hash) => {
					return Err(
						self.error_at_current("id selectors are not allowed in block files")
					);
				}
				Some(BlockToken::Star) => {
					return Err(self
						.error_at_current("universal selectors are not allowed in block files"));
				}
				Some(_) => return Err(self.error_at_current("unexpected token in selector")),
			}
		}
	}

	/// `:scope` selects the root; any other pseudo-class or pseudo-element
	/// is skipped without disturbing the current attach target.
	fn parse_colon_segment(
		&mut self,
		target: &mut Option<SelectorTarget>,
	) -> BlocklinkResult<()> {
		let colon_range = self.current_range();
		self.advance();

		if self.peek() == Some(BlockToken::Colon) {
			self.advance();
			if self.peek() == Some(BlockToken::Ident) {
				self.advance();
			}
			return self.skip_paren_group();
		}

		if self.peek() == Some(BlockToken::Ident) {
			let name = self.current_slice();
			if name == "scope" {
				self.advance();
				*target = Some(SelectorTarget::Root);
				return Ok(());
			}
			self.advance();
			return self.skip_paren_group();
		}

		Err(self.syntax_error(colon_range.start, colon_range.end, "expected identifier after `:`"))
	}

	fn parse_class_segment(&mut self, target: &mut Option<SelectorTarget>) -> BlocklinkResult<()> {
		let dot_range = self.current_range();
		self.advance();

		match self.peek() {
			Some(BlockToken::Ident) => {
				let name = self.current_slice().to_string();
				self.advance();
				self.ensure_class(&name);
				*target = Some(SelectorTarget::Class(name));
				Ok(())
			}
			_ => Err(self.syntax_error(
				dot_range.start,
				dot_range.end,
				"expected class name after `.`",
			)),
		}
	}

	/// `[namespace|name]` or `[namespace|name=value]`, attached to the
	/// preceding `:scope` or class segment.
	fn parse_attribute_segment(
		&mut self,
		target: Option<&SelectorTarget>,
	) -> BlocklinkResult<()> {
		let open_range = self.current_range();
		let Some(target) = target else {
			return Err(self.syntax_error(
				open_range.start,
				open_range.end,
				"attribute selector must follow `:scope` or a class",
			));
		};
		self.advance();

		self.skip_trivia()?;
		let namespace = match self.peek() {
			Some(BlockToken::Ident) => {
				let namespace = self.current_slice().to_string();
				self.advance();
				namespace
			}
			_ => {
				return Err(self.error_at_current(
					"attribute selectors must be namespaced, like `[state|name]`",
				));
			}
		};

		self.skip_trivia()?;
		match self.peek() {
			Some(BlockToken::Pipe) => self.advance(),
			_ => {
				return Err(self.error_at_current(
					"attribute selectors must be namespaced, like `[state|name]`",
				));
			}
		}

		self.skip_trivia()?;
		let name = match self.peek() {
			Some(BlockToken::Ident) => {
				let name = self.current_slice().to_string();
				self.advance();
				name
			}
			_ => return Err(self.error_at_current("expected attribute name after `|`")),
		};

		self.skip_trivia()?;
		if self.peek() == Some(BlockToken::Equals) {
			self.advance();
			self.skip_trivia()?;
			match self.peek() {
				Some(
					BlockToken::Ident | BlockToken::DoubleQuoted | BlockToken::SingleQuoted,
				) => self.advance(),
				_ => return Err(self.error_at_current("expected attribute value after `=`")),
			}
			self.skip_trivia()?;
		}

		match self.peek() {
			Some(BlockToken::BracketClose) => self.advance(),
			_ => return Err(self.error_at_current("expected `]` to end the attribute selector")),
		}

		match target {
			SelectorTarget::Root => self.root.add_attribute(&namespace, &name),
			SelectorTarget::Class(class_name) => {
				if let Some(class) = self
					.classes
					.iter_mut()
					.find(|class| class.name == *class_name)
				{
					class.add_attribute(&namespace, &name);
				}
			}
		}

		Ok(())
	}

	/// Consume a balanced `(...)` group when one follows, as after `:not`.
	fn skip_paren_group(&mut self) -> BlocklinkResult<()> {
		if self.peek() != Some(BlockToken::ParenOpen) {
			return Ok(());
		}
		let open = self.current_range();
		self.advance();
		let mut depth = 1usize;

		loop {
			match self.peek() {
				None => return Err(self.syntax_error(open.start, open.end, "unbalanced `(`")),
				Some(BlockToken::ParenOpen) => {
					depth += 1;
					self.advance();
				}
				Some(BlockToken::ParenClose) => {
					depth -= 1;
					self.advance();
					if depth == 0 {
						return Ok(());
					}
				}
				Some(BlockToken::CommentOpen) => self.skip_trivia()?,
				Some(_) => self.advance(),
			}
		}
	}

	fn ensure_class(&mut self, name: &str) {
		if !self.classes.iter().any(|class| class.name == name) {
			self.classes.push(BlockClass::named(name));
		}
	}
}
