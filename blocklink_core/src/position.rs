use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A location in source text.
///
/// Lines and columns are 0-indexed. `column` counts bytes from the start of
/// the line, matching the offsets produced by the lexers in this crate;
/// conversion from editor-protocol UTF-16 columns happens at the transport
/// boundary.
#[derive(
	Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Point {
	/// 0-indexed line.
	pub line: usize,
	/// 0-indexed byte column within the line.
	pub column: usize,
}

impl Point {
	pub fn new(line: usize, column: usize) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for Point {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// A region of source text between two points.
///
/// `end` sits one past the last character of the region. Containment is
/// inclusive at both boundaries so that a cursor resting on either edge of
/// the region still counts as inside it.
#[derive(
	Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Span {
	pub start: Point,
	pub end: Point,
}

impl Span {
	pub fn new(start: Point, end: Point) -> Self {
		Self { start, end }
	}

	/// A zero-width span at a single point.
	pub fn point(at: Point) -> Self {
		Self { start: at, end: at }
	}

	/// Inclusive containment under lexicographic (line, column) ordering.
	pub fn contains(&self, point: Point) -> bool {
		self.start <= point && point <= self.end
	}
}

impl fmt::Display for Span {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.start, self.end)
	}
}

/// Byte-offset to line/column mapping for a source text.
///
/// Built once per parse so spans can be derived from lexer byte ranges
/// without rescanning the text.
#[derive(Clone, Debug)]
pub struct LineIndex {
	/// Byte offset of the first character of each line.
	line_starts: Vec<usize>,
}

impl LineIndex {
	pub fn new(text: &str) -> Self {
		let mut line_starts = vec![0];
		for (index, byte) in text.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(index + 1);
			}
		}
		Self { line_starts }
	}

	/// The point at a byte offset. Offsets past the end of the text clamp to
	/// the final line.
	pub fn point_at(&self, offset: usize) -> Point {
		let line = match self.line_starts.binary_search(&offset) {
			Ok(line) => line,
			Err(next_line) => next_line.saturating_sub(1),
		};
		let line_start = self.line_starts.get(line).copied().unwrap_or_default();
		Point::new(line, offset.saturating_sub(line_start))
	}

	/// The span covering the byte range `start..end`.
	pub fn span_at(&self, start: usize, end: usize) -> Span {
		Span::new(self.point_at(start), self.point_at(end))
	}
}
