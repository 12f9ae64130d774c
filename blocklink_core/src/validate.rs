use serde::Deserialize;
use serde::Serialize;

use crate::block::BlockModel;
use crate::position::Point;
use crate::position::Span;

/// One token of a `class` attribute value found in template source.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClassUsage {
	pub text: String,
	pub span: Span,
}

/// A template problem found by checking class usages against the paired
/// block.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SymbolDiagnostic {
	pub span: Span,
	pub message: String,
}

/// Scan template source for `class` attribute values and split them into
/// whitespace-delimited tokens with exact source spans.
///
/// The scan is textual and line based: a value must open and close its
/// quote on one line, and any `class=` occurrence followed by a quote
/// counts, including one embedded in a longer attribute name.
pub fn scan_class_usages(source: &str) -> Vec<ClassUsage> {
	let mut usages = Vec::new();

	for (line_number, line) in source.lines().enumerate() {
		let mut search_from = 0usize;
		while let Some(found) = line[search_from..].find("class=") {
			let value_quote = search_from + found + "class=".len();
			search_from = value_quote;

			let Some(quote) = line[value_quote..].chars().next() else {
				break;
			};
			if quote != '"' && quote != '\'' {
				continue;
			}
			let value_start = value_quote + quote.len_utf8();
			let Some(close) = line[value_start..].find(quote) else {
				continue;
			};
			let value_end = value_start + close;

			for (token_offset, token) in split_tokens(&line[value_start..value_end]) {
				let start = value_start + token_offset;
				usages.push(ClassUsage {
					text: token.to_string(),
					span: Span::new(
						Point::new(line_number, start),
						Point::new(line_number, start + token.len()),
					),
				});
			}

			search_from = value_end + quote.len_utf8();
		}
	}

	usages
}

/// Check every class token of a template against the block model. Tokens
/// that fail to resolve produce one diagnostic each, in source order.
pub fn validate_template(source: &str, model: &BlockModel) -> Vec<SymbolDiagnostic> {
	scan_class_usages(source)
		.into_iter()
		.filter_map(|usage| {
			model.lookup(&usage.text).err().map(|error| {
				SymbolDiagnostic {
					span: usage.span,
					message: error.to_string(),
				}
			})
		})
		.collect()
}

/// Whitespace-delimited tokens of an attribute value with their byte
/// offsets inside it.
fn split_tokens(value: &str) -> Vec<(usize, &str)> {
	let mut tokens = Vec::new();
	let mut start: Option<usize> = None;

	for (index, ch) in value.char_indices() {
		if ch.is_whitespace() {
			if let Some(token_start) = start.take() {
				tokens.push((token_start, &value[token_start..index]));
			}
		} else if start.is_none() {
			start = Some(index);
		}
	}
	if let Some(token_start) = start {
		tokens.push((token_start, &value[token_start..]));
	}

	tokens
}
