use miette::Diagnostic;
use thiserror::Error;

use crate::position::Span;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum BlocklinkError {
	#[error(transparent)]
	#[diagnostic(code(blocklink::io_error))]
	Io(#[from] std::io::Error),

	#[error("syntax error in block file `{path}` at {span}: {message}")]
	#[diagnostic(
		code(blocklink::block_syntax),
		help(
			"block files contain `@block <alias> from \"<path>\";` declarations and rules whose \
			 selectors combine `:scope`, `.class`, and `[namespace|name]` parts"
		)
	)]
	BlockSyntax {
		path: String,
		span: Span,
		message: String,
	},

	#[error("unknown class `{class}` in block `{block}`")]
	#[diagnostic(
		code(blocklink::unknown_class),
		help("add a `.{class}` rule to the block file, or fix the class token in the template")
	)]
	UnknownClass { class: String, block: String },

	#[error("unknown block reference `{alias}` in block `{block}`")]
	#[diagnostic(
		code(blocklink::unknown_reference),
		help("declare the reference with `@block {alias} from \"<path>\";` in the block file")
	)]
	UnknownReference { alias: String, block: String },

	#[error("circular block reference involving `{path}`")]
	#[diagnostic(
		code(blocklink::circular_reference),
		help("break the `@block` cycle so each block can compile before its dependents")
	)]
	CircularReference { path: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(blocklink::config_parse),
		help("check that blocklink.toml is valid TOML with [lint] and/or [check] sections")
	)]
	ConfigParse(String),

	#[error("invalid exclude pattern `{pattern}`: {reason}")]
	#[diagnostic(
		code(blocklink::invalid_glob),
		help("check the [check] exclude patterns in blocklink.toml")
	)]
	InvalidGlob { pattern: String, reason: String },
}

pub type BlocklinkResult<T> = Result<T, BlocklinkError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
