use std::fs;
use std::path::PathBuf;

use crate::block::BlockModel;
use crate::cursor::ClassReference;
use crate::cursor::CursorContext;
use crate::error::BlocklinkResult;
use crate::position::Point;
use crate::position::Span;

/// A resolved definition location inside a block file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DefinitionTarget {
	pub path: PathBuf,
	pub span: Span,
}

/// Completion candidates for a cursor context against the template's own
/// block model.
///
/// For a class context the candidates come from the block the token refers
/// into: the root class's attributes first, as `namespace:name` labels,
/// then every non-root class name. A dotted token whose alias matches no
/// reference yields nothing.
///
/// For a state context the candidates are the attributes of every class
/// named by the sibling `class` attribute, in order; references or classes
/// that do not resolve are skipped.
pub fn complete(context: &CursorContext, model: &BlockModel) -> Vec<String> {
	match context {
		CursorContext::Class(reference) => {
			let Some(owner) = owner_block(reference, model) else {
				return Vec::new();
			};
			let mut items: Vec<String> = owner
				.root_class()
				.attributes
				.iter()
				.map(ToString::to_string)
				.collect();
			items.extend(
				owner
					.classes()
					.filter(|class| !class.is_root)
					.map(|class| class.name.clone()),
			);
			items
		}
		CursorContext::State { sibling_classes } => {
			let mut items = Vec::new();
			for sibling in sibling_classes {
				let Some(owner) = owner_block(sibling, model) else {
					continue;
				};
				let Some(class) = owner.get_class(&sibling.class_name) else {
					continue;
				};
				items.extend(class.attributes.iter().map(ToString::to_string));
			}
			items
		}
	}
}

/// Definition location for a class context.
///
/// The target line is found textually: the first line of the block file
/// whose text contains the class name, falling back to the first line. The
/// span is zero width at column 1, so the caret lands at the start of that
/// line rather than on the declaration itself. Matching is substring based,
/// so a name whose first occurrence sits inside a comment or a longer name
/// wins the search.
///
/// State contexts have no single declaration site and resolve to `None`, as
/// do class contexts whose reference alias is unknown.
pub fn define(
	context: &CursorContext,
	model: &BlockModel,
) -> BlocklinkResult<Option<DefinitionTarget>> {
	let CursorContext::Class(reference) = context else {
		return Ok(None);
	};
	let Some(owner) = owner_block(reference, model) else {
		return Ok(None);
	};

	let text = fs::read_to_string(owner.identifier())?;
	let line = text
		.lines()
		.position(|line| line.contains(&reference.class_name))
		.unwrap_or(0);

	Ok(Some(DefinitionTarget {
		path: owner.identifier().to_path_buf(),
		span: Span::point(Point::new(line, 1)),
	}))
}

/// The block a reference's class lives in: a referenced block for aliased
/// tokens, the model itself otherwise.
fn owner_block<'model>(
	reference: &ClassReference,
	model: &'model BlockModel,
) -> Option<&'model BlockModel> {
	match &reference.referenced_block {
		Some(alias) => {
			model
				.get_referenced_block(alias)
				.map(|referenced| referenced.as_ref())
		}
		None => Some(model),
	}
}
