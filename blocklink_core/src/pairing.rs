use std::ffi::OsStr;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// A resolved template/block file pair. Whichever side was given keeps its
/// exact path; the other side is derived.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FilePairing {
	pub template_path: PathBuf,
	pub block_path: PathBuf,
}

/// Resolve the pair for either side of a template/block pairing. Returns
/// `None` for paths that are neither template nor block files.
pub fn pair_path(path: &Path) -> Option<FilePairing> {
	if is_template_path(path) {
		let block_path = block_path_for_template(path)?;
		return Some(FilePairing {
			template_path: path.to_path_buf(),
			block_path,
		});
	}

	if is_block_path(path) {
		let template_path = template_path_for_block(path)?;
		return Some(FilePairing {
			template_path,
			block_path: path.to_path_buf(),
		});
	}

	None
}

/// Whether the path names a handlebars template.
pub fn is_template_path(path: &Path) -> bool {
	path.extension().is_some_and(|extension| extension == "hbs")
}

/// Whether the path names a block stylesheet. Both plain CSS and SCSS block
/// files are recognized.
pub fn is_block_path(path: &Path) -> bool {
	path.file_name()
		.and_then(OsStr::to_str)
		.is_some_and(|name| name.ends_with(".block.css") || name.ends_with(".block.scss"))
}

/// Derived block file path for a template: the `.hbs` suffix becomes
/// `.block.css` and the first `templates` path segment becomes `styles`.
pub fn block_path_for_template(path: &Path) -> Option<PathBuf> {
	if !is_template_path(path) {
		return None;
	}
	let file_name = path.file_name().and_then(OsStr::to_str)?;
	let stem = file_name.strip_suffix(".hbs")?;
	let renamed = format!("{stem}.block.css");

	Some(swap_first_segment(path, "templates", "styles", &renamed))
}

/// Derived template path for a block file: the block suffix becomes `.hbs`
/// and the first `styles` path segment becomes `templates`.
pub fn template_path_for_block(path: &Path) -> Option<PathBuf> {
	if !is_block_path(path) {
		return None;
	}
	let file_name = path.file_name().and_then(OsStr::to_str)?;
	let stem = file_name
		.strip_suffix(".block.css")
		.or_else(|| file_name.strip_suffix(".block.scss"))?;
	let renamed = format!("{stem}.hbs");

	Some(swap_first_segment(path, "styles", "templates", &renamed))
}

/// Rebuild `path` with its file name replaced and the first directory
/// segment equal to `from` replaced with `to`. Only directory segments are
/// candidates; later matches are left alone.
fn swap_first_segment(path: &Path, from: &str, to: &str, file_name: &str) -> PathBuf {
	let mut swapped = false;
	let mut result = PathBuf::new();
	let mut components = path.components().peekable();

	while let Some(component) = components.next() {
		if components.peek().is_none() {
			result.push(file_name);
			break;
		}
		match component {
			Component::Normal(segment) if !swapped && segment == OsStr::new(from) => {
				swapped = true;
				result.push(to);
			}
			other => result.push(other.as_os_str()),
		}
	}

	result
}
