use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSetBuilder;
use ignore::WalkBuilder;

use crate::error::BlocklinkError;
use crate::error::BlocklinkResult;
use crate::pairing::is_template_path;

/// Find template files under `root`, honoring ignore files and the given
/// exclude globs. Exclude patterns match paths relative to `root`. Results
/// are sorted by path; unreadable directory entries are skipped.
pub fn find_template_files(root: &Path, excludes: &[String]) -> BlocklinkResult<Vec<PathBuf>> {
	let mut builder = GlobSetBuilder::new();
	for pattern in excludes {
		let glob = Glob::new(pattern).map_err(|error| {
			BlocklinkError::InvalidGlob {
				pattern: pattern.clone(),
				reason: error.to_string(),
			}
		})?;
		builder.add(glob);
	}
	let excluded = builder.build().map_err(|error| {
		BlocklinkError::InvalidGlob {
			pattern: error.glob().unwrap_or_default().to_string(),
			reason: error.to_string(),
		}
	})?;

	let mut templates = Vec::new();
	for entry in WalkBuilder::new(root).build() {
		let entry = match entry {
			Ok(entry) => entry,
			Err(error) => {
				tracing::warn!(%error, "skipping unreadable entry");
				continue;
			}
		};
		if !entry
			.file_type()
			.is_some_and(|file_type| file_type.is_file())
		{
			continue;
		}

		let path = entry.path();
		if !is_template_path(path) {
			continue;
		}
		let relative = path.strip_prefix(root).unwrap_or(path);
		if excluded.is_match(relative) {
			continue;
		}

		templates.push(path.to_path_buf());
	}
	templates.sort();

	Ok(templates)
}
