use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::BlocklinkError;
use crate::error::BlocklinkResult;

/// File names probed for configuration, in priority order relative to the
/// project root.
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"blocklink.toml",
	".blocklink.toml",
	".config/blocklink.toml",
];

/// Workspace configuration loaded from `blocklink.toml`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BlocklinkConfig {
	pub lint: LintConfig,
	pub check: CheckConfig,
}

/// Limits applied when reporting problems.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct LintConfig {
	/// Cap on diagnostics published or printed per file.
	pub max_problems: usize,
}

impl Default for LintConfig {
	fn default() -> Self {
		Self { max_problems: 100 }
	}
}

/// Options for workspace template scanning.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CheckConfig {
	/// Glob patterns excluded from template scanning, matched against paths
	/// relative to the root.
	pub exclude: Vec<String>,
}

impl BlocklinkConfig {
	/// Load configuration from the first candidate file under `root`.
	/// Returns `None` when no candidate exists.
	pub fn load(root: &Path) -> BlocklinkResult<Option<Self>> {
		for candidate in CONFIG_FILE_CANDIDATES {
			let path = root.join(candidate);
			if !path.is_file() {
				continue;
			}
			return Self::load_file(&path).map(Some);
		}

		Ok(None)
	}

	/// Load configuration, falling back to defaults when no file exists.
	pub fn load_or_default(root: &Path) -> BlocklinkResult<Self> {
		Ok(Self::load(root)?.unwrap_or_default())
	}

	/// Load configuration from an explicit file path, bypassing candidate
	/// discovery.
	pub fn load_file(path: &Path) -> BlocklinkResult<Self> {
		let text = fs::read_to_string(path)?;

		toml::from_str(&text).map_err(|error| BlocklinkError::ConfigParse(error.to_string()))
	}
}
