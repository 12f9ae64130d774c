//! Shared fixtures for the crate tests: a small `styles/` + `templates/`
//! workspace with a nav block that references a shared block.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::error::AnyResult;

pub(crate) const SHARED_BLOCK: &str = r#":scope {
	display: block;
}

:scope[state|theme=dark] {
	color: white;
}

.button {
	cursor: pointer;
}

.button[state|disabled] {
	cursor: default;
}
"#;

pub(crate) const NAV_BLOCK: &str = r#"@block shared from "./shared.block.css";

:scope {
	display: flex;
}

:scope[state|collapsed] {
	width: 3rem;
}

.item {
	padding: 0.5rem;
}

.item[state|active] {
	font-weight: bold;
}

.badge {
	background: red;
}
"#;

pub(crate) const NAV_TEMPLATE: &str = r#"<nav class="item badge">
	<a class="shared.button item" state="active">Home</a>
</nav>
"#;

/// Write the workspace into a tempdir and return the guard together with
/// the nav block path.
pub(crate) fn write_nav_workspace() -> AnyResult<(TempDir, PathBuf)> {
	let dir = tempfile::tempdir()?;
	let styles = dir.path().join("styles");
	let templates = dir.path().join("templates");
	fs::create_dir_all(&styles)?;
	fs::create_dir_all(&templates)?;

	fs::write(styles.join("shared.block.css"), SHARED_BLOCK)?;
	let nav_block = styles.join("nav.block.css");
	fs::write(&nav_block, NAV_BLOCK)?;
	fs::write(templates.join("nav.hbs"), NAV_TEMPLATE)?;

	Ok((dir, nav_block))
}
