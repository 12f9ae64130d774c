mod common;

use blocklink_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;

#[test]
fn check_honors_exclude_globs_from_blocklink_toml() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("templates/legacy"))?;
	std::fs::create_dir_all(tmp.path().join("styles/legacy"))?;

	std::fs::write(
		tmp.path().join("templates/legacy/old.hbs"),
		"<div class=\"ghost\"></div>\n",
	)?;
	std::fs::write(
		tmp.path().join("styles/legacy/old.block.css"),
		":scope { display: flex; }\n.item { color: blue; }\n",
	)?;
	std::fs::write(
		tmp.path().join("blocklink.toml"),
		"[check]\nexclude = [\"templates/legacy/**\"]\n",
	)?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Check passed"));

	Ok(())
}

#[test]
fn check_reads_config_from_dot_config_directory() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("templates/legacy"))?;
	std::fs::create_dir_all(tmp.path().join("styles/legacy"))?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;

	std::fs::write(
		tmp.path().join("templates/legacy/old.hbs"),
		"<div class=\"ghost\"></div>\n",
	)?;
	std::fs::write(
		tmp.path().join("styles/legacy/old.block.css"),
		":scope { display: flex; }\n.item { color: blue; }\n",
	)?;
	std::fs::write(
		tmp.path().join(".config/blocklink.toml"),
		"[check]\nexclude = [\"templates/legacy/**\"]\n",
	)?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	Ok(())
}

#[test]
fn check_prefers_blocklink_toml_over_other_candidates() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("templates/legacy"))?;
	std::fs::create_dir_all(tmp.path().join("styles/legacy"))?;

	std::fs::write(
		tmp.path().join("templates/legacy/old.hbs"),
		"<div class=\"ghost\"></div>\n",
	)?;
	std::fs::write(
		tmp.path().join("styles/legacy/old.block.css"),
		":scope { display: flex; }\n.item { color: blue; }\n",
	)?;
	// Only the highest-priority candidate carries the exclude.
	std::fs::write(
		tmp.path().join("blocklink.toml"),
		"[check]\nexclude = [\"templates/legacy/**\"]\n",
	)?;
	std::fs::write(tmp.path().join(".blocklink.toml"), "")?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	Ok(())
}

#[test]
fn check_uses_an_explicit_config_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("templates/legacy"))?;
	std::fs::create_dir_all(tmp.path().join("styles/legacy"))?;
	std::fs::create_dir_all(tmp.path().join("tools"))?;

	std::fs::write(
		tmp.path().join("templates/legacy/old.hbs"),
		"<div class=\"ghost\"></div>\n",
	)?;
	std::fs::write(
		tmp.path().join("styles/legacy/old.block.css"),
		":scope { display: flex; }\n.item { color: blue; }\n",
	)?;
	// The candidate config has no excludes; the explicit one does.
	std::fs::write(tmp.path().join("blocklink.toml"), "")?;
	std::fs::write(
		tmp.path().join("tools/ci.toml"),
		"[check]\nexclude = [\"templates/legacy/**\"]\n",
	)?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--config")
		.arg(tmp.path().join("tools/ci.toml"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.failure()
		.code(1);

	Ok(())
}

#[test]
fn check_caps_findings_with_lint_max_problems() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("templates"))?;
	std::fs::create_dir_all(tmp.path().join("styles"))?;

	std::fs::write(
		tmp.path().join("templates/nav.hbs"),
		"<div class=\"ghost phantom\"></div>\n",
	)?;
	std::fs::write(
		tmp.path().join("styles/nav.block.css"),
		":scope { display: flex; }\n.item { color: blue; }\n",
	)?;
	std::fs::write(tmp.path().join("blocklink.toml"), "[lint]\nmax_problems = 1\n")?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.failure()
		.code(1)
		.stderr(predicates::str::contains("ghost"))
		.stderr(predicates::str::contains("phantom").not())
		.stderr(predicates::str::contains("1 class token(s) failed to resolve"));

	Ok(())
}

#[test]
fn check_fails_loudly_on_invalid_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("blocklink.toml"), "lint = \"nope\"\n")?;

	common::blocklink_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.failure()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config"));

	Ok(())
}
