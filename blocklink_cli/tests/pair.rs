mod common;

use rstest::rstest;

#[rstest]
#[case::template_to_block("templates/site/nav.hbs", "styles/site/nav.block.css")]
#[case::block_to_template("styles/site/nav.block.css", "templates/site/nav.hbs")]
#[case::scss_block("styles/nav.block.scss", "templates/nav.hbs")]
#[case::segment_under_prefix("app/templates/nav.hbs", "app/styles/nav.block.css")]
fn pair_prints_the_counterpart_path(#[case] input: &str, #[case] expected: &str) {
	common::blocklink_cmd()
		.arg("pair")
		.arg(input)
		.assert()
		.success()
		.stdout(predicates::str::contains(expected));
}

#[test]
fn pair_needs_nothing_on_disk() {
	common::blocklink_cmd()
		.arg("pair")
		.arg("templates/ghost.hbs")
		.assert()
		.success()
		.stdout(predicates::str::contains("styles/ghost.block.css"));
}

#[test]
fn pair_rejects_unrelated_paths() {
	common::blocklink_cmd()
		.arg("pair")
		.arg("notes/readme.md")
		.assert()
		.failure()
		.code(2)
		.stderr(predicates::str::contains("neither"));
}
