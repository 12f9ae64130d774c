use std::fs;
use std::path::Path;

use blocklink_core::Point;
use blocklink_core::Span;
use blocklink_core::normalize_path;
use rstest::rstest;
use similar_asserts::assert_eq;
use tempfile::TempDir;
#[allow(unused_imports)]
use tower_lsp_server::ls_types::*;

use super::*;

const SHARED_BLOCK: &str = r#":scope {
	color: inherit;
}

.button {
	cursor: pointer;
}
"#;

const NAV_BLOCK: &str = r#"@block shared from "./shared.block.css";

:scope {
	display: flex;
}

.item {
	padding: 0.5rem;
}

.badge {
	background: red;
}
"#;

const ASIDE_BLOCK: &str = r#"@block shared from "./shared.block.css";

.panel {
	border: 1px solid;
}
"#;

const OTHER_BLOCK: &str = r#".solo {
	margin: 0;
}
"#;

/// Write a `styles/` + `templates/` workspace into a tempdir.
fn write_workspace() -> TempDir {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let styles = dir.path().join("styles");
	fs::create_dir_all(&styles).unwrap();
	fs::create_dir_all(dir.path().join("templates")).unwrap();

	fs::write(styles.join("shared.block.css"), SHARED_BLOCK).unwrap();
	fs::write(styles.join("nav.block.css"), NAV_BLOCK).unwrap();
	fs::write(styles.join("aside.block.css"), ASIDE_BLOCK).unwrap();
	fs::write(styles.join("other.block.css"), OTHER_BLOCK).unwrap();

	dir
}

/// Write a template file and open it in the workspace state.
fn open_template(state: &mut WorkspaceState, dir: &TempDir, name: &str, content: &str) -> Uri {
	let path = dir.path().join("templates").join(name);
	fs::write(&path, content).unwrap();

	let uri = Uri::from_file_path(&path).unwrap_or_else(|| panic!("invalid test URI"));
	state.update_document(&uri, content.to_string());
	uri
}

// ---- Position mapping tests ----

#[rstest]
#[case::line_start(0, 0, Some((0, 0)))]
#[case::after_two_byte_char(0, 2, Some((0, 3)))]
#[case::after_three_byte_char(0, 3, Some((0, 6)))]
#[case::end_of_line(0, 4, Some((0, 7)))]
#[case::past_end_of_line(0, 5, None)]
#[case::second_line(1, 1, Some((1, 1)))]
#[case::past_last_line(2, 0, None)]
fn point_from_lsp_converts_utf16_columns(
	#[case] line: u32,
	#[case] character: u32,
	#[case] expected: Option<(usize, usize)>,
) {
	let content = "aé日b\ncd";
	let position = Position { line, character };
	let expected = expected.map(|(line, column)| Point::new(line, column));

	assert_eq!(point_from_lsp(content, position), expected);
}

#[rstest]
#[case::inside_surrogate_pair(1, None)]
#[case::after_surrogate_pair(2, Some((0, 4)))]
#[case::end_of_line(3, Some((0, 5)))]
fn point_from_lsp_handles_supplementary_chars(
	#[case] character: u32,
	#[case] expected: Option<(usize, usize)>,
) {
	let content = "😀x";
	let position = Position { line: 0, character };
	let expected = expected.map(|(line, column)| Point::new(line, column));

	assert_eq!(point_from_lsp(content, position), expected);
}

#[test]
fn spans_map_onto_lsp_ranges() {
	let span = Span::new(Point::new(1, 2), Point::new(3, 4));
	assert_eq!(
		to_lsp_range(span),
		Range {
			start: Position {
				line: 1,
				character: 2,
			},
			end: Position {
				line: 3,
				character: 4,
			},
		}
	);
}

// ---- Diagnostics tests ----

#[test]
fn block_parse_diagnostics_reports_structural_errors() {
	let diagnostics = block_parse_diagnostics(Path::new("styles/x.block.css"), "div { }");

	assert_eq!(diagnostics.len(), 1);
	assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
	assert_eq!(diagnostics[0].source.as_deref(), Some("blocklink"));
	assert!(
		diagnostics[0].message.contains("tag selectors"),
		"message: {}",
		diagnostics[0].message
	);
	assert_eq!(
		diagnostics[0].range,
		Range {
			start: Position {
				line: 0,
				character: 0,
			},
			end: Position {
				line: 0,
				character: 3,
			},
		}
	);
}

#[test]
fn block_parse_diagnostics_are_empty_for_clean_files() {
	let diagnostics = block_parse_diagnostics(Path::new("styles/x.block.css"), ":scope { }\n");
	assert!(diagnostics.is_empty());
}

#[test]
fn template_revalidation_reports_unknown_tokens() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item wrong\"></nav>\n");

	let Some(diagnostics) = compute_template_diagnostics(&mut state, &uri) else {
		panic!("expected diagnostics");
	};

	assert_eq!(diagnostics.len(), 1);
	assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
	assert!(diagnostics[0].message.contains("wrong"));
	assert_eq!(
		diagnostics[0].range,
		Range {
			start: Position {
				line: 0,
				character: 17,
			},
			end: Position {
				line: 0,
				character: 22,
			},
		}
	);
}

#[test]
fn template_revalidation_publishes_empty_lists_for_clean_templates() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item\"></nav>\n");

	let Some(diagnostics) = compute_template_diagnostics(&mut state, &uri) else {
		panic!("expected a publishable list");
	};
	assert!(diagnostics.is_empty());
}

#[test]
fn template_revalidation_skips_when_the_model_cannot_compile() {
	let dir = write_workspace();
	fs::write(dir.path().join("styles/nav.block.css"), "div { }").unwrap();

	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item\"></nav>\n");

	assert_eq!(compute_template_diagnostics(&mut state, &uri), None);
}

#[test]
fn template_revalidation_ignores_non_template_documents() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();

	let block_path = dir.path().join("styles/nav.block.css");
	let uri = Uri::from_file_path(&block_path).unwrap_or_else(|| panic!("invalid test URI"));
	state.update_document(&uri, NAV_BLOCK.to_string());

	assert_eq!(compute_template_diagnostics(&mut state, &uri), None);
}

#[test]
fn block_save_revalidates_every_dependent_template() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();

	let nav = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item\"></nav>\n");
	let aside = open_template(
		&mut state,
		&dir,
		"aside.hbs",
		"<aside class=\"panel missing\"></aside>\n",
	);
	let other = open_template(&mut state, &dir, "other.hbs", "<p class=\"solo\"></p>\n");

	// Prime the store the way earlier saves would have.
	for uri in [&nav, &aside, &other] {
		assert!(compute_template_diagnostics(&mut state, uri).is_some());
	}

	let saved = normalize_path(&dir.path().join("styles/shared.block.css"));
	assert_eq!(state.store.invalidate(&saved), 3);

	let Some(nav_diagnostics) = compute_block_save_revalidation(&mut state, &nav, &saved) else {
		panic!("expected the nav template to revalidate");
	};
	assert!(nav_diagnostics.is_empty());

	let Some(aside_diagnostics) = compute_block_save_revalidation(&mut state, &aside, &saved)
	else {
		panic!("expected the aside template to revalidate");
	};
	assert_eq!(aside_diagnostics.len(), 1);
	assert!(aside_diagnostics[0].message.contains("missing"));

	// The unrelated template's model never read the saved file.
	assert_eq!(
		compute_block_save_revalidation(&mut state, &other, &saved),
		None
	);

	// Revalidation recompiled the saved block before validating.
	assert!(state.store.is_cached(&saved));
}

// ---- Completion tests ----

#[test]
fn completions_inside_a_class_attribute() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"\"></nav>\n");

	let items = compute_completions(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 12,
		},
	);

	let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
	assert_eq!(labels, vec!["item", "badge"]);
	assert!(
		items
			.iter()
			.all(|item| item.kind == Some(CompletionItemKind::PROPERTY))
	);
}

#[test]
fn completions_follow_reference_aliases() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"shared.\"></nav>\n");

	let items = compute_completions(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 19,
		},
	);

	let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
	assert_eq!(labels, vec!["button"]);
}

#[test]
fn completions_outside_any_context_are_empty() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item\"></nav>\n");

	let items = compute_completions(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 2,
		},
	);
	assert!(items.is_empty());
}

#[test]
fn completions_for_untracked_documents_are_empty() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();

	let path = dir.path().join("templates/nav.hbs");
	let uri = Uri::from_file_path(&path).unwrap_or_else(|| panic!("invalid test URI"));

	let items = compute_completions(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 0,
		},
	);
	assert!(items.is_empty());
}

// ---- Definition tests ----

#[test]
fn definition_jumps_into_the_paired_block_file() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"item\"></nav>\n");

	let Some(location) = compute_definition(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 13,
		},
	) else {
		panic!("expected a definition location");
	};

	assert_eq!(
		location
			.uri
			.to_file_path()
			.map(std::borrow::Cow::into_owned),
		Some(normalize_path(&dir.path().join("styles/nav.block.css")))
	);
	assert_eq!(
		location.range,
		Range {
			start: Position {
				line: 6,
				character: 1,
			},
			end: Position {
				line: 6,
				character: 1,
			},
		}
	);
}

#[test]
fn definition_for_an_unknown_alias_is_none() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();
	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav class=\"ghost.x\"></nav>\n");

	let location = compute_definition(
		&mut state,
		&uri,
		Position {
			line: 0,
			character: 14,
		},
	);
	assert_eq!(location, None);
}

#[test]
fn definition_outside_templates_is_none() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();

	let block_path = dir.path().join("styles/nav.block.css");
	let uri = Uri::from_file_path(&block_path).unwrap_or_else(|| panic!("invalid test URI"));
	state.update_document(&uri, NAV_BLOCK.to_string());

	let location = compute_definition(
		&mut state,
		&uri,
		Position {
			line: 6,
			character: 2,
		},
	);
	assert_eq!(location, None);
}

// ---- Document state tests ----

#[test]
fn update_document_replaces_the_stored_text() {
	let dir = write_workspace();
	let mut state = WorkspaceState::default();

	let uri = open_template(&mut state, &dir, "nav.hbs", "<nav></nav>\n");
	state.update_document(&uri, "<nav class=\"item\"></nav>\n".to_string());

	assert_eq!(state.documents.len(), 1);
	let doc = state.documents.get(&uri).unwrap();
	assert_eq!(doc.content, "<nav class=\"item\"></nav>\n");
}
