use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use blocklink_cli::BlocklinkCli;
use blocklink_cli::Commands;
use blocklink_cli::OutputFormat;
use blocklink_core::BlockStore;
use blocklink_core::BlocklinkConfig;
use blocklink_core::BlocklinkError;
use blocklink_core::BlocklinkResult;
use blocklink_core::Span;
use blocklink_core::find_template_files;
use blocklink_core::is_template_path;
use blocklink_core::pair_path;
use blocklink_core::scan_class_usages;
use clap::Parser;
use miette::Diagnostic;
use owo_colors::OwoColorize;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = BlocklinkCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	// Stdout stays clean for command output; RUST_LOG switches logging on.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.try_init();

	let result = match args.command {
		Some(Commands::Check { format }) => run_check(&args, format),
		Some(Commands::Pair { path }) => run_pair(&path),
		Some(Commands::Lsp) => run_lsp(),
		None => {
			eprintln!("No subcommand specified. Run `blocklink --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<BlocklinkError>() {
			Ok(blocklink_err) => {
				let report: miette::Report = (*blocklink_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn resolve_root(args: &BlocklinkCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(args: &BlocklinkCli, root: &Path) -> BlocklinkResult<BlocklinkConfig> {
	match &args.config {
		Some(path) => BlocklinkConfig::load_file(path),
		None => BlocklinkConfig::load_or_default(root),
	}
}

/// One class token that failed to resolve against its paired block.
#[derive(Debug)]
struct Finding {
	file: String,
	span: Span,
	token: String,
	error: BlocklinkError,
}

/// A block file that failed to compile, with the template that needed it.
#[derive(Debug)]
struct BlockFailure {
	file: String,
	template: String,
	error: BlocklinkError,
}

#[derive(Debug, Default)]
struct CheckReport {
	findings: Vec<Finding>,
	failures: Vec<BlockFailure>,
	failed_blocks: BTreeSet<PathBuf>,
}

impl CheckReport {
	fn is_ok(&self) -> bool {
		self.findings.is_empty() && self.failures.is_empty()
	}
}

fn run_check(
	args: &BlocklinkCli,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(args, &root)?;
	let templates = find_template_files(&root, &config.check.exclude)?;

	if args.verbose {
		println!(
			"Scanned {} template file(s) under {}",
			templates.len(),
			root.display()
		);
	}

	let mut store = BlockStore::new();
	let mut report = CheckReport::default();
	for template in &templates {
		check_template(
			template,
			&root,
			&config,
			&mut store,
			&mut report,
			args.verbose,
		)?;
	}

	if report.is_ok() {
		match format {
			OutputFormat::Json => {
				println!("{{\"ok\":true,\"findings\":[]}}");
			}
			OutputFormat::Github => {
				println!("All class tokens resolve.");
			}
			OutputFormat::Text => {
				println!("Check passed: every class token resolves against its paired block.");
			}
		}
		return Ok(());
	}

	match format {
		OutputFormat::Json => {
			let finding_entries: Vec<serde_json::Value> = report
				.findings
				.iter()
				.map(|finding| {
					serde_json::json!({
						"file": finding.file,
						"line": finding.span.start.line + 1,
						"column": finding.span.start.column + 1,
						"token": finding.token,
						"message": finding.error.to_string(),
					})
				})
				.collect();
			let error_entries: Vec<serde_json::Value> = report
				.failures
				.iter()
				.map(|failure| {
					serde_json::json!({
						"file": failure.file,
						"template": failure.template,
						"message": failure.error.to_string(),
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": false,
				"findings": finding_entries,
				"errors": error_entries,
			});
			println!("{output}");
		}
		OutputFormat::Github => {
			for failure in &report.failures {
				println!("::error file={}::{}", failure.file, failure.error);
			}
			for finding in &report.findings {
				println!(
					"::warning file={},line={},col={}::{}",
					finding.file,
					finding.span.start.line + 1,
					finding.span.start.column + 1,
					finding.error
				);
			}
			eprintln!("{}", check_summary(&report));
		}
		OutputFormat::Text => {
			eprintln!("Check failed.");
			eprintln!("  block errors: {}", report.failures.len());
			eprintln!("  unresolved tokens: {}", report.findings.len());

			if !report.failures.is_empty() {
				eprintln!();
				eprintln!("Block errors:");
				for failure in &report.failures {
					let rendered =
						error_report(&failure.error, &failure.file, miette::Severity::Error);
					eprintln!("{rendered:?}");
				}
			}

			if !report.findings.is_empty() {
				eprintln!();
				eprintln!("Unresolved tokens:");
				for finding in &report.findings {
					let location = format!(
						"{}:{}:{}",
						finding.file,
						finding.span.start.line + 1,
						finding.span.start.column + 1
					);
					let rendered =
						error_report(&finding.error, &location, miette::Severity::Warning);
					eprintln!("{rendered:?}");
				}
			}

			eprintln!();
			eprintln!("{}", check_summary(&report));
		}
	}

	process::exit(1)
}

/// Validate one template against its paired block model, appending anything
/// found to the report. Templates without a block file on disk warn and are
/// skipped.
fn check_template(
	template: &Path,
	root: &Path,
	config: &BlocklinkConfig,
	store: &mut BlockStore,
	report: &mut CheckReport,
	verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let Some(pairing) = pair_path(template) else {
		return Ok(());
	};
	let rel_template = make_relative(template, root);
	let rel_block = make_relative(&pairing.block_path, root);

	if !pairing.block_path.is_file() {
		eprintln!(
			"{} template `{rel_template}` has no block file (expected `{rel_block}`)",
			colored!("warning:", yellow)
		);
		return Ok(());
	}

	let model = match store.get_model(&pairing.block_path) {
		Ok(model) => model,
		Err(error) => {
			// A block shared by several templates is only reported once.
			if report.failed_blocks.insert(pairing.block_path.clone()) {
				report.failures.push(BlockFailure {
					file: rel_block,
					template: rel_template,
					error,
				});
			}
			return Ok(());
		}
	};

	let source = std::fs::read_to_string(template)?;
	let mut kept = 0usize;
	for usage in scan_class_usages(&source) {
		if kept == config.lint.max_problems {
			break;
		}
		if let Err(error) = model.lookup(&usage.text) {
			report.findings.push(Finding {
				file: rel_template.clone(),
				span: usage.span,
				token: usage.text,
				error,
			});
			kept += 1;
		}
	}

	if verbose {
		println!("  {rel_template} -> {rel_block}");
	}

	Ok(())
}

fn check_summary(report: &CheckReport) -> String {
	let mut parts = Vec::new();
	if !report.failures.is_empty() {
		parts.push(format!(
			"{} block file(s) failed to compile",
			report.failures.len()
		));
	}
	if !report.findings.is_empty() {
		parts.push(format!(
			"{} class token(s) failed to resolve",
			report.findings.len()
		));
	}
	format!("{}.", parts.join(" and "))
}

fn run_pair(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
	let Some(pairing) = pair_path(path) else {
		return Err(format!(
			"`{}` is neither a `.hbs` template nor a `.block.css`/`.block.scss` file",
			path.display()
		)
		.into());
	};

	let counterpart = if is_template_path(path) {
		pairing.block_path
	} else {
		pairing.template_path
	};
	println!("{}", counterpart.display());

	Ok(())
}

fn run_lsp() -> Result<(), Box<dyn std::error::Error>> {
	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(blocklink_lsp::run_server());
	Ok(())
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

/// Wrap a `BlocklinkError` in a `miette::Report` carrying its error code
/// and help text, prefixed with the source location for terminal display.
fn error_report(
	error: &BlocklinkError,
	location: &str,
	severity: miette::Severity,
) -> miette::Report {
	let mut diagnostic =
		miette::MietteDiagnostic::new(format!("[{location}] {error}")).with_severity(severity);
	if let Some(code) = error.code() {
		diagnostic = diagnostic.with_code(code.to_string());
	}
	if let Some(help) = error.help() {
		diagnostic = diagnostic.with_help(help.to_string());
	}

	miette::Report::new(diagnostic)
}
