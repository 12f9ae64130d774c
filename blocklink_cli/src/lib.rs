use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Link handlebars templates to the CSS block files that style them.",
	long_about = "blocklink links handlebars templates to the CSS block files that style \
	              them.\n\nEvery template under a `templates` directory pairs with a block \
	              stylesheet under `styles`: `templates/site/nav.hbs` pairs with \
	              `styles/site/nav.block.css`. Class and state tokens used in template markup \
	              resolve against the paired block and the blocks it references.\n\nQuick \
	              start:\n  blocklink check  Validate every template against its paired \
	              block\n  blocklink pair   Print the file paired with a template or block\n  \
	              blocklink lsp    Start the language server on stdio"
)]
pub struct BlocklinkCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Configuration file to use instead of probing for `blocklink.toml`.
	#[arg(long, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Check every template against its paired block file.
	///
	/// Walks the project for `.hbs` templates, compiles the paired
	/// `.block.css` model for each, and resolves every class token found in
	/// `class="..."` attributes. Exits with a non-zero status code when any
	/// token fails to resolve or a block file fails to compile.
	///
	/// Ideal for CI pipelines. Use `--format` to control the output style.
	Check {
		/// Output format for check results. Use `text` for human-readable
		/// output, `json` for programmatic consumption, or `github` for
		/// GitHub Actions annotations that appear inline on PRs.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print the file paired with a template or block path.
	///
	/// Given a `.hbs` template the paired `.block.css` path is printed;
	/// given a `.block.css` or `.block.scss` stylesheet the paired `.hbs`
	/// path is printed. The pairing swaps the first `templates`/`styles`
	/// path segment and rewrites the file suffix. Nothing needs to exist on
	/// disk.
	Pair {
		/// Template or block file path to resolve.
		path: PathBuf,
	},
	/// Start the blocklink language server (LSP).
	///
	/// Communicates over stdin/stdout using the Language Server Protocol.
	/// Configure your editor to run `blocklink lsp` as the language server
	/// command for handlebars templates and block stylesheets.
	///
	/// Provides completions for class and state tokens, go-to-definition
	/// from template tokens into block files, and diagnostics for unknown
	/// tokens and block syntax errors.
	Lsp,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption. Each finding includes the
	/// file path, position, offending token, and message.
	Json,
	/// GitHub Actions annotation format. Emits `::warning` or `::error`
	/// annotations that appear inline on pull request diffs.
	Github,
}
