//! Core engine for blocklink: editor-grade language intelligence for
//! handlebars templates paired with CSS block files.
//!
//! ## Pipeline
//!
//! 1. [`parse_markup`] turns template source into a position-addressable
//!    [`SyntaxTree`].
//! 2. [`FocusPath::resolve`] walks the tree to the node under a cursor.
//! 3. [`classify`] reduces a focus path to a [`CursorContext`]: the class
//!    or state token the cursor is editing.
//! 4. [`BlockStore::get_model`] compiles the paired `.block.css` file, and
//!    everything it references, into a [`BlockModel`].
//! 5. [`complete`], [`define`], and [`validate_template`] answer editor
//!    requests against the model.
//!
//! ## Key types
//!
//! - [`SyntaxTree`] / [`FocusPath`]: parsed template and cursor paths.
//! - [`CursorContext`] / [`ClassReference`]: classified cursor positions.
//! - [`BlockModel`] / [`BlockStore`]: compiled block files and their cache.
//! - [`BlocklinkError`]: every failure the engine reports.
//!
//! ## Quick start
//!
//! ```
//! use blocklink_core::CursorContext;
//! use blocklink_core::Point;
//! use blocklink_core::classify;
//!
//! let source = r#"<div class="alert critical"></div>"#;
//! let Some(CursorContext::Class(reference)) = classify(source, Point::new(0, 13)) else {
//! 	panic!("expected a class context");
//! };
//! assert_eq!(reference.class_name, "alert");
//! ```

pub use block::*;
pub use config::*;
pub use cursor::*;
pub use error::*;
pub use focus::*;
pub use linker::*;
pub use markup::*;
pub use pairing::*;
pub use position::*;
pub use scan::*;
pub use store::*;
pub use validate::*;

mod block;
mod config;
mod cursor;
mod error;
mod focus;
mod linker;
mod markup;
mod pairing;
mod position;
mod scan;
mod store;
mod validate;

#[cfg(test)]
mod __fixtures;
