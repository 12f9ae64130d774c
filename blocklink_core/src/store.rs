use std::collections::HashMap;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::block::BlockModel;
use crate::block::parse_block_source;
use crate::error::BlocklinkError;
use crate::error::BlocklinkResult;

/// Lexically normalize a path: fold `.` segments and resolve `..` against
/// the preceding segment. No filesystem access; symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut result = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if result.ends_with(Component::ParentDir.as_os_str()) || !result.pop() {
					result.push(Component::ParentDir.as_os_str());
				}
			}
			other => result.push(other.as_os_str()),
		}
	}

	result
}

/// Compiles and caches block models by normalized path.
///
/// Models are shared through `Arc`, so a model handed out earlier stays
/// usable after the store evicts it.
#[derive(Debug, Default)]
pub struct BlockStore {
	cache: HashMap<PathBuf, Arc<BlockModel>>,
}

impl BlockStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// The compiled model for a block file, from cache when possible.
	/// Compiling resolves `@block` references recursively, so one call can
	/// cache several models.
	pub fn get_model(&mut self, path: &Path) -> BlocklinkResult<Arc<BlockModel>> {
		let key = normalize_path(path);
		if let Some(model) = self.cache.get(&key) {
			return Ok(Arc::clone(model));
		}

		let mut visiting = Vec::new();
		self.compile(key, &mut visiting)
	}

	fn compile(
		&mut self,
		key: PathBuf,
		visiting: &mut Vec<PathBuf>,
	) -> BlocklinkResult<Arc<BlockModel>> {
		if let Some(model) = self.cache.get(&key) {
			return Ok(Arc::clone(model));
		}
		if visiting.contains(&key) {
			return Err(BlocklinkError::CircularReference {
				path: key.display().to_string(),
			});
		}

		visiting.push(key.clone());
		let outcome = self.compile_uncached(&key, visiting);
		visiting.pop();

		let model = outcome?;
		self.cache.insert(key, Arc::clone(&model));
		Ok(model)
	}

	fn compile_uncached(
		&mut self,
		key: &Path,
		visiting: &mut Vec<PathBuf>,
	) -> BlocklinkResult<Arc<BlockModel>> {
		let text = fs::read_to_string(key)?;
		let source = parse_block_source(key, &text)?;

		let parent = key.parent().map_or_else(PathBuf::new, Path::to_path_buf);
		let mut references = HashMap::new();
		for reference in &source.references {
			let target = normalize_path(&parent.join(&reference.target));
			let model = self.compile(target, visiting)?;
			references.insert(reference.alias.clone(), model);
		}

		tracing::debug!(path = %key.display(), "compiled block");
		Ok(Arc::new(BlockModel::new(key.to_path_buf(), source, references)))
	}

	/// Evict every cached model whose compilation read `path`, directly or
	/// through references. Returns the number of evicted models.
	pub fn invalidate(&mut self, path: &Path) -> usize {
		let key = normalize_path(path);
		let before = self.cache.len();
		self.cache.retain(|_, model| !model.depends_on(&key));
		let evicted = before - self.cache.len();
		if evicted > 0 {
			tracing::debug!(path = %key.display(), evicted, "invalidated cached block models");
		}

		evicted
	}

	/// Drop every cached model.
	pub fn reset(&mut self) {
		self.cache.clear();
	}

	pub fn is_cached(&self, path: &Path) -> bool {
		self.cache.contains_key(&normalize_path(path))
	}

	pub fn len(&self) -> usize {
		self.cache.len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.is_empty()
	}
}
