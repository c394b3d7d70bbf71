//! Resolution of resources that tile content refers to by URI
//!
//! An instanced model may reference its glTF by a relative URI instead of
//! embedding it. Validators never touch the file system directly; they ask
//! the [`ResourceResolver`] of their context.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Source of resource data, addressed by relative URI
pub trait ResourceResolver: Send + Sync {
    /// Return the bytes of the resource, or `None` if it cannot be resolved
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>>;

    /// Create a resolver for URIs that appear inside the resource at `uri`
    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver>;
}

/// Normalize a relative URI into a `/`-separated path without `.` segments
///
/// Inner `..` segments cancel the segment before them. Leading `..` segments
/// that climb above the base are kept. Returns `None` for absolute paths,
/// URIs with a scheme, and URIs that normalize to nothing.
pub fn normalize_relative_uri(uri: &str) -> Option<String> {
    let uri = uri.trim();
    if uri.is_empty() || uri.starts_with('/') || uri.starts_with('\\') || uri.contains(':') {
        return None;
    }
    let uri = uri.split(['?', '#']).next().unwrap_or(uri);
    let decoded = urlencoding::decode(uri).ok()?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

fn parent_of(normalized: &str) -> &str {
    match normalized.rsplit_once('/') {
        Some((dir, _)) => dir,
        None if normalized == ".." => "..",
        None => "",
    }
}

/// Join normalized `/`-separated segments onto `base`, applying `..` lexically
fn join_segments(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" => {}
            ".." => {
                if path.file_name().is_none() || !path.pop() {
                    path.push("..");
                }
            }
            other => path.push(other),
        }
    }
    path
}

/// Resolves URIs relative to a directory of the local file system
///
/// URIs may climb above the base directory with `..`. A resolver created
/// with [`FileResourceResolver::sandboxed`] refuses everything outside its
/// root instead, including from resolvers derived from it.
#[derive(Debug, Clone)]
pub struct FileResourceResolver {
    base_directory: PathBuf,
    sandbox_root: Option<PathBuf>,
}

impl FileResourceResolver {
    /// Create a resolver rooted at `base_directory`
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
            sandbox_root: None,
        }
    }

    /// Create a resolver that never reads outside `base_directory`
    pub fn sandboxed(base_directory: impl Into<PathBuf>) -> Self {
        let base_directory = base_directory.into();
        Self {
            sandbox_root: Some(base_directory.clone()),
            base_directory,
        }
    }

    /// The directory URIs are resolved against
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    fn resolve_path(&self, uri: &str) -> Result<PathBuf> {
        let relative = normalize_relative_uri(uri)
            .ok_or_else(|| Error::ResourceNotFound(format!("'{}' is not a relative URI", uri)))?;
        let path = join_segments(&self.base_directory, &relative);
        if let Some(root) = &self.sandbox_root {
            if !path.starts_with(root) {
                return Err(Error::ResourceNotFound(format!(
                    "'{}' is outside of {}",
                    uri,
                    root.display()
                )));
            }
        }
        Ok(path)
    }

    /// Read the resource, reporting why it could not be read
    pub fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.resolve_path(uri)?;
        Ok(std::fs::read(path)?)
    }
}

impl ResourceResolver for FileResourceResolver {
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>> {
        match self.read(uri) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!(uri, error = %e, "could not resolve resource");
                None
            }
        }
    }

    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver> {
        let base_directory = match normalize_relative_uri(uri) {
            Some(relative) => join_segments(&self.base_directory, parent_of(&relative)),
            None => self.base_directory.clone(),
        };
        Arc::new(FileResourceResolver {
            base_directory,
            sandbox_root: self.sandbox_root.clone(),
        })
    }
}

/// Resolves URIs from an in-memory map of relative paths
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceResolver {
    base: String,
    resources: Arc<HashMap<String, Vec<u8>>>,
}

impl MemoryResourceResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource under the given relative path
    ///
    /// Paths that are not relative are ignored.
    pub fn with_resource(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        if let Some(key) = normalize_relative_uri(path) {
            Arc::make_mut(&mut self.resources).insert(key, data.into());
        }
        self
    }

    fn key_for(&self, uri: &str) -> Option<String> {
        if self.base.is_empty() {
            normalize_relative_uri(uri)
        } else {
            normalize_relative_uri(&format!("{}/{}", self.base, uri))
        }
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>> {
        let key = self.key_for(uri)?;
        self.resources.get(&key).cloned()
    }

    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver> {
        let base = self
            .key_for(uri)
            .map(|key| parent_of(&key).to_string())
            .unwrap_or_else(|| self.base.clone());
        Arc::new(MemoryResourceResolver {
            base,
            resources: Arc::clone(&self.resources),
        })
    }
}
