//! ELM library loading and include resolution

use anyhow::{anyhow, Context, Result};
use octofhir_cql_elm::Library;
use octofhir_datareq_engine::LibraryRegistry;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads translator JSON output from disk, with caching by canonical path
pub struct LibraryLoader {
    /// Search paths for included libraries
    search_paths: Vec<PathBuf>,
    /// Parsed libraries (canonical path -> library)
    cache: Arc<RwLock<HashMap<PathBuf, Library>>>,
}

impl LibraryLoader {
    /// Create a loader searching `search_paths`, then `CQL_LIBRARY_PATH`,
    /// with the current directory first
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let mut paths = search_paths;

        if let Ok(env_path) = std::env::var("CQL_LIBRARY_PATH") {
            for path in env_path.split(':') {
                if !path.is_empty() {
                    paths.push(PathBuf::from(path));
                }
            }
        }

        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if !paths.contains(&current_dir) {
            paths.insert(0, current_dir);
        }

        Self {
            search_paths: paths,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Find and load a library by identifier and version
    pub fn resolve(&self, name: &str, version: Option<&str>) -> Result<Library> {
        self.resolve_near(name, version, None)
    }

    /// Like [`resolve`](Self::resolve), trying `fallback_dir` after the
    /// configured search paths
    fn resolve_near(
        &self,
        name: &str,
        version: Option<&str>,
        fallback_dir: Option<&Path>,
    ) -> Result<Library> {
        let patterns = if let Some(ver) = version {
            vec![
                format!("{}-{}.json", name, ver),
                format!("{}_{}.json", name, ver),
                format!("{}.json", name),
            ]
        } else {
            vec![format!("{}.json", name)]
        };

        for pattern in patterns {
            if let Some(path) = self.find_file(&pattern, fallback_dir) {
                return self.load_file(&path);
            }
        }

        Err(anyhow!(
            "Library not found: {} version {}",
            name,
            version.unwrap_or("(any)")
        ))
    }

    /// Load a library from a specific file
    pub fn resolve_path(&self, path: &Path) -> Result<Library> {
        self.load_file(path)
    }

    /// Load `path` and every library it transitively includes into a registry.
    ///
    /// The directory holding `path` is searched last for includes.
    pub fn load_with_includes(&self, path: &Path) -> Result<(Library, LibraryRegistry)> {
        let main = self.resolve_path(path)?;
        let input_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut registry = LibraryRegistry::new();
        let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
        seen.insert((main.id().to_string(), main.version().map(str::to_string)));

        let mut pending: VecDeque<Library> = VecDeque::from([main.clone()]);
        while let Some(library) = pending.pop_front() {
            let includes = library.includes.iter().flat_map(|defs| defs.defs.iter());
            for include in includes {
                let key = (include.path.clone(), include.version.clone());
                if !seen.insert(key) {
                    continue;
                }
                let included = self
                    .resolve_near(&include.path, include.version.as_deref(), Some(input_dir))
                    .with_context(|| {
                        format!(
                            "Failed to resolve include '{}' of library {}",
                            include.local_identifier,
                            library.id()
                        )
                    })?;
                log::debug!(
                    "loaded {} {}",
                    included.id(),
                    included.version().unwrap_or("(unversioned)")
                );
                pending.push_back(included.clone());
                registry.register(included);
            }
        }
        registry.register(main.clone());
        Ok((main, registry))
    }

    /// Find a file in the search paths, then in `fallback_dir`
    fn find_file(&self, filename: &str, fallback_dir: Option<&Path>) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(PathBuf::as_path)
            .chain(fallback_dir)
            .map(|dir| dir.join(filename))
            .find(|candidate| candidate.is_file())
    }

    fn load_file(&self, path: &Path) -> Result<Library> {
        let canonical_path = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

        if let Some(library) = self.cache.read().get(&canonical_path) {
            return Ok(library.clone());
        }

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read file: {}", canonical_path.display()))?;
        let library = Library::from_json(&content)
            .with_context(|| format!("Failed to parse ELM JSON: {}", canonical_path.display()))?;

        self.cache.write().insert(canonical_path, library.clone());
        Ok(library)
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Get the search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
