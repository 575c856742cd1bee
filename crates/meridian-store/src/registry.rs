//! Workspace registry for multi-workspace support.
//!
//! Manages multiple registered workspaces with persistent storage in global config.
//! Provides workspace registration, activation, and discovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use meridian_config::{ConfigLoader, PrismConfig, WorkspaceConfig};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::local::LocalBackend;

/// Information about a registered workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// Workspace name (user-defined or derived from path)
    pub name: String,

    /// Absolute path to workspace root
    pub path: PathBuf,

    /// Whether a graph exists for this workspace
    pub has_graph: bool,

    /// Whether the search index exists
    pub has_index: bool,

    /// Whether this is the active workspace
    pub is_active: bool,
}

/// Registry for managing multiple workspaces.
///
/// Provides:
/// - Workspace registration and persistence
/// - Active workspace selection
/// - Backend creation for individual workspaces
pub struct WorkspaceRegistry {
    /// Configuration loader (handles global config persistence)
    config_loader: ConfigLoader,

    /// Current configuration state
    config: Arc<RwLock<PrismConfig>>,

    /// Cached backends for registered workspaces
    backends: Arc<RwLock<HashMap<String, Arc<LocalBackend>>>>,
}

impl WorkspaceRegistry {
    /// Create a new workspace registry.
    ///
    /// Loads the global configuration to populate initial workspace list.
    pub async fn new() -> Result<Self, BackendError> {
        let mut config_loader = ConfigLoader::new();

        // Load global config (or use defaults)
        let config = config_loader
            .load_global()
            .map_err(|e| BackendError::with_context("loading global config", e.to_string()))?
            .unwrap_or_default();

        Ok(Self {
            config_loader,
            config: Arc::new(RwLock::new(config)),
            backends: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a registry with a specific configuration.
    ///
    /// Useful for testing or when configuration is already loaded.
    pub fn with_config(config: PrismConfig) -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: Arc::new(RwLock::new(config)),
            backends: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry with a custom config loader.
    ///
    /// Useful for testing with custom config directories.
    pub fn with_loader(config_loader: ConfigLoader, config: PrismConfig) -> Self {
        Self {
            config_loader,
            config: Arc::new(RwLock::new(config)),
            backends: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a workspace.
    ///
    /// # Arguments
    /// * `name` - Unique name for the workspace
    /// * `path` - Path to workspace root (will be canonicalized)
    ///
    /// # Returns
    /// The canonicalized path that was registered.
    pub async fn register(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, BackendError> {
        let name = name.into();
        let path = path.as_ref();

        // Canonicalize path
        let canonical_path = path
            .canonicalize()
            .map_err(|e| BackendError::with_context("canonicalizing path", e.to_string()))?;

        // Verify path exists and is a directory
        if !canonical_path.is_dir() {
            return Err(BackendError::with_context(
                "registering workspace",
                format!("'{}' is not a directory", canonical_path.display()),
            ));
        }

        info!("Registering workspace '{}' at {:?}", name, canonical_path);

        // Update config
        {
            let mut config = self.config.write().await;
            config
                .workspace
                .workspaces
                .insert(name.clone(), canonical_path.clone());
        }

        // Persist to global config
        self.save_config().await?;

        // Invalidate cached backend for this workspace
        {
            let mut backends = self.backends.write().await;
            backends.remove(&name);
        }

        Ok(canonical_path)
    }

    /// Unregister a workspace.
    ///
    /// Removes the workspace from the registry. Does not delete any files.
    pub async fn unregister(&self, name: &str) -> Result<bool, BackendError> {
        let removed = {
            let mut config = self.config.write().await;
            config.workspace.workspaces.remove(name).is_some()
        };

        if removed {
            info!("Unregistered workspace '{}'", name);

            // If this was the active workspace, clear active
            {
                let mut config = self.config.write().await;
                if config.workspace.active.as_deref() == Some(name) {
                    config.workspace.active = None;
                }
            }

            // Persist changes
            self.save_config().await?;

            // Remove cached backend
            {
                let mut backends = self.backends.write().await;
                backends.remove(name);
            }
        } else {
            warn!("Workspace '{}' not found in registry", name);
        }

        Ok(removed)
    }

    /// Get the active workspace name.
    pub async fn active(&self) -> Option<String> {
        let config = self.config.read().await;
        config.workspace.active.clone()
    }

    /// Set the active workspace.
    ///
    /// The workspace must be registered.
    pub async fn set_active(&self, name: &str) -> Result<(), BackendError> {
        // Verify workspace exists
        let exists = {
            let config = self.config.read().await;
            config.workspace.workspaces.contains_key(name)
        };

        if !exists {
            return Err(BackendError::with_context(
                "setting active workspace",
                format!("workspace '{}' not registered", name),
            ));
        }

        info!("Setting active workspace to '{}'", name);

        {
            let mut config = self.config.write().await;
            config.workspace.active = Some(name.to_string());
        }

        self.save_config().await
    }

    /// Clear the active workspace.
    pub async fn clear_active(&self) -> Result<(), BackendError> {
        {
            let mut config = self.config.write().await;
            config.workspace.active = None;
        }

        self.save_config().await
    }

    /// Get workspace path by name.
    pub async fn get(&self, name: &str) -> Option<PathBuf> {
        let config = self.config.read().await;
        config.workspace.workspaces.get(name).cloned()
    }

    /// Get the active workspace path.
    pub async fn active_path(&self) -> Option<PathBuf> {
        let config = self.config.read().await;
        config
            .workspace
            .active
            .as_ref()
            .and_then(|name| config.workspace.workspaces.get(name).cloned())
    }

    /// List all registered workspaces.
    pub async fn list(&self) -> Vec<WorkspaceInfo> {
        let config = self.config.read().await;
        let active = config.workspace.active.as_deref();

        config
            .workspace
            .workspaces
            .iter()
            .map(|(name, path)| {
                let prism_dir = config.prism_dir(path);
                let has_graph = prism_dir.join("manifest.json").exists();
                let has_index = has_graph; // Simplified check; could query Qdrant

                WorkspaceInfo {
                    name: name.clone(),
                    path: path.clone(),
                    has_graph,
                    has_index,
                    is_active: active == Some(name.as_str()),
                }
            })
            .collect()
    }

    /// Get workspace count.
    pub async fn count(&self) -> usize {
        let config = self.config.read().await;
        config.workspace.workspaces.len()
    }

    /// Check if cross-workspace search is enabled.
    pub async fn cross_workspace_search_enabled(&self) -> bool {
        let config = self.config.read().await;
        config.workspace.cross_workspace_search
    }

    /// Enable or disable cross-workspace search.
    pub async fn set_cross_workspace_search(&self, enabled: bool) -> Result<(), BackendError> {
        {
            let mut config = self.config.write().await;
            config.workspace.cross_workspace_search = enabled;
        }

        self.save_config().await
    }

    /// Get or create a backend for a workspace.
    ///
    /// Backends are cached for reuse.
    pub async fn backend(&self, name: &str) -> Result<Arc<LocalBackend>, BackendError> {
        // Check cache first
        {
            let backends = self.backends.read().await;
            if let Some(backend) = backends.get(name) {
                return Ok(Arc::clone(backend));
            }
        }

        // Get workspace path
        let path = self.get(name).await.ok_or_else(|| {
            BackendError::with_context(
                "getting backend",
                format!("workspace '{}' not registered", name),
            )
        })?;

        // Get config
        let config = self.config.read().await.clone();

        // Create backend
        let backend = LocalBackend::with_repo_id(&config, &path, name).await?;
        let backend = Arc::new(backend);

        // Cache it
        {
            let mut backends = self.backends.write().await;
            backends.insert(name.to_string(), Arc::clone(&backend));
        }

        debug!("Created backend for workspace '{}'", name);
        Ok(backend)
    }

    /// Get backend for the active workspace.
    pub async fn active_backend(&self) -> Result<Arc<LocalBackend>, BackendError> {
        let name = self.active().await.ok_or_else(|| {
            BackendError::with_context("getting active backend", "no active workspace set")
        })?;

        self.backend(&name).await
    }

    /// Get all backends for registered workspaces.
    ///
    /// Only returns backends for workspaces that have graphs.
    pub async fn all_backends(&self) -> Result<Vec<Arc<LocalBackend>>, BackendError> {
        let workspaces = self.list().await;
        let mut backends = Vec::new();

        for ws in workspaces {
            if ws.has_graph {
                match self.backend(&ws.name).await {
                    Ok(backend) => backends.push(backend),
                    Err(e) => {
                        warn!("Failed to create backend for '{}': {}", ws.name, e);
                    }
                }
            }
        }

        Ok(backends)
    }

    /// Get the current configuration.
    pub async fn config(&self) -> PrismConfig {
        self.config.read().await.clone()
    }

    /// Get the workspace configuration section.
    pub async fn workspace_config(&self) -> WorkspaceConfig {
        self.config.read().await.workspace.clone()
    }

    /// Save the current configuration to global config file.
    async fn save_config(&self) -> Result<(), BackendError> {
        let config = self.config.read().await.clone();

        self.config_loader
            .save_global(&config)
            .map_err(|e| BackendError::with_context("saving global config", e.to_string()))?;

        debug!("Saved workspace registry to global config");
        Ok(())
    }

    /// Auto-discover workspaces from a directory.
    ///
    /// Searches for directories containing `.meridian/manifest.json` up to max_depth.
    pub async fn discover(
        &self,
        root: impl AsRef<Path>,
        max_depth: usize,
    ) -> Result<Vec<PathBuf>, BackendError> {
        let root = root.as_ref();
        let mut discovered = Vec::new();

        self.discover_recursive(root, 0, max_depth, &mut discovered)?;

        info!(
            "Discovered {} workspaces under {:?}",
            discovered.len(),
            root
        );
        Ok(discovered)
    }

    #[allow(clippy::only_used_in_recursion)]
    fn discover_recursive(
        &self,
        dir: &Path,
        depth: usize,
        max_depth: usize,
        discovered: &mut Vec<PathBuf>,
    ) -> Result<(), BackendError> {
        if depth > max_depth {
            return Ok(());
        }

        // Check if this directory has a prism graph
        let prism_manifest = dir.join(".meridian").join("manifest.json");
        if prism_manifest.exists() {
            discovered.push(dir.to_path_buf());
        }

        // Recurse into subdirectories
        let entries = std::fs::read_dir(dir)
            .map_err(|e| BackendError::with_context("reading directory", e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                // Skip hidden directories and common excludes
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if !name.starts_with('.') && !matches!(name, "node_modules" | "target" | "vendor") {
                    self.discover_recursive(&path, depth + 1, max_depth, discovered)?;
                }
            }
        }

        Ok(())
    }

    /// Register all discovered workspaces.
    ///
    /// Names are derived from directory names or specified prefix.
    pub async fn register_discovered(
        &self,
        paths: &[PathBuf],
        prefix: Option<&str>,
    ) -> Result<usize, BackendError> {
        let mut registered = 0;

        for path in paths {
            let name = if let Some(prefix) = prefix {
                format!(
                    "{}/{}",
                    prefix,
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                )
            } else {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string()
            };

            match self.register(&name, path).await {
                Ok(_) => {
                    registered += 1;
                    info!("Registered '{}' at {:?}", name, path);
                }
                Err(e) => {
                    warn!("Failed to register {:?}: {}", path, e);
                }
            }
        }

        Ok(registered)
    }
}
