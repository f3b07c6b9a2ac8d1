//! Rhai module loader

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hotwire_kernel::{ModuleContext, ModuleEntry, ModuleError, ModuleLoader, ModuleResult};
use parking_lot::RwLock;
use rhai::{AST, Dynamic, Engine, Scope};
use tracing::{debug, info};

use super::api::{self, ScriptContext, ScriptRuntime};

/// Script engine limits
#[derive(Debug, Clone)]
pub struct ScriptLoaderConfig {
    /// Name of the function every module must define
    pub entry_fn: String,
    /// Maximum function call nesting
    pub max_call_levels: usize,
    /// Maximum operations per call, 0 for unlimited
    pub max_operations: u64,
}

impl Default for ScriptLoaderConfig {
    fn default() -> Self {
        Self {
            entry_fn: "main".to_string(),
            max_call_levels: 64,
            max_operations: 0,
        }
    }
}

/// A compiled module script
pub struct ScriptModule {
    path: PathBuf,
    entry_fn: String,
    runtime: ScriptRuntime,
}

impl ScriptModule {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleEntry for ScriptModule {
    fn invoke(&self, context: ModuleContext) -> ModuleResult<()> {
        let ctx = ScriptContext::new(&context, self.runtime.clone());
        let mut scope = Scope::new();

        self.runtime
            .engine()
            .call_fn::<Dynamic>(&mut scope, self.runtime.ast(), &self.entry_fn, (ctx,))
            .map(|_| ())
            .map_err(|e| ModuleError::EntryFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }
}

/// Loads `.rhai` modules and caches their compiled form by path
pub struct ScriptModuleLoader {
    engine: Arc<Engine>,
    config: ScriptLoaderConfig,
    cache: RwLock<HashMap<PathBuf, Arc<ScriptModule>>>,
}

impl ScriptModuleLoader {
    pub fn new(config: ScriptLoaderConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_operations(config.max_operations);
        api::register(&mut engine);

        Self {
            engine: Arc::new(engine),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ScriptLoaderConfig {
        &self.config
    }

    /// Read and compile `path` without caching or running it.
    pub async fn check(&self, path: &Path) -> ModuleResult<()> {
        self.compile(path).await.map(|_| ())
    }

    async fn compile(&self, path: &Path) -> ModuleResult<AST> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ModuleError::NotFound(path.to_path_buf())
            } else {
                ModuleError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let mut ast = self
            .engine
            .compile(&source)
            .map_err(|e| ModuleError::Compile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        ast.set_source(path.display().to_string());

        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == self.config.entry_fn && f.params.len() == 1);
        if !has_entry {
            return Err(ModuleError::MissingEntry {
                path: path.to_path_buf(),
                name: self.config.entry_fn.clone(),
            });
        }

        Ok(ast)
    }

    /// Number of cached modules
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for ScriptModuleLoader {
    fn default() -> Self {
        Self::new(ScriptLoaderConfig::default())
    }
}

#[async_trait]
impl ModuleLoader for ScriptModuleLoader {
    async fn load(&self, path: &Path) -> ModuleResult<Arc<dyn ModuleEntry>> {
        if let Some(module) = self.cache.read().get(path) {
            return Ok(module.clone());
        }

        let ast = self.compile(path).await?;
        let module = Arc::new(ScriptModule {
            path: path.to_path_buf(),
            entry_fn: self.config.entry_fn.clone(),
            runtime: ScriptRuntime::new(self.engine.clone(), Arc::new(ast), path.to_path_buf()),
        });

        self.cache.write().insert(path.to_path_buf(), module.clone());
        info!("Module compiled and cached: {:?}", path);
        Ok(module)
    }

    async fn evict(&self, path: &Path) -> bool {
        let evicted = self.cache.write().remove(path).is_some();
        if evicted {
            debug!("Evicted module {:?}", path);
        }
        evicted
    }

    fn is_cached(&self, path: &Path) -> bool {
        self.cache.read().contains_key(path)
    }
}
