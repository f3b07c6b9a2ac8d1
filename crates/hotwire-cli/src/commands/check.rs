//! `hotwire check` command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use hotwire_runtime::{ModuleLayout, ScriptModuleLoader};

/// Entry module first, then IPC modules sorted by path
fn module_paths(layout: &ModuleLayout) -> anyhow::Result<Vec<PathBuf>> {
    let mut modules = Vec::new();
    if layout.ipc_dir().is_dir() {
        for entry in std::fs::read_dir(layout.ipc_dir())? {
            let path = entry?.path();
            if path.is_file() && layout.is_ipc_module(&path) {
                modules.push(path);
            }
        }
    }
    modules.sort();
    modules.insert(0, layout.entry().to_path_buf());
    Ok(modules)
}

/// Execute the `hotwire check` command
pub async fn run(dist: &Path) -> anyhow::Result<()> {
    let layout = ModuleLayout::new(dist);
    let loader = ScriptModuleLoader::default();

    println!("{} Checking modules in {}", "→".green(), dist.display().to_string().cyan());

    let mut failed = 0;
    for path in module_paths(&layout)? {
        let name = path.strip_prefix(layout.root()).unwrap_or(&path).display().to_string();
        match loader.check(&path).await {
            Ok(()) => println!("{} {}", "✓".green(), name.green()),
            Err(e) => {
                failed += 1;
                println!("{} {}", "✗".red(), name.red());
                println!("    {}", e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} module(s) failed to compile", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_module_paths_entry_first() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("ipc")).unwrap();
        std::fs::write(dir.path().join("ipc/b.rhai"), "").unwrap();
        std::fs::write(dir.path().join("ipc/a.rhai"), "").unwrap();
        std::fs::write(dir.path().join("ipc/readme.md"), "").unwrap();

        let paths = module_paths(&ModuleLayout::new(dir.path())).unwrap();

        assert_eq!(
            paths,
            vec![
                dir.path().join("index.rhai"),
                dir.path().join("ipc/a.rhai"),
                dir.path().join("ipc/b.rhai"),
            ]
        );
    }
}
