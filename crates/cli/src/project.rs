//! Loading a `coalesce.json` project into a [`ReflectionRepository`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use coalesce_codegen::CoalesceConfig;
use coalesce_core::Persistable;
use coalesce_model::{AssemblyMetadata, Compilation, ReflectionRepository};

/// Build output directories never scanned for sources
const IGNORED_DIRS: &[&str] = &["bin", "obj", "node_modules", ".git"];

/// A configuration file with the model it describes
pub struct Project {
    pub config: CoalesceConfig,
    /// Directory relative paths in `config` resolve against
    pub base_dir: PathBuf,
    pub repository: Arc<ReflectionRepository>,
}

impl Project {
    /// Read `config_path` and discover its model, from the metadata snapshot
    /// when `metadataFile` is set, otherwise from the data project's C# sources
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = CoalesceConfig::load(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        let base_dir = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let paths = config.paths(&base_dir);

        let mut repository = ReflectionRepository::new();
        match &paths.metadata_file {
            Some(file) => {
                let assembly = AssemblyMetadata::load_from_file(file)
                    .with_context(|| format!("failed to read metadata {}", file.display()))?;
                info!(assembly = %assembly.name, types = assembly.types.len(), "Loaded reflection metadata");
                repository.add_assembly(&assembly)?;
            }
            None => {
                let sources = read_sources(&paths.data_root)?;
                info!(files = sources.len(), root = %paths.data_root.display(), "Parsing C# sources");
                let compilation = Compilation::from_sources(
                    sources.iter().map(|(path, text)| (path.as_str(), text.as_str())),
                )?;
                repository.add_compilation(&compilation)?;
            }
        }

        Ok(Self {
            config,
            base_dir,
            repository: Arc::new(repository),
        })
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// `(path, text)` of every `.cs` file under `root`, in path order
fn read_sources(root: &Path) -> Result<Vec<(String, String)>> {
    if !root.is_dir() {
        bail!("data project directory {} does not exist", root.display());
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("cs") {
            continue;
        }
        // generated output is not part of the model
        if path.to_string_lossy().ends_with(".g.cs") {
            continue;
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        debug!(path = %path.display(), "Read source");
        sources.push((path.display().to_string(), text));
    }

    if sources.is_empty() {
        bail!("no C# sources found under {}", root.display());
    }
    Ok(sources)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_sources(dir: &Path) {
        for (path, text) in testing::sources() {
            let target = dir.join("Data").join(path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, text).unwrap();
        }
    }

    fn write_config(dir: &Path, extra: &str) -> PathBuf {
        let path = dir.join("coalesce.json");
        std::fs::write(
            &path,
            format!(
                r#"{{
                    "webProject": {{ "rootDirectory": "Web", "rootNamespace": "MyProject.Web" }},
                    "dataProject": {{ "rootDirectory": "Data" }}{extra}
                }}"#
            ),
        )
        .unwrap();
        path
    }

    fn entity_names(repo: &ReflectionRepository) -> Vec<String> {
        let mut names: Vec<String> = repo.entities().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    // ── sources ──

    #[test]
    fn test_load_from_sources() {
        let dir = TempDir::new().unwrap();
        write_sources(dir.path());
        let project = Project::load(&write_config(dir.path(), "")).unwrap();

        assert_eq!(project.base_dir, dir.path());
        assert_eq!(
            entity_names(&project.repository),
            entity_names(&testing::both()[1].repo)
        );
        assert_eq!(project.repository.services().count(), 1);
    }

    #[test]
    fn test_build_output_is_skipped() {
        let dir = TempDir::new().unwrap();
        write_sources(dir.path());
        let obj = dir.path().join("Data/obj/Debug");
        std::fs::create_dir_all(&obj).unwrap();
        std::fs::write(obj.join("Broken.cs"), "public class {").unwrap();
        std::fs::write(dir.path().join("Data/Models/PersonDtoGen.g.cs"), "not c#").unwrap();

        assert!(Project::load(&write_config(dir.path(), "")).is_ok());
    }

    #[test]
    fn test_missing_data_project() {
        let dir = TempDir::new().unwrap();
        let err = Project::load(&write_config(dir.path(), "")).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    // ── metadata ──

    #[test]
    fn test_load_from_metadata_file() {
        let dir = TempDir::new().unwrap();
        testing::assembly()
            .save_to_file(&dir.path().join("model.json"))
            .unwrap();
        let config = write_config(dir.path(), r#", "metadataFile": "model.json""#);
        let project = Project::load(&config).unwrap();

        assert_eq!(
            entity_names(&project.repository),
            entity_names(&testing::both()[0].repo)
        );
    }

    #[test]
    fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("coalesce.json");
        std::fs::write(&path, "{ \"webProject\": 3 }").unwrap();
        let err = Project::load(&path).err().unwrap();
        assert!(format!("{:#}", err).contains("failed to load"));
    }
}
