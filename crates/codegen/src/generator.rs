//! # Generator Pipeline
//!
//! Generators form a tree: [`CompositeGenerator`]s own children and
//! [`Cleaner`]s, [`FileGenerator`]s produce the bytes of one file. A run
//! flattens the tree eagerly, then executes it.
//!
//! ## Pipeline
//!
//! ```text
//! root CompositeGenerator
//!         │
//!         ▼
//!   flatten()                      → GenerationPlan { files, cleaners }
//!         │
//!         ├──► spawn every FileGenerator (JoinSet)
//!         │       disabled / !should_generate → skipped
//!         │       build_output() → compare with disk → write if different
//!         │
//!         ├──► await all
//!         │
//!         ├──► spawn every Cleaner      → delete stale generated files
//!         │
//!         ▼
//!   GenerationReport { written, unchanged, skipped, deleted }
//! ```
//!
//! Cleaners only run after every file generator finished successfully, so a
//! cleaner never races a write and a failed run never deletes anything.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coalesce_codegen::{GenerationContext, Generator, RootGenerator};
//!
//! let ctx = Arc::new(GenerationContext::new(repo, config, "."));
//! let report = Generator::new(Box::new(RootGenerator::new(ctx))).run().await?;
//! println!("{}", report);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, info};
use walkdir::WalkDir;

use coalesce_core::{CoalesceError, CoalesceResult};

use crate::context::GenerationContext;
use crate::{FileType, GeneratedFile};

// ============================================================================
// Traits
// ============================================================================

/// Produces the content of one output file
pub trait FileGenerator: Send + Sync {
    /// Stable generator id (`Coalesce.Generators.ClassDto`)
    fn id(&self) -> &str;

    fn output_path(&self) -> &Path;

    fn is_disabled(&self) -> bool {
        false
    }

    /// Checked after `is_disabled`; `false` skips the file for this run
    fn should_generate(&self) -> bool {
        true
    }

    fn build_output(&self) -> CoalesceResult<Vec<u8>>;

    fn file_type(&self) -> FileType {
        FileType::from_path(self.output_path())
    }
}

/// A generator made of other generators
pub trait CompositeGenerator: Send + Sync {
    fn id(&self) -> &str;

    /// A disabled composite contributes no children and no cleaners
    fn is_disabled(&self) -> bool {
        false
    }

    fn children(&self) -> CoalesceResult<Vec<GeneratorNode>>;

    fn cleaners(&self) -> Vec<Arc<dyn Cleaner>> {
        Vec::new()
    }
}

/// Removes files that earlier runs generated but this run did not
pub trait Cleaner: Send + Sync {
    fn directory(&self) -> &Path;

    /// Delete stale files; `produced` holds every path planned this run.
    /// Returns the deleted paths.
    fn clean(&self, produced: &HashSet<PathBuf>) -> CoalesceResult<Vec<PathBuf>>;
}

/// Generators with a typed section in `generatorConfig`
pub trait Configurable {
    /// Full id; settings are also found by the last segment
    const ID: &'static str;

    type Settings: DeserializeOwned + Default;

    fn settings(ctx: &GenerationContext) -> CoalesceResult<Self::Settings> {
        ctx.settings(Self::ID)
    }
}

pub enum GeneratorNode {
    File(Arc<dyn FileGenerator>),
    Composite(Box<dyn CompositeGenerator>),
}

impl GeneratorNode {
    pub fn file(generator: impl FileGenerator + 'static) -> Self {
        GeneratorNode::File(Arc::new(generator))
    }

    pub fn composite(generator: impl CompositeGenerator + 'static) -> Self {
        GeneratorNode::Composite(Box::new(generator))
    }
}

// ============================================================================
// Plan
// ============================================================================

/// The flattened generator tree
#[derive(Default)]
pub struct GenerationPlan {
    pub files: Vec<Arc<dyn FileGenerator>>,
    pub cleaners: Vec<Arc<dyn Cleaner>>,
}

impl GenerationPlan {
    /// Flatten `root` and every descendant
    ///
    /// Fails when two file generators target the same path.
    pub fn flatten(root: &dyn CompositeGenerator) -> CoalesceResult<Self> {
        let mut plan = Self::default();
        plan.collect(root)?;

        let mut seen = HashSet::new();
        for file in &plan.files {
            if !seen.insert(file.output_path().to_path_buf()) {
                return Err(CoalesceError::codegen(format!(
                    "More than one generator writes '{}'",
                    file.output_path().display()
                )));
            }
        }
        Ok(plan)
    }

    fn collect(&mut self, composite: &dyn CompositeGenerator) -> CoalesceResult<()> {
        if composite.is_disabled() {
            debug!(generator = composite.id(), "Composite generator disabled");
            return Ok(());
        }
        self.cleaners.extend(composite.cleaners());
        for child in composite.children()? {
            match child {
                GeneratorNode::File(file) => self.files.push(file),
                GeneratorNode::Composite(inner) => self.collect(inner.as_ref())?,
            }
        }
        Ok(())
    }

    /// Every planned output path, disabled generators included
    pub fn output_paths(&self) -> HashSet<PathBuf> {
        self.files
            .iter()
            .map(|f| f.output_path().to_path_buf())
            .collect()
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Runs a generator tree against the file system
pub struct Generator {
    root: Box<dyn CompositeGenerator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Written,
    Unchanged,
    Skipped,
}

impl Generator {
    pub fn new(root: Box<dyn CompositeGenerator>) -> Self {
        Self { root }
    }

    /// Generate every file, then clean stale output
    pub async fn run(&self) -> CoalesceResult<GenerationReport> {
        // ── 1. Flatten ───────────────────────────────────────────────────
        let plan = GenerationPlan::flatten(self.root.as_ref())?;
        debug!(
            generator = self.root.id(),
            files = plan.files.len(),
            cleaners = plan.cleaners.len(),
            "Flattened generator tree"
        );

        // ── 2. File generators, all spawned before any is awaited ───────
        let mut tasks = JoinSet::new();
        for file in &plan.files {
            let file = Arc::clone(file);
            tasks.spawn(async move {
                let path = file.output_path().to_path_buf();
                generate_file(file).await.map(|outcome| (path, outcome))
            });
        }

        let mut report = GenerationReport::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| CoalesceError::internal(format!("Generator task failed: {}", e)))
                .and_then(|r| r);
            match result {
                Ok((path, FileOutcome::Written)) => report.written.push(path),
                Ok((path, FileOutcome::Unchanged)) => report.unchanged.push(path),
                Ok((path, FileOutcome::Skipped)) => report.skipped.push(path),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        // ── 3. Cleaners ──────────────────────────────────────────────────
        let produced = Arc::new(plan.output_paths());
        let mut cleaners = JoinSet::new();
        for cleaner in &plan.cleaners {
            let cleaner = Arc::clone(cleaner);
            let produced = Arc::clone(&produced);
            cleaners.spawn_blocking(move || cleaner.clean(&produced));
        }
        while let Some(joined) = cleaners.join_next().await {
            let deleted = joined
                .map_err(|e| CoalesceError::internal(format!("Cleaner task failed: {}", e)))??;
            report.deleted.extend(deleted);
        }

        report.sort();
        info!(
            files = plan.files.len(),
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            deleted = report.deleted.len(),
            "code generation complete"
        );
        Ok(report)
    }

    /// Build every enabled file in memory without touching the disk
    pub fn render(&self) -> CoalesceResult<Vec<GeneratedFile>> {
        let plan = GenerationPlan::flatten(self.root.as_ref())?;
        let mut files = Vec::with_capacity(plan.files.len());
        for file in plan.files {
            if file.is_disabled() || !file.should_generate() {
                continue;
            }
            let bytes = file.build_output()?;
            let content = String::from_utf8(bytes).map_err(|e| {
                CoalesceError::codegen(format!("{} produced invalid UTF-8: {}", file.id(), e))
            })?;
            files.push(GeneratedFile::new(file.output_path(), content, file.file_type()));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("root", &self.root.id()).finish()
    }
}

async fn generate_file(file: Arc<dyn FileGenerator>) -> CoalesceResult<FileOutcome> {
    let path = file.output_path();
    if file.is_disabled() || !file.should_generate() {
        debug!(generator = file.id(), path = %path.display(), "Skipped");
        return Ok(FileOutcome::Skipped);
    }

    let output = file.build_output()?;
    if let Ok(existing) = tokio::fs::read(path).await {
        if existing == output {
            debug!(path = %path.display(), "Unchanged");
            return Ok(FileOutcome::Unchanged);
        }
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoalesceError::DirectoryCreate {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
    }
    tokio::fs::write(path, &output)
        .await
        .map_err(|e| CoalesceError::FileWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    debug!(generator = file.id(), path = %path.display(), bytes = output.len(), "Wrote");
    Ok(FileOutcome::Written)
}

// ============================================================================
// DirectoryCleaner
// ============================================================================

/// Deletes files ending in `suffix` under a directory that the current run
/// did not produce
#[derive(Debug, Clone)]
pub struct DirectoryCleaner {
    directory: PathBuf,
    suffix: String,
    recursive: bool,
}

impl DirectoryCleaner {
    pub fn new(directory: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            suffix: suffix.into(),
            recursive: true,
        }
    }

    /// Only look at the directory's own files
    pub fn shallow(mut self) -> Self {
        self.recursive = false;
        self
    }
}

impl Cleaner for DirectoryCleaner {
    fn directory(&self) -> &Path {
        &self.directory
    }

    fn clean(&self, produced: &HashSet<PathBuf>) -> CoalesceResult<Vec<PathBuf>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }
        let walker = WalkDir::new(&self.directory).max_depth(if self.recursive { usize::MAX } else { 1 });

        let mut deleted = Vec::new();
        for entry in walker.into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_generated = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&self.suffix));
            if !is_generated || produced.contains(entry.path()) {
                continue;
            }
            std::fs::remove_file(entry.path()).map_err(|e| CoalesceError::FileDelete {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
            debug!(path = %entry.path().display(), "Deleted stale generated file");
            deleted.push(entry.path().to_path_buf());
        }
        Ok(deleted)
    }
}

// ============================================================================
// GenerationReport
// ============================================================================

/// What a run did to each path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl GenerationReport {
    pub fn total_files(&self) -> usize {
        self.written.len() + self.unchanged.len() + self.skipped.len()
    }

    /// Whether anything on disk changed
    pub fn has_changes(&self) -> bool {
        !self.written.is_empty() || !self.deleted.is_empty()
    }

    fn sort(&mut self) {
        self.written.sort();
        self.unchanged.sort();
        self.skipped.sort();
        self.deleted.sort();
    }

    /// Format the report as a human-readable box
    pub fn display(&self) -> String {
        let mut out = String::with_capacity(512);

        out.push_str("╔══════════════════════════════════════════════════╗\n");
        out.push_str("║         Code Generation Complete                 ║\n");
        out.push_str("╠══════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Total Files: {:<35}║\n", self.total_files()));
        out.push_str(&format!("║    Written:   {:<35}║\n", self.written.len()));
        out.push_str(&format!("║    Unchanged: {:<35}║\n", self.unchanged.len()));
        out.push_str(&format!("║    Skipped:   {:<35}║\n", self.skipped.len()));
        out.push_str(&format!("║  Deleted:     {:<35}║\n", self.deleted.len()));
        out.push_str("╚══════════════════════════════════════════════════╝\n");

        out
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        path: PathBuf,
        content: &'static str,
        disabled: bool,
        builds: Arc<AtomicUsize>,
    }

    impl FileGenerator for Fixed {
        fn id(&self) -> &str {
            "Test.Fixed"
        }

        fn output_path(&self) -> &Path {
            &self.path
        }

        fn is_disabled(&self) -> bool {
            self.disabled
        }

        fn build_output(&self) -> CoalesceResult<Vec<u8>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.as_bytes().to_vec())
        }
    }

    struct Failing(PathBuf);

    impl FileGenerator for Failing {
        fn id(&self) -> &str {
            "Test.Failing"
        }

        fn output_path(&self) -> &Path {
            &self.0
        }

        fn build_output(&self) -> CoalesceResult<Vec<u8>> {
            Err(CoalesceError::codegen("boom"))
        }
    }

    struct Suite {
        dir: PathBuf,
        names: Vec<(&'static str, &'static str)>,
        disabled_name: Option<&'static str>,
        nested: Option<Box<Suite>>,
        fail: bool,
        builds: Arc<AtomicUsize>,
    }

    impl Suite {
        fn new(dir: &Path, names: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                dir: dir.to_path_buf(),
                names,
                disabled_name: None,
                nested: None,
                fail: false,
                builds: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CompositeGenerator for Suite {
        fn id(&self) -> &str {
            "Test.Suite"
        }

        fn children(&self) -> CoalesceResult<Vec<GeneratorNode>> {
            let mut children: Vec<GeneratorNode> = self
                .names
                .iter()
                .map(|&(name, content)| {
                    GeneratorNode::file(Fixed {
                        path: self.dir.join(name),
                        content,
                        disabled: Some(name) == self.disabled_name,
                        builds: self.builds.clone(),
                    })
                })
                .collect();
            if self.fail {
                children.push(GeneratorNode::file(Failing(self.dir.join("bad.g.cs"))));
            }
            if let Some(nested) = &self.nested {
                children.push(GeneratorNode::Composite(Box::new(Suite {
                    dir: nested.dir.clone(),
                    names: nested.names.clone(),
                    disabled_name: None,
                    nested: None,
                    fail: false,
                    builds: nested.builds.clone(),
                })));
            }
            Ok(children)
        }

        fn cleaners(&self) -> Vec<Arc<dyn Cleaner>> {
            vec![Arc::new(DirectoryCleaner::new(&self.dir, ".g.cs"))]
        }
    }

    // ── flattening ───────────────────────────────────────────────────────

    #[test]
    fn test_flatten_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut suite = Suite::new(dir.path(), vec![("a.g.cs", "a")]);
        suite.nested = Some(Box::new(Suite::new(&dir.path().join("inner"), vec![("b.g.cs", "b")])));
        let plan = GenerationPlan::flatten(&suite).unwrap();
        assert_eq!(plan.files.len(), 2);
        // one per composite, the nested suite included
        assert_eq!(plan.cleaners.len(), 2);
    }

    #[test]
    fn test_flatten_rejects_duplicate_paths() {
        let dir = tempfile::tempdir().unwrap();
        let suite = Suite::new(dir.path(), vec![("a.g.cs", "a"), ("a.g.cs", "again")]);
        assert!(GenerationPlan::flatten(&suite).is_err());
    }

    // ── running ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let make = || Suite::new(dir.path(), vec![("a.g.cs", "class A {}"), ("b.g.cs", "class B {}")]);

        let first = Generator::new(Box::new(make())).run().await.unwrap();
        assert_eq!(first.written.len(), 2);
        let modified = std::fs::metadata(dir.path().join("a.g.cs")).unwrap().modified().unwrap();

        let second = Generator::new(Box::new(make())).run().await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 2);
        assert!(!second.has_changes());
        assert_eq!(
            std::fs::metadata(dir.path().join("a.g.cs")).unwrap().modified().unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn test_disabled_generator_is_skipped_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.g.cs"), "old").unwrap();
        let mut suite = Suite::new(dir.path(), vec![("a.g.cs", "a"), ("b.g.cs", "b")]);
        suite.disabled_name = Some("b.g.cs");
        let builds = suite.builds.clone();

        let report = Generator::new(Box::new(suite)).run().await.unwrap();
        assert_eq!(report.skipped, vec![dir.path().join("b.g.cs")]);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("b.g.cs")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_cleaner_removes_only_stale_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Old.g.cs"), "stale").unwrap();
        std::fs::write(dir.path().join("Handwritten.cs"), "mine").unwrap();

        let report = Generator::new(Box::new(Suite::new(dir.path(), vec![("a.g.cs", "a")])))
            .run()
            .await
            .unwrap();
        assert_eq!(report.deleted, vec![dir.path().join("Old.g.cs")]);
        assert!(!dir.path().join("Old.g.cs").exists());
        assert!(dir.path().join("Handwritten.cs").exists());
        assert!(dir.path().join("a.g.cs").exists());
    }

    #[tokio::test]
    async fn test_failed_run_cleans_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Old.g.cs"), "stale").unwrap();
        let mut suite = Suite::new(dir.path(), vec![("a.g.cs", "a")]);
        suite.fail = true;

        let err = Generator::new(Box::new(suite)).run().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(dir.path().join("Old.g.cs").exists());
    }

    #[test]
    fn test_render_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let files = Generator::new(Box::new(Suite::new(dir.path(), vec![("b.g.cs", "b"), ("a.g.cs", "a")])))
            .render()
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content, "a");
        assert_eq!(files[0].file_type, FileType::CSharp);
        assert!(!dir.path().join("a.g.cs").exists());
    }

    #[test]
    fn test_report_display() {
        let report = GenerationReport {
            written: vec![PathBuf::from("a")],
            unchanged: vec![PathBuf::from("b"), PathBuf::from("c")],
            ..Default::default()
        };
        assert_eq!(report.total_files(), 3);
        let text = report.to_string();
        assert!(text.contains("Written:   1"));
        assert!(text.contains("Unchanged: 2"));
    }
}
