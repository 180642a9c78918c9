//! # Coalesce CLI
//!
//! Command implementations behind the `coalesce` binary:
//!
//! - `generate`: discover the model and run the configured root generator
//! - `validate`: report modelling errors and warnings without writing files
//! - `info`: summarise what discovery found
//!
//! The binary parses [`Cli`], installs tracing, then hands the command to
//! [`run`].

pub mod project;

pub use project::Project;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use coalesce_codegen::{GenerationContext, GenerationReport, Generator, root_generator};
use coalesce_model::{ReflectionRepository, ValidationResult, validate_repository};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file looked up when `--config` is not given
pub const DEFAULT_CONFIG: &str = "coalesce.json";

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "coalesce")]
#[command(version = VERSION)]
#[command(about = "Model-driven code generation for C# APIs and TypeScript clients")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate DTOs, controllers and the TypeScript client
    Generate {
        /// Path to coalesce.json
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// List the files that would be generated without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the model for errors without generating code
    Validate {
        /// Path to coalesce.json
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show what discovery found in the model
    Info {
        /// Path to coalesce.json
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

// ============================================================================
// Dispatch
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate { config, dry_run: true } => dry_run(&config).map(drop),
        Commands::Generate { config, .. } => generate(&config).await.map(drop),
        Commands::Validate { config } => validate(&config),
        Commands::Info { config } => {
            let project = Project::load(&config)?;
            print!("{}", summary(&project.repository));
            Ok(())
        }
    }
}

/// Discover and validate, then build the root generator. Validation errors
/// stop the run before anything is rendered.
fn load_generator(config: &Path) -> Result<Generator> {
    let project = Project::load(config)?;
    let validation = validate_repository(&project.repository);
    report_issues(&validation);
    if !validation.is_valid() {
        bail!(
            "model has {} error(s); nothing was generated",
            validation.errors.len()
        );
    }

    let ctx = Arc::new(GenerationContext::new(
        project.repository,
        project.config,
        &project.base_dir,
    ));
    Ok(Generator::new(root_generator(ctx)?))
}

/// Run the root generator and write its output
pub async fn generate(config: &Path) -> Result<GenerationReport> {
    let report = load_generator(config)?.run().await?;
    info!(
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        deleted = report.deleted.len(),
        "Generation finished"
    );
    for path in &report.written {
        println!("{} {}", "wrote".green(), path.display());
    }
    for path in &report.deleted {
        println!("{} {}", "deleted".yellow(), path.display());
    }
    print!("{}", report);
    Ok(report)
}

/// Paths `generate` would write, without touching the disk
pub fn dry_run(config: &Path) -> Result<Vec<PathBuf>> {
    let files = load_generator(config)?.render()?;
    for file in &files {
        println!("{} {}", "would write".cyan(), file.path.display());
    }
    println!("{} file(s)", files.len());
    Ok(files.into_iter().map(|f| f.path).collect())
}

pub fn validate(config: &Path) -> Result<()> {
    let project = Project::load(config)?;
    let validation = validate_repository(&project.repository);
    report_issues(&validation);
    if !validation.is_valid() {
        bail!("model has {} error(s)", validation.errors.len());
    }
    println!(
        "{} model is valid ({} warning(s))",
        "ok".green().bold(),
        validation.warnings.len()
    );
    Ok(())
}

fn report_issues(validation: &ValidationResult) {
    for issue in &validation.warnings {
        warn!(path = %issue.path, code = ?issue.code, "{}", issue.message);
        eprintln!("{} {}", "warning:".yellow().bold(), issue);
    }
    for issue in &validation.errors {
        eprintln!("{} {}", "error:".red().bold(), issue);
    }
}

// ============================================================================
// Info
// ============================================================================

/// One line per discovered category, then the CRUD models by name
pub fn summary(repo: &ReflectionRepository) -> String {
    let mut out = String::with_capacity(512);
    let rows = [
        ("Entities", repo.entities().count()),
        ("CRUD models", repo.crud_models().count()),
        ("External types", repo.external_types().count()),
        ("Services", repo.services().count()),
        ("Data sources", repo.custom_data_sources().count()),
        ("Behaviors", repo.custom_behaviors().count()),
        ("Db contexts", repo.db_contexts().count()),
        ("Enums", repo.enums().len()),
    ];
    for (label, count) in rows {
        out.push_str(&format!("{:<16}{}\n", format!("{}:", label), count));
    }

    let mut names: Vec<&str> = repo.crud_models().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    if !names.is_empty() {
        out.push_str(&format!("\n{}\n", names.join(", ")));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project_dir() -> TempDir {
        project_dir_with(serde_json::json!({}))
    }

    fn project_dir_with(generator_config: serde_json::Value) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, text) in testing::sources() {
            let target = dir.path().join("Data").join(path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, text).unwrap();
        }
        let config = serde_json::json!({
            "webProject": { "rootDirectory": "Web", "rootNamespace": "MyProject.Web" },
            "dataProject": { "rootDirectory": "Data" },
            "generatorConfig": generator_config
        });
        std::fs::write(dir.path().join(DEFAULT_CONFIG), config.to_string()).unwrap();
        dir
    }

    // ── arguments ──

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from(["coalesce", "generate", "--dry-run", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Generate { config, dry_run } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG));
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_help_lists_commands() {
        let help = Cli::command().render_help().to_string();
        for command in ["generate", "validate", "info"] {
            assert!(help.contains(command), "{} missing from help", command);
        }
    }

    #[test]
    fn test_parse_requires_command() {
        assert!(Cli::try_parse_from(["coalesce"]).is_err());
        assert!(Cli::try_parse_from(["coalesce", "info", "-c", "x/coalesce.json"]).is_ok());
    }

    // ── commands ──

    #[tokio::test]
    async fn test_generate_writes_output() {
        let dir = project_dir();
        let report = generate(&dir.path().join(DEFAULT_CONFIG)).await.unwrap();
        assert!(!report.written.is_empty());

        let web = dir.path().join("Web");
        assert!(web.join("Models/Generated/PersonDtoGen.g.cs").is_file());
        assert!(web.join("Api/Generated/PersonController.g.cs").is_file());
        assert!(web.join("src/metadata.g.ts").is_file());
    }

    #[tokio::test]
    async fn test_regenerate_writes_nothing() {
        let dir = project_dir();
        let config = dir.path().join(DEFAULT_CONFIG);
        generate(&config).await.unwrap();

        let again = generate(&config).await.unwrap();
        assert_eq!(again.written, Vec::<PathBuf>::new());
        assert_eq!(again.deleted, Vec::<PathBuf>::new());
        assert!(!again.unchanged.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_suite_writes_no_typescript() {
        let dir = project_dir_with(serde_json::json!({ "Vue3Suite": { "disabled": true } }));
        let report = generate(&dir.path().join(DEFAULT_CONFIG)).await.unwrap();

        let web = dir.path().join("Web");
        assert!(web.join("Api/Generated/PersonController.g.cs").is_file());
        assert!(!web.join("src").exists());
        assert!(!report.written.iter().any(|p| p.extension().is_some_and(|e| e == "ts")));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = project_dir();
        let paths = dry_run(&dir.path().join(DEFAULT_CONFIG)).unwrap();
        assert!(paths.iter().any(|p| p.ends_with("PersonDtoGen.g.cs")));
        assert!(!dir.path().join("Web").exists());
    }

    #[test]
    fn test_validate() {
        let dir = project_dir();
        assert!(validate(&dir.path().join(DEFAULT_CONFIG)).is_ok());
    }

    #[tokio::test]
    async fn test_missing_config_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join(DEFAULT_CONFIG);
        let err = validate(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load"));

        let cli = Cli::try_parse_from(["coalesce", "generate", "-c", missing.to_str().unwrap()]).unwrap();
        assert!(run(cli).await.is_err());
    }

    #[tokio::test]
    async fn test_info_command() {
        let dir = project_dir();
        let config = dir.path().join(DEFAULT_CONFIG);
        let cli = Cli::try_parse_from(["coalesce", "info", "--config", config.to_str().unwrap()]).unwrap();
        assert!(run(cli).await.is_ok());
    }

    #[test]
    fn test_summary() {
        let text = summary(&testing::both()[0].repo);
        assert!(text.starts_with("Entities:"));
        assert!(text.contains("Services:       1\n"));
        assert!(text.contains("Data sources:   1\n"));
        assert!(text.contains("Person"));
    }
}
