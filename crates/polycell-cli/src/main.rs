//! polycell CLI - run notebook fragments through the execution engine.

mod colors;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use polycell_core::{
    Dialect, EngineConfig, Language, SystemToolchains, Toolchain, ToolchainResolver,
    extract_imports, transform_for_return,
};

#[derive(Parser)]
#[command(name = "polycell")]
#[command(about = "Execute polyglot notebook fragments out of process")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a fragment and print its result
    Run {
        /// Source file, or `-` for stdin
        source: String,

        /// Language tag (python, rust, javascript, typescript)
        #[arg(short, long)]
        lang: Option<String>,

        /// Cell id echoed back in the result
        #[arg(long, default_value = "cli")]
        cell_id: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a JavaScript or TypeScript fragment after return-wrapping
    Transform {
        /// Source file, or `-` for stdin
        source: String,

        /// Language tag (js or ts)
        #[arg(short, long)]
        lang: String,
    },

    /// Show which executable each toolchain resolves to
    Toolchains,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            source,
            lang,
            cell_id,
            json,
        } => {
            let code = read_source(&source)?;
            let language = resolve_language(&source, lang.as_deref())?;
            run::execute(config, &code, language, &cell_id, json).await
        }

        Commands::Transform { source, lang } => {
            let code = read_source(&source)?;
            println!("{}", transform(&code, lang.parse()?)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Toolchains => {
            let resolver = SystemToolchains::new(config.toolchains);
            for toolchain in Toolchain::ALL {
                match resolver.resolve(toolchain) {
                    Some(path) => println!("{}: {}", toolchain, path.display()),
                    None => println!(
                        "{}: {}not found{}",
                        toolchain,
                        colors::YELLOW,
                        colors::RESET
                    ),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_source(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(source).with_context(|| format!("failed to read {}", source))
}

fn resolve_language(source: &str, tag: Option<&str>) -> anyhow::Result<Language> {
    if let Some(tag) = tag {
        return Ok(tag.parse()?);
    }
    Path::new(source)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Language::from_extension)
        .with_context(|| format!("cannot infer language of '{}'; pass --lang", source))
}

fn transform(code: &str, language: Language) -> anyhow::Result<String> {
    match language {
        Language::JavaScript => Ok(transform_for_return(code, Dialect::JavaScript)),
        Language::TypeScript => {
            let extracted = extract_imports(code);
            let body = transform_for_return(&extracted.body, Dialect::TypeScript);
            Ok(extracted
                .imports
                .into_iter()
                .chain(std::iter::once(body))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        other => bail!("transform supports javascript and typescript, not {}", other),
    }
}
