use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use editchunk::cli::{Cli, Command};
use editchunk::config::Config;
use editchunk::{ChunkResolver, ResolveOptions};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize logging: {}", e))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("editchunk starting");

    match cli.command {
        Command::CacheKey { identifier, branch } => {
            let key = editchunk::CacheKey::new(&config.project_id, branch.as_deref(), &identifier);
            println!("{}", key);
        }
        Command::Content { identifier, render } => {
            config.validate()?;
            let resolver = ChunkResolver::from_config(&config)?;
            let options = render_options(render.branch.clone(), render.variables(), render.raw);
            let chunk = resolver
                .resolve(&identifier, options)
                .await
                .context(format!("Failed to resolve chunk {}", identifier))?;
            println!("{}", chunk.content()?);
        }
        Command::Field {
            identifier,
            field,
            render,
        } => {
            config.validate()?;
            let resolver = ChunkResolver::from_config(&config)?;
            let options = render_options(render.branch.clone(), render.variables(), render.raw);
            let chunk = resolver
                .resolve(&identifier, options)
                .await
                .context(format!("Failed to resolve chunk {}", identifier))?;
            println!("{}", chunk.field(&field)?);
        }
        Command::Show { identifier, branch } => {
            config.validate()?;
            let resolver = ChunkResolver::from_config(&config)?;
            let mut options = ResolveOptions::new().raw(true);
            options.branch_id = branch;
            let chunk = resolver
                .resolve(&identifier, options)
                .await
                .context(format!("Failed to resolve chunk {}", identifier))?;

            println!("Chunk: {}", chunk.identifier().cyan());
            println!("  Type: {}", chunk.chunk_type());
            println!("  Branch: {}", chunk.branch_id().unwrap_or("-"));
            println!("  Cache key: {}", chunk.cache_key().to_string().dimmed());
            if let Some(collection_id) = chunk.collection_id() {
                println!("  Collection: {}", collection_id.yellow());
                for f in chunk.fields() {
                    println!("    {} ({})", f.field_name, f.field_identifier.dimmed());
                }
            }
            let mut fallbacks: Vec<_> = chunk.variable_fallbacks().iter().collect();
            fallbacks.sort();
            for (name, value) in fallbacks {
                println!("  {{{{{}}}}} = {}", name.green(), value);
            }
        }
    }

    Ok(())
}

fn render_options(branch: Option<String>, variables: editchunk::Variables, raw: bool) -> ResolveOptions {
    let mut options = ResolveOptions::new().variables(variables).raw(raw);
    options.branch_id = branch;
    options
}
