//! CLI argument parsing for editchunk

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::interpolate::Variables;

#[derive(Parser, Debug)]
#[command(name = "ec")]
#[command(author, version, about = "Resolve CMS content chunks into renderable text", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the interpolated content of a chunk
    Content {
        /// Chunk identifier
        #[arg(required = true)]
        identifier: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Print one field of a collection item
    Field {
        /// Chunk identifier
        #[arg(required = true)]
        identifier: String,

        /// Field slug or display name
        #[arg(required = true)]
        field: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Show chunk metadata
    Show {
        /// Chunk identifier
        #[arg(required = true)]
        identifier: String,

        /// Branch to fetch
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Print the cache key for a chunk
    CacheKey {
        /// Chunk identifier
        #[arg(required = true)]
        identifier: String,

        /// Branch to fetch
        #[arg(short, long)]
        branch: Option<String>,
    },
}

/// Options shared by the rendering commands
#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Branch to fetch
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Token value as KEY=VALUE (repeatable)
    #[arg(short = 'v', long = "var", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Insert values without the <em-var> marker
    #[arg(long)]
    pub raw: bool,
}

impl RenderArgs {
    pub fn variables(&self) -> Variables {
        self.vars.iter().cloned().collect()
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(parse_key_val("name=Sam").unwrap(), ("name".to_string(), "Sam".to_string()));
        assert_eq!(parse_key_val("eq=a=b").unwrap(), ("eq".to_string(), "a=b".to_string()));
        assert_eq!(parse_key_val("blank=").unwrap(), ("blank".to_string(), String::new()));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_field_command() {
        let cli = Cli::parse_from(["ec", "field", "cnk_1", "Title", "-v", "x=Y", "--raw", "-b", "brn"]);
        match cli.command {
            Command::Field {
                identifier,
                field,
                render,
            } => {
                assert_eq!(identifier, "cnk_1");
                assert_eq!(field, "Title");
                assert!(render.raw);
                assert_eq!(render.branch.as_deref(), Some("brn"));
                assert_eq!(render.variables().get("x").map(String::as_str), Some("Y"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
