//! `eo` - operator CLI for the EO certificate registry
//!
//! Usage:
//!   `eo import ./certificates.csv`
//!   `eo list --filter manufacturer=acme --sort-by year --sort-order asc`
//!   `eo stats --admin`

use anyhow::Context;
use clap::{Parser, Subcommand};
use eo_registry::{logging, services::ListParams, AppState, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eo")]
#[command(author, version, about = "EO certificate registry operator CLI")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk import certificates from an Excel workbook, CSV or JSON file
    Import {
        /// Path to the spreadsheet
        file: PathBuf,
    },

    /// List certificates
    List {
        /// Column filter as `key=value`; repeatable
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// Search term applied across the text columns
        #[arg(short = 'q', long)]
        search: Option<String>,

        #[arg(long)]
        sort_by: Option<String>,

        /// `asc` or `desc`
        #[arg(long)]
        sort_order: Option<String>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Print dashboard statistics
    Stats {
        /// Include admin-only figures
        #[arg(long)]
        admin: bool,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_simple_logging();

    let mut config = Config::load().context("Failed to load configuration")?;
    // The CLI acts as the local operator; HTTP auth does not apply.
    config.auth.enabled = false;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;

    match cli.command {
        Commands::Import { file } => {
            let outcome = state
                .importer
                .import_file(&file)
                .await
                .with_context(|| format!("Import of {} failed", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.error_count > 0 {
                eprintln!(
                    "{} row(s) imported, {} row(s) rejected",
                    outcome.success_count, outcome.error_count
                );
            }
        }
        Commands::List {
            filters,
            search,
            sort_by,
            sort_order,
            page,
            limit,
        } => {
            let mut items = filters;
            items.extend(sort_by.map(|v| ("sortBy".to_string(), v)));
            items.extend(sort_order.map(|v| ("sortOrder".to_string(), v)));
            items.push(("page".to_string(), page.to_string()));
            items.extend(limit.map(|v| ("limit".to_string(), v.to_string())));

            let params = ListParams::from_query_items(&items);
            let page = match search {
                Some(term) => state.certificates.search(&term, &params).await?,
                None => state.certificates.list(&params).await?,
            };
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Stats { admin } => {
            let dashboard = state.stats.dashboard(admin).await?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters() {
        assert_eq!(
            parse_filter("manufacturer = Acme").unwrap(),
            ("manufacturer".to_string(), "Acme".to_string())
        );
        assert!(parse_filter("manufacturer").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
