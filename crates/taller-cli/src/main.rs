//! Taller CLI - operate the repair-shop sync core from the terminal

mod cli;
mod commands;
mod error;

use std::env;
use std::path::PathBuf;

use clap::Parser;

use cli::{Cli, ClientCommands, Commands, InvoiceCommands, RepairCommands};
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taller=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Client { command } => match command {
            ClientCommands::Add { name, phone, email } => {
                commands::run_client_add(&name, &phone, &email, &db_path)?;
            }
            ClientCommands::List { limit, json } => {
                commands::run_client_list(limit, json, &db_path)?;
            }
            ClientCommands::Delete { id } => commands::run_client_delete(id, &db_path)?,
        },
        Commands::Repair { command } => match command {
            RepairCommands::Add {
                client_id,
                brand,
                model,
                description,
                price,
                estimated_date,
            } => commands::run_repair_add(
                client_id,
                &brand,
                &model,
                &description,
                price,
                estimated_date,
                &db_path,
            )?,
            RepairCommands::List { limit, json } => {
                commands::run_repair_list(limit, json, &db_path)?;
            }
            RepairCommands::Status { id, status } => {
                commands::run_repair_status(id, &status, &db_path)?;
            }
            RepairCommands::Delete { id } => commands::run_repair_delete(id, &db_path)?,
        },
        Commands::Invoice { command } => match command {
            InvoiceCommands::Add {
                client_id,
                number,
                items,
                iva,
                irpf,
            } => commands::run_invoice_add(client_id, &number, &items, iva, irpf, &db_path)?,
            InvoiceCommands::List { limit, json } => {
                commands::run_invoice_list(limit, json, &db_path)?;
            }
        },
        Commands::Setup { name, pin } => commands::run_setup(&name, &pin, &db_path)?,
        Commands::Sync { json } => commands::run_sync(json, &db_path).await?,
        Commands::Import { path, json } => commands::run_import(&path, json, &db_path)?,
        Commands::Message { id, template } => commands::run_message(id, template, &db_path)?,
        Commands::Purge { table, id } => commands::run_purge(table, id, &db_path).await?,
    }

    Ok(())
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TALLER_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taller")
        .join("taller.db")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{default_db_path, resolve_db_path};

    #[test]
    fn resolve_db_path_prefers_cli_argument() {
        let explicit = PathBuf::from("/tmp/explicit.db");
        assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn default_db_path_ends_with_app_file() {
        let path = default_db_path();
        assert!(path.ends_with("taller/taller.db"));
    }
}
