use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use taller_core::EntityKind;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taller")]
#[command(about = "Manage repair-shop clients, repairs and invoices from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage clients
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Manage repairs
    Repair {
        #[command(subcommand)]
        command: RepairCommands,
    },
    /// Manage invoices
    Invoice {
        #[command(subcommand)]
        command: InvoiceCommands,
    },
    /// First-run setup: create the first admin and retire the rescue account
    Setup {
        /// Admin display name
        #[arg(long)]
        name: String,
        /// 4-digit PIN
        #[arg(long)]
        pin: String,
    },
    /// Run one sync cycle against the remote backend
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a backup archive
    Import {
        /// Path to the zip archive
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the notification message for a repair
    Message {
        /// Repair id
        id: Uuid,
        /// Template to render
        #[arg(long, value_enum, default_value_t = MessageTemplate::Ready)]
        template: MessageTemplate,
    },
    /// Hard-delete a fully synced tombstone, remote side first
    Purge {
        /// Table name (clients, repairs, invoices, users)
        table: EntityKind,
        /// Row id
        id: Uuid,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum MessageTemplate {
    Ready,
    Status,
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new client
    Add {
        /// Client name
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// List recent clients
    List {
        /// Number of clients to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a client
    Delete {
        /// Client id
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum RepairCommands {
    /// Register a device intake for a client
    Add {
        /// Owning client id
        client_id: Uuid,
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long, default_value = "")]
        model: String,
        /// Problem description
        #[arg(long)]
        description: String,
        /// Quoted price
        #[arg(long)]
        price: Option<f64>,
        /// Estimated completion date
        #[arg(long, value_name = "DATE")]
        estimated_date: Option<String>,
    },
    /// List recent repairs
    List {
        /// Number of repairs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update the workflow status of a repair
    Status {
        /// Repair id
        id: Uuid,
        /// New status (pending, in_progress, ready, delivered, ...)
        status: String,
    },
    /// Soft-delete a repair
    Delete {
        /// Repair id
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Issue an invoice for a client
    Add {
        /// Owning client id
        client_id: Uuid,
        /// Human-facing invoice number, unique across invoices
        #[arg(long)]
        number: String,
        /// Line item as CONCEPT:PRICE[:QTY]; repeatable
        #[arg(long = "item", value_name = "CONCEPT:PRICE[:QTY]")]
        items: Vec<String>,
        /// IVA percentage
        #[arg(long, default_value = "21.0")]
        iva: f64,
        /// IRPF withholding percentage
        #[arg(long, default_value = "0.0")]
        irpf: f64,
    },
    /// List recent invoices
    List {
        /// Number of invoices to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
