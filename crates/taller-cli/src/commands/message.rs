use std::path::Path;

use taller_core::db::{ConfigRepository, EntityStore};
use taller_core::notify::{
    render_message, resolve_tracking_url, DEFAULT_TRACKING_BASE, TEMPLATE_READY, TEMPLATE_STATUS,
};
use taller_core::{Client, Repair};
use uuid::Uuid;

use super::open_database;
use crate::cli::MessageTemplate;
use crate::error::CliError;

/// Render the outbound notification for a repair, sanitized for external
/// delivery. A postcondition failure surfaces as an error instead of a
/// leaking message.
pub fn run_message(
    repair_id: Uuid,
    template: MessageTemplate,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    let config = ConfigRepository::new(db.connection()).load()?;

    let repair: Repair = store.get(repair_id)?;
    let client: Client = store.get(repair.client_id)?;

    let url = resolve_tracking_url(
        config.tracking_base().as_deref(),
        &repair.id.to_string(),
    );
    let device = format!("{} {}", repair.brand, repair.model)
        .trim()
        .to_string();
    let id = repair.id.to_string();

    let vars = [
        ("CLIENT", client.name.as_str()),
        ("DEVICE", device.as_str()),
        ("ID", id.as_str()),
        ("STATUS", repair.status.as_str()),
        ("URL", url.as_str()),
    ];

    let template = match template {
        MessageTemplate::Ready => TEMPLATE_READY,
        MessageTemplate::Status => TEMPLATE_STATUS,
    };

    let message = render_message(template, &vars, DEFAULT_TRACKING_BASE)?;
    println!("{message}");
    Ok(())
}
