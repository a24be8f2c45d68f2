use std::path::Path;

use serde::Serialize;
use taller_core::db::EntityStore;
use taller_core::models::RepairStatus;
use taller_core::Repair;
use uuid::Uuid;

use super::{open_database, short_id};
use crate::error::CliError;

pub fn run_repair_add(
    client_id: Uuid,
    brand: &str,
    model: &str,
    description: &str,
    price: Option<f64>,
    estimated_date: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());

    if !store.client_exists(client_id)? {
        return Err(CliError::ClientNotFound(client_id.to_string()));
    }

    let mut repair = Repair::new(client_id, brand, model, description);
    if let Some(price) = price {
        repair.price = price;
    }
    repair.estimated_date = estimated_date;
    store.save(&mut repair)?;

    println!("{}", repair.id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct RepairListItem {
    id: String,
    client_id: String,
    device: String,
    description: String,
    status: String,
    price: f64,
    updated_at: i64,
}

pub fn run_repair_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    let repairs: Vec<Repair> = store.list(limit)?;

    if as_json {
        let items = repairs
            .iter()
            .map(|repair| RepairListItem {
                id: repair.id.to_string(),
                client_id: repair.client_id.to_string(),
                device: device_label(repair),
                description: repair.description.clone(),
                status: repair.status.as_str().to_string(),
                price: repair.price,
                updated_at: repair.updated_at,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_repair_lines(&repairs) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_repair_status(id: Uuid, status: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());

    let mut repair: Repair = store.get(id)?;
    repair.status = RepairStatus::from(status.to_string());
    store.save(&mut repair)?;

    println!("{} {}", repair.id, repair.status.as_str());
    Ok(())
}

pub fn run_repair_delete(id: Uuid, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    store.soft_delete::<Repair>(id)?;
    println!("{id}");
    Ok(())
}

/// "Brand Model", or whichever half is present.
fn device_label(repair: &Repair) -> String {
    format!("{} {}", repair.brand, repair.model)
        .trim()
        .to_string()
}

fn format_repair_lines(repairs: &[Repair]) -> Vec<String> {
    repairs
        .iter()
        .map(|repair| {
            format!(
                "{:<8}  {:<20}  {:<12}  {:>8.2}  {}",
                short_id(repair.id),
                device_label(repair),
                repair.status.as_str(),
                repair.price,
                repair.description
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_label_trims_missing_halves() {
        let mut repair = Repair::new(Uuid::new_v4(), "Samsung", "A52", "x");
        assert_eq!(device_label(&repair), "Samsung A52");

        repair.brand = String::new();
        assert_eq!(device_label(&repair), "A52");

        repair.model = String::new();
        assert_eq!(device_label(&repair), "");
    }

    #[test]
    fn format_repair_lines_shows_status() {
        let repair = Repair::new(Uuid::new_v4(), "Apple", "iPhone 11", "Pantalla rota");
        let lines = format_repair_lines(std::slice::from_ref(&repair));
        assert!(lines[0].contains("pending"));
        assert!(lines[0].contains("Pantalla rota"));
    }
}
