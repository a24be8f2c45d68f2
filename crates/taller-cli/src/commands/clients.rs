use std::path::Path;

use serde::Serialize;
use taller_core::db::EntityStore;
use taller_core::Client;
use uuid::Uuid;

use super::{open_database, short_id};
use crate::error::CliError;

pub fn run_client_add(
    name: &str,
    phone: &str,
    email: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());

    let mut client = Client::new(name, phone, email);
    store.save(&mut client)?;

    println!("{}", client.id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ClientListItem {
    id: String,
    name: String,
    phone: String,
    email: String,
    updated_at: i64,
}

pub fn run_client_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    let clients: Vec<Client> = store.list(limit)?;

    if as_json {
        let items = clients
            .iter()
            .map(|client| ClientListItem {
                id: client.id.to_string(),
                name: client.name.clone(),
                phone: client.phone.clone(),
                email: client.email.clone(),
                updated_at: client.updated_at,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_client_lines(&clients) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_client_delete(id: Uuid, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    store.soft_delete::<Client>(id)?;
    println!("{id}");
    Ok(())
}

fn format_client_lines(clients: &[Client]) -> Vec<String> {
    clients
        .iter()
        .map(|client| {
            format!(
                "{:<8}  {:<24}  {:<14}  {}",
                short_id(client.id),
                client.name,
                client.phone,
                client.email
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_client_lines_includes_short_id_and_name() {
        let client = Client::new("Ana García", "600111222", "ana@example.com");
        let lines = format_client_lines(std::slice::from_ref(&client));

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(&short_id(client.id)));
        assert!(lines[0].contains("Ana García"));
        assert!(lines[0].contains("600111222"));
    }
}
