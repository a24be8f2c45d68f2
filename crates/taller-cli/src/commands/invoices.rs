use std::path::Path;

use serde::Serialize;
use taller_core::db::EntityStore;
use taller_core::models::LineItem;
use taller_core::Invoice;
use uuid::Uuid;

use super::{open_database, short_id};
use crate::error::CliError;

pub fn run_invoice_add(
    client_id: Uuid,
    number: &str,
    item_specs: &[String],
    iva: f64,
    irpf: f64,
    db_path: &Path,
) -> Result<(), CliError> {
    if item_specs.is_empty() {
        return Err(CliError::EmptyInvoice);
    }
    let items = item_specs
        .iter()
        .map(|spec| parse_line_item(spec))
        .collect::<Result<Vec<_>, _>>()?;

    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());

    if !store.client_exists(client_id)? {
        return Err(CliError::ClientNotFound(client_id.to_string()));
    }

    let mut invoice = Invoice::new(client_id, number, items, iva, irpf);
    store.ensure_unique_invoice_number(number, invoice.id)?;
    store.save(&mut invoice)?;

    println!("{} total {}", invoice.id, invoice.formatted_total());
    Ok(())
}

#[derive(Debug, Serialize)]
struct InvoiceListItem {
    id: String,
    client_id: String,
    number: String,
    total: String,
    updated_at: i64,
}

pub fn run_invoice_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());
    let invoices: Vec<Invoice> = store.list(limit)?;

    if as_json {
        let items = invoices
            .iter()
            .map(|invoice| InvoiceListItem {
                id: invoice.id.to_string(),
                client_id: invoice.client_id.to_string(),
                number: invoice.number.clone(),
                total: invoice.formatted_total(),
                updated_at: invoice.updated_at,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for invoice in &invoices {
            println!(
                "{:<8}  {:<12}  {:>10}",
                short_id(invoice.id),
                invoice.number,
                invoice.formatted_total()
            );
        }
    }

    Ok(())
}

/// Parse `CONCEPT:PRICE[:QTY]` into a line item.
fn parse_line_item(spec: &str) -> Result<LineItem, CliError> {
    let mut parts = spec.rsplitn(3, ':');

    // rsplitn yields from the right; a 2-field spec has no quantity
    let (concept, unit_price, quantity) = match (parts.next(), parts.next(), parts.next()) {
        (Some(quantity), Some(price), Some(concept)) => {
            (concept, price.to_string(), Some(quantity.to_string()))
        }
        (Some(price), Some(concept), None) => (concept, price.to_string(), None),
        _ => return Err(CliError::InvalidLineItem(spec.to_string())),
    };

    let unit_price: f64 = unit_price
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidLineItem(spec.to_string()))?;
    let quantity: f64 = match quantity {
        Some(quantity) => quantity
            .trim()
            .parse()
            .map_err(|_| CliError::InvalidLineItem(spec.to_string()))?,
        None => 1.0,
    };

    if concept.trim().is_empty() {
        return Err(CliError::InvalidLineItem(spec.to_string()));
    }

    Ok(LineItem {
        concept: concept.trim().to_string(),
        unit_price,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_line_item_with_quantity() {
        let item = parse_line_item("Pantalla:89.90:2").unwrap();
        assert_eq!(item.concept, "Pantalla");
        assert!((item.unit_price - 89.90).abs() < f64::EPSILON);
        assert!((item.quantity - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_line_item_defaults_quantity_to_one() {
        let item = parse_line_item("Mano de obra:25").unwrap();
        assert_eq!(item.concept, "Mano de obra");
        assert!((item.quantity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_line_item_rejects_garbage() {
        assert!(parse_line_item("sin precio").is_err());
        assert!(parse_line_item(":10").is_err());
        assert!(parse_line_item("Pantalla:caro").is_err());
    }
}
