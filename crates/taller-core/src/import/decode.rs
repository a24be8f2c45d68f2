//! Per-format backup decoders.
//!
//! Historical exports drifted in field naming (`averia`/`problema`/
//! `descripcion` all mean the repair's problem description, `modelo`/
//! `dispositivo` both mean the device model). The raw record types absorb
//! that drift declaratively through serde aliases so every decoder lands on
//! the same canonical shape.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Client, Invoice, LineItem, Part, Repair, RepairStatus};

/// Entity arrays carried by an archive, before id/timestamp resolution.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBackup {
    #[serde(default, alias = "clientes")]
    pub clients: Vec<RawClient>,
    #[serde(default, alias = "reparaciones")]
    pub repairs: Vec<RawRepair>,
    #[serde(default, alias = "facturas")]
    pub invoices: Vec<RawInvoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawClient {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    #[serde(default, alias = "correo", alias = "mail")]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default, alias = "eliminado")]
    pub deleted: Option<bool>,
}

impl RawClient {
    pub(crate) fn into_client(self, id: Uuid, now: i64) -> Client {
        Client {
            id,
            name: self.name,
            phone: self.phone.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: 0, // stamped by the store on save
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepair {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default, alias = "cliente_id")]
    pub client_id: Option<Uuid>,
    #[serde(default, alias = "marca")]
    pub brand: Option<String>,
    #[serde(default, alias = "modelo", alias = "dispositivo")]
    pub model: Option<String>,
    #[serde(
        default,
        alias = "descripcion",
        alias = "averia",
        alias = "problema"
    )]
    pub description: Option<String>,
    #[serde(default, alias = "estado")]
    pub status: Option<String>,
    #[serde(default, alias = "precio")]
    pub price: Option<f64>,
    #[serde(default, alias = "fecha_estimada", alias = "fecha_prevista")]
    pub estimated_date: Option<String>,
    #[serde(default, alias = "solucion")]
    pub solution: Option<String>,
    #[serde(default)]
    pub checklist: Map<String, Value>,
    #[serde(default, alias = "piezas")]
    pub parts: Vec<RawPart>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default, alias = "eliminado")]
    pub deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPart {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "precio")]
    pub price: Option<f64>,
}

impl RawRepair {
    pub(crate) fn into_repair(self, id: Uuid, client_id: Uuid, now: i64) -> Repair {
        Repair {
            id,
            client_id,
            brand: self.brand.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status: self
                .status
                .map_or(RepairStatus::Pending, RepairStatus::from),
            price: self.price.unwrap_or(0.0),
            estimated_date: self.estimated_date,
            solution: self.solution,
            checklist: self.checklist,
            parts: self
                .parts
                .into_iter()
                .map(|part| Part {
                    name: part.name,
                    price: part.price.unwrap_or(0.0),
                })
                .collect(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: 0, // stamped by the store on save
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawInvoice {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default, alias = "cliente_id")]
    pub client_id: Option<Uuid>,
    #[serde(alias = "numero")]
    pub number: String,
    #[serde(default, alias = "lineas")]
    pub items: Vec<RawLineItem>,
    #[serde(default, alias = "iva")]
    pub iva_rate: Option<f64>,
    #[serde(default, alias = "irpf")]
    pub irpf_rate: Option<f64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default, alias = "eliminado")]
    pub deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLineItem {
    #[serde(alias = "concepto")]
    pub concept: String,
    #[serde(default, alias = "precio", alias = "precio_unitario")]
    pub unit_price: Option<f64>,
    #[serde(default, alias = "cantidad")]
    pub quantity: Option<f64>,
}

impl RawInvoice {
    pub(crate) fn into_invoice(self, id: Uuid, client_id: Uuid, now: i64) -> Invoice {
        Invoice {
            id,
            client_id,
            number: self.number,
            items: self
                .items
                .into_iter()
                .map(|item| LineItem {
                    concept: item.concept,
                    unit_price: item.unit_price.unwrap_or(0.0),
                    quantity: item.quantity.unwrap_or(1.0),
                })
                .collect(),
            iva_rate: self.iva_rate.unwrap_or(0.0),
            irpf_rate: self.irpf_rate.unwrap_or(0.0),
            created_at: self.created_at.unwrap_or(now),
            updated_at: 0, // stamped by the store on save
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

/// Decode one delimited table. Headers may use either canonical or legacy
/// Spanish column names; serde aliases resolve both.
pub(crate) fn decode_csv<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hybrid_keys_and_drifted_fields_normalize() {
        let payload = r#"{
            "clientes": [
                {"nombre": "Ana", "telefono": "600111222", "correo": "ana@example.com"}
            ],
            "reparaciones": [
                {"marca": "Samsung", "dispositivo": "A52", "averia": "No enciende", "estado": "ready"}
            ],
            "facturas": [
                {"numero": "2023-001", "iva": 21.0, "lineas": [{"concepto": "Pantalla", "precio": 80.0}]}
            ]
        }"#;

        let backup: RawBackup = serde_json::from_str(payload).unwrap();
        assert_eq!(backup.clients[0].name, "Ana");
        assert_eq!(backup.clients[0].phone.as_deref(), Some("600111222"));
        assert_eq!(backup.repairs[0].model.as_deref(), Some("A52"));
        assert_eq!(backup.repairs[0].description.as_deref(), Some("No enciende"));
        assert_eq!(backup.invoices[0].number, "2023-001");
        assert_eq!(backup.invoices[0].items[0].concept, "Pantalla");
    }

    #[test]
    fn canonical_field_names_still_decode() {
        let payload = r#"{
            "repairs": [
                {"brand": "Apple", "model": "iPhone 11", "description": "Pantalla rota"}
            ]
        }"#;

        let backup: RawBackup = serde_json::from_str(payload).unwrap();
        assert_eq!(backup.repairs[0].description.as_deref(), Some("Pantalla rota"));
    }

    #[test]
    fn csv_decodes_spanish_headers() {
        let csv = b"nombre,telefono,correo\nAna,600111222,ana@example.com\nBruno,,\n";
        let clients: Vec<RawClient> = decode_csv(csv).unwrap();

        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].name, "Ana");
        assert_eq!(clients[1].name, "Bruno");
        assert_eq!(clients[1].phone, None);
    }

    #[test]
    fn into_repair_defaults_missing_fields() {
        let raw: RawRepair =
            serde_json::from_str(r#"{"problema": "No carga"}"#).unwrap();
        let client_id = Uuid::new_v4();
        let repair = raw.into_repair(Uuid::new_v4(), client_id, 1000);

        assert_eq!(repair.description, "No carga");
        assert_eq!(repair.status, RepairStatus::Pending);
        assert_eq!(repair.created_at, 1000);
        assert!(!repair.deleted);
    }

    #[test]
    fn unknown_status_string_is_preserved() {
        let raw: RawRepair =
            serde_json::from_str(r#"{"averia": "x", "estado": "esperando_piezas"}"#).unwrap();
        let repair = raw.into_repair(Uuid::new_v4(), Uuid::new_v4(), 0);
        assert_eq!(
            repair.status,
            RepairStatus::Other("esperando_piezas".to_string())
        );
    }
}
