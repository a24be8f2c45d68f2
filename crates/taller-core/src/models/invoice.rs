//! Invoice model and tax math

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::{EntityKind, SyncEntity};
use crate::util::now_ms;

/// A billable line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub concept: String,
    pub unit_price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

const fn default_quantity() -> f64 {
    1.0
}

/// An issued invoice.
///
/// `number` is the human-facing sequence string and must stay unique across
/// non-deleted invoices; the id remains the merge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier (UUID v4, merge key)
    pub id: Uuid,
    pub client_id: Uuid,
    pub number: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// IVA percentage applied to the subtotal
    #[serde(default)]
    pub iva_rate: f64,
    /// IRPF withholding percentage subtracted from the subtotal
    #[serde(default)]
    pub irpf_rate: f64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
}

impl Invoice {
    #[must_use]
    pub fn new(
        client_id: Uuid,
        number: impl Into<String>,
        items: Vec<LineItem>,
        iva_rate: f64,
        irpf_rate: f64,
    ) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            client_id,
            number: number.into(),
            items,
            iva_rate,
            irpf_rate,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Sum of line amounts before tax.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.unit_price * item.quantity)
            .sum()
    }

    /// Total after IVA and IRPF, rounded to 2 decimal places.
    #[must_use]
    pub fn total(&self) -> f64 {
        let subtotal = self.subtotal();
        let total =
            subtotal + subtotal * self.iva_rate / 100.0 - subtotal * self.irpf_rate / 100.0;
        round2(total)
    }

    /// Total rendered with two decimal places for documents and receipts.
    #[must_use]
    pub fn formatted_total(&self) -> String {
        format!("{:.2}", self.total())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl SyncEntity for Invoice {
    const KIND: EntityKind = EntityKind::Invoices;

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp_ms: i64) {
        self.updated_at = timestamp_ms;
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_with(subtotal: f64, iva_rate: f64, irpf_rate: f64) -> Invoice {
        Invoice::new(
            Uuid::new_v4(),
            "2024-001",
            vec![LineItem {
                concept: "Reparación".to_string(),
                unit_price: subtotal,
                quantity: 1.0,
            }],
            iva_rate,
            irpf_rate,
        )
    }

    #[test]
    fn total_applies_iva_and_irpf() {
        let invoice = invoice_with(100.0, 21.0, 15.0);
        assert_eq!(invoice.formatted_total(), "106.00");
    }

    #[test]
    fn total_without_withholding() {
        let invoice = invoice_with(50.0, 21.0, 0.0);
        assert_eq!(invoice.formatted_total(), "60.50");
    }

    #[test]
    fn subtotal_multiplies_quantity() {
        let invoice = Invoice::new(
            Uuid::new_v4(),
            "2024-002",
            vec![
                LineItem {
                    concept: "Pantalla".to_string(),
                    unit_price: 40.0,
                    quantity: 2.0,
                },
                LineItem {
                    concept: "Mano de obra".to_string(),
                    unit_price: 25.0,
                    quantity: 1.0,
                },
            ],
            0.0,
            0.0,
        );
        assert!((invoice.subtotal() - 105.0).abs() < f64::EPSILON);
    }

    #[test]
    fn quantity_defaults_to_one_when_absent() {
        let item: LineItem =
            serde_json::from_str(r#"{"concept": "Diagnóstico", "unit_price": 15.0}"#).unwrap();
        assert!((item.quantity - 1.0).abs() < f64::EPSILON);
    }
}
