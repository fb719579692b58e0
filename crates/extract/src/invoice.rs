use serde::{Deserialize, Serialize};

use crate::InvoiceValidationError;

/// Structured invoice as returned by the extraction model.
///
/// Everything except `invoice_id` is optional, since scans frequently omit or
/// obscure header fields. Dates are kept as the model wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl Invoice {
    pub fn validate(&self) -> Result<(), InvoiceValidationError> {
        if self.invoice_id.trim().is_empty() {
            return Err(InvoiceValidationError::MissingInvoiceId);
        }
        check_amount("subtotal", self.subtotal)?;
        check_amount("tax", self.tax)?;
        check_amount("total", self.total)?;
        for (idx, item) in self.line_items.iter().enumerate() {
            check_amount(&format!("line_items[{idx}].quantity"), item.quantity)?;
            check_amount(&format!("line_items[{idx}].unit_price"), item.unit_price)?;
            check_amount(&format!("line_items[{idx}].amount"), item.amount)?;
        }
        Ok(())
    }
}

fn check_amount(field: &str, value: Option<f64>) -> Result<(), InvoiceValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(InvoiceValidationError::InvalidAmount {
            field: field.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_invoice_deserializes() {
        let invoice: Invoice = serde_json::from_value(json!({"invoice_id": "INV-1"})).unwrap();
        assert!(invoice.line_items.is_empty());
        assert!(invoice.validate().is_ok());
    }

    #[test]
    fn rejects_blank_id_and_negative_amounts() {
        let mut invoice: Invoice =
            serde_json::from_value(json!({"invoice_id": " ", "total": 10.0})).unwrap();
        assert_eq!(
            invoice.validate(),
            Err(InvoiceValidationError::MissingInvoiceId)
        );

        invoice.invoice_id = "INV-2".into();
        invoice.line_items.push(LineItem {
            description: None,
            quantity: Some(1.0),
            unit_price: Some(-3.0),
            amount: None,
        });
        let err = invoice.validate().unwrap_err();
        assert_eq!(err.to_string(), "line_items[0].unit_price must be a finite non-negative number");
    }
}
