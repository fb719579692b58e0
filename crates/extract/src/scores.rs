//! Secondary quality scores derived from an extracted invoice.
//!
//! | Score | Meaning |
//! |-------|---------|
//! | `field_completeness` | share of the seven key header fields that are present |
//! | `line_items_consistency` | how closely line-item amounts add up to the subtotal (or total) |
//! | `totals_consistency` | how closely `subtotal + tax` matches `total` |
//! | `line_item_arithmetic` | share of line items where `quantity * unit_price == amount` |
//!
//! All scores lie in `[0, 1]`. Amounts agree when they differ by at most
//! 1 % of the expected value or 0.01, whichever is larger.
use std::collections::BTreeMap;

use crate::Invoice;

pub const FIELD_COMPLETENESS: &str = "field_completeness";
pub const LINE_ITEMS_CONSISTENCY: &str = "line_items_consistency";
pub const TOTALS_CONSISTENCY: &str = "totals_consistency";
pub const LINE_ITEM_ARITHMETIC: &str = "line_item_arithmetic";
/// Overall extraction confidence, attached by the caller alongside the derived scores.
pub const EXTRACTION_CONFIDENCE: &str = "extraction_confidence";

const KEY_FIELD_COUNT: usize = 7;

pub fn calculate_extraction_scores(invoice: &Invoice) -> BTreeMap<String, f64> {
    BTreeMap::from([
        (FIELD_COMPLETENESS.to_string(), field_completeness(invoice)),
        (LINE_ITEMS_CONSISTENCY.to_string(), line_items_consistency(invoice)),
        (TOTALS_CONSISTENCY.to_string(), totals_consistency(invoice)),
        (LINE_ITEM_ARITHMETIC.to_string(), line_item_arithmetic(invoice)),
    ])
}

/// One human-readable comment per known score in `scores`.
pub fn score_comments(invoice: &Invoice, scores: &BTreeMap<String, f64>) -> BTreeMap<String, String> {
    let mut comments = BTreeMap::new();
    for name in scores.keys() {
        let comment = match name.as_str() {
            FIELD_COMPLETENESS => completeness_comment(invoice),
            LINE_ITEMS_CONSISTENCY => line_items_comment(invoice),
            TOTALS_CONSISTENCY => totals_comment(invoice),
            LINE_ITEM_ARITHMETIC => arithmetic_comment(invoice),
            _ => continue,
        };
        comments.insert(name.clone(), comment);
    }
    comments
}

fn missing_fields(invoice: &Invoice) -> Vec<&'static str> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let checks = [
        ("invoice_id", !invoice.invoice_id.trim().is_empty()),
        ("invoice_date", present(&invoice.invoice_date)),
        ("vendor_name", present(&invoice.vendor_name)),
        ("currency", present(&invoice.currency)),
        ("total", invoice.total.is_some()),
        ("due_date", present(&invoice.due_date)),
        ("line_items", !invoice.line_items.is_empty()),
    ];
    checks
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| *name)
        .collect()
}

pub fn field_completeness(invoice: &Invoice) -> f64 {
    let missing = missing_fields(invoice).len();
    (KEY_FIELD_COUNT - missing) as f64 / KEY_FIELD_COUNT as f64
}

fn line_item_sum(invoice: &Invoice) -> f64 {
    invoice.line_items.iter().filter_map(|i| i.amount).sum()
}

fn line_items_target(invoice: &Invoice) -> Option<(&'static str, f64)> {
    invoice
        .subtotal
        .map(|s| ("subtotal", s))
        .or_else(|| invoice.total.map(|t| ("total", t)))
}

pub fn line_items_consistency(invoice: &Invoice) -> f64 {
    if invoice.line_items.is_empty() {
        return 0.0;
    }
    match line_items_target(invoice) {
        Some((_, target)) => agreement(line_item_sum(invoice), target),
        None => 0.5,
    }
}

pub fn totals_consistency(invoice: &Invoice) -> f64 {
    match (invoice.subtotal, invoice.tax, invoice.total) {
        (Some(subtotal), Some(tax), Some(total)) => agreement(subtotal + tax, total),
        _ => 0.5,
    }
}

/// Items that carry quantity, unit price and amount, and how many of them add up.
fn arithmetic_counts(invoice: &Invoice) -> (usize, usize) {
    invoice
        .line_items
        .iter()
        .filter_map(|i| match (i.quantity, i.unit_price, i.amount) {
            (Some(q), Some(p), Some(a)) => Some(within_tolerance(q * p, a)),
            _ => None,
        })
        .fold((0, 0), |(checked, ok), matched| {
            (checked + 1, ok + usize::from(matched))
        })
}

pub fn line_item_arithmetic(invoice: &Invoice) -> f64 {
    match arithmetic_counts(invoice) {
        (0, _) => 1.0,
        (checked, ok) => ok as f64 / checked as f64,
    }
}

fn tolerance(expected: f64) -> f64 {
    (expected.abs() * 0.01).max(0.01)
}

fn within_tolerance(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= tolerance(expected)
}

/// 1.0 within tolerance, then decays linearly with relative deviation.
fn agreement(actual: f64, expected: f64) -> f64 {
    if within_tolerance(actual, expected) {
        return 1.0;
    }
    if expected == 0.0 {
        return 0.0;
    }
    let relative = (actual - expected).abs() / expected.abs();
    (1.0 - relative).clamp(0.0, 1.0)
}

fn completeness_comment(invoice: &Invoice) -> String {
    let missing = missing_fields(invoice);
    let present = KEY_FIELD_COUNT - missing.len();
    if missing.is_empty() {
        format!("{present}/{KEY_FIELD_COUNT} key fields present")
    } else {
        format!(
            "{present}/{KEY_FIELD_COUNT} key fields present (missing: {})",
            missing.join(", ")
        )
    }
}

fn line_items_comment(invoice: &Invoice) -> String {
    if invoice.line_items.is_empty() {
        return "No line items extracted".to_string();
    }
    match line_items_target(invoice) {
        Some((label, target)) => format!(
            "{} line items sum to {:.2} vs {label} {target:.2}",
            invoice.line_items.len(),
            line_item_sum(invoice)
        ),
        None => "Neither subtotal nor total available to check line items".to_string(),
    }
}

fn totals_comment(invoice: &Invoice) -> String {
    match (invoice.subtotal, invoice.tax, invoice.total) {
        (Some(subtotal), Some(tax), Some(total)) => format!(
            "subtotal {subtotal:.2} + tax {tax:.2} = {:.2} vs total {total:.2}",
            subtotal + tax
        ),
        _ => "Subtotal, tax or total missing".to_string(),
    }
}

fn arithmetic_comment(invoice: &Invoice) -> String {
    match arithmetic_counts(invoice) {
        (0, _) => "No line items with quantity, unit price and amount".to_string(),
        (checked, ok) => format!("{ok}/{checked} line items satisfy quantity x unit_price = amount"),
    }
}
