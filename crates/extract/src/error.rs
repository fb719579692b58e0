use thiserror::Error;

/// Fatal extraction faults.
///
/// Provider-side failures are not errors; they come back as
/// [`ExtractionOutcome::Failed`](crate::ExtractionOutcome::Failed).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractError {
    #[error("no images supplied for extraction")]
    NoImages,
}

/// An extracted invoice that breaks a schema rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvoiceValidationError {
    #[error("invoice_id is missing")]
    MissingInvoiceId,

    #[error("{field} must be a finite non-negative number")]
    InvalidAmount { field: String },
}
