use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassifyError {
    /// A vendor rule pattern could not be compiled.
    #[error("invalid vendor pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A vendor rule has no patterns at all.
    #[error("vendor rule for {0} has no patterns")]
    EmptyRule(String),

    /// Image bytes are not a decodable PNG or JPEG.
    #[error("image could not be decoded: {0}")]
    Decode(String),
}
