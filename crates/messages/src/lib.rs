//! Messages exchanged between invoice pipeline stages.
//!
//! Every stage receives its input through a push delivery, so decoding is a
//! two step affair: unwrap the envelope ([`decode_push`]) and then parse and
//! validate the stage message ([`decode_message`]). Messages that fail either
//! step are rejected with a [`MessageError`] before the caller acts on them.
//!
//! ```rust
//! use messages::{decode_message, encode_push, ConvertedMessage};
//! use serde_json::json;
//!
//! let body = encode_push(&json!({
//!     "source_file": "gs://in/a.tif",
//!     "converted_files": ["gs://proc/a_page_1.png"],
//!     "page_count": 1
//! }))
//! .to_string();
//!
//! let msg: ConvertedMessage = decode_message(body.as_bytes()).unwrap();
//! assert_eq!(msg.page_count, 1);
//! ```

mod envelope;
mod error;
mod trace;
mod types;
mod vendor;

pub use envelope::{decode_message, decode_push, encode_push, parse_push, PushMessage};
pub use error::MessageError;
pub use trace::TraceContext;
pub use types::{ClassifiedMessage, ConvertedMessage, ExtractedMessage, StageMessage};
pub use vendor::VendorType;
