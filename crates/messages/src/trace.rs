use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifiers threaded through every stage of one document.
///
/// Built once per inbound message and read-only afterwards. Identifiers the
/// producer did not supply are derived:
///
/// - `trace_id`: UUIDv5 of the source URI, so redeliveries of the same
///   document land on the same trace
/// - `session_id`: the trace id
/// - `parent_span_id`: a fresh 16 hex-digit span id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub session_id: String,
    pub parent_span_id: String,
}

impl TraceContext {
    pub fn from_fields(
        source_file: &str,
        trace_id: Option<&str>,
        session_id: Option<&str>,
        parent_span_id: Option<&str>,
    ) -> Self {
        let trace_id = non_blank(trace_id)
            .map(str::to_string)
            .unwrap_or_else(|| derive_trace_id(source_file));
        let session_id = non_blank(session_id)
            .map(str::to_string)
            .unwrap_or_else(|| trace_id.clone());
        let parent_span_id = non_blank(parent_span_id)
            .map(str::to_string)
            .unwrap_or_else(new_span_id);

        Self {
            trace_id,
            session_id,
            parent_span_id,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn derive_trace_id(source_file: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, source_file.as_bytes())
        .simple()
        .to_string()
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_supplied_identifiers() {
        let ctx = TraceContext::from_fields("gs://in/a.tif", Some("t1"), Some("s1"), Some("p1"));
        assert_eq!(ctx.trace_id, "t1");
        assert_eq!(ctx.session_id, "s1");
        assert_eq!(ctx.parent_span_id, "p1");
    }

    #[test]
    fn derives_stable_trace_id_from_source() {
        let a = TraceContext::from_fields("gs://in/a.tif", None, None, None);
        let b = TraceContext::from_fields("gs://in/a.tif", None, Some("  "), None);
        let c = TraceContext::from_fields("gs://in/b.tif", None, None, None);

        assert_eq!(a.trace_id, b.trace_id);
        assert_ne!(a.trace_id, c.trace_id);
        assert_eq!(a.trace_id.len(), 32);
        assert_eq!(a.session_id, a.trace_id);
        assert_eq!(a.parent_span_id.len(), 16);
    }
}
