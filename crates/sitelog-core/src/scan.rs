//! Badge scan payloads.
//!
//! A worker badge encodes a small JSON object:
//!
//! ```text
//! {"vendorId": 5, "cwId": 9}
//! ```
//!
//! `cwId` may also appear as `workerId`. Either id may be a JSON integer or a
//! numeric string. Anything else is rejected with a [`ScanParseError`] so the
//! caller can discard the read and re-arm.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanParseError {
    #[error("scan payload is empty")]
    Empty,
    #[error("scan payload is not a badge object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scan payload has no `{0}`")]
    MissingField(&'static str),
    #[error("scan payload field `{field}` is not an integer id: {value:?}")]
    InvalidId { field: &'static str, value: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBadge {
    vendor_id: Option<RawId>,
    #[serde(alias = "workerId")]
    cw_id: Option<RawId>,
}

fn resolve_id(field: &'static str, raw: Option<RawId>) -> Result<i64, ScanParseError> {
    match raw {
        None => Err(ScanParseError::MissingField(field)),
        Some(RawId::Int(id)) => Ok(id),
        Some(RawId::Text(text)) => {
            text.trim()
                .parse()
                .map_err(|_| ScanParseError::InvalidId { field, value: text })
        }
    }
}

/// A decoded badge read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    raw: String,
    vendor_id: i64,
    worker_id: i64,
}

impl ScanEvent {
    /// Parse a raw scanner string. Fails closed on anything that is not a
    /// badge object carrying both ids.
    pub fn parse(raw: &str) -> Result<Self, ScanParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScanParseError::Empty);
        }

        let badge: RawBadge = serde_json::from_str(trimmed)?;
        let vendor_id = resolve_id("vendorId", badge.vendor_id)?;
        let worker_id = resolve_id("cwId", badge.cw_id)?;

        Ok(Self {
            raw: raw.to_string(),
            vendor_id,
            worker_id,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn vendor_id(&self) -> i64 {
        self.vendor_id
    }

    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_ids() {
        let scan = ScanEvent::parse(r#"{"vendorId":5,"cwId":9}"#).unwrap();
        assert_eq!(scan.vendor_id(), 5);
        assert_eq!(scan.worker_id(), 9);
        assert_eq!(scan.raw(), r#"{"vendorId":5,"cwId":9}"#);
    }

    #[test]
    fn accepts_string_ids_and_worker_alias() {
        let scan = ScanEvent::parse(r#"{"vendorId":" 12 ","workerId":"40"}"#).unwrap();
        assert_eq!(scan.vendor_id(), 12);
        assert_eq!(scan.worker_id(), 40);
    }

    #[test]
    fn ignores_unknown_fields() {
        let scan = ScanEvent::parse(r#"{"vendorId":1,"cwId":2,"name":"R. Kumar"}"#).unwrap();
        assert_eq!(scan.worker_id(), 2);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            ScanEvent::parse("not-json"),
            Err(ScanParseError::Json(_))
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(ScanEvent::parse("   "), Err(ScanParseError::Empty)));
    }

    #[test]
    fn rejects_json_that_is_not_an_object() {
        assert!(matches!(ScanEvent::parse("42"), Err(ScanParseError::Json(_))));
    }

    #[test]
    fn missing_worker_is_reported() {
        assert!(matches!(
            ScanEvent::parse(r#"{"vendorId":5}"#),
            Err(ScanParseError::MissingField("cwId"))
        ));
    }

    #[test]
    fn non_numeric_id_is_reported() {
        let err = ScanEvent::parse(r#"{"vendorId":"abc","cwId":9}"#).unwrap_err();
        match err {
            ScanParseError::InvalidId { field, value } => {
                assert_eq!(field, "vendorId");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
