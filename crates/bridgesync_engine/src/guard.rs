//! Inbound request guarding.

use crate::error::{EngineError, EngineResult};
use crate::password::{decrypt_sso_payload, query_value, CipherError};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A parsed inbound request body.
///
/// Wraps the raw field map so origin checks and secret verification read
/// uniformly regardless of what the request carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    fields: BTreeMap<String, Value>,
}

impl InboundRequest {
    /// Parses a JSON object body.
    pub fn from_json(body: &str) -> EngineResult<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| EngineError::InvalidPayload(err.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self {
                fields: map.into_iter().collect(),
            }),
            _ => Err(EngineError::InvalidPayload(
                "request body is not a JSON object".into(),
            )),
        }
    }

    /// Builds a request from already-parsed fields.
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// A field's string value, if present and a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Whether the request carries the given field at all.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Whether this request originated from a partner site rather than a
    /// local actor.
    ///
    /// Partner-driven enrollment calls carry the nested `enrolments` or
    /// `cohort` structures that no local form submits. Observers consult
    /// this before re-dispatching, so a change applied on behalf of the
    /// partner is not echoed back to it.
    pub fn is_partner_originated(&self) -> bool {
        let partner = self.has_field("enrolments") || self.has_field("cohort");
        if partner {
            debug!("inbound request identified as partner-originated");
        }
        partner
    }

    /// Verifies the payload's `secret_key` against the expected token.
    ///
    /// An empty expected token never verifies; a site without a token has
    /// no authenticated callers.
    pub fn verify_shared_secret(&self, expected: &str) -> bool {
        !expected.is_empty() && self.field_str("secret_key") == Some(expected)
    }
}

/// Decrypts an SSO login payload and pulls one value out of the query
/// string packed inside it.
pub fn extract_sso_value(payload: &str, secret: &str, key: &str) -> EngineResult<Option<String>> {
    let decrypted = decrypt_sso_payload(payload, secret).map_err(|err: CipherError| {
        EngineError::InvalidPayload(err.to_string())
    })?;
    Ok(query_value(&decrypted, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_webhook_is_not_partner_originated() {
        let req = InboundRequest::from_json(
            r#"{"action":"course_enrollment","user_id":7,"secret_key":"tok-1"}"#,
        )
        .unwrap();
        assert!(!req.is_partner_originated());
        assert!(req.verify_shared_secret("tok-1"));
        assert!(!req.verify_shared_secret("tok-2"));
    }

    #[test]
    fn enrolments_field_marks_partner_origin() {
        let req = InboundRequest::from_json(
            r#"{"enrolments":[{"courseid":4,"userid":7}],"secret_key":"tok-1"}"#,
        )
        .unwrap();
        assert!(req.is_partner_originated());
    }

    #[test]
    fn cohort_field_marks_partner_origin() {
        let req =
            InboundRequest::from_json(r#"{"cohort":[{"cohortId":9}]}"#).unwrap();
        assert!(req.is_partner_originated());
    }

    #[test]
    fn empty_expected_secret_never_verifies() {
        let req = InboundRequest::from_json(r#"{"secret_key":""}"#).unwrap();
        assert!(!req.verify_shared_secret(""));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(InboundRequest::from_json("[1,2,3]").is_err());
        assert!(InboundRequest::from_json("not json").is_err());
    }
}
