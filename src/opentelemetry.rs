use std::collections::HashMap;

use opentelemetry_semantic_conventions::attribute;

use crate::mapper::{HTTP_HOST, HTTP_METHOD, HTTP_PATH, HTTP_STATUS_CODE, HTTP_USER_AGENT};

/// Renames OpenTelemetry semantic convention keys to the `http.*` keys that
/// drive the request and response context of a transaction.
pub fn opentelemetry_semantic_mapping() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (attribute::SERVER_ADDRESS, HTTP_HOST),
        (attribute::HTTP_REQUEST_METHOD, HTTP_METHOD),
        (attribute::URL_PATH, HTTP_PATH),
        (attribute::HTTP_RESPONSE_STATUS_CODE, HTTP_STATUS_CODE),
        (attribute::USER_AGENT_ORIGINAL, HTTP_USER_AGENT),
    ])
}
