use reqwest::header::CONTENT_TYPE;

use crate::error::ApmError;
use crate::model::{ServiceMetadata, Transaction};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Posts transactions to an intake endpoint, one request per transaction.
#[derive(Clone, Debug)]
pub struct ApmSender {
    client: reqwest::Client,
    endpoint: String,
    service: ServiceMetadata,
}

#[bon::bon]
impl ApmSender {
    #[builder]
    pub fn new(
        #[builder(into)] endpoint: String,
        client: Option<reqwest::Client>,
        service: Option<ServiceMetadata>,
    ) -> Self {
        Self {
            client: client.unwrap_or_default(),
            endpoint,
            service: service.unwrap_or_default(),
        }
    }
}

impl ApmSender {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a single transaction.
    ///
    /// Only transport failures are errors. The response status is logged but
    /// never turns a delivered request into a failure. The body is drained
    /// only after a successful send, so a body error never masks a send error.
    pub async fn send(&self, transaction: &Transaction) -> Result<(), ApmError> {
        let payload = encode_payload(&self.service, transaction)?;

        log::debug!(
            "sending transaction to {}: {}",
            self.endpoint,
            String::from_utf8_lossy(&payload)
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(ApmError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(ApmError::ResponseBody)?;

        if !status.is_success() {
            log::warn!(
                "intake at {} answered {status}: {}",
                self.endpoint,
                String::from_utf8_lossy(&body)
            );
        }

        Ok(())
    }
}

/// Encodes the metadata line and the transaction line as newline delimited JSON.
pub fn encode_payload(
    service: &ServiceMetadata,
    transaction: &Transaction,
) -> Result<Vec<u8>, ApmError> {
    let mut buf = Vec::with_capacity(512);
    buf.extend_from_slice(br#"{"metadata":{"service":"#);
    serde_json::to_writer(&mut buf, service)?;
    buf.extend_from_slice(b"}}\n");
    buf.extend_from_slice(br#"{"transaction":"#);
    serde_json::to_writer(&mut buf, transaction)?;
    buf.extend_from_slice(b"}\n");
    Ok(buf)
}
