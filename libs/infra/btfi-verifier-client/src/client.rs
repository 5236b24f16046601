// [libs/infra/btfi-verifier-client/src/client.rs]
/*!
 * APARATO: VERIFIER WIRE CLIENT (V1.0)
 * RESPONSABILIDAD: TRANSPORTE HTTP PLANO HACIA EL VERIFICADOR
 *
 * Un único intento corto por llamada; el reintento y el backoff viven
 * en la capa de enlace (`uplink.rs`), nunca aquí.
 */

use std::time::Duration;

use btfi_models::prelude::{Epoch, Sample};
use reqwest::{Client, StatusCode};
use tracing::instrument;

use crate::errors::VerifierError;

const POST_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct VerifierClient {
    http: Client,
    base_url: String,
}

impl VerifierClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        if !api_key.is_empty() {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .user_agent("btfi-collector/1.0")
            .build()
            .expect("FATAL: verifier http client build failed");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sample POST carries `X-Device-ID`; any 2xx is accepted, not just
    /// 200/202.
    #[instrument(skip(self, sample))]
    pub async fn send_sample(&self, sample: &Sample) -> Result<(), VerifierError> {
        let url = format!("{}/api/v1/samples", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(POST_TIMEOUT)
            .header("X-Device-ID", sample.device_id.clone())
            .json(sample)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(VerifierError::ServerRejection(format!("HTTP_{}", response.status())))
        }
    }

    #[instrument(skip(self, epoch))]
    pub async fn send_epoch(&self, epoch: &Epoch) -> Result<String, VerifierError> {
        let url = format!("{}/api/v1/epochs", self.base_url);
        let device_id = epoch
            .signing
            .as_ref()
            .map(|s| s.device_id.clone())
            .unwrap_or_default();
        let response = self
            .http
            .post(&url)
            .timeout(POST_TIMEOUT)
            .header("X-Device-ID", device_id)
            .json(epoch)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.text().await.unwrap_or_default())
        } else {
            Err(VerifierError::ServerRejection(format!("HTTP_{}", response.status())))
        }
    }

    #[instrument(skip(self))]
    pub async fn is_reachable(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        self.http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
