//! Postal-code lookup boundary.
//!
//! The engine only sees [`LookupOutcome`]. Transport failures, HTTP errors and
//! the service's own "not found" marker all collapse into
//! [`LookupOutcome::NotFound`]; the cause is logged by the adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of resolving a postal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found {
        street: String,
        city: String,
        state: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        neighborhood: Option<String>,
    },
    NotFound,
}

/// Anything able to resolve a postal code into an address.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup(&self, postal_code: &str) -> LookupOutcome;
}

/// Handle for one issued lookup. Results carrying an outdated ticket are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupTicket {
    pub sequence: u64,
    pub postal_code: String,
}

/// What happened when a lookup result was handed back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupApplication {
    Resolved,
    NotFound,
    Superseded,
}

/// Failure raised inside the HTTP adapter before normalization.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lookup service answered with status {0}")]
    Status(u16),
    #[error("lookup service reported the postal code as unknown")]
    Unknown,
}

/// Adapter for the ViaCEP JSON API (`GET {base}/{cep}/json/`).
#[derive(Debug, Clone)]
pub struct ViaCepClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ViaCepPayload {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

impl ViaCepPayload {
    fn flags_unknown(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            Some(serde_json::Value::Null) | None => false,
            Some(_) => true,
        }
    }
}

impl ViaCepClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve `postal_code`, keeping the failure cause.
    pub async fn fetch(&self, postal_code: &str) -> Result<LookupOutcome, LookupError> {
        let digits: String = postal_code.chars().filter(char::is_ascii_digit).collect();
        let url = format!("{}/{}/json/", self.base_url, digits);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let payload: ViaCepPayload = response.json().await?;
        if payload.flags_unknown() {
            return Err(LookupError::Unknown);
        }

        let neighborhood = Some(payload.bairro).filter(|value| !value.trim().is_empty());
        Ok(LookupOutcome::Found {
            street: payload.logradouro,
            city: payload.localidade,
            state: payload.uf,
            neighborhood,
        })
    }
}

#[async_trait]
impl AddressLookup for ViaCepClient {
    async fn lookup(&self, postal_code: &str) -> LookupOutcome {
        match self.fetch(postal_code).await {
            Ok(outcome) => {
                debug!(postal_code, "postal code resolved");
                outcome
            }
            Err(error) => {
                warn!(postal_code, %error, "postal code lookup failed");
                LookupOutcome::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn stub_handler(Path(cep): Path<String>) -> axum::response::Response {
        match cep.as_str() {
            "01310100" => Json(json!({
                "cep": "01310-100",
                "logradouro": "Avenida Paulista",
                "complemento": "de 612 a 1510 - lado par",
                "bairro": "Bela Vista",
                "localidade": "São Paulo",
                "uf": "SP",
                "ddd": "11"
            }))
            .into_response(),
            "99999999" => Json(json!({ "erro": true })).into_response(),
            "88888888" => Json(json!({ "erro": "true" })).into_response(),
            _ => StatusCode::BAD_REQUEST.into_response(),
        }
    }

    async fn spawn_stub() -> String {
        let app = Router::new().route("/ws/:cep/json/", get(stub_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server runs");
        });
        format!("http://{addr}/ws")
    }

    fn client(base_url: String) -> ViaCepClient {
        ViaCepClient::new(base_url, Duration::from_secs(2)).expect("client builds")
    }

    #[tokio::test]
    async fn resolves_known_postal_codes_with_or_without_dash() {
        let client = client(spawn_stub().await);

        for code in ["01310100", "01310-100"] {
            assert_eq!(
                client.lookup(code).await,
                LookupOutcome::Found {
                    street: "Avenida Paulista".to_string(),
                    city: "São Paulo".to_string(),
                    state: "SP".to_string(),
                    neighborhood: Some("Bela Vista".to_string()),
                }
            );
        }
    }

    #[tokio::test]
    async fn service_error_marker_maps_to_not_found() {
        let client = client(spawn_stub().await);

        assert!(matches!(
            client.fetch("99999999").await,
            Err(LookupError::Unknown)
        ));
        assert_eq!(client.lookup("99999999").await, LookupOutcome::NotFound);
        assert_eq!(client.lookup("88888888").await, LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn http_failures_map_to_not_found() {
        let client = client(spawn_stub().await);

        assert!(matches!(
            client.fetch("12345678").await,
            Err(LookupError::Status(400))
        ));
        assert_eq!(client.lookup("12345678").await, LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_not_found() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe");
        let addr = listener.local_addr().expect("probe address");
        drop(listener);

        let client = client(format!("http://{addr}/ws"));
        assert_eq!(client.lookup("01310100").await, LookupOutcome::NotFound);
    }

    #[test]
    fn outcome_serializes_with_a_tag() {
        let value = serde_json::to_value(LookupOutcome::NotFound).expect("serializes");
        assert_eq!(value, json!({ "outcome": "not_found" }));
    }
}
