use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::dto::{
    CertificateRecord, CertificateRequest, CertificateResponse, HsVerification,
    HsVerificationRequest, QualificationRequest, QualificationVerdict, ReferenceCategory,
    ReferenceOption, ReferenceOptionsResponse,
};
use super::{
    CertificateGateway, GatewayError, QualificationService, ReferenceCatalog,
    CERTIFICATE_ENDPOINT, HS_VERIFICATION_ENDPOINT, QUALIFICATION_ENDPOINT,
    REFERENCE_OPTIONS_ENDPOINT,
};
use crate::workflows::certificate::CertificateDraft;
use crate::workflows::origin::HsCode;

/// HTTP client for the trust API. Retries are applied by callers through
/// [`super::RetryPolicy`]; this type performs exactly one request per call.
#[derive(Debug, Clone)]
pub struct TrustApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TrustApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("usmca-origin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| GatewayError::Transport {
                endpoint: "client",
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn transport_error(&self, endpoint: &'static str, source: reqwest::Error) -> GatewayError {
        if source.is_timeout() {
            GatewayError::Timeout {
                endpoint,
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GatewayError::Transport { endpoint, source }
        }
    }

    async fn post_json<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(endpoint, base_url = %self.base_url, "calling trust api");
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| self.transport_error(endpoint, source))?;
        self.decode(endpoint, response).await
    }

    async fn decode<T>(&self, endpoint: &'static str, response: Response) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| self.transport_error(endpoint, source))?;
        serde_json::from_slice(&bytes).map_err(|err| GatewayError::Decode {
            endpoint,
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl QualificationService for TrustApiClient {
    async fn calculate(
        &self,
        request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        self.post_json(QUALIFICATION_ENDPOINT, request).await
    }
}

#[async_trait]
impl CertificateGateway for TrustApiClient {
    async fn generate_certificate(
        &self,
        draft: &CertificateDraft,
    ) -> Result<CertificateRecord, GatewayError> {
        let body = CertificateRequest {
            action: "generate_certificate",
            certificate_data: draft,
        };
        let response: CertificateResponse = self.post_json(CERTIFICATE_ENDPOINT, &body).await?;

        if !response.success {
            return Err(GatewayError::Rejected {
                endpoint: CERTIFICATE_ENDPOINT,
                reason: response
                    .error
                    .unwrap_or_else(|| "certificate generation was not successful".to_string()),
            });
        }

        response.certificate.ok_or_else(|| GatewayError::Decode {
            endpoint: CERTIFICATE_ENDPOINT,
            detail: "response did not include a certificate".to_string(),
        })
    }

    async fn verify_hs_code(&self, hs_code: &HsCode) -> Result<HsVerification, GatewayError> {
        let body = HsVerificationRequest {
            hs_code: hs_code.digits(),
        };
        self.post_json(HS_VERIFICATION_ENDPOINT, &body).await
    }
}

#[async_trait]
impl ReferenceCatalog for TrustApiClient {
    async fn options(
        &self,
        category: ReferenceCategory,
    ) -> Result<Vec<ReferenceOption>, GatewayError> {
        let endpoint = REFERENCE_OPTIONS_ENDPOINT;
        let response = self
            .client
            .get(self.url(endpoint))
            .query(&[("category", category.as_str())])
            .send()
            .await
            .map_err(|source| self.transport_error(endpoint, source))?;
        let payload: ReferenceOptionsResponse = self.decode(endpoint, response).await?;

        if !payload.success {
            return Err(GatewayError::Rejected {
                endpoint,
                reason: format!("no {} options available", category.as_str()),
            });
        }
        Ok(payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificate::Classification;
    use crate::workflows::origin::ComponentOrigin;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("stub server runs");
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str) -> TrustApiClient {
        TrustApiClient::new(base_url, Duration::from_millis(500)).expect("client builds")
    }

    #[tokio::test]
    async fn qualification_posts_inputs_and_decodes_sparse_verdict() {
        let router = Router::new().route(
            QUALIFICATION_ENDPOINT,
            post(|Json(body): Json<Value>| async move {
                let components = body["component_origins"].as_array().map(Vec::len);
                Json(json!({
                    "qualified": components == Some(2) && body["hs_code"] == "850440",
                    "threshold_required": 60.0,
                }))
            }),
        );
        let base_url = spawn_stub(router).await;

        let verdict = client(&base_url)
            .calculate(&QualificationRequest {
                component_origins: vec![
                    ComponentOrigin::new("MX", 70.0, "Core"),
                    ComponentOrigin::new("CN", 30.0, "Caps"),
                ],
                manufacturing_location: "MX".to_string(),
                hs_code: "850440".to_string(),
            })
            .await
            .expect("stub answers");

        assert!(verdict.qualified);
        assert_eq!(verdict.threshold_required, Some(60.0));
        assert_eq!(verdict.rule_description, None);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            QUALIFICATION_ENDPOINT,
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base_url = spawn_stub(router).await;

        let err = client(&base_url)
            .calculate(&QualificationRequest {
                component_origins: Vec::new(),
                manufacturing_location: "US".to_string(),
                hs_code: "940360".to_string(),
            })
            .await
            .expect_err("503 surfaces");
        assert!(matches!(err, GatewayError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unsuccessful_certificate_response_is_rejected() {
        let router = Router::new().route(
            CERTIFICATE_ENDPOINT,
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["action"], "generate_certificate");
                Json(json!({ "success": false, "error": "signature expired" }))
            }),
        );
        let base_url = spawn_stub(router).await;
        let draft = CertificateDraft::from_classification(&Classification {
            hs_code: HsCode::parse("940360").expect("valid code"),
            product_description: "Office desk".to_string(),
        });

        let err = client(&base_url)
            .generate_certificate(&draft)
            .await
            .expect_err("rejected");
        match err {
            GatewayError::Rejected { reason, .. } => assert_eq!(reason, "signature expired"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn reference_options_pass_category_query() {
        let router = Router::new().route(
            REFERENCE_OPTIONS_ENDPOINT,
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let category = params.get("category").cloned().unwrap_or_default();
                Json(json!({
                    "success": true,
                    "data": [{ "value": category, "label": "echo", "product_count": 3 }]
                }))
            }),
        );
        let base_url = spawn_stub(router).await;

        let options = client(&base_url)
            .options(ReferenceCategory::ProductCategories)
            .await
            .expect("options load");
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, "product_categories");
        assert_eq!(options[0].product_count, Some(3));
    }

    #[tokio::test]
    async fn garbage_payloads_are_decode_errors() {
        let router = Router::new().route(
            HS_VERIFICATION_ENDPOINT,
            post(|| async { "not json" }),
        );
        let base_url = spawn_stub(router).await;

        let err = client(&base_url)
            .verify_hs_code(&HsCode::parse("870829").expect("valid code"))
            .await
            .expect_err("decode fails");
        assert!(matches!(err, GatewayError::Decode { .. }));
    }
}
