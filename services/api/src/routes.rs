use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use usmca_origin::error::AppError;
use usmca_origin::gateway::{ReferenceCategory, ReferenceOption, REFERENCE_OPTIONS_ENDPOINT};
use usmca_origin::workflows::certificate::{
    certificate_router, OriginWorkflowService, SessionRepository,
};
use usmca_origin::workflows::origin::{ComponentOrigin, HsCode, RegionalContentResult};

#[derive(Debug, Deserialize)]
pub(crate) struct RegionalContentRequest {
    #[serde(default)]
    pub(crate) components: Vec<ComponentOrigin>,
    #[serde(default)]
    pub(crate) threshold: Option<f64>,
    #[serde(default)]
    pub(crate) hs_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegionalContentResponse {
    #[serde(flatten)]
    pub(crate) result: RegionalContentResult,
    pub(crate) threshold_source: ThresholdSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rule: Option<RuleSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ThresholdSource {
    Request,
    Rulebook,
    Default,
}

#[derive(Debug, Serialize)]
pub(crate) struct RuleSummary {
    pub(crate) rule_key: &'static str,
    pub(crate) category: &'static str,
    pub(crate) rule_description: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReferenceResponse {
    pub(crate) category: ReferenceCategory,
    pub(crate) options: Vec<ReferenceOption>,
}

pub(crate) fn with_origin_routes<R>(service: Arc<OriginWorkflowService<R>>) -> axum::Router
where
    R: SessionRepository + 'static,
{
    certificate_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/origin/regional-content",
            axum::routing::post(regional_content_endpoint),
        )
        .route(
            "/api/v1/reference/:category",
            axum::routing::get(reference_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Stateless RVC check. An explicit threshold wins over the HS rule, which wins over the default.
pub(crate) async fn regional_content_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RegionalContentRequest>,
) -> Result<Json<RegionalContentResponse>, Response> {
    let RegionalContentRequest {
        components,
        threshold,
        hs_code,
    } = payload;

    if let Some(value) = threshold {
        if !(0.0..=100.0).contains(&value) {
            return Err(unprocessable(format!(
                "threshold must be between 0 and 100, got {value}"
            )));
        }
    }

    let rule = match hs_code.as_deref() {
        Some(raw) => {
            let hs_code = HsCode::parse(raw).map_err(|err| AppError::from(err).into_response())?;
            Some(state.rulebook.rule_for(&hs_code))
        }
        None => None,
    };

    let (threshold_required, threshold_source) = match (threshold, rule) {
        (Some(value), _) => (value, ThresholdSource::Request),
        (None, Some(rule)) => (rule.threshold_required, ThresholdSource::Rulebook),
        (None, None) => (state.default_threshold, ThresholdSource::Default),
    };

    let result = state.calculator.calculate(&components, threshold_required);

    Ok(Json(RegionalContentResponse {
        result,
        threshold_source,
        rule: rule.map(|rule| RuleSummary {
            rule_key: rule.key,
            category: rule.category,
            rule_description: rule.rule_description,
        }),
    }))
}

pub(crate) async fn reference_endpoint(
    Extension(state): Extension<AppState>,
    Path(category): Path<String>,
) -> Response {
    let Some(category) = ReferenceCategory::parse(&category) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown reference category '{category}'") })),
        )
            .into_response();
    };

    let reference = state.reference.clone();
    match state
        .read_policy
        .run(REFERENCE_OPTIONS_ENDPOINT, || reference.options(category))
        .await
    {
        Ok(options) => Json(ReferenceResponse { category, options }).into_response(),
        Err(err) => {
            warn!(category = category.as_str(), error = %err, "reference options unavailable");
            AppError::from(err).into_response()
        }
    }
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::offline_collaborators;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use usmca_origin::gateway::RetryPolicy;
    use usmca_origin::workflows::origin::{RegionalContentCalculator, TradeBloc, DEFAULT_THRESHOLD};
    use usmca_origin::workflows::qualification::Rulebook;

    fn state(ready: bool) -> AppState {
        let (_, gateway) = offline_collaborators(DEFAULT_THRESHOLD, &TradeBloc::usmca());
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            reference: gateway,
            calculator: RegionalContentCalculator::new(TradeBloc::usmca()),
            rulebook: Arc::new(Rulebook::standard()),
            default_threshold: DEFAULT_THRESHOLD,
            read_policy: RetryPolicy::idempotent(Duration::from_millis(500), Duration::from_millis(1)),
        }
    }

    fn components() -> Vec<ComponentOrigin> {
        vec![
            ComponentOrigin::new("MX", 45.0, "Stamped bracket"),
            ComponentOrigin::new("US", 25.0, "Brake rotor"),
            ComponentOrigin::new("JP", 30.0, "ABS sensor"),
        ]
    }

    #[tokio::test]
    async fn regional_content_uses_the_default_threshold() {
        let request = RegionalContentRequest {
            components: components(),
            threshold: None,
            hs_code: None,
        };

        let Json(body) = regional_content_endpoint(Extension(state(true)), Json(request))
            .await
            .expect("calculation succeeds");

        assert_eq!(body.threshold_source, ThresholdSource::Default);
        assert_eq!(body.result.regional_content, 70.0);
        assert_eq!(body.result.threshold_required, 62.5);
        assert!(body.result.qualified);
        assert!(body.rule.is_none());
    }

    #[tokio::test]
    async fn regional_content_applies_the_product_rule() {
        let request = RegionalContentRequest {
            components: components(),
            threshold: None,
            hs_code: Some("8708.30".to_string()),
        };

        let Json(body) = regional_content_endpoint(Extension(state(true)), Json(request))
            .await
            .expect("calculation succeeds");

        assert_eq!(body.threshold_source, ThresholdSource::Rulebook);
        assert_eq!(body.result.threshold_required, 75.0);
        assert!(!body.result.qualified);
        assert_eq!(body.result.gap, 5.0);
        assert!(body.rule.is_some());
    }

    #[tokio::test]
    async fn regional_content_rejects_bad_inputs() {
        let request = RegionalContentRequest {
            components: components(),
            threshold: Some(140.0),
            hs_code: None,
        };
        let response = regional_content_endpoint(Extension(state(true)), Json(request))
            .await
            .expect_err("threshold out of range");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let request = RegionalContentRequest {
            components: components(),
            threshold: None,
            hs_code: Some("85".to_string()),
        };
        let response = regional_content_endpoint(Extension(state(true)), Json(request))
            .await
            .expect_err("hs code too short");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn reference_endpoint_lists_countries_and_rejects_unknown_categories() {
        let response = reference_endpoint(Extension(state(true)), Path("countries".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = reference_endpoint(Extension(state(true)), Path("tariffs".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let response = readiness_endpoint(Extension(state(false))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state(true))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
