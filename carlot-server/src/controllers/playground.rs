use askama::Template;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use carlot_decision::{Decision, Input};
use carlot_slo::{errors, HtmlTemplate, Result};

use crate::{valid::Valid, AppState};

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/playground", get(index))
        .route("/playground/submit", post(submit))
        .route("/playground/heartbeat", get(heartbeat))
        .with_state(state)
}

#[derive(Template, Default)]
#[template(path = "playground.html")]
pub struct Playground {
    pub allow_path: String,
}

async fn index(app: AppState) -> HtmlTemplate<Playground> {
    HtmlTemplate(Playground {
        allow_path: app.config.allow_path.clone(),
    })
}

/// One policy query typed into the playground form.
#[derive(Debug, Deserialize, Validate)]
pub struct FormInput {
    pub subject: String,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub error: String,
    pub allowed: bool,
    pub response: serde_json::Value,
}

/// Evaluates the submitted input against the decision provider. Provider
/// failures are reported in the response body rather than as an HTTP
/// error, so the UI can display them.
async fn submit(
    app: AppState,
    Valid(Json(form)): Valid<Json<FormInput>>,
) -> Result<Json<SubmitResponse>> {
    info!("playground query: {:?}", form);

    let Some(decider) = app.decider.clone() else {
        return Ok(Json(SubmitResponse {
            error: String::new(),
            allowed: true,
            response: json!({
                "msg": "no decision provider is configured, all operations are allowed",
            }),
        }));
    };

    let mut input = Input {
        action: form.action,
        resource: form.resource,
        subject: form.subject,
        ..Default::default()
    };
    if !form.body.is_empty() {
        input
            .context
            .insert("body".to_owned(), json!(form.body));
    }

    let decision = match decider.decision(&input).await {
        Ok(decision) => decision,
        Err(err) => {
            return Ok(Json(SubmitResponse {
                error: err.to_string(),
                allowed: false,
                response: json!({ "msg": format!("decision error: {err}") }),
            }));
        }
    };

    let allowed = app
        .allow_path
        .extract(&decision.result)
        .map_err(|err| errors::misconfigured(&err))?;

    Ok(Json(SubmitResponse {
        error: String::new(),
        allowed,
        response: serde_json::to_value(&decision).map_err(errors::any)?,
    }))
}

/// Refresh heartbeat of the embedded engine, so the frontend can avoid
/// re-querying when the policy has not changed.
async fn heartbeat(app: AppState) -> Result<Json<serde_json::Value>> {
    let refreshes = match &app.embedded {
        Some(engine) => engine.refresh_count(),
        None => {
            return Err(errors::not_found(
                "heartbeat is only available in embedded mode",
            ))
        }
    };
    Ok(Json(json!({ "refreshes": refreshes })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use carlot_decision::{Decider, FixedDecider};
    use carlot_storage::FileStore;

    use crate::{App, AppConfig, AppState, DeciderMode};

    fn test_state(
        decider: Option<Arc<dyn Decider>>,
    ) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            config: None,
            storage: dir.path().to_string_lossy().into_owned(),
            port: 8123,
            rust_log: "off".to_owned(),
            mode: DeciderMode::AllowAll,
            policy: None,
            decision_url: None,
            allow_path: "allowed".to_owned(),
            refresh_seconds: 60,
            cache_size: 16,
            playground: true,
            cors_origin: "*".to_owned(),
        };
        let store = FileStore::new(dir.path()).unwrap();
        let app = App::new(config, store, decider).unwrap();
        (AppState(Arc::new(app)), dir)
    }

    async fn submit(
        decider: Option<Arc<dyn Decider>>,
        body: Value,
    ) -> (StatusCode, Value) {
        let (state, _dir) = test_state(decider);
        let resp = super::new_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/playground/submit")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn query() -> Value {
        json!({"subject": "alice", "action": "GET", "resource": "/cars", "body": ""})
    }

    #[tokio::test]
    async fn reports_allowed() {
        let (status, body) =
            submit(Some(Arc::new(FixedDecider::allow_all())), query()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], json!(true));
        assert_eq!(body["error"], json!(""));
    }

    #[tokio::test]
    async fn reports_denied() {
        let (status, body) =
            submit(Some(Arc::new(FixedDecider::deny_all())), query()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], json!(false));
    }

    #[tokio::test]
    async fn no_provider_is_reported_as_fail_open() {
        let (status, body) = submit(None, query()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], json!(true));
    }

    #[tokio::test]
    async fn provider_error_lands_in_body() {
        let mut decider = carlot_decision::MockDecider::new();
        decider
            .expect_decision()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let (status, body) = submit(Some(Arc::new(decider)), query()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], json!(false));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn form_page_renders() {
        let (state, _dir) =
            test_state(Some(Arc::new(FixedDecider::allow_all())));
        let resp = super::new_router(state)
            .oneshot(
                Request::builder()
                    .uri("/playground")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn heartbeat_requires_embedded_mode() {
        let (state, _dir) =
            test_state(Some(Arc::new(FixedDecider::allow_all())));
        let resp = super::new_router(state)
            .oneshot(
                Request::builder()
                    .uri("/playground/heartbeat")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
