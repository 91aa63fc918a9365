use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use carlot_decision::Input;
use carlot_slo::errors::{self, WithBacktrace};

use crate::{valid::ClientIp, AppState};

/// Authorization gate. Extracting `Auth` asks the configured decision
/// provider whether the request may proceed; handlers that take it are
/// only ever invoked for allowed requests.
///
/// The subject is taken from the `User` header (no real authentication,
/// this is a sample), the action is the HTTP method and the resource is
/// the URI path. All request headers travel in the input context.
#[derive(Debug)]
pub struct Auth {
    pub subject: String,
    pub decision_id: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WithBacktrace;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        let action = parts.method.to_string();
        let resource = parts.uri.path().to_owned();
        let subject = parts
            .headers
            .get("User")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let Some(decider) = app.decider.clone() else {
            warn!(
                "no decision provider configured, allowing {} {}",
                action, resource
            );
            return Ok(Self {
                subject,
                decision_id: None,
            });
        };

        let remote = ClientIp::from_request_parts(parts, state)
            .await
            .map(|v| v.ip.to_string())
            .unwrap_or_default();

        let mut headers = HashMap::<String, Value>::new();
        for (name, value) in parts.headers.iter() {
            headers.insert(
                name.as_str().to_owned(),
                Value::from(
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                ),
            );
        }
        let input = Input {
            action,
            resource,
            subject,
            context: HashMap::from([("headers".to_owned(), json!(headers))]),
        };

        let decision = decider.decision(&input).await.map_err(|err| {
            errors::decision_unavailable(&format!(
                "failed to get decision for input: {err}"
            ))
        })?;

        // A failure here means the deployed allow path does not match
        // the shape this provider actually returns. Neither allow nor
        // deny would be trustworthy, so the request fails with a
        // distinct configuration-fault code.
        let allowed =
            app.allow_path.extract(&decision.result).map_err(|err| {
                error!(
                    "decision {} has unexpected result shape: {}",
                    decision.id, err
                );
                errors::misconfigured(&err)
            })?;

        if !allowed {
            info!(
                "{} {} {} {}: denied by decision {}",
                remote, input.subject, input.action, input.resource, decision.id
            );
            return Err(errors::forbidden("action prohibited by policy"));
        }

        info!(
            "{} {} {} {}: allowed by decision {}",
            remote, input.subject, input.action, input.resource, decision.id
        );
        Ok(Self {
            subject: input.subject,
            decision_id: Some(decision.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, routing::get, Router};
    use http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use carlot_decision::{Decider, Decision, FixedDecider, MockDecider};
    use carlot_storage::FileStore;

    use crate::{App, AppConfig, AppState};

    use super::Auth;

    fn state(decider: Option<Arc<dyn Decider>>) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            config: None,
            storage: dir.path().to_string_lossy().into_owned(),
            port: 8123,
            rust_log: "off".to_owned(),
            mode: crate::DeciderMode::Disabled,
            policy: None,
            decision_url: None,
            allow_path: "allowed".to_owned(),
            refresh_seconds: 60,
            cache_size: 16,
            playground: false,
            cors_origin: "*".to_owned(),
        };
        let store = FileStore::new(dir.path()).unwrap();
        let app = App::new(config, store, decider).unwrap();
        (AppState(Arc::new(app)), dir)
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route(
                "/cars",
                get(|auth: Auth| async move {
                    format!(
                        "handled for {} by {}",
                        auth.subject,
                        auth.decision_id.unwrap_or_default()
                    )
                }),
            )
            .with_state(state)
    }

    async fn status_for(
        decider: Option<Arc<dyn Decider>>,
    ) -> (StatusCode, String) {
        let (state, _dir) = state(decider);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/cars")
                    .header("User", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn allowed_request_reaches_handler() {
        let decider = FixedDecider::new(Decision {
            id: "d1".to_owned(),
            result: json!({"allowed": true}),
        });
        let (status, body) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "handled for alice by d1");
    }

    #[tokio::test]
    async fn denied_request_is_forbidden() {
        let decider = FixedDecider::new(Decision {
            id: "d2".to_owned(),
            result: json!({"allowed": false}),
        });
        let (status, body) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("action prohibited by policy"));
        assert!(!body.contains("handled"));
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let mut decider = MockDecider::new();
        decider
            .expect_decision()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let (status, body) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.contains("handled"));
    }

    #[tokio::test]
    async fn mismatched_allow_path_is_a_configuration_fault() {
        // Provider returns a shape the configured path cannot navigate;
        // the request must fail rather than default to allow or deny.
        let decider = FixedDecider::new(Decision {
            id: "d3".to_owned(),
            result: json!({"verdict": "yes"}),
        });
        let (status, body) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("1020007"));
        assert!(!body.contains("handled"));
    }

    #[tokio::test]
    async fn non_boolean_terminal_is_a_configuration_fault() {
        let decider = FixedDecider::new(Decision {
            id: "d4".to_owned(),
            result: json!({"allowed": "true"}),
        });
        let (status, _) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn no_decider_fails_open() {
        let (status, body) = status_for(None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "handled for alice by ");
    }

    #[tokio::test]
    async fn subject_comes_from_user_header() {
        let decider = {
            let mut mock = MockDecider::new();
            mock.expect_decision()
                .withf(|input| {
                    input.subject == "alice"
                        && input.action == "GET"
                        && input.resource == "/cars"
                })
                .returning(|_| {
                    Ok(Decision {
                        id: "d5".to_owned(),
                        result: json!({"allowed": true}),
                    })
                });
            mock
        };
        let (status, _) = status_for(Some(Arc::new(decider))).await;
        assert_eq!(status, StatusCode::OK);
    }
}
