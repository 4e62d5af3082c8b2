//! Web front-end: an HTML survey form and a JSON prediction API, both backed
//! by one shared [`Predictor`].

pub mod html;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use stressews_ai::{PredictError, Predictor};
use stressews_core::{FeatureSchema, FeatureVector, FieldIssue, PredictionResult, Problem};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::html::Outcome;

/// Requests taking longer than this are answered with 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(form_handler))
        .route("/health", get(health_handler))
        .route("/schema", get(schema_handler))
        .route("/predict", post(predict_handler))
        .route("/predict/form", post(predict_form_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Bind `addr` and serve until the process is interrupted.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let model_id = state.predictor().model_id().to_string();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, model_id, "serving stress early-warning form");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await
        .context("web server failed")
}

/// Resolve once `signal` fires. If the handler cannot be installed, never
/// resolve, so the server keeps running until the process is killed.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutting down"),
        Err(err) => {
            warn!(error = %err, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

// ── Request and response types ──

/// JSON body of `POST /predict`: entries in document order, any value type,
/// so a wrongly typed field is reported by name rather than as a parse error.
#[derive(Debug, Default)]
pub struct PredictRequest {
    entries: Vec<(String, serde_json::Value)>,
}

impl PredictRequest {
    /// Split into the usable feature vector and one issue per entry that is
    /// neither a number nor a string.
    pub fn into_vector(self) -> (FeatureVector, Vec<FieldIssue>) {
        let mut vector = FeatureVector::new();
        let mut issues = Vec::new();
        for (name, value) in self.entries {
            let found = match value {
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(v) => {
                        vector.insert(name, v);
                        continue;
                    }
                    None => "an unrepresentable number",
                },
                serde_json::Value::String(s) => {
                    vector.insert(name, s);
                    continue;
                }
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "a boolean",
                serde_json::Value::Array(_) => "an array",
                serde_json::Value::Object(_) => "an object",
            };
            issues.push(FieldIssue::new(name, Problem::WrongType { found: found.into() }));
        }
        (vector, issues)
    }
}

impl<'de> Deserialize<'de> for PredictRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = PredictRequest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object mapping feature names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, serde_json::Value>()? {
                    entries.push(entry);
                }
                Ok(PredictRequest { entries })
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}


#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_id: String,
    pub features: usize,
    pub classes: usize,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: PredictionResult,
    /// The normalised values handed to the model, in schema order.
    pub input: FeatureVector,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, issues: Vec<FieldIssue>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            issues,
        }),
    )
}

// ── Handlers ──

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let p = state.predictor();
    Json(HealthResponse {
        status: "ok",
        model_id: p.model_id().to_string(),
        features: p.schema().len(),
        classes: p.n_classes(),
    })
}

async fn schema_handler(State(state): State<AppState>) -> Json<FeatureSchema> {
    Json(state.predictor().schema().clone())
}

async fn form_handler(State(state): State<AppState>) -> Html<String> {
    let p = state.predictor();
    Html(html::page(p.schema(), p.model_id(), &|_: &str| None, Outcome::Blank))
}

async fn predict_handler(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        api_error(rejection.status(), rejection.body_text(), Vec::new())
    })?;
    let p = state.predictor();
    let (input, mut issues) = body.into_vector();

    let validated = p.schema().validate(&input);
    if let Err(err) = &validated {
        // A wrongly typed field was left out of `input`; don't also call it missing.
        let extra: Vec<FieldIssue> = err
            .issues
            .iter()
            .filter(|i| !(i.problem == Problem::Missing && issues.iter().any(|t| t.field == i.field)))
            .cloned()
            .collect();
        issues.extend(extra);
    }
    let validated = match validated {
        Ok(v) if issues.is_empty() => v,
        _ => {
            return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid input", issues));
        }
    };

    match p.predict_validated(&validated) {
        Ok(prediction) => Ok(Json(PredictResponse {
            prediction,
            input: p.schema().named(&validated),
        })),
        Err(err) => {
            warn!(error = %err, "prediction failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), Vec::new()))
        }
    }
}

/// Handle the HTML form. Every field arrives as text and is parsed by the
/// schema (dropdowns post codes or category values).
async fn predict_form_handler(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let p = state.predictor();
    let schema = p.schema();
    let raw = |name: &str| {
        fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    let render = |outcome: Outcome<'_>| Html(html::page(schema, p.model_id(), &raw, outcome));

    let mut input = FeatureVector::new();
    let mut issues = Vec::new();
    for (name, value) in &fields {
        match schema.parse_value(name, value) {
            Ok(v) => input.insert(name.as_str(), v),
            Err(issue) => issues.push(issue),
        }
    }
    if !issues.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, render(Outcome::Invalid(&issues))).into_response();
    }

    match p.predict(&input) {
        Ok(result) => render(Outcome::Result(&result)).into_response(),
        Err(PredictError::InvalidInput(err)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, render(Outcome::Invalid(&err.issues))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "prediction failed");
            let msg = err.to_string();
            (StatusCode::INTERNAL_SERVER_ERROR, render(Outcome::Failed(&msg))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use stressews_core::{ArtifactPaths, RiskLabel};
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");
        let predictor = Predictor::load(&ArtifactPaths::from_project_root(&root)).unwrap();
        create_router(AppState::new(predictor))
    }

    fn good_student() -> serde_json::Value {
        serde_json::json!({
            "school": "GP", "sex": "F", "age": 17, "address": "U", "famsize": "GT3",
            "Pstatus": "T", "Medu": 4, "Fedu": 3, "Mjob": "teacher", "Fjob": "services",
            "reason": "course", "guardian": "mother", "traveltime": 1, "studytime": 3,
            "failures": 0, "schoolsup": 0, "famsup": 1, "paid": 0, "activities": 1,
            "nursery": 1, "higher": 1, "internet": 1, "romantic": 0, "famrel": 4,
            "freetime": 3, "goout": 2, "Dalc": 1, "Walc": 1, "health": 5,
            "absences": 2, "G1": 15, "G2": 16
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_model() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_id"], "stress-logreg-v1");
        assert_eq!(json["features"], 32);
        assert_eq!(json["classes"], 3);
    }

    #[tokio::test]
    async fn schema_lists_fields_in_order() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        let fields = json.as_array().unwrap();
        assert_eq!(fields.len(), 32);
        assert_eq!(fields[0]["name"], "school");
        assert_eq!(fields[0]["kind"], "categorical");
        assert_eq!(fields[2]["name"], "age");
        assert_eq!(fields[2]["min"], 10.0);
    }

    #[tokio::test]
    async fn predict_json_returns_result_and_echo() {
        let response = create_test_app()
            .oneshot(post_json("/predict", &good_student()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["prediction"]["label"], "Low");
        assert_eq!(json["prediction"]["probabilities"].as_array().unwrap().len(), 3);
        assert_eq!(json["input"]["G2"], 16.0);
        assert_eq!(json["input"].as_object().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn predict_json_names_missing_field() {
        let mut body = good_student();
        body.as_object_mut().unwrap().remove("G2");
        let response = create_test_app()
            .oneshot(post_json("/predict", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["issues"][0]["field"], "G2");
        assert_eq!(json["issues"][0]["problem"], "missing");
    }

    #[tokio::test]
    async fn predict_json_rejects_unknown_category() {
        let mut body = good_student();
        body["school"] = "XYZ".into();
        let response = create_test_app()
            .oneshot(post_json("/predict", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["issues"][0]["field"], "school");
    }

    #[tokio::test]
    async fn predict_json_rejects_malformed_body() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn form_page_renders() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<form method=\"post\" action=\"/predict/form\">"));
        assert!(html.contains("stress-logreg-v1"));
    }

    fn form_body(student: &serde_json::Value) -> String {
        student
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn post_form(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict/form")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn form_submission_shows_result() {
        let response = create_test_app()
            .oneshot(post_form(form_body(&good_student())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(&format!("Predicted stress level: {}", RiskLabel::Low)));
    }

    #[tokio::test]
    async fn form_submission_flags_bad_number() {
        let mut student = good_student();
        student["age"] = "seventeen".into();
        let response = create_test_app()
            .oneshot(post_form(form_body(&student)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("Please fix the highlighted fields."));
        assert!(html.contains("value=\"seventeen\""));
    }

    #[tokio::test]
    async fn predict_json_echoes_normalised_values_in_schema_order() {
        let mut body = good_student();
        body["absences"] = "12".into();
        let response = create_test_app()
            .oneshot(post_json("/predict", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["input"]["absences"], 12.0);
        // The request body is alphabetical ("G2" before "school"); the echo is not.
        let school = text.find("\"school\":").unwrap();
        let g2 = text.find("\"G2\":").unwrap();
        assert!(school < g2, "{text}");
    }

    #[tokio::test]
    async fn predict_json_names_wrongly_typed_field() {
        let mut body = good_student();
        body["age"] = serde_json::Value::Null;
        body["higher"] = true.into();
        let response = create_test_app()
            .oneshot(post_json("/predict", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        let issues = json["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 2, "{json}");
        let age = issues.iter().find(|i| i["field"] == "age").unwrap();
        assert_eq!(age["problem"], "wrong_type");
        assert_eq!(age["found"], "null");
        assert!(issues.iter().any(|i| i["field"] == "higher"));
    }

    #[test]
    fn request_keeps_repeated_keys() {
        let body: PredictRequest = serde_json::from_str(r#"{"age": 17, "age": "18"}"#).unwrap();
        let (vector, issues) = body.into_vector();
        assert!(issues.is_empty());
        assert_eq!(vector.len(), 2);
        let err = FeatureSchema::student().validate(&vector).unwrap_err();
        assert!(err.issue_for("age").is_some());
    }

    #[tokio::test]
    async fn shutdown_waits_when_signal_cannot_be_installed() {
        let failed = shutdown_on(async { Err::<(), _>(std::io::Error::other("no signal handler")) });
        assert!(tokio::time::timeout(Duration::from_millis(50), failed).await.is_err());

        let fired = shutdown_on(async { Ok::<(), std::io::Error>(()) });
        assert!(tokio::time::timeout(Duration::from_millis(50), fired).await.is_ok());
    }
}
