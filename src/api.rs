use crate::server::AppState;
use crate::session::WidgetSession;
use crate::store::WidgetSnapshot;
use crate::types::{
    Answer, AnswerValue, DisplayMode, Feedback, MockApiResponse, WidgetConfigPatch, WizardStep,
};
use crate::validation::{self, AnswerError, ConfigError};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown widget session {0}")]
    SessionNotFound(Uuid),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    InvalidAnswer(#[from] AnswerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidConfig(_) | ApiError::InvalidAnswer(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        if status != StatusCode::NOT_FOUND {
            warn!(error = %self, "rejected widget request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn session(state: &AppState, id: Uuid) -> ApiResult<Arc<WidgetSession>> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

pub async fn serve_loader(State(state): State<AppState>) -> impl IntoResponse {
    let script = crate::assets::loader_script(&state.config.loader_defaults());
    let mut resp = Response::new(axum::body::Body::from(script));
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=300"),
    );
    resp
}

pub async fn serve_widget_page(State(state): State<AppState>) -> Html<String> {
    Html(crate::assets::widget_page(&state.config.widget))
}

pub async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: WidgetSnapshot,
}

impl From<WidgetSnapshot> for StateResponse {
    fn from(state: WidgetSnapshot) -> Self {
        Self { state }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub config: WidgetConfigPatch,
    #[serde(default)]
    pub display_mode: Option<DisplayMode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub state: WidgetSnapshot,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let config = state.config.widget.clone().merged(body.config);
    validation::validate_config(&config)?;
    let session = state.sessions.create(config).await;
    let snapshot = match body.display_mode {
        Some(mode) => session.update(|store| store.set_display_mode(mode)).await,
        None => session.snapshot().await,
    };
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id(),
            state: snapshot,
        }),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    Ok(Json(session.snapshot().await.into()))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

#[derive(Debug, Deserialize)]
pub struct ProblemRequest {
    pub description: String,
}

pub async fn set_problem(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProblemRequest>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let snapshot = session
        .update(|store| store.set_problem_description(body.description))
        .await;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: WizardStep,
}

pub async fn set_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StepRequest>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let snapshot = session
        .update(|store| store.set_current_step(body.step))
        .await;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Deserialize)]
pub struct DisplayModeRequest {
    pub mode: DisplayMode,
}

pub async fn set_display_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DisplayModeRequest>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let snapshot = session
        .update(|store| store.set_display_mode(body.mode))
        .await;
    Ok(Json(snapshot.into()))
}

pub async fn patch_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WidgetConfigPatch>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let candidate = session
        .read(|store| store.config().clone())
        .await
        .merged(patch.clone());
    validation::validate_config(&candidate)?;
    let snapshot = session.update(|store| store.update_config(patch)).await;
    Ok(Json(snapshot.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionsResponse {
    #[serde(flatten)]
    pub response: MockApiResponse,
    pub state: WidgetSnapshot,
}

/// Fetch the next question set and install it (and any solution) in the store.
pub async fn next_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NextQuestionsResponse>> {
    let session = session(&state, id).await?;
    let response = session.fetch_next_questions().await;
    let snapshot = session
        .update(|store| {
            store.set_current_questions(response.questions.clone());
            if let Some(solution) = &response.solution {
                store.set_current_solution(Some(solution.clone()));
            }
        })
        .await;
    Ok(Json(NextQuestionsResponse {
        response,
        state: snapshot,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    pub value: AnswerValue,
    #[serde(default)]
    pub label: Option<String>,
}

pub async fn save_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerRequest>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let question = session
        .read(|store| {
            store
                .current_questions()
                .iter()
                .find(|q| q.id == body.question_id)
                .cloned()
        })
        .await;
    if let Some(question) = &question {
        validation::check_answer(question, &body.value)?;
    }
    session
        .save_answer(Answer::new(&body.question_id, body.value, body.label))
        .await;
    Ok(Json(session.snapshot().await.into()))
}

pub async fn remove_answer(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let snapshot = session
        .update(|store| store.remove_answer(&question_id))
        .await;
    Ok(Json(snapshot.into()))
}

pub async fn save_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(feedback): Json<Feedback>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    session.save_feedback(feedback).await;
    Ok(Json(session.snapshot().await.into()))
}

pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StateResponse>> {
    let session = session(&state, id).await?;
    let snapshot = session.update(|store| store.reset()).await;
    Ok(Json(snapshot.into()))
}
