//! Request handlers.
//!
//! Role lists arrive on the request in this build; a fronting gateway is
//! expected to inject them from the authenticated session. The engine
//! re-checks roles on every operation regardless.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use seva_audit::{AuditEvent, ChainVerification};
use seva_engine::{Actor, TransitionRequest};
use seva_tasks::InboxFilter;
use seva_types::{
    Application, Arn, AuthorityId, OfficerId, QueryCycle, QueryId, RoleId, ServiceKey, Task,
    TaskId, TaskStatus,
};
use serde::{Deserialize, Serialize};

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse::<uuid::Uuid>()
        .map(TaskId)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a task id", raw)))
}

fn parse_query_id(raw: &str) -> Result<QueryId, ApiError> {
    raw.parse::<uuid::Uuid>()
        .map(QueryId)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a query id", raw)))
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_secs: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.clone(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

// ── Applications ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub arn: String,
    pub service_key: String,
    pub version: u32,
    pub authority_id: String,
    pub data: serde_json::Value,
}

pub async fn submit_application(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<Application>> {
    let app = state
        .engine
        .submit_application(
            Arn::new(request.arn),
            ServiceKey::new(request.service_key),
            request.version,
            AuthorityId::new(request.authority_id),
            request.data,
        )
        .await?;
    Ok(Json(app))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(arn): Path<String>,
) -> ApiResult<Json<Application>> {
    Ok(Json(state.engine.application(&Arn::new(arn))?))
}

// ── Transitions ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TransitionBody {
    pub transition_id: String,
    pub officer_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub remarks: Option<String>,
    #[serde(default)]
    pub reason_codes: Vec<String>,
    /// System-triggered transitions carry no officer.
    #[serde(default)]
    pub system: bool,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub arn: String,
    pub new_state: String,
    pub task_id: Option<String>,
}

pub async fn execute_transition(
    State(state): State<AppState>,
    Path(arn): Path<String>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<Json<TransitionResponse>> {
    let actor = if body.system {
        Actor::System
    } else {
        let officer_id = body
            .officer_id
            .ok_or_else(|| ApiError::BadRequest("officer_id is required".into()))?;
        Actor::officer(officer_id, body.roles.iter().map(RoleId::new).collect())
    };

    let mut request =
        TransitionRequest::new(Arn::new(arn), body.transition_id, actor).with_payload(body.payload);
    if let Some(remarks) = body.remarks {
        request = request.with_remarks(remarks);
    }
    request = request.with_reason_codes(body.reason_codes);

    let outcome = state.engine.execute_transition(request).await?;
    Ok(Json(TransitionResponse {
        arn: outcome.arn.to_string(),
        new_state: outcome.to.to_string(),
        task_id: outcome.task_id.map(|id| id.to_string()),
    }))
}

// ── Inbox and tasks ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct InboxQuery {
    /// Comma-separated role list.
    pub roles: String,
    pub authority: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn inbox(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let roles: Vec<RoleId> = query
        .roles
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(RoleId::new)
        .collect();
    if roles.is_empty() {
        return Err(ApiError::BadRequest("at least one role is required".into()));
    }

    let mut filter = InboxFilter::for_roles(roles).page(
        query.limit.unwrap_or(50).min(200),
        query.offset.unwrap_or(0),
    );
    if let Some(authority) = query.authority {
        filter = filter.with_authority(AuthorityId::new(authority));
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }

    Ok(Json(state.engine.inbox(&filter)))
}

#[derive(Deserialize)]
pub struct ClaimBody {
    pub officer_id: String,
    pub roles: Vec<String>,
}

pub async fn claim_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ClaimBody>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;
    let roles: Vec<RoleId> = body.roles.iter().map(RoleId::new).collect();
    let task = state
        .engine
        .claim_task(&task_id, &OfficerId::new(body.officer_id), &roles)?;
    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct ReleaseBody {
    pub officer_id: String,
}

pub async fn release_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReleaseBody>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .engine
        .release_task(&task_id, &OfficerId::new(body.officer_id))?;
    Ok(Json(task))
}

// ── Queries ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RaiseQueryBody {
    pub task_id: String,
    pub message: String,
    #[serde(default)]
    pub unlocked_fields: Vec<String>,
    #[serde(default)]
    pub unlocked_doc_types: Vec<String>,
}

pub async fn raise_query(
    State(state): State<AppState>,
    Path(arn): Path<String>,
    Json(body): Json<RaiseQueryBody>,
) -> ApiResult<Json<QueryCycle>> {
    let task_id = parse_task_id(&body.task_id)?;
    let query = state
        .engine
        .raise_query(
            &Arn::new(arn),
            &task_id,
            body.message,
            body.unlocked_fields,
            body.unlocked_doc_types,
        )
        .await?;
    Ok(Json(query))
}

#[derive(Deserialize)]
pub struct QueryResponseBody {
    pub arn: String,
    pub data: serde_json::Value,
}

pub async fn respond_to_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QueryResponseBody>,
) -> ApiResult<Json<Application>> {
    let query_id = parse_query_id(&id)?;
    let app = state
        .engine
        .respond_to_query(&Arn::new(body.arn), &query_id, body.data)
        .await?;
    Ok(Json(app))
}

// ── Audit ────────────────────────────────────────────────────────────

pub async fn verify_audit(State(state): State<AppState>) -> Json<ChainVerification> {
    Json(state.engine.verify_audit())
}

pub async fn application_audit(
    State(state): State<AppState>,
    Path(arn): Path<String>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    // 404 for unknown applications rather than an empty trail.
    let arn = Arn::new(arn);
    state.engine.application(&arn)?;
    Ok(Json(state.engine.audit_events_for(&arn)))
}
