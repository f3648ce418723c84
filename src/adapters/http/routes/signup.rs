use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, routes::current_actor},
    app_error::{AppError, AppResult},
    domain::entities::signup_request::FeatureRequest,
    use_cases::signup::{DatabaseAccountInput, EmailAccountInput, SignupProfile, SubmitSignup},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_signup))
        .route("/", get(list_signups))
        .route("/{id}", get(get_signup))
        .route("/{id}", delete(purge_signup))
        .route("/{id}/approve", post(approve_signup))
        .route("/{id}/reject", post(reject_signup))
        .route("/{id}/provision", post(provision_signup))
        .route("/{id}/cancel", post(cancel_signup))
        .route("/{id}/log", get(get_provisioning_log))
}

#[derive(Deserialize)]
struct CreateSignupPayload {
    domain: String,
    server_password: String,
    storage_quota_mb: i64,
    #[serde(default)]
    want_ssl: bool,
    #[serde(default)]
    want_dns: bool,
    email: Option<EmailAccountPayload>,
    database: Option<DatabaseAccountPayload>,
}

#[derive(Deserialize)]
struct EmailAccountPayload {
    username: String,
    quota_mb: i64,
    password: String,
}

#[derive(Deserialize)]
struct DatabaseAccountPayload {
    name: String,
    username: String,
    password: String,
}

/// Requested capability as exposed over HTTP. Credential material — raw or
/// encrypted — is never serialized.
#[derive(Serialize)]
struct FeatureResponse {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quota_mb: Option<i64>,
}

fn feature_response(feature: &FeatureRequest) -> FeatureResponse {
    match feature {
        FeatureRequest::Ssl => FeatureResponse {
            kind: "ssl",
            username: None,
            name: None,
            quota_mb: None,
        },
        FeatureRequest::Dns => FeatureResponse {
            kind: "dns",
            username: None,
            name: None,
            quota_mb: None,
        },
        FeatureRequest::Email(r) => FeatureResponse {
            kind: "email",
            username: Some(r.username.clone()),
            name: None,
            quota_mb: Some(r.quota_mb),
        },
        FeatureRequest::Database(r) => FeatureResponse {
            kind: "database",
            username: Some(r.username.clone()),
            name: Some(r.name.clone()),
            quota_mb: None,
        },
    }
}

#[derive(Serialize)]
struct SignupResponse {
    id: Uuid,
    domain: String,
    status: String,
    outcome: Option<String>,
    features: Vec<FeatureResponse>,
    storage_quota_mb: i64,
    admin_comment: Option<String>,
    approved_at: Option<chrono::NaiveDateTime>,
    created_at: Option<chrono::NaiveDateTime>,
}

fn signup_response(signup: &SignupProfile) -> SignupResponse {
    SignupResponse {
        id: signup.id,
        domain: signup.domain.clone(),
        status: signup.status.as_str().to_string(),
        outcome: signup.outcome.map(|o| o.as_str().to_string()),
        features: signup.features.iter().map(feature_response).collect(),
        storage_quota_mb: signup.storage_quota_mb,
        admin_comment: signup.admin_comment.clone(),
        approved_at: signup.approved_at,
        created_at: signup.created_at,
    }
}

async fn create_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<CreateSignupPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;

    let signup = app_state
        .signup_use_cases
        .submit(
            actor.id,
            SubmitSignup {
                domain: payload.domain,
                server_password: payload.server_password,
                storage_quota_mb: payload.storage_quota_mb,
                want_ssl: payload.want_ssl,
                want_dns: payload.want_dns,
                email: payload.email.map(|e| EmailAccountInput {
                    username: e.username,
                    quota_mb: e.quota_mb,
                    password: e.password,
                }),
                database: payload.database.map(|d| DatabaseAccountInput {
                    name: d.name,
                    username: d.username,
                    password: d.password,
                }),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(signup_response(&signup))))
}

#[derive(Deserialize)]
struct ListSignupsParams {
    #[serde(default)]
    all: bool,
}

async fn list_signups(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(params): Query<ListSignupsParams>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let signups = app_state.signup_use_cases.list(actor, params.all).await?;
    let response: Vec<SignupResponse> = signups.iter().map(signup_response).collect();
    Ok(Json(response))
}

async fn get_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let signup = app_state.signup_use_cases.get(actor, id).await?;
    Ok(Json(signup_response(&signup)))
}

#[derive(Deserialize, Default)]
struct DecisionPayload {
    comment: Option<String>,
}

#[derive(Serialize)]
struct ApprovalResponse {
    signup: SignupResponse,
    outcome: String,
}

/// Approval hands straight over to the orchestrator on this worker; the
/// response carries the aggregate outcome of the provisioning attempt.
async fn approve_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;

    let signup = app_state
        .signup_use_cases
        .approve(actor, id, payload.comment.as_deref())
        .await?;

    let outcome = app_state.provisioning_use_cases.run(signup.id).await?;

    // Re-read so the response reflects the recorded outcome.
    let signup = app_state.signup_use_cases.get(actor, id).await?;
    Ok(Json(ApprovalResponse {
        signup: signup_response(&signup),
        outcome: outcome.as_str().to_string(),
    }))
}

async fn reject_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let signup = app_state
        .signup_use_cases
        .reject(actor, id, payload.comment.as_deref())
        .await?;
    Ok(Json(signup_response(&signup)))
}

#[derive(Serialize)]
struct ProvisionResponse {
    outcome: String,
}

/// Explicit retry of a provisioning run. Safe to call repeatedly; every
/// provisioner treats an already-existing resource as success.
async fn provision_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    if !actor.admin {
        return Err(AppError::Forbidden);
    }

    let outcome = app_state.provisioning_use_cases.run(id).await?;
    Ok(Json(ProvisionResponse {
        outcome: outcome.as_str().to_string(),
    }))
}

async fn cancel_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let signup = app_state.signup_use_cases.get(actor, id).await?;
    app_state.provisioning_use_cases.cancel(signup.id)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Serialize)]
struct LogEntryResponse {
    step: String,
    action: String,
    status: String,
    message: String,
    created_at: Option<chrono::NaiveDateTime>,
}

async fn get_provisioning_log(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let signup = app_state.signup_use_cases.get(actor, id).await?;

    let entries = app_state
        .provisioning_use_cases
        .audit_log(signup.id)
        .await?;
    let response: Vec<LogEntryResponse> = entries
        .into_iter()
        .map(|e| LogEntryResponse {
            step: e.step.as_ref().to_string(),
            action: e.action.as_ref().to_string(),
            status: e.status.as_ref().to_string(),
            message: e.message,
            created_at: e.created_at,
        })
        .collect();
    Ok(Json(response))
}

async fn purge_signup(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    app_state.signup_use_cases.purge(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
