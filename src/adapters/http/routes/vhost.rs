use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, routes::current_actor},
    app_error::AppResult,
    application::validators::system_username_for_domain,
    domain::entities::virtual_host::VirtualHost,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vhost))
        .route("/", get(list_vhosts))
        .route("/{id}", get(get_vhost))
        .route("/{id}", delete(delete_vhost))
}

#[derive(Deserialize)]
struct CreateVhostPayload {
    domain: String,
    #[serde(default)]
    doc_root_slot: i32,
    system_user: Option<String>,
}

#[derive(Serialize)]
struct VhostResponse {
    id: Uuid,
    domain: String,
    doc_root: String,
    doc_root_slot: i32,
    system_user: String,
    created_at: Option<chrono::NaiveDateTime>,
}

fn vhost_response(vhost: &VirtualHost) -> VhostResponse {
    VhostResponse {
        id: vhost.id,
        domain: vhost.domain.clone(),
        doc_root: vhost.doc_root.clone(),
        doc_root_slot: vhost.doc_root_slot,
        system_user: vhost.system_user.clone(),
        created_at: vhost.created_at,
    }
}

async fn create_vhost(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<CreateVhostPayload>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;

    let system_user = payload
        .system_user
        .unwrap_or_else(|| system_username_for_domain(&payload.domain));

    let vhost = app_state
        .vhost_use_cases
        .create(actor.id, &payload.domain, payload.doc_root_slot, &system_user)
        .await?;

    Ok((StatusCode::CREATED, Json(vhost_response(&vhost))))
}

async fn list_vhosts(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let vhosts = app_state.vhost_use_cases.list(actor).await?;
    let response: Vec<VhostResponse> = vhosts.iter().map(vhost_response).collect();
    Ok(Json(response))
}

async fn get_vhost(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    let vhost = app_state.vhost_use_cases.get(actor, id).await?;
    Ok(Json(vhost_response(&vhost)))
}

async fn delete_vhost(
    State(app_state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let actor = current_actor(&jar, &headers, &app_state)?;
    app_state.vhost_use_cases.delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::json;

    use super::*;
    use crate::test_utils::{TestAppStateBuilder, auth_cookie_for};

    fn test_server(app_state: AppState) -> TestServer {
        let app = Router::new()
            .nest("/api", crate::adapters::http::routes::router())
            .with_state(app_state);
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn create_and_delete_round_trip() {
        let builder = TestAppStateBuilder::new();
        let server = test_server(builder.build());
        let cookie = auth_cookie_for(Uuid::new_v4(), false);

        let created = server
            .post("/api/vhosts")
            .add_header("Cookie", cookie.clone())
            .json(&json!({ "domain": "example.com" }))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);

        let body: serde_json::Value = created.json();
        assert_eq!(body["system_user"], "example");
        assert_eq!(body["doc_root"], "/var/www/example/example.com");
        assert!(builder.web.has_config("example.com", 0));

        let id = body["id"].as_str().unwrap().to_string();
        let deleted = server
            .delete(&format!("/api/vhosts/{id}"))
            .add_header("Cookie", cookie)
            .await;
        assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
        assert!(!builder.web.has_config("example.com", 0));
    }

    #[tokio::test]
    async fn duplicate_domain_conflicts_and_compensates() {
        let builder = TestAppStateBuilder::new();
        let server = test_server(builder.build());

        let first = server
            .post("/api/vhosts")
            .add_header("Cookie", auth_cookie_for(Uuid::new_v4(), false))
            .json(&json!({ "domain": "example.com" }))
            .await;
        assert_eq!(first.status_code(), StatusCode::CREATED);

        let second = server
            .post("/api/vhosts")
            .add_header("Cookie", auth_cookie_for(Uuid::new_v4(), false))
            .json(&json!({ "domain": "example.com" }))
            .await;
        assert_eq!(second.status_code(), StatusCode::CONFLICT);

        // The loser's compensating removal ran; the winner's config stays.
        assert_eq!(builder.web.remove_calls(), 1);
        assert_eq!(builder.vhosts.count(), 1);
    }

    #[tokio::test]
    async fn foreign_vhosts_are_invisible() {
        let server = test_server(TestAppStateBuilder::new().build());

        let created = server
            .post("/api/vhosts")
            .add_header("Cookie", auth_cookie_for(Uuid::new_v4(), false))
            .json(&json!({ "domain": "example.com" }))
            .await;
        let id = created.json::<serde_json::Value>()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = server
            .get(&format!("/api/vhosts/{id}"))
            .add_header("Cookie", auth_cookie_for(Uuid::new_v4(), false))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
