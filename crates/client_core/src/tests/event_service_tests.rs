use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{EventId, UserId};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    inserts: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    reject_with: Option<StatusCode>,
}

async fn handle_insert(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = state.reject_with {
        return (
            status,
            Json(json!({
                "code": "42501",
                "message": "new row violates row-level security policy",
            })),
        );
    }

    let row = body[0].clone();
    state.inserts.lock().await.push((headers, body));
    (
        StatusCode::CREATED,
        Json(json!([{
            "id": 11,
            "title": row["title"],
            "description": row["description"],
            "start_time": row["start_time"],
            "end_time": row["end_time"],
            "latitude": row["latitude"],
            "longitude": row["longitude"],
            "created_by": row["created_by"],
            "created_at": "2026-05-01T18:00:00Z",
        }])),
    )
}

async fn handle_list() -> Json<Value> {
    Json(json!([
        { "id": 1, "title": "Rooftop", "latitude": 37.7, "longitude": -122.4 },
        { "id": 2, "title": "Jam", "description": "Bring a guitar", "start_time": "8 PM",
          "latitude": 37.8, "longitude": -122.5 },
    ]))
}

async fn spawn_rest_gateway(state: ServerState) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/rest/v1/events", post(handle_insert).get(handle_list))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn new_event(user_id: Option<UserId>) -> NewEvent {
    NewEvent {
        title: "Rooftop Party".into(),
        description: "Live DJ".into(),
        timing: "7:00 PM".into(),
        end_time: Some("11:00 PM".into()),
        latitude: 37.78825,
        longitude: -122.4324,
        user_id,
    }
}

#[test]
fn table_url_is_joined_under_project_url() {
    let service = SupabaseEventService::new("https://demo.supabase.co", "anon").expect("url");
    assert_eq!(
        service.table_url().as_str(),
        "https://demo.supabase.co/rest/v1/events"
    );

    let nested = SupabaseEventService::new("http://localhost:54321/proxy", "anon").expect("url");
    assert_eq!(
        nested.table_url().as_str(),
        "http://localhost:54321/proxy/rest/v1/events"
    );
}

#[test]
fn rejects_malformed_project_url() {
    assert!(matches!(
        SupabaseEventService::new("not a url", "anon"),
        Err(EventServiceError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn create_event_posts_row_and_returns_record() {
    let state = ServerState::default();
    let base = spawn_rest_gateway(state.clone()).await.expect("server");
    let service = SupabaseEventService::new(&base, "anon-key").expect("service");
    let author = UserId(uuid::Uuid::new_v4());

    let record = service
        .create_event(&new_event(Some(author)))
        .await
        .expect("created");

    assert_eq!(record.id, EventId(11));
    assert_eq!(record.start_time, "7:00 PM");
    assert_eq!(record.created_by, Some(author));
    assert!(record.created_at.is_some());

    let inserts = state.inserts.lock().await;
    assert_eq!(inserts.len(), 1);
    let (headers, body) = &inserts[0];
    assert_eq!(headers["apikey"], "anon-key");
    assert_eq!(headers["authorization"], "Bearer anon-key");
    assert_eq!(headers["prefer"], "return=representation");
    assert_eq!(body[0]["start_time"], "7:00 PM");
    assert_eq!(body[0]["end_time"], "11:00 PM");
    assert_eq!(body[0]["created_by"], author.0.to_string());
}

#[tokio::test]
async fn access_token_replaces_anon_bearer() {
    let state = ServerState::default();
    let base = spawn_rest_gateway(state.clone()).await.expect("server");
    let service = SupabaseEventService::new(&base, "anon-key")
        .expect("service")
        .with_access_token("user-jwt");

    service.create_event(&new_event(None)).await.expect("created");

    let inserts = state.inserts.lock().await;
    assert_eq!(inserts[0].0["authorization"], "Bearer user-jwt");
    assert_eq!(inserts[0].0["apikey"], "anon-key");
}

#[tokio::test]
async fn rejected_insert_maps_status_and_message() {
    let state = ServerState {
        reject_with: Some(StatusCode::FORBIDDEN),
        ..ServerState::default()
    };
    let base = spawn_rest_gateway(state).await.expect("server");
    let service = SupabaseEventService::new(&base, "anon-key").expect("service");

    let err = service
        .create_event(&new_event(None))
        .await
        .expect_err("rejected");

    assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    assert!(err.to_string().contains("row-level security"));
}

#[tokio::test]
async fn list_events_decodes_sparse_rows() {
    let base = spawn_rest_gateway(ServerState::default())
        .await
        .expect("server");
    let service = SupabaseEventService::new(&base, "anon-key").expect("service");

    let events = service.list_events().await.expect("events");

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].title, "Rooftop");
    assert!(events[0].description.is_empty());
    assert_eq!(events[1].start_time, "8 PM");
}

#[tokio::test]
async fn missing_service_reports_not_configured() {
    assert!(matches!(
        MissingEventService.list_events().await,
        Err(EventServiceError::NotConfigured)
    ));
}
