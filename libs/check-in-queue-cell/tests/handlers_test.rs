use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use check_in_queue_cell::queue_routes;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn create_test_app(mock_server: &MockServer) -> Router {
    queue_routes(TestConfig::with_url(&mock_server.uri()).to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_get_entry_returns_stored_row() {
    let mock_server = MockServer::start().await;
    let entry_id = Uuid::new_v4();
    let clinician_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", entry_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::queue_entry_row(
                &entry_id.to_string(),
                &Uuid::new_v4().to_string(),
                None,
                &clinician_id.to_string(),
                "IN_CONSULTATION",
                "2024-03-04T09:15:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/entries/{}", entry_id))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&mock_server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["id"], entry_id.to_string());
    assert_eq!(json_response["clinician_id"], clinician_id.to_string());
    assert_eq!(json_response["status"], "IN_CONSULTATION");
}

#[tokio::test]
async fn test_projection_endpoint_merges_sources() {
    let mock_server = MockServer::start().await;
    let clinician_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::queue_entry_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                None,
                &clinician_id.to_string(),
                "WAITING",
                "2024-03-04T09:15:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(SCHEDULED,CONFIRMED)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &clinician_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2024-03-04",
                "10:00:00",
                "CONFIRMED"
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/?clinician_id={}", clinician_id))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&mock_server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["total"], 2);
    assert_eq!(json_response["entries"][0]["kind"], "virtual");
    assert_eq!(json_response["entries"][0]["is_from_appointment"], true);
    assert_eq!(json_response["entries"][1]["kind"], "persisted");
}

#[tokio::test]
async fn test_transition_on_unknown_entry_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let body = json!({
        "entry": { "kind": "persisted", "id": Uuid::new_v4() },
        "target_status": "COMPLETED"
    });

    let response = create_test_app(&mock_server)
        .oneshot(json_request("POST", "/transitions", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_walk_in_without_clinician_is_bad_request() {
    let mock_server = MockServer::start().await;

    let body = json!({ "patient_id": Uuid::new_v4() });

    let response = create_test_app(&mock_server)
        .oneshot(json_request("POST", "/check-in", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json_response = body_json(response).await;
    assert!(json_response["error"].as_str().unwrap().contains("Walk-in"));
}
