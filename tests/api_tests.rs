mod support;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use support::{near_node, node_lon, road_gateway, TestNetwork, LAT};
use transit_network::config::NetworkConfig;
use tower::ServiceExt;
use transit_network::routes::create_router;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn coords(i: usize, meters: f64) -> Value {
    let p = near_node(i, meters);
    json!([p.x(), p.y()])
}

async fn create_stop(app: &Router, name: &str, i: usize) -> Value {
    let p = near_node(i, 10.0);
    let (status, body) = send(
        app,
        Method::POST,
        "/api/stops",
        Some(json!({ "name": name, "longitude": p.x(), "latitude": p.y(), "shelter": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"].clone()
}

async fn create_line(app: &Router, description: &str, from: usize, to: usize) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/lines",
        Some(json!({
            "description": description,
            "company": "CUTCSA",
            "waypoints": [coords(from, 30.0), coords(to, 30.0)],
        })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = create_router(TestNetwork::new().state);
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "transit_network");
}

#[tokio::test]
async fn test_stop_creation_checks_network_and_ranges() {
    let app = create_router(TestNetwork::new().state);

    let stop = create_stop(&app, "Ciudadela", 0).await;
    assert_eq!(stop["enabled"], false);
    assert_eq!(stop["shelter"], true);

    let far = near_node(1, 500.0);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/stops",
        Some(json!({ "name": "Lejos", "longitude": far.x(), "latitude": far.y() })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "STOP_TOO_FAR_FROM_NETWORK");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/stops",
        Some(json!({ "name": "Polo", "longitude": -56.0, "latitude": 95.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_line_lifecycle_over_http() {
    let app = create_router(TestNetwork::new().state);
    create_stop(&app, "Ciudadela", 0).await;
    create_stop(&app, "Tres Cruces", 2).await;

    let (status, body) = create_line(&app, "121", 0, 2).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let line = &body["data"]["line"];
    assert_eq!(line["enabled"], true);
    assert_eq!(line["continuous"], true);
    assert_eq!(line["route"]["type"], "LineString");
    assert_eq!(body["data"]["associations"].as_array().unwrap().len(), 2);
    let id = line["id"].as_str().unwrap().to_string();

    let (status, detail) = send(&app, Method::GET, &format!("/api/lines/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["route_wkt"].as_str().unwrap().starts_with("MULTILINESTRING"));

    let (_, listed) = send(&app, Method::GET, "/api/lines?company=CUTCSA", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, stops) = send(&app, Method::GET, &format!("/api/lines/{id}/stops"), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = stops
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stop"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ciudadela", "Tres Cruces"]);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/lines/{id}/enabled"),
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["line"]["enabled"], false);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/lines/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, &format!("/api/lines/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_line_rejections_carry_their_codes() {
    let app = create_router(TestNetwork::new().state);
    create_stop(&app, "Ciudadela", 0).await;

    let (status, body) = create_line(&app, "121", 0, 2).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ROUTE_ENDPOINTS_NOT_NEAR_STOPS");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/lines",
        Some(json!({ "description": "121", "company": "CUTCSA", "waypoints": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, Method::GET, "/api/lines?origin=Montevideo", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shortest_path_and_validation() {
    let app = create_router(TestNetwork::new().state);
    create_stop(&app, "Ciudadela", 0).await;
    create_stop(&app, "Tres Cruces", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/routing/shortest-path",
        Some(json!({ "waypoints": [coords(0, 30.0), coords(2, 30.0)] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["nodes"], json!([1, 2, 3]));
    assert_eq!(body["data"]["edges"], 2);
    let length = body["data"]["length_m"].as_f64().unwrap();
    assert!((900.0..925.0).contains(&length), "{length}");

    let route = body["data"]["route"].clone();
    let (status, body) = send(&app, Method::POST, "/api/routing/validate", Some(json!({ "route": route }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["strategy"], "sampled");

    let off_road = json!({
        "type": "LineString",
        "coordinates": [[node_lon(0), LAT + 0.01], [node_lon(2), LAT + 0.01]],
    });
    let (status, body) = send(&app, Method::POST, "/api/routing/validate", Some(json!({ "route": off_road }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ROUTE_OUTSIDE_NETWORK_BUFFER");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/routing/shortest-path",
        Some(json!({ "waypoints": [coords(0, 30.0), coords(2, 300.0)] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "WAYPOINT_TOO_FAR_FROM_NETWORK");
}

#[tokio::test]
async fn test_associations_and_schedules() {
    let app = create_router(TestNetwork::new().state);
    create_stop(&app, "Ciudadela", 0).await;
    let middle = create_stop(&app, "Plaza Independencia", 1).await;
    create_stop(&app, "Tres Cruces", 2).await;
    let (_, body) = create_line(&app, "121", 0, 2).await;
    let line_id = body["data"]["line"]["id"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/associations",
        Some(json!({ "stop_id": middle["id"], "line_id": line_id, "schedules": ["07:30", "18:45:00"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["enabled"], true);
    assert_eq!(body["data"]["schedules"].as_array().unwrap().len(), 2);
    let association_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/associations",
        Some(json!({ "stop_id": middle["id"], "line_id": line_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/associations/{association_id}/schedules"),
        Some(json!({ "times": ["7h30"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/associations/{association_id}/schedules"),
        Some(json!({ "times": ["23:10"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let schedule_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (_, active) = send(&app, Method::GET, "/api/lines?from=23:00&to=00:30", None).await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/schedules/{schedule_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, active) = send(&app, Method::GET, "/api/lines?from=23:00&to=00:30", None).await;
    assert!(active.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/associations/{association_id}/enabled"),
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    let (status, stop) = send(&app, Method::GET, &format!("/api/stops/{}", middle["id"].as_str().unwrap()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stop["enabled"], false);

    let (_, near) = send(
        &app,
        Method::GET,
        &format!("/api/stops/{}/lines", middle["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(near.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_destination_kilometre_and_company_listings() {
    let gateway = road_gateway().with_kilometre_post(1, 12, node_lon(1), LAT);
    let app = create_router(TestNetwork::with(gateway, NetworkConfig::default()).state);
    create_stop(&app, "Ciudadela", 0).await;
    create_stop(&app, "Tres Cruces", 2).await;
    let (status, body) = create_line(&app, "121", 0, 2).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["data"]["line"]["id"].clone();

    let (status, listed) = send(&app, Method::GET, "/api/lines?destination=Montevideo", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id);

    let (_, listed) = send(&app, Method::GET, "/api/lines?destination=Canelones", None).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, listed) = send(&app, Method::GET, "/api/lines?road=1&km=12", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], id);

    let (status, body) = send(&app, Method::GET, "/api/lines?road=1&km=99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, Method::GET, "/api/lines?road=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, companies) = send(&app, Method::GET, "/api/companies", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(companies, json!(["CUTCSA"]));
}
