use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use trio_tag_lib::config::AppConfig;
use trio_tag_lib::server::{router, AppState};
use trio_tag_lib::store::DocumentStore;

const ROSTER: &str = "name,gender\nAna,F\nBen,M\nCal,M\nDee,F\nEli,M\nFin,M\nGus,M\n";

async fn spawn_app() -> String {
    let config = AppConfig {
        admin_username: "365run".to_string(),
        admin_password: "secret".to_string(),
        shuffle_seed: Some(7),
        ..AppConfig::default()
    };
    let state = AppState::new(config, Arc::new(DocumentStore::in_memory()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn login(client: &Client, api: &str) -> String {
    let res = client
        .post(format!("{api}/auth/login"))
        .json(&json!({ "username": "365run", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "365run");
    body["token"].as_str().unwrap().to_string()
}

async fn upload(client: &Client, api: &str, token: &str, csv: &str) -> reqwest::Response {
    let form = Form::new().part("file", Part::text(csv.to_string()).file_name("roster.csv"));
    client
        .post(format!("{api}/participants/upload"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_login_and_gating() {
    let api = spawn_app().await;
    let client = Client::new();

    let res = client
        .post(format!("{api}/auth/login"))
        .json(&json!({ "username": "365run", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{api}/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Not authenticated");

    let res = client
        .post(format!("{api}/reset"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid token");

    let token = login(&client, &api).await;
    let res = client
        .post(format!("{api}/reset"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_event_day_flow() {
    let api = spawn_app().await;
    let client = Client::new();
    let token = login(&client, &api).await;

    let res = upload(&client, &api, &token, ROSTER).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 7);
    assert_eq!(body["males"], 5);
    assert_eq!(body["females"], 2);

    let summary: Value = client
        .get(format!("{api}/participants/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["participants"].as_array().unwrap().len(), 7);

    let res = client
        .post(format!("{api}/teams/generate"))
        .bearer_auth(&token)
        .json(&json!({ "mode": "2m1f" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["teams_count"], 3);
    assert_eq!(body["waves_count"], 1);

    let waves: Value = client.get(format!("{api}/waves")).send().await.unwrap().json().await.unwrap();
    assert_eq!(waves["waves"][0]["team_ids"], json!([1, 2, 3]));
    assert_eq!(waves["waves"][0]["teams"].as_array().unwrap().len(), 3);

    let board: Value = client
        .get(format!("{api}/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(board["stations"].as_array().unwrap().len(), 6);
    assert_eq!(board["active_wave_id"], Value::Null);
    let entries = board["leaderboard"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    for (idx, entry) in entries.iter().enumerate() {
        assert_eq!(entry["team_id"], idx + 1);
        assert_eq!(entry["rank"], idx + 1);
        assert_eq!(entry["current_station"], "Not Started");
        assert_eq!(entry["total_time_str"], "--:--");
    }

    for (team_id, station, time_str) in [(3, "Row 750m", "04:00"), (3, "Farmers carry 24kg/16kg - 60m", "1:30"), (2, "Row 750m", "06:15")] {
        let res = client
            .post(format!("{api}/times/save"))
            .bearer_auth(&token)
            .json(&json!({ "team_id": team_id, "station": station, "time_str": time_str }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .put(format!("{api}/settings/active"))
        .bearer_auth(&token)
        .json(&json!({ "wave_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    client
        .put(format!("{api}/settings/active"))
        .bearer_auth(&token)
        .json(&json!({ "station": "Ski 750m" }))
        .send()
        .await
        .unwrap();
    let active: Value = client
        .get(format!("{api}/settings/active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active, json!({ "active_wave_id": 1, "active_station": "Ski 750m" }));

    let board: Value = client
        .get(format!("{api}/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order: Vec<u64> = board["leaderboard"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["team_id"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![3, 2, 1]);
    let leader = &board["leaderboard"][0];
    assert_eq!(leader["total_seconds"], 330);
    assert_eq!(leader["total_time_str"], "05:30");
    assert_eq!(leader["completed_stations"], 2);
    assert_eq!(leader["current_station"], "Ski 750m");
    assert_eq!(leader["is_active"], true);
    assert_eq!(leader["wave_id"], 1);
    assert_eq!(board["active_station"], "Ski 750m");
}

#[tokio::test]
async fn test_validation_errors() {
    let api = spawn_app().await;
    let client = Client::new();
    let token = login(&client, &api).await;

    let res = client
        .post(format!("{api}/teams/generate"))
        .bearer_auth(&token)
        .json(&json!({ "mode": "random" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = upload(&client, &api, &token, "name,gender\nNobody,X\n").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "No valid participants found in CSV");

    upload(&client, &api, &token, ROSTER).await;
    client
        .post(format!("{api}/teams/generate"))
        .bearer_auth(&token)
        .json(&json!({ "mode": "random" }))
        .send()
        .await
        .unwrap();

    let save = |body: Value| {
        client
            .post(format!("{api}/times/save"))
            .bearer_auth(&token)
            .json(&body)
            .send()
    };
    let res = save(json!({ "team_id": 1, "station": "Swim", "time_str": "01:00" })).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = save(json!({ "team_id": 1, "station": "Ski 750m", "time_str": "-1:00" })).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = save(json!({ "team_id": 99, "station": "Ski 750m", "time_str": "01:00" })).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .put(format!("{api}/teams/1"))
        .bearer_auth(&token)
        .json(&json!({ "members": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(format!("{api}/teams/1"))
        .bearer_auth(&token)
        .json(&json!({ "members": [{ "name": "Zed", "gender": "M" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["team"]["members"][0]["name"], "Zed");
}
