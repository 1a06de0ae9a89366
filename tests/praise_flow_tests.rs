// tests/praise_flow_tests.rs
//
// End-to-end flows against a real Postgres. Skipped when DATABASE_URL is unset.
// Every test creates its own users, so they can share one database.

use std::{collections::HashSet, time::Duration};

use praise_relay::{config::Config, models::notification::PRAISE_RECEIVED, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

async fn spawn_app(demo_phone_number: Option<String>) -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = Config {
        database_url,
        jwt_secret: "flow_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        server_port: 0,
        demo_phone_number,
        demo_name: "Admin".to_string(),
        session_cache_capacity: 64,
        session_cache_ttl: Duration::from_secs(600),
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    })
}

fn unique_phone() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 100_000_000;
    format!("010{:08}", n)
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Inserts a user without a password and returns (id, phone_number).
    async fn insert_user(&self, name: &str, role: &str) -> (i64, String) {
        let phone = unique_phone();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (phone_number, name, role, grade, class_number) VALUES ($1, $2, $3, 1, 1) RETURNING id",
        )
        .bind(&phone)
        .bind(name)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert user");
        (id, phone)
    }

    async fn set_password(&self, phone: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/set-password"))
            .json(&json!({ "phone_number": phone, "password": "password123" }))
            .send()
            .await
            .unwrap()
    }

    /// Inserts a user and returns (id, token).
    async fn user_with_token(&self, name: &str, role: &str) -> (i64, String) {
        let (id, phone) = self.insert_user(name, role).await;
        let body: Value = self.set_password(&phone).await.json().await.unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    async fn praise(&self, token: &str, to_user_id: i64) -> reqwest::Response {
        self.client
            .post(self.url("/api/praises"))
            .bearer_auth(token)
            .json(&json!({ "to_user_id": to_user_id, "content": "Thanks for helping me today!" }))
            .send()
            .await
            .unwrap()
    }

    async fn toggle(&self, token: &str, praise_id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/praises/{}/select", praise_id)))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Sends a toggle on its own task, for requests that must overlap.
    fn spawn_toggle(&self, token: &str, praise_id: i64) -> tokio::task::JoinHandle<u16> {
        let request = self
            .client
            .post(self.url(&format!("/api/praises/{}/select", praise_id)))
            .bearer_auth(token);
        tokio::spawn(async move { request.send().await.unwrap().status().as_u16() })
    }

    async fn selected_count(&self, recipient_id: i64) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM praises WHERE to_user_id = $1 AND is_selected AND NOT is_deleted",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn ranked_ids(&self) -> Vec<i64> {
        let body: Value = self
            .client
            .get(self.url("/api/ranking"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["ranking"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect()
    }
}

#[tokio::test]
async fn first_login_then_set_password_once() {
    let Some(app) = spawn_app(None).await else { return };
    let (_, phone) = app.insert_user("Newcomer", "student").await;

    let login = |password: &'static str| {
        app.client
            .post(app.url("/api/auth/login"))
            .json(&json!({ "phone_number": phone, "password": password }))
            .send()
    };

    let body: Value = login("anything").await.unwrap().json().await.unwrap();
    assert_eq!(body["is_first_login"], true);
    assert!(body.get("token").is_none());

    assert_eq!(app.set_password(&phone).await.status().as_u16(), 200);
    assert_eq!(app.set_password(&phone).await.status().as_u16(), 409);

    assert_eq!(login("wrongpass").await.unwrap().status().as_u16(), 401);

    let body: Value = login("password123").await.unwrap().json().await.unwrap();
    assert_eq!(body["is_first_login"], false);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn teacher_holds_a_single_selected_praise() {
    let Some(app) = spawn_app(None).await else { return };
    let (teacher_id, teacher_token) = app.user_with_token("Teacher", "teacher").await;
    let (_, a_token) = app.user_with_token("StudentA", "student").await;
    let (_, b_token) = app.user_with_token("StudentB", "student").await;

    let first: Value = app.praise(&a_token, teacher_id).await.json().await.unwrap();
    let second: Value = app.praise(&b_token, teacher_id).await.json().await.unwrap();
    assert_eq!(first["is_selected"], true);
    assert_eq!(second["is_selected"], false);

    let second_id = second["praise_id"].as_i64().unwrap();
    let first_id = first["praise_id"].as_i64().unwrap();

    assert_eq!(app.toggle(&teacher_token, second_id).await.status().as_u16(), 409);

    let off: Value = app.toggle(&teacher_token, first_id).await.json().await.unwrap();
    assert_eq!(off["is_selected"], false);
    let on: Value = app.toggle(&teacher_token, second_id).await.json().await.unwrap();
    assert_eq!(on["is_selected"], true);

    // Only the recipient may toggle.
    assert_eq!(app.toggle(&a_token, first_id).await.status().as_u16(), 403);
}

#[tokio::test]
async fn duplicate_praise_is_refused_until_deleted() {
    let Some(app) = spawn_app(None).await else { return };
    let (author_id, author_token) = app.user_with_token("Author", "student").await;
    let (recipient_id, recipient_token) = app.user_with_token("Recipient", "student").await;

    let created = app.praise(&author_token, recipient_id).await;
    assert_eq!(created.status().as_u16(), 201);
    let praise_id = created.json::<Value>().await.unwrap()["praise_id"].as_i64().unwrap();

    assert_eq!(app.praise(&author_token, recipient_id).await.status().as_u16(), 400);
    assert_eq!(app.praise(&author_token, author_id).await.status().as_u16(), 400);

    let notifications: Value = app
        .client
        .get(app.url("/api/notifications"))
        .bearer_auth(&recipient_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let first = &notifications["notifications"][0];
    assert_eq!(first["type"], PRAISE_RECEIVED);
    assert_eq!(first["praise_id"].as_i64(), Some(praise_id));

    // The recipient is not the author.
    let forbidden = app
        .client
        .delete(app.url(&format!("/api/praises/{}/delete", praise_id)))
        .bearer_auth(&recipient_token)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let deleted = app
        .client
        .delete(app.url(&format!("/api/praises/{}/delete", praise_id)))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);

    assert_eq!(app.praise(&author_token, recipient_id).await.status().as_u16(), 201);
}

#[tokio::test]
async fn sandbagging_student_leaves_the_ranking() {
    let Some(app) = spawn_app(None).await else { return };
    let (hoarder_id, hoarder_token) = app.user_with_token("Hoarder", "student").await;
    let (friend_id, _) = app.user_with_token("Friend", "student").await;

    let written: Value = app.praise(&hoarder_token, friend_id).await.json().await.unwrap();
    assert_eq!(written["is_selected"], true);
    assert!(app.ranked_ids().await.contains(&hoarder_id));

    let mut received = Vec::new();
    for name in ["PeerA", "PeerB", "PeerC"] {
        let (_, token) = app.user_with_token(name, "student").await;
        let body: Value = app.praise(&token, hoarder_id).await.json().await.unwrap();
        assert_eq!(body["is_selected"], true);
        received.push(body["praise_id"].as_i64().unwrap());
    }
    assert!(app.ranked_ids().await.contains(&hoarder_id));

    assert_eq!(app.toggle(&hoarder_token, received[0]).await.status().as_u16(), 200);
    assert!(!app.ranked_ids().await.contains(&hoarder_id));

    let stats: Value = app
        .client
        .get(app.url("/api/users/me/stats"))
        .bearer_auth(&hoarder_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["weighted_score"], 1);
    assert!(stats["ranking"].is_null());
    assert_eq!(stats["selected_praises"], 2);
}

#[tokio::test]
async fn demo_feed_rotates_one_card_per_call() {
    let demo_phone = unique_phone();
    let Some(app) = spawn_app(Some(demo_phone.clone())).await else { return };

    let demo_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (phone_number, name, role) VALUES ($1, 'Admin', 'teacher') RETURNING id",
    )
    .bind(&demo_phone)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    let body: Value = app.set_password(&demo_phone).await.json().await.unwrap();
    let demo_token = body["token"].as_str().unwrap().to_string();

    for i in 0..10 {
        app.insert_user(&format!("Pupil{}", i), "student").await;
    }

    let session = uuid::Uuid::new_v4().to_string();
    let fetch = |path: &'static str| {
        app.client
            .get(app.url(path))
            .query(&[("session", session.as_str())])
            .bearer_auth(&demo_token)
            .send()
    };
    let card_ids = |body: &Value| -> Vec<i64> {
        body["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["profile"]["id"].as_i64().unwrap())
            .collect()
    };

    let first: Value = fetch("/api/students/praises").await.unwrap().json().await.unwrap();
    let second: Value = fetch("/api/students/praises").await.unwrap().json().await.unwrap();
    let (first, second) = (card_ids(&first), card_ids(&second));

    assert_eq!(first.len(), 8);
    assert_eq!(second.len(), 8);
    let before: HashSet<i64> = first.into_iter().collect();
    assert_eq!(second.iter().filter(|id| !before.contains(id)).count(), 1);

    let teachers: Value = fetch("/api/teachers/praises").await.unwrap().json().await.unwrap();
    assert!(!card_ids(&teachers).contains(&demo_id));
}

#[tokio::test]
async fn mutual_praises_in_parallel_all_succeed() {
    let Some(app) = spawn_app(None).await else { return };

    for i in 0..15 {
        let (a_id, a_token) = app.user_with_token(&format!("MutualA{}", i), "student").await;
        let (b_id, b_token) = app.user_with_token(&format!("MutualB{}", i), "student").await;

        let (a_to_b, b_to_a) = tokio::join!(app.praise(&a_token, b_id), app.praise(&b_token, a_id));
        assert_eq!(a_to_b.status().as_u16(), 201);
        assert_eq!(b_to_a.status().as_u16(), 201);
    }
}

#[tokio::test]
async fn parallel_duplicate_praises_create_exactly_one() {
    let Some(app) = spawn_app(None).await else { return };

    for i in 0..10 {
        let (_, author_token) = app.user_with_token(&format!("Eager{}", i), "student").await;
        let (recipient_id, _) = app.user_with_token(&format!("Target{}", i), "student").await;

        let (first, second) = tokio::join!(
            app.praise(&author_token, recipient_id),
            app.praise(&author_token, recipient_id)
        );
        let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
        statuses.sort();
        assert_eq!(statuses, vec![201, 400]);
    }
}

#[tokio::test]
async fn parallel_selects_never_pass_the_ceiling() {
    let Some(app) = spawn_app(None).await else { return };
    let (recipient_id, recipient_token) = app.user_with_token("Popular", "student").await;

    let mut praise_ids = Vec::new();
    for i in 0..5 {
        let (_, token) = app.user_with_token(&format!("Fan{}", i), "student").await;
        let body: Value = app.praise(&token, recipient_id).await.json().await.unwrap();
        praise_ids.push(body["praise_id"].as_i64().unwrap());
    }
    assert_eq!(app.selected_count(recipient_id).await, 3);

    for &id in &praise_ids[..3] {
        assert_eq!(app.toggle(&recipient_token, id).await.status().as_u16(), 200);
    }
    assert_eq!(app.selected_count(recipient_id).await, 0);

    let handles: Vec<_> = praise_ids
        .iter()
        .map(|&id| app.spawn_toggle(&recipient_token, id))
        .collect();
    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }
    statuses.sort();

    assert_eq!(statuses, vec![200, 200, 200, 409, 409]);
    assert_eq!(app.selected_count(recipient_id).await, 3);
}

#[tokio::test]
async fn delete_racing_a_toggle_never_fails_internally() {
    let Some(app) = spawn_app(None).await else { return };
    let (teacher_id, teacher_token) = app.user_with_token("Homeroom", "teacher").await;

    for i in 0..10 {
        let (_, token) = app.user_with_token(&format!("Pupil{}", i), "student").await;
        let body: Value = app.praise(&token, teacher_id).await.json().await.unwrap();
        let praise_id = body["praise_id"].as_i64().unwrap();

        let delete = app
            .client
            .delete(app.url(&format!("/api/praises/{}/delete", praise_id)))
            .bearer_auth(&teacher_token)
            .send();
        let (toggled, deleted) = tokio::join!(app.toggle(&teacher_token, praise_id), delete);

        assert_eq!(deleted.unwrap().status().as_u16(), 200);
        assert!(matches!(toggled.status().as_u16(), 200 | 404 | 409));
    }
}

#[tokio::test]
async fn praise_text_is_stored_as_typed() {
    let Some(app) = spawn_app(None).await else { return };
    let (_, author_token) = app.user_with_token("Writer", "student").await;
    let (recipient_id, _) = app.user_with_token("Reader", "student").await;

    let created = app
        .client
        .post(app.url("/api/praises"))
        .bearer_auth(&author_token)
        .json(&json!({ "to_user_id": recipient_id, "content": "Tom & Jerry <3 <b>always</b>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);

    let written: Value = app
        .client
        .get(app.url("/api/praises/written"))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(written["praises"][0]["content"], "Tom & Jerry <3 always");
}
