//! Router tests driven through `tower::ServiceExt::oneshot`.

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use forum_core::{Forum, directory::User, directory::Lesson};
use forum_store_sqlite::{LocalFileStore, SqliteStore};
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, BroadcastTransport, router};

const PASSWORD: &str = "secret";

struct Fixture {
  app:     Router,
  alice:   User,
  bob:     User,
  carol:   User,
  english: Lesson,
}

async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(PASSWORD.as_bytes(), &salt)
    .unwrap()
    .to_string();

  let english = store.add_lesson("English", None).await.unwrap();
  let alice = store.add_user("alice", "Alice", "", Some(&hash)).await.unwrap();
  let bob = store.add_user("bob", "Bob", "", Some(&hash)).await.unwrap();
  let carol = store.add_user("carol", "Carol", "", Some(&hash)).await.unwrap();
  for user in [&alice, &bob] {
    let student = store.add_student(user.id).await.unwrap();
    store.enroll(student.id, english.id).await.unwrap();
  }
  store.add_student(carol.id).await.unwrap();

  let files =
    LocalFileStore::new(std::env::temp_dir().join(format!("forum-api-{}", Uuid::new_v4())));
  let forum = Forum::new(store, files, BroadcastTransport::default());

  Fixture { app: router(AppState::new(forum)), alice, bob, carol, english }
}

fn auth(user: &User) -> String {
  format!("Basic {}", B64.encode(format!("{}:{PASSWORD}", user.username)))
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  user: Option<&User>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(header::AUTHORIZATION, auth(user));
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

#[tokio::test]
async fn requests_without_credentials_are_challenged() {
  let f = fixture().await;
  let (status, _) = send(&f.app, "GET", "/forum/", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let req = Request::builder()
    .uri("/forum/")
    .header(
      header::AUTHORIZATION,
      format!("Basic {}", B64.encode("alice:wrong")),
    )
    .body(Body::empty())
    .unwrap();
  let resp = f.app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn create_then_open_a_class_thread() {
  let f = fixture().await;
  let (status, created) = send(
    &f.app,
    "POST",
    "/forum/write/",
    Some(&f.alice),
    Some(json!({ "title": "Homework", "lesson": f.english.id, "content": "Due when?" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["thread"]["visibility"]["kind"], "public_class");
  let thread_id = created["thread"]["id"].as_i64().unwrap();

  let (status, dashboard) = send(&f.app, "GET", "/forum/", Some(&f.bob), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(dashboard[0]["id"], thread_id);

  let (status, view) =
    send(&f.app, "GET", &format!("/forum/thread/{thread_id}"), Some(&f.bob), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["messages"][0]["content"], "Due when?");

  let (status, _) =
    send(&f.app, "GET", &format!("/forum/thread/{thread_id}"), Some(&f.carol), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validation_errors_are_listed() {
  let f = fixture().await;
  let (status, body) = send(
    &f.app,
    "POST",
    "/forum/write/",
    Some(&f.alice),
    Some(json!({ "title": "", "recipient": f.bob.id, "lesson": f.english.id, "content": "x" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let fields: Vec<&str> = body["errors"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["field"].as_str().unwrap())
    .collect();
  assert!(fields.contains(&"title"));
  assert!(fields.contains(&"visibility"));
}

#[tokio::test]
async fn unknown_lesson_is_not_found() {
  let f = fixture().await;
  let (status, body) = send(
    &f.app,
    "POST",
    "/forum/write/",
    Some(&f.alice),
    Some(json!({ "title": "Lost", "lesson": 999, "content": "anyone?" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "lesson 999 not found");
}

#[tokio::test]
async fn reply_edit_and_delete_flow() {
  let f = fixture().await;
  let (_, created) = send(
    &f.app,
    "POST",
    "/forum/write/",
    Some(&f.alice),
    Some(json!({ "title": "Hi", "recipient": f.bob.id, "content": "hello" })),
  )
  .await;
  let thread_id = created["thread"]["id"].as_i64().unwrap();
  let root_id = created["message"]["id"].as_i64().unwrap();

  let (status, answer) = send(
    &f.app,
    "POST",
    &format!("/forum/thread/{thread_id}?reply_to={root_id}"),
    Some(&f.bob),
    Some(json!({
      "content": "hi",
      "attachment": { "name": "a.txt", "data": B64.encode("attached") },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let answer_id = answer["id"].as_i64().unwrap();

  let (_, tree) =
    send(&f.app, "GET", &format!("/forum/thread/{thread_id}/tree"), Some(&f.alice), None).await;
  assert_eq!(tree[0]["message"]["id"], root_id);
  assert_eq!(tree[0]["children"][0]["message"]["id"], answer_id);

  // The root has a reply now.
  let (status, _) = send(
    &f.app,
    "POST",
    &format!("/forum/thread/{thread_id}/edit/{root_id}"),
    Some(&f.alice),
    Some(json!({ "content": "changed" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(
    &f.app,
    "POST",
    &format!("/forum/thread/{thread_id}/edit/{answer_id}"),
    Some(&f.bob),
    Some(json!({ "content": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, view) =
    send(&f.app, "GET", &format!("/forum/thread/{thread_id}"), Some(&f.alice), None).await;
  let attachment_id = view["messages"][1]["attachments"][0]["id"].as_i64().unwrap();
  let req = Request::builder()
    .uri(format!("/forum/attachment/{attachment_id}"))
    .header(header::AUTHORIZATION, auth(&f.alice))
    .body(Body::empty())
    .unwrap();
  let resp = f.app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], b"attached");

  let (status, deleted) = send(
    &f.app,
    "POST",
    &format!("/forum/thread/{thread_id}/delete/{answer_id}"),
    Some(&f.bob),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(deleted["thread_deleted"], false);
  assert_eq!(deleted["redirect"], format!("/forum/thread/{thread_id}"));

  let (_, deleted) = send(
    &f.app,
    "POST",
    &format!("/forum/thread/{thread_id}/delete/{root_id}"),
    Some(&f.alice),
    None,
  )
  .await;
  assert_eq!(deleted["thread_deleted"], true);
  assert_eq!(deleted["redirect"], "/forum/");

  let (status, _) =
    send(&f.app, "GET", &format!("/forum/thread/{thread_id}"), Some(&f.alice), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_attachment_is_a_bad_request() {
  let f = fixture().await;
  let (status, _) = send(
    &f.app,
    "POST",
    "/forum/write/",
    Some(&f.alice),
    Some(json!({
      "title": "Files",
      "lesson": f.english.id,
      "content": "see",
      "attachment": { "name": "x.bin", "data": "***" },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn compose_lookups() {
  let f = fixture().await;
  let (_, users) = send(&f.app, "GET", "/forum/write/users/", Some(&f.alice), None).await;
  assert_eq!(users.as_array().unwrap().len(), 3);

  let (_, lessons) = send(&f.app, "GET", "/forum/write/lessons/", Some(&f.alice), None).await;
  assert_eq!(lessons[0]["name"], "English");

  let (_, professors) =
    send(&f.app, "GET", "/forum/write/professors/", Some(&f.alice), None).await;
  assert!(professors.as_array().unwrap().is_empty());

  let (status, skills) =
    send(&f.app, "GET", "/forum/write/skills/", Some(&f.carol), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(skills["skills"].as_array().unwrap().is_empty());
}
