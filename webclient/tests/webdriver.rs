mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    Json, Router,
};
use serde_json::{json, Value};

use passupd_webclient::*;

type Requests = Arc<Mutex<Vec<String>>>;

fn no_such(error: &str) -> (StatusCode, Json<Value>) {
    let value = json!({ "value": { "error": error, "message": "", "stacktrace": "" } });
    (StatusCode::NOT_FOUND, Json(value))
}

/// Speaks just enough WebDriver for one session `abc` under `/wd/hub`.
/// Routes are matched exactly, as geckodriver does.
async fn driver(
    State(log): State<Requests>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_owned();
    log.lock().unwrap().push(format!("{} {}", method, path));

    let ok = |value: Value| (StatusCode::OK, Json(json!({ "value": value })));
    match (method.as_str(), path.as_str()) {
        ("POST", "/wd/hub/session") => ok(json!({ "sessionId": "abc", "capabilities": {} })),
        ("POST", "/wd/hub/session/abc/url") => ok(Value::Null),
        ("GET", "/wd/hub/session/abc/title") => ok(json!("Sign in")),
        ("POST", "/wd/hub/session/abc/element") => {
            let req: Value = serde_json::from_str(&body).unwrap_or_default();
            if req["value"] == json!(r#"[name="user"]"#) {
                ok(json!({ "element-6066-11e4-a6c6-f4b9ea0ff0e4": "e1" }))
            } else {
                no_such("no such element")
            }
        }
        ("DELETE", "/wd/hub/session/abc") => ok(Value::Null),
        _ => no_such("unknown command"),
    }
}

async fn start_driver() -> (Url, Requests) {
    let requests = Requests::default();
    let app = Router::new()
        .fallback(driver)
        .with_state(Arc::clone(&requests));
    let base = common::serve(app).await;
    (base.join("wd/hub").unwrap(), requests)
}

#[tokio::test]
async fn session_lifecycle_hits_w3c_routes() {
    let (endpoint, requests) = start_driver().await;

    let mut s = WebDriverSession::start(&endpoint, Browser::Firefox, true)
        .await
        .unwrap();
    s.navigate(&Url::parse("https://example.com/login").unwrap())
        .await
        .unwrap();
    assert_eq!(s.title().await.unwrap(), "Sign in");
    assert!(matches!(
        s.fill_field("nope", "x").await,
        Err(Error::NoSuchField(name)) if name == "nope"
    ));

    s.close().await.unwrap();
    // Already closed: no second request.
    s.close().await.unwrap();
    assert!(matches!(s.title().await, Err(Error::Closed)));

    assert_eq!(
        *requests.lock().unwrap(),
        vec![
            "POST /wd/hub/session",
            "POST /wd/hub/session/abc/url",
            "GET /wd/hub/session/abc/title",
            "POST /wd/hub/session/abc/element",
            "DELETE /wd/hub/session/abc",
        ]
    );
}

#[tokio::test]
async fn driver_errors_are_typed() {
    let (endpoint, _) = start_driver().await;
    let mut s = WebDriverSession::start(&endpoint, Browser::Chrome, true)
        .await
        .unwrap();

    let err = s.current_url().await.unwrap_err();
    assert!(matches!(
        err,
        Error::WebDriver { ref error, .. } if error == "unknown command"
    ));
}
