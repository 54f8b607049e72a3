use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, UploadEcho, User};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- users ---

#[tokio::test]
async fn list_users_empty() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/users").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let users: Vec<User> = body_json(resp).await;
    assert!(users.is_empty());
}

#[tokio::test]
async fn create_user_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/api/users", r#"{"name":"paco","manager_id":2}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: User = body_json(resp).await;
    assert_eq!(user.name, "paco");
    assert_eq!(user.manager_id, Some(2));
}

#[tokio::test]
async fn create_user_without_name_returns_errors() {
    let resp = app()
        .oneshot(json_request("POST", "/api/users", r#"{"manager_id":2}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"errors": ["name is required"]}));
}

#[tokio::test]
async fn get_user_not_found_returns_errors() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/users/00000000-0000-0000-0000-000000000000")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body, json!({"errors": ["not found"]}));
}

#[tokio::test]
async fn get_user_bad_uuid_returns_400() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/users/not-a-uuid")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_lifecycle_on_one_router() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/users", r#"{"name":"paco"}"#))
        .await
        .unwrap();
    let created: User = body_json(resp).await;
    let uri = format!("/api/users/{}", created.id);

    let resp = app
        .clone()
        .oneshot(json_request("PATCH", &uri, r#"{"manager_id":7}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let patched: User = body_json(resp).await;
    assert_eq!(patched.name, "paco");
    assert_eq!(patched.manager_id, Some(7));

    let resp = app
        .clone()
        .oneshot(json_request("PUT", &uri, r#"{"name":"Paco"}"#))
        .await
        .unwrap();
    let updated: User = body_json(resp).await;
    assert_eq!(updated.name, "Paco");

    let resp = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri(&uri).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted: User = body_json(resp).await;
    assert_eq!(deleted.id, created.id);

    let resp = app
        .oneshot(Request::builder().method("DELETE").uri(&uri).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- echo ---

#[tokio::test]
async fn echo_reports_query_headers_and_json_body() {
    let request = Request::builder()
        .method("PUT")
        .uri("/api/echo?ids%5B%5D=1&ids%5B%5D=2")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header("SomeHeader", "test")
        .body(r#"{"name":"paco"}"#.to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.query.as_deref(), Some("ids%5B%5D=1&ids%5B%5D=2"));
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.content_types, vec!["application/json"]);
    assert_eq!(echo.headers.get("someheader").map(String::as_str), Some("test"));
    assert_eq!(echo.body, Some(json!({"name": "paco"})));
}

#[tokio::test]
async fn echo_lists_repeated_content_types() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/echo")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body("{}".to_string())
        .unwrap();
    let echo: Echo = body_json(app().oneshot(request).await.unwrap()).await;
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.content_types, vec!["application/json", "text/plain"]);
}

#[tokio::test]
async fn echo_without_body() {
    let resp = app()
        .oneshot(Request::builder().method("DELETE").uri("/api/echo").body(String::new()).unwrap())
        .await
        .unwrap();
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "DELETE");
    assert!(echo.query.is_none());
    assert!(echo.body.is_none());
}

// --- upload ---

#[tokio::test]
async fn upload_lists_received_parts() {
    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
        "paco\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"files[]\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "hello\r\n",
        "--XBOUNDARY--\r\n",
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .header(http::header::CACHE_CONTROL, "no-cache")
        .body(body.to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: UploadEcho = body_json(resp).await;
    assert_eq!(echo.cache_control.as_deref(), Some("no-cache"));
    assert_eq!(echo.parts.len(), 2);
    assert_eq!(echo.parts[0].name, "name");
    assert_eq!(echo.parts[0].text.as_deref(), Some("paco"));
    assert_eq!(echo.parts[1].name, "files[]");
    assert_eq!(echo.parts[1].file_name.as_deref(), Some("a.txt"));
    assert_eq!(echo.parts[1].content_type.as_deref(), Some("text/plain"));
    assert_eq!(echo.parts[1].size, 5);
}

#[tokio::test]
async fn upload_without_multipart_content_type_is_rejected() {
    let resp = app()
        .oneshot(json_request("POST", "/api/upload", r#"{"name":"paco"}"#))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

// --- failures ---

#[tokio::test]
async fn broken_returns_plain_text_error() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/broken").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body_bytes(resp).await[..], b"ERROR");
}
