use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: Option<String>,
    pub manager_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub manager_id: Option<u64>,
}

/// What the echo endpoint saw.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    /// Every `Content-Type` value, in arrival order.
    pub content_types: Vec<String>,
    pub cache_control: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

/// One multipart field as received.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceivedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadEcho {
    pub cache_control: Option<String>,
    pub parts: Vec<ReceivedPart>,
}

/// Error response in the `{"errors": [...]}` shape.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    errors: Vec<String>,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            errors: vec![message.into()],
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "errors": self.errors }))).into_response()
    }
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).patch(update_user).delete(delete_user),
        )
        .route("/api/echo", any(echo))
        .route("/api/upload", post(upload).put(upload))
        .route("/api/broken", any(broken))
        .route("/api/slow", any(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "mock server listening");
    axum::serve(listener, app()).await
}

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    let users = db.read().await;
    Json(users.values().cloned().collect())
}

async fn create_user(
    State(db): State<Db>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), ApiFailure> {
    let name = input
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "name is required"))?;
    let user = User {
        id: Uuid::new_v4(),
        name,
        manager_id: input.manager_id,
    };
    db.write().await.insert(user.id, user.clone());
    tracing::debug!(id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, ApiFailure> {
    let users = db.read().await;
    users.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, ApiFailure> {
    let mut users = db.write().await;
    let user = users.get_mut(&id).ok_or_else(not_found)?;
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(manager_id) = input.manager_id {
        user.manager_id = Some(manager_id);
    }
    Ok(Json(user.clone()))
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, ApiFailure> {
    let mut users = db.write().await;
    users.remove(&id).map(Json).ok_or_else(not_found)
}

fn not_found() -> ApiFailure {
    ApiFailure::new(StatusCode::NOT_FOUND, "not found")
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn echo(method: Method, headers: HeaderMap, RawQuery(query): RawQuery, body: String) -> Json<Echo> {
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    };
    Json(Echo {
        method: method.to_string(),
        query,
        content_type: header_text(&headers, header::CONTENT_TYPE),
        content_types: headers
            .get_all(header::CONTENT_TYPE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect(),
        cache_control: header_text(&headers, header::CACHE_CONTROL),
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect(),
        body,
    })
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Result<Json<UploadEcho>, ApiFailure> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::new(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiFailure::new(StatusCode::BAD_REQUEST, e.to_string()))?;
        let text = match file_name {
            Some(_) => None,
            None => Some(String::from_utf8_lossy(&bytes).into_owned()),
        };
        parts.push(ReceivedPart {
            name,
            file_name,
            content_type,
            size: bytes.len(),
            text,
        });
    }
    Ok(Json(UploadEcho {
        cache_control: header_text(&headers, header::CACHE_CONTROL),
        parts,
    }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "ERROR")
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "slow": true }))
}
