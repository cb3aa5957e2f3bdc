//! In-memory stand-in for a content-addressed storage gateway.
//!
//! Serves the subset of the `/api/v0` HTTP API the client talks to: `add`,
//! `cat`, `object/stat` and `pin/ls`. Every endpoint is POST-only, errors are
//! reported as `{"Message", "Code", "Type"}` JSON bodies with the same status
//! codes a real gateway uses.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// A stored block and whether it has been pinned.
#[derive(Clone, Debug)]
pub struct Block {
    pub data: Vec<u8>,
    pub pinned: bool,
}

pub type Store = Arc<RwLock<HashMap<String, Block>>>;

/// Body returned by `/add`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Added {
    pub name: String,
    pub hash: String,
    pub size: String,
}

/// Body returned by `/object/stat/{hash}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectStat {
    pub hash: String,
    pub num_links: u64,
    pub block_size: u64,
    pub links_size: u64,
    pub data_size: u64,
    pub cumulative_size: u64,
}

/// Error body used for every non-2xx response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    pub message: String,
    pub code: u32,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Deserialize)]
pub struct AddParams {
    pub pin: Option<bool>,
}

/// Derive the identifier a block is stored under. Identical bytes always map
/// to the same identifier.
pub fn content_hash(data: &[u8]) -> String {
    format!("Qm{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, data).simple())
}

pub fn app() -> Router {
    app_with_store(Store::default())
}

/// Build the router over an existing store, so tests can inspect it.
pub fn app_with_store(store: Store) -> Router {
    let api = Router::new()
        .route("/add", post(add))
        .route("/cat/{hash}", post(cat))
        .route("/object/stat/{hash}", post(stat))
        .route("/pin/ls/{hash}", post(pin_ls));
    Router::new().nest("/api/v0", api).with_state(store)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

struct Rejection {
    status: StatusCode,
    message: String,
}

impl Rejection {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
            code: 0,
            kind: "error".to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

async fn add(
    State(store): State<Store>,
    Query(params): Query<AddParams>,
    mut multipart: Multipart,
) -> Result<Json<Added>, Rejection> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| Rejection::bad_request(e.to_string()))?
        .ok_or_else(|| Rejection::bad_request("file argument 'path' is required"))?;
    let name = field.file_name().unwrap_or_default().to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| Rejection::bad_request(e.to_string()))?
        .to_vec();

    let hash = content_hash(&data);
    let size = data.len().to_string();
    let pin = params.pin.unwrap_or(false);
    let mut blocks = store.write().await;
    let block = blocks.entry(hash.clone()).or_insert(Block { data, pinned: false });
    block.pinned |= pin;
    tracing::debug!(%hash, pinned = block.pinned, "stored block");

    Ok(Json(Added { name, hash, size }))
}

async fn cat(State(store): State<Store>, Path(hash): Path<String>) -> Result<Response, Rejection> {
    let blocks = store.read().await;
    let block = lookup(&blocks, &hash)?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], block.data.clone()).into_response())
}

async fn stat(State(store): State<Store>, Path(hash): Path<String>) -> Result<Json<ObjectStat>, Rejection> {
    let blocks = store.read().await;
    let block = lookup(&blocks, &hash)?;
    let size = block.data.len() as u64;
    Ok(Json(ObjectStat {
        hash,
        num_links: 0,
        block_size: size,
        links_size: 0,
        data_size: size,
        cumulative_size: size,
    }))
}

async fn pin_ls(State(store): State<Store>, Path(hash): Path<String>) -> Result<Json<serde_json::Value>, Rejection> {
    let blocks = store.read().await;
    let block = lookup(&blocks, &hash)?;
    if !block.pinned {
        return Err(Rejection::internal(format!("path '{hash}' is not pinned")));
    }
    Ok(Json(serde_json::json!({ "Keys": { hash: { "Type": "recursive" } } })))
}

fn lookup<'a>(blocks: &'a HashMap<String, Block>, hash: &str) -> Result<&'a Block, Rejection> {
    if !hash.starts_with("Qm") {
        return Err(Rejection::internal(format!("invalid path \"{hash}\": selected encoding not supported")));
    }
    blocks
        .get(hash)
        .ok_or_else(|| Rejection::internal(format!("block {hash} not found")))
}
