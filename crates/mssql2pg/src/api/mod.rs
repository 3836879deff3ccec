//! Diagnostic HTTP API.
//!
//! A single read-only endpoint, `GET /tables`, listing the source tables
//! the selection policy would migrate. Responses are always 200 with
//! either a `tables` or an `error` field, so probes never have to
//! distinguish transport failures from source failures.

use crate::error::Result;
use crate::source::{SourceDb, SqlServerSource};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared state behind the diagnostic endpoint.
#[derive(Clone)]
pub struct ApiState {
    /// The single source connection, serialized behind a lock.
    pub source: Arc<Mutex<SqlServerSource>>,

    /// Source schema to list.
    pub schema: String,

    /// Maximum table-name length of the selection policy.
    pub max_table_name_len: i32,

    /// Optional table-name prefix filter.
    pub table_prefix: Option<String>,
}

/// Build the diagnostic router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/tables", get(list_tables))
        .with_state(state)
}

async fn list_tables(State(state): State<ApiState>) -> Json<Value> {
    let mut source = state.source.lock().await;
    match source
        .list_tables(
            &state.schema,
            state.max_table_name_len,
            state.table_prefix.as_deref(),
        )
        .await
    {
        Ok(tables) => Json(json!({ "tables": tables })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

/// Serve the diagnostic API until the task is cancelled.
pub async fn serve(state: ApiState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Diagnostic API listening on {}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
