use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use metashare_primitives::identifier::StorageId;
use metashare_sync::protocol::{NODE_VERSION_HEADER, PROTOCOL_HEADER, PROTOCOL_PARAM};
use metashare_sync::responder::Responder;
use metashare_sync::SyncError;
use tracing::{debug, info};

use crate::auth::SyncAuthLayer;
use crate::config::ServerConfig;
use crate::error::ApiError;

const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

#[derive(Debug)]
struct SyncState {
    responder: Responder,
    node_version: String,
}

pub(crate) fn setup(config: &ServerConfig, responder: Responder) -> Router {
    let state = Arc::new(SyncState {
        responder,
        node_version: config.node_version.clone(),
    });

    if config.auth.require_auth {
        info!(users = config.auth.users.len(), "Sync api requires authentication");
    } else {
        info!("Sync api open to anonymous callers");
    }

    Router::new()
        .route("/sync/", get(inventory_handler))
        .route("/sync/:id/metadata/", get(metadata_handler))
        .layer(SyncAuthLayer::new(config.auth.clone()))
        .layer(Extension(state))
}

async fn inventory_handler(
    Extension(state): Extension<Arc<SyncState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let requested: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == PROTOCOL_PARAM)
        .map(|(_, value)| value)
        .collect();

    let inventory = state.responder.inventory(&requested)?;

    debug!(protocol = %inventory.protocol_version, "Serving inventory");

    let mut headers = archive_headers(&state)?;
    let _ignored = headers.insert(
        HeaderName::from_static(PROTOCOL_HEADER),
        header_value(&inventory.protocol_version)?,
    );

    Ok((StatusCode::OK, headers, inventory.archive).into_response())
}

async fn metadata_handler(
    Extension(state): Extension<Arc<SyncState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let Ok(id) = id.parse::<StorageId>() else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("`{id}` is not a storage identifier"),
        ));
    };

    let archive = state.responder.export_object(&id)?;

    debug!(%id, "Serving object");

    Ok((StatusCode::OK, archive_headers(&state)?, archive).into_response())
}

fn archive_headers(state: &SyncState) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();

    let _ignored = headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(ARCHIVE_CONTENT_TYPE),
    );
    let _ignored = headers.insert(
        HeaderName::from_static(NODE_VERSION_HEADER),
        header_value(&state.node_version)?,
    );

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| {
        ApiError::from(SyncError::InvalidResponse(format!(
            "`{value}` is not a valid header value"
        )))
    })
}
