//! HTTP surface.
//!
//! - `POST /thrift` - one call per request, encoding negotiated from `Content-Type`
//! - `GET /health` - liveness, independent of the service
//! - `GET /test` - static greeting
//! - `GET /docs` - the whole schema as JSON
//! - `GET /docs/methods/{name}` - one method
//! - `GET /docs/types/{name}` - one record or enum

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thrum_codec::Format;
use thrum_dispatch::{Dispatcher, ProcessError};
use thrum_schema::{MethodDoc, SchemaDoc, TypeDoc};
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type DocResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/thrift", post(thrift))
        .route("/health", get(health))
        .route("/test", get(greeting))
        .route("/docs", get(schema_doc))
        .route("/docs/methods/{name}", get(method_doc))
        .route("/docs/types/{name}", get(type_doc))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn thrift(
    State(dispatcher): State<Arc<Dispatcher>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let format = match negotiate(&headers) {
        Ok(format) => format,
        Err(reason) => {
            tracing::debug!(%reason, "rejecting request");
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, reason).into_response();
        }
    };

    match dispatcher.process(&body, format).await {
        Ok(reply) => ([(header::CONTENT_TYPE, format.content_type())], reply).into_response(),
        Err(ProcessError::Decode(err)) => {
            tracing::warn!(%format, error = %err, "undecodable request");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(ProcessError::Encode(err)) => {
            tracing::error!(%format, error = %err, "failed to encode reply");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn negotiate(headers: &HeaderMap) -> Result<Format, String> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(Format::DEFAULT);
    };
    let value = value
        .to_str()
        .map_err(|_| "content type is not valid ASCII".to_string())?;
    Format::from_content_type(value).map_err(|err| err.to_string())
}

async fn health() -> &'static str {
    "OK"
}

async fn greeting() -> &'static str {
    "Hello, world!"
}

async fn schema_doc(State(dispatcher): State<Arc<Dispatcher>>) -> Json<SchemaDoc> {
    Json(dispatcher.schema().describe())
}

async fn method_doc(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(name): Path<String>,
) -> DocResult<MethodDoc> {
    dispatcher
        .schema()
        .describe_method(&name)
        .map(Json)
        .ok_or_else(|| not_found(format!("method not found: {name}")))
}

async fn type_doc(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(name): Path<String>,
) -> DocResult<TypeDoc> {
    dispatcher
        .schema()
        .describe_type(&name)
        .map(Json)
        .ok_or_else(|| not_found(format!("type not found: {name}")))
}

fn not_found(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn negotiation() {
        assert_eq!(negotiate(&HeaderMap::new()), Ok(Format::Binary));
        assert_eq!(negotiate(&headers("application/x-thrift")), Ok(Format::Binary));
        assert_eq!(
            negotiate(&headers("application/x-thrift; protocol=TCOMPACT")),
            Ok(Format::Compact)
        );
        assert_eq!(
            negotiate(&headers("application/vnd.apache.thrift.json")),
            Ok(Format::Json)
        );
        assert!(negotiate(&headers("application/json")).is_err());
        assert!(negotiate(&headers("application/x-thrift; protocol=TXML")).is_err());
    }
}
