#![forbid(unsafe_code)]

//! `TestService` over HTTP.
//!
//! [`app`] builds the schema, the dispatcher and the router; [`serve`] runs
//! it on a bound listener until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use thrum_dispatch::DispatchError;
use thrum_schema::SchemaError;
use tokio::net::TcpListener;

pub mod config;
pub mod http;
pub mod idl;
pub mod service;

pub use config::Config;

/// Failure while assembling the service at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("incomplete dispatcher: {0}")]
    Dispatch(#[from] DispatchError),
}

pub fn app() -> Result<Router, StartupError> {
    let schema = Arc::new(idl::schema()?);
    let dispatcher = service::dispatcher(schema)?;
    Ok(http::router(Arc::new(dispatcher)))
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
