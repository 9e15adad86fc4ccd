use std::collections::HashMap;
use std::sync::Arc;

use thrum_codec::{
    ApplicationError, DecodeError, EncodeError, Format, ReplyBody, RequestEnvelope,
    ResponseEnvelope, Value, decode_request, encode_response,
};
use thrum_schema::{MethodDef, Schema};
use tracing::Instrument;

use crate::args::Args;
use crate::handler::{Handler, HandlerResult};

/// Error raised while wiring handlers to a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("method `{0}` is not part of the schema")]
    UnknownMethod(String),

    #[error("method `{0}` is already registered")]
    MethodAlreadyRegistered(String),

    #[error("method `{0}` has no handler")]
    MissingHandler(String),
}

/// Error that aborts a request before a reply can be produced.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to decode request: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] EncodeError),
}

/// Result of dispatching one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(ApplicationError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

impl From<HandlerResult> for Outcome {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}

impl From<Outcome> for ReplyBody {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(value) => ReplyBody::Success(value),
            Outcome::Failure(err) => ReplyBody::Exception(err),
        }
    }
}

struct Route {
    method: Arc<MethodDef>,
    handler: Arc<dyn Handler>,
}

/// Collects one handler per schema method.
pub struct DispatcherBuilder {
    schema: Arc<Schema>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl DispatcherBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        DispatcherBuilder {
            schema,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for `method`.
    ///
    /// Returns an error if the method is not in the schema or already has a
    /// handler.
    pub fn register(&mut self, method: &str, handler: impl Handler) -> Result<(), DispatchError> {
        self.register_arc(method, Arc::new(handler))
    }

    /// Like [`register`](Self::register), for a handler that is already shared.
    pub fn register_arc(
        &mut self,
        method: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), DispatchError> {
        if self.schema.method(method).is_none() {
            return Err(DispatchError::UnknownMethod(method.to_string()));
        }
        if self.handlers.contains_key(method) {
            return Err(DispatchError::MethodAlreadyRegistered(method.to_string()));
        }
        self.handlers.insert(method.to_string(), handler);
        Ok(())
    }

    /// Resolve every schema method to its handler.
    pub fn build(mut self) -> Result<Dispatcher, DispatchError> {
        let mut routes = HashMap::with_capacity(self.handlers.len());
        for method in self.schema.methods() {
            let handler = self
                .handlers
                .remove(&method.name)
                .ok_or_else(|| DispatchError::MissingHandler(method.name.clone()))?;
            let route = Route {
                method: Arc::new(method.clone()),
                handler,
            };
            routes.insert(method.name.clone(), route);
        }
        Ok(Dispatcher {
            schema: self.schema,
            routes,
        })
    }
}

/// Routes decoded calls to handlers.
///
/// Each call runs in its own task. Dropping the future returned by
/// [`Dispatcher::dispatch`] does not cancel the handler; its result is
/// discarded.
pub struct Dispatcher {
    schema: Arc<Schema>,
    routes: HashMap<String, Route>,
}

impl Dispatcher {
    pub fn builder(schema: Arc<Schema>) -> DispatcherBuilder {
        DispatcherBuilder::new(schema)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Whether `method` has a handler.
    pub fn has_handler(&self, method: &str) -> bool {
        self.routes.contains_key(method)
    }

    /// Run the handler for `request` and wait for its single result.
    pub async fn dispatch(&self, request: RequestEnvelope) -> Outcome {
        let Some(route) = self.routes.get(&request.method) else {
            tracing::warn!(method = %request.method, "call to unknown method");
            return Outcome::Failure(ApplicationError::unknown_method(&request.method));
        };

        let args = Args::from_record(route.method.clone(), request.args);
        let handler = route.handler.clone();
        let task = tokio::spawn(async move { handler.invoke(args).await }.in_current_span());

        match task.await {
            Ok(result) => result.into(),
            Err(err) => {
                tracing::warn!(method = %request.method, error = %err, "handler task failed");
                Outcome::Failure(ApplicationError::internal(format!(
                    "{} failed: handler aborted",
                    request.method
                )))
            }
        }
    }

    /// Decode a request, dispatch it and encode the reply in the same format.
    ///
    /// Handler failures are encoded as exception replies; only codec errors
    /// surface as [`ProcessError`].
    pub async fn process(&self, bytes: &[u8], format: Format) -> Result<Vec<u8>, ProcessError> {
        let request = decode_request(&self.schema, bytes, format)?;
        let span = tracing::info_span!(
            "rpc",
            method = %request.method,
            seqid = request.seqid,
            %format
        );
        async {
            let method = request.method.clone();
            let seqid = request.seqid;
            let outcome = self.dispatch(request).await;
            if let Outcome::Failure(err) = &outcome {
                tracing::info!(kind = %err.kind, message = %err.message, "call failed");
            }
            let response = ResponseEnvelope {
                method,
                seqid,
                format,
                body: outcome.into(),
            };
            Ok::<_, ProcessError>(encode_response(&self.schema, &response)?)
        }
        .instrument(span)
        .await
    }
}
