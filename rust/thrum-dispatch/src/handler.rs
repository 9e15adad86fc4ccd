//! Handler contract.
//!
//! A handler produces exactly one result per call. Async functions satisfy
//! this by returning. Callback-style handlers get a [`Completion`] instead
//! and must signal it once; extra signals are ignored, and a completion that
//! is dropped without a signal turns into an `InternalError` failure.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use thrum_codec::{ApplicationError, Value};
use tokio::sync::oneshot;

use crate::args::Args;

pub type HandlerResult = Result<Value, ApplicationError>;

/// Business logic for one method.
pub trait Handler: Send + Sync + 'static {
    fn invoke(&self, args: Args) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn invoke(&self, args: Args) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(args))
    }
}

struct CompletionInner {
    method: String,
    sender: Mutex<Option<oneshot::Sender<HandlerResult>>>,
}

/// Single-fire result slot handed to callback-style handlers.
///
/// Clones share the slot: the first signal wins.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    pub(crate) fn new(method: impl Into<String>) -> (Self, oneshot::Receiver<HandlerResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Completion {
            inner: Arc::new(CompletionInner {
                method: method.into(),
                sender: Mutex::new(Some(tx)),
            }),
        };
        (completion, rx)
    }

    pub fn success(&self, value: impl Into<Value>) -> bool {
        self.complete(Ok(value.into()))
    }

    pub fn failure(&self, error: ApplicationError) -> bool {
        self.complete(Err(error))
    }

    /// Deliver the result. Returns `false` if a result was already delivered.
    pub fn complete(&self, result: HandlerResult) -> bool {
        let Some(sender) = self.inner.sender.lock().take() else {
            tracing::warn!(method = %self.inner.method, "result signaled more than once, ignoring");
            return false;
        };
        if sender.send(result).is_err() {
            tracing::debug!(method = %self.inner.method, "caller went away before the result");
        }
        true
    }

    pub fn is_completed(&self) -> bool {
        self.inner.sender.lock().is_none()
    }
}

/// Adapter for handlers that signal through a [`Completion`].
pub struct CallbackHandler<F> {
    f: F,
}

/// Wrap a callback-style handler.
///
/// ```rust
/// use thrum_dispatch::{Args, Completion, callback};
///
/// let handler = callback(|_args: Args, done: Completion| {
///     tokio::spawn(async move {
///         done.success(true);
///     });
/// });
/// # let _ = handler;
/// ```
pub fn callback<F>(f: F) -> CallbackHandler<F>
where
    F: Fn(Args, Completion) + Send + Sync + 'static,
{
    CallbackHandler { f }
}

impl<F> Handler for CallbackHandler<F>
where
    F: Fn(Args, Completion) + Send + Sync + 'static,
{
    fn invoke(&self, args: Args) -> BoxFuture<'static, HandlerResult> {
        let method = args.method().to_string();
        let (completion, rx) = Completion::new(method.clone());
        (self.f)(args, completion);
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(%method, "handler finished without signaling a result");
                    Err(ApplicationError::internal(format!(
                        "{method} finished without a result"
                    )))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_codec::ExceptionKind;
    use thrum_schema::{MethodDef, Type};

    fn args() -> Args {
        let method = Arc::new(MethodDef {
            name: "noop".into(),
            params: vec![],
            returns: Type::Bool,
        });
        Args::new(method, vec![])
    }

    #[tokio::test]
    async fn async_fn_is_a_handler() {
        async fn answer(_args: Args) -> HandlerResult {
            Ok(Value::I32(42))
        }
        assert_eq!(answer.invoke(args()).await, Ok(Value::I32(42)));
    }

    #[tokio::test]
    async fn first_signal_wins() {
        let handler = callback(|_args, done: Completion| {
            assert!(done.success(true));
            assert!(done.is_completed());
            assert!(!done.failure(ApplicationError::internal("late")));
            assert!(!done.success(false));
        });
        assert_eq!(handler.invoke(args()).await, Ok(Value::Bool(true)));
    }

    #[tokio::test]
    async fn signal_from_another_task() {
        let handler = callback(|_args, done: Completion| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                done.success("later");
            });
        });
        assert_eq!(handler.invoke(args()).await, Ok(Value::from("later")));
    }

    #[tokio::test]
    async fn dropped_completion_is_internal_error() {
        let handler = callback(|_args, _done: Completion| {});
        let err = handler.invoke(args()).await.unwrap_err();
        assert_eq!(err.kind, ExceptionKind::InternalError);
        assert_eq!(err.message, "noop finished without a result");
    }
}
