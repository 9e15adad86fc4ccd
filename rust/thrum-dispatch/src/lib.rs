#![forbid(unsafe_code)]

//! Method dispatch for thrum services.
//!
//! A [`Dispatcher`] maps every method of a schema to one [`Handler`],
//! resolved once at startup. [`Dispatcher::process`] is the whole request
//! pipeline: decode, dispatch, encode the reply in the caller's format.

mod args;
mod dispatcher;
mod handler;

pub use args::Args;
pub use dispatcher::{DispatchError, Dispatcher, DispatcherBuilder, Outcome, ProcessError};
pub use handler::{CallbackHandler, Completion, Handler, HandlerResult, callback};
