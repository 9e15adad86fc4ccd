//! `TestService` handlers.

use std::sync::Arc;

use thrum_codec::{ApplicationError, ExceptionKind, RecordValue, Value};
use thrum_dispatch::{Args, Completion, DispatchError, Dispatcher, HandlerResult, callback};
use thrum_schema::Schema;

use crate::idl::{Feature, message};

/// `simpleCall` fails when asked for this id.
pub const FAILURE_ID: &str = "FAILURE";

/// Wire every `TestService` method to its handler.
pub fn dispatcher(schema: Arc<Schema>) -> Result<Dispatcher, DispatchError> {
    let mut builder = Dispatcher::builder(schema);
    builder.register("simpleCall", simple_call)?;
    builder.register("boolCall", callback(bool_call))?;
    builder.register("messageCall", message_call)?;
    builder.register("mapCall", map_call)?;
    builder.register("stringCall", string_call)?;
    builder.register("stringsCall", strings_call)?;
    builder.register("enumCall", enum_call)?;
    builder.build()
}

pub async fn simple_call(mut args: Args) -> HandlerResult {
    let id = args.string(0)?;
    if id == FAILURE_ID {
        let msg = format!("Make failure: {id}");
        tracing::error!("{msg}");
        return Err(ApplicationError::internal(msg));
    }
    let msg = format!("Success: {id}");
    tracing::info!("{msg}");
    Ok(Value::String(msg))
}

/// Callback-style: the result goes through the completion handle.
pub fn bool_call(mut args: Args, done: Completion) {
    match args.bool(0) {
        Ok(tf) => {
            tracing::info!(tf, "accept");
            done.success(tf);
        }
        Err(err) => {
            done.failure(err);
        }
    }
}

pub async fn message_call(mut args: Args) -> HandlerResult {
    let msg = args.record(0)?;
    tracing::info!(message = ?msg, "accept");
    let reply = prefix_content(msg);
    tracing::info!(message = ?reply, "respond");
    Ok(Value::Record(reply))
}

pub async fn map_call(mut args: Args) -> HandlerResult {
    let maps = args.map(0)?;
    tracing::info!(?maps, "accept");
    let reply = maps
        .into_iter()
        .map(|(key, value)| {
            let key = expect_string(key, "map key")?;
            Ok((Value::String(format!("NEW: {key}")), value))
        })
        .collect::<Result<Vec<_>, ApplicationError>>()?;
    tracing::info!(maps = ?reply, "respond");
    Ok(Value::Map(reply))
}

pub async fn string_call(mut args: Args) -> HandlerResult {
    let strs = args.list(0)?;
    tracing::info!(?strs, "accept");
    let reply = strs
        .into_iter()
        .map(|s| {
            let s = expect_string(s, "list element")?;
            Ok(Value::String(format!("{s}:{s}")))
        })
        .collect::<Result<Vec<_>, ApplicationError>>()?;
    tracing::info!(strs = ?reply, "respond");
    Ok(Value::List(reply))
}

pub async fn strings_call(mut args: Args) -> HandlerResult {
    let strs = args.list(0)?;
    tracing::info!(?strs, "accept");
    let reply = strs
        .into_iter()
        .map(|item| {
            let msg = item.into_record().ok_or_else(|| {
                ApplicationError::new(ExceptionKind::ProtocolError, "list element is not a Message")
            })?;
            Ok(Value::Record(prefix_content(msg)))
        })
        .collect::<Result<Vec<_>, ApplicationError>>()?;
    tracing::info!(strs = ?reply, "respond");
    Ok(Value::List(reply))
}

pub async fn enum_call(mut args: Args) -> HandlerResult {
    let feature = args.enum_value(0)?;
    tracing::info!(feature, "accept");
    let reply: Vec<Value> = Feature::ALL.iter().map(|f| Value::Enum(*f as i32)).collect();
    tracing::info!(features = ?Feature::ALL, "respond");
    Ok(Value::List(reply))
}

/// New `Message` with `content` prefixed; `tags` and `nested` carried over.
/// An absent `content` is treated as empty.
fn prefix_content(mut msg: RecordValue) -> RecordValue {
    let content = msg
        .remove(message::CONTENT)
        .and_then(Value::into_string)
        .unwrap_or_default();
    msg.insert(message::CONTENT, format!("content: {content}"));
    msg
}

fn expect_string(value: Value, what: &str) -> Result<String, ApplicationError> {
    value.into_string().ok_or_else(|| {
        ApplicationError::new(ExceptionKind::ProtocolError, format!("{what} is not a string"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_codec::{Format, RequestEnvelope};
    use thrum_dispatch::Outcome;

    use crate::idl;

    fn service() -> Dispatcher {
        dispatcher(Arc::new(idl::schema().unwrap())).unwrap()
    }

    async fn call(method: &str, arg: impl Into<Value>) -> Outcome {
        let request = RequestEnvelope::new(method, 1, RecordValue::new().with(1, arg));
        service().dispatch(request).await
    }

    #[tokio::test]
    async fn simple_call_success() {
        assert_eq!(
            call("simpleCall", "ID").await,
            Outcome::Success(Value::from("Success: ID"))
        );
    }

    #[tokio::test]
    async fn simple_call_failure() {
        match call("simpleCall", FAILURE_ID).await {
            Outcome::Failure(err) => {
                assert_eq!(err.kind, ExceptionKind::InternalError);
                assert_eq!(err.message, "Make failure: FAILURE");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn bool_call_echoes() {
        assert_eq!(call("boolCall", false).await, Outcome::Success(Value::Bool(false)));
        assert_eq!(call("boolCall", true).await, Outcome::Success(Value::Bool(true)));
    }

    #[tokio::test]
    async fn message_call_keeps_other_fields() {
        let nested = RecordValue::new().with(message::CONTENT, "inner");
        let msg = RecordValue::new()
            .with(message::CONTENT, "hello")
            .with(message::TAGS, Value::List(vec![Value::from("t")]))
            .with(message::NESTED, nested.clone());

        let expected = RecordValue::new()
            .with(message::CONTENT, "content: hello")
            .with(message::TAGS, Value::List(vec![Value::from("t")]))
            .with(message::NESTED, nested);
        assert_eq!(call("messageCall", msg).await, Outcome::Success(expected.into()));
    }

    #[tokio::test]
    async fn map_call_prefixes_keys() {
        let maps = Value::Map(vec![(Value::from("x"), Value::Bool(true))]);
        assert_eq!(
            call("mapCall", maps).await,
            Outcome::Success(Value::Map(vec![(Value::from("NEW: x"), Value::Bool(true))]))
        );
    }

    #[tokio::test]
    async fn string_call_doubles_each_element() {
        let strs = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(
            call("stringCall", strs).await,
            Outcome::Success(Value::List(vec![Value::from("a:a"), Value::from("b:b")]))
        );
    }

    #[tokio::test]
    async fn strings_call_maps_messages() {
        let strs = Value::List(vec![
            RecordValue::new().with(message::CONTENT, "one").into(),
            RecordValue::new().into(),
        ]);
        assert_eq!(
            call("stringsCall", strs).await,
            Outcome::Success(Value::List(vec![
                RecordValue::new().with(message::CONTENT, "content: one").into(),
                RecordValue::new().with(message::CONTENT, "content: ").into(),
            ]))
        );
    }

    #[tokio::test]
    async fn enum_call_lists_all_features() {
        assert_eq!(
            call("enumCall", Value::Enum(2)).await,
            Outcome::Success(Value::List(vec![Value::Enum(1), Value::Enum(2), Value::Enum(3)]))
        );
    }

    #[tokio::test]
    async fn empty_list_survives_the_wire() {
        let d = service();
        let args = RecordValue::new().with(1, Value::List(vec![]));
        let request = RequestEnvelope::new("stringCall", 3, args);
        for format in Format::ALL {
            let bytes = thrum_codec::encode_request(d.schema(), &request, format).unwrap();
            let reply = d.process(&bytes, format).await.unwrap();
            let response = thrum_codec::decode_response(d.schema(), &reply, format).unwrap();
            assert_eq!(response.into_call_result().into_result(), Ok(Value::List(vec![])));
        }
    }
}
