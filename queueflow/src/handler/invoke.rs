//! Single handler attempt under a deadline.

use super::Handler;
use crate::errors::HandlerFailure;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Runs one handler attempt.
///
/// Errors, deadline overruns and panics all come back as a
/// [`HandlerFailure`]; each attempt gets the full `deadline`.
pub(crate) async fn invoke<P, O>(
    handler: &dyn Handler<P, O>,
    payload: P,
    deadline: Option<Duration>,
) -> Result<O, HandlerFailure>
where
    P: Send + 'static,
    O: Send + 'static,
{
    let attempt = AssertUnwindSafe(handler.handle(payload)).catch_unwind();

    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(HandlerFailure::TimedOut(limit)),
        },
        None => attempt.await,
    };

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(HandlerFailure::Error(err)),
        Err(panic) => Err(HandlerFailure::Panicked(panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BoxError;

    #[tokio::test]
    async fn test_invoke_success() {
        let handler = |x: u32| async move { Ok::<_, BoxError>(x + 1) };
        assert_eq!(invoke::<u32, u32>(&handler, 1, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invoke_error() {
        let handler = |_: u32| async move { Err::<u32, _>(BoxError::from("nope")) };
        let failure = invoke::<u32, u32>(&handler, 1, None).await.unwrap_err();
        assert!(matches!(failure, HandlerFailure::Error(_)));
        assert_eq!(failure.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let handler = |x: u32| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, BoxError>(x)
        };
        let failure = invoke::<u32, u32>(&handler, 1, Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(failure, HandlerFailure::TimedOut(d) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_invoke_catches_panic() {
        let handler = |x: u32| async move {
            if x == 0 {
                panic!("division by zero");
            }
            Ok::<_, BoxError>(10 / x)
        };
        let failure = invoke::<u32, u32>(&handler, 0, None).await.unwrap_err();
        match failure {
            HandlerFailure::Panicked(message) => assert_eq!(message, "division by zero"),
            other => panic!("expected panic failure, got {other:?}"),
        }
    }
}
