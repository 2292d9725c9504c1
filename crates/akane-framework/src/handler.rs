//! Handler function types for the Akane framework.
//!
//! Command bodies and hooks are stored as type-erased closures. Any async
//! closure whose output implements [`HandlerOutput`] can be registered: the
//! output decides what happens after the body finishes (nothing, a text reply,
//! or a failure).
//!
//! # Example
//!
//! ```rust,ignore
//! HandlerDescriptor::builder("ping")
//!     .command("ping")
//!     .execute(|_ctx| async { "pong" })
//!     .build();
//!
//! HandlerDescriptor::builder("roll")
//!     .command("roll")
//!     .execute(|ctx| async move {
//!         let sides: u32 = ctx.text().parse()?;
//!         Ok::<_, HandlerError>(format!("rolled {}", sides / 2))
//!     })
//!     .build();
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::descriptor::HandlerDescriptor;
use crate::error::{HandlerError, HandlerFault, HandlerResult};

/// A boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// A type-erased command body.
pub type ExecuteFn =
    Arc<dyn Fn(Arc<ExecutionContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A type-erased before hook.
pub type HookFn =
    Arc<dyn Fn(Arc<ExecutionContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A type-erased after hook. The second argument is the command that executed
/// successfully for this message, if any.
pub type AfterHookFn = Arc<
    dyn Fn(
            Arc<ExecutionContext>,
            Option<Arc<HandlerDescriptor>>,
        ) -> BoxFuture<'static, HandlerResult>
        + Send
        + Sync,
>;

// ============================================================================
// HandlerOutput
// ============================================================================

/// Values a handler body can produce.
///
/// - `()` does nothing.
/// - `String` / `&'static str` are sent back as a reply to the message.
/// - `Option<T>` finishes the inner value when present.
/// - `Result<T, E>` finishes `T` or surfaces `E` as a handler failure.
#[async_trait]
pub trait HandlerOutput: Send + 'static {
    /// Completes the invocation using the given context.
    async fn finish(self, ctx: &ExecutionContext) -> HandlerResult;
}

#[async_trait]
impl HandlerOutput for () {
    async fn finish(self, _ctx: &ExecutionContext) -> HandlerResult {
        Ok(())
    }
}

#[async_trait]
impl HandlerOutput for String {
    async fn finish(self, ctx: &ExecutionContext) -> HandlerResult {
        if self.is_empty() {
            return Ok(());
        }
        if let Err(e) = ctx.reply(&self).await {
            warn!(error = %e, "Failed to send handler reply");
        }
        Ok(())
    }
}

#[async_trait]
impl HandlerOutput for &'static str {
    async fn finish(self, ctx: &ExecutionContext) -> HandlerResult {
        self.to_string().finish(ctx).await
    }
}

#[async_trait]
impl<T: HandlerOutput> HandlerOutput for Option<T> {
    async fn finish(self, ctx: &ExecutionContext) -> HandlerResult {
        match self {
            Some(inner) => inner.finish(ctx).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T, E> HandlerOutput for Result<T, E>
where
    T: HandlerOutput,
    E: Into<HandlerError> + Send + 'static,
{
    async fn finish(self, ctx: &ExecutionContext) -> HandlerResult {
        match self {
            Ok(inner) => inner.finish(ctx).await,
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Erasure helpers
// ============================================================================

pub(crate) fn erase_execute<F, Fut>(f: F) -> ExecuteFn
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    Arc::new(move |ctx: Arc<ExecutionContext>| {
        let fut = f(ctx.clone());
        async move { fut.await.finish(&ctx).await }.boxed()
    })
}

pub(crate) fn erase_after<F, Fut>(f: F) -> AfterHookFn
where
    F: Fn(Arc<ExecutionContext>, Option<Arc<HandlerDescriptor>>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    Arc::new(
        move |ctx: Arc<ExecutionContext>, executed: Option<Arc<HandlerDescriptor>>| {
            let fut = f(ctx.clone(), executed);
            async move { fut.await.finish(&ctx).await }.boxed()
        },
    )
}

/// Drives a handler future, converting both errors and panics into a
/// [`HandlerFault`].
pub(crate) async fn guarded(fut: BoxFuture<'static, HandlerResult>) -> Result<(), HandlerFault> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerFault::Failed(e)),
        Err(payload) => Err(HandlerFault::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_passes_success_through() {
        let fut: BoxFuture<'static, HandlerResult> = async { Ok::<(), HandlerError>(()) }.boxed();
        assert!(guarded(fut).await.is_ok());
    }

    #[tokio::test]
    async fn test_guarded_captures_errors() {
        let fut: BoxFuture<'static, HandlerResult> =
            async { Err::<(), HandlerError>("boom".into()) }.boxed();
        let fault = guarded(fut).await.unwrap_err();
        assert!(matches!(fault, HandlerFault::Failed(_)));
        assert_eq!(fault.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_guarded_captures_panics() {
        let fut: BoxFuture<'static, HandlerResult> = async {
            if true {
                panic!("exploded");
            }
            Ok::<(), HandlerError>(())
        }
        .boxed();
        let fault = guarded(fut).await.unwrap_err();
        match fault {
            HandlerFault::Panicked(msg) => assert_eq!(msg, "exploded"),
            other => panic!("unexpected fault: {other:?}"),
        }
    }
}
