//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one tree per method, so
//! each handler is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn healthcheck(req: Request) -> Json<Health> { … }   ← user writes this
//!        ↓ router.get("/healthcheck", healthcheck)
//! healthcheck.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(healthcheck))                          ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                        ← one vtable dispatch
//!        ↓
//! Box::pin(async { healthcheck(req).await.into_outcome() }) ← Result<Response, Failure>
//! ```
//!
//! The handler's output is an [`Outcome`], not a finished response: failures
//! stay typed until the error pipeline renders them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoOutcome, Outcome};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased, `Send` future.
///
/// `Pin<Box<…>>` because the runtime polls it in place. Handler futures are
/// `'static`; middleware futures borrow the router for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure returning a future)
/// with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoOutcome
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;

    /// Short name used in route introspection: the function's own name for
    /// `async fn` items, the enclosing function's name for closures.
    #[doc(hidden)]
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").find(|segment| !segment.starts_with('{')).unwrap_or(full)
    }
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use crate::response::Response;

    async fn list_models(_req: Request) -> &'static str {
        "ok"
    }

    #[test]
    fn name_is_the_function_name() {
        assert_eq!(Handler::name(&list_models), "list_models");
    }

    #[tokio::test]
    async fn erased_handler_keeps_failures_typed() {
        async fn deny(_req: Request) -> Result<Response, Failure> {
            Err(Failure::command_not_allowed("Command Not Allowed"))
        }

        let handler = deny.into_boxed_handler();
        let outcome = handler.call(Request::for_test(http::Method::GET, "/", b"")).await;
        assert!(matches!(outcome, Err(Failure::CommandNotAllowed { .. })));
    }
}
