use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::router::HandlerFn;

/// Continuation passed to middleware. Calling `run` advances to the next
/// middleware in the chain, or to the route handler once the chain is done.
pub struct Next {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    index: usize,
    handler: HandlerFn,
}

impl Next {
    pub async fn run(mut self, request: HttpRequest) -> Result<HttpResponse, Error> {
        if self.index < self.middlewares.len() {
            let middleware = self.middlewares[self.index].clone();
            self.index += 1;
            middleware.handle(request, self).await
        } else {
            (self.handler)(request).await
        }
    }
}

/// Request middleware. Implementations may rewrite the request, short-circuit
/// with a response or error, or post-process the response from `next`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// An ordered middleware pipeline attached to a route.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the request through every middleware and finally `handler`.
    pub async fn apply(
        &self,
        request: HttpRequest,
        handler: HandlerFn,
    ) -> Result<HttpResponse, Error> {
        Next {
            middlewares: self.middlewares.clone(),
            index: 0,
            handler,
        }
        .run(request)
        .await
    }
}

/// Logs each request line at debug level before passing it along.
pub struct RequestLogMiddleware;

#[async_trait]
impl Middleware for RequestLogMiddleware {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        tracing::debug!(method = %request.method, path = %request.path, "incoming request");
        next.run(request).await
    }
}
