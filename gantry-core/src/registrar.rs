use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::binder::{ResponseHandle, build_arguments};
use crate::blueprint::RouteSpec;
use crate::config::RuntimeConfig;
use crate::container::{Container, DependencyId};
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::registry::{MetadataRegistry, TargetId, keys};
use crate::router::{HandlerFn, Route, Router};
use crate::traits::{ControllerFactory, ControllerRegistration};

/// Turns applied blueprints into live routes.
///
/// Registration happens in two passes: first every blueprint is validated
/// and written into the metadata registry, then the registry is frozen and
/// a dispatch handler is mounted for each recorded route.
pub struct RouteRegistrar {
    container: Container,
    config: RuntimeConfig,
}

impl RouteRegistrar {
    pub fn new(container: Container, config: RuntimeConfig) -> Self {
        Self { container, config }
    }

    /// Registers every controller and returns the populated router together
    /// with the frozen registry. An empty controller list is fatal; a
    /// controller whose blueprint declares no routes only logs a warning
    /// and contributes nothing.
    pub fn register_controllers(
        &self,
        mut registry: MetadataRegistry,
        controllers: &[ControllerRegistration],
    ) -> Result<(Router, Arc<MetadataRegistry>), Error> {
        if controllers.is_empty() {
            tracing::error!("no controllers found; nothing to register");
            return Err(Error::NoControllers);
        }

        for registration in controllers {
            (registration.blueprint_fn)().apply(&mut registry, registration.target)?;
        }

        let registry = Arc::new(registry);
        let mut router = Router::new();
        for registration in controllers {
            self.mount(&registry, &mut router, registration);
        }
        tracing::info!(routes = router.len(), "route registration complete");
        Ok((router, registry))
    }

    fn mount(
        &self,
        registry: &Arc<MetadataRegistry>,
        router: &mut Router,
        registration: &ControllerRegistration,
    ) {
        let target = registration.target;
        let routes = match registry.get::<Vec<RouteSpec>>(keys::ROUTES, target, None) {
            Some(routes) if !routes.is_empty() => routes.clone(),
            _ => {
                tracing::warn!(
                    controller = target.short_name(),
                    "controller declares no routes; skipping"
                );
                return;
            }
        };

        tracing::info!(
            controller = target.short_name(),
            routes = routes.len(),
            "registering controller routes"
        );
        for spec in routes {
            let chain = registry
                .get::<Vec<Arc<dyn Middleware>>>(keys::MIDDLEWARE, target, Some(spec.handler_name))
                .cloned()
                .map(MiddlewareChain::from_list)
                .unwrap_or_default();
            tracing::info!("{} => {}", spec.method.as_str(), spec.path);

            let handler =
                self.dispatch_handler(registry.clone(), target, registration.factory, &spec, chain);
            router.add_route(Route {
                method: spec.method,
                path: spec.path.clone(),
                handler,
            });
        }
    }

    /// Builds the per-route dispatch pipeline: resolve the controller
    /// instance (bound on first use), bind arguments, run the middleware
    /// chain and handler, render the JSON response. Failures never escape:
    /// they are logged and rendered as the JSON error payload.
    fn dispatch_handler(
        &self,
        registry: Arc<MetadataRegistry>,
        target: TargetId,
        factory: ControllerFactory,
        spec: &RouteSpec,
        chain: MiddlewareChain,
    ) -> HandlerFn {
        let production = self.config.production;
        let slow_ms = self.config.slow_request_ms;
        let handler_name = spec.handler_name;
        let label = format!("{} {}", spec.method.as_str(), spec.path);
        let callable = spec.callable.clone();
        let container = self.container.clone();

        let core: HandlerFn = Arc::new(move |request: HttpRequest| {
            let registry = registry.clone();
            let container = container.clone();
            let callable = callable.clone();
            Box::pin(async move {
                let instance = container.get_or_bind_with(
                    DependencyId::Type(target.type_id(), target.name()),
                    || factory(&container),
                );
                let body = request.parsed_body()?;
                let handle = ResponseHandle::new();
                let args =
                    build_arguments(&registry, target, handler_name, &request, &body, &handle);
                let value = callable(instance, args).await?;
                render_json(value, &handle)
            })
        });

        Arc::new(move |request: HttpRequest| {
            let chain = chain.clone();
            let core = core.clone();
            let label = label.clone();
            Box::pin(async move {
                let request_id = Uuid::new_v4();
                let started = Instant::now();

                let outcome = chain.apply(request, core).await;

                let elapsed_ms = started.elapsed().as_millis() as u64;
                if elapsed_ms >= slow_ms {
                    tracing::warn!(%request_id, route = %label, elapsed_ms, "slow request");
                }
                match outcome {
                    Ok(response) => {
                        tracing::debug!(%request_id, route = %label, status = response.status, elapsed_ms, "request complete");
                        Ok(response)
                    }
                    Err(error) => {
                        tracing::error!(%request_id, route = %label, error = %error, "request failed");
                        Ok(HttpResponse::from_error(&error, production))
                    }
                }
            })
        })
    }
}

/// Renders a handler's JSON value. Status defaults to 200, a numeric
/// `statusCode` field in the body overrides it, and an explicit status set
/// through the response handle overrides both. Handle headers are merged
/// last.
fn render_json(value: Value, handle: &ResponseHandle) -> Result<HttpResponse, Error> {
    let mut status = 200u16;
    if let Some(code) = value.get("statusCode").and_then(Value::as_u64) {
        if (100..=599).contains(&code) {
            status = code as u16;
        }
    }
    if let Some(forced) = handle.status() {
        status = forced;
    }
    let mut response = HttpResponse::new(status).with_json(&value)?;
    for (name, header_value) in handle.headers() {
        response = response.with_header(name, header_value);
    }
    Ok(response)
}
