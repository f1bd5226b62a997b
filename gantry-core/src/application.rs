use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::RuntimeConfig;
use crate::container::{Container, ResolvePolicy};
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::logging;
use crate::openapi::{self, ApiInfo};
use crate::registrar::RouteRegistrar;
use crate::registry::{MetadataRegistry, TargetId, keys};
use crate::router::{HandlerFn, Route, Router};
use crate::traits::{
    Controller, ControllerRegistration, HttpMethod, Injectable, ProviderRegistration,
};

/// Everything the application is assembled from: providers, controllers,
/// the dependency resolve policy and optional API documentation.
///
/// ```no_run
/// # use gantry_core::application::{AppConfig, Application};
/// # use gantry_core::blueprint::ControllerBlueprint;
/// # use gantry_core::container::Container;
/// # use gantry_core::traits::{Controller, Injectable};
/// # use std::sync::Arc;
/// # struct Health;
/// # impl Injectable for Health {
/// #     fn construct(_c: &Container) -> Self { Health }
/// # }
/// # impl Controller for Health {
/// #     fn blueprint() -> ControllerBlueprint<Self> {
/// #         ControllerBlueprint::new().get("/health", "health", |_c: Arc<Self>, _a| async move {
/// #             Ok(serde_json::json!({"status": "up"}))
/// #         })
/// #     }
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let config = AppConfig::new().controller::<Health>().with_docs();
/// Application::serve(config).await;
/// # }
/// ```
#[derive(Default)]
pub struct AppConfig {
    controllers: Vec<ControllerRegistration>,
    providers: Vec<ProviderRegistration>,
    policy: ResolvePolicy,
    docs: bool,
    api_info: ApiInfo,
    runtime: Option<RuntimeConfig>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller<C: Controller + Injectable>(mut self) -> Self {
        self.controllers.push(crate::traits::controller::<C>());
        self
    }

    pub fn provider<P: Injectable>(mut self) -> Self {
        self.providers.push(crate::traits::provider::<P>());
        self
    }

    /// How unresolved dependencies are treated at startup. Lenient (the
    /// default) warns and leaves slots empty; strict aborts.
    pub fn resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Serve a generated OpenAPI document at `/api-docs`.
    pub fn with_docs(mut self) -> Self {
        self.docs = true;
        self
    }

    pub fn docs_info(mut self, info: ApiInfo) -> Self {
        self.api_info = info;
        self
    }

    /// Overrides the environment-derived runtime settings, mostly for tests.
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

/// An assembled application: container installed, blueprints applied,
/// routes mounted. `listen` serves it; `serve` is the one-call variant
/// that also handles exit codes.
pub struct Application {
    pub container: Container,
    pub registry: Arc<MetadataRegistry>,
    pub config: RuntimeConfig,
    router: Router,
    controller_targets: Vec<TargetId>,
    api_info: ApiInfo,
}

impl Application {
    /// Installs providers, then registers controllers. Providers go first
    /// so controller construction can resolve them. Fails with
    /// `NoControllers` when the controller list is empty, or with the
    /// blueprint or injection error that rejected registration.
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let runtime = config.runtime.unwrap_or_else(RuntimeConfig::from_env);
        let container = Container::new();
        let mut registry = MetadataRegistry::new();

        for registration in &config.providers {
            registry.define(keys::INJECTABLE, registration.target, None, true);
            registry.define(
                keys::INJECT,
                registration.target,
                None,
                registration.dependencies.clone(),
            );
        }
        container.install(&config.providers, config.policy)?;
        verify_controller_dependencies(&container, &config.controllers, config.policy)?;

        for registration in &config.controllers {
            registry.define(
                keys::INJECT,
                registration.target,
                None,
                registration.dependencies.clone(),
            );
        }

        let registrar = RouteRegistrar::new(container.clone(), runtime.clone());
        let (router, registry) = registrar.register_controllers(registry, &config.controllers)?;

        let mut application = Application {
            container,
            registry,
            config: runtime,
            router,
            controller_targets: config.controllers.iter().map(|r| r.target).collect(),
            api_info: config.api_info,
        };
        if config.docs {
            application.generate_docs();
        }
        Ok(application)
    }

    /// Builds the OpenAPI document from the registry and mounts it at
    /// `/api-docs`.
    pub fn generate_docs(&mut self) {
        let document = openapi::build_document(
            &self.registry,
            &self.controller_targets,
            self.api_info.clone(),
        );
        let payload = match serde_json::to_value(&document) {
            Ok(payload) => Arc::new(payload),
            Err(error) => {
                tracing::error!(error = %error, "could not serialize api documentation");
                return;
            }
        };
        let handler: HandlerFn = Arc::new(move |_request: HttpRequest| {
            let payload = payload.clone();
            Box::pin(async move { HttpResponse::ok().with_json(payload.as_ref()) })
        });
        self.router.add_route(Route {
            method: HttpMethod::GET,
            path: openapi::DOCS_PATH.to_string(),
            handler,
        });
        tracing::info!(path = openapi::DOCS_PATH, "serving generated api documentation");
    }

    /// The mounted route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Consumes the application, handing the route table to a driver such
    /// as an in-process test client.
    pub fn into_router(self) -> Arc<Router> {
        Arc::new(self.router)
    }

    /// Serves HTTP on `port` until the listener fails.
    pub async fn listen(self, port: u16) -> Result<(), Error> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "server listening");

        let router = Arc::new(self.router);
        let production = self.config.production;
        loop {
            let (stream, _remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = router.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request: hyper::Request<Incoming>| {
                    let router = router.clone();
                    async move { handle_request(router, request, production).await }
                });
                if let Err(error) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(error = %error, "connection closed with error");
                }
            });
        }
    }

    /// Serves on the configured port (`GANTRY_PORT`, default 3000),
    /// exiting the process when the listener cannot run.
    pub async fn start(self) {
        let port = self.config.port;
        self.start_on(port).await
    }

    pub async fn start_on(self, port: u16) {
        if let Err(error) = self.listen(port).await {
            logging::report_startup_failure(
                &error,
                "binding the HTTP listener",
                &[
                    "check that the port is not already in use",
                    "set GANTRY_PORT to pick a different port",
                ],
            );
            std::process::exit(error.exit_code());
        }
    }

    /// Builds and serves in one call. Exits with code 2 when no controllers
    /// were registered and 1 for any other startup failure, after logging
    /// what went wrong.
    pub async fn serve(config: AppConfig) {
        match Application::new(config) {
            Ok(application) => application.start().await,
            Err(error) => {
                logging::report_startup_failure(
                    &error,
                    "assembling the application",
                    &[
                        "register at least one controller on the AppConfig",
                        "check blueprint bindings against declared handler names",
                    ],
                );
                std::process::exit(error.exit_code());
            }
        }
    }
}

fn verify_controller_dependencies(
    container: &Container,
    controllers: &[ControllerRegistration],
    policy: ResolvePolicy,
) -> Result<(), Error> {
    let mut missing = Vec::new();
    for registration in controllers {
        for dependency in &registration.dependencies {
            if !container.has_id(&dependency.id) {
                missing.push(format!(
                    "{} (slot `{}` of {})",
                    dependency.id,
                    dependency.slot,
                    registration.target.short_name()
                ));
            }
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    match policy {
        ResolvePolicy::Lenient => {
            tracing::warn!(
                unresolved = missing.join(", "),
                "controllers have unbound dependencies; their slots will be empty"
            );
            Ok(())
        }
        ResolvePolicy::Strict => Err(Error::DependencyInjection(format!(
            "unresolved dependencies: {}",
            missing.join(", ")
        ))),
    }
}

async fn handle_request(
    router: Arc<Router>,
    request: hyper::Request<Incoming>,
    production: bool,
) -> Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = request.into_parts();
    let path = match parts.uri.query() {
        Some(query) => format!("{}?{}", parts.uri.path(), query),
        None => parts.uri.path().to_string(),
    };

    let mut request = HttpRequest::new(parts.method.as_str(), path);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request
                .headers
                .insert(name.as_str().to_string(), value.to_string());
        }
    }
    request.body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(error) => {
            tracing::warn!(error = %error, "could not read request body");
            let failure = Error::BadRequest("could not read request body".to_string());
            return Ok(to_hyper_response(HttpResponse::from_error(
                &failure, production,
            )));
        }
    };

    let response = match router.route(request).await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(error = %error, "unrouted request");
            HttpResponse::from_error(&error, production)
        }
    };
    Ok(to_hyper_response(response))
}

fn to_hyper_response(response: HttpResponse) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|error| {
            tracing::error!(error = %error, "could not build response");
            let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::ControllerBlueprint;
    use serde_json::{Value, json};

    struct Inventory {
        items: Vec<String>,
    }

    impl Injectable for Inventory {
        fn construct(_container: &Container) -> Self {
            Self {
                items: vec!["bolt".to_string(), "plate".to_string()],
            }
        }
    }

    struct InventoryController {
        inventory: Option<Arc<Inventory>>,
    }

    impl Injectable for InventoryController {
        fn construct(container: &Container) -> Self {
            Self {
                inventory: container.slot::<Inventory>("InventoryController"),
            }
        }

        fn dependencies() -> Vec<crate::container::Dependency> {
            vec![crate::container::Dependency::of::<Inventory>("inventory")]
        }
    }

    impl Controller for InventoryController {
        fn blueprint() -> ControllerBlueprint<Self> {
            ControllerBlueprint::new()
                .path("inventory")
                .get("", "list", |c: Arc<Self>, _args| async move {
                    let items = c
                        .inventory
                        .as_ref()
                        .map(|inv| inv.items.clone())
                        .unwrap_or_default();
                    Ok(json!({ "items": items }))
                })
        }
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let result = Application::new(AppConfig::new());
        assert!(matches!(result, Err(Error::NoControllers)));
    }

    #[tokio::test]
    async fn test_provider_flows_into_controller() {
        let application = Application::new(
            AppConfig::new()
                .provider::<Inventory>()
                .controller::<InventoryController>(),
        )
        .unwrap();

        let response = application
            .router()
            .route(HttpRequest::new("GET", "/inventory"))
            .await
            .unwrap();
        let value: Value = response.json().unwrap();
        assert_eq!(value["items"][0], "bolt");
    }

    #[test]
    fn test_strict_policy_rejects_missing_controller_dependency() {
        let result = Application::new(
            AppConfig::new()
                .controller::<InventoryController>()
                .resolve_policy(ResolvePolicy::Strict),
        );
        assert!(matches!(result, Err(Error::DependencyInjection(_))));
    }

    #[tokio::test]
    async fn test_lenient_policy_starts_with_empty_slot() {
        let application =
            Application::new(AppConfig::new().controller::<InventoryController>()).unwrap();

        let response = application
            .router()
            .route(HttpRequest::new("GET", "/inventory"))
            .await
            .unwrap();
        let value: Value = response.json().unwrap();
        assert_eq!(value["items"], json!([]));
    }

    #[tokio::test]
    async fn test_docs_route_is_mounted() {
        let application = Application::new(
            AppConfig::new()
                .controller::<InventoryController>()
                .with_docs(),
        )
        .unwrap();

        let response = application
            .router()
            .route(HttpRequest::new("GET", openapi::DOCS_PATH))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let value: Value = response.json().unwrap();
        assert_eq!(value["openapi"], "3.0.0");
        assert!(value["paths"]["/inventory"]["get"].is_object());
    }

    #[test]
    fn test_registry_records_registrations() {
        let application = Application::new(
            AppConfig::new()
                .provider::<Inventory>()
                .controller::<InventoryController>(),
        )
        .unwrap();

        let provider_target = TargetId::of::<Inventory>();
        let controller_target = TargetId::of::<InventoryController>();
        assert_eq!(
            application
                .registry
                .get::<bool>(keys::INJECTABLE, provider_target, None),
            Some(&true)
        );
        assert_eq!(
            application
                .registry
                .get::<bool>(keys::CONTROLLER, controller_target, None),
            Some(&true)
        );
    }
}
