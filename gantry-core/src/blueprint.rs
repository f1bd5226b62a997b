use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::binder::CallArgs;
use crate::error::Error;
use crate::middleware::Middleware;
use crate::registry::{MetadataRegistry, TargetId, keys};
use crate::traits::HttpMethod;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, Error>> + Send>>;

/// A route handler with the controller type erased. Dispatch downcasts the
/// instance back to the concrete controller before calling the real handler.
pub type ErasedHandler =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>, CallArgs) -> HandlerFuture + Send + Sync>;

/// One route as recorded by a blueprint. After `apply` the path already
/// carries the controller prefix and is final.
#[derive(Clone)]
pub struct RouteSpec {
    pub method: HttpMethod,
    pub path: String,
    pub handler_name: &'static str,
    pub callable: ErasedHandler,
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Which request part a handler argument binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Body,
    Query,
    Param,
    Headers,
    Request,
    Response,
}

impl ParamKind {
    pub fn registry_key(&self) -> &'static str {
        match self {
            ParamKind::Body => keys::BODY,
            ParamKind::Query => keys::QUERY,
            ParamKind::Param => keys::PARAM,
            ParamKind::Headers => keys::HEADERS,
            ParamKind::Request => keys::REQUEST,
            ParamKind::Response => keys::RESPONSE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::Body => "body",
            ParamKind::Query => "query",
            ParamKind::Param => "param",
            ParamKind::Headers => "headers",
            ParamKind::Request => "request",
            ParamKind::Response => "response",
        }
    }
}

/// Position (and optional name) of one bound handler argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub index: usize,
    pub name: Option<String>,
}

/// The type-erased output of a blueprint, ready to be applied to the
/// metadata registry.
pub struct BlueprintData {
    path: Option<String>,
    version: Option<u16>,
    routes: Vec<RouteSpec>,
    bindings: Vec<(&'static str, ParamKind, ParamDescriptor)>,
    middleware: Vec<(&'static str, Arc<dyn Middleware>)>,
}

impl BlueprintData {
    fn new() -> Self {
        Self {
            path: None,
            version: None,
            routes: Vec::new(),
            bindings: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Controller prefix: `/v{version}` then `/{path}`. Surrounding slashes
    /// on the configured path are trimmed so segments join with exactly one.
    fn prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(version) = self.version {
            prefix.push_str(&format!("/v{version}"));
        }
        if let Some(path) = &self.path {
            let path = path.trim_matches('/');
            if !path.is_empty() {
                prefix.push_str(&format!("/{path}"));
            }
        }
        prefix
    }

    /// Validates the blueprint and writes every descriptor into `registry`.
    ///
    /// Route paths are rewritten under the controller prefix here; an empty
    /// route path collapses to the bare prefix. A binding or middleware
    /// entry naming a handler no route declares rejects the whole
    /// controller, which aborts startup.
    pub fn apply(mut self, registry: &mut MetadataRegistry, target: TargetId) -> Result<(), Error> {
        let mut seen = Vec::new();
        for route in &self.routes {
            if seen.contains(&route.handler_name) {
                return Err(self.reject(
                    target,
                    format!("duplicate handler name `{}`", route.handler_name),
                ));
            }
            seen.push(route.handler_name);
        }
        for (handler, kind, descriptor) in &self.bindings {
            if !seen.contains(handler) {
                return Err(self.reject(
                    target,
                    format!(
                        "{} binding at index {} references unknown handler `{}`",
                        kind.label(),
                        descriptor.index,
                        handler
                    ),
                ));
            }
        }
        for (handler, _) in &self.middleware {
            if !seen.contains(handler) {
                return Err(self.reject(
                    target,
                    format!("middleware references unknown handler `{}`", handler),
                ));
            }
        }

        let prefix = self.prefix();
        for route in &mut self.routes {
            let trimmed = route.path.trim_matches('/');
            route.path = if trimmed.is_empty() {
                prefix.clone()
            } else {
                format!("{prefix}/{trimmed}")
            };
        }

        registry.define(keys::CONTROLLER, target, None, true);

        let mut grouped: HashMap<(&'static str, ParamKind), Vec<ParamDescriptor>> = HashMap::new();
        for (handler, kind, descriptor) in self.bindings {
            grouped.entry((handler, kind)).or_default().push(descriptor);
        }
        for ((handler, kind), descriptors) in grouped {
            registry.define(kind.registry_key(), target, Some(handler), descriptors);
        }

        let mut stacks: HashMap<&'static str, Vec<Arc<dyn Middleware>>> = HashMap::new();
        for (handler, middleware) in self.middleware {
            stacks.entry(handler).or_default().push(middleware);
        }
        for (handler, stack) in stacks {
            registry.define(keys::MIDDLEWARE, target, Some(handler), stack);
        }

        registry.define(keys::ROUTES, target, None, self.routes);
        Ok(())
    }

    fn reject(&self, target: TargetId, message: String) -> Error {
        tracing::error!(
            controller = target.short_name(),
            %message,
            "rejecting controller blueprint"
        );
        Error::InvalidBlueprint {
            controller: target.name(),
            message,
        }
    }
}

/// Declares a controller's routes, argument bindings and middleware.
///
/// ```
/// use std::sync::Arc;
/// use gantry_core::blueprint::ControllerBlueprint;
/// use gantry_core::binder::CallArgs;
/// use serde_json::json;
///
/// struct Health;
///
/// let blueprint = ControllerBlueprint::<Health>::new()
///     .path("health")
///     .get("", "check", |_c: Arc<Health>, _args: CallArgs| async move {
///         Ok(json!({"status": "up"}))
///     });
/// ```
///
/// Handlers take the shared controller instance plus the bound arguments
/// and return a JSON value; argument positions are declared separately with
/// `body`, `param`, `query`, `headers`, `request` and `response`.
pub struct ControllerBlueprint<C: ?Sized> {
    data: BlueprintData,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> ControllerBlueprint<C> {
    pub fn new() -> Self {
        Self {
            data: BlueprintData::new(),
            _controller: PhantomData,
        }
    }

    /// Path prefix for every route in this controller.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.data.path = Some(path.into());
        self
    }

    /// API version, prepended to the prefix as `/v{n}`.
    pub fn version(mut self, version: u16) -> Self {
        self.data.version = Some(version);
        self
    }

    pub fn route<F, Fut>(
        mut self,
        method: HttpMethod,
        path: impl Into<String>,
        name: &'static str,
        handler: F,
    ) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let callable: ErasedHandler = Arc::new(
            move |instance: Arc<dyn Any + Send + Sync>, args: CallArgs| -> HandlerFuture {
                match instance.downcast::<C>() {
                    Ok(concrete) => Box::pin(handler(concrete, args)),
                    Err(_) => Box::pin(std::future::ready(Err(Error::Internal(format!(
                        "handler `{name}` received an instance of another controller"
                    ))))),
                }
            },
        );
        self.data.routes.push(RouteSpec {
            method,
            path: path.into(),
            handler_name: name,
            callable,
        });
        self
    }

    pub fn get<F, Fut>(self, path: impl Into<String>, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.route(HttpMethod::GET, path, name, handler)
    }

    pub fn post<F, Fut>(self, path: impl Into<String>, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.route(HttpMethod::POST, path, name, handler)
    }

    pub fn put<F, Fut>(self, path: impl Into<String>, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.route(HttpMethod::PUT, path, name, handler)
    }

    pub fn delete<F, Fut>(self, path: impl Into<String>, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.route(HttpMethod::DELETE, path, name, handler)
    }

    pub fn patch<F, Fut>(self, path: impl Into<String>, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        self.route(HttpMethod::PATCH, path, name, handler)
    }

    fn bind<'a>(
        mut self,
        handler: &'static str,
        kind: ParamKind,
        index: usize,
        name: impl Into<Option<&'a str>>,
    ) -> Self {
        self.data.bindings.push((
            handler,
            kind,
            ParamDescriptor {
                index,
                name: name.into().map(str::to_string),
            },
        ));
        self
    }

    /// Binds the parsed request body at `index`. With a name, that single
    /// field is extracted; if the field is absent the whole body is passed.
    pub fn body<'a>(
        self,
        handler: &'static str,
        index: usize,
        name: impl Into<Option<&'a str>>,
    ) -> Self {
        self.bind(handler, ParamKind::Body, index, name)
    }

    /// Binds a path parameter (or, unnamed, the whole parameter map).
    pub fn param<'a>(
        self,
        handler: &'static str,
        index: usize,
        name: impl Into<Option<&'a str>>,
    ) -> Self {
        self.bind(handler, ParamKind::Param, index, name)
    }

    /// Binds a query parameter (or, unnamed, the whole query map).
    pub fn query<'a>(
        self,
        handler: &'static str,
        index: usize,
        name: impl Into<Option<&'a str>>,
    ) -> Self {
        self.bind(handler, ParamKind::Query, index, name)
    }

    /// Binds a header value (or, unnamed, the whole header map).
    pub fn headers<'a>(
        self,
        handler: &'static str,
        index: usize,
        name: impl Into<Option<&'a str>>,
    ) -> Self {
        self.bind(handler, ParamKind::Headers, index, name)
    }

    /// Binds the raw request at `index`.
    pub fn request(self, handler: &'static str, index: usize) -> Self {
        self.bind(handler, ParamKind::Request, index, None)
    }

    /// Binds the response handle at `index`, for status or header overrides.
    pub fn response(self, handler: &'static str, index: usize) -> Self {
        self.bind(handler, ParamKind::Response, index, None)
    }

    /// Attaches middleware to one handler. Middleware runs in registration
    /// order before the handler.
    pub fn middleware<M: Middleware + 'static>(
        mut self,
        handler: &'static str,
        middleware: M,
    ) -> Self {
        self.data.middleware.push((handler, Arc::new(middleware)));
        self
    }

    pub fn into_data(self) -> BlueprintData {
        self.data
    }
}

impl<C: Send + Sync + 'static> Default for ControllerBlueprint<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Widgets;

    fn list_blueprint() -> ControllerBlueprint<Widgets> {
        ControllerBlueprint::<Widgets>::new().get("/list", "list", |_c: Arc<Widgets>, _args| {
            async move { Ok(json!(["w1", "w2"])) }
        })
    }

    fn routes(registry: &MetadataRegistry, target: TargetId) -> &Vec<RouteSpec> {
        registry.get::<Vec<RouteSpec>>(keys::ROUTES, target, None).unwrap()
    }

    #[test]
    fn test_prefix_with_version_and_path() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        list_blueprint()
            .path("widgets")
            .version(1)
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/v1/widgets/list");
    }

    #[test]
    fn test_prefix_strips_surrounding_slashes() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        list_blueprint()
            .path("//widgets/")
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/widgets/list");
    }

    #[test]
    fn test_route_path_trailing_slash_is_normalized() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        ControllerBlueprint::<Widgets>::new()
            .path("widgets")
            .get("list/", "list", |_c: Arc<Widgets>, _args| async move {
                Ok(json!([]))
            })
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/widgets/list");
    }

    #[test]
    fn test_version_only_prefix() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        list_blueprint()
            .version(2)
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/v2/list");
    }

    #[test]
    fn test_bare_route_without_prefix() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        list_blueprint()
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/list");
    }

    #[test]
    fn test_empty_route_path_collapses_to_prefix() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        ControllerBlueprint::<Widgets>::new()
            .path("widgets")
            .get("", "index", |_c: Arc<Widgets>, _args| async move {
                Ok(json!([]))
            })
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        assert_eq!(routes(&registry, target)[0].path, "/widgets");
    }

    #[test]
    fn test_binding_descriptors_are_recorded_in_order() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        ControllerBlueprint::<Widgets>::new()
            .put("/:id", "update", |_c: Arc<Widgets>, _args| async move {
                Ok(Value::Null)
            })
            .param("update", 0, "id")
            .body("update", 1, None)
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        let params = registry
            .get::<Vec<ParamDescriptor>>(keys::PARAM, target, Some("update"))
            .unwrap();
        assert_eq!(params[0].index, 0);
        assert_eq!(params[0].name.as_deref(), Some("id"));

        let bodies = registry
            .get::<Vec<ParamDescriptor>>(keys::BODY, target, Some("update"))
            .unwrap();
        assert_eq!(bodies[0].index, 1);
        assert_eq!(bodies[0].name, None);
        assert!(registry.has(keys::CONTROLLER, target, None));
    }

    #[test]
    fn test_binding_unknown_handler_is_rejected() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        let result = list_blueprint()
            .param("missing", 0, "id")
            .into_data()
            .apply(&mut registry, target);

        match result {
            Err(Error::InvalidBlueprint { message, .. }) => {
                assert!(message.contains("missing"));
            }
            other => panic!("expected InvalidBlueprint, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_handler_names_are_rejected() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        let result = list_blueprint()
            .get("/again", "list", |_c: Arc<Widgets>, _args| async move {
                Ok(Value::Null)
            })
            .into_data()
            .apply(&mut registry, target);

        assert!(matches!(result, Err(Error::InvalidBlueprint { .. })));
    }

    #[test]
    fn test_callable_downcasts_to_concrete_controller() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Widgets>();
        list_blueprint()
            .into_data()
            .apply(&mut registry, target)
            .unwrap();

        let callable = routes(&registry, target)[0].callable.clone();
        tokio_test::block_on(async {
            let instance: Arc<dyn std::any::Any + Send + Sync> = Arc::new(Widgets);
            let value = callable(instance, CallArgs::default()).await.unwrap();
            assert_eq!(value, json!(["w1", "w2"]));

            let wrong: Arc<dyn std::any::Any + Send + Sync> = Arc::new(42u32);
            let result = callable(wrong, CallArgs::default()).await;
            assert!(matches!(result, Err(Error::Internal(_))));
        });
    }
}
