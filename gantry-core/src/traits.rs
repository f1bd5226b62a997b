use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::blueprint::{BlueprintData, ControllerBlueprint};
use crate::container::{Container, Dependency};
use crate::registry::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type the container can construct.
///
/// `construct` pulls declared dependencies out of the container, normally
/// through [`Container::slot`], which tolerates missing bindings and leaves
/// the field `None`. `dependencies` declares what `construct` will look for
/// so startup can order providers and verify the graph.
pub trait Injectable: Send + Sync + Sized + 'static {
    fn construct(container: &Container) -> Self;

    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }
}

/// A type that exposes HTTP routes through a blueprint.
pub trait Controller: Send + Sync + 'static {
    fn blueprint() -> ControllerBlueprint<Self>
    where
        Self: Sized;
}

/// Creates an instance for the container, type-erased.
pub type ControllerFactory = fn(&Container) -> Arc<dyn Any + Send + Sync>;

/// Registration record produced by [`provider`], consumed by
/// [`Container::install`](crate::container::Container::install).
pub struct ProviderRegistration {
    pub target: TargetId,
    pub dependencies: Vec<Dependency>,
    pub register_fn: fn(&Container),
}

/// Registration record produced by [`controller`], consumed by the route
/// registrar.
pub struct ControllerRegistration {
    pub target: TargetId,
    pub dependencies: Vec<Dependency>,
    pub blueprint_fn: fn() -> BlueprintData,
    pub factory: ControllerFactory,
}

/// Describes a provider for registration. Construction is deferred until
/// `install` runs, so listing order does not matter.
pub fn provider<P: Injectable>() -> ProviderRegistration {
    ProviderRegistration {
        target: TargetId::of::<P>(),
        dependencies: P::dependencies(),
        register_fn: |container| {
            container.register_if_missing(P::construct(container));
        },
    }
}

/// Describes a controller for registration. The instance itself is created
/// on first use, through the container, so controllers share the provider
/// singletons.
pub fn controller<C: Controller + Injectable>() -> ControllerRegistration {
    ControllerRegistration {
        target: TargetId::of::<C>(),
        dependencies: C::dependencies(),
        blueprint_fn: || C::blueprint().into_data(),
        factory: |container| Arc::new(C::construct(container)),
    }
}
