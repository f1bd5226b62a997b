//! Core of the gantry framework.
//!
//! Controllers declare routes and argument bindings through
//! [`ControllerBlueprint`]s; the descriptors land in a [`MetadataRegistry`],
//! the [`RouteRegistrar`] mounts them as dispatchable routes, and providers
//! are wired through the [`Container`]. [`Application`] ties it all to a
//! hyper server.

pub mod application;
pub mod binder;
pub mod blueprint;
pub mod config;
pub mod container;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod registrar;
pub mod registry;
pub mod router;
pub mod traits;

pub use application::{AppConfig, Application};
pub use binder::{ArgValue, CallArgs, ResponseHandle, build_arguments};
pub use blueprint::{
    BlueprintData, ControllerBlueprint, ErasedHandler, ParamDescriptor, ParamKind, RouteSpec,
};
pub use config::{EnvLoader, RuntimeConfig};
pub use container::{Container, Dependency, DependencyId, ResolvePolicy};
pub use error::{Error, ErrorBody};
pub use http::{HttpRequest, HttpResponse};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use middleware::{Middleware, MiddlewareChain, Next, RequestLogMiddleware};
pub use openapi::{ApiInfo, OpenApiDocument};
pub use registrar::RouteRegistrar;
pub use registry::{MetadataRegistry, TargetId, keys};
pub use router::{HandlerFn, Route, Router, match_path, parse_query_string};
pub use traits::{
    Controller, ControllerFactory, ControllerRegistration, HttpMethod, Injectable,
    ProviderRegistration, controller, provider,
};
