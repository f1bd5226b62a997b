// Gantry - controller blueprints, dependency injection and explicit route
// registration over hyper.
//
// This crate is a thin facade: everything lives in gantry-core. Applications
// describe controllers with builder blueprints, register providers in a typed
// container and hand both to an Application that mounts the routes.

// Re-export core functionality
pub use gantry_core::*;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppConfig,
        Application,
        CallArgs,
        Container,
        Controller,
        ControllerBlueprint,
        Dependency,
        Error,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        Injectable,
        Middleware,
        Next,
        ResolvePolicy,
        ResponseHandle,
        Route,
        Router,
        controller,
        provider,
    };
}
