use std::sync::Arc;

use gantry_core::application::{AppConfig, Application};
use gantry_core::config::RuntimeConfig;
use gantry_core::container::{Container, ResolvePolicy};
use gantry_core::error::Error;
use gantry_core::registry::MetadataRegistry;
use gantry_core::router::Router;
use gantry_core::traits::{Controller, Injectable};

use crate::test_client::TestClient;

/// A fully assembled application held in-process for tests: real registry,
/// real container, real dispatch, no listener.
pub struct TestApp {
    pub container: Container,
    pub registry: Arc<MetadataRegistry>,
    pub config: RuntimeConfig,
    router: Arc<Router>,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::new()
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(self.router.clone())
    }

    pub fn route_count(&self) -> usize {
        self.router.len()
    }
}

/// Builds a [`TestApp`] with the same surface as [`AppConfig`].
#[derive(Default)]
pub struct TestAppBuilder {
    config: AppConfig,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            // Tests should not depend on ambient GANTRY_* variables.
            config: AppConfig::new().runtime(RuntimeConfig::default()),
        }
    }

    pub fn controller<C: Controller + Injectable>(mut self) -> Self {
        self.config = self.config.controller::<C>();
        self
    }

    pub fn provider<P: Injectable>(mut self) -> Self {
        self.config = self.config.provider::<P>();
        self
    }

    pub fn resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.config = self.config.resolve_policy(policy);
        self
    }

    pub fn with_docs(mut self) -> Self {
        self.config = self.config.with_docs();
        self
    }

    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.config = self.config.runtime(runtime);
        self
    }

    pub fn build(self) -> Result<TestApp, Error> {
        let application = Application::new(self.config)?;
        let container = application.container.clone();
        let registry = application.registry.clone();
        let config = application.config.clone();
        Ok(TestApp {
            container,
            registry,
            config,
            router: application.into_router(),
        })
    }
}
