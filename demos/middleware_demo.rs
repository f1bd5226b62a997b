// Example demonstrating per-route middleware chains

use std::sync::Arc;

use async_trait::async_trait;
use gantry::prelude::*;
use gantry::{LogConfig, LogLevel, RequestLogMiddleware};
use serde_json::json;

// ========== Middleware ==========

/// Rejects requests without the expected bearer token.
struct BearerGuard {
    token: &'static str,
}

#[async_trait]
impl Middleware for BearerGuard {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let authorized = request
            .header("authorization")
            .map(|value| value == format!("Bearer {}", self.token))
            .unwrap_or(false);
        if !authorized {
            return Err(Error::Unauthorized("bearer token required".to_string()));
        }
        next.run(request).await
    }
}

/// Stamps responses so curl output shows the chain ran.
struct StampMiddleware;

#[async_trait]
impl Middleware for StampMiddleware {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let response = next.run(request).await?;
        Ok(response.with_header("x-served-by", "gantry"))
    }
}

// ========== Controllers ==========

struct VaultController;

impl Injectable for VaultController {
    fn construct(_container: &Container) -> Self {
        VaultController
    }
}

impl Controller for VaultController {
    fn blueprint() -> ControllerBlueprint<Self> {
        ControllerBlueprint::new()
            .path("vault")
            .get("/public", "public", |_c: Arc<Self>, _args: CallArgs| {
                async move { Ok(json!({ "open": true })) }
            })
            .middleware("public", StampMiddleware)
            .get("/secret", "secret", |_c: Arc<Self>, _args: CallArgs| {
                async move { Ok(json!({ "secret": "rosebud" })) }
            })
            .middleware("secret", RequestLogMiddleware)
            .middleware("secret", BearerGuard { token: "letmein" })
            .middleware("secret", StampMiddleware)
    }
}

// ========== Main Application ==========

#[tokio::main]
async fn main() {
    let _log_guard = LogConfig::new().level(LogLevel::Debug).init();

    println!("🏗️ Gantry Middleware Example");
    println!("=============================\n");

    println!("📚 Available routes:");
    println!("  GET /vault/public  - Open route, stamped response");
    println!("  GET /vault/secret  - Requires Authorization: Bearer letmein");

    println!("\n💡 Try:");
    println!("  curl -i http://localhost:3000/vault/public");
    println!("  curl -i http://localhost:3000/vault/secret");
    println!("  curl -i -H 'Authorization: Bearer letmein' http://localhost:3000/vault/secret");
    println!();

    Application::serve(AppConfig::new().controller::<VaultController>()).await;
}
