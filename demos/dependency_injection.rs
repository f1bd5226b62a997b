// Example demonstrating container-driven dependency injection

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gantry::LogConfig;
use gantry::prelude::*;
use serde_json::json;

// ========== Services (Injectable) ==========

/// Connection-less stand-in for a database layer.
struct Database {
    dsn: String,
}

impl Database {
    fn describe(&self) -> String {
        format!("connected to {}", self.dsn)
    }
}

impl Injectable for Database {
    fn construct(_container: &Container) -> Self {
        Self {
            dsn: "memory://reports".to_string(),
        }
    }
}

/// Depends on [`Database`]. Providers can be listed in any order; the
/// container installs them by their declared dependencies.
struct ReportService {
    database: Option<Arc<Database>>,
    generated: AtomicU64,
}

impl ReportService {
    fn generate(&self) -> serde_json::Value {
        let count = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        let source = self
            .database
            .as_ref()
            .map(|db| db.describe())
            .unwrap_or_else(|| "no database bound".to_string());
        json!({ "report": count, "source": source })
    }
}

impl Injectable for ReportService {
    fn construct(container: &Container) -> Self {
        Self {
            database: container.slot("ReportService"),
            generated: AtomicU64::new(0),
        }
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Database>("database")]
    }
}

// ========== Controllers ==========

struct ReportsController {
    reports: Option<Arc<ReportService>>,
}

impl Injectable for ReportsController {
    fn construct(container: &Container) -> Self {
        Self {
            reports: container.slot("ReportsController"),
        }
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<ReportService>("reports")]
    }
}

impl Controller for ReportsController {
    fn blueprint() -> ControllerBlueprint<Self> {
        ControllerBlueprint::new().path("reports").get(
            "",
            "generate",
            |c: Arc<Self>, _args: CallArgs| async move {
                match c.reports.as_ref() {
                    Some(reports) => Ok(reports.generate()),
                    None => Err(Error::Internal("report service not bound".to_string())),
                }
            },
        )
    }
}

// ========== Main Application ==========

#[tokio::main]
async fn main() {
    let _log_guard = LogConfig::from_env().init();

    println!("🏗️ Gantry Dependency Injection Example");
    println!("========================================\n");

    println!("Provider wiring:");
    println!("  1. Database       (no dependencies)");
    println!("  2. ReportService  (depends on Database)");
    println!("  3. ReportsController (depends on ReportService)\n");

    println!("💡 Try:");
    println!("  curl http://localhost:3000/reports");
    println!();

    // Providers are listed out of order on purpose; installation follows
    // the declared dependency graph, not the listing.
    let config = AppConfig::new()
        .provider::<ReportService>()
        .provider::<Database>()
        .controller::<ReportsController>()
        .resolve_policy(ResolvePolicy::Strict);

    let app = match Application::new(config) {
        Ok(app) => app,
        Err(error) => {
            eprintln!("❌ Could not assemble application: {error}");
            std::process::exit(error.exit_code());
        }
    };

    println!("✓ {} routes registered", app.router().len());
    if let Err(error) = app.listen(3000).await {
        eprintln!("❌ Server error: {error}");
    }
}
