// Example demonstrating a versioned CRUD API built from controller blueprints

use std::sync::{Arc, Mutex};

use gantry::prelude::*;
use gantry::{ApiInfo, LogConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ========== Domain Models ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    id: u32,
    name: String,
    price: f64,
}

// ========== Services (Injectable) ==========

/// In-memory product store. A real application would hold a connection pool.
struct ProductStore {
    products: Mutex<Vec<Product>>,
}

impl ProductStore {
    fn list(&self) -> Vec<Product> {
        self.products.lock().unwrap().clone()
    }

    fn find(&self, id: u32) -> Option<Product> {
        self.list().into_iter().find(|product| product.id == id)
    }

    fn create(&self, name: String, price: f64) -> Product {
        let mut products = self.products.lock().unwrap();
        let id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let product = Product { id, name, price };
        products.push(product.clone());
        product
    }

    fn remove(&self, id: u32) -> bool {
        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|product| product.id != id);
        products.len() != before
    }
}

impl Injectable for ProductStore {
    fn construct(_container: &Container) -> Self {
        Self {
            products: Mutex::new(vec![
                Product {
                    id: 1,
                    name: "Laptop".to_string(),
                    price: 999.99,
                },
                Product {
                    id: 2,
                    name: "Mouse".to_string(),
                    price: 29.99,
                },
            ]),
        }
    }
}

// ========== Controllers ==========

struct ProductsController {
    store: Option<Arc<ProductStore>>,
}

impl ProductsController {
    fn store(&self) -> Result<&ProductStore, Error> {
        self.store
            .as_deref()
            .ok_or_else(|| Error::Internal("product store not bound".to_string()))
    }
}

impl Injectable for ProductsController {
    fn construct(container: &Container) -> Self {
        Self {
            store: container.slot("ProductsController"),
        }
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<ProductStore>("store")]
    }
}

impl Controller for ProductsController {
    fn blueprint() -> ControllerBlueprint<Self> {
        ControllerBlueprint::new()
            .path("products")
            .version(1)
            .get("", "list", |c: Arc<Self>, _args: CallArgs| async move {
                Ok(json!(c.store()?.list()))
            })
            .get("/:id", "find", |c: Arc<Self>, args: CallArgs| async move {
                let id: u32 = args
                    .text(0)
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| Error::BadRequest("id must be a number".to_string()))?;
                match c.store()?.find(id) {
                    Some(product) => Ok(json!(product)),
                    None => Err(Error::status(404, format!("product {id} not found"))
                        .with_code("PRODUCT_NOT_FOUND")),
                }
            })
            .param("find", 0, "id")
            .post("", "create", |c: Arc<Self>, args: CallArgs| async move {
                let name = args
                    .json(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::BadRequest("name is required".to_string()))?
                    .to_string();
                let price = args.json(1).and_then(Value::as_f64).unwrap_or(0.0);
                let product = c.store()?.create(name, price);
                // statusCode in the payload drives the HTTP status.
                Ok(json!({ "statusCode": 201, "product": product }))
            })
            .body("create", 0, "name")
            .body("create", 1, "price")
            .delete("/:id", "remove", |c: Arc<Self>, args: CallArgs| async move {
                let id: u32 = args
                    .text(0)
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| Error::BadRequest("id must be a number".to_string()))?;
                if !c.store()?.remove(id) {
                    return Err(Error::status(404, format!("product {id} not found")));
                }
                if let Some(handle) = args.response(1) {
                    handle.set_status(204);
                }
                Ok(Value::Null)
            })
            .param("remove", 0, "id")
            .response("remove", 1)
    }
}

struct HealthController;

impl Injectable for HealthController {
    fn construct(_container: &Container) -> Self {
        HealthController
    }
}

impl Controller for HealthController {
    fn blueprint() -> ControllerBlueprint<Self> {
        ControllerBlueprint::new()
            .path("health")
            .get("", "check", |_c: Arc<Self>, _args: CallArgs| async move {
                Ok(json!({ "status": "healthy" }))
            })
    }
}

// ========== Main Application ==========

#[tokio::main]
async fn main() {
    let _log_guard = LogConfig::from_env().init();

    println!("🏗️ Gantry REST API Example");
    println!("===========================\n");

    println!("📚 Available routes:");
    println!("  GET    /health               - Health check");
    println!("  GET    /v1/products          - List all products");
    println!("  GET    /v1/products/:id      - Get product by ID");
    println!("  POST   /v1/products          - Create new product");
    println!("  DELETE /v1/products/:id      - Delete product");
    println!("  GET    /api-docs             - Generated OpenAPI document");

    println!("\n💡 Try:");
    println!("  curl http://localhost:3000/health");
    println!("  curl http://localhost:3000/v1/products");
    println!("  curl http://localhost:3000/v1/products/1");
    println!("  curl -X POST http://localhost:3000/v1/products \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"name\":\"Monitor\",\"price\":299.99}}'");
    println!();

    let config = AppConfig::new()
        .provider::<ProductStore>()
        .controller::<ProductsController>()
        .controller::<HealthController>()
        .with_docs()
        .docs_info(ApiInfo {
            title: "Products API".to_string(),
            version: "1.0.0".to_string(),
            description: Some("Demo catalog served by Gantry".to_string()),
        });

    Application::serve(config).await;
}
