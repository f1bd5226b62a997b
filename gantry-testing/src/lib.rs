//! Test utilities for gantry applications.
//!
//! [`TestApp`] assembles an application exactly as `Application::new` does
//! and exposes an in-process [`TestClient`], so controller and middleware
//! behavior is tested through real dispatch without opening a socket.

pub mod test_app;
pub mod test_client;

pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::blueprint::ControllerBlueprint;
    use gantry_core::container::Container;
    use gantry_core::traits::{Controller, Injectable};
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct PingController;

    impl Injectable for PingController {
        fn construct(_container: &Container) -> Self {
            PingController
        }
    }

    impl Controller for PingController {
        fn blueprint() -> ControllerBlueprint<Self> {
            ControllerBlueprint::new()
                .get("/ping", "ping", |_c: Arc<Self>, _args| async move {
                    Ok(json!({"pong": true}))
                })
                .post("/echo", "echo", |_c: Arc<Self>, args| async move {
                    Ok(args.json(0).cloned().unwrap_or(Value::Null))
                })
                .body("echo", 0, None)
        }
    }

    fn app() -> TestApp {
        TestApp::builder()
            .controller::<PingController>()
            .build()
            .unwrap()
    }

    #[test]
    fn test_client_round_trip() {
        tokio_test::block_on(async {
            let app = app();
            let response = app.client().get("/ping").await;
            response.assert_ok().assert_json_field("/pong", true);
        });
    }

    #[test]
    fn test_post_serializes_body() {
        tokio_test::block_on(async {
            let app = app();
            let response = app.client().post("/echo", &json!({"n": 5})).await;
            response.assert_ok();
            assert_eq!(response.value()["n"], 5);
        });
    }

    #[test]
    fn test_miss_renders_error_payload() {
        tokio_test::block_on(async {
            let app = app();
            let response = app.client().get("/nope").await;
            response.assert_status(404);
            let value = response.value();
            assert!(value["message"].as_str().unwrap().contains("/nope"));
        });
    }

    #[test]
    fn test_route_count() {
        assert_eq!(app().route_count(), 2);
    }
}
