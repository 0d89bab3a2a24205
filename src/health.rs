//! Kubernetes health-check handler.
//!
//! A single probe at `/healthcheck`, used for both liveness and readiness.
//! It deliberately does not touch the model server: a slow or restarting
//! Ollama must not get the gateway pod killed.

use serde::Serialize;

use crate::{Json, Request};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Always `200 OK` with `{"status": "Healthy"}`.
pub async fn healthcheck(_req: Request) -> Json<Health> {
    Json(Health { status: "Healthy" })
}
