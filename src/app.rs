//! Route and middleware assembly.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::health;
use crate::middleware::{Cors, Timeout};
use crate::ollama::{self, ChatModel};
use crate::request::Request;
use crate::response::{Json, Response};
use crate::router::{RouteInfo, Router};

const WELCOME_PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head><title>Welcome</title></head>\n\
<body><h1>Welcome to the Kubert Agent service!</h1></body>\n\
</html>\n";

/// Builds the gateway: its routes, then CORS, then the request timeout.
pub fn create_app(settings: &Settings, model: Arc<dyn ChatModel>) -> Router {
    let router = Router::new()
        .get("/healthcheck", health::healthcheck)
        .get("/", root)
        .get("/endpoints/", endpoints);

    ollama::mount(router, model)
        .layer(Cors::permissive())
        .layer(Timeout::new(settings.request_timeout))
}

pub async fn root(_req: Request) -> Response {
    Response::html(WELCOME_PAGE)
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub endpoints: Vec<RouteInfo>,
}

/// Lists every route registered on the router.
pub async fn endpoints(req: Request) -> Json<Endpoints> {
    Json(Endpoints { endpoints: req.routes().to_vec() })
}
