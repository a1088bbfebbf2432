use axum::{
    routing::{get, put},
    Router,
};

pub mod products;
pub mod system;

/// Router for the product endpoints.
pub fn router() -> Router {
    Router::new().route("/:product_id", put(products::update_product))
}

/// Service-level endpoints: banner, liveness and the API document.
pub fn system_router() -> Router {
    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/api-docs/openapi.json", get(system::openapi_json))
}
