use axum::{http::StatusCode, Json};

pub async fn root() -> &'static str {
    "Update Product Service Running"
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::app::openapi::openapi())
}
