use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::dto::{ErrorBody, UpdateProductRequest, UpdateProductResponse, UpdateResult};
use crate::app::errors;
use crate::app::services::AppServices;

/// Apply a partial update to an existing product and announce it.
///
/// Success depends only on the store write. The `ProductUpdated` event is
/// best-effort; if the broker is down the update still answers `200`.
#[utoipa::path(
    put,
    path = "/products/{productId}",
    tag = "products",
    params(("productId" = String, Path, description = "Product identifier")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = UpdateProductResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody),
        (status = 500, description = "Store error", body = ErrorBody),
    )
)]
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "Invalid update request",
                rejection.body_text(),
            );
        }
    };

    let outcome = match services.dispatcher().dispatch(body.into_command(product_id)).await {
        Ok(outcome) => outcome,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(UpdateProductResponse {
            message: "Product updated".to_string(),
            result: UpdateResult {
                attributes: outcome.updated,
            },
        }),
    )
        .into_response()
}
