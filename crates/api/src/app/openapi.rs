//! `OpenAPI` document for the product update service.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Update Product Service",
        description = "Partial product updates with ProductUpdated notifications"
    ),
    paths(crate::app::routes::products::update_product),
    components(schemas(
        crate::app::dto::UpdateProductRequest,
        crate::app::dto::UpdateProductResponse,
        crate::app::dto::UpdateResult,
        crate::app::dto::ErrorBody,
    )),
    tags((name = "products", description = "Product operations"))
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_update_route() {
        let doc = serde_json::to_value(openapi()).unwrap();
        assert!(doc["paths"]["/products/{productId}"]["put"].is_object());
        assert!(doc["components"]["schemas"]["UpdateProductRequest"].is_object());
    }
}
