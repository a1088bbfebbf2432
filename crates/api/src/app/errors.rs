use axum::http::StatusCode;
use axum::response::IntoResponse;

use productsvc_infra::DispatchError;

use crate::app::dto::ErrorBody;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "Invalid update request", msg)
        }
        DispatchError::NotFound => {
            json_error(StatusCode::NOT_FOUND, "Product not found", "not_found")
        }
        DispatchError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Error updating product", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    message: &'static str,
    error: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(ErrorBody {
            message: message.to_string(),
            error: error.into(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use productsvc_infra::StoreError;

    #[test]
    fn statuses_follow_the_failure_kind() {
        let cases = [
            (DispatchError::Validation("name is required".into()), StatusCode::BAD_REQUEST),
            (DispatchError::NotFound, StatusCode::NOT_FOUND),
            (DispatchError::Store(StoreError::Timeout), StatusCode::INTERNAL_SERVER_ERROR),
            (
                DispatchError::Store(StoreError::Backend("throttled".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(dispatch_error_to_response(err).status(), status);
        }
    }
}
