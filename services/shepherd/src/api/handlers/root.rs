use axum::response::IntoResponse;

/// Service banner for `GET /`. Intentionally undocumented in the OpenAPI
/// spec.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    #[tokio::test]
    async fn banner_names_the_service() {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
