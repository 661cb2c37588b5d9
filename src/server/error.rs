use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(Error::IndexNotReady | Error::EmptyCorpus) => StatusCode::SERVICE_UNAVAILABLE,
            Some(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(
                Error::DimensionMismatch { .. }
                | Error::OutOfRange { .. }
                | Error::Encoder { .. }
                | Error::ZeroVector,
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), format!("Something went wrong: {}", self.0)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(AppError::from(Error::IndexNotReady).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::from(Error::NotFound("a".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(Error::ZeroVector).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(Error::LockPoisoned).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
