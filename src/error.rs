use thiserror::Error;

/// Domain outcome taxonomy, fixed across every endpoint.
///
/// Storage errors are converted at the operation boundary: a unique-constraint
/// violation becomes `Conflict`, anything else becomes `Server`. Validation
/// failures never reach storage.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("one or more params missed")]
    BadRequest,
    /// Missing, invalid or expired token, or a valid token whose user is not
    /// in the allow-list. The causes are indistinguishable to the caller.
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    /// Uniqueness violation on an association pair or a token key.
    #[error("already exists")]
    Conflict,
    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> u16 {
        match self {
            ApiError::BadRequest => 400,
            ApiError::Forbidden => 403,
            ApiError::NotFound => 404,
            ApiError::Conflict => 409,
            ApiError::Server(_) => 500,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return ApiError::Conflict;
            }
        }
        ApiError::Server(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(ApiError::BadRequest.code(), 400);
        assert_eq!(ApiError::Forbidden.code(), 403);
        assert_eq!(ApiError::NotFound.code(), 404);
        assert_eq!(ApiError::Conflict.code(), 409);
        assert_eq!(ApiError::Server(anyhow::anyhow!("boom")).code(), 500);
    }

    #[test]
    fn non_database_sqlx_error_maps_to_server() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), 500);
    }
}
