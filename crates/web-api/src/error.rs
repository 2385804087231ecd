use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::{DomainError, RepositoryError};

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{field}: {reason}"),
            ),
            AppErr::Domain(DomainError::RoomAlreadyExists { .. }) => {
                ApiError::new(StatusCode::CONFLICT, "ROOM_EXISTS", "Room already exists.")
            }
            AppErr::Domain(DomainError::RoomNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found")
            }
            AppErr::Domain(DomainError::NotInRoom) => {
                ApiError::new(StatusCode::FORBIDDEN, "NOT_IN_ROOM", "connection is not in a room")
            }
            AppErr::Repository(RepositoryError::NotFound) => ApiError::not_found("requested resource not found"),
            AppErr::Repository(RepositoryError::Conflict) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
            }
            err @ (AppErr::Repository(RepositoryError::Storage { .. })
            | AppErr::StoreTimeout(_)
            | AppErr::Broadcast(_)
            | AppErr::ConnectionClosed) => {
                // 细节只进日志，不返回给客户端
                tracing::error!(error = %err, "request failed");
                ApiError::internal_server_error("Server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::BroadcastError;
    use domain::{DomainError, RepositoryError};
    use std::time::Duration;

    #[test]
    fn maps_application_errors_to_status() {
        let cases = [
            (
                ApplicationError::from(DomainError::invalid_argument("name", "cannot be empty")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApplicationError::from(DomainError::room_already_exists("lobby")),
                StatusCode::CONFLICT,
            ),
            (
                ApplicationError::from(RepositoryError::storage("down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApplicationError::StoreTimeout(Duration::from_secs(5)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApplicationError::from(DomainError::RoomNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ApplicationError::from(BroadcastError::Failed("hub gone".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(ApplicationError::from(RepositoryError::storage(
            "password authentication failed for user postgres",
        )));
        assert_eq!(err.body.message, "Server error");
    }
}
