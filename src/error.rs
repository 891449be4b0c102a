use axum::{
	response::{IntoResponse, Response},
	Json,
};
use hyper::StatusCode;
use log::error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
	#[error("{0}")]
	BadRequest(String),

	#[error("authentication required")]
	Unauthorized,

	#[error("{0}")]
	Forbidden(String),

	#[error("{0} not found")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	Unprocessable(String),

	#[error("payment gateway error: {0}")]
	Gateway(String),

	#[error("database error: {0}")]
	Database(#[from] tokio_postgres::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
			AppError::Unauthorized => StatusCode::UNAUTHORIZED,
			AppError::Forbidden(_) => StatusCode::FORBIDDEN,
			AppError::NotFound(_) => StatusCode::NOT_FOUND,
			AppError::Conflict(_) => StatusCode::CONFLICT,
			AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
			AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
			AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn not_found(what: impl Into<String>) -> Self {
		AppError::NotFound(what.into())
	}

	pub fn forbidden(msg: impl Into<String>) -> Self {
		AppError::Forbidden(msg.into())
	}
}

#[derive(serde::Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = match &self {
			AppError::Database(_) | AppError::Internal(_) => {
				error!("{self}");
				"internal server error".to_string()
			}
			AppError::Gateway(_) => {
				error!("{self}");
				self.to_string()
			}
			other => other.to_string(),
		};

		(status, Json(ErrorBody { error: message })).into_response()
	}
}

impl From<axum::extract::multipart::MultipartError> for AppError {
	fn from(err: axum::extract::multipart::MultipartError) -> Self {
		AppError::BadRequest(format!("invalid multipart body: {err}"))
	}
}

impl From<std::io::Error> for AppError {
	fn from(err: std::io::Error) -> Self {
		AppError::Internal(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conflict_maps_to_409() {
		let res = AppError::Conflict("taken".to_string()).into_response();
		assert_eq!(res.status(), StatusCode::CONFLICT);
	}

	#[test]
	fn not_found_maps_to_404() {
		let res = AppError::not_found("vehicle").into_response();
		assert_eq!(res.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn internal_errors_map_to_500() {
		let res = AppError::Internal("disk on fire".to_string()).into_response();
		assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn gateway_maps_to_502() {
		assert_eq!(AppError::Gateway("timeout".to_string()).status(), StatusCode::BAD_GATEWAY);
	}
}
