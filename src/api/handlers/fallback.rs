//! Responses for unmatched routes and methods.

use crate::error::AppError;

pub async fn not_found_handler() -> AppError {
    AppError::not_found("not found")
}

pub async fn method_not_allowed_handler() -> AppError {
    AppError::MethodNotAllowed
}
