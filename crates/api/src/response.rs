//! Success envelope shared by every JSON handler.
//!
//! Errors use the same `success` flag; see [`AppError`](crate::error::AppError).

use serde::Serialize;

/// `{ "success": true, "data": T }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
