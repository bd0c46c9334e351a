//! Request extractors.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json<T>` whose rejections surface as [`AppError::RequestParse`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
