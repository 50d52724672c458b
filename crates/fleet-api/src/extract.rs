//! Request extractors
//!
//! Wrappers over axum's extractors whose rejections go through [`AppError`],
//! so malformed input always answers with the JSON error envelope.

use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body whose rejections render as `INVALID_JSON`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string whose rejections render as `INVALID_INPUT`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Path parameters whose rejections render as `INVALID_INPUT`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParams<T>(pub T);
