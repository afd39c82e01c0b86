//! Analysis of uploaded meal photos: normalization of raw vision results
//! and the persisted per-image analysis record.

mod dto;
pub mod handlers;
pub mod normalize;
pub mod repo;
pub mod services;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::router()
}
