//! Taxonomy routes: `/forge/v1/categories` and `/forge/v1/tags`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use forge_core::content::{Taxonomy, TermInput, TermView};

use super::json_body;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/tags", get(list_tags).post(create_tag))
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<TermView>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub success: bool,
    pub category: TermView,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub success: bool,
    pub tags: Vec<TermView>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub success: bool,
    pub tag: TermView,
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoriesResponse>, AppError> {
    Ok(Json(CategoriesResponse {
        success: true,
        categories: state.content.list_terms(Taxonomy::Category).await?,
    }))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CategoryResponse>, AppError> {
    let input: TermInput = json_body(&body)?;
    Ok(Json(CategoryResponse {
        success: true,
        category: state.content.create_category(&input).await?,
    }))
}

async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<TagsResponse>, AppError> {
    Ok(Json(TagsResponse {
        success: true,
        tags: state.content.list_terms(Taxonomy::Tag).await?,
    }))
}

async fn create_tag(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TagResponse>, AppError> {
    let input: TermInput = json_body(&body)?;
    Ok(Json(TagResponse {
        success: true,
        tag: state.content.create_tag(&input).await?,
    }))
}
