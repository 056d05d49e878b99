//! Route handlers for categories and subcategories.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    ApiResponse, AppState, Error, UserID,
    category::db::{
        Category, CategoryId, CategoryKind, Subcategory, SubcategoryId, create_category,
        create_subcategory, delete_category, delete_subcategory, get_categories,
        get_subcategories, update_category, update_subcategory,
    },
    db::lock_connection,
    extract::{JsonBody, QueryParams},
};

/// The state needed by the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The details needed to create a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryForm {
    /// The name of the category.
    pub name: String,
    /// Whether the category is for expenses or income.
    pub kind: CategoryKind,
}

/// A new name for a category or subcategory, or the name of a new subcategory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameForm {
    /// The name.
    pub name: String,
}

/// The query parameters for listing categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryQuery {
    /// Only list categories of this kind.
    pub kind: Option<CategoryKind>,
}

/// A route handler for creating a category, responds with 201 Created.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(form): JsonBody<CategoryForm>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let category = create_category(user_id, &form.name, form.kind, &connection)?;

    Ok((StatusCode::CREATED, ApiResponse::success(category)).into_response())
}

/// A route handler for listing the logged in user's categories.
pub async fn list_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    QueryParams(query): QueryParams<CategoryQuery>,
) -> Result<ApiResponse<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_categories(user_id, query.kind, &connection).map(ApiResponse::success)
}

/// A route handler for renaming a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
    JsonBody(form): JsonBody<NameForm>,
) -> Result<ApiResponse<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_category(category_id, user_id, &form.name, &connection).map(ApiResponse::success)
}

/// A route handler for deleting a category and its subcategories.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
) -> Result<ApiResponse<()>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    delete_category(category_id, user_id, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(()))
}

/// A route handler for creating a subcategory, responds with 201 Created.
pub async fn create_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
    JsonBody(form): JsonBody<NameForm>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let subcategory = create_subcategory(category_id, user_id, &form.name, &connection)?;

    Ok((StatusCode::CREATED, ApiResponse::success(subcategory)).into_response())
}

/// A route handler for listing the subcategories of a category.
pub async fn list_subcategories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
) -> Result<ApiResponse<Vec<Subcategory>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_subcategories(category_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for renaming a subcategory.
pub async fn update_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(subcategory_id): Path<SubcategoryId>,
    JsonBody(form): JsonBody<NameForm>,
) -> Result<ApiResponse<Subcategory>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_subcategory(subcategory_id, user_id, &form.name, &connection)
        .map(ApiResponse::success)
}

/// A route handler for deleting a subcategory.
pub async fn delete_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(subcategory_id): Path<SubcategoryId>,
) -> Result<ApiResponse<()>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_subcategory(subcategory_id, user_id, &connection).map(ApiResponse::success)
}
