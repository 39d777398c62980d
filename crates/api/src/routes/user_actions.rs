//! End-user actions on posts.

use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use harvest_core::error::ValidationErrorCode;
use harvest_core::limits::{DEFAULT_ACTION_PAGE_LIMIT, MAX_ACTION_PAGE_LIMIT};
use harvest_core::{ActionKey, ActionPage, ActionType, Error, NewUserAction, UserAction};
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use crate::response::{ActionListResponse, ApiError};
use crate::routes::posts::parse_id;
use crate::state::AppState;

/// Raw pagination for action listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn into_page(self) -> harvest_core::Result<ActionPage> {
        let bad = |name: &str, raw: &str| {
            Error::validation_code(
                ValidationErrorCode::InvalidPagination,
                format!(
                    "Invalid {} '{}'. Limit must be between 1 and {}, offset non-negative",
                    name, raw, MAX_ACTION_PAGE_LIMIT
                ),
            )
        };

        let offset = match self.offset.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u64>().map_err(|_| bad("offset", raw))?,
            None => 0,
        };
        let limit = match self.limit.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u32>().map_err(|_| bad("limit", raw))?,
            None => DEFAULT_ACTION_PAGE_LIMIT,
        };

        let page = ActionPage { offset, limit };
        page.check()?;
        Ok(page)
    }
}

/// Path of a single action.
#[derive(Debug, Deserialize)]
pub struct ActionPath {
    pub user_ref: String,
    pub post_id: String,
    pub action_type: String,
}

impl ActionPath {
    fn into_key(self) -> Result<ActionKey, ApiError> {
        Ok(ActionKey {
            post_id: parse_id(&self.post_id)?,
            action_type: ActionType::from_str(&self.action_type)?,
            user_ref: self.user_ref,
        })
    }
}

fn page_response(actions: Vec<UserAction>, page: ActionPage) -> Json<ActionListResponse> {
    Json(ActionListResponse {
        count: actions.len(),
        actions,
        offset: page.offset,
        limit: page.limit,
    })
}

/// POST /user-actions - Record an action; the same action again replaces it.
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewUserAction>, JsonRejection>,
) -> Result<(StatusCode, Json<UserAction>), ApiError> {
    let Json(new) = payload?;
    new.validate()?;

    let action = state.store.record_action(new).await?;
    info!(id = %action.id, post_id = %action.post_id, action = %action.action_type, "Action recorded");
    Ok((StatusCode::CREATED, Json(action)))
}

/// GET /user-actions/post/{post_id} - Actions on a post, newest first.
pub async fn post_actions_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ActionListResponse>, ApiError> {
    let post_id = parse_id(&post_id)?;
    let page = params.into_page()?;

    let actions = state.store.actions_for_post(post_id, page).await?;
    debug!(%post_id, count = actions.len(), "Listed post actions");
    Ok(page_response(actions, page))
}

/// GET /user-actions/user/{user_ref} - Actions by a user, newest first.
pub async fn user_actions_handler(
    State(state): State<AppState>,
    Path(user_ref): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ActionListResponse>, ApiError> {
    let page = params.into_page()?;

    let actions = state.store.actions_by_user(&user_ref, page).await?;
    debug!(%user_ref, count = actions.len(), "Listed user actions");
    Ok(page_response(actions, page))
}

/// GET /user-actions/user/{user_ref}/post/{post_id}/action/{action_type}
pub async fn get_handler(
    State(state): State<AppState>,
    Path(path): Path<ActionPath>,
) -> Result<Json<UserAction>, ApiError> {
    let key = path.into_key()?;
    state
        .store
        .find_action(&key)
        .await?
        .map(Json)
        .ok_or_else(|| action_not_found(&key))
}

/// DELETE /user-actions/user/{user_ref}/post/{post_id}/action/{action_type}
///
/// Returns the removed action.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(path): Path<ActionPath>,
) -> Result<Json<UserAction>, ApiError> {
    let key = path.into_key()?;
    let action = state
        .store
        .remove_action(&key)
        .await?
        .ok_or_else(|| action_not_found(&key))?;
    info!(id = %action.id, post_id = %action.post_id, action = %action.action_type, "Action removed");
    Ok(Json(action))
}

fn action_not_found(key: &ActionKey) -> ApiError {
    Error::not_found(format!(
        "{} action by '{}' on post {}",
        key.action_type, key.user_ref, key.post_id
    ))
    .into()
}
