//! Handlers for `/messages` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/messages` | Body: [`NewMessageRequest`]; returns 201 + stored message |
//! | `GET`    | `/messages` | Query: [`FindMessagesParams`]; list values comma-separated |
//! | `GET`    | `/messages/{id}` | Single message, valid or not |
//! | `PATCH`  | `/messages/{id}` | Body: [`EditMessageRequest`]; returns `{ "old", "new" }` |
//! | `DELETE` | `/messages/{id}` | Invalidates; returns the invalidated message |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use narrativelog_core::{
  message::{EditedMessage, Message},
  query::FindMessagesParams,
  store::MessageStore,
  validation::{EditMessageRequest, NewMessageRequest},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /messages`: returns 201 + the stored [`Message`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  body: Result<Json<NewMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessageStore,
{
  let Json(body) = body?;
  let input = body.validate(&state.site_id)?;

  let message = state
    .store
    .insert(input)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Find ─────────────────────────────────────────────────────────────────────

/// `GET /messages[?message_text=...][&tags=a,b][&order_by=-date_added]...`
///
/// The whole query string is validated before the store is consulted.
pub async fn find<S>(
  State(state): State<AppState<S>>,
  params: Result<Query<FindMessagesParams>, QueryRejection>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: MessageStore,
{
  let Query(params) = params?;
  let query = params.validate()?;

  let messages = state
    .store
    .find(&query)
    .await
    .map_err(ApiError::from_store)?;
  tracing::debug!(matched = messages.len(), "find request served");
  Ok(Json(messages))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /messages/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  let Path(id) = id?;
  let message = state.store.get(id).await.map_err(ApiError::from_store)?;
  Ok(Json(message))
}

// ─── Edit ─────────────────────────────────────────────────────────────────────

/// `PATCH /messages/{id}`: supplied fields replace the old message's values
/// in a new message whose `parent_id` is `id`; the old one is invalidated.
pub async fn edit<S>(
  State(state): State<AppState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<EditMessageRequest>, JsonRejection>,
) -> Result<Json<EditedMessage>, ApiError>
where
  S: MessageStore,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let edit = body.validate(&state.site_id)?;

  let edited = state
    .store
    .edit(id, edit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(edited))
}

// ─── Invalidate ───────────────────────────────────────────────────────────────

/// `DELETE /messages/{id}`. Messages are never removed, only invalidated.
pub async fn invalidate<S>(
  State(state): State<AppState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
{
  let Path(id) = id?;
  let message = state
    .store
    .invalidate(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(message))
}
