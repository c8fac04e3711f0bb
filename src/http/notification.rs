use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{api, db};

use super::{AuthClaims, SharedAppState};

#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct ListNotificationsInput {
    unread_only: bool,
    limit: usize,
}

impl Default for ListNotificationsInput {
    fn default() -> Self {
        Self {
            unread_only: false,
            limit: 50,
        }
    }
}

pub(super) async fn list_notifications(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(ListNotificationsInput { unread_only, limit }): Query<
        ListNotificationsInput,
    >,
) -> Result<Json<Vec<api::Notification>>, NotificationError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(NotificationError::Unauthorized)?;
    let notifications = state
        .db_client
        .get_notifications(my.id, unread_only, limit)
        .await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(api::Notification::from)
            .collect(),
    ))
}

pub(super) async fn count_unread(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::notification::UnreadCount>, NotificationError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(NotificationError::Unauthorized)?;
    let unread_count =
        state.db_client.count_unread_notifications(my.id).await?;

    Ok(Json(api::notification::UnreadCount { unread_count }))
}

pub(super) async fn mark_read(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::notification::Id>,
) -> Result<StatusCode, NotificationError> {
    use NotificationError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    if !state
        .db_client
        .mark_notification_read(id, my.id, OffsetDateTime::now_utc())
        .await?
    {
        return Err(E::NotificationNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn mark_all_read(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<StatusCode, NotificationError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(NotificationError::Unauthorized)?;
    let updated = state
        .db_client
        .mark_all_notifications_read(my.id, OffsetDateTime::now_utc())
        .await?;

    tracing::debug!(user = %my.login, updated, "notifications marked read");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum NotificationError {
    #[from]
    DbError(db::Error),
    NotificationNotFound,
    Unauthorized,
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        match self {
            Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}
