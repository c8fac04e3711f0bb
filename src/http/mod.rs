//! REST endpoints.

mod auth;
mod notification;
mod settings;
mod ticket;
mod user;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::request,
    routing::{get, patch, post},
    RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{api, db, mail::Mailer};

pub use self::auth::AuthError;

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub db_client: db::Client,

    pub mailer: Mailer,

    pub jwt_expiration_time: Duration,

    pub jwt_decoding_key: DecodingKey,

    pub jwt_encoding_key: EncodingKey,
}

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/auth", post(auth::auth))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/roles", get(auth::roles))
        .route("/tickets", get(ticket::list_tickets).post(ticket::add_ticket))
        .route("/tickets/me", get(ticket::list_my_tickets))
        .route("/tickets/assigned", get(ticket::list_assigned_tickets))
        .route(
            "/tickets/:id",
            get(ticket::get_ticket).patch(ticket::edit_ticket),
        )
        .route("/tickets/:id/history", get(ticket::get_history))
        .route(
            "/tickets/:id/comments",
            get(ticket::get_comments).post(ticket::add_comment),
        )
        .route("/users", get(user::list_users))
        .route("/users/technicians", get(user::list_technicians))
        .route(
            "/users/:id",
            get(user::get_user)
                .put(user::edit_user)
                .delete(user::delete_user),
        )
        .route("/users/:id/reset-password", post(user::reset_password))
        .route("/notifications", get(notification::list_notifications))
        .route(
            "/notifications/unread/count",
            get(notification::count_unread),
        )
        .route("/notifications/read-all", patch(notification::mark_all_read))
        .route("/notifications/:id/read", patch(notification::mark_read))
        .route(
            "/settings/email",
            get(settings::get_email).put(settings::edit_email),
        )
        .route("/settings/email/test", post(settings::test_email))
        .with_state(state)
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
}

impl AuthClaims {
    /// The user the token was issued to, unless they are gone or
    /// deactivated since.
    async fn user(
        &self,
        db_client: &db::Client,
    ) -> Result<Option<db::User>, db::Error> {
        Ok(db_client
            .get_user_by_id(self.user_id)
            .await?
            .filter(db::User::is_active))
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}

/// Paging shared by the listings.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
struct Page {
    offset: usize,
    limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}
