use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use serde::Deserialize;

use crate::{api, db, mail};

use super::{AuthClaims, SharedAppState};

async fn administrator(
    state: &SharedAppState,
    auth_claims: AuthClaims,
) -> Result<db::User, SettingsError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(SettingsError::Unauthorized)?;
    if !my.role.is_administrator() {
        return Err(SettingsError::Forbidden);
    }
    Ok(my)
}

pub(super) async fn get_email(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::settings::Email>, SettingsError> {
    administrator(&state, auth_claims).await?;
    let settings = state.mailer.settings().await;

    Ok(Json(api::settings::Email::from(&settings)))
}

/// Applies to every email sent from now on. Not persisted across restarts.
pub(super) async fn edit_email(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(update): Json<api::settings::EmailUpdate>,
) -> Result<Json<api::settings::Email>, SettingsError> {
    let my = administrator(&state, auth_claims).await?;

    let mut settings = state.mailer.settings().await;
    update.apply(&mut settings);
    state.mailer.update(settings.clone()).await;

    tracing::info!(
        by = %my.login,
        server = %settings.server,
        enabled = settings.enabled,
        "email settings updated",
    );
    Ok(Json(api::settings::Email::from(&settings)))
}

#[derive(Deserialize)]
pub(super) struct TestEmailInput {
    to: String,
}

pub(super) async fn test_email(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(TestEmailInput { to }): Json<TestEmailInput>,
) -> Result<StatusCode, SettingsError> {
    use SettingsError as E;

    administrator(&state, auth_claims).await?;
    let email = mail::Email::test(&to).ok_or(E::RecipientRequired)?;
    state.mailer.send(&email).await.map_err(|e| {
        tracing::warn!(to = %to, "test email failed: {e}");
        E::Mail(e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum SettingsError {
    #[from]
    DbError(db::Error),
    Forbidden,
    Mail(mail::Error),
    RecipientRequired,
    Unauthorized,
}

impl IntoResponse for SettingsError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Self::Mail(mail::Error::Disabled) | Self::RecipientRequired => {
                StatusCode::BAD_REQUEST.into_response()
            }
            Self::Mail(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                    .into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::DbError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
