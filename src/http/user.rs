use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng as _};
use serde::Deserialize;

use crate::{api, db};

use super::{AuthClaims, SharedAppState};

const GENERATED_PASSWORD_LEN: usize = 12;

#[derive(Debug, From)]
pub enum UserError {
    CannotDeleteSelf,
    #[from]
    DbError(db::Error),
    EmailTaken,
    Forbidden,
    PasswordHashing,
    Unauthorized,
    UserNotFound,
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        match self {
            Self::CannotDeleteSelf | Self::EmailTaken => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::PasswordHashing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

/// The caller, provided they manage accounts.
async fn administrator(
    state: &SharedAppState,
    auth_claims: AuthClaims,
) -> Result<db::User, UserError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(UserError::Unauthorized)?;
    if !my.role.is_administrator() {
        return Err(UserError::Forbidden);
    }
    Ok(my)
}

async fn existing_user(
    state: &SharedAppState,
    id: api::user::Id,
) -> Result<db::User, UserError> {
    state
        .db_client
        .get_user_by_id(id)
        .await?
        .ok_or(UserError::UserNotFound)
}

pub(super) async fn list_users(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::User>>, UserError> {
    administrator(&state, auth_claims).await?;
    let users = state.db_client.get_users().await?;

    Ok(Json(users.iter().map(api::User::from).collect()))
}

pub(super) async fn list_technicians(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::user::Technician>>, UserError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(UserError::Unauthorized)?;
    if !my.role.is_agent() {
        return Err(UserError::Forbidden);
    }
    let workloads = state.db_client.get_technicians_workload().await?;

    Ok(Json(
        workloads.iter().map(api::user::Technician::from).collect(),
    ))
}

pub(super) async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::user::Id>,
) -> Result<Json<api::User>, UserError> {
    administrator(&state, auth_claims).await?;
    let user = existing_user(&state, id).await?;

    Ok(Json(api::User::from(&user)))
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct EditUserInput {
    name: Option<String>,
    email: Option<String>,
    role: Option<api::user::Role>,
    agency: Option<String>,
    phone: Option<String>,
    status: Option<api::user::Status>,
    specialization: Option<String>,
}

pub(super) async fn edit_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::user::Id>,
    Json(input): Json<EditUserInput>,
) -> Result<Json<api::User>, UserError> {
    use UserError as E;

    administrator(&state, auth_claims).await?;
    let mut user = existing_user(&state, id).await?;

    if let Some(email) = input.email {
        let email = email.trim().to_owned();
        if email != user.email
            && state
                .db_client
                .is_login_or_email_taken(None, Some(&email), Some(user.id))
                .await?
        {
            return Err(E::EmailTaken);
        }
        user.email = email;
    }
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    if let Some(agency) = input.agency {
        user.agency = Some(agency);
    }
    if let Some(phone) = input.phone {
        user.phone = Some(phone);
    }
    if let Some(status) = input.status {
        user.status = status;
    }
    if let Some(specialization) = input.specialization {
        user.specialization = Some(specialization);
    }
    state.db_client.write_user(&user).await?;

    tracing::info!(login = %user.login, "user updated");
    Ok(Json(api::User::from(&user)))
}

/// Users that tickets or their history point at are only deactivated.
pub(super) async fn delete_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::user::Id>,
) -> Result<Json<api::user::Deletion>, UserError> {
    use UserError as E;

    let my = administrator(&state, auth_claims).await?;
    if my.id == id {
        return Err(E::CannotDeleteSelf);
    }
    let mut user = existing_user(&state, id).await?;

    let deletion = if state.db_client.is_user_referenced(user.id).await? {
        user.status = db::user::Status::Inactive;
        state.db_client.write_user(&user).await?;
        api::user::Deletion::Deactivated
    } else if state.db_client.delete_user(user.id).await? {
        api::user::Deletion::Deleted
    } else {
        return Err(E::UserNotFound);
    };

    tracing::info!(login = %user.login, ?deletion, "user removed");
    Ok(Json(deletion))
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct ResetPasswordInput {
    new_password: Option<String>,
}

pub(super) async fn reset_password(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::user::Id>,
    Json(ResetPasswordInput { new_password }): Json<ResetPasswordInput>,
) -> Result<Json<api::user::PasswordReset>, UserError> {
    administrator(&state, auth_claims).await?;
    let mut user = existing_user(&state, id).await?;

    let new_password = new_password
        .filter(|p| !p.is_empty())
        .unwrap_or_else(generate_password);
    user.password_hash = db::user::PasswordHash::new(&new_password)
        .map_err(|_| UserError::PasswordHashing)?;
    state.db_client.write_user(&user).await?;

    tracing::info!(login = %user.login, "password reset");
    Ok(Json(api::user::PasswordReset {
        user_id: user.id,
        new_password,
    }))
}

fn generate_password() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_alphanumeric_passwords() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }
}
