use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use jsonwebtoken::{encode, Header};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{api, db};

use super::{AuthClaims, SharedAppState};

#[derive(Deserialize)]
pub(super) struct AuthInput {
    login: String,
    password: String,
}

pub(super) async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let user = state
        .db_client
        .get_user_by_login(&login)
        .await?
        .filter(|u| u.password_hash.verify(&password))
        .ok_or(E::WrongLoginOrPassword)?;
    if !user.is_active() {
        return Err(E::UserInactive);
    }

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    let token = encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)?;

    tracing::info!(login = %user.login, "user logged in");
    Ok(token)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    UserInactive,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::UserInactive | Self::WrongLoginOrPassword => {
                StatusCode::FORBIDDEN
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterInput {
    login: String,
    password: String,
    name: String,
    email: String,
    role: api::user::Role,
    agency: Option<String>,
    phone: Option<String>,
    specialization: Option<String>,
}

pub(super) async fn register(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<RegisterInput>,
) -> Result<Json<api::User>, RegisterError> {
    use RegisterError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    if !my.role.is_administrator() {
        return Err(E::Forbidden);
    }

    let login = input.login.trim();
    let email = input.email.trim();
    if login.is_empty() || input.password.is_empty() || email.is_empty() {
        return Err(E::MissingField);
    }
    if state
        .db_client
        .is_login_or_email_taken(Some(login), Some(email), None)
        .await?
    {
        return Err(E::LoginOrEmailTaken);
    }

    let user = db::User {
        id: db::user::Id::new(),
        name: input.name,
        role: input.role,
        login: login.to_owned(),
        password_hash: db::user::PasswordHash::new(&input.password)
            .map_err(|_| E::PasswordHashing)?,
        email: email.to_owned(),
        agency: input.agency,
        phone: input.phone,
        status: db::user::Status::Active,
        specialization: input.specialization,
    };
    state.db_client.write_user(&user).await?;

    tracing::info!(login = %user.login, role = %user.role, "user registered");
    Ok(Json(api::User::from(&user)))
}

#[derive(Debug, From)]
pub enum RegisterError {
    #[from]
    DbError(db::Error),
    Forbidden,
    LoginOrEmailTaken,
    MissingField,
    PasswordHashing,
    Unauthorized,
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        match self {
            Self::LoginOrEmailTaken | Self::MissingField => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::DbError(_) | Self::PasswordHashing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

pub(super) async fn me(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, MeError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(MeError::Unauthorized)?;

    Ok(Json(api::User::from(&my)))
}

#[derive(Debug, From)]
pub enum MeError {
    #[from]
    DbError(db::Error),
    Unauthorized,
}

impl IntoResponse for MeError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
        .into_response()
    }
}

pub(super) async fn roles(_: AuthClaims) -> Json<Vec<api::user::RoleInfo>> {
    Json(
        api::user::Role::ALL
            .into_iter()
            .map(api::user::RoleInfo::from)
            .collect(),
    )
}
