use std::{collections::HashMap, error::Error as StdError};

use argon2::{
    password_hash::{
        self, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2,
};
use derive_more::Display;
use enum_utils::TryFromRepr;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};

use super::{int2_enum, ticket, uuid_id, Client};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
    pub login: String,
    pub password_hash: PasswordHash,
    pub email: String,
    pub agency: Option<String>,
    pub phone: Option<String>,
    pub status: Status,
    /// Technicians only: the kind of tickets they usually handle.
    pub specialization: Option<String>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

uuid_id!(Id);

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    TryFromRepr,
    PartialEq,
    Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Files tickets and validates their resolution.
    Utilisateur = 1,
    SecretaireDsi = 2,
    AdjointDsi = 3,
    /// Head of the IT department.
    Dsi = 4,
    /// Works on the tickets assigned to them.
    Technicien = 5,
    Admin = 6,
}

int2_enum!(Role, "role");

impl Role {
    pub const ALL: [Self; 6] = [
        Self::Utilisateur,
        Self::SecretaireDsi,
        Self::AdjointDsi,
        Self::Dsi,
        Self::Technicien,
        Self::Admin,
    ];

    /// Roles told about every new ticket so it gets triaged.
    pub const TRIAGE: [Self; 3] =
        [Self::SecretaireDsi, Self::AdjointDsi, Self::Dsi];

    /// Roles told when a ticket gets escalated.
    pub const ESCALATION: [Self; 2] = [Self::AdjointDsi, Self::Dsi];

    pub fn label(self) -> &'static str {
        match self {
            Self::Utilisateur => "Utilisateur",
            Self::SecretaireDsi => "Secrétaire DSI",
            Self::AdjointDsi => "Adjoint DSI",
            Self::Dsi => "DSI",
            Self::Technicien => "Technicien",
            Self::Admin => "Admin",
        }
    }

    /// Agents triage, assign and close tickets and see all of them.
    pub fn is_agent(self) -> bool {
        matches!(
            self,
            Self::SecretaireDsi | Self::AdjointDsi | Self::Dsi | Self::Admin
        )
    }

    pub fn can_escalate(self) -> bool {
        matches!(self, Self::AdjointDsi | Self::Dsi | Self::Admin)
    }

    /// Manages accounts and system settings.
    pub fn is_administrator(self) -> bool {
        matches!(self, Self::Dsi | Self::Admin)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    TryFromRepr,
    PartialEq,
    Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Active = 1,

    /// Can no longer log in. Users owning tickets are deactivated instead
    /// of deleted.
    Inactive = 2,
}

int2_enum!(Status, "user status");

/// PHC-formatted Argon2 hash of a password. The default one matches no
/// password.
#[derive(Clone, Debug, Default)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Result<Self, password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
    }

    pub fn verify(&self, secret: &str) -> bool {
        password_hash::PasswordHash::new(&self.0)
            .and_then(|hash| {
                Argon2::default().verify_password(secret.as_bytes(), &hash)
            })
            .is_ok()
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// A technician together with the number of tickets on their plate.
#[derive(Clone, Debug)]
pub struct Workload {
    pub technician: User,
    /// Tickets assigned or in progress.
    pub assigned: usize,
    pub in_progress: usize,
}

fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        login: row.get("login"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        email: row.get("email"),
        agency: row.get("agency"),
        phone: row.get("phone"),
        status: row.get("status"),
        specialization: row.get("specialization"),
    }
}

impl Client {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "\
            SELECT id, name, login, password_hash, role, email, \
                   agency, phone, status, specialization \
            FROM users \
            WHERE login = $1 \
            LIMIT 1";
        Ok(self
            .0
            .lock()
            .await
            .query_opt(SQL, &[&login])
            .await?
            .as_ref()
            .map(from_row))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "\
            SELECT id, name, login, password_hash, role, email, \
                   agency, phone, status, specialization \
            FROM users \
            WHERE id = $1 \
            LIMIT 1";
        Ok(self
            .0
            .lock()
            .await
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(from_row))
    }

    pub async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        const SQL: &str = "\
            SELECT id, name, login, password_hash, role, email, \
                   agency, phone, status, specialization \
            FROM users \
            WHERE id IN (SELECT unnest($1::UUID[])) \
            LIMIT $2";

        let limit = i64::try_from(ids.len()).unwrap_or(i64::MAX);

        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&ids, &limit])
            .await?
            .iter()
            .map(|row| {
                let user = from_row(row);
                (user.id, user)
            })
            .collect())
    }

    pub async fn get_users(&self) -> Result<Vec<User>, Error> {
        const SQL: &str = "\
            SELECT id, name, login, password_hash, role, email, \
                   agency, phone, status, specialization \
            FROM users \
            ORDER BY name, id";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_active_users_by_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<User>, Error> {
        const SQL: &str = "\
            SELECT id, name, login, password_hash, role, email, \
                   agency, phone, status, specialization \
            FROM users \
            WHERE role = ANY($1) AND status = $2 \
            ORDER BY name, id";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&roles, &Status::Active])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    /// Active technicians with their current ticket counts.
    pub async fn get_technicians_workload(
        &self,
    ) -> Result<Vec<Workload>, Error> {
        const SQL: &str = "\
            SELECT u.id, u.name, u.login, u.password_hash, u.role, u.email, \
                   u.agency, u.phone, u.status, u.specialization, \
                   COUNT(t.id) FILTER (WHERE t.status = ANY($3)) AS assigned, \
                   COUNT(t.id) FILTER (WHERE t.status = $4) AS in_progress \
            FROM users u \
            LEFT JOIN tickets t ON t.technician_id = u.id \
            WHERE u.role = $1 AND u.status = $2 \
            GROUP BY u.id \
            ORDER BY u.name, u.id";

        let open = [
            ticket::Status::AssigneTechnicien,
            ticket::Status::EnCours,
        ];

        Ok(self
            .0
            .lock()
            .await
            .query(
                SQL,
                &[
                    &Role::Technicien,
                    &Status::Active,
                    &&open[..],
                    &ticket::Status::EnCours,
                ],
            )
            .await?
            .iter()
            .map(|row| Workload {
                technician: from_row(row),
                assigned: usize::try_from(row.get::<_, i64>("assigned"))
                    .unwrap_or_default(),
                in_progress: usize::try_from(row.get::<_, i64>("in_progress"))
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Whether another user already uses this login or email.
    pub async fn is_login_or_email_taken(
        &self,
        login: Option<&str>,
        email: Option<&str>,
        except: Option<Id>,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            SELECT EXISTS ( \
                SELECT 1 FROM users \
                WHERE (login = $1 OR email = $2) \
                  AND ($3::UUID IS NULL OR id <> $3) \
            )";
        Ok(self
            .0
            .lock()
            .await
            .query_one(SQL, &[&login, &email, &except])
            .await?
            .get(0))
    }

    /// Whether tickets, history or comments point at the user.
    pub async fn is_user_referenced(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "\
            SELECT EXISTS ( \
                SELECT 1 FROM tickets \
                WHERE creator_id = $1 \
                   OR technician_id = $1 \
                   OR secretary_id = $1 \
            ) OR EXISTS ( \
                SELECT 1 FROM ticket_history WHERE user_id = $1 \
            ) OR EXISTS ( \
                SELECT 1 FROM comments WHERE user_id = $1 \
            )";
        Ok(self.0.lock().await.query_one(SQL, &[&id]).await?.get(0))
    }

    pub async fn write_user(&self, user: &User) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO users (id, name, login, password_hash, role, email, \
                               agency, phone, status, specialization) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                login = EXCLUDED.login, \
                password_hash = EXCLUDED.password_hash, \
                role = EXCLUDED.role, \
                email = EXCLUDED.email, \
                agency = EXCLUDED.agency, \
                phone = EXCLUDED.phone, \
                status = EXCLUDED.status, \
                specialization = EXCLUDED.specialization";

        self.0
            .lock()
            .await
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.name,
                    &user.login,
                    &user.password_hash,
                    &user.role,
                    &user.email,
                    &user.agency,
                    &user.phone,
                    &user.status,
                    &user.specialization,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn delete_user(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM users WHERE id = $1";
        Ok(self.0.lock().await.execute(SQL, &[&id]).await? > 0)
    }
}
