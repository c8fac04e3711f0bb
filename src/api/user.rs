use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::user::{Id, Role, Status};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub login: String,
    pub role: Role,
    pub email: String,
    pub agency: Option<String>,
    pub phone: Option<String>,
    pub status: Status,
    pub specialization: Option<String>,
}

impl From<&db::User> for User {
    fn from(user: &db::User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            login: user.login.clone(),
            role: user.role,
            email: user.email.clone(),
            agency: user.agency.clone(),
            phone: user.phone.clone(),
            status: user.status,
            specialization: user.specialization.clone(),
        }
    }
}

/// A technician with the tickets currently on their plate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    #[serde(flatten)]
    pub user: User,
    pub assigned_tickets: usize,
    pub in_progress_tickets: usize,
}

impl From<&db::user::Workload> for Technician {
    fn from(workload: &db::user::Workload) -> Self {
        Self {
            user: User::from(&workload.technician),
            assigned_tickets: workload.assigned,
            in_progress_tickets: workload.in_progress,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub role: Role,
    pub label: String,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            role,
            label: role.label().into(),
        }
    }
}

/// Returned once after a reset so an administrator can pass it on.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub user_id: Id,
    pub new_password: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Deletion {
    Deleted,
    /// The user is referenced by tickets and was deactivated instead.
    Deactivated,
}
