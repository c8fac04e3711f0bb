use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db};

pub use crate::db::notification::{Id, Kind};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Id,
    pub user_id: api::user::Id,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub ticket_id: Option<api::ticket::Id>,
    pub message: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

impl From<db::Notification> for Notification {
    fn from(notification: db::Notification) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user,
            kind: notification.kind,
            ticket_id: notification.ticket,
            message: notification.message,
            read: notification.read,
            created_at: notification.created_at,
            read_at: notification.read_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: usize,
}
