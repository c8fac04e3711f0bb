use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{Error, Row, Transaction};

use super::{int2_enum, ticket, user, uuid_id, Client};

/// An entry in a user's inbox.
#[derive(Clone, Debug)]
pub struct Notification {
    pub id: Id,
    pub user: user::Id,
    pub kind: Kind,
    pub ticket: Option<ticket::Id>,
    pub message: String,
    pub read: bool,
    pub created_at: OffsetDateTime,
    pub read_at: Option<OffsetDateTime>,
}

uuid_id!(Id);

impl Notification {
    pub fn new(
        user: user::Id,
        kind: Kind,
        ticket: Option<ticket::Id>,
        message: String,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Id::new(),
            user,
            kind,
            ticket,
            message,
            read: false,
            created_at,
            read_at: None,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Kind {
    /// Sent to triage agents.
    NouveauTicket = 1,
    Assignation = 2,
    /// Sent to the creator once a technician is on their ticket.
    TicketAssigne = 3,
    Reassignation = 4,
    Escalade = 5,
    Resolution = 6,
    TicketCloture = 7,
    RejetResolution = 8,
    #[serde(rename = "RAPPEL_VALIDATION_1")]
    RappelValidation1 = 9,
    #[serde(rename = "RAPPEL_VALIDATION_2")]
    RappelValidation2 = 10,
    #[serde(rename = "RAPPEL_VALIDATION_3")]
    RappelValidation3 = 11,
    ClotureAutomatique = 12,
}

int2_enum!(Kind, "notification type");

fn from_row(row: &Row) -> Notification {
    Notification {
        id: row.get("id"),
        user: row.get("user_id"),
        kind: row.get("kind"),
        ticket: row.get("ticket_id"),
        message: row.get("message"),
        read: row.get("read"),
        created_at: row.get("created_at"),
        read_at: row.get("read_at"),
    }
}

impl Client {
    /// Newest first.
    pub async fn get_notifications(
        &self,
        user: user::Id,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        const SQL: &str = "\
            SELECT id, user_id, kind, ticket_id, message, read, \
                   created_at, read_at \
            FROM notifications \
            WHERE user_id = $1 AND (NOT $2 OR NOT read) \
            ORDER BY created_at DESC, id DESC \
            LIMIT $3";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&user, &unread_only, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn count_unread_notifications(
        &self,
        user: user::Id,
    ) -> Result<usize, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM notifications \
            WHERE user_id = $1 AND NOT read";
        let count: i64 =
            self.0.lock().await.query_one(SQL, &[&user]).await?.get(0);
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Returns `false` when the notification does not exist or belongs to
    /// someone else.
    pub async fn mark_notification_read(
        &self,
        id: Id,
        user: user::Id,
        now: OffsetDateTime,
    ) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE notifications \
            SET read = TRUE, read_at = COALESCE(read_at, $3) \
            WHERE id = $1 AND user_id = $2";
        Ok(self
            .0
            .lock()
            .await
            .execute(SQL, &[&id, &user, &now])
            .await?
            > 0)
    }

    pub async fn mark_all_notifications_read(
        &self,
        user: user::Id,
        now: OffsetDateTime,
    ) -> Result<usize, Error> {
        const SQL: &str = "\
            UPDATE notifications \
            SET read = TRUE, read_at = $2 \
            WHERE user_id = $1 AND NOT read";
        let updated = self.0.lock().await.execute(SQL, &[&user, &now]).await?;
        Ok(usize::try_from(updated).unwrap_or_default())
    }

    /// Which of `kinds` the user was already sent about the ticket.
    pub async fn get_notification_kinds(
        &self,
        ticket: ticket::Id,
        user: user::Id,
        kinds: &[Kind],
    ) -> Result<Vec<Kind>, Error> {
        const SQL: &str = "\
            SELECT DISTINCT kind FROM notifications \
            WHERE ticket_id = $1 AND user_id = $2 AND kind = ANY($3)";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&ticket, &user, &kinds])
            .await?
            .iter()
            .map(|row| row.get("kind"))
            .collect())
    }
}

pub(super) async fn insert(
    tx: &Transaction<'_>,
    notification: &Notification,
) -> Result<(), Error> {
    const SQL: &str = "\
        INSERT INTO notifications (id, user_id, kind, ticket_id, message, \
                                   read, created_at, read_at) \
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";
    tx.execute(
        SQL,
        &[
            &notification.id,
            &notification.user,
            &notification.kind,
            &notification.ticket,
            &notification.message,
            &notification.read,
            &notification.created_at,
            &notification.read_at,
        ],
    )
    .await
    .map(drop)
}
