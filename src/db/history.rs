use time::OffsetDateTime;
use tokio_postgres::{Error, Transaction};

use super::{ticket, user, uuid_id, Client};

/// One audit row per lifecycle step.
#[derive(Clone, Debug)]
pub struct History {
    pub id: Id,
    pub ticket: ticket::Id,
    /// Absent on the row written when the ticket is created.
    pub old_status: Option<ticket::Status>,
    pub new_status: ticket::Status,
    pub user: user::Id,
    pub reason: Option<String>,
    pub changed_at: OffsetDateTime,
}

uuid_id!(Id);

impl History {
    pub fn new(
        ticket: ticket::Id,
        old_status: Option<ticket::Status>,
        new_status: ticket::Status,
        user: user::Id,
        reason: Option<String>,
        changed_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Id::new(),
            ticket,
            old_status,
            new_status,
            user,
            reason,
            changed_at,
        }
    }
}

impl Client {
    /// Newest entries first.
    pub async fn get_history(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<History>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, old_status, new_status, user_id, reason, \
                   changed_at \
            FROM ticket_history \
            WHERE ticket_id = $1 \
            ORDER BY changed_at DESC, id DESC";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&ticket])
            .await?
            .into_iter()
            .map(|row| History {
                id: row.get("id"),
                ticket: row.get("ticket_id"),
                old_status: row.get("old_status"),
                new_status: row.get("new_status"),
                user: row.get("user_id"),
                reason: row.get("reason"),
                changed_at: row.get("changed_at"),
            })
            .collect())
    }
}

pub(super) async fn insert(
    tx: &Transaction<'_>,
    history: &History,
) -> Result<(), Error> {
    const SQL: &str = "\
        INSERT INTO ticket_history (id, ticket_id, old_status, new_status, \
                                    user_id, reason, changed_at) \
        VALUES ($1, $2, $3, $4, $5, $6, $7)";
    tx.execute(
        SQL,
        &[
            &history.id,
            &history.ticket,
            &history.old_status,
            &history.new_status,
            &history.user,
            &history.reason,
            &history.changed_at,
        ],
    )
    .await
    .map(drop)
}
