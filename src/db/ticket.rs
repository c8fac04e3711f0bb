use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{Error, Row, Transaction};

use super::{int2_enum, user, uuid_id, Client};

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub number: i64,
    pub title: String,
    pub description: String,
    pub kind: Kind,
    pub priority: Priority,
    pub status: Status,
    pub creator: user::Id,
    pub technician: Option<user::Id>,
    /// The agent who last assigned the ticket.
    pub secretary: Option<user::Id>,
    /// Creator's agency at the time the ticket was filed.
    pub user_agency: Option<String>,
    pub created_at: OffsetDateTime,
    pub assigned_at: Option<OffsetDateTime>,
    pub resolved_at: Option<OffsetDateTime>,
    pub closed_at: Option<OffsetDateTime>,
    /// Set when the scheduler closed the ticket instead of its creator.
    pub auto_closed_at: Option<OffsetDateTime>,
    pub feedback_score: Option<i16>,
    pub feedback_comment: Option<String>,
}

uuid_id!(Id);

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    TryFromRepr,
    PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Filed, waiting for an agent to pick a technician.
    EnAttenteAnalyse = 1,

    AssigneTechnicien = 2,

    EnCours = 3,

    /// The technician is done and the creator has to validate.
    Resolu = 4,

    Cloture = 5,

    /// The creator refused the resolution. An agent may reopen it.
    Rejete = 6,
}

int2_enum!(Status, "ticket status");

/// Ordered from the least to the most urgent.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Ord,
    TryFromRepr,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Priority {
    Faible = 1,
    Moyenne = 2,
    Haute = 3,
    Critique = 4,
}

int2_enum!(Priority, "ticket priority");

impl Priority {
    /// The next priority up, none past `Critique`.
    pub fn raised(self) -> Option<Self> {
        Self::try_from(self as u8 + 1).ok()
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Kind {
    Materiel = 1,
    Applicatif = 2,
}

int2_enum!(Kind, "ticket type");

/// Which tickets a listing covers.
#[derive(Clone, Copy, Debug)]
pub enum Filter {
    All,
    CreatedBy(user::Id),
    AssignedTo(user::Id),
}

impl Filter {
    fn params(self) -> (Option<user::Id>, Option<user::Id>) {
        match self {
            Self::All => (None, None),
            Self::CreatedBy(id) => (Some(id), None),
            Self::AssignedTo(id) => (None, Some(id)),
        }
    }
}

fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        number: row.get("number"),
        title: row.get("title"),
        description: row.get("description"),
        kind: row.get("kind"),
        priority: row.get("priority"),
        status: row.get("status"),
        creator: row.get("creator_id"),
        technician: row.get("technician_id"),
        secretary: row.get("secretary_id"),
        user_agency: row.get("user_agency"),
        created_at: row.get("created_at"),
        assigned_at: row.get("assigned_at"),
        resolved_at: row.get("resolved_at"),
        closed_at: row.get("closed_at"),
        auto_closed_at: row.get("auto_closed_at"),
        feedback_score: row.get("feedback_score"),
        feedback_comment: row.get("feedback_comment"),
    }
}

impl Client {
    pub async fn next_ticket_number(&self) -> Result<i64, Error> {
        const SQL: &str = "SELECT nextval('ticket_numbers')";
        Ok(self.0.lock().await.query_one(SQL, &[]).await?.get(0))
    }

    pub async fn get_ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, Error> {
        const SQL: &str = "\
            SELECT id, number, title, description, kind, priority, status, \
                   creator_id, technician_id, secretary_id, user_agency, \
                   created_at, assigned_at, resolved_at, closed_at, \
                   auto_closed_at, feedback_score, feedback_comment \
            FROM tickets \
            WHERE id = $1";
        Ok(self
            .0
            .lock()
            .await
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(from_row))
    }

    pub async fn get_tickets_page(
        &self,
        filter: Filter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let (creator, technician) = filter.params();

        const SQL: &str = "\
            SELECT id, number, title, description, kind, priority, status, \
                   creator_id, technician_id, secretary_id, user_agency, \
                   created_at, assigned_at, resolved_at, closed_at, \
                   auto_closed_at, feedback_score, feedback_comment \
            FROM tickets \
            WHERE ($1::UUID IS NULL OR creator_id = $1) \
              AND ($2::UUID IS NULL OR technician_id = $2) \
            ORDER BY created_at DESC, \
                     id DESC \
            OFFSET $3 LIMIT $4";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&creator, &technician, &offset, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    pub async fn get_tickets_count(&self, filter: Filter) -> Result<usize, Error> {
        let (creator, technician) = filter.params();

        const SQL: &str = "\
            SELECT COUNT(*) \
            FROM tickets \
            WHERE ($1::UUID IS NULL OR creator_id = $1) \
              AND ($2::UUID IS NULL OR technician_id = $2)";
        let count: i64 = self
            .0
            .lock()
            .await
            .query_one(SQL, &[&creator, &technician])
            .await?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Resolved tickets still waiting for their creator's validation,
    /// oldest resolution first.
    pub async fn get_unvalidated_tickets(&self) -> Result<Vec<Ticket>, Error> {
        const SQL: &str = "\
            SELECT id, number, title, description, kind, priority, status, \
                   creator_id, technician_id, secretary_id, user_agency, \
                   created_at, assigned_at, resolved_at, closed_at, \
                   auto_closed_at, feedback_score, feedback_comment \
            FROM tickets \
            WHERE status = $1 \
              AND resolved_at IS NOT NULL \
              AND closed_at IS NULL \
            ORDER BY resolved_at, id";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&Status::Resolu])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }
}

pub(super) async fn get_for_update(
    tx: &Transaction<'_>,
    id: Id,
) -> Result<Option<Ticket>, Error> {
    const SQL: &str = "\
        SELECT id, number, title, description, kind, priority, status, \
               creator_id, technician_id, secretary_id, user_agency, \
               created_at, assigned_at, resolved_at, closed_at, \
               auto_closed_at, feedback_score, feedback_comment \
        FROM tickets \
        WHERE id = $1 \
        FOR UPDATE";
    Ok(tx.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
}

pub(super) async fn insert(
    tx: &Transaction<'_>,
    ticket: &Ticket,
) -> Result<(), Error> {
    const SQL: &str = "\
        INSERT INTO tickets (id, number, title, description, kind, priority, \
                             status, creator_id, technician_id, secretary_id, \
                             user_agency, created_at, assigned_at, \
                             resolved_at, closed_at, auto_closed_at, \
                             feedback_score, feedback_comment) \
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
                $10, $11, $12, $13, $14, $15, $16, $17, $18)";

    tx.execute(
        SQL,
        &[
            &ticket.id,
            &ticket.number,
            &ticket.title,
            &ticket.description,
            &ticket.kind,
            &ticket.priority,
            &ticket.status,
            &ticket.creator,
            &ticket.technician,
            &ticket.secretary,
            &ticket.user_agency,
            &ticket.created_at,
            &ticket.assigned_at,
            &ticket.resolved_at,
            &ticket.closed_at,
            &ticket.auto_closed_at,
            &ticket.feedback_score,
            &ticket.feedback_comment,
        ],
    )
    .await
    .map(drop)
}

/// Writes back a ticket previously locked by [`get_for_update`].
pub(super) async fn update(
    tx: &Transaction<'_>,
    ticket: &Ticket,
) -> Result<(), Error> {
    const SQL: &str = "\
        UPDATE tickets \
        SET title = $2, \
            description = $3, \
            kind = $4, \
            priority = $5, \
            status = $6, \
            technician_id = $7, \
            secretary_id = $8, \
            assigned_at = $9, \
            resolved_at = $10, \
            closed_at = $11, \
            auto_closed_at = $12, \
            feedback_score = $13, \
            feedback_comment = $14 \
        WHERE id = $1";

    tx.execute(
        SQL,
        &[
            &ticket.id,
            &ticket.title,
            &ticket.description,
            &ticket.kind,
            &ticket.priority,
            &ticket.status,
            &ticket.technician,
            &ticket.secretary,
            &ticket.assigned_at,
            &ticket.resolved_at,
            &ticket.closed_at,
            &ticket.auto_closed_at,
            &ticket.feedback_score,
            &ticket.feedback_comment,
        ],
    )
    .await
    .map(drop)
}
