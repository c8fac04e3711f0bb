use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db, lifecycle};

pub use crate::db::{
    comment::Kind as CommentKind,
    ticket::{Id, Kind, Priority, Status},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub number: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub priority: Priority,
    pub status: Status,
    pub creator: api::User,
    pub technician: Option<api::User>,
    pub secretary_id: Option<api::user::Id>,
    pub user_agency: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub auto_closed_at: Option<OffsetDateTime>,
    /// End of the grace period after an automatic closure.
    #[serde(with = "time::serde::rfc3339::option")]
    pub reopenable_until: Option<OffsetDateTime>,
    pub feedback_score: Option<i16>,
    pub feedback_comment: Option<String>,
}

impl Ticket {
    pub fn new(
        ticket: db::Ticket,
        creator: api::User,
        technician: Option<api::User>,
    ) -> Self {
        let reopenable_until = lifecycle::reopenable_until(&ticket);
        Self {
            id: ticket.id,
            number: ticket.number,
            title: ticket.title,
            description: ticket.description,
            kind: ticket.kind,
            priority: ticket.priority,
            status: ticket.status,
            creator,
            technician,
            secretary_id: ticket.secretary,
            user_agency: ticket.user_agency,
            created_at: ticket.created_at,
            assigned_at: ticket.assigned_at,
            resolved_at: ticket.resolved_at,
            closed_at: ticket.closed_at,
            auto_closed_at: ticket.auto_closed_at,
            reopenable_until,
            feedback_score: ticket.feedback_score,
            feedback_comment: ticket.feedback_comment,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub tickets: Vec<Ticket>,
    pub total_count: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub id: db::history::Id,
    pub ticket_id: Id,
    pub old_status: Option<Status>,
    pub new_status: Status,
    pub user_id: api::user::Id,
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
}

impl From<db::History> for History {
    fn from(history: db::History) -> Self {
        Self {
            id: history.id,
            ticket_id: history.ticket,
            old_status: history.old_status,
            new_status: history.new_status,
            user_id: history.user,
            reason: history.reason,
            changed_at: history.changed_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: db::comment::Id,
    pub ticket_id: Id,
    pub user_id: api::user::Id,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: CommentKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<db::Comment> for Comment {
    fn from(comment: db::Comment) -> Self {
        Self {
            id: comment.id,
            ticket_id: comment.ticket,
            user_id: comment.user,
            content: comment.content,
            kind: comment.kind,
            created_at: comment.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::db::user;

    #[test]
    fn exposes_reopen_deadline_of_auto_closed_tickets() {
        let creator = db::User {
            id: user::Id::new(),
            name: "Alice".into(),
            role: user::Role::Utilisateur,
            login: "alice".into(),
            password_hash: user::PasswordHash::default(),
            email: "alice@example.com".into(),
            agency: None,
            phone: None,
            status: user::Status::Active,
            specialization: None,
        };
        let closed_at = datetime!(2024-03-15 09:00 UTC);
        let ticket = db::Ticket {
            id: Id::new(),
            number: 3,
            title: "Souris".into(),
            description: "Ne répond plus".into(),
            kind: Kind::Materiel,
            priority: Priority::Faible,
            status: Status::Cloture,
            creator: creator.id,
            technician: None,
            secretary: None,
            user_agency: None,
            created_at: closed_at - Duration::days(20),
            assigned_at: None,
            resolved_at: Some(closed_at - Duration::days(14)),
            closed_at: Some(closed_at),
            auto_closed_at: Some(closed_at),
            feedback_score: None,
            feedback_comment: None,
        };

        let json = serde_json::to_value(Ticket::new(
            ticket,
            api::User::from(&creator),
            None,
        ))
        .unwrap();

        assert_eq!(json["type"], "MATERIEL");
        assert_eq!(json["status"], "CLOTURE");
        assert_eq!(json["autoClosedAt"], "2024-03-15T09:00:00Z");
        assert_eq!(json["reopenableUntil"], "2024-03-22T09:00:00Z");
        assert_eq!(json["creator"]["role"], "UTILISATEUR");
        assert!(json["technician"].is_null());
    }
}
