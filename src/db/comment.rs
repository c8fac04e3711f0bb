use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::Error;

use super::{int2_enum, ticket, user, uuid_id, Client};

#[derive(Clone, Debug)]
pub struct Comment {
    pub id: Id,
    pub ticket: ticket::Id,
    pub user: user::Id,
    pub content: String,
    pub kind: Kind,
    pub created_at: OffsetDateTime,
}

uuid_id!(Id);

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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Kind {
    /// Internal note between technicians and agents.
    Technique = 1,
    #[default]
    Utilisateur = 2,
}

int2_enum!(Kind, "comment type");

impl Client {
    pub async fn write_comment(&self, comment: &Comment) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO comments (id, ticket_id, user_id, content, kind, \
                                  created_at) \
            VALUES ($1, $2, $3, $4, $5, $6)";
        self.0
            .lock()
            .await
            .execute(
                SQL,
                &[
                    &comment.id,
                    &comment.ticket,
                    &comment.user,
                    &comment.content,
                    &comment.kind,
                    &comment.created_at,
                ],
            )
            .await
            .map(drop)
    }

    /// Oldest first.
    pub async fn get_comments(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<Comment>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, user_id, content, kind, created_at \
            FROM comments \
            WHERE ticket_id = $1 \
            ORDER BY created_at, id";
        Ok(self
            .0
            .lock()
            .await
            .query(SQL, &[&ticket])
            .await?
            .into_iter()
            .map(|row| Comment {
                id: row.get("id"),
                ticket: row.get("ticket_id"),
                user: row.get("user_id"),
                content: row.get("content"),
                kind: row.get("kind"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
