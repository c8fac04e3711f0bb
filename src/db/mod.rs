/// Declares a UUID-backed identifier stored as a `UUID` column.
macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            ::serde::Deserialize,
            ::derive_more::Display,
            Eq,
            Hash,
            PartialEq,
            ::serde::Serialize,
        )]
        pub struct $name(::uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }
        }

        impl ::tokio_postgres::types::FromSql<'_> for $name {
            ::tokio_postgres::types::accepts!(UUID);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<
                Self,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                <::uuid::Uuid as ::tokio_postgres::types::FromSql>::from_sql(
                    ty, raw,
                )
                .map(Self)
            }
        }

        impl ::tokio_postgres::types::ToSql for $name {
            ::tokio_postgres::types::accepts!(UUID);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                ::tokio_postgres::types::ToSql::to_sql(&self.0, ty, out)
            }
        }
    };
}

/// Stores a `#[repr(u8)]` enum deriving `TryFromRepr` as an `INT2`
/// column.
macro_rules! int2_enum {
    ($name:ident, $what:literal) => {
        impl ::tokio_postgres::types::FromSql<'_> for $name {
            ::tokio_postgres::types::accepts!(INT2);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<
                Self,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                let repr =
                    <i16 as ::tokio_postgres::types::FromSql>::from_sql(
                        ty, raw,
                    )?;
                let repr = u8::try_from(repr)?;
                let value =
                    Self::try_from(repr).map_err(|_| concat!("invalid ", $what))?;
                Ok(value)
            }
        }

        impl ::tokio_postgres::types::ToSql for $name {
            ::tokio_postgres::types::accepts!(INT2);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                let repr = i16::from((*self) as u8);
                ::tokio_postgres::types::ToSql::to_sql(&repr, ty, out)
            }
        }
    };
}

pub(crate) use {int2_enum, uuid_id};

pub mod comment;
pub mod history;
pub mod notification;
pub mod ticket;
pub mod user;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

use crate::{config, lifecycle::Outcome};

pub use tokio_postgres::Error;

pub use self::{
    comment::Comment, history::History, notification::Notification,
    ticket::Ticket, user::User,
};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: config::Db,
) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| {
            (Client(Arc::new(Mutex::new(client))), connection)
        })
}

/// Shared handle to the database.
///
/// The connection is serialized behind a mutex so that a transaction can
/// borrow it exclusively.
#[derive(Clone)]
pub struct Client(Arc<Mutex<tokio_postgres::Client>>);

const MIGRATIONS: &[(i32, &str)] =
    &[(1, include_str!("migrations/001_initial.sql"))];

impl Client {
    /// Applies every migration newer than the recorded schema version.
    pub async fn migrate(&self) -> Result<(), Error> {
        let mut client = self.0.lock().await;

        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations ( \
                     version INT4 PRIMARY KEY, \
                     applied_at TIMESTAMPTZ NOT NULL DEFAULT now() \
                 )",
            )
            .await?;
        let current: i32 = client
            .query_one(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                &[],
            )
            .await?
            .get(0);

        for (version, sql) in MIGRATIONS {
            if *version <= current {
                continue;
            }
            let tx = client.transaction().await?;
            tx.batch_execute(sql).await?;
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES ($1)",
                &[version],
            )
            .await?;
            tx.commit().await?;
            tracing::info!(version, "applied migration");
        }

        Ok(())
    }

    /// Stores a newly filed ticket with its first history entry and
    /// notifications.
    pub async fn insert_ticket(
        &self,
        ticket: &Ticket,
        history: Option<&History>,
        notifications: &[Notification],
    ) -> Result<(), Error> {
        let mut client = self.0.lock().await;
        let tx = client.transaction().await?;

        ticket::insert(&tx, ticket).await?;
        if let Some(history) = history {
            history::insert(&tx, history).await?;
        }
        for notification in notifications {
            notification::insert(&tx, notification).await?;
        }

        tx.commit().await
    }

    /// Runs a lifecycle `step` against the ticket row locked with
    /// `FOR UPDATE`, then persists the ticket, its history entry and
    /// notifications in the same transaction.
    ///
    /// Concurrent steps on one ticket are serialized, so each sees the
    /// status the previous one committed. A failing step rolls everything
    /// back. Returns `None` when the ticket does not exist.
    pub async fn update_ticket<E>(
        &self,
        id: ticket::Id,
        step: impl FnOnce(&mut Ticket) -> Result<Outcome, E>,
    ) -> Result<Option<(Ticket, Outcome)>, E>
    where
        E: From<Error>,
    {
        let mut client = self.0.lock().await;
        let tx = client.transaction().await?;

        let Some(mut current) = ticket::get_for_update(&tx, id).await? else {
            return Ok(None);
        };
        let outcome = step(&mut current)?;

        ticket::update(&tx, &current).await?;
        if let Some(history) = &outcome.history {
            history::insert(&tx, history).await?;
        }
        for notification in &outcome.notifications {
            notification::insert(&tx, notification).await?;
        }

        tx.commit().await?;
        Ok(Some((current, outcome)))
    }
}
