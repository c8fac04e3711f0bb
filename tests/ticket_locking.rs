pub mod common;

use common::db::TransitionError;
use helpdesk::{
    db::{ticket::Status, user::Role},
    lifecycle,
};
use time::{Duration, OffsetDateTime};

#[tokio::test]
#[ignore = "requires a database"]
async fn stale_copy_cannot_overwrite_transition() {
    let client = common::db::connect().await;
    let creator = common::db::user(&client, Role::Utilisateur).await;
    let secretary = common::db::user(&client, Role::SecretaireDsi).await;
    let technician = common::db::user(&client, Role::Technicien).await;
    let now = OffsetDateTime::now_utc();
    let ticket = common::db::resolved_ticket(
        &client,
        &creator,
        &technician,
        now - Duration::days(1),
    )
    .await;

    // Both requests saw the ticket as resolved.
    let first = client.get_ticket_by_id(ticket.id).await.unwrap().unwrap();
    let second = client.get_ticket_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(first.status, Status::Resolu);
    assert_eq!(second.status, Status::Resolu);

    let (rejected, _) = client
        .update_ticket(
            first.id,
            |ticket| -> Result<_, TransitionError> {
                Ok(lifecycle::reject(ticket, &creator, "Toujours en panne", now)?)
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rejected.status, Status::Rejete);

    let closed = client
        .update_ticket(
            second.id,
            |ticket| -> Result<_, TransitionError> {
                Ok(lifecycle::close(ticket, &secretary, now)?)
            },
        )
        .await;
    assert!(matches!(
        closed,
        Err(TransitionError::Lifecycle(lifecycle::Error::InvalidStatus(
            Status::Rejete
        ))),
    ));

    let stored = client.get_ticket_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Rejete);
    let history = client.get_history(ticket.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].new_status, Status::Rejete);
}

#[tokio::test]
#[ignore = "requires a database"]
async fn racing_transitions_apply_once() {
    let client = common::db::connect().await;
    let creator = common::db::user(&client, Role::Utilisateur).await;
    let secretary = common::db::user(&client, Role::SecretaireDsi).await;
    let technician = common::db::user(&client, Role::Technicien).await;
    let now = OffsetDateTime::now_utc();
    let ticket = common::db::resolved_ticket(
        &client,
        &creator,
        &technician,
        now - Duration::days(1),
    )
    .await;

    let (rejected, closed) = tokio::join!(
        client.update_ticket(
            ticket.id,
            |ticket| -> Result<_, TransitionError> {
                Ok(lifecycle::reject(ticket, &creator, "Toujours en panne", now)?)
            },
        ),
        client.update_ticket(
            ticket.id,
            |ticket| -> Result<_, TransitionError> {
                Ok(lifecycle::close(ticket, &secretary, now)?)
            },
        ),
    );

    let applied = [rejected.is_ok(), closed.is_ok()];
    assert_eq!(applied.iter().filter(|ok| **ok).count(), 1);

    let history = client.get_history(ticket.id).await.unwrap();
    let leaving_resolved = history
        .iter()
        .filter(|h| h.old_status == Some(Status::Resolu))
        .count();
    assert_eq!(leaving_resolved, 1);
}

#[tokio::test]
#[ignore = "requires a database"]
async fn failed_step_leaves_ticket_untouched() {
    let client = common::db::connect().await;
    let creator = common::db::user(&client, Role::Utilisateur).await;
    let technician = common::db::user(&client, Role::Technicien).await;
    let ticket = common::db::resolved_ticket(
        &client,
        &creator,
        &technician,
        OffsetDateTime::now_utc() - Duration::days(1),
    )
    .await;

    let failed = client
        .update_ticket(
            ticket.id,
            |ticket| -> Result<_, TransitionError> {
                ticket.title = "Écrasé".into();
                Err(lifecycle::Error::NotPermitted.into())
            },
        )
        .await;
    assert!(failed.is_err());

    let stored = client.get_ticket_by_id(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Imprimante");
}
