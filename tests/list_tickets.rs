pub mod common;

use helpdesk::api;
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn lists_tickets_for_agents() {
    let (alice, _) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    for i in 0..3 {
        alice
            .add_ticket(&format!("Ticket {i}"), "", api::ticket::Priority::Faible)
            .await
            .unwrap();
    }

    let (secretary, _) =
        common::Client::with_role(api::user::Role::SecretaireDsi).await;
    let list = secretary.get_tickets(0, 2).await.unwrap();
    assert_eq!(list.tickets.len(), 2);
    assert!(list.total_count >= 3);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn refuses_full_listing_to_users() {
    let (alice, _) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let status = alice.get_tickets(0, 10).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn lists_own_tickets() {
    let (alice, me) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    alice
        .add_ticket("Un", "", api::ticket::Priority::Faible)
        .await
        .unwrap();
    alice
        .add_ticket("Deux", "", api::ticket::Priority::Faible)
        .await
        .unwrap();

    let list = alice.get_my_tickets().await.unwrap();
    assert_eq!(list.total_count, 2);
    assert!(list.tickets.iter().all(|t| t.creator.id == me.id));
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn lists_assigned_tickets() {
    let (alice, _) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let (secretary, _) =
        common::Client::with_role(api::user::Role::SecretaireDsi).await;
    let (technician, tech) =
        common::Client::with_role(api::user::Role::Technicien).await;

    assert_eq!(technician.get_assigned_tickets().await.unwrap().total_count, 0);

    let ticket = alice
        .add_ticket("Serveur", "Lent", api::ticket::Priority::Haute)
        .await
        .unwrap();
    secretary.assign_ticket(ticket.id, tech.id).await.unwrap();

    let list = technician.get_assigned_tickets().await.unwrap();
    assert_eq!(list.total_count, 1);
    assert_eq!(list.tickets[0].id, ticket.id);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn fails_when_unauthorized() {
    let status = common::Client::new().get_tickets(0, 10).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
