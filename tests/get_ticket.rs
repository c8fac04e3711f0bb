pub mod common;

use helpdesk::api;
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn retrieves_ticket() {
    let (alice, me) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let ticket = alice
        .add_ticket("Souris", "Ne répond plus", api::ticket::Priority::Faible)
        .await
        .unwrap();

    let ticket = alice.get_ticket(ticket.id).await.unwrap();

    assert_eq!(ticket.title, "Souris");
    assert_eq!(ticket.status, api::ticket::Status::EnAttenteAnalyse);
    assert_eq!(ticket.creator.id, me.id);
    assert_eq!(ticket.reopenable_until, None);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn agents_see_any_ticket() {
    let (alice, _) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let ticket = alice
        .add_ticket("Clavier", "Touche cassée", api::ticket::Priority::Faible)
        .await
        .unwrap();

    let (secretary, _) =
        common::Client::with_role(api::user::Role::SecretaireDsi).await;
    assert_eq!(secretary.get_ticket(ticket.id).await.unwrap().id, ticket.id);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn hides_tickets_of_others() {
    let (alice, _) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let ticket = alice
        .add_ticket("Clavier", "Touche cassée", api::ticket::Priority::Faible)
        .await
        .unwrap();

    let (bob, _) = common::Client::with_role(api::user::Role::Utilisateur).await;
    let status = bob.get_ticket(ticket.id).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn fails_when_not_found() {
    let status = common::Client::admin()
        .await
        .get_ticket(api::ticket::Id::new())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn comments_on_ticket() {
    let (alice, me) =
        common::Client::with_role(api::user::Role::Utilisateur).await;
    let ticket = alice
        .add_ticket("Wifi", "Pas de réseau", api::ticket::Priority::Moyenne)
        .await
        .unwrap();

    let comment = alice.add_comment(ticket.id, "Toujours en panne").await.unwrap();
    assert_eq!(comment.user_id, me.id);
    assert_eq!(comment.kind, api::ticket::CommentKind::Utilisateur);

    let comments = alice.get_comments(ticket.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "Toujours en panne");

    let status = alice.add_comment(ticket.id, "  ").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
