pub mod common;

use helpdesk::api;
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn retrieves_access_token() {
    let client = common::Client::admin().await;
    assert!(client.auth_token.is_some());
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn rejects_wrong_password() {
    let status = common::Client::new()
        .try_auth(common::ADMIN_LOGIN, "wrong")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn registers_users_as_administrator() {
    let (client, user) =
        common::Client::with_role(api::user::Role::Technicien).await;

    let me = client.me().await.unwrap();
    assert_eq!(me, user);
    assert_eq!(me.role, api::user::Role::Technicien);
    assert_eq!(me.status, api::user::Status::Active);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn only_administrators_register() {
    let (client, _) =
        common::Client::with_role(api::user::Role::SecretaireDsi).await;
    let status = client
        .register("intruder", api::user::Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn refuses_taken_login() {
    let (_, user) = common::Client::with_role(api::user::Role::Utilisateur).await;
    let status = common::Client::admin()
        .await
        .register(&user.login, api::user::Role::Utilisateur)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn lists_roles_with_labels() {
    let roles = common::Client::admin().await.roles().await.unwrap();
    assert_eq!(roles.len(), api::user::Role::ALL.len());
    assert!(roles.iter().any(|r| {
        r.role == api::user::Role::SecretaireDsi && r.label == "Secrétaire DSI"
    }));
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn fails_when_unauthorized() {
    let status = common::Client::new().me().await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
