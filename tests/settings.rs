pub mod common;

use helpdesk::api;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn edits_email_settings() {
    let admin = common::Client::admin().await;
    let before = admin.get_email_settings().await.unwrap();

    let after = admin
        .edit_email_settings(json!({ "senderName": "Support informatique" }))
        .await
        .unwrap();
    assert_eq!(after.sender_name, "Support informatique");
    assert_eq!(after.smtp_server, before.smtp_server);

    admin
        .edit_email_settings(json!({ "senderName": before.sender_name }))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn restricts_email_settings_to_administrators() {
    let (technician, _) =
        common::Client::with_role(api::user::Role::Technicien).await;
    assert_eq!(
        technician.get_email_settings().await.unwrap_err(),
        StatusCode::FORBIDDEN,
    );
}
