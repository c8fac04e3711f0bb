#![allow(dead_code)]

pub mod db;

use constcat::concat;
use helpdesk::api;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

/// Matches the `[bootstrap]` section of `config.example.toml`.
pub const ADMIN_LOGIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub const PASSWORD: &str = "password";

pub struct Client {
    inner: reqwest::Client,
    pub auth_token: Option<String>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
            auth_token: None,
        }
    }

    pub async fn auth(mut self, login: &str, password: &str) -> Self {
        self.auth_token = Some(
            self.try_auth(login, password)
                .await
                .expect("wrong status code"),
        );
        self
    }

    pub async fn try_auth(
        &self,
        login: &str,
        password: &str,
    ) -> Result<String, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/auth");

        Ok(self
            .inner
            .post(URL)
            .json(&json!({
                "login": login,
                "password": password,
            }))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .text()
            .await
            .expect("failed to get a response"))
    }

    pub async fn admin() -> Self {
        Self::new().auth(ADMIN_LOGIN, ADMIN_PASSWORD).await
    }

    /// Registers a fresh account with `role` and logs it in.
    pub async fn with_role(role: api::user::Role) -> (Self, api::User) {
        let login = format!("{role:?}-{}", uuid::Uuid::new_v4()).to_lowercase();
        let user = Self::admin()
            .await
            .register(&login, role)
            .await
            .expect("failed to register a user");
        (Self::new().auth(&login, PASSWORD).await, user)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => {
                req.header("Authorization", format!("Bearer {token}"))
            }
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(self
            .authorized(req)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), StatusCode> {
        self.authorized(req)
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map(drop)
            .map_err(|e| e.status().expect("status error"))
    }

    pub async fn me(&self) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/auth/me");
        self.send(self.inner.get(URL)).await
    }

    pub async fn roles(&self) -> Result<Vec<api::user::RoleInfo>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/auth/roles");
        self.send(self.inner.get(URL)).await
    }

    pub async fn register(
        &self,
        login: &str,
        role: api::user::Role,
    ) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/auth/register");
        self.send(self.inner.post(URL).json(&json!({
            "login": login,
            "password": PASSWORD,
            "name": login,
            "email": format!("{login}@example.com"),
            "role": role,
        })))
        .await
    }

    pub async fn get_tickets(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<api::ticket::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(
            self.inner
                .get(format!("{URL}?offset={offset}&limit={limit}")),
        )
        .await
    }

    pub async fn get_my_tickets(
        &self,
    ) -> Result<api::ticket::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/me");
        self.send(self.inner.get(URL)).await
    }

    pub async fn get_assigned_tickets(
        &self,
    ) -> Result<api::ticket::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets/assigned");
        self.send(self.inner.get(URL)).await
    }

    pub async fn add_ticket(
        &self,
        title: &str,
        description: &str,
        priority: api::ticket::Priority,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(self.inner.post(URL).json(&json!({
            "title": title,
            "description": description,
            "type": api::ticket::Kind::Materiel,
            "priority": priority,
        })))
        .await
    }

    pub async fn get_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(self.inner.get(format!("{URL}/{id}"))).await
    }

    /// Sends a lifecycle operation, `data` being omitted when null.
    pub async fn edit_ticket(
        &self,
        id: api::ticket::Id,
        op: &str,
        data: Value,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");

        let body = if data.is_null() {
            json!({ "op": op })
        } else {
            json!({ "op": op, "data": data })
        };
        self.send(self.inner.patch(format!("{URL}/{id}")).json(&body))
            .await
    }

    pub async fn assign_ticket(
        &self,
        id: api::ticket::Id,
        technician: api::user::Id,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            "assign",
            json!({
                "technicianId": technician,
                "notes": "Voir avec l'accueil",
            }),
        )
        .await
    }

    pub async fn get_history(
        &self,
        id: api::ticket::Id,
    ) -> Result<Vec<api::ticket::History>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(self.inner.get(format!("{URL}/{id}/history"))).await
    }

    pub async fn get_comments(
        &self,
        id: api::ticket::Id,
    ) -> Result<Vec<api::ticket::Comment>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(self.inner.get(format!("{URL}/{id}/comments"))).await
    }

    pub async fn add_comment(
        &self,
        id: api::ticket::Id,
        content: &str,
    ) -> Result<api::ticket::Comment, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/tickets");
        self.send(
            self.inner
                .post(format!("{URL}/{id}/comments"))
                .json(&json!({ "content": content })),
        )
        .await
    }

    pub async fn get_users(&self) -> Result<Vec<api::User>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/users");
        self.send(self.inner.get(URL)).await
    }

    pub async fn get_technicians(
        &self,
    ) -> Result<Vec<api::user::Technician>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/users/technicians");
        self.send(self.inner.get(URL)).await
    }

    pub async fn edit_user(
        &self,
        id: api::user::Id,
        changes: Value,
    ) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/users");
        self.send(self.inner.put(format!("{URL}/{id}")).json(&changes))
            .await
    }

    pub async fn delete_user(
        &self,
        id: api::user::Id,
    ) -> Result<api::user::Deletion, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/users");
        self.send(self.inner.delete(format!("{URL}/{id}"))).await
    }

    pub async fn reset_password(
        &self,
        id: api::user::Id,
    ) -> Result<api::user::PasswordReset, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/users");
        self.send(
            self.inner
                .post(format!("{URL}/{id}/reset-password"))
                .json(&json!({})),
        )
        .await
    }

    pub async fn get_notifications(
        &self,
    ) -> Result<Vec<api::Notification>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/notifications");
        self.send(self.inner.get(URL)).await
    }

    pub async fn get_unread_count(&self) -> Result<usize, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/notifications/unread/count");
        self.send::<api::notification::UnreadCount>(self.inner.get(URL))
            .await
            .map(|c| c.unread_count)
    }

    pub async fn mark_notification_read(
        &self,
        id: api::notification::Id,
    ) -> Result<(), StatusCode> {
        const URL: &str = concat!(BASE_URL, "/notifications");
        self.send_empty(self.inner.patch(format!("{URL}/{id}/read")))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), StatusCode> {
        const URL: &str = concat!(BASE_URL, "/notifications/read-all");
        self.send_empty(self.inner.patch(URL)).await
    }

    pub async fn get_email_settings(
        &self,
    ) -> Result<api::settings::Email, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/settings/email");
        self.send(self.inner.get(URL)).await
    }

    pub async fn edit_email_settings(
        &self,
        changes: Value,
    ) -> Result<api::settings::Email, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/settings/email");
        self.send(self.inner.put(URL).json(&changes)).await
    }
}
