use serde::{Deserialize, Serialize};

use crate::config;

/// SMTP settings as shown to administrators. The password never leaves the
/// server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub sender_email: String,
    pub sender_name: String,
    pub use_tls: bool,
    pub verify_ssl: bool,
    pub email_enabled: bool,
}

impl From<&config::Smtp> for Email {
    fn from(smtp: &config::Smtp) -> Self {
        Self {
            smtp_server: smtp.server.clone(),
            smtp_port: smtp.port,
            smtp_username: smtp.username.clone(),
            sender_email: smtp.sender_email.clone(),
            sender_name: smtp.sender_name.clone(),
            use_tls: smtp.use_tls,
            verify_ssl: smtp.verify_ssl,
            email_enabled: smtp.enabled,
        }
    }
}

/// Partial update: absent fields are left as they are.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailUpdate {
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub use_tls: Option<bool>,
    pub verify_ssl: Option<bool>,
    pub email_enabled: Option<bool>,
}

impl EmailUpdate {
    pub fn apply(self, smtp: &mut config::Smtp) {
        let Self {
            smtp_server,
            smtp_port,
            smtp_username,
            smtp_password,
            sender_email,
            sender_name,
            use_tls,
            verify_ssl,
            email_enabled,
        } = self;

        if let Some(v) = smtp_server {
            smtp.server = v;
        }
        if let Some(v) = smtp_port {
            smtp.port = v;
        }
        if let Some(v) = smtp_username {
            smtp.username = v;
        }
        if let Some(v) = smtp_password {
            smtp.password = v;
        }
        if let Some(v) = sender_email {
            smtp.sender_email = v;
        }
        if let Some(v) = sender_name {
            smtp.sender_name = v;
        }
        if let Some(v) = use_tls {
            smtp.use_tls = v;
        }
        if let Some(v) = verify_ssl {
            smtp.verify_ssl = v;
        }
        if let Some(v) = email_enabled {
            smtp.enabled = v;
        }
    }
}
