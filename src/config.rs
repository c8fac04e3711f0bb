use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub smtp: Smtp,
    #[serde(default)]
    pub scheduler: Scheduler,
    pub bootstrap: Option<Bootstrap>,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

/// Outgoing mail. Only the initial values: the settings endpoint edits a
/// runtime copy held by [`crate::mail::Mailer`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Smtp {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_email: String,
    pub sender_name: String,
    /// STARTTLS on a plain connection when set, implicit TLS otherwise.
    pub use_tls: bool,
    pub verify_ssl: bool,
    pub enabled: bool,
}

impl Default for Smtp {
    fn default() -> Self {
        Self {
            server: "localhost".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
            sender_email: "tickets@localhost".into(),
            sender_name: "Helpdesk".into(),
            use_tls: true,
            verify_ssl: true,
            enabled: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Scheduler {
    #[serde(with = "humantime_serde")]
    pub period: time::Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            period: time::Duration::from_secs(60 * 60),
        }
    }
}

/// Administrator account created on startup if its login is unknown.
#[derive(Deserialize)]
pub struct Bootstrap {
    pub login: String,
    pub name: String,
    pub email: String,
    pub password: String,
}
