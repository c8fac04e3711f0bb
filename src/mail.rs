//! Plain-text notification emails sent over SMTP.
//!
//! Emails are built by the lifecycle and the scheduler as [`Email`] values
//! and handed to [`Mailer::dispatch`], which sends each of them from its own
//! task. A failed delivery is logged and never fails the caller.

use std::sync::Arc;

use derive_more::{Display, From};
use itertools::Itertools as _;
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        self,
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor,
};
use tokio::{sync::RwLock, task};

use crate::{config, db};

#[derive(Clone, Debug, PartialEq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Drops blank and repeated addresses. Nothing to send without any.
    fn new<'a>(
        to: impl IntoIterator<Item = &'a str>,
        subject: String,
        body: String,
    ) -> Option<Self> {
        let to = to
            .into_iter()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .unique()
            .map(String::from)
            .collect::<Vec<_>>();
        (!to.is_empty()).then_some(Self { to, subject, body })
    }

    pub fn ticket_created<'a>(
        ticket: &db::Ticket,
        creator: &db::User,
        recipients: impl IntoIterator<Item = &'a db::User>,
    ) -> Option<Self> {
        Self::new(
            recipients.into_iter().map(|u| u.email.as_str()),
            format!("Nouveau ticket #{} créé: {}", ticket.number, ticket.title),
            format!(
                "Bonjour,\n\n\
                 Un nouveau ticket a été créé dans le système de gestion des \
                 tickets.\n\n\
                 Détails du ticket :\n\
                 • Numéro : #{}\n\
                 • Titre : {}\n\
                 • Créateur : {}\n\n\
                 Veuillez vous connecter à l'application pour analyser et \
                 assigner ce ticket.",
                ticket.number, ticket.title, creator.name,
            ),
        )
    }

    pub fn ticket_assigned(
        ticket: &db::Ticket,
        technician: &db::User,
        notes: Option<&str>,
    ) -> Option<Self> {
        let mut body = format!(
            "Bonjour {},\n\n\
             Un nouveau ticket vous a été assigné.\n\n\
             Détails du ticket :\n\
             • Numéro : #{}\n\
             • Titre : {}\n\
             • Priorité : {}\n",
            technician.name, ticket.number, ticket.title, ticket.priority,
        );
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            body.push_str(&format!("\nInstructions :\n{notes}\n"));
        }
        body.push_str(
            "\nVeuillez vous connecter à l'application pour prendre en charge \
             ce ticket.",
        );

        Self::new(
            [technician.email.as_str()],
            format!(
                "Ticket #{} vous a été assigné: {}",
                ticket.number, ticket.title,
            ),
            body,
        )
    }

    pub fn validation_reminder(
        ticket: &db::Ticket,
        creator: &db::User,
        number: u8,
        days_since_resolution: i64,
    ) -> Option<Self> {
        Self::new(
            [creator.email.as_str()],
            format!(
                "Rappel {number} : validation du ticket #{} en attente",
                ticket.number,
            ),
            format!(
                "Bonjour {},\n\n\
                 Votre ticket #{} \"{}\" a été résolu il y a {} jours et \
                 attend toujours votre validation.\n\n\
                 Veuillez vous connecter à l'application pour valider ou \
                 rejeter la résolution. Sans réponse, le ticket sera clôturé \
                 automatiquement {} jours après sa résolution.",
                creator.name,
                ticket.number,
                ticket.title,
                days_since_resolution,
                crate::lifecycle::AUTO_CLOSE_AFTER_DAYS,
            ),
        )
    }

    pub fn ticket_auto_closed(
        ticket: &db::Ticket,
        creator: &db::User,
    ) -> Option<Self> {
        Self::new(
            [creator.email.as_str()],
            format!(
                "Ticket #{} clôturé automatiquement: {}",
                ticket.number, ticket.title,
            ),
            format!(
                "Bonjour {},\n\n\
                 Votre ticket #{} \"{}\" a été clôturé automatiquement après \
                 {} jours sans validation.\n\n\
                 Vous pouvez le réouvrir dans les {} prochains jours si le \
                 problème persiste.",
                creator.name,
                ticket.number,
                ticket.title,
                crate::lifecycle::AUTO_CLOSE_AFTER_DAYS,
                crate::lifecycle::REOPEN_GRACE.whole_days(),
            ),
        )
    }

    pub fn test(to: &str) -> Option<Self> {
        Self::new(
            [to],
            "Email de test".into(),
            "Bonjour,\n\n\
             Ceci est un email de test. La configuration SMTP fonctionne."
                .into(),
        )
    }
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("email sending is disabled")]
    Disabled,
    #[display("invalid address: {_0}")]
    #[from]
    Address(AddressError),
    #[display("cannot build message: {_0}")]
    #[from]
    Message(lettre::error::Error),
    #[display("SMTP failure: {_0}")]
    #[from]
    Smtp(smtp::Error),
}

impl std::error::Error for Error {}

/// Sends emails with settings that can be edited while running.
#[derive(Clone)]
pub struct Mailer(Arc<RwLock<config::Smtp>>);

impl Mailer {
    pub fn new(settings: config::Smtp) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub async fn settings(&self) -> config::Smtp {
        self.0.read().await.clone()
    }

    pub async fn update(&self, settings: config::Smtp) {
        *self.0.write().await = settings;
    }

    pub async fn send(&self, email: &Email) -> Result<(), Error> {
        let settings = self.settings().await;
        if !settings.enabled {
            return Err(Error::Disabled);
        }

        let sender = settings.sender_email.parse::<Address>()?;
        let mut builder = Message::builder()
            .from(Mailbox::new(Some(settings.sender_name.clone()), sender))
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &email.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        let message = builder.body(format!(
            "{}\n\nCordialement,\n{}\n",
            email.body, settings.sender_name,
        ))?;

        transport(&settings)?.send(message).await?;
        Ok(())
    }

    /// Sends every email in the background.
    pub fn dispatch(&self, emails: Vec<Email>) {
        for email in emails {
            let mailer = self.clone();
            task::spawn(async move {
                match mailer.send(&email).await {
                    Ok(()) => {
                        tracing::info!(to = ?email.to, subject = %email.subject, "email sent");
                    }
                    Err(Error::Disabled) => {
                        tracing::debug!(to = ?email.to, "email sending is disabled");
                    }
                    Err(e) => {
                        tracing::warn!(to = ?email.to, "cannot send email: {e}");
                    }
                }
            });
        }
    }
}

fn transport(
    settings: &config::Smtp,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, smtp::Error> {
    let tls = TlsParameters::builder(settings.server.clone())
        .dangerous_accept_invalid_certs(!settings.verify_ssl)
        .build()?;
    let tls = if settings.use_tls {
        Tls::Required(tls)
    } else {
        Tls::Wrapper(tls)
    };

    let mut builder =
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
            .port(settings.port)
            .tls(tls);
    if !settings.username.is_empty() && !settings.password.is_empty() {
        builder = builder.credentials(Credentials::new(
            settings.username.clone(),
            settings.password.clone(),
        ));
    }
    Ok(builder.build())
}
