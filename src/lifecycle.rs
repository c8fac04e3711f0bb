//! The ticket lifecycle.
//!
//! ```text
//! EnAttenteAnalyse -> AssigneTechnicien -> EnCours -> Resolu -> Cloture
//!        ^                   |                           |
//!        +-- refused --------+                           +-> Rejete
//!                            ^                                 |
//!                            +------------ reopen -------------+
//! ```
//!
//! Every operation checks the actor's rights and the ticket's status,
//! mutates the ticket in place and returns what the step leaves behind:
//! a history row, inbox notifications and emails. Nothing here touches the
//! database, so callers decide how to persist an [`Outcome`].

use derive_more::Display;
use time::{Duration, OffsetDateTime};

use crate::{
    db::{
        notification,
        ticket::{self, Priority, Status},
        user::{self, Role},
        History, Notification, Ticket, User,
    },
    mail::Email,
};

/// Resolved tickets left unvalidated for this many days get closed.
pub const AUTO_CLOSE_AFTER_DAYS: i64 = 14;

/// How long after an automatic closure the creator may still reopen.
pub const REOPEN_GRACE: Duration = Duration::days(7);

#[derive(Debug, Default)]
pub struct Outcome {
    pub history: Option<History>,
    pub notifications: Vec<Notification>,
    pub emails: Vec<Email>,
}

impl Outcome {
    fn notify(
        &mut self,
        ticket: &Ticket,
        user: user::Id,
        kind: notification::Kind,
        message: String,
        now: OffsetDateTime,
    ) {
        self.notifications.push(Notification::new(
            user,
            kind,
            Some(ticket.id),
            message,
            now,
        ));
    }

    fn email(&mut self, email: Option<Email>) {
        self.emails.extend(email);
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Error {
    #[display("operation not permitted")]
    NotPermitted,
    #[display("operation not allowed on a ticket in status {_0}")]
    InvalidStatus(Status),
    #[display("user is not an active technician")]
    NotATechnician,
    #[display("ticket is not assigned yet")]
    NotAssigned,
    #[display("ticket is already assigned to this technician")]
    SameTechnician,
    #[display("priority is already at maximum")]
    PriorityAtMaximum,
    #[display("a rejection reason is required")]
    RejectionReasonRequired,
    #[display("score {_0} is not between 1 and 5")]
    FeedbackScoreOutOfRange(i16),
    #[display("ticket is not due for automatic closure")]
    NotDue,
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the actor lacks the right, as opposed to the ticket or the
    /// input being wrong.
    pub fn is_permission(self) -> bool {
        matches!(self, Self::NotPermitted)
    }
}

/// What a user files.
#[derive(Clone, Debug)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub kind: ticket::Kind,
    pub priority: Priority,
}

fn ensure(condition: bool, error: Error) -> Result<(), Error> {
    if condition {
        Ok(())
    } else {
        Err(error)
    }
}

fn ensure_status(ticket: &Ticket, allowed: &[Status]) -> Result<(), Error> {
    ensure(allowed.contains(&ticket.status), Error::InvalidStatus(ticket.status))
}

fn ensure_agent(actor: &User) -> Result<(), Error> {
    ensure(actor.role.is_agent(), Error::NotPermitted)
}

fn ensure_creator(ticket: &Ticket, actor: &User) -> Result<(), Error> {
    ensure(ticket.creator == actor.id, Error::NotPermitted)
}

fn ensure_assigned(ticket: &Ticket, actor: &User) -> Result<(), Error> {
    ensure(ticket.technician == Some(actor.id), Error::NotPermitted)
}

fn ensure_technician(user: &User) -> Result<(), Error> {
    ensure(
        user.role == Role::Technicien && user.is_active(),
        Error::NotATechnician,
    )
}

/// Moves the ticket to `to` and records who did it.
fn transition(
    ticket: &mut Ticket,
    to: Status,
    actor: user::Id,
    reason: Option<String>,
    now: OffsetDateTime,
) -> History {
    let from = ticket.status;
    ticket.status = to;
    History::new(ticket.id, Some(from), to, actor, reason, now)
}

/// `reason | Instructions: notes`, either part being optional.
fn assignment_reason(reason: Option<&str>, notes: Option<&str>) -> Option<String> {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    let notes = notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("Instructions: {n}"));
    match (reason, notes) {
        (Some(reason), Some(notes)) => Some(format!("{reason} | {notes}")),
        (Some(reason), None) => Some(reason.to_owned()),
        (None, notes) => notes,
    }
}

pub fn create(
    draft: Draft,
    number: i64,
    creator: &User,
    triage: &[User],
    now: OffsetDateTime,
) -> Result<(Ticket, Outcome), Error> {
    ensure(creator.role == Role::Utilisateur, Error::NotPermitted)?;

    let ticket = Ticket {
        id: ticket::Id::new(),
        number,
        title: draft.title,
        description: draft.description,
        kind: draft.kind,
        priority: draft.priority,
        status: Status::EnAttenteAnalyse,
        creator: creator.id,
        technician: None,
        secretary: None,
        user_agency: creator.agency.clone(),
        created_at: now,
        assigned_at: None,
        resolved_at: None,
        closed_at: None,
        auto_closed_at: None,
        feedback_score: None,
        feedback_comment: None,
    };

    let mut outcome = Outcome {
        history: Some(History::new(
            ticket.id,
            None,
            ticket.status,
            creator.id,
            None,
            now,
        )),
        ..Outcome::default()
    };

    let recipients = triage
        .iter()
        .filter(|u| u.is_active() && Role::TRIAGE.contains(&u.role))
        .collect::<Vec<_>>();
    for user in &recipients {
        outcome.notify(
            &ticket,
            user.id,
            notification::Kind::NouveauTicket,
            format!("Nouveau ticket #{} créé: {}", ticket.number, ticket.title),
            now,
        );
    }
    outcome.email(Email::ticket_created(&ticket, creator, recipients));

    Ok((ticket, outcome))
}

pub fn assign(
    ticket: &mut Ticket,
    actor: &User,
    technician: &User,
    reason: Option<&str>,
    notes: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_agent(actor)?;
    ensure_status(ticket, &[Status::EnAttenteAnalyse])?;
    ensure_technician(technician)?;

    ticket.technician = Some(technician.id);
    ticket.secretary = Some(actor.id);
    ticket.assigned_at = Some(now);

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::AssigneTechnicien,
            actor.id,
            assignment_reason(reason, notes),
            now,
        )),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        technician.id,
        notification::Kind::Assignation,
        format!(
            "Un nouveau ticket #{} vous a été assigné: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::TicketAssigne,
        format!(
            "Votre ticket #{} a été assigné à un technicien: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.email(Email::ticket_assigned(ticket, technician, notes));

    Ok(outcome)
}

/// Hands an assigned ticket over to another technician. The status is
/// kept.
pub fn reassign(
    ticket: &mut Ticket,
    actor: &User,
    technician: &User,
    reason: Option<&str>,
    notes: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_agent(actor)?;
    ensure_status(ticket, &[Status::AssigneTechnicien, Status::EnCours])?;
    let previous = ticket.technician.ok_or(Error::NotAssigned)?;
    ensure_technician(technician)?;
    ensure(previous != technician.id, Error::SameTechnician)?;

    ticket.technician = Some(technician.id);
    ticket.secretary = Some(actor.id);
    ticket.assigned_at = Some(now);

    let status = ticket.status;
    let mut history = format!("Réassigné à {}", technician.name);
    if let Some(more) = assignment_reason(reason, notes) {
        history.push_str(&format!(". {more}"));
    }

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            status,
            actor.id,
            Some(history),
            now,
        )),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        technician.id,
        notification::Kind::Assignation,
        format!(
            "Le ticket #{} vous a été réassigné: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.notify(
        ticket,
        previous,
        notification::Kind::Reassignation,
        format!(
            "Le ticket #{} a été réassigné à un autre technicien: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::TicketAssigne,
        format!(
            "Votre ticket #{} a été réassigné à un autre technicien: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.email(Email::ticket_assigned(ticket, technician, notes));

    Ok(outcome)
}

/// Raises the priority by one step. `managers` are the users told about
/// escalations; the actor is skipped.
pub fn escalate(
    ticket: &mut Ticket,
    actor: &User,
    managers: &[User],
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure(actor.role.can_escalate(), Error::NotPermitted)?;
    ensure(ticket.status != Status::Cloture, Error::InvalidStatus(ticket.status))?;
    let from = ticket.priority;
    let to = from.raised().ok_or(Error::PriorityAtMaximum)?;

    ticket.priority = to;
    let status = ticket.status;

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            status,
            actor.id,
            Some(format!(
                "Ticket escaladé : priorité passée de {from} à {to}"
            )),
            now,
        )),
        ..Outcome::default()
    };
    for manager in managers.iter().filter(|u| {
        u.id != actor.id
            && u.is_active()
            && Role::ESCALATION.contains(&u.role)
    }) {
        outcome.notify(
            ticket,
            manager.id,
            notification::Kind::Escalade,
            format!(
                "Ticket #{} escaladé à la priorité {to}: {}",
                ticket.number, ticket.title,
            ),
            now,
        );
    }
    if let Some(technician) = ticket.technician {
        outcome.notify(
            ticket,
            technician,
            notification::Kind::Escalade,
            format!(
                "Le ticket #{} que vous avez en charge a été escaladé à la \
                 priorité {to}: {}",
                ticket.number, ticket.title,
            ),
            now,
        );
    }
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::Escalade,
        format!(
            "Votre ticket #{} a été escaladé à la priorité {to}: {}",
            ticket.number, ticket.title,
        ),
        now,
    );

    Ok(outcome)
}

pub fn start(
    ticket: &mut Ticket,
    actor: &User,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_assigned(ticket, actor)?;
    ensure_status(ticket, &[Status::AssigneTechnicien])?;

    Ok(Outcome {
        history: Some(transition(ticket, Status::EnCours, actor.id, None, now)),
        ..Outcome::default()
    })
}

/// Acknowledges an assignment without starting the work yet.
pub fn accept_assignment(
    ticket: &mut Ticket,
    actor: &User,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_assigned(ticket, actor)?;
    ensure_status(ticket, &[Status::AssigneTechnicien])?;

    Ok(Outcome {
        history: Some(transition(
            ticket,
            Status::AssigneTechnicien,
            actor.id,
            Some("Assignation acceptée par le technicien".into()),
            now,
        )),
        ..Outcome::default()
    })
}

/// Sends the ticket back to triage.
pub fn reject_assignment(
    ticket: &mut Ticket,
    actor: &User,
    reason: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_assigned(ticket, actor)?;
    ensure_status(ticket, &[Status::AssigneTechnicien])?;

    ticket.technician = None;
    ticket.assigned_at = None;

    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::EnAttenteAnalyse,
            actor.id,
            Some(format!(
                "Assignation refusée par le technicien. Raison: {}",
                reason.unwrap_or("N/A"),
            )),
            now,
        )),
        ..Outcome::default()
    };
    if let Some(secretary) = ticket.secretary {
        outcome.notify(
            ticket,
            secretary,
            notification::Kind::Assignation,
            format!(
                "Le technicien a refusé l'assignation du ticket #{}. \
                 Réassignation nécessaire.",
                ticket.number,
            ),
            now,
        );
    }

    Ok(outcome)
}

pub fn resolve(
    ticket: &mut Ticket,
    actor: &User,
    summary: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_assigned(ticket, actor)?;
    ensure_status(ticket, &[Status::EnCours])?;

    ticket.resolved_at = Some(now);

    let summary = summary
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("Résumé de la résolution: {s}"));
    let mut outcome = Outcome {
        history: Some(transition(ticket, Status::Resolu, actor.id, summary, now)),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::Resolution,
        format!(
            "Votre ticket #{} a été résolu. Veuillez valider la résolution.",
            ticket.number,
        ),
        now,
    );

    Ok(outcome)
}

/// Closes a resolved ticket on behalf of its creator.
pub fn close(
    ticket: &mut Ticket,
    actor: &User,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_agent(actor)?;
    ensure_status(ticket, &[Status::Resolu])?;

    ticket.closed_at = Some(now);

    let mut outcome = Outcome {
        history: Some(transition(ticket, Status::Cloture, actor.id, None, now)),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::TicketCloture,
        format!(
            "Votre ticket #{} a été clôturé: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    if let Some(technician) = ticket.technician {
        outcome.notify(
            ticket,
            technician,
            notification::Kind::TicketCloture,
            format!(
                "Le ticket #{} que vous avez résolu a été clôturé: {}",
                ticket.number, ticket.title,
            ),
            now,
        );
    }

    Ok(outcome)
}

/// The creator accepts the resolution.
pub fn validate(
    ticket: &mut Ticket,
    actor: &User,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_creator(ticket, actor)?;
    ensure_status(ticket, &[Status::Resolu])?;

    ticket.closed_at = Some(now);

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::Cloture,
            actor.id,
            Some("Validation utilisateur: Validé".into()),
            now,
        )),
        ..Outcome::default()
    };
    if let Some(technician) = ticket.technician {
        outcome.notify(
            ticket,
            technician,
            notification::Kind::TicketCloture,
            format!(
                "Votre résolution du ticket #{} a été validée par \
                 l'utilisateur: {}",
                ticket.number, ticket.title,
            ),
            now,
        );
    }

    Ok(outcome)
}

/// The creator refuses the resolution.
pub fn reject(
    ticket: &mut Ticket,
    actor: &User,
    reason: &str,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_creator(ticket, actor)?;
    ensure_status(ticket, &[Status::Resolu])?;
    let reason = reason.trim();
    ensure(!reason.is_empty(), Error::RejectionReasonRequired)?;

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::Rejete,
            actor.id,
            Some(format!("Validation utilisateur: Rejeté. Motif: {reason}")),
            now,
        )),
        ..Outcome::default()
    };
    if let Some(technician) = ticket.technician {
        outcome.notify(
            ticket,
            technician,
            notification::Kind::RejetResolution,
            format!(
                "L'utilisateur a rejeté la résolution du ticket #{}. \
                 Motif: {reason}",
                ticket.number,
            ),
            now,
        );
    }

    Ok(outcome)
}

/// Puts a rejected ticket back in a technician's hands.
pub fn reopen(
    ticket: &mut Ticket,
    actor: &User,
    technician: &User,
    reason: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_agent(actor)?;
    ensure_status(ticket, &[Status::Rejete])?;
    ensure_technician(technician)?;

    ticket.technician = Some(technician.id);
    ticket.secretary = Some(actor.id);
    ticket.assigned_at = Some(now);
    ticket.resolved_at = None;

    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::AssigneTechnicien,
            actor.id,
            Some(format!(
                "Ticket réouvert et réassigné. Raison: {}",
                reason.unwrap_or("N/A"),
            )),
            now,
        )),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        technician.id,
        notification::Kind::Assignation,
        format!(
            "Le ticket #{} a été réouvert et vous a été assigné: {}",
            ticket.number, ticket.title,
        ),
        now,
    );
    outcome.email(Email::ticket_assigned(ticket, technician, reason));

    Ok(outcome)
}

/// Records the creator's satisfaction. Leaves no history.
pub fn feedback(
    ticket: &mut Ticket,
    actor: &User,
    score: i16,
    comment: Option<String>,
) -> Result<Outcome, Error> {
    ensure_creator(ticket, actor)?;
    ensure_status(ticket, &[Status::Cloture])?;
    ensure((1..=5).contains(&score), Error::FeedbackScoreOutOfRange(score))?;

    ticket.feedback_score = Some(score);
    ticket.feedback_comment = comment;

    Ok(Outcome::default())
}

/// Closes a ticket whose resolution went unvalidated for
/// [`AUTO_CLOSE_AFTER_DAYS`]. The history row is attributed to the creator.
pub fn auto_close(
    ticket: &mut Ticket,
    creator: Option<&User>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    ensure_status(ticket, &[Status::Resolu])?;
    let due = ticket.closed_at.is_none()
        && ticket.resolved_at.is_some_and(|resolved_at| {
            (now - resolved_at).whole_days() >= AUTO_CLOSE_AFTER_DAYS
        });
    ensure(due, Error::NotDue)?;

    ticket.closed_at = Some(now);
    ticket.auto_closed_at = Some(now);

    let mut outcome = Outcome {
        history: Some(transition(
            ticket,
            Status::Cloture,
            ticket.creator,
            Some(format!(
                "Clôture automatique après {AUTO_CLOSE_AFTER_DAYS} jours sans \
                 validation"
            )),
            now,
        )),
        ..Outcome::default()
    };
    outcome.notify(
        ticket,
        ticket.creator,
        notification::Kind::ClotureAutomatique,
        format!(
            "Votre ticket #{} a été clôturé automatiquement après \
             {AUTO_CLOSE_AFTER_DAYS} jours sans validation. Vous pouvez le \
             réouvrir dans les {} prochains jours si nécessaire.",
            ticket.number,
            REOPEN_GRACE.whole_days(),
        ),
        now,
    );
    if let Some(technician) = ticket.technician {
        outcome.notify(
            ticket,
            technician,
            notification::Kind::TicketCloture,
            format!(
                "Le ticket #{} a été clôturé automatiquement après \
                 {AUTO_CLOSE_AFTER_DAYS} jours sans validation: {}",
                ticket.number, ticket.title,
            ),
            now,
        );
    }
    if let Some(creator) = creator {
        outcome.email(Email::ticket_auto_closed(ticket, creator));
    }

    Ok(outcome)
}

/// Until when an automatically closed ticket may be reopened.
pub fn reopenable_until(ticket: &Ticket) -> Option<OffsetDateTime> {
    ticket.auto_closed_at.map(|at| at + REOPEN_GRACE)
}

/// Moves the ticket to `status` through the matching operation. Only
/// `EnCours`, `Resolu` and `Cloture` can be set this way.
pub fn set_status(
    ticket: &mut Ticket,
    actor: &User,
    status: Status,
    summary: Option<&str>,
    now: OffsetDateTime,
) -> Result<Outcome, Error> {
    match status {
        Status::EnCours => start(ticket, actor, now),
        Status::Resolu => resolve(ticket, actor, summary, now),
        Status::Cloture => close(ticket, actor, now),
        Status::EnAttenteAnalyse
        | Status::AssigneTechnicien
        | Status::Rejete => Err(Error::InvalidStatus(status)),
    }
}
