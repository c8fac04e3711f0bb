//! Background scan of resolved tickets waiting for validation.
//!
//! Creators get up to three reminders, then the ticket closes itself
//! [`lifecycle::AUTO_CLOSE_AFTER_DAYS`] days after its resolution.

use std::time::Duration;

use derive_more::From;
use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    config, db,
    db::{notification, ticket::Status, Notification, Ticket, User},
    lifecycle::{self, Outcome},
    mail::{Email, Mailer},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reminder {
    First,
    Second,
    Third,
}

impl Reminder {
    pub const ALL: [Self; 3] = [Self::First, Self::Second, Self::Third];

    pub const KINDS: [notification::Kind; 3] = [
        notification::Kind::RappelValidation1,
        notification::Kind::RappelValidation2,
        notification::Kind::RappelValidation3,
    ];

    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }

    /// Whole days after the resolution this reminder is due.
    pub fn after_days(self) -> i64 {
        match self {
            Self::First => 3,
            Self::Second => 7,
            Self::Third => 10,
        }
    }

    pub fn kind(self) -> notification::Kind {
        Self::KINDS[usize::from(self.number() - 1)]
    }

    fn message(self, ticket: &Ticket) -> String {
        match self {
            Self::First => format!(
                "Rappel : Veuillez valider la résolution de votre ticket #{}",
                ticket.number,
            ),
            Self::Second => format!(
                "Second rappel : Validation requise pour votre ticket #{}",
                ticket.number,
            ),
            Self::Third => format!(
                "Dernier rappel : Veuillez valider votre ticket #{}",
                ticket.number,
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Remind(Reminder),
    AutoClose,
}

/// What a ticket resolved at `resolved_at` needs at `now`, given the
/// reminder kinds already `sent` to its creator.
///
/// Only the latest reminder reached is considered, so a ticket found late
/// gets one reminder instead of a burst.
pub fn due_action(
    resolved_at: OffsetDateTime,
    now: OffsetDateTime,
    sent: &[notification::Kind],
) -> Option<Action> {
    let days = (now - resolved_at).whole_days();
    if days >= lifecycle::AUTO_CLOSE_AFTER_DAYS {
        return Some(Action::AutoClose);
    }
    Reminder::ALL
        .into_iter()
        .rev()
        .find(|r| days >= r.after_days())
        .filter(|r| !sent.contains(&r.kind()))
        .map(Action::Remind)
}

/// The notification and email reminding the creator to validate. None when
/// the creator cannot be mailed.
pub fn reminder(
    ticket: &Ticket,
    creator: &User,
    reminder: Reminder,
    now: OffsetDateTime,
) -> Option<Outcome> {
    let days = ticket
        .resolved_at
        .map_or(0, |resolved_at| (now - resolved_at).whole_days());
    let email =
        Email::validation_reminder(ticket, creator, reminder.number(), days)?;

    Some(Outcome {
        history: None,
        notifications: vec![Notification::new(
            creator.id,
            reminder.kind(),
            Some(ticket.id),
            reminder.message(ticket),
            now,
        )],
        emails: vec![email],
    })
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Report {
    pub reminders: usize,
    pub auto_closed: usize,
}

pub struct Scheduler {
    db: db::Client,
    mailer: Mailer,
    period: Duration,
}

impl Scheduler {
    pub fn new(db: db::Client, mailer: Mailer, config: config::Scheduler) -> Self {
        Self {
            db,
            mailer,
            period: config.period,
        }
    }

    /// Scans forever. A slow scan delays the next one instead of piling up.
    pub async fn run(self) {
        let mut ticks = interval(self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;
            match self.tick(OffsetDateTime::now_utc()).await {
                Ok(report) => tracing::info!(
                    reminders = report.reminders,
                    auto_closed = report.auto_closed,
                    "validation scan done",
                ),
                Err(e) => tracing::error!("validation scan failed: {e}"),
            }
        }
    }

    /// Processes every unvalidated ticket once. A failing ticket is logged
    /// and skipped.
    pub async fn tick(&self, now: OffsetDateTime) -> Result<Report, db::Error> {
        let tickets = self.db.get_unvalidated_tickets().await?;
        let creator_ids = tickets.iter().map(|t| t.creator).collect::<Vec<_>>();
        let creators = self.db.get_users_by_ids(&creator_ids).await?;

        let mut report = Report::default();
        for ticket in tickets {
            let creator = creators.get(&ticket.creator);
            match self.process(&ticket, creator, now).await {
                Ok(Some(Action::Remind(_))) => report.reminders += 1,
                Ok(Some(Action::AutoClose)) => report.auto_closed += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(
                    ticket = %ticket.id,
                    number = ticket.number,
                    "cannot process unvalidated ticket: {e}",
                ),
            }
        }
        Ok(report)
    }

    /// Reminds or closes one ticket. The decision is taken again on the
    /// locked row, since the creator may have validated or rejected the
    /// ticket since the scan listed it.
    async fn process(
        &self,
        ticket: &Ticket,
        creator: Option<&User>,
        now: OffsetDateTime,
    ) -> Result<Option<Action>, db::Error> {
        let sent = self
            .db
            .get_notification_kinds(ticket.id, ticket.creator, &Reminder::KINDS)
            .await?;

        let mut action = None;
        let step = |ticket: &mut Ticket| -> Result<Outcome, StepError> {
            let resolved_at = ticket
                .resolved_at
                .filter(|_| {
                    ticket.status == Status::Resolu && ticket.closed_at.is_none()
                })
                .ok_or(StepError::Skip)?;
            let due = due_action(resolved_at, now, &sent).ok_or(StepError::Skip)?;
            let outcome = match due {
                Action::AutoClose => lifecycle::auto_close(ticket, creator, now)
                    .map_err(|_| StepError::Skip)?,
                Action::Remind(r) => creator
                    .and_then(|c| reminder(ticket, c, r, now))
                    .ok_or(StepError::Skip)?,
            };
            action = Some(due);
            Ok(outcome)
        };

        let updated = self.db.update_ticket(ticket.id, step).await;
        let outcome = match updated {
            Ok(Some((_, outcome))) => outcome,
            Ok(None) | Err(StepError::Skip) => return Ok(None),
            Err(StepError::Db(e)) => return Err(e),
        };
        match action {
            Some(Action::AutoClose) => {
                tracing::info!(number = ticket.number, "ticket closed automatically")
            }
            Some(Action::Remind(r)) => tracing::info!(
                number = ticket.number,
                reminder = r.number(),
                "validation reminder sent",
            ),
            None => {}
        }

        self.mailer.dispatch(outcome.emails);
        Ok(action)
    }
}

/// Why a locked ticket was left untouched.
#[derive(From)]
enum StepError {
    #[from]
    Db(db::Error),
    /// Nothing is due anymore.
    Skip,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::db::{ticket, user};

    const RESOLVED: OffsetDateTime = datetime!(2024-03-01 09:00 UTC);

    fn after(days: i64) -> OffsetDateTime {
        RESOLVED + time::Duration::days(days)
    }

    #[test]
    fn waits_three_days_before_reminding() {
        assert_eq!(due_action(RESOLVED, after(0), &[]), None);
        assert_eq!(
            due_action(RESOLVED, after(3) - time::Duration::minutes(1), &[]),
            None,
        );
        assert_eq!(
            due_action(RESOLVED, after(3), &[]),
            Some(Action::Remind(Reminder::First)),
        );
    }

    #[test]
    fn sends_each_reminder_once() {
        let first = [notification::Kind::RappelValidation1];
        assert_eq!(due_action(RESOLVED, after(5), &first), None);
        assert_eq!(
            due_action(RESOLVED, after(7), &first),
            Some(Action::Remind(Reminder::Second)),
        );

        let second = [
            notification::Kind::RappelValidation1,
            notification::Kind::RappelValidation2,
        ];
        assert_eq!(due_action(RESOLVED, after(9), &second), None);
        assert_eq!(
            due_action(RESOLVED, after(10), &second),
            Some(Action::Remind(Reminder::Third)),
        );
        assert_eq!(due_action(RESOLVED, after(13), &Reminder::KINDS), None);
    }

    #[test]
    fn sends_latest_reminder_reached() {
        assert_eq!(
            due_action(RESOLVED, after(11), &[]),
            Some(Action::Remind(Reminder::Third)),
        );
    }

    #[test]
    fn auto_closes_after_two_weeks_regardless_of_reminders() {
        assert_eq!(due_action(RESOLVED, after(14), &[]), Some(Action::AutoClose));
        assert_eq!(
            due_action(RESOLVED, after(20), &Reminder::KINDS),
            Some(Action::AutoClose),
        );
    }

    #[test]
    fn maps_reminders_to_notification_kinds() {
        assert_eq!(Reminder::First.kind(), notification::Kind::RappelValidation1);
        assert_eq!(Reminder::Third.kind(), notification::Kind::RappelValidation3);
        assert_eq!(
            Reminder::ALL.map(Reminder::after_days),
            [3, 7, 10],
        );
    }

    fn creator(email: &str) -> User {
        User {
            id: user::Id::new(),
            name: "Alice".into(),
            role: user::Role::Utilisateur,
            login: "alice".into(),
            password_hash: user::PasswordHash::default(),
            email: email.into(),
            agency: None,
            phone: None,
            status: user::Status::Active,
            specialization: None,
        }
    }

    fn resolved_ticket(creator: &User) -> Ticket {
        Ticket {
            id: ticket::Id::new(),
            number: 12,
            title: "VPN".into(),
            description: "Connexion impossible".into(),
            kind: ticket::Kind::Applicatif,
            priority: ticket::Priority::Faible,
            status: ticket::Status::Resolu,
            creator: creator.id,
            technician: None,
            secretary: None,
            user_agency: None,
            created_at: RESOLVED,
            assigned_at: None,
            resolved_at: Some(RESOLVED),
            closed_at: None,
            auto_closed_at: None,
            feedback_score: None,
            feedback_comment: None,
        }
    }

    #[test]
    fn reminds_creator_by_inbox_and_email() {
        let alice = creator("alice@example.com");
        let ticket = resolved_ticket(&alice);

        let outcome = reminder(&ticket, &alice, Reminder::Second, after(7)).unwrap();

        assert!(outcome.history.is_none());
        assert_eq!(outcome.notifications.len(), 1);
        let sent = &outcome.notifications[0];
        assert_eq!(sent.user, alice.id);
        assert_eq!(sent.kind, notification::Kind::RappelValidation2);
        assert_eq!(sent.ticket, Some(ticket.id));
        assert_eq!(
            sent.message,
            "Second rappel : Validation requise pour votre ticket #12",
        );
        assert_eq!(outcome.emails[0].to, ["alice@example.com"]);
        assert!(outcome.emails[0].body.contains("il y a 7 jours"));
    }

    #[test]
    fn skips_reminder_without_email() {
        let alice = creator("   ");
        let ticket = resolved_ticket(&alice);
        assert!(reminder(&ticket, &alice, Reminder::First, after(3)).is_none());
    }
}
