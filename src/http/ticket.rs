use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use itertools::Itertools as _;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    api, db,
    db::{ticket::Filter, user::Role},
    lifecycle,
};

use super::{AuthClaims, Page, SharedAppState};

/// Attaches their creator and technician to tickets.
async fn views<E>(
    db_client: &db::Client,
    tickets: Vec<db::Ticket>,
) -> Result<Vec<api::Ticket>, E>
where
    E: From<db::Error> + From<api::user::Id>,
{
    let user_ids = tickets
        .iter()
        .map(|ticket| ticket.creator)
        .chain(tickets.iter().filter_map(|ticket| ticket.technician))
        .unique()
        .collect::<Vec<_>>();
    let users = db_client.get_users_by_ids(&user_ids).await?;

    tickets
        .into_iter()
        .map(|ticket| {
            let creator =
                users.get(&ticket.creator).ok_or(ticket.creator)?;
            let technician = ticket
                .technician
                .map(|id| users.get(&id).ok_or(id))
                .transpose()?;
            Ok::<_, E>(api::Ticket::new(
                ticket,
                api::User::from(creator),
                technician.map(api::User::from),
            ))
        })
        .collect()
}

async fn view<E>(
    db_client: &db::Client,
    ticket: db::Ticket,
) -> Result<api::Ticket, E>
where
    E: From<db::Error> + From<api::user::Id>,
{
    let id = ticket.creator;
    views::<E>(db_client, vec![ticket])
        .await?
        .pop()
        .ok_or_else(|| E::from(id))
}

/// Creators, their technician and agents may look at a ticket.
fn can_view(ticket: &db::Ticket, user: &db::User) -> bool {
    ticket.creator == user.id
        || ticket.technician == Some(user.id)
        || user.role.is_agent()
}

async fn list(
    state: &SharedAppState,
    filter: Filter,
    Page { offset, limit }: Page,
) -> Result<api::ticket::List, ListTicketsError> {
    let page_fut = state.db_client.get_tickets_page(filter, offset, limit);
    let total_count_fut = state.db_client.get_tickets_count(filter);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    Ok(api::ticket::List {
        tickets: views::<ListTicketsError>(&state.db_client, page).await?,
        total_count,
    })
}

pub(super) async fn list_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(page): Query<Page>,
) -> Result<Json<api::ticket::List>, ListTicketsError> {
    use ListTicketsError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    if !my.role.is_agent() {
        return Err(E::Forbidden);
    }

    Ok(Json(list(&state, Filter::All, page).await?))
}

pub(super) async fn list_my_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(page): Query<Page>,
) -> Result<Json<api::ticket::List>, ListTicketsError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(ListTicketsError::Unauthorized)?;

    Ok(Json(list(&state, Filter::CreatedBy(my.id), page).await?))
}

pub(super) async fn list_assigned_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(page): Query<Page>,
) -> Result<Json<api::ticket::List>, ListTicketsError> {
    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(ListTicketsError::Unauthorized)?;

    Ok(Json(list(&state, Filter::AssignedTo(my.id), page).await?))
}

#[derive(Debug, From)]
pub enum ListTicketsError {
    #[from]
    DbError(db::Error),
    Forbidden,
    Unauthorized,
    #[from]
    UserNotFound(api::user::Id),
}

impl IntoResponse for ListTicketsError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
pub(super) struct AddTicketInput {
    title: String,
    description: String,
    #[serde(rename = "type")]
    kind: api::ticket::Kind,
    priority: api::ticket::Priority,
}

pub(super) async fn add_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(AddTicketInput {
        title,
        description,
        kind,
        priority,
    }): Json<AddTicketInput>,
) -> Result<Json<api::Ticket>, AddTicketError> {
    use AddTicketError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    if title.trim().is_empty() {
        return Err(E::TitleRequired);
    }

    let number = state.db_client.next_ticket_number().await?;
    let triage = state
        .db_client
        .get_active_users_by_roles(&Role::TRIAGE)
        .await?;
    let (ticket, outcome) = lifecycle::create(
        lifecycle::Draft {
            title,
            description,
            kind,
            priority,
        },
        number,
        &my,
        &triage,
        OffsetDateTime::now_utc(),
    )?;

    state
        .db_client
        .insert_ticket(
            &ticket,
            outcome.history.as_ref(),
            &outcome.notifications,
        )
        .await?;
    state.mailer.dispatch(outcome.emails);

    tracing::info!(
        number = ticket.number,
        creator = %my.login,
        "ticket created",
    );
    Ok(Json(api::Ticket::new(ticket, api::User::from(&my), None)))
}

#[derive(Debug, From)]
pub enum AddTicketError {
    #[from]
    DbError(db::Error),
    #[from]
    Lifecycle(lifecycle::Error),
    TitleRequired,
    Unauthorized,
}

impl IntoResponse for AddTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::Lifecycle(e) => lifecycle_response(e),
            Self::TitleRequired => StatusCode::BAD_REQUEST.into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::DbError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn lifecycle_response(e: lifecycle::Error) -> Response {
    let status = if e.is_permission() {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, e.to_string()).into_response()
}

pub(super) async fn get_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, GetTicketError> {
    use GetTicketError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;
    if !can_view(&ticket, &my) {
        return Err(E::Forbidden);
    }

    Ok(Json(view::<GetTicketError>(&state.db_client, ticket).await?))
}

#[derive(Debug, From)]
pub enum GetTicketError {
    #[from]
    DbError(db::Error),
    Forbidden,
    TicketNotFound,
    Unauthorized,
    #[from]
    UserNotFound(api::user::Id),
}

impl IntoResponse for GetTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignInput {
    technician_id: api::user::Id,
    reason: Option<String>,
    notes: Option<String>,
}

/// Unlike assignment, reopening carries no instructions.
#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(super) struct ReopenInput {
    technician_id: api::user::Id,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
pub(super) enum EditTicketInput {
    Assign(AssignInput),
    Reassign(AssignInput),
    Escalate,
    Start,
    AcceptAssignment,
    RejectAssignment {
        reason: Option<String>,
    },
    Resolve {
        summary: Option<String>,
    },
    Close,
    Validate,
    Reject {
        reason: String,
    },
    Reopen(ReopenInput),
    Feedback {
        score: i16,
        comment: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SetStatus {
        status: api::ticket::Status,
        resolution_summary: Option<String>,
    },
}

impl EditTicketInput {
    fn technician_id(&self) -> Option<api::user::Id> {
        match self {
            Self::Assign(AssignInput { technician_id, .. })
            | Self::Reassign(AssignInput { technician_id, .. })
            | Self::Reopen(ReopenInput { technician_id, .. }) => {
                Some(*technician_id)
            }
            _ => None,
        }
    }
}

/// Applies one lifecycle operation. The ticket stays locked from the
/// status check to the write, so concurrent operations cannot both act on
/// the same prior status.
pub(super) async fn edit_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
    Json(op): Json<EditTicketInput>,
) -> Result<Json<api::Ticket>, EditTicketError> {
    use EditTicketError as E;
    use EditTicketInput as Op;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    let technician = match op.technician_id() {
        Some(id) => Some(
            state
                .db_client
                .get_user_by_id(id)
                .await?
                .ok_or(E::TechnicianNotFound)?,
        ),
        None => None,
    };
    let managers = match op {
        Op::Escalate => {
            state
                .db_client
                .get_active_users_by_roles(&Role::ESCALATION)
                .await?
        }
        _ => Vec::new(),
    };

    let now = OffsetDateTime::now_utc();
    let step = |ticket: &mut db::Ticket| -> Result<lifecycle::Outcome, E> {
        let assignee = || technician.as_ref().ok_or(E::TechnicianNotFound);
        let outcome = match op {
            Op::Assign(AssignInput { reason, notes, .. }) => {
                lifecycle::assign(
                    ticket,
                    &my,
                    assignee()?,
                    reason.as_deref(),
                    notes.as_deref(),
                    now,
                )?
            }
            Op::Reassign(AssignInput { reason, notes, .. }) => {
                lifecycle::reassign(
                    ticket,
                    &my,
                    assignee()?,
                    reason.as_deref(),
                    notes.as_deref(),
                    now,
                )?
            }
            Op::Escalate => lifecycle::escalate(ticket, &my, &managers, now)?,
            Op::Start => lifecycle::start(ticket, &my, now)?,
            Op::AcceptAssignment => {
                lifecycle::accept_assignment(ticket, &my, now)?
            }
            Op::RejectAssignment { reason } => {
                lifecycle::reject_assignment(ticket, &my, reason.as_deref(), now)?
            }
            Op::Resolve { summary } => {
                lifecycle::resolve(ticket, &my, summary.as_deref(), now)?
            }
            Op::Close => lifecycle::close(ticket, &my, now)?,
            Op::Validate => lifecycle::validate(ticket, &my, now)?,
            Op::Reject { reason } => {
                lifecycle::reject(ticket, &my, &reason, now)?
            }
            Op::Reopen(ReopenInput { reason, .. }) => lifecycle::reopen(
                ticket,
                &my,
                assignee()?,
                reason.as_deref(),
                now,
            )?,
            Op::Feedback { score, comment } => {
                lifecycle::feedback(ticket, &my, score, comment)?
            }
            Op::SetStatus {
                status,
                resolution_summary,
            } => lifecycle::set_status(
                ticket,
                &my,
                status,
                resolution_summary.as_deref(),
                now,
            )?,
        };
        Ok(outcome)
    };

    let (ticket, outcome) = state
        .db_client
        .update_ticket(id, step)
        .await?
        .ok_or(E::TicketNotFound)?;
    state.mailer.dispatch(outcome.emails);

    tracing::info!(
        number = ticket.number,
        status = %ticket.status,
        actor = %my.login,
        "ticket updated",
    );
    Ok(Json(view::<EditTicketError>(&state.db_client, ticket).await?))
}

#[derive(Debug, From)]
pub enum EditTicketError {
    #[from]
    DbError(db::Error),
    #[from]
    Lifecycle(lifecycle::Error),
    TechnicianNotFound,
    TicketNotFound,
    Unauthorized,
    #[from]
    UserNotFound(api::user::Id),
}

impl IntoResponse for EditTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::Lifecycle(e) => lifecycle_response(e),
            Self::TechnicianNotFound | Self::TicketNotFound => {
                StatusCode::NOT_FOUND.into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Loads a ticket the caller may look at.
async fn visible_ticket(
    state: &SharedAppState,
    auth_claims: AuthClaims,
    id: api::ticket::Id,
) -> Result<(db::Ticket, db::User), TicketDetailsError> {
    use TicketDetailsError as E;

    let my = auth_claims
        .user(&state.db_client)
        .await?
        .ok_or(E::Unauthorized)?;
    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;
    if !can_view(&ticket, &my) {
        return Err(E::Forbidden);
    }
    Ok((ticket, my))
}

pub(super) async fn get_history(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<Vec<api::ticket::History>>, TicketDetailsError> {
    let (ticket, _) = visible_ticket(&state, auth_claims, id).await?;
    let history = state.db_client.get_history(ticket.id).await?;

    Ok(Json(
        history.into_iter().map(api::ticket::History::from).collect(),
    ))
}

pub(super) async fn get_comments(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<Vec<api::ticket::Comment>>, TicketDetailsError> {
    let (ticket, _) = visible_ticket(&state, auth_claims, id).await?;
    let comments = state.db_client.get_comments(ticket.id).await?;

    Ok(Json(
        comments.into_iter().map(api::ticket::Comment::from).collect(),
    ))
}

#[derive(Deserialize)]
pub(super) struct AddCommentInput {
    content: String,
    #[serde(default, rename = "type")]
    kind: api::ticket::CommentKind,
}

pub(super) async fn add_comment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
    Json(AddCommentInput { content, kind }): Json<AddCommentInput>,
) -> Result<Json<api::ticket::Comment>, TicketDetailsError> {
    let (ticket, my) = visible_ticket(&state, auth_claims, id).await?;
    if content.trim().is_empty() {
        return Err(TicketDetailsError::ContentRequired);
    }

    let comment = db::Comment {
        id: db::comment::Id::new(),
        ticket: ticket.id,
        user: my.id,
        content,
        kind,
        created_at: OffsetDateTime::now_utc(),
    };
    state.db_client.write_comment(&comment).await?;

    Ok(Json(api::ticket::Comment::from(comment)))
}

#[derive(Debug, From)]
pub enum TicketDetailsError {
    ContentRequired,
    #[from]
    DbError(db::Error),
    Forbidden,
    TicketNotFound,
    Unauthorized,
}

impl IntoResponse for TicketDetailsError {
    fn into_response(self) -> Response {
        match self {
            Self::ContentRequired => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}
