//! JSON shapes exchanged with the browser client.

pub mod notification;
pub mod settings;
pub mod ticket;
pub mod user;

pub use self::{notification::Notification, ticket::Ticket, user::User};
