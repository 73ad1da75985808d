//! This crate implements the shared logic of a merged calendar month view.
//!
//! The page URL lists the calendar sources (`id`, `ics` and `color` repeated, plus `monthOffset`).
//! Every source is fetched through the `/parse` endpoint of the server, which flattens the upstream
//! iCalendar feed into [`CalendarEvent`]s. The browser frontend and the server both build on this
//! crate; the iCalendar client itself is behind the `client` feature.

pub mod adapter;
pub mod color;
pub mod configure;
mod error;
pub mod event;
#[cfg(feature = "client")]
pub mod ics_client;
pub mod refresh;
pub mod source;
pub mod status;
pub mod view;

pub use error::{Error, Result};
pub use event::CalendarEvent;
