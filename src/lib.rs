//! Contact dashboard for brand ambassadors, backed by the HubSpot CRM API.
//!
//! The crate is toolkit independent: [`dashboard::Dashboard`] owns the
//! contact store and the location synchronizer and drives every user
//! operation against a [`api::ContactsApi`] implementation. The GTK front end
//! lives in the binary behind the `ui` feature.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod forms;
pub mod location;
pub mod meetings;
pub mod store;
pub mod utils;

pub use api::client::HubSpotClient;
pub use api::ContactsApi;
pub use config::{Brand, Session, Settings};
pub use dashboard::{Dashboard, DashboardView};
pub use error::{ApiError, MutationFailure};
