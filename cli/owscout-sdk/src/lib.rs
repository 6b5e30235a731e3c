//! Domain layer of the owscout catalogue search workflow.
//!
//! The modules here sit between the CSW client crate and the CLI: the
//! connection registry, the paged search session, the per-record service
//! classifier, and the OWS capabilities probe used before registering a
//! discovered service.

pub mod data;
pub mod models;
pub mod providers;
