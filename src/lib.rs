//! Chat background selection and synchronization
//!
//! [`BackgroundService`] is the entry point: a clonable handle to a single
//! manager task that owns the installed backgrounds and the per-theme
//! selection. The host supplies the remote API and the file subsystem through
//! the traits in [`domain::repositories`]. [`app::AppState`] wires the service
//! to file-backed stores under a data root.

pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use app::AppState;
pub use application::errors::ApplicationError;
pub use application::services::background_service::{
    BackgroundService, BackgroundServiceDependencies, BackgroundUpdateSink,
};
pub use domain::errors::DomainError;
