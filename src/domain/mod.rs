// Domain layer - core models and the interfaces of outside collaborators
pub mod errors;
pub mod models;
pub mod repositories;
