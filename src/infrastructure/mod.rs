// Infrastructure layer - implements interfaces defined in the domain layer
pub mod broadcast_update_sink;
pub mod logging;
pub mod persistence;
pub mod repositories;
