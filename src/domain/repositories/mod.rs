// Repository interfaces implemented by the infrastructure layer or the host
pub mod background_remote_repository;
pub mod file_repository;
pub mod key_value_repository;
