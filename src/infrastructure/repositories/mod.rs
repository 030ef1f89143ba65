pub mod file_key_value_repository;
