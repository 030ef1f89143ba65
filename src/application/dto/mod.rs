// Data Transfer Objects
pub mod background_dto;
