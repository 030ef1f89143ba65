pub mod background_service;
