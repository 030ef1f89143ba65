pub mod background;
pub mod background_type;
