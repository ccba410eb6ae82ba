pub mod engine;
pub mod postgres;
pub mod templates;
