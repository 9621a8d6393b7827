pub mod admin_handlers;
pub mod artwork_handlers;
pub mod health_handlers;
