pub mod bundle_handlers;
pub mod health_handlers;
