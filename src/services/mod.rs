pub mod batch_validator;
pub mod name_validator;
pub mod portfolio_service;
pub mod retry;
pub mod validation_cache;
