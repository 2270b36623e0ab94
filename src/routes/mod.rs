pub mod admin;
pub mod health;
pub mod portfolios;
pub mod portfolios_v2;
