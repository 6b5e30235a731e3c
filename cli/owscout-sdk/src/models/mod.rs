pub mod connections;
pub mod search;
pub mod services;
