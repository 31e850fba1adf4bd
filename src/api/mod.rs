pub mod health;
pub mod search;
pub mod validation;
