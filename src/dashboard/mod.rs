mod dto;
pub mod handlers;
mod services;

pub use handlers::{customer_routes, profile_routes, seller_routes};
