mod provider_model;
mod route_model;

pub use provider_model::*;
pub use route_model::*;
