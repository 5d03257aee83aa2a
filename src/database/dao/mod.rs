pub mod providers;
pub mod routing_rules;
