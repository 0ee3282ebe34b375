pub mod config;
pub mod invocation;
pub mod scarf;
