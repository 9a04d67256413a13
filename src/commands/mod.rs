// Stack commands: preview, up, graph, scenarios
pub mod stack;

// Configuration commands
pub mod config;
