pub mod config;
pub mod job;
pub mod lang;
pub mod parser;
pub mod pipeline;
pub mod routes;
pub mod sandbox;
pub mod scheduler;
pub mod script;
pub mod stage;
pub mod web_server;
