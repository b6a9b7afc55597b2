pub mod catalog;
pub mod config;
pub mod language;
pub mod metrics;
pub mod model;
pub mod openai;
pub mod pipeline;
pub mod planner;
pub mod reply;
pub mod requester;
pub mod retry;
pub mod validator;
