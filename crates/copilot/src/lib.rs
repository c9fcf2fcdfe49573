//! Conversational client for the Risk RAG Copilot document-QA service.
//!
//! The library holds the conversation state machine and the asynchronous
//! request lifecycle; `copilotctl` is the shell that drives it.

pub mod app;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod history;
pub mod notify;
pub mod poller;
pub mod render;
pub mod state;
