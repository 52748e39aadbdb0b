//! Conversations: the ownership guard and the turn orchestrator.

pub mod ownership;
pub mod service;
