//! Chill Panda backend: a wellness-companion chat API with
//! retrieval-augmented generation.

pub mod chat;
pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
