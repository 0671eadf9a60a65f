// src/chatroom/mod.rs

pub mod agent;
pub mod analytics;
pub mod chat_room;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod context_window;
pub mod error;
pub mod event;
pub mod generator;
pub mod prompts;
pub mod session;
pub mod session_store;
pub mod structured;
pub mod transcript;

// Let's explicitly export ChatRoom so we don't have to access it via chatroom::chat_room::ChatRoom
// and instead as chatroom::ChatRoom
pub use chat_room::ChatRoom;
