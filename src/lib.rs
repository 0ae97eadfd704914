//! Openchat - multi-provider LLM chat client and relay server

pub mod cli;
pub mod config;
pub mod error;
pub mod id;
pub mod provider;
pub mod server;
pub mod session;
pub mod sse;
pub mod storage;
pub mod submission;
pub mod title;
