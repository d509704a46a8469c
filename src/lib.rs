//! Grievance - complaint triage engine
//!
//! Ingests free-text complaints, enriches them (formal rewrite, category,
//! severity tier, embedding) and groups semantically similar complaints into
//! issue clusters. The core pieces are the multi-signal severity scorer and the
//! incremental, embedding-based clustering engine with its maintenance jobs.

pub mod classify;
pub mod cli;
pub mod clustering;
pub mod complaint;
pub mod config;
pub mod embedding;
pub mod error;
pub mod lexicon;
pub mod llm;
pub mod pipeline;
pub mod severity;
pub mod storage;

pub use error::{GrievanceError, Result};
