pub mod api;
pub mod assistant;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod retrieve;
pub mod triage;
