pub mod analysis;
pub mod articles;
pub mod llm_profiles;
pub mod sources;
