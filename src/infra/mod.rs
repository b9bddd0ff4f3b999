pub mod anthropic;
pub mod feedback;
pub mod gemini;
pub mod git;
pub mod llm;
pub mod openai;
pub mod retry;
