pub mod chunk_processor;
pub mod commit;
pub mod merger;
pub mod model_selector;
pub mod prompts;
pub mod smart_filter;
pub mod splitter;
pub mod tokens;

#[cfg(test)]
pub mod test_support;
