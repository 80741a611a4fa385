pub mod grammar;
pub mod items;
pub mod preprocess;
pub mod rewriter;
