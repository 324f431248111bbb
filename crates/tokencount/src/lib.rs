pub mod counter;

pub use counter::{image_tokens, TokenCounter};
