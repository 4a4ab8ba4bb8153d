mod error;
pub mod parser;
pub mod segmenter;
mod types;

pub use error::*;
pub use parser::ScriptParser;
pub use segmenter::{DEFAULT_PUNCTUATION_MARKS, segment_script, split_text};
pub use types::*;
