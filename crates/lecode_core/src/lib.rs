pub mod bounds;
pub mod config;
pub mod core_api;
pub mod error;
pub mod layout;
pub mod lecode;
pub mod lex;
pub mod reader;

pub use config::{TOOL_VERSION, ToolConfig};
pub use error::{FormatError, FormatWarning};
pub use lecode::Document;
pub use lex::LexContainer;
