pub mod sexp;
pub mod board;
pub mod board_schema;

// Re-export for convenience
pub use sexp::{Node, SExpParser, ParseError};
pub use board::{BoardParser, BoardError};
pub use board_schema::*;
