pub mod error;
pub mod lexer;
pub mod utils;
