mod macro_expr;
pub mod parser;

pub use parser::{parse, parse_or_fail, GerberDocument};
