pub mod el4000;
pub mod types;

pub use el4000::{BlockScanner, El4000};
pub use types::{Block, BlockHeader, HeaderPolicy, Log, ParseError, Parseable, Row, Sample};
