pub mod migrate;
pub mod parser;
pub mod writer;

pub use migrate::{SchemaMigrator, fix_document, implicit_package};
pub use parser::{LenientParser, ParseError, ProfileParser, ProfileStore, StrictParser};
pub use writer::ProfileWriter;
