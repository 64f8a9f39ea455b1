//! GEDCOM-läsning: teckenkodning, rader, posträd och normalisering
//!
//! Stöder GEDCOM 5.5 och 5.5.1.

pub mod assembler;
pub mod date;
pub mod encoding;
pub mod lexer;
pub mod name;
pub mod node;
pub mod validate;

pub use assembler::{AssemblyWarning, RecordAssembler};
pub use date::{convert_gedcom_date, DateConversion, DatePrecision};
pub use encoding::{decode, detect_encoding, DecodedText, EncodingError, GedcomEncoding};
pub use lexer::{GedcomLine, LexError, Lexer};
pub use name::{process_gedcom_name, PersonName};
pub use node::{ImportRecord, RawNode, RecordKind, Xref};
pub use validate::{validate, HeaderInfo, ValidationReport};
