//! CodeLess framing: assembling outbound command text and decoding inbound
//! notifications/reads into lines.

mod frame;
mod line;
mod prefix;

pub use frame::{FramingConfig, assemble, assemble_custom, translate_newlines};
pub use line::decode_lines;
pub use prefix::Prefix;
