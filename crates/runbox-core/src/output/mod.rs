//! Result formatting and output truncation

mod formatter;
mod truncator;

pub use formatter::{ResultFormatter, human_bytes, status_glyph};
pub use truncator::{
    SmartTruncation, TRUNCATION_MARKER, smart_truncate, truncate_head, truncate_output,
    truncate_str,
};
