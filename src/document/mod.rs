//! The host's saved workflow format, and the conversion seam for other formats.

pub mod conversion;
pub mod format;

pub use conversion::*;
pub use format::*;
