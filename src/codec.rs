//! Compression codecs for posting data.
//!
//! Currently a single codec lives here: the Elias-gamma code used by the
//! posting store for gap-compressed document ID lists.

pub mod gamma;
