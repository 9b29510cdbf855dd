//! Image codec adapters.
//!
//! Decoding, resizing and animation handling go through the `image` crate;
//! WebP output is produced by libwebp via the `webp` crate.

pub mod codec;

pub use codec::StandardImageCodec;
