// lib.rs      gifcast crate.
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! GIF decoding and frame compositing.
//!
//! A GIF87a / GIF89a stream is parsed into a [GifDocument](block/struct.GifDocument.html)
//! of ordered blocks, then replayed by a [Compositor] into a sequence of
//! full-canvas RGBA [Step]s.
//!
//! ## Decoding Example
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let gif = &[
//! #   0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00,
//! #   0x02, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00, 0x00,
//! #   0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00,
//! #   0x02, 0x00, 0x02, 0x00, 0x00, 0x02, 0x03, 0x0c,
//! #   0x10, 0x05, 0x00, 0x3b,
//! # ][..];
//! let doc = gifcast::block::GifDocument::parse(gif)?.into_document()?;
//! assert_eq!((doc.width(), doc.height()), (2, 2));
//! for step in doc.steps() {
//!     let step = step?;
//!     assert_eq!(step.raster().width(), 2);
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod block;
mod compose;
mod decode;
mod error;
mod lzw;
pub mod queue;
mod subblock;

pub use crate::compose::{interlace_rows, Compositor, Step, Steps};
pub use crate::decode::{Decoded, Decoder, MismatchPolicy};
pub use crate::error::{Error, Result};
pub use crate::lzw::{decompress, Decompressor};
pub use crate::subblock::BitReader;
