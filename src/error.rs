// error.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
use std::fmt;
use std::io;

/// Errors encountered while decoding or compositing
#[derive(Debug)]
pub enum Error {
    /// A wrapped I/O error.
    Io(io::Error),
    /// Signature is not "GIF87a" or "GIF89a".
    UnsupportedFormat,
    /// Unknown block introducer byte.
    MalformedBlock(u8),
    /// Unknown extension label.
    UnrecognizedExtension(u8),
    /// Stream ended in the middle of a structure.
    TruncatedStream,
    /// Compressed data ended before the end-of-information code.
    TruncatedCode,
    /// Stream ended before the trailer.
    UnexpectedEof,
    /// Decoded index count does not match frame dimensions.
    FrameSizeMismatch {
        /// Expected count (width × height)
        expected: usize,
        /// Decoded count
        actual: usize,
    },
    /// Undefined code received while the LZW dictionary is full.
    DictionaryOverflow,
    /// LZW code beyond the next free dictionary slot.
    InvalidLzwCode(u16),
    /// LZW minimum code size out of range.
    InvalidCodeSize(u8),
    /// Image larger than specified by
    /// [max_image_sz](struct.Decoder.html#method.max_image_sz).
    TooLargeImage,
    /// Frame has neither a local nor a global color table.
    MissingColorTable,
    /// [GraphicControl](block/struct.GraphicControl.html) block has invalid
    /// length.
    MalformedGraphicControl,
}

/// Gifcast result type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(fmt),
            Error::MalformedBlock(b) => {
                write!(fmt, "MalformedBlock: introducer 0x{b:02X}")
            }
            Error::UnrecognizedExtension(b) => {
                write!(fmt, "UnrecognizedExtension: label 0x{b:02X}")
            }
            Error::FrameSizeMismatch { expected, actual } => write!(
                fmt,
                "FrameSizeMismatch: expected {expected} indices, got {actual}"
            ),
            _ => fmt::Debug::fmt(self, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl Error {
    /// Check whether the error ends decoding of the whole document.
    ///
    /// A frame size mismatch is scoped to a single frame (the
    /// [MismatchPolicy](enum.MismatchPolicy.html) decides what happens next),
    /// and a missing trailer still leaves every block intact.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::FrameSizeMismatch { .. } | Error::UnexpectedEof)
    }
}
