// decode.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! GIF container parsing
use crate::block::*;
use crate::error::{Error, Result};
use crate::lzw;
use crate::subblock::Cursor;
use std::io::Read;

/// Image separator (0x2C)
const IMAGE_SEPARATOR: u8 = b',';

/// Extension introducer (0x21)
const EXTENSION_INTRODUCER: u8 = b'!';

/// GIF trailer (0x3B)
const TRAILER: u8 = b';';

/// Extension labels
const PLAIN_TEXT: u8 = 0x01;
const GRAPHIC_CONTROL: u8 = 0xF9;
const COMMENT: u8 = 0xFE;
const APPLICATION: u8 = 0xFF;

/// Policy for a frame whose decoded size does not match its dimensions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Stop parsing the document
    #[default]
    Abort,
    /// Drop the frame and keep parsing
    Discard,
}

/// GIF file decoder
///
/// ## Example
/// ```
/// use gifcast::Decoder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let gif = &[
/// #   0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00,
/// #   0x02, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00, 0x00,
/// #   0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00,
/// #   0x02, 0x00, 0x02, 0x00, 0x00, 0x02, 0x03, 0x0c,
/// #   0x10, 0x05, 0x00, 0x3b,
/// # ][..];
/// // ... open a `File` as "gif"
/// let decoded = Decoder::new(gif).decode()?;
/// let doc = decoded.into_document()?;
/// for step in doc.steps() {
///     let step = step?;
///     // ... present step.as_u8_slice() for step.delay_ms()
/// }
/// # Ok(())
/// # }
/// ```
pub struct Decoder<R: Read> {
    /// Reader for input data
    reader: R,
    /// Maximum image size, in pixels
    max_image_sz: Option<usize>,
    /// Frame size mismatch policy
    mismatch_policy: MismatchPolicy,
}

/// Result of parsing a GIF stream.
///
/// Blocks parsed before an error are kept, so a viewer can show whatever
/// decoded successfully.
#[derive(Debug)]
pub struct Decoded {
    /// Parsed document (possibly partial)
    pub document: GifDocument,
    /// Error which stopped parsing
    pub error: Option<Error>,
    /// Frames dropped by [MismatchPolicy::Discard]
    pub discarded: Vec<Error>,
}

impl Decoded {
    /// Get the document, unless parsing stopped on an error.
    ///
    /// A missing trailer is tolerated; check
    /// [truncated](struct.GifDocument.html#method.truncated).
    pub fn into_document(self) -> Result<GifDocument> {
        match self.error {
            None | Some(Error::UnexpectedEof) => Ok(self.document),
            Some(e) => Err(e),
        }
    }
}

impl<R: Read> Decoder<R> {
    /// Create a new GIF decoder.
    pub fn new(reader: R) -> Self {
        Decoder {
            reader,
            max_image_sz: Some(1 << 25),
            mismatch_policy: MismatchPolicy::default(),
        }
    }

    /// Set the maximum image size (in pixels) to allow for decoding.
    pub fn max_image_sz(mut self, max_image_sz: Option<usize>) -> Self {
        self.max_image_sz = max_image_sz;
        self
    }

    /// Set the policy for frames with mismatched size.
    pub fn mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    /// Read and parse the whole stream.
    ///
    /// Fails only if the preamble (header, logical screen descriptor and
    /// global color table) cannot be parsed; later errors are reported in
    /// [Decoded](struct.Decoded.html).
    pub fn decode(mut self) -> Result<Decoded> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Parser {
            cursor: Cursor::new(&buf),
            max_image_sz: self.max_image_sz,
            mismatch_policy: self.mismatch_policy,
        }
        .parse()
    }
}

impl GifDocument {
    /// Parse a GIF from a byte slice, with default decoder options.
    pub fn parse(bytes: &[u8]) -> Result<Decoded> {
        Decoder::new(bytes).decode()
    }
}

/// Remove a graphic control not yet applied to any frame
fn drop_pending_control(blocks: &mut Vec<Block>) {
    let pos = blocks.iter().rposition(|b| {
        matches!(b, Block::GraphicControl(_) | Block::ImageFrame(_))
    });
    if let Some(pos) = pos {
        if let Block::GraphicControl(_) = blocks[pos] {
            blocks.remove(pos);
        }
    }
}

/// Container parser state
struct Parser<'a> {
    cursor: Cursor<'a>,
    max_image_sz: Option<usize>,
    mismatch_policy: MismatchPolicy,
}

impl<'a> Parser<'a> {
    /// Parse preamble, then blocks until the trailer
    fn parse(&mut self) -> Result<Decoded> {
        let mut document = self.parse_preamble()?;
        let mut discarded = vec![];
        let error = loop {
            match self.parse_block() {
                Ok(Some(block)) => document.blocks.push(block),
                Ok(None) => break None,
                Err(e @ Error::FrameSizeMismatch { .. })
                    if self.mismatch_policy == MismatchPolicy::Discard =>
                {
                    warn!("frame discarded: {}", e);
                    drop_pending_control(&mut document.blocks);
                    discarded.push(e);
                }
                Err(e) => {
                    if matches!(e, Error::UnexpectedEof | Error::TruncatedStream)
                    {
                        document.truncated = true;
                    }
                    warn!("parsing stopped at {}: {}", self.cursor.pos(), e);
                    break Some(e);
                }
            }
        };
        Ok(Decoded {
            document,
            error,
            discarded,
        })
    }

    /// Parse header, logical screen descriptor and global color table
    fn parse_preamble(&mut self) -> Result<GifDocument> {
        let sig = self
            .cursor
            .read_bytes(6)
            .map_err(|_| Error::UnsupportedFormat)?;
        let version = match sig {
            b"GIF87a" => *b"87a",
            b"GIF89a" => *b"89a",
            _ => return Err(Error::UnsupportedFormat),
        };
        let width = self.cursor.read_u16()?;
        let height = self.cursor.read_u16()?;
        self.check_image_sz(width, height)?;
        let flags = self.cursor.read_u8()?;
        let background_color_idx = self.cursor.read_u8()?;
        let pixel_aspect_ratio = self.cursor.read_u8()?;
        debug!("screen : {}x{} flags 0x{:02X}", width, height, flags);
        let global_color_table = if flags & 0b1000_0000 != 0 {
            let sorted = flags & 0b0000_1000 != 0;
            Some(self.parse_color_table(flags, sorted)?)
        } else {
            None
        };
        Ok(GifDocument {
            version,
            width,
            height,
            color_resolution: ((flags & 0b0111_0000) >> 4) + 1,
            background_color_idx,
            pixel_aspect_ratio,
            global_color_table,
            blocks: vec![],
            truncated: false,
        })
    }

    /// Check image size (in pixels) against the limit
    fn check_image_sz(&self, width: u16, height: u16) -> Result<usize> {
        let image_sz = usize::from(width) * usize::from(height);
        match self.max_image_sz {
            Some(sz) if image_sz > sz => Err(Error::TooLargeImage),
            _ => Ok(image_sz),
        }
    }

    /// Parse a color table with size from packed flags
    fn parse_color_table(&mut self, flags: u8, sorted: bool) -> Result<ColorTable> {
        let len = table_len(flags);
        let colors = self.cursor.read_bytes(len * 3)?;
        Ok(ColorTable::with_colors(colors).with_sorted(sorted))
    }

    /// Parse one block, or `None` at the trailer
    fn parse_block(&mut self) -> Result<Option<Block>> {
        loop {
            if self.cursor.is_empty() {
                return Err(Error::UnexpectedEof);
            }
            let introducer = self.cursor.read_u8()?;
            debug!("  block  : 0x{:02X} at {}", introducer, self.cursor.pos());
            let block = match introducer {
                IMAGE_SEPARATOR => self.parse_image()?.into(),
                EXTENSION_INTRODUCER => match self.parse_extension()? {
                    Some(b) => b,
                    None => continue,
                },
                TRAILER => return Ok(None),
                _ => return Err(Error::MalformedBlock(introducer)),
            };
            return Ok(Some(block));
        }
    }

    /// Parse an image descriptor, color table and image data
    fn parse_image(&mut self) -> Result<ImageFrame> {
        let left = self.cursor.read_u16()?;
        let top = self.cursor.read_u16()?;
        let width = self.cursor.read_u16()?;
        let height = self.cursor.read_u16()?;
        let flags = self.cursor.read_u8()?;
        let interlaced = flags & 0b0100_0000 != 0;
        let local_color_table = if flags & 0b1000_0000 != 0 {
            let sorted = flags & 0b0010_0000 != 0;
            Some(self.parse_color_table(flags, sorted)?)
        } else {
            None
        };
        let image_sz = self.check_image_sz(width, height)?;
        let min_code_bits = self.cursor.read_u8()?;
        let data = self.cursor.read_sub_blocks()?;
        debug!(
            "  image  : {}x{} at {},{} ({} bytes)",
            width,
            height,
            left,
            top,
            data.len()
        );
        let indices = lzw::decompress(min_code_bits, &data, image_sz)?;
        Ok(ImageFrame::new(left, top, width, height, indices)?
            .with_interlaced(interlaced)
            .with_local_color_table(local_color_table))
    }

    /// Parse an extension block, or `None` if it is skipped
    fn parse_extension(&mut self) -> Result<Option<Block>> {
        let label = self.cursor.read_u8()?;
        match label {
            GRAPHIC_CONTROL => Ok(Some(self.parse_graphic_control()?.into())),
            APPLICATION => Ok(Some(self.parse_application()?.into())),
            COMMENT => Ok(Some(self.parse_comment()?.into())),
            PLAIN_TEXT => {
                let sz = self.cursor.read_u8()?;
                self.cursor.read_bytes(sz.into())?;
                self.cursor.skip_sub_blocks()?;
                debug!("  plain text skipped");
                Ok(None)
            }
            _ => Err(Error::UnrecognizedExtension(label)),
        }
    }

    /// Parse a graphic control extension
    fn parse_graphic_control(&mut self) -> Result<GraphicControl> {
        if self.cursor.read_u8()? != 4 {
            return Err(Error::MalformedGraphicControl);
        }
        let b = self.cursor.read_bytes(4)?;
        let delay = u16::from_le_bytes([b[1], b[2]]);
        let control = GraphicControl::new(b[0], delay, b[3]);
        let extra = self.cursor.read_sub_blocks()?;
        if !extra.is_empty() {
            warn!("graphic control: {} extra bytes ignored", extra.len());
        }
        Ok(control)
    }

    /// Parse an application extension
    fn parse_application(&mut self) -> Result<Application> {
        let sz = self.cursor.read_u8()?;
        let header = self.cursor.read_bytes(sz.into())?;
        if header.len() != 11 {
            warn!("application header size {}", header.len());
        }
        let mut app_id = [0; 8];
        let mut auth_code = [0; 3];
        for (i, b) in header.iter().take(11).enumerate() {
            match i {
                0..=7 => app_id[i] = *b,
                _ => auth_code[i - 8] = *b,
            }
        }
        let sub_blocks = self.cursor.read_sub_block_list()?;
        Ok(Application::new(app_id, auth_code, sub_blocks))
    }

    /// Parse a comment extension
    fn parse_comment(&mut self) -> Result<Comment> {
        let mut comment = Comment::default();
        self.cursor.for_each_sub_block(|b| comment.add_comment(b))?;
        for c in comment.comments() {
            info!("comment: {}", c);
        }
        Ok(comment)
    }
}

/// Builder for GIF test streams
#[cfg(test)]
pub(crate) mod fixture {
    use crate::lzw::pack_literals;

    pub struct GifBuilder {
        buf: Vec<u8>,
    }

    /// Packed size exponent for a color table
    fn size_bits(colors: &[u8]) -> u8 {
        let len = colors.len() / 3;
        len.trailing_zeros() as u8 - 1
    }

    impl GifBuilder {
        pub fn new(width: u16, height: u16, gct: Option<&[u8]>, bg: u8) -> Self {
            let mut buf = b"GIF89a".to_vec();
            buf.extend(width.to_le_bytes());
            buf.extend(height.to_le_bytes());
            match gct {
                Some(c) => {
                    let bits = size_bits(c);
                    buf.extend([0x80 | (bits << 4) | bits, bg, 0]);
                    buf.extend(c);
                }
                None => buf.extend([0, bg, 0]),
            }
            GifBuilder { buf }
        }

        pub fn raw(mut self, bytes: &[u8]) -> Self {
            self.buf.extend(bytes);
            self
        }

        pub fn graphic_control(self, flags: u8, delay: u16, idx: u8) -> Self {
            let [lo, hi] = delay.to_le_bytes();
            self.raw(&[0x21, 0xF9, 4, flags, lo, hi, idx, 0])
        }

        pub fn comment(mut self, text: &str) -> Self {
            self.buf.extend([0x21, 0xFE]);
            self.sub_blocks(text.as_bytes())
        }

        pub fn looping(self, count: u16) -> Self {
            let [lo, hi] = count.to_le_bytes();
            self.raw(&[0x21, 0xFF, 11])
                .raw(b"NETSCAPE2.0")
                .raw(&[3, 1, lo, hi, 0])
        }

        pub fn image(
            mut self,
            rect: (u16, u16, u16, u16),
            interlaced: bool,
            lct: Option<&[u8]>,
            min_code_bits: u8,
            indices: &[u8],
        ) -> Self {
            let (left, top, width, height) = rect;
            self.buf.push(0x2C);
            for v in [left, top, width, height] {
                self.buf.extend(v.to_le_bytes());
            }
            let mut flags = if interlaced { 0x40 } else { 0 };
            if let Some(c) = lct {
                flags |= 0x80 | size_bits(c);
            }
            self.buf.push(flags);
            if let Some(c) = lct {
                self.buf.extend(c);
            }
            self.buf.push(min_code_bits);
            let data = pack_literals(min_code_bits, indices, &[]);
            self.sub_blocks(&data)
        }

        pub fn sub_blocks(mut self, data: &[u8]) -> Self {
            for chunk in data.chunks(255) {
                self.buf.push(chunk.len() as u8);
                self.buf.extend(chunk);
            }
            self.buf.push(0);
            self
        }

        pub fn build(self) -> Vec<u8> {
            self.buf
        }

        pub fn trailer(self) -> Vec<u8> {
            self.raw(&[0x3B]).build()
        }
    }

    /// Four color palette: black, red, green, blue
    pub const PALETTE: [u8; 12] = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];

    /// Interlaced 5x11 image with real LZW compression.
    ///
    /// Index at row `y`, column `x` is `(x + 2 * y) % 4`.
    pub const INTERLACED: [u8; 53] = [
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x05, 0x00, 0x0B, 0x00, 0x91,
        0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00,
        0x00, 0x00, 0xFF, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x0B,
        0x00, 0x40, 0x02, 0x0E, 0x44, 0x34, 0x60, 0xA8, 0x97, 0xFB, 0x5C,
        0x63, 0xEC, 0x54, 0x71, 0x73, 0x3A, 0x05, 0x00, 0x3B,
    ];

    /// 10x10 single frame, 4 colors
    pub const SIMPLE: [u8; 69] = [
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x0A, 0x00, 0x0A, 0x00, 0x91,
        0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF,
        0x00, 0x00, 0x00, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x2C, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x0A, 0x00, 0x00, 0x02,
        0x16, 0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0, 0x02,
        0x75, 0xEC, 0x95, 0xFA, 0xA8, 0xDE, 0x60, 0x8C, 0x04, 0x91, 0x4C,
        0x01, 0x00, 0x3B,
    ];
}
