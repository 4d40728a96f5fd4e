// block.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! GIF document and block types
use crate::error::{Error, Result};
use pix::rgb::SRgba8;

/// Number of channels in a color table entry
const CHANNELS: usize = 3;

/// Color table (global or local)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorTable {
    /// RGB triples
    colors: Vec<u8>,
    /// Table sorted by importance
    sorted: bool,
}

impl ColorTable {
    /// Create a color table from RGB triples.
    ///
    /// The number of entries must be a power of two between 2 and 256.
    pub fn with_colors(colors: &[u8]) -> Self {
        let len = colors.len() / CHANNELS;
        debug_assert_eq!(len * CHANNELS, colors.len());
        debug_assert!(len.is_power_of_two() && (2..=256).contains(&len));
        ColorTable {
            colors: colors.to_vec(),
            sorted: false,
        }
    }

    /// Adjust sort flag
    pub fn with_sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.colors.len() / CHANNELS
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Check if the table is sorted
    pub fn sorted(&self) -> bool {
        self.sorted
    }

    /// Get the raw RGB triples
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    /// Get an entry as an opaque RGBA color
    pub fn rgba(&self, idx: u8) -> Option<SRgba8> {
        let i = usize::from(idx) * CHANNELS;
        self.colors
            .get(i..i + CHANNELS)
            .map(|c| SRgba8::new(c[0], c[1], c[2], 0xFF))
    }
}

/// Number of entries for a packed color table size exponent
pub(crate) fn table_len(exponent: u8) -> usize {
    2 << (exponent & 0b0111)
}

/// Frame disposal method
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DisposalMethod {
    /// No disposal specified
    #[default]
    NoAction,
    /// Keep the frame in place
    Keep,
    /// Restore the frame rectangle to background color
    Background,
    /// Restore the canvas to its state before the frame
    Previous,
    /// Reserved value (4-7), handled like `Keep`
    Reserved(u8),
}

impl From<u8> for DisposalMethod {
    fn from(n: u8) -> Self {
        use self::DisposalMethod::*;
        match n & 0b0111 {
            0 => NoAction,
            1 => Keep,
            2 => Background,
            3 => Previous,
            _ => Reserved(n & 0b0111),
        }
    }
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        use self::DisposalMethod::*;
        match d {
            NoAction => 0,
            Keep => 1,
            Background => 2,
            Previous => 3,
            Reserved(n) => n & 0b0111,
        }
    }
}

/// Graphic control extension.
///
/// Applies to the next [ImageFrame](struct.ImageFrame.html) only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphicControl {
    flags: u8,
    delay_time_cs: u16, // delay in centiseconds (hundredths of a second)
    transparent_color_idx: u8,
}

impl GraphicControl {
    const DISPOSAL_METHOD: u8 = 0b0001_1100;
    const USER_INPUT: u8 = 0b0000_0010;
    const TRANSPARENT_COLOR: u8 = 0b0000_0001;

    /// Create a graphic control from its packed fields
    pub fn new(flags: u8, delay_time_cs: u16, transparent_color_idx: u8) -> Self {
        GraphicControl {
            flags,
            delay_time_cs,
            transparent_color_idx,
        }
    }

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn disposal_method(&self) -> DisposalMethod {
        ((self.flags & Self::DISPOSAL_METHOD) >> 2).into()
    }

    pub fn set_disposal_method(&mut self, disposal_method: DisposalMethod) {
        let d: u8 = disposal_method.into();
        self.flags = (self.flags & !Self::DISPOSAL_METHOD) | (d << 2);
    }

    pub fn user_input(&self) -> bool {
        self.flags & Self::USER_INPUT != 0
    }

    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }

    pub fn set_delay_time_cs(&mut self, delay_time_cs: u16) {
        self.delay_time_cs = delay_time_cs;
    }

    /// Get the transparent color index, if the transparency flag is set
    pub fn transparent_color(&self) -> Option<u8> {
        if self.flags & Self::TRANSPARENT_COLOR != 0 {
            Some(self.transparent_color_idx)
        } else {
            None
        }
    }

    pub fn set_transparent_color(&mut self, transparent_color: Option<u8>) {
        match transparent_color {
            Some(t) => {
                self.flags |= Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = t;
            }
            None => {
                self.flags &= !Self::TRANSPARENT_COLOR;
                self.transparent_color_idx = 0;
            }
        }
    }
}

/// Image descriptor with its decoded color indices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFrame {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    interlaced: bool,
    local_color_table: Option<ColorTable>,
    /// Row-major indices, in stream (pre-interlace) order
    indices: Vec<u8>,
}

impl ImageFrame {
    /// Create a frame from decoded indices.
    ///
    /// Fails with `FrameSizeMismatch` unless there are exactly
    /// `width * height` indices.
    pub fn new(
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        indices: Vec<u8>,
    ) -> Result<Self> {
        let expected = usize::from(width) * usize::from(height);
        if indices.len() != expected {
            return Err(Error::FrameSizeMismatch {
                expected,
                actual: indices.len(),
            });
        }
        Ok(ImageFrame {
            left,
            top,
            width,
            height,
            interlaced: false,
            local_color_table: None,
            indices,
        })
    }

    pub fn with_interlaced(mut self, interlaced: bool) -> Self {
        self.interlaced = interlaced;
        self
    }

    pub fn with_local_color_table(mut self, tbl: Option<ColorTable>) -> Self {
        self.local_color_table = tbl;
        self
    }

    pub fn left(&self) -> u16 {
        self.left
    }

    pub fn top(&self) -> u16 {
        self.top
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn interlaced(&self) -> bool {
        self.interlaced
    }

    pub fn local_color_table(&self) -> Option<&ColorTable> {
        self.local_color_table.as_ref()
    }

    /// Get the color indices (row-major, stream order)
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Get the image size (width × height)
    pub fn image_sz(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// Application extension
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Application {
    app_id: [u8; 8],
    auth_code: [u8; 3],
    sub_blocks: Vec<Vec<u8>>, // opaque application data
}

impl Application {
    pub fn new(
        app_id: [u8; 8],
        auth_code: [u8; 3],
        sub_blocks: Vec<Vec<u8>>,
    ) -> Self {
        Application {
            app_id,
            auth_code,
            sub_blocks,
        }
    }

    /// Create a NETSCAPE2.0 looping extension
    pub fn with_loop_count(loop_count: u16) -> Self {
        let [lo, hi] = loop_count.to_le_bytes();
        Application {
            app_id: *b"NETSCAPE",
            auth_code: *b"2.0",
            sub_blocks: vec![vec![1, lo, hi]],
        }
    }

    pub fn app_id(&self) -> &[u8; 8] {
        &self.app_id
    }

    pub fn auth_code(&self) -> &[u8; 3] {
        &self.auth_code
    }

    pub fn sub_blocks(&self) -> &[Vec<u8>] {
        &self.sub_blocks
    }

    fn is_looping(&self) -> bool {
        matches!(
            (&self.app_id, &self.auth_code),
            (b"NETSCAPE", b"2.0") | (b"ANIMEXTS", b"1.0")
        )
    }

    /// Get the number of times to loop an animation (zero means forever)
    pub fn loop_count(&self) -> Option<u16> {
        match self.sub_blocks.first() {
            Some(d) if self.is_looping() && d.len() == 3 && d[0] == 1 => {
                Some(u16::from_le_bytes([d[1], d[2]]))
            }
            _ => None,
        }
    }
}

/// Comment extension
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comment {
    comments: Vec<String>, // one per sub-block
}

impl Comment {
    pub fn add_comment(&mut self, b: &[u8]) {
        self.comments.push(String::from_utf8_lossy(b).into_owned());
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }
}

/// A block in the GIF stream following the preamble
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    ImageFrame(ImageFrame),
    GraphicControl(GraphicControl),
    Application(Application),
    Comment(Comment),
}

impl From<ImageFrame> for Block {
    fn from(b: ImageFrame) -> Self {
        Block::ImageFrame(b)
    }
}

impl From<GraphicControl> for Block {
    fn from(b: GraphicControl) -> Self {
        Block::GraphicControl(b)
    }
}

impl From<Application> for Block {
    fn from(b: Application) -> Self {
        Block::Application(b)
    }
}

impl From<Comment> for Block {
    fn from(b: Comment) -> Self {
        Block::Comment(b)
    }
}

/// Parsed GIF document.
///
/// Immutable once parsed; frames are produced by replaying its blocks
/// through a [Compositor](struct.Compositor.html).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifDocument {
    pub(crate) version: [u8; 3],
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) color_resolution: u8,
    pub(crate) background_color_idx: u8,
    pub(crate) pixel_aspect_ratio: u8,
    pub(crate) global_color_table: Option<ColorTable>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) truncated: bool,
}

impl GifDocument {
    /// Create an empty document with a canvas size
    pub fn new(width: u16, height: u16) -> Self {
        GifDocument {
            version: *b"89a",
            width,
            height,
            color_resolution: 8,
            background_color_idx: 0,
            pixel_aspect_ratio: 0,
            global_color_table: None,
            blocks: Vec::new(),
            truncated: false,
        }
    }

    pub fn with_global_color_table(mut self, tbl: Option<ColorTable>) -> Self {
        self.global_color_table = tbl;
        self
    }

    pub fn with_background_color_idx(mut self, idx: u8) -> Self {
        self.background_color_idx = idx;
        self
    }

    pub fn with_block<B: Into<Block>>(mut self, block: B) -> Self {
        self.blocks.push(block.into());
        self
    }

    /// Get the version ("87a" or "89a")
    pub fn version(&self) -> [u8; 3] {
        self.version
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get bits per primary color of the source material (1-8)
    pub fn color_resolution(&self) -> u8 {
        self.color_resolution
    }

    pub fn background_color_idx(&self) -> u8 {
        self.background_color_idx
    }

    pub fn pixel_aspect_ratio(&self) -> u8 {
        self.pixel_aspect_ratio
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Check whether the stream ended without a trailer
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Iterate over image frames
    pub fn frames(&self) -> impl Iterator<Item = &ImageFrame> {
        self.blocks.iter().filter_map(|b| match b {
            Block::ImageFrame(f) => Some(f),
            _ => None,
        })
    }

    /// Get the loop count from the first looping application extension
    pub fn loop_count(&self) -> Option<u16> {
        self.blocks.iter().find_map(|b| match b {
            Block::Application(a) => a.loop_count(),
            _ => None,
        })
    }

    /// Get the background color.
    ///
    /// Falls back to opaque white without a global color table entry.
    pub fn background_color(&self) -> SRgba8 {
        self.global_color_table
            .as_ref()
            .and_then(|t| t.rgba(self.background_color_idx))
            .unwrap_or_else(|| SRgba8::new(0xFF, 0xFF, 0xFF, 0xFF))
    }
}
