// compose.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! Frame compositing
use crate::block::*;
use crate::error::{Error, Result};
use pix::rgb::SRgba8;
use pix::Raster;

/// Interlace passes: (first row, row step)
const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Get destination rows of an interlaced image, in stream order
pub fn interlace_rows(height: usize) -> impl Iterator<Item = usize> {
    PASSES
        .iter()
        .flat_map(move |&(first, step)| (first..height).step_by(step))
}

/// One composited animation step
pub struct Step {
    /// Canvas after compositing a frame
    raster: Raster<SRgba8>,
    /// Delay time in centiseconds
    delay_time_cs: u16,
    /// Frame had a transparent color
    transparent: bool,
    /// Animation restarts after this step
    loop_again: bool,
}

impl Clone for Step {
    fn clone(&self) -> Self {
        Step {
            raster: Raster::with_raster(&self.raster),
            ..*self
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Step")
            .field("width", &self.raster.width())
            .field("height", &self.raster.height())
            .field("delay_time_cs", &self.delay_time_cs)
            .field("transparent", &self.transparent)
            .field("loop_again", &self.loop_again)
            .finish()
    }
}

impl Step {
    /// Get the raster
    pub fn raster(&self) -> &Raster<SRgba8> {
        &self.raster
    }

    /// Convert into the raster
    pub fn into_raster(self) -> Raster<SRgba8> {
        self.raster
    }

    /// Get RGBA bytes (width × height × 4)
    pub fn as_u8_slice(&self) -> &[u8] {
        self.raster.as_u8_slice()
    }

    /// Get the delay time in centiseconds
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }

    /// Get the delay time in milliseconds
    pub fn delay_ms(&self) -> u32 {
        u32::from(self.delay_time_cs) * 10
    }

    /// Check whether the frame had a transparent color
    pub fn transparent(&self) -> bool {
        self.transparent
    }

    /// Check whether the animation restarts after this step
    pub fn loop_again(&self) -> bool {
        self.loop_again
    }
}

/// Frame compositor.
///
/// Replays blocks onto a persistent canvas, one frame at a time.  The canvas
/// is only reset by creating a new compositor.
pub struct Compositor {
    /// Global color table
    global_color_table: Option<ColorTable>,
    /// Background color
    background: SRgba8,
    /// Current canvas
    canvas: Raster<SRgba8>,
    /// Canvas before the current frame (for `DisposalMethod::Previous`)
    previous: Option<Raster<SRgba8>>,
    /// Graphic control for the next frame
    pending: Option<GraphicControl>,
}

impl Compositor {
    /// Create a compositor for a document
    pub fn new(doc: &GifDocument) -> Self {
        let background = doc.background_color();
        let canvas = Raster::with_color(
            doc.width().into(),
            doc.height().into(),
            background,
        );
        Compositor {
            global_color_table: doc.global_color_table().cloned(),
            background,
            canvas,
            previous: None,
            pending: None,
        }
    }

    /// Get the current canvas
    pub fn canvas(&self) -> &Raster<SRgba8> {
        &self.canvas
    }

    /// Advance by one block.
    ///
    /// Returns a step for each image frame.
    pub fn advance(&mut self, block: &Block) -> Result<Option<Step>> {
        match block {
            Block::GraphicControl(control) => {
                if self.pending.is_some() {
                    warn!("graphic control replaced before any image");
                }
                self.pending = Some(*control);
                Ok(None)
            }
            Block::ImageFrame(frame) => self.composite(frame).map(Some),
            Block::Comment(comment) => {
                for c in comment.comments() {
                    debug!("comment: {}", c);
                }
                Ok(None)
            }
            Block::Application(_) => Ok(None),
        }
    }

    /// Composite one frame, then dispose it
    fn composite(&mut self, frame: &ImageFrame) -> Result<Step> {
        let control = self.pending.take().unwrap_or_default();
        let table = frame
            .local_color_table()
            .or(self.global_color_table.as_ref())
            .ok_or(Error::MissingColorTable)?;
        let disposal = control.disposal_method();
        if disposal == DisposalMethod::Previous {
            self.previous = Some(Raster::with_raster(&self.canvas));
        }
        let transparent = control.transparent_color();
        let invalid = draw(&mut self.canvas, frame, table, transparent);
        if invalid > 0 {
            warn!("{} pixels with color index beyond table", invalid);
        }
        let step = Step {
            raster: Raster::with_raster(&self.canvas),
            delay_time_cs: control.delay_time_cs(),
            transparent: transparent.is_some(),
            loop_again: false,
        };
        self.dispose(frame, disposal);
        Ok(step)
    }

    /// Dispose of a frame after it has been presented
    fn dispose(&mut self, frame: &ImageFrame, disposal: DisposalMethod) {
        match disposal {
            DisposalMethod::Background => {
                let cw = self.canvas.width() as usize;
                let ch = self.canvas.height() as usize;
                let left = usize::from(frame.left()).min(cw);
                let top = usize::from(frame.top()).min(ch);
                let right = (left + usize::from(frame.width())).min(cw);
                let bottom = (top + usize::from(frame.height())).min(ch);
                let background = self.background;
                let pixels = self.canvas.pixels_mut();
                for y in top..bottom {
                    pixels[y * cw + left..y * cw + right].fill(background);
                }
            }
            DisposalMethod::Previous => {
                if let Some(previous) = self.previous.take() {
                    self.canvas = previous;
                }
            }
            _ => {}
        }
    }
}

/// Draw frame pixels onto a canvas.
///
/// Returns the number of indices beyond the color table.
fn draw(
    canvas: &mut Raster<SRgba8>,
    frame: &ImageFrame,
    table: &ColorTable,
    transparent: Option<u8>,
) -> usize {
    let cw = canvas.width() as usize;
    let ch = canvas.height() as usize;
    let width = usize::from(frame.width());
    let height = usize::from(frame.height());
    let left = usize::from(frame.left());
    let top = usize::from(frame.top());
    let rows: Vec<usize> = if frame.interlaced() {
        interlace_rows(height).collect()
    } else {
        (0..height).collect()
    };
    let pixels = canvas.pixels_mut();
    let mut invalid = 0;
    for (src, row) in frame.indices().chunks_exact(width.max(1)).zip(rows) {
        let y = top + row;
        if y >= ch {
            continue;
        }
        for (x, idx) in src.iter().enumerate() {
            let x = left + x;
            if x >= cw || Some(*idx) == transparent {
                continue;
            }
            match table.rgba(*idx) {
                Some(clr) => pixels[y * cw + x] = clr,
                None => invalid += 1,
            }
        }
    }
    invalid
}

/// Iterator of composited [Step]s within a document.
///
/// Created by [GifDocument::steps] or [GifDocument::steps_looping].
pub struct Steps<'a> {
    /// Source document
    doc: &'a GifDocument,
    /// Compositor for the current pass
    compositor: Compositor,
    /// Next block index
    pos: usize,
    /// Index of the last image frame
    last_frame: Option<usize>,
    /// Remaining passes after the current one (`None` means forever)
    remaining: Option<u32>,
    /// Stopped on an error
    done: bool,
}

impl<'a> Steps<'a> {
    /// Create a step iterator
    fn new(doc: &'a GifDocument, remaining: Option<u32>) -> Self {
        let last_frame = doc
            .blocks()
            .iter()
            .rposition(|b| matches!(b, Block::ImageFrame(_)));
        Steps {
            doc,
            compositor: Compositor::new(doc),
            pos: 0,
            last_frame,
            remaining,
            done: false,
        }
    }

    /// Check if another pass follows the current one
    fn has_next_pass(&self) -> bool {
        self.remaining != Some(0)
    }

    /// Start the next pass from a fresh canvas
    fn restart(&mut self) {
        self.compositor = Compositor::new(self.doc);
        self.pos = 0;
        self.remaining = self.remaining.map(|r| r - 1);
    }
}

impl<'a> Iterator for Steps<'a> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.last_frame?;
        loop {
            let block = match self.doc.blocks().get(self.pos) {
                Some(block) => block,
                None if self.has_next_pass() => {
                    self.restart();
                    continue;
                }
                None => return None,
            };
            let pos = self.pos;
            self.pos += 1;
            match self.compositor.advance(block) {
                Ok(Some(mut step)) => {
                    step.loop_again =
                        Some(pos) == self.last_frame && self.has_next_pass();
                    return Some(Ok(step));
                }
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl GifDocument {
    /// Get an iterator of composited steps, playing once
    pub fn steps(&self) -> Steps<'_> {
        Steps::new(self, Some(0))
    }

    /// Get an iterator of composited steps, looping as the document's loop
    /// count specifies.
    ///
    /// A loop count of zero repeats forever.
    pub fn steps_looping(&self) -> Steps<'_> {
        let remaining = match self.loop_count() {
            Some(0) => None,
            Some(n) => Some(u32::from(n)),
            None => Some(0),
        };
        Steps::new(self, remaining)
    }
}
