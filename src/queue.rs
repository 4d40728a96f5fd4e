// queue.rs
//
// Copyright (c) 2023  Douglas Lau
//
//! Bounded step queue, composited on a worker thread
use crate::block::GifDocument;
use crate::compose::Step;
use crate::error::Result;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;

/// Receiving end of a step queue.
///
/// Dropping the queue cancels the worker at the next frame boundary.
pub struct StepQueue {
    /// Step receiver
    rx: Receiver<Result<Step>>,
}

/// Spawn a worker thread compositing steps of a document.
///
/// The worker blocks while `capacity` steps are waiting to be received.
///
/// ## Example
/// ```
/// use gifcast::{block::*, queue};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let doc = GifDocument::new(2, 1)
///     .with_global_color_table(Some(ColorTable::with_colors(&[0; 6])))
///     .with_block(ImageFrame::new(0, 0, 2, 1, vec![0, 1])?);
/// for step in queue::spawn(doc, 4)? {
///     assert_eq!(step?.as_u8_slice().len(), 8);
/// }
/// # Ok(())
/// # }
/// ```
pub fn spawn(doc: GifDocument, capacity: usize) -> Result<StepQueue> {
    let (tx, rx) = sync_channel(capacity);
    thread::Builder::new()
        .name("gifcast-steps".to_string())
        .spawn(move || {
            for (n, step) in doc.steps().enumerate() {
                if tx.send(step).is_err() {
                    debug!("step queue closed after {} steps", n);
                    break;
                }
            }
        })?;
    Ok(StepQueue { rx })
}

impl Iterator for StepQueue {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::*;
    use crate::decode::fixture::*;

    fn document(frames: u8) -> GifDocument {
        let mut builder = GifBuilder::new(1, 1, Some(&PALETTE), 0);
        for n in 0..frames {
            builder = builder
                .graphic_control(0, n.into(), 0)
                .image((0, 0, 1, 1), false, None, 2, &[n % 4]);
        }
        GifDocument::parse(&builder.trailer())
            .and_then(|d| d.into_document())
            .unwrap()
    }

    #[test]
    fn in_order() -> Result<()> {
        let steps: Vec<Step> = spawn(document(20), 2)?.collect::<Result<_>>()?;
        assert_eq!(steps.len(), 20);
        for (n, step) in steps.iter().enumerate() {
            assert_eq!(usize::from(step.delay_time_cs()), n);
        }
        Ok(())
    }

    #[test]
    fn cancel() -> Result<()> {
        let mut queue = spawn(document(50), 1)?;
        assert!(queue.next().is_some());
        drop(queue);
        Ok(())
    }

    #[test]
    fn error_ends_queue() -> Result<()> {
        let doc = GifDocument::new(1, 1)
            .with_block(ImageFrame::new(0, 0, 1, 1, vec![0])?);
        let mut queue = spawn(doc, 1)?;
        assert!(matches!(
            queue.next(),
            Some(Err(crate::Error::MissingColorTable))
        ));
        assert!(queue.next().is_none());
        Ok(())
    }
}
