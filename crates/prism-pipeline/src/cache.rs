//! Per-stage output cache.

use crate::buffer::PixelBuffer;
use crate::stage::STAGE_COUNT;

/// One optional buffer per pipeline position: entry `i` is the image as
/// it left stage `i` during the most recent run that reached it.
///
/// Entries are owned; callers receive references and clone when they
/// need to mutate.
#[derive(Debug, Clone, Default)]
pub struct PipelineCache {
    entries: [Option<PixelBuffer>; STAGE_COUNT],
}

impl PipelineCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached output of stage `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PixelBuffer> {
        self.entries.get(index)?.as_ref()
    }

    /// Whether stage `index` has a cached output.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Store the output of stage `index`. Out-of-range indices are
    /// ignored.
    pub fn store(&mut self, index: usize, buffer: PixelBuffer) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = Some(buffer);
        }
    }

    /// Drop every entry at or after `index`.
    pub fn invalidate_from(&mut self, index: usize) {
        for slot in self.entries.iter_mut().skip(index) {
            *slot = None;
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.invalidate_from(0);
    }

    /// Number of populated entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Whether no entry is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
