//! Batch Accumulator
//!
//! Two-phase rendering: scene objects [`commit`](BatchAccumulator::commit)
//! batches while the scene is walked, then a single
//! [`render`](BatchAccumulator::render) sorts them (optionally) and issues the
//! draws. Nothing touches the device during collection.
//!
//! # Usage
//!
//! ```ignore
//! let mut transparent = BatchAccumulator::with_sort(back_to_front);
//!
//! // Every frame
//! transparent.clear();
//! scene.get_batches(RenderMode::Transparent, &mut transparent, None);
//! transparent.render(device, "Main");
//! ```
//!
//! The owner must `clear` between frames; batches borrow per-frame data and
//! the borrow checker rejects keeping them longer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use trinity_core::{Device, EffectId};

use crate::batch::{CommitContext, RenderBatch};

/// Ordering used to sort batches before rendering
pub type BatchComparator = Box<dyn Fn(&dyn RenderBatch, &dyn RenderBatch) -> Ordering>;

/// Farthest first, for blended passes
pub fn back_to_front(a: &dyn RenderBatch, b: &dyn RenderBatch) -> Ordering {
    b.depth().total_cmp(&a.depth())
}

/// Nearest first, for opaque passes with early depth rejection
pub fn front_to_back(a: &dyn RenderBatch, b: &dyn RenderBatch) -> Ordering {
    a.depth().total_cmp(&b.depth())
}

enum Entry<'f> {
    Batch(Box<dyn RenderBatch + 'f>),
    Nested(BatchAccumulator<'f>),
}

/// Statistics from one render call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Batches committed, nested ones included
    pub batches: u32,
    /// Nested accumulators rendered
    pub nested: u32,
    /// `set_standard_states` calls issued
    pub state_changes: u32,
    /// Constant block uploads issued
    pub constant_uploads: u32,
}

impl RenderStats {
    fn merge(&mut self, other: RenderStats) {
        self.batches += other.batches;
        self.nested += other.nested;
        self.state_changes += other.state_changes;
        self.constant_uploads += other.constant_uploads;
    }
}

/// Per-frame list of batches and nested accumulators
#[derive(Default)]
pub struct BatchAccumulator<'f> {
    entries: Vec<Entry<'f>>,
    sort: Option<BatchComparator>,
}

impl<'f> BatchAccumulator<'f> {
    /// Accumulator that renders in commit order
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator that sorts batches with `comparator` before rendering
    ///
    /// The sort is stable, so batches the comparator considers equal keep
    /// their commit order.
    pub fn with_sort<F>(comparator: F) -> Self
    where
        F: Fn(&dyn RenderBatch, &dyn RenderBatch) -> Ordering + 'static,
    {
        Self {
            entries: Vec::new(),
            sort: Some(Box::new(comparator)),
        }
    }

    /// Check if a comparator is set
    pub fn is_sorted(&self) -> bool {
        self.sort.is_some()
    }

    /// Append a batch
    pub fn commit(&mut self, batch: impl RenderBatch + 'f) {
        self.entries.push(Entry::Batch(Box::new(batch)));
    }

    /// Append an already boxed batch
    pub fn commit_boxed(&mut self, batch: Box<dyn RenderBatch + 'f>) {
        self.entries.push(Entry::Batch(batch));
    }

    /// Append a nested accumulator, rendered recursively
    pub fn commit_nested(&mut self, nested: BatchAccumulator<'f>) {
        self.entries.push(Entry::Nested(nested));
    }

    /// Drop everything collected
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of direct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was committed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of batches, counting into nested accumulators
    pub fn batch_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Batch(_) => 1,
                Entry::Nested(nested) => nested.batch_count(),
            })
            .sum()
    }

    /// Render every entry with each batch's own effect
    pub fn render(&mut self, device: &dyn Device, technique: &str) -> RenderStats {
        self.render_with(&CommitContext::new(device, technique))
    }

    /// Render every entry with `effect` instead of each batch's own
    pub fn render_with_effect(&mut self, device: &dyn Device, technique: &str, effect: EffectId) -> RenderStats {
        self.render_with(&CommitContext::new(device, technique).with_effect_override(effect))
    }

    /// Sort if a comparator is set, then commit every entry in order
    ///
    /// Batches get their standard states applied (skipped for
    /// [`RenderMode::Any`](trinity_core::RenderMode::Any)) and their
    /// per-object constants uploaded before they commit. Nested accumulators
    /// render recursively with the same context.
    pub fn render_with(&mut self, ctx: &CommitContext<'_>) -> RenderStats {
        if let Some(compare) = &self.sort {
            self.entries.sort_by(|a, b| match (a, b) {
                (Entry::Batch(a), Entry::Batch(b)) => compare(a.as_ref(), b.as_ref()),
                (Entry::Batch(_), Entry::Nested(_)) => Ordering::Less,
                (Entry::Nested(_), Entry::Batch(_)) => Ordering::Greater,
                (Entry::Nested(_), Entry::Nested(_)) => Ordering::Equal,
            });
        }

        let mut stats = RenderStats::default();
        for entry in &mut self.entries {
            match entry {
                Entry::Batch(batch) => {
                    let mode = batch.render_mode();
                    if !mode.is_any() {
                        ctx.device.set_standard_states(mode);
                        stats.state_changes += 1;
                    }
                    if let Some(data) = batch.per_object_data() {
                        stats.constant_uploads += data.set_constants(ctx.device) as u32;
                    }
                    batch.commit(ctx);
                    stats.batches += 1;
                }
                Entry::Nested(nested) => {
                    stats.nested += 1;
                    stats.merge(nested.render_with(ctx));
                }
            }
        }
        stats
    }
}
