use std::time::Instant;

use bevy::{
    log::info,
    tasks::{IoTaskPool, TaskPool, futures_lite},
};

use crate::{
    buffer::{
        MapBuffer,
        quad::{self, QuadAction, QuadFiles, QuadSaveError, QuadSaved},
    },
    coords::{SubmapPos, TilePos},
    submap::{RealityBubble, Submap},
};

/// Receives progress while a save is running.
pub trait SaveProgress {
    /// Report how many quads have been saved so far.
    fn report(&mut self, _saved: usize, _total: usize) {}

    /// Redraw whatever displays the progress, and process pending input.
    fn refresh(&mut self) {}
}

impl SaveProgress for () {}

/// Reports save progress to the log.
pub struct LogProgress;

impl SaveProgress for LogProgress {
    fn report(&mut self, saved: usize, total: usize) {
        info!("Please wait as the map saves [{saved}/{total}]");
    }
}

/// What a call to `MapBuffer::save` did.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SaveSummary {
    /// Number of distinct quads that were processed.
    pub quads: usize,

    /// Quad files that were written.
    pub written: usize,

    /// Stale quad files that were deleted.
    pub deleted: usize,

    /// Uniform quads that needed no I/O.
    pub skipped: usize,

    /// Submaps dropped from memory after saving.
    pub evicted: usize,
}

impl SaveSummary {
    fn tally(&mut self, saved: &QuadSaved) {
        match saved.action {
            QuadAction::Written => self.written += 1,
            QuadAction::Deleted => self.deleted += 1,
            QuadAction::Skipped => self.skipped += 1,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error("[M401] Failed to save quad {tile}: {source}")]
    Quad {
        tile: TilePos,
        #[source]
        source: QuadSaveError,
    },
}

/// Submaps handed to a save task, returned when it completes.
type Members<S> = Vec<(SubmapPos, S)>;

impl<S: Submap> MapBuffer<S> {
    /// Save every resident quad.
    ///
    /// Quads are saved concurrently on the IO task pool, one task per quad. Each task
    /// takes ownership of its quad's resident submaps and hands them back when done.
    ///
    /// Quads outside of the reality bubble are always evicted after saving. Quads
    /// inside are only evicted if `delete_after_save` is set.
    ///
    /// If any quad fails to save, the first error is returned and nothing is evicted.
    /// Quads that did save keep their new files.
    pub fn save(
        &mut self,
        delete_after_save: bool,
        bubble: &impl RealityBubble,
        progress: &mut impl SaveProgress,
    ) -> Result<SaveSummary, SaveError> {
        let tiles = self.resident_tiles();
        let total = tiles.len();
        let task_pool = IoTaskPool::get_or_init(TaskPool::new);

        let mut tasks = Vec::with_capacity(total);
        for tile in tiles {
            let delete = delete_after_save || !bubble.contains_tile(tile);
            let files = self.quad_files(tile);
            let members = self.take_members(tile);
            tasks.push((
                tile,
                task_pool.spawn(async move {
                    let result = quad::save_quad(&files, &members, delete);
                    (members, result)
                }),
            ));
        }

        let mut summary = SaveSummary {
            quads: total,
            ..Default::default()
        };
        let mut evictable = Vec::new();
        let mut failure: Option<SaveError> = None;
        let interval = self.config.progress_interval();
        let mut last_update = Instant::now();

        for (saved, (tile, task)) in tasks.into_iter().enumerate() {
            if failure.is_none() && last_update.elapsed() > interval {
                progress.report(saved, total);
                progress.refresh();
                last_update = Instant::now();
            }

            // Tasks can't be cancelled, so after a failure the remaining
            // ones are still awaited to get their submaps back.
            let (mut members, result) = futures_lite::future::block_on(task);
            match result {
                Ok(saved) => {
                    settle_reverted(&mut members);
                    summary.tally(&saved);
                    evictable.extend(saved.evictable);
                }
                Err(source) => {
                    if failure.is_none() {
                        failure = Some(SaveError::Quad { tile, source });
                    }
                }
            }
            self.restore_members(members);
        }

        if let Some(e) = failure {
            return Err(e);
        }

        for pos in evictable {
            if self.remove_submap(pos).is_some() {
                summary.evicted += 1;
            }
        }

        info!(
            "Saved map: {} quads ({} written, {} deleted, {} unchanged), {} submaps evicted.",
            summary.quads, summary.written, summary.deleted, summary.skipped, summary.evicted
        );

        Ok(summary)
    }

    /// Save a single quad on the calling thread.
    pub fn save_quad(
        &mut self,
        tile: TilePos,
        delete_after_save: bool,
    ) -> Result<QuadSaved, QuadSaveError> {
        let files = self.quad_files(tile);
        let mut members = self.take_members(tile);
        let result = quad::save_quad(&files, &members, delete_after_save);
        if result.is_ok() {
            settle_reverted(&mut members);
        }
        self.restore_members(members);

        let saved = result?;
        for pos in &saved.evictable {
            self.remove_submap(*pos);
        }
        Ok(saved)
    }

    fn quad_files(&self, tile: TilePos) -> QuadFiles {
        QuadFiles::new(&self.config.save_root, tile, self.config.legacy_separator)
    }

    /// Move the resident members of a quad out of the buffer, in quad order.
    fn take_members(&mut self, tile: TilePos) -> Members<S> {
        tile.submaps()
            .into_iter()
            .filter_map(|pos| self.submaps.remove(&pos).map(|sm| (pos, sm)))
            .collect()
    }

    fn restore_members(&mut self, members: Members<S>) {
        self.submaps.extend(members);
    }
}

/// Once a quad is saved, its file matches memory, so no member has stale
/// content on disk anymore.
fn settle_reverted<S: Submap>(members: &mut Members<S>) {
    for (_, sm) in members.iter_mut().filter(|(_, sm)| sm.reverted()) {
        sm.set_reverted(false);
    }
}
