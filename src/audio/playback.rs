use anyhow::Result;
use tracing::debug;

use super::codec::PlaybackChunk;
use super::device::{PlaybackSink, SourceId};

/// Chunk currently scheduled on the sink
struct ActiveChunk {
    id: SourceId,
    ends_at: f64,
}

/// Schedules decoded chunks for gap-free, in-order playback.
///
/// Keeps a virtual cursor (`next_start`) one chunk-duration ahead of the
/// last scheduled chunk. Each enqueue starts at
/// `max(next_start, sink clock)`, so chunks never overlap and are never
/// backdated behind audio the sink has already played. An interruption
/// flush stops everything still pending and resets the cursor to zero so
/// the next chunk starts immediately.
pub struct PlaybackScheduler {
    sink: Box<dyn PlaybackSink>,
    next_start: f64,
    active: Vec<ActiveChunk>,
}

impl PlaybackScheduler {
    pub fn new(sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            next_start: 0.0,
            active: Vec::new(),
        }
    }

    /// Schedule a chunk after everything already queued.
    ///
    /// Returns the start time assigned on the output clock. Empty chunks
    /// are skipped without touching the cursor.
    pub fn enqueue(&mut self, chunk: PlaybackChunk) -> Result<f64> {
        if chunk.samples.is_empty() {
            debug!("skipping empty playback chunk");
            return Ok(self.next_start);
        }

        self.reap();

        let now = self.sink.clock();
        let start_at = self.next_start.max(now);
        let id = self.sink.start(&chunk, start_at)?;

        self.next_start = start_at + chunk.duration();
        self.active.push(ActiveChunk {
            id,
            ends_at: self.next_start,
        });

        Ok(start_at)
    }

    /// Hard-stop everything still playing or pending and reset the cursor.
    ///
    /// Called on an interruption signal; guarantees no stale audio plays
    /// and the next chunk starts at the current clock rather than a stale
    /// offset.
    pub fn flush(&mut self) {
        for chunk in self.active.drain(..) {
            self.sink.stop(chunk.id);
        }
        self.next_start = 0.0;
    }

    /// Number of chunks still playing or pending
    pub fn active_len(&mut self) -> usize {
        self.reap();
        self.active.len()
    }

    /// Virtual cursor position for the next chunk
    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    /// Release the underlying sink
    pub fn close(&mut self) -> Result<()> {
        self.sink.close()
    }

    /// Drop chunks whose playback has finished
    fn reap(&mut self) {
        let now = self.sink.clock();
        self.active.retain(|chunk| chunk.ends_at > now);
    }
}
