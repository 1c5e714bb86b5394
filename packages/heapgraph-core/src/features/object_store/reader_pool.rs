//! Pool of open readers
//!
//! Readers only move forward, so a fetch starting at record `n` resumes the
//! open reader with the greatest position not past `n`. A fresh reader from
//! record 0 is opened only when none qualifies. Idle readers beyond the pool
//! size are closed, least recently used first.

use tracing::debug;

use crate::features::event_source::{EventReader, EventSource, SourceResult};

struct PooledReader {
    reader: Box<dyn EventReader>,
    last_used: u64,
}

pub struct ReaderPool {
    idle: Vec<PooledReader>,
    capacity: usize,
    clock: u64,
    opened: u64,
}

impl ReaderPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            clock: 0,
            opened: 0,
        }
    }

    /// Take the best reader for a fetch starting at `target`
    pub fn checkout(
        &mut self,
        source: &dyn EventSource,
        target: u64,
    ) -> SourceResult<Box<dyn EventReader>> {
        let best = self
            .idle
            .iter()
            .enumerate()
            .filter(|(_, pooled)| pooled.reader.position() <= target)
            .max_by_key(|(_, pooled)| pooled.reader.position())
            .map(|(i, _)| i);

        if let Some(i) = best {
            return Ok(self.idle.swap_remove(i).reader);
        }

        self.opened += 1;
        debug!(target, opened = self.opened, "opening reader");
        source.open()
    }

    /// Return a reader that stopped mid-stream and can be resumed
    pub fn checkin(&mut self, reader: Box<dyn EventReader>) {
        self.clock += 1;
        self.idle.push(PooledReader {
            reader,
            last_used: self.clock,
        });

        if self.idle.len() > self.capacity {
            if let Some(i) = self
                .idle
                .iter()
                .enumerate()
                .min_by_key(|(_, pooled)| pooled.last_used)
                .map(|(i, _)| i)
            {
                let mut evicted = self.idle.swap_remove(i);
                debug!(position = evicted.reader.position(), "closing pooled reader");
                evicted.reader.close();
            }
        }
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Readers opened over the pool's lifetime
    pub fn opened(&self) -> u64 {
        self.opened
    }

    pub fn positions(&self) -> Vec<u64> {
        let mut positions: Vec<u64> = self.idle.iter().map(|p| p.reader.position()).collect();
        positions.sort_unstable();
        positions
    }

    pub fn close_all(&mut self) {
        for pooled in self.idle.iter_mut() {
            pooled.reader.close();
        }
        self.idle.clear();
    }
}
