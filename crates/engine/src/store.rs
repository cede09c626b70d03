//! Value store: random access into the decompressed value region.
//!
//! The region is one immutable `Arc<[u8]>`. What differs between the two
//! strategies is who owns the seekable cursor over it:
//!
//! - [`SharedReader`] has a single cursor behind a mutex. Seek and read run
//!   inside one critical section, so concurrent lookups serialize on the
//!   physical read only.
//! - [`WorkerLocalReader`] gives every calling thread its own cursor,
//!   created on first use and kept in thread-local storage. Threads never
//!   wait on each other's reads, and the slot of a thread that has exited
//!   is handed to the next new thread instead of piling up.
//!
//! The strategy is picked once, at load, via [`open`].

use parking_lot::Mutex;
use std::fmt::Debug;
use std::io::Cursor;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;
use thread_local::ThreadLocal;

use crate::decode::{decode_value, BufferPool};
use crate::error::{EngineError, Result};

/// Concurrency strategy for the value-read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// One cursor, exclusive lock around seek + read.
    Shared,
    /// One cursor per calling thread over the shared buffer.
    #[default]
    WorkerLocal,
}

type View = Cursor<Arc<[u8]>>;

/// Reads length-prefixed values at header-supplied offsets.
pub trait ValueReader: Send + Sync + Debug {
    /// Decodes the value slot starting at `offset`.
    fn read_at(&self, offset: u64) -> Result<String>;

    /// Drops cursors held by this reader. Later reads fail with
    /// [`EngineError::Disposed`].
    fn release(&self);

    fn strategy(&self) -> ReadStrategy;
}

/// Builds the reader for `strategy` over `region`.
pub fn open(
    region: Arc<[u8]>,
    strategy: ReadStrategy,
    pool: Arc<BufferPool>,
) -> Box<dyn ValueReader> {
    match strategy {
        ReadStrategy::Shared => Box::new(SharedReader::new(region, pool)),
        ReadStrategy::WorkerLocal => Box::new(WorkerLocalReader::new(region, pool)),
    }
}

#[derive(Debug)]
pub struct SharedReader {
    view: Mutex<Option<View>>,
    region_len: u64,
    pool: Arc<BufferPool>,
}

impl SharedReader {
    pub fn new(region: Arc<[u8]>, pool: Arc<BufferPool>) -> Self {
        let region_len = region.len() as u64;
        Self {
            view: Mutex::new(Some(Cursor::new(region))),
            region_len,
            pool,
        }
    }
}

impl ValueReader for SharedReader {
    fn read_at(&self, offset: u64) -> Result<String> {
        // Exclusive for the whole seek + read: the cursor position is shared.
        let mut guard = self.view.lock();
        let view = guard.as_mut().ok_or(EngineError::Disposed)?;
        decode_value(view, offset, self.region_len, &self.pool)
    }

    fn release(&self) {
        self.view.lock().take();
    }

    fn strategy(&self) -> ReadStrategy {
        ReadStrategy::Shared
    }
}

#[derive(Debug)]
pub struct WorkerLocalReader {
    region: Arc<[u8]>,
    // A slot's mutex is only contended by `release`; `None` once released.
    views: ThreadLocal<Mutex<Option<View>>>,
    released: AtomicBool,
    pool: Arc<BufferPool>,
}

impl WorkerLocalReader {
    pub fn new(region: Arc<[u8]>, pool: Arc<BufferPool>) -> Self {
        Self {
            region,
            views: ThreadLocal::new(),
            released: AtomicBool::new(false),
            pool,
        }
    }

    /// Number of live per-thread cursors.
    ///
    /// Bounded by the peak number of threads that read at the same time,
    /// not by how many threads have ever read.
    pub fn views(&self) -> usize {
        self.views.iter().filter(|v| v.lock().is_some()).count()
    }
}

impl ValueReader for WorkerLocalReader {
    fn read_at(&self, offset: u64) -> Result<String> {
        if self.released.load(Ordering::SeqCst) {
            return Err(EngineError::Disposed);
        }
        let slot = self
            .views
            .get_or(|| Mutex::new(Some(Cursor::new(Arc::clone(&self.region)))));
        let mut slot = slot.lock();
        // Pairs with the fence in `release`: either this load sees the flag or
        // the release sweep sees this slot.
        fence(Ordering::SeqCst);
        if self.released.load(Ordering::SeqCst) {
            slot.take();
            return Err(EngineError::Disposed);
        }
        let view = slot.as_mut().ok_or(EngineError::Disposed)?;
        decode_value(view, offset, self.region.len() as u64, &self.pool)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        for slot in self.views.iter() {
            slot.lock().take();
        }
    }

    fn strategy(&self) -> ReadStrategy {
        ReadStrategy::WorkerLocal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use container::{ContainerWriter, EntryMap, OffsetIndex};
    use std::sync::Barrier;
    use std::thread;

    fn region() -> (Arc<[u8]>, OffsetIndex, EntryMap) {
        let entries: EntryMap = (0..200)
            .map(|i| (format!("key{i:03}"), format!("value number {i} ").repeat(i % 40)))
            .collect();
        let raw = ContainerWriter::serialize(&entries).unwrap();
        let index = OffsetIndex::parse(&raw, None).unwrap();
        (Arc::from(raw), index, entries)
    }

    fn read_all(reader: &dyn ValueReader, index: &OffsetIndex, entries: &EntryMap) {
        for (key, expected) in entries.iter() {
            let offset = index.get(key).unwrap();
            assert_eq!(reader.read_at(offset).unwrap(), expected);
        }
    }

    // -------------------- Both strategies --------------------

    #[test]
    fn shared_reader_reads_every_value() {
        let (region, index, entries) = region();
        let reader = open(region, ReadStrategy::Shared, Arc::new(BufferPool::new(4)));
        assert_eq!(reader.strategy(), ReadStrategy::Shared);
        read_all(reader.as_ref(), &index, &entries);
    }

    #[test]
    fn worker_local_reader_reads_every_value() {
        let (region, index, entries) = region();
        let reader = open(region, ReadStrategy::WorkerLocal, Arc::new(BufferPool::new(4)));
        assert_eq!(reader.strategy(), ReadStrategy::WorkerLocal);
        read_all(reader.as_ref(), &index, &entries);
    }

    #[test]
    fn reads_after_release_fail() {
        let (region, index, _) = region();
        let offset = index.get("key001").unwrap();
        for strategy in [ReadStrategy::Shared, ReadStrategy::WorkerLocal] {
            let reader = open(region.clone(), strategy, Arc::new(BufferPool::new(1)));
            reader.release();
            assert!(matches!(reader.read_at(offset), Err(EngineError::Disposed)));
        }
    }

    // -------------------- Worker-local views --------------------

    #[test]
    fn one_view_per_thread() {
        let (region, index, entries) = region();
        let reader = Arc::new(WorkerLocalReader::new(region, Arc::new(BufferPool::new(4))));
        let index = Arc::new(index);
        let entries = Arc::new(entries);

        // Same thread twice: still one view.
        read_all(reader.as_ref(), &index, &entries);
        read_all(reader.as_ref(), &index, &entries);
        assert_eq!(reader.views(), 1);

        // Four threads alive at once: four more views.
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reader = Arc::clone(&reader);
                let index = Arc::clone(&index);
                let entries = Arc::clone(&entries);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    read_all(reader.as_ref(), &index, &entries);
                    barrier.wait();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reader.views(), 5);

        reader.release();
        assert_eq!(reader.views(), 0);
    }

    #[test]
    fn exited_threads_do_not_accumulate_views() {
        let (region, index, _) = region();
        let reader = Arc::new(WorkerLocalReader::new(region, Arc::new(BufferPool::new(4))));
        let offset = index.get("key007").unwrap();

        for _ in 0..1000 {
            let reader = Arc::clone(&reader);
            thread::spawn(move || reader.read_at(offset).unwrap())
                .join()
                .unwrap();
        }
        assert!(reader.views() <= 2, "views: {}", reader.views());
    }

    #[test]
    fn thread_arriving_after_release_gets_no_view() {
        let (region, index, _) = region();
        let reader = Arc::new(WorkerLocalReader::new(region, Arc::new(BufferPool::new(4))));
        let offset = index.get("key003").unwrap();
        reader.read_at(offset).unwrap();
        reader.release();

        let late = Arc::clone(&reader);
        let result = thread::spawn(move || late.read_at(offset)).join().unwrap();
        assert!(matches!(result, Err(EngineError::Disposed)));
        assert_eq!(reader.views(), 0);
    }

    #[test]
    fn release_races_with_readers() {
        let (region, index, _) = region();
        let offset = index.get("key010").unwrap();
        for _ in 0..20 {
            let reader = Arc::new(WorkerLocalReader::new(
                region.clone(),
                Arc::new(BufferPool::new(4)),
            ));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let reader = Arc::clone(&reader);
                    thread::spawn(move || {
                        for _ in 0..50 {
                            match reader.read_at(offset) {
                                Ok(_) | Err(EngineError::Disposed) => {}
                                Err(e) => panic!("unexpected error: {e}"),
                            }
                        }
                    })
                })
                .collect();
            reader.release();
            for h in handles {
                h.join().unwrap();
            }
            // Nothing re-populated after release.
            assert_eq!(reader.views(), 0);
        }
    }

    #[test]
    fn shared_reader_under_contention() {
        let (region, index, entries) = region();
        let reader: Arc<dyn ValueReader> =
            Arc::new(SharedReader::new(region, Arc::new(BufferPool::new(4))));
        let index = Arc::new(index);
        let entries = Arc::new(entries);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reader = Arc::clone(&reader);
                let index = Arc::clone(&index);
                let entries = Arc::clone(&entries);
                thread::spawn(move || read_all(reader.as_ref(), &index, &entries))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
