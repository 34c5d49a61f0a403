//! Explicit compute-device context.
//!
//! The device runs kernels on a dedicated worker pool. Work submitted to it
//! is only visible to the host after a barrier: every buffer remembers the
//! generation of its last write, and [`DeviceContext::finish`] completes all
//! submitted generations. Reading a buffer whose last write has not been
//! fenced is a programming error and panics.

pub mod kernels;

use crate::consts::DEFAULT_WORKGROUP_SIZE;
use crate::error::{GfResult, GridForgeError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Worker threads (0 = one per core).
    pub threads: usize,
    pub workgroup_size: usize,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

/// A device-resident buffer. Contents are only readable once the write
/// that produced them has been fenced.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    label: &'static str,
    data: Vec<T>,
    last_write_gen: u64,
}

impl<T> DeviceBuffer<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last_write_gen(&self) -> u64 {
        self.last_write_gen
    }

    /// Kernel-side access. Kernels run on the device and do not go through
    /// the host fence check.
    pub(crate) fn kernel_view(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn kernel_view_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

pub struct DeviceContext {
    pool: ThreadPool,
    options: DeviceOptions,
    submitted_gen: u64,
    completed_gen: u64,
    released: bool,
}

impl DeviceContext {
    pub fn new(options: DeviceOptions) -> GfResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("gridforge-device-{}", i))
            .build()
            .map_err(|e| GridForgeError::Device(format!("worker pool: {}", e)))?;

        info!(
            "Device context up: {} workers, workgroup size {}",
            pool.current_num_threads(),
            options.workgroup_size
        );

        Ok(Self {
            pool,
            options,
            submitted_gen: 0,
            completed_gen: 0,
            released: false,
        })
    }

    pub fn options(&self) -> DeviceOptions {
        self.options
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Generation of the most recent submission.
    pub fn submitted_generation(&self) -> u64 {
        self.submitted_gen
    }

    pub fn completed_generation(&self) -> u64 {
        self.completed_gen
    }

    fn submit(&mut self) -> u64 {
        self.submitted_gen += 1;
        self.submitted_gen
    }

    /// Records that `buf` was written by the current submission.
    pub(crate) fn mark_written<T>(&mut self, buf: &mut DeviceBuffer<T>) {
        buf.last_write_gen = self.submit();
    }

    /// Runs `f` on the device workers.
    pub(crate) fn run<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }

    /// Barrier: completes every submitted generation.
    pub fn finish(&mut self) {
        if self.completed_gen != self.submitted_gen {
            debug!(
                "Device barrier: generations {}..={} complete",
                self.completed_gen + 1,
                self.submitted_gen
            );
        }
        self.completed_gen = self.submitted_gen;
    }

    pub fn is_fenced<T>(&self, buf: &DeviceBuffer<T>) -> bool {
        buf.last_write_gen <= self.completed_gen
    }

    pub(crate) fn assert_fenced<T>(&self, buf: &DeviceBuffer<T>) {
        assert!(
            self.is_fenced(buf),
            "read of unfenced device buffer '{}' (written in generation {}, completed {})",
            buf.label,
            buf.last_write_gen,
            self.completed_gen
        );
    }

    pub fn create_buffer_init<T>(&mut self, label: &'static str, data: Vec<T>) -> DeviceBuffer<T> {
        let mut buf = DeviceBuffer {
            label,
            data,
            last_write_gen: 0,
        };
        self.mark_written(&mut buf);
        buf
    }

    pub fn create_buffer<T: Clone>(
        &mut self,
        label: &'static str,
        len: usize,
        fill: T,
    ) -> DeviceBuffer<T> {
        self.create_buffer_init(label, vec![fill; len])
    }

    /// Grid occupancy buffer; kernels exchange cells in place.
    pub fn create_atomic_buffer(&mut self, label: &'static str, data: &[u32]) -> DeviceBuffer<AtomicU32> {
        let atomics = data.iter().map(|&v| AtomicU32::new(v)).collect();
        self.create_buffer_init(label, atomics)
    }

    /// Queues a host → device copy, replacing the buffer contents.
    pub fn write_buffer<T: Copy>(&mut self, buf: &mut DeviceBuffer<T>, data: &[T]) {
        buf.data.clear();
        buf.data.extend_from_slice(data);
        self.mark_written(buf);
    }

    /// Fenced host view of a buffer.
    pub fn read_buffer<'a, T>(&self, buf: &'a DeviceBuffer<T>) -> &'a [T] {
        self.assert_fenced(buf);
        &buf.data
    }

    /// Device → host copy into a slice of exactly the buffer's length.
    pub fn read_into<T: Copy>(&self, buf: &DeviceBuffer<T>, out: &mut [T]) {
        self.assert_fenced(buf);
        assert_eq!(
            out.len(),
            buf.data.len(),
            "readback size mismatch on device buffer '{}'",
            buf.label
        );
        out.copy_from_slice(&buf.data);
    }

    pub fn read_atomic_into(&self, buf: &DeviceBuffer<AtomicU32>, out: &mut [u32]) {
        self.assert_fenced(buf);
        assert_eq!(
            out.len(),
            buf.data.len(),
            "readback size mismatch on device buffer '{}'",
            buf.label
        );
        for (dst, src) in out.iter_mut().zip(buf.data.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
    }

    /// Releases the context. Idempotent; also runs on drop.
    pub fn release(&mut self) {
        if !self.released {
            self.finish();
            self.released = true;
            info!(
                "Device context released after {} submissions",
                self.submitted_gen
            );
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        self.release();
    }
}
