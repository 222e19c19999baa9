use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use ash::vk;
use thiserror::Error;

use crate::device::{Device, NameObjectError};
use crate::window::WindowId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CreateCommandPoolError {
    #[error("Vulkan error creating command pool: {0}")]
    Vulkan(vk::Result),
}

#[derive(Debug, Error)]
pub enum AllocateCommandBufferError {
    #[error("Vulkan error allocating command buffer: {0}")]
    Vulkan(vk::Result),

    #[error("Vulkan error resetting a recycled command buffer: {0}")]
    Reset(vk::Result),
}

// ---------------------------------------------------------------------------
// Semaphore operations attached to a submission
// ---------------------------------------------------------------------------

/// One wait or signal edge of a submission: a semaphore, the timeline value
/// it refers to (ignored for binary semaphores), and the pipeline stages the
/// dependency covers.
#[derive(Debug, Clone, Copy)]
pub struct SemaphoreOp {
    pub semaphore: vk::Semaphore,
    pub value: u64,
    pub stage: vk::PipelineStageFlags2,
}

impl SemaphoreOp {
    /// A dependency on a binary semaphore (acquire/present interop).
    pub fn binary(semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            semaphore,
            value: 0,
            stage,
        }
    }

    /// A dependency on a timeline semaphore reaching `value`.
    pub fn timeline(semaphore: vk::Semaphore, value: u64, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            semaphore,
            value,
            stage,
        }
    }

    pub(crate) fn submit_info(&self) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default()
            .semaphore(self.semaphore)
            .value(self.value)
            .stage_mask(self.stage)
    }
}

// ---------------------------------------------------------------------------
// Pool bookkeeping
// ---------------------------------------------------------------------------

/// A submitted buffer waiting for its submission's timeline value.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    handle: vk::CommandBuffer,
    retire_at: u64,
}

/// The recyclable / in-flight buffer queues of one pool. Kept free of Vulkan
/// calls: the reset step is injected so the protocol can be exercised
/// without a device.
#[derive(Debug, Default)]
struct PoolState {
    inactive: VecDeque<vk::CommandBuffer>,
    in_flight: Vec<InFlight>,
}

impl PoolState {
    /// Move every in-flight buffer whose submission has completed (its
    /// stamped value is at or below `completed`) back to the inactive queue,
    /// resetting each one individually on the way.
    fn reclaim<FReset>(&mut self, completed: u64, mut reset: FReset) -> Result<(), vk::Result>
    where
        FReset: FnMut(vk::CommandBuffer) -> Result<(), vk::Result>,
    {
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].retire_at <= completed {
                let entry = self.in_flight.swap_remove(index);
                // On reset failure the handle is dropped from rotation rather
                // than recycled with stale contents; the pool destructor still
                // frees it.
                reset(entry.handle)?;
                self.inactive.push_back(entry.handle);
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    fn take_inactive(&mut self) -> Option<vk::CommandBuffer> {
        self.inactive.pop_front()
    }

    fn park(&mut self, handle: vk::CommandBuffer, retire_at: u64) {
        self.in_flight.push(InFlight { handle, retire_at });
    }
}

// ---------------------------------------------------------------------------
// CommandPool
// ---------------------------------------------------------------------------

/// One rendering thread's command pool.
///
/// Created lazily the first time a thread acquires a buffer and kept alive
/// until facade teardown. The native pool allows individual buffer reset, so
/// recycled buffers are reset one at a time rather than via whole-pool reset.
///
/// The pool lives in the driver's thread-keyed map behind an `Arc`, but by
/// construction only its owning thread ever allocates from or records
/// against it; the internal mutex is uncontended and exists to satisfy the
/// map's sharing requirements plus the submission path's park call.
pub struct CommandPool {
    parent: Arc<Device>,
    thread: ThreadId,
    pool: vk::CommandPool,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("pool", &self.pool)
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        tracing::debug!("Dropping command pool {:?} for {:?}", self.pool, self.thread);
        // SAFETY: pool was created from parent, and facade teardown waits for
        // device idle before dropping pools, so no buffer is pending.
        // vkDestroyCommandPool implicitly frees all allocated command buffers.
        unsafe { self.parent.destroy_raw_command_pool(self.pool) };
    }
}

impl CommandPool {
    /// Create the pool for `thread` on the given queue family, configured for
    /// individual buffer reset.
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
        thread: ThreadId,
    ) -> Result<Self, CreateCommandPoolError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        // SAFETY: create_info uses a valid queue family index for this device.
        let pool = unsafe { device.create_raw_command_pool(&create_info) }
            .map_err(CreateCommandPoolError::Vulkan)?;

        // SAFETY: pool is a valid command pool created from device.
        let name_result =
            unsafe { device.set_object_name_str(pool, Some(&format!("Pool {thread:?}"))) };
        match name_result {
            Ok(()) | Err(NameObjectError::DebugUtilsNotEnabled) => {}
            Err(e) => tracing::warn!("Failed to name command pool {:?}: {e}", pool),
        }

        Ok(Self {
            parent: Arc::clone(device),
            thread,
            pool,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn raw_command_pool(&self) -> vk::CommandPool {
        self.pool
    }

    /// Hand out a buffer in the initial state: reclaim whatever the timeline
    /// says has completed, then recycle from the inactive queue or allocate a
    /// fresh buffer from the native pool.
    ///
    /// Must only be called from the pool's owning thread — the returned
    /// [`CommandBuffer`] is `!Send` to keep it there.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        completed: u64,
    ) -> Result<CommandBuffer, AllocateCommandBufferError> {
        let handle = {
            let mut state = self.state.lock().expect("command pool state poisoned");
            state
                .reclaim(completed, |handle| {
                    // SAFETY: the buffer's submission completed (timeline has
                    // reached its stamp), the pool allows individual reset,
                    // and only the owning thread reaches this call site.
                    unsafe { self.parent.reset_raw_command_buffer(handle) }
                })
                .map_err(AllocateCommandBufferError::Reset)?;
            state.take_inactive()
        };

        let handle = match handle {
            Some(recycled) => recycled,
            None => {
                let allocate_info = vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1);

                // SAFETY: allocate_info references a valid pool created from
                // parent, and only the owning thread allocates from it.
                unsafe { self.parent.allocate_raw_command_buffers(&allocate_info) }
                    .map(|mut bufs| {
                        debug_assert_eq!(bufs.len(), 1);
                        bufs.remove(0)
                    })
                    .map_err(AllocateCommandBufferError::Vulkan)?
            }
        };

        Ok(CommandBuffer {
            pool: Arc::clone(self),
            handle,
            waits: Vec::new(),
            signals: Vec::new(),
            present_targets: Vec::new(),
            submitted: false,
            _thread_bound: PhantomData,
        })
    }

    /// Park a buffer until the submission timeline reaches `retire_at`.
    /// `retire_at` of zero means the buffer never reached the queue and may
    /// be reclaimed immediately.
    pub(crate) fn park(&self, handle: vk::CommandBuffer, retire_at: u64) {
        self.state
            .lock()
            .expect("command pool state poisoned")
            .park(handle, retire_at);
    }
}

/// Look up the calling thread's pool in the shared map, creating it on first
/// use. The lock covers only the lookup/insert; recording never happens
/// under it.
pub(crate) fn pool_for_thread<P, E>(
    pools: &Mutex<HashMap<ThreadId, Arc<P>>>,
    thread: ThreadId,
    create: impl FnOnce() -> Result<P, E>,
) -> Result<Arc<P>, E> {
    let mut pools = pools.lock().expect("command pool map lock poisoned");
    match pools.entry(thread) {
        std::collections::hash_map::Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
        std::collections::hash_map::Entry::Vacant(entry) => {
            let pool = Arc::new(create()?);
            entry.insert(Arc::clone(&pool));
            Ok(pool)
        }
    }
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// A primary command buffer acquired for one thread's frame work.
///
/// State machine: inactive → acquired (this object exists) → recorded by the
/// caller → submitted through the driver → inactive again once the
/// submission's timeline value is reached. `!Send`, so a buffer can never
/// migrate off the thread whose pool allocated it.
///
/// Dropping an unsubmitted buffer returns it to the pool for immediate
/// recycling (it is reset before reuse, so partially recorded contents are
/// discarded).
pub struct CommandBuffer {
    pool: Arc<CommandPool>,
    handle: vk::CommandBuffer,
    waits: Vec<SemaphoreOp>,
    signals: Vec<SemaphoreOp>,
    present_targets: Vec<WindowId>,
    submitted: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("present_targets", &self.present_targets)
            .finish_non_exhaustive()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if !self.submitted {
            // Never reached the queue; park at value zero so the next acquire
            // reclaims it immediately.
            self.pool.park(self.handle, 0);
        }
    }
}

impl CommandBuffer {
    pub fn raw_command_buffer(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// Make the submission wait for `op` before executing.
    pub fn wait_on(&mut self, op: SemaphoreOp) {
        self.waits.push(op);
    }

    /// Make the submission signal `op` when the covered stages complete.
    pub fn signal(&mut self, op: SemaphoreOp) {
        self.signals.push(op);
    }

    /// Record that this buffer's output will be presented to `window`, so
    /// frame sequencing can hold that window's swapchain stable until the
    /// submission lands.
    pub fn will_present_to(&mut self, window: WindowId) {
        self.present_targets.push(window);
    }

    pub fn present_targets(&self) -> &[WindowId] {
        &self.present_targets
    }

    pub(crate) fn waits(&self) -> &[SemaphoreOp] {
        &self.waits
    }

    pub(crate) fn signals(&self) -> &[SemaphoreOp] {
        &self.signals
    }

    pub(crate) fn pool(&self) -> &Arc<CommandPool> {
        &self.pool
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    /// Begin recording.
    ///
    /// # Safety
    /// The buffer must be in the initial state (freshly acquired).
    pub unsafe fn begin(&mut self) -> Result<(), vk::Result> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: Caller guarantees the buffer is in the initial state, and
        // the !Send bound keeps us on the pool's owning thread.
        unsafe {
            self.pool
                .parent
                .begin_raw_command_buffer(self.handle, &begin_info)
        }
    }

    /// End recording.
    ///
    /// # Safety
    /// The buffer must be in the recording state.
    pub unsafe fn end(&mut self) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees the buffer is in the recording state.
        unsafe { self.pool.parent.end_raw_command_buffer(self.handle) }
    }
}

// ---------------------------------------------------------------------------
// Auto-trait assertions
// ---------------------------------------------------------------------------

// Verified at compile time: the pool may live in the shared thread-keyed map,
// while CommandBuffer is !Send/!Sync via PhantomData<*const ()>.
#[allow(dead_code)]
trait AssertSendSync: Send + Sync {}
impl AssertSendSync for CommandPool {}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn buf(raw: u64) -> vk::CommandBuffer {
        vk::CommandBuffer::from_raw(raw)
    }

    #[test]
    fn reclaim_only_returns_buffers_at_or_below_the_completed_value() {
        let mut state = PoolState::default();
        state.park(buf(1), 1);
        state.park(buf(2), 2);
        state.park(buf(3), 3);

        let mut reset_calls = Vec::new();
        state
            .reclaim(2, |handle| {
                reset_calls.push(handle);
                Ok(())
            })
            .unwrap();

        assert_eq!(reset_calls.len(), 2);
        assert_eq!(state.inactive.len(), 2);
        assert_eq!(state.in_flight.len(), 1);
        assert_eq!(state.in_flight[0].retire_at, 3);
    }

    #[test]
    fn recycled_buffers_are_indistinguishable_from_fresh_ones() {
        let mut state = PoolState::default();

        // First acquisition: the queue is empty, so a fresh allocation is
        // needed.
        assert_eq!(state.take_inactive(), None);

        // Submit and retire a buffer, then acquire again: the recycled handle
        // comes back through the same inactive queue a fresh one would enter.
        state.park(buf(7), 1);
        state.reclaim(1, |_| Ok(())).unwrap();
        assert_eq!(state.take_inactive(), Some(buf(7)));
        assert!(state.inactive.is_empty());
        assert!(state.in_flight.is_empty());
    }

    #[test]
    fn unsubmitted_buffers_parked_at_zero_reclaim_immediately() {
        let mut state = PoolState::default();
        state.park(buf(9), 0);

        let mut resets = 0;
        state
            .reclaim(0, |_| {
                resets += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(resets, 1);
        assert_eq!(state.take_inactive(), Some(buf(9)));
    }

    #[test]
    fn reset_failure_drops_the_buffer_from_rotation() {
        let mut state = PoolState::default();
        state.park(buf(4), 1);

        let result = state.reclaim(5, |_| Err(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(result, Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(state.inactive.is_empty());
        assert!(state.in_flight.is_empty());
    }

    #[test]
    fn distinct_threads_get_distinct_pools() {
        struct FakePool(ThreadId);

        let pools: Arc<Mutex<HashMap<ThreadId, Arc<FakePool>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let pools = Arc::clone(&pools);
            handles.push(std::thread::spawn(move || {
                let thread = std::thread::current().id();
                let pool = pool_for_thread(&pools, thread, || {
                    Ok::<_, std::convert::Infallible>(FakePool(thread))
                })
                .unwrap();
                // A second fetch from the same thread reuses the pool.
                let again = pool_for_thread(
                    &pools,
                    thread,
                    || -> Result<FakePool, std::convert::Infallible> {
                        panic!("pool should already exist for this thread")
                    },
                )
                .unwrap();
                assert!(Arc::ptr_eq(&pool, &again));
                pool.0
            }));
        }

        let owners: Vec<ThreadId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_ne!(owners[0], owners[1]);
        assert_eq!(pools.lock().unwrap().len(), 2);
    }

    #[test]
    fn semaphore_ops_carry_values_into_submit_infos() {
        let sem = vk::Semaphore::from_raw(42);
        let op = SemaphoreOp::timeline(sem, 9, vk::PipelineStageFlags2::ALL_COMMANDS);
        let info = op.submit_info();
        assert_eq!(info.semaphore, sem);
        assert_eq!(info.value, 9);

        let binary = SemaphoreOp::binary(sem, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(binary.value, 0);
    }
}
