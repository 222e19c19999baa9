use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use thiserror::Error;

use crate::device::{Device, NameObjectError};

#[derive(Debug, Error)]
pub enum CreateSemaphoreError {
    #[error("Vulkan error creating semaphore: {0}")]
    Vulkan(vk::Result),
}

/// An owned timeline semaphore.
///
/// The counter only ever increases; GPU work signals it to a submission's
/// reserved value and the CPU reads it back to learn which submissions have
/// completed, without polling fences.
pub struct TimelineSemaphore {
    parent: Arc<Device>,
    handle: vk::Semaphore,
}

impl std::fmt::Debug for TimelineSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineSemaphore")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl TimelineSemaphore {
    /// Create a timeline semaphore starting at `initial_value`.
    ///
    /// `name` is an optional debug label applied via `VK_EXT_debug_utils` when
    /// the extension is available. Naming failures are logged as warnings and
    /// do not cause the call to fail.
    pub fn new(
        device: &Arc<Device>,
        initial_value: u64,
        name: Option<&str>,
    ) -> Result<Self, CreateSemaphoreError> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        // SAFETY: create_info chains one fully initialised type info struct.
        let handle = unsafe { device.create_raw_semaphore(&create_info) }
            .map_err(CreateSemaphoreError::Vulkan)?;

        // SAFETY: handle is a valid semaphore created from device.
        match unsafe { device.set_object_name_str(handle, name) } {
            Ok(()) | Err(NameObjectError::DebugUtilsNotEnabled) => {}
            Err(e) => tracing::warn!("Failed to name semaphore {:?}: {e}", handle),
        }

        Ok(Self {
            parent: Arc::clone(device),
            handle,
        })
    }

    /// The latest value the device has signaled.
    pub fn completed_value(&self) -> Result<u64, vk::Result> {
        // SAFETY: handle is a valid timeline semaphore created from parent.
        unsafe { self.parent.get_raw_semaphore_counter_value(self.handle) }
    }

    pub fn raw_handle(&self) -> vk::Semaphore {
        self.handle
    }

    pub fn get_parent(&self) -> &Arc<Device> {
        &self.parent
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        tracing::debug!("Dropping timeline semaphore {:?}", self.handle);
        // SAFETY: handle was created from parent and is being destroyed during
        // teardown. No GPU work may be waiting on or about to signal it.
        unsafe { self.parent.destroy_raw_semaphore(self.handle) };
    }
}

/// The driver's submission ordering spine: a timeline semaphore plus the
/// monotonically increasing value reserved for the next submission.
///
/// Every queue submission signals the timeline to a freshly reserved value;
/// a command buffer stamped with that value becomes recyclable once
/// [`completed`](Self::completed) reaches it.
pub struct SubmissionTimeline {
    semaphore: TimelineSemaphore,
    next_value: AtomicU64,
}

impl std::fmt::Debug for SubmissionTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionTimeline")
            .field("semaphore", &self.semaphore)
            .field("next_value", &self.next_value.load(Ordering::Relaxed))
            .finish()
    }
}

impl SubmissionTimeline {
    pub fn new(device: &Arc<Device>) -> Result<Self, CreateSemaphoreError> {
        Ok(Self {
            semaphore: TimelineSemaphore::new(device, 0, Some("submission timeline"))?,
            next_value: AtomicU64::new(0),
        })
    }

    /// Reserve the timeline value the next submission will signal.
    pub fn reserve(&self) -> u64 {
        self.next_value.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The latest value the device has signaled. Submissions stamped at or
    /// below this value have fully completed.
    pub fn completed(&self) -> Result<u64, vk::Result> {
        self.semaphore.completed_value()
    }

    pub fn raw_semaphore(&self) -> vk::Semaphore {
        self.semaphore.raw_handle()
    }
}
