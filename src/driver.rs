use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use ash::vk;
use thiserror::Error;

use crate::command::{
    AllocateCommandBufferError, CommandBuffer, CommandPool, SemaphoreOp, pool_for_thread,
};
use crate::device::{CreateDeviceError, Device};
use crate::instance::{Instance, InstanceCreationError};
use crate::log::VulkanLogLevel;
use crate::registry::SurfaceRegistry;
use crate::surface::{CreateSurfaceError, Surface};
use crate::swapchain::{CreateSwapchainError, SwapchainEntry, SwapchainInfo};
use crate::sync::{CreateSemaphoreError, SubmissionTimeline};
use crate::window::{PixelSizeError, PresentTarget, WindowId};

/// Bootstrap knobs for the device driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConfig {
    /// Prefer an integrated GPU over a discrete one.
    pub low_power: bool,
    /// Request the Khronos validation layer and forward its output to
    /// `tracing`.
    pub debug: bool,
}

#[derive(Debug, Error)]
pub enum RegisterWindowError {
    #[error("window {0:?} is already registered")]
    AlreadyRegistered(WindowId),

    #[error("failed to create presentation surface: {0}")]
    Surface(#[from] CreateSurfaceError),

    #[error(transparent)]
    PixelSize(#[from] PixelSizeError),

    #[error("initial swapchain build failed: {0}")]
    Swapchain(#[from] CreateSwapchainError),
}

#[derive(Debug, Error)]
pub enum RecreateSwapchainError {
    #[error("window {0:?} is not registered")]
    NotRegistered(WindowId),

    #[error(transparent)]
    Create(#[from] CreateSwapchainError),
}

#[derive(Debug, Error)]
pub enum AcquireCommandBufferError {
    #[error("error querying the submission timeline: {0}")]
    Timeline(vk::Result),

    #[error(transparent)]
    Allocate(#[from] AllocateCommandBufferError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Vulkan rejected the submission: {0}")]
    Vulkan(vk::Result),
}

#[derive(Debug, Error)]
enum BootstrapError {
    #[error("instance creation failed: {0}")]
    Instance(#[from] InstanceCreationError),

    #[error("main window surface creation failed: {0}")]
    Surface(#[from] CreateSurfaceError),

    #[error("device selection failed: {0}")]
    Device(#[from] CreateDeviceError),

    #[error("submission timeline creation failed: {0}")]
    Timeline(#[from] CreateSemaphoreError),

    #[error("main window registration failed: {0}")]
    Register(#[from] RegisterWindowError),
}

/// The GPU device driver: sole owner of the Vulkan instance, logical device,
/// and graphics queue, plus every per-window swapchain and per-thread
/// command pool in the process.
///
/// Worker threads call [`acquire_command_buffer`](Self::acquire_command_buffer)
/// and [`submit_command_buffer`](Self::submit_command_buffer) concurrently;
/// window registration runs independently of the render loop. Dropping the
/// driver blocks until the queue is idle, then tears everything down in
/// reverse creation order.
pub struct Driver<W: PresentTarget> {
    // Field order is teardown order: swapchains and pools go before the
    // device, the device before the instance.
    registry: Mutex<SurfaceRegistry<SwapchainEntry<W>>>,
    pools: Mutex<HashMap<ThreadId, Arc<CommandPool>>>,
    submit_lock: Mutex<()>,
    timeline: SubmissionTimeline,
    device: Arc<Device>,
    instance: Arc<Instance>,
}

impl<W: PresentTarget> std::fmt::Debug for Driver<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("device", &self.device)
            .field("timeline", &self.timeline)
            .finish_non_exhaustive()
    }
}

impl<W: PresentTarget> Driver<W> {
    /// Bootstrap the process's GPU context and register `window` as the
    /// first presentation target.
    ///
    /// There is no recoverable path out of a failed bootstrap: the process
    /// cannot render, so any failure here is logged at error severity with
    /// the underlying diagnostic and the process is aborted. Partial
    /// construction is unwound by RAII before the abort.
    pub fn new(window: Arc<W>, config: DriverConfig) -> Self {
        match Self::try_new(window, &config) {
            Ok(driver) => driver,
            Err(e) => {
                tracing::error!("GPU driver bootstrap failed: {e}");
                std::process::abort();
            }
        }
    }

    fn try_new(window: Arc<W>, config: &DriverConfig) -> Result<Self, BootstrapError> {
        let validation = config.debug.then_some(VulkanLogLevel::Warning);

        // SAFETY: loading Vulkan executes library initialization code; this
        // is the process's one-time GPU bootstrap.
        let instance = Arc::new(unsafe {
            Instance::new("kestrel", validation, window.as_ref())
        }?);
        if instance.has_extended_color_spaces() {
            tracing::debug!("VK_EXT_swapchain_colorspace is available");
        }

        // SAFETY: the surface ends up owned by the main window's swapchain
        // entry, which the registry drops before the instance field.
        let surface = unsafe { Surface::new(&instance, Arc::clone(&window)) }?;
        let device = Arc::new(Device::create_compatible(
            &instance,
            &surface,
            config.low_power,
        )?);
        let timeline = SubmissionTimeline::new(&device)?;

        let driver = Self {
            registry: Mutex::new(SurfaceRegistry::new()),
            pools: Mutex::new(HashMap::new()),
            submit_lock: Mutex::new(()),
            timeline,
            device,
            instance,
        };
        driver.install_window(window, surface)?;
        tracing::info!("GPU driver ready");
        Ok(driver)
    }

    /// Register an additional window: derive a surface, query its pixel
    /// size, install a resize watcher, and build its first swapchain.
    ///
    /// Failures are non-fatal; on error nothing is added to the registry and
    /// every partially created resource is released.
    pub fn register_window(&self, window: Arc<W>) -> Result<(), RegisterWindowError> {
        let id = window.id();
        if self.lock_registry().contains(id) {
            return Err(RegisterWindowError::AlreadyRegistered(id));
        }

        // SAFETY: the surface is owned by the swapchain entry, which is
        // always dropped (destroying the surface) before the instance.
        let surface = unsafe { Surface::new(&self.instance, Arc::clone(&window)) }?;
        self.install_window(window, surface)
    }

    fn install_window(&self, window: Arc<W>, surface: Surface<W>) -> Result<(), RegisterWindowError> {
        let id = window.id();
        let pixel_size = window.pixel_size()?;
        let mut entry = SwapchainEntry::new(&self.device, window, surface, pixel_size);
        entry.recreate()?;

        let mut registry = self.lock_registry();
        if registry.contains(id) {
            // The entry (watcher, chain, surface) unwinds via Drop.
            return Err(RegisterWindowError::AlreadyRegistered(id));
        }
        registry.insert(id, entry);
        tracing::info!("Registered window {id:?}");
        Ok(())
    }

    /// Tear down a window's swapchain, views, and surface, and forget it.
    /// Returns whether the window was registered.
    ///
    /// The caller must guarantee that no in-flight command buffer still
    /// references this window's surface.
    pub fn unregister_window(&self, window: WindowId) -> bool {
        let entry = self.lock_registry().remove(window);
        match entry {
            Some(entry) => {
                // Dropped outside the registry lock; entry teardown destroys
                // views, swapchain, then surface.
                drop(entry);
                tracing::info!("Unregistered window {window:?}");
                true
            }
            None => false,
        }
    }

    pub fn registered_windows(&self) -> Vec<WindowId> {
        self.lock_registry().window_ids().collect()
    }

    /// Whether a resize has marked the window's swapchain stale. Returns
    /// `None` for unregistered windows.
    pub fn swapchain_needs_recreation(&self, window: WindowId) -> Option<bool> {
        self.lock_registry()
            .get(window)
            .map(SwapchainEntry::needs_recreation)
    }

    /// Snapshot of a window's current swapchain for recording and
    /// presentation.
    pub fn swapchain_info(&self, window: WindowId) -> Option<SwapchainInfo> {
        self.lock_registry().get(window).map(SwapchainEntry::info)
    }

    /// Rebuild a window's swapchain at its pending extent. Driven by the
    /// render loop whenever
    /// [`swapchain_needs_recreation`](Self::swapchain_needs_recreation)
    /// reports `true`, sequenced against a frame boundary by the caller.
    ///
    /// Failure is retryable: the previous chain stays installed and the
    /// dirty flag stays set.
    pub fn recreate_swapchain(&self, window: WindowId) -> Result<(), RecreateSwapchainError> {
        let mut registry = self.lock_registry();
        let entry = registry
            .get_mut(window)
            .ok_or(RecreateSwapchainError::NotRegistered(window))?;
        entry.recreate()?;
        Ok(())
    }

    /// Hand the calling thread a command buffer in the initial state,
    /// recycled from its pool when a previous submission has completed or
    /// freshly allocated otherwise.
    ///
    /// The thread's pool is created on first use; pool creation failure is
    /// fatal (the thread cannot record without one). This call may block
    /// briefly on the pool-map lock but never on GPU work.
    pub fn acquire_command_buffer(&self) -> Result<CommandBuffer, AcquireCommandBufferError> {
        let thread = std::thread::current().id();
        let pool = match pool_for_thread(&self.pools, thread, || {
            CommandPool::new(&self.device, self.device.graphics_queue_family(), thread)
        }) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("Failed to create command pool for {thread:?}: {e}");
                std::process::abort();
            }
        };

        let completed = self
            .timeline
            .completed()
            .map_err(AcquireCommandBufferError::Timeline)?;
        Ok(pool.acquire(completed)?)
    }

    /// Submit a recorded buffer to the graphics queue with its wait/signal
    /// set, plus a signal of the driver timeline that marks when the buffer
    /// may be recycled.
    ///
    /// The buffer must have been recorded and ended
    /// ([`CommandBuffer::end`]) by the calling thread. Submission itself is
    /// serialized across threads; on rejection the buffer returns to its
    /// pool for immediate reuse and the error is reported to the caller.
    pub fn submit_command_buffer(&self, mut buffer: CommandBuffer) -> Result<(), SubmitError> {
        let retire_at = self.timeline.reserve();

        let wait_infos: Vec<vk::SemaphoreSubmitInfo<'_>> =
            buffer.waits().iter().map(|op| op.submit_info()).collect();
        let mut signal_infos: Vec<vk::SemaphoreSubmitInfo<'_>> =
            buffer.signals().iter().map(|op| op.submit_info()).collect();
        signal_infos.push(
            SemaphoreOp::timeline(
                self.timeline.raw_semaphore(),
                retire_at,
                vk::PipelineStageFlags2::ALL_COMMANDS,
            )
            .submit_info(),
        );
        let command_buffer_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(buffer.raw_command_buffer())];

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        {
            let _guard = self.submit_lock.lock().expect("submission lock poisoned");
            // SAFETY: the facade contract requires the buffer to be in the
            // executable state; the guard serializes graphics queue access.
            unsafe { self.device.queue_submit2(std::slice::from_ref(&submit)) }
                .map_err(SubmitError::Vulkan)?;
        }

        buffer.pool().park(buffer.raw_command_buffer(), retire_at);
        buffer.mark_submitted();
        tracing::trace!(
            "Submitted {:?}, retires at timeline value {retire_at}",
            buffer.raw_command_buffer()
        );
        Ok(())
    }

    /// The submission timeline, for render loops that pace frames against
    /// completed submissions.
    pub fn timeline(&self) -> &SubmissionTimeline {
        &self.timeline
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, SurfaceRegistry<SwapchainEntry<W>>> {
        self.registry.lock().expect("surface registry lock poisoned")
    }
}

impl<W: PresentTarget> Drop for Driver<W> {
    fn drop(&mut self) {
        tracing::debug!("Tearing down GPU driver");
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("Error waiting for device idle during teardown: {e}");
        }
        // Unregister every remaining window, then drop the pools; the
        // device and instance fields follow in declaration order.
        self.registry
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .clear();
        self.pools
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .clear();
    }
}
