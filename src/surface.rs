use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;

use crate::instance::{CreateRawSurfaceError, Instance};

#[derive(Debug, Error)]
pub enum CreateSurfaceError {
    #[error("couldn't get display handle: {0}")]
    InvalidDisplayHandle(raw_window_handle::HandleError),
    #[error("couldn't get window handle: {0}")]
    InvalidWindowHandle(raw_window_handle::HandleError),
    #[error("Vulkan surface creation failed: {0}")]
    VulkanError(vk::Result),
}

impl From<CreateRawSurfaceError> for CreateSurfaceError {
    fn from(value: CreateRawSurfaceError) -> Self {
        match value {
            CreateRawSurfaceError::OnCreate(e) => CreateSurfaceError::VulkanError(e),
            CreateRawSurfaceError::DisplayHandle(e) => CreateSurfaceError::InvalidDisplayHandle(e),
            CreateRawSurfaceError::WindowHandle(e) => CreateSurfaceError::InvalidWindowHandle(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum SurfaceQueryError {
    #[error("Vulkan error querying surface: {0}")]
    Vulkan(vk::Result),
}

/// An owned `VkSurfaceKHR` tied to the window that produced it.
///
/// Holds an `Arc` to both the parent instance and the window source, so
/// neither can go away while the surface is alive. Destroyed on drop;
/// callers are responsible for ensuring no in-flight GPU work still
/// references resources derived from the surface at that point.
pub struct Surface<T: HasWindowHandle + HasDisplayHandle> {
    parent_instance: Arc<Instance>,
    handle: vk::SurfaceKHR,
    _surface_source: Arc<T>,
}

impl<T: HasWindowHandle + HasDisplayHandle> std::fmt::Debug for Surface<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("handle", &self.handle)
            .field("parent", &self.parent_instance)
            .finish_non_exhaustive()
    }
}

impl<T: HasWindowHandle + HasDisplayHandle> Surface<T> {
    /// Creates a new surface associated with `source`.
    ///
    /// # Safety
    /// This must be dropped on events like suspend in winit due to the surface
    /// being implicitly invalidated.
    ///
    /// Callers are responsible for ensuring no in-flight GPU work still
    /// references resources derived from this surface at destruction time.
    pub unsafe fn new(
        instance: &Arc<Instance>,
        source: Arc<T>,
    ) -> Result<Self, CreateSurfaceError> {
        //SAFETY: We hold Arc references to the instance and source, ensuring
        //they outlive the surface
        let surface = unsafe { instance.create_raw_surface(&*source) }?;

        Ok(Self {
            parent_instance: Arc::clone(instance),
            handle: surface,
            _surface_source: source,
        })
    }

    pub fn get_parent(&self) -> &Arc<Instance> {
        &self.parent_instance
    }

    pub fn raw_handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Check if a queue family on a physical device supports presenting to
    /// this surface.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from the same instance
    /// as this surface.
    pub unsafe fn supports_queue_family(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool, SurfaceQueryError> {
        //SAFETY: physical_device was derived from the same instance as this
        //surface (caller guarantees), self.handle is valid
        unsafe {
            self.parent_instance.get_raw_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.handle,
            )
        }
        .map_err(SurfaceQueryError::Vulkan)
    }

    /// Query swapchain surface capabilities for this surface.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from the same
    /// instance as this surface.
    pub unsafe fn query_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, SurfaceQueryError> {
        //SAFETY: Caller guarantees physical_device provenance for this
        //instance
        unsafe {
            self.parent_instance
                .get_surface_capabilities(physical_device, self.handle)
        }
        .map_err(SurfaceQueryError::Vulkan)
    }

    /// Query supported surface formats for this surface.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from the same
    /// instance as this surface.
    pub unsafe fn query_formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, SurfaceQueryError> {
        //SAFETY: Caller guarantees physical_device provenance for this
        //instance
        unsafe {
            self.parent_instance
                .get_surface_formats(physical_device, self.handle)
        }
        .map_err(SurfaceQueryError::Vulkan)
    }

    /// Query supported present modes for this surface.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from the same
    /// instance as this surface.
    pub unsafe fn query_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, SurfaceQueryError> {
        //SAFETY: Caller guarantees physical_device provenance for this
        //instance
        unsafe {
            self.parent_instance
                .get_surface_present_modes(physical_device, self.handle)
        }
        .map_err(SurfaceQueryError::Vulkan)
    }
}

impl<T: HasWindowHandle + HasDisplayHandle> Drop for Surface<T> {
    fn drop(&mut self) {
        tracing::debug!("Dropping surface {:?}", self.handle);
        //SAFETY: This is being dropped, which means all derived objects
        //(the swapchain in particular) are already gone and no in-flight work
        //may still reference it
        unsafe { self.parent_instance.destroy_raw_surface(self.handle) };
    }
}
