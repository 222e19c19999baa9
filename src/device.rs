use std::ffi::{CStr, CString};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;

use crate::{
    instance::{FetchPhysicalDeviceError, Instance},
    surface::{Surface, SurfaceQueryError},
};

/// Device extensions every selected physical device must provide. The
/// synchronization2 and dynamic-rendering extensions are required because the
/// instance targets Vulkan 1.2, where neither is core yet.
const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 3] = [
    ash::khr::swapchain::NAME,
    ash::khr::synchronization2::NAME,
    ash::khr::dynamic_rendering::NAME,
];

/// The feature bits this engine requires, as reported by one physical
/// device. Queried through the `vkGetPhysicalDeviceFeatures2` chain and
/// flattened here so selection logic stays plain data.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FeatureSupport {
    pub image_cube_array: bool,
    pub multi_draw_indirect: bool,
    pub multi_viewport: bool,
    pub sampler_anisotropy: bool,
    pub texture_compression_bc: bool,
    pub multiview: bool,
    pub descriptor_indexing: bool,
    pub sampled_image_non_uniform_indexing: bool,
    pub storage_image_non_uniform_indexing: bool,
    pub sampled_image_update_after_bind: bool,
    pub storage_image_update_after_bind: bool,
    pub update_unused_while_pending: bool,
    pub partially_bound: bool,
    pub timeline_semaphore: bool,
    pub buffer_device_address: bool,
    pub synchronization2: bool,
    pub dynamic_rendering: bool,
}

impl FeatureSupport {
    /// Names of the required features this device does not support. Empty
    /// means the device qualifies.
    pub(crate) fn missing(&self) -> Vec<&'static str> {
        let checks = [
            (self.image_cube_array, "imageCubeArray"),
            (self.multi_draw_indirect, "multiDrawIndirect"),
            (self.multi_viewport, "multiViewport"),
            (self.sampler_anisotropy, "samplerAnisotropy"),
            (self.texture_compression_bc, "textureCompressionBC"),
            (self.multiview, "multiview"),
            (self.descriptor_indexing, "descriptorIndexing"),
            (
                self.sampled_image_non_uniform_indexing,
                "shaderSampledImageArrayNonUniformIndexing",
            ),
            (
                self.storage_image_non_uniform_indexing,
                "shaderStorageImageArrayNonUniformIndexing",
            ),
            (
                self.sampled_image_update_after_bind,
                "descriptorBindingSampledImageUpdateAfterBind",
            ),
            (
                self.storage_image_update_after_bind,
                "descriptorBindingStorageImageUpdateAfterBind",
            ),
            (
                self.update_unused_while_pending,
                "descriptorBindingUpdateUnusedWhilePending",
            ),
            (self.partially_bound, "descriptorBindingPartiallyBound"),
            (self.timeline_semaphore, "timelineSemaphore"),
            (self.buffer_device_address, "bufferDeviceAddress"),
            (self.synchronization2, "synchronization2"),
            (self.dynamic_rendering, "dynamicRendering"),
        ];
        checks
            .iter()
            .filter(|(supported, _)| !supported)
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Score a qualifying device for selection. Compared lexicographically: a
/// device of the preferred type always beats a non-preferred one, and the
/// usual discrete > integrated > virtual ordering breaks ties.
pub(crate) fn device_preference_score(
    device_type: vk::PhysicalDeviceType,
    prefer_integrated: bool,
) -> (u32, u32) {
    let preferred_type = if prefer_integrated {
        vk::PhysicalDeviceType::INTEGRATED_GPU
    } else {
        vk::PhysicalDeviceType::DISCRETE_GPU
    };
    let base_priority = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    };
    ((device_type == preferred_type) as u32, base_priority)
}

/// The logical device, its graphics queue, and the device-level loaders.
///
/// Created once at facade construction and shared via `Arc` with every
/// swapchain, command pool, and semaphore so destruction ordering is
/// structural. `Drop` destroys the logical device; by then all children must
/// be gone.
pub struct Device {
    parent: Arc<Instance>,
    handle: ash::Device,
    swapchain_device: ash::khr::swapchain::Device,
    synchronization2_device: ash::khr::synchronization2::Device,
    debug_utils_device: Option<ash::ext::debug_utils::Device>,
    swapchain_name_counter: AtomicU64,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("handle", &self.handle.handle())
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        tracing::debug!("Dropping device {:?}", self.handle.handle());
        //SAFETY: All objects derived from this device should be dropped
        //before this device is dropped.
        unsafe { self.handle.destroy_device(None) };
    }
}

#[derive(Debug, Error)]
pub enum CreateDeviceError {
    #[error(
        "Mismatched parameters to Device::create_compatible. The surface \
         must be derived from the same instance"
    )]
    MismatchedParams,

    #[error("No physical device supports presentation plus the required feature set")]
    NoSuitableDevice,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Error enumerating physical devices: {0}")]
    Enumerate(#[from] FetchPhysicalDeviceError),

    #[error("Error checking surface support: {0}")]
    SurfaceSupport(#[from] SurfaceQueryError),
}

#[derive(Debug, Error)]
pub enum NameObjectError {
    #[error("Debug utils extension is not enabled on this device")]
    DebugUtilsNotEnabled,

    #[error("Invalid Vulkan object name (contains interior NUL): {0}")]
    InvalidName(std::ffi::NulError),

    #[error("Vulkan error setting object name: {0}")]
    Vulkan(vk::Result),
}

impl Device {
    /// Select a physical device able to present to `surf` with the full
    /// feature set this engine records against, and build a logical device
    /// with one graphics+present queue.
    ///
    /// `low_power` flips the device-type preference from discrete to
    /// integrated; among devices of the preferred type the usual
    /// discrete-first ordering still applies to the remainder.
    pub fn create_compatible<T: HasDisplayHandle + HasWindowHandle>(
        instance: &Arc<Instance>,
        surf: &Surface<T>,
        low_power: bool,
    ) -> Result<Self, CreateDeviceError> {
        if !Arc::ptr_eq(surf.get_parent(), instance) {
            return Err(CreateDeviceError::MismatchedParams);
        }

        let physical_devices = instance.fetch_physical_devices()?;

        struct Candidate {
            handle: vk::PhysicalDevice,
            props: vk::PhysicalDeviceProperties,
            graphics_present_family: u32,
            score: (u32, u32),
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for &dev in &physical_devices {
            //SAFETY: dev was derived from instance
            let props = unsafe { instance.get_raw_physical_device_properties(dev) };
            let name = props
                .device_name_as_c_str()
                .unwrap_or(c"unknown")
                .to_string_lossy()
                .into_owned();

            //SAFETY: dev was derived from instance
            let queue_families =
                unsafe { instance.get_raw_physical_device_queue_family_properties(dev) };
            let graphics_present_family = queue_families.iter().enumerate().find_map(
                |(idx, family_props)| {
                    if !family_props.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                        return None;
                    }
                    //SAFETY: dev and the surface are derived from the same
                    //instance (validated above)
                    match unsafe { surf.supports_queue_family(dev, idx as u32) } {
                        Ok(true) => Some(idx as u32),
                        _ => None,
                    }
                },
            );
            let Some(graphics_present_family) = graphics_present_family else {
                tracing::debug!("Skipping [{name}]: no graphics queue family can present");
                continue;
            };

            //SAFETY: dev was derived from instance
            let device_exts = unsafe { instance.enumerate_raw_device_extension_properties(dev) }
                .unwrap_or_default();
            let missing_ext = REQUIRED_DEVICE_EXTENSIONS.iter().find(|required| {
                !device_exts
                    .iter()
                    .any(|ext| ext.extension_name_as_c_str() == Ok(**required))
            });
            if let Some(missing) = missing_ext {
                tracing::debug!(
                    "Skipping [{name}]: missing device extension {}",
                    missing.to_string_lossy()
                );
                continue;
            }

            let support = query_feature_support(instance, dev);
            let missing_features = support.missing();
            if !missing_features.is_empty() {
                tracing::debug!("Skipping [{name}]: missing features {missing_features:?}");
                continue;
            }

            candidates.push(Candidate {
                handle: dev,
                props,
                graphics_present_family,
                score: device_preference_score(props.device_type, low_power),
            });
        }

        let best = candidates
            .iter()
            .max_by_key(|candidate| candidate.score)
            .ok_or(CreateDeviceError::NoSuitableDevice)?;

        tracing::info!(
            "Selected physical device: {:?} (type: {:?})",
            best.props.device_name_as_c_str().unwrap_or(c"unknown"),
            best.props.device_type,
        );

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(best.graphics_present_family)
            .queue_priorities(&queue_priorities)];

        let ext_ptrs: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| e.as_ptr())
            .collect();

        let core_features = vk::PhysicalDeviceFeatures::default()
            .image_cube_array(true)
            .multi_draw_indirect(true)
            .multi_viewport(true)
            .sampler_anisotropy(true)
            .texture_compression_bc(true);
        let mut features11 = vk::PhysicalDeviceVulkan11Features::default().multiview(true);
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .shader_storage_image_array_non_uniform_indexing(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_storage_image_update_after_bind(true)
            .descriptor_binding_update_unused_while_pending(true)
            .descriptor_binding_partially_bound(true)
            .timeline_semaphore(true)
            .buffer_device_address(true);
        let mut sync2_features =
            vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true);
        let mut dynamic_rendering_features =
            vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);

        let mut enabled_features = vk::PhysicalDeviceFeatures2::default()
            .features(core_features)
            .push_next(&mut features11)
            .push_next(&mut features12)
            .push_next(&mut sync2_features)
            .push_next(&mut dynamic_rendering_features);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&ext_ptrs)
            .push_next(&mut enabled_features);

        //SAFETY: best.handle was derived from instance, device_create_info is
        //valid and only enables features/extensions verified above
        let device = unsafe { instance.create_ash_device(best.handle, &device_create_info) }
            .map_err(CreateDeviceError::DeviceCreationFailed)?;

        //SAFETY: the device was just created with one queue in this family
        let graphics_queue = unsafe { device.get_device_queue(best.graphics_present_family, 0) };

        Ok(Self {
            parent: Arc::clone(instance),
            swapchain_device: instance.create_swapchain_loader(&device),
            synchronization2_device: instance.create_synchronization2_loader(&device),
            debug_utils_device: instance.create_debug_utils_device_loader(&device),
            swapchain_name_counter: AtomicU64::new(0),
            handle: device,
            physical_device: best.handle,
            graphics_queue,
            graphics_queue_family: best.graphics_present_family,
        })
    }

    pub fn get_parent(&self) -> &Arc<Instance> {
        &self.parent
    }

    pub fn get_physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn ash_handle(&self) -> &ash::Device {
        &self.handle
    }

    pub fn raw_handle(&self) -> vk::Device {
        self.handle.handle()
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Wait until all submitted work on this device has completed.
    ///
    /// This may block the calling thread and should generally be used for
    /// coarse-grained transitions (shutdown, window teardown) rather than hot
    /// per-frame paths.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        let _span = tracing::debug_span!("device_wait_idle").entered();
        // SAFETY: `self.handle` is a valid logical device for the lifetime of
        // `self`, and this call has no additional pointer preconditions.
        unsafe { self.handle.device_wait_idle() }
    }

    pub(crate) fn next_swapchain_debug_index(&self) -> u64 {
        self.swapchain_name_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn query_feature_support(instance: &Instance, dev: vk::PhysicalDevice) -> FeatureSupport {
    let mut features11 = vk::PhysicalDeviceVulkan11Features::default();
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut sync2 = vk::PhysicalDeviceSynchronization2Features::default();
    let mut dynamic_rendering = vk::PhysicalDeviceDynamicRenderingFeatures::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features11)
        .push_next(&mut features12)
        .push_next(&mut sync2)
        .push_next(&mut dynamic_rendering);

    //SAFETY: dev was derived from instance, the chain above is valid
    unsafe { instance.get_raw_physical_device_features2(dev, &mut features2) };

    let core = features2.features;
    FeatureSupport {
        image_cube_array: core.image_cube_array == vk::TRUE,
        multi_draw_indirect: core.multi_draw_indirect == vk::TRUE,
        multi_viewport: core.multi_viewport == vk::TRUE,
        sampler_anisotropy: core.sampler_anisotropy == vk::TRUE,
        texture_compression_bc: core.texture_compression_bc == vk::TRUE,
        multiview: features11.multiview == vk::TRUE,
        descriptor_indexing: features12.descriptor_indexing == vk::TRUE,
        sampled_image_non_uniform_indexing: features12
            .shader_sampled_image_array_non_uniform_indexing
            == vk::TRUE,
        storage_image_non_uniform_indexing: features12
            .shader_storage_image_array_non_uniform_indexing
            == vk::TRUE,
        sampled_image_update_after_bind: features12
            .descriptor_binding_sampled_image_update_after_bind
            == vk::TRUE,
        storage_image_update_after_bind: features12
            .descriptor_binding_storage_image_update_after_bind
            == vk::TRUE,
        update_unused_while_pending: features12.descriptor_binding_update_unused_while_pending
            == vk::TRUE,
        partially_bound: features12.descriptor_binding_partially_bound == vk::TRUE,
        timeline_semaphore: features12.timeline_semaphore == vk::TRUE,
        buffer_device_address: features12.buffer_device_address == vk::TRUE,
        synchronization2: sync2.synchronization2 == vk::TRUE,
        dynamic_rendering: dynamic_rendering.dynamic_rendering == vk::TRUE,
    }
}

//Swapchain functionality
impl Device {
    /// # Safety
    /// `create_info` must reference valid Vulkan objects derived from this
    /// device and its parent instance. Any referenced pointers must remain
    /// valid for the duration of the call.
    ///
    /// If `create_info.old_swapchain` is non-null, that handle must be a valid
    /// swapchain created from this device.
    pub unsafe fn create_raw_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> Result<vk::SwapchainKHR, vk::Result> {
        // SAFETY: Caller guarantees create_info validity and handle provenance.
        unsafe { self.swapchain_device.create_swapchain(create_info, None) }
    }

    /// # Safety
    /// `swapchain` must be a valid swapchain handle created from this device
    /// and not yet destroyed.
    pub unsafe fn get_raw_swapchain_images(
        &self,
        swapchain: vk::SwapchainKHR,
    ) -> Result<Vec<vk::Image>, vk::Result> {
        // SAFETY: Caller guarantees swapchain validity and lifetime.
        unsafe { self.swapchain_device.get_swapchain_images(swapchain) }
    }

    /// # Safety
    /// `swapchain` must be a valid handle derived from this device, and all
    /// child resources derived from it must be destroyed first.
    ///
    /// No in-flight GPU work may still reference the swapchain.
    pub unsafe fn destroy_raw_swapchain(&self, swapchain: vk::SwapchainKHR) {
        // SAFETY: Caller guarantees swapchain provenance and drop ordering.
        unsafe { self.swapchain_device.destroy_swapchain(swapchain, None) };
    }

    /// # Safety
    /// `create_info` must reference valid Vulkan objects derived from this
    /// device. Any referenced pointers must remain valid for the duration of
    /// the call.
    pub unsafe fn create_raw_image_view(
        &self,
        create_info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView, vk::Result> {
        // SAFETY: Caller guarantees create_info validity and provenance.
        unsafe { self.handle.create_image_view(create_info, None) }
    }

    /// # Safety
    /// `image_view` must be a valid handle derived from this device, and all
    /// objects using it must be destroyed first.
    ///
    /// No in-flight GPU work may still reference the image view.
    pub unsafe fn destroy_raw_image_view(&self, image_view: vk::ImageView) {
        // SAFETY: Caller guarantees image_view provenance and drop ordering.
        unsafe { self.handle.destroy_image_view(image_view, None) };
    }
}

//Command pool and buffer functionality
impl Device {
    /// # Safety
    /// `create_info` must use a valid queue family index for this device.
    pub unsafe fn create_raw_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> Result<vk::CommandPool, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_command_pool(create_info, None) }
    }

    /// # Safety
    /// `pool` must be a valid handle created from this device. Destruction
    /// implicitly frees every command buffer allocated from the pool; none of
    /// them may be pending execution.
    pub unsafe fn destroy_raw_command_pool(&self, pool: vk::CommandPool) {
        // SAFETY: Caller guarantees pool provenance and that no allocated
        // buffer is pending.
        unsafe { self.handle.destroy_command_pool(pool, None) };
    }

    /// # Safety
    /// `allocate_info` must reference a valid pool created from this device,
    /// and the caller must externally synchronize access to that pool.
    pub unsafe fn allocate_raw_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>, vk::Result> {
        // SAFETY: Caller guarantees allocate_info validity and pool
        // synchronization.
        unsafe { self.handle.allocate_command_buffers(allocate_info) }
    }

    /// # Safety
    /// `command_buffer` must be a valid handle allocated from a pool created
    /// with `RESET_COMMAND_BUFFER` on this device, must not be pending
    /// execution, and its pool must be externally synchronized.
    pub unsafe fn reset_raw_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees the buffer is not pending and the pool
        // allows individual reset.
        unsafe {
            self.handle
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }
    }

    /// # Safety
    /// `command_buffer` must be a valid handle in the initial state, derived
    /// from this device, with its pool externally synchronized.
    pub unsafe fn begin_raw_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees buffer state and pool synchronization.
        unsafe { self.handle.begin_command_buffer(command_buffer, begin_info) }
    }

    /// # Safety
    /// `command_buffer` must be a valid handle in the recording state, derived
    /// from this device.
    pub unsafe fn end_raw_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees the buffer is recording.
        unsafe { self.handle.end_command_buffer(command_buffer) }
    }
}

//Semaphore and submission functionality
impl Device {
    /// # Safety
    /// `create_info` and its pNext chain must be valid.
    pub unsafe fn create_raw_semaphore(
        &self,
        create_info: &vk::SemaphoreCreateInfo<'_>,
    ) -> Result<vk::Semaphore, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_semaphore(create_info, None) }
    }

    /// # Safety
    /// `semaphore` must be a valid handle created from this device. No GPU
    /// work may be waiting on or about to signal it.
    pub unsafe fn destroy_raw_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: Caller guarantees semaphore provenance and quiescence.
        unsafe { self.handle.destroy_semaphore(semaphore, None) };
    }

    /// Read the current counter value of a timeline semaphore.
    ///
    /// # Safety
    /// `semaphore` must be a valid timeline semaphore created from this
    /// device.
    pub unsafe fn get_raw_semaphore_counter_value(
        &self,
        semaphore: vk::Semaphore,
    ) -> Result<u64, vk::Result> {
        // SAFETY: Caller guarantees semaphore provenance and type. The
        // entry point is core in Vulkan 1.2, which instance creation enforces.
        unsafe { self.handle.get_semaphore_counter_value(semaphore) }
    }

    /// Submit recorded work to the graphics queue through the
    /// synchronization2 entry point.
    ///
    /// # Safety
    /// Every command buffer referenced by `submits` must be in the executable
    /// state, and every semaphore handle must be valid for this device. The
    /// caller must externally synchronize access to the graphics queue — in
    /// this crate that is the driver facade's submission lock.
    pub unsafe fn queue_submit2(
        &self,
        submits: &[vk::SubmitInfo2<'_>],
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees submit validity and queue serialization.
        unsafe {
            self.synchronization2_device.queue_submit2(
                self.graphics_queue,
                submits,
                vk::Fence::null(),
            )
        }
    }
}

//Debug naming functionality
impl Device {
    /// Set a Vulkan debug name for an object owned by this device.
    ///
    /// Passing `None` as the name is treated as a no-op.
    ///
    /// # Safety
    /// `object` must be a valid Vulkan handle created from this device (or a
    /// child object associated with this device) and must remain valid for the
    /// duration of the call.
    pub unsafe fn set_object_name<H>(
        &self,
        object: H,
        name: Option<&CStr>,
    ) -> Result<(), NameObjectError>
    where
        H: vk::Handle,
    {
        let debug_utils = self
            .debug_utils_device
            .as_ref()
            .ok_or(NameObjectError::DebugUtilsNotEnabled)?;

        let Some(name) = name else {
            return Ok(());
        };

        let object_name_info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(object)
            .object_name(name);

        // SAFETY: Caller guarantees object provenance and validity.
        unsafe { debug_utils.set_debug_utils_object_name(&object_name_info) }
            .map_err(NameObjectError::Vulkan)
    }

    /// Lazily set a Vulkan debug name for an object owned by this device.
    ///
    /// The closure is only called if `VK_EXT_debug_utils` is enabled.
    /// Returning `None` from the closure is treated as a no-op.
    ///
    /// # Safety
    /// Same contract as [`set_object_name`](Self::set_object_name).
    pub unsafe fn set_object_name_with<H, F>(
        &self,
        object: H,
        name_provider: F,
    ) -> Result<(), NameObjectError>
    where
        H: vk::Handle,
        F: FnOnce() -> Option<CString>,
    {
        if self.debug_utils_device.is_none() {
            return Err(NameObjectError::DebugUtilsNotEnabled);
        }

        let name = name_provider();
        // SAFETY: This method shares the same safety contract as
        // set_object_name.
        unsafe { self.set_object_name(object, name.as_deref()) }
    }

    /// Convenience helper to set a name from UTF-8 text.
    ///
    /// Passing `None` as the name is treated as a no-op.
    ///
    /// # Safety
    /// Same contract as [`set_object_name`](Self::set_object_name).
    pub unsafe fn set_object_name_str<H>(
        &self,
        object: H,
        name: Option<&str>,
    ) -> Result<(), NameObjectError>
    where
        H: vk::Handle,
    {
        let name = match name {
            Some(name) => Some(CString::new(name).map_err(NameObjectError::InvalidName)?),
            None => None,
        };

        // SAFETY: This method shares the same safety contract as
        // set_object_name.
        unsafe { self.set_object_name(object, name.as_deref()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_power_prefers_integrated_over_discrete() {
        let integrated =
            device_preference_score(vk::PhysicalDeviceType::INTEGRATED_GPU, true);
        let discrete = device_preference_score(vk::PhysicalDeviceType::DISCRETE_GPU, true);
        assert!(integrated > discrete);
    }

    #[test]
    fn default_prefers_discrete() {
        let integrated =
            device_preference_score(vk::PhysicalDeviceType::INTEGRATED_GPU, false);
        let discrete = device_preference_score(vk::PhysicalDeviceType::DISCRETE_GPU, false);
        assert!(discrete > integrated);
    }

    #[test]
    fn discrete_still_beats_cpu_under_low_power() {
        let cpu = device_preference_score(vk::PhysicalDeviceType::CPU, true);
        let discrete = device_preference_score(vk::PhysicalDeviceType::DISCRETE_GPU, true);
        assert!(discrete > cpu);
    }

    #[test]
    fn missing_features_are_reported_by_name() {
        let mut support = FeatureSupport::default();
        assert!(support.missing().contains(&"timelineSemaphore"));

        support = FeatureSupport {
            image_cube_array: true,
            multi_draw_indirect: true,
            multi_viewport: true,
            sampler_anisotropy: true,
            texture_compression_bc: true,
            multiview: true,
            descriptor_indexing: true,
            sampled_image_non_uniform_indexing: true,
            storage_image_non_uniform_indexing: true,
            sampled_image_update_after_bind: true,
            storage_image_update_after_bind: true,
            update_unused_while_pending: true,
            partially_bound: true,
            timeline_semaphore: true,
            buffer_device_address: true,
            synchronization2: true,
            dynamic_rendering: false,
        };
        assert_eq!(support.missing(), vec!["dynamicRendering"]);
    }
}
