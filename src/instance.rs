use std::{
    ffi::{CStr, CString},
    fmt::Debug,
    str::FromStr,
};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;

use crate::log::VulkanLogLevel;

/// The Vulkan instance plus the instance-level loaders derived from it.
///
/// Created once per process by the driver facade and shared via `Arc` with
/// every surface and the device. `Drop` destroys the debug messenger first
/// and the instance last.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    debug_messenger: Option<(vk::DebugUtilsMessengerEXT, ash::ext::debug_utils::Instance)>,
    surface_instance: ash::khr::surface::Instance,
    has_debug_utils: bool,
    has_extended_color_spaces: bool,
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("handle", &self.handle.handle())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum InstanceCreationError {
    #[error("could not load libvulkan: {0}")]
    LibraryLoading(libloading::Error),
    #[error("could not load vkGetInstanceProcAddr from libvulkan")]
    MissingEntryPoint,
    #[error("couldn't get a display handle from the presentation target: {0}")]
    InvalidDisplayHandle(raw_window_handle::HandleError),
    #[error("missing mandatory instance extensions: {0:?}")]
    MissingExtensions(Vec<String>),
    #[error("driver reports Vulkan {0}.{1}, but this engine requires 1.2")]
    UnsupportedApiVersion(u32, u32),
    #[error("invalid application name passed to Instance::new")]
    InvalidAppName,
    #[error("unknown Vulkan error: {0}")]
    UnknownVulkan(vk::Result),
}

impl From<vk::Result> for InstanceCreationError {
    fn from(value: vk::Result) -> Self {
        InstanceCreationError::UnknownVulkan(value)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        tracing::debug!("Dropping instance {:?}", self.handle.handle());
        if let Some((debug_messenger, debug_utils_instance)) = self.debug_messenger.take() {
            //SAFETY: last use of this debug messenger, which was created from
            //this instance. debug_utils_instance is derived from this instance
            unsafe { debug_utils_instance.destroy_debug_utils_messenger(debug_messenger, None) };
        }
        //SAFETY: We are in drop so this is the last use of the instance. Every
        //derived object (surfaces, the device) holds an Arc to us and must
        //already be gone.
        unsafe { self.handle.destroy_instance(None) };
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    //SAFETY: Vulkan guarantees p_callback_data is valid for the call
    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }.to_string_lossy();

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "GENERAL",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "VALIDATION",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "PERFORMANCE",
        _ => "UNKNOWN",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::trace!(target: "kestrel-validation", "[{}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "kestrel-validation", "[{}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "kestrel-validation", "[{}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "kestrel-validation", "[{}] {}", type_str, message);
        }
        _ => {
            tracing::debug!(target: "kestrel-validation", "[{}] {}", type_str, message);
        }
    }

    vk::FALSE
}

impl Instance {
    /// Load Vulkan and create an instance suitable for presenting to windows
    /// of the platform `display_source` belongs to.
    ///
    /// Surface extensions for the platform are mandatory; `VK_EXT_debug_utils`
    /// and `VK_EXT_swapchain_colorspace` are negotiated and enabled only when
    /// the driver advertises them. When `validation` is set, the Khronos
    /// validation layer is requested (if installed) and a debug messenger
    /// forwards validation output to `tracing` at the matching severity.
    ///
    /// # Safety
    /// This loads vulkan using libloading, meaning that there can be arbitrary
    /// code executed. This is not great but it's *probably* fine?
    pub unsafe fn new(
        app_name: impl AsRef<str>,
        validation: Option<VulkanLogLevel>,
        display_source: &impl HasDisplayHandle,
    ) -> Result<Self, InstanceCreationError> {
        use InstanceCreationError as Error;

        let app_name_cstring = match CString::from_str(app_name.as_ref()) {
            Ok(cstr) => cstr,
            Err(_) => Err(Error::InvalidAppName)?,
        };
        //SAFETY: We pass on the burden of the safety from loading dlls to the
        //caller. As for Entry, we ensure all other vulkan objects are dropped
        //before Entry is dropped (handled in the Drop impl of Instance)
        let entry = unsafe { ash::Entry::load() }.map_err(|e| match e {
            ash::LoadingError::LibraryLoadFailure(error) => Error::LibraryLoading(error),
            ash::LoadingError::MissingEntryPoint(_) => Error::MissingEntryPoint,
        })?;

        //SAFETY: Basically always fine
        let api_version = unsafe { entry.try_enumerate_instance_version() }
            .unwrap_or(Some(vk::API_VERSION_1_0))
            .unwrap_or(vk::API_VERSION_1_0);
        let (major, minor) = (
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
        );
        if major < 1 || (major == 1 && minor < 2) {
            return Err(Error::UnsupportedApiVersion(major, minor));
        }

        // ash_window will be necessary to get a surface later, but surfaces
        // are an extension. This gets those extensions as the base set of
        // mandatory extensions.
        let ash_window_exts = ash_window::enumerate_required_extensions(
            display_source
                .display_handle()
                .map_err(Error::InvalidDisplayHandle)?
                .as_raw(),
        )?;
        let mandatory_exts: Vec<&CStr> = ash_window_exts
            .iter()
            //SAFETY: ash_window promises to hand us null terminated C strings
            //in its API. This isn't enforced anywhere through any safety means
            //but it is documented
            .map(|ext_cstr_ptr| unsafe { CStr::from_ptr(*ext_cstr_ptr) })
            .collect();

        //SAFETY: Pretty much always okay
        let instance_exts_avail = unsafe { entry.enumerate_instance_extension_properties(None) }?;
        //SAFETY: Pretty much always okay
        let instance_layers_avail = unsafe { entry.enumerate_instance_layer_properties() };

        let ext_available = |name: &CStr| {
            instance_exts_avail
                .iter()
                .any(|avail| avail.extension_name_as_c_str() == Ok(name))
        };

        let missing_exts: Vec<_> = mandatory_exts
            .iter()
            .filter(|mandatory_ext| !ext_available(mandatory_ext))
            .map(|ext| ext.to_string_lossy().into_owned())
            .collect();
        if !missing_exts.is_empty() {
            return Err(Error::MissingExtensions(missing_exts));
        }

        let has_debug_utils = ext_available(ash::ext::debug_utils::NAME);
        let has_extended_color_spaces = ext_available(ash::ext::swapchain_colorspace::NAME);

        let validation_layer_name = c"VK_LAYER_KHRONOS_validation";
        let validation_layer_available = instance_layers_avail
            .as_ref()
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str() == Ok(validation_layer_name))
            })
            .unwrap_or(false);

        let mut enabled_exts: Vec<_> = mandatory_exts.iter().map(|ext| ext.as_ptr()).collect();
        let mut enabled_layers: Vec<*const std::ffi::c_char> = Vec::new();

        if has_debug_utils {
            enabled_exts.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        if has_extended_color_spaces {
            enabled_exts.push(ash::ext::swapchain_colorspace::NAME.as_ptr());
        }

        if validation.is_some() {
            if validation_layer_available {
                enabled_layers.push(validation_layer_name.as_ptr());
            } else {
                tracing::warn!(
                    "Validation requested but VK_LAYER_KHRONOS_validation is not installed"
                );
            }
        }

        let enable_messenger = validation.is_some() && has_debug_utils;
        let mut debug_messenger_create_info = validation
            .filter(|_| enable_messenger)
            .map(|log_level| {
                vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(log_level.severity_mask())
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(vulkan_debug_callback))
            });

        let engine_name = c"Kestrel";

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstring)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_exts)
            .enabled_layer_names(&enabled_layers);

        if let Some(ref mut debug_info) = debug_messenger_create_info {
            instance_create_info = instance_create_info.push_next(debug_info);
        }

        //SAFETY: We made a valid instance_create_info
        let instance = unsafe { entry.create_instance(&instance_create_info, None) }?;

        let debug_messenger =
            if let Some(mut debug_messenger_create_info) = debug_messenger_create_info {
                debug_messenger_create_info.p_next = std::ptr::null();
                let debug_utils_instance = ash::ext::debug_utils::Instance::new(&entry, &instance);
                //SAFETY: Valid CI
                match unsafe {
                    debug_utils_instance
                        .create_debug_utils_messenger(&debug_messenger_create_info, None)
                } {
                    Ok(debug_messenger) => Some((debug_messenger, debug_utils_instance)),
                    Err(e) => {
                        tracing::warn!(
                            "Debug messenger creation failed ({e}); continuing without one"
                        );
                        None
                    }
                }
            } else {
                None
            };
        let surface_instance = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Instance {
            entry,
            handle: instance,
            debug_messenger,
            surface_instance,
            has_debug_utils,
            has_extended_color_spaces,
        })
    }

    /// Whether `VK_EXT_debug_utils` was available and enabled. Object naming
    /// and the validation messenger only work when this is true.
    pub fn has_debug_utils(&self) -> bool {
        self.has_debug_utils
    }

    /// Whether `VK_EXT_swapchain_colorspace` was available and enabled.
    pub fn has_extended_color_spaces(&self) -> bool {
        self.has_extended_color_spaces
    }

    /// Create a raw VkSurfaceKHR for a window.
    ///
    /// # Safety
    /// The returned surface must be destroyed before `source` is dropped, and
    /// before this instance is destroyed. There is a parent-child relationship
    /// between both the instance and source and the returned surface.
    pub unsafe fn create_raw_surface<T: HasDisplayHandle + HasWindowHandle>(
        &self,
        source: &T,
    ) -> Result<vk::SurfaceKHR, CreateRawSurfaceError> {
        use CreateRawSurfaceError as Error;
        //SAFETY: Caller guarantees the surface is destroyed before source and
        //before this instance
        unsafe {
            ash_window::create_surface(
                &self.entry,
                &self.handle,
                source
                    .display_handle()
                    .map_err(Error::DisplayHandle)?
                    .as_raw(),
                source.window_handle().map_err(Error::WindowHandle)?.as_raw(),
                None,
            )
        }
        .map_err(Error::OnCreate)
    }

    /// Destroy a raw VkSurfaceKHR.
    ///
    /// # Safety
    /// All objects derived from `surf` (swapchains in particular) must be
    /// destroyed first. `surf` must be derived from this instance and must
    /// not be used afterwards.
    pub unsafe fn destroy_raw_surface(&self, surf: vk::SurfaceKHR) {
        //SAFETY: surf is derived from this instance (caller guarantees)
        unsafe { self.surface_instance.destroy_surface(surf, None) };
    }

    /// Get a vector of handles to available physical devices. These handles
    /// are ONLY valid in the context of this instance.
    pub fn fetch_physical_devices(
        &self,
    ) -> Result<Vec<vk::PhysicalDevice>, FetchPhysicalDeviceError> {
        //SAFETY: Pretty much always fine
        match unsafe { self.handle.enumerate_physical_devices() } {
            Ok(v) => Ok(v),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            | Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => {
                Err(FetchPhysicalDeviceError::MemoryExhaustion)
            }
            Err(e) => Err(FetchPhysicalDeviceError::UnknownVulkan(e)),
        }
    }

    /// # Safety
    /// `physical_device` must be derived from this instance.
    pub(crate) unsafe fn get_raw_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        //SAFETY: Caller guarantees physical_device provenance
        unsafe { self.handle.get_physical_device_properties(physical_device) }
    }

    /// # Safety
    /// `physical_device` must be derived from this instance.
    pub(crate) unsafe fn get_raw_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        //SAFETY: Caller guarantees physical_device provenance
        unsafe {
            self.handle
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    /// Query the feature structs chained off `features`.
    ///
    /// # Safety
    /// `physical_device` must be derived from this instance, and the pNext
    /// chain of `features` must be a valid chain of feature structs.
    pub(crate) unsafe fn get_raw_physical_device_features2(
        &self,
        physical_device: vk::PhysicalDevice,
        features: &mut vk::PhysicalDeviceFeatures2<'_>,
    ) {
        //SAFETY: Caller guarantees physical_device provenance and chain
        //validity. Instance API version 1.2+ is enforced at creation, so the
        //features2 entry point is available.
        unsafe {
            self.handle
                .get_physical_device_features2(physical_device, features)
        }
    }

    /// # Safety
    /// `physical_device` must be derived from this instance.
    pub(crate) unsafe fn enumerate_raw_device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::ExtensionProperties>, vk::Result> {
        //SAFETY: Caller guarantees physical_device provenance
        unsafe {
            self.handle
                .enumerate_device_extension_properties(physical_device)
        }
    }

    /// # Safety
    /// `physical_device` must be derived from this instance, `surface` must
    /// be derived from this instance, and `queue_family_index` must be a
    /// valid family index for `physical_device`.
    pub(crate) unsafe fn get_raw_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool, vk::Result> {
        //SAFETY: Caller guarantees handle provenance
        unsafe {
            self.surface_instance.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                surface,
            )
        }
    }

    /// # Safety
    /// `physical_device` and `surface` must be derived from this instance.
    pub(crate) unsafe fn get_surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, vk::Result> {
        //SAFETY: Caller guarantees handle provenance
        unsafe {
            self.surface_instance
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
    }

    /// # Safety
    /// `physical_device` and `surface` must be derived from this instance.
    pub(crate) unsafe fn get_surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, vk::Result> {
        //SAFETY: Caller guarantees handle provenance
        unsafe {
            self.surface_instance
                .get_physical_device_surface_formats(physical_device, surface)
        }
    }

    /// # Safety
    /// `physical_device` and `surface` must be derived from this instance.
    pub(crate) unsafe fn get_surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, vk::Result> {
        //SAFETY: Caller guarantees handle provenance
        unsafe {
            self.surface_instance
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
    }

    /// # Safety
    /// `physical_device` must be derived from this instance and `create_info`
    /// must be valid for it.
    pub(crate) unsafe fn create_ash_device(
        &self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<ash::Device, vk::Result> {
        //SAFETY: Caller guarantees physical_device provenance and create_info
        //validity
        unsafe { self.handle.create_device(physical_device, create_info, None) }
    }

    pub(crate) fn create_swapchain_loader(&self, device: &ash::Device) -> ash::khr::swapchain::Device {
        ash::khr::swapchain::Device::new(&self.handle, device)
    }

    pub(crate) fn create_synchronization2_loader(
        &self,
        device: &ash::Device,
    ) -> ash::khr::synchronization2::Device {
        ash::khr::synchronization2::Device::new(&self.handle, device)
    }

    /// Returns a debug-utils device loader when the extension was enabled at
    /// instance creation, `None` otherwise.
    pub(crate) fn create_debug_utils_device_loader(
        &self,
        device: &ash::Device,
    ) -> Option<ash::ext::debug_utils::Device> {
        self.has_debug_utils
            .then(|| ash::ext::debug_utils::Device::new(&self.handle, device))
    }
}

#[derive(Debug, Error)]
pub enum FetchPhysicalDeviceError {
    #[error("error fetching physical devices, memory exhaustion")]
    MemoryExhaustion,
    #[error("error fetching physical devices, unknown vulkan: {0}")]
    UnknownVulkan(vk::Result),
}

#[derive(Debug, Error)]
pub enum CreateRawSurfaceError {
    #[error("error creating surface: {0}")]
    OnCreate(vk::Result),
    #[error("unable to get display handle: {0}")]
    DisplayHandle(raw_window_handle::HandleError),
    #[error("unable to get window handle: {0}")]
    WindowHandle(raw_window_handle::HandleError),
}
