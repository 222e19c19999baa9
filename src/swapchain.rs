use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::{Device, NameObjectError};
use crate::surface::{Surface, SurfaceQueryError};
use crate::window::{PresentTarget, ResizeSnapshot, ResizeState, ResizeWatcher, WatchToken, WindowId};

/// Every swapchain presents 8-bit BGRA in the non-linear sRGB color space
/// when the surface offers it.
const DESIRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Double buffering; the platform may round up per its capability minimum.
const MIN_IMAGE_COUNT: u32 = 2;

/// Swapchain images are rendered to, blitted into, and sampled by
/// post-processing passes.
const IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::TRANSFER_DST.as_raw()
        | vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
        | vk::ImageUsageFlags::SAMPLED.as_raw(),
);

#[derive(Debug, Error)]
pub enum CreateSwapchainError {
    #[error("Invalid requested swapchain extent ({width}x{height})")]
    InvalidExtent { width: u32, height: u32 },

    #[error("No supported surface formats were reported")]
    NoSurfaceFormats,

    #[error("No supported present modes were reported")]
    NoPresentModes,

    #[error("Failed while querying surface support details: {0}")]
    SurfaceQuery(#[from] SurfaceQueryError),

    #[error("Vulkan error creating swapchain: {0}")]
    VulkanCreate(vk::Result),

    #[error("Vulkan error fetching swapchain images: {0}")]
    VulkanGetImages(vk::Result),

    #[error("Vulkan error creating swapchain image view: {0}")]
    VulkanCreateImageView(vk::Result),
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == DESIRED_FORMAT.format && f.color_space == DESIRED_FORMAT.color_space
        })
        .unwrap_or(formats[0])
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = MIN_IMAGE_COUNT.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }
    image_count
}

fn choose_composite_alpha(
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::CompositeAlphaFlagsKHR {
    if capabilities
        .supported_composite_alpha
        .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
    {
        vk::CompositeAlphaFlagsKHR::OPAQUE
    } else if capabilities
        .supported_composite_alpha
        .contains(vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED)
    {
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
    } else if capabilities
        .supported_composite_alpha
        .contains(vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED)
    {
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED
    } else {
        vk::CompositeAlphaFlagsKHR::INHERIT
    }
}

/// Create one 2D color view per swapchain image, cleaning up the views
/// already created if any creation fails. The returned vector is always the
/// same length as `images`.
fn create_chain_image_views<FCreate, FDestroy>(
    images: &[vk::Image],
    format: vk::Format,
    mut create_image_view: FCreate,
    mut destroy_image_view: FDestroy,
) -> Result<Vec<vk::ImageView>, CreateSwapchainError>
where
    FCreate: FnMut(&vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result>,
    FDestroy: FnMut(vk::ImageView),
{
    let mut image_views: Vec<vk::ImageView> = Vec::with_capacity(images.len());
    for image in images.iter().copied() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match create_image_view(&create_info) {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for created_view in image_views.drain(..) {
                    destroy_image_view(created_view);
                }
                return Err(CreateSwapchainError::VulkanCreateImageView(e));
            }
        }
    }

    Ok(image_views)
}

/// The presentable chain currently installed for a surface. `handle` is null
/// until the first successful build.
#[derive(Debug)]
struct Chain {
    handle: vk::SwapchainKHR,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl Chain {
    fn empty() -> Self {
        Self {
            handle: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            views: Vec::new(),
        }
    }
}

/// Swap `new` in over `current`, destroying the displaced chain's views and
/// then its swapchain. Called only after `new` is fully built, so a failed
/// rebuild never touches the installed chain.
fn install_chain<FDestroyView, FDestroySwapchain>(
    current: &mut Chain,
    new: Chain,
    mut destroy_view: FDestroyView,
    mut destroy_swapchain: FDestroySwapchain,
) where
    FDestroyView: FnMut(vk::ImageView),
    FDestroySwapchain: FnMut(vk::SwapchainKHR),
{
    let old = std::mem::replace(current, new);
    for view in old.views {
        destroy_view(view);
    }
    if old.handle != vk::SwapchainKHR::null() {
        destroy_swapchain(old.handle);
    }
}

/// Copyable view of a window's current swapchain, for the render loop.
#[derive(Debug, Clone)]
pub struct SwapchainInfo {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub needs_recreation: bool,
}

/// Per-window presentable state: the surface, the installed chain, and the
/// pending-resize bookkeeping its watcher writes into.
///
/// The chain is rebuilt in place by [`recreate`](Self::recreate); the
/// previous swapchain handle is always passed as `old_swapchain` so the
/// platform can recycle its images. Dropping the entry removes the resize
/// watcher, destroys views then swapchain, and finally the surface.
pub struct SwapchainEntry<W: PresentTarget> {
    device: Arc<Device>,
    window: Arc<W>,
    watch_token: Option<WatchToken>,
    resize: Arc<ResizeState>,
    chain: Chain,
    surface: Surface<W>,
}

impl<W: PresentTarget> std::fmt::Debug for SwapchainEntry<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapchainEntry")
            .field("window", &self.window.id())
            .field("handle", &self.chain.handle)
            .field("extent", &self.chain.extent)
            .field("image_count", &self.chain.images.len())
            .finish_non_exhaustive()
    }
}

impl<W: PresentTarget> SwapchainEntry<W> {
    /// Wrap a freshly derived surface and install the resize watcher. The
    /// chain starts empty; callers must follow up with
    /// [`recreate`](Self::recreate) before the entry is presentable.
    pub(crate) fn new(
        device: &Arc<Device>,
        window: Arc<W>,
        surface: Surface<W>,
        pixel_size: (u32, u32),
    ) -> Self {
        let resize = Arc::new(ResizeState::new(pixel_size.0, pixel_size.1));
        let watcher = ResizeWatcher::new(window.id(), Arc::clone(&resize));
        let watch_token = Some(window.watch_pixel_size(watcher));

        Self {
            device: Arc::clone(device),
            window,
            watch_token,
            resize,
            chain: Chain::empty(),
            surface,
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn raw_surface(&self) -> vk::SurfaceKHR {
        self.surface.raw_handle()
    }

    pub fn raw_swapchain(&self) -> vk::SwapchainKHR {
        self.chain.handle
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.chain.extent
    }

    pub fn format(&self) -> vk::Format {
        self.chain.format
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.chain.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.chain.views
    }

    /// Whether a resize has invalidated the chain. A dirty entry must not be
    /// presented to until [`recreate`](Self::recreate) succeeds.
    pub fn needs_recreation(&self) -> bool {
        self.resize.needs_recreation()
    }

    pub fn pending_extent(&self) -> (u32, u32) {
        self.resize.pending_extent()
    }

    pub fn info(&self) -> SwapchainInfo {
        SwapchainInfo {
            swapchain: self.chain.handle,
            format: self.chain.format,
            color_space: self.chain.color_space,
            present_mode: self.chain.present_mode,
            extent: self.chain.extent,
            images: self.chain.images.clone(),
            views: self.chain.views.clone(),
            needs_recreation: self.needs_recreation(),
        }
    }

    /// Rebuild the chain for the pending extent, handing the previous
    /// swapchain to the platform for resource reuse.
    ///
    /// On success the old views and swapchain are destroyed, every chain
    /// field is replaced, and the dirty flag is cleared (unless a newer
    /// resize arrived mid-build). On failure the installed chain is left
    /// untouched and the dirty flag keeps the entry scheduled for a retry.
    ///
    /// The caller must guarantee no in-flight GPU work still references the
    /// previous chain's views.
    pub fn recreate(&mut self) -> Result<(), CreateSwapchainError> {
        let snap: ResizeSnapshot = self.resize.snapshot();
        if snap.width == 0 || snap.height == 0 {
            return Err(CreateSwapchainError::InvalidExtent {
                width: snap.width,
                height: snap.height,
            });
        }

        let physical_device = self.device.get_physical_device();

        // SAFETY: physical_device belongs to the same instance the surface
        // was derived from; both are owned by this entry's device/surface.
        let capabilities = unsafe { self.surface.query_capabilities(physical_device) }?;
        // SAFETY: same reasoning as above.
        let formats = unsafe { self.surface.query_formats(physical_device) }?;
        // SAFETY: same reasoning as above.
        let present_modes = unsafe { self.surface.query_present_modes(physical_device) }?;

        if formats.is_empty() {
            return Err(CreateSwapchainError::NoSurfaceFormats);
        }
        if present_modes.is_empty() {
            return Err(CreateSwapchainError::NoPresentModes);
        }

        let surface_format = choose_surface_format(&formats);
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: snap.width,
                height: snap.height,
            },
        );
        let image_count = choose_image_count(&capabilities);
        let composite_alpha = choose_composite_alpha(&capabilities);
        let queue_family_indices = [self.device.graphics_queue_family()];

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.raw_handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(IMAGE_USAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(self.chain.handle);

        let device = &self.device;
        // SAFETY: create_info references this entry's surface and the
        // currently installed (or null) swapchain, both derived from device.
        let handle = unsafe { device.create_raw_swapchain(&create_info) }
            .map_err(CreateSwapchainError::VulkanCreate)?;

        let swapchain_debug_index = device.next_swapchain_debug_index();
        // SAFETY: `handle` is a valid swapchain created from `device`.
        match unsafe {
            device.set_object_name_with(handle, || {
                std::ffi::CString::new(format!("Swapchain {swapchain_debug_index}")).ok()
            })
        } {
            Ok(()) | Err(NameObjectError::DebugUtilsNotEnabled) => {}
            Err(e) => tracing::warn!("Failed to name swapchain {:?}: {e}", handle),
        }

        // SAFETY: handle was created by this device's swapchain loader and is
        // valid.
        let images = unsafe { device.get_raw_swapchain_images(handle) }
            .inspect_err(|_| {
                // SAFETY: handle was created above and must be destroyed on
                // early exit.
                unsafe { device.destroy_raw_swapchain(handle) };
            })
            .map_err(CreateSwapchainError::VulkanGetImages)?;

        let views = create_chain_image_views(
            &images,
            surface_format.format,
            |view_create_info| {
                // SAFETY: view_create_info references a valid swapchain image
                // from this device with a standard 2D color subresource range.
                unsafe { device.create_raw_image_view(view_create_info) }
            },
            |view| {
                // SAFETY: view was created by device and must be destroyed on
                // early exit.
                unsafe { device.destroy_raw_image_view(view) };
            },
        )
        .inspect_err(|_| {
            // SAFETY: handle was created above and must be destroyed on early
            // exit.
            unsafe { device.destroy_raw_swapchain(handle) };
        })?;

        for (index, view) in views.iter().copied().enumerate() {
            // SAFETY: view is valid and created from device.
            match unsafe {
                device.set_object_name_with(view, || {
                    std::ffi::CString::new(format!(
                        "Swapchain {swapchain_debug_index} ImageView {}",
                        index + 1,
                    ))
                    .ok()
                })
            } {
                Ok(()) | Err(NameObjectError::DebugUtilsNotEnabled) => {}
                Err(e) => tracing::warn!("Failed to name swapchain image view {:?}: {e}", view),
            }
        }

        let new_chain = Chain {
            handle,
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode: vk::PresentModeKHR::FIFO,
            extent,
            images,
            views,
        };

        install_chain(
            &mut self.chain,
            new_chain,
            |view| {
                // SAFETY: view belongs to the displaced chain; the caller
                // contract guarantees no in-flight work references it.
                unsafe { device.destroy_raw_image_view(view) };
            },
            |old_swapchain| {
                // SAFETY: old_swapchain was the previously installed chain,
                // already handed to the new chain as old_swapchain and retired.
                unsafe { device.destroy_raw_swapchain(old_swapchain) };
            },
        );
        self.resize.acknowledge(snap.generation);

        tracing::debug!(
            "Rebuilt swapchain {:?} for window {:?} at {}x{}",
            self.chain.handle,
            self.window.id(),
            extent.width,
            extent.height,
        );
        Ok(())
    }
}

impl<W: PresentTarget> Drop for SwapchainEntry<W> {
    fn drop(&mut self) {
        tracing::debug!(
            "Dropping swapchain entry for window {:?} ({:?})",
            self.window.id(),
            self.chain.handle
        );
        if let Some(token) = self.watch_token.take() {
            self.window.unwatch_pixel_size(token);
        }
        // NOTE: Callers must ensure GPU synchronization before drop so no
        // in-flight work still references these views or the swapchain.
        for view in self.chain.views.drain(..) {
            // SAFETY: view was created by this entry's device and is being
            // destroyed during entry teardown.
            unsafe { self.device.destroy_raw_image_view(view) };
        }
        if self.chain.handle != vk::SwapchainKHR::null() {
            // SAFETY: the swapchain was created by this entry's device; its
            // views are already gone and this is the final destruction path.
            unsafe { self.device.destroy_raw_swapchain(self.chain.handle) };
        }
        // The surface field drops after this body, once the swapchain is gone.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;

    #[test]
    fn choose_surface_format_picks_bgra_srgb_when_offered() {
        let fallback = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let chosen = choose_surface_format(&[fallback, DESIRED_FORMAT]);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn choose_surface_format_falls_back_to_first_advertised() {
        let only = vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let chosen = choose_surface_format(&[only]);
        assert_eq!(chosen.format, only.format);
    }

    #[test]
    fn choose_extent_uses_current_when_fixed() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let chosen = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );

        assert_eq!(chosen.width, 1280);
        assert_eq!(chosen.height, 720);
    }

    #[test]
    fn choose_extent_clamps_when_variable() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        let chosen = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 4000,
                height: 200,
            },
        );

        assert_eq!(chosen.width, 1920);
        assert_eq!(chosen.height, 480);
    }

    #[test]
    fn choose_image_count_requests_double_buffering() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn choose_image_count_respects_capability_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn choose_composite_alpha_prefers_opaque() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
                | vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        };
        assert_eq!(
            choose_composite_alpha(&capabilities),
            vk::CompositeAlphaFlagsKHR::OPAQUE
        );
    }

    #[test]
    fn image_view_helper_keeps_views_aligned_with_images() {
        let images = [vk::Image::from_raw(1), vk::Image::from_raw(2)];
        let views = [vk::ImageView::from_raw(100), vk::ImageView::from_raw(101)];
        let create_calls = RefCell::new(0usize);

        let result = create_chain_image_views(
            &images,
            vk::Format::B8G8R8A8_UNORM,
            |_| {
                let mut call = create_calls.borrow_mut();
                let view = views[*call];
                *call += 1;
                Ok(view)
            },
            |_view| panic!("destroy callback should not be called on success"),
        )
        .expect("helper should succeed");

        assert_eq!(result.len(), images.len());
        assert_eq!(result, views);
    }

    #[test]
    fn image_view_helper_cleans_up_on_partial_failure() {
        let images = [
            vk::Image::from_raw(1),
            vk::Image::from_raw(2),
            vk::Image::from_raw(3),
        ];
        let created = vk::ImageView::from_raw(10);
        let create_calls = RefCell::new(0usize);
        let destroyed = RefCell::new(Vec::<vk::ImageView>::new());

        let result = create_chain_image_views(
            &images,
            vk::Format::B8G8R8A8_UNORM,
            |_| {
                let mut call = create_calls.borrow_mut();
                let ret = match *call {
                    0 => Ok(created),
                    _ => Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
                };
                *call += 1;
                ret
            },
            |view| destroyed.borrow_mut().push(view),
        );

        assert!(matches!(
            result,
            Err(CreateSwapchainError::VulkanCreateImageView(
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            ))
        ));
        assert_eq!(destroyed.borrow().as_slice(), &[created]);
    }

    #[test]
    fn install_chain_destroys_the_displaced_chain_and_replaces_fields() {
        let mut current = Chain {
            handle: vk::SwapchainKHR::from_raw(1),
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            images: vec![vk::Image::from_raw(11), vk::Image::from_raw(12)],
            views: vec![vk::ImageView::from_raw(21), vk::ImageView::from_raw(22)],
        };
        let new = Chain {
            handle: vk::SwapchainKHR::from_raw(2),
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            images: vec![vk::Image::from_raw(13), vk::Image::from_raw(14)],
            views: vec![vk::ImageView::from_raw(23), vk::ImageView::from_raw(24)],
        };

        let destroyed_views = RefCell::new(Vec::new());
        let destroyed_swapchains = RefCell::new(Vec::new());
        install_chain(
            &mut current,
            new,
            |view| destroyed_views.borrow_mut().push(view),
            |swapchain| destroyed_swapchains.borrow_mut().push(swapchain),
        );

        assert_eq!(
            destroyed_views.borrow().as_slice(),
            &[vk::ImageView::from_raw(21), vk::ImageView::from_raw(22)]
        );
        assert_eq!(
            destroyed_swapchains.borrow().as_slice(),
            &[vk::SwapchainKHR::from_raw(1)]
        );
        assert_eq!(current.handle, vk::SwapchainKHR::from_raw(2));
        assert_eq!(current.extent.width, 1920);
        assert_eq!(current.images.len(), current.views.len());
    }

    #[test]
    fn install_chain_skips_destroy_for_the_initial_null_chain() {
        let mut current = Chain::empty();
        let new = Chain {
            handle: vk::SwapchainKHR::from_raw(5),
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            images: vec![vk::Image::from_raw(1)],
            views: vec![vk::ImageView::from_raw(2)],
        };

        install_chain(
            &mut current,
            new,
            |_| panic!("no views to destroy on first install"),
            |_| panic!("null swapchain must not be destroyed"),
        );
        assert_eq!(current.handle, vk::SwapchainKHR::from_raw(5));
    }
}
