//! GPU device layer for the Kestrel renderer, built on [`ash`].
//!
//! The [`driver::Driver`] facade owns the Vulkan instance, the logical
//! device and its graphics queue, one swapchain per registered window, and
//! one command pool per rendering thread. Everything else in the crate is a
//! thin RAII wrapper arranged under it:
//!
//! ```text
//! Driver
//! ├── Instance
//! │   └── Surface<W>          (one per registered window)
//! ├── Device
//! │   ├── SwapchainEntry<W>   (one per registered window)
//! │   ├── CommandPool         (one per rendering thread)
//! │   │   └── CommandBuffer
//! │   └── SubmissionTimeline
//! └── SurfaceRegistry
//! ```
//!
//! Each wrapper holds its parent via `Arc` so parents cannot be destroyed
//! while children are alive; teardown order (views before swapchain before
//! surface, everything before device, device before instance) falls out of
//! `Drop` ordering rather than manual bookkeeping.
//!
//! # Naming conventions
//!
//! | prefix  | meaning                                   |
//! |---------|-------------------------------------------|
//! | `raw_*` | accepts or returns a raw `ash::vk` handle |
//! | `ash_*` | returns the `ash` wrapper object          |

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod command;
pub mod device;
pub mod driver;
pub mod instance;
pub mod log;
pub mod registry;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use ash;
pub use raw_window_handle::HandleError as RWHHandleError;
