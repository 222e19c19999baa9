use std::sync::{Arc, Mutex};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;

/// Stable identity for a window, assigned by the windowing toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Token returned by [`PresentTarget::watch_pixel_size`], handed back on
/// unsubscription. Its meaning is defined by the windowing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchToken(u64);

impl WatchToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error)]
#[error("failed to query window pixel size: {reason}")]
pub struct PixelSizeError {
    pub reason: String,
}

impl PixelSizeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The contract the windowing toolkit fulfils for each window handed to the
/// driver: raw handles for surface derivation, a stable identity, the current
/// size in pixels, and pixel-size-change notifications delivered to a
/// [`ResizeWatcher`].
pub trait PresentTarget: HasDisplayHandle + HasWindowHandle {
    fn id(&self) -> WindowId;

    /// Current framebuffer size of the window, in pixels.
    fn pixel_size(&self) -> Result<(u32, u32), PixelSizeError>;

    /// Begin delivering pixel-size-changed notifications for this window to
    /// `watcher` (via [`ResizeWatcher::notify`]). Notifications may arrive on
    /// any thread.
    fn watch_pixel_size(&self, watcher: ResizeWatcher) -> WatchToken;

    /// Stop delivering notifications for a previously installed watcher.
    fn unwatch_pixel_size(&self, token: WatchToken);
}

#[derive(Debug)]
struct PendingExtent {
    width: u32,
    height: u32,
    dirty: bool,
    generation: u64,
}

/// Snapshot of the resize state at the start of a swapchain rebuild.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResizeSnapshot {
    pub width: u32,
    pub height: u32,
    pub generation: u64,
}

/// Shared pending-extent state for one window's swapchain.
///
/// The resize monitor writes into it from the windowing toolkit's notification
/// context; the render loop reads the dirty flag and the swapchain manager
/// consumes the pending extent on recreation. Rapid notifications coalesce:
/// only the last extent before the next rebuild matters.
#[derive(Debug)]
pub struct ResizeState {
    inner: Mutex<PendingExtent>,
}

impl ResizeState {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(PendingExtent {
                width,
                height,
                dirty: false,
                generation: 0,
            }),
        }
    }

    /// Record a new pending extent and mark the swapchain stale. Overwrites
    /// any previous pending extent.
    pub fn note_resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock().expect("resize state lock poisoned");
        inner.width = width;
        inner.height = height;
        inner.dirty = true;
        inner.generation += 1;
    }

    /// Whether a resize has arrived since the last successful rebuild.
    pub fn needs_recreation(&self) -> bool {
        self.inner
            .lock()
            .expect("resize state lock poisoned")
            .dirty
    }

    /// The extent the next rebuild will target.
    pub fn pending_extent(&self) -> (u32, u32) {
        let inner = self.inner.lock().expect("resize state lock poisoned");
        (inner.width, inner.height)
    }

    pub(crate) fn snapshot(&self) -> ResizeSnapshot {
        let inner = self.inner.lock().expect("resize state lock poisoned");
        ResizeSnapshot {
            width: inner.width,
            height: inner.height,
            generation: inner.generation,
        }
    }

    /// Clear the dirty flag for a completed rebuild, unless another resize
    /// arrived after `generation` was snapshotted — in that case the flag
    /// stays set so the newer extent gets its own rebuild.
    pub(crate) fn acknowledge(&self, generation: u64) {
        let mut inner = self.inner.lock().expect("resize state lock poisoned");
        if inner.generation == generation {
            inner.dirty = false;
        }
    }
}

/// Handle through which the windowing toolkit reports pixel-size changes for
/// one watched window. Cheap to clone; safe to call from any thread.
#[derive(Debug, Clone)]
pub struct ResizeWatcher {
    window: WindowId,
    state: Arc<ResizeState>,
}

impl ResizeWatcher {
    pub(crate) fn new(window: WindowId, state: Arc<ResizeState>) -> Self {
        Self { window, state }
    }

    /// The window this watcher is scoped to. Toolkits that deliver one event
    /// stream for all windows use this to filter.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Report that the watched window's framebuffer is now `width`×`height`
    /// pixels.
    pub fn notify(&self, width: u32, height: u32) {
        self.state.note_resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_clean() {
        let state = ResizeState::new(800, 600);
        assert!(!state.needs_recreation());
        assert_eq!(state.pending_extent(), (800, 600));
    }

    #[test]
    fn resize_sets_pending_extent_and_dirty_flag() {
        let state = ResizeState::new(800, 600);
        state.note_resize(1024, 768);
        assert!(state.needs_recreation());
        assert_eq!(state.pending_extent(), (1024, 768));
    }

    #[test]
    fn rapid_resizes_coalesce_to_the_last_extent() {
        let state = ResizeState::new(800, 600);
        state.note_resize(640, 480);
        state.note_resize(1920, 1080);
        assert_eq!(state.pending_extent(), (1920, 1080));

        let snap = state.snapshot();
        assert_eq!((snap.width, snap.height), (1920, 1080));
        state.acknowledge(snap.generation);
        assert!(!state.needs_recreation());
    }

    #[test]
    fn acknowledge_of_a_stale_rebuild_keeps_the_flag_set() {
        let state = ResizeState::new(800, 600);
        state.note_resize(640, 480);
        let snap = state.snapshot();

        // A resize lands while the rebuild for 640x480 is in flight.
        state.note_resize(1920, 1080);
        state.acknowledge(snap.generation);

        assert!(state.needs_recreation());
        assert_eq!(state.pending_extent(), (1920, 1080));
    }

    #[test]
    fn watcher_routes_to_the_shared_state() {
        let state = Arc::new(ResizeState::new(100, 100));
        let watcher = ResizeWatcher::new(WindowId::new(7), Arc::clone(&state));
        assert_eq!(watcher.window(), WindowId::new(7));

        let clone = watcher.clone();
        clone.notify(300, 200);
        assert!(state.needs_recreation());
        assert_eq!(state.pending_extent(), (300, 200));
    }
}
