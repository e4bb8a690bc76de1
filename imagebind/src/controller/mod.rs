//! Per-element attachment controller.
//!
//! An [`AttachmentController`] turns host lifecycle and visibility events
//! into fetch, prefetch, priority and release calls on the
//! [`FetchService`](crate::FetchService) found in its [`ImageContext`].
//!
//! # Lifecycle
//!
//! ```text
//! prepare   optional early prefetch (prepare slot)
//! mount     record display options, primary fetch unless bind-only
//! bind      primary fetch (merges with the mount fetch)
//! unbind    primary release, delayed unless bind-only
//! unmount   full primary release if one is held, every prefetch handle released
//! ```
//!
//! Visibility bands may arrive at any point before unmount. Entering the
//! working range replaces the working-range prefetch; entering a distance
//! band sends a priority hint.
//!
//! # Design
//!
//! Each controller owns at most two open prefetch handles, one per
//! [`ResourceSlot`]. Unmount (or dropping the controller) empties both, so
//! a full lifecycle never leaks a handle. Out-of-order events are rejected
//! with a [`LifecycleError`] and leave the controller unchanged.
//!
//! The ambient configuration is read from the [`ConfigStore`] on every
//! call, so a host can flip flags between events.
//!
//! [`ConfigStore`]: crate::ConfigStore

mod error;
mod lifecycle;
mod props;

pub use error::{LifecycleError, LifecycleResult};
pub use lifecycle::{LifecycleEvent, LifecycleState};
pub use props::{ImageProps, DEFAULT_ASPECT_RATIO};

use tracing::{debug, trace, warn};

use crate::config::AmbientConfig;
use crate::context::ImageContext;
use crate::descriptor::{DescriptorCache, ResourceDescriptor};
use crate::fetch::{
    ContextTag, DisplayOptions, ElementId, FetchRequest, PrimaryFetch, ReleaseMode, Viewport,
};
use crate::policy::PrefetchPolicy;
use crate::slot::ResourceSlot;
use crate::visibility::{BandTransition, RangeGeometry, VisibilityBand, VisibilityRangeTracker};

/// Drives one image element through its lifecycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use imagebind::{
///     AmbientConfig, AttachmentController, ConfigStore, ElementId, ImageContext, ImageProps,
///     LifecycleState, RecordingFetchService,
/// };
///
/// let fetcher = Arc::new(RecordingFetchService::new());
/// let store = Arc::new(ConfigStore::new(AmbientConfig::default()));
/// let context = ImageContext::new(store, fetcher.clone());
///
/// let mut controller =
///     AttachmentController::new(ElementId(7), ImageProps::for_uri("https://x/a.jpg"), context);
/// controller.mount().unwrap();
/// controller.bind().unwrap();
/// assert_eq!(controller.state(), LifecycleState::Bound);
/// assert_eq!(fetcher.primary_operations(), 1);
/// ```
#[derive(Debug)]
pub struct AttachmentController {
    element: ElementId,
    props: ImageProps,
    descriptor: DescriptorCache,
    context: ImageContext,
    state: LifecycleState,
    prepare_slot: ResourceSlot,
    /// Present only when the working range is registered.
    range_slot: Option<ResourceSlot>,
    tracker: Option<VisibilityRangeTracker>,
    display: DisplayOptions,
    viewport: Option<Viewport>,
    /// A primary fetch was issued and not yet released.
    primary_held: bool,
}

impl AttachmentController {
    /// Create a controller in the `Unprepared` state.
    ///
    /// Band registration is decided here from the current configuration.
    pub fn new(element: ElementId, props: ImageProps, context: ImageContext) -> Self {
        let config = context.config();
        let tracker = VisibilityRangeTracker::for_element(props.prefetch, &config.prefetch);
        let range_slot = tracker
            .as_ref()
            .filter(|t| t.is_registered(VisibilityBand::WorkingRange))
            .map(|_| ResourceSlot::new());

        debug!(
            element = %element,
            working_range = range_slot.is_some(),
            distance_bands = tracker
                .as_ref()
                .is_some_and(|t| t.is_registered(VisibilityBand::Visible)),
            "Attachment controller created"
        );

        Self {
            element,
            descriptor: DescriptorCache::new(props.descriptor_inputs()),
            props,
            context,
            state: LifecycleState::Unprepared,
            prepare_slot: ResourceSlot::new(),
            range_slot,
            tracker,
            display: DisplayOptions::default(),
            viewport: None,
            primary_held: false,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn props(&self) -> &ImageProps {
        &self.props
    }

    /// The descriptor every request is issued for.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        self.descriptor.descriptor()
    }

    /// Distance band the element currently occupies, if tracked.
    pub fn current_band(&self) -> Option<VisibilityBand> {
        self.tracker.as_ref().and_then(|t| t.current_band())
    }

    pub fn in_working_range(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| t.in_working_range())
    }

    pub fn display_options(&self) -> DisplayOptions {
        self.display
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Whether the prepare-time prefetch is still held.
    pub fn has_prepare_prefetch(&self) -> bool {
        self.prepare_slot.is_occupied()
    }

    /// Whether a working-range prefetch is held.
    pub fn has_range_prefetch(&self) -> bool {
        self.range_slot.as_ref().is_some_and(|s| s.is_occupied())
    }

    // =========================================================================
    // Host callbacks
    // =========================================================================

    /// Replace the element's props.
    ///
    /// Returns `true` when anything the descriptor depends on changed, in
    /// which case the host should re-render. Band registration is not
    /// revisited.
    pub fn update_props(&mut self, props: ImageProps) -> LifecycleResult<bool> {
        self.ensure_live(LifecycleEvent::UpdateProps)?;

        let changed = self.descriptor.update(props.descriptor_inputs());
        self.props = props;
        if changed {
            debug!(
                element = %self.element,
                descriptor = %self.descriptor.descriptor(),
                "Props changed"
            );
        }
        Ok(changed)
    }

    /// Record the laid-out size so the primary fetch can size its decode.
    pub fn on_bounds_defined(
        &mut self,
        width: i32,
        height: i32,
        padding_x: i32,
        padding_y: i32,
    ) -> LifecycleResult<()> {
        self.ensure_live(LifecycleEvent::BoundsDefined)?;

        let viewport = Viewport::from_layout(width, height, padding_x, padding_y);
        trace!(element = %self.element, ?viewport, "Bounds defined");
        self.viewport = Some(viewport);
        Ok(())
    }

    /// Issue the prepare-time prefetch if policy allows.
    pub fn prepare(&mut self) -> LifecycleResult<()> {
        self.transition(LifecycleEvent::Prepare)?;

        let config = self.context.config();
        if !PrefetchPolicy::new(&config.prefetch).on_prepare(self.props.prefetch) {
            trace!(element = %self.element, "Prepare prefetch disabled");
            return Ok(());
        }

        let handle = self.context.fetcher().fetch(FetchRequest {
            descriptor: self.descriptor.descriptor(),
            target: config.prefetch.prefetch_target_on_prepare,
            tag: ContextTag::OnPrepare,
            caller_context: self.props.caller_context.as_deref(),
            listener: self.props.prefetch_listener,
        });
        self.prepare_slot.set(handle);

        debug!(
            element = %self.element,
            target = %config.prefetch.prefetch_target_on_prepare,
            "Prepare prefetch issued"
        );
        Ok(())
    }

    /// Attach the element.
    ///
    /// In bind-only mode only the display options are recorded.
    pub fn mount(&mut self) -> LifecycleResult<()> {
        self.transition(LifecycleEvent::Mount)?;

        self.display = DisplayOptions {
            mutate_drawables: self.props.mutate_drawables,
        };

        let config = self.context.config();
        if config.use_bind_only {
            trace!(element = %self.element, "Bind-only mode, deferring fetch to bind");
            return Ok(());
        }

        self.fetch_primary();
        if let Some(listener) = self.context.listener() {
            listener.on_image_mount(self.element);
        }
        self.release_superseded_prefetches(&config);
        Ok(())
    }

    /// Make the element current. Always fetches.
    pub fn bind(&mut self) -> LifecycleResult<()> {
        self.transition(LifecycleEvent::Bind)?;

        let config = self.context.config();
        self.fetch_primary();
        if let Some(listener) = self.context.listener() {
            listener.on_image_bind(self.element);
        }
        self.release_superseded_prefetches(&config);
        Ok(())
    }

    /// Detach the element from the current frame.
    pub fn unbind(&mut self) -> LifecycleResult<()> {
        self.transition(LifecycleEvent::Unbind)?;

        if let Some(listener) = self.context.listener() {
            listener.on_image_unbind(self.element);
        }

        let mode = if self.context.config().use_bind_only {
            ReleaseMode::Immediate
        } else {
            ReleaseMode::Delayed
        };
        self.context.fetcher().release_primary(self.element, mode);
        if mode == ReleaseMode::Immediate {
            self.primary_held = false;
        }
        self.prepare_slot.clear();

        debug!(element = %self.element, mode = %mode, "Primary released on unbind");
        Ok(())
    }

    /// Detach the element for good. Unbinds first if still bound.
    pub fn unmount(&mut self) -> LifecycleResult<()> {
        if self.state == LifecycleState::Bound {
            trace!(element = %self.element, "Unmount while bound, unbinding first");
            self.unbind()?;
        }
        self.transition(LifecycleEvent::Unmount)?;

        if let Some(listener) = self.context.listener() {
            listener.on_image_unmount(self.element);
        }

        // Decided by what this element fetched, not by the current flags.
        if self.primary_held {
            self.context
                .fetcher()
                .release_primary(self.element, ReleaseMode::Full);
            self.primary_held = false;
        }

        let prepare_released = self.prepare_slot.clear();
        let range_released = self.range_slot.as_mut().is_some_and(|s| s.clear());

        debug!(
            element = %self.element,
            prepare_released,
            range_released,
            "Element unmounted"
        );
        Ok(())
    }

    /// The element entered `band`.
    pub fn enter(&mut self, band: VisibilityBand) -> LifecycleResult<()> {
        self.ensure_live(LifecycleEvent::Enter(band))?;

        let transitions = match self.tracker.as_mut() {
            Some(tracker) => tracker.enter(band),
            None => return Ok(()),
        };
        self.apply(transitions);
        Ok(())
    }

    /// The element left `band`.
    pub fn exit(&mut self, band: VisibilityBand) -> LifecycleResult<()> {
        self.ensure_live(LifecycleEvent::Exit(band))?;

        let transitions = match self.tracker.as_mut() {
            Some(tracker) => tracker.exit(band),
            None => return Ok(()),
        };
        self.apply(transitions);
        Ok(())
    }

    /// Derive band changes from the element's list position.
    pub fn observe(&mut self, geometry: RangeGeometry) -> LifecycleResult<()> {
        self.ensure_live(LifecycleEvent::Observe)?;

        let size = self.context.config().prefetch.prefetch_working_range_size;
        let transitions = match self.tracker.as_mut() {
            Some(tracker) => tracker.observe(geometry, size),
            None => return Ok(()),
        };
        self.apply(transitions);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<()> {
        match self.state.after(event) {
            Some(next) => {
                debug!(
                    element = %self.element,
                    from = %self.state,
                    to = %next,
                    event = %event,
                    "Transition"
                );
                self.state = next;
                Ok(())
            }
            None => Err(self.reject(event)),
        }
    }

    fn ensure_live(&self, event: LifecycleEvent) -> LifecycleResult<()> {
        match self.state.after(event) {
            Some(_) => Ok(()),
            None => Err(self.reject(event)),
        }
    }

    fn reject(&self, event: LifecycleEvent) -> LifecycleError {
        let err = if self.state.is_terminal() {
            LifecycleError::Terminated {
                element: self.element,
                event,
            }
        } else {
            LifecycleError::InvalidTransition {
                element: self.element,
                from: self.state,
                event,
            }
        };
        warn!(element = %self.element, error = %err, "Lifecycle event rejected");
        err
    }

    fn fetch_primary(&mut self) {
        self.context.fetcher().fetch_primary(PrimaryFetch {
            element: self.element,
            descriptor: self.descriptor.descriptor(),
            caller_context: self.props.caller_context.as_deref(),
            listener: self.props.listener,
            viewport: self.viewport,
            display: self.display,
        });
        self.primary_held = true;
        trace!(
            element = %self.element,
            descriptor = %self.descriptor.descriptor(),
            "Primary fetch requested"
        );
    }

    /// Release prefetches made redundant by a primary fetch.
    fn release_superseded_prefetches(&mut self, config: &AmbientConfig) {
        self.prepare_slot.clear();
        if config.prefetch.cancel_prefetch_when_fetched {
            if let Some(slot) = self.range_slot.as_mut() {
                slot.clear();
            }
        }
    }

    fn apply(&mut self, transitions: Vec<BandTransition>) {
        for transition in transitions {
            match transition {
                BandTransition::Entered(VisibilityBand::WorkingRange) => {
                    self.on_working_range_entered()
                }
                BandTransition::Exited(VisibilityBand::WorkingRange) => {
                    if let Some(slot) = self.range_slot.as_mut() {
                        slot.clear();
                    }
                    trace!(element = %self.element, "Left working range");
                }
                BandTransition::Entered(band) => self.on_distance_band_entered(band),
                BandTransition::Exited(band) => {
                    trace!(element = %self.element, band = %band, "Left band");
                }
            }
        }
    }

    fn on_working_range_entered(&mut self) {
        let config = self.context.config();
        let Some(slot) = self.range_slot.as_mut() else {
            return;
        };
        slot.clear();

        if !PrefetchPolicy::new(&config.prefetch).with_working_range(self.props.prefetch) {
            trace!(element = %self.element, "Working range prefetch disabled");
            return;
        }

        let handle = self.context.fetcher().fetch(FetchRequest {
            descriptor: self.descriptor.descriptor(),
            target: config.prefetch.prefetch_target_working_range,
            tag: ContextTag::OnEnteredRange,
            caller_context: self.props.caller_context.as_deref(),
            listener: None,
        });
        slot.set(handle);

        let superseded = config
            .prefetch
            .cancel_on_prepare_prefetch_when_working_range_prefetch
            && self.prepare_slot.clear();

        debug!(
            element = %self.element,
            target = %config.prefetch.prefetch_target_working_range,
            superseded,
            "Working range prefetch issued"
        );
    }

    fn on_distance_band_entered(&self, band: VisibilityBand) {
        let Some(distance) = band.distance() else {
            return;
        };
        self.context.fetcher().set_priority(
            self.descriptor.descriptor(),
            distance,
            self.props.caller_context.as_deref(),
        );
        trace!(element = %self.element, band = %band, distance, "Priority hint sent");
    }
}

impl Drop for AttachmentController {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            debug!(
                element = %self.element,
                state = %self.state,
                "Controller dropped before unmount, unmounting"
            );
            // Unmount is valid from every non-terminal state.
            let _ = self.unmount();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::PrefetchConfig;
    use crate::context::{ConfigStore, LifecycleListener};
    use crate::fetch::recording::{FetchEvent, OperationId, RecordingFetchService};
    use crate::fetch::{ContextTag, ListenerId, PrefetchTarget};
    use crate::policy::PrefetchOverride;

    const URI: &str = "https://cdn.example.com/cat.jpg";

    fn setup(config: AmbientConfig) -> (Arc<RecordingFetchService>, Arc<ConfigStore>, ImageContext) {
        let fetcher = Arc::new(RecordingFetchService::new());
        let store = Arc::new(ConfigStore::new(config));
        let context = ImageContext::new(store.clone(), fetcher.clone());
        (fetcher, store, context)
    }

    fn ranged_config() -> AmbientConfig {
        AmbientConfig::default().with_prefetch(
            PrefetchConfig::default()
                .with_prefetch_with_working_range(true)
                .with_prioritize_with_working_range(true),
        )
    }

    #[test]
    fn test_prepare_issues_prefetch() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let props = ImageProps::for_uri(URI)
            .with_caller_context("feed")
            .with_prefetch_listener(ListenerId(9));
        let mut controller = AttachmentController::new(ElementId(1), props, context);

        controller.prepare().unwrap();

        assert!(controller.has_prepare_prefetch());
        assert_eq!(
            fetcher.events(),
            vec![FetchEvent::Prefetch {
                op: OperationId(1),
                uri: Some(URI.to_string()),
                target: PrefetchTarget::MemoryDecoded,
                tag: ContextTag::OnPrepare,
            }]
        );
    }

    #[test]
    fn test_prepare_respects_override() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let props = ImageProps::for_uri(URI).with_prefetch(PrefetchOverride::No);
        let mut controller = AttachmentController::new(ElementId(1), props, context);

        controller.prepare().unwrap();

        assert_eq!(controller.state(), LifecycleState::Prepared);
        assert!(!controller.has_prepare_prefetch());
        assert_eq!(fetcher.fetch_calls(), 0);
    }

    #[test]
    fn test_mount_releases_prepare_prefetch() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.prepare().unwrap();
        controller.mount().unwrap();

        assert!(!controller.has_prepare_prefetch());
        assert!(fetcher.is_attached(ElementId(1)));
        assert_eq!(fetcher.open_handles(), 0);
    }

    #[test]
    fn test_mount_then_bind_is_one_operation() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();

        assert_eq!(fetcher.primary_operations(), 1);
    }

    #[test]
    fn test_unbind_uses_delayed_release() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();
        controller.unbind().unwrap();

        assert_eq!(fetcher.release_requests(ElementId(1)), vec![ReleaseMode::Delayed]);
        assert!(fetcher.has_pending_release(ElementId(1)));
    }

    #[test]
    fn test_rebind_cancels_pending_release() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();
        controller.unbind().unwrap();
        controller.bind().unwrap();

        assert!(!fetcher.has_pending_release(ElementId(1)));
        assert_eq!(fetcher.primary_operations(), 1);
    }

    #[test]
    fn test_unmount_while_bound_unbinds_first() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();
        controller.unmount().unwrap();

        assert_eq!(
            fetcher.release_requests(ElementId(1)),
            vec![ReleaseMode::Delayed, ReleaseMode::Full]
        );
        assert!(!fetcher.is_attached(ElementId(1)));
        assert_eq!(controller.state(), LifecycleState::Unmounted);
    }

    #[test]
    fn test_bind_only_mode() {
        let (fetcher, _, context) = setup(AmbientConfig::default().with_bind_only(true));
        let props = ImageProps::for_uri(URI).with_mutate_drawables(false);
        let mut controller = AttachmentController::new(ElementId(1), props, context);

        controller.mount().unwrap();
        assert_eq!(fetcher.primary_operations(), 0);
        assert!(!controller.display_options().mutate_drawables);

        controller.bind().unwrap();
        assert_eq!(fetcher.primary_operations(), 1);

        controller.unbind().unwrap();
        assert_eq!(fetcher.release_requests(ElementId(1)), vec![ReleaseMode::Immediate]);

        controller.unmount().unwrap();
        assert_eq!(fetcher.release_requests(ElementId(1)), vec![ReleaseMode::Immediate]);
    }

    #[test]
    fn test_primary_fetch_carries_viewport() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.on_bounds_defined(200, 100, 20, 10).unwrap();
        controller.mount().unwrap();

        let viewport = fetcher.events().into_iter().find_map(|e| match e {
            FetchEvent::PrimaryFetch { viewport, .. } => viewport,
            _ => None,
        });
        assert_eq!(viewport, Some(Viewport { width: 180, height: 90 }));
    }

    #[test]
    fn test_out_of_order_event_leaves_state_unchanged() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(3), ImageProps::for_uri(URI), context);

        controller.prepare().unwrap();
        let err = controller.bind().unwrap_err();

        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                element: ElementId(3),
                from: LifecycleState::Prepared,
                event: LifecycleEvent::Bind,
            }
        );
        assert_eq!(controller.state(), LifecycleState::Prepared);
        assert_eq!(fetcher.primary_operations(), 0);
        assert!(controller.has_prepare_prefetch());
    }

    #[test]
    fn test_events_after_unmount_rejected() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(3), ImageProps::for_uri(URI), context);

        controller.unmount().unwrap();
        let calls = fetcher.fetch_calls();

        assert!(matches!(controller.mount(), Err(LifecycleError::Terminated { .. })));
        assert!(matches!(
            controller.enter(VisibilityBand::WorkingRange),
            Err(LifecycleError::Terminated { .. })
        ));
        assert!(controller.update_props(ImageProps::for_uri("other")).is_err());
        assert_eq!(fetcher.fetch_calls(), calls);
    }

    #[test]
    fn test_working_range_enter_and_exit() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();
        assert!(controller.has_range_prefetch());
        assert!(controller.in_working_range());
        assert_eq!(fetcher.open_handles(), 1);

        controller.exit(VisibilityBand::WorkingRange).unwrap();
        assert!(!controller.has_range_prefetch());
        assert_eq!(fetcher.open_handles(), 0);
    }

    #[test]
    fn test_working_range_reentry_replaces_handle() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();
        controller.enter(VisibilityBand::WorkingRange).unwrap();

        assert_eq!(fetcher.prefetches(), 2);
        assert_eq!(fetcher.open_handles(), 1);
    }

    #[test]
    fn test_working_range_prefetch_supersedes_prepare() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.prepare().unwrap();
        controller.enter(VisibilityBand::WorkingRange).unwrap();

        assert!(!controller.has_prepare_prefetch());
        assert!(controller.has_range_prefetch());
        assert_eq!(fetcher.open_handles(), 1);
    }

    #[test]
    fn test_working_range_not_registered_without_flag() {
        let config = AmbientConfig::default()
            .with_prefetch(PrefetchConfig::default().with_prioritize_with_working_range(true));
        let (fetcher, _, context) = setup(config);
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();

        assert!(!controller.has_range_prefetch());
        assert_eq!(fetcher.fetch_calls(), 0);
    }

    #[test]
    fn test_override_no_skips_working_range() {
        let (fetcher, _, context) = setup(ranged_config());
        let props = ImageProps::for_uri(URI).with_prefetch(PrefetchOverride::No);
        let mut controller = AttachmentController::new(ElementId(1), props, context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();
        assert_eq!(fetcher.prefetches(), 0);
    }

    #[test]
    fn test_bind_cancels_range_prefetch() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();
        controller.mount().unwrap();
        controller.bind().unwrap();

        assert!(!controller.has_range_prefetch());
        assert_eq!(fetcher.open_handles(), 0);
    }

    #[test]
    fn test_range_prefetch_kept_when_cancel_disabled() {
        let config = AmbientConfig::default().with_prefetch(
            PrefetchConfig::default()
                .with_prefetch_with_working_range(true)
                .with_cancel_prefetch_when_fetched(false),
        );
        let (fetcher, _, context) = setup(config);
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.enter(VisibilityBand::WorkingRange).unwrap();
        controller.mount().unwrap();
        assert!(controller.has_range_prefetch());

        controller.unmount().unwrap();
        assert_eq!(fetcher.open_handles(), 0);
    }

    #[test]
    fn test_distance_bands_send_priority() {
        let (fetcher, _, context) = setup(ranged_config());
        let props = ImageProps::for_uri(URI).with_caller_context("feed");
        let mut controller = AttachmentController::new(ElementId(1), props, context);

        controller.enter(VisibilityBand::Below3).unwrap();
        controller.enter(VisibilityBand::Below1).unwrap();
        controller.enter(VisibilityBand::Visible).unwrap();
        controller.enter(VisibilityBand::Above).unwrap();

        let distances: Vec<i32> = fetcher.priority_hints().into_iter().map(|(_, d)| d).collect();
        assert_eq!(distances, vec![3, 1, 0, -1]);
        assert_eq!(controller.current_band(), Some(VisibilityBand::Above));
        assert_eq!(fetcher.fetch_calls(), 0);
    }

    #[test]
    fn test_observe_drives_bands() {
        let (fetcher, _, context) = setup(ranged_config());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.observe(RangeGeometry::new(12, 5, 10)).unwrap();

        assert!(controller.in_working_range());
        assert_eq!(controller.current_band(), Some(VisibilityBand::Below2));
        assert_eq!(fetcher.prefetches(), 1);
        assert_eq!(fetcher.priority_hints().len(), 1);
    }

    #[test]
    fn test_update_props_reports_changes() {
        let (_, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        assert!(!controller.update_props(ImageProps::for_uri(URI)).unwrap());
        assert!(controller
            .update_props(ImageProps::for_uri(URI).with_aspect_ratio(2.0))
            .unwrap());
        assert!(controller.update_props(ImageProps::for_uri("b")).unwrap());
        assert_eq!(controller.descriptor().uri(), Some("b"));
    }

    #[test]
    fn test_config_read_per_call() {
        let (fetcher, store, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        store.replace(AmbientConfig::default().with_bind_only(true));
        controller.mount().unwrap();

        assert_eq!(fetcher.primary_operations(), 0);
    }

    #[test]
    fn test_bind_only_switched_on_after_mount_still_releases() {
        let (fetcher, store, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        store.replace(AmbientConfig::default().with_bind_only(true));
        controller.unmount().unwrap();
        fetcher.flush_delayed_releases();

        assert_eq!(fetcher.release_requests(ElementId(1)), vec![ReleaseMode::Full]);
        assert!(!fetcher.is_attached(ElementId(1)));
    }

    #[test]
    fn test_bind_only_switched_off_after_immediate_unbind() {
        let (fetcher, store, context) = setup(AmbientConfig::default().with_bind_only(true));
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();
        controller.unbind().unwrap();
        store.replace(AmbientConfig::default());
        controller.unmount().unwrap();

        assert_eq!(fetcher.release_requests(ElementId(1)), vec![ReleaseMode::Immediate]);
        assert_eq!(fetcher.attached_count(), 0);
    }

    #[test]
    fn test_unmount_without_fetch_requests_nothing() {
        let (fetcher, _, context) = setup(AmbientConfig::default());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.prepare().unwrap();
        controller.unmount().unwrap();

        assert!(fetcher.release_requests(ElementId(1)).is_empty());
        assert_eq!(fetcher.open_handles(), 0);
    }

    #[test]
    fn test_drop_releases_everything() {
        let (fetcher, _, context) = setup(ranged_config());
        {
            let mut controller =
                AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);
            controller.prepare().unwrap();
            controller.enter(VisibilityBand::WorkingRange).unwrap();
            controller.mount().unwrap();
        }

        assert_eq!(fetcher.open_handles(), 0);
        assert!(!fetcher.is_attached(ElementId(1)));
    }

    #[derive(Default)]
    struct CountingListener {
        mounts: AtomicUsize,
        binds: AtomicUsize,
        unbinds: AtomicUsize,
        unmounts: AtomicUsize,
    }

    impl LifecycleListener for CountingListener {
        fn on_image_mount(&self, _element: ElementId) {
            self.mounts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_bind(&self, _element: ElementId) {
            self.binds.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_unbind(&self, _element: ElementId) {
            self.unbinds.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_unmount(&self, _element: ElementId) {
            self.unmounts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_listener_notified() {
        let (_, _, context) = setup(AmbientConfig::default());
        let listener = Arc::new(CountingListener::default());
        let context = context.with_listener(listener.clone());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        controller.bind().unwrap();
        controller.unmount().unwrap();

        assert_eq!(listener.mounts.load(Ordering::SeqCst), 1);
        assert_eq!(listener.binds.load(Ordering::SeqCst), 1);
        assert_eq!(listener.unbinds.load(Ordering::SeqCst), 1);
        assert_eq!(listener.unmounts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_skips_mount_in_bind_only_mode() {
        let (_, _, context) = setup(AmbientConfig::default().with_bind_only(true));
        let listener = Arc::new(CountingListener::default());
        let context = context.with_listener(listener.clone());
        let mut controller = AttachmentController::new(ElementId(1), ImageProps::for_uri(URI), context);

        controller.mount().unwrap();
        assert_eq!(listener.mounts.load(Ordering::SeqCst), 0);
    }
}
