//! The injection engine.
//!
//! One [`Engine`] per page. It owns the host document handle, the settings
//! source, and a single [`EngineContext`] holding all per-page state. Every
//! entry point takes the current time explicitly so the deferred work queue
//! (mount retries, post-navigation remounts, notice dismissal) can be driven
//! deterministically.
//!
//! All operations re-resolve the live page. Nothing learned about the page in
//! one call is trusted in the next.

use crate::capture::{self, is_send_key, CaptureDedup, CaptureListeners, KeyPress};
use crate::config::{Config, SettingsSource};
use crate::dom::{HostDocument, NodeId};
use crate::editor;
use crate::markers;
use crate::navigation::NavigationMonitor;
use crate::overlay::{MountOutcome, Overlay, Placement};
use crate::platform;
use crate::service::MemoryService;
use crate::types::{CaptureEvent, EngineError, MemoryBlock, Platform, SurfaceKind};
use crate::watchdog::{HealTrigger, Watchdog, WatchdogState};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Signals delivered by the host page and the runtime's timers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The body observer saw a structural change
    Mutation,
    WatchdogTick,
    NavigationPoll,
    Click(NodeId),
    KeyDown { target: NodeId, key: KeyPress },
    /// Window scroll or resize
    ViewportChanged,
    AnimationFrame,
    Unload,
}

/// Follow-up work an event asks the caller to run asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    InjectAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    RetryMount,
    Remount,
    DismissNotice(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due: Instant,
    task: Deferred,
}

/// All mutable per-page state
#[derive(Debug, Default)]
pub struct EngineContext {
    pub platform: Option<Platform>,
    pub overlay: Overlay,
    pub capture: CaptureListeners,
    /// Ids of the blocks currently spliced into the editor
    pub injected: BTreeSet<String>,
    pub navigation: NavigationMonitor,
    pub watchdog: Watchdog,
    timers: Vec<Timer>,
    dedup: CaptureDedup,
}

impl EngineContext {
    /// Release everything the engine put on the page and forget per-page state.
    ///
    /// The watchdog and the last-seen address are left alone; they outlive
    /// in-app navigations.
    pub fn reset<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        self.overlay.remove(doc);
        self.overlay.dismiss_current_notice(doc);
        self.capture.detach_all(doc);
        self.platform = None;
        self.injected.clear();
        self.timers.clear();
        self.dedup.clear();
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

/// Serializable engine snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub platform: Option<Platform>,
    pub address: String,
    pub overlay_mounted: bool,
    pub placement: Option<Placement>,
    pub capture_attached: bool,
    pub injected: Vec<String>,
    pub watchdog: &'static str,
    pub heals: u64,
    pub pending_timers: usize,
}

pub struct Engine<D: HostDocument, S: SettingsSource> {
    doc: D,
    settings: S,
    ctx: EngineContext,
    captures: mpsc::Sender<CaptureEvent>,
}

impl<D: HostDocument, S: SettingsSource> Engine<D, S> {
    pub fn new(doc: D, settings: S, captures: mpsc::Sender<CaptureEvent>) -> Self {
        Self {
            doc,
            settings,
            ctx: EngineContext::default(),
            captures,
        }
    }

    /// Resolve the platform, mount, attach capture listeners and start the watchdog
    pub fn start(&mut self, now: Instant) {
        if self.ctx.watchdog.state() != WatchdogState::Idle {
            warn!("Engine already started once for this page");
            return;
        }
        let address = self.doc.address();
        self.ctx.navigation.prime(&address);
        self.ctx.platform = platform::resolve(&address);
        match self.ctx.platform {
            Some(platform) => info!("Engine starting on {} ({})", platform, address),
            None => debug!("No supported platform at {}, staying idle", address),
        }

        // Watch even while disabled so a later settings change takes effect
        self.ctx.watchdog.start(&mut self.doc);

        let config = self.settings.snapshot();
        if !config.general.enabled {
            info!("Engine disabled in configuration");
            return;
        }
        self.mount(now, &config);
        self.attach_capture();
    }

    /// Route one event. Returns follow-up work the caller must run.
    pub fn handle(&mut self, event: EngineEvent, now: Instant) -> Option<EngineAction> {
        if event != EngineEvent::Unload && !self.ctx.watchdog.is_watching() {
            trace!("Ignoring {:?}, engine not running", event);
            return None;
        }

        match event {
            EngineEvent::Mutation => self.heal(HealTrigger::Mutation, now),
            EngineEvent::WatchdogTick => self.heal(HealTrigger::Timer, now),
            EngineEvent::NavigationPoll => self.check_navigation(now),
            EngineEvent::Click(target) => {
                if self.ctx.overlay.is_control_target(&self.doc, target) {
                    return Some(EngineAction::InjectAll);
                }
                if self.ctx.capture.is_send_target(&self.doc, target) {
                    self.capture(now);
                }
            }
            EngineEvent::KeyDown { target, key } => {
                if is_send_key(&key) && self.ctx.capture.is_editor_target(&self.doc, target) {
                    self.capture(now);
                }
            }
            EngineEvent::ViewportChanged => self.ctx.overlay.on_viewport_change(&mut self.doc),
            EngineEvent::AnimationFrame => {
                if let Some(platform) = self.ctx.platform {
                    self.ctx.overlay.on_animation_frame(&mut self.doc, platform);
                }
            }
            EngineEvent::Unload => self.shutdown(),
        }
        None
    }

    /// Restore the control and capture listeners if the host page dropped them.
    ///
    /// Safe to run any number of times; once everything is in place this does nothing.
    pub fn heal(&mut self, trigger: HealTrigger, now: Instant) {
        let Some(platform) = self.ctx.platform else {
            return;
        };
        if self.has_pending(Deferred::Remount) {
            trace!("Remount pending, {:?} heal skipped", trigger);
            return;
        }

        let config = self.settings.snapshot();
        if !config.general.enabled {
            if self.ctx.overlay.is_present(&self.doc) {
                info!("Engine disabled, removing control");
                self.ctx.overlay.remove(&mut self.doc);
            }
            self.ctx.capture.detach_all(&mut self.doc);
            return;
        }

        let mut healed = false;
        if !self.ctx.overlay.is_present(&self.doc) {
            self.ctx.overlay.remove(&mut self.doc);
            healed = self.mount(now, &config).is_success();
        }
        if self.ctx.capture.attach(&mut self.doc, platform) > 0 {
            healed = true;
        }
        if healed {
            self.ctx.watchdog.record_heal(trigger);
        }
    }

    fn mount(&mut self, now: Instant, config: &Config) -> MountOutcome {
        let Some(platform) = self.ctx.platform else {
            return MountOutcome::Failed;
        };
        let outcome = self.ctx.overlay.mount(&mut self.doc, platform);
        if outcome == MountOutcome::Failed {
            debug!("Mount failed on {}, retrying in {:?}", platform, config.timing.mount_retry());
            self.schedule_once(Deferred::RetryMount, now + config.timing.mount_retry());
        }
        outcome
    }

    fn attach_capture(&mut self) {
        if let Some(platform) = self.ctx.platform {
            self.ctx.capture.attach(&mut self.doc, platform);
        }
    }

    fn check_navigation(&mut self, now: Instant) {
        let address = self.doc.address();
        let Some(change) = self.ctx.navigation.poll(&address) else {
            return;
        };

        self.ctx.reset(&mut self.doc);
        self.ctx.platform = platform::resolve(&change.to);

        let delay = self.settings.snapshot().timing.remount_delay();
        self.schedule(Deferred::Remount, now + delay);
    }

    fn schedule(&mut self, task: Deferred, due: Instant) {
        trace!("Scheduled {:?}", task);
        self.ctx.timers.push(Timer { due, task });
    }

    fn schedule_once(&mut self, task: Deferred, due: Instant) {
        if !self.has_pending(task) {
            self.schedule(task, due);
        }
    }

    fn has_pending(&self, task: Deferred) -> bool {
        self.ctx.timers.iter().any(|t| t.task == task)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.ctx.timers.iter().map(|t| t.due).min()
    }

    /// Run every deferred task whose deadline has passed
    pub fn run_due(&mut self, now: Instant) {
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut self.ctx.timers)
            .into_iter()
            .partition(|t| t.due <= now);
        self.ctx.timers = pending;
        due.sort_by_key(|t| t.due);

        for timer in due {
            match timer.task {
                Deferred::RetryMount | Deferred::Remount => {
                    let config = self.settings.snapshot();
                    if !config.general.enabled {
                        debug!("Engine disabled, dropping {:?}", timer.task);
                        continue;
                    }
                    if timer.task == Deferred::Remount {
                        debug!("Remounting after navigation");
                        self.mount(now, &config);
                        self.attach_capture();
                    } else if !self.ctx.overlay.is_present(&self.doc) {
                        self.mount(now, &config);
                    }
                }
                Deferred::DismissNotice(notice) => {
                    self.ctx.overlay.dismiss_notice(&mut self.doc, notice)
                }
            }
        }
    }

    /// Splice every enabled, non-empty block ahead of the editor content
    pub async fn inject_all(
        &mut self,
        service: &dyn MemoryService,
        now: Instant,
    ) -> Result<usize, EngineError> {
        let result = self.try_inject_all(service).await;
        self.report(&result, "add memories", now);
        result
    }

    async fn try_inject_all(&mut self, service: &dyn MemoryService) -> Result<usize, EngineError> {
        let platform = self.ctx.platform.ok_or(EngineError::NoPlatform)?;
        let blocks = service.fetch_blocks().await?;

        let config = self.settings.snapshot();
        let selected: Vec<MemoryBlock> = blocks
            .into_iter()
            .filter(|b| !b.is_empty() && config.memory.is_label_enabled(&b.label))
            .collect();

        let handle = editor::resolve(&self.doc, platform)
            .ok_or(EngineError::SurfaceNotFound(SurfaceKind::Editor))?;
        let content = markers::splice_in(&editor::read(&self.doc, &handle), &selected)?;
        editor::write(&mut self.doc, &handle, &content);

        self.ctx.injected = selected.iter().map(|b| b.id.clone()).collect();
        info!("Injected {} memory blocks on {}", selected.len(), platform);
        Ok(selected.len())
    }

    /// Add the block labelled `label`. Returns false if it is already in the editor.
    pub async fn inject_block(
        &mut self,
        service: &dyn MemoryService,
        label: &str,
        now: Instant,
    ) -> Result<bool, EngineError> {
        let result = self.try_inject_block(service, label).await;
        self.report(&result, "add memory", now);
        result
    }

    async fn try_inject_block(
        &mut self,
        service: &dyn MemoryService,
        label: &str,
    ) -> Result<bool, EngineError> {
        let platform = self.ctx.platform.ok_or(EngineError::NoPlatform)?;
        let blocks = service.fetch_blocks().await?;

        let config = self.settings.snapshot();
        let block = blocks
            .into_iter()
            .find(|b| b.label.eq_ignore_ascii_case(label) && config.memory.is_label_enabled(&b.label))
            .ok_or_else(|| EngineError::BlockNotFound(label.to_string()))?;

        if self.ctx.injected.contains(&block.id) {
            debug!("Block {} already injected", block.id);
            return Ok(false);
        }

        let handle = editor::resolve(&self.doc, platform)
            .ok_or(EngineError::SurfaceNotFound(SurfaceKind::Editor))?;
        let content = markers::add_one(&editor::read(&self.doc, &handle), &block)?;
        editor::write(&mut self.doc, &handle, &content);

        info!("Injected block {} ({})", block.id, block.label);
        self.ctx.injected.insert(block.id);
        Ok(true)
    }

    /// Strip injected memories from the editor, returning what is left
    pub fn extract(&mut self, now: Instant) -> Result<String, EngineError> {
        let result = self.try_extract();
        self.report(&result, "remove memories", now);
        result
    }

    fn try_extract(&mut self) -> Result<String, EngineError> {
        let platform = self.ctx.platform.ok_or(EngineError::NoPlatform)?;
        let handle = editor::resolve(&self.doc, platform)
            .ok_or(EngineError::SurfaceNotFound(SurfaceKind::Editor))?;
        let remaining = markers::strip_out(&editor::read(&self.doc, &handle));
        editor::write(&mut self.doc, &handle, &remaining);
        self.ctx.injected.clear();
        Ok(remaining)
    }

    /// Emit the message currently in the editor. Returns whether a capture was queued.
    pub fn capture(&mut self, now: Instant) -> bool {
        let Some(platform) = self.ctx.platform else {
            return false;
        };
        let config = self.settings.snapshot();
        if !config.general.enabled {
            trace!("Engine disabled, capture skipped");
            return false;
        }
        if !config.capture.is_enabled_for(platform) {
            trace!("Capture disabled for {}", platform);
            return false;
        }

        let Some(event) = capture::build_event(&self.doc, platform, &config.capture) else {
            return false;
        };
        if !self
            .ctx
            .dedup
            .check(&event.user_message, now, config.timing.capture_dedup())
        {
            return false;
        }

        let chars = event.user_message.chars().count();
        match self.captures.try_send(event) {
            Ok(()) => {
                debug!("Captured {} chars on {}", chars, platform);
                self.ctx.injected.clear();
                true
            }
            Err(e) => {
                error!("Failed to queue capture: {}", e);
                false
            }
        }
    }

    /// Show a transient notice for the configured duration
    pub fn notify(&mut self, message: &str, now: Instant) {
        let notice = self.ctx.overlay.show_notice(&mut self.doc, message);
        let duration = self.settings.snapshot().timing.notice_duration();
        self.schedule(Deferred::DismissNotice(notice), now + duration);
    }

    fn report<T>(&mut self, result: &Result<T, EngineError>, action: &str, now: Instant) {
        if let Err(e) = result {
            warn!("Failed to {}: {}", action, e);
            self.notify(&format!("Could not {}: {}", action, e), now);
        }
    }

    /// Final teardown on page unload
    pub fn shutdown(&mut self) {
        if self.ctx.watchdog.state() != WatchdogState::Stopped {
            info!("Engine shutting down");
        }
        self.ctx.watchdog.stop(&mut self.doc);
        self.ctx.reset(&mut self.doc);
        self.ctx.navigation.reset();
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            platform: self.ctx.platform,
            address: self.doc.address(),
            overlay_mounted: self.ctx.overlay.is_present(&self.doc),
            placement: self.ctx.overlay.placement(),
            capture_attached: self.ctx.capture.is_attached(&self.doc),
            injected: self.ctx.injected.iter().cloned().collect(),
            watchdog: self.ctx.watchdog.state_name(),
            heals: self.ctx.watchdog.heals(),
            pending_timers: self.ctx.pending_timers(),
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }
}
