//! Async driver for the engine.
//!
//! Runs the watchdog interval, the navigation poll and the engine's deferred
//! deadlines on tokio timers, routes host signals into [`Engine::handle`], and
//! forwards queued captures to the memory service. Unload (or the signal
//! channel closing) performs the final teardown and ends the loop.

use crate::config::SettingsSource;
use crate::dom::HostDocument;
use crate::engine::{Engine, EngineAction, EngineEvent};
use crate::service::MemoryService;
use crate::types::CaptureEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Far enough out that the deferred-work branch never fires while idle
const IDLE_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

pub struct EngineRuntime<D: HostDocument, S: SettingsSource> {
    engine: Engine<D, S>,
    service: Arc<dyn MemoryService>,
    signals: mpsc::Receiver<EngineEvent>,
    captures: mpsc::Receiver<CaptureEvent>,
}

impl<D: HostDocument, S: SettingsSource> EngineRuntime<D, S> {
    /// Build the engine and its runtime.
    ///
    /// Returns the runtime and the sender the host binding pushes signals into.
    pub fn new(
        doc: D,
        settings: S,
        service: Arc<dyn MemoryService>,
    ) -> (Self, mpsc::Sender<EngineEvent>) {
        let (capture_tx, capture_rx) = mpsc::channel::<CaptureEvent>(32);
        let (signal_tx, signal_rx) = mpsc::channel::<EngineEvent>(256);
        let runtime = Self {
            engine: Engine::new(doc, settings, capture_tx),
            service,
            signals: signal_rx,
            captures: capture_rx,
        };
        (runtime, signal_tx)
    }

    pub fn engine(&self) -> &Engine<D, S> {
        &self.engine
    }

    /// Run until unload. Returns the engine for inspection.
    pub async fn run(mut self) -> Engine<D, S> {
        let timing = self.engine.settings().snapshot().timing;
        let start = Instant::now();
        self.engine.start(start.into_std());

        let mut watchdog = interval_at(start + timing.watchdog_interval(), timing.watchdog_interval());
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut navigation = interval_at(start + timing.navigation_poll(), timing.navigation_poll());
        navigation.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Engine runtime running (watchdog {:?}, navigation poll {:?})",
            timing.watchdog_interval(),
            timing.navigation_poll()
        );

        loop {
            let deadline = self.engine.next_deadline().map(Instant::from_std);
            let deferred = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE));

            tokio::select! {
                biased;

                Some(capture) = self.captures.recv() => {
                    self.submit(capture).await;
                }
                signal = self.signals.recv() => {
                    let now = Instant::now().into_std();
                    match signal {
                        Some(EngineEvent::Unload) | None => {
                            self.engine.handle(EngineEvent::Unload, now);
                            break;
                        }
                        Some(event) => {
                            if let Some(EngineAction::InjectAll) = self.engine.handle(event, now) {
                                let service = self.service.as_ref();
                                if let Err(e) = self.engine.inject_all(service, now).await {
                                    debug!("Injection from control failed: {}", e);
                                }
                            }
                        }
                    }
                }
                _ = deferred, if deadline.is_some() => {
                    self.engine.run_due(Instant::now().into_std());
                }
                _ = watchdog.tick() => {
                    self.engine.handle(EngineEvent::WatchdogTick, Instant::now().into_std());
                }
                _ = navigation.tick() => {
                    self.engine.handle(EngineEvent::NavigationPoll, Instant::now().into_std());
                }
            }
        }

        // Captures queued before unload still go out
        while let Ok(capture) = self.captures.try_recv() {
            self.submit(capture).await;
        }
        info!("Engine runtime stopped");
        self.engine
    }

    async fn submit(&mut self, capture: CaptureEvent) {
        debug!("Submitting capture from {}", capture.address);
        if let Err(e) = self.service.submit_capture(&capture).await {
            warn!("Capture submit failed: {}", e);
            self.engine
                .notify(&format!("Could not save message: {}", e), Instant::now().into_std());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::KeyPress;
    use crate::config::Config;
    use crate::dom::MemoryDocument;
    use crate::markers::MEMORY_HEADER;
    use crate::service::StaticMemoryService;
    use crate::types::MemoryBlock;
    use serde_json::json;

    fn claude_doc() -> MemoryDocument {
        MemoryDocument::from_json(json!({
            "address": "https://claude.ai/chat/1",
            "body": [{ "tag": "fieldset", "children": [
                { "tag": "div", "attrs": { "id": "editor", "class": "ProseMirror", "contenteditable": "true" },
                  "children": [{ "tag": "p", "children": ["hello there"] }] },
                { "tag": "div", "attrs": { "class": "flex items-center gap-2" }, "children": [
                    { "tag": "button", "attrs": { "id": "send", "aria-label": "Send message" } }
                ] }
            ] }]
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_click_is_captured_and_submitted() {
        let doc = claude_doc();
        let editor = doc.query_selector("#editor").unwrap();
        let send = doc.query_selector("#send").unwrap();

        let service = Arc::new(StaticMemoryService::new(vec![MemoryBlock::new(
            "b1", "human", "Name: Sam",
        )]));
        let (runtime, signals) = EngineRuntime::new(doc, Config::default(), service.clone());
        let handle = tokio::spawn(runtime.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        signals.send(EngineEvent::Click(send)).await.unwrap();
        signals
            .send(EngineEvent::KeyDown {
                target: editor,
                key: KeyPress::new("Enter"),
            })
            .await
            .unwrap();
        signals.send(EngineEvent::Unload).await.unwrap();

        let engine = handle.await.unwrap();
        let captures = service.captures();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].user_message, "hello there");
        assert_eq!(engine.status().watchdog, "stopped");
        assert!(!engine.status().overlay_mounted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timers_leave_page_alone() {
        let (runtime, signals) = EngineRuntime::new(
            claude_doc(),
            Config::default(),
            Arc::new(StaticMemoryService::default()),
        );
        let handle = tokio::spawn(runtime.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        signals.send(EngineEvent::Unload).await.unwrap();
        let engine = handle.await.unwrap();
        assert_eq!(engine.status().heals, 0);
        assert!(engine.document().query_selector("#letta-memory-wrapper").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_control_injection_keeps_running() {
        let (mut runtime, signals) = EngineRuntime::new(
            claude_doc(),
            Config::default(),
            Arc::new(StaticMemoryService::offline("service down")),
        );
        runtime.engine.start(std::time::Instant::now());
        let doc = runtime.engine().document();
        let control = doc.query_selector("#letta-memory-control").unwrap();
        let editor = doc.query_selector("#editor").unwrap();
        let handle = tokio::spawn(runtime.run());

        signals.send(EngineEvent::Click(control)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        signals.send(EngineEvent::Unload).await.unwrap();

        let engine = handle.await.unwrap();
        assert_eq!(engine.document().inner_text(editor), "hello there");
        assert_eq!(engine.status().watchdog, "stopped");
    }

    #[tokio::test]
    async fn test_inject_all_through_control() {
        let doc = claude_doc();
        let service = Arc::new(StaticMemoryService::new(vec![MemoryBlock::new(
            "b1", "human", "Name: Sam",
        )]));
        let (mut runtime, _signals) = EngineRuntime::new(doc, Config::default(), service.clone());
        let now = std::time::Instant::now();
        runtime.engine.start(now);

        let control = runtime
            .engine()
            .document()
            .query_selector("#letta-memory-control")
            .unwrap();
        let action = runtime.engine.handle(EngineEvent::Click(control), now);
        assert_eq!(action, Some(EngineAction::InjectAll));
        runtime
            .engine
            .inject_all(service.as_ref(), now)
            .await
            .unwrap();

        let editor = runtime.engine().document().query_selector("#editor").unwrap();
        assert!(runtime
            .engine()
            .document()
            .inner_text(editor)
            .starts_with(MEMORY_HEADER));
    }
}
