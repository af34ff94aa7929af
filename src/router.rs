use crate::action::{self, FadeOutcome};
use crate::config::schema::OverlapPolicy;
use crate::error::Result;
use crate::event::{HostCommand, HostEvent, Settings};
use crate::obs::SceneRemote;
use crate::state::{SequenceLocks, SettingsCache};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Dispatches host events: caches settings and starts fades.
///
/// Events are handled one at a time, in arrival order. Fades run as their own
/// tasks so the router keeps receiving events while they wait.
pub struct Router {
    remote: Arc<dyn SceneRemote>,
    commands: mpsc::UnboundedSender<HostCommand>,
    settings: SettingsCache,
    locks: SequenceLocks,
    tracker: TaskTracker,
}

impl Router {
    pub fn new(
        remote: Arc<dyn SceneRemote>,
        commands: mpsc::UnboundedSender<HostCommand>,
        overlap: OverlapPolicy,
    ) -> Self {
        Self {
            remote,
            commands,
            settings: SettingsCache::default(),
            locks: SequenceLocks::new(overlap),
            tracker: TaskTracker::new(),
        }
    }

    /// Settings currently cached for `context`.
    pub fn settings(&self, context: &str) -> Arc<Settings> {
        self.settings.get(context)
    }

    /// Handle one event. Returns the fade task if one was started.
    pub fn handle_event(&mut self, event: HostEvent) -> Option<JoinHandle<()>> {
        debug!("host event: {}", event.name());

        match event {
            HostEvent::WillAppear(ev) | HostEvent::DidReceiveSettings(ev) => {
                let snapshot = self.settings.replace(&ev.context, ev.payload.settings);
                if let Some(title) = snapshot.title() {
                    let _ = self
                        .commands
                        .send(HostCommand::set_title(&ev.context, title));
                }
            }

            HostEvent::WillDisappear(ev) => {
                self.settings.remove(&ev.context);
                self.locks.forget(&ev.context);
            }

            HostEvent::KeyUp(ev) => {
                let snapshot = self.settings.replace(&ev.context, ev.payload.settings);
                return self.start_fade(ev.context, snapshot);
            }

            HostEvent::SendToPlugin(msg) => {
                if let Some((key, value)) = msg.sdpi_value() {
                    info!("inspector value for {}: {key} = {value}", msg.context);
                }
            }

            HostEvent::PropertyInspectorDidAppear(ev) => {
                info!("property inspector opened for {}", ev.context);
            }

            HostEvent::PropertyInspectorDidDisappear(ev) => {
                info!("property inspector closed for {}", ev.context);
            }

            HostEvent::Other => {}
        }

        None
    }

    fn start_fade(&self, context: String, settings: Arc<Settings>) -> Option<JoinHandle<()>> {
        let Some(claim) = self.locks.claim(&context) else {
            info!("fade already running for {context}, ignoring press");
            return None;
        };

        let remote = Arc::clone(&self.remote);
        let commands = self.commands.clone();

        Some(self.tracker.spawn(async move {
            let _guard = claim.acquire().await;
            let result = action::execute(remote.as_ref(), &settings).await;
            report(&commands, &context, &result);
        }))
    }

    /// Stop accepting fades and wait for running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn report(
    commands: &mpsc::UnboundedSender<HostCommand>,
    context: &str,
    result: &Result<FadeOutcome>,
) {
    let context = context.to_string();
    let command = match result {
        Ok(outcome) if outcome.is_clean() => {
            info!("fade to '{}' complete", outcome.target.scene);
            HostCommand::ShowOk { context }
        }
        Ok(outcome) => {
            for failure in outcome.failures() {
                if let Err(e) = &failure.result {
                    warn!("fade to '{}': {} failed: {e}", outcome.target.scene, failure.step);
                }
            }
            HostCommand::ShowAlert { context }
        }
        Err(e) => {
            error!("fade aborted: {e}");
            HostCommand::ShowAlert { context }
        }
    };
    let _ = commands.send(command);
}
