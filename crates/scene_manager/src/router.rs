//! Router - inbound event dispatch
//!
//! Resolves the user's scene and its current page, decodes callback data and
//! hands the event to the right handler. Every callback event is acknowledged
//! exactly once, whatever the outcome.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use scene_core::{CallbackCodec, CallbackEvent, InboundEvent, TextEvent, Transport, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::manager::SceneManager;
use crate::page::{TextInput, TextKind};
use crate::scene::PageChange;

/// Reserved handler name: navigate to the page named by the first argument.
pub const NAVIGATE_HANDLER: &str = "to_page";

pub const SESSION_EXPIRED_TEXT: &str = "⌛ Session expired, send /start to begin again";

/// What happened to an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A page handler ran.
    Handled,
    /// The reserved navigation handler ran.
    Navigated(PageChange),
    /// No scene for the user.
    SessionExpired,
    /// Button from a scene type the user no longer has.
    StaleScene,
    /// Callback data that is not a scene callback.
    Malformed,
    /// The current page has no matching handler.
    Unhandled,
    /// Text from a user without a scene.
    Ignored,
}

pub struct Router {
    manager: SceneManager,
    transport: Arc<dyn Transport>,
    codec: CallbackCodec,
}

impl Router {
    pub fn new(manager: SceneManager, transport: Arc<dyn Transport>) -> Self {
        Self {
            manager,
            transport,
            codec: CallbackCodec::new(),
        }
    }

    pub fn manager(&self) -> &SceneManager {
        &self.manager
    }

    pub async fn dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome> {
        match event {
            InboundEvent::Callback(event) => self.dispatch_callback(event).await,
            InboundEvent::Text(event) => self.dispatch_text(event).await,
        }
    }

    pub async fn dispatch_callback(&self, event: &CallbackEvent) -> Result<DispatchOutcome> {
        let (outcome, notice) = self.route_callback(event).await;
        if let Err(e) = self.transport.answer_callback(&event.id, notice).await {
            warn!(user_id = event.user_id, "callback acknowledgement failed: {}", e);
        }
        outcome
    }

    async fn route_callback(
        &self,
        event: &CallbackEvent,
    ) -> (Result<DispatchOutcome>, Option<&'static str>) {
        let payload = match self.codec.decode(&event.data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(user_id = event.user_id, "ignoring callback: {}", e);
                return (Ok(DispatchOutcome::Malformed), None);
            }
        };

        let Some(scene) = self.manager.get_scene(event.user_id) else {
            debug!(user_id = event.user_id, "callback without scene");
            return (Ok(DispatchOutcome::SessionExpired), Some(SESSION_EXPIRED_TEXT));
        };

        if payload.scene != scene.scene_type() {
            debug!(
                user_id = event.user_id,
                expected = scene.scene_type(),
                got = %payload.scene,
                "stale callback"
            );
            return (Ok(DispatchOutcome::StaleScene), None);
        }

        if payload.handler == NAVIGATE_HANDLER {
            let Some(target) = payload.arg(0) else {
                return (Ok(DispatchOutcome::Malformed), None);
            };
            let outcome = scene
                .update_page(target)
                .await
                .map(DispatchOutcome::Navigated);
            return (outcome, None);
        }

        let Some(page) = scene.current_page().await else {
            return (Ok(DispatchOutcome::Unhandled), None);
        };

        debug!(
            user_id = event.user_id,
            page = page.name(),
            handler = %payload.handler,
            "dispatching callback"
        );
        let outcome = page
            .handle_callback(&scene, event, &payload.handler, &payload.args)
            .await
            .map(|handled| {
                if handled {
                    DispatchOutcome::Handled
                } else {
                    DispatchOutcome::Unhandled
                }
            });
        (outcome, None)
    }

    /// Integer handler first when the text parses, then string, then wildcard.
    pub async fn dispatch_text(&self, event: &TextEvent) -> Result<DispatchOutcome> {
        let Some(scene) = self.manager.get_scene(event.user_id) else {
            return Ok(DispatchOutcome::Ignored);
        };
        let Some(page) = scene.current_page().await else {
            return Ok(DispatchOutcome::Unhandled);
        };

        if page.has_text_handler(TextKind::Int) {
            if let Ok(value) = event.text.trim().parse::<i64>() {
                page.handle_text(&scene, event, TextKind::Int, TextInput::Int(value))
                    .await?;
                return Ok(DispatchOutcome::Handled);
            }
        }

        let handled = page
            .handle_text(&scene, event, TextKind::Str, TextInput::Str(event.text.clone()))
            .await?;
        Ok(if handled {
            DispatchOutcome::Handled
        } else {
            DispatchOutcome::Unhandled
        })
    }

    /// Drain `events` until the channel closes or `cancel` fires.
    ///
    /// Different users are dispatched concurrently. Events of one user run
    /// one at a time in arrival order; later ones wait in a per-user queue.
    /// On cancel, queued events are dropped and in-flight ones finish.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<InboundEvent>, cancel: CancellationToken) {
        info!("router started");
        let mut in_flight: JoinSet<UserId> = JoinSet::new();
        // A key is present while its user has an event in flight.
        let mut queued: HashMap<UserId, VecDeque<InboundEvent>> = HashMap::new();
        let mut open = true;

        while open || !in_flight.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if open => {
                    open = false;
                    let dropped: usize = queued.values().map(VecDeque::len).sum();
                    if dropped > 0 {
                        warn!(dropped, "router cancelled with queued events");
                    }
                    queued.clear();
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    let user_id = match done {
                        Ok(user_id) => user_id,
                        Err(e) => {
                            error!("dispatch task failed: {}", e);
                            continue;
                        }
                    };
                    let next = queued.get_mut(&user_id).and_then(VecDeque::pop_front);
                    match next {
                        Some(event) => self.spawn_dispatch(&mut in_flight, event),
                        None => {
                            queued.remove(&user_id);
                        }
                    }
                }
                event = events.recv(), if open => match event {
                    Some(event) => match queued.get_mut(&event.user_id()) {
                        Some(queue) => queue.push_back(event),
                        None => {
                            queued.insert(event.user_id(), VecDeque::new());
                            self.spawn_dispatch(&mut in_flight, event);
                        }
                    },
                    None => open = false,
                },
            }
        }
        info!("router stopped");
    }

    fn spawn_dispatch(self: &Arc<Self>, in_flight: &mut JoinSet<UserId>, event: InboundEvent) {
        let router = Arc::clone(self);
        in_flight.spawn(async move {
            let user_id = event.user_id();
            // Catch panics so the user's queue is always released.
            match AssertUnwindSafe(router.dispatch(&event)).catch_unwind().await {
                Ok(Ok(outcome)) => debug!(user_id, ?outcome, "event dispatched"),
                Ok(Err(e)) => error!(user_id, "event dispatch failed: {}", e),
                Err(_) => error!(user_id, "event dispatch panicked"),
            }
            user_id
        });
    }
}
