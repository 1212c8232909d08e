//! Handler registration table.
//!
//! Registrations live in a [`Slab`]; a [`HandlerToken`] pairs the slab key
//! with a registration id, so a token outliving its registration never
//! matches a later one reusing the slot.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use contracts::{CueChange, EventKind, SequencerEvent, Verb};
use slab::Slab;
use tracing::error;

use crate::engine::Emission;

/// Notification handed to a handler.
#[derive(Debug, Clone)]
pub enum Notification {
    Events(Arc<[SequencerEvent]>),
    Enter(Arc<SequencerEvent>),
    Exit(Arc<SequencerEvent>),
    Change(Arc<CueChange>),
    Changes(Arc<[CueChange]>),
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Notification::Events(_) => EventKind::Events,
            Notification::Enter(_) => EventKind::Enter,
            Notification::Exit(_) => EventKind::Exit,
            Notification::Change(_) => EventKind::Change,
            Notification::Changes(_) => EventKind::Changes,
        }
    }
}

/// Registered callback. Identity is `Arc` pointer identity.
pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken {
    slot: usize,
    id: u64,
}

struct Registration {
    id: u64,
    kind: EventKind,
    handler: Handler,
    /// Skipped by global notifications until its replay has run
    pending_replay: bool,
}

/// A notification bound to the handler it is for.
pub struct Delivery {
    pub token: HandlerToken,
    pub notification: Notification,
    handler: Handler,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("token", &self.token)
            .field("kind", &self.notification.kind())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl Delivery {
    /// Call the handler; a panic is logged and counted, never propagated.
    ///
    /// Returns false if the handler panicked.
    pub fn invoke(self) -> bool {
        let kind = self.notification.kind();
        let result = catch_unwind(AssertUnwindSafe(|| (self.handler)(&self.notification)));
        match result {
            Ok(()) => true,
            Err(payload) => {
                error!(
                    kind = %kind,
                    token = ?self.token,
                    reason = panic_message(payload.as_ref()),
                    "handler panicked"
                );
                observability::record_handler_fault(kind.as_str());
                false
            }
        }
    }
}

#[derive(Default)]
pub struct Registry {
    slots: Slab<Registration>,
    next_id: u64,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.slots.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// Returns the token and whether the registration is new; registering
    /// the same handler for the same kind again returns the existing token.
    pub fn register(&mut self, kind: EventKind, handler: Handler) -> (HandlerToken, bool) {
        if let Some((slot, reg)) = self
            .slots
            .iter()
            .find(|(_, reg)| reg.kind == kind && Arc::ptr_eq(&reg.handler, &handler))
        {
            return (HandlerToken { slot, id: reg.id }, false);
        }
        let id = self.next_id;
        self.next_id += 1;
        let slot = self.slots.insert(Registration {
            id,
            kind,
            handler,
            pending_replay: kind.replays_active(),
        });
        (HandlerToken { slot, id }, true)
    }

    pub fn unregister(&mut self, token: HandlerToken) -> bool {
        if self.contains(token) {
            self.slots.remove(token.slot);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, token: HandlerToken) -> bool {
        self.slots
            .get(token.slot)
            .is_some_and(|reg| reg.id == token.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handlers for `kind` in registration order, skipping pending replays.
    fn targets(&self, kind: EventKind) -> Vec<(HandlerToken, Handler)> {
        let mut regs: Vec<(usize, &Registration)> = self
            .slots
            .iter()
            .filter(|(_, reg)| reg.kind == kind && !reg.pending_replay)
            .collect();
        regs.sort_by_key(|(_, reg)| reg.id);
        regs.into_iter()
            .map(|(slot, reg)| (HandlerToken { slot, id: reg.id }, reg.handler.clone()))
            .collect()
    }

    fn fan_out(&self, kind: EventKind, notification: Notification, out: &mut Vec<Delivery>) {
        for (token, handler) in self.targets(kind) {
            out.push(Delivery {
                token,
                notification: notification.clone(),
                handler,
            });
        }
    }

    /// Deliveries of one engine emission to every interested handler.
    ///
    /// Batch handlers come first, then per-item handlers in item order.
    pub fn deliveries(&self, emission: Emission) -> Vec<Delivery> {
        let mut out = Vec::new();
        match emission {
            Emission::Events(events) => {
                let items: Vec<Arc<SequencerEvent>> = events.iter().cloned().map(Arc::new).collect();
                self.fan_out(EventKind::Events, Notification::Events(events.into()), &mut out);
                for event in items {
                    let (kind, notification) = match event.verb {
                        Verb::Enter => (EventKind::Enter, Notification::Enter(event)),
                        Verb::Exit => (EventKind::Exit, Notification::Exit(event)),
                    };
                    self.fan_out(kind, notification, &mut out);
                }
            }
            Emission::Changes(changes) => {
                let items: Vec<Arc<CueChange>> = changes.iter().cloned().map(Arc::new).collect();
                self.fan_out(EventKind::Changes, Notification::Changes(changes.into()), &mut out);
                for change in items {
                    self.fan_out(EventKind::Change, Notification::Change(change), &mut out);
                }
            }
        }
        out
    }

    /// Replay deliveries for the handler behind `token`; clears its pending flag.
    pub fn replay_deliveries(&mut self, token: HandlerToken, events: Vec<SequencerEvent>) -> Vec<Delivery> {
        if !self.contains(token) {
            return Vec::new();
        }
        let Some(reg) = self.slots.get_mut(token.slot) else {
            return Vec::new();
        };
        reg.pending_replay = false;
        if events.is_empty() {
            return Vec::new();
        }
        let handler = reg.handler.clone();
        let delivery = |notification| Delivery {
            token,
            notification,
            handler: handler.clone(),
        };
        match reg.kind {
            EventKind::Events => vec![delivery(Notification::Events(events.into()))],
            EventKind::Enter => events
                .into_iter()
                .filter(|e| e.verb == Verb::Enter)
                .map(|e| delivery(Notification::Enter(Arc::new(e))))
                .collect(),
            _ => Vec::new(),
        }
    }
}
