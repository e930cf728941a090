use crate::error::{Result, WikiError};
use crate::system::WikiSystem;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Reply port carried inside every request message.
pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Attempts made to reach a key whose mailbox keeps closing under us
/// (eviction racing with delivery).
const MAX_DELIVERY_ATTEMPTS: usize = 3;

/// A mailbox message. `reject` answers the caller with an error when the
/// message can never be handled.
pub trait Envelope: Send + 'static {
    fn reject(self, error: WikiError);
}

/// Answer a request with an error, ignoring callers that stopped waiting.
pub(crate) fn reject_reply<T>(reply: Reply<T>, error: WikiError) {
    let _ = reply.send(Err(error));
}

/// An addressable unit of state and behaviour, keyed by a string.
///
/// One instance exists per key at a time. It is activated from durable
/// state on first delivery, handles messages one at a time to completion,
/// and is evicted after sitting idle for the configured timeout.
#[async_trait]
pub trait Actor: Sized + Send + 'static {
    type Msg: Envelope;

    /// Kind name used in logs and errors.
    const KIND: &'static str;

    async fn activate(key: &str, system: &WikiSystem) -> Result<Self>;

    async fn handle(&mut self, msg: Self::Msg, system: &WikiSystem);
}

struct Slots<M> {
    mailboxes: DashMap<String, mpsc::Sender<M>>,
    /// Held by a running instance for its whole life, so a replacement for
    /// the same key cannot activate until the previous one has drained.
    gates: DashMap<String, Arc<Mutex<()>>>,
}

/// Key -> mailbox directory for one actor kind.
pub struct Registry<A: Actor> {
    slots: Arc<Slots<A::Msg>>,
}

impl<A: Actor> Default for Registry<A> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Slots {
                mailboxes: DashMap::new(),
                gates: DashMap::new(),
            }),
        }
    }
}

impl<A: Actor> Registry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances currently resident in memory.
    pub fn active(&self) -> usize {
        self.slots.mailboxes.len()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.slots.mailboxes.contains_key(key)
    }

    /// Send a request to the actor at `key` and wait for its answer.
    pub(crate) async fn ask<R, F>(&self, system: &WikiSystem, key: &str, make: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(Reply<R>) -> A::Msg + Send,
    {
        let (reply, answer) = oneshot::channel();
        self.deliver(system, key, make(reply)).await;
        answer.await.map_err(|_| WikiError::ActorUnavailable {
            kind: A::KIND,
            key: key.to_string(),
        })?
    }

    /// Queue `msg` for the actor at `key`, activating it if needed.
    pub(crate) async fn deliver(&self, system: &WikiSystem, key: &str, msg: A::Msg) {
        let mut msg = msg;
        for _ in 0..MAX_DELIVERY_ATTEMPTS {
            let mailbox = self.mailbox(system, key);
            match mailbox.send(msg).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    // The instance closed its mailbox after we looked it up.
                    self.slots
                        .mailboxes
                        .remove_if(key, |_, tx| tx.same_channel(&mailbox));
                    msg = returned;
                }
            }
        }
        tracing::error!("{} actor {}: mailbox kept closing, giving up", A::KIND, key);
        msg.reject(WikiError::ActorUnavailable {
            kind: A::KIND,
            key: key.to_string(),
        });
    }

    fn mailbox(&self, system: &WikiSystem, key: &str) -> mpsc::Sender<A::Msg> {
        match self.slots.mailboxes.entry(key.to_string()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let capacity = system.config().mailbox_capacity.max(1);
                let (tx, rx) = mpsc::channel(capacity);
                e.insert(tx.clone());
                tokio::spawn(run::<A>(
                    key.to_string(),
                    rx,
                    tx.clone(),
                    self.slots.clone(),
                    system.clone(),
                ));
                tx
            }
        }
    }
}

/// Unregister `own` (if it is still the registered mailbox for `key`) and
/// stop accepting messages. Done under the map entry lock so no lookup can
/// hand out this mailbox afterwards.
fn retire<M>(slots: &Slots<M>, key: &str, own: &mpsc::Sender<M>, rx: &mut mpsc::Receiver<M>) {
    if let Entry::Occupied(e) = slots.mailboxes.entry(key.to_string()) {
        if e.get().same_channel(own) {
            e.remove();
        }
    }
    rx.close();
}

async fn run<A: Actor>(
    key: String,
    mut rx: mpsc::Receiver<A::Msg>,
    own: mpsc::Sender<A::Msg>,
    slots: Arc<Slots<A::Msg>>,
    system: WikiSystem,
) {
    let gate = slots.gates.entry(key.clone()).or_default().clone();
    let turn = gate.lock_owned().await;

    match A::activate(&key, &system).await {
        Ok(mut actor) => {
            tracing::debug!("{} actor {} activated", A::KIND, key);
            let idle = system.config().idle_timeout();
            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(msg)) => actor.handle(msg, &system).await,
                    Ok(None) => break,
                    Err(_) => {
                        retire(&slots, &key, &own, &mut rx);
                        // Messages that made it in before the close still get served.
                        while let Some(msg) = rx.recv().await {
                            actor.handle(msg, &system).await;
                        }
                        tracing::debug!("{} actor {} evicted after idling", A::KIND, key);
                        break;
                    }
                }
            }
        }
        Err(e) => {
            tracing::error!("{} actor {} failed to activate: {}", A::KIND, key, e);
            retire(&slots, &key, &own, &mut rx);
            let reason = e.to_string();
            while let Some(msg) = rx.recv().await {
                msg.reject(WikiError::Activation {
                    kind: A::KIND,
                    key: key.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }

    drop(own);
    drop(turn);
    slots
        .gates
        .remove_if(&key, |_, g| Arc::strong_count(g) == 1);
}
