// SPDX-License-Identifier: MIT OR Apache-2.0

//! The policy service: a router owning one actor per active policy entity.
//!
//! Actors are spawned on demand when the first command for their policy arrives and torn down
//! again through a passivation handshake once they report themselves idle. A passivated actor
//! leaves no state behind; the next command respawns it and recovery rebuilds the aggregate
//! from the stores.
use std::collections::HashMap;
use std::fmt;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pangolin_core::{Policy, PolicyCommand, PolicyError, PolicyEvent, PolicyId, PolicyResponse};
use pangolin_store::{EventStore, SnapshotStore};

use crate::actor::{PolicyActor, ToPolicyActor};
use crate::config::Config;
use crate::error::EngineError;
use crate::notice::{BroadcastPublisher, Notice};

type CommandReply = oneshot::Sender<Result<PolicyResponse, PolicyError>>;

enum ToService {
    Command {
        command: PolicyCommand,
        reply: CommandReply,
    },

    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl fmt::Display for ToService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToService::Command { command, .. } => write!(f, "{command}"),
            ToService::Shutdown { .. } => write!(f, "shutdown"),
        }
    }
}

struct PolicyActorHandle {
    tx: mpsc::Sender<ToPolicyActor>,
    task: JoinHandle<()>,
}

struct ServiceActor<ES, SS> {
    config: Config,
    event_store: ES,
    snapshot_store: SS,
    publisher: BroadcastPublisher,
    actors: HashMap<PolicyId, PolicyActorHandle>,
    inbox: mpsc::Receiver<ToService>,

    /// Kept alive alongside the receiver so `passivate_rx` never closes while actors hold
    /// clones of it.
    passivate_tx: mpsc::Sender<PolicyId>,
    passivate_rx: mpsc::Receiver<PolicyId>,
}

impl<ES, SS> ServiceActor<ES, SS>
where
    ES: EventStore<PolicyId, PolicyEvent> + Send + Sync + 'static,
    SS: SnapshotStore<PolicyId, Policy> + Send + Sync + 'static,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        self.drain().await;
                        return;
                    };
                    debug!(%message, "service message");
                    match message {
                        ToService::Command { command, reply } => {
                            self.on_command(command, reply).await;
                        }
                        ToService::Shutdown { reply } => {
                            self.drain().await;
                            let _ = reply.send(());
                            return;
                        }
                    }
                }
                Some(id) = self.passivate_rx.recv() => {
                    self.on_passivate(&id).await;
                }
            }
        }
    }

    async fn on_command(&mut self, command: PolicyCommand, reply: CommandReply) {
        let id = command.policy_id().clone();
        let mut message = ToPolicyActor::Command { command, reply };

        // A passivating actor may close its mailbox between our send and its stop; one
        // respawn covers that race.
        for _ in 0..2 {
            let tx = match self.actor_tx(&id).await {
                Ok(tx) => tx,
                Err(err) => {
                    if let ToPolicyActor::Command { reply, .. } = message {
                        let _ = reply.send(Err(err));
                    }
                    return;
                }
            };

            match tx.send(message).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    self.remove_actor(&id).await;
                    message = returned;
                }
            }
        }

        if let ToPolicyActor::Command { reply, .. } = message {
            let _ = reply.send(Err(PolicyError::Persistence {
                reason: EngineError::InboxClosed.to_string(),
            }));
        }
    }

    /// Mailbox of the policy's actor, spawning and recovering it first when necessary.
    async fn actor_tx(&mut self, id: &PolicyId) -> Result<mpsc::Sender<ToPolicyActor>, PolicyError> {
        if let Some(handle) = self.actors.get(id) {
            return Ok(handle.tx.clone());
        }

        let (tx, inbox) = mpsc::channel(self.config.mailbox_capacity);
        let mut actor = PolicyActor::new(
            id.clone(),
            self.config.clone(),
            self.event_store.clone(),
            self.snapshot_store.clone(),
            self.publisher.clone(),
            inbox,
            self.passivate_tx.clone(),
        );
        actor.recover().await.map_err(|err| PolicyError::Persistence {
            reason: err.to_string(),
        })?;

        let task = tokio::spawn(actor.run());
        self.actors.insert(
            id.clone(),
            PolicyActorHandle {
                tx: tx.clone(),
                task,
            },
        );
        debug!(policy = %id, "spawned policy actor");

        Ok(tx)
    }

    /// Stop an actor which requested passivation.
    ///
    /// The handle is removed before the stop message is sent, so commands arriving from now on
    /// respawn a fresh actor; commands already buffered in the old mailbox are served before
    /// the stop.
    async fn on_passivate(&mut self, id: &PolicyId) {
        let Some(handle) = self.actors.remove(id) else {
            return;
        };

        let (reply, stopped) = oneshot::channel();
        if handle.tx.send(ToPolicyActor::Stop { reply }).await.is_ok() {
            let _ = stopped.await;
        }
        if let Err(err) = handle.task.await {
            warn!(policy = %id, %err, "policy actor task failed");
        }
        debug!(policy = %id, "passivated policy actor");
    }

    async fn remove_actor(&mut self, id: &PolicyId) {
        if let Some(handle) = self.actors.remove(id) {
            if let Err(err) = handle.task.await {
                warn!(policy = %id, %err, "policy actor task failed");
            }
        }
    }

    async fn drain(&mut self) {
        let actors: Vec<_> = self.actors.drain().collect();
        for (id, handle) in actors {
            let (reply, stopped) = oneshot::channel();
            if handle.tx.send(ToPolicyActor::Stop { reply }).await.is_ok() {
                let _ = stopped.await;
            }
            if let Err(err) = handle.task.await {
                warn!(policy = %id, %err, "policy actor task failed");
            }
        }
        debug!("policy service drained");
    }
}

/// Cloneable handle to the policy runtime.
///
/// Dropping all handles closes the service inbox, which drains and stops every actor.
#[derive(Clone, Debug)]
pub struct PolicyService {
    tx: mpsc::Sender<ToService>,
    publisher: BroadcastPublisher,
}

impl PolicyService {
    /// Spawn the service router on the current tokio runtime.
    pub fn spawn<ES, SS>(config: Config, event_store: ES, snapshot_store: SS) -> Self
    where
        ES: EventStore<PolicyId, PolicyEvent> + Send + Sync + 'static,
        SS: SnapshotStore<PolicyId, Policy> + Send + Sync + 'static,
    {
        let publisher = BroadcastPublisher::default();
        let (tx, inbox) = mpsc::channel(config.mailbox_capacity);
        let (passivate_tx, passivate_rx) = mpsc::channel(config.mailbox_capacity);

        let actor = ServiceActor {
            config,
            event_store,
            snapshot_store,
            publisher: publisher.clone(),
            actors: HashMap::new(),
            inbox,
            passivate_tx,
            passivate_rx,
        };
        tokio::spawn(actor.run());

        Self { tx, publisher }
    }

    /// Send a command to its policy's actor and await the outcome.
    pub async fn send(&self, command: PolicyCommand) -> Result<PolicyResponse, PolicyError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ToService::Command { command, reply })
            .await
            .map_err(|_| service_stopped())?;

        rx.await.map_err(|_| service_stopped())?
    }

    /// Subscribe to the notices published by all actors of this service.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.publisher.subscribe()
    }

    /// Snapshot and stop every actor, then stop the router.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ToService::Shutdown { reply })
            .await
            .map_err(|_| EngineError::ServiceStopped)?;

        rx.await.map_err(|_| EngineError::ServiceStopped)
    }
}

fn service_stopped() -> PolicyError {
    PolicyError::Persistence {
        reason: EngineError::ServiceStopped.to_string(),
    }
}
