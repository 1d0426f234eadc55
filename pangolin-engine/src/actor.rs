// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-policy actor.
//!
//! One actor owns one policy entity. It serves commands from its mailbox strictly in order,
//! persists at most one event per accepted command, snapshots on an event-count threshold and
//! a wall-clock interval, and drives the time-based side effects of subject expiry. Timer
//! wakeups are folded into the same loop as the mailbox, so every state transition happens on
//! one task without locking.
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use pangolin_core::{
    Label, Policy, PolicyCommand, PolicyEntry, PolicyError, PolicyEvent, PolicyId,
    PolicyResponse, PolicyValidator, ResourceKey, Subject, SubjectId, Timestamp,
    ValidationError,
};
use pangolin_proto::Envelope;
use pangolin_store::{EventStore, SnapshotStore};

use crate::announcement::AnnouncementSchedule;
use crate::config::Config;
use crate::error::EngineError;
use crate::expiry::ExpirySchedule;
use crate::notice::{Notice, NoticePublisher};

/// Retry delay after a persistence failure during an expiry-driven deletion.
const PERSIST_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Messages an actor accepts from its mailbox.
#[derive(Debug)]
pub enum ToPolicyActor {
    /// Handle a command and reply with its outcome.
    Command {
        command: PolicyCommand,
        reply: oneshot::Sender<Result<PolicyResponse, PolicyError>>,
    },

    /// Snapshot and stop. Messages already buffered in the mailbox are served first.
    Stop { reply: oneshot::Sender<()> },
}

impl fmt::Display for ToPolicyActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToPolicyActor::Command { command, .. } => write!(f, "{command}"),
            ToPolicyActor::Stop { .. } => write!(f, "stop"),
        }
    }
}

pub struct PolicyActor<ES, SS, P>
where
    ES: EventStore<PolicyId, PolicyEvent>,
    SS: SnapshotStore<PolicyId, Policy>,
    P: NoticePublisher,
{
    id: PolicyId,
    config: Config,
    validator: PolicyValidator,

    /// Live aggregate state; `None` until the first creation event.
    state: Option<Policy>,

    events_since_snapshot: u64,
    last_snapshot_revision: u64,
    idle_checks: u32,
    passivation_requested: bool,

    expiry: ExpirySchedule,
    announcements: AnnouncementSchedule,

    event_store: ES,
    snapshot_store: SS,
    publisher: P,

    inbox: mpsc::Receiver<ToPolicyActor>,
    passivate_tx: mpsc::Sender<PolicyId>,
}

impl<ES, SS, P> PolicyActor<ES, SS, P>
where
    ES: EventStore<PolicyId, PolicyEvent>,
    SS: SnapshotStore<PolicyId, Policy>,
    P: NoticePublisher,
{
    pub fn new(
        id: PolicyId,
        config: Config,
        event_store: ES,
        snapshot_store: SS,
        publisher: P,
        inbox: mpsc::Receiver<ToPolicyActor>,
        passivate_tx: mpsc::Sender<PolicyId>,
    ) -> Self {
        let validator = PolicyValidator::new(config.max_policy_size);
        let expiry = ExpirySchedule::new(config.expiry_granularity);

        Self {
            id,
            config,
            validator,
            state: None,
            events_since_snapshot: 0,
            last_snapshot_revision: 0,
            idle_checks: 0,
            passivation_requested: false,
            expiry,
            announcements: AnnouncementSchedule::new(),
            event_store,
            snapshot_store,
            publisher,
            inbox,
            passivate_tx,
        }
    }

    /// Rebuild the aggregate from the latest snapshot plus event replay.
    ///
    /// Expiries which elapsed while the entity was passive are deleted right away, before any
    /// command is served.
    pub async fn recover(&mut self) -> Result<(), EngineError> {
        let snapshot = self
            .snapshot_store
            .latest(&self.id)
            .await
            .map_err(|err| EngineError::Recovery(err.to_string()))?;
        let (snapshot_revision, mut state) = match snapshot {
            Some((revision, state)) => (revision, Some(state)),
            None => (0, None),
        };

        let events = self
            .event_store
            .read_from(&self.id, snapshot_revision)
            .await
            .map_err(|err| EngineError::Recovery(err.to_string()))?;
        let replayed = events.len() as u64;
        for event in events {
            state = event.apply(state);
        }

        self.state = state;
        self.last_snapshot_revision = snapshot_revision;
        self.events_since_snapshot = replayed;
        debug!(
            actor = %self.id,
            revision = self.revision(),
            replayed,
            "recovered policy entity"
        );

        self.on_expiry_due(Timestamp::now()).await;

        Ok(())
    }

    /// Serve the mailbox until stopped.
    pub async fn run(mut self) {
        let mut snapshot_interval = interval(self.config.snapshot_interval);
        let mut activity_interval = interval(self.config.activity_check_interval);
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        activity_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately; push it one period out.
        snapshot_interval.reset();
        activity_interval.reset();

        loop {
            let expiry_wakeup = self.expiry.next_wakeup();
            let announce_wakeup = self.announcements.next_wakeup();

            tokio::select! {
                biased;
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        self.write_snapshot().await;
                        return;
                    };
                    debug!(actor = %self.id, %message, "received message");
                    match message {
                        ToPolicyActor::Command { command, reply } => {
                            self.idle_checks = 0;
                            self.passivation_requested = false;
                            let result = self.on_command(command).await;
                            let _ = reply.send(result);
                        }
                        ToPolicyActor::Stop { reply } => {
                            self.write_snapshot().await;
                            debug!(actor = %self.id, "policy actor stopped");
                            let _ = reply.send(());
                            return;
                        }
                    }
                }
                _ = sleep_until(expiry_wakeup), if expiry_wakeup.is_some() => {
                    self.on_expiry_due(Timestamp::now()).await;
                }
                _ = sleep_until(announce_wakeup), if announce_wakeup.is_some() => {
                    self.on_announcement_due(Timestamp::now()).await;
                }
                _ = snapshot_interval.tick() => {
                    self.write_snapshot().await;
                }
                _ = activity_interval.tick() => {
                    self.on_activity_check().await;
                }
            }
        }
    }

    async fn on_command(
        &mut self,
        command: PolicyCommand,
    ) -> Result<PolicyResponse, PolicyError> {
        let now = Timestamp::now();

        match command {
            PolicyCommand::Create { entries, .. } => {
                if self.state.as_ref().is_some_and(Policy::is_active) {
                    return Err(PolicyError::AlreadyExists {
                        id: self.id.clone(),
                    });
                }

                let entries = self.check_and_round_entries(entries, now)?;
                let event = PolicyEvent::Created {
                    id: self.id.clone(),
                    entries,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                self.mutate(event, true).await?;

                match self.state.clone() {
                    Some(policy) => Ok(PolicyResponse::Created { policy }),
                    None => Err(PolicyError::Persistence {
                        reason: "created policy state is missing".to_owned(),
                    }),
                }
            }

            PolicyCommand::Modify { entries, .. } => {
                self.require_active()?;
                let entries = self.check_and_round_entries(entries, now)?;
                let event = PolicyEvent::Modified {
                    id: self.id.clone(),
                    entries,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Modified {
                    revision,
                    created: false,
                })
            }

            PolicyCommand::Retrieve { .. } => Ok(PolicyResponse::Retrieved {
                policy: self.require_active()?.clone(),
            }),

            PolicyCommand::Delete { .. } => {
                self.require_active()?;
                let event = PolicyEvent::Deleted {
                    id: self.id.clone(),
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                // A deleted policy is exempt from the structural invariants.
                let revision = self.mutate(event, false).await?;
                Ok(PolicyResponse::Deleted { revision })
            }

            PolicyCommand::ModifyEntry { label, entry, .. } => {
                let created = self.require_active()?.entry(&label).is_none();
                let entry = self.check_and_round_entry(entry, now)?;
                let revision = self.revision() + 1;
                let event = if created {
                    PolicyEvent::EntryCreated {
                        id: self.id.clone(),
                        label,
                        entry,
                        revision,
                        timestamp: now,
                    }
                } else {
                    PolicyEvent::EntryModified {
                        id: self.id.clone(),
                        label,
                        entry,
                        revision,
                        timestamp: now,
                    }
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Modified { revision, created })
            }

            PolicyCommand::RetrieveEntry { label, .. } => Ok(PolicyResponse::RetrievedEntry {
                entry: self.require_entry(&label)?.clone(),
            }),

            PolicyCommand::DeleteEntry { label, .. } => {
                self.require_entry(&label)?;
                let event = PolicyEvent::EntryDeleted {
                    id: self.id.clone(),
                    label,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Deleted { revision })
            }

            PolicyCommand::ModifySubject { label, subject, .. } => {
                let created = self.require_entry(&label)?.subject(&subject.id).is_none();
                let subject = self.check_and_round_subject(subject, now)?;
                let revision = self.revision() + 1;
                let event = if created {
                    PolicyEvent::SubjectCreated {
                        id: self.id.clone(),
                        label,
                        subject,
                        revision,
                        timestamp: now,
                    }
                } else {
                    PolicyEvent::SubjectModified {
                        id: self.id.clone(),
                        label,
                        subject,
                        revision,
                        timestamp: now,
                    }
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Modified { revision, created })
            }

            PolicyCommand::ModifySubjects {
                label, subjects, ..
            } => {
                self.require_entry(&label)?;
                let subjects = self.check_and_round_subjects(subjects, now)?;
                let event = PolicyEvent::SubjectsModified {
                    id: self.id.clone(),
                    label,
                    subjects,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Modified {
                    revision,
                    created: false,
                })
            }

            PolicyCommand::RetrieveSubject {
                label, subject_id, ..
            } => {
                let subject = self
                    .require_entry(&label)?
                    .subject(&subject_id)
                    .cloned()
                    .ok_or_else(|| self.not_found(subject_path(&label, &subject_id)))?;
                Ok(PolicyResponse::RetrievedSubject { subject })
            }

            PolicyCommand::DeleteSubject {
                label, subject_id, ..
            } => {
                if self.require_entry(&label)?.subject(&subject_id).is_none() {
                    return Err(self.not_found(subject_path(&label, &subject_id)));
                }
                let event = PolicyEvent::SubjectDeleted {
                    id: self.id.clone(),
                    label,
                    subject_id,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Deleted { revision })
            }

            PolicyCommand::ModifyResource {
                label, resource, ..
            } => {
                let created = self.require_entry(&label)?.resource(&resource.key).is_none();
                let revision = self.revision() + 1;
                let event = if created {
                    PolicyEvent::ResourceCreated {
                        id: self.id.clone(),
                        label,
                        resource,
                        revision,
                        timestamp: now,
                    }
                } else {
                    PolicyEvent::ResourceModified {
                        id: self.id.clone(),
                        label,
                        resource,
                        revision,
                        timestamp: now,
                    }
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Modified { revision, created })
            }

            PolicyCommand::RetrieveResource { label, key, .. } => {
                let resource = self
                    .require_entry(&label)?
                    .resource(&key)
                    .cloned()
                    .ok_or_else(|| self.not_found(resource_path(&label, &key)))?;
                Ok(PolicyResponse::RetrievedResource { resource })
            }

            PolicyCommand::DeleteResource { label, key, .. } => {
                if self.require_entry(&label)?.resource(&key).is_none() {
                    return Err(self.not_found(resource_path(&label, &key)));
                }
                let event = PolicyEvent::ResourceDeleted {
                    id: self.id.clone(),
                    label,
                    key,
                    revision: self.revision() + 1,
                    timestamp: now,
                };
                let revision = self.mutate(event, true).await?;
                Ok(PolicyResponse::Deleted { revision })
            }
        }
    }

    /// Validate, persist and apply a single event, then reconcile the timer schedules.
    async fn mutate(&mut self, event: PolicyEvent, validate: bool) -> Result<u64, PolicyError> {
        let revision = event.revision();
        self.commit(event, validate).await?;
        self.reconcile_schedules().await;
        Ok(revision)
    }

    async fn commit(&mut self, event: PolicyEvent, validate: bool) -> Result<(), PolicyError> {
        let prospective = event.apply(self.state.clone());
        if validate
            && let Some(policy) = prospective.as_ref().filter(|policy| policy.is_active())
        {
            self.validator
                .validate(policy)
                .map_err(|err| self.validation_failure(err))?;
        }

        self.persist(&event).await?;
        self.state = prospective;
        self.publish_event(&event).await;

        self.events_since_snapshot += 1;
        if self.events_since_snapshot > self.config.snapshot_threshold {
            self.write_snapshot().await;
        }

        Ok(())
    }

    /// Append one event with optimistic concurrency control.
    ///
    /// On any failure the in-memory state is untouched and the command may be retried.
    async fn persist(&mut self, event: &PolicyEvent) -> Result<(), PolicyError> {
        let expected = self.revision();
        match self.event_store.append(&self.id, event, expected).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PolicyError::Persistence {
                reason: format!("event log of {} is ahead of revision {expected}", self.id),
            }),
            Err(err) => Err(PolicyError::Persistence {
                reason: err.to_string(),
            }),
        }
    }

    async fn publish_event(&mut self, event: &PolicyEvent) {
        match Envelope::for_event(event) {
            Ok(envelope) => {
                if let Err(err) = self.publisher.publish(Notice::Event { envelope }).await {
                    warn!(actor = %self.id, %err, "failed to publish event notice");
                }
            }
            Err(err) => warn!(actor = %self.id, %err, "failed to build event envelope"),
        }

        let tag = Notice::Tag {
            id: self.id.clone(),
            revision: event.revision(),
        };
        if let Err(err) = self.publisher.publish(tag).await {
            warn!(actor = %self.id, %err, "failed to publish tag notice");
        }
    }

    /// Snapshot the current state unless the latest snapshot already covers it.
    async fn write_snapshot(&mut self) {
        let Some(state) = self.state.clone() else {
            return;
        };
        if state.revision == self.last_snapshot_revision {
            return;
        }

        if let Err(err) = self.snapshot_store.put(&self.id, state.revision, &state).await {
            warn!(actor = %self.id, %err, "failed to write snapshot");
            return;
        }

        self.last_snapshot_revision = state.revision;
        self.events_since_snapshot = 0;
        debug!(actor = %self.id, revision = state.revision, "snapshot written");
    }

    /// Delete every subject whose expiry has elapsed, one event per subject.
    ///
    /// Expiry deletions bypass the structural invariants: the deletion obligation outranks
    /// them, even when it empties an entry. On a persistence failure the remaining deletions
    /// are retried after a short delay.
    async fn on_expiry_due(&mut self, now: Timestamp) {
        let due = ExpirySchedule::due_subjects(self.state.as_ref(), now);
        let mut deferred = false;
        let mut deleted = Vec::new();

        for (label, subject_id) in due {
            let subject = match self
                .state
                .as_ref()
                .and_then(|state| state.entry(&label))
                .and_then(|entry| entry.subject(&subject_id))
            {
                Some(subject) => subject.clone(),
                None => continue,
            };

            let event = PolicyEvent::SubjectDeleted {
                id: self.id.clone(),
                label,
                subject_id: subject.id.clone(),
                revision: self.revision() + 1,
                timestamp: now,
            };
            if let Err(err) = self.commit(event, false).await {
                warn!(actor = %self.id, subject = %subject.id, %err, "deferring expired subject deletion");
                deferred = true;
                break;
            }

            debug!(actor = %self.id, subject = %subject.id, "deleted expired subject");
            deleted.push(subject);
        }

        let announced = self.announcements.deletion_announcements(&deleted);
        if !announced.is_empty() {
            match Envelope::subject_deletion(&self.id, &announced, now) {
                Ok(envelope) => {
                    let notice = Notice::SubjectDeletion { envelope };
                    if let Err(err) = self.publisher.publish(notice).await {
                        warn!(actor = %self.id, %err, "failed to publish deletion announcement");
                    }
                }
                Err(err) => {
                    warn!(actor = %self.id, %err, "failed to build deletion announcement")
                }
            }
        }

        self.reconcile_schedules().await;
        if deferred {
            self.expiry.defer_until(now + PERSIST_RETRY_DELAY);
        }
    }

    async fn on_announcement_due(&mut self, now: Timestamp) {
        let due = self.announcements.due(now);
        self.publish_expiry_announcements(due).await;
    }

    async fn reconcile_schedules(&mut self) {
        let now = Timestamp::now();
        self.expiry.reconcile(self.state.as_ref());
        let immediate = self.announcements.reconcile(self.state.as_ref(), now);
        self.publish_expiry_announcements(immediate).await;
    }

    async fn publish_expiry_announcements(
        &mut self,
        announcements: Vec<(SubjectId, Timestamp)>,
    ) {
        for (subject_id, delete_at) in announcements {
            match Envelope::subject_deletion(&self.id, std::slice::from_ref(&subject_id), delete_at)
            {
                Ok(envelope) => {
                    let notice = Notice::SubjectDeletion { envelope };
                    if let Err(err) = self.publisher.publish(notice).await {
                        warn!(actor = %self.id, %err, "failed to publish expiry announcement");
                    }
                }
                Err(err) => warn!(actor = %self.id, %err, "failed to build expiry announcement"),
            }
        }
    }

    /// Request passivation after enough consecutive idle checks, unless a timer wakeup is
    /// still pending.
    async fn on_activity_check(&mut self) {
        self.idle_checks += 1;
        if self.passivation_requested || self.idle_checks < self.config.max_idle_checks {
            return;
        }
        if self.expiry.next_wakeup().is_some() || self.announcements.next_wakeup().is_some() {
            return;
        }

        debug!(actor = %self.id, "requesting passivation");
        self.passivation_requested = true;
        let _ = self.passivate_tx.send(self.id.clone()).await;
    }

    fn revision(&self) -> u64 {
        self.state.as_ref().map(|policy| policy.revision).unwrap_or(0)
    }

    fn require_active(&self) -> Result<&Policy, PolicyError> {
        self.state
            .as_ref()
            .filter(|policy| policy.is_active())
            .ok_or_else(|| PolicyError::NotFound {
                id: self.id.clone(),
                path: "/".to_owned(),
            })
    }

    fn require_entry(&self, label: &Label) -> Result<&PolicyEntry, PolicyError> {
        self.require_active()?
            .entry(label)
            .ok_or_else(|| PolicyError::NotFound {
                id: self.id.clone(),
                path: format!("/entries/{label}"),
            })
    }

    fn not_found(&self, path: String) -> PolicyError {
        PolicyError::NotFound {
            id: self.id.clone(),
            path,
        }
    }

    fn validation_failure(&self, err: ValidationError) -> PolicyError {
        match err {
            ValidationError::TooLarge { actual, limit } => {
                PolicyError::TooLarge { actual, limit }
            }
            ValidationError::ExpiryInPast { subject_id, expiry } => {
                PolicyError::ExpiryInPast { subject_id, expiry }
            }
            other => PolicyError::WouldInvalidate {
                id: self.id.clone(),
                reason: other.to_string(),
            },
        }
    }

    /// Reject elapsed expiries and round valid ones up to the scheduling granularity.
    ///
    /// The validity check runs against the supplied value; rounding never lifts an elapsed
    /// expiry back into the future.
    fn check_and_round_subject(
        &self,
        mut subject: Subject,
        now: Timestamp,
    ) -> Result<Subject, PolicyError> {
        if let Some(expiry) = subject.expiry {
            if expiry <= now {
                return Err(PolicyError::ExpiryInPast {
                    subject_id: subject.id.clone(),
                    expiry,
                });
            }
            subject.expiry = Some(expiry.round_up_to(self.config.expiry_granularity));
        }
        Ok(subject)
    }

    fn check_and_round_subjects(
        &self,
        subjects: BTreeMap<SubjectId, Subject>,
        now: Timestamp,
    ) -> Result<BTreeMap<SubjectId, Subject>, PolicyError> {
        subjects
            .into_iter()
            .map(|(id, subject)| Ok((id, self.check_and_round_subject(subject, now)?)))
            .collect()
    }

    fn check_and_round_entry(
        &self,
        mut entry: PolicyEntry,
        now: Timestamp,
    ) -> Result<PolicyEntry, PolicyError> {
        entry.subjects = self.check_and_round_subjects(entry.subjects, now)?;
        Ok(entry)
    }

    fn check_and_round_entries(
        &self,
        entries: BTreeMap<Label, PolicyEntry>,
        now: Timestamp,
    ) -> Result<BTreeMap<Label, PolicyEntry>, PolicyError> {
        entries
            .into_iter()
            .map(|(label, entry)| Ok((label, self.check_and_round_entry(entry, now)?)))
            .collect()
    }
}

fn subject_path(label: &Label, subject_id: &SubjectId) -> String {
    format!("/entries/{label}/subjects/{subject_id}")
}

fn resource_path(label: &Label, key: &ResourceKey) -> String {
    format!("/entries/{label}/resources/{key}")
}

/// Sleep until the given wall-clock second.
///
/// The caller guards the select arm on `wakeup.is_some()`; `None` resolves immediately but is
/// never polled.
async fn sleep_until(wakeup: Option<Timestamp>) {
    let Some(wakeup) = wakeup else {
        return;
    };
    let delay = wakeup.as_secs().saturating_sub(Timestamp::now().as_secs());
    tokio::time::sleep(Duration::from_secs(delay)).await;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use tokio::sync::{mpsc, oneshot};

    use pangolin_core::{
        EffectedPermissions, ExpiryGranularity, Label, Permission, PolicyCommand, PolicyError,
        PolicyEntry, PolicyEvent, PolicyId, PolicyResponse, Resource, ResourceKey, Subject,
        SubjectId,
    };
    use pangolin_store::{MemoryStore, SnapshotStore};

    use crate::config::Config;
    use crate::notice::BroadcastPublisher;

    use super::{PolicyActor, ToPolicyActor};

    type Store = MemoryStore<PolicyId, PolicyEvent, pangolin_core::Policy>;

    fn entries() -> BTreeMap<Label, PolicyEntry> {
        let entry = PolicyEntry::new()
            .with_subject(Subject::new(SubjectId::new("google", "admin").unwrap()))
            .with_resource(Resource::new(
                ResourceKey::policy_root(),
                EffectedPermissions::granted([Permission::Read, Permission::Write]),
            ));
        [(Label::new("owner").unwrap(), entry)].into()
    }

    async fn spawn_actor(id: &PolicyId, store: &Store) -> mpsc::Sender<ToPolicyActor> {
        let config = Config::new(ExpiryGranularity::new(1).unwrap());
        let (tx, inbox) = mpsc::channel(config.mailbox_capacity);
        let (passivate_tx, _passivate_rx) = mpsc::channel(1);

        let mut actor = PolicyActor::new(
            id.clone(),
            config,
            store.clone(),
            store.clone(),
            BroadcastPublisher::default(),
            inbox,
            passivate_tx,
        );
        actor.recover().await.unwrap();
        tokio::spawn(actor.run());

        tx
    }

    async fn send(
        tx: &mpsc::Sender<ToPolicyActor>,
        command: PolicyCommand,
    ) -> Result<PolicyResponse, PolicyError> {
        let (reply, rx) = oneshot::channel();
        tx.send(ToPolicyActor::Command { command, reply })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn create_retrieve_and_duplicate_create() {
        let id = PolicyId::new("org.example", "actor-1").unwrap();
        let store = Store::new();
        let tx = spawn_actor(&id, &store).await;

        let response = send(
            &tx,
            PolicyCommand::Create {
                id: id.clone(),
                entries: entries(),
            },
        )
        .await
        .unwrap();
        assert_matches!(response, PolicyResponse::Created { policy } => {
            assert_eq!(policy.revision, 1);
        });

        let response = send(&tx, PolicyCommand::Retrieve { id: id.clone() })
            .await
            .unwrap();
        assert_matches!(response, PolicyResponse::Retrieved { policy } => {
            assert_eq!(policy.revision, 1);
        });

        let result = send(
            &tx,
            PolicyCommand::Create {
                id: id.clone(),
                entries: entries(),
            },
        )
        .await;
        assert_matches!(result, Err(PolicyError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stop_writes_a_snapshot() {
        let id = PolicyId::new("org.example", "actor-2").unwrap();
        let store = Store::new();
        let tx = spawn_actor(&id, &store).await;

        send(
            &tx,
            PolicyCommand::Create {
                id: id.clone(),
                entries: entries(),
            },
        )
        .await
        .unwrap();

        let (reply, stopped) = oneshot::channel();
        tx.send(ToPolicyActor::Stop { reply }).await.unwrap();
        stopped.await.unwrap();

        let (revision, snapshot) = store.latest(&id).await.unwrap().unwrap();
        assert_eq!(revision, 1);
        assert!(snapshot.is_active());
    }

    #[tokio::test]
    async fn deleting_the_last_admin_is_blocked() {
        let id = PolicyId::new("org.example", "actor-3").unwrap();
        let store = Store::new();
        let tx = spawn_actor(&id, &store).await;

        send(
            &tx,
            PolicyCommand::Create {
                id: id.clone(),
                entries: entries(),
            },
        )
        .await
        .unwrap();

        let result = send(
            &tx,
            PolicyCommand::DeleteSubject {
                id: id.clone(),
                label: Label::new("owner").unwrap(),
                subject_id: SubjectId::new("google", "admin").unwrap(),
            },
        )
        .await;
        assert_matches!(result, Err(PolicyError::WouldInvalidate { .. }));

        let response = send(&tx, PolicyCommand::Retrieve { id }).await.unwrap();
        assert_matches!(response, PolicyResponse::Retrieved { policy } => {
            assert_eq!(policy.revision, 1);
        });
    }

    #[tokio::test]
    async fn passivation_is_requested_on_the_configured_idle_check() {
        let id = PolicyId::new("org.example", "actor-4").unwrap();
        let store = Store::new();
        let config = Config::new(ExpiryGranularity::new(1).unwrap()).with_max_idle_checks(2);
        let (_tx, inbox) = mpsc::channel(config.mailbox_capacity);
        let (passivate_tx, mut passivate_rx) = mpsc::channel(1);

        let mut actor = PolicyActor::new(
            id.clone(),
            config,
            store.clone(),
            store,
            BroadcastPublisher::default(),
            inbox,
            passivate_tx,
        );
        actor.recover().await.unwrap();

        actor.on_activity_check().await;
        assert!(passivate_rx.try_recv().is_err());

        actor.on_activity_check().await;
        assert_eq!(passivate_rx.try_recv().unwrap(), id);

        // The request is made once; further idle checks stay quiet.
        actor.on_activity_check().await;
        assert!(passivate_rx.try_recv().is_err());
    }
}
