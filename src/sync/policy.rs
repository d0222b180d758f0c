//! Synchronization policy state machine.
//!
//! `SyncPolicy` decides when local edits become a store write and what happens
//! to remote snapshots. It performs no I/O: the session loop feeds it edits,
//! write results and snapshots, and sends whatever `begin_write` hands back.
//!
//! Rules:
//! - At most one write is in flight. It carries the whole project as of
//!   send time, so edits made between writes are coalesced.
//! - Local edits are pending while the replica heads differ from the heads
//!   last sent (or adopted from a remote snapshot). No-op edits leave the
//!   heads alone and never cause a write.
//! - A remote snapshot arriving while a write is in flight, or while local
//!   edits are pending, is queued. Only the latest queued snapshot is kept, and
//!   it is re-evaluated after each acknowledged write.
//! - Otherwise a snapshot whose `lastEdited` marker predates the last synced
//!   marker is stale and discarded. A markerless snapshot that was queued
//!   behind an acknowledged write is stale too. One that decodes to the local state is an
//!   echo. Anything else replaces local state wholesale.

use automerge::ChangeHash;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::config::SyncConfig;
use crate::error::{CreativeError, CreativeResult};
use crate::project::document::last_edited;
use crate::project::{Project, ProjectManager};
use crate::store::StoreError;

/// A write the caller must send to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub document: Value,
    pub last_edited: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Decodes to the current local state, usually the echo of our own write.
    Echo,
    /// Older than the last synced marker.
    Stale,
}

/// What `receive_remote` did with a snapshot.
#[derive(Debug)]
pub enum RemoteOutcome {
    Applied,
    Queued,
    Discarded(DiscardReason),
    /// The snapshot failed to decode; local state is unchanged.
    Rejected(CreativeError),
}

#[derive(Debug)]
struct QueuedRemote {
    document: Value,
    /// Queued before a write was acknowledged, so it cannot be shown to be newer.
    predates_ack: bool,
}

#[derive(Debug)]
struct InFlight {
    last_edited: DateTime<Utc>,
    previous_heads: Vec<ChangeHash>,
}

pub struct SyncPolicy {
    replica: ProjectManager,
    echo_suppression: bool,
    /// Heads of the last sent or adopted state.
    synced_heads: Vec<ChangeHash>,
    /// Marker of the last acknowledged write or applied snapshot.
    synced_at: Option<DateTime<Utc>>,
    in_flight: Option<InFlight>,
    queued_remote: Option<QueuedRemote>,
}

impl SyncPolicy {
    /// Starts from a project that is already in sync with the store.
    pub fn new(project: Project, config: &SyncConfig) -> CreativeResult<Self> {
        let mut replica = ProjectManager::new(project)?;
        let synced_heads = replica.get_heads();
        Ok(Self {
            replica,
            echo_suppression: config.echo_suppression,
            synced_heads,
            synced_at: None,
            in_flight: None,
            queued_remote: None,
        })
    }

    /// Starts from a stored document; its marker becomes the staleness baseline.
    pub fn from_document(document: &Value, config: &SyncConfig) -> CreativeResult<Self> {
        let mut policy = Self::new(Project::from_document(document)?, config)?;
        policy.synced_at = last_edited(document);
        Ok(policy)
    }

    /// Current local state.
    pub fn project(&mut self) -> CreativeResult<Project> {
        self.replica.get_state()
    }

    /// Applies a local edit to the project. A failed edit changes nothing.
    pub fn edit<F, R>(&mut self, f: F) -> CreativeResult<R>
    where
        F: FnOnce(&mut Project) -> CreativeResult<R>,
    {
        self.replica.try_update_state(f)
    }

    /// Applies a local edit through the replica, for targeted field puts.
    pub fn edit_replica<F, R>(&mut self, f: F) -> CreativeResult<R>
    where
        F: FnOnce(&mut ProjectManager) -> CreativeResult<R>,
    {
        f(&mut self.replica)
    }

    /// True when local edits have not been sent.
    pub fn has_pending_changes(&mut self) -> bool {
        self.replica.has_changes_since(&self.synced_heads)
    }

    pub fn is_writing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_queued_remote(&self) -> bool {
        self.queued_remote.is_some()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Takes the current state for sending, if there is anything to send and
    /// no write is already in flight.
    pub fn begin_write(&mut self, now: DateTime<Utc>) -> CreativeResult<Option<PendingWrite>> {
        if self.in_flight.is_some() || !self.has_pending_changes() {
            return Ok(None);
        }

        let document = self.replica.to_document()?;
        // Markers must increase so later snapshots never look stale.
        let last_edited = match self.synced_at {
            Some(at) if now <= at => at + Duration::milliseconds(1),
            _ => now,
        };
        let heads = self.replica.get_heads();
        let previous_heads = std::mem::replace(&mut self.synced_heads, heads);
        self.in_flight = Some(InFlight {
            last_edited,
            previous_heads,
        });

        tracing::debug!(last_edited = %last_edited, "write started");
        Ok(Some(PendingWrite {
            document,
            last_edited,
        }))
    }

    /// Records the store's answer to the in-flight write. On success the
    /// queued snapshot, if any, is re-evaluated and its outcome returned. On
    /// failure the sent edits become pending again.
    pub fn complete_write(&mut self, result: Result<(), StoreError>) -> Option<RemoteOutcome> {
        let in_flight = self.in_flight.take()?;
        match result {
            Ok(()) => {
                tracing::debug!(last_edited = %in_flight.last_edited, "write acknowledged");
                self.synced_at = Some(in_flight.last_edited);
                let queued = self.queued_remote.take()?;
                Some(self.evaluate_remote(queued.document, true))
            }
            Err(err) => {
                tracing::warn!(error = %err, "write failed");
                self.synced_heads = in_flight.previous_heads;
                None
            }
        }
    }

    // =========================================================================
    // REMOTE SNAPSHOTS
    // =========================================================================

    pub fn receive_remote(&mut self, document: Value) -> RemoteOutcome {
        self.evaluate_remote(document, false)
    }

    fn evaluate_remote(&mut self, document: Value, predates_ack: bool) -> RemoteOutcome {
        if self.in_flight.is_some() || self.has_pending_changes() {
            let queued = QueuedRemote {
                document,
                predates_ack,
            };
            if self.queued_remote.replace(queued).is_some() {
                tracing::debug!("replaced queued remote snapshot");
            }
            return RemoteOutcome::Queued;
        }

        let project = match Project::from_document(&document) {
            Ok(project) => project,
            Err(err) => {
                tracing::warn!(error = %err, "rejected remote snapshot");
                return RemoteOutcome::Rejected(err);
            }
        };

        let marker = last_edited(&document);
        let stale = match (marker, self.synced_at) {
            (Some(marker), Some(synced_at)) => marker < synced_at,
            (None, _) => predates_ack,
            (Some(_), None) => false,
        };
        if stale {
            tracing::debug!(marker = ?marker, synced_at = ?self.synced_at, "discarded stale snapshot");
            return RemoteOutcome::Discarded(DiscardReason::Stale);
        }

        if self.echo_suppression {
            match self.replica.get_state() {
                Ok(current) if current == project => {
                    self.synced_at = marker.or(self.synced_at);
                    return RemoteOutcome::Discarded(DiscardReason::Echo);
                }
                Ok(_) => {}
                Err(err) => return RemoteOutcome::Rejected(err),
            }
        }

        if let Err(err) = self.replica.replace_state(project) {
            return RemoteOutcome::Rejected(err);
        }
        self.synced_heads = self.replica.get_heads();
        self.synced_at = marker.or(self.synced_at);
        tracing::debug!("applied remote snapshot");
        RemoteOutcome::Applied
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::document::with_last_edited;
    use crate::project::{Category, Idea, IdeaModule};
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, minute, 0).unwrap()
    }

    fn policy() -> SyncPolicy {
        let mut project = Project::new("Album").with_category(Category::Music);
        project.add_idea(Idea::new("Chorus"));
        SyncPolicy::new(project, &SyncConfig::default()).unwrap()
    }

    fn remote(project: &Project, marker: DateTime<Utc>) -> Value {
        with_last_edited(project.to_document(), marker)
    }

    fn add_text(policy: &mut SyncPolicy, text: &str) {
        policy
            .edit(|p| {
                p.edit_idea(0, |idea| {
                    idea.add_module(IdeaModule::text(text));
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn test_no_write_without_edits() {
        let mut policy = policy();
        assert!(!policy.has_pending_changes());
        assert!(policy.begin_write(at(0)).unwrap().is_none());
    }

    #[test]
    fn test_noop_edits_do_not_write() {
        let mut policy = policy();
        policy
            .edit(|p| {
                p.remove_idea(9);
                Ok(())
            })
            .unwrap();
        assert!(policy.edit(|p| p.update_idea(9, Idea::new("x"))).is_err());
        assert!(policy.begin_write(at(0)).unwrap().is_none());
    }

    #[test]
    fn test_edits_coalesce_into_one_write() {
        let mut policy = policy();
        add_text(&mut policy, "draft");
        policy
            .edit(|p| {
                p.edit_idea(0, |idea| {
                    idea.update_module(0, IdeaModule::audio("file:///take.m4a"))
                })
            })
            .unwrap();

        let write = policy.begin_write(at(1)).unwrap().unwrap();
        assert_eq!(write.last_edited, at(1));
        assert_eq!(
            write.document["ideas"][0]["modules"],
            serde_json::json!([{"kind": "audio", "audioRef": "file:///take.m4a"}])
        );

        assert!(policy.complete_write(Ok(())).is_none());
        assert!(!policy.has_pending_changes());
        assert!(policy.begin_write(at(2)).unwrap().is_none());
    }

    #[test]
    fn test_one_write_in_flight_sends_latest_state() {
        let mut policy = policy();
        add_text(&mut policy, "one");
        let first = policy.begin_write(at(1)).unwrap().unwrap();
        assert!(policy.is_writing());

        add_text(&mut policy, "two");
        add_text(&mut policy, "three");
        assert!(policy.begin_write(at(2)).unwrap().is_none());

        policy.complete_write(Ok(()));
        let second = policy.begin_write(at(3)).unwrap().unwrap();
        assert_eq!(first.document["ideas"][0]["modules"].as_array().unwrap().len(), 1);
        assert_eq!(second.document["ideas"][0]["modules"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_failed_write_keeps_changes_pending() {
        let mut policy = policy();
        add_text(&mut policy, "draft");
        policy.begin_write(at(1)).unwrap().unwrap();
        assert!(!policy.has_pending_changes());

        let outcome =
            policy.complete_write(Err(StoreError::Unavailable("offline".to_string())));
        assert!(outcome.is_none());
        assert!(policy.has_pending_changes());
        assert!(policy.begin_write(at(2)).unwrap().is_some());
    }

    #[test]
    fn test_markers_increase() {
        let mut policy = policy();
        add_text(&mut policy, "a");
        policy.begin_write(at(5)).unwrap();
        policy.complete_write(Ok(()));

        add_text(&mut policy, "b");
        let write = policy.begin_write(at(1)).unwrap().unwrap();
        assert!(write.last_edited > at(5));
    }

    #[test]
    fn test_remote_applied_when_idle() {
        let mut policy = policy();
        let other = Project::new("Renamed elsewhere").with_public(true);
        let outcome = policy.receive_remote(remote(&other, at(3)));

        assert!(matches!(outcome, RemoteOutcome::Applied));
        assert_eq!(policy.project().unwrap(), other);
        assert!(!policy.has_pending_changes());
    }

    #[test]
    fn test_stale_snapshot_mid_write_does_not_revert_edit() {
        let mut policy = policy();
        let before = policy.project().unwrap();

        add_text(&mut policy, "just typed");
        let write = policy.begin_write(at(2)).unwrap().unwrap();

        // Snapshot from before the edit arrives while the write is in flight.
        let outcome = policy.receive_remote(remote(&before, at(1)));
        assert!(matches!(outcome, RemoteOutcome::Queued));

        let outcome = policy.complete_write(Ok(())).unwrap();
        assert!(matches!(outcome, RemoteOutcome::Discarded(DiscardReason::Stale)));

        let state = policy.project().unwrap();
        assert_eq!(state.to_document(), write.document);
        assert_eq!(state.ideas()[0].modules()[0].payload(), "just typed");
    }

    #[test]
    fn test_markerless_snapshot_mid_write_does_not_revert_edit() {
        let mut policy = policy();
        let before = policy.project().unwrap();

        policy.edit(|p| {
            p.set_title("Just typed");
            Ok(())
        })
        .unwrap();
        policy.begin_write(at(2)).unwrap().unwrap();

        let outcome = policy.receive_remote(before.to_document());
        assert!(matches!(outcome, RemoteOutcome::Queued));

        let outcome = policy.complete_write(Ok(())).unwrap();
        assert!(matches!(outcome, RemoteOutcome::Discarded(DiscardReason::Stale)));
        assert_eq!(policy.project().unwrap().title(), "Just typed");
        assert!(!policy.has_pending_changes());
    }

    #[test]
    fn test_markerless_snapshot_stays_stale_when_requeued() {
        let mut policy = policy();
        let before = policy.project().unwrap();

        add_text(&mut policy, "one");
        policy.begin_write(at(1)).unwrap().unwrap();
        policy.receive_remote(before.to_document());
        add_text(&mut policy, "two");

        assert!(matches!(
            policy.complete_write(Ok(())),
            Some(RemoteOutcome::Queued)
        ));
        policy.begin_write(at(2)).unwrap().unwrap();
        assert!(matches!(
            policy.complete_write(Ok(())),
            Some(RemoteOutcome::Discarded(DiscardReason::Stale))
        ));
        assert_eq!(policy.project().unwrap().ideas()[0].modules().len(), 2);
    }

    #[test]
    fn test_markerless_snapshot_applied_when_idle() {
        let mut policy = policy();
        let theirs = Project::new("Theirs");
        assert!(matches!(
            policy.receive_remote(theirs.to_document()),
            RemoteOutcome::Applied
        ));
        assert_eq!(policy.project().unwrap(), theirs);
    }

    #[test]
    fn test_newer_snapshot_mid_write_applies_after_ack() {
        let mut policy = policy();
        add_text(&mut policy, "mine");
        policy.begin_write(at(2)).unwrap().unwrap();

        let theirs = Project::new("Theirs");
        assert!(matches!(
            policy.receive_remote(remote(&theirs, at(4))),
            RemoteOutcome::Queued
        ));
        assert_eq!(policy.project().unwrap().title(), "Album");

        let outcome = policy.complete_write(Ok(())).unwrap();
        assert!(matches!(outcome, RemoteOutcome::Applied));
        assert_eq!(policy.project().unwrap(), theirs);
    }

    #[test]
    fn test_echo_of_own_write_is_discarded() {
        let mut policy = policy();
        add_text(&mut policy, "x");
        let write = policy.begin_write(at(1)).unwrap().unwrap();
        policy.complete_write(Ok(()));

        let echo = with_last_edited(write.document, write.last_edited);
        let outcome = policy.receive_remote(echo);
        assert!(matches!(outcome, RemoteOutcome::Discarded(DiscardReason::Echo)));
    }

    #[test]
    fn test_equal_snapshot_applied_without_echo_suppression() {
        let config = SyncConfig::default().with_echo_suppression(false);
        let mut policy = SyncPolicy::new(Project::new("p"), &config).unwrap();
        let outcome = policy.receive_remote(remote(&Project::new("p"), at(1)));
        assert!(matches!(outcome, RemoteOutcome::Applied));
        assert!(!policy.has_pending_changes());
    }

    #[test]
    fn test_pending_edits_queue_remote() {
        let mut policy = policy();
        add_text(&mut policy, "unsent");

        let theirs = Project::new("Theirs");
        assert!(matches!(
            policy.receive_remote(remote(&theirs, at(1))),
            RemoteOutcome::Queued
        ));
        assert!(policy.has_queued_remote());
        assert_eq!(policy.project().unwrap().title(), "Album");

        // Our write lands later, so the queued snapshot is stale.
        policy.begin_write(at(2)).unwrap().unwrap();
        let outcome = policy.complete_write(Ok(())).unwrap();
        assert!(matches!(outcome, RemoteOutcome::Discarded(DiscardReason::Stale)));
        assert!(!policy.has_queued_remote());
    }

    #[test]
    fn test_queued_snapshot_waits_for_edits_made_during_write() {
        let mut policy = policy();
        add_text(&mut policy, "one");
        policy.begin_write(at(1)).unwrap().unwrap();
        policy.receive_remote(remote(&Project::new("Theirs"), at(3)));
        add_text(&mut policy, "two");

        let outcome = policy.complete_write(Ok(())).unwrap();
        assert!(matches!(outcome, RemoteOutcome::Queued));
        assert!(policy.has_queued_remote());
    }

    #[test]
    fn test_only_latest_queued_snapshot_kept() {
        let mut policy = policy();
        add_text(&mut policy, "x");
        policy.begin_write(at(1)).unwrap().unwrap();

        policy.receive_remote(remote(&Project::new("First"), at(2)));
        policy.receive_remote(remote(&Project::new("Second"), at(3)));

        assert!(matches!(
            policy.complete_write(Ok(())),
            Some(RemoteOutcome::Applied)
        ));
        assert_eq!(policy.project().unwrap().title(), "Second");
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let mut policy = policy();
        let bad = serde_json::json!({"title": "x", "ideas": [{"modules": [{"kind": "hologram"}]}]});
        match policy.receive_remote(bad) {
            RemoteOutcome::Rejected(err) => assert!(err.is_decode()),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(policy.project().unwrap().title(), "Album");
    }

    #[test]
    fn test_loaded_marker_is_baseline() {
        let loaded = remote(&Project::new("Loaded"), at(10));
        let mut policy = SyncPolicy::from_document(&loaded, &SyncConfig::default()).unwrap();

        let older = remote(&Project::new("Older"), at(9));
        assert!(matches!(
            policy.receive_remote(older),
            RemoteOutcome::Discarded(DiscardReason::Stale)
        ));
    }

    #[test]
    fn test_targeted_edit_is_pending() {
        let mut policy = policy();
        policy.edit_replica(|m| m.set_title("Retitled")).unwrap();
        assert!(policy.has_pending_changes());
        let write = policy.begin_write(at(1)).unwrap().unwrap();
        assert_eq!(write.document["title"], "Retitled");
    }
}
