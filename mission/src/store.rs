//! The Mission Context Manager (design §4.1, component C7): the exclusive
//! owner of every mission-scoped entity's mutation. Agents only ever see
//! read-only [`MissionContext`] snapshots; they report what changed and the
//! Controller applies it here.
//!
//! Durability is a `rusqlite` connection (bundled SQLite, matching the
//! design's "relational store abstraction" — see §6); a fast in-memory mirror
//! backs reads and the hot-path [`MissionStore::get_status`] poll that
//! [`ModelDispatcher`](vantage_dispatch::ModelDispatcher) consults before
//! every call. Both are guarded by plain [`std::sync::Mutex`]es: every
//! operation here is synchronous (no I/O beyond a local SQLite file), which
//! also lets [`tools::LogSink`](crate::tools::LogSink) stay a plain `Fn`
//! rather than needing an async closure type.
//!
//! Serialization model: all mutation to one mission's state funnels through
//! `&self` methods that lock the in-memory mirror for the duration of the
//! update, which is the "logical per-mission lock" design §5 asks for (a
//! single mutex covering every mission is a simplification; a sharded lock
//! per mission id would scale better but isn't needed at this scale).

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tokio::sync::broadcast;
use vantage_dispatch::{MissionStatusSource, ModelCallDetails};

use crate::domain::{
    ExecutionLogEntry, GoalEntry, GoalStatus, Mission, MissionId, MissionMetadata, MissionStats, MissionStatus, Note,
    Plan, ThoughtEntry, unix_now,
};
use crate::error::{MissionError, Result};
use crate::event::MissionEvent;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A read-only snapshot of everything known about one mission.
#[derive(Debug, Clone)]
pub struct MissionContext {
    pub mission: Mission,
    pub plan: Option<Plan>,
    /// Every note ever stored, including discarded ones (`is_relevant == false`).
    /// Use [`MissionContext::active_notes`] for the filtered view most callers want.
    pub notes: Vec<Note>,
    pub report_sections: BTreeMap<String, String>,
    pub goals: Vec<GoalEntry>,
    pub thoughts: Vec<ThoughtEntry>,
    /// Bounded recent slice of the execution log, for a live UI; the full
    /// history lives durably and isn't reconstructed into memory here.
    pub recent_execution_log: Vec<ExecutionLogEntry>,
    pub stats: MissionStats,
}

impl MissionContext {
    /// Notes not discarded by a Reflection pass.
    #[must_use]
    pub fn active_notes(&self) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.is_relevant).collect()
    }

    /// Active goals only (`GoalStatus::Active`).
    #[must_use]
    pub fn active_goals(&self) -> Vec<&GoalEntry> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Active).collect()
    }
}

struct MissionRecord {
    mission: Mission,
    /// Status a `Paused` mission should resume to; set on pause, consumed on resume.
    paused_from: Option<MissionStatus>,
    plan: Option<Plan>,
    notes: Vec<Note>,
    report_sections: BTreeMap<String, String>,
    goals: Vec<GoalEntry>,
    thoughts: VecDeque<ThoughtEntry>,
    execution_log_cache: VecDeque<ExecutionLogEntry>,
    stats: MissionStats,
}

impl MissionRecord {
    fn new(mission: Mission) -> Self {
        Self {
            mission,
            paused_from: None,
            plan: None,
            notes: Vec::new(),
            report_sections: BTreeMap::new(),
            goals: Vec::new(),
            thoughts: VecDeque::new(),
            execution_log_cache: VecDeque::new(),
            stats: MissionStats::default(),
        }
    }

    fn snapshot(&self, log_cache_limit: usize) -> MissionContext {
        MissionContext {
            mission: self.mission.clone(),
            plan: self.plan.clone(),
            notes: self.notes.clone(),
            report_sections: self.report_sections.clone(),
            goals: self.goals.clone(),
            thoughts: self.thoughts.iter().cloned().collect(),
            recent_execution_log: self
                .execution_log_cache
                .iter()
                .rev()
                .take(log_cache_limit)
                .rev()
                .cloned()
                .collect(),
            stats: self.stats.clone(),
        }
    }
}

/// The Mission Context Manager: durable per-mission state plus a live
/// broadcast feed of [`MissionEvent`]s for a transport layer to consume.
pub struct MissionStore {
    conn: Mutex<Connection>,
    cache: Mutex<BTreeMap<MissionId, MissionRecord>>,
    events: broadcast::Sender<MissionEvent>,
    thought_pad_limit: usize,
    log_cache_limit: usize,
    mission_seq: AtomicU64,
    log_seq: Mutex<BTreeMap<MissionId, u64>>,
}

impl MissionStore {
    /// Opens (creating if absent) a SQLite-backed store at `path`.
    pub fn open(path: impl AsRef<Path>, thought_pad_limit: usize, log_cache_limit: usize) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| MissionError::Persistence(e.to_string()))?;
        Self::from_connection(conn, thought_pad_limit, log_cache_limit)
    }

    /// Opens an in-process, non-durable store — useful for tests and for a
    /// CLI session that doesn't need to survive a restart.
    pub fn in_memory(thought_pad_limit: usize, log_cache_limit: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| MissionError::Persistence(e.to_string()))?;
        Self::from_connection(conn, thought_pad_limit, log_cache_limit)
    }

    fn from_connection(conn: Connection, thought_pad_limit: usize, log_cache_limit: usize) -> Result<Self> {
        init_schema(&conn).map_err(|e| MissionError::Persistence(e.to_string()))?;
        let cache = reload_cache(&conn).map_err(|e| MissionError::Persistence(e.to_string()))?;
        let log_seq = cache
            .iter()
            .map(|(id, record)| (id.clone(), record.execution_log_cache.back().map_or(0, |e| e.sequence + 1)))
            .collect();
        let mission_seq = cache.len() as u64;
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            cache: Mutex::new(cache),
            events: tx,
            thought_pad_limit,
            log_cache_limit,
            mission_seq: AtomicU64::new(mission_seq),
            log_seq: Mutex::new(log_seq),
        })
    }

    /// Subscribes to the live event feed. A slow subscriber misses the
    /// oldest events rather than blocking the mission (design §5).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MissionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: MissionEvent) {
        let _ = self.events.send(event);
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("mission store connection mutex poisoned");
        f(&conn).map_err(|e| MissionError::Persistence(e.to_string()))
    }

    fn with_mission_mut<T>(
        &self,
        mission_id: &str,
        f: impl FnOnce(&mut MissionRecord) -> Result<T>,
    ) -> Result<T> {
        let mut cache = self.cache.lock().expect("mission store cache mutex poisoned");
        let record = cache
            .get_mut(mission_id)
            .ok_or_else(|| MissionError::Persistence(format!("unknown mission '{mission_id}'")))?;
        f(record)
    }

    /// Creates a new mission in `Pending` status and persists it.
    pub fn create_mission(&self, user_request: impl Into<String>, metadata: MissionMetadata) -> Result<MissionId> {
        let sequence = self.mission_seq.fetch_add(1, Ordering::Relaxed);
        let mission_id = format!("mission-{:010x}-{sequence:04x}", unix_now());
        let mut mission = Mission::new(mission_id.clone(), user_request);
        mission.metadata = metadata;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO missions (mission_id, user_request, status, metadata, created_at, updated_at, paused_from)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                params![
                    mission.mission_id,
                    mission.user_request,
                    status_str(mission.status),
                    serde_json::to_string(&mission.metadata).unwrap_or_default(),
                    mission.created_at,
                    mission.updated_at,
                ],
            )
        })?;

        self.cache
            .lock()
            .expect("mission store cache mutex poisoned")
            .insert(mission_id.clone(), MissionRecord::new(mission));

        Ok(mission_id)
    }

    /// Returns a full read-only snapshot of `mission_id`.
    pub fn get(&self, mission_id: &str) -> Result<MissionContext> {
        let cache = self.cache.lock().expect("mission store cache mutex poisoned");
        cache
            .get(mission_id)
            .map(|record| record.snapshot(self.log_cache_limit))
            .ok_or_else(|| MissionError::Persistence(format!("unknown mission '{mission_id}'")))
    }

    /// Cheap status lookup, meant for the cooperative-cancellation poll the
    /// dispatcher and controller perform at every suspension point.
    #[must_use]
    pub fn get_status(&self, mission_id: &str) -> Option<MissionStatus> {
        self.cache
            .lock()
            .expect("mission store cache mutex poisoned")
            .get(mission_id)
            .map(|record| record.mission.status)
    }

    /// Applies a status transition, rejecting anything
    /// [`MissionStatus::can_transition_to`] disallows. Publishes
    /// [`MissionEvent::AgentStatus`] on success.
    pub fn update_status(&self, mission_id: &str, status: MissionStatus) -> Result<()> {
        let applied = self.with_mission_mut(mission_id, |record| {
            if !record.mission.status.can_transition_to(status) {
                return Err(MissionError::TerminalMission {
                    mission_id: mission_id.to_string(),
                    status: format!("{:?}", record.mission.status),
                });
            }
            record.mission.status = status;
            record.mission.updated_at = unix_now();
            Ok(())
        })?;
        self.persist_mission_status(mission_id)?;
        self.publish(MissionEvent::AgentStatus { mission_id: mission_id.to_string(), status });
        Ok(applied)
    }

    /// Pauses a running mission, remembering the status to resume to.
    pub fn pause(&self, mission_id: &str) -> Result<()> {
        self.with_mission_mut(mission_id, |record| {
            if record.mission.status.is_terminal() {
                return Err(MissionError::TerminalMission {
                    mission_id: mission_id.to_string(),
                    status: format!("{:?}", record.mission.status),
                });
            }
            record.paused_from = Some(record.mission.status);
            record.mission.status = MissionStatus::Paused;
            record.mission.updated_at = unix_now();
            Ok(())
        })?;
        self.persist_mission_status(mission_id)?;
        self.publish(MissionEvent::AgentStatus { mission_id: mission_id.to_string(), status: MissionStatus::Paused });
        Ok(())
    }

    /// Resumes a paused mission to whatever status it was paused from.
    pub fn resume(&self, mission_id: &str) -> Result<MissionStatus> {
        let resumed = self.with_mission_mut(mission_id, |record| {
            if record.mission.status != MissionStatus::Paused {
                return Err(MissionError::Persistence(format!("mission '{mission_id}' is not paused")));
            }
            let target = record.paused_from.take().unwrap_or(MissionStatus::Researching);
            record.mission.status = target;
            record.mission.updated_at = unix_now();
            Ok(target)
        })?;
        self.persist_mission_status(mission_id)?;
        self.publish(MissionEvent::AgentStatus { mission_id: mission_id.to_string(), status: resumed });
        Ok(resumed)
    }

    fn persist_mission_status(&self, mission_id: &str) -> Result<()> {
        let (status, updated_at, paused_from) = {
            let cache = self.cache.lock().expect("mission store cache mutex poisoned");
            let record = cache
                .get(mission_id)
                .ok_or_else(|| MissionError::Persistence(format!("unknown mission '{mission_id}'")))?;
            (record.mission.status, record.mission.updated_at, record.paused_from)
        };
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE missions SET status = ?1, updated_at = ?2, paused_from = ?3 WHERE mission_id = ?4",
                params![status_str(status), updated_at, paused_from.map(status_str), mission_id],
            )
        })?;
        Ok(())
    }

    /// Stores (replacing) the mission's plan.
    pub fn store_plan(&self, mission_id: &str, plan: Plan) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        let serialized = serde_json::to_string(&plan).map_err(|e| MissionError::Persistence(e.to_string()))?;
        self.with_mission_mut(mission_id, |record| {
            record.plan = Some(plan);
            Ok(())
        })?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO plans (mission_id, data) VALUES (?1, ?2)
                 ON CONFLICT(mission_id) DO UPDATE SET data = excluded.data",
                params![mission_id, serialized],
            )
        })?;
        Ok(())
    }

    /// Stores the finalized Markdown content for one report section.
    pub fn store_report_section(&self, mission_id: &str, section_id: &str, content: String) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        self.with_mission_mut(mission_id, |record| {
            record.report_sections.insert(section_id.to_string(), content.clone());
            Ok(())
        })?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO report_sections (mission_id, section_id, content) VALUES (?1, ?2, ?3)
                 ON CONFLICT(mission_id, section_id) DO UPDATE SET content = excluded.content",
                params![mission_id, section_id, content],
            )
        })?;
        Ok(())
    }

    /// Stores newly gathered notes, assigning a `note_id` to any that lack
    /// one, and publishes [`MissionEvent::NoteGenerated`] for each. Returns
    /// the final list of note ids in insertion order.
    pub fn store_notes(&self, mission_id: &str, mut notes: Vec<Note>) -> Result<Vec<String>> {
        self.reject_if_terminal(mission_id)?;
        let mut ids = Vec::with_capacity(notes.len());
        let sequence_base = self.mission_seq.fetch_add(notes.len() as u64, Ordering::Relaxed);
        for (offset, note) in notes.iter_mut().enumerate() {
            if note.note_id.trim().is_empty() {
                note.note_id = format!("note-{mission_id}-{:x}", sequence_base + offset as u64);
            }
            ids.push(note.note_id.clone());
        }

        self.with_mission_mut(mission_id, |record| {
            record.notes.extend(notes.iter().cloned());
            Ok(())
        })?;

        for note in &notes {
            let serialized = serde_json::to_string(note).map_err(|e| MissionError::Persistence(e.to_string()))?;
            self.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO notes (mission_id, note_id, data) VALUES (?1, ?2, ?3)
                     ON CONFLICT(mission_id, note_id) DO UPDATE SET data = excluded.data",
                    params![mission_id, note.note_id, serialized],
                )
            })?;
            self.publish(MissionEvent::NoteGenerated {
                mission_id: mission_id.to_string(),
                note: Box::new(note.clone()),
            });
        }
        Ok(ids)
    }

    /// Replaces a note's content and source metadata after a full-page fetch
    /// produced a richer version than the original web-snippet extraction
    /// (design §4.7, Research: "replacing the snippet-based note").
    pub fn update_note_from_full_content(
        &self,
        mission_id: &str,
        note_id: &str,
        content: String,
        source_metadata: crate::domain::SourceMetadata,
    ) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        self.with_mission_mut(mission_id, |record| {
            let note = record
                .notes
                .iter_mut()
                .find(|n| n.note_id == note_id)
                .ok_or_else(|| MissionError::Persistence(format!("unknown note '{note_id}'")))?;
            note.content = content;
            note.source_metadata = source_metadata;
            Ok(())
        })?;
        let serialized = {
            let cache = self.cache.lock().expect("mission store cache mutex poisoned");
            let record = cache.get(mission_id).expect("checked above");
            let note = record.notes.iter().find(|n| n.note_id == note_id).expect("checked above");
            serde_json::to_string(note).map_err(|e| MissionError::Persistence(e.to_string()))?
        };
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notes SET data = ?1 WHERE mission_id = ?2 AND note_id = ?3",
                params![serialized, mission_id, note_id],
            )
        })?;
        self.publish(MissionEvent::NoteUpdatedFromFullContent {
            mission_id: mission_id.to_string(),
            note_id: note_id.to_string(),
        });
        Ok(())
    }

    /// Marks the given note ids `is_relevant = false` so they drop out of
    /// every subsequent `active_notes()` view, per a Reflection pass's
    /// `discard_note_ids`.
    pub fn discard_notes(&self, mission_id: &str, note_ids: &[String]) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        self.with_mission_mut(mission_id, |record| {
            for note in &mut record.notes {
                if note_ids.iter().any(|id| id == &note.note_id) {
                    note.is_relevant = false;
                }
            }
            Ok(())
        })?;
        for note_id in note_ids {
            self.with_conn(|conn| {
                conn.execute(
                    "UPDATE notes SET discarded = 1 WHERE mission_id = ?1 AND note_id = ?2",
                    params![mission_id, note_id],
                )
            })?;
        }
        Ok(())
    }

    /// Appends a new active goal.
    pub fn add_goal(&self, mission_id: &str, goal: GoalEntry) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        let serialized = serde_json::to_string(&goal).map_err(|e| MissionError::Persistence(e.to_string()))?;
        self.with_mission_mut(mission_id, |record| {
            record.goals.push(goal.clone());
            Ok(())
        })?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO goals (mission_id, goal_id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(mission_id, goal_id) DO UPDATE SET data = excluded.data",
                params![mission_id, goal.goal_id, serialized],
            )
        })?;
        Ok(())
    }

    /// Updates one goal's status (e.g. `Active -> Addressed` once Writing
    /// has honored it).
    pub fn update_goal_status(&self, mission_id: &str, goal_id: &str, status: GoalStatus) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        self.with_mission_mut(mission_id, |record| {
            let goal = record
                .goals
                .iter_mut()
                .find(|g| g.goal_id == goal_id)
                .ok_or_else(|| MissionError::Persistence(format!("unknown goal '{goal_id}'")))?;
            goal.status = status;
            Ok(())
        })?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE goals SET data = json_set(data, '$.status', ?1) WHERE mission_id = ?2 AND goal_id = ?3",
                params![goal_status_str(status), mission_id, goal_id],
            )
        })
        // json_set over a plain TEXT column is unreliable without the json1
        // extension guaranteed; fall back to a full rewrite on failure.
        .or_else(|_| {
            let data = {
                let cache = self.cache.lock().expect("mission store cache mutex poisoned");
                let record = cache.get(mission_id).expect("checked above");
                let goal = record.goals.iter().find(|g| g.goal_id == goal_id).expect("checked above");
                serde_json::to_string(goal).map_err(|e| MissionError::Persistence(e.to_string()))?
            };
            self.with_conn(|conn| {
                conn.execute(
                    "UPDATE goals SET data = ?1 WHERE mission_id = ?2 AND goal_id = ?3",
                    params![data, mission_id, goal_id],
                )
            })
        })?;
        Ok(())
    }

    /// Returns every goal currently `Active`.
    pub fn get_active_goals(&self, mission_id: &str) -> Result<Vec<GoalEntry>> {
        let cache = self.cache.lock().expect("mission store cache mutex poisoned");
        let record = cache
            .get(mission_id)
            .ok_or_else(|| MissionError::Persistence(format!("unknown mission '{mission_id}'")))?;
        Ok(record.goals.iter().filter(|g| g.status == GoalStatus::Active).cloned().collect())
    }

    /// Appends a thought, evicting the oldest once `thought_pad_context_limit`
    /// is exceeded (FIFO cap per design §3).
    pub fn add_thought(&self, mission_id: &str, entry: ThoughtEntry) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        let limit = self.thought_pad_limit;
        self.with_mission_mut(mission_id, |record| {
            record.thoughts.push_back(entry);
            while record.thoughts.len() > limit {
                record.thoughts.pop_front();
            }
            Ok(())
        })
        // Thoughts aren't separately persisted beyond the in-memory FIFO pad:
        // they're a short-lived scratchpad, not part of the durable report.
    }

    /// Appends one execution-log entry: bounded in-memory cache for the live
    /// feed, unbounded durable append-only table, plus a
    /// [`MissionEvent::ExecutionLog`] publish.
    pub fn log_execution_step(&self, mission_id: &str, mut entry: ExecutionLogEntry) -> Result<()> {
        let sequence = {
            let mut seqs = self.log_seq.lock().expect("mission store log-seq mutex poisoned");
            let counter = seqs.entry(mission_id.to_string()).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };
        entry.sequence = sequence;

        let limit = self.log_cache_limit;
        let cache_result = self.with_mission_mut(mission_id, |record| {
            record.execution_log_cache.push_back(entry.clone());
            while record.execution_log_cache.len() > limit {
                record.execution_log_cache.pop_front();
            }
            Ok(())
        });
        // An execution-log entry is diagnostic, not state-mutating; log it
        // even for an unknown mission id (a bug elsewhere shouldn't also
        // swallow the evidence of that bug) but don't propagate the error.
        let _ = cache_result;

        let serialized = serde_json::to_string(&entry).map_err(|e| MissionError::Persistence(e.to_string()))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO execution_log (mission_id, seq, data) VALUES (?1, ?2, ?3)",
                params![mission_id, sequence, serialized],
            )
        })?;
        self.publish(MissionEvent::ExecutionLog { mission_id: mission_id.to_string(), entry: Box::new(entry) });
        Ok(())
    }

    /// Builds a [`crate::tools::LogSink`] bound to one mission, for threading
    /// into a [`crate::tools::ToolCallContext`] without the tool registry
    /// needing to see the store itself.
    #[must_use]
    pub fn log_sink(self: &std::sync::Arc<Self>, mission_id: impl Into<String>) -> crate::tools::LogSink {
        let store = std::sync::Arc::clone(self);
        let mission_id = mission_id.into();
        std::sync::Arc::new(move |entry: ExecutionLogEntry| {
            let _ = store.log_execution_step(&mission_id, entry);
        })
    }

    /// Folds one model call's token/cost accounting into the mission's
    /// running stats (design §4.1: "atomic increments").
    pub fn update_mission_stats(&self, mission_id: &str, details: &ModelCallDetails) -> Result<()> {
        self.with_mission_mut(mission_id, |record| {
            record.stats.record_call(details);
            Ok(())
        })?;
        self.persist_stats(mission_id)
    }

    /// Sets one mission metadata key (e.g. the pending-questions echo kept
    /// between `questioning` turns, or a document group id discovered after
    /// mission creation). Overwrites any existing value for `key`.
    pub fn set_metadata(&self, mission_id: &str, key: &str, value: String) -> Result<()> {
        self.reject_if_terminal(mission_id)?;
        let serialized = self.with_mission_mut(mission_id, |record| {
            record.mission.metadata.insert(key.to_string(), value);
            record.mission.updated_at = unix_now();
            serde_json::to_string(&record.mission.metadata).map_err(|e| MissionError::Persistence(e.to_string()))
        })?;
        let updated_at = self
            .cache
            .lock()
            .expect("mission store cache mutex poisoned")
            .get(mission_id)
            .expect("checked above")
            .mission
            .updated_at;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE missions SET metadata = ?1, updated_at = ?2 WHERE mission_id = ?3",
                params![serialized, updated_at, mission_id],
            )
        })?;
        Ok(())
    }

    /// Increments the mission's web-search counter.
    pub fn record_web_search(&self, mission_id: &str) -> Result<()> {
        self.with_mission_mut(mission_id, |record| {
            record.stats.record_web_search();
            Ok(())
        })?;
        self.persist_stats(mission_id)
    }

    fn persist_stats(&self, mission_id: &str) -> Result<()> {
        let serialized = {
            let cache = self.cache.lock().expect("mission store cache mutex poisoned");
            let record = cache
                .get(mission_id)
                .ok_or_else(|| MissionError::Persistence(format!("unknown mission '{mission_id}'")))?;
            serde_json::to_string(&record.stats).map_err(|e| MissionError::Persistence(e.to_string()))?
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stats (mission_id, data) VALUES (?1, ?2)
                 ON CONFLICT(mission_id) DO UPDATE SET data = excluded.data",
                params![mission_id, serialized],
            )
        })?;
        Ok(())
    }

    fn reject_if_terminal(&self, mission_id: &str) -> Result<()> {
        match self.get_status(mission_id) {
            Some(status) if status.is_terminal() => Err(MissionError::TerminalMission {
                mission_id: mission_id.to_string(),
                status: format!("{status:?}"),
            }),
            Some(_) => Ok(()),
            None => Err(MissionError::Persistence(format!("unknown mission '{mission_id}'"))),
        }
    }
}

impl MissionStatusSource for MissionStore {
    fn is_running(&self, mission_id: &str) -> bool {
        self.get_status(mission_id).is_some_and(MissionStatus::is_running)
    }
}

fn status_str(status: MissionStatus) -> &'static str {
    match status {
        MissionStatus::Pending => "pending",
        MissionStatus::Planning => "planning",
        MissionStatus::Researching => "researching",
        MissionStatus::Writing => "writing",
        MissionStatus::Completed => "completed",
        MissionStatus::Failed => "failed",
        MissionStatus::Paused => "paused",
        MissionStatus::Stopped => "stopped",
    }
}

fn goal_status_str(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::Active => "\"active\"",
        GoalStatus::Addressed => "\"addressed\"",
        GoalStatus::Obsolete => "\"obsolete\"",
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS missions (
            mission_id TEXT PRIMARY KEY,
            user_request TEXT NOT NULL,
            status TEXT NOT NULL,
            metadata TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            paused_from TEXT
        );
        CREATE TABLE IF NOT EXISTS plans (
            mission_id TEXT PRIMARY KEY REFERENCES missions(mission_id),
            data TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS report_sections (
            mission_id TEXT NOT NULL REFERENCES missions(mission_id),
            section_id TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (mission_id, section_id)
        );
        CREATE TABLE IF NOT EXISTS notes (
            mission_id TEXT NOT NULL REFERENCES missions(mission_id),
            note_id TEXT NOT NULL,
            data TEXT NOT NULL,
            discarded INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (mission_id, note_id)
        );
        CREATE TABLE IF NOT EXISTS goals (
            mission_id TEXT NOT NULL REFERENCES missions(mission_id),
            goal_id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (mission_id, goal_id)
        );
        CREATE TABLE IF NOT EXISTS thoughts (
            mission_id TEXT NOT NULL REFERENCES missions(mission_id),
            seq INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (mission_id, seq)
        );
        CREATE TABLE IF NOT EXISTS execution_log (
            mission_id TEXT NOT NULL REFERENCES missions(mission_id),
            seq INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (mission_id, seq)
        );
        CREATE TABLE IF NOT EXISTS stats (
            mission_id TEXT PRIMARY KEY REFERENCES missions(mission_id),
            data TEXT NOT NULL
        );
        ",
    )
}

fn status_from_str(s: &str) -> Option<MissionStatus> {
    Some(match s {
        "pending" => MissionStatus::Pending,
        "planning" => MissionStatus::Planning,
        "researching" => MissionStatus::Researching,
        "writing" => MissionStatus::Writing,
        "completed" => MissionStatus::Completed,
        "failed" => MissionStatus::Failed,
        "paused" => MissionStatus::Paused,
        "stopped" => MissionStatus::Stopped,
        _ => return None,
    })
}

/// Reconstructs the in-memory mirror from durable tables on startup, so a
/// restarted process picks every in-flight mission back up where it left off
/// (design §4.1: "a mission survives a process restart").
fn reload_cache(conn: &Connection) -> rusqlite::Result<BTreeMap<MissionId, MissionRecord>> {
    let mut cache = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT mission_id, user_request, status, metadata, created_at, updated_at, paused_from FROM missions",
    )?;
    let rows = stmt.query_map([], |row| {
        let mission_id: String = row.get(0)?;
        let user_request: String = row.get(1)?;
        let status: String = row.get(2)?;
        let metadata: String = row.get(3)?;
        let created_at: u64 = row.get(4)?;
        let updated_at: u64 = row.get(5)?;
        let paused_from: Option<String> = row.get(6)?;
        Ok((mission_id, user_request, status, metadata, created_at, updated_at, paused_from))
    })?;

    for row in rows {
        let (mission_id, user_request, status, metadata, created_at, updated_at, paused_from) = row?;
        let mut mission = Mission::new(mission_id.clone(), user_request);
        mission.status = status_from_str(&status).unwrap_or(MissionStatus::Failed);
        mission.metadata = serde_json::from_str(&metadata).unwrap_or_default();
        mission.created_at = created_at;
        mission.updated_at = updated_at;

        let mut record = MissionRecord::new(mission);
        record.paused_from = paused_from.as_deref().and_then(status_from_str);
        cache.insert(mission_id, record);
    }

    {
        let mut stmt = conn.prepare("SELECT mission_id, data FROM plans")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (mission_id, data) = row?;
            if let (Some(record), Ok(plan)) = (cache.get_mut(&mission_id), serde_json::from_str(&data)) {
                record.plan = Some(plan);
            }
        }
    }
    {
        let mut stmt = conn.prepare("SELECT mission_id, section_id, content FROM report_sections")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (mission_id, section_id, content) = row?;
            if let Some(record) = cache.get_mut(&mission_id) {
                record.report_sections.insert(section_id, content);
            }
        }
    }
    {
        let mut stmt = conn.prepare("SELECT mission_id, data FROM notes ORDER BY note_id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (mission_id, data) = row?;
            if let (Some(record), Ok(note)) = (cache.get_mut(&mission_id), serde_json::from_str(&data)) {
                record.notes.push(note);
            }
        }
    }
    {
        let mut stmt = conn.prepare("SELECT mission_id, data FROM goals ORDER BY goal_id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (mission_id, data) = row?;
            if let (Some(record), Ok(goal)) = (cache.get_mut(&mission_id), serde_json::from_str(&data)) {
                record.goals.push(goal);
            }
        }
    }
    {
        let mut stmt = conn.prepare("SELECT mission_id, data FROM stats")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (mission_id, data) = row?;
            if let (Some(record), Ok(stats)) = (cache.get_mut(&mission_id), serde_json::from_str(&data)) {
                record.stats = stats;
            }
        }
    }
    {
        // Only the most recent `log_cache_limit`-ish tail matters for the live
        // feed; rather than guess a limit here, pull everything and let the
        // caller's cap (already applied on every subsequent write) keep it
        // bounded going forward. A long-lived mission across many restarts
        // could in principle grow this once, but `snapshot()` always trims to
        // `log_cache_limit` on read regardless of cache size.
        let mut stmt = conn.prepare("SELECT mission_id, data FROM execution_log ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (mission_id, data) = row?;
            if let (Some(record), Ok(entry)) = (cache.get_mut(&mission_id), serde_json::from_str(&data)) {
                record.execution_log_cache.push_back(entry);
            }
        }
    }

    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;

    fn store() -> MissionStore {
        MissionStore::in_memory(20, 50).unwrap()
    }

    #[test]
    fn create_and_fetch_mission() {
        let store = store();
        let id = store.create_mission("research quantum computing", MissionMetadata::new()).unwrap();
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.mission.status, MissionStatus::Pending);
        assert_eq!(ctx.mission.user_request, "research quantum computing");
    }

    #[test]
    fn status_transitions_are_enforced() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store.update_status(&id, MissionStatus::Researching).unwrap();
        store.update_status(&id, MissionStatus::Writing).unwrap();
        store.update_status(&id, MissionStatus::Completed).unwrap();

        let err = store.update_status(&id, MissionStatus::Researching).unwrap_err();
        assert!(matches!(err, MissionError::TerminalMission { .. }));
    }

    #[test]
    fn terminal_mission_rejects_new_notes() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store.update_status(&id, MissionStatus::Stopped).unwrap();

        let note = Note::new("", "content", SourceType::Internal, "agent");
        let err = store.store_notes(&id, vec![note]).unwrap_err();
        assert!(matches!(err, MissionError::TerminalMission { .. }));
    }

    #[test]
    fn pause_and_resume_restores_previous_status() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store.update_status(&id, MissionStatus::Researching).unwrap();
        store.pause(&id).unwrap();
        assert_eq!(store.get_status(&id), Some(MissionStatus::Paused));
        let resumed = store.resume(&id).unwrap();
        assert_eq!(resumed, MissionStatus::Researching);
        assert_eq!(store.get_status(&id), Some(MissionStatus::Researching));
    }

    #[test]
    fn notes_get_generated_ids_and_discard_marks_inactive() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store.update_status(&id, MissionStatus::Researching).unwrap();

        let note = Note::new("", "some fact", SourceType::Document, "doc-1");
        let ids = store.store_notes(&id, vec![note]).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(!ids[0].is_empty());

        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.active_notes().len(), 1);

        store.discard_notes(&id, &ids).unwrap();
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.active_notes().len(), 0);
        assert_eq!(ctx.notes.len(), 1);
    }

    #[test]
    fn goals_filter_by_active_status() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();

        let goal = GoalEntry::new("g1", "brief and informal", "messenger");
        store.add_goal(&id, goal).unwrap();
        assert_eq!(store.get_active_goals(&id).unwrap().len(), 1);

        store.update_goal_status(&id, "g1", GoalStatus::Addressed).unwrap();
        assert_eq!(store.get_active_goals(&id).unwrap().len(), 0);
    }

    #[test]
    fn thought_pad_is_fifo_bounded() {
        let store = MissionStore::in_memory(3, 50).unwrap();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        for i in 0..5 {
            store.add_thought(&id, ThoughtEntry::new("research", format!("thought {i}"))).unwrap();
        }
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.thoughts.len(), 3);
        assert_eq!(ctx.thoughts[0].content, "thought 2");
    }

    #[test]
    fn execution_log_cache_is_bounded_but_sequence_keeps_growing() {
        let store = MissionStore::in_memory(20, 2).unwrap();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        for i in 0..5 {
            store.log_execution_step(&id, ExecutionLogEntry::success("research", "step", format!("out {i}"))).unwrap();
        }
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.recent_execution_log.len(), 2);
        assert_eq!(ctx.recent_execution_log.last().unwrap().sequence, 4);
    }

    #[test]
    fn stats_accumulate_across_calls() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store
            .update_mission_stats(&id, &ModelCallDetails { agent_name: "writing".into(), prompt_tokens: 10, completion_tokens: 5, cost_usd: 0.001, ..Default::default() })
            .unwrap();
        store
            .update_mission_stats(&id, &ModelCallDetails { agent_name: "writing".into(), prompt_tokens: 20, completion_tokens: 15, cost_usd: 0.002, ..Default::default() })
            .unwrap();
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.stats.prompt_tokens, 30);
        assert!((ctx.stats.cost_usd - 0.003).abs() < 1e-9);
    }

    #[test]
    fn metadata_is_set_and_visible_in_snapshot() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        store.set_metadata(&id, "document_group_id", "group-1".to_string()).unwrap();
        let ctx = store.get(&id).unwrap();
        assert_eq!(ctx.mission.document_group_id(), Some("group-1"));
    }

    #[test]
    fn is_running_reflects_status() {
        let store = store();
        let id = store.create_mission("x", MissionMetadata::new()).unwrap();
        assert!(MissionStatusSource::is_running(&store, &id));
        store.update_status(&id, MissionStatus::Planning).unwrap();
        store.update_status(&id, MissionStatus::Stopped).unwrap();
        assert!(!MissionStatusSource::is_running(&store, &id));
    }
}
