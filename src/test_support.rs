//! In-memory stores backing `AppState::fake()` and the service tests.
//!
//! The workout store mimics a transactional database: a transaction works on
//! a private copy of the data and publishes it only on commit.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    auth::password::PasswordSecret,
    users::{
        repo::{Duplicate, UserStore},
        repo_types::{NewUser, User},
    },
    workouts::{
        repo::{WorkoutStore, WorkoutTx},
        repo_types::{Workout, WorkoutEntry, WorkoutRow},
    },
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    hidden: Mutex<Vec<String>>,
}

fn taken(users: &[User], id: i64, username: &str, email: &str) -> Option<Duplicate> {
    let others = || users.iter().filter(|u| u.id != id);
    if others().any(|u| u.username == username) {
        Some(Duplicate("username"))
    } else if others().any(|u| u.email == email) {
        Some(Duplicate("email"))
    } else {
        None
    }
}

impl MemoryUserStore {
    /// Makes `find_by_username` miss `username`, as if another request
    /// inserted it between the lookup and the write.
    pub fn hide_from_lookups(&self, username: &str) {
        self.hidden.lock().unwrap().push(username.into());
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Stores a user with an arbitrary secret string.
    pub fn insert_raw(&self, username: &str, email: &str, secret: &str) -> i64 {
        let mut users = self.users.lock().unwrap();
        let id = users.len() as i64 + 1;
        let now = OffsetDateTime::now_utc();
        users.push(User {
            id,
            username: username.into(),
            email: email.into(),
            password_hash: PasswordSecret::from_phc(secret),
            bio: String::new(),
            created_at: now,
            updated_at: now,
        });
        id
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(dup) = taken(&users, 0, &user.username, &user.email) {
            return Err(dup.into());
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: users.len() as i64 + 1,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            bio: user.bio.clone(),
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        if self.hidden.lock().unwrap().iter().any(|h| h == username) {
            return Ok(None);
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update(&self, user: &User) -> anyhow::Result<Option<OffsetDateTime>> {
        let mut users = self.users.lock().unwrap();
        if let Some(dup) = taken(&users, user.id, &user.username, &user.email) {
            return Err(dup.into());
        }
        let Some(stored) = users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.bio = user.bio.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.updated_at))
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_workout_id: i64,
    next_entry_id: i64,
    workouts: BTreeMap<i64, WorkoutRow>,
    /// entry id → (workout id, entry)
    entries: BTreeMap<i64, (i64, WorkoutEntry)>,
}

#[derive(Default)]
struct Faults {
    entry_insert_at: Mutex<Option<usize>>,
    commit: AtomicBool,
    reads: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryWorkoutStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
    begins: Arc<AtomicUsize>,
}

impl MemoryWorkoutStore {
    /// Fails the `n`th (0-based) entry insert of every later transaction.
    pub fn fail_entry_insert_at(&self, n: usize) {
        *self.faults.entry_insert_at.lock().unwrap() = Some(n);
    }

    pub fn fail_commit(&self) {
        self.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Makes entry reads fail.
    pub fn fail_reads(&self) {
        self.faults.reads.store(true, Ordering::SeqCst);
    }

    pub fn workout_count(&self) -> usize {
        self.tables.lock().unwrap().workouts.len()
    }

    pub fn entry_count(&self) -> usize {
        self.tables.lock().unwrap().entries.len()
    }

    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

struct MemoryWorkoutTx {
    shared: Arc<Mutex<Tables>>,
    staged: Tables,
    entry_inserts: usize,
    fail_entry_insert_at: Option<usize>,
    fail_commit: bool,
}

#[async_trait]
impl WorkoutStore for MemoryWorkoutStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn WorkoutTx>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWorkoutTx {
            shared: self.tables.clone(),
            staged: self.tables.lock().unwrap().clone(),
            entry_inserts: 0,
            fail_entry_insert_at: *self.faults.entry_insert_at.lock().unwrap(),
            fail_commit: self.faults.commit.load(Ordering::SeqCst),
        }))
    }

    async fn find_workout(&self, id: i64) -> anyhow::Result<Option<WorkoutRow>> {
        Ok(self.tables.lock().unwrap().workouts.get(&id).cloned())
    }

    async fn list_entries(&self, workout_id: i64) -> anyhow::Result<Vec<WorkoutEntry>> {
        if self.faults.reads.load(Ordering::SeqCst) {
            anyhow::bail!("injected read failure");
        }
        let tables = self.tables.lock().unwrap();
        let mut entries: Vec<WorkoutEntry> = tables
            .entries
            .values()
            .filter(|(owner, _)| *owner == workout_id)
            .map(|(_, e)| e.clone())
            .collect();
        entries.sort_by_key(|e| (e.order_index, e.id));
        Ok(entries)
    }

    async fn delete_workout(&self, id: i64) -> anyhow::Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        if tables.workouts.remove(&id).is_none() {
            return Ok(0);
        }
        tables.entries.retain(|_, (owner, _)| *owner != id);
        Ok(1)
    }
}

#[async_trait]
impl WorkoutTx for MemoryWorkoutTx {
    async fn insert_workout(&mut self, workout: &Workout) -> anyhow::Result<i64> {
        self.staged.next_workout_id += 1;
        let id = self.staged.next_workout_id;
        let mut row = WorkoutRow::from(workout);
        row.id = id;
        self.staged.workouts.insert(id, row);
        Ok(id)
    }

    async fn update_workout(&mut self, workout: &Workout) -> anyhow::Result<u64> {
        match self.staged.workouts.get_mut(&workout.id) {
            Some(row) => {
                *row = WorkoutRow::from(workout);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_entries(&mut self, workout_id: i64) -> anyhow::Result<u64> {
        let before = self.staged.entries.len();
        self.staged.entries.retain(|_, (owner, _)| *owner != workout_id);
        Ok((before - self.staged.entries.len()) as u64)
    }

    async fn insert_entry(
        &mut self,
        workout_id: i64,
        entry: &WorkoutEntry,
    ) -> anyhow::Result<i64> {
        let n = self.entry_inserts;
        self.entry_inserts += 1;
        if self.fail_entry_insert_at == Some(n) {
            anyhow::bail!("injected failure on entry insert {}", n);
        }
        if !self.staged.workouts.contains_key(&workout_id) {
            anyhow::bail!("foreign key violation: workout {}", workout_id);
        }
        self.staged.next_entry_id += 1;
        let id = self.staged.next_entry_id;
        let mut stored = entry.clone();
        stored.id = id;
        self.staged.entries.insert(id, (workout_id, stored));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        if self.fail_commit {
            anyhow::bail!("injected commit failure");
        }
        let Self { shared, staged, .. } = *self;
        *shared.lock().unwrap() = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
