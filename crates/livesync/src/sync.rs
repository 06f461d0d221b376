//! Remote collection sync.
//!
//! `RemoteCollectionSync` owns at most one mirrored collection at a time and
//! drives its lifecycle:
//!
//! - `activate` opens the change stream, performs the bulk read, and hands
//!   the stream to a driver task that folds events in arrival order
//! - `mutate` writes through to the store and patches the collection with the
//!   stored row; the echo of the write is absorbed by version comparison
//! - dropped streams are re-opened with backoff, and the collection is
//!   reconciled with a fresh bulk read while it keeps its stale contents
//! - `deactivate` closes the stream and discards the collection
//!
//! The stream is opened before the bulk read so that no change committed
//! between the two is lost; changes already reflected in the read fold in as
//! duplicates.

use crate::collection::{Applied, Collection};
use crate::config::SyncConfig;
use crate::error::{SchemaError, StoreError, SyncError, SyncResult};
use crate::event::{ChangeEvent, ChangeKind};
use crate::query::Query;
use crate::record::{Fields, OwnerId, Record, RecordId};
use crate::schema::{decode_all, Entity};
use crate::status::{SyncState, SyncStatus};
use crate::store::{RemoteStore, SubscriptionHandle};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A write issued through a collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Insert a row. Without an explicit owner, the owner pinned by the
    /// collection's filter is used.
    Insert {
        owner: Option<OwnerId>,
        fields: Fields,
    },
    /// Merge fields into an existing row.
    Update { id: RecordId, fields: Fields },
    /// Add to an integer column atomically on the store.
    Increment { id: RecordId, field: String, by: i64 },
    /// Delete a row.
    Delete(RecordId),
}

impl Mutation {
    /// Insert owned by the collection's pinned owner, if any.
    pub fn insert(fields: Fields) -> Self {
        Mutation::Insert {
            owner: None,
            fields,
        }
    }

    /// Insert with an explicit owner.
    pub fn insert_as(owner: OwnerId, fields: Fields) -> Self {
        Mutation::Insert {
            owner: Some(owner),
            fields,
        }
    }

    /// Merge `fields` into the row `id`.
    pub fn update(id: RecordId, fields: Fields) -> Self {
        Mutation::Update { id, fields }
    }

    /// Add `by` to the integer column `field` of row `id`.
    pub fn increment(id: RecordId, field: impl Into<String>, by: i64) -> Self {
        Mutation::Increment {
            id,
            field: field.into(),
            by,
        }
    }

    /// Delete the row `id`.
    pub fn delete(id: RecordId) -> Self {
        Mutation::Delete(id)
    }

    /// The kind of change this mutation produces.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Mutation::Insert { .. } => ChangeKind::Insert,
            Mutation::Update { .. } | Mutation::Increment { .. } => ChangeKind::Update,
            Mutation::Delete(_) => ChangeKind::Delete,
        }
    }
}

/// Result of a successful mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutated {
    /// The row as stored after an insert or update.
    Written(Record),
    /// The row was deleted.
    Deleted(RecordId),
}

impl Mutated {
    /// The stored row, for inserts and updates.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Mutated::Written(record) => Some(record),
            Mutated::Deleted(_) => None,
        }
    }

    /// Take the stored row, for inserts and updates.
    pub fn into_record(self) -> Option<Record> {
        match self {
            Mutated::Written(record) => Some(record),
            Mutated::Deleted(_) => None,
        }
    }

    /// Identifier of the affected row.
    pub fn id(&self) -> &RecordId {
        match self {
            Mutated::Written(record) => &record.id,
            Mutated::Deleted(id) => id,
        }
    }
}

struct SessionState {
    collection: Collection,
    status: SyncStatus,
}

impl SessionState {
    fn transition(&mut self, table: &str, next: SyncState) {
        let current = self.status.state;
        if current.can_transition_to(next) {
            if current != next {
                tracing::debug!("{}: {:?} -> {:?}", table, current, next);
            }
            self.status.state = next;
        } else {
            tracing::warn!("{}: ignoring invalid transition {:?} -> {:?}", table, current, next);
        }
    }
}

/// One activation of a collection: its state, stream and driver.
struct Session {
    query: Query,
    state: RwLock<SessionState>,
    revision: watch::Sender<u64>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn new(query: Query) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(SessionState {
                collection: Collection::new(&query),
                status: SyncStatus::default(),
            }),
            query,
            revision,
            subscription: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn table(&self) -> &str {
        &self.query.table
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn handle(self: &Arc<Self>) -> CollectionHandle {
        CollectionHandle {
            changes: self.revision.subscribe(),
            session: Arc::clone(self),
        }
    }

    fn is_closed(&self) -> bool {
        self.read().status.is_closed()
    }

    fn is_live(&self) -> bool {
        self.read().status.is_live()
    }

    fn begin_load(&self) {
        self.write().transition(self.table(), SyncState::Loading);
        self.bump();
    }

    fn retry_load(&self, err: &StoreError) {
        let mut state = self.write();
        state.status.last_error = Some(err.to_string());
        state.transition(self.table(), SyncState::Loading);
    }

    fn finish_load(&self, rows: Vec<Record>) -> SyncResult<usize> {
        let len = {
            let mut state = self.write();
            if state.status.is_closed() {
                return Err(SyncError::Closed);
            }
            state.collection.load(rows);
            state.status.last_synced = Some(Utc::now());
            state.status.last_error = None;
            state.transition(self.table(), SyncState::Live);
            state.collection.len()
        };
        self.bump();
        Ok(len)
    }

    fn fail_load(&self, err: &StoreError) {
        {
            let mut state = self.write();
            state.status.last_error = Some(err.to_string());
            state.transition(self.table(), SyncState::Closed);
        }
        self.bump();
    }

    /// Fold one event. Returns `None` once the session is closed.
    fn apply(&self, event: ChangeEvent, origin: &'static str) -> Option<Applied> {
        let id = event.id().clone();
        let kind = event.kind();
        let applied = {
            let mut state = self.write();
            if state.status.is_closed() {
                return None;
            }
            state.collection.apply(event)
        };

        if applied.changed() {
            tracing::debug!("{}: {} {:?} {} -> {:?}", self.table(), origin, kind, id, applied);
            self.bump();
        } else {
            tracing::trace!("{}: {} {:?} {} ignored: {:?}", self.table(), origin, kind, id, applied);
        }
        Some(applied)
    }

    /// Replace contents with a fresh read after resubscribing.
    fn reconcile(&self, rows: Vec<Record>) -> bool {
        {
            let mut state = self.write();
            if state.status.is_closed() {
                return false;
            }
            state.collection.load(rows);
            state.status.stale = false;
            state.status.reconnect_attempts = 0;
            state.status.last_synced = Some(Utc::now());
        }
        self.bump();
        true
    }

    fn set_stale(&self, stale: bool) {
        {
            let mut state = self.write();
            if state.status.is_closed() {
                return;
            }
            state.status.stale = stale;
            if !stale {
                state.status.reconnect_attempts = 0;
            }
        }
        self.bump();
    }

    fn record_reconnect_attempt(&self, attempts: u32) {
        self.write().status.reconnect_attempts = attempts;
        self.bump();
    }

    /// Keep `handle` as the session's open stream.
    ///
    /// Returns `false` (and closes the stream) if the session closed while
    /// the stream was being opened.
    fn attach_subscription<S: RemoteStore>(&self, store: &S, handle: SubscriptionHandle) -> bool {
        let mut slot = lock(&self.subscription);
        if self.is_closed() {
            store.unsubscribe(&handle);
            return false;
        }
        if let Some(previous) = slot.replace(handle) {
            store.unsubscribe(&previous);
        }
        true
    }

    fn attach_driver(&self, task: JoinHandle<()>) {
        let mut slot = lock(&self.driver);
        if self.is_closed() {
            task.abort();
        } else {
            *slot = Some(task);
        }
    }

    /// Close the session: discard the collection, stop the driver and close
    /// the stream. Returns `true` if this call did the closing.
    ///
    /// The closed flag is set under the state lock before anything else, so
    /// no event is folded once this returns.
    fn shutdown<S: RemoteStore>(&self, store: &S) -> bool {
        let closed_now = {
            let mut state = self.write();
            if state.status.is_closed() {
                false
            } else {
                state.transition(self.table(), SyncState::Closed);
                state.collection.clear();
                state.status.stale = false;
                true
            }
        };
        if closed_now {
            self.bump();
        }
        if let Some(task) = lock(&self.driver).take() {
            task.abort();
        }
        if let Some(handle) = lock(&self.subscription).take() {
            store.unsubscribe(&handle);
        }
        closed_now
    }
}

/// Fold events from the stream until it ends, then resubscribe.
async fn drive<S: RemoteStore + 'static>(
    store: Arc<S>,
    session: Arc<Session>,
    mut events: mpsc::Receiver<ChangeEvent>,
    config: SyncConfig,
) {
    loop {
        while let Some(event) = events.recv().await {
            if session.apply(event, "remote").is_none() {
                return;
            }
        }
        if session.is_closed() {
            return;
        }

        tracing::warn!(
            "Subscription for {} dropped, keeping stale collection",
            session.table()
        );
        session.set_stale(true);

        match resubscribe(store.as_ref(), &session, &config).await {
            Some(next) => events = next,
            None => return,
        }
    }
}

async fn resubscribe<S: RemoteStore>(
    store: &S,
    session: &Session,
    config: &SyncConfig,
) -> Option<mpsc::Receiver<ChangeEvent>> {
    let table = session.table();
    let mut attempts = 0;

    while config.reconnect.allows(attempts) {
        tokio::time::sleep(config.reconnect.delay_for(attempts)).await;
        if session.is_closed() {
            return None;
        }
        attempts += 1;
        session.record_reconnect_attempt(attempts);

        let (sink, events) = mpsc::channel(config.channel_capacity());
        match store.subscribe(table, &session.query.filter, sink).await {
            Ok(handle) => {
                if !session.attach_subscription(store, handle) {
                    return None;
                }
                tracing::info!("Resubscribed to {} after {} attempt(s)", table, attempts);

                if config.resync_on_reconnect {
                    match store.bulk_read(&session.query).await {
                        Ok(rows) => {
                            session.reconcile(rows);
                        }
                        Err(e) => {
                            tracing::warn!("Resync of {} failed, collection stays stale: {}", table, e);
                        }
                    }
                } else {
                    session.set_stale(false);
                }
                return Some(events);
            }
            Err(e) => {
                tracing::warn!(
                    "Resubscription to {} failed (attempt {}): {}",
                    table,
                    attempts,
                    e
                );
            }
        }
    }

    tracing::warn!(
        "Giving up on {} after {} attempts, collection stays stale",
        table,
        attempts
    );
    None
}

/// Keeps one collection consistent with a filtered slice of a remote table.
///
/// The owner scope is part of the `Query` passed to `activate`; nothing is
/// read from ambient state, so instances for different users can run side by
/// side against one store.
pub struct RemoteCollectionSync<S: RemoteStore + 'static> {
    store: Arc<S>,
    config: SyncConfig,
    /// Serializes activations
    activation: tokio::sync::Mutex<()>,
    current: Mutex<Option<Arc<Session>>>,
}

impl<S: RemoteStore + 'static> RemoteCollectionSync<S> {
    /// Create a sync instance over a shared store.
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            activation: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn current(&self) -> Option<Arc<Session>> {
        lock(&self.current).clone()
    }

    /// Start mirroring `query`.
    ///
    /// Opens the change stream, performs the bulk read and returns a handle
    /// to the live collection. Activating the query that is already live
    /// returns the existing collection without opening another stream.
    /// Activating a different query (for instance, another user) closes the
    /// current collection first.
    ///
    /// # Errors
    ///
    /// `SyncError::Load` if the stream or the bulk read fails (after the
    /// configured retries); the collection is then closed and empty.
    /// `SyncError::Closed` if `deactivate` ran while the load was in flight.
    pub async fn activate(&self, query: Query) -> SyncResult<CollectionHandle> {
        let _activation = self.activation.lock().await;

        if let Some(existing) = self.current() {
            if existing.query == query && !existing.is_closed() {
                tracing::debug!("{} already active, reusing collection", query.table);
                return Ok(existing.handle());
            }
            if existing.shutdown(self.store.as_ref()) {
                tracing::info!(
                    "Scope changed for {} ({} -> {}), closed previous collection",
                    existing.table(),
                    existing.query.filter,
                    query.filter
                );
            }
        }

        let session = Arc::new(Session::new(query));
        session.begin_load();
        *lock(&self.current) = Some(Arc::clone(&session));

        let (sink, events) = mpsc::channel(self.config.channel_capacity());
        let subscribed = self
            .store
            .subscribe(session.table(), &session.query.filter, sink)
            .await;
        let handle = match subscribed {
            Ok(handle) => handle,
            Err(err) => return Err(self.abort_load(&session, err)),
        };
        if !session.attach_subscription(self.store.as_ref(), handle) {
            return Err(SyncError::Closed);
        }

        let rows = match self.load_rows(&session).await {
            Ok(rows) => rows,
            Err(err) => return Err(self.abort_load(&session, err)),
        };
        let len = session.finish_load(rows)?;
        tracing::info!(
            "{} live with {} records ({})",
            session.table(),
            len,
            session.query.filter
        );

        let driver = tokio::spawn(drive(
            Arc::clone(&self.store),
            Arc::clone(&session),
            events,
            self.config.clone(),
        ));
        session.attach_driver(driver);

        Ok(session.handle())
    }

    async fn load_rows(&self, session: &Session) -> Result<Vec<Record>, StoreError> {
        let mut retries = 0;
        loop {
            match self.store.bulk_read(&session.query).await {
                Ok(rows) => return Ok(rows),
                Err(err) if retries < self.config.load_retries && !session.is_closed() => {
                    tracing::warn!(
                        "Bulk read of {} failed, retrying ({}/{}): {}",
                        session.table(),
                        retries + 1,
                        self.config.load_retries,
                        err
                    );
                    session.retry_load(&err);
                    tokio::time::sleep(self.config.reconnect.delay_for(retries)).await;
                    retries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn abort_load(&self, session: &Session, err: StoreError) -> SyncError {
        if session.is_closed() {
            return SyncError::Closed;
        }
        tracing::warn!("Failed to load {}: {}", session.table(), err);
        session.fail_load(&err);
        session.shutdown(self.store.as_ref());
        SyncError::Load(err)
    }

    /// Write through to the store and patch the live collection.
    ///
    /// The collection is patched with the row the store returns; when the
    /// change event for the same write arrives it is recognised by id and
    /// version and folds in as a no-op.
    ///
    /// # Errors
    ///
    /// `SyncError::NotActive` if no collection is live, `SyncError::Mutation`
    /// if the store rejects the write. The collection is unchanged on error.
    pub async fn mutate(&self, mutation: Mutation) -> SyncResult<Mutated> {
        let session = self
            .current()
            .filter(|session| session.is_live())
            .ok_or(SyncError::NotActive)?;
        let table = session.table();

        let result = match mutation {
            Mutation::Insert { owner, fields } => {
                let owner = owner.or_else(|| session.query.filter.pinned_owner().cloned());
                self.store
                    .insert(table, owner.as_ref(), fields)
                    .await
                    .map(|record| {
                        session.apply(ChangeEvent::Insert(record.clone()), "local");
                        Mutated::Written(record)
                    })
            }
            Mutation::Update { id, fields } => {
                self.store.update(table, &id, fields).await.map(|record| {
                    session.apply(ChangeEvent::Update(record.clone()), "local");
                    Mutated::Written(record)
                })
            }
            Mutation::Increment { id, field, by } => self
                .store
                .increment(table, &id, &field, by)
                .await
                .map(|record| {
                    session.apply(ChangeEvent::Update(record.clone()), "local");
                    Mutated::Written(record)
                }),
            Mutation::Delete(id) => self.store.delete(table, &id).await.map(|()| {
                session.apply(ChangeEvent::Delete(id.clone()), "local");
                Mutated::Deleted(id)
            }),
        };

        result.map_err(|err| {
            tracing::warn!("Write to {} failed: {}", table, err);
            SyncError::Mutation(err)
        })
    }

    /// Close the stream and discard the collection.
    ///
    /// Idempotent. Once this returns, the collection is never modified again,
    /// whatever events were in flight.
    pub fn deactivate(&self) {
        if let Some(session) = self.current() {
            if session.shutdown(self.store.as_ref()) {
                tracing::info!("Deactivated {} ({})", session.table(), session.query.filter);
            }
        }
    }

    /// Handle to the current collection, if one was activated.
    pub fn collection(&self) -> Option<CollectionHandle> {
        self.current().map(|session| session.handle())
    }

    /// Lifecycle state of the current collection.
    pub fn state(&self) -> SyncState {
        self.current()
            .map_or(SyncState::Uninitialized, |session| session.read().status.state)
    }

    /// Status of the current collection.
    pub fn status(&self) -> SyncStatus {
        self.current()
            .map(|session| session.read().status.clone())
            .unwrap_or_default()
    }

    /// Check whether a bulk read is in flight.
    pub fn is_loading(&self) -> bool {
        self.state() == SyncState::Loading
    }
}

impl<S: RemoteStore + 'static> Drop for RemoteCollectionSync<S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Observable view of a mirrored collection.
///
/// Reads take the collection's lock, so a reader never sees an event half
/// applied. Clones share the same collection.
#[derive(Clone)]
pub struct CollectionHandle {
    session: Arc<Session>,
    changes: watch::Receiver<u64>,
}

impl CollectionHandle {
    /// The query this collection mirrors.
    pub fn query(&self) -> &Query {
        &self.session.query
    }

    /// Run `f` against a consistent view of the collection.
    pub fn read<R>(&self, f: impl FnOnce(&Collection) -> R) -> R {
        f(&self.session.read().collection)
    }

    /// Copy of the records, in collection order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.read(|collection| collection.records().to_vec())
    }

    /// Identifiers in collection order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.read(|collection| collection.iter().map(|r| r.id.clone()).collect())
    }

    /// Copy of one record.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.read(|collection| collection.get(id).cloned())
    }

    /// Whether a record with this id is mirrored.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.read(|collection| collection.contains(id))
    }

    /// Number of mirrored records.
    pub fn len(&self) -> usize {
        self.read(Collection::len)
    }

    /// Whether the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.read(Collection::is_empty)
    }

    /// Records converted to a typed entity.
    pub fn typed<E: Entity>(&self) -> Result<Vec<E>, SchemaError> {
        self.read(|collection| decode_all(collection.records()))
    }

    /// Sync status.
    pub fn status(&self) -> SyncStatus {
        self.session.read().status.clone()
    }

    /// Lifecycle state.
    pub fn state(&self) -> SyncState {
        self.session.read().status.state
    }

    /// Check whether the bulk read is in flight.
    pub fn is_loading(&self) -> bool {
        self.state() == SyncState::Loading
    }

    /// Whether the stream dropped and the contents may be out of date.
    pub fn is_stale(&self) -> bool {
        self.session.read().status.stale
    }

    /// Change counter, bumped on every visible change.
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Wait for the next visible change and return the new revision.
    pub async fn changed(&mut self) -> u64 {
        // The sender lives in the session this handle keeps alive.
        let _ = self.changes.changed().await;
        *self.changes.borrow_and_update()
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("table", &self.session.query.table)
            .field("filter", &self.session.query.filter)
            .field("revision", &self.revision())
            .finish()
    }
}
