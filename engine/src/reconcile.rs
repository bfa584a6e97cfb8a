//! Optimistic update reconciliation.
//!
//! The reconciler owns one visible list of items and applies speculative
//! mutations to it before the network confirms them.
//!
//! # Algorithm
//!
//! 1. Wait for any in-flight operation on the same item to settle
//! 2. Snapshot the list, apply the speculative mutation, record a ledger entry
//! 3. Show the success notification
//! 4. Await the caller's network future
//! 5. On success drop the ledger entry (creates swap in the server item)
//! 6. On failure undo through the ledger entry, show the error notification
//!    and hand the caller's error back unchanged
//!
//! Nothing is retried. Operations on different items run concurrently; the
//! list lock is never held across an `.await`.

use crate::{
    item::position_of, Error, Item, ItemId, Ledger, Messages, Notification, Notifier,
    PendingUpdate, UpdateId, UpdateKind,
};
use futures::lock::{Mutex as AsyncMutex, OwnedMutexGuard};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ItemQueues = HashMap<ItemId, Arc<AsyncMutex<()>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Visible list plus the ledger of speculative mutations applied to it.
#[derive(Debug, Default)]
struct State {
    items: Vec<Item>,
    ledger: Ledger,
}

/// Exclusive turn on one item. Releasing the last turn forgets the queue.
struct ItemTurn {
    id: ItemId,
    queue: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    queues: Arc<Mutex<ItemQueues>>,
}

impl Drop for ItemTurn {
    fn drop(&mut self) {
        self.guard.take();
        let mut queues = lock(&self.queues);
        // One reference in the map and one here means nobody is waiting.
        if Arc::strong_count(&self.queue) == 2 {
            queues.remove(&self.id);
        }
    }
}

/// Applies optimistic mutations to one list and reconciles them with the
/// outcome of the matching network calls.
///
/// Cloning shares the same list and ledger.
#[derive(Clone)]
pub struct Reconciler {
    state: Arc<Mutex<State>>,
    queues: Arc<Mutex<ItemQueues>>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler with an empty list.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_ledger(Vec::new(), Ledger::new(), notifier)
    }

    /// Create a reconciler holding `items`.
    pub fn with_items(items: Vec<Item>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_ledger(items, Ledger::new(), notifier)
    }

    /// Create a reconciler with a preconfigured ledger (e.g. a fixed clock).
    pub fn with_ledger(items: Vec<Item>, ledger: Ledger, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State { items, ledger })),
            queues: Arc::new(Mutex::new(HashMap::new())),
            notifier,
        }
    }

    /// Snapshot of the visible list.
    pub fn items(&self) -> Vec<Item> {
        lock(&self.state).items.clone()
    }

    /// Snapshot of one item.
    pub fn item(&self, id: &str) -> Option<Item> {
        lock(&self.state)
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Number of visible items.
    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).items.is_empty()
    }

    /// Number of speculative mutations awaiting their network call.
    pub fn pending_count(&self) -> usize {
        lock(&self.state).ledger.len()
    }

    /// Ids of pending updates in creation order.
    pub fn pending_ids(&self) -> Vec<UpdateId> {
        lock(&self.state).ledger.ids()
    }

    /// Load a fresh list from the server.
    ///
    /// Refused while updates are pending, since their snapshots would no
    /// longer describe the list.
    pub fn replace_items(&self, items: Vec<Item>) -> crate::error::Result<()> {
        let mut state = lock(&self.state);
        if !state.ledger.is_empty() {
            return Err(Error::PendingUpdates(state.ledger.len()));
        }
        state.items = items;
        Ok(())
    }

    /// Drop the list and every pending update (logout, view teardown).
    ///
    /// Network calls still in flight settle without touching the list.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.items.clear();
        state.ledger.clear();
    }

    /// Undo a pending update by hand. An update can be unwound only once.
    pub fn rollback(&self, update_id: &str) -> crate::error::Result<()> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let restored = state.ledger.rollback(update_id, &state.items)?;
        state.items = restored;
        Ok(())
    }

    async fn enter(&self, id: &str) -> ItemTurn {
        let queue = {
            let mut queues = lock(&self.queues);
            queues
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = queue.clone().lock_owned().await;
        ItemTurn {
            id: id.to_string(),
            queue,
            guard: Some(guard),
            queues: self.queues.clone(),
        }
    }

    fn record(
        state: &mut State,
        kind: UpdateKind,
        item_id: Option<ItemId>,
        original_data: Vec<Item>,
        optimistic_data: Value,
        rollback: crate::RollbackFn,
    ) -> UpdateId {
        let update_id = state.ledger.next_update_id();
        let created_at = state.ledger.now();
        state.ledger.insert(PendingUpdate::new(
            update_id.clone(),
            kind,
            item_id,
            original_data,
            optimistic_data,
            created_at,
            rollback,
        ));
        update_id
    }

    fn confirm(&self, update_id: &str) {
        lock(&self.state).ledger.remove(update_id);
    }

    fn unwind(&self, update_id: &str, messages: &Messages) {
        {
            let mut state = lock(&self.state);
            // Missing after clear(); the list has already been dropped.
            if let Some(update) = state.ledger.remove(update_id) {
                let restored = update.restore(&state.items);
                state.items = restored;
            }
        }
        self.notifier.notify(Notification::error(messages.error.clone()));
    }

    /// Apply `apply` to the list now and keep it if `request` succeeds.
    ///
    /// On failure `rollback(current, original)` computes the restored list
    /// from the list at that time and the snapshot taken before `apply` ran.
    /// Updates naming an `item_id` wait for other operations on that item.
    pub async fn optimistic_update<T, E, A, R, Fut>(
        &self,
        item_id: Option<&str>,
        apply: A,
        optimistic_data: Value,
        rollback: R,
        request: Fut,
        messages: &Messages,
    ) -> Result<T, E>
    where
        A: FnOnce(&mut Vec<Item>),
        R: Fn(&[Item], &[Item]) -> Vec<Item> + Send + 'static,
        Fut: Future<Output = Result<T, E>>,
    {
        let _turn = match item_id {
            Some(id) => Some(self.enter(id).await),
            None => None,
        };

        let update_id = {
            let mut state = lock(&self.state);
            let original = state.items.clone();
            apply(&mut state.items);
            Self::record(
                &mut state,
                UpdateKind::Update,
                item_id.map(String::from),
                original,
                optimistic_data,
                Box::new(rollback),
            )
        };
        self.notifier
            .notify(Notification::success(messages.success.clone()));

        match request.await {
            Ok(value) => {
                self.confirm(&update_id);
                Ok(value)
            }
            Err(err) => {
                self.unwind(&update_id, messages);
                Err(err)
            }
        }
    }

    /// Merge `patch` into one item now and keep it if `request` succeeds.
    ///
    /// The item is looked up once its turn comes, so an item deleted by an
    /// earlier operation fails with [`Error::ItemNotFound`] before anything
    /// is applied or sent. On failure only this item is put back; changes
    /// made to other items meanwhile are kept.
    pub async fn optimistic_patch<T, E, Fut>(
        &self,
        item_id: &str,
        patch: Map<String, Value>,
        request: Fut,
        messages: &Messages,
    ) -> Result<T, E>
    where
        E: From<Error>,
        Fut: Future<Output = Result<T, E>>,
    {
        let _turn = self.enter(item_id).await;

        let update_id = {
            let mut state = lock(&self.state);
            let index = position_of(&state.items, item_id)
                .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

            let original = state.items.clone();
            let previous = state.items[index].clone();
            state.items[index].fields.extend(patch.clone());

            Self::record(
                &mut state,
                UpdateKind::Update,
                Some(item_id.to_string()),
                original,
                Value::Object(patch),
                Box::new(move |current: &[Item], _original: &[Item]| {
                    current
                        .iter()
                        .map(|item| {
                            if item.id == previous.id {
                                previous.clone()
                            } else {
                                item.clone()
                            }
                        })
                        .collect()
                }),
            )
        };
        self.notifier
            .notify(Notification::success(messages.success.clone()));

        match request.await {
            Ok(value) => {
                self.confirm(&update_id);
                Ok(value)
            }
            Err(err) => {
                self.unwind(&update_id, messages);
                Err(err)
            }
        }
    }

    /// Show `fields` under a temporary id until `request` returns the stored item.
    ///
    /// The server item replaces the temporary one in place. If an item with
    /// the server id is already listed, the temporary one is dropped instead.
    pub async fn optimistic_create<E, Fut>(
        &self,
        fields: Map<String, Value>,
        request: Fut,
        messages: &Messages,
    ) -> Result<Item, E>
    where
        Fut: Future<Output = Result<Item, E>>,
    {
        let (update_id, temp_id) = {
            let mut state = lock(&self.state);
            let temp_id = state.ledger.next_temp_id();
            let mut item = Item::new(temp_id.clone(), fields);
            item.is_optimistic = true;

            let original = state.items.clone();
            let optimistic_data = item.to_value();
            state.items.push(item);

            let remove_id = temp_id.clone();
            let update_id = Self::record(
                &mut state,
                UpdateKind::Create,
                Some(temp_id.clone()),
                original,
                optimistic_data,
                Box::new(move |current: &[Item], _original: &[Item]| {
                    current
                        .iter()
                        .filter(|item| item.id != remove_id)
                        .cloned()
                        .collect()
                }),
            );
            (update_id, temp_id)
        };
        self.notifier
            .notify(Notification::success(messages.success.clone()));

        match request.await {
            Ok(mut created) => {
                created.is_optimistic = false;
                let mut state = lock(&self.state);
                if state.ledger.remove(&update_id).is_some() {
                    let already_listed = position_of(&state.items, &created.id).is_some();
                    match position_of(&state.items, &temp_id) {
                        Some(pos) if already_listed => {
                            state.items.remove(pos);
                        }
                        Some(pos) => state.items[pos] = created.clone(),
                        None => {}
                    }
                }
                Ok(created)
            }
            Err(err) => {
                self.unwind(&update_id, messages);
                Err(err)
            }
        }
    }

    /// Remove the item now and put it back at its original index if
    /// `request` fails.
    pub async fn optimistic_delete<T, E, Fut>(
        &self,
        item_id: &str,
        request: Fut,
        messages: &Messages,
    ) -> Result<T, E>
    where
        E: From<Error>,
        Fut: Future<Output = Result<T, E>>,
    {
        let _turn = self.enter(item_id).await;

        let update_id = {
            let mut state = lock(&self.state);
            let index = position_of(&state.items, item_id)
                .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

            let original = state.items.clone();
            let captured = state.items.remove(index);
            let optimistic_data = json!({ "id": item_id, "index": index });

            Self::record(
                &mut state,
                UpdateKind::Delete,
                Some(item_id.to_string()),
                original,
                optimistic_data,
                Box::new(move |current: &[Item], _original: &[Item]| {
                    let mut restored = current.to_vec();
                    if position_of(&restored, &captured.id).is_none() {
                        let at = index.min(restored.len());
                        restored.insert(at, captured.clone());
                    }
                    restored
                }),
            )
        };
        self.notifier
            .notify(Notification::success(messages.success.clone()));

        match request.await {
            Ok(value) => {
                self.confirm(&update_id);
                Ok(value)
            }
            Err(err) => {
                self.unwind(&update_id, messages);
                Err(err)
            }
        }
    }

    /// Count a vote for `candidate_id` now and take it back if `request` fails.
    ///
    /// On success only the in-flight flag is cleared; the increment and the
    /// voted marker stay.
    pub async fn optimistic_vote<T, E, Fut>(
        &self,
        candidate_id: &str,
        voter_id: &str,
        request: Fut,
        messages: &Messages,
    ) -> Result<T, E>
    where
        E: From<Error>,
        Fut: Future<Output = Result<T, E>>,
    {
        let _turn = self.enter(candidate_id).await;

        let update_id = {
            let mut state = lock(&self.state);
            let index = position_of(&state.items, candidate_id)
                .ok_or_else(|| Error::ItemNotFound(candidate_id.to_string()))?;

            let original = state.items.clone();
            let item = &mut state.items[index];
            let count = item.vote_count().saturating_add(1);
            item.set_vote_count(count);
            item.has_voted = true;
            item.is_optimistic_vote = true;

            let optimistic_data = json!({
                "candidateId": candidate_id,
                "voterId": voter_id,
                "voteCount": count,
            });
            let target = candidate_id.to_string();

            Self::record(
                &mut state,
                UpdateKind::Vote,
                Some(candidate_id.to_string()),
                original,
                optimistic_data,
                Box::new(move |current: &[Item], _original: &[Item]| {
                    current
                        .iter()
                        .cloned()
                        .map(|mut item| {
                            if item.id == target {
                                item.set_vote_count(item.vote_count().saturating_sub(1));
                                item.has_voted = false;
                                item.is_optimistic_vote = false;
                            }
                            item
                        })
                        .collect()
                }),
            )
        };
        self.notifier
            .notify(Notification::success(messages.success.clone()));

        match request.await {
            Ok(value) => {
                let mut state = lock(&self.state);
                if state.ledger.remove(&update_id).is_some() {
                    if let Some(item) = state.items.iter_mut().find(|i| i.id == candidate_id) {
                        item.is_optimistic_vote = false;
                    }
                }
                Ok(value)
            }
            Err(err) => {
                self.unwind(&update_id, messages);
                Err(err)
            }
        }
    }
}
