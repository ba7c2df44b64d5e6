//! Transaction lifecycle tracking.
//!
//! Every broadcast transaction gets one record that moves
//! `Submitted -> Pending -> {Confirmed, Failed}`. Subscribers receive the
//! record's history in order followed by live transitions; after the
//! terminal event a subscription closes, so no subscriber ever sees a
//! terminal event twice.
//!
//! A single poll task per transaction drives the record. It runs only while
//! someone is subscribed: the last [`Subscription`] to drop aborts it, and a
//! later [`Tracker::subscribe`] starts a fresh one. The deadline always counts
//! from the original submission.

use crate::{
    Error,
    model::Intent,
    rpc::{
        BlockNumberOrTag,
        ChainClient,
        Log,
        TransactionRequest,
        Transport,
        TxHash,
    },
};
use futures::Stream;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    pin::Pin,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    task::{
        Context,
        Poll,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    /// Measured from submission.
    pub max_wait: Duration,
    /// Blocks on top of (and including) the inclusion block.
    pub confirmations: u64,
    /// Terminal records kept for late subscribers.
    pub terminal_cache: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(120),
            confirmations: 1,
            terminal_cache: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub block_number: u64,
    pub logs: Vec<Log>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Reverted { reason: Option<String> },
    /// Seen by the node, then gone without a receipt.
    Dropped,
    /// Still unresolved at the deadline; the outcome is unknown.
    Timeout { waited: Duration },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    Submitted,
    Pending,
    Confirmed(ConfirmedTx),
    Failed(FailureReason),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed(_) | TxState::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            TxState::Submitted => "submitted",
            TxState::Pending => "pending",
            TxState::Confirmed(_) => "confirmed",
            TxState::Failed(FailureReason::Reverted { .. }) => "reverted",
            TxState::Failed(FailureReason::Dropped) => "dropped",
            TxState::Failed(FailureReason::Timeout { .. }) => "timed out",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxEvent {
    pub hash: TxHash,
    pub intent: Intent,
    pub state: TxState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(ConfirmedTx),
    Failed(FailureReason),
    /// Tracking stopped (tracker shut down) before a terminal state.
    Abandoned { waited: Duration },
}

impl TxOutcome {
    pub fn into_result(self, hash: TxHash) -> Result<ConfirmedTx, Error> {
        match self {
            TxOutcome::Confirmed(confirmed) => Ok(confirmed),
            TxOutcome::Failed(FailureReason::Reverted { reason }) => {
                Err(crate::ContractError::Reverted { reason }.into())
            }
            TxOutcome::Failed(FailureReason::Dropped) => Err(Error::Network(format!(
                "transaction {hash} was dropped before inclusion"
            ))),
            TxOutcome::Failed(FailureReason::Timeout { waited })
            | TxOutcome::Abandoned { waited } => Err(Error::Timeout { hash, waited }),
        }
    }
}

struct Entry {
    intent: Intent,
    call: Option<TransactionRequest>,
    submitted_at: Instant,
    history: Vec<TxState>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<TxEvent>)>,
    poller: Option<JoinHandle<()>>,
}

static SUBMITTED: TxState = TxState::Submitted;

impl Entry {
    fn current(&self) -> &TxState {
        self.history.last().unwrap_or(&SUBMITTED)
    }

    fn is_terminal(&self) -> bool {
        self.current().is_terminal()
    }

    fn seen_pending(&self) -> bool {
        self.history.contains(&TxState::Pending)
    }
}

struct Records {
    entries: HashMap<TxHash, Entry>,
    terminal: VecDeque<TxHash>,
}

impl Records {
    /// Queues a record that just turned terminal, evicting the oldest past
    /// `cache`.
    fn retire(&mut self, hash: TxHash, cache: usize) {
        self.terminal.push_back(hash);
        while self.terminal.len() > cache {
            if let Some(evicted) = self.terminal.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    /// Times out records nobody follows once their deadline has passed, so
    /// they fall under the same bound as settled ones. A record that is
    /// followed again before its deadline is left alone.
    fn expire_idle(&mut self, now: Instant, config: &TrackerConfig) {
        let expired: Vec<TxHash> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.poller.is_none()
                    && entry.subscribers.is_empty()
                    && !entry.is_terminal()
                    && now >= entry.submitted_at + config.max_wait
            })
            .map(|(hash, _)| *hash)
            .collect();
        for hash in expired {
            if let Some(entry) = self.entries.get_mut(&hash) {
                let waited = now.duration_since(entry.submitted_at);
                debug!(%hash, intent = %entry.intent, ?waited, "unfollowed transaction expired");
                entry
                    .history
                    .push(TxState::Failed(FailureReason::Timeout { waited }));
            }
            self.retire(hash, config.terminal_cache);
        }
    }
}

struct Shared<T> {
    client: ChainClient<T>,
    config: TrackerConfig,
    records: Mutex<Records>,
    next_subscriber: AtomicU64,
}

trait Detach: Send + Sync {
    fn detach(&self, hash: &TxHash, subscriber: u64);
}

pub struct Tracker<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Tracker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> Tracker<T> {
    pub fn new(client: ChainClient<T>, config: TrackerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                config,
                records: Mutex::new(Records {
                    entries: HashMap::new(),
                    terminal: VecDeque::new(),
                }),
                next_subscriber: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    /// Starts tracking a freshly broadcast transaction. `call` is the
    /// original request, replayed to recover a revert reason. Tracking a
    /// hash that is already known just subscribes to it.
    pub fn track(&self, hash: TxHash, intent: Intent, call: Option<TransactionRequest>) -> Subscription {
        let mut records = self.shared.lock();
        records.expire_idle(Instant::now(), &self.shared.config);
        let entry = records.entries.entry(hash).or_insert_with(|| {
            debug!(%hash, %intent, "transaction submitted");
            Entry {
                intent,
                call,
                submitted_at: Instant::now(),
                history: vec![TxState::Submitted],
                subscribers: Vec::new(),
                poller: None,
            }
        });
        Shared::attach(&self.shared, hash, entry)
    }

    /// Subscribes to a tracked transaction. The full history is replayed
    /// first. Unknown or evicted hashes yield `None`.
    pub fn subscribe(&self, hash: TxHash) -> Option<Subscription> {
        let mut records = self.shared.lock();
        let entry = records.entries.get_mut(&hash)?;
        Some(Shared::attach(&self.shared, hash, entry))
    }

    pub fn state(&self, hash: TxHash) -> Option<TxState> {
        let records = self.shared.lock();
        records.entries.get(&hash).map(|entry| entry.current().clone())
    }

    pub fn is_polling(&self, hash: TxHash) -> bool {
        let records = self.shared.lock();
        records
            .entries
            .get(&hash)
            .is_some_and(|entry| entry.poller.is_some())
    }

    /// Stops every poll task and closes every subscription. Transactions
    /// already broadcast are unaffected.
    pub fn shutdown(&self) {
        let mut records = self.shared.lock();
        for (hash, entry) in records.entries.iter_mut() {
            if let Some(poller) = entry.poller.take() {
                debug!(%hash, "tracker shutting down, polling stopped");
                poller.abort();
            }
            entry.subscribers.clear();
        }
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Shared<T> {
    fn attach(this: &Arc<Self>, hash: TxHash, entry: &mut Entry) -> Subscription {
        let id = this.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        for state in &entry.history {
            // the receiver is alive in this scope
            let _ = sender.send(TxEvent {
                hash,
                intent: entry.intent.clone(),
                state: state.clone(),
            });
        }
        if !entry.is_terminal() {
            entry.subscribers.push((id, sender));
            if entry.poller.is_none() {
                entry.poller = Some(tokio::spawn(poll(this.clone(), hash)));
            }
        }
        let owner: Weak<dyn Detach> = Arc::downgrade(this) as Weak<dyn Detach>;
        Subscription {
            hash,
            intent: entry.intent.clone(),
            id,
            submitted_at: entry.submitted_at,
            events: receiver,
            owner,
        }
    }

    fn deadline(&self, hash: &TxHash) -> Option<(Instant, Instant)> {
        let records = self.lock();
        let entry = records.entries.get(hash)?;
        (!entry.is_terminal())
            .then(|| (entry.submitted_at, entry.submitted_at + self.config.max_wait))
    }

    fn polling_context(&self, hash: &TxHash) -> Option<(bool, Option<TransactionRequest>)> {
        let records = self.lock();
        let entry = records.entries.get(hash)?;
        Some((entry.seen_pending(), entry.call.clone()))
    }

    /// Applies `state` unless it repeats the current one or the record is
    /// already terminal. Returns whether polling should continue.
    fn transition(&self, hash: TxHash, state: TxState) -> bool {
        let mut records = self.lock();
        let Some(entry) = records.entries.get_mut(&hash) else {
            return false;
        };
        if entry.is_terminal() {
            return false;
        }
        if *entry.current() == state {
            return true;
        }
        match &state {
            TxState::Failed(FailureReason::Timeout { waited }) => {
                warn!(%hash, intent = %entry.intent, ?waited, "transaction outcome unknown")
            }
            TxState::Failed(FailureReason::Dropped) => {
                warn!(%hash, intent = %entry.intent, "transaction dropped")
            }
            other => debug!(
                %hash,
                intent = %entry.intent,
                state = other.label(),
                "transaction state change"
            ),
        }
        let event = TxEvent {
            hash,
            intent: entry.intent.clone(),
            state: state.clone(),
        };
        entry.history.push(state);
        entry
            .subscribers
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());

        if !entry.is_terminal() {
            return true;
        }
        // dropping the senders closes every subscription after this event
        entry.subscribers.clear();
        entry.poller = None;
        records.retire(hash, self.config.terminal_cache);
        false
    }

    async fn observe(&self, hash: TxHash) -> Result<Vec<TxState>, Error> {
        let Some((seen_pending, call)) = self.polling_context(&hash) else {
            return Ok(Vec::new());
        };
        let Some(receipt) = self.client.transaction_receipt(hash).await? else {
            return match self.client.transaction_by_hash(hash).await? {
                Some(_) => Ok(vec![TxState::Pending]),
                None if seen_pending => Ok(vec![TxState::Failed(FailureReason::Dropped)]),
                None => Ok(Vec::new()),
            };
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(vec![TxState::Pending]);
        };
        if !receipt.inner.status() {
            let reason = match call {
                Some(call) => self.revert_reason(&call, block_number).await,
                None => None,
            };
            return Ok(vec![
                TxState::Pending,
                TxState::Failed(FailureReason::Reverted { reason }),
            ]);
        }
        let head = self.client.block_number().await?;
        let confirmations = head.saturating_sub(block_number) + 1;
        if confirmations < self.config.confirmations {
            return Ok(vec![TxState::Pending]);
        }
        Ok(vec![
            TxState::Pending,
            TxState::Confirmed(ConfirmedTx {
                block_number,
                logs: receipt.inner.logs().to_vec(),
            }),
        ])
    }

    async fn revert_reason(&self, call: &TransactionRequest, block: u64) -> Option<String> {
        match self.client.read_call_at(call, BlockNumberOrTag::Number(block)).await {
            Err(Error::Contract(crate::ContractError::Reverted { reason })) => reason,
            Ok(_) => None,
            Err(err) => {
                debug!(%err, "could not replay reverted call");
                None
            }
        }
    }
}

impl<T: Transport> Detach for Shared<T> {
    fn detach(&self, hash: &TxHash, subscriber: u64) {
        let mut records = self.lock();
        let Some(entry) = records.entries.get_mut(hash) else {
            return;
        };
        entry.subscribers.retain(|(id, _)| *id != subscriber);
        if entry.subscribers.is_empty() {
            if let Some(poller) = entry.poller.take() {
                debug!(%hash, "last subscriber detached, polling stopped");
                poller.abort();
            }
        }
        records.expire_idle(Instant::now(), &self.config);
    }
}

async fn poll<T: Transport>(shared: Arc<Shared<T>>, hash: TxHash) {
    let mut ticker = time::interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let Some((submitted_at, deadline)) = shared.deadline(&hash) else {
            return;
        };
        tokio::select! {
            _ = ticker.tick() => {}
            _ = time::sleep_until(deadline) => {
                let waited = Instant::now().duration_since(submitted_at);
                shared.transition(hash, TxState::Failed(FailureReason::Timeout { waited }));
                return;
            }
        }
        match shared.observe(hash).await {
            Ok(states) => {
                for state in states {
                    if !shared.transition(hash, state) {
                        return;
                    }
                }
            }
            Err(err) => warn!(%hash, %err, "polling transaction failed, will retry"),
        }
    }
}

/// Ordered stream of one transaction's lifecycle events. Dropping it
/// unsubscribes.
pub struct Subscription {
    hash: TxHash,
    intent: Intent,
    id: u64,
    submitted_at: Instant,
    events: mpsc::UnboundedReceiver<TxEvent>,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Time since the transaction was first tracked.
    pub fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.submitted_at)
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<TxEvent> {
        self.events.recv().await
    }

    pub async fn outcome(mut self) -> TxOutcome {
        while let Some(event) = self.next().await {
            match event.state {
                TxState::Confirmed(confirmed) => return TxOutcome::Confirmed(confirmed),
                TxState::Failed(reason) => return TxOutcome::Failed(reason),
                TxState::Submitted | TxState::Pending => {}
            }
        }
        TxOutcome::Abandoned {
            waited: self.elapsed(),
        }
    }
}

impl Stream for Subscription {
    type Item = TxEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(&self.hash, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("hash", &self.hash)
            .field("intent", &self.intent)
            .finish_non_exhaustive()
    }
}
