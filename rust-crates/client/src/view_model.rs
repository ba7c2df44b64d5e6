//! Round and card snapshots assembled from contract reads.
//!
//! A snapshot is immutable once built. Refreshing reads the head block number
//! once and pins every read of the snapshot to that block, then swaps the
//! `Arc` under a short write lock, so a reader holds either the old snapshot
//! or the new one, never a mix of blocks. Overlapping refreshes may finish
//! out of order: a result read at an older block than the installed
//! snapshot is discarded. Nothing a transaction changes is shown as applied
//! until its confirmation has been reconciled here.

use crate::{
    Error,
    Result,
    connection::ContractAddresses,
    model::{
        Affected,
        Card,
        CardId,
        Intent,
        Round,
        RoundId,
        TxRecord,
    },
    retry::{
        RetryPolicy,
        retry_read,
    },
    rpc::{
        BlockNumberOrTag,
        ChainClient,
        Log,
        Transport,
        TxHash,
        call_request,
    },
    tracker::{
        ConfirmedTx,
        Subscription,
        TxOutcome,
        TxState,
    },
};
use alloy_primitives::Address;
use bingo_abi::{
    Call,
    bingo_game,
    cartela,
    events::{
        self,
        GameEvent,
    },
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        PoisonError,
        RwLock,
    },
};
use tokio::sync::broadcast;
use tracing::{
    debug,
    warn,
};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Sent whenever a snapshot or the pending list changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewUpdate {
    Round(Arc<Round>),
    Card(Arc<Card>),
    Pending,
}

/// Snapshots installed by a reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    Round(Arc<Round>),
    Card(Arc<Card>),
    Both(Arc<Round>, Arc<Card>),
}

/// An installed snapshot and the block all of its reads were pinned to.
struct Pinned<S> {
    snapshot: Arc<S>,
    block: u64,
}

struct Inner<T> {
    client: ChainClient<T>,
    contracts: ContractAddresses,
    retry: RetryPolicy,
    rounds: RwLock<HashMap<RoundId, Pinned<Round>>>,
    cards: RwLock<HashMap<CardId, Pinned<Card>>>,
    pending: Mutex<Vec<TxRecord>>,
    updates: broadcast::Sender<ViewUpdate>,
}

pub struct ViewModel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ViewModel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> ViewModel<T> {
    pub fn new(client: ChainClient<T>, contracts: ContractAddresses, retry: RetryPolicy) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                client,
                contracts,
                retry,
                rounds: RwLock::new(HashMap::new()),
                cards: RwLock::new(HashMap::new()),
                pending: Mutex::new(Vec::new()),
                updates,
            }),
        }
    }

    pub fn round(&self, id: RoundId) -> Option<Arc<Round>> {
        let rounds = self.inner.rounds.read().unwrap_or_else(PoisonError::into_inner);
        rounds.get(&id).map(|pinned| pinned.snapshot.clone())
    }

    pub fn card(&self, id: CardId) -> Option<Arc<Card>> {
        let cards = self.inner.cards.read().unwrap_or_else(PoisonError::into_inner);
        cards.get(&id).map(|pinned| pinned.snapshot.clone())
    }

    pub fn updates(&self) -> broadcast::Receiver<ViewUpdate> {
        self.inner.updates.subscribe()
    }

    /// Writes not yet superseded by a refresh, oldest first.
    pub fn pending(&self) -> Vec<TxRecord> {
        self.lock_pending().clone()
    }

    pub fn add_pending(&self, record: TxRecord) {
        self.lock_pending().push(record);
        self.notify(ViewUpdate::Pending);
    }

    fn set_pending_state(&self, hash: TxHash, state: &TxState) {
        let changed = {
            let mut pending = self.lock_pending();
            match pending.iter_mut().find(|record| record.hash == hash) {
                Some(record) if record.state != *state => {
                    record.state = state.clone();
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.notify(ViewUpdate::Pending);
        }
    }

    fn remove_pending(&self, hash: TxHash) {
        let removed = {
            let mut pending = self.lock_pending();
            let before = pending.len();
            pending.retain(|record| record.hash != hash);
            before != pending.len()
        };
        if removed {
            self.notify(ViewUpdate::Pending);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<TxRecord>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, update: ViewUpdate) {
        // no receivers is fine; nobody is rendering
        let _ = self.inner.updates.send(update);
    }

    pub async fn refresh_round(&self, id: RoundId) -> Result<Arc<Round>> {
        let block = self.head().await?;
        self.refresh_round_at(id, block).await
    }

    async fn refresh_round_at(&self, id: RoundId, block: u64) -> Result<Arc<Round>> {
        let game = self.inner.contracts.bingo_game;
        let round_call = bingo_game::get_round(id.0)?;
        let drawn_call = bingo_game::get_drawn_numbers(id.0)?;
        let participants_call = bingo_game::get_participants(id.0)?;
        let (record, drawn, participants) = futures::try_join!(
            self.read(game, &round_call, block, bingo_game::decode_round),
            self.read(game, &drawn_call, block, bingo_game::decode_drawn_numbers),
            self.read(game, &participants_call, block, bingo_game::decode_participants),
        )?;
        if record.id == 0 {
            return Err(Error::InvalidInput(format!("round {id} does not exist")));
        }
        if record.id != id.0 {
            return Err(Error::Inconsistent(format!(
                "asked for round {id}, contract returned round {}",
                record.id
            )));
        }
        let round = Round::from_records(record, drawn, participants)?;
        check_no_duplicates(&round)?;

        let round = Arc::new(round);
        {
            let mut rounds = self.inner.rounds.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(installed) = rounds.get(&id) {
                if installed.block > block {
                    debug!(round = %id, block, installed = installed.block, "discarding round read at an older block");
                    return Ok(installed.snapshot.clone());
                }
                check_append_only(&installed.snapshot, &round)?;
            }
            rounds.insert(
                id,
                Pinned {
                    snapshot: round.clone(),
                    block,
                },
            );
        }
        debug!(round = %id, block, state = %round.state, drawn = round.drawn_numbers.len(), "round refreshed");
        self.notify(ViewUpdate::Round(round.clone()));
        Ok(round)
    }

    pub async fn refresh_card(&self, id: CardId) -> Result<Arc<Card>> {
        let block = self.head().await?;
        self.refresh_card_at(id, block).await
    }

    async fn refresh_card_at(&self, id: CardId, block: u64) -> Result<Arc<Card>> {
        let contract = self.inner.contracts.cartela;
        let card_call = cartela::get_cartela(id.0)?;
        let numbers_call = cartela::get_cartela_numbers(id.0)?;
        let (record, numbers) = futures::try_join!(
            self.read(contract, &card_call, block, cartela::decode_cartela),
            self.read(contract, &numbers_call, block, cartela::decode_cartela_numbers),
        )?;
        if record.id == 0 {
            return Err(Error::InvalidInput(format!("card {id} does not exist")));
        }
        let card = Card::from_records(record, numbers)?;
        if card.numbers_registered && card.numbers.len() != card.dimensions.cells() {
            return Err(Error::Inconsistent(format!(
                "card {id} is {} but holds {} registered numbers",
                card.dimensions,
                card.numbers.len()
            )));
        }

        let card = Arc::new(card);
        {
            let mut cards = self.inner.cards.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(installed) = cards.get(&id) {
                if installed.block > block {
                    debug!(card = %id, block, installed = installed.block, "discarding card read at an older block");
                    return Ok(installed.snapshot.clone());
                }
                check_registration_unchanged(&installed.snapshot, &card)?;
            }
            cards.insert(
                id,
                Pinned {
                    snapshot: card.clone(),
                    block,
                },
            );
        }
        debug!(card = %id, block, owner = %card.owner, registered = card.numbers_registered, "card refreshed");
        self.notify(ViewUpdate::Card(card.clone()));
        Ok(card)
    }

    /// Block every read of one snapshot is pinned to.
    async fn head(&self) -> Result<u64> {
        let client = &self.inner.client;
        retry_read(&self.inner.retry, "eth_blockNumber", || client.block_number()).await
    }

    async fn read<R>(
        &self,
        contract: Address,
        call: &Call,
        block: u64,
        decode: fn(&[u8]) -> bingo_abi::Result<R>,
    ) -> Result<R> {
        read_decoded(
            &self.inner.client,
            &self.inner.retry,
            contract,
            call,
            BlockNumberOrTag::Number(block),
            decode,
        )
        .await
    }

    /// Waits for the transaction behind `subscription` to settle. A
    /// confirmation triggers exactly one refresh of what the intent touched;
    /// a failure refreshes nothing and comes back as an error. Either way the
    /// pending record is dropped.
    pub async fn reconcile(&self, mut subscription: Subscription) -> Result<Reconciled> {
        let hash = subscription.hash();
        let intent = subscription.intent().clone();
        let mut outcome = None;
        while let Some(event) = subscription.next().await {
            self.set_pending_state(hash, &event.state);
            match event.state {
                TxState::Confirmed(confirmed) => outcome = Some(TxOutcome::Confirmed(confirmed)),
                TxState::Failed(reason) => outcome = Some(TxOutcome::Failed(reason)),
                TxState::Submitted | TxState::Pending => {}
            }
        }
        let outcome = outcome.unwrap_or_else(|| TxOutcome::Abandoned {
            waited: subscription.elapsed(),
        });

        let result = match outcome.into_result(hash) {
            Ok(confirmed) => self.refresh_affected(&intent, &confirmed).await,
            Err(err) => Err(err),
        };
        self.remove_pending(hash);
        result
    }

    async fn refresh_affected(&self, intent: &Intent, confirmed: &ConfirmedTx) -> Result<Reconciled> {
        let contracts = self.inner.contracts;
        match intent.affected() {
            Affected::Round(id) => Ok(Reconciled::Round(self.refresh_round(id).await?)),
            Affected::Card(id) => Ok(Reconciled::Card(self.refresh_card(id).await?)),
            Affected::NewCard => {
                let id = find_event(&confirmed.logs, contracts.cartela, "CartelaCreated", |event| {
                    match event {
                        GameEvent::CartelaCreated { cartela_id, .. } => Some(CardId(cartela_id)),
                        _ => None,
                    }
                })?;
                Ok(Reconciled::Card(self.refresh_card(id).await?))
            }
            Affected::NewRound => {
                let id = find_event(&confirmed.logs, contracts.bingo_game, "RoundStarted", |event| {
                    match event {
                        GameEvent::RoundStarted { round_id, .. } => Some(RoundId(round_id)),
                        _ => None,
                    }
                })?;
                Ok(Reconciled::Round(self.refresh_round(id).await?))
            }
            Affected::RoundAndCard(round, card) => {
                let (round, card) =
                    futures::try_join!(self.refresh_round(round), self.refresh_card(card))?;
                Ok(Reconciled::Both(round, card))
            }
        }
    }
}

/// `eth_call` at `block` with read retries, decoded through the typed
/// binding.
pub(crate) async fn read_decoded<T: Transport, R>(
    client: &ChainClient<T>,
    retry: &RetryPolicy,
    contract: Address,
    call: &Call,
    block: BlockNumberOrTag,
    decode: fn(&[u8]) -> bingo_abi::Result<R>,
) -> Result<R> {
    let request = call_request(contract, call.data.clone());
    let output = retry_read(retry, call.function, || client.read_call_at(&request, block)).await?;
    Ok(decode(&output)?)
}

fn find_event<R>(
    logs: &[Log],
    contract: Address,
    name: &str,
    pick: impl Fn(GameEvent) -> Option<R>,
) -> Result<R> {
    for log in logs.iter().filter(|log| log.inner.address == contract) {
        let topics = log.inner.topics();
        if let Some(found) = events::decode_log(topics, &log.inner.data.data)?.and_then(&pick) {
            return Ok(found);
        }
    }
    Err(Error::Inconsistent(format!(
        "confirmed receipt carries no {name} event"
    )))
}

fn check_no_duplicates(round: &Round) -> Result<()> {
    let mut seen = HashSet::with_capacity(round.drawn_numbers.len());
    match round.drawn_numbers.iter().find(|n| !seen.insert(**n)) {
        Some(duplicate) => {
            warn!(round = %round.id, duplicate, "drawn numbers contain a duplicate");
            Err(Error::Inconsistent(format!(
                "round {} drew {duplicate} twice",
                round.id
            )))
        }
        None => Ok(()),
    }
}

/// Drawn numbers only ever grow at the end.
pub(crate) fn extends(previous: &[u8], next: &[u8]) -> bool {
    next.starts_with(previous)
}

fn check_append_only(previous: &Round, next: &Round) -> Result<()> {
    if extends(&previous.drawn_numbers, &next.drawn_numbers) {
        return Ok(());
    }
    warn!(
        round = %next.id,
        previous = ?previous.drawn_numbers,
        next = ?next.drawn_numbers,
        "drawn numbers regressed, keeping previous snapshot"
    );
    Err(Error::Inconsistent(format!(
        "round {} drawn numbers {:?} do not extend {:?}",
        next.id, next.drawn_numbers, previous.drawn_numbers
    )))
}

fn check_registration_unchanged(previous: &Card, next: &Card) -> Result<()> {
    if !previous.numbers_registered
        || (next.numbers_registered && previous.numbers == next.numbers)
    {
        return Ok(());
    }
    warn!(
        card = %next.id,
        previous = ?previous.numbers,
        next = ?next.numbers,
        "registered card numbers changed, keeping previous snapshot"
    );
    Err(Error::Inconsistent(format!(
        "card {} registered numbers changed",
        next.id
    )))
}
