//! User intents as transactions.
//!
//! Every write goes through one path: validate, encode, broadcast once,
//! hand the hash to the tracker and list it as pending. Nothing here retries
//! a write; resubmitting takes an explicit [`UserConfirmed`].

use crate::{
    Error,
    Result,
    connection::Connection,
    model::{
        CardDimensions,
        CardId,
        Intent,
        Round,
        RoundId,
        StartRoundParams,
        TxRecord,
        validate_card_numbers,
    },
    retry::retry_read,
    rpc::{
        BlockNumberOrTag,
        Filter,
        Transport,
        TxHash,
        call_request,
    },
    tracker::{
        Subscription,
        TxState,
    },
    view_model::{
        Reconciled,
        ViewModel,
        read_decoded,
    },
};
use alloy_primitives::{
    Address,
    B256,
    U256,
};
use bingo_abi::{
    Call,
    bingo_game::{
        self,
        StartRoundArgs,
    },
    cartela,
    events::{
        self,
        GameEvent,
    },
};
use std::sync::Arc;
use tracing::info;

/// The user explicitly agreed to send an intent again after an ambiguous
/// or conflicting first attempt.
#[derive(Debug)]
pub struct UserConfirmed(());

impl UserConfirmed {
    pub fn acknowledged() -> Self {
        UserConfirmed(())
    }
}

/// A broadcast write and its lifecycle events.
#[derive(Debug)]
pub struct PendingAction {
    pub record: TxRecord,
    pub subscription: Subscription,
}

impl PendingAction {
    pub fn hash(&self) -> TxHash {
        self.record.hash
    }

    pub async fn settle<T: Transport>(self, view: &ViewModel<T>) -> Result<Reconciled> {
        view.reconcile(self.subscription).await
    }
}

pub struct GameClient<T> {
    connection: Connection<T>,
}

impl<T> Clone for GameClient<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
        }
    }
}

impl<T: Transport> GameClient<T> {
    pub fn new(connection: Connection<T>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    pub fn view(&self) -> &ViewModel<T> {
        self.connection.view()
    }

    /// Pays the current `cartelaPrice`.
    pub async fn create_card(&self, dimensions: CardDimensions) -> Result<PendingAction> {
        self.dispatch(Intent::CreateCard { dimensions }).await
    }

    pub async fn register_numbers(&self, card: CardId, numbers: Vec<u8>) -> Result<PendingAction> {
        self.dispatch(Intent::RegisterNumbers { card, numbers }).await
    }

    pub async fn transfer_card(&self, card: CardId, to: Address) -> Result<PendingAction> {
        self.dispatch(Intent::TransferCard { card, to }).await
    }

    pub async fn start_round(&self, params: StartRoundParams) -> Result<PendingAction> {
        self.dispatch(Intent::StartRound(params)).await
    }

    pub async fn draw_number(&self, round: RoundId) -> Result<PendingAction> {
        self.dispatch(Intent::DrawNumber { round }).await
    }

    /// Pays the round's entry fee.
    pub async fn join_round(&self, round: RoundId, card: CardId) -> Result<PendingAction> {
        self.dispatch(Intent::JoinRound { round, card }).await
    }

    pub async fn distribute_prizes(&self, round: RoundId) -> Result<PendingAction> {
        self.dispatch(Intent::DistributePrizes { round }).await
    }

    /// Sends `intent` again as a new transaction. Only for after a
    /// `NonceConflict` or `Timeout` the user has looked at.
    pub async fn resubmit(&self, intent: Intent, _confirmed: UserConfirmed) -> Result<PendingAction> {
        info!(%intent, "resubmitting on user confirmation");
        self.dispatch(intent).await
    }

    /// The round `currentRoundId` points at, or `None` before the first one.
    pub async fn current_round(&self) -> Result<Option<Arc<Round>>> {
        let call = bingo_game::current_round_id()?;
        let id = self
            .read(self.connection.contracts().bingo_game, &call, bingo_game::decode_current_round_id)
            .await?;
        if id == 0 {
            return Ok(None);
        }
        self.view().refresh_round(RoundId(id)).await.map(Some)
    }

    /// Game contract events for `round` since `from_block`, in chain order.
    pub async fn round_history(&self, round: RoundId, from_block: u64) -> Result<Vec<GameEvent>> {
        let filter = Filter::new()
            .address(self.connection.contracts().bingo_game)
            .from_block(from_block)
            .topic1(round_topic(round));
        let client = self.connection.client();
        let logs = retry_read(self.connection.retry(), "eth_getLogs", || client.get_logs(&filter))
            .await?;
        let mut history = Vec::with_capacity(logs.len());
        for log in logs {
            if let Some(event) = events::decode_log(log.inner.topics(), &log.inner.data.data)? {
                history.push(event);
            }
        }
        Ok(history)
    }

    async fn dispatch(&self, intent: Intent) -> Result<PendingAction> {
        let (call, value) = self.prepare(&intent).await?;
        self.submit(intent, call, value).await
    }

    /// Client-side checks, calldata and the payment an intent needs.
    async fn prepare(&self, intent: &Intent) -> Result<(Call, Option<U256>)> {
        let contracts = self.connection.contracts();
        match intent {
            Intent::CreateCard { dimensions } => {
                let price = self
                    .read(contracts.cartela, &cartela::cartela_price()?, cartela::decode_cartela_price)
                    .await?;
                let call = cartela::create_cartela(dimensions.rows(), dimensions.columns())?;
                Ok((call, Some(price)))
            }
            Intent::RegisterNumbers { card, numbers } => {
                let snapshot = match self.view().card(*card) {
                    Some(snapshot) => snapshot,
                    None => self.view().refresh_card(*card).await?,
                };
                validate_card_numbers(snapshot.dimensions, numbers)?;
                Ok((cartela::register_numbers(card.0, numbers)?, None))
            }
            Intent::TransferCard { card, to } => {
                if to.is_zero() {
                    return Err(Error::InvalidInput(
                        "cannot transfer a card to the zero address".to_string(),
                    ));
                }
                Ok((cartela::transfer_cartela(card.0, *to)?, None))
            }
            Intent::StartRound(params) => {
                params.validate()?;
                let call = bingo_game::start_round(&StartRoundArgs {
                    max_number: params.max_number,
                    entry_fee: params.entry_fee,
                    timeout_secs: params.timeout.as_secs(),
                    win_patterns: params.win_patterns.bits(),
                })?;
                Ok((call, None))
            }
            Intent::DrawNumber { round } => Ok((bingo_game::draw_number(round.0)?, None)),
            Intent::JoinRound { round, card } => {
                let record = self
                    .read(contracts.bingo_game, &bingo_game::get_round(round.0)?, bingo_game::decode_round)
                    .await?;
                if record.id == 0 {
                    return Err(Error::InvalidInput(format!("round {round} does not exist")));
                }
                let call = bingo_game::join_round(round.0, card.0)?;
                Ok((call, Some(record.entry_fee)))
            }
            Intent::DistributePrizes { round } => {
                Ok((bingo_game::distribute_prizes(round.0)?, None))
            }
        }
    }

    async fn submit(&self, intent: Intent, call: Call, value: Option<U256>) -> Result<PendingAction> {
        if value.is_some_and(|value| !value.is_zero()) && !call.payable {
            return Err(Error::Encoding(format!(
                "{} is not payable but the intent carries a payment",
                call.function
            )));
        }
        let mut request = call_request(self.connection.contracts().of(call.contract), call.data)
            .from(self.connection.sender());
        request.value = value.filter(|value| !value.is_zero());
        let hash = self.connection.client().submit_transaction(&request).await?;
        info!(%hash, %intent, "transaction submitted");

        let subscription = self
            .connection
            .tracker()
            .track(hash, intent.clone(), Some(request));
        let record = TxRecord {
            hash,
            intent,
            state: TxState::Submitted,
        };
        self.view().add_pending(record.clone());
        Ok(PendingAction {
            record,
            subscription,
        })
    }

    async fn read<R>(
        &self,
        contract: Address,
        call: &Call,
        decode: fn(&[u8]) -> bingo_abi::Result<R>,
    ) -> Result<R> {
        read_decoded(
            self.connection.client(),
            self.connection.retry(),
            contract,
            call,
            BlockNumberOrTag::Latest,
            decode,
        )
        .await
    }
}

fn round_topic(round: RoundId) -> B256 {
    B256::from(U256::from(round.0).to_be_bytes::<32>())
}
