//! In-memory chain running both bingo contracts behind the [`Transport`]
//! seam. Calldata goes through the same registries the client uses, so a
//! selector or type mismatch fails here exactly as it would on a node.

use crate::{
    connection::{
        ClientConfig,
        Connection,
        ContractAddresses,
    },
    game::GameClient,
    model::{
        RoundState,
        WinPatterns,
    },
    rpc::{
        BlockNumberOrTag,
        Filter,
        Log,
        PendingTransaction,
        RpcError,
        TransactionRequest,
        Transport,
        TransportError,
        TxHash,
    },
    tracker::TrackerConfig,
};
use alloy_primitives::{
    Address,
    B256,
    Bloom,
    Bytes,
    LogData,
    U64,
    U256,
    keccak256,
};
use bingo_abi::{
    AbiError,
    ContractKind,
    DynSolValue,
    bingo_game,
    cartela,
    encode_output,
    encode_revert,
    events::GameEvent,
    value,
};
use serde::de::DeserializeOwned;
use serde_json::{
    Value,
    json,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};

pub const CHAIN_ID: u64 = 31337;

pub fn cartela_address() -> Address {
    Address::repeat_byte(0xca)
}

pub fn bingo_game_address() -> Address {
    Address::repeat_byte(0xb1)
}

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn contract_addresses() -> ContractAddresses {
    ContractAddresses {
        cartela: cartela_address(),
        bingo_game: bingo_game_address(),
    }
}

/// Config pointing at the fake contracts, polling fast enough for tests.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("fake://chain", contract_addresses());
    config.chain_id = Some(CHAIN_ID);
    config.tracker = TrackerConfig {
        poll_interval: Duration::from_millis(50),
        max_wait: Duration::from_secs(5),
        confirmations: 1,
        terminal_cache: 16,
    };
    config
}

/// A connected game client over a fresh [`FakeChain`], sending as
/// [`alice`].
pub struct TestContext {
    chain: FakeChain,
    game: GameClient<FakeChain>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ClientConfig) -> Self {
        let chain = FakeChain::new();
        let connection = Connection::with_transport(config, chain.clone())
            .await
            .expect("the fake chain accepts the test config");
        Self {
            chain,
            game: GameClient::new(connection),
        }
    }

    pub fn chain(&self) -> &FakeChain {
        &self.chain
    }

    pub fn game(&self) -> &GameClient<FakeChain> {
        &self.game
    }
}

/// When a broadcast transaction is included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mining {
    /// In its own block, as soon as it is sent.
    Instant,
    /// After this many receipt polls for it.
    AfterPolls(u64),
    /// Only on [`FakeChain::mine`].
    Manual,
}

#[derive(Clone, Debug)]
pub enum InjectedFailure {
    UserRejected,
    NonceTooLow,
    ReplacementUnderpriced,
    InsufficientFunds { have: u64, want: u64 },
    Unreachable,
    Rpc(RpcError),
}

fn rpc_error(code: i64, message: String, data: Option<Value>) -> TransportError {
    TransportError::Rpc(RpcError {
        code,
        message: message.into(),
        data,
    })
}

impl InjectedFailure {
    fn into_error(self) -> TransportError {
        let rpc = |code: i64, message: String| rpc_error(code, message, None);
        match self {
            InjectedFailure::UserRejected => {
                rpc(4001, "User rejected the request.".to_string())
            }
            InjectedFailure::NonceTooLow => rpc(-32000, "nonce too low".to_string()),
            InjectedFailure::ReplacementUnderpriced => {
                rpc(-32000, "replacement transaction underpriced".to_string())
            }
            InjectedFailure::InsufficientFunds { have, want } => rpc(
                -32000,
                format!(
                    "insufficient funds for gas * price + value: address {} have {have} want {want}",
                    alice()
                ),
            ),
            InjectedFailure::Unreachable => {
                TransportError::Unreachable("connection refused".to_string())
            }
            InjectedFailure::Rpc(object) => TransportError::Rpc(object),
        }
    }
}

/// Initial state for a round installed directly, bypassing `startRound`.
#[derive(Clone, Debug)]
pub struct RoundSeed {
    pub max_number: u8,
    pub entry_fee: U256,
    pub state: RoundState,
    pub drawn: Vec<u8>,
    pub win_patterns: WinPatterns,
    /// `(player, card id)` pairs already joined.
    pub participants: Vec<(Address, u64)>,
}

impl RoundSeed {
    pub fn open(max_number: u8, entry_fee: U256) -> Self {
        Self {
            max_number,
            entry_fee,
            state: RoundState::Open,
            drawn: Vec::new(),
            win_patterns: WinPatterns::FULL_HOUSE,
            participants: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct FakeCartela {
    owner: Address,
    rows: u8,
    columns: u8,
    numbers: Vec<u8>,
    registered: bool,
    in_use: bool,
}

#[derive(Clone, Debug)]
struct FakeRound {
    state: RoundState,
    max_number: u8,
    entry_fee: U256,
    prize_pool: U256,
    drawn: Vec<u8>,
    randomness_pending: bool,
    prizes_distributed: bool,
    players: Vec<Address>,
    cards: Vec<u64>,
    win_patterns: WinPatterns,
}

#[derive(Clone, Debug, Default)]
struct Contracts {
    cartela_price: U256,
    cartelas: BTreeMap<u64, FakeCartela>,
    last_cartela: u64,
    rounds: BTreeMap<u64, FakeRound>,
    current_round: u64,
    last_request: u64,
    scripted_draws: VecDeque<u8>,
    hold_randomness: bool,
}

struct Execution {
    output: Bytes,
    events: Vec<GameEvent>,
}

type Revert = Bytes;

/// The parts of a sent transaction the contracts act on.
#[derive(Clone, Debug)]
struct Sent {
    from: Address,
    to: Address,
    data: Bytes,
    value: U256,
}

impl Sent {
    fn from_request(request: &TransactionRequest) -> Result<Self, TransportError> {
        let to = request
            .to
            .as_ref()
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| rpc_error(-32602, "contract creation is not supported".to_string(), None))?;
        Ok(Self {
            from: request.from.unwrap_or(Address::ZERO),
            to,
            data: request.input.input().cloned().unwrap_or_default(),
            value: request.value.unwrap_or(U256::ZERO),
        })
    }
}

struct PendingTx {
    hash: TxHash,
    sent: Sent,
    polls: u64,
}

struct MinedTx {
    transaction: PendingTransaction,
    /// Node-shaped receipt JSON, as `eth_getTransactionReceipt` returns it.
    receipt: Value,
}

struct ChainState {
    chain_id: u64,
    block: u64,
    accounts: Vec<Address>,
    mining: Mining,
    /// State at the head block.
    contracts: Contracts,
    /// State as of the end of each earlier block that changed something.
    history: BTreeMap<u64, Contracts>,
    pending: Vec<PendingTx>,
    mined: HashMap<TxHash, MinedTx>,
    logs: Vec<Log>,
    failures: VecDeque<(String, InjectedFailure)>,
    calls: HashMap<String, usize>,
    sent: u64,
}

#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                chain_id: CHAIN_ID,
                block: 1,
                accounts: vec![alice(), bob()],
                mining: Mining::AfterPolls(1),
                contracts: Contracts {
                    cartela_price: U256::from(1_000_000_000_000_000u64),
                    ..Contracts::default()
                },
                history: BTreeMap::new(),
                pending: Vec::new(),
                mined: HashMap::new(),
                logs: Vec::new(),
                failures: VecDeque::new(),
                calls: HashMap::new(),
                sent: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.lock().chain_id = chain_id;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.lock().accounts = accounts;
    }

    pub fn set_mining(&self, mining: Mining) {
        self.lock().mining = mining;
    }

    pub fn set_cartela_price(&self, price: U256) {
        self.lock().contracts.cartela_price = price;
    }

    /// Numbers the VRF hands out next, in order.
    pub fn script_draws(&self, numbers: impl IntoIterator<Item = u8>) {
        self.lock().contracts.scripted_draws.extend(numbers);
    }

    /// Leaves draws waiting on [`FakeChain::fulfil_randomness`].
    pub fn hold_randomness(&self, hold: bool) {
        self.lock().contracts.hold_randomness = hold;
    }

    /// Delivers the VRF callback for `round` in a block of its own.
    pub fn fulfil_randomness(&self, round: u64) {
        let mut state = self.lock();
        let block = state.next_block();
        let events = state.contracts.fulfil(round);
        let logs = events_to_logs(&events, block, None, 0);
        state.logs.extend(logs);
    }

    pub fn insert_round(&self, id: u64, seed: RoundSeed) {
        let mut state = self.lock();
        let joined = U256::from(seed.participants.len());
        let (players, cards) = seed.participants.into_iter().unzip();
        state.contracts.rounds.insert(
            id,
            FakeRound {
                state: seed.state,
                max_number: seed.max_number,
                entry_fee: seed.entry_fee,
                prize_pool: seed.entry_fee * joined,
                drawn: seed.drawn,
                randomness_pending: false,
                prizes_distributed: false,
                players,
                cards,
                win_patterns: seed.win_patterns,
            },
        );
        state.contracts.current_round = state.contracts.current_round.max(id);
    }

    pub fn insert_card(
        &self,
        id: u64,
        owner: Address,
        rows: u8,
        columns: u8,
        numbers: Option<Vec<u8>>,
    ) {
        let mut state = self.lock();
        state.contracts.cartelas.insert(
            id,
            FakeCartela {
                owner,
                rows,
                columns,
                registered: numbers.is_some(),
                numbers: numbers.unwrap_or_default(),
                in_use: false,
            },
        );
        state.contracts.last_cartela = state.contracts.last_cartela.max(id);
    }

    /// Corrupts a round's drawn numbers, as a misbehaving node might report.
    pub fn rewrite_drawn_numbers(&self, round: u64, drawn: Vec<u8>) {
        if let Some(round) = self.lock().contracts.rounds.get_mut(&round) {
            round.drawn = drawn;
        }
    }

    pub fn rewrite_card_numbers(&self, card: u64, numbers: Vec<u8>) {
        if let Some(card) = self.lock().contracts.cartelas.get_mut(&card) {
            card.numbers = numbers;
        }
    }

    /// Fails the next request for `method` with `failure`.
    pub fn fail_next(&self, method: &str, failure: InjectedFailure) {
        self.lock()
            .failures
            .push_back((method.to_string(), failure));
    }

    /// Includes every pending transaction in one new block.
    pub fn mine(&self) {
        let mut state = self.lock();
        let hashes: Vec<TxHash> = state.pending.iter().map(|tx| tx.hash).collect();
        state.include(&hashes);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.lock();
        for _ in 0..blocks {
            state.next_block();
        }
    }

    /// Forgets a pending transaction, as a node evicting it from its pool.
    pub fn drop_transaction(&self, hash: TxHash) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|tx| tx.hash != hash);
        before != state.pending.len()
    }

    pub fn pending_hashes(&self) -> Vec<TxHash> {
        self.lock().pending.iter().map(|tx| tx.hash).collect()
    }

    pub fn block_number(&self) -> u64 {
        self.lock().block
    }

    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn handle(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let mut state = self.lock();
        *state.calls.entry(method.to_string()).or_default() += 1;
        if let Some(index) = state.failures.iter().position(|(m, _)| m == method) {
            if let Some((_, failure)) = state.failures.remove(index) {
                return Err(failure.into_error());
            }
        }
        match method {
            "eth_chainId" => Ok(json!(U64::from(state.chain_id))),
            "eth_accounts" => Ok(json!(state.accounts)),
            "eth_blockNumber" => Ok(json!(U64::from(state.block))),
            "eth_call" => {
                let request: TransactionRequest = param(&params, 0)?;
                let block: Option<BlockNumberOrTag> = param(&params, 1)?;
                state.call(&Sent::from_request(&request)?, block.unwrap_or(BlockNumberOrTag::Latest))
            }
            "eth_sendTransaction" => {
                let request: TransactionRequest = param(&params, 0)?;
                state.send(&request)
            }
            "eth_getTransactionReceipt" => {
                let hash: TxHash = param(&params, 0)?;
                state.poll_receipt(hash);
                Ok(state
                    .mined
                    .get(&hash)
                    .map(|mined| mined.receipt.clone())
                    .unwrap_or(Value::Null))
            }
            "eth_getTransactionByHash" => {
                let hash: TxHash = param(&params, 0)?;
                Ok(state.transaction(hash).map(|tx| json!(tx)).unwrap_or(Value::Null))
            }
            "eth_getLogs" => {
                let filter: Filter = param(&params, 0)?;
                let head = state.block;
                let logs: Vec<&Log> = state
                    .logs
                    .iter()
                    .filter(|log| filter_matches(&filter, log, head))
                    .collect();
                Ok(json!(logs))
            }
            other => Err(rpc_error(
                -32601,
                format!("the method {other} does not exist/is not available"),
                None,
            )),
        }
    }
}

impl Transport for FakeChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.handle(method, params)
    }
}

fn param<R: DeserializeOwned>(params: &Value, index: usize) -> Result<R, TransportError> {
    let raw = params.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw)
        .map_err(|e| rpc_error(-32602, format!("invalid argument {index}: {e}"), None))
}

/// `eth_getLogs` matching: an open `toBlock` means the head, an empty
/// address or topic position matches anything.
fn filter_matches(filter: &Filter, log: &Log, head: u64) -> bool {
    let from = filter.get_from_block().unwrap_or(0);
    let to = filter.get_to_block().unwrap_or(head);
    let in_range = log
        .block_number
        .is_none_or(|block| (from..=to).contains(&block));
    let topics = log.inner.topics();
    in_range
        && filter.address.matches(&log.inner.address)
        && filter.topics.iter().enumerate().all(|(i, wanted)| {
            wanted.is_empty() || topics.get(i).is_some_and(|topic| wanted.matches(topic))
        })
}

fn block_hash(block: u64) -> B256 {
    keccak256(block.to_be_bytes())
}

impl ChainState {
    fn addresses(&self) -> ContractAddresses {
        contract_addresses()
    }

    /// Closes the head block and opens the next one.
    fn next_block(&mut self) -> u64 {
        self.history.insert(self.block, self.contracts.clone());
        self.block += 1;
        self.block
    }

    fn contracts_at(&self, block: BlockNumberOrTag) -> Result<&Contracts, TransportError> {
        match block {
            BlockNumberOrTag::Number(number) if number > self.block => {
                Err(rpc_error(-32000, "header not found".to_string(), None))
            }
            BlockNumberOrTag::Number(number) if number < self.block => Ok(self
                .history
                .range(..=number)
                .next_back()
                .map(|(_, contracts)| contracts)
                .unwrap_or(&self.contracts)),
            _ => Ok(&self.contracts),
        }
    }

    fn call(&self, sent: &Sent, block: BlockNumberOrTag) -> Result<Value, TransportError> {
        // reads and replays run against a scratch copy
        let mut scratch = self.contracts_at(block)?.clone();
        match scratch.execute(&self.addresses(), sent.from, sent.to, &sent.data, sent.value) {
            Ok(execution) => Ok(json!(execution.output)),
            Err(revert) => Err(revert_error(&revert)),
        }
    }

    fn send(&mut self, request: &TransactionRequest) -> Result<Value, TransportError> {
        let Some(from) = request.from else {
            return Err(rpc_error(-32000, "missing from address".to_string(), None));
        };
        if !self.accounts.contains(&from) {
            return Err(rpc_error(-32000, format!("unknown account {from}"), None));
        }
        let sent = Sent::from_request(request)?;
        self.sent += 1;
        let mut preimage = self.sent.to_be_bytes().to_vec();
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&sent.data);
        let hash = keccak256(preimage);
        self.pending.push(PendingTx {
            hash,
            sent,
            polls: 0,
        });
        if self.mining == Mining::Instant {
            self.include(&[hash]);
        }
        Ok(json!(hash))
    }

    fn poll_receipt(&mut self, hash: TxHash) {
        let Mining::AfterPolls(needed) = self.mining else {
            return;
        };
        let Some(tx) = self.pending.iter_mut().find(|tx| tx.hash == hash) else {
            return;
        };
        tx.polls += 1;
        if tx.polls >= needed {
            self.include(&[hash]);
        }
    }

    fn transaction(&self, hash: TxHash) -> Option<PendingTransaction> {
        if let Some(mined) = self.mined.get(&hash) {
            return Some(mined.transaction.clone());
        }
        self.pending
            .iter()
            .find(|tx| tx.hash == hash)
            .map(|tx| pending_transaction(tx, None))
    }

    fn include(&mut self, hashes: &[TxHash]) {
        let block = self.next_block();
        let addresses = self.addresses();
        let mut log_index = 0;
        for (index, hash) in hashes.iter().enumerate() {
            let Some(position) = self.pending.iter().position(|tx| tx.hash == *hash) else {
                continue;
            };
            let tx = self.pending.remove(position);
            let Sent {
                from,
                to,
                data,
                value,
            } = &tx.sent;
            let mut scratch = self.contracts.clone();
            let (succeeded, logs) = match scratch.execute(&addresses, *from, *to, data, *value) {
                Ok(execution) => {
                    self.contracts = scratch;
                    let placed = Some((tx.hash, index as u64));
                    let logs = events_to_logs(&execution.events, block, placed, log_index);
                    (true, logs)
                }
                Err(_) => (false, Vec::new()),
            };
            log_index += logs.len() as u64;
            self.logs.extend(logs.iter().cloned());
            let status = if succeeded { "0x1" } else { "0x0" };
            let receipt = json!({
                "type": "0x2",
                "status": status,
                "cumulativeGasUsed": "0x5208",
                "logs": logs,
                "logsBloom": Bloom::ZERO,
                "transactionHash": tx.hash,
                "transactionIndex": U64::from(index),
                "blockHash": block_hash(block),
                "blockNumber": U64::from(block),
                "gasUsed": "0x5208",
                "effectiveGasPrice": "0x1",
                "from": from,
                "to": to,
                "contractAddress": null,
            });
            self.mined.insert(
                tx.hash,
                MinedTx {
                    transaction: pending_transaction(&tx, Some(block)),
                    receipt,
                },
            );
        }
    }
}

fn pending_transaction(tx: &PendingTx, block_number: Option<u64>) -> PendingTransaction {
    PendingTransaction {
        hash: tx.hash,
        from: tx.sent.from,
        to: Some(tx.sent.to),
        input: tx.sent.data.clone(),
        value: tx.sent.value,
        block_number,
    }
}

/// `placed` is the emitting transaction and its index in the block; the VRF
/// callback has none.
fn events_to_logs(
    events: &[GameEvent],
    block: u64,
    placed: Option<(TxHash, u64)>,
    first_index: u64,
) -> Vec<Log> {
    events
        .iter()
        .filter_map(|event| event.encode().ok().map(|encoded| (event, encoded)))
        .zip(first_index..)
        .map(|((event, (topics, data)), log_index)| {
            let address = match event {
                GameEvent::CartelaCreated { .. } | GameEvent::NumbersRegistered { .. } => {
                    cartela_address()
                }
                _ => bingo_game_address(),
            };
            Log {
                inner: alloy_primitives::Log {
                    address,
                    data: LogData::new_unchecked(topics, data),
                },
                block_hash: Some(block_hash(block)),
                block_number: Some(block),
                transaction_hash: placed.map(|(hash, _)| hash),
                transaction_index: placed.map(|(_, index)| index),
                log_index: Some(log_index),
                ..Log::default()
            }
        })
        .collect()
}

fn revert_error(revert: &Bytes) -> TransportError {
    let message = match bingo_abi::decode_revert_reason(revert) {
        Some(reason) => format!("execution reverted: {reason}"),
        None => "execution reverted".to_string(),
    };
    rpc_error(
        3,
        message,
        Some(json!(alloy_primitives::hex::encode_prefixed(revert))),
    )
}

fn require(condition: bool, reason: &str) -> Result<(), Revert> {
    if condition {
        Ok(())
    } else {
        Err(encode_revert(reason))
    }
}

fn abi_revert(err: AbiError) -> Revert {
    encode_revert(&err.to_string())
}

fn arg<'a>(args: &'a [DynSolValue], index: usize, name: &str) -> Result<&'a DynSolValue, Revert> {
    value::field(args, index, name).map_err(abi_revert)
}

impl Contracts {
    fn execute(
        &mut self,
        addresses: &ContractAddresses,
        from: Address,
        to: Address,
        data: &[u8],
        payment: U256,
    ) -> Result<Execution, Revert> {
        let kind = if to == addresses.cartela {
            ContractKind::Cartela
        } else if to == addresses.bingo_game {
            ContractKind::BingoGame
        } else {
            // no code at the address: calls succeed with empty output
            return Ok(Execution {
                output: Bytes::new(),
                events: Vec::new(),
            });
        };
        let selector = data.get(..4).unwrap_or_default();
        let Some(signature) = kind.abi().function_by_selector(selector) else {
            return Err(Bytes::new());
        };
        let args = bingo_abi::decode_input(signature, data).map_err(abi_revert)?;
        require(
            payment.is_zero() || signature.is_payable(),
            "non-payable function received value",
        )?;
        let (outputs, events) = match kind {
            ContractKind::Cartela => self.cartela(from, payment, signature.name(), &args)?,
            ContractKind::BingoGame => self.game(from, payment, signature.name(), &args)?,
        };
        let output = encode_output(signature, &outputs).map_err(abi_revert)?;
        Ok(Execution { output, events })
    }

    fn cartela(
        &mut self,
        from: Address,
        payment: U256,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<(Vec<DynSolValue>, Vec<GameEvent>), Revert> {
        let u64_arg = |index: usize, name: &'static str| value::as_u64(arg(args, index, name)?, name).map_err(abi_revert);
        match function {
            cartela::CREATE_CARTELA => {
                let rows = value::as_u8(arg(args, 0, "rows")?, "rows").map_err(abi_revert)?;
                let columns =
                    value::as_u8(arg(args, 1, "columns")?, "columns").map_err(abi_revert)?;
                require(payment >= self.cartela_price, "Cartela: insufficient payment")?;
                require(
                    (1..=10).contains(&rows) && (1..=10).contains(&columns),
                    "Cartela: invalid dimensions",
                )?;
                self.last_cartela += 1;
                let id = self.last_cartela;
                self.cartelas.insert(
                    id,
                    FakeCartela {
                        owner: from,
                        rows,
                        columns,
                        numbers: Vec::new(),
                        registered: false,
                        in_use: false,
                    },
                );
                Ok((
                    vec![value::id(id)],
                    vec![GameEvent::CartelaCreated {
                        cartela_id: id,
                        owner: from,
                        rows,
                        columns,
                    }],
                ))
            }
            cartela::REGISTER_NUMBERS => {
                let id = u64_arg(0, "cartelaId")?;
                let numbers =
                    value::as_u8_vec(arg(args, 1, "numbers")?, "numbers").map_err(abi_revert)?;
                let card = self
                    .cartelas
                    .get_mut(&id)
                    .ok_or_else(|| encode_revert("Cartela: nonexistent card"))?;
                require(card.owner == from, "Cartela: not owner")?;
                require(!card.registered, "Cartela: numbers already registered")?;
                require(
                    numbers.len() == usize::from(card.rows) * usize::from(card.columns),
                    "Cartela: wrong number count",
                )?;
                let mut sorted = numbers.clone();
                sorted.sort_unstable();
                sorted.dedup();
                require(
                    sorted.len() == numbers.len()
                        && numbers.iter().all(|n| (1..=99).contains(n)),
                    "Cartela: invalid numbers",
                )?;
                card.numbers = numbers.clone();
                card.registered = true;
                Ok((
                    Vec::new(),
                    vec![GameEvent::NumbersRegistered {
                        cartela_id: id,
                        numbers,
                    }],
                ))
            }
            cartela::TRANSFER_CARTELA => {
                let id = u64_arg(0, "cartelaId")?;
                let to = value::as_address(arg(args, 1, "to")?, "to").map_err(abi_revert)?;
                let card = self
                    .cartelas
                    .get_mut(&id)
                    .ok_or_else(|| encode_revert("Cartela: nonexistent card"))?;
                require(card.owner == from, "Cartela: not owner")?;
                require(!card.in_use, "Cartela: card in use")?;
                card.owner = to;
                Ok((Vec::new(), Vec::new()))
            }
            cartela::GET_CARTELA => {
                let id = u64_arg(0, "cartelaId")?;
                let outputs = match self.cartelas.get(&id) {
                    Some(card) => vec![
                        value::id(id),
                        value::address(card.owner),
                        value::uint8(card.rows),
                        value::uint8(card.columns),
                        value::boolean(card.registered),
                        value::boolean(card.in_use),
                    ],
                    None => vec![
                        value::id(0),
                        value::address(Address::ZERO),
                        value::uint8(0),
                        value::uint8(0),
                        value::boolean(false),
                        value::boolean(false),
                    ],
                };
                Ok((outputs, Vec::new()))
            }
            cartela::GET_CARTELA_NUMBERS => {
                let id = u64_arg(0, "cartelaId")?;
                let numbers = self
                    .cartelas
                    .get(&id)
                    .map(|card| card.numbers.clone())
                    .unwrap_or_default();
                Ok((vec![value::uint8_array(&numbers)], Vec::new()))
            }
            cartela::CARTELA_PRICE => Ok((vec![value::uint256(self.cartela_price)], Vec::new())),
            other => Err(encode_revert(&format!("Cartela: no handler for {other}"))),
        }
    }

    fn game(
        &mut self,
        from: Address,
        payment: U256,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<(Vec<DynSolValue>, Vec<GameEvent>), Revert> {
        let u64_arg = |index: usize, name: &'static str| value::as_u64(arg(args, index, name)?, name).map_err(abi_revert);
        match function {
            bingo_game::START_ROUND => {
                let max_number =
                    value::as_u8(arg(args, 0, "maxNumber")?, "maxNumber").map_err(abi_revert)?;
                let entry_fee =
                    value::as_u256(arg(args, 1, "entryFee")?, "entryFee").map_err(abi_revert)?;
                let patterns =
                    value::as_u8(arg(args, 3, "winPatterns")?, "winPatterns").map_err(abi_revert)?;
                require((1..=99).contains(&max_number), "BingoGame: invalid max number")?;
                let win_patterns = WinPatterns::from_bits(patterns)
                    .ok()
                    .filter(|patterns| !patterns.is_empty())
                    .ok_or_else(|| encode_revert("BingoGame: invalid win patterns"))?;
                let in_progress = self.rounds.get(&self.current_round).is_some_and(|round| {
                    matches!(round.state, RoundState::Open | RoundState::Drawing)
                });
                require(!in_progress, "BingoGame: round in progress")?;
                self.current_round += 1;
                let id = self.current_round;
                self.rounds.insert(
                    id,
                    FakeRound {
                        state: RoundState::Open,
                        max_number,
                        entry_fee,
                        prize_pool: U256::ZERO,
                        drawn: Vec::new(),
                        randomness_pending: false,
                        prizes_distributed: false,
                        players: Vec::new(),
                        cards: Vec::new(),
                        win_patterns,
                    },
                );
                Ok((
                    vec![value::id(id)],
                    vec![GameEvent::RoundStarted {
                        round_id: id,
                        max_number,
                        entry_fee,
                    }],
                ))
            }
            bingo_game::JOIN_ROUND => {
                let round_id = u64_arg(0, "roundId")?;
                let card_id = u64_arg(1, "cartelaId")?;
                let round = self
                    .rounds
                    .get(&round_id)
                    .filter(|round| round.state == RoundState::Open)
                    .ok_or_else(|| encode_revert("BingoGame: round not open"))?;
                require(payment == round.entry_fee, "BingoGame: wrong entry fee")?;
                let card = self
                    .cartelas
                    .get_mut(&card_id)
                    .filter(|card| card.owner == from)
                    .ok_or_else(|| encode_revert("BingoGame: not card owner"))?;
                require(card.registered, "BingoGame: numbers not registered")?;
                require(!card.in_use, "BingoGame: card in use")?;
                card.in_use = true;
                if let Some(round) = self.rounds.get_mut(&round_id) {
                    round.players.push(from);
                    round.cards.push(card_id);
                    round.prize_pool += payment;
                }
                Ok((
                    Vec::new(),
                    vec![GameEvent::PlayerJoined {
                        round_id,
                        player: from,
                        cartela_id: card_id,
                    }],
                ))
            }
            bingo_game::DRAW_NUMBER => {
                let round_id = u64_arg(0, "roundId")?;
                let round = self
                    .rounds
                    .get_mut(&round_id)
                    .filter(|round| matches!(round.state, RoundState::Open | RoundState::Drawing))
                    .ok_or_else(|| encode_revert("BingoGame: round not active"))?;
                require(!round.randomness_pending, "BingoGame: randomness pending")?;
                require(
                    round.drawn.len() < usize::from(round.max_number),
                    "BingoGame: all numbers drawn",
                )?;
                round.state = RoundState::Drawing;
                round.randomness_pending = true;
                self.last_request += 1;
                let request_id = U256::from(self.last_request);
                let mut events = vec![GameEvent::RandomnessRequested {
                    round_id,
                    request_id,
                }];
                if !self.hold_randomness {
                    events.extend(self.fulfil(round_id));
                }
                Ok((vec![value::uint256(request_id)], events))
            }
            bingo_game::DISTRIBUTE_PRIZES => {
                let round_id = u64_arg(0, "roundId")?;
                let round = self
                    .rounds
                    .get_mut(&round_id)
                    .filter(|round| round.state == RoundState::Finished)
                    .ok_or_else(|| encode_revert("BingoGame: round not finished"))?;
                require(!round.prizes_distributed, "BingoGame: prizes already distributed")?;
                round.prizes_distributed = true;
                let prize_pool = round.prize_pool;
                let cards = round.cards.clone();
                for card in cards {
                    if let Some(card) = self.cartelas.get_mut(&card) {
                        card.in_use = false;
                    }
                }
                Ok((
                    Vec::new(),
                    vec![GameEvent::RoundFinalized {
                        round_id,
                        prize_pool,
                    }],
                ))
            }
            bingo_game::GET_ROUND => {
                let id = u64_arg(0, "roundId")?;
                let outputs = match self.rounds.get(&id) {
                    Some(round) => vec![
                        value::id(id),
                        value::uint8(u8::from(round.state)),
                        value::uint8(round.max_number),
                        value::uint256(round.entry_fee),
                        value::uint256(round.prize_pool),
                        value::boolean(round.randomness_pending),
                        value::boolean(round.prizes_distributed),
                    ],
                    None => vec![
                        value::id(0),
                        value::uint8(0),
                        value::uint8(0),
                        value::uint256(U256::ZERO),
                        value::uint256(U256::ZERO),
                        value::boolean(false),
                        value::boolean(false),
                    ],
                };
                Ok((outputs, Vec::new()))
            }
            bingo_game::GET_DRAWN_NUMBERS => {
                let id = u64_arg(0, "roundId")?;
                let drawn = self
                    .rounds
                    .get(&id)
                    .map(|round| round.drawn.clone())
                    .unwrap_or_default();
                Ok((vec![value::uint8_array(&drawn)], Vec::new()))
            }
            bingo_game::GET_PARTICIPANTS => {
                let id = u64_arg(0, "roundId")?;
                let (players, cards) = self
                    .rounds
                    .get(&id)
                    .map(|round| (round.players.clone(), round.cards.clone()))
                    .unwrap_or_default();
                Ok((
                    vec![value::address_array(&players), value::id_array(&cards)],
                    Vec::new(),
                ))
            }
            bingo_game::CURRENT_ROUND_ID => Ok((vec![value::id(self.current_round)], Vec::new())),
            other => Err(encode_revert(&format!("BingoGame: no handler for {other}"))),
        }
    }

    /// VRF callback: draws the next number and settles winners.
    fn fulfil(&mut self, round_id: u64) -> Vec<GameEvent> {
        let Some(round) = self.rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        if round.drawn.len() >= usize::from(round.max_number) {
            return Vec::new();
        }
        let scripted = std::iter::from_fn(|| self.scripted_draws.pop_front())
            .find(|n| (1..=round.max_number).contains(n) && !round.drawn.contains(n));
        let Some(number) =
            scripted.or_else(|| (1..=round.max_number).find(|n| !round.drawn.contains(n)))
        else {
            return Vec::new();
        };
        round.drawn.push(number);
        round.randomness_pending = false;
        let mut events = vec![GameEvent::NumberDrawn { round_id, number }];

        for (player, card_id) in round.players.iter().zip(&round.cards) {
            let Some(card) = self.cartelas.get(card_id) else {
                continue;
            };
            if card_wins(card, &round.drawn, round.win_patterns) {
                events.push(GameEvent::WinnerFound {
                    round_id,
                    winner: *player,
                    cartela_id: *card_id,
                });
            }
        }
        if events.len() > 1 {
            round.state = RoundState::Finished;
        }
        events
    }
}

fn card_wins(card: &FakeCartela, drawn: &[u8], patterns: WinPatterns) -> bool {
    let rows = usize::from(card.rows);
    let columns = usize::from(card.columns);
    if card.numbers.len() != rows * columns || rows == 0 || columns == 0 {
        return false;
    }
    let marked = |row: usize, column: usize| drawn.contains(&card.numbers[row * columns + column]);
    let any_row = (0..rows).any(|r| (0..columns).all(|c| marked(r, c)));
    let any_column = (0..columns).any(|c| (0..rows).all(|r| marked(r, c)));
    let diagonal = rows == columns
        && ((0..rows).all(|i| marked(i, i)) || (0..rows).all(|i| marked(i, columns - 1 - i)));
    let corners = marked(0, 0)
        && marked(0, columns - 1)
        && marked(rows - 1, 0)
        && marked(rows - 1, columns - 1);
    let full_house = card.numbers.iter().all(|n| drawn.contains(n));

    (patterns.contains(WinPatterns::ROW) && any_row)
        || (patterns.contains(WinPatterns::COLUMN) && any_column)
        || (patterns.contains(WinPatterns::DIAGONAL) && diagonal)
        || (patterns.contains(WinPatterns::CORNERS) && corners)
        || (patterns.contains(WinPatterns::FULL_HOUSE) && full_house)
}
