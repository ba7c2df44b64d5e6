//! BingoGameContract: round orchestration and VRF backed draws.

use crate::{
    Call,
    ContractAbi,
    ContractKind,
    EventSignature,
    FunctionSignature,
    Result,
    value::{
        self,
        field,
    },
};
use alloy_primitives::{
    Address,
    U256,
};
use std::sync::OnceLock;

pub const CONTRACT_NAME: &str = "BingoGameContract";
pub const ABI_VERSION: u32 = 1;

pub const START_ROUND: &str = "startRound";
pub const DRAW_NUMBER: &str = "drawNumber";
pub const JOIN_ROUND: &str = "joinRound";
pub const DISTRIBUTE_PRIZES: &str = "distributePrizes";
pub const GET_ROUND: &str = "getRound";
pub const GET_DRAWN_NUMBERS: &str = "getDrawnNumbers";
pub const GET_PARTICIPANTS: &str = "getParticipants";
pub const CURRENT_ROUND_ID: &str = "currentRoundId";

pub const ROUND_STARTED: &str = "RoundStarted";
pub const RANDOMNESS_REQUESTED: &str = "RandomnessRequested";
pub const NUMBER_DRAWN: &str = "NumberDrawn";
pub const PLAYER_JOINED: &str = "PlayerJoined";
pub const WINNER_FOUND: &str = "WinnerFound";
pub const ROUND_FINALIZED: &str = "RoundFinalized";

const FUNCTIONS: [(&str, bool); 8] = [
    (
        "startRound(uint8 maxNumber, uint256 entryFee, uint256 timeout, uint8 winPatterns) returns (uint256)",
        false,
    ),
    ("drawNumber(uint256 roundId) returns (uint256)", false),
    ("joinRound(uint256 roundId, uint256 cartelaId)", true),
    ("distributePrizes(uint256 roundId)", false),
    (
        "getRound(uint256 roundId) returns (uint256 id, uint8 state, uint8 maxNumber, uint256 entryFee, uint256 prizePool, bool randomnessPending, bool prizesDistributed)",
        false,
    ),
    ("getDrawnNumbers(uint256 roundId) returns (uint8[])", false),
    (
        "getParticipants(uint256 roundId) returns (address[] players, uint256[] cartelaIds)",
        false,
    ),
    ("currentRoundId() returns (uint256)", false),
];

const EVENTS: [&str; 6] = [
    "RoundStarted(uint256 indexed roundId, uint8 maxNumber, uint256 entryFee)",
    "RandomnessRequested(uint256 indexed roundId, uint256 requestId)",
    "NumberDrawn(uint256 indexed roundId, uint8 number)",
    "PlayerJoined(uint256 indexed roundId, address indexed player, uint256 cartelaId)",
    "WinnerFound(uint256 indexed roundId, address indexed winner, uint256 cartelaId)",
    "RoundFinalized(uint256 indexed roundId, uint256 prizePool)",
];

/// Raw round record as returned by `getRound`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub id: u64,
    pub state: u8,
    pub max_number: u8,
    pub entry_fee: U256,
    pub prize_pool: U256,
    pub randomness_pending: bool,
    pub prizes_distributed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Participants {
    pub players: Vec<Address>,
    pub cartela_ids: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartRoundArgs {
    pub max_number: u8,
    pub entry_fee: U256,
    pub timeout_secs: u64,
    pub win_patterns: u8,
}

pub fn build_abi() -> Result<ContractAbi> {
    let mut abi = ContractAbi::new(CONTRACT_NAME, ABI_VERSION);
    for (signature, payable) in FUNCTIONS {
        let mut function = FunctionSignature::parse(signature)?;
        if payable {
            function = function.payable();
        }
        abi.register_function(function)?;
    }
    for signature in EVENTS {
        abi.register_event(EventSignature::parse(signature)?)?;
    }
    Ok(abi)
}

pub fn abi() -> &'static ContractAbi {
    static ABI: OnceLock<ContractAbi> = OnceLock::new();
    ABI.get_or_init(|| build_abi().expect("BingoGameContract ABI literals must parse"))
}

pub fn start_round(args: &StartRoundArgs) -> Result<Call> {
    Call::build(
        ContractKind::BingoGame,
        START_ROUND,
        &[
            value::uint8(args.max_number),
            value::uint256(args.entry_fee),
            value::id(args.timeout_secs),
            value::uint8(args.win_patterns),
        ],
    )
}

pub fn draw_number(round_id: u64) -> Result<Call> {
    Call::build(ContractKind::BingoGame, DRAW_NUMBER, &[value::id(round_id)])
}

pub fn join_round(round_id: u64, cartela_id: u64) -> Result<Call> {
    Call::build(
        ContractKind::BingoGame,
        JOIN_ROUND,
        &[value::id(round_id), value::id(cartela_id)],
    )
}

pub fn distribute_prizes(round_id: u64) -> Result<Call> {
    Call::build(
        ContractKind::BingoGame,
        DISTRIBUTE_PRIZES,
        &[value::id(round_id)],
    )
}

pub fn get_round(round_id: u64) -> Result<Call> {
    Call::build(ContractKind::BingoGame, GET_ROUND, &[value::id(round_id)])
}

pub fn get_drawn_numbers(round_id: u64) -> Result<Call> {
    Call::build(
        ContractKind::BingoGame,
        GET_DRAWN_NUMBERS,
        &[value::id(round_id)],
    )
}

pub fn get_participants(round_id: u64) -> Result<Call> {
    Call::build(
        ContractKind::BingoGame,
        GET_PARTICIPANTS,
        &[value::id(round_id)],
    )
}

pub fn current_round_id() -> Result<Call> {
    Call::build(ContractKind::BingoGame, CURRENT_ROUND_ID, &[])
}

pub fn decode_round(data: &[u8]) -> Result<RoundRecord> {
    let values = crate::decode(abi().function(GET_ROUND)?, data)?;
    Ok(RoundRecord {
        id: value::as_u64(field(&values, 0, "id")?, "id")?,
        state: value::as_u8(field(&values, 1, "state")?, "state")?,
        max_number: value::as_u8(field(&values, 2, "maxNumber")?, "maxNumber")?,
        entry_fee: value::as_u256(field(&values, 3, "entryFee")?, "entryFee")?,
        prize_pool: value::as_u256(field(&values, 4, "prizePool")?, "prizePool")?,
        randomness_pending: value::as_bool(
            field(&values, 5, "randomnessPending")?,
            "randomnessPending",
        )?,
        prizes_distributed: value::as_bool(
            field(&values, 6, "prizesDistributed")?,
            "prizesDistributed",
        )?,
    })
}

pub fn decode_drawn_numbers(data: &[u8]) -> Result<Vec<u8>> {
    let values = crate::decode(abi().function(GET_DRAWN_NUMBERS)?, data)?;
    value::as_u8_vec(field(&values, 0, "drawnNumbers")?, "drawnNumbers")
}

pub fn decode_participants(data: &[u8]) -> Result<Participants> {
    let values = crate::decode(abi().function(GET_PARTICIPANTS)?, data)?;
    let players = value::as_address_vec(field(&values, 0, "players")?, "players")?;
    let cartela_ids = value::as_u64_vec(field(&values, 1, "cartelaIds")?, "cartelaIds")?;
    if players.len() != cartela_ids.len() {
        return Err(crate::AbiError::Decoding(format!(
            "getParticipants: {} players but {} cartela ids",
            players.len(),
            cartela_ids.len()
        )));
    }
    Ok(Participants {
        players,
        cartela_ids,
    })
}

pub fn decode_current_round_id(data: &[u8]) -> Result<u64> {
    let values = crate::decode(abi().function(CURRENT_ROUND_ID)?, data)?;
    value::as_u64(field(&values, 0, "roundId")?, "roundId")
}
