use crate::{
    AbiError,
    Result,
    bingo_game,
    binding::DecodedLog,
    cartela,
    value::{
        self,
        field,
    },
};
use alloy_primitives::{
    Address,
    B256,
    Bytes,
    U256,
};

/// Events emitted by either contract, decoded from raw logs.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum GameEvent {
    CartelaCreated {
        cartela_id: u64,
        owner: Address,
        rows: u8,
        columns: u8,
    },
    NumbersRegistered {
        cartela_id: u64,
        numbers: Vec<u8>,
    },
    RoundStarted {
        round_id: u64,
        max_number: u8,
        entry_fee: U256,
    },
    RandomnessRequested {
        round_id: u64,
        request_id: U256,
    },
    NumberDrawn {
        round_id: u64,
        number: u8,
    },
    PlayerJoined {
        round_id: u64,
        player: Address,
        cartela_id: u64,
    },
    WinnerFound {
        round_id: u64,
        winner: Address,
        cartela_id: u64,
    },
    RoundFinalized {
        round_id: u64,
        prize_pool: U256,
    },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::CartelaCreated { .. } => cartela::CARTELA_CREATED,
            GameEvent::NumbersRegistered { .. } => cartela::NUMBERS_REGISTERED,
            GameEvent::RoundStarted { .. } => bingo_game::ROUND_STARTED,
            GameEvent::RandomnessRequested { .. } => bingo_game::RANDOMNESS_REQUESTED,
            GameEvent::NumberDrawn { .. } => bingo_game::NUMBER_DRAWN,
            GameEvent::PlayerJoined { .. } => bingo_game::PLAYER_JOINED,
            GameEvent::WinnerFound { .. } => bingo_game::WINNER_FOUND,
            GameEvent::RoundFinalized { .. } => bingo_game::ROUND_FINALIZED,
        }
    }

    pub fn round_id(&self) -> Option<u64> {
        match self {
            GameEvent::RoundStarted { round_id, .. }
            | GameEvent::RandomnessRequested { round_id, .. }
            | GameEvent::NumberDrawn { round_id, .. }
            | GameEvent::PlayerJoined { round_id, .. }
            | GameEvent::WinnerFound { round_id, .. }
            | GameEvent::RoundFinalized { round_id, .. } => Some(*round_id),
            GameEvent::CartelaCreated { .. } | GameEvent::NumbersRegistered { .. } => None,
        }
    }

    /// Topics and data as the emitting contract would log them.
    pub fn encode(&self) -> Result<(Vec<B256>, Bytes)> {
        let (indexed, body) = match self {
            GameEvent::CartelaCreated {
                cartela_id,
                owner,
                rows,
                columns,
            } => (
                vec![value::id(*cartela_id), value::address(*owner)],
                vec![value::uint8(*rows), value::uint8(*columns)],
            ),
            GameEvent::NumbersRegistered {
                cartela_id,
                numbers,
            } => (
                vec![value::id(*cartela_id)],
                vec![value::uint8_array(numbers)],
            ),
            GameEvent::RoundStarted {
                round_id,
                max_number,
                entry_fee,
            } => (
                vec![value::id(*round_id)],
                vec![value::uint8(*max_number), value::uint256(*entry_fee)],
            ),
            GameEvent::RandomnessRequested {
                round_id,
                request_id,
            } => (vec![value::id(*round_id)], vec![value::uint256(*request_id)]),
            GameEvent::NumberDrawn { round_id, number } => {
                (vec![value::id(*round_id)], vec![value::uint8(*number)])
            }
            GameEvent::PlayerJoined {
                round_id,
                player,
                cartela_id,
            } => (
                vec![value::id(*round_id), value::address(*player)],
                vec![value::id(*cartela_id)],
            ),
            GameEvent::WinnerFound {
                round_id,
                winner,
                cartela_id,
            } => (
                vec![value::id(*round_id), value::address(*winner)],
                vec![value::id(*cartela_id)],
            ),
            GameEvent::RoundFinalized {
                round_id,
                prize_pool,
            } => (vec![value::id(*round_id)], vec![value::uint256(*prize_pool)]),
        };
        signature_for(self.name())?.encode_log(&indexed, &body)
    }
}

/// Decodes a raw log from either contract. Logs whose topic0 belongs to
/// neither registry yield `Ok(None)`.
pub fn decode_log(topics: &[B256], data: &[u8]) -> Result<Option<GameEvent>> {
    let Some(topic0) = topics.first() else {
        return Ok(None);
    };
    let Some(signature) = cartela::abi()
        .event_by_topic(topic0)
        .or_else(|| bingo_game::abi().event_by_topic(topic0))
    else {
        return Ok(None);
    };
    let log = signature.decode_log(topics, data)?;
    from_decoded(signature.name(), &log).map(Some)
}

fn signature_for(name: &str) -> Result<&'static crate::EventSignature> {
    cartela::abi()
        .event(name)
        .or_else(|_| bingo_game::abi().event(name))
}

fn from_decoded(name: &str, log: &DecodedLog) -> Result<GameEvent> {
    let topics = log.indexed.as_slice();
    let body = log.body.as_slice();
    let event = match name {
        cartela::CARTELA_CREATED => GameEvent::CartelaCreated {
            cartela_id: value::as_u64(field(topics, 0, "cartelaId")?, "cartelaId")?,
            owner: value::as_address(field(topics, 1, "owner")?, "owner")?,
            rows: value::as_u8(field(body, 0, "rows")?, "rows")?,
            columns: value::as_u8(field(body, 1, "columns")?, "columns")?,
        },
        cartela::NUMBERS_REGISTERED => GameEvent::NumbersRegistered {
            cartela_id: value::as_u64(field(topics, 0, "cartelaId")?, "cartelaId")?,
            numbers: value::as_u8_vec(field(body, 0, "numbers")?, "numbers")?,
        },
        bingo_game::ROUND_STARTED => GameEvent::RoundStarted {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            max_number: value::as_u8(field(body, 0, "maxNumber")?, "maxNumber")?,
            entry_fee: value::as_u256(field(body, 1, "entryFee")?, "entryFee")?,
        },
        bingo_game::RANDOMNESS_REQUESTED => GameEvent::RandomnessRequested {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            request_id: value::as_u256(field(body, 0, "requestId")?, "requestId")?,
        },
        bingo_game::NUMBER_DRAWN => GameEvent::NumberDrawn {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            number: value::as_u8(field(body, 0, "number")?, "number")?,
        },
        bingo_game::PLAYER_JOINED => GameEvent::PlayerJoined {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            player: value::as_address(field(topics, 1, "player")?, "player")?,
            cartela_id: value::as_u64(field(body, 0, "cartelaId")?, "cartelaId")?,
        },
        bingo_game::WINNER_FOUND => GameEvent::WinnerFound {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            winner: value::as_address(field(topics, 1, "winner")?, "winner")?,
            cartela_id: value::as_u64(field(body, 0, "cartelaId")?, "cartelaId")?,
        },
        bingo_game::ROUND_FINALIZED => GameEvent::RoundFinalized {
            round_id: value::as_u64(field(topics, 0, "roundId")?, "roundId")?,
            prize_pool: value::as_u256(field(body, 0, "prizePool")?, "prizePool")?,
        },
        other => {
            return Err(AbiError::Registry(format!(
                "event `{other}` is registered but has no decoder"
            )));
        }
    };
    Ok(event)
}
