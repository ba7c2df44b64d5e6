use crate::{
    Error,
    Result,
    rpc::TxHash,
    tracker::TxState,
};
use alloy_primitives::{
    Address,
    U256,
};
use bingo_abi::{
    ContractKind,
    bingo_game::{
        Participants,
        RoundRecord,
    },
    cartela::CartelaRecord,
};
use std::{
    collections::HashSet,
    fmt,
    ops::BitOr,
    str::FromStr,
    time::Duration,
};

pub const MIN_CARD_NUMBER: u8 = 1;
pub const MAX_CARD_NUMBER: u8 = 99;
pub const MAX_CARD_SIDE: u8 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundState {
    Inactive,
    Open,
    Drawing,
    Finished,
    Cancelled,
}

impl TryFrom<u8> for RoundState {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(RoundState::Inactive),
            1 => Ok(RoundState::Open),
            2 => Ok(RoundState::Drawing),
            3 => Ok(RoundState::Finished),
            4 => Ok(RoundState::Cancelled),
            other => Err(Error::Decoding(format!("unknown round state {other}"))),
        }
    }
}

impl From<RoundState> for u8 {
    fn from(state: RoundState) -> Self {
        match state {
            RoundState::Inactive => 0,
            RoundState::Open => 1,
            RoundState::Drawing => 2,
            RoundState::Finished => 3,
            RoundState::Cancelled => 4,
        }
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Inactive => "inactive",
            RoundState::Open => "open",
            RoundState::Drawing => "drawing",
            RoundState::Finished => "finished",
            RoundState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Participant {
    pub player: Address,
    pub card: CardId,
}

/// Snapshot of one round, assembled from several reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub id: RoundId,
    pub state: RoundState,
    pub max_number: u8,
    pub entry_fee: U256,
    pub prize_pool: U256,
    /// In draw order.
    pub drawn_numbers: Vec<u8>,
    pub randomness_pending: bool,
    pub prizes_distributed: bool,
    pub participants: Vec<Participant>,
}

impl Round {
    pub fn from_records(
        record: RoundRecord,
        drawn_numbers: Vec<u8>,
        participants: Participants,
    ) -> Result<Self> {
        let participants = participants
            .players
            .into_iter()
            .zip(participants.cartela_ids)
            .map(|(player, card)| Participant {
                player,
                card: CardId(card),
            })
            .collect();
        Ok(Self {
            id: RoundId(record.id),
            state: RoundState::try_from(record.state)?,
            max_number: record.max_number,
            entry_fee: record.entry_fee,
            prize_pool: record.prize_pool,
            drawn_numbers,
            randomness_pending: record.randomness_pending,
            prizes_distributed: record.prizes_distributed,
            participants,
        })
    }

    pub fn has_drawn(&self, number: u8) -> bool {
        self.drawn_numbers.contains(&number)
    }

    pub fn remaining_draws(&self) -> usize {
        usize::from(self.max_number).saturating_sub(self.drawn_numbers.len())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CardDimensions {
    rows: u8,
    columns: u8,
}

impl CardDimensions {
    pub fn new(rows: u8, columns: u8) -> Result<Self> {
        let valid = 1..=MAX_CARD_SIDE;
        if !valid.contains(&rows) || !valid.contains(&columns) {
            return Err(Error::InvalidInput(format!(
                "card dimensions {rows}x{columns} outside 1..={MAX_CARD_SIDE}"
            )));
        }
        Ok(Self { rows, columns })
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn cells(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns)
    }
}

impl fmt::Display for CardDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

impl FromStr for CardDimensions {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (rows, columns) = raw
            .split_once('x')
            .ok_or_else(|| Error::InvalidInput(format!("expected ROWSxCOLUMNS, got `{raw}`")))?;
        let side = |value: &str| {
            value
                .trim()
                .parse::<u8>()
                .map_err(|e| Error::InvalidInput(format!("card side `{value}`: {e}")))
        };
        CardDimensions::new(side(rows)?, side(columns)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub owner: Address,
    pub dimensions: CardDimensions,
    pub numbers_registered: bool,
    pub in_use: bool,
    /// Row-major; empty until registered.
    pub numbers: Vec<u8>,
}

impl Card {
    pub fn from_records(record: CartelaRecord, numbers: Vec<u8>) -> Result<Self> {
        Ok(Self {
            id: CardId(record.id),
            owner: record.owner,
            dimensions: CardDimensions::new(record.rows, record.columns)
                .map_err(|e| Error::Decoding(format!("card {}: {e}", record.id)))?,
            numbers_registered: record.numbers_registered,
            in_use: record.in_use,
            numbers,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.numbers
            .chunks(usize::from(self.dimensions.columns()).max(1))
    }
}

/// Win conditions a round accepts, as the contract's bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WinPatterns(u8);

impl WinPatterns {
    pub const ROW: WinPatterns = WinPatterns(1);
    pub const COLUMN: WinPatterns = WinPatterns(2);
    pub const DIAGONAL: WinPatterns = WinPatterns(4);
    pub const CORNERS: WinPatterns = WinPatterns(8);
    pub const FULL_HOUSE: WinPatterns = WinPatterns(16);

    const NAMED: [(&'static str, WinPatterns); 5] = [
        ("row", WinPatterns::ROW),
        ("column", WinPatterns::COLUMN),
        ("diagonal", WinPatterns::DIAGONAL),
        ("corners", WinPatterns::CORNERS),
        ("full-house", WinPatterns::FULL_HOUSE),
    ];
    const ALL_BITS: u8 = 0b1_1111;

    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !Self::ALL_BITS != 0 {
            return Err(Error::InvalidInput(format!(
                "unknown win pattern bits {:#07b}",
                bits & !Self::ALL_BITS
            )));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: WinPatterns) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for WinPatterns {
    type Output = WinPatterns;

    fn bitor(self, rhs: Self) -> Self::Output {
        WinPatterns(self.0 | rhs.0)
    }
}

impl fmt::Display for WinPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, pattern)| self.contains(*pattern))
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Comma separated names, e.g. `row,full-house`.
impl FromStr for WinPatterns {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(WinPatterns::default(), |acc, name| {
                Self::NAMED
                    .iter()
                    .find(|(known, _)| *known == name)
                    .map(|(_, pattern)| acc | *pattern)
                    .ok_or_else(|| Error::InvalidInput(format!("unknown win pattern `{name}`")))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartRoundParams {
    pub max_number: u8,
    pub entry_fee: U256,
    pub timeout: Duration,
    pub win_patterns: WinPatterns,
}

impl StartRoundParams {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CARD_NUMBER..=MAX_CARD_NUMBER).contains(&self.max_number) {
            return Err(Error::InvalidInput(format!(
                "max number {} outside {MIN_CARD_NUMBER}..={MAX_CARD_NUMBER}",
                self.max_number
            )));
        }
        if self.win_patterns.is_empty() {
            return Err(Error::InvalidInput(
                "a round needs at least one win pattern".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the user asked for. Every write starts as one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    CreateCard { dimensions: CardDimensions },
    RegisterNumbers { card: CardId, numbers: Vec<u8> },
    TransferCard { card: CardId, to: Address },
    StartRound(StartRoundParams),
    DrawNumber { round: RoundId },
    JoinRound { round: RoundId, card: CardId },
    DistributePrizes { round: RoundId },
}

/// Which snapshot a confirmed intent invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Affected {
    Round(RoundId),
    Card(CardId),
    /// Id only known from the receipt's `CartelaCreated` log.
    NewCard,
    /// Id only known from the receipt's `RoundStarted` log.
    NewRound,
    RoundAndCard(RoundId, CardId),
}

impl Intent {
    pub fn affected(&self) -> Affected {
        match self {
            Intent::CreateCard { .. } => Affected::NewCard,
            Intent::RegisterNumbers { card, .. } | Intent::TransferCard { card, .. } => {
                Affected::Card(*card)
            }
            Intent::StartRound(_) => Affected::NewRound,
            Intent::DrawNumber { round } | Intent::DistributePrizes { round } => {
                Affected::Round(*round)
            }
            Intent::JoinRound { round, card } => Affected::RoundAndCard(*round, *card),
        }
    }

    pub fn contract(&self) -> ContractKind {
        match self {
            Intent::CreateCard { .. }
            | Intent::RegisterNumbers { .. }
            | Intent::TransferCard { .. } => ContractKind::Cartela,
            Intent::StartRound(_)
            | Intent::DrawNumber { .. }
            | Intent::JoinRound { .. }
            | Intent::DistributePrizes { .. } => ContractKind::BingoGame,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::CreateCard { dimensions } => write!(f, "create a {dimensions} card"),
            Intent::RegisterNumbers { card, numbers } => {
                write!(f, "register {} numbers on card {card}", numbers.len())
            }
            Intent::TransferCard { card, to } => write!(f, "transfer card {card} to {to}"),
            Intent::StartRound(params) => write!(
                f,
                "start a round (max {}, fee {} wei, {})",
                params.max_number, params.entry_fee, params.win_patterns
            ),
            Intent::DrawNumber { round } => write!(f, "draw number for round {round}"),
            Intent::JoinRound { round, card } => {
                write!(f, "join round {round} with card {card}")
            }
            Intent::DistributePrizes { round } => {
                write!(f, "distribute prizes for round {round}")
            }
        }
    }
}

/// A submitted write as the view shows it until a refresh supersedes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRecord {
    pub hash: TxHash,
    pub intent: Intent,
    pub state: TxState,
}

/// Client-side checks before encoding. The contract stays authoritative.
pub fn validate_card_numbers(dimensions: CardDimensions, numbers: &[u8]) -> Result<()> {
    if numbers.len() != dimensions.cells() {
        return Err(Error::InvalidInput(format!(
            "a {dimensions} card takes {} numbers, got {}",
            dimensions.cells(),
            numbers.len()
        )));
    }
    if let Some(out_of_range) = numbers
        .iter()
        .find(|n| !(MIN_CARD_NUMBER..=MAX_CARD_NUMBER).contains(n))
    {
        return Err(Error::InvalidInput(format!(
            "number {out_of_range} outside {MIN_CARD_NUMBER}..={MAX_CARD_NUMBER}"
        )));
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    if let Some(duplicate) = numbers.iter().find(|n| !seen.insert(**n)) {
        return Err(Error::InvalidInput(format!(
            "number {duplicate} appears more than once"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
