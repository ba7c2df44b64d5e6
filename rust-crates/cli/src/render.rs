//! Plain-text rendering of snapshots and lifecycle events.

use alloy_primitives::{
    U256,
    utils::format_ether,
};
use bingo_abi::events::GameEvent;
use bingo_client::{
    model::{
        Card,
        Round,
    },
    tracker::{
        FailureReason,
        TxEvent,
        TxState,
    },
    view_model::Reconciled,
};
use deployments::DeploymentRecord;
use std::{
    fmt::Write,
    path::Path,
};

pub fn ether(wei: U256) -> String {
    let raw = format_ether(wei);
    let trimmed = match raw.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => whole.to_string(),
            fraction => format!("{whole}.{fraction}"),
        },
        None => raw,
    };
    format!("{trimmed} ETH")
}

fn joined(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn round(round: &Round) -> String {
    let mut out = format!("round {} ({})\n", round.id, round.state);
    let _ = writeln!(out, "  max number   {}", round.max_number);
    let _ = writeln!(out, "  entry fee    {}", ether(round.entry_fee));
    let _ = writeln!(out, "  prize pool   {}", ether(round.prize_pool));
    if round.drawn_numbers.is_empty() {
        let _ = writeln!(out, "  drawn        none yet");
    } else {
        let _ = writeln!(
            out,
            "  drawn        {} ({} of {})",
            joined(&round.drawn_numbers),
            round.drawn_numbers.len(),
            round.max_number
        );
    }
    if round.randomness_pending {
        let _ = writeln!(out, "  randomness   waiting for the VRF");
    }
    if round.prizes_distributed {
        let _ = writeln!(out, "  prizes       distributed");
    }
    let _ = write!(out, "  players      {}", round.participants.len());
    for participant in &round.participants {
        let _ = write!(
            out,
            "\n    {} with card {}",
            participant.player, participant.card
        );
    }
    out
}

pub fn card(card: &Card) -> String {
    let mut out = format!(
        "card {} ({}) owned by {}",
        card.id, card.dimensions, card.owner
    );
    if card.in_use {
        out.push_str(", in play");
    }
    if !card.numbers_registered {
        out.push_str("\n  numbers not registered yet");
        return out;
    }
    for row in card.rows() {
        out.push_str("\n ");
        for number in row {
            let _ = write!(out, " {number:>2}");
        }
    }
    out
}

pub fn reconciled(reconciled: &Reconciled) -> String {
    match reconciled {
        Reconciled::Round(r) => round(r),
        Reconciled::Card(c) => card(c),
        Reconciled::Both(r, c) => format!("{}\n{}", round(r), card(c)),
    }
}

pub fn tx_event(event: &TxEvent) -> String {
    let state = match &event.state {
        TxState::Submitted => "submitted".to_string(),
        TxState::Pending => "pending".to_string(),
        TxState::Confirmed(confirmed) => format!("confirmed in block {}", confirmed.block_number),
        TxState::Failed(FailureReason::Reverted { reason: Some(reason) }) => {
            format!("reverted: {reason}")
        }
        TxState::Failed(FailureReason::Reverted { reason: None }) => {
            "reverted without a reason".to_string()
        }
        TxState::Failed(FailureReason::Dropped) => "dropped by the node".to_string(),
        TxState::Failed(FailureReason::Timeout { waited }) => format!(
            "outcome unknown after {}s, check a block explorer",
            waited.as_secs()
        ),
    };
    format!("{state}: {}", event.intent)
}

pub fn game_event(event: &GameEvent) -> String {
    match event {
        GameEvent::CartelaCreated {
            cartela_id,
            owner,
            rows,
            columns,
        } => format!("card {cartela_id} ({rows}x{columns}) created for {owner}"),
        GameEvent::NumbersRegistered {
            cartela_id,
            numbers,
        } => format!("card {cartela_id} registered {}", joined(numbers)),
        GameEvent::RoundStarted {
            round_id,
            max_number,
            entry_fee,
        } => format!(
            "round {round_id} started, numbers up to {max_number}, entry fee {}",
            ether(*entry_fee)
        ),
        GameEvent::RandomnessRequested {
            round_id,
            request_id,
        } => format!("round {round_id} requested randomness ({request_id})"),
        GameEvent::NumberDrawn { round_id, number } => {
            format!("round {round_id} drew {number}")
        }
        GameEvent::PlayerJoined {
            round_id,
            player,
            cartela_id,
        } => format!("{player} joined round {round_id} with card {cartela_id}"),
        GameEvent::WinnerFound {
            round_id,
            winner,
            cartela_id,
        } => format!("{winner} won round {round_id} with card {cartela_id}"),
        GameEvent::RoundFinalized {
            round_id,
            prize_pool,
        } => format!("round {round_id} paid out {}", ether(*prize_pool)),
    }
}

pub fn deployment(record: &DeploymentRecord, path: &Path) -> String {
    format!(
        "recorded chain {} at {}\n  cartela     {}\n  bingo game  {}\n  saved to    {}",
        record.chain_id,
        record.network_url,
        record.cartela_contract,
        record.bingo_game_contract,
        path.display()
    )
}
