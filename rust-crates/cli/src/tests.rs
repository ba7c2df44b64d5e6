#![allow(non_snake_case)]

use super::*;
use alloy_primitives::B256;
use bingo_client::{
    model::{
        Card,
        CardId,
        Intent,
        Participant,
        Round,
        RoundId,
        RoundState,
    },
    tracker::{
        ConfirmedTx,
        FailureReason,
        TxEvent,
        TxState,
    },
};
use std::time::Duration;

fn hundredth_ether() -> U256 {
    U256::from(10_000_000_000_000_000u64)
}

fn round_3() -> Round {
    Round {
        id: RoundId(3),
        state: RoundState::Drawing,
        max_number: 75,
        entry_fee: hundredth_ether(),
        prize_pool: hundredth_ether() * U256::from(2u64),
        drawn_numbers: vec![42, 7],
        randomness_pending: false,
        prizes_distributed: false,
        participants: vec![Participant {
            player: Address::repeat_byte(0xa1),
            card: CardId(7),
        }],
    }
}

fn draw_event(state: TxState) -> TxEvent {
    TxEvent {
        hash: B256::repeat_byte(0x11),
        intent: Intent::DrawNumber { round: RoundId(3) },
        state,
    }
}

#[test]
fn parse__no_network_flag__is_rejected() {
    // when
    let result = Args::try_parse_from(["bingo", "draw", "3"]);

    // then
    assert!(result.is_err());
}

#[test]
fn parse__two_network_flags__is_rejected() {
    // when
    let result = Args::try_parse_from(["bingo", "--local", "--dev", "draw", "3"]);

    // then
    assert!(result.is_err());
}

#[test]
fn parse__register_numbers__splits_comma_list() {
    // when
    let args =
        Args::try_parse_from(["bingo", "--local", "register-numbers", "7", "1,2,3,4"]).unwrap();

    // then
    assert_eq!(args.env(), DeploymentEnv::Local);
    match args.command {
        Command::RegisterNumbers { card, numbers } => {
            assert_eq!(card, 7);
            assert_eq!(numbers, vec![1, 2, 3, 4]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse__start_round__reads_fee_in_ether_and_patterns() {
    // when
    let args = Args::try_parse_from([
        "bingo",
        "--test",
        "start-round",
        "--entry-fee",
        "0.01",
        "--patterns",
        "row,full-house",
    ])
    .unwrap();

    // then
    assert_eq!(args.env(), DeploymentEnv::Test);
    match args.command {
        Command::StartRound {
            max_number,
            entry_fee,
            patterns,
            ..
        } => {
            assert_eq!(max_number, 75);
            assert_eq!(entry_fee, hundredth_ether());
            assert_eq!(patterns, WinPatterns::ROW | WinPatterns::FULL_HOUSE);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse__create_card__reads_dimensions() {
    // when
    let args = Args::try_parse_from(["bingo", "--dev", "create-card", "5x5"]).unwrap();

    // then
    match args.command {
        Command::CreateCard { dimensions } => {
            assert_eq!(dimensions, CardDimensions::new(5, 5).unwrap());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse__card_too_wide__is_rejected() {
    // when
    let result = Args::try_parse_from(["bingo", "--dev", "create-card", "5x11"]);

    // then
    assert!(result.is_err());
}

#[test]
fn parse__tracker_overrides__are_kept() {
    // when
    let args = Args::try_parse_from([
        "bingo",
        "--local",
        "--poll-interval-ms",
        "250",
        "--max-wait-secs",
        "30",
        "--confirmations",
        "3",
        "current-round",
    ])
    .unwrap();

    // then
    assert_eq!(args.poll_interval_ms, Some(250));
    assert_eq!(args.max_wait_secs, Some(30));
    assert_eq!(args.confirmations, Some(3));
}

#[test]
fn ether__whole_and_fractional_amounts__drop_trailing_zeros() {
    assert_eq!(render::ether(hundredth_ether()), "0.01 ETH");
    assert_eq!(render::ether(U256::ZERO), "0 ETH");
    assert_eq!(
        render::ether(U256::from(1_500_000_000_000_000_000u64)),
        "1.5 ETH"
    );
}

#[test]
fn round__drawing__lists_draws_and_players() {
    // when
    let rendered = render::round(&round_3());

    // then
    assert!(rendered.starts_with("round 3 (drawing)"));
    assert!(rendered.contains("entry fee    0.01 ETH"));
    assert!(rendered.contains("drawn        42, 7 (2 of 75)"));
    assert!(rendered.contains("with card 7"));
    assert!(!rendered.contains("randomness"));
}

#[test]
fn card__registered__renders_grid_by_row() {
    // given
    let card = Card {
        id: CardId(7),
        owner: Address::repeat_byte(0xa1),
        dimensions: CardDimensions::new(2, 3).unwrap(),
        numbers_registered: true,
        in_use: false,
        numbers: vec![1, 2, 3, 40, 50, 60],
    };

    // when
    let rendered = render::card(&card);

    // then
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "   1  2  3");
    assert_eq!(lines[2], "  40 50 60");
}

#[test]
fn card__unregistered__says_so() {
    // given
    let card = Card {
        id: CardId(8),
        owner: Address::repeat_byte(0xb0),
        dimensions: CardDimensions::new(5, 5).unwrap(),
        numbers_registered: false,
        in_use: false,
        numbers: Vec::new(),
    };

    // when
    let rendered = render::card(&card);

    // then
    assert!(rendered.contains("numbers not registered yet"));
}

#[test]
fn tx_event__each_state__names_the_intent() {
    let cases = [
        (TxState::Submitted, "submitted: draw number for round 3"),
        (TxState::Pending, "pending: draw number for round 3"),
        (
            TxState::Confirmed(ConfirmedTx {
                block_number: 17,
                logs: Vec::new(),
            }),
            "confirmed in block 17: draw number for round 3",
        ),
        (
            TxState::Failed(FailureReason::Reverted {
                reason: Some("BingoGame: round not active".to_string()),
            }),
            "reverted: BingoGame: round not active: draw number for round 3",
        ),
    ];
    for (state, expected) in cases {
        assert_eq!(render::tx_event(&draw_event(state)), expected);
    }
}

#[test]
fn tx_event__timeout__points_at_block_explorer() {
    // given
    let event = draw_event(TxState::Failed(FailureReason::Timeout {
        waited: Duration::from_secs(120),
    }));

    // when
    let rendered = render::tx_event(&event);

    // then
    assert!(rendered.contains("outcome unknown after 120s, check a block explorer"));
}
