#![allow(non_snake_case)]

use super::*;

fn five_by_five() -> CardDimensions {
    CardDimensions::new(5, 5).unwrap()
}

#[test]
fn validate_card_numbers__25_unique_values__passes() {
    // given
    let numbers: Vec<u8> = (1..=25).collect();

    // when
    let result = validate_card_numbers(five_by_five(), &numbers);

    // then
    assert!(result.is_ok());
}

#[test]
fn validate_card_numbers__wrong_count__is_invalid_input() {
    // given
    let numbers: Vec<u8> = (1..=24).collect();

    // when
    let result = validate_card_numbers(five_by_five(), &numbers);

    // then
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn validate_card_numbers__duplicate__is_invalid_input() {
    // given
    let mut numbers: Vec<u8> = (1..=25).collect();
    numbers[24] = 3;

    // when
    let result = validate_card_numbers(five_by_five(), &numbers);

    // then
    let err = result.unwrap_err();
    assert!(err.to_string().contains("3 appears more than once"));
}

#[test]
fn validate_card_numbers__out_of_range__is_invalid_input() {
    // given
    let mut numbers: Vec<u8> = (1..=25).collect();
    numbers[0] = 0;

    // when
    let result = validate_card_numbers(five_by_five(), &numbers);

    // then
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn card_dimensions__zero_or_oversized__rejected() {
    assert!(CardDimensions::new(0, 5).is_err());
    assert!(CardDimensions::new(5, 11).is_err());
    assert!(CardDimensions::new(10, 10).is_ok());
}

#[test]
fn card_dimensions__from_str__parses_rows_by_columns() {
    // given
    let raw = "3x4";

    // when
    let dims: CardDimensions = raw.parse().unwrap();

    // then
    assert_eq!((dims.rows(), dims.columns(), dims.cells()), (3, 4, 12));
}

#[test]
fn win_patterns__from_str__combines_named_flags() {
    // given
    let raw = "row, full-house";

    // when
    let patterns: WinPatterns = raw.parse().unwrap();

    // then
    assert_eq!(patterns.bits(), 17);
    assert_eq!(patterns.to_string(), "row|full-house");
}

#[test]
fn win_patterns__unknown_bits__rejected() {
    assert!(WinPatterns::from_bits(0b10_0000).is_err());
    assert_eq!(
        WinPatterns::from_bits(0b0_0110).unwrap(),
        WinPatterns::COLUMN | WinPatterns::DIAGONAL
    );
}

#[test]
fn round_state__try_from__maps_contract_codes() {
    assert_eq!(RoundState::try_from(2).unwrap(), RoundState::Drawing);
    assert!(matches!(RoundState::try_from(9), Err(Error::Decoding(_))));
}

#[test]
fn intent__display__reads_as_a_sentence() {
    // given
    let intent = Intent::DrawNumber { round: RoundId(3) };

    // when
    let text = intent.to_string();

    // then
    assert_eq!(text, "draw number for round 3");
    assert_eq!(intent.affected(), Affected::Round(RoundId(3)));
}

#[test]
fn intent__join_round__affects_round_and_card() {
    // given
    let intent = Intent::JoinRound {
        round: RoundId(3),
        card: CardId(7),
    };

    // when
    let affected = intent.affected();

    // then
    assert_eq!(affected, Affected::RoundAndCard(RoundId(3), CardId(7)));
    assert_eq!(intent.contract(), ContractKind::BingoGame);
}
