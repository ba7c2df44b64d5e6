use bingo_client::{
    ContractError,
    Error,
    ErrorKind,
    model::{
        CardDimensions,
        CardId,
    },
    test_helpers::*,
    view_model::Reconciled,
};

const CARD: CardId = CardId(7);

/// 25 distinct values in 1..=99.
fn card_7_numbers() -> Vec<u8> {
    (1..=25).map(|i| i * 3 + 20).collect()
}

async fn context_with_blank_card_7() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.chain().insert_card(7, alice(), 5, 5, None);
    ctx
}

#[tokio::test(start_paused = true)]
async fn register_numbers__card_7__registers_the_full_set() {
    let ctx = context_with_blank_card_7().await;
    // given
    let numbers = card_7_numbers();

    // when
    let action = ctx
        .game()
        .register_numbers(CARD, numbers.clone())
        .await
        .unwrap();
    let reconciled = action.settle(ctx.game().view()).await.unwrap();

    // then
    let Reconciled::Card(card) = reconciled else {
        panic!("registration reconciles its card, got {reconciled:?}");
    };
    assert!(card.numbers_registered);
    assert_eq!(card.dimensions, CardDimensions::new(5, 5).unwrap());
    assert_eq!(card.numbers, numbers);
    assert_eq!(card.rows().count(), 5);
}

#[tokio::test(start_paused = true)]
async fn register_numbers__second_registration__surfaces_revert_and_keeps_first_set() {
    let ctx = context_with_blank_card_7().await;
    // given
    let first = card_7_numbers();
    ctx.game()
        .register_numbers(CARD, first.clone())
        .await
        .unwrap()
        .settle(ctx.game().view())
        .await
        .unwrap();

    // when
    let second: Vec<u8> = (1..=25).collect();
    let result = ctx
        .game()
        .register_numbers(CARD, second)
        .await
        .unwrap()
        .settle(ctx.game().view())
        .await;

    // then
    assert_eq!(
        result.unwrap_err(),
        Error::Contract(ContractError::Reverted {
            reason: Some("Cartela: numbers already registered".to_string())
        })
    );
    assert_eq!(ctx.game().view().card(CARD).unwrap().numbers, first);
    let on_chain = ctx.game().view().refresh_card(CARD).await.unwrap();
    assert_eq!(on_chain.numbers, first);
}

#[tokio::test]
async fn register_numbers__wrong_count__rejected_before_broadcast() {
    let ctx = context_with_blank_card_7().await;
    // given
    let mut numbers = card_7_numbers();
    numbers.pop();

    // when
    let result = ctx.game().register_numbers(CARD, numbers).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn register_numbers__duplicate_value__rejected_before_broadcast() {
    let ctx = context_with_blank_card_7().await;
    // given
    let mut numbers = card_7_numbers();
    numbers[24] = numbers[0];

    // when
    let result = ctx.game().register_numbers(CARD, numbers).await;

    // then
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(err.to_string().contains("appears more than once"));
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn register_numbers__value_outside_range__rejected_before_broadcast() {
    let ctx = context_with_blank_card_7().await;
    // given
    let mut numbers = card_7_numbers();
    numbers[3] = 100;

    // when
    let result = ctx.game().register_numbers(CARD, numbers).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 0);
}

#[tokio::test(start_paused = true)]
async fn register_numbers__someone_elses_card__reverts_not_owner() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().insert_card(7, bob(), 5, 5, None);

    // when
    let result = ctx
        .game()
        .register_numbers(CARD, card_7_numbers())
        .await
        .unwrap()
        .settle(ctx.game().view())
        .await;

    // then
    assert_eq!(
        result.unwrap_err(),
        Error::Contract(ContractError::Reverted {
            reason: Some("Cartela: not owner".to_string())
        })
    );
}

#[tokio::test]
async fn register_numbers__unknown_card__is_invalid_input() {
    let ctx = TestContext::new().await;

    // when
    let result = ctx.game().register_numbers(CARD, card_7_numbers()).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
}
