use super::hundredth_ether;
use bingo_abi::events::GameEvent;
use bingo_client::{
    model::{
        CardDimensions,
        CardId,
        RoundId,
        RoundState,
        StartRoundParams,
        WinPatterns,
    },
    test_helpers::*,
    view_model::Reconciled,
};
use std::time::Duration;

fn row_round() -> StartRoundParams {
    StartRoundParams {
        max_number: 10,
        entry_fee: hundredth_ether(),
        timeout: Duration::from_secs(600),
        win_patterns: WinPatterns::ROW | WinPatterns::FULL_HOUSE,
    }
}

#[tokio::test(start_paused = true)]
async fn create_card__paid_at_current_price__resolves_new_id_from_receipt() {
    let ctx = TestContext::new().await;
    // given
    let dimensions = CardDimensions::new(5, 5).unwrap();

    // when
    let action = ctx.game().create_card(dimensions).await.unwrap();
    let reconciled = action.settle(ctx.game().view()).await.unwrap();

    // then
    let Reconciled::Card(card) = reconciled else {
        panic!("card creation reconciles the new card, got {reconciled:?}");
    };
    assert_eq!(card.id, CardId(1));
    assert_eq!(card.owner, alice());
    assert_eq!(card.dimensions, dimensions);
    assert!(!card.numbers_registered);
}

#[tokio::test(start_paused = true)]
async fn transfer_card__to_bob__changes_owner() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().insert_card(7, alice(), 3, 3, None);

    // when
    let reconciled = ctx
        .game()
        .transfer_card(CardId(7), bob())
        .await
        .unwrap()
        .settle(ctx.game().view())
        .await
        .unwrap();

    // then
    let Reconciled::Card(card) = reconciled else {
        panic!("unexpected {reconciled:?}");
    };
    assert_eq!(card.owner, bob());
}

#[tokio::test]
async fn current_round__before_any_round__is_none() {
    let ctx = TestContext::new().await;

    // when
    let current = ctx.game().current_round().await.unwrap();

    // then
    assert_eq!(current, None);
}

#[tokio::test(start_paused = true)]
async fn full_round__start_join_draw_to_win_and_distribute__settles_every_step() {
    let ctx = TestContext::new().await;
    let game = ctx.game();
    let view = game.view();

    // given
    let Reconciled::Round(round) = game
        .start_round(row_round())
        .await
        .unwrap()
        .settle(view)
        .await
        .unwrap()
    else {
        panic!("starting a round reconciles it");
    };
    assert_eq!(round.id, RoundId(1));
    assert_eq!(round.state, RoundState::Open);
    let round_id = round.id;

    let Reconciled::Card(card) = game
        .create_card(CardDimensions::new(3, 3).unwrap())
        .await
        .unwrap()
        .settle(view)
        .await
        .unwrap()
    else {
        panic!("creating a card reconciles it");
    };
    game.register_numbers(card.id, (1..=9).collect())
        .await
        .unwrap()
        .settle(view)
        .await
        .unwrap();

    // when
    let Reconciled::Both(joined, in_play) = game
        .join_round(round_id, card.id)
        .await
        .unwrap()
        .settle(view)
        .await
        .unwrap()
    else {
        panic!("joining reconciles round and card");
    };
    ctx.chain().script_draws([1, 2, 3]);
    for _ in 0..3 {
        game.draw_number(round_id)
            .await
            .unwrap()
            .settle(view)
            .await
            .unwrap();
    }
    let finished = view.round(round_id).unwrap();
    let distributed = game
        .distribute_prizes(round_id)
        .await
        .unwrap()
        .settle(view)
        .await
        .unwrap();

    // then
    assert_eq!(joined.prize_pool, hundredth_ether());
    assert_eq!(joined.participants.len(), 1);
    assert_eq!(joined.participants[0].player, alice());
    assert!(in_play.in_use);

    assert_eq!(finished.drawn_numbers, vec![1, 2, 3]);
    assert_eq!(finished.state, RoundState::Finished);

    let Reconciled::Round(distributed) = distributed else {
        panic!("distribution reconciles the round");
    };
    assert!(distributed.prizes_distributed);
    assert_eq!(game.current_round().await.unwrap(), Some(distributed));

    let history = game.round_history(round_id, 0).await.unwrap();
    assert!(matches!(history.first(), Some(GameEvent::RoundStarted { .. })));
    assert!(matches!(history.last(), Some(GameEvent::RoundFinalized { .. })));
    assert!(history.contains(&GameEvent::WinnerFound {
        round_id: 1,
        winner: alice(),
        cartela_id: card.id.0,
    }));
    let drawn: Vec<u8> = history
        .iter()
        .filter_map(|event| match event {
            GameEvent::NumberDrawn { number, .. } => Some(*number),
            _ => None,
        })
        .collect();
    assert_eq!(drawn, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn join_round__pays_the_rounds_entry_fee() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain()
        .insert_round(3, RoundSeed::open(75, hundredth_ether()));
    ctx.chain()
        .insert_card(7, alice(), 2, 2, Some(vec![10, 20, 30, 40]));

    // when
    let action = ctx.game().join_round(RoundId(3), CardId(7)).await.unwrap();
    let reconciled = action.settle(ctx.game().view()).await.unwrap();

    // then
    let Reconciled::Both(round, card) = reconciled else {
        panic!("unexpected {reconciled:?}");
    };
    assert_eq!(round.prize_pool, hundredth_ether());
    assert_eq!(round.participants[0].card, CardId(7));
    assert!(card.in_use);
}
