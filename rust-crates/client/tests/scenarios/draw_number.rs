use super::hundredth_ether;
use bingo_client::{
    ContractError,
    Error,
    model::{
        RoundId,
        RoundState,
    },
    test_helpers::*,
    tracker::{
        TxEvent,
        TxState,
    },
    view_model::Reconciled,
};
use futures::StreamExt;

const ROUND: RoundId = RoundId(3);

#[tokio::test(start_paused = true)]
async fn draw_number__round_3__confirms_and_appends_exactly_one_number() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().insert_round(3, RoundSeed::open(75, hundredth_ether()));
    ctx.chain().script_draws([42]);
    let before = ctx.game().view().refresh_round(ROUND).await.unwrap();

    // when
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let watcher = ctx
        .game()
        .connection()
        .tracker()
        .subscribe(action.hash())
        .unwrap();
    let reads_before = ctx.chain().calls("eth_call");
    let reconciled = action.settle(ctx.game().view()).await.unwrap();
    let reads_after = ctx.chain().calls("eth_call");
    let events: Vec<TxEvent> = watcher.collect().await;

    // then
    let states: Vec<TxState> = events.into_iter().map(|event| event.state).collect();
    assert_eq!(states[0], TxState::Submitted);
    assert_eq!(states[1], TxState::Pending);
    assert!(matches!(states[2], TxState::Confirmed(_)));
    assert_eq!(states.len(), 3);

    // one round refresh after confirmation: getRound, getDrawnNumbers, getParticipants
    assert_eq!(reads_after - reads_before, 3);

    let Reconciled::Round(after) = reconciled else {
        panic!("a draw reconciles its round, got {reconciled:?}");
    };
    assert!(before.drawn_numbers.is_empty());
    assert_eq!(after.drawn_numbers, vec![42]);
    assert_eq!(after.state, RoundState::Drawing);
    assert_eq!(after.entry_fee, hundredth_ether());
    assert!(!after.randomness_pending);
    assert_eq!(ctx.game().view().round(ROUND), Some(after));
    assert!(ctx.game().view().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn draw_number__not_yet_mined__view_shows_pending_record_only() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().set_mining(Mining::Manual);
    ctx.chain().insert_round(3, RoundSeed::open(75, hundredth_ether()));
    ctx.game().view().refresh_round(ROUND).await.unwrap();

    // when
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let mut watcher = ctx
        .game()
        .connection()
        .tracker()
        .subscribe(action.hash())
        .unwrap();
    watcher.next().await;
    let pending = watcher.next().await.unwrap();

    // then
    assert_eq!(pending.state, TxState::Pending);
    let snapshot = ctx.game().view().round(ROUND).unwrap();
    assert!(snapshot.drawn_numbers.is_empty());
    let records = ctx.game().view().pending();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].intent.to_string(), "draw number for round 3");

    // and once mined, the draw lands
    ctx.chain().mine();
    let reconciled = action.settle(ctx.game().view()).await.unwrap();
    let Reconciled::Round(after) = reconciled else {
        panic!("unexpected {reconciled:?}");
    };
    assert_eq!(after.drawn_numbers.len(), 1);
    assert!(ctx.game().view().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconcile__same_confirmation_twice__installs_equal_snapshots() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().insert_round(3, RoundSeed::open(75, hundredth_ether()));
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let hash = action.hash();
    let first = action.settle(ctx.game().view()).await.unwrap();

    // when
    let replay = ctx.game().connection().tracker().subscribe(hash).unwrap();
    let second = ctx.game().view().reconcile(replay).await.unwrap();

    // then
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn draw_number__finished_round__reverts_and_leaves_view_untouched() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().insert_round(
        3,
        RoundSeed {
            state: RoundState::Finished,
            drawn: vec![4, 8, 15],
            ..RoundSeed::open(75, hundredth_ether())
        },
    );
    let before = ctx.game().view().refresh_round(ROUND).await.unwrap();

    // when
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let result = action.settle(ctx.game().view()).await;

    // then
    assert_eq!(
        result.unwrap_err(),
        Error::Contract(ContractError::Reverted {
            reason: Some("BingoGame: round not active".to_string())
        })
    );
    assert_eq!(ctx.game().view().round(ROUND), Some(before));
    assert!(ctx.game().view().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn draw_number__randomness_outstanding__second_draw_reverts() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().hold_randomness(true);
    ctx.chain().insert_round(3, RoundSeed::open(75, hundredth_ether()));
    let first = ctx.game().draw_number(ROUND).await.unwrap();
    let Reconciled::Round(waiting) = first.settle(ctx.game().view()).await.unwrap() else {
        panic!("a draw reconciles its round");
    };
    assert!(waiting.randomness_pending);
    assert!(waiting.drawn_numbers.is_empty());

    // when
    let second = ctx.game().draw_number(ROUND).await.unwrap();
    let result = second.settle(ctx.game().view()).await;

    // then
    assert_eq!(
        result.unwrap_err(),
        Error::Contract(ContractError::Reverted {
            reason: Some("BingoGame: randomness pending".to_string())
        })
    );

    // and once the VRF answers, a refresh shows the number
    ctx.chain().fulfil_randomness(3);
    let round = ctx.game().view().refresh_round(ROUND).await.unwrap();
    assert_eq!(round.drawn_numbers.len(), 1);
    assert!(!round.randomness_pending);
}
