use super::hundredth_ether;
use alloy_primitives::U256;
use bingo_client::{
    Error,
    ErrorKind,
    UserConfirmed,
    model::{
        CardId,
        RoundId,
    },
    test_helpers::*,
    view_model::Reconciled,
};

const ROUND: RoundId = RoundId(3);

async fn context_with_round_3() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.chain()
        .insert_round(3, RoundSeed::open(75, hundredth_ether()));
    ctx
}

#[tokio::test]
async fn draw_number__wallet_rejects__is_user_rejected_and_nothing_pending() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain()
        .fail_next("eth_sendTransaction", InjectedFailure::UserRejected);

    // when
    let result = ctx.game().draw_number(ROUND).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UserRejected);
    assert!(ctx.game().view().pending().is_empty());
}

#[tokio::test]
async fn draw_number__endpoint_unreachable__is_network_error_and_not_retried() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain()
        .fail_next("eth_sendTransaction", InjectedFailure::Unreachable);

    // when
    let result = ctx.game().draw_number(ROUND).await;

    // then
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_retryable());
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 1);
    assert!(ctx.chain().pending_hashes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn draw_number__nonce_conflict__needs_confirmation_then_resubmits() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain()
        .fail_next("eth_sendTransaction", InjectedFailure::NonceTooLow);
    let err = ctx.game().draw_number(ROUND).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonceConflict);
    assert!(err.needs_user_confirmation());
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 1);

    // when
    let action = ctx
        .game()
        .resubmit(
            bingo_client::model::Intent::DrawNumber { round: ROUND },
            UserConfirmed::acknowledged(),
        )
        .await
        .unwrap();
    let reconciled = action.settle(ctx.game().view()).await.unwrap();

    // then
    let Reconciled::Round(round) = reconciled else {
        panic!("unexpected {reconciled:?}");
    };
    assert_eq!(round.drawn_numbers.len(), 1);
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 2);
}

#[tokio::test]
async fn join_round__replacement_underpriced__is_nonce_conflict() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain()
        .insert_card(7, alice(), 2, 2, Some(vec![1, 2, 3, 4]));
    ctx.chain().fail_next(
        "eth_sendTransaction",
        InjectedFailure::ReplacementUnderpriced,
    );

    // when
    let result = ctx.game().join_round(ROUND, CardId(7)).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NonceConflict);
}

#[tokio::test]
async fn join_round__balance_below_fee__reports_shortfall() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain()
        .insert_card(7, alice(), 2, 2, Some(vec![1, 2, 3, 4]));
    ctx.chain().fail_next(
        "eth_sendTransaction",
        InjectedFailure::InsufficientFunds {
            have: 1_000,
            want: 2_500,
        },
    );

    // when
    let result = ctx.game().join_round(ROUND, CardId(7)).await;

    // then
    match result.unwrap_err() {
        Error::InsufficientFunds { shortfall, .. } => {
            assert_eq!(shortfall, Some(U256::from(1_500u64)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn draw_number__never_mined__times_out_as_unknown_outcome() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain().set_mining(Mining::Manual);
    let before = ctx.game().view().refresh_round(ROUND).await.unwrap();

    // when
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let hash = action.hash();
    let err = action.settle(ctx.game().view()).await.unwrap_err();

    // then
    assert!(matches!(err, Error::Timeout { hash: timed_out, .. } if timed_out == hash));
    assert!(err.needs_user_confirmation());
    assert!(err.to_string().contains("check a block explorer"));
    assert_eq!(ctx.game().view().round(ROUND), Some(before));
    assert!(ctx.game().view().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn draw_number__dropped_from_mempool__is_network_error() {
    let ctx = context_with_round_3().await;
    // given
    ctx.chain().set_mining(Mining::Manual);
    let action = ctx.game().draw_number(ROUND).await.unwrap();
    let hash = action.hash();
    let mut watcher = ctx
        .game()
        .connection()
        .tracker()
        .subscribe(hash)
        .unwrap();
    watcher.next().await;
    watcher.next().await;

    // when
    ctx.chain().drop_transaction(hash);
    let result = action.settle(ctx.game().view()).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Network);
}

#[tokio::test]
async fn join_round__unknown_round__is_invalid_input_before_broadcast() {
    let ctx = TestContext::new().await;

    // when
    let result = ctx.game().join_round(RoundId(99), CardId(7)).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(ctx.chain().calls("eth_sendTransaction"), 0);
}
