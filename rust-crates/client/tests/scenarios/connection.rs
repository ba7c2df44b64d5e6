use super::hundredth_ether;
use alloy_primitives::Address;
use bingo_abi::{
    bingo_game,
    cartela,
};
use bingo_client::{
    ClientConfig,
    Connection,
    ErrorKind,
    model::RoundId,
    test_helpers::*,
    tracker::TxOutcome,
};
use deployments::DeploymentRecord;

fn record() -> DeploymentRecord {
    DeploymentRecord::new(
        "fake://chain",
        CHAIN_ID,
        cartela_address().to_string(),
        bingo_game_address().to_string(),
    )
}

#[tokio::test]
async fn with_transport__node_on_other_chain__is_configuration_error() {
    // given
    let chain = FakeChain::new();
    chain.set_chain_id(1);

    // when
    let result = Connection::with_transport(test_config(), chain).await;

    // then
    assert_eq!(result.err().unwrap().kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn with_transport__recorded_fingerprint_differs__fails_before_any_call() {
    // given
    let chain = FakeChain::new();
    let mut record = record();
    record.cartela_abi_fingerprint = Some("0123abcd".to_string());
    let config = ClientConfig::from_deployment(&record).unwrap();

    // when
    let result = Connection::with_transport(config, chain.clone()).await;

    // then
    let err = result.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("CartelaContract"));
    assert_eq!(chain.total_calls(), 0);
}

#[tokio::test]
async fn with_transport__recorded_fingerprints_match__connects() {
    // given
    let mut record = record();
    record.cartela_abi_fingerprint = Some(cartela::abi().fingerprint());
    record.bingo_game_abi_fingerprint = Some(bingo_game::abi().fingerprint());
    let config = ClientConfig::from_deployment(&record).unwrap();

    // when
    let connection = Connection::with_transport(config, FakeChain::new())
        .await
        .unwrap();

    // then
    assert_eq!(connection.chain_id(), CHAIN_ID);
    assert_eq!(connection.contracts(), contract_addresses());
}

#[test]
fn from_deployment__malformed_address__is_configuration_error() {
    // given
    let mut record = record();
    record.bingo_game_contract = "not-an-address".to_string();

    // when
    let result = ClientConfig::from_deployment(&record);

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn with_transport__zero_contract_address__is_configuration_error() {
    // given
    let mut config = test_config();
    config.contracts.bingo_game = Address::ZERO;

    // when
    let result = Connection::with_transport(config, FakeChain::new()).await;

    // then
    assert_eq!(result.err().unwrap().kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn with_transport__no_sender_configured__uses_first_node_account() {
    // when
    let connection = Connection::with_transport(test_config(), FakeChain::new())
        .await
        .unwrap();

    // then
    assert_eq!(connection.sender(), alice());
}

#[tokio::test]
async fn with_transport__explicit_sender__is_kept() {
    // when
    let connection =
        Connection::with_transport(test_config().with_sender(bob()), FakeChain::new())
            .await
            .unwrap();

    // then
    assert_eq!(connection.sender(), bob());
}

#[tokio::test]
async fn with_transport__node_without_accounts__is_configuration_error() {
    // given
    let chain = FakeChain::new();
    chain.set_accounts(Vec::new());

    // when
    let result = Connection::with_transport(test_config(), chain).await;

    // then
    assert_eq!(result.err().unwrap().kind(), ErrorKind::Configuration);
}

#[tokio::test(start_paused = true)]
async fn disconnect__transaction_in_flight__stops_polling_but_not_the_transaction() {
    let ctx = TestContext::new().await;
    // given
    ctx.chain().set_mining(Mining::Manual);
    ctx.chain().insert_round(3, RoundSeed::open(75, hundredth_ether()));
    let action = ctx.game().draw_number(RoundId(3)).await.unwrap();
    let hash = action.hash();
    let tracker = ctx.game().connection().tracker().clone();
    assert!(tracker.is_polling(hash));

    // when
    ctx.game().connection().clone().disconnect();
    let outcome = action.subscription.outcome().await;

    // then
    assert!(matches!(outcome, TxOutcome::Abandoned { .. }));
    assert!(!tracker.is_polling(hash));
    assert_eq!(ctx.chain().pending_hashes(), vec![hash]);
}
