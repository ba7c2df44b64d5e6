#![allow(non_snake_case)]

use super::*;
use crate::{
    ErrorKind,
    test_helpers::{
        FakeChain,
        InjectedFailure,
        Mining,
        alice,
        bob,
        cartela_address,
    },
};
use alloy_primitives::{
    B256,
    U256,
};
use bingo_abi::cartela;

#[test]
fn revert_data__nested_under_data__is_extracted() {
    // given
    let data = bingo_abi::encode_revert("Cartela: not owner");
    let error = RpcError {
        code: -32603,
        message: "Internal JSON-RPC error.".to_string().into(),
        data: Some(json!({ "data": alloy_primitives::hex::encode_prefixed(&data) })),
    };

    // when
    let extracted = revert_data(&error);

    // then
    assert_eq!(extracted, Some(data));
}

#[test]
fn revert_data__empty_hex__is_none() {
    // given
    let error = RpcError {
        code: 3,
        message: "execution reverted".to_string().into(),
        data: Some(json!("0x")),
    };

    // then
    assert_eq!(revert_data(&error), None);
}

#[test]
fn call_request__read__carries_target_and_input_only() {
    // given
    let call = cartela::cartela_price().unwrap();

    // when
    let request = call_request(cartela_address(), call.data.clone());
    let value = serde_json::to_value(&request).unwrap();

    // then
    assert_eq!(value["to"], json!(cartela_address()));
    assert_eq!(value["input"], json!(call.data));
    assert!(value.get("from").is_none());
    assert!(value.get("value").is_none());
}

#[tokio::test]
async fn chain_client__chain_id_and_accounts__are_parsed() {
    // given
    let client = ChainClient::new(FakeChain::new());

    // when
    let chain_id = client.chain_id().await.unwrap();
    let accounts = client.accounts().await.unwrap();

    // then
    assert_eq!(chain_id, crate::test_helpers::CHAIN_ID);
    assert_eq!(accounts, vec![alice(), bob()]);
}

#[tokio::test]
async fn chain_client__read_call__returns_contract_output() {
    // given
    let chain = FakeChain::new();
    chain.set_cartela_price(U256::from(5u64));
    let client = ChainClient::new(chain);
    let call = cartela::cartela_price().unwrap();

    // when
    let output = client.read_call(cartela_address(), &call.data).await.unwrap();

    // then
    assert_eq!(cartela::decode_cartela_price(&output).unwrap(), U256::from(5u64));
}

#[tokio::test]
async fn chain_client__submit_without_sender__is_configuration_error() {
    // given
    let chain = FakeChain::new();
    let client = ChainClient::new(chain.clone());
    let call = cartela::create_cartela(5, 5).unwrap();

    // when
    let result = client
        .submit_transaction(&call_request(cartela_address(), call.data))
        .await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(chain.calls("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn chain_client__wallet_rejection__maps_to_user_rejected() {
    // given
    let chain = FakeChain::new();
    chain.fail_next("eth_sendTransaction", InjectedFailure::UserRejected);
    let client = ChainClient::new(chain);
    let call = cartela::create_cartela(5, 5).unwrap();
    let request = call_request(cartela_address(), call.data).from(alice());

    // when
    let result = client.submit_transaction(&request).await;

    // then
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UserRejected);
}

#[tokio::test]
async fn chain_client__unknown_transaction__has_no_receipt() {
    // given
    let client = ChainClient::new(FakeChain::new());

    // when
    let receipt = client
        .transaction_receipt(B256::repeat_byte(9))
        .await
        .unwrap();
    let pending = client
        .transaction_by_hash(B256::repeat_byte(9))
        .await
        .unwrap();

    // then
    assert_eq!(receipt, None);
    assert_eq!(pending, None);
}

#[tokio::test]
async fn chain_client__mined_create_card__logs_are_queryable() {
    // given
    let chain = FakeChain::new();
    chain.set_mining(Mining::Instant);
    let client = ChainClient::new(chain);
    let call = cartela::create_cartela(5, 5).unwrap();
    let request = call_request(cartela_address(), call.data)
        .from(alice())
        .value(U256::from(1_000_000_000_000_000u64));
    let hash = client.submit_transaction(&request).await.unwrap();

    // when
    let receipt = client.transaction_receipt(hash).await.unwrap().unwrap();
    let logs = client
        .get_logs(&Filter::new().address(cartela_address()).from_block(0u64))
        .await
        .unwrap();

    // then
    assert!(receipt.inner.status());
    assert_eq!(receipt.transaction_hash, hash);
    assert_eq!(logs, receipt.inner.logs());
    assert_eq!(Some(client.block_number().await.unwrap()), receipt.block_number);
}

#[tokio::test]
async fn chain_client__logs_filtered_by_topic_and_range__skip_other_events() {
    // given
    let chain = FakeChain::new();
    chain.set_mining(Mining::Instant);
    let client = ChainClient::new(chain.clone());
    let price = U256::from(1_000_000_000_000_000u64);
    for _ in 0..2 {
        let call = cartela::create_cartela(3, 3).unwrap();
        let request = call_request(cartela_address(), call.data)
            .from(alice())
            .value(price);
        client.submit_transaction(&request).await.unwrap();
    }
    let first_block = chain.block_number() - 1;
    let second_id = B256::from(U256::from(2u64).to_be_bytes::<32>());

    // when
    let second_only = client
        .get_logs(&Filter::new().address(cartela_address()).from_block(0u64).topic1(second_id))
        .await
        .unwrap();
    let first_block_only = client
        .get_logs(
            &Filter::new()
                .address(cartela_address())
                .from_block(first_block)
                .to_block(first_block),
        )
        .await
        .unwrap();
    let elsewhere = client
        .get_logs(&Filter::new().address(bob()).from_block(0u64))
        .await
        .unwrap();

    // then
    assert_eq!(second_only.len(), 1);
    assert_eq!(second_only[0].block_number, Some(chain.block_number()));
    assert_eq!(first_block_only.len(), 1);
    assert_eq!(first_block_only[0].block_number, Some(first_block));
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn chain_client__read_at_earlier_block__sees_state_of_that_block() {
    // given
    let chain = FakeChain::new();
    chain.set_mining(Mining::Instant);
    let client = ChainClient::new(chain.clone());
    let before = chain.block_number();
    let create = cartela::create_cartela(3, 3).unwrap();
    let request = call_request(cartela_address(), create.data)
        .from(alice())
        .value(U256::from(1_000_000_000_000_000u64));
    client.submit_transaction(&request).await.unwrap();
    let lookup = call_request(cartela_address(), cartela::get_cartela(1).unwrap().data);

    // when
    let then = client
        .read_call_at(&lookup, BlockNumberOrTag::Number(before))
        .await
        .unwrap();
    let now = client
        .read_call_at(&lookup, BlockNumberOrTag::Latest)
        .await
        .unwrap();

    // then
    assert_eq!(cartela::decode_cartela(&then).unwrap().id, 0);
    assert_eq!(cartela::decode_cartela(&now).unwrap().id, 1);
}
