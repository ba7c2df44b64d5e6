//! CartelaContract: bingo card creation, number registration and ownership.

use crate::{
    Call,
    ContractAbi,
    ContractKind,
    EventSignature,
    FunctionSignature,
    Result,
    value::{
        self,
        field,
    },
};
use alloy_primitives::{
    Address,
    U256,
};
use std::sync::OnceLock;

pub const CONTRACT_NAME: &str = "CartelaContract";
pub const ABI_VERSION: u32 = 1;

pub const CREATE_CARTELA: &str = "createCartela";
pub const REGISTER_NUMBERS: &str = "registerNumbers";
pub const TRANSFER_CARTELA: &str = "transferCartela";
pub const GET_CARTELA: &str = "getCartela";
pub const GET_CARTELA_NUMBERS: &str = "getCartelaNumbers";
pub const CARTELA_PRICE: &str = "cartelaPrice";

pub const CARTELA_CREATED: &str = "CartelaCreated";
pub const NUMBERS_REGISTERED: &str = "NumbersRegistered";

const FUNCTIONS: [(&str, bool); 6] = [
    ("createCartela(uint8 rows, uint8 columns) returns (uint256)", true),
    ("registerNumbers(uint256 cartelaId, uint8[] numbers)", false),
    ("transferCartela(uint256 cartelaId, address to)", false),
    (
        "getCartela(uint256 cartelaId) returns (uint256 id, address owner, uint8 rows, uint8 columns, bool numbersRegistered, bool inUse)",
        false,
    ),
    ("getCartelaNumbers(uint256 cartelaId) returns (uint8[])", false),
    ("cartelaPrice() returns (uint256)", false),
];

const EVENTS: [&str; 2] = [
    "CartelaCreated(uint256 indexed cartelaId, address indexed owner, uint8 rows, uint8 columns)",
    "NumbersRegistered(uint256 indexed cartelaId, uint8[] numbers)",
];

/// Raw card record as returned by `getCartela`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartelaRecord {
    pub id: u64,
    pub owner: Address,
    pub rows: u8,
    pub columns: u8,
    pub numbers_registered: bool,
    pub in_use: bool,
}

pub fn build_abi() -> Result<ContractAbi> {
    let mut abi = ContractAbi::new(CONTRACT_NAME, ABI_VERSION);
    for (signature, payable) in FUNCTIONS {
        let mut function = FunctionSignature::parse(signature)?;
        if payable {
            function = function.payable();
        }
        abi.register_function(function)?;
    }
    for signature in EVENTS {
        abi.register_event(EventSignature::parse(signature)?)?;
    }
    Ok(abi)
}

pub fn abi() -> &'static ContractAbi {
    static ABI: OnceLock<ContractAbi> = OnceLock::new();
    ABI.get_or_init(|| build_abi().expect("CartelaContract ABI literals must parse"))
}

pub fn create_cartela(rows: u8, columns: u8) -> Result<Call> {
    Call::build(
        ContractKind::Cartela,
        CREATE_CARTELA,
        &[value::uint8(rows), value::uint8(columns)],
    )
}

pub fn register_numbers(cartela_id: u64, numbers: &[u8]) -> Result<Call> {
    Call::build(
        ContractKind::Cartela,
        REGISTER_NUMBERS,
        &[value::id(cartela_id), value::uint8_array(numbers)],
    )
}

pub fn transfer_cartela(cartela_id: u64, to: Address) -> Result<Call> {
    Call::build(
        ContractKind::Cartela,
        TRANSFER_CARTELA,
        &[value::id(cartela_id), value::address(to)],
    )
}

pub fn get_cartela(cartela_id: u64) -> Result<Call> {
    Call::build(ContractKind::Cartela, GET_CARTELA, &[value::id(cartela_id)])
}

pub fn get_cartela_numbers(cartela_id: u64) -> Result<Call> {
    Call::build(
        ContractKind::Cartela,
        GET_CARTELA_NUMBERS,
        &[value::id(cartela_id)],
    )
}

pub fn cartela_price() -> Result<Call> {
    Call::build(ContractKind::Cartela, CARTELA_PRICE, &[])
}

pub fn decode_cartela(data: &[u8]) -> Result<CartelaRecord> {
    let values = crate::decode(abi().function(GET_CARTELA)?, data)?;
    Ok(CartelaRecord {
        id: value::as_u64(field(&values, 0, "id")?, "id")?,
        owner: value::as_address(field(&values, 1, "owner")?, "owner")?,
        rows: value::as_u8(field(&values, 2, "rows")?, "rows")?,
        columns: value::as_u8(field(&values, 3, "columns")?, "columns")?,
        numbers_registered: value::as_bool(
            field(&values, 4, "numbersRegistered")?,
            "numbersRegistered",
        )?,
        in_use: value::as_bool(field(&values, 5, "inUse")?, "inUse")?,
    })
}

pub fn decode_cartela_numbers(data: &[u8]) -> Result<Vec<u8>> {
    let values = crate::decode(abi().function(GET_CARTELA_NUMBERS)?, data)?;
    value::as_u8_vec(field(&values, 0, "numbers")?, "numbers")
}

pub fn decode_cartela_price(data: &[u8]) -> Result<U256> {
    let values = crate::decode(abi().function(CARTELA_PRICE)?, data)?;
    value::as_u256(field(&values, 0, "price")?, "price")
}
