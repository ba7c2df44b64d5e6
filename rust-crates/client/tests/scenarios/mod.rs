use alloy_primitives::U256;

mod connection;
mod draw_number;
mod errors;
mod game_flow;
mod register_numbers;

/// 0.01 ether in wei.
pub fn hundredth_ether() -> U256 {
    U256::from(10_000_000_000_000_000u64)
}
