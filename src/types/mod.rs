pub mod pnl;
pub mod price;
pub mod trading;

pub use pnl::*;
pub use price::*;
pub use trading::*;

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a money amount to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a per-share cost to 4 decimals.
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// `price * quantity` rounded to cents. `None` on overflow.
pub fn checked_notional(price: Decimal, quantity: i64) -> Option<Decimal> {
    price.checked_mul(Decimal::from(quantity)).map(round_money)
}

/// `part / whole * 100`, rounded to 2 decimals; 0 when `whole` is 0.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_money(part / whole * Decimal::ONE_HUNDRED)
}
