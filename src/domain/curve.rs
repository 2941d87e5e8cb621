//! Pure pricing math for the linear bonding curve.
//!
//! The marginal price at supply `s` is `base_price + slope * s`. Buys pay
//! lamports into the reserve and mint along the curve; sells burn and redeem
//! out of the reserve. Both directions are exact integrals of the price, and
//! every conversion back to an integer unit floors, so the reserve always
//! holds at least what the curve owes.
//!
//! All functions here are pure: no clocks, no I/O, no shared state.
//!
//! # Examples
//!
//! Pricing a buy on a flat curve:
//!
//! ```
//! use curvebook::domain::curve::CurveParams;
//! use curvebook::domain::money::{Lamports, TokenAmount};
//! use rust_decimal_macros::dec;
//!
//! let params = CurveParams::try_new(dec!(2), dec!(0)).unwrap();
//! let out = params
//!     .tokens_out_for_sol(TokenAmount::ZERO, Lamports::new(10))
//!     .unwrap();
//!
//! assert_eq!(out, TokenAmount::new(5));
//! ```

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::money::{Lamports, Price, TokenAmount};

/// Lift a checked [`Decimal`] operation into a domain error.
fn checked(value: Option<Decimal>, context: &'static str) -> Result<Decimal, DomainError> {
    value.ok_or(DomainError::NumericOverflow { context })
}

/// Validated parameters of a linear bonding curve.
///
/// `base_price` is the marginal price at zero supply and must be positive.
/// `slope` is the price increase per token unit minted and may be zero for a
/// fixed-price curve, but never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveParams {
    base_price: Price,
    slope: Price,
}

impl CurveParams {
    /// Validate and build curve parameters.
    ///
    /// # Errors
    /// Rejects a non-positive base price or a negative slope.
    pub fn try_new(base_price: Price, slope: Price) -> Result<Self, DomainError> {
        if base_price <= Decimal::ZERO {
            return Err(DomainError::NonPositiveBasePrice { base_price });
        }
        if slope < Decimal::ZERO {
            return Err(DomainError::NegativeSlope { slope });
        }
        Ok(Self { base_price, slope })
    }

    /// The marginal price at zero supply.
    #[must_use]
    pub const fn base_price(&self) -> Price {
        self.base_price
    }

    /// The price increase per token unit minted.
    #[must_use]
    pub const fn slope(&self) -> Price {
        self.slope
    }

    /// Marginal price at the given supply: `base_price + slope * supply`.
    ///
    /// # Errors
    /// Fails when the price leaves the representable range.
    pub fn marginal_price(&self, supply: TokenAmount) -> Result<Price, DomainError> {
        let climb = checked(self.slope.checked_mul(supply.to_decimal()), "marginal price")?;
        checked(self.base_price.checked_add(climb), "marginal price")
    }

    /// Token units minted for a payment of `sol_in` at the given supply.
    ///
    /// Charging the integral of the price over the minted range means the
    /// payment satisfies `slope/2 * d^2 + marginal_price(supply) * d = sol_in`
    /// for the minted amount `d`. This solves that quadratic for the positive
    /// root and floors it to a whole unit; a flat curve degrades to plain
    /// division by the base price.
    ///
    /// # Errors
    /// Rejects a zero payment and payments too small to mint one unit.
    pub fn tokens_out_for_sol(
        &self,
        supply: TokenAmount,
        sol_in: Lamports,
    ) -> Result<TokenAmount, DomainError> {
        if sol_in.is_zero() {
            return Err(DomainError::ZeroAmount);
        }
        let price = self.marginal_price(supply)?;
        let minted = if self.slope.is_zero() {
            checked(sol_in.to_decimal().checked_div(price), "minted amount")?
        } else {
            let price_sq = checked(price.checked_mul(price), "curve discriminant")?;
            let paid_term = checked(
                Decimal::TWO
                    .checked_mul(self.slope)
                    .and_then(|v| v.checked_mul(sol_in.to_decimal())),
                "curve discriminant",
            )?;
            let discriminant = checked(price_sq.checked_add(paid_term), "curve discriminant")?;
            let root = discriminant
                .sqrt()
                .ok_or(DomainError::NumericOverflow {
                    context: "curve discriminant",
                })?;
            checked((root - price).checked_div(self.slope), "minted amount")?
        };
        let out = TokenAmount::from_decimal_floor(minted)?;
        if out.is_zero() {
            return Err(DomainError::DustPayment { sol_in });
        }
        Ok(out)
    }

    /// Lamports redeemed for burning `tokens_in` at the given supply.
    ///
    /// The integral of the price over `[supply - tokens_in, supply]`:
    /// `base_price * q + slope * (supply - q/2) * q`, floored to a whole
    /// lamport.
    ///
    /// # Errors
    /// Rejects a zero amount and redemptions beyond the circulating supply.
    pub fn sol_out_for_tokens(
        &self,
        supply: TokenAmount,
        tokens_in: TokenAmount,
    ) -> Result<Lamports, DomainError> {
        if tokens_in.is_zero() {
            return Err(DomainError::ZeroAmount);
        }
        if tokens_in > supply {
            return Err(DomainError::RedemptionExceedsSupply {
                requested: tokens_in,
                supply,
            });
        }
        let q = tokens_in.to_decimal();
        let s = supply.to_decimal();
        let base_leg = checked(self.base_price.checked_mul(q), "redemption integral")?;
        let slope_leg = checked(
            self.slope
                .checked_mul(s - q / Decimal::TWO)
                .and_then(|v| v.checked_mul(q)),
            "redemption integral",
        )?;
        let redeemed = checked(base_leg.checked_add(slope_leg), "redemption integral")?;
        Lamports::from_decimal_floor(redeemed)
    }

    /// Lamports the reserve must hold at the given supply.
    ///
    /// The accounting integral `base_price * s + slope/2 * s^2`, floored.
    /// After every settled trade the stored reserve equals this value up to
    /// the lamports left behind by flooring.
    ///
    /// # Errors
    /// Fails only when the integral leaves the representable range.
    pub fn reserve_for_supply(&self, supply: TokenAmount) -> Result<Lamports, DomainError> {
        let s = supply.to_decimal();
        let base_leg = checked(self.base_price.checked_mul(s), "reserve integral")?;
        let slope_leg = checked(
            (self.slope / Decimal::TWO)
                .checked_mul(s)
                .and_then(|v| v.checked_mul(s)),
            "reserve integral",
        )?;
        Lamports::from_decimal_floor(checked(base_leg.checked_add(slope_leg), "reserve integral")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sloped() -> CurveParams {
        CurveParams::try_new(dec!(1), dec!(0.0000001)).unwrap()
    }

    #[test]
    fn try_new_rejects_non_positive_base_price() {
        assert!(matches!(
            CurveParams::try_new(dec!(0), dec!(1)),
            Err(DomainError::NonPositiveBasePrice { .. })
        ));
        assert!(matches!(
            CurveParams::try_new(dec!(-1), dec!(1)),
            Err(DomainError::NonPositiveBasePrice { .. })
        ));
    }

    #[test]
    fn try_new_rejects_negative_slope() {
        assert!(matches!(
            CurveParams::try_new(dec!(1), dec!(-0.1)),
            Err(DomainError::NegativeSlope { .. })
        ));
    }

    #[test]
    fn try_new_allows_flat_curve() {
        assert!(CurveParams::try_new(dec!(1000), dec!(0)).is_ok());
    }

    #[test]
    fn marginal_price_rises_with_supply() {
        let params = CurveParams::try_new(dec!(1000), dec!(10)).unwrap();
        assert_eq!(params.marginal_price(TokenAmount::ZERO).unwrap(), dec!(1000));
        assert_eq!(
            params.marginal_price(TokenAmount::new(5)).unwrap(),
            dec!(1050)
        );
    }

    #[test]
    fn flat_curve_buy_divides_by_base_price() {
        let params = CurveParams::try_new(dec!(2), dec!(0)).unwrap();
        let out = params
            .tokens_out_for_sol(TokenAmount::new(1_000), Lamports::new(10))
            .unwrap();
        assert_eq!(out, TokenAmount::new(5));
    }

    #[test]
    fn sloped_buy_solves_the_quadratic_and_floors() {
        // price(0) = 1, so 10 lamports buys just under 10 units once the
        // slope term is charged; the exact root is ~9.999995.
        let out = sloped()
            .tokens_out_for_sol(TokenAmount::ZERO, Lamports::new(10))
            .unwrap();
        assert_eq!(out, TokenAmount::new(9));
    }

    #[test]
    fn buy_rejects_zero_payment() {
        assert!(matches!(
            sloped().tokens_out_for_sol(TokenAmount::ZERO, Lamports::ZERO),
            Err(DomainError::ZeroAmount)
        ));
    }

    #[test]
    fn buy_rejects_dust_payment() {
        let params = CurveParams::try_new(dec!(1000), dec!(0)).unwrap();
        assert!(matches!(
            params.tokens_out_for_sol(TokenAmount::ZERO, Lamports::new(500)),
            Err(DomainError::DustPayment { .. })
        ));
    }

    #[test]
    fn sell_is_the_integral_over_the_burned_range() {
        let params = CurveParams::try_new(dec!(1000), dec!(10)).unwrap();
        // burning 4 of 10: 1000*4 + 10*(10 - 2)*4 = 4320
        let out = params
            .sol_out_for_tokens(TokenAmount::new(10), TokenAmount::new(4))
            .unwrap();
        assert_eq!(out, Lamports::new(4320));
    }

    #[test]
    fn sell_rejects_zero_amount() {
        assert!(matches!(
            sloped().sol_out_for_tokens(TokenAmount::new(10), TokenAmount::ZERO),
            Err(DomainError::ZeroAmount)
        ));
    }

    #[test]
    fn sell_rejects_redemption_beyond_supply() {
        assert!(matches!(
            sloped().sol_out_for_tokens(TokenAmount::new(5), TokenAmount::new(6)),
            Err(DomainError::RedemptionExceedsSupply { .. })
        ));
    }

    #[test]
    fn buy_then_sell_round_trip_loses_at_most_one_lamport_each_way() {
        let params = sloped();
        let paid = Lamports::new(10);
        let minted = params.tokens_out_for_sol(TokenAmount::ZERO, paid).unwrap();
        let redeemed = params.sol_out_for_tokens(minted, minted).unwrap();

        assert!(redeemed <= paid);
        assert!(paid.get() - redeemed.get() <= 1);
    }

    #[test]
    fn extreme_parameters_error_instead_of_panicking() {
        // A base price this large squares past Decimal's range in the
        // discriminant; the buy must surface an overflow, not unwind.
        let params = CurveParams::try_new(dec!(300000000000000), dec!(0.000000001)).unwrap();
        assert!(matches!(
            params.tokens_out_for_sol(TokenAmount::ZERO, Lamports::new(10)),
            Err(DomainError::NumericOverflow { .. })
        ));
    }

    #[test]
    fn redemption_never_exceeds_payment() {
        let params = CurveParams::try_new(dec!(1000), dec!(10)).unwrap();
        let paid = Lamports::new(123_456);
        let minted = params.tokens_out_for_sol(TokenAmount::ZERO, paid).unwrap();
        let redeemed = params.sol_out_for_tokens(minted, minted).unwrap();
        assert!(redeemed <= paid);
    }

    #[test]
    fn reserve_for_supply_matches_the_integral() {
        let params = CurveParams::try_new(dec!(1000), dec!(10)).unwrap();
        // 1000*10 + 5*100 = 10500
        assert_eq!(
            params.reserve_for_supply(TokenAmount::new(10)).unwrap(),
            Lamports::new(10_500)
        );
        assert_eq!(
            params.reserve_for_supply(TokenAmount::ZERO).unwrap(),
            Lamports::ZERO
        );
    }
}
