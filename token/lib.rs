#![cfg_attr(not(feature = "std"), no_std)]

//! Cross-contract call helpers against the external fungible-token
//! interface the protocol core treats as a collaborator (never owns).
//!
//! The token standard itself is out of scope; these are thin wrappers
//! around manual `build_call` invocations, generalizing the pattern the
//! lending contract already needs at every escrow boundary.

use ink::env::call::{build_call, ExecutionInput, Selector};
use ink::env::DefaultEnvironment;
use ink::prelude::vec::Vec;
use ink::{Address, U256};

/// Failure surfaced when a call into the token collaborator does not
/// complete successfully. Callers translate this into their own
/// `Error::InsufficientBalance` / `Error::InsufficientAllowance` /
/// `Error::TransactionFailed` as appropriate for the operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenError {
    CallFailed,
    TransferReturnedFalse,
}

/// A handle to a deployed fungible-token contract, addressed by its
/// 20-byte `Address`. Holds no state of its own beyond the address;
/// every method is a fresh cross-contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHandle {
    address: Address,
}

impl TokenHandle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_zero(&self) -> bool {
        self.address == zero_address()
    }

    /// Pulls `amount` of the token from `owner` to `to`. The core always
    /// calls this for incoming value (principal, collateral, repayment,
    /// vouch stake).
    pub fn transfer_from(&self, owner: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        let ok = build_call::<DefaultEnvironment>()
            .call(self.address)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer_from")))
                    .push_arg(owner)
                    .push_arg(to)
                    .push_arg(amount),
            )
            .returns::<bool>()
            .try_invoke()
            .map_err(|_| TokenError::CallFailed)?
            .map_err(|_| TokenError::CallFailed)?;

        if ok {
            Ok(())
        } else {
            Err(TokenError::TransferReturnedFalse)
        }
    }

    /// Pushes `amount` of the token from this contract to `to`. The core
    /// always calls this for outgoing value, after all local state
    /// mutations are committed (checks-effects-interactions).
    pub fn transfer(&self, to: Address, amount: U256) -> Result<(), TokenError> {
        let ok = build_call::<DefaultEnvironment>()
            .call(self.address)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer")))
                    .push_arg(to)
                    .push_arg(amount),
            )
            .returns::<bool>()
            .try_invoke()
            .map_err(|_| TokenError::CallFailed)?
            .map_err(|_| TokenError::CallFailed)?;

        if ok {
            Ok(())
        } else {
            Err(TokenError::TransferReturnedFalse)
        }
    }

    pub fn balance_of(&self, owner: Address) -> Result<U256, TokenError> {
        build_call::<DefaultEnvironment>()
            .call(self.address)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("balance_of"))).push_arg(owner),
            )
            .returns::<U256>()
            .try_invoke()
            .map_err(|_| TokenError::CallFailed)?
            .map_err(|_| TokenError::CallFailed)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Result<U256, TokenError> {
        build_call::<DefaultEnvironment>()
            .call(self.address)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("allowance")))
                    .push_arg(owner)
                    .push_arg(spender),
            )
            .returns::<U256>()
            .try_invoke()
            .map_err(|_| TokenError::CallFailed)?
            .map_err(|_| TokenError::CallFailed)
    }

    pub fn approve(&self, spender: Address, amount: U256) -> Result<(), TokenError> {
        let ok = build_call::<DefaultEnvironment>()
            .call(self.address)
            .exec_input(
                ExecutionInput::new(Selector::new(ink::selector_bytes!("approve")))
                    .push_arg(spender)
                    .push_arg(amount),
            )
            .returns::<bool>()
            .try_invoke()
            .map_err(|_| TokenError::CallFailed)?
            .map_err(|_| TokenError::CallFailed)?;

        if ok {
            Ok(())
        } else {
            Err(TokenError::TransferReturnedFalse)
        }
    }
}

/// The sentinel "no token" address (spec §3: zero address).
pub fn zero_address() -> Address {
    Address::from(&[0u8; 20])
}

/// Saturating add for the wide integer type, since `U256` only exposes
/// checked arithmetic (wrapping/panicking operators are avoided
/// throughout this workspace).
pub fn u256_add(a: U256, b: U256) -> U256 {
    a.checked_add(b).unwrap_or(U256::MAX)
}

pub fn u256_sub(a: U256, b: U256) -> U256 {
    a.checked_sub(b).unwrap_or_else(U256::zero)
}

pub fn u256_mul(a: U256, b: U256) -> U256 {
    a.checked_mul(b).unwrap_or(U256::MAX)
}

/// `amount * rate_bps / 10_000`, truncating, using 256-bit wide
/// arithmetic so the intermediate product never overflows.
pub fn apply_bps(amount: U256, rate_bps: u16) -> U256 {
    let numerator = u256_mul(amount, U256::from(rate_bps));
    numerator.checked_div(U256::from(10_000u32)).unwrap_or_else(U256::zero)
}

/// `principal + principal * rate_bps / 10_000` (spec §6.4).
pub fn total_due(principal: U256, rate_bps: u16) -> U256 {
    u256_add(principal, apply_bps(principal, rate_bps))
}

/// `max(1, stake * bps / 10_000)`, capped at `stake`. Used both for the
/// default-time vouch slash (§6.4) and is exposed generically so tests
/// can exercise the floor/ceiling behavior without reaching into the
/// lending crate's private helpers.
pub fn slash_amount(stake: U256, rate_bps: u16) -> U256 {
    if stake.is_zero() {
        return U256::zero();
    }
    let raw = apply_bps(stake, rate_bps);
    let floored = if raw.is_zero() { U256::from(1u32) } else { raw };
    if floored > stake {
        stake
    } else {
        floored
    }
}

/// (voucher, token, stake) snapshot row yielded by Reputation's
/// default-time vouch iterator (spec §9).
pub type VouchSnapshot = Vec<(Address, Address, U256)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_bps_truncates() {
        assert_eq!(apply_bps(U256::from(100u32), 1000), U256::from(10u32));
        assert_eq!(apply_bps(U256::from(3u32), 1), U256::zero());
    }

    #[test]
    fn slash_amount_floors_to_one_when_nonzero_stake() {
        assert_eq!(slash_amount(U256::from(3u32), 1), U256::from(1u32));
        assert_eq!(slash_amount(U256::zero(), 1000), U256::zero());
    }

    #[test]
    fn slash_amount_caps_at_stake() {
        assert_eq!(slash_amount(U256::from(5u32), 10_000), U256::from(5u32));
    }

    #[test]
    fn slash_amount_matches_scenario_s4() {
        let stake = U256::from(50_000_000_000_000_000_000u128);
        let expected = U256::from(5_000_000_000_000_000_000u128);
        assert_eq!(slash_amount(stake, 1000), expected);
    }
}
