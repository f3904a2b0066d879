#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// Owns vouch escrow, per-account reputation scores, and the
/// payment-outcome classifier's score deltas. Trusts `user_registry`
/// for identity gating and trusts exactly one configured address (the
/// lending authority) for loan-related mutations.
#[ink::contract]
mod reputation {
    use ink::prelude::string::String;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;
    use token::{zero_address, TokenError, TokenHandle};
    use user_registry::UserRegistryRef;

    // Reputation score deltas (spec §4.2). Test suites read these
    // constants directly rather than hardcoding the numbers.
    pub const REPAID_ON_TIME_ORIGINAL: i64 = 10;
    pub const REPAID_LATE_GRACE: i64 = 3;
    pub const REPAID_ON_TIME_AFTER_EXTENSION: i64 = 7;
    pub const REPAID_LATE_AFTER_EXTENSION: i64 = 2;
    pub const REPAID_WITH_PARTIAL_AGREEMENT_MET: i64 = 8;
    pub const DEFAULTED: i64 = -50;
    pub const LENT_SUCCESSFULLY_ON_TIME_ORIGINAL: i64 = 5;
    pub const LENT_SUCCESSFULLY_AFTER_MODIFICATION: i64 = 3;
    pub const LENDER_APPROVED_EXTENSION: i64 = 2;
    pub const LENDER_APPROVED_PARTIAL_AGREEMENT: i64 = 1;
    pub const LENDER_REJECTED_MODIFICATION: i64 = 0;
    pub const VOUCH_DEFAULTED_VOUCHER: i64 = -20;

    /// Outcome classification fed by Lending at settlement (spec §4.4).
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    #[ink::scale_derive(Encode, Decode, TypeInfo)]
    pub enum PaymentOutcome {
        OnTimeOriginal,
        LateGraceOriginal,
        OnTimeExtended,
        LateExtended,
        PartialAgreementMetAndRepaid,
    }

    /// Mirrors `LoanAgreement::requested_modification_type` (spec §3.6).
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    #[ink::scale_derive(Encode, Decode, TypeInfo)]
    pub enum ModificationType {
        None,
        DueDateExtension,
        PartialPaymentAgreement,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone, Default)]
    pub struct ReputationProfile {
        loans_taken: u64,
        loans_given: u64,
        loans_repaid_on_time: u64,
        loans_repaid_late_grace: u64,
        loans_defaulted: u64,
        total_value_borrowed: U256,
        total_value_lent: U256,
        vouching_stake_active: U256,
        times_vouched: u64,
        times_defaulted_as_voucher: u64,
        modifications_approved_by_lender: u64,
        modifications_rejected_by_lender: u64,
        current_score: i64,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct Vouch {
        voucher: Address,
        borrower: Address,
        token: Address,
        staked_amount: U256,
        active: bool,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone, Copy)]
    pub enum VouchEventKind {
        Added,
        Removed,
        Slashed,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct VouchEvent {
        voucher: Address,
        borrower: Address,
        token: Address,
        amount: U256,
        kind: VouchEventKind,
        at: Timestamp,
    }

    #[ink(storage)]
    pub struct Reputation {
        registry: UserRegistryRef,
        owner: Address,
        lending_authority: Address,
        locked: bool,
        profiles: Mapping<Address, ReputationProfile>,
        vouches: Mapping<(Address, Address), Vouch>,
        voucher_history: Mapping<Address, Vec<VouchEvent>>,
        borrower_history: Mapping<Address, Vec<VouchEvent>>,
        borrower_vouchers: Mapping<Address, Vec<Address>>,
    }

    #[ink(event)]
    pub struct VouchAdded {
        #[ink(topic)]
        voucher: Address,
        borrower: Address,
        token: Address,
        amount: U256,
    }

    #[ink(event)]
    pub struct VouchRemoved {
        #[ink(topic)]
        voucher: Address,
        borrower: Address,
        amount: U256,
    }

    #[ink(event)]
    pub struct VouchSlashed {
        #[ink(topic)]
        voucher: Address,
        borrower: Address,
        amount: U256,
        payee: Address,
    }

    #[ink(event)]
    pub struct ReputationUpdated {
        #[ink(topic)]
        who: Address,
        new_score: i64,
        reason: String,
    }

    #[ink(event)]
    pub struct LoanTermOutcomeRecorded {
        #[ink(topic)]
        agreement_id: u64,
        party: Address,
        delta: i64,
        reason: String,
        outcome: PaymentOutcome,
    }

    #[ink(event)]
    pub struct LendingAuthoritySet {
        new_authority: Address,
    }

    #[derive(Debug, PartialEq, Eq)]
    #[ink::scale_derive(Encode, Decode, TypeInfo)]
    pub enum Error {
        NotRegistered,
        Unauthorized,
        InvalidArgument,
        NotFound,
        DoubleSpend,
        InsufficientBalance,
        Reentrancy,
    }

    impl From<TokenError> for Error {
        fn from(_: TokenError) -> Self {
            Error::InsufficientBalance
        }
    }

    pub type Result<T> = core::result::Result<T, Error>;

    impl Reputation {
        #[ink(constructor)]
        pub fn new(registry_address: Address) -> Self {
            let registry: UserRegistryRef = ink::env::call::FromAddr::from_addr(registry_address);
            Self {
                registry,
                owner: Self::env().caller(),
                lending_authority: zero_address(),
                locked: false,
                profiles: Mapping::default(),
                vouches: Mapping::default(),
                voucher_history: Mapping::default(),
                borrower_history: Mapping::default(),
                borrower_vouchers: Mapping::default(),
            }
        }

        #[ink(message)]
        pub fn set_lending_authority(&mut self, authority: Address) -> Result<()> {
            self.ensure_owner()?;
            self.lending_authority = authority;
            self.env().emit_event(LendingAuthoritySet { new_authority: authority });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: Address) -> Result<()> {
            self.ensure_owner()?;
            self.owner = new_owner;
            Ok(())
        }

        #[ink(message)]
        pub fn lending_authority(&self) -> Address {
            self.lending_authority
        }

        #[ink(message)]
        pub fn owner(&self) -> Address {
            self.owner
        }

        /// Stakes `amount` of `token` in favor of `borrower`. Tokens are
        /// pulled into this contract's custody before any state mutation
        /// commits (spec §5 checks-effects-interactions).
        #[ink(message)]
        pub fn add_vouch(&mut self, borrower: Address, amount: U256, token: Address) -> Result<()> {
            self.enter()?;
            let result = self.add_vouch_inner(borrower, amount, token);
            self.exit();
            result
        }

        fn add_vouch_inner(&mut self, borrower: Address, amount: U256, token: Address) -> Result<()> {
            let caller = self.env().caller();

            if !self.registry.is_registered(caller) || !self.registry.is_registered(borrower) {
                return Err(Error::NotRegistered);
            }
            if borrower == caller {
                return Err(Error::InvalidArgument);
            }
            if amount.is_zero() || token == zero_address() {
                return Err(Error::InvalidArgument);
            }
            if self.vouches.get((caller, borrower)).map(|v| v.active).unwrap_or(false) {
                return Err(Error::DoubleSpend);
            }

            let this = self.env().address();
            TokenHandle::new(token).transfer_from(caller, this, amount)?;

            let now = self.env().block_timestamp();
            self.vouches.insert(
                (caller, borrower),
                &Vouch {
                    voucher: caller,
                    borrower,
                    token,
                    staked_amount: amount,
                    active: true,
                },
            );
            self.push_history(caller, borrower, token, amount, VouchEventKind::Added, now);

            let mut profile = self.profiles.get(caller).unwrap_or_default();
            profile.vouching_stake_active = token::u256_add(profile.vouching_stake_active, amount);
            profile.times_vouched = profile.times_vouched.saturating_add(1);
            self.profiles.insert(caller, &profile);

            self.env().emit_event(VouchAdded {
                voucher: caller,
                borrower,
                token,
                amount,
            });

            Ok(())
        }

        /// Returns the caller's remaining stake and deactivates the
        /// vouch. Intentionally does not check whether `borrower` has an
        /// active loan depending on this vouch (spec §9 open question):
        /// the stake is protective, not a hard requirement to hold.
        #[ink(message)]
        pub fn remove_vouch(&mut self, borrower: Address) -> Result<()> {
            self.enter()?;
            let result = self.remove_vouch_inner(borrower);
            self.exit();
            result
        }

        fn remove_vouch_inner(&mut self, borrower: Address) -> Result<()> {
            let caller = self.env().caller();
            let mut vouch = self
                .vouches
                .get((caller, borrower))
                .filter(|v| v.active)
                .ok_or(Error::NotFound)?;

            let refund = vouch.staked_amount;
            TokenHandle::new(vouch.token).transfer(caller, refund)?;

            vouch.active = false;
            vouch.staked_amount = U256::zero();
            self.vouches.insert((caller, borrower), &vouch);

            let mut profile = self.profiles.get(caller).unwrap_or_default();
            profile.vouching_stake_active = token::u256_sub(profile.vouching_stake_active, refund);
            self.profiles.insert(caller, &profile);

            let now = self.env().block_timestamp();
            self.push_history(caller, borrower, vouch.token, refund, VouchEventKind::Removed, now);

            self.env().emit_event(VouchRemoved {
                voucher: caller,
                borrower,
                amount: refund,
            });

            Ok(())
        }

        /// Authorized slash path invoked by Lending on default.
        #[ink(message)]
        pub fn slash_vouch_and_reputation(
            &mut self,
            voucher: Address,
            defaulting_borrower: Address,
            amount_to_slash: U256,
            payee: Address,
        ) -> Result<()> {
            self.enter()?;
            let result = self.slash_vouch_and_reputation_inner(voucher, defaulting_borrower, amount_to_slash, payee);
            self.exit();
            result
        }

        fn slash_vouch_and_reputation_inner(
            &mut self,
            voucher: Address,
            defaulting_borrower: Address,
            amount_to_slash: U256,
            payee: Address,
        ) -> Result<()> {
            self.ensure_lending_authority()?;

            let mut vouch = self
                .vouches
                .get((voucher, defaulting_borrower))
                .filter(|v| v.active)
                .ok_or(Error::NotFound)?;

            if amount_to_slash.is_zero() || amount_to_slash > vouch.staked_amount {
                return Err(Error::InvalidArgument);
            }

            TokenHandle::new(vouch.token).transfer(payee, amount_to_slash)?;

            vouch.staked_amount = token::u256_sub(vouch.staked_amount, amount_to_slash);
            let now_inactive = vouch.staked_amount.is_zero();
            if now_inactive {
                vouch.active = false;
            }
            self.vouches.insert((voucher, defaulting_borrower), &vouch);

            let mut profile = self.profiles.get(voucher).unwrap_or_default();
            profile.vouching_stake_active = token::u256_sub(profile.vouching_stake_active, amount_to_slash);
            profile.times_defaulted_as_voucher = profile.times_defaulted_as_voucher.saturating_add(1);
            profile.current_score = profile.current_score.saturating_add(VOUCH_DEFAULTED_VOUCHER);
            let new_score = profile.current_score;
            self.profiles.insert(voucher, &profile);

            let now = self.env().block_timestamp();
            self.push_history(
                voucher,
                defaulting_borrower,
                vouch.token,
                amount_to_slash,
                VouchEventKind::Slashed,
                now,
            );

            // Order matters: tests assert VouchSlashed precedes ReputationUpdated.
            self.env().emit_event(VouchSlashed {
                voucher,
                borrower: defaulting_borrower,
                amount: amount_to_slash,
                payee,
            });
            self.env().emit_event(ReputationUpdated {
                who: voucher,
                new_score,
                reason: String::from("Vouch slashed after borrower default"),
            });

            Ok(())
        }

        /// Records the reputation effects of a settled (non-default)
        /// repayment. Emits, in order and skipping any zero-delta party:
        /// `ReputationUpdated(borrower)`, `LoanTermOutcomeRecorded(borrower)`,
        /// `ReputationUpdated(lender)`, `LoanTermOutcomeRecorded(lender)`.
        #[ink(message)]
        pub fn record_loan_payment_outcome(
            &mut self,
            agreement_id: u64,
            borrower: Address,
            lender: Address,
            principal: U256,
            outcome: PaymentOutcome,
            modification_type: ModificationType,
            lender_approved: bool,
        ) -> Result<()> {
            self.ensure_lending_authority()?;

            let (borrower_delta, borrower_reason, borrower_repaid_on_time) = match outcome {
                PaymentOutcome::OnTimeOriginal => {
                    (REPAID_ON_TIME_ORIGINAL, "Loan lent and repaid on time (original terms)", true)
                }
                PaymentOutcome::LateGraceOriginal => {
                    (REPAID_LATE_GRACE, "Loan lent and repaid (late grace)", false)
                }
                PaymentOutcome::OnTimeExtended => {
                    (REPAID_ON_TIME_AFTER_EXTENSION, "Loan lent and repaid (on time after extension)", true)
                }
                PaymentOutcome::LateExtended => {
                    (REPAID_LATE_AFTER_EXTENSION, "Loan lent and repaid (late after extension)", false)
                }
                PaymentOutcome::PartialAgreementMetAndRepaid => (
                    REPAID_WITH_PARTIAL_AGREEMENT_MET,
                    "Loan lent and repaid (after partial payment agreement)",
                    true,
                ),
            };
            let lender_base_delta = match outcome {
                PaymentOutcome::OnTimeOriginal => LENT_SUCCESSFULLY_ON_TIME_ORIGINAL,
                _ => LENT_SUCCESSFULLY_AFTER_MODIFICATION,
            };
            let lender_base_reason = match outcome {
                PaymentOutcome::OnTimeOriginal => "Loan lent and repaid on time (original terms)",
                PaymentOutcome::LateGraceOriginal => "Loan lent and repaid (late grace)",
                PaymentOutcome::OnTimeExtended => "Loan lent and repaid (on time after extension)",
                PaymentOutcome::LateExtended => "Loan lent and repaid (late after extension)",
                PaymentOutcome::PartialAgreementMetAndRepaid => {
                    "Loan lent and repaid (after partial payment agreement)"
                }
            };

            let mut borrower_profile = self.profiles.get(borrower).unwrap_or_default();
            borrower_profile.loans_taken = borrower_profile.loans_taken.saturating_add(1);
            borrower_profile.total_value_borrowed = token::u256_add(borrower_profile.total_value_borrowed, principal);
            if borrower_repaid_on_time {
                borrower_profile.loans_repaid_on_time = borrower_profile.loans_repaid_on_time.saturating_add(1);
            } else {
                borrower_profile.loans_repaid_late_grace = borrower_profile.loans_repaid_late_grace.saturating_add(1);
            }
            borrower_profile.current_score = borrower_profile.current_score.saturating_add(borrower_delta);
            let borrower_new_score = borrower_profile.current_score;
            self.profiles.insert(borrower, &borrower_profile);

            let mut lender_profile = self.profiles.get(lender).unwrap_or_default();
            lender_profile.loans_given = lender_profile.loans_given.saturating_add(1);
            lender_profile.total_value_lent = token::u256_add(lender_profile.total_value_lent, principal);

            let (lender_add_on, lender_reason_is_combined) = match (lender_approved, modification_type) {
                (true, ModificationType::DueDateExtension) => {
                    lender_profile.modifications_approved_by_lender =
                        lender_profile.modifications_approved_by_lender.saturating_add(1);
                    (LENDER_APPROVED_EXTENSION, true)
                }
                (true, ModificationType::PartialPaymentAgreement) => {
                    lender_profile.modifications_approved_by_lender =
                        lender_profile.modifications_approved_by_lender.saturating_add(1);
                    (LENDER_APPROVED_PARTIAL_AGREEMENT, true)
                }
                (false, ModificationType::None) => (0, false),
                (false, _) => {
                    lender_profile.modifications_rejected_by_lender =
                        lender_profile.modifications_rejected_by_lender.saturating_add(1);
                    (LENDER_REJECTED_MODIFICATION, false)
                }
                (true, ModificationType::None) => (0, false),
            };

            let lender_total_delta = lender_base_delta.saturating_add(lender_add_on);
            lender_profile.current_score = lender_profile.current_score.saturating_add(lender_total_delta);
            let lender_new_score = lender_profile.current_score;
            self.profiles.insert(lender, &lender_profile);

            let lender_final_reason = if lender_reason_is_combined && lender_add_on != 0 {
                "Loan outcome and modification handling for lender"
            } else {
                lender_base_reason
            };

            if borrower_delta != 0 {
                self.env().emit_event(ReputationUpdated {
                    who: borrower,
                    new_score: borrower_new_score,
                    reason: String::from(borrower_reason),
                });
                self.env().emit_event(LoanTermOutcomeRecorded {
                    agreement_id,
                    party: borrower,
                    delta: borrower_delta,
                    reason: String::from(borrower_reason),
                    outcome,
                });
            }

            if lender_total_delta != 0 {
                self.env().emit_event(ReputationUpdated {
                    who: lender,
                    new_score: lender_new_score,
                    reason: String::from(lender_final_reason),
                });
                self.env().emit_event(LoanTermOutcomeRecorded {
                    agreement_id,
                    party: lender,
                    delta: lender_total_delta,
                    reason: String::from(lender_final_reason),
                    outcome,
                });
            }

            Ok(())
        }

        #[ink(message)]
        pub fn record_loan_default(&mut self, borrower: Address, _lender: Address, _principal: U256) -> Result<()> {
            self.ensure_lending_authority()?;

            let mut profile = self.profiles.get(borrower).unwrap_or_default();
            profile.loans_taken = profile.loans_taken.saturating_add(1);
            profile.loans_defaulted = profile.loans_defaulted.saturating_add(1);
            profile.current_score = profile.current_score.saturating_add(DEFAULTED);
            let new_score = profile.current_score;
            self.profiles.insert(borrower, &profile);

            self.env().emit_event(ReputationUpdated {
                who: borrower,
                new_score,
                reason: String::from("Loan defaulted"),
            });

            Ok(())
        }

        #[ink(message)]
        pub fn profile(&self, addr: Address) -> ReputationProfile {
            self.profiles.get(addr).unwrap_or_default()
        }

        #[ink(message)]
        pub fn vouch_details(&self, voucher: Address, borrower: Address) -> Option<Vouch> {
            self.vouches.get((voucher, borrower))
        }

        #[ink(message)]
        pub fn vouches_given(&self, voucher: Address) -> Vec<VouchEvent> {
            self.voucher_history.get(voucher).unwrap_or_default()
        }

        #[ink(message)]
        pub fn vouches_received(&self, borrower: Address) -> Vec<VouchEvent> {
            self.borrower_history.get(borrower).unwrap_or_default()
        }

        /// Copy-on-read snapshot of every currently active vouch for
        /// `borrower`, consumed by Lending within the same default
        /// transaction (spec §9).
        #[ink(message)]
        pub fn active_vouches_for_borrower(&self, borrower: Address) -> Vec<(Address, Address, U256)> {
            let vouchers = self.borrower_vouchers.get(borrower).unwrap_or_default();
            vouchers
                .into_iter()
                .filter_map(|voucher| self.vouches.get((voucher, borrower)))
                .filter(|v| v.active)
                .map(|v| (v.voucher, v.token, v.staked_amount))
                .collect()
        }

        fn enter(&mut self) -> Result<()> {
            if self.locked {
                return Err(Error::Reentrancy);
            }
            self.locked = true;
            Ok(())
        }

        fn exit(&mut self) {
            self.locked = false;
        }

        fn ensure_owner(&self) -> Result<()> {
            if self.env().caller() != self.owner {
                return Err(Error::Unauthorized);
            }
            Ok(())
        }

        fn ensure_lending_authority(&self) -> Result<()> {
            if self.env().caller() != self.lending_authority {
                return Err(Error::Unauthorized);
            }
            Ok(())
        }

        fn push_history(
            &mut self,
            voucher: Address,
            borrower: Address,
            token: Address,
            amount: U256,
            kind: VouchEventKind,
            at: Timestamp,
        ) {
            let event = VouchEvent { voucher, borrower, token, amount, kind, at };

            let mut by_voucher = self.voucher_history.get(voucher).unwrap_or_default();
            by_voucher.push(event.clone());
            self.voucher_history.insert(voucher, &by_voucher);

            let mut by_borrower = self.borrower_history.get(borrower).unwrap_or_default();
            by_borrower.push(event);
            self.borrower_history.insert(borrower, &by_borrower);

            if matches!(kind, VouchEventKind::Added) {
                let mut vouchers = self.borrower_vouchers.get(borrower).unwrap_or_default();
                if !vouchers.contains(&voucher) {
                    vouchers.push(voucher);
                    self.borrower_vouchers.insert(borrower, &vouchers);
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ink::env::test;

        fn addr(byte: u8) -> Address {
            Address::from(&[byte; 20])
        }

        // `token` is not deployed in off-chain unit tests, so the single
        // sentinel address used throughout these tests never actually
        // routes through `TokenHandle`; cross-contract escrow mechanics
        // are instead covered indirectly via the `slash_amount` helper's
        // own unit tests in the `token` crate. These tests exercise
        // pure score/bookkeeping arithmetic that does not depend on the
        // call succeeding.

        #[ink::test]
        fn classifier_deltas_match_table() {
            assert_eq!(REPAID_ON_TIME_ORIGINAL, 10);
            assert_eq!(REPAID_LATE_GRACE, 3);
            assert_eq!(REPAID_ON_TIME_AFTER_EXTENSION, 7);
            assert_eq!(REPAID_LATE_AFTER_EXTENSION, 2);
            assert_eq!(REPAID_WITH_PARTIAL_AGREEMENT_MET, 8);
            assert_eq!(DEFAULTED, -50);
            assert_eq!(LENT_SUCCESSFULLY_ON_TIME_ORIGINAL, 5);
            assert_eq!(LENT_SUCCESSFULLY_AFTER_MODIFICATION, 3);
            assert_eq!(LENDER_APPROVED_EXTENSION, 2);
            assert_eq!(LENDER_APPROVED_PARTIAL_AGREEMENT, 1);
            assert_eq!(LENDER_REJECTED_MODIFICATION, 0);
            assert_eq!(VOUCH_DEFAULTED_VOUCHER, -20);
        }

        #[ink::test]
        fn set_lending_authority_requires_owner() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);

            test::set_caller(addr(2));
            assert_eq!(rep.set_lending_authority(addr(5)), Err(Error::Unauthorized));

            test::set_caller(addr(1));
            rep.set_lending_authority(addr(5)).unwrap();
            assert_eq!(rep.lending_authority(), addr(5));
        }

        #[ink::test]
        fn loan_mutators_require_lending_authority() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(5)).unwrap();

            test::set_caller(addr(2));
            assert_eq!(
                rep.record_loan_default(addr(10), addr(11), U256::from(100u32)),
                Err(Error::Unauthorized)
            );
            assert_eq!(
                rep.record_loan_payment_outcome(
                    1,
                    addr(10),
                    addr(11),
                    U256::from(100u32),
                    PaymentOutcome::OnTimeOriginal,
                    ModificationType::None,
                    false,
                ),
                Err(Error::Unauthorized)
            );
        }

        #[ink::test]
        fn record_loan_payment_outcome_on_time_original_matches_scenario_s1() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            let lender = addr(11);
            rep.record_loan_payment_outcome(
                1,
                borrower,
                lender,
                U256::from(100u32),
                PaymentOutcome::OnTimeOriginal,
                ModificationType::None,
                false,
            )
            .unwrap();

            assert_eq!(rep.profile(borrower).current_score, 10);
            assert_eq!(rep.profile(lender).current_score, 5);
        }

        #[ink::test]
        fn record_loan_payment_outcome_extension_matches_scenario_s3() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            let lender = addr(11);
            rep.record_loan_payment_outcome(
                1,
                borrower,
                lender,
                U256::from(70u32),
                PaymentOutcome::OnTimeExtended,
                ModificationType::DueDateExtension,
                true,
            )
            .unwrap();

            assert_eq!(rep.profile(borrower).current_score, 7);
            assert_eq!(rep.profile(lender).current_score, 5);
            assert_eq!(rep.profile(lender).modifications_approved_by_lender, 1);
        }

        #[ink::test]
        fn record_loan_payment_outcome_partial_agreement_matches_scenario_s5() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            let lender = addr(11);
            rep.record_loan_payment_outcome(
                1,
                borrower,
                lender,
                U256::from(90u32),
                PaymentOutcome::PartialAgreementMetAndRepaid,
                ModificationType::PartialPaymentAgreement,
                true,
            )
            .unwrap();

            assert_eq!(rep.profile(borrower).current_score, 8);
            assert_eq!(rep.profile(lender).current_score, 4);
        }

        #[ink::test]
        fn record_loan_payment_outcome_skips_zero_delta_emission() {
            // Rejected-modification lender add-on is 0; the lender's
            // base delta for LateGraceOriginal is still +3, so this
            // exercises the "some zero, some not" path rather than a
            // fully-skipped case (spec requires skipping only when an
            // individual party's total delta is exactly zero).
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            let lender = addr(11);
            rep.record_loan_payment_outcome(
                1,
                borrower,
                lender,
                U256::from(200u32),
                PaymentOutcome::LateGraceOriginal,
                ModificationType::DueDateExtension,
                false,
            )
            .unwrap();

            assert_eq!(rep.profile(lender).current_score, 3);
            assert_eq!(rep.profile(lender).modifications_rejected_by_lender, 1);
        }

        #[ink::test]
        fn record_loan_default_matches_scenario_s4() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            rep.record_loan_default(borrower, addr(11), U256::from(100u32)).unwrap();

            assert_eq!(rep.profile(borrower).current_score, -50);
            assert_eq!(rep.profile(borrower).loans_defaulted, 1);
        }

        #[ink::test]
        fn score_is_not_clamped() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            let borrower = addr(10);
            for _ in 0..5 {
                rep.record_loan_default(borrower, addr(11), U256::from(1u32)).unwrap();
            }
            assert_eq!(rep.profile(borrower).current_score, -250);
        }

        #[ink::test]
        fn slash_vouch_requires_lending_authority() {
            let registry_addr = addr(99);
            test::set_caller(addr(1));
            let mut rep = Reputation::new(registry_addr);
            rep.set_lending_authority(addr(1)).unwrap();

            test::set_caller(addr(2));
            assert_eq!(
                rep.slash_vouch_and_reputation(addr(3), addr(4), U256::from(1u32), addr(5)),
                Err(Error::Unauthorized)
            );
        }
    }
}
