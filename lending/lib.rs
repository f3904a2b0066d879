#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// Owns offers, requests, and agreements, drives the loan state machine,
/// moves principal/collateral through the external token collaborator,
/// and invokes Reputation on settlement or default.
#[ink::contract]
mod lending {
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;
    use reputation::{ModificationType, PaymentOutcome, ReputationRef};
    use token::{total_due as compute_total_due, slash_amount, u256_add, zero_address, TokenError, TokenHandle};
    use user_registry::UserRegistryRef;

    /// Fixed slash rate applied to a voucher's stake on borrower default
    /// (spec §4.3 `handle_default`, §6.4).
    const VOUCHER_SLASH_BPS: u16 = 1000;

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub enum AgreementStatus {
        Active,
        Overdue,
        PendingModificationApproval,
        ActivePartialPaymentAgreed,
        Repaid,
        Defaulted,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct LoanOffer {
        id: u64,
        lender: Address,
        amount: U256,
        token: Address,
        interest_rate_bps: u16,
        duration_seconds: u64,
        required_collateral_amount: U256,
        collateral_token: Address,
        active: bool,
        fulfilled: bool,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct LoanRequest {
        id: u64,
        borrower: Address,
        amount: U256,
        token: Address,
        proposed_interest_rate_bps: u16,
        proposed_duration_seconds: u64,
        offered_collateral_amount: U256,
        collateral_token: Address,
        active: bool,
        fulfilled: bool,
    }

    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct LoanAgreement {
        id: u64,
        origin_offer_id: u64,
        origin_request_id: u64,
        lender: Address,
        borrower: Address,
        principal_amount: U256,
        loan_token: Address,
        interest_rate_bps: u16,
        duration_seconds: u64,
        collateral_amount: U256,
        collateral_token: Address,
        collateral_released: bool,
        start_time: Timestamp,
        due_date: Timestamp,
        amount_paid: U256,
        status: AgreementStatus,
        requested_modification_type: ModificationType,
        requested_modification_value: U256,
        modification_approved_by_lender: bool,
    }

    impl LoanAgreement {
        pub fn total_due(&self) -> U256 {
            compute_total_due(self.principal_amount, self.interest_rate_bps)
        }
    }

    #[ink(storage)]
    pub struct Lending {
        registry: UserRegistryRef,
        reputation: ReputationRef,
        platform_wallet: Address,
        locked: bool,
        offers: Mapping<u64, LoanOffer>,
        requests: Mapping<u64, LoanRequest>,
        agreements: Mapping<u64, LoanAgreement>,
        lender_sequence: Mapping<Address, u64>,
        borrower_sequence: Mapping<Address, u64>,
        offers_by_lender: Mapping<Address, Vec<u64>>,
        requests_by_borrower: Mapping<Address, Vec<u64>>,
        agreements_by_lender: Mapping<Address, Vec<u64>>,
        agreements_by_borrower: Mapping<Address, Vec<u64>>,
    }

    #[ink(event)]
    pub struct LoanOfferCreated {
        #[ink(topic)]
        id: u64,
        lender: Address,
        amount: U256,
        token: Address,
    }

    #[ink(event)]
    pub struct LoanOfferCancelled {
        #[ink(topic)]
        id: u64,
    }

    #[ink(event)]
    pub struct LoanRequestCreated {
        #[ink(topic)]
        id: u64,
        borrower: Address,
        amount: U256,
        token: Address,
    }

    #[ink(event)]
    pub struct LoanRequestCancelled {
        #[ink(topic)]
        id: u64,
    }

    #[ink(event)]
    pub struct LoanAgreementCreated {
        #[ink(topic)]
        id: u64,
        lender: Address,
        borrower: Address,
        principal_amount: U256,
        due_date: Timestamp,
    }

    #[ink(event)]
    pub struct LoanRepayment {
        #[ink(topic)]
        agreement_id: u64,
        payer: Address,
        amount: U256,
        new_status: AgreementStatus,
    }

    #[ink(event)]
    pub struct LoanAgreementRepaid {
        #[ink(topic)]
        agreement_id: u64,
        borrower: Address,
        lender: Address,
        total_paid: U256,
    }

    #[ink(event)]
    pub struct LoanAgreementDefaulted {
        #[ink(topic)]
        agreement_id: u64,
        borrower: Address,
        lender: Address,
        amount_paid: U256,
    }

    #[ink(event)]
    pub struct CollateralSeized {
        #[ink(topic)]
        agreement_id: u64,
        token: Address,
        amount: U256,
        to: Address,
    }

    #[ink(event)]
    pub struct PaymentModificationRequested {
        #[ink(topic)]
        agreement_id: u64,
        modification_type: ModificationType,
        value: U256,
    }

    #[ink(event)]
    pub struct PaymentModificationResponded {
        #[ink(topic)]
        agreement_id: u64,
        approved: bool,
        new_status: AgreementStatus,
    }

    #[derive(Debug, PartialEq, Eq)]
    #[ink::scale_derive(Encode, Decode, TypeInfo)]
    pub enum Error {
        NotRegistered,
        Unauthorized,
        InvalidArgument,
        NotFound,
        IllegalState,
        DoubleSpend,
        OverPayment,
        NotOverdue,
        AlreadySettled,
        InsufficientBalance,
        Reentrancy,
    }

    impl From<TokenError> for Error {
        fn from(_: TokenError) -> Self {
            Error::InsufficientBalance
        }
    }

    pub type Result<T> = core::result::Result<T, Error>;

    impl Lending {
        #[ink(constructor)]
        pub fn new(registry_address: Address, reputation_address: Address, platform_wallet: Address) -> Self {
            let registry: UserRegistryRef = ink::env::call::FromAddr::from_addr(registry_address);
            let reputation: ReputationRef = ink::env::call::FromAddr::from_addr(reputation_address);
            Self {
                registry,
                reputation,
                platform_wallet,
                locked: false,
                offers: Mapping::default(),
                requests: Mapping::default(),
                agreements: Mapping::default(),
                lender_sequence: Mapping::default(),
                borrower_sequence: Mapping::default(),
                offers_by_lender: Mapping::default(),
                requests_by_borrower: Mapping::default(),
                agreements_by_lender: Mapping::default(),
                agreements_by_borrower: Mapping::default(),
            }
        }

        // ------------------------------------------------------------------
        // Offers
        // ------------------------------------------------------------------

        #[ink(message)]
        pub fn create_offer(
            &mut self,
            amount: U256,
            token: Address,
            interest_rate_bps: u16,
            duration_seconds: u64,
            required_collateral_amount: U256,
            collateral_token: Address,
        ) -> Result<u64> {
            self.enter()?;
            let result = self.create_offer_inner(
                amount,
                token,
                interest_rate_bps,
                duration_seconds,
                required_collateral_amount,
                collateral_token,
            );
            self.exit();
            result
        }

        fn create_offer_inner(
            &mut self,
            amount: U256,
            token: Address,
            interest_rate_bps: u16,
            duration_seconds: u64,
            required_collateral_amount: U256,
            collateral_token: Address,
        ) -> Result<u64> {
            let caller = self.env().caller();
            if !self.registry.is_registered(caller) {
                return Err(Error::NotRegistered);
            }
            if amount.is_zero() || duration_seconds == 0 || token == zero_address() {
                return Err(Error::InvalidArgument);
            }
            Self::validate_collateral_shape(required_collateral_amount, collateral_token)?;

            let this = self.env().address();
            TokenHandle::new(token).transfer_from(caller, this, amount)?;

            let id = self.next_offer_id(caller);
            let offer = LoanOffer {
                id,
                lender: caller,
                amount,
                token,
                interest_rate_bps,
                duration_seconds,
                required_collateral_amount,
                collateral_token,
                active: true,
                fulfilled: false,
            };
            self.offers.insert(id, &offer);
            let mut list = self.offers_by_lender.get(caller).unwrap_or_default();
            list.push(id);
            self.offers_by_lender.insert(caller, &list);

            self.env().emit_event(LoanOfferCreated { id, lender: caller, amount, token });

            Ok(id)
        }

        #[ink(message)]
        pub fn cancel_offer(&mut self, offer_id: u64) -> Result<()> {
            self.enter()?;
            let result = self.cancel_offer_inner(offer_id);
            self.exit();
            result
        }

        fn cancel_offer_inner(&mut self, offer_id: u64) -> Result<()> {
            let caller = self.env().caller();
            let mut offer = self.offers.get(offer_id).ok_or(Error::NotFound)?;
            if offer.lender != caller {
                return Err(Error::Unauthorized);
            }
            if !offer.active {
                return Err(if offer.fulfilled { Error::DoubleSpend } else { Error::IllegalState });
            }

            TokenHandle::new(offer.token).transfer(offer.lender, offer.amount)?;

            offer.active = false;
            self.offers.insert(offer_id, &offer);

            self.env().emit_event(LoanOfferCancelled { id: offer_id });
            Ok(())
        }

        #[ink(message)]
        pub fn accept_offer(
            &mut self,
            offer_id: u64,
            borrower_collateral_amount: U256,
            borrower_collateral_token: Address,
        ) -> Result<u64> {
            self.enter()?;
            let result = self.accept_offer_inner(offer_id, borrower_collateral_amount, borrower_collateral_token);
            self.exit();
            result
        }

        fn accept_offer_inner(
            &mut self,
            offer_id: u64,
            borrower_collateral_amount: U256,
            borrower_collateral_token: Address,
        ) -> Result<u64> {
            let mut offer = self.offers.get(offer_id).ok_or(Error::NotFound)?;
            if !offer.active {
                return Err(if offer.fulfilled { Error::DoubleSpend } else { Error::IllegalState });
            }

            let caller = self.env().caller();
            if offer.lender == caller {
                return Err(Error::Unauthorized);
            }
            if !self.registry.is_registered(caller) {
                return Err(Error::NotRegistered);
            }
            if borrower_collateral_amount != offer.required_collateral_amount
                || borrower_collateral_token != offer.collateral_token
            {
                return Err(Error::InvalidArgument);
            }

            let this = self.env().address();
            if !offer.required_collateral_amount.is_zero() {
                TokenHandle::new(offer.collateral_token).transfer_from(
                    caller,
                    this,
                    offer.required_collateral_amount,
                )?;
            }
            TokenHandle::new(offer.token).transfer(caller, offer.amount)?;

            offer.active = false;
            offer.fulfilled = true;
            self.offers.insert(offer_id, &offer);

            let now = self.env().block_timestamp();
            let id = self.derive_agreement_id(offer_id, caller, now);
            let agreement = LoanAgreement {
                id,
                origin_offer_id: offer_id,
                origin_request_id: 0,
                lender: offer.lender,
                borrower: caller,
                principal_amount: offer.amount,
                loan_token: offer.token,
                interest_rate_bps: offer.interest_rate_bps,
                duration_seconds: offer.duration_seconds,
                collateral_amount: offer.required_collateral_amount,
                collateral_token: offer.collateral_token,
                collateral_released: false,
                start_time: now,
                due_date: now.saturating_add(offer.duration_seconds),
                amount_paid: U256::zero(),
                status: AgreementStatus::Active,
                requested_modification_type: ModificationType::None,
                requested_modification_value: U256::zero(),
                modification_approved_by_lender: false,
            };
            self.insert_agreement(agreement);

            Ok(id)
        }

        // ------------------------------------------------------------------
        // Requests
        // ------------------------------------------------------------------

        #[ink(message)]
        pub fn create_request(
            &mut self,
            amount: U256,
            token: Address,
            proposed_interest_rate_bps: u16,
            proposed_duration_seconds: u64,
            offered_collateral_amount: U256,
            collateral_token: Address,
        ) -> Result<u64> {
            self.enter()?;
            let result = self.create_request_inner(
                amount,
                token,
                proposed_interest_rate_bps,
                proposed_duration_seconds,
                offered_collateral_amount,
                collateral_token,
            );
            self.exit();
            result
        }

        fn create_request_inner(
            &mut self,
            amount: U256,
            token: Address,
            proposed_interest_rate_bps: u16,
            proposed_duration_seconds: u64,
            offered_collateral_amount: U256,
            collateral_token: Address,
        ) -> Result<u64> {
            let caller = self.env().caller();
            if !self.registry.is_registered(caller) {
                return Err(Error::NotRegistered);
            }
            if amount.is_zero() || proposed_duration_seconds == 0 || token == zero_address() {
                return Err(Error::InvalidArgument);
            }
            Self::validate_collateral_shape(offered_collateral_amount, collateral_token)?;

            if !offered_collateral_amount.is_zero() {
                let balance = TokenHandle::new(collateral_token).balance_of(caller)?;
                if balance < offered_collateral_amount {
                    return Err(Error::InsufficientBalance);
                }
            }

            let id = self.next_request_id(caller);
            let request = LoanRequest {
                id,
                borrower: caller,
                amount,
                token,
                proposed_interest_rate_bps,
                proposed_duration_seconds,
                offered_collateral_amount,
                collateral_token,
                active: true,
                fulfilled: false,
            };
            self.requests.insert(id, &request);
            let mut list = self.requests_by_borrower.get(caller).unwrap_or_default();
            list.push(id);
            self.requests_by_borrower.insert(caller, &list);

            self.env().emit_event(LoanRequestCreated { id, borrower: caller, amount, token });

            Ok(id)
        }

        #[ink(message)]
        pub fn cancel_request(&mut self, request_id: u64) -> Result<()> {
            self.enter()?;
            let result = self.cancel_request_inner(request_id);
            self.exit();
            result
        }

        fn cancel_request_inner(&mut self, request_id: u64) -> Result<()> {
            let caller = self.env().caller();
            let mut request = self.requests.get(request_id).ok_or(Error::NotFound)?;
            if request.borrower != caller {
                return Err(Error::Unauthorized);
            }
            if !request.active {
                return Err(if request.fulfilled { Error::DoubleSpend } else { Error::IllegalState });
            }

            request.active = false;
            self.requests.insert(request_id, &request);

            self.env().emit_event(LoanRequestCancelled { id: request_id });
            Ok(())
        }

        #[ink(message)]
        pub fn fund_request(&mut self, request_id: u64) -> Result<u64> {
            self.enter()?;
            let result = self.fund_request_inner(request_id);
            self.exit();
            result
        }

        fn fund_request_inner(&mut self, request_id: u64) -> Result<u64> {
            let mut request = self.requests.get(request_id).ok_or(Error::NotFound)?;
            if !request.active {
                return Err(if request.fulfilled { Error::DoubleSpend } else { Error::IllegalState });
            }

            let caller = self.env().caller();
            if request.borrower == caller {
                return Err(Error::Unauthorized);
            }
            if !self.registry.is_registered(caller) {
                return Err(Error::NotRegistered);
            }

            let balance = TokenHandle::new(request.token).balance_of(caller)?;
            if balance < request.amount {
                return Err(Error::InsufficientBalance);
            }

            TokenHandle::new(request.token).transfer_from(caller, request.borrower, request.amount)?;

            if !request.offered_collateral_amount.is_zero() {
                let this = self.env().address();
                TokenHandle::new(request.collateral_token).transfer_from(
                    request.borrower,
                    this,
                    request.offered_collateral_amount,
                )?;
            }

            request.active = false;
            request.fulfilled = true;
            self.requests.insert(request_id, &request);

            let now = self.env().block_timestamp();
            let id = self.derive_agreement_id(request_id, caller, now);
            let agreement = LoanAgreement {
                id,
                origin_offer_id: 0,
                origin_request_id: request_id,
                lender: caller,
                borrower: request.borrower,
                principal_amount: request.amount,
                loan_token: request.token,
                interest_rate_bps: request.proposed_interest_rate_bps,
                duration_seconds: request.proposed_duration_seconds,
                collateral_amount: request.offered_collateral_amount,
                collateral_token: request.collateral_token,
                collateral_released: false,
                start_time: now,
                due_date: now.saturating_add(request.proposed_duration_seconds),
                amount_paid: U256::zero(),
                status: AgreementStatus::Active,
                requested_modification_type: ModificationType::None,
                requested_modification_value: U256::zero(),
                modification_approved_by_lender: false,
            };
            self.insert_agreement(agreement);

            Ok(id)
        }

        // ------------------------------------------------------------------
        // Repayment & modification
        // ------------------------------------------------------------------

        #[ink(message)]
        pub fn repay(&mut self, agreement_id: u64, payment_amount: U256) -> Result<()> {
            self.enter()?;
            let result = self.repay_inner(agreement_id, payment_amount);
            self.exit();
            result
        }

        fn repay_inner(&mut self, agreement_id: u64, payment_amount: U256) -> Result<()> {
            let mut agreement = self.agreements.get(agreement_id).ok_or(Error::NotFound)?;
            let caller = self.env().caller();
            if caller != agreement.borrower {
                return Err(Error::Unauthorized);
            }
            if !matches!(
                agreement.status,
                AgreementStatus::Active | AgreementStatus::Overdue | AgreementStatus::ActivePartialPaymentAgreed
            ) {
                return Err(Error::IllegalState);
            }
            if payment_amount.is_zero() {
                return Err(Error::InvalidArgument);
            }

            let total_due = agreement.total_due();
            let remaining = token::u256_sub(total_due, agreement.amount_paid);
            if payment_amount > remaining {
                return Err(Error::OverPayment);
            }

            // Snapshot before mutation: the classifier reads the terms in
            // effect at the moment of *this* repayment.
            let modification_type_before = agreement.requested_modification_type;
            let lender_approved_before = agreement.modification_approved_by_lender;
            let agreed_value_before = agreement.requested_modification_value;

            TokenHandle::new(agreement.loan_token).transfer_from(caller, agreement.lender, payment_amount)?;

            agreement.amount_paid = u256_add(agreement.amount_paid, payment_amount);
            let now = self.env().block_timestamp();

            let next_status = next_repayment_status(
                agreement.status,
                agreement.amount_paid,
                total_due,
                payment_amount,
                agreed_value_before,
                now,
                agreement.due_date,
            );

            agreement.status = next_status;
            self.agreements.insert(agreement_id, &agreement);

            if next_status == AgreementStatus::Repaid {
                if !agreement.collateral_amount.is_zero() && !agreement.collateral_released {
                    TokenHandle::new(agreement.collateral_token)
                        .transfer(agreement.borrower, agreement.collateral_amount)?;
                    agreement.collateral_released = true;
                    self.agreements.insert(agreement_id, &agreement);
                }

                let outcome = classify_outcome(
                    now,
                    agreement.due_date,
                    modification_type_before,
                    lender_approved_before,
                );

                self.reputation
                    .record_loan_payment_outcome(
                        agreement_id,
                        agreement.borrower,
                        agreement.lender,
                        agreement.principal_amount,
                        outcome,
                        modification_type_before,
                        lender_approved_before,
                    )
                    .map_err(|_| Error::IllegalState)?;

                self.env().emit_event(LoanRepayment {
                    agreement_id,
                    payer: agreement.borrower,
                    amount: payment_amount,
                    new_status: next_status,
                });
                self.env().emit_event(LoanAgreementRepaid {
                    agreement_id,
                    borrower: agreement.borrower,
                    lender: agreement.lender,
                    total_paid: agreement.amount_paid,
                });
            } else {
                self.env().emit_event(LoanRepayment {
                    agreement_id,
                    payer: agreement.borrower,
                    amount: payment_amount,
                    new_status: next_status,
                });
            }

            Ok(())
        }

        #[ink(message)]
        pub fn request_modification(
            &mut self,
            agreement_id: u64,
            modification_type: ModificationType,
            value: U256,
        ) -> Result<()> {
            self.enter()?;
            let result = self.request_modification_inner(agreement_id, modification_type, value);
            self.exit();
            result
        }

        fn request_modification_inner(
            &mut self,
            agreement_id: u64,
            modification_type: ModificationType,
            value: U256,
        ) -> Result<()> {
            let mut agreement = self.agreements.get(agreement_id).ok_or(Error::NotFound)?;
            let caller = self.env().caller();
            if caller != agreement.borrower {
                return Err(Error::Unauthorized);
            }
            if !matches!(agreement.status, AgreementStatus::Active | AgreementStatus::Overdue) {
                return Err(Error::IllegalState);
            }
            if value.is_zero() || modification_type == ModificationType::None {
                return Err(Error::InvalidArgument);
            }
            if modification_type == ModificationType::DueDateExtension
                && value <= U256::from(agreement.due_date)
            {
                return Err(Error::InvalidArgument);
            }

            agreement.requested_modification_type = modification_type;
            agreement.requested_modification_value = value;
            agreement.modification_approved_by_lender = false;
            agreement.status = AgreementStatus::PendingModificationApproval;
            self.agreements.insert(agreement_id, &agreement);

            self.env().emit_event(PaymentModificationRequested {
                agreement_id,
                modification_type,
                value,
            });

            Ok(())
        }

        #[ink(message)]
        pub fn respond_to_modification(&mut self, agreement_id: u64, approved: bool) -> Result<()> {
            self.enter()?;
            let result = self.respond_to_modification_inner(agreement_id, approved);
            self.exit();
            result
        }

        fn respond_to_modification_inner(&mut self, agreement_id: u64, approved: bool) -> Result<()> {
            let mut agreement = self.agreements.get(agreement_id).ok_or(Error::NotFound)?;
            let caller = self.env().caller();
            if caller != agreement.lender {
                return Err(Error::Unauthorized);
            }
            if agreement.status != AgreementStatus::PendingModificationApproval {
                return Err(Error::IllegalState);
            }

            let now = self.env().block_timestamp();
            let next_status = if approved {
                match agreement.requested_modification_type {
                    ModificationType::DueDateExtension => {
                        agreement.due_date = agreement.requested_modification_value.as_u64();
                        agreement.modification_approved_by_lender = true;
                        if now > agreement.due_date {
                            AgreementStatus::Overdue
                        } else {
                            AgreementStatus::Active
                        }
                    }
                    ModificationType::PartialPaymentAgreement => {
                        agreement.modification_approved_by_lender = true;
                        AgreementStatus::ActivePartialPaymentAgreed
                    }
                    ModificationType::None => return Err(Error::IllegalState),
                }
            } else if now > agreement.due_date {
                AgreementStatus::Overdue
            } else {
                AgreementStatus::Active
            };

            agreement.status = next_status;
            self.agreements.insert(agreement_id, &agreement);

            self.env().emit_event(PaymentModificationResponded {
                agreement_id,
                approved,
                new_status: next_status,
            });

            Ok(())
        }

        // ------------------------------------------------------------------
        // Default
        // ------------------------------------------------------------------

        #[ink(message)]
        pub fn handle_default(&mut self, agreement_id: u64) -> Result<()> {
            self.enter()?;
            let result = self.handle_default_inner(agreement_id);
            self.exit();
            result
        }

        fn handle_default_inner(&mut self, agreement_id: u64) -> Result<()> {
            let mut agreement = self.agreements.get(agreement_id).ok_or(Error::NotFound)?;
            if !matches!(agreement.status, AgreementStatus::Active | AgreementStatus::Overdue) {
                return Err(Error::IllegalState);
            }

            let now = self.env().block_timestamp();
            if now <= agreement.due_date {
                return Err(Error::NotOverdue);
            }
            if agreement.amount_paid >= agreement.total_due() {
                return Err(Error::AlreadySettled);
            }

            agreement.status = AgreementStatus::Defaulted;
            self.agreements.insert(agreement_id, &agreement);

            if !agreement.collateral_amount.is_zero() && !agreement.collateral_released {
                TokenHandle::new(agreement.collateral_token)
                    .transfer(agreement.lender, agreement.collateral_amount)?;
                agreement.collateral_released = true;
                self.agreements.insert(agreement_id, &agreement);

                self.env().emit_event(CollateralSeized {
                    agreement_id,
                    token: agreement.collateral_token,
                    amount: agreement.collateral_amount,
                    to: agreement.lender,
                });
            }

            self.reputation
                .record_loan_default(agreement.borrower, agreement.lender, agreement.principal_amount)
                .map_err(|_| Error::IllegalState)?;

            self.env().emit_event(LoanAgreementDefaulted {
                agreement_id,
                borrower: agreement.borrower,
                lender: agreement.lender,
                amount_paid: agreement.amount_paid,
            });

            let vouches = self.reputation.active_vouches_for_borrower(agreement.borrower);
            for (voucher, _vouch_token, stake) in vouches {
                let slash = slash_amount(stake, VOUCHER_SLASH_BPS);
                self.reputation
                    .slash_vouch_and_reputation(voucher, agreement.borrower, slash, agreement.lender)
                    .map_err(|_| Error::IllegalState)?;
            }

            Ok(())
        }

        // ------------------------------------------------------------------
        // Queries
        // ------------------------------------------------------------------

        #[ink(message)]
        pub fn get_offer(&self, offer_id: u64) -> Option<LoanOffer> {
            self.offers.get(offer_id)
        }

        #[ink(message)]
        pub fn get_request(&self, request_id: u64) -> Option<LoanRequest> {
            self.requests.get(request_id)
        }

        #[ink(message)]
        pub fn get_agreement(&self, agreement_id: u64) -> Option<LoanAgreement> {
            self.agreements.get(agreement_id)
        }

        #[ink(message)]
        pub fn offers_by_lender(&self, lender: Address) -> Vec<u64> {
            self.offers_by_lender.get(lender).unwrap_or_default()
        }

        #[ink(message)]
        pub fn requests_by_borrower(&self, borrower: Address) -> Vec<u64> {
            self.requests_by_borrower.get(borrower).unwrap_or_default()
        }

        #[ink(message)]
        pub fn agreements_by_lender(&self, lender: Address) -> Vec<u64> {
            self.agreements_by_lender.get(lender).unwrap_or_default()
        }

        #[ink(message)]
        pub fn agreements_by_borrower(&self, borrower: Address) -> Vec<u64> {
            self.agreements_by_borrower.get(borrower).unwrap_or_default()
        }

        #[ink(message)]
        pub fn platform_wallet(&self) -> Address {
            self.platform_wallet
        }

        // ------------------------------------------------------------------
        // Internal helpers
        // ------------------------------------------------------------------

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

        fn validate_collateral_shape(amount: U256, token: Address) -> Result<()> {
            let has_amount = !amount.is_zero();
            let has_token = token != zero_address();
            if has_amount != has_token {
                return Err(Error::InvalidArgument);
            }
            Ok(())
        }

        fn insert_agreement(&mut self, agreement: LoanAgreement) {
            let id = agreement.id;
            let lender = agreement.lender;
            let borrower = agreement.borrower;
            let due_date = agreement.due_date;
            let principal_amount = agreement.principal_amount;
            self.agreements.insert(id, &agreement);

            let mut by_lender = self.agreements_by_lender.get(lender).unwrap_or_default();
            by_lender.push(id);
            self.agreements_by_lender.insert(lender, &by_lender);

            let mut by_borrower = self.agreements_by_borrower.get(borrower).unwrap_or_default();
            by_borrower.push(id);
            self.agreements_by_borrower.insert(borrower, &by_borrower);

            self.env().emit_event(LoanAgreementCreated {
                id,
                lender,
                borrower,
                principal_amount,
                due_date,
            });
        }

        fn next_offer_id(&mut self, lender: Address) -> u64 {
            let seq = self.lender_sequence.get(lender).unwrap_or(0);
            self.lender_sequence.insert(lender, &(seq.saturating_add(1)));
            self.derive_id(lender, self.env().block_timestamp(), seq)
        }

        fn next_request_id(&mut self, borrower: Address) -> u64 {
            let seq = self.borrower_sequence.get(borrower).unwrap_or(0);
            self.borrower_sequence.insert(borrower, &(seq.saturating_add(1)));
            self.derive_id(borrower, self.env().block_timestamp(), seq)
        }

        /// Agreement ids are derived from `(origin_id, counterparty,
        /// start_time)` per spec §3.6 — collision-resistant and stable,
        /// not reliant on a separate counter.
        fn derive_agreement_id(&self, origin_id: u64, counterparty: Address, start_time: Timestamp) -> u64 {
            self.derive_id(counterparty, start_time, origin_id)
        }

        /// Hashes `(address, timestamp, salt)` into a 64-bit id. Uses the
        /// host's own hash function rather than a codec crate so no
        /// extra dependency is needed for this.
        fn derive_id(&self, address: Address, timestamp: Timestamp, salt: u64) -> u64 {
            let mut input = [0u8; 36];
            input[0..20].copy_from_slice(address.as_bytes());
            input[20..28].copy_from_slice(&timestamp.to_le_bytes());
            input[28..36].copy_from_slice(&salt.to_le_bytes());

            let mut output = <ink::env::hash::Blake2x256 as ink::env::hash::HashOutput>::Type::default();
            ink::env::hash_bytes::<ink::env::hash::Blake2x256>(&input, &mut output);
            u64::from_le_bytes(output[0..8].try_into().unwrap_or([0u8; 8]))
        }

    }

    /// Decides the agreement status a repayment lands on. Meeting an
    /// agreed partial-payment amount exits `ActivePartialPaymentAgreed`
    /// back to `Active`/`Overdue`, but callers must leave the agreement's
    /// `requested_modification_type`/`modification_approved_by_lender`
    /// fields untouched here — they are still needed by `classify_outcome`
    /// whenever the loan is later settled by a subsequent `repay` call
    /// (spec §8 scenario S5).
    pub fn next_repayment_status(
        current_status: AgreementStatus,
        amount_paid_after: U256,
        total_due: U256,
        payment_amount: U256,
        agreed_partial_amount: U256,
        now: Timestamp,
        due_date: Timestamp,
    ) -> AgreementStatus {
        if amount_paid_after >= total_due {
            return AgreementStatus::Repaid;
        }
        match current_status {
            AgreementStatus::ActivePartialPaymentAgreed if payment_amount != agreed_partial_amount => {
                AgreementStatus::ActivePartialPaymentAgreed
            }
            _ => {
                if now > due_date {
                    AgreementStatus::Overdue
                } else {
                    AgreementStatus::Active
                }
            }
        }
    }

    /// Deterministically classifies a settling repayment's payment
    /// trajectory (spec §4.4). First matching rule wins.
    pub fn classify_outcome(
        now: Timestamp,
        due_date: Timestamp,
        modification_type_before: ModificationType,
        lender_approved_before: bool,
    ) -> PaymentOutcome {
        if now <= due_date
            && lender_approved_before
            && modification_type_before == ModificationType::DueDateExtension
        {
            PaymentOutcome::OnTimeExtended
        } else if now <= due_date
            && lender_approved_before
            && modification_type_before == ModificationType::PartialPaymentAgreement
        {
            PaymentOutcome::PartialAgreementMetAndRepaid
        } else if now <= due_date {
            PaymentOutcome::OnTimeOriginal
        } else if now > due_date
            && lender_approved_before
            && modification_type_before == ModificationType::DueDateExtension
        {
            PaymentOutcome::LateExtended
        } else {
            PaymentOutcome::LateGraceOriginal
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn addr(byte: u8) -> Address {
            Address::from(&[byte; 20])
        }

        #[test]
        fn classify_outcome_on_time_original() {
            assert_eq!(
                classify_outcome(5, 10, ModificationType::None, false),
                PaymentOutcome::OnTimeOriginal
            );
        }

        #[test]
        fn classify_outcome_late_grace_fallback() {
            assert_eq!(
                classify_outcome(20, 10, ModificationType::None, false),
                PaymentOutcome::LateGraceOriginal
            );
        }

        #[test]
        fn classify_outcome_on_time_extended_requires_approval() {
            assert_eq!(
                classify_outcome(9, 10, ModificationType::DueDateExtension, true),
                PaymentOutcome::OnTimeExtended
            );
            // Not approved -> falls through to OnTimeOriginal even
            // though a DueDateExtension was requested.
            assert_eq!(
                classify_outcome(9, 10, ModificationType::DueDateExtension, false),
                PaymentOutcome::OnTimeOriginal
            );
        }

        #[test]
        fn classify_outcome_partial_agreement_met() {
            assert_eq!(
                classify_outcome(9, 10, ModificationType::PartialPaymentAgreement, true),
                PaymentOutcome::PartialAgreementMetAndRepaid
            );
        }

        #[test]
        fn classify_outcome_late_extended_when_approved_and_still_late() {
            assert_eq!(
                classify_outcome(20, 10, ModificationType::DueDateExtension, true),
                PaymentOutcome::LateExtended
            );
        }

        #[test]
        fn classify_outcome_late_partial_agreement_falls_back_to_late_grace() {
            // Spec §9 open question: only DueDateExtension gets its own
            // "late" branch; an approved-but-late partial agreement
            // falls through to the generic late-grace fallback.
            assert_eq!(
                classify_outcome(20, 10, ModificationType::PartialPaymentAgreement, true),
                PaymentOutcome::LateGraceOriginal
            );
        }

        #[test]
        fn total_due_uses_truncating_division() {
            let agreement = LoanAgreement {
                id: 1,
                origin_offer_id: 1,
                origin_request_id: 0,
                lender: addr(1),
                borrower: addr(2),
                principal_amount: U256::from(100u32),
                loan_token: addr(3),
                interest_rate_bps: 1000,
                duration_seconds: 604_800,
                collateral_amount: U256::zero(),
                collateral_token: token::zero_address(),
                collateral_released: false,
                start_time: 0,
                due_date: 604_800,
                amount_paid: U256::zero(),
                status: AgreementStatus::Active,
                requested_modification_type: ModificationType::None,
                requested_modification_value: U256::zero(),
                modification_approved_by_lender: false,
            };
            assert_eq!(agreement.total_due(), U256::from(110u32));
        }

        // Scenarios S1-S6 from spec §8. Amounts use plain token units
        // rather than 18-decimal magnitudes since `next_repayment_status`/
        // `classify_outcome` are magnitude-agnostic; only the ratios matter.

        #[test]
        fn s1_on_time_repayment_no_modification() {
            // Offer 100, 1000bps, 7 days. Repaid in one call at day 6.
            let total_due = U256::from(110u32);
            let status = next_repayment_status(
                AgreementStatus::Active,
                total_due,
                total_due,
                total_due,
                U256::zero(),
                6,
                7,
            );
            assert_eq!(status, AgreementStatus::Repaid);
            assert_eq!(
                classify_outcome(6, 7, ModificationType::None, false),
                PaymentOutcome::OnTimeOriginal
            );
        }

        #[test]
        fn s2_partial_then_overdue_then_settles() {
            // Offer 200, 1000bps, 14 days. 110 at day 7, remaining 110 at day 15.
            let total_due = U256::from(220u32);
            let after_first = U256::from(110u32);
            let status_after_first = next_repayment_status(
                AgreementStatus::Active,
                after_first,
                total_due,
                U256::from(110u32),
                U256::zero(),
                7,
                14,
            );
            assert_eq!(status_after_first, AgreementStatus::Active);

            let status_after_second = next_repayment_status(
                AgreementStatus::Active,
                total_due,
                total_due,
                U256::from(110u32),
                U256::zero(),
                15,
                14,
            );
            assert_eq!(status_after_second, AgreementStatus::Repaid);
            assert_eq!(
                classify_outcome(15, 14, ModificationType::None, false),
                PaymentOutcome::LateGraceOriginal
            );
        }

        #[test]
        fn s3_approved_extension_paid_on_time_under_new_date() {
            // Offer 70, 1000bps, 7 days extended to day 14; repaid at day 13.
            let total_due = U256::from(77u32);
            let status = next_repayment_status(
                AgreementStatus::Active,
                total_due,
                total_due,
                total_due,
                U256::zero(),
                13,
                14,
            );
            assert_eq!(status, AgreementStatus::Repaid);
            assert_eq!(
                classify_outcome(13, 14, ModificationType::DueDateExtension, true),
                PaymentOutcome::OnTimeExtended
            );
        }

        #[test]
        fn s4_default_slash_amount_matches_vouch_bps() {
            // Offer 100, 1000bps, 7 days; voucher staked 50, slashed at 1000bps.
            assert_eq!(slash_amount(U256::from(50u32), 1000), U256::from(5u32));
        }

        #[test]
        fn s5_partial_agreement_met_then_loan_completes() {
            // Offer 90, 1000bps, 10 days; partial agreement for 30 approved,
            // paid exactly, then the remaining 69 settles the loan.
            let total_due = U256::from(99u32);
            let agreed = U256::from(30u32);

            let status_after_partial = next_repayment_status(
                AgreementStatus::ActivePartialPaymentAgreed,
                agreed,
                total_due,
                agreed,
                agreed,
                4,
                10,
            );
            assert_eq!(status_after_partial, AgreementStatus::Active);

            // The modification fields must survive this transition: a
            // second, later `repay` call still needs to see them to reach
            // `PartialAgreementMetAndRepaid` instead of `OnTimeOriginal`.
            let status_after_final = next_repayment_status(
                AgreementStatus::Active,
                total_due,
                total_due,
                U256::from(69u32),
                agreed,
                9,
                10,
            );
            assert_eq!(status_after_final, AgreementStatus::Repaid);
            assert_eq!(
                classify_outcome(9, 10, ModificationType::PartialPaymentAgreement, true),
                PaymentOutcome::PartialAgreementMetAndRepaid
            );
        }

        #[test]
        fn s6_rejected_modification_keeps_original_terms() {
            // A rejection falls back to the same on-time/overdue date
            // comparison `next_repayment_status` uses for any non-matching
            // payment against `ActivePartialPaymentAgreed`; due_date is
            // untouched by a rejection so the original term still governs.
            let total_due = U256::from(110u32);
            let partial = U256::zero();
            let status_before_due = next_repayment_status(
                AgreementStatus::Active,
                U256::zero(),
                total_due,
                U256::zero(),
                partial,
                6,
                7,
            );
            assert_eq!(status_before_due, AgreementStatus::Active);

            let status_past_due = next_repayment_status(
                AgreementStatus::Active,
                U256::zero(),
                total_due,
                U256::zero(),
                partial,
                8,
                7,
            );
            assert_eq!(status_past_due, AgreementStatus::Overdue);
        }
    }
}
