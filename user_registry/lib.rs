#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// Authoritative identity directory. Every other contract in the
/// protocol gates on `is_registered` before trusting an address.
#[ink::contract]
mod user_registry {
    use ink::prelude::string::String;
    use ink::storage::Mapping;

    const MAX_NAME_LEN: usize = 50;

    /// Profile stored for a registered account.
    #[ink::storage_item(packed)]
    #[derive(Debug, PartialEq, Clone)]
    pub struct UserProfile {
        registered: bool,
        name: String,
        registration_time: Timestamp,
    }

    #[ink(storage)]
    pub struct UserRegistry {
        profiles: Mapping<Address, UserProfile>,
        registered_addresses: Mapping<u64, Address>,
        total_registered: u64,
    }

    #[ink(event)]
    pub struct UserRegistered {
        #[ink(topic)]
        who: Address,
        name: String,
        registered_at: Timestamp,
    }

    #[ink(event)]
    pub struct UserProfileUpdated {
        #[ink(topic)]
        who: Address,
        name: String,
    }

    #[derive(Debug, PartialEq, Eq)]
    #[ink::scale_derive(Encode, Decode, TypeInfo)]
    pub enum Error {
        AlreadyRegistered,
        NotRegistered,
        NameInvalid,
    }

    pub type Result<T> = core::result::Result<T, Error>;

    impl UserRegistry {
        #[ink(constructor)]
        pub fn new() -> Self {
            Self {
                profiles: Mapping::default(),
                registered_addresses: Mapping::default(),
                total_registered: 0,
            }
        }

        /// Registers the caller with `name`. One-shot: a previously
        /// registered caller is rejected, never re-registered.
        #[ink(message)]
        pub fn register(&mut self, name: String) -> Result<()> {
            let caller = self.env().caller();
            Self::validate_name(&name)?;

            if self.profiles.get(caller).map(|p| p.registered).unwrap_or(false) {
                return Err(Error::AlreadyRegistered);
            }

            let now = self.env().block_timestamp();
            let profile = UserProfile {
                registered: true,
                name: name.clone(),
                registration_time: now,
            };
            self.profiles.insert(caller, &profile);

            let index = self.total_registered;
            self.registered_addresses.insert(index, &caller);
            self.total_registered = index.saturating_add(1);

            self.env().emit_event(UserRegistered {
                who: caller,
                name,
                registered_at: now,
            });

            Ok(())
        }

        /// Updates the caller's display name in place. Does not affect
        /// `registration_time` or registry ordering.
        #[ink(message)]
        pub fn update_name(&mut self, new_name: String) -> Result<()> {
            let caller = self.env().caller();
            Self::validate_name(&new_name)?;

            let mut profile = self
                .profiles
                .get(caller)
                .filter(|p| p.registered)
                .ok_or(Error::NotRegistered)?;

            profile.name = new_name.clone();
            self.profiles.insert(caller, &profile);

            self.env().emit_event(UserProfileUpdated {
                who: caller,
                name: new_name,
            });

            Ok(())
        }

        #[ink(message)]
        pub fn is_registered(&self, addr: Address) -> bool {
            self.profiles.get(addr).map(|p| p.registered).unwrap_or(false)
        }

        #[ink(message)]
        pub fn profile(&self, addr: Address) -> Option<UserProfile> {
            self.profiles.get(addr).filter(|p| p.registered)
        }

        #[ink(message)]
        pub fn registered_at_index(&self, index: u64) -> Option<Address> {
            self.registered_addresses.get(index)
        }

        #[ink(message)]
        pub fn total_registered(&self) -> u64 {
            self.total_registered
        }

        fn validate_name(name: &str) -> Result<()> {
            if name.is_empty() || name.as_bytes().len() > MAX_NAME_LEN {
                return Err(Error::NameInvalid);
            }
            Ok(())
        }
    }

    impl UserProfile {
        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn registration_time(&self) -> Timestamp {
            self.registration_time
        }

        pub fn registered(&self) -> bool {
            self.registered
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ink::env::test;

        fn set_caller(addr: Address) {
            test::set_caller(addr);
        }

        fn addr(byte: u8) -> Address {
            Address::from(&[byte; 20])
        }

        #[ink::test]
        fn register_then_query() {
            let mut registry = UserRegistry::new();
            set_caller(addr(1));

            registry.register(String::from("alice")).unwrap();

            assert!(registry.is_registered(addr(1)));
            assert_eq!(registry.profile(addr(1)).unwrap().name(), "alice");
            assert_eq!(registry.total_registered(), 1);
            assert_eq!(registry.registered_at_index(0), Some(addr(1)));
        }

        #[ink::test]
        fn register_twice_fails() {
            let mut registry = UserRegistry::new();
            set_caller(addr(1));
            registry.register(String::from("alice")).unwrap();

            assert_eq!(
                registry.register(String::from("alice-again")),
                Err(Error::AlreadyRegistered)
            );
        }

        #[ink::test]
        fn register_with_empty_or_long_name_fails() {
            let mut registry = UserRegistry::new();
            set_caller(addr(1));

            assert_eq!(registry.register(String::new()), Err(Error::NameInvalid));

            let too_long = "a".repeat(51);
            assert_eq!(registry.register(String::from(too_long)), Err(Error::NameInvalid));
        }

        #[ink::test]
        fn update_name_requires_registration() {
            let mut registry = UserRegistry::new();
            set_caller(addr(1));

            assert_eq!(
                registry.update_name(String::from("bob")),
                Err(Error::NotRegistered)
            );

            registry.register(String::from("alice")).unwrap();
            registry.update_name(String::from("alice2")).unwrap();
            assert_eq!(registry.profile(addr(1)).unwrap().name(), "alice2");
        }

        #[ink::test]
        fn unregistered_address_has_no_profile() {
            let registry = UserRegistry::new();
            assert!(!registry.is_registered(addr(9)));
            assert_eq!(registry.profile(addr(9)), None);
        }
    }
}
