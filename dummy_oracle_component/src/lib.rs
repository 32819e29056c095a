//! # Dummy Oracle Blueprint
//! Component for testing the trove manager against a settable collateral price.

use scrypto::prelude::*;

#[blueprint]
mod oracle {
    enable_method_auth! {
        methods {
            get_price => PUBLIC;
            set_price => restrict_to: [OWNER];
        }
    }

    struct Oracle {
        prices: HashMap<ResourceAddress, Decimal>,
    }

    impl Oracle {
        pub fn instantiate_oracle(collateral_address: ResourceAddress, initial_price: Decimal) -> Global<Oracle> {
            let mut prices: HashMap<ResourceAddress, Decimal> = HashMap::new();
            prices.insert(collateral_address, initial_price);

            Self { prices }
                .instantiate()
                .prepare_to_globalize(OwnerRole::None)
                .metadata(metadata! {
                    init {
                        "name" => "Trove Protocol Dummy Oracle".to_string(), updatable;
                        "description" => "A dummy oracle used for testing the Trove Protocol".to_string(), updatable;
                    }
                })
                .globalize()
        }

        pub fn get_price(&self, collateral: ResourceAddress) -> Decimal {
            match self.prices.get(&collateral) {
                Some(price) => *price,
                None => panic!("Collateral not supported."),
            }
        }

        pub fn set_price(&mut self, collateral: ResourceAddress, price: Decimal) {
            self.prices.insert(collateral, price);
        }
    }
}
