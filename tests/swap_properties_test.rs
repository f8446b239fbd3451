/// Property tests for pool math and vault solvency

use binary_market_core::{
    Address, AssetLedger, Engine, EngineConfig, ManualClock, Pool, SwapDirection,
};
use proptest::prelude::*;

fn pool_with(base_reserve: u64, quote_reserve: u64) -> Pool {
    let mut pool = Pool::new(
        Address::from_label("base"),
        Address::from_label("quote"),
        9,
        6,
        1_000_000_000_000,
        10_000_000_000,
        0,
    );
    pool.base_reserve = base_reserve;
    pool.quote_reserve = quote_reserve;
    pool.lp_supply = quote_reserve;
    pool
}

fn reserve_strategy() -> impl Strategy<Value = u64> {
    1u64..=1_000_000_000_000_000
}

fn direction_strategy() -> impl Strategy<Value = SwapDirection> {
    prop_oneof![Just(SwapDirection::Buy), Just(SwapDirection::Sell)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn fuzz_swap_grows_k(
        base in reserve_strategy(),
        quote in reserve_strategy(),
        input in 1u64..=1_000_000_000_000,
        direction in direction_strategy(),
    ) {
        let pool = pool_with(base, quote);
        let receipt = pool.quote_swap(direction, input, 1).unwrap();

        let (reserve_in, reserve_out) = match direction {
            SwapDirection::Buy => (quote as u128, base as u128),
            SwapDirection::Sell => (base as u128, quote as u128),
        };
        prop_assert!((receipt.output_amount as u128) < reserve_out, "pool drained");

        let k_before = reserve_in * reserve_out;
        let k_after = (reserve_in + input as u128) * (reserve_out - receipt.output_amount as u128);
        prop_assert!(k_after > k_before, "k {} -> {}", k_before, k_after);
    }

    #[test]
    fn fuzz_fee_never_helps_the_trader(
        base in reserve_strategy(),
        quote in reserve_strategy(),
        input in 1u64..=1_000_000_000_000,
        direction in direction_strategy(),
    ) {
        let pool = pool_with(base, quote);
        let output = pool.swap_output(direction, input).unwrap() as u128;

        let (reserve_in, reserve_out) = match direction {
            SwapDirection::Buy => (quote as u128, base as u128),
            SwapDirection::Sell => (base as u128, quote as u128),
        };
        let fee_free = reserve_out * input as u128 / (reserve_in + input as u128);
        prop_assert!(output <= fee_free);
    }

    #[test]
    fn fuzz_quote_matches_swap(
        input in 1u64..=500_000_000,
        direction in direction_strategy(),
    ) {
        let clock = ManualClock::new(10);
        let mut engine = Engine::new(&EngineConfig::default(), Box::new(clock.clone()));
        let issuer = Address::from_label("issuer");
        let base = Address::from_label("base");
        let quote = Address::from_label("quote");
        let alice = Address::from_label("alice");
        engine.create_asset(base, 9, Some(issuer)).unwrap();
        engine.create_asset(quote, 6, Some(issuer)).unwrap();
        engine.host_ledger().mint(&base, &alice, 100_000_000_000, &issuer).unwrap();
        engine.host_ledger().mint(&quote, &alice, 100_000_000_000, &issuer).unwrap();

        let pool = engine.create_pool(&alice, base, quote, 1_000_000_000_000, 10_000_000_000).unwrap();
        engine.add_liquidity(&pool, &alice, 10_000_000_000, u64::MAX, 0).unwrap();

        clock.advance(5);
        let quoted = engine.quote_swap(&pool, direction, input).unwrap();
        let executed = engine.swap(&pool, &alice, direction, input, quoted.output_amount).unwrap();
        prop_assert_eq!(quoted, executed);
    }
}

#[derive(Debug, Clone)]
enum VaultAction {
    Mint { who: usize, amount: u64 },
    Merge { who: usize, amount: u64 },
    GiveFinalize { from: usize, to: usize, amount: u64 },
    GiveRevert { from: usize, to: usize, amount: u64 },
}

fn vault_action_strategy() -> impl Strategy<Value = VaultAction> {
    prop_oneof![
        (0usize..3, 1u64..1_000).prop_map(|(who, amount)| VaultAction::Mint { who, amount }),
        (0usize..3, 1u64..1_000).prop_map(|(who, amount)| VaultAction::Merge { who, amount }),
        (0usize..3, 0usize..3, 1u64..1_000).prop_map(|(from, to, amount)| VaultAction::GiveFinalize { from, to, amount }),
        (0usize..3, 0usize..3, 1u64..1_000).prop_map(|(from, to, amount)| VaultAction::GiveRevert { from, to, amount }),
    ]
}

// 0 = finalize true, 1 = finalize false, 2 = revert
fn settlement_strategy() -> impl Strategy<Value = u8> {
    0u8..3
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn fuzz_vault_stays_solvent(
        actions in prop::collection::vec(vault_action_strategy(), 1..40),
        settlement in settlement_strategy(),
    ) {
        let mut engine = Engine::new(&EngineConfig::default(), Box::new(ManualClock::new(0)));
        let issuer = Address::from_label("issuer");
        let settler = Address::from_label("settler");
        let usdc = Address::from_label("usdc");
        let users = [Address::from_label("alice"), Address::from_label("bob"), Address::from_label("carol")];

        engine.create_asset(usdc, 6, Some(issuer)).unwrap();
        for user in &users {
            engine.host_ledger().mint(&usdc, user, 10_000, &issuer).unwrap();
        }
        let vault = engine.initialize_vault(settler, usdc, "fuzz-claim").unwrap();
        let (on_finalize, on_revert) = {
            let v = engine.vault(&vault).unwrap();
            (v.on_finalize_mint, v.on_revert_mint)
        };

        // Rejected actions are fine; they just must not break the books
        for action in actions {
            let _ = match action {
                VaultAction::Mint { who, amount } => engine.mint_conditional_tokens(&vault, &users[who], amount, None).map(|_| ()),
                VaultAction::Merge { who, amount } => engine.merge_conditional_tokens(&vault, &users[who], amount).map(|_| ()),
                VaultAction::GiveFinalize { from, to, amount } => engine.host_ledger().transfer(&on_finalize, &users[from], &users[to], amount),
                VaultAction::GiveRevert { from, to, amount } => engine.host_ledger().transfer(&on_revert, &users[from], &users[to], amount),
            };
            prop_assert!(engine.audit_vault(&vault).is_ok());
        }

        match settlement {
            0 => engine.resolve_vault(&vault, &settler, true).unwrap(),
            1 => engine.resolve_vault(&vault, &settler, false).unwrap(),
            _ => engine.cancel_vault(&vault, &settler).unwrap(),
        }

        let held_before = engine.vault(&vault).unwrap().collateral_held;
        let mut paid = 0u64;
        for user in &users {
            paid += engine.redeem_conditional_tokens(&vault, user).unwrap().payout;
        }

        prop_assert!(paid <= held_before);
        if settlement < 2 {
            // Winners take the whole pot
            prop_assert_eq!(paid, held_before);
        }
        let total: u64 = users.iter().map(|u| engine.balance_of(&usdc, u)).sum();
        prop_assert_eq!(total + engine.vault(&vault).unwrap().collateral_held, 30_000);
        prop_assert!(engine.audit_vault(&vault).is_ok());
    }
}
