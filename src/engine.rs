// ============================================================================
// Market Engine - Binary Market Core
// ============================================================================
//
// The engine owns the asset ledger, every vault and pool, the slot clock and
// the event journal. Each public operation runs as one unit:
//
//   1. read the current slot (never lower than the last one seen)
//   2. clone the vault / pool and run the operation on the clone
//   3. commit the resulting ledger batch (all ops or none)
//   4. store the clone and journal the event
//
// A failure at any step leaves balances, entities and the journal untouched.
//
// Vaults, pools and the mints they control are engine accounts. No caller
// may act as one, and the host's ledger handle refuses ops that touch them.
//
// ============================================================================

use crate::amm::{AddLiquidityReceipt, Pool, RemoveLiquidityReceipt, SwapDirection, SwapReceipt};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::errors::{MarketError, Result};
use crate::events::{EventJournal, EventKind};
use crate::identity::{pool_address, vault_address, Address, Fingerprint};
use crate::ledger::{AssetInfo, AssetLedger, AssetOp, Ledger, Staged, TokenMetadata};
use crate::math::MAX_DECIMALS;
use crate::vault::{
    ConditionalTokenMetadata, ConditionalVault, MergeReceipt, MintReceipt, RedeemReceipt, Side, SweepReceipt,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Thread-safe handle for hosts that share one engine
pub type SharedEngine = Arc<Mutex<Engine>>;

pub struct Engine<L: AssetLedger = Ledger> {
    pub(crate) ledger: L,
    pub(crate) vaults: HashMap<Address, ConditionalVault>,
    pub(crate) pools: HashMap<Address, Pool>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) last_slot: u64,
    pub(crate) journal: EventJournal,
}

/// Log a failed operation. Consistency faults are always loud.
fn report(operation: &str, entity: &Address, err: MarketError) -> MarketError {
    if err.is_consistency_fault() {
        error!(operation, entity = %entity.short(), error = %err, "consistency fault");
    } else {
        warn!(operation, entity = %entity.short(), error = %err, "operation rejected");
    }
    err
}

/// Vault, pool, or a mint one of them is authority over
fn is_engine_account(
    vaults: &HashMap<Address, ConditionalVault>,
    pools: &HashMap<Address, Pool>,
    address: &Address,
) -> bool {
    vaults.contains_key(address)
        || pools.contains_key(address)
        || vaults.values().any(|v| v.on_finalize_mint == *address || v.on_revert_mint == *address)
        || pools.values().any(|p| p.lp_mint == *address)
}

// ============================================================================
// HOST LEDGER
// ============================================================================

/// The host's write access to the engine's ledger. Works like the ledger
/// itself but rejects any op that moves funds of an engine account, signs as
/// one, or mints and burns a conditional or LP asset.
pub struct HostLedger<'a, L: AssetLedger> {
    ledger: &'a mut L,
    vaults: &'a HashMap<Address, ConditionalVault>,
    pools: &'a HashMap<Address, Pool>,
}

impl<'a, L: AssetLedger> HostLedger<'a, L> {
    fn guard(&self, address: &Address) -> Result<()> {
        if is_engine_account(self.vaults, self.pools, address) {
            warn!(account = %address.short(), "host ledger op touches an engine account");
            return Err(MarketError::Unauthorized(format!("{} is an engine account", address.short())));
        }
        Ok(())
    }
}

impl<'a, L: AssetLedger> AssetLedger for HostLedger<'a, L> {
    fn asset(&self, asset: &Address) -> Option<&AssetInfo> {
        self.ledger.asset(asset)
    }

    fn balance_of(&self, asset: &Address, owner: &Address) -> u64 {
        self.ledger.balance_of(asset, owner)
    }

    fn create_asset(&mut self, id: Address, decimals: u8, mint_authority: Option<Address>) -> Result<()> {
        self.guard(&id)?;
        if let Some(authority) = &mint_authority {
            self.guard(authority)?;
        }
        self.ledger.create_asset(id, decimals, mint_authority)
    }

    fn set_metadata(&mut self, asset: &Address, authority: &Address, metadata: TokenMetadata) -> Result<()> {
        self.guard(asset)?;
        self.guard(authority)?;
        self.ledger.set_metadata(asset, authority, metadata)
    }

    fn commit(&mut self, ops: &[AssetOp]) -> Result<()> {
        for op in ops {
            match op {
                // Conditional and LP tokens may change hands between holders
                AssetOp::Transfer { from, to, authority, .. } => {
                    self.guard(from)?;
                    self.guard(to)?;
                    self.guard(authority)?;
                }
                AssetOp::Mint { asset, to, authority, .. } => {
                    self.guard(asset)?;
                    self.guard(to)?;
                    self.guard(authority)?;
                }
                AssetOp::Burn { asset, from, authority, .. } => {
                    self.guard(asset)?;
                    self.guard(from)?;
                    self.guard(authority)?;
                }
            }
        }
        self.ledger.commit(ops)
    }
}

impl Engine<Ledger> {
    pub fn new(config: &EngineConfig, clock: Box<dyn Clock>) -> Self {
        Self::with_ledger(Ledger::new(), clock, config.journal_capacity)
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }
}

impl<L: AssetLedger> Engine<L> {
    pub fn with_ledger(ledger: L, clock: Box<dyn Clock>, journal_capacity: usize) -> Self {
        let last_slot = clock.now();
        Self {
            ledger,
            vaults: HashMap::new(),
            pools: HashMap::new(),
            clock,
            last_slot,
            journal: EventJournal::new(journal_capacity),
        }
    }

    // ========================================================================
    // CLOCK
    // ========================================================================

    /// Current slot, clamped so it never goes backwards
    fn tick(&mut self) -> u64 {
        let now = self.peek_slot();
        self.last_slot = now;
        now
    }

    fn peek_slot(&self) -> u64 {
        self.clock.now().max(self.last_slot)
    }

    pub fn last_slot(&self) -> u64 {
        self.last_slot
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Ledger access for the host (funding accounts, issuing assets, moving
    /// tokens between holders). Engine accounts are off limits.
    pub fn host_ledger(&mut self) -> HostLedger<'_, L> {
        HostLedger { ledger: &mut self.ledger, vaults: &self.vaults, pools: &self.pools }
    }

    pub fn balance_of(&self, asset: &Address, owner: &Address) -> u64 {
        self.ledger.balance_of(asset, owner)
    }

    pub fn vault(&self, id: &Address) -> Option<&ConditionalVault> {
        self.vaults.get(id)
    }

    pub fn vaults(&self) -> impl Iterator<Item = &ConditionalVault> {
        self.vaults.values()
    }

    pub fn pool(&self, id: &Address) -> Option<&Pool> {
        self.pools.get(id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn find_vault(
        &self,
        settlement_authority: &Address,
        collateral_asset: &Address,
        claim_content_id: &str,
    ) -> Option<&ConditionalVault> {
        let id = vault_address(
            settlement_authority,
            collateral_asset,
            &Fingerprint::of_content_id(claim_content_id),
        );
        self.vaults.get(&id)
    }

    pub fn find_pool(&self, base_asset: &Address, quote_asset: &Address) -> Option<&Pool> {
        self.pools.get(&pool_address(base_asset, quote_asset))
    }

    // ========================================================================
    // ASSETS
    // ========================================================================

    pub fn create_asset(&mut self, id: Address, decimals: u8, mint_authority: Option<Address>) -> Result<()> {
        if decimals as u32 > MAX_DECIMALS {
            return Err(MarketError::InvalidAmount(format!("decimals {} above {}", decimals, MAX_DECIMALS)));
        }
        self.host_ledger().create_asset(id, decimals, mint_authority)
    }

    // ========================================================================
    // STAGING
    // ========================================================================

    fn require_external(&self, operation: &str, entity: &Address, caller: &Address) -> Result<()> {
        if is_engine_account(&self.vaults, &self.pools, caller) {
            return Err(report(
                operation,
                entity,
                MarketError::Unauthorized(format!("engine account {} cannot act as caller", caller.short())),
            ));
        }
        Ok(())
    }

    fn run_vault<R>(
        &mut self,
        operation: &str,
        vault_id: &Address,
        caller: &Address,
        f: impl FnOnce(&mut ConditionalVault, &L, u64) -> Result<Staged<R>>,
    ) -> Result<(R, u64)> {
        self.require_external(operation, vault_id, caller)?;
        let now = self.tick();
        let mut vault = self
            .vaults
            .get(vault_id)
            .cloned()
            .ok_or_else(|| report(operation, vault_id, MarketError::NotFound(format!("vault {}", vault_id))))?;

        let staged = f(&mut vault, &self.ledger, now).map_err(|e| report(operation, vault_id, e))?;
        self.ledger.commit(&staged.ops).map_err(|e| report(operation, vault_id, e))?;
        self.vaults.insert(*vault_id, vault);
        Ok((staged.receipt, now))
    }

    fn run_pool<R>(
        &mut self,
        operation: &str,
        pool_id: &Address,
        caller: &Address,
        f: impl FnOnce(&mut Pool, &L, u64) -> Result<Staged<R>>,
    ) -> Result<(R, u64)> {
        self.require_external(operation, pool_id, caller)?;
        let now = self.tick();
        let mut pool = self
            .pools
            .get(pool_id)
            .cloned()
            .ok_or_else(|| report(operation, pool_id, MarketError::NotFound(format!("pool {}", pool_id))))?;

        let staged = f(&mut pool, &self.ledger, now).map_err(|e| report(operation, pool_id, e))?;
        self.ledger.commit(&staged.ops).map_err(|e| report(operation, pool_id, e))?;
        self.pools.insert(*pool_id, pool);
        Ok((staged.receipt, now))
    }

    // ========================================================================
    // CONDITIONAL VAULTS
    // ========================================================================

    pub fn initialize_vault(
        &mut self,
        settlement_authority: Address,
        collateral_asset: Address,
        claim_content_id: &str,
    ) -> Result<Address> {
        if is_engine_account(&self.vaults, &self.pools, &settlement_authority) {
            return Err(report(
                "initialize_vault",
                &settlement_authority,
                MarketError::Unauthorized(format!(
                    "engine account {} cannot be a settlement authority",
                    settlement_authority.short()
                )),
            ));
        }
        let now = self.tick();
        let decimals = self
            .ledger
            .asset(&collateral_asset)
            .map(|info| info.decimals)
            .ok_or_else(|| MarketError::UnknownAsset(collateral_asset.to_hex()))?;

        let vault = ConditionalVault::new(settlement_authority, collateral_asset, claim_content_id, decimals, now);
        if self.vaults.contains_key(&vault.id) {
            return Err(report("initialize_vault", &vault.id, MarketError::AlreadyExists(format!("vault {}", vault.id))));
        }
        for mint in [vault.on_finalize_mint, vault.on_revert_mint] {
            if self.ledger.asset(&mint).is_some() {
                return Err(report("initialize_vault", &vault.id, MarketError::AlreadyExists(format!("asset {}", mint))));
            }
        }

        self.ledger.create_asset(vault.on_finalize_mint, decimals, Some(vault.id))?;
        self.ledger.create_asset(vault.on_revert_mint, decimals, Some(vault.id))?;

        let id = vault.id;
        info!(
            vault = %id.short(),
            authority = %settlement_authority.short(),
            collateral = %collateral_asset.short(),
            "vault initialized"
        );
        self.journal.record(
            now,
            settlement_authority,
            id,
            EventKind::VaultInitialized { collateral_asset, settlement_authority },
        );
        self.vaults.insert(id, vault);
        Ok(id)
    }

    pub fn mint_conditional_tokens(
        &mut self,
        vault_id: &Address,
        caller: &Address,
        amount: u64,
        side_hint: Option<Side>,
    ) -> Result<MintReceipt> {
        let (receipt, now) = self.run_vault("mint_conditional_tokens", vault_id, caller, |vault, ledger, _| {
            vault.mint_conditional_tokens(ledger, caller, amount, side_hint)
        })?;

        debug!(vault = %vault_id.short(), caller = %caller.short(), amount, "conditional tokens minted");
        self.journal.record(now, *caller, *vault_id, EventKind::ConditionalMint { amount, side_hint });
        Ok(receipt)
    }

    pub fn merge_conditional_tokens(&mut self, vault_id: &Address, caller: &Address, amount: u64) -> Result<MergeReceipt> {
        let (receipt, now) = self.run_vault("merge_conditional_tokens", vault_id, caller, |vault, ledger, _| {
            vault.merge_conditional_tokens(ledger, caller, amount)
        })?;

        debug!(vault = %vault_id.short(), caller = %caller.short(), amount, "conditional tokens merged");
        self.journal.record(now, *caller, *vault_id, EventKind::ConditionalMerge { amount });
        Ok(receipt)
    }

    pub fn resolve_vault(&mut self, vault_id: &Address, caller: &Address, outcome: bool) -> Result<()> {
        let ((), now) = self.run_vault("resolve_vault", vault_id, caller, |vault, _, now| {
            vault.resolve(caller, outcome, now)?;
            Ok(Staged { ops: Vec::new(), receipt: () })
        })?;

        info!(vault = %vault_id.short(), outcome, "vault finalized");
        self.journal.record(now, *caller, *vault_id, EventKind::VaultResolved { outcome });
        Ok(())
    }

    pub fn cancel_vault(&mut self, vault_id: &Address, caller: &Address) -> Result<()> {
        let ((), now) = self.run_vault("cancel_vault", vault_id, caller, |vault, _, now| {
            vault.cancel(caller, now)?;
            Ok(Staged { ops: Vec::new(), receipt: () })
        })?;

        info!(vault = %vault_id.short(), "vault reverted");
        self.journal.record(now, *caller, *vault_id, EventKind::VaultCancelled);
        Ok(())
    }

    pub fn redeem_conditional_tokens(&mut self, vault_id: &Address, caller: &Address) -> Result<RedeemReceipt> {
        let (receipt, now) = self.run_vault("redeem_conditional_tokens", vault_id, caller, |vault, ledger, _| {
            vault.redeem_conditional_tokens(ledger, caller)
        })?;

        info!(
            vault = %vault_id.short(),
            caller = %caller.short(),
            payout = receipt.payout,
            "conditional tokens redeemed"
        );
        self.journal.record(
            now,
            *caller,
            *vault_id,
            EventKind::ConditionalRedeem {
                on_finalize_burned: receipt.on_finalize_burned,
                on_revert_burned: receipt.on_revert_burned,
                payout: receipt.payout,
            },
        );
        Ok(receipt)
    }

    pub fn set_conditional_token_metadata(
        &mut self,
        vault_id: &Address,
        caller: &Address,
        metadata: ConditionalTokenMetadata,
    ) -> Result<()> {
        self.require_external("set_conditional_token_metadata", vault_id, caller)?;
        let now = self.tick();
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or_else(|| MarketError::NotFound(format!("vault {}", vault_id)))?;
        let labels = vault
            .stage_metadata(&self.ledger, caller, metadata)
            .map_err(|e| report("set_conditional_token_metadata", vault_id, e))?;

        let symbols: Vec<String> = labels.iter().map(|(_, m)| m.symbol.clone()).collect();
        for (mint, label) in labels {
            self.ledger.set_metadata(&mint, vault_id, label)?;
        }

        self.journal.record(
            now,
            *caller,
            *vault_id,
            EventKind::ConditionalMetadataSet {
                on_finalize_symbol: symbols[0].clone(),
                on_revert_symbol: symbols[1].clone(),
            },
        );
        Ok(())
    }

    /// Settlement authority collects collateral left once every conditional
    /// token has been redeemed (reverted payouts round odd units down).
    pub fn sweep_residual_collateral(&mut self, vault_id: &Address, caller: &Address) -> Result<SweepReceipt> {
        let (receipt, now) = self.run_vault("sweep_residual_collateral", vault_id, caller, |vault, ledger, _| {
            vault.sweep_residual_collateral(ledger, caller)
        })?;

        info!(vault = %vault_id.short(), swept = receipt.swept, "residual collateral swept");
        self.journal.record(now, *caller, *vault_id, EventKind::ResidualSwept { amount: receipt.swept });
        Ok(receipt)
    }

    /// Check that a vault's books agree with the ledger: custody equals
    /// `collateral_held`, and while Active both conditional supplies do too.
    pub fn audit_vault(&self, vault_id: &Address) -> Result<()> {
        let vault = self
            .vaults
            .get(vault_id)
            .ok_or_else(|| MarketError::NotFound(format!("vault {}", vault_id)))?;

        let custody = self.ledger.balance_of(&vault.collateral_asset, &vault.id);
        if custody != vault.collateral_held {
            return Err(report(
                "audit_vault",
                vault_id,
                MarketError::InvariantViolated(format!(
                    "custody {} != collateral_held {}",
                    custody, vault.collateral_held
                )),
            ));
        }

        if vault.is_active() {
            for mint in [vault.on_finalize_mint, vault.on_revert_mint] {
                let supply = self.ledger.supply_of(&mint).unwrap_or(0);
                if supply != vault.collateral_held {
                    return Err(report(
                        "audit_vault",
                        vault_id,
                        MarketError::InvariantViolated(format!(
                            "supply {} of {} != collateral_held {}",
                            supply,
                            mint.short(),
                            vault.collateral_held
                        )),
                    ));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // AMM POOLS
    // ========================================================================

    pub fn create_pool(
        &mut self,
        creator: &Address,
        base_asset: Address,
        quote_asset: Address,
        initial_observation: u128,
        max_observation_change_per_update: u128,
    ) -> Result<Address> {
        if base_asset == quote_asset {
            return Err(MarketError::InvalidAmount("base and quote must differ".into()));
        }
        if initial_observation == 0 {
            return Err(MarketError::InvalidAmount("initial observation must be positive".into()));
        }
        let pool_id = pool_address(&base_asset, &quote_asset);
        self.require_external("create_pool", &pool_id, creator)?;
        let now = self.tick();

        let base_decimals = self
            .ledger
            .asset(&base_asset)
            .map(|info| info.decimals)
            .ok_or_else(|| MarketError::UnknownAsset(base_asset.to_hex()))?;
        let quote_decimals = self
            .ledger
            .asset(&quote_asset)
            .map(|info| info.decimals)
            .ok_or_else(|| MarketError::UnknownAsset(quote_asset.to_hex()))?;

        let pool = Pool::new(
            base_asset,
            quote_asset,
            base_decimals,
            quote_decimals,
            initial_observation,
            max_observation_change_per_update,
            now,
        );
        if self.pools.contains_key(&pool.id) || self.ledger.asset(&pool.lp_mint).is_some() {
            return Err(report("create_pool", &pool.id, MarketError::AlreadyExists(format!("pool {}", pool.id))));
        }

        self.ledger.create_asset(pool.lp_mint, quote_decimals, Some(pool.id))?;

        let id = pool.id;
        info!(
            pool = %id.short(),
            base = %base_asset.short(),
            quote = %quote_asset.short(),
            %initial_observation,
            "pool created"
        );
        self.journal.record(now, *creator, id, EventKind::PoolCreated { base_asset, quote_asset });
        self.pools.insert(id, pool);
        Ok(id)
    }

    pub fn add_liquidity(
        &mut self,
        pool_id: &Address,
        caller: &Address,
        quote_amount: u64,
        max_base_amount: u64,
        min_lp_tokens: u64,
    ) -> Result<AddLiquidityReceipt> {
        let (receipt, now) = self.run_pool("add_liquidity", pool_id, caller, |pool, ledger, _| {
            pool.add_liquidity(ledger, caller, quote_amount, max_base_amount, min_lp_tokens)
        })?;

        debug!(
            pool = %pool_id.short(),
            base = receipt.base_deposited,
            quote = receipt.quote_deposited,
            lp = receipt.lp_minted,
            "liquidity added"
        );
        self.journal.record(
            now,
            *caller,
            *pool_id,
            EventKind::LiquidityAdded {
                base_amount: receipt.base_deposited,
                quote_amount: receipt.quote_deposited,
                lp_minted: receipt.lp_minted,
            },
        );
        Ok(receipt)
    }

    pub fn remove_liquidity(
        &mut self,
        pool_id: &Address,
        caller: &Address,
        lp_tokens_to_burn: u64,
        min_base_amount: u64,
        min_quote_amount: u64,
    ) -> Result<RemoveLiquidityReceipt> {
        let (receipt, now) = self.run_pool("remove_liquidity", pool_id, caller, |pool, ledger, _| {
            pool.remove_liquidity(ledger, caller, lp_tokens_to_burn, min_base_amount, min_quote_amount)
        })?;

        debug!(
            pool = %pool_id.short(),
            lp = receipt.lp_burned,
            base = receipt.base_withdrawn,
            quote = receipt.quote_withdrawn,
            "liquidity removed"
        );
        self.journal.record(
            now,
            *caller,
            *pool_id,
            EventKind::LiquidityRemoved {
                lp_burned: receipt.lp_burned,
                base_amount: receipt.base_withdrawn,
                quote_amount: receipt.quote_withdrawn,
            },
        );
        Ok(receipt)
    }

    pub fn swap(
        &mut self,
        pool_id: &Address,
        caller: &Address,
        direction: SwapDirection,
        input_amount: u64,
        output_amount_min: u64,
    ) -> Result<SwapReceipt> {
        let (receipt, now) = self.run_pool("swap", pool_id, caller, |pool, ledger, now| {
            pool.swap(ledger, caller, direction, input_amount, output_amount_min, now)
        })?;

        debug!(
            pool = %pool_id.short(),
            %direction,
            input = input_amount,
            output = receipt.output_amount,
            observation = %receipt.observation_after,
            "swap executed"
        );
        self.journal.record(
            now,
            *caller,
            *pool_id,
            EventKind::Swap { direction, input_amount, output_amount: receipt.output_amount },
        );
        Ok(receipt)
    }

    /// Simulate a swap at the current slot. Nothing is moved or recorded.
    pub fn quote_swap(&self, pool_id: &Address, direction: SwapDirection, input_amount: u64) -> Result<SwapReceipt> {
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| MarketError::NotFound(format!("pool {}", pool_id)))?;
        pool.quote_swap(direction, input_amount, self.peek_slot())
    }

    /// TWAP of a pool's oracle up to the current slot
    pub fn twap(&self, pool_id: &Address) -> Result<u128> {
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| MarketError::NotFound(format!("pool {}", pool_id)))?;
        pool.oracle.twap(self.peek_slot())
    }
}

// ============================================================================
// TESTS
// ============================================================================
