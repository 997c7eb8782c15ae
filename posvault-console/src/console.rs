use clap::{Parser, Subcommand};
use posvault_core::intent::{build_operation, parse_amount, parse_identity};
use posvault_core::overview::display_fact;
use posvault_core::{
    lookup_merchant, quote, Access, ActionCoordinator, LifecycleState, PendingAction, RoleResolver, RoleStatus,
    VaultOverview,
};
use posvault_ledger::{CallerIdentity, MemoryLedger, WalletSession};
use posvault_types::{FactKey, OperationKind};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::ConsoleConfig;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Connect a wallet
    Connect { address: String },
    Disconnect,
    /// Vault balance, fee, owner and status
    Info,
    /// Roles of the connected wallet
    Role,
    /// Check whether an address is a registered merchant
    IsMerchant { address: String },
    /// Preview the fee split of a withdrawal
    Quote { amount: String },

    // ═══════════════════════════════════════════════════════════════
    // Merchant panel
    // ═══════════════════════════════════════════════════════════════
    Withdraw { amount: String },

    // ═══════════════════════════════════════════════════════════════
    // Admin panel
    // ═══════════════════════════════════════════════════════════════
    AddMerchant { address: String },
    RemoveMerchant { address: String },
    Pause,
    Unpause,
    EmergencyWithdraw { to: String, amount: String },
    TransferOwnership { new_owner: String },
    RenounceOwnership,

    /// List tracked actions
    Status,
    /// Cancel an action the ledger has not accepted
    Cancel { id: u64 },
    /// Clear a finished action, e.g. `reset withdraw`
    Reset { operation: String },
    /// Produce a block now
    Mine,
    #[command(alias = "exit")]
    Quit,
}

pub enum Flow {
    Continue(String),
    Quit,
}

/// Parses one console line. Help and usage errors come back as rendered text.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let words = line.split_whitespace();
    Line::try_parse_from(words).map(|l| l.command).map_err(|e| e.render().to_string())
}

#[derive(Clone, Copy)]
enum Panel {
    Admin,
    Merchant,
}

pub struct Console {
    config: ConsoleConfig,
    ledger: Arc<MemoryLedger>,
    session: Arc<WalletSession>,
    coordinator: ActionCoordinator,
    roles: RoleResolver,
}

impl Console {
    pub fn new(
        config: ConsoleConfig,
        ledger: Arc<MemoryLedger>,
        session: Arc<WalletSession>,
        coordinator: ActionCoordinator,
    ) -> Self {
        let roles = RoleResolver::new(coordinator.cache().clone());
        Self { config, ledger, session, coordinator, roles }
    }

    pub fn coordinator(&self) -> &ActionCoordinator {
        &self.coordinator
    }

    pub async fn execute(&self, command: Command) -> Flow {
        let out = match command {
            Command::Quit => return Flow::Quit,
            Command::Connect { address } => match parse_identity(&address) {
                Ok(who) => {
                    self.session.connect(who);
                    format!("Connected {}", who.short())
                }
                Err(e) => format!("Error: {}", e),
            },
            Command::Disconnect => {
                self.session.disconnect();
                "Disconnected".to_string()
            }
            Command::Info => self.info().await,
            Command::Role => self.role().await,
            Command::IsMerchant { address } => self.is_merchant(&address).await,
            Command::Quote { amount } => self.quote(&amount).await,
            Command::Withdraw { amount } => self.submit(Panel::Merchant, OperationKind::Withdraw, &[&amount]).await,
            Command::AddMerchant { address } => self.submit(Panel::Admin, OperationKind::AddMerchant, &[&address]).await,
            Command::RemoveMerchant { address } => {
                self.submit(Panel::Admin, OperationKind::RemoveMerchant, &[&address]).await
            }
            Command::Pause => self.submit(Panel::Admin, OperationKind::Pause, &[]).await,
            Command::Unpause => self.submit(Panel::Admin, OperationKind::Unpause, &[]).await,
            Command::EmergencyWithdraw { to, amount } => {
                self.submit(Panel::Admin, OperationKind::EmergencyWithdraw, &[&to, &amount]).await
            }
            Command::TransferOwnership { new_owner } => {
                self.submit(Panel::Admin, OperationKind::TransferOwnership, &[&new_owner]).await
            }
            Command::RenounceOwnership => self.submit(Panel::Admin, OperationKind::RenounceOwnership, &[]).await,
            Command::Status => self.status(),
            Command::Cancel { id } => match self.coordinator.cancel(id) {
                Ok(()) => format!("Action {} cancelled", id),
                Err(e) => format!("Error: {}", e),
            },
            Command::Reset { operation } => match OperationKind::from_name(&operation) {
                None => format!("Unknown operation '{}'", operation),
                Some(kind) => match self.coordinator.reset(kind) {
                    Ok(()) => format!("{} cleared", kind),
                    Err(e) => format!("Error: {}", e),
                },
            },
            Command::Mine => {
                let block = self.ledger.mine();
                format!("Block {}: {} executed, {} reverted", block.height, block.executed, block.reverted)
            }
        };
        Flow::Continue(out)
    }

    /// Resolves the caller's access to `panel`. Returns the message to show
    /// instead of the panel when access is not granted.
    async fn gate(&self, panel: Panel, out: &mut String) -> bool {
        let caller = self.session.current();
        if caller.is_none() {
            out.push_str("Connect a wallet first");
            return false;
        }
        let mut status = self.roles.status(caller);
        if status == RoleStatus::Loading {
            out.push_str("Checking permissions...\n");
            status = self.roles.settle(caller).await;
        }
        let access = match panel {
            Panel::Admin => status.admin_access(),
            Panel::Merchant => status.merchant_access(),
        };
        match (access, panel) {
            (Access::Granted, _) => true,
            (Access::Pending, _) => {
                out.push_str("Permissions unavailable, try again");
                false
            }
            (Access::Denied, Panel::Admin) => {
                out.push_str("Owner access required");
                false
            }
            (Access::Denied, Panel::Merchant) => {
                out.push_str("Merchant access required");
                false
            }
        }
    }

    async fn submit(&self, panel: Panel, kind: OperationKind, args: &[&str]) -> String {
        let mut out = String::new();
        if !self.gate(panel, &mut out).await {
            return out;
        }
        let operation = match build_operation(kind, args) {
            Ok(op) => op,
            Err(e) => return format!("{}Error: {}", out, e),
        };
        match self.coordinator.submit(operation) {
            Ok(action) => {
                let _ = write!(out, "Action {} ({}): {}", action.id, kind, action.state);
                self.spawn_reporter(action);
            }
            Err(e) => {
                let _ = write!(out, "Error: {}", e);
            }
        }
        out
    }

    /// Prints each later transition of `action` as it happens.
    fn spawn_reporter(&self, action: PendingAction) {
        let Some(mut rx) = self.coordinator.watch(action.id) else {
            return;
        };
        let coordinator = self.coordinator.clone();
        let decimals = self.config.display_decimals;
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let current = coordinator.action(action.id);
                println!("{}", describe(action.id, action.kind(), &state, current.as_ref(), decimals));
                if state.is_terminal() {
                    break;
                }
            }
        });
    }

    async fn info(&self) -> String {
        let decimals = self.config.display_decimals;
        let cache = self.coordinator.cache();
        let mut overview = VaultOverview::snapshot(cache);
        let mut out = String::new();
        if overview.owner.is_loading() || overview.balance.is_loading() {
            out.push_str("Loading vault...\n");
            overview = VaultOverview::load(cache).await;
        }
        let _ = writeln!(out, "Vault:        {}", self.config.vault_address);
        let _ = writeln!(out, "Status:       {:?}", overview.status());
        let _ = writeln!(out, "Balance:      {}", display_fact(&overview.balance, decimals));
        let _ = writeln!(out, "Min deposit:  {}", display_fact(&overview.min_deposit, decimals));
        let _ = writeln!(out, "Fee:          {}", display_fact(&overview.fee_bps, decimals));
        let _ = writeln!(out, "Treasury:     {}", display_fact(&overview.treasury, decimals));
        let _ = write!(out, "Owner:        {}", display_fact(&overview.owner, decimals));
        out
    }

    async fn role(&self) -> String {
        let Some(who) = self.session.current() else {
            return "No wallet connected".to_string();
        };
        let roles = self.roles.settle(Some(who)).await.roles();
        let label = match (roles.is_owner, roles.is_merchant) {
            (true, true) => "owner, merchant",
            (true, false) => "owner",
            (false, true) => "merchant",
            (false, false) => "none",
        };
        format!("{}: {}", who, label)
    }

    async fn is_merchant(&self, candidate: &str) -> String {
        let cache = self.coordinator.cache();
        let Some(mut state) = lookup_merchant(cache, candidate) else {
            return "Enter a valid address (0x followed by 40 hex characters)".to_string();
        };
        if state.is_loading() {
            if let Ok(who) = parse_identity(candidate) {
                state = cache.get(&FactKey::MerchantStatus(who)).await;
            }
        }
        match state.value.and_then(|v| v.as_flag()) {
            Some(true) => format!("{} is a registered merchant", candidate),
            Some(false) => format!("{} is not a merchant", candidate),
            None => match state.error {
                Some(e) => format!("Lookup failed: {}", e),
                None => "Lookup pending".to_string(),
            },
        }
    }

    async fn quote(&self, input: &str) -> String {
        let amount = match parse_amount(input) {
            Ok(amount) => amount,
            Err(e) => return format!("Error: {}", e),
        };
        let fee_bps = match self.coordinator.cache().value(&FactKey::FeeBps).await {
            Ok(value) => match value.as_bps() {
                Some(bps) => bps,
                None => return format!("Error: {} unavailable: unexpected value {}", FactKey::FeeBps, value),
            },
            Err(e) => return format!("Error: {}", e),
        };
        let q = quote(amount, fee_bps);
        let decimals = self.config.display_decimals;
        format!(
            "Gross: {} ETH\nFee ({}%): {} ETH\nNet: {} ETH",
            q.gross.format_fixed(decimals),
            q.fee_percent(),
            q.fee.format_fixed(decimals),
            q.net.format_fixed(decimals)
        )
    }

    fn status(&self) -> String {
        let actions = self.coordinator.actions();
        if actions.is_empty() {
            return "No actions".to_string();
        }
        actions
            .iter()
            .map(|a| describe(a.id, a.kind(), &a.state, Some(a), self.config.display_decimals))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn describe(
    id: u64,
    kind: OperationKind,
    state: &LifecycleState,
    action: Option<&PendingAction>,
    decimals: u32,
) -> String {
    let mut line = format!("Action {} ({}): {}", id, kind, state);
    let Some(action) = action else {
        return line;
    };
    if let Some(reference) = action.reference {
        let _ = write!(line, " [{}]", reference);
    }
    if let (LifecycleState::Confirmed, Some(q)) = (state, action.quote) {
        let _ = write!(line, ", {} ETH delivered", q.net.format_fixed(decimals));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use posvault_core::FactCache;
    use posvault_ledger::{LedgerError, LedgerReader, VaultGenesis};
    use posvault_types::{FactValue, Identity};

    const MERCHANT: &str = "0x00000000000000000000000000000000000000a1";

    fn console(caller: Option<Identity>) -> Console {
        let mut config = ConsoleConfig::default();
        config.genesis = VaultGenesis { merchants: vec![MERCHANT.parse().unwrap()], ..VaultGenesis::default() };
        let ledger = Arc::new(MemoryLedger::new(&config.genesis));
        let session = Arc::new(WalletSession::new(caller));
        let cache = FactCache::new(ledger.clone());
        let coordinator = ActionCoordinator::new(ledger.clone(), cache, session.clone());
        Console::new(config, ledger, session, coordinator)
    }

    async fn run(console: &Console, line: &str) -> String {
        match console.execute(parse_line(line).unwrap()).await {
            Flow::Continue(out) => out,
            Flow::Quit => "<quit>".to_string(),
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("withdraw 0.5"), Ok(Command::Withdraw { amount: "0.5".into() }));
        assert_eq!(
            parse_line("emergency-withdraw 0xab 1"),
            Ok(Command::EmergencyWithdraw { to: "0xab".into(), amount: "1".into() })
        );
        assert_eq!(parse_line("exit"), Ok(Command::Quit));
        assert!(parse_line("withdraw").is_err());
        assert!(parse_line("help").unwrap_err().contains("add-merchant"));
    }

    #[tokio::test]
    async fn test_info_and_quote() {
        let console = console(None);
        let info = run(&console, "info").await;
        assert!(info.contains("Balance:      10.000000 ETH"));
        assert!(info.contains("Fee:          2.5%"));
        assert!(info.contains("Status:       Active"));

        let q = run(&console, "quote 1").await;
        assert_eq!(q, "Gross: 1.000000 ETH\nFee (2.5%): 0.025000 ETH\nNet: 0.975000 ETH");
        assert!(run(&console, "quote abc").await.starts_with("Error"));
    }

    #[tokio::test]
    async fn test_panels_respect_access() {
        let console = console(None);
        assert_eq!(run(&console, "pause").await, "Connect a wallet first");

        run(&console, &format!("connect {}", MERCHANT)).await;
        let denied = run(&console, "pause").await;
        assert!(denied.ends_with("Owner access required"));
        assert_eq!(console.coordinator().actions().len(), 0);

        let submitted = run(&console, "withdraw 0.5").await;
        assert!(submitted.ends_with("Action 1 (withdraw): validating"), "{}", submitted);
        let mut rx = console.coordinator().watch(1).unwrap();
        let state = rx.wait_for(|s| *s == LifecycleState::Mining || s.is_terminal()).await.unwrap().clone();
        assert_eq!(state, LifecycleState::Mining);
    }

    #[tokio::test]
    async fn test_withdraw_through_mining() {
        let console = console(Some(MERCHANT.parse().unwrap()));
        run(&console, "withdraw 0.5").await;
        let mut rx = console.coordinator().watch(1).unwrap();
        rx.wait_for(|s| *s == LifecycleState::Mining).await.unwrap();

        assert_eq!(run(&console, "mine").await, "Block 1: 1 executed, 0 reverted");
        assert_eq!(console.coordinator().wait(1).await, Some(LifecycleState::Confirmed));
        let status = run(&console, "status").await;
        assert!(status.contains("confirmed"));
        assert!(status.ends_with("0.487500 ETH delivered"), "{}", status);

        assert_eq!(run(&console, "reset withdraw").await, "withdraw cleared");
        assert_eq!(run(&console, "status").await, "No actions");
        assert_eq!(run(&console, "quit").await, "<quit>");
    }

    struct MistypedFee(MemoryLedger);

    #[async_trait]
    impl LedgerReader for MistypedFee {
        async fn get_fact(&self, key: &FactKey) -> Result<FactValue, LedgerError> {
            match key {
                FactKey::FeeBps => Ok(FactValue::Flag(true)),
                other => self.0.get_fact(other).await,
            }
        }
    }

    #[tokio::test]
    async fn test_quote_refuses_mistyped_fee() {
        let config = ConsoleConfig::default();
        let ledger = Arc::new(MemoryLedger::new(&config.genesis));
        let session = Arc::new(WalletSession::new(None));
        let cache = FactCache::new(Arc::new(MistypedFee(MemoryLedger::new(&config.genesis))));
        let coordinator = ActionCoordinator::new(ledger.clone(), cache, session.clone());
        let console = Console::new(config, ledger, session, coordinator);

        let out = run(&console, "quote 1").await;
        assert!(out.starts_with("Error: feeBps unavailable"), "{}", out);
    }

    #[tokio::test]
    async fn test_merchant_lookup() {
        let console = console(None);
        assert!(run(&console, "is-merchant 0x12").await.starts_with("Enter a valid address"));
        assert_eq!(run(&console, &format!("is-merchant {}", MERCHANT)).await, format!("{} is a registered merchant", MERCHANT));
    }
}
