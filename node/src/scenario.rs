//! # Scenario Scripts
//!
//! A scenario is a JSON list of calls made by named accounts against a
//! freshly deployed runtime. Accounts are written as labels (`"alice"`) or
//! hex addresses; `"vault"` and `"token"` resolve to the deployed contracts.
//! Amounts are decimal strings in whole tokens (`"300000"`, `"0.5"`).
//! Roles are names (`"WITHDRAWER_ROLE"`), hex ids, or `"DEFAULT_ADMIN_ROLE"`.
//!
//! ```json
//! {
//!   "name": "withdraw",
//!   "steps": [
//!     { "caller": "owner", "action": "set_withdraw_enable", "enabled": true },
//!     { "caller": "carol", "action": "withdraw", "amount": "1", "to": "alice",
//!       "expect_error": "Caller is not a withdrawer" }
//!   ]
//! }
//! ```
//!
//! A step without `expect_error` must succeed; a step with one must fail
//! with exactly that reason.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use vault_contracts::{Call, RoleId, Runtime, DEFAULT_ADMIN_ROLE};
use vault_protocol::config::{format_units, parse_units, TOKEN_DECIMALS};
use vault_protocol::{Address, Amount};

/// Label the runtime owner is deployed under.
pub const OWNER_LABEL: &str = "owner";

// ---------------------------------------------------------------------------
// Script format
// ---------------------------------------------------------------------------

/// A full scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Free-form name echoed in the report.
    #[serde(default)]
    pub name: String,
    /// Calls to replay, in order.
    pub steps: Vec<Step>,
}

/// One call in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Account label or hex address of the sender.
    pub caller: String,
    #[serde(flatten)]
    pub action: Action,
    /// Reason the step is expected to fail with, if any.
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// Human-friendly mirror of [`Call`], with unresolved names and amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    GrantRole { role: String, account: String },
    RevokeRole { role: String, account: String },
    RenounceRole { role: String },
    SetRoleAdmin { role: String, admin_role: String },
    SetWithdrawEnable { enabled: bool },
    SetMaxWithdrawAmount { amount: String },
    SetToken { token: String },
    Deposit { amount: String },
    Withdraw { amount: String, to: String },
    Transfer { to: String, amount: String },
    Approve { spender: String, amount: String },
    TransferFrom { from: String, to: String, amount: String },
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses a scenario from JSON text.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolves an account reference: hex if it looks like hex, else a label.
pub fn resolve_account(reference: &str) -> Result<Address> {
    if reference.starts_with("0x") {
        return Address::from_hex(reference)
            .with_context(|| format!("invalid address '{reference}'"));
    }
    if reference.is_empty() {
        bail!("empty account reference");
    }
    Ok(Address::from_label(reference))
}

/// Resolves a role reference: hex id, `DEFAULT_ADMIN_ROLE`, or a name.
pub fn resolve_role(reference: &str) -> Result<RoleId> {
    if reference.starts_with("0x") {
        return RoleId::from_hex(reference)
            .with_context(|| format!("invalid role id '{reference}'"));
    }
    if reference == "DEFAULT_ADMIN_ROLE" {
        return Ok(DEFAULT_ADMIN_ROLE);
    }
    Ok(RoleId::from_name(reference))
}

fn resolve_amount(value: &str) -> Result<Amount> {
    parse_units(value, TOKEN_DECIMALS).with_context(|| format!("invalid amount '{value}'"))
}

impl Action {
    /// Translates the script action into a runtime call for `caller`.
    pub fn to_call(&self, caller: Address) -> Result<Call> {
        let call = match self {
            Action::GrantRole { role, account } => Call::GrantRole {
                role: resolve_role(role)?,
                account: resolve_account(account)?,
            },
            Action::RevokeRole { role, account } => Call::RevokeRole {
                role: resolve_role(role)?,
                account: resolve_account(account)?,
            },
            Action::RenounceRole { role } => Call::RenounceRole {
                role: resolve_role(role)?,
                confirmation: caller,
            },
            Action::SetRoleAdmin { role, admin_role } => Call::SetRoleAdmin {
                role: resolve_role(role)?,
                admin_role: resolve_role(admin_role)?,
            },
            Action::SetWithdrawEnable { enabled } => Call::SetWithdrawEnable { enabled: *enabled },
            Action::SetMaxWithdrawAmount { amount } => Call::SetMaxWithdrawAmount {
                amount: resolve_amount(amount)?,
            },
            Action::SetToken { token } => Call::SetToken {
                token: resolve_account(token)?,
            },
            Action::Deposit { amount } => Call::Deposit {
                amount: resolve_amount(amount)?,
            },
            Action::Withdraw { amount, to } => Call::Withdraw {
                amount: resolve_amount(amount)?,
                to: resolve_account(to)?,
            },
            Action::Transfer { to, amount } => Call::Transfer {
                to: resolve_account(to)?,
                amount: resolve_amount(amount)?,
            },
            Action::Approve { spender, amount } => Call::Approve {
                spender: resolve_account(spender)?,
                amount: resolve_amount(amount)?,
            },
            Action::TransferFrom { from, to, amount } => Call::TransferFrom {
                from: resolve_account(from)?,
                to: resolve_account(to)?,
                amount: resolve_amount(amount)?,
            },
        };
        Ok(call)
    }

    /// Every account label the action mentions, for the balance report.
    fn accounts(&self) -> Vec<&str> {
        match self {
            Action::GrantRole { account, .. } | Action::RevokeRole { account, .. } => {
                vec![account.as_str()]
            }
            Action::Withdraw { to, .. } | Action::Transfer { to, .. } => vec![to.as_str()],
            Action::Approve { spender, .. } => vec![spender.as_str()],
            Action::TransferFrom { from, to, .. } => vec![from.as_str(), to.as_str()],
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution & Report
// ---------------------------------------------------------------------------

/// Result of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub caller: String,
    pub call: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the outcome matched `expect_error`.
    pub as_expected: bool,
}

/// Vault state at the end of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSummary {
    pub address: Address,
    pub token: Option<Address>,
    pub withdraw_enabled: bool,
    pub max_withdraw_amount: String,
    pub balance: String,
}

/// The JSON document printed by `vault-node run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepReport>,
    pub vault: VaultSummary,
    /// Token balances by account label, in whole tokens.
    pub balances: BTreeMap<String, String>,
    pub mismatches: usize,
}

impl ScenarioReport {
    /// Drops per-step detail, keeping the summary.
    pub fn summary_only(mut self) -> Self {
        self.steps.clear();
        self
    }
}

/// Deploys a fresh runtime and replays `scenario` on it.
///
/// Steps that fail unexpectedly (or succeed when a failure was expected)
/// are counted in `mismatches`; replay continues so the report shows the
/// whole run.
pub fn run(scenario: &Scenario) -> Result<ScenarioReport> {
    let owner = Address::from_label(OWNER_LABEL);
    let mut runtime = Runtime::deploy(owner).context("failed to deploy runtime")?;

    let mut labels: Vec<String> = vec![OWNER_LABEL.to_string()];
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let caller = resolve_account(&step.caller)
            .with_context(|| format!("step {index}: bad caller"))?;
        let call = step
            .action
            .to_call(caller)
            .with_context(|| format!("step {index}: bad arguments"))?;
        let name = call.name().to_string();

        let outcome = runtime.execute(caller, call);
        let reason = outcome.as_ref().err().map(|e| e.reason().to_string());
        let as_expected = reason == step.expect_error;

        if as_expected {
            tracing::info!(
                index,
                caller = %step.caller,
                call = %name,
                ok = outcome.is_ok(),
                "step"
            );
        } else {
            tracing::warn!(
                index,
                caller = %step.caller,
                call = %name,
                got = ?reason,
                expected = ?step.expect_error,
                "step outcome mismatch"
            );
        }

        for label in std::iter::once(step.caller.as_str()).chain(step.action.accounts()) {
            if !label.starts_with("0x") && !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }

        steps.push(StepReport {
            index,
            caller: step.caller.clone(),
            call: name,
            ok: outcome.is_ok(),
            reason,
            as_expected,
        });
    }

    let vault = runtime.vault();
    let balances = labels
        .into_iter()
        .map(|label| {
            let amount = runtime.balance_of(&Address::from_label(&label));
            (label, format_units(amount, TOKEN_DECIMALS))
        })
        .collect();

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        mismatches: steps.iter().filter(|s| !s.as_expected).count(),
        steps,
        vault: VaultSummary {
            address: vault.address(),
            token: vault.token(),
            withdraw_enabled: vault.withdraw_enabled(),
            max_withdraw_amount: format_units(vault.max_withdraw_amount(), TOKEN_DECIMALS),
            balance: format_units(runtime.vault_balance(), TOKEN_DECIMALS),
        },
        balances,
    })
}
