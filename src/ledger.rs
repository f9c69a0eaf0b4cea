//! Credit ledger
//!
//! Balances live outside this crate (a database in production); the trait is
//! the seam. [`InMemoryLedger`] backs tests and the CLI.

use crate::error::{ComposeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// Purchasable credit bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditPackage {
    Basic,
    Advanced,
    Premium,
}

impl CreditPackage {
    pub const ALL: [Self; 3] = [Self::Basic, Self::Advanced, Self::Premium];

    #[must_use]
    pub fn credits(self) -> u32 {
        match self {
            Self::Basic => 10,
            Self::Advanced => 30,
            Self::Premium => 50,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for CreditPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CreditPackage {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|package| package.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ComposeError::validation(format!("Invalid plan: '{}'", s)))
    }
}

/// Per-user credit balances
///
/// Implementations must make `decrement_if_positive` atomic: two concurrent
/// calls against a balance of 1 succeed at most once.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Whether the user can pay for at least one generated background
    async fn has_credits(&self, user_id: Uuid) -> Result<bool>;

    /// Take one credit
    ///
    /// # Errors
    /// - `ComposeError::InsufficientCredits` when the balance is already zero
    async fn deduct(&self, user_id: Uuid) -> Result<()>;

    /// Take one credit if the balance is positive; `false` when it was zero
    async fn decrement_if_positive(&self, user_id: Uuid) -> Result<bool>;

    /// Give back one credit taken by `decrement_if_positive`
    async fn refund(&self, user_id: Uuid) -> Result<()>;

    async fn balance(&self, user_id: Uuid) -> Result<u32>;

    /// Credit a purchased package; returns the new balance
    async fn top_up(&self, user_id: Uuid, package: CreditPackage) -> Result<u32>;
}

/// Mutex-guarded ledger kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<Uuid, u32>>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with one balance
    #[must_use]
    pub fn with_balance(user_id: Uuid, credits: u32) -> Self {
        let ledger = Self::new();
        ledger.set_balance(user_id, credits);
        ledger
    }

    pub fn set_balance(&self, user_id: Uuid, credits: u32) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(user_id, credits);
        }
    }

    fn with_balances<T>(&self, f: impl FnOnce(&mut HashMap<Uuid, u32>) -> T) -> Result<T> {
        let mut balances = self
            .balances
            .lock()
            .map_err(|_| ComposeError::internal("credit ledger lock poisoned"))?;
        Ok(f(&mut balances))
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn has_credits(&self, user_id: Uuid) -> Result<bool> {
        self.with_balances(|balances| balances.get(&user_id).copied().unwrap_or(0) > 0)
    }

    async fn deduct(&self, user_id: Uuid) -> Result<()> {
        if self.decrement_if_positive(user_id).await? {
            Ok(())
        } else {
            Err(ComposeError::insufficient_credits(user_id.to_string()))
        }
    }

    async fn decrement_if_positive(&self, user_id: Uuid) -> Result<bool> {
        self.with_balances(|balances| match balances.get_mut(&user_id) {
            Some(credits) if *credits > 0 => {
                *credits -= 1;
                true
            },
            _ => false,
        })
    }

    async fn refund(&self, user_id: Uuid) -> Result<()> {
        self.with_balances(|balances| {
            let credits = balances.entry(user_id).or_insert(0);
            *credits = credits.saturating_add(1);
        })
    }

    async fn balance(&self, user_id: Uuid) -> Result<u32> {
        self.with_balances(|balances| balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn top_up(&self, user_id: Uuid, package: CreditPackage) -> Result<u32> {
        let balance = self.with_balances(|balances| {
            let credits = balances.entry(user_id).or_insert(0);
            *credits = credits.saturating_add(package.credits());
            *credits
        })?;
        tracing::info!(user_id = %user_id, package = %package, balance, "Credits added");
        Ok(balance)
    }
}
