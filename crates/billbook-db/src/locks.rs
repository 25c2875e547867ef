//! # Per-Product Locks
//!
//! Serializes the read-decide-write cycle of commits and voids that touch the
//! same product within one process.
//!
//! ```text
//! commit A (RICE, SOAP) ──► lock RICE ──► lock SOAP ──► tx ──► unlock
//! commit B (SOAP)       ──────────────────► waits on SOAP ───► tx
//! commit C (SUGAR)      ──► lock SUGAR ──► tx   (runs in parallel)
//! ```
//!
//! Codes are always locked in sorted order, so two commits can never wait on
//! each other. Cross-process races are still caught by the lot revision CAS.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per product code.
#[derive(Debug, Default, Clone)]
pub struct ProductLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Guards held for the duration of one commit attempt.
#[derive(Debug)]
pub struct ProductGuards {
    codes: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ProductGuards {
    /// Locked product codes, sorted.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, code: &str) -> Arc<AsyncMutex<()>> {
        // Poisoning leaves the map intact.
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(code.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Locks every distinct code, in sorted order.
    pub async fn acquire<I, S>(&self, codes: I) -> ProductGuards
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = codes
            .into_iter()
            .map(|code| code.as_ref().to_string())
            .collect();

        let mut guards = Vec::with_capacity(sorted.len());
        for code in &sorted {
            guards.push(self.handle(code).lock_owned().await);
        }

        ProductGuards {
            codes: sorted.into_iter().collect(),
            _guards: guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_codes_are_deduplicated_and_sorted() {
        let locks = ProductLocks::new();
        let guards = locks.acquire(["SOAP", "RICE", "SOAP"]).await;
        assert_eq!(guards.codes(), ["RICE".to_string(), "SOAP".to_string()]);
    }

    #[tokio::test]
    async fn test_same_product_waits() {
        let locks = ProductLocks::new();
        let held = locks.acquire(["RICE"]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(["RICE"]).await.codes().len() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        assert_eq!(contender.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disjoint_products_do_not_block() {
        let locks = ProductLocks::new();
        let _rice = locks.acquire(["RICE"]).await;
        let sugar = tokio::time::timeout(Duration::from_millis(100), locks.acquire(["SUGAR"])).await;
        assert!(sugar.is_ok());
    }
}
