//! The entity store.
//!
//! `MirrorStore` owns the in-memory copies of the four collections and is the
//! only writer to persistence. Each mutation locks the collection it touches,
//! builds the replacement, writes it through the repository and only then
//! swaps it into memory. Derived views are recomputed from the committed
//! collections on every read.
//!
//! A collection whose blob cannot be read at startup is served empty but
//! never written, so the stored data survives until a later `reload` reads it.

use log::{debug, error, info, warn};
use shared::{
    generate_entity_id, Bill, BillPatch, BillPayment, IncomeProfile, MonthlyBillView,
    MonthlySummary, NewBill, NewSavingsGoal, Period, SavingsGoal, SavingsGoalPatch, UserProfile,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::Mutex;

use super::calculations::{
    self, bills_for_month, calculate_estimated_monthly_income, calculate_monthly_summary,
    estimated_monthly_income_for,
};
use super::dates::Clock;
use super::errors::StoreError;
use super::money::round_to_cents;
use crate::storage::{KeyValueStorage, MirrorRepository, StorageKey};

pub struct MirrorStore<S: KeyValueStorage> {
    repository: MirrorRepository<S>,
    clock: Arc<dyn Clock>,
    bills: Mutex<Vec<Bill>>,
    payments: Mutex<Vec<BillPayment>>,
    profile: Mutex<UserProfile>,
    savings: Mutex<Vec<SavingsGoal>>,
    /// Collections that failed to load; writes to them are refused
    unreadable: StdMutex<HashSet<StorageKey>>,
}

/// The stored value, or `None` after recording `key` as unreadable.
fn loaded_or_none<T>(
    key: StorageKey,
    result: anyhow::Result<Option<T>>,
    unreadable: &mut HashSet<StorageKey>,
) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Could not read {}, serving defaults and blocking writes: {:#}",
                key.as_str(),
                e
            );
            unreadable.insert(key);
            None
        }
    }
}

impl<S: KeyValueStorage> MirrorStore<S> {
    /// Read every collection once. Missing blobs start empty; unreadable ones
    /// are logged and served as the default so the app still opens, but stay
    /// read-only until a `reload` succeeds.
    pub async fn load(repository: MirrorRepository<S>, clock: Arc<dyn Clock>) -> Self {
        match repository.stored_collections().await {
            Ok(stored) if stored.is_empty() => info!("No stored data found, starting fresh"),
            Ok(stored) => debug!("Found stored collections: {:?}", stored),
            Err(e) => warn!("Could not list stored collections: {:#}", e),
        }

        let mut unreadable = HashSet::new();
        let bills = loaded_or_none(
            StorageKey::Bills,
            repository.load_bills().await,
            &mut unreadable,
        )
        .unwrap_or_default();
        let payments = loaded_or_none(
            StorageKey::Payments,
            repository.load_payments().await,
            &mut unreadable,
        )
        .unwrap_or_default();
        let profile = loaded_or_none(
            StorageKey::Profile,
            repository.load_profile().await,
            &mut unreadable,
        )
        .unwrap_or_else(|| UserProfile::new(clock.now()));
        let savings = loaded_or_none(
            StorageKey::Savings,
            repository.load_savings().await,
            &mut unreadable,
        )
        .unwrap_or_default();

        info!(
            "Loaded {} bills, {} payments, {} savings goals",
            bills.len(),
            payments.len(),
            savings.len()
        );

        Self {
            repository,
            clock,
            bills: Mutex::new(bills),
            payments: Mutex::new(payments),
            profile: Mutex::new(profile),
            savings: Mutex::new(savings),
            unreadable: StdMutex::new(unreadable),
        }
    }

    /// Re-read every collection from storage. A collection that fails to
    /// read keeps its last known good in-memory value; one that reads again
    /// becomes writable.
    pub async fn reload(&self) {
        let mut bills = self.bills.lock().await;
        match self.repository.load_bills().await {
            Ok(loaded) => {
                *bills = loaded.unwrap_or_default();
                self.mark_readable(StorageKey::Bills);
            }
            Err(e) => warn!("Keeping in-memory bills, reload failed: {:#}", e),
        }
        drop(bills);

        let mut payments = self.payments.lock().await;
        match self.repository.load_payments().await {
            Ok(loaded) => {
                *payments = loaded.unwrap_or_default();
                self.mark_readable(StorageKey::Payments);
            }
            Err(e) => warn!("Keeping in-memory payments, reload failed: {:#}", e),
        }
        drop(payments);

        let mut profile = self.profile.lock().await;
        match self.repository.load_profile().await {
            Ok(loaded) => {
                *profile = loaded.unwrap_or_else(|| UserProfile::new(self.clock.now()));
                self.mark_readable(StorageKey::Profile);
            }
            Err(e) => warn!("Keeping in-memory profile, reload failed: {:#}", e),
        }
        drop(profile);

        let mut savings = self.savings.lock().await;
        match self.repository.load_savings().await {
            Ok(loaded) => {
                *savings = loaded.unwrap_or_default();
                self.mark_readable(StorageKey::Savings);
            }
            Err(e) => warn!("Keeping in-memory savings goals, reload failed: {:#}", e),
        }
        drop(savings);

        debug!("Reloaded all collections");
    }

    fn lock_unreadable(&self) -> MutexGuard<'_, HashSet<StorageKey>> {
        self.unreadable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_readable(&self, key: StorageKey) {
        if self.lock_unreadable().remove(&key) {
            info!("{} loaded, writes re-enabled", key.as_str());
        }
    }

    fn ensure_writable(&self, key: StorageKey) -> Result<(), StoreError> {
        if self.lock_unreadable().contains(&key) {
            warn!("Refusing to overwrite unreadable {}", key.as_str());
            return Err(StoreError::UnreadableCollection {
                collection: key.as_str(),
            });
        }
        Ok(())
    }

    /// Collections that failed to load and are currently read-only
    pub fn unreadable_collections(&self) -> Vec<StorageKey> {
        let unreadable = self.lock_unreadable();
        StorageKey::ALL
            .into_iter()
            .filter(|key| unreadable.contains(key))
            .collect()
    }

    pub fn repository(&self) -> &MirrorRepository<S> {
        &self.repository
    }

    fn next_id(&self) -> String {
        generate_entity_id(self.clock.now().timestamp_millis())
    }

    async fn persist_bills(&self, bills: &[Bill]) -> Result<(), StoreError> {
        self.ensure_writable(StorageKey::Bills)?;
        self.repository.save_bills(bills).await.map_err(|e| {
            error!("Failed to save bills: {:#}", e);
            StoreError::Storage(e)
        })
    }

    async fn persist_payments(&self, payments: &[BillPayment]) -> Result<(), StoreError> {
        self.ensure_writable(StorageKey::Payments)?;
        self.repository.save_payments(payments).await.map_err(|e| {
            error!("Failed to save payments: {:#}", e);
            StoreError::Storage(e)
        })
    }

    async fn persist_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.ensure_writable(StorageKey::Profile)?;
        self.repository.save_profile(profile).await.map_err(|e| {
            error!("Failed to save profile: {:#}", e);
            StoreError::Storage(e)
        })
    }

    async fn persist_savings(&self, goals: &[SavingsGoal]) -> Result<(), StoreError> {
        self.ensure_writable(StorageKey::Savings)?;
        self.repository.save_savings(goals).await.map_err(|e| {
            error!("Failed to save savings goals: {:#}", e);
            StoreError::Storage(e)
        })
    }

    // -----------------------------------------------------------------------
    // Bills
    // -----------------------------------------------------------------------

    pub async fn add_bill(&self, draft: NewBill) -> Result<Bill, StoreError> {
        info!("Adding bill: {}", draft.name);
        let bill = Bill::from_draft(draft, self.next_id(), self.clock.now());

        let mut bills = self.bills.lock().await;
        let mut updated = bills.clone();
        updated.push(bill.clone());
        self.persist_bills(&updated).await?;
        *bills = updated;

        info!("Created bill {}", bill.id);
        Ok(bill)
    }

    /// Merge `patch` into the bill with `id`. Unknown ids are a no-op.
    pub async fn update_bill(&self, id: &str, patch: BillPatch) -> Result<Option<Bill>, StoreError> {
        info!("Updating bill: {}", id);
        let mut bills = self.bills.lock().await;
        let Some(index) = bills.iter().position(|b| b.id == id) else {
            debug!("Bill {} not found, nothing to update", id);
            return Ok(None);
        };

        let mut updated = bills.clone();
        updated[index].apply_patch(patch, self.clock.now());
        let bill = updated[index].clone();
        self.persist_bills(&updated).await?;
        *bills = updated;
        Ok(Some(bill))
    }

    /// Remove the bill and every payment recorded against it, in any month.
    ///
    /// Payments are written first so a failure between the two writes can
    /// leave a bill without history but never history without a bill.
    pub async fn delete_bill(&self, id: &str) -> Result<bool, StoreError> {
        info!("Deleting bill: {}", id);
        let mut bills = self.bills.lock().await;
        let mut payments = self.payments.lock().await;

        if !bills.iter().any(|b| b.id == id) {
            debug!("Bill {} not found, nothing to delete", id);
            return Ok(false);
        }

        let remaining_payments: Vec<BillPayment> =
            payments.iter().filter(|p| p.bill_id != id).cloned().collect();
        if remaining_payments.len() != payments.len() {
            debug!(
                "Removing {} payments of bill {}",
                payments.len() - remaining_payments.len(),
                id
            );
            self.persist_payments(&remaining_payments).await?;
            *payments = remaining_payments;
        }

        let remaining_bills: Vec<Bill> = bills.iter().filter(|b| b.id != id).cloned().collect();
        self.persist_bills(&remaining_bills).await?;
        *bills = remaining_bills;
        Ok(true)
    }

    /// Record the bill as paid for the current month, keeping a single
    /// payment row per month. Returns `None` when the bill does not exist.
    pub async fn mark_bill_paid(
        &self,
        bill_id: &str,
        actual_amount: Option<f64>,
    ) -> Result<Option<BillPayment>, StoreError> {
        info!("Marking bill as paid: {}", bill_id);
        let bills = self.bills.lock().await;
        if !bills.iter().any(|b| b.id == bill_id) {
            debug!("Bill {} not found, not marking paid", bill_id);
            return Ok(None);
        }

        let mut payments = self.payments.lock().await;
        let period = self.clock.current_period();
        let now = self.clock.now();
        let mut updated = payments.clone();

        let payment = match updated.iter_mut().find(|p| p.matches(bill_id, period)) {
            Some(existing) => {
                existing.is_paid = true;
                existing.actual_amount = actual_amount;
                existing.paid_at = Some(now);
                existing.clone()
            }
            None => {
                let payment = BillPayment {
                    id: self.next_id(),
                    bill_id: bill_id.to_string(),
                    month: period.month(),
                    year: period.year(),
                    is_paid: true,
                    actual_amount,
                    paid_at: Some(now),
                };
                updated.push(payment.clone());
                payment
            }
        };

        self.persist_payments(&updated).await?;
        *payments = updated;
        Ok(Some(payment))
    }

    /// Delete the current month's payment row for the bill.
    pub async fn mark_bill_unpaid(&self, bill_id: &str) -> Result<bool, StoreError> {
        info!("Marking bill as unpaid: {}", bill_id);
        let mut payments = self.payments.lock().await;
        let period = self.clock.current_period();

        let updated: Vec<BillPayment> = payments
            .iter()
            .filter(|p| !p.matches(bill_id, period))
            .cloned()
            .collect();
        if updated.len() == payments.len() {
            return Ok(false);
        }

        self.persist_payments(&updated).await?;
        *payments = updated;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    async fn modify_profile<F>(&self, change: F) -> Result<UserProfile, StoreError>
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut profile = self.profile.lock().await;
        let mut updated = profile.clone();
        change(&mut updated);
        updated.updated_at = self.clock.now();
        self.persist_profile(&updated).await?;
        *profile = updated.clone();
        Ok(updated)
    }

    /// Store a new income profile and cache its monthly estimate in the
    /// flat `monthly_income` field.
    pub async fn update_income_profile(
        &self,
        income_profile: IncomeProfile,
    ) -> Result<UserProfile, StoreError> {
        info!("Updating income profile: {:?}", income_profile);
        let estimated = calculate_estimated_monthly_income(Some(&income_profile));
        self.modify_profile(|profile| {
            profile.income_profile = Some(income_profile);
            profile.monthly_income = Some(estimated);
        })
        .await
    }

    /// Set the legacy flat monthly income.
    pub async fn update_income(&self, amount: f64) -> Result<UserProfile, StoreError> {
        info!("Updating income: {:.2}", amount);
        self.modify_profile(|profile| profile.monthly_income = Some(amount))
            .await
    }

    pub async fn update_notification_settings(
        &self,
        enabled: bool,
    ) -> Result<UserProfile, StoreError> {
        info!("Updating notification settings: {}", enabled);
        self.modify_profile(|profile| profile.notifications_enabled = enabled)
            .await
    }

    // -----------------------------------------------------------------------
    // Savings
    // -----------------------------------------------------------------------

    pub async fn add_savings_goal(&self, draft: NewSavingsGoal) -> Result<SavingsGoal, StoreError> {
        info!("Adding savings goal: {}", draft.name);
        if draft.current_amount < 0.0 {
            warn!("Rejecting savings goal with negative balance {:.2}", draft.current_amount);
            return Err(StoreError::NegativeSavingsBalance {
                current: 0.0,
                delta: draft.current_amount,
            });
        }
        let goal = SavingsGoal::from_draft(draft, self.next_id(), self.clock.now());

        let mut savings = self.savings.lock().await;
        let mut updated = savings.clone();
        updated.push(goal.clone());
        self.persist_savings(&updated).await?;
        *savings = updated;
        Ok(goal)
    }

    pub async fn update_savings_goal(
        &self,
        id: &str,
        patch: SavingsGoalPatch,
    ) -> Result<Option<SavingsGoal>, StoreError> {
        info!("Updating savings goal: {}", id);
        let mut savings = self.savings.lock().await;
        let Some(index) = savings.iter().position(|g| g.id == id) else {
            debug!("Savings goal {} not found, nothing to update", id);
            return Ok(None);
        };

        if let Some(amount) = patch.current_amount.filter(|amount| *amount < 0.0) {
            let current = savings[index].current_amount;
            warn!("Rejecting negative balance {:.2} for savings goal {}", amount, id);
            return Err(StoreError::NegativeSavingsBalance {
                current,
                delta: amount - current,
            });
        }

        let mut updated = savings.clone();
        updated[index].apply_patch(patch, self.clock.now());
        let goal = updated[index].clone();
        self.persist_savings(&updated).await?;
        *savings = updated;
        Ok(Some(goal))
    }

    pub async fn delete_savings_goal(&self, id: &str) -> Result<bool, StoreError> {
        info!("Deleting savings goal: {}", id);
        let mut savings = self.savings.lock().await;
        let updated: Vec<SavingsGoal> = savings.iter().filter(|g| g.id != id).cloned().collect();
        if updated.len() == savings.len() {
            return Ok(false);
        }
        self.persist_savings(&updated).await?;
        *savings = updated;
        Ok(true)
    }

    /// Apply a signed deposit (positive) or withdrawal (negative).
    ///
    /// The balance may never go below zero; such a change is rejected and
    /// nothing is written.
    pub async fn add_to_savings(
        &self,
        goal_id: &str,
        delta: f64,
    ) -> Result<Option<SavingsGoal>, StoreError> {
        info!("Adjusting savings goal {} by {:.2}", goal_id, delta);
        let mut savings = self.savings.lock().await;
        let Some(index) = savings.iter().position(|g| g.id == goal_id) else {
            debug!("Savings goal {} not found, nothing to adjust", goal_id);
            return Ok(None);
        };

        let current = savings[index].current_amount;
        let new_amount = round_to_cents(current + delta);
        if new_amount < 0.0 {
            warn!(
                "Rejected withdrawal of {:.2} from goal {} holding {:.2}",
                -delta, goal_id, current
            );
            return Err(StoreError::NegativeSavingsBalance { current, delta });
        }

        let mut updated = savings.clone();
        updated[index].apply_patch(
            SavingsGoalPatch {
                current_amount: Some(new_amount),
                ..Default::default()
            },
            self.clock.now(),
        );
        let goal = updated[index].clone();
        self.persist_savings(&updated).await?;
        *savings = updated;

        if goal.is_complete() {
            info!("Savings goal {} reached its target of {:.2}", goal.id, goal.target_amount);
        }
        Ok(Some(goal))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn bills(&self) -> Vec<Bill> {
        self.bills.lock().await.clone()
    }

    pub async fn bill(&self, id: &str) -> Option<Bill> {
        self.bills.lock().await.iter().find(|b| b.id == id).cloned()
    }

    pub async fn payments(&self) -> Vec<BillPayment> {
        self.payments.lock().await.clone()
    }

    pub async fn profile(&self) -> UserProfile {
        self.profile.lock().await.clone()
    }

    pub async fn savings(&self) -> Vec<SavingsGoal> {
        self.savings.lock().await.clone()
    }

    pub async fn savings_goal(&self, id: &str) -> Option<SavingsGoal> {
        self.savings.lock().await.iter().find(|g| g.id == id).cloned()
    }

    pub fn current_period(&self) -> Period {
        self.clock.current_period()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Bill views for any month, relative to today's date.
    pub async fn monthly_bills(&self, period: Period) -> Vec<MonthlyBillView> {
        let bills = self.bills.lock().await.clone();
        let payments = self.payments.lock().await.clone();
        bills_for_month(&bills, &payments, period, self.clock.today())
    }

    pub async fn current_monthly_bills(&self) -> Vec<MonthlyBillView> {
        self.monthly_bills(self.current_period()).await
    }

    pub async fn upcoming_bills(&self) -> Vec<MonthlyBillView> {
        calculations::upcoming_bills(&self.current_monthly_bills().await)
    }

    pub async fn paid_bills(&self) -> Vec<MonthlyBillView> {
        calculations::paid_bills(&self.current_monthly_bills().await)
    }

    pub async fn estimated_monthly_income(&self) -> f64 {
        estimated_monthly_income_for(&*self.profile.lock().await)
    }

    pub async fn summary(&self) -> MonthlySummary {
        self.summary_for(self.current_period()).await
    }

    pub async fn summary_for(&self, period: Period) -> MonthlySummary {
        let views = self.monthly_bills(period).await;
        let income = self.estimated_monthly_income().await;
        calculate_monthly_summary(&views, income, period)
    }

    pub async fn total_savings(&self) -> f64 {
        calculations::total_savings(&self.savings.lock().await)
    }

    pub async fn total_savings_target(&self) -> f64 {
        calculations::total_savings_target(&self.savings.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::FixedClock;
    use crate::storage::{InMemoryKeyValueStore, StorageKey};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use shared::{BillFrequency, FixedIncome, PayFrequency};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Storage that can be told to fail reads, all writes, or writes to one key.
    #[derive(Default)]
    struct FlakyStorage {
        inner: InMemoryKeyValueStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        fail_writes_to: StdMutex<Option<&'static str>>,
    }

    impl FlakyStorage {
        fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn set_fail_writes_to(&self, key: Option<StorageKey>) {
            *self.fail_writes_to.lock().unwrap() = key.map(|k| k.as_str());
        }
    }

    #[async_trait]
    impl KeyValueStorage for FlakyStorage {
        async fn get_value(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("simulated read failure for {}", key);
            }
            self.inner.get_value(key).await
        }

        async fn put_value(&self, key: &str, value: &str) -> Result<()> {
            let key_fails = *self.fail_writes_to.lock().unwrap() == Some(key);
            if key_fails || self.fail_writes.load(Ordering::SeqCst) {
                bail!("simulated write failure for {}", key);
            }
            self.inner.put_value(key, value).await
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            self.inner.list_keys().await
        }
    }

    fn june_10() -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()))
    }

    async fn memory_store() -> MirrorStore<InMemoryKeyValueStore> {
        MirrorStore::load(MirrorRepository::new(InMemoryKeyValueStore::new()), june_10()).await
    }

    async fn flaky_store() -> (Arc<FlakyStorage>, MirrorStore<Arc<FlakyStorage>>) {
        let storage = Arc::new(FlakyStorage::default());
        let store = MirrorStore::load(MirrorRepository::new(storage.clone()), june_10()).await;
        (storage, store)
    }

    fn new_bill(name: &str, due_day: u32, amount: f64) -> NewBill {
        NewBill {
            name: name.to_string(),
            due_day,
            frequency: BillFrequency::Monthly,
            expected_amount: amount,
            category: None,
            notifications_enabled: true,
        }
    }

    fn new_goal(target: f64, current: f64) -> NewSavingsGoal {
        NewSavingsGoal {
            name: "Trip".to_string(),
            target_amount: target,
            current_amount: current,
            icon: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn test_empty_store_defaults() {
        let store = memory_store().await;
        assert!(store.bills().await.is_empty());
        assert!(store.payments().await.is_empty());
        assert!(store.savings().await.is_empty());
        assert!(store.profile().await.notifications_enabled);
        assert_eq!(store.estimated_monthly_income().await, 0.0);
        assert_eq!(store.current_period(), Period::new(5, 2025).unwrap());
    }

    #[tokio::test]
    async fn test_add_bill_assigns_id_and_persists() {
        let store = memory_store().await;
        let bill = store.add_bill(new_bill("Rent", 1, 1200.0)).await.unwrap();

        assert!(!bill.id.is_empty());
        assert_eq!(bill.created_at, bill.updated_at);
        assert_eq!(store.bill(&bill.id).await, Some(bill.clone()));

        let persisted = store.repository().load_bills().await.unwrap().unwrap();
        assert_eq!(persisted, vec![bill]);
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_collections() {
        let store = memory_store().await;
        let a = store.add_bill(new_bill("A", 1, 1.0)).await.unwrap();
        let b = store.add_bill(new_bill("B", 2, 1.0)).await.unwrap();
        let payment = store.mark_bill_paid(&a.id, None).await.unwrap().unwrap();
        let goal = store.add_savings_goal(new_goal(10.0, 0.0)).await.unwrap();

        let ids = [a.id, b.id, payment.id, goal.id];
        for (i, id) in ids.iter().enumerate() {
            assert!(ids[i + 1..].iter().all(|other| other != id));
        }
    }

    #[tokio::test]
    async fn test_update_missing_bill_is_noop() {
        let store = memory_store().await;
        let result = store
            .update_bill(
                "missing",
                BillPatch {
                    name: Some("Ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.bills().await.is_empty());
        assert!(!store.delete_bill("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_bill_merges_patch() {
        let store = memory_store().await;
        let bill = store.add_bill(new_bill("Phone", 20, 45.0)).await.unwrap();
        let updated = store
            .update_bill(
                &bill.id,
                BillPatch {
                    expected_amount: Some(50.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Phone");
        assert_eq!(updated.expected_amount, 50.0);
        assert_eq!(store.bill(&bill.id).await.unwrap().expected_amount, 50.0);
    }

    #[tokio::test]
    async fn test_paid_scenario_before_due_day() {
        let store = memory_store().await;
        let bill = store.add_bill(new_bill("Power", 15, 100.0)).await.unwrap();

        let views = store.current_monthly_bills().await;
        assert!(!views[0].is_overdue);
        assert!(views[0].days_until_due > 0);
        assert!(!views[0].is_paid_this_month);
        assert_eq!(views[0].amount_due, 100.0);

        store.mark_bill_paid(&bill.id, Some(90.0)).await.unwrap();
        let views = store.current_monthly_bills().await;
        assert!(views[0].is_paid_this_month);
        assert_eq!(views[0].amount_due, 90.0);
        assert_eq!(store.paid_bills().await.len(), 1);
        assert!(store.upcoming_bills().await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_paid_keeps_one_row_per_month() {
        let store = memory_store().await;
        let bill = store.add_bill(new_bill("Power", 15, 100.0)).await.unwrap();

        let first = store.mark_bill_paid(&bill.id, None).await.unwrap().unwrap();
        let second = store
            .mark_bill_paid(&bill.id, Some(95.0))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        let payments = store.payments().await;
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].actual_amount, Some(95.0));
        assert_eq!(payments[0].month, 5);
        assert_eq!(payments[0].year, 2025);
    }

    #[tokio::test]
    async fn test_mark_paid_for_missing_bill_is_noop() {
        let store = memory_store().await;
        assert!(store.mark_bill_paid("missing", None).await.unwrap().is_none());
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_paid_then_unpaid_restores_view() {
        let store = memory_store().await;
        let bill = store.add_bill(new_bill("Power", 15, 100.0)).await.unwrap();
        let before = store.current_monthly_bills().await;

        store.mark_bill_paid(&bill.id, Some(90.0)).await.unwrap();
        assert!(store.mark_bill_unpaid(&bill.id).await.unwrap());

        assert_eq!(store.current_monthly_bills().await, before);
        assert!(store.payments().await.is_empty());
        assert!(!store.mark_bill_unpaid(&bill.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_bill_removes_all_payments() {
        let storage = InMemoryKeyValueStore::new();
        let repository = MirrorRepository::new(storage.clone());

        let store = MirrorStore::load(repository.clone(), june_10()).await;
        let keep = store.add_bill(new_bill("Keep", 1, 10.0)).await.unwrap();
        let doomed = store.add_bill(new_bill("Doomed", 2, 20.0)).await.unwrap();

        // Payments in older months, recorded through a store pinned to earlier dates
        for month in [3, 4] {
            let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, month, 5).unwrap()));
            let past = MirrorStore::load(repository.clone(), clock).await;
            past.mark_bill_paid(&doomed.id, None).await.unwrap();
        }
        store.reload().await;
        store.mark_bill_paid(&doomed.id, None).await.unwrap();
        store.mark_bill_paid(&keep.id, None).await.unwrap();
        assert_eq!(store.payments().await.len(), 4);

        assert!(store.delete_bill(&doomed.id).await.unwrap());

        let payments = store.payments().await;
        assert_eq!(payments.len(), 1);
        assert!(payments.iter().all(|p| p.bill_id != doomed.id));
        let persisted = repository.load_payments().await.unwrap().unwrap();
        assert!(persisted.iter().all(|p| p.bill_id != doomed.id));
        assert_eq!(store.bills().await, vec![keep]);
    }

    #[tokio::test]
    async fn test_delete_bill_never_leaves_orphaned_payments() {
        let (storage, store) = flaky_store().await;
        let keep = store.add_bill(new_bill("Keep", 1, 10.0)).await.unwrap();
        let bill = store.add_bill(new_bill("Gym", 5, 30.0)).await.unwrap();
        store.mark_bill_paid(&bill.id, None).await.unwrap();
        store.mark_bill_paid(&keep.id, None).await.unwrap();

        // Payments commit, then the bills write fails
        storage.set_fail_writes_to(Some(StorageKey::Bills));
        assert!(matches!(
            store.delete_bill(&bill.id).await,
            Err(StoreError::Storage(_))
        ));

        assert!(store.bill(&bill.id).await.is_some());
        let persisted_bills = store.repository().load_bills().await.unwrap().unwrap();
        assert!(persisted_bills.iter().any(|b| b.id == bill.id));

        let payments = store.payments().await;
        assert!(payments.iter().all(|p| p.bill_id != bill.id));
        assert!(payments.iter().any(|p| p.bill_id == keep.id));
        let persisted_payments = store.repository().load_payments().await.unwrap().unwrap();
        assert!(persisted_payments.iter().all(|p| p.bill_id != bill.id));
        assert_eq!(persisted_payments, payments);

        // The retry finishes the delete
        storage.set_fail_writes_to(None);
        assert!(store.delete_bill(&bill.id).await.unwrap());
        assert_eq!(store.bills().await, vec![keep]);
    }

    #[tokio::test]
    async fn test_income_profile_caches_estimate() {
        let store = memory_store().await;
        let profile = store
            .update_income_profile(IncomeProfile::Fixed(FixedIncome {
                amount: 1000.0,
                frequency: PayFrequency::Weekly,
                next_pay_date: None,
            }))
            .await
            .unwrap();
        assert_eq!(profile.monthly_income, Some(4330.0));
        assert_eq!(store.estimated_monthly_income().await, 4330.0);

        let profile = store.update_notification_settings(false).await.unwrap();
        assert!(!profile.notifications_enabled);
        assert_eq!(profile.monthly_income, Some(4330.0));
        assert!(profile.income_profile.is_some());
    }

    #[tokio::test]
    async fn test_legacy_income_used_without_profile() {
        let store = memory_store().await;
        store.update_income(2500.0).await.unwrap();
        assert_eq!(store.estimated_monthly_income().await, 2500.0);

        store.add_bill(new_bill("Rent", 1, 1000.0)).await.unwrap();
        let summary = store.summary().await;
        assert_eq!(summary.total_income, 2500.0);
        assert_eq!(summary.remaining_balance, 1500.0);
        assert_eq!(summary.month, 5);
    }

    #[tokio::test]
    async fn test_savings_crud() {
        let store = memory_store().await;
        let goal = store.add_savings_goal(new_goal(1000.0, 100.0)).await.unwrap();
        assert_eq!(store.total_savings().await, 100.0);
        assert_eq!(store.total_savings_target().await, 1000.0);

        let renamed = store
            .update_savings_goal(
                &goal.id,
                SavingsGoalPatch {
                    name: Some("Car".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Car");
        assert_eq!(renamed.current_amount, 100.0);

        assert!(store.delete_savings_goal(&goal.id).await.unwrap());
        assert!(store.savings_goal(&goal.id).await.is_none());
        assert!(!store.delete_savings_goal(&goal.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_savings_cannot_go_negative() {
        let store = memory_store().await;
        let goal = store.add_savings_goal(new_goal(500.0, 500.0)).await.unwrap();
        assert_eq!(goal.progress_percent(), 100.0);
        assert!(goal.is_complete());

        let result = store.add_to_savings(&goal.id, -600.0).await;
        assert!(matches!(
            result,
            Err(StoreError::NegativeSavingsBalance { current, delta }) if current == 500.0 && delta == -600.0
        ));
        assert_eq!(store.savings_goal(&goal.id).await.unwrap().current_amount, 500.0);

        let goal = store.add_to_savings(&goal.id, -500.0).await.unwrap().unwrap();
        assert_eq!(goal.current_amount, 0.0);
        let goal = store.add_to_savings(&goal.id, 25.5).await.unwrap().unwrap();
        assert_eq!(goal.current_amount, 25.5);

        assert!(store.add_to_savings("missing", 10.0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_savings_goal_rejects_negative_starting_balance() {
        let store = memory_store().await;
        let result = store.add_savings_goal(new_goal(500.0, -20.0)).await;
        assert!(matches!(
            result,
            Err(StoreError::NegativeSavingsBalance { current, delta }) if current == 0.0 && delta == -20.0
        ));
        assert!(store.savings().await.is_empty());
        assert!(store.repository().load_savings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_savings_update_rejects_negative_balance() {
        let store = memory_store().await;
        let goal = store.add_savings_goal(new_goal(500.0, 100.0)).await.unwrap();

        let result = store
            .update_savings_goal(
                &goal.id,
                SavingsGoalPatch {
                    name: Some("Renamed".to_string()),
                    current_amount: Some(-1.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::NegativeSavingsBalance { current, delta }) if current == 100.0 && delta == -101.0
        ));
        assert_eq!(store.savings_goal(&goal.id).await, Some(goal.clone()));
        let persisted = store.repository().load_savings().await.unwrap().unwrap();
        assert_eq!(persisted, vec![goal.clone()]);

        let zeroed = store
            .update_savings_goal(
                &goal.id,
                SavingsGoalPatch {
                    current_amount: Some(0.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(zeroed.current_amount, 0.0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_untouched() {
        let (storage, store) = flaky_store().await;
        let bill = store.add_bill(new_bill("Rent", 1, 1200.0)).await.unwrap();
        let goal = store.add_savings_goal(new_goal(100.0, 10.0)).await.unwrap();

        storage.set_fail_writes(true);
        assert!(matches!(
            store.add_bill(new_bill("Phone", 2, 40.0)).await,
            Err(StoreError::Storage(_))
        ));
        assert!(store.mark_bill_paid(&bill.id, None).await.is_err());
        assert!(store.update_income(3000.0).await.is_err());
        assert!(store.add_to_savings(&goal.id, 5.0).await.is_err());
        assert!(store.delete_bill(&bill.id).await.is_err());

        assert_eq!(store.bills().await, vec![bill.clone()]);
        assert!(store.payments().await.is_empty());
        assert_eq!(store.profile().await.monthly_income, None);
        assert_eq!(store.savings_goal(&goal.id).await.unwrap().current_amount, 10.0);

        storage.set_fail_writes(false);
        assert!(store.mark_bill_paid(&bill.id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reload_keeps_last_known_good_on_read_failure() {
        let (storage, store) = flaky_store().await;
        store.add_bill(new_bill("Rent", 1, 1200.0)).await.unwrap();

        storage.set_fail_reads(true);
        store.reload().await;
        assert_eq!(store.bills().await.len(), 1);

        storage.set_fail_reads(false);
        storage
            .put_value(StorageKey::Bills.as_str(), "[]")
            .await
            .unwrap();
        store.reload().await;
        assert!(store.bills().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_survives_corrupt_blob() {
        let storage = InMemoryKeyValueStore::with_values([
            (StorageKey::Bills.as_str(), "{not json"),
            (StorageKey::Savings.as_str(), r#"{"schemaVersion":1,"data":[]}"#),
        ]);
        let store = MirrorStore::load(MirrorRepository::new(storage), june_10()).await;
        assert!(store.bills().await.is_empty());
        assert!(store.savings().await.is_empty());
        assert_eq!(store.unreadable_collections(), vec![StorageKey::Bills]);
    }

    #[tokio::test]
    async fn test_unreadable_collection_is_not_overwritten() {
        let newer = r#"{"schemaVersion":2,"data":[{"id":"old","name":"Rent","dueDay":1,"expectedAmount":1200.0}]}"#;
        let storage = InMemoryKeyValueStore::with_values([(StorageKey::Bills.as_str(), newer)]);
        let store = MirrorStore::load(MirrorRepository::new(storage.clone()), june_10()).await;
        assert!(store.bills().await.is_empty());

        let result = store.add_bill(new_bill("Phone", 2, 40.0)).await;
        assert!(matches!(
            result,
            Err(StoreError::UnreadableCollection { collection }) if collection == "mirror_bills"
        ));
        assert!(store.bills().await.is_empty());
        let raw = storage.get_value(StorageKey::Bills.as_str()).await.unwrap();
        assert_eq!(raw.as_deref(), Some(newer));

        // Other collections stay writable
        store.add_savings_goal(new_goal(100.0, 0.0)).await.unwrap();
        store.update_income(2000.0).await.unwrap();

        // A reload that reads the collection lifts the block
        storage
            .put_value(StorageKey::Bills.as_str(), r#"{"schemaVersion":1,"data":[]}"#)
            .await
            .unwrap();
        store.reload().await;
        assert!(store.unreadable_collections().is_empty());
        store.add_bill(new_bill("Phone", 2, 40.0)).await.unwrap();
        assert_eq!(store.bills().await.len(), 1);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let storage = InMemoryKeyValueStore::new();
        let store = MirrorStore::load(MirrorRepository::new(storage.clone()), june_10()).await;
        let bill = store.add_bill(new_bill("Rent", 1, 1200.0)).await.unwrap();
        store.mark_bill_paid(&bill.id, Some(1150.0)).await.unwrap();
        store.update_income(3000.0).await.unwrap();

        let restarted = MirrorStore::load(MirrorRepository::new(storage), june_10()).await;
        assert_eq!(restarted.bills().await, store.bills().await);
        assert_eq!(restarted.payments().await, store.payments().await);
        assert_eq!(restarted.profile().await, store.profile().await);
        assert_eq!(restarted.summary().await, store.summary().await);
    }
}
