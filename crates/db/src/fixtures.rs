use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use hostdesk_core::store::{Change, Collection, CollectionKey, CollectionStore, Record, StoreError};
use hostdesk_core::{GuestRequest, LinkedOrder, ManagerNotification, NotificationEntry};

/// Deterministic demo data for a front desk shift.
///
/// Covers one request in every status, a pending approval queue for `emp1` whose two
/// requests are linked to coffee and laundry orders, and an already-decided history for
/// `emp2` with the matching manager notifications.
pub struct DemoDataset;

#[derive(Debug, Deserialize)]
struct DemoFixture {
    #[serde(rename = "guest-requests")]
    guest_requests: Vec<GuestRequest>,
    coffee_orders: Vec<LinkedOrder>,
    laundry_requests: Vec<LinkedOrder>,
    restaurant_orders: Vec<LinkedOrder>,
    notifications: Vec<ManagerNotification>,
}

impl DemoFixture {
    fn notification_entries(&self) -> Vec<NotificationEntry> {
        self.notifications.iter().cloned().map(NotificationEntry::Manager).collect()
    }
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("demo fixture is malformed: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededCollection {
    pub key: CollectionKey,
    /// Fixture records that were not present before this load.
    pub inserted: usize,
    pub fixtures: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub collections: Vec<SeededCollection>,
}

impl SeedResult {
    pub fn inserted(&self) -> usize {
        self.collections.iter().map(|collection| collection.inserted).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl DemoDataset {
    pub const JSON: &str = include_str!("../../../config/fixtures/demo_seed.json");

    fn fixture() -> Result<DemoFixture, SeedError> {
        Ok(serde_json::from_str(Self::JSON)?)
    }

    /// Merges the fixture into the store by record id. Records with a fixture id are reset to
    /// their fixture state; every other record is kept. Loading twice is a no-op.
    pub async fn load(store: Arc<dyn CollectionStore>) -> Result<SeedResult, SeedError> {
        let fixture = Self::fixture()?;

        let collections = vec![
            merge(&store, CollectionKey::GuestRequests, &fixture.guest_requests).await?,
            merge(&store, CollectionKey::CoffeeOrders, &fixture.coffee_orders).await?,
            merge(&store, CollectionKey::LaundryRequests, &fixture.laundry_requests).await?,
            merge(&store, CollectionKey::RestaurantOrders, &fixture.restaurant_orders).await?,
            merge(&store, CollectionKey::Notifications, &fixture.notification_entries()).await?,
        ];

        let result = SeedResult { collections };
        info!(
            event_name = "seed.demo.loaded",
            inserted = result.inserted(),
            "demo dataset loaded"
        );
        Ok(result)
    }

    pub async fn verify(store: Arc<dyn CollectionStore>) -> Result<VerificationResult, SeedError> {
        let fixture = Self::fixture()?;
        let mut checks = Vec::new();

        let requests = Collection::<GuestRequest>::new(store.clone(), CollectionKey::GuestRequests)
            .load()
            .await;
        checks.push(presence_check(
            CollectionKey::GuestRequests,
            &fixture.guest_requests,
            &requests,
        ));

        for (key, expected) in [
            (CollectionKey::CoffeeOrders, &fixture.coffee_orders),
            (CollectionKey::LaundryRequests, &fixture.laundry_requests),
            (CollectionKey::RestaurantOrders, &fixture.restaurant_orders),
        ] {
            let stored = Collection::<LinkedOrder>::new(store.clone(), key).load().await;
            checks.push(presence_check(key, expected, &stored));
        }

        let notifications =
            Collection::<NotificationEntry>::new(store.clone(), CollectionKey::Notifications)
                .load()
                .await;
        checks.push(presence_check(
            CollectionKey::Notifications,
            &fixture.notification_entries(),
            &notifications,
        ));

        for seeded in &fixture.guest_requests {
            let Some((section, order_id)) = seeded.linked_order() else {
                continue;
            };
            let orders = Collection::<LinkedOrder>::new(store.clone(), section.collection())
                .load()
                .await;
            let linked = orders.iter().any(|order| &order.id == order_id);
            checks.push((format!("link {} -> {section}/{order_id}", seeded.id), linked));
        }

        let seeded_ids: HashSet<&str> =
            fixture.guest_requests.iter().map(|request| request.id.as_str()).collect();
        let consistent = requests
            .iter()
            .filter(|request| seeded_ids.contains(request.id.as_str()))
            .all(|request| request.invariant_violation().is_none());
        checks.push(("request-invariants".to_string(), consistent));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes fixture records only. Returns how many were removed.
    pub async fn clean(store: Arc<dyn CollectionStore>) -> Result<usize, SeedError> {
        let fixture = Self::fixture()?;

        let removed = remove(&store, CollectionKey::GuestRequests, &fixture.guest_requests).await?
            + remove(&store, CollectionKey::CoffeeOrders, &fixture.coffee_orders).await?
            + remove(&store, CollectionKey::LaundryRequests, &fixture.laundry_requests).await?
            + remove(&store, CollectionKey::RestaurantOrders, &fixture.restaurant_orders).await?
            + remove(&store, CollectionKey::Notifications, &fixture.notification_entries()).await?;

        info!(event_name = "seed.demo.cleaned", removed, "demo dataset removed");
        Ok(removed)
    }
}

async fn merge<T>(
    store: &Arc<dyn CollectionStore>,
    key: CollectionKey,
    fixtures: &[T],
) -> Result<SeededCollection, StoreError>
where
    T: Record + Clone,
{
    let collection = Collection::<T>::new(store.clone(), key);
    let inserted = collection
        .modify(|records| {
            let mut inserted = 0;
            for fixture in fixtures {
                match records.iter_mut().find(|record| record.record_id() == fixture.record_id()) {
                    Some(existing) => *existing = fixture.clone(),
                    None => {
                        records.push(fixture.clone());
                        inserted += 1;
                    }
                }
            }
            Change::Commit(inserted)
        })
        .await?;

    Ok(SeededCollection { key, inserted, fixtures: fixtures.len() })
}

async fn remove<T: Record>(
    store: &Arc<dyn CollectionStore>,
    key: CollectionKey,
    fixtures: &[T],
) -> Result<usize, StoreError> {
    let ids: HashSet<&str> = fixtures.iter().map(Record::record_id).collect();
    Collection::<T>::new(store.clone(), key)
        .modify(|records| {
            let before = records.len();
            records.retain(|record| !ids.contains(record.record_id()));
            let removed = before - records.len();
            if removed == 0 {
                Change::Discard(0)
            } else {
                Change::Commit(removed)
            }
        })
        .await
}

fn presence_check<T: Record>(key: CollectionKey, expected: &[T], stored: &[T]) -> (String, bool) {
    let present: HashSet<&str> = stored.iter().map(Record::record_id).collect();
    let all = expected.iter().all(|record| present.contains(record.record_id()));
    (key.as_str().to_string(), all)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hostdesk_core::store::{Collection, CollectionKey, CollectionStore};
    use hostdesk_core::{GuestRequest, InMemoryCollectionStore, LinkedOrder, RequestStatus};

    use super::DemoDataset;

    #[test]
    fn fixture_parses_into_domain_records() {
        let fixture = DemoDataset::fixture().expect("fixture parses");
        assert_eq!(fixture.guest_requests.len(), 7);
        assert_eq!(fixture.notifications.len(), 2);
        for status in RequestStatus::ALL {
            assert!(
                fixture.guest_requests.iter().any(|request| request.status == status),
                "no seeded request with status {status}"
            );
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_keeps_foreign_records() {
        let store: Arc<dyn CollectionStore> = Arc::new(InMemoryCollectionStore::default());
        let orders = Collection::<LinkedOrder>::new(store.clone(), CollectionKey::CoffeeOrders);
        orders.append(LinkedOrder::new("C100", "delivered")).await.expect("append");

        let first = DemoDataset::load(store.clone()).await.expect("first load");
        let second = DemoDataset::load(store.clone()).await.expect("second load");

        assert_eq!(first.inserted(), 12);
        assert_eq!(second.inserted(), 0);
        assert!(orders.find("C100").await.is_some());
        assert_eq!(orders.load().await.len(), 2);

        let verification = DemoDataset::verify(store).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn reload_resets_fixture_records() {
        let store: Arc<dyn CollectionStore> = Arc::new(InMemoryCollectionStore::default());
        DemoDataset::load(store.clone()).await.expect("load");

        let requests =
            Collection::<GuestRequest>::new(store.clone(), CollectionKey::GuestRequests);
        let mut all = requests.load().await;
        for request in &mut all {
            request.status = RequestStatus::Completed;
        }
        requests.save_all(&all).await.expect("save");

        DemoDataset::load(store.clone()).await.expect("reload");
        let r1 = requests.find("R1").await.expect("R1 present");
        assert_eq!(r1.status, RequestStatus::AwaitingEmployeeApproval);
    }

    #[tokio::test]
    async fn clean_removes_only_fixture_records() {
        let store: Arc<dyn CollectionStore> = Arc::new(InMemoryCollectionStore::default());
        DemoDataset::load(store.clone()).await.expect("load");
        let orders = Collection::<LinkedOrder>::new(store.clone(), CollectionKey::LaundryRequests);
        orders.append(LinkedOrder::new("L99", "pending")).await.expect("append");

        let removed = DemoDataset::clean(store.clone()).await.expect("clean");

        assert_eq!(removed, 12);
        assert_eq!(orders.load().await.len(), 1);
        let verification = DemoDataset::verify(store.clone()).await.expect("verify");
        assert!(!verification.all_present);
        assert_eq!(DemoDataset::clean(store).await.expect("second clean"), 0);
    }
}
