use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CreatePortfolio, NewPortfolio, Portfolio, SearchQuery, UpdatePortfolio};
use crate::services::batch_validator::BatchValidator;
use crate::services::name_validator;
use crate::services::retry::RetryPolicy;
use crate::store::{PortfolioFilter, PortfolioStore};

pub const BULK_OPERATION_LABEL: &str = "bulk_portfolio_creation";

/// Portfolio lifecycle: the only component that talks to the store.
///
/// Names are not unique across the store; only a single bulk batch is
/// checked for duplicates.
pub struct PortfolioService {
    store: Arc<dyn PortfolioStore>,
    validator: BatchValidator,
    bulk_retry: RetryPolicy,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn PortfolioStore>, validator: BatchValidator, bulk_retry: RetryPolicy) -> Self {
        Self {
            store,
            validator,
            bulk_retry,
        }
    }

    pub async fn create(&self, input: CreatePortfolio) -> Result<Portfolio, AppError> {
        let result = self.validator.validate(std::slice::from_ref(&input));
        if !result.is_valid {
            return Err(AppError::Validation(result.errors.join("; ")));
        }

        let doc = NewPortfolio::from_request(&input, Utc::now());
        let id = self.store.insert_one(doc.clone()).await.map_err(|e| {
            error!("Failed to create portfolio '{}': {}", input.name, e);
            AppError::from(e)
        })?;
        self.note_created(&doc.name);

        debug!("Created portfolio {} ({})", id, doc.name);
        Ok(doc.with_id(id))
    }

    pub async fn get(&self, id: Uuid) -> Result<Portfolio, AppError> {
        self.store.find_by_id(id).await?.ok_or_else(|| {
            warn!("Portfolio {} not found", id);
            AppError::NotFound
        })
    }

    pub async fn list_all(&self) -> Result<Vec<Portfolio>, AppError> {
        let total = self.store.count(&PortfolioFilter::All).await?;
        let portfolios = self.store.find(&PortfolioFilter::All, 0, total).await?;
        Ok(portfolios)
    }

    pub async fn update(&self, id: Uuid, input: UpdatePortfolio) -> Result<Portfolio, AppError> {
        if !name_validator::is_valid_format(&input.name) {
            return Err(AppError::Validation(format!("Invalid name format: {}", input.name)));
        }
        if let Some(created) = input.date_created {
            if created > Utc::now() {
                return Err(AppError::Validation("Date created cannot be in the future".into()));
            }
        }

        let mut portfolio = self.get(id).await?;
        if portfolio.version != input.version {
            warn!(
                "Version conflict updating portfolio {}: current {}, requested {}",
                id, portfolio.version, input.version
            );
            return Err(AppError::VersionConflict {
                expected: input.version,
                actual: portfolio.version,
            });
        }

        let old_name = std::mem::replace(&mut portfolio.name, input.name);
        if let Some(created) = input.date_created {
            portfolio.date_created = created;
        }
        portfolio.version = portfolio.version.checked_add(1).ok_or_else(|| {
            warn!("Portfolio {} is at the maximum version {}", id, portfolio.version);
            AppError::Validation(format!(
                "Version {} cannot be incremented further",
                portfolio.version
            ))
        })?;

        if self.store.update_one(&portfolio).await? == 0 {
            warn!("Portfolio {} disappeared before update was written", id);
            return Err(AppError::NotFound);
        }
        self.invalidate_existence();

        info!(
            "Updated portfolio {}: '{}' -> '{}' (version {})",
            id, old_name, portfolio.name, portfolio.version
        );
        Ok(portfolio)
    }

    pub async fn delete(&self, id: Uuid, expected_version: i32) -> Result<(), AppError> {
        let portfolio = self.get(id).await?;
        if portfolio.version != expected_version {
            warn!(
                "Version conflict deleting portfolio {}: current {}, requested {}",
                id, portfolio.version, expected_version
            );
            return Err(AppError::VersionConflict {
                expected: expected_version,
                actual: portfolio.version,
            });
        }

        if self.store.delete_one(id).await? == 0 {
            return Err(AppError::NotFound);
        }
        self.invalidate_existence();

        info!("Deleted portfolio {} ({})", id, portfolio.name);
        Ok(())
    }

    /// Returns one page of matches, newest first, plus the size of the full
    /// filtered set.
    pub async fn search(&self, query: &SearchQuery) -> Result<(Vec<Portfolio>, i64), AppError> {
        let filter = PortfolioFilter::from_search(query.name.as_deref(), query.name_like.as_deref());

        let total = self.store.count(&filter).await.map_err(|e| {
            error!("Failed to count portfolios for {:?}: {}", filter, e);
            AppError::from(e)
        })?;
        let portfolios = self.store.find(&filter, query.offset, query.limit).await?;

        debug!(
            "Search {:?} returned {} of {} (limit {}, offset {})",
            filter,
            portfolios.len(),
            total,
            query.limit,
            query.offset
        );
        Ok((portfolios, total))
    }

    /// All-or-nothing bulk creation. An invalid batch never reaches the
    /// store; a valid one is written in a single retried `insert_many`.
    pub async fn create_bulk(&self, items: Vec<CreatePortfolio>) -> Result<Vec<Portfolio>, AppError> {
        info!("Starting bulk creation of {} portfolios", items.len());

        let result = self.validator.validate(&items);
        if !result.is_valid {
            warn!("Bulk creation rejected: {}", result.summary());
            return Err(AppError::InvalidBatch(result.errors));
        }

        let now = Utc::now();
        let docs: Vec<NewPortfolio> = items
            .iter()
            .map(|item| NewPortfolio::from_request(item, now))
            .collect();
        let total = docs.len();

        let ids = self
            .bulk_retry
            .execute(BULK_OPERATION_LABEL, || self.store.insert_many(&docs))
            .await
            .map_err(|e| {
                error!("Bulk creation of {} portfolios failed: {}", total, e);
                AppError::from(e)
            })?;

        if ids.len() != total {
            error!("Store returned {} ids for {} portfolios", ids.len(), total);
            return Err(AppError::PartialBulkFailure {
                succeeded: ids.len(),
                total,
            });
        }

        let portfolios: Vec<Portfolio> = docs
            .into_iter()
            .zip(ids)
            .map(|(doc, id)| doc.with_id(id))
            .collect();
        for portfolio in &portfolios {
            self.note_created(&portfolio.name);
        }

        info!("Bulk creation completed: {} portfolios", portfolios.len());
        Ok(portfolios)
    }

    /// Whether any stored portfolio has this name (case-insensitive).
    pub async fn name_exists(&self, name: &str) -> Result<bool, AppError> {
        if let Some(cache) = self.validator.cache() {
            if let Some(exists) = cache.cached_existence(name) {
                return Ok(exists);
            }
        }

        let observed_at = self.validator.cache().map(|cache| cache.existence_generation());
        let exists = self
            .store
            .count(&PortfolioFilter::ExactName(name.trim().to_string()))
            .await?
            > 0;
        if let (Some(cache), Some(observed_at)) = (self.validator.cache(), observed_at) {
            cache.record_observed_existence(name, exists, observed_at);
        }
        Ok(exists)
    }

    fn note_created(&self, name: &str) {
        if let Some(cache) = self.validator.cache() {
            cache.record_existence(name, true);
        }
    }

    fn invalidate_existence(&self) {
        if let Some(cache) = self.validator.cache() {
            cache.clear_existence();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use tokio::sync::Notify;

    use crate::services::validation_cache::ValidationCache;
    use crate::store::{InMemoryPortfolioStore, StoreError, StoreOperation};

    fn service_with(store: Arc<InMemoryPortfolioStore>) -> PortfolioService {
        PortfolioService::new(
            store,
            BatchValidator::new(Some(Arc::new(ValidationCache::new(100)))),
            RetryPolicy::default(),
        )
    }

    fn setup() -> (Arc<InMemoryPortfolioStore>, PortfolioService) {
        let store = Arc::new(InMemoryPortfolioStore::new());
        (store.clone(), service_with(store))
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (_, service) = setup();
        let before = Utc::now();

        let portfolio = service.create(CreatePortfolio::named("Growth")).await.unwrap();

        assert_eq!(portfolio.name, "Growth");
        assert_eq!(portfolio.version, 1);
        assert!(portfolio.date_created >= before && portfolio.date_created <= Utc::now());
        assert_eq!(service.get(portfolio.id).await.unwrap(), portfolio);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_name_without_store_call() {
        let (store, service) = setup();

        let err = service.create(CreatePortfolio::named("Bad!")).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_, service) = setup();
        assert!(matches!(service.get(Uuid::new_v4()).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_updates_increment_version_monotonically() {
        let (_, service) = setup();
        let created = service.create(CreatePortfolio::named("Growth")).await.unwrap();

        let mut current = created.clone();
        for n in 1..=4 {
            current = service
                .update(
                    created.id,
                    UpdatePortfolio {
                        name: format!("Growth {}", n),
                        date_created: None,
                        version: current.version,
                    },
                )
                .await
                .unwrap();
        }

        let stored = service.get(created.id).await.unwrap();
        assert_eq!(stored.version, 5);
        assert_eq!(stored.name, "Growth 4");
        assert_eq!(stored.date_created, created.date_created);
    }

    #[tokio::test]
    async fn test_update_at_maximum_version_is_rejected_without_mutation() {
        let (_, service) = setup();
        let created = service
            .create(CreatePortfolio {
                version: Some(i32::MAX),
                ..CreatePortfolio::named("Growth")
            })
            .await
            .unwrap();

        let err = service
            .update(
                created.id,
                UpdatePortfolio {
                    name: "Renamed".to_string(),
                    date_created: None,
                    version: i32::MAX,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg.contains("cannot be incremented")));
        let stored = service.get(created.id).await.unwrap();
        assert_eq!(stored.version, i32::MAX);
        assert_eq!(stored.name, "Growth");
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected_without_mutation() {
        let (_, service) = setup();
        let created = service.create(CreatePortfolio::named("Growth")).await.unwrap();
        service
            .update(
                created.id,
                UpdatePortfolio {
                    name: "Renamed".to_string(),
                    date_created: None,
                    version: 1,
                },
            )
            .await
            .unwrap();

        let err = service
            .update(
                created.id,
                UpdatePortfolio {
                    name: "Stale write".to_string(),
                    date_created: None,
                    version: 1,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::VersionConflict { expected: 1, actual: 2 }));
        let stored = service.get(created.id).await.unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_update_replaces_date_when_supplied() {
        let (_, service) = setup();
        let created = service.create(CreatePortfolio::named("Growth")).await.unwrap();
        let new_date = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();

        let updated = service
            .update(
                created.id,
                UpdatePortfolio {
                    name: "Growth".to_string(),
                    date_created: Some(new_date),
                    version: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.date_created, new_date);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_, service) = setup();
        let err = service
            .update(
                Uuid::new_v4(),
                UpdatePortfolio {
                    name: "Ghost".to_string(),
                    date_created: None,
                    version: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_checks_version() {
        let (_, service) = setup();
        let created = service.create(CreatePortfolio::named("Growth")).await.unwrap();

        let conflict = service.delete(created.id, 7).await.unwrap_err();
        assert!(matches!(conflict, AppError::VersionConflict { expected: 7, actual: 1 }));
        assert!(service.get(created.id).await.is_ok());

        service.delete(created.id, 1).await.unwrap();
        assert!(matches!(service.get(created.id).await, Err(AppError::NotFound)));
        assert!(matches!(service.delete(created.id, 1).await, Err(AppError::NotFound)));
    }

    async fn seed_ten(service: &PortfolioService) -> Vec<Portfolio> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let items: Vec<CreatePortfolio> = (0..10)
            .map(|i| CreatePortfolio {
                name: format!("Portfolio {}", i),
                date_created: Some(base + Duration::days(i)),
                version: None,
            })
            .collect();
        service.create_bulk(items).await.unwrap()
    }

    #[tokio::test]
    async fn test_search_pagination() {
        let (_, service) = setup();
        seed_ten(&service).await;

        let (page, total) = service
            .search(&SearchQuery {
                limit: 3,
                offset: 6,
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(total, 10);
        let names: Vec<&str> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Portfolio 3", "Portfolio 2", "Portfolio 1"]);

        let (beyond, total) = service
            .search(&SearchQuery {
                offset: 100,
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_search_by_name_and_fragment() {
        let (_, service) = setup();
        seed_ten(&service).await;
        service.create(CreatePortfolio::named("Tech_Growth")).await.unwrap();

        let (exact, total) = service
            .search(&SearchQuery {
                name: Some("portfolio 7".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(exact[0].name, "Portfolio 7");

        let (partial, total) = service
            .search(&SearchQuery {
                name_like: Some("FOLIO 1".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(partial[0].name, "Portfolio 1");

        let (underscore, _) = service
            .search(&SearchQuery {
                name_like: Some("h_g".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(underscore.len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_returns_everything() {
        let (_, service) = setup();
        seed_ten(&service).await;

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].name, "Portfolio 9");
    }

    #[tokio::test]
    async fn test_bulk_with_duplicate_never_reaches_store() {
        let (store, service) = setup();

        let err = service
            .create_bulk(vec![CreatePortfolio::named("Same"), CreatePortfolio::named(" same")])
            .await
            .unwrap_err();

        match err {
            AppError::InvalidBatch(errors) => assert_eq!(errors, vec!["Duplicate name: Same".to_string()]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bulk_rejects_empty_and_oversized_batches() {
        let (store, service) = setup();

        assert!(matches!(service.create_bulk(vec![]).await, Err(AppError::InvalidBatch(_))));
        let oversized = (0..101).map(|i| CreatePortfolio::named(format!("P{}", i))).collect();
        assert!(matches!(service.create_bulk(oversized).await, Err(AppError::InvalidBatch(_))));
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bulk_partial_failure_is_aggregated() {
        let (store, service) = setup();
        store.fail_next(
            StoreOperation::InsertMany,
            StoreError::PartialFailure {
                succeeded: 1,
                total: 3,
                errors: vec!["E11000 duplicate key".to_string()],
            },
        );

        let err = service
            .create_bulk(vec![
                CreatePortfolio::named("A"),
                CreatePortfolio::named("B"),
                CreatePortfolio::named("C"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PartialBulkFailure { succeeded: 1, total: 3 }));
        assert_eq!(store.calls(StoreOperation::InsertMany), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_retries_transient_failures() {
        let (store, service) = setup();
        store.fail_next(StoreOperation::InsertMany, StoreError::ConnectionFailure("reset".into()));
        store.fail_next(StoreOperation::InsertMany, StoreError::NetworkTimeout("slow".into()));

        let created = service
            .create_bulk(vec![CreatePortfolio::named("A"), CreatePortfolio::named("B")])
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(store.calls(StoreOperation::InsertMany), 3);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_surfaces_store_error_after_retry_budget() {
        let (store, service) = setup();
        for _ in 0..4 {
            store.fail_next(StoreOperation::InsertMany, StoreError::ConnectionFailure("down".into()));
        }

        let err = service
            .create_bulk(vec![CreatePortfolio::named("A")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Store(StoreError::ConnectionFailure(_))));
        assert_eq!(store.calls(StoreOperation::InsertMany), 4);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_end_to_end_with_non_unique_names() {
        let (_, service) = setup();
        let before = Utc::now();

        let created = service
            .create_bulk((0..5).map(|i| CreatePortfolio::named(format!("P{}", i))).collect())
            .await
            .unwrap();

        assert_eq!(created.len(), 5);
        for (i, portfolio) in created.iter().enumerate() {
            assert_eq!(portfolio.name, format!("P{}", i));
            assert_eq!(portfolio.version, 1);
            assert!(portfolio.date_created >= before);
            assert!(portfolio.date_created - before < Duration::seconds(5));
        }
        let mut ids: Vec<Uuid> = created.iter().map(|p| p.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);

        // Names are not unique across the store.
        let again = service.create_bulk(vec![CreatePortfolio::named("P0")]).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_ne!(again[0].id, created[0].id);

        let (_, total) = service
            .search(&SearchQuery {
                name: Some("P0".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_name_exists_tracks_mutations() {
        let (_, service) = setup();
        assert!(!service.name_exists("Growth").await.unwrap());

        let created = service.create(CreatePortfolio::named("Growth")).await.unwrap();
        assert!(service.name_exists("growth ").await.unwrap());

        service.delete(created.id, 1).await.unwrap();
        assert!(!service.name_exists("Growth").await.unwrap());
    }

    /// Holds the next `count` call open until released.
    struct GatedCountStore {
        inner: InMemoryPortfolioStore,
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedCountStore {
        fn new() -> Self {
            Self {
                inner: InMemoryPortfolioStore::new(),
                armed: AtomicBool::new(false),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl PortfolioStore for GatedCountStore {
        async fn insert_one(&self, portfolio: NewPortfolio) -> Result<Uuid, StoreError> {
            self.inner.insert_one(portfolio).await
        }

        async fn insert_many(&self, portfolios: &[NewPortfolio]) -> Result<Vec<Uuid>, StoreError> {
            self.inner.insert_many(portfolios).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Portfolio>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find(
            &self,
            filter: &PortfolioFilter,
            offset: i64,
            limit: i64,
        ) -> Result<Vec<Portfolio>, StoreError> {
            self.inner.find(filter, offset, limit).await
        }

        async fn count(&self, filter: &PortfolioFilter) -> Result<i64, StoreError> {
            let result = self.inner.count(filter).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            result
        }

        async fn update_one(&self, portfolio: &Portfolio) -> Result<u64, StoreError> {
            self.inner.update_one(portfolio).await
        }

        async fn delete_one(&self, id: Uuid) -> Result<u64, StoreError> {
            self.inner.delete_one(id).await
        }
    }

    #[tokio::test]
    async fn test_name_exists_lookup_racing_a_create_is_not_cached() {
        let store = Arc::new(GatedCountStore::new());
        let service = Arc::new(PortfolioService::new(
            store.clone(),
            BatchValidator::new(Some(Arc::new(ValidationCache::new(100)))),
            RetryPolicy::default(),
        ));

        store.armed.store(true, Ordering::SeqCst);
        let in_flight = tokio::spawn({
            let service = service.clone();
            async move { service.name_exists("Growth").await }
        });
        store.entered.notified().await;

        service.create(CreatePortfolio::named("Growth")).await.unwrap();
        store.release.notify_one();

        assert!(!in_flight.await.unwrap().unwrap(), "lookup counted before the create");
        assert!(service.name_exists("Growth").await.unwrap());
        assert_eq!(store.inner.len(), 1);
    }
}
