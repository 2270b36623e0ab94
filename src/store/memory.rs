use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{PortfolioFilter, PortfolioStore, StoreError};
use crate::models::{NewPortfolio, Portfolio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    InsertOne,
    InsertMany,
    FindById,
    Find,
    Count,
    UpdateOne,
    DeleteOne,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<Uuid, Portfolio>,
    calls: HashMap<StoreOperation, usize>,
    faults: HashMap<StoreOperation, VecDeque<StoreError>>,
}

/// Process-local store used by `STORE_BACKEND=memory` and by tests.
///
/// Failures queued with [`InMemoryPortfolioStore::fail_next`] are returned, in
/// order, by the next calls to that operation before any data is touched.
#[derive(Default)]
pub struct InMemoryPortfolioStore {
    inner: Mutex<Inner>,
}

impl InMemoryPortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.inner
            .lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.inner.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, operation: StoreOperation) -> Result<parking_lot::MutexGuard<'_, Inner>, StoreError> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(operation).or_insert(0) += 1;
        if let Some(error) = inner.faults.get_mut(&operation).and_then(|q| q.pop_front()) {
            return Err(error);
        }
        Ok(inner)
    }
}

fn sorted_matches(rows: &HashMap<Uuid, Portfolio>, filter: &PortfolioFilter) -> Vec<Portfolio> {
    let mut matches: Vec<Portfolio> = rows
        .values()
        .filter(|p| filter.matches(&p.name))
        .cloned()
        .collect();
    matches.sort_by(|a, b| {
        b.date_created
            .cmp(&a.date_created)
            .then_with(|| b.id.cmp(&a.id))
    });
    matches
}

#[async_trait]
impl PortfolioStore for InMemoryPortfolioStore {
    async fn insert_one(&self, portfolio: NewPortfolio) -> Result<Uuid, StoreError> {
        let mut inner = self.begin(StoreOperation::InsertOne)?;
        let id = Uuid::new_v4();
        inner.rows.insert(id, portfolio.with_id(id));
        Ok(id)
    }

    async fn insert_many(&self, portfolios: &[NewPortfolio]) -> Result<Vec<Uuid>, StoreError> {
        let mut inner = self.begin(StoreOperation::InsertMany)?;
        let mut ids = Vec::with_capacity(portfolios.len());
        for portfolio in portfolios {
            let id = Uuid::new_v4();
            inner.rows.insert(id, portfolio.clone().with_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Portfolio>, StoreError> {
        let inner = self.begin(StoreOperation::FindById)?;
        Ok(inner.rows.get(&id).cloned())
    }

    async fn find(
        &self,
        filter: &PortfolioFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Portfolio>, StoreError> {
        let inner = self.begin(StoreOperation::Find)?;
        Ok(sorted_matches(&inner.rows, filter)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filter: &PortfolioFilter) -> Result<i64, StoreError> {
        let inner = self.begin(StoreOperation::Count)?;
        Ok(inner.rows.values().filter(|p| filter.matches(&p.name)).count() as i64)
    }

    async fn update_one(&self, portfolio: &Portfolio) -> Result<u64, StoreError> {
        let mut inner = self.begin(StoreOperation::UpdateOne)?;
        match inner.rows.get_mut(&portfolio.id) {
            Some(row) => {
                *row = portfolio.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.begin(StoreOperation::DeleteOne)?;
        Ok(inner.rows.remove(&id).map_or(0, |_| 1))
    }
}
