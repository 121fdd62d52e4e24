use async_trait::async_trait;
use domains::{Counter, GlobalStatistics, StatisticsRepository};
use tokio::sync::RwLock;

/// The single statistics row. Adjustments take the write lock, so
/// concurrent increments never lose an update.
#[derive(Debug, Default)]
pub struct InMemoryStatisticsRepository {
    row: RwLock<Option<GlobalStatistics>>,
}

impl InMemoryStatisticsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatisticsRepository for InMemoryStatisticsRepository {
    async fn load(&self) -> anyhow::Result<Option<GlobalStatistics>> {
        Ok(*self.row.read().await)
    }

    async fn adjust(&self, counter: Counter, delta: i64) -> anyhow::Result<GlobalStatistics> {
        let mut row = self.row.write().await;
        let stats = row.get_or_insert_with(GlobalStatistics::default);
        stats.apply(counter, delta);
        Ok(*stats)
    }

    async fn store(&self, stats: GlobalStatistics) -> anyhow::Result<()> {
        *self.row.write().await = Some(stats);
        Ok(())
    }
}
