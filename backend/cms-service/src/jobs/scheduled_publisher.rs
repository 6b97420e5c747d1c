//! Scheduled-Post Publisher Background Job
//!
//! Publishes posts whose status is `scheduled` once their `scheduled_at` has
//! passed. Each cycle runs in a single transaction; affected locales get
//! their page caches invalidated after commit. Errors are logged and the
//! loop continues.

use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::cache::PageCache;
use crate::metrics::PUBLISHER_RUNS;

pub struct ScheduledPublisher {
    db: PgPool,
    cache: Arc<PageCache>,
    interval: Duration,
}

impl ScheduledPublisher {
    pub fn new(db: PgPool, cache: Arc<PageCache>, interval_secs: u64) -> Self {
        Self {
            db,
            cache,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Starting scheduled-post publisher"
        );

        loop {
            sleep(self.interval).await;

            let cycle_start = Instant::now();
            match self.publish_due().await {
                Ok(published) => {
                    PUBLISHER_RUNS.with_label_values(&["success"]).inc();
                    if published > 0 {
                        tracing::info!(
                            published,
                            duration_ms = cycle_start.elapsed().as_millis(),
                            "Scheduled posts published"
                        );
                    }
                }
                Err(e) => {
                    PUBLISHER_RUNS.with_label_values(&["error"]).inc();
                    tracing::error!(error = %e, "Scheduled publish cycle failed");
                }
            }
        }
    }

    async fn publish_due(&self) -> Result<usize, sqlx::Error> {
        let mut tx = self.db.begin().await?;
        let published = crate::db::post_repo::publish_due(&mut tx, Utc::now()).await?;
        tx.commit().await?;

        if published.is_empty() {
            return Ok(0);
        }

        let locales: HashSet<&str> = published.iter().map(|p| p.locale.as_str()).collect();
        for locale in locales {
            if let Err(err) = self.cache.invalidate_locale(locale).await {
                tracing::debug!(%locale, "page cache invalidation failed: {}", err);
            }
        }

        Ok(published.len())
    }
}
