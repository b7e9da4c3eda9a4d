use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::PgPool;

use crate::error::ServiceResult;
use crate::pg::{block_on, map_sqlx_error};

/// Source of human-readable, unique order numbers for transfer requests.
pub trait OrderNumberGenerator: Send + Sync {
    fn next_order_number(&self) -> ServiceResult<String>;
}

fn format_order_number(prefix: &str, n: u64) -> String {
    format!("{prefix}-{n:06}")
}

impl<G> OrderNumberGenerator for Arc<G>
where
    G: OrderNumberGenerator + ?Sized,
{
    fn next_order_number(&self) -> ServiceResult<String> {
        (**self).next_order_number()
    }
}

/// `{prefix}-{n:06}` from a process-wide counter.
#[derive(Debug)]
pub struct SequentialOrderNumbers {
    prefix: String,
    next: AtomicU64,
}

impl SequentialOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(first),
        }
    }
}

impl OrderNumberGenerator for SequentialOrderNumbers {
    fn next_order_number(&self) -> ServiceResult<String> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(format_order_number(&self.prefix, n))
    }
}

/// `{prefix}-{n:06}` drawn from the `transfer_request_order_seq` sequence,
/// so numbering survives restarts and is shared by every process on the database.
#[derive(Debug, Clone)]
pub struct PostgresOrderNumbers {
    prefix: String,
    pool: PgPool,
}

impl PostgresOrderNumbers {
    pub fn new(prefix: impl Into<String>, pool: PgPool) -> Self {
        Self {
            prefix: prefix.into(),
            pool,
        }
    }
}

impl OrderNumberGenerator for PostgresOrderNumbers {
    fn next_order_number(&self) -> ServiceResult<String> {
        let n: i64 = block_on(
            sqlx::query_scalar("SELECT nextval('transfer_request_order_seq')").fetch_one(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("next_order_number", e))?;
        Ok(format_order_number(&self.prefix, n.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn numbers_are_padded_and_sequential() {
        let orders = SequentialOrderNumbers::new("TR");
        assert_eq!(orders.next_order_number().unwrap(), "TR-000001");
        assert_eq!(orders.next_order_number().unwrap(), "TR-000002");
    }

    #[test]
    fn concurrent_callers_never_share_a_number() {
        let orders = Arc::new(SequentialOrderNumbers::starting_at("QM", 500));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orders = Arc::clone(&orders);
                thread::spawn(move || (0..50).map(|_| orders.next_order_number().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let all: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 400);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn database_sequence_keeps_counting_across_generators() {
        let Ok(url) = std::env::var("QM_TEST_DATABASE_URL") else { return };
        let pool = crate::pg::connect(&url).await.expect("test database");

        let first = PostgresOrderNumbers::new("TR", pool.clone()).next_order_number().unwrap();
        let after_restart = PostgresOrderNumbers::new("TR", pool).next_order_number().unwrap();

        let n = |s: &str| s.trim_start_matches("TR-").parse::<u64>().unwrap();
        assert!(n(&after_restart) > n(&first));
    }
}
