//! Basic usage walk-through for slotpool

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use slotpool::{
    AllocError, Allocator, ArrayPool, Config, Pool, Poolable, QueuePool, SlotHandle,
};

struct Connection {
    id: u64,
    target: String,
    slot: SlotHandle<Connection>,
}

impl Poolable for Connection {
    fn slot(&self) -> &SlotHandle<Self> {
        &self.slot
    }
}

struct Connector {
    target: String,
    next_id: AtomicU64,
}

impl Allocator for Connector {
    type Object = Connection;

    fn allocate(&self, slot: SlotHandle<Connection>) -> Result<Connection, AllocError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        println!("   connecting #{id} to {}", self.target);
        Ok(Connection {
            id,
            target: self.target.clone(),
            slot,
        })
    }

    fn deallocate(&self, conn: Connection) -> Result<(), AllocError> {
        println!("   closing #{}", conn.id);
        Ok(())
    }
}

fn connector() -> Connector {
    Connector {
        target: "db:5432".to_string(),
        next_id: AtomicU64::new(0),
    }
}

fn main() {
    println!("=== slotpool: basic usage ===\n");

    claim_and_release();
    bounded_claims();
    graceful_shutdown();
}

fn claim_and_release() {
    println!("1. Claim and release:");
    let pool = ArrayPool::new(
        Config::new()
            .with_allocator(connector())
            .with_size(2)
            .with_ttl(Duration::from_secs(60)),
    )
    .unwrap();

    let conn = pool.claim().unwrap();
    println!("   claimed #{} ({})", conn.id, conn.target);
    conn.release();

    let again = pool.claim().unwrap();
    println!("   claimed again: #{} (reused)\n", again.id);
    again.release();
}

fn bounded_claims() {
    println!("2. Bounded claims:");
    let pool = ArrayPool::new(
        Config::new()
            .with_allocator(connector())
            .with_size(1)
            .with_ttl(Duration::from_secs(60)),
    )
    .unwrap();

    let held = pool.claim().unwrap();
    match pool.claim_for(Duration::from_millis(100)).unwrap() {
        Some(conn) => println!("   unexpectedly got #{}", conn.id),
        None => println!("   claim timed out while #{} was held", held.id),
    }
    held.release();

    let stats = pool.stats();
    println!(
        "   stats: claims={} releases={} timeouts={}\n",
        stats.claims, stats.releases, stats.timeouts
    );
}

fn graceful_shutdown() {
    println!("3. Graceful shutdown (queue variant):");
    let pool = QueuePool::new(
        Config::new()
            .with_allocator(connector())
            .with_size(2)
            .with_ttl(Duration::from_secs(60)),
    )
    .unwrap();

    let conn = pool.claim().unwrap();
    let completion = pool.shutdown();
    println!(
        "   drain finished while #{} still out? {}",
        conn.id,
        completion.wait_for(Duration::from_millis(50))
    );

    conn.release();
    completion.wait();
    println!("   drain complete; every connection closed");
}
