//! Simulated application bootstrap that overlaps warm-up with wiring.
//!
//! Run with `RUST_LOG=preinit=trace` to see the swallowed failure.

use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use preinit::lifecycle::{self, LifecycleEvent, LifecycleListener};
use preinit::{InitializerSet, PreinitCoordinator, initializer};
use tracing_subscriber::EnvFilter;

static MIME_TABLE: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    thread::sleep(Duration::from_millis(200));
    vec![("json", "application/json"), ("html", "text/html")]
});

struct Wiring;

impl LifecycleListener for Wiring {
    fn on_event(&self, event: &LifecycleEvent) {
        if *event == LifecycleEvent::Started {
            tracing::info!("wiring components");
            thread::sleep(Duration::from_millis(150));
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let coordinator = PreinitCoordinator::builder()
        .from_env()
        .initializers(|| {
            InitializerSet::new()
                .with(initializer::force("mime-table", &MIME_TABLE))
                .with(initializer::from_fn("validator", || Err("no provider on classpath".into())))
        })
        .build();

    let listeners: [&dyn LifecycleListener; 2] = [&Wiring, &coordinator];
    let start = Instant::now();

    lifecycle::dispatch(&listeners, LifecycleEvent::Started);
    lifecycle::dispatch(&listeners, LifecycleEvent::ContextRefreshed);

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        entries = MIME_TABLE.len(),
        "ready"
    );
}
