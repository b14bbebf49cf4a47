//! One-time initialization of the index engine

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;

use docrag_core::{IndexEngine, Result};

type InitFuture = Shared<BoxFuture<'static, Result<Arc<dyn IndexEngine>>>>;

#[derive(Default)]
struct Slot {
    engine: Option<Arc<dyn IndexEngine>>,
    pending: Option<(u64, InitFuture)>,
    generation: u64,
}

/// Runs engine construction at most once at a time.
///
/// Callers arriving while an attempt is in flight await the same attempt and
/// see the same result. A failed attempt clears the slot so a later caller
/// starts a fresh one; a successful attempt is kept for good.
#[derive(Default)]
pub(crate) struct InitGuard {
    slot: Mutex<Slot>,
}

impl InitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_init<F>(&self, start: F) -> Result<Arc<dyn IndexEngine>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Arc<dyn IndexEngine>>>,
    {
        let (generation, attempt) = {
            let mut slot = self.slot.lock().await;
            if let Some(engine) = &slot.engine {
                return Ok(Arc::clone(engine));
            }
            let next = slot.generation + 1;
            let (generation, attempt) = slot
                .pending
                .get_or_insert_with(|| (next, start().shared()))
                .clone();
            slot.generation = generation;
            (generation, attempt)
        };

        let result = attempt.await;

        let mut slot = self.slot.lock().await;
        if slot.pending.as_ref().is_some_and(|(g, _)| *g == generation) {
            slot.pending = None;
            if let Ok(engine) = &result {
                slot.engine = Some(Arc::clone(engine));
            }
        }
        result
    }
}
