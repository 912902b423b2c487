//! Dispatcher - バックグラウンド実行の管理
//!
//! # 設計原則
//! - `dispatch()` は spawn するだけで即座に戻る（submit を待たせない）
//! - 同じ id の実行は同時に 1 つまで（in-flight 中の再投入は拒否）
//! - 実行中タスクの JoinHandle を保持し、`wait_idle()` / `shutdown()` で待てる
//! - shutdown 後は新規 dispatch を受け付けない（実行中のものはキャンセルしない）

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::app::processor::TaskProcessor;
use crate::domain::ReportId;

/// One reservation per running id. `ticket` tells reservations for the same id apart.
struct Slot {
    ticket: u64,
    /// `None` until `dispatch` stores it, or once a `wait_idle` caller has taken it.
    handle: Option<JoinHandle<()>>,
}

type InFlight = Arc<Mutex<HashMap<ReportId, Slot>>>;

const IDLE_POLL: Duration = Duration::from_millis(10);

pub struct Dispatcher {
    processor: Arc<TaskProcessor>,
    in_flight: InFlight,
    next_ticket: AtomicU64,
    closed: AtomicBool,
}

impl Dispatcher {
    pub fn new(processor: Arc<TaskProcessor>) -> Self {
        Self {
            processor,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Start processing `id` in the background.
    ///
    /// Returns `false` when the id is already running or the dispatcher is shut down.
    pub fn dispatch(&self, id: ReportId) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            warn!(report_id = %id, "dispatcher is shut down; report left pending");
            return false;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.contains_key(&id) {
                warn!(report_id = %id, "report is already being processed");
                return false;
            }
            in_flight.insert(
                id,
                Slot {
                    ticket,
                    handle: None,
                },
            );
        }

        // spawn はロックの外で行う。閉じたランタイムでは future がここで drop され、
        // guard が予約を消す
        let processor = Arc::clone(&self.processor);
        let guard = InFlightGuard {
            id,
            ticket,
            in_flight: Arc::clone(&self.in_flight),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            // 失敗は processor 側でログ済み
            if let Err(e) = processor.process(id).await {
                debug!(report_id = %id, error = %e, "processing ended early");
            }
        });

        // 既に終わっていれば予約は消えている。その場合ハンドルは捨ててよい
        let mut in_flight = lock(&self.in_flight);
        if let Some(slot) = in_flight.get_mut(&id)
            && slot.ticket == ticket
        {
            slot.handle = Some(handle);
        }
        true
    }

    pub fn is_in_flight(&self, id: ReportId) -> bool {
        lock(&self.in_flight).contains_key(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Wait until nothing is running, including work dispatched while waiting.
    pub async fn wait_idle(&self) {
        loop {
            // エントリは残したままハンドルだけ取り出す（完了時に guard が消す）
            let handles: Vec<(ReportId, JoinHandle<()>)> = {
                let mut in_flight = lock(&self.in_flight);
                if in_flight.is_empty() {
                    return;
                }
                in_flight
                    .iter_mut()
                    .filter_map(|(id, slot)| slot.handle.take().map(|h| (*id, h)))
                    .collect()
            };

            if handles.is_empty() {
                // 別の待機者が await 中か、dispatch がハンドルをまだ格納していない
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }
            for (id, handle) in handles {
                if let Err(e) = handle.await {
                    error!(report_id = %id, error = %e, "report task panicked");
                }
            }
        }
    }

    /// Stop accepting work, then wait for everything already running.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wait_idle().await;
    }
}

/// Removes its reservation when the spawned task ends, panics included.
struct InFlightGuard {
    id: ReportId,
    ticket: u64,
    in_flight: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(&self.id).is_some_and(|slot| slot.ticket == self.ticket) {
            in_flight.remove(&self.id);
        }
    }
}

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<ReportId, Slot>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
