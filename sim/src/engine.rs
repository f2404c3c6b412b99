//! Fixed-rate driver around [`GameWorld`].
//!
//! The engine ticks the world on a tokio interval at the configured rate and
//! hands every tick's snapshot to the registered subscribers. Intents may be
//! scheduled from any thread at any time; they are applied on the next tick.

use crate::api::{GameWorld, WorldMeta};
use crate::config::WorldConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventScheduler, GameEvent};
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type Subscriber = Box<dyn FnMut(&Snapshot) + Send>;

struct RunningLoop {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Engine {
    world: Arc<Mutex<GameWorld>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    scheduler: Option<EventScheduler>,
    meta: WorldMeta,
    period: Duration,
    running: Option<RunningLoop>,
}

impl Engine {
    /// Build and populate a world from `config`.
    pub fn new(config: WorldConfig) -> Result<Self> {
        let period = config.tick_budget();
        let world = GameWorld::new(config)?;
        Ok(Self::from_world(world, period))
    }

    /// Drive an already constructed world every `period`.
    pub fn from_world(world: GameWorld, period: Duration) -> Self {
        Self {
            scheduler: world.scheduler(),
            meta: world.meta(),
            world: Arc::new(Mutex::new(world)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            period,
            running: None,
        }
    }

    /// Begin ticking. Calling this while already running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            debug!("engine already running");
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let (shutdown, stop) = oneshot::channel();
        let task = handle.spawn(run_loop(
            Arc::clone(&self.world),
            Arc::clone(&self.subscribers),
            self.period,
            stop,
        ));
        self.running = Some(RunningLoop { shutdown, task });
        info!(period_ms = self.period.as_secs_f64() * 1000.0, "engine started");
        Ok(())
    }

    /// Stop ticking and wait for the loop to exit. No-op when stopped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            warn!(error = %e, "tick loop ended abnormally");
        }

        #[cfg(feature = "profile")]
        self.world.lock().profiler().log_summary();

        info!(ticks = self.world.lock().current_tick(), "engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn meta(&self) -> WorldMeta {
        self.meta
    }

    /// Queue an intent for the next tick. Returns `false` if it was dropped.
    pub fn schedule(&self, event: GameEvent) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.schedule(event))
    }

    pub fn scheduler(&self) -> Option<EventScheduler> {
        self.scheduler.clone()
    }

    /// Register a callback invoked with every tick's snapshot.
    ///
    /// Callbacks run on the tick task once the tick has finished and the world
    /// is unlocked.
    pub fn on_update<F>(&self, callback: F)
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.subscribers.lock().push(Box::new(callback));
    }

    /// Shared handle to the world, for inspection between ticks.
    pub fn world(&self) -> Arc<Mutex<GameWorld>> {
        Arc::clone(&self.world)
    }
}

async fn run_loop(
    world: Arc<Mutex<GameWorld>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.saturating_duration_since(last);
                last = now;
                run_tick(&world, &subscribers, dt);
            }
        }
    }
}

/// Subscribers are notified after the world lock is released, and from a list
/// detached from the engine, so a callback may lock the world or register more
/// callbacks. Those registered during a notification run from the next tick on.
fn run_tick(world: &Mutex<GameWorld>, subscribers: &Mutex<Vec<Subscriber>>, dt: Duration) {
    let snapshot = world.lock().tick(dt.as_secs_f32() * 1000.0).clone();

    let mut active = std::mem::take(&mut *subscribers.lock());
    for subscriber in active.iter_mut() {
        subscriber(&snapshot);
    }
    let mut registered = subscribers.lock();
    active.append(&mut registered);
    *registered = active;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn flat_engine() -> Engine {
        let config = WorldConfig::default();
        let period = config.tick_budget();
        Engine::from_world(GameWorld::with_context(flat_context(config)), period)
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let mut engine = flat_engine();
        assert!(matches!(engine.start(), Err(EngineError::NoRuntime)));
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_and_notifies_subscribers() {
        let mut engine = flat_engine();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        engine.on_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.start().unwrap();
        assert!(engine.is_running());
        tokio::time::sleep(Duration::from_millis(210)).await;
        engine.stop().await;

        let notified = seen.load(Ordering::SeqCst);
        assert!(notified >= 3, "only {notified} ticks");
        assert_eq!(engine.world().lock().current_tick() as usize, notified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticking() {
        let mut engine = flat_engine();
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop().await;
        assert!(!engine.is_running());

        let ticks = engine.world().lock().current_tick();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.world().lock().current_tick(), ticks);

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut engine = flat_engine();
        engine.start().unwrap();
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.stop().await;
        // One loop at 15 Hz: ticks at 0, 66 and 133 ms.
        assert_eq!(engine.world().lock().current_tick(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_join_reaches_snapshot() {
        let mut engine = flat_engine();
        let views = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&views);
        engine.on_update(move |snapshot| {
            sink.lock().push(snapshot.field_of_view.len());
        });

        assert!(engine.schedule(GameEvent::joined("p1")));
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stop().await;

        assert_eq!(views.lock().first(), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_may_lock_world_and_register() {
        let mut engine = flat_engine();
        let world = engine.world();
        let ticks_seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks_seen);
        let late = Arc::new(AtomicUsize::new(0));
        let late_counter = Arc::clone(&late);
        let nested = Arc::clone(&engine.subscribers);
        engine.on_update(move |_| {
            sink.lock().push(world.lock().current_tick());
            if sink.lock().len() == 1 {
                let counter = Arc::clone(&late_counter);
                nested.lock().push(Box::new(move |_: &Snapshot| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        });

        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.stop().await;

        assert_eq!(*ticks_seen.lock(), vec![1, 2, 3]);
        assert_eq!(late.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dt_follows_elapsed_time() {
        let mut engine = flat_engine();
        engine.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.stop().await;

        let world = engine.world();
        let world = world.lock();
        // Ticks at 0, ~67 and ~133 ms: the first one measures nothing.
        assert_eq!(world.current_tick(), 3);
        assert!((world.current_time_ms() - 133.3).abs() < 2.0, "{}", world.current_time_ms());
    }
}
