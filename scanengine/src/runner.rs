/*!
Timer-driven scan runner.

The hardware design services one point per timer interrupt; here a
dedicated tick thread fires [`ScanEngine::tick`] on an absolute-deadline
schedule instead, sharing the engine with the foreground control loop
through a mutex with short critical sections. The foreground loop advances
the animation by filing next-frame requests into the engine's mailbox.
*/

use crate::engine::{EngineState, ScanEngine};
use crate::output::DacBus;
use shared::point::FrameTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How far the schedule may slip before it resynchronizes instead of
/// bursting to catch up
const MAX_SCHEDULE_SLIP: Duration = Duration::from_millis(50);

/// Poll granularity of the foreground control loop
const CONTROL_POLL: Duration = Duration::from_millis(20);

/// Owns the engine on behalf of the tick thread and the control side
pub struct ScanRunner {
    engine: Arc<Mutex<ScanEngine>>,
    running: Arc<AtomicBool>,
}

impl ScanRunner {
    /// Create a runner around a configured engine
    pub fn new(engine: ScanEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a handle to the engine for control calls
    pub fn control(&self) -> Arc<Mutex<ScanEngine>> {
        Arc::clone(&self.engine)
    }

    /// Get the running flag for external shutdown (signal handlers)
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Spawn the tick thread. It fires at the engine's scan rate while the
    /// running flag stays set, emitting periodic statistics.
    pub fn spawn_tick_thread(
        &self,
        mut bus: Box<dyn DacBus>,
        stats_interval: Duration,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);

        thread::spawn(move || {
            info!("⏱️ tick thread started");
            let mut next_tick = Instant::now();
            let mut last_stats = Instant::now();

            while running.load(Ordering::SeqCst) {
                let period = {
                    let mut engine = engine.lock().expect("engine mutex poisoned");
                    if engine.state() == EngineState::Running {
                        engine.tick(bus.as_mut());
                    }
                    engine.tick_period()
                };

                if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
                    last_stats = Instant::now();
                    let stats = engine.lock().expect("engine mutex poisoned").stats();
                    info!(
                        "📊 {} ticks, {} frames scanned, {} points clipped, {} swaps",
                        stats.ticks, stats.frames_scanned, stats.points_clipped, stats.frame_swaps
                    );
                }

                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else if now.duration_since(next_tick) > MAX_SCHEDULE_SLIP {
                    // Fell badly behind (stalled sink, debugger): resync
                    // rather than burst
                    next_tick = now;
                }
            }

            info!("tick thread stopped");
        })
    }

    /// Foreground control loop: advances the animation at the configured
    /// frame interval until the running flag clears. With a single frame
    /// (or no table) it simply idles until shutdown.
    pub fn run_animation(&self, table: Option<&FrameTable>, frame_interval: Duration) {
        let mut index = 0usize;
        let mut next_advance = Instant::now() + frame_interval;
        let mut deferred = 0u64;

        while self.running.load(Ordering::SeqCst) {
            thread::sleep(CONTROL_POLL);

            let Some(table) = table else { continue };
            if table.frame_count() < 2 || Instant::now() < next_advance {
                continue;
            }
            next_advance += frame_interval;

            let next_index = (index + 1) % table.frame_count();
            let frame = table.frame(next_index).expect("frame index in range");

            match self
                .engine
                .lock()
                .expect("engine mutex poisoned")
                .set_current_frame(frame)
            {
                Ok(()) => {
                    index = next_index;
                }
                Err(e) => {
                    // Mailbox still dirty: retry the same frame next round
                    deferred += 1;
                    debug!("frame advance deferred: {}", e);
                }
            }
        }

        if deferred > 0 {
            debug!("{} frame advances deferred by a busy mailbox", deferred);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MAX_SCAN_RATE_PPS;
    use crate::output::{DmaSerialBus, PacketEncoding};
    use shared::point::{Frame, Point};

    #[test]
    fn test_runner_ticks_and_shuts_down() {
        let frame = Frame::new(vec![
            Point::lit(0, 0, 0, 255, 255, 255),
            Point::lit(50, 50, 0, 255, 255, 255),
        ])
        .unwrap();

        let (bus, writer_handle) =
            DmaSerialBus::spawn(Box::new(std::io::sink()), 1024, PacketEncoding::Raw);
        let mut bus: Box<dyn DacBus> = Box::new(bus);

        let mut engine = ScanEngine::new();
        engine.set_scan_rate(MAX_SCAN_RATE_PPS);
        engine.set_current_frame(Arc::new(frame)).unwrap();
        engine.enable(bus.as_mut());

        let runner = ScanRunner::new(engine);
        let handle = runner.spawn_tick_thread(bus, Duration::ZERO);

        thread::sleep(Duration::from_millis(100));
        runner.running_flag().store(false, Ordering::SeqCst);
        handle.join().unwrap();
        writer_handle.join().unwrap().unwrap();

        let stats = runner.control().lock().unwrap().stats();
        assert!(stats.ticks > 0);
        assert!(stats.frames_scanned > 0);
    }
}
