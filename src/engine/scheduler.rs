use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Host frame clock: decides when (and whether) the next tick runs.
pub trait FrameClock {
    /// Blocks until the next tick is due. Returns `false` once no more ticks will be scheduled.
    fn next_tick(&mut self) -> bool;
}

/// Yields a fixed number of ticks back to back. Used for file rendering.
#[derive(Clone, Debug)]
pub struct OfflineClock {
    remaining: u64,
}

impl OfflineClock {
    pub fn new(ticks: u64) -> Self {
        Self { remaining: ticks }
    }
}

impl FrameClock for OfflineClock {
    fn next_tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Paces ticks at a fixed interval on the calling thread.
pub struct RealtimeClock {
    interval: Duration,
    next_deadline: Option<Instant>,
    budget: Option<u64>,
    stop: Arc<AtomicBool>,
}

impl RealtimeClock {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_deadline: None,
            budget: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop after `ticks` ticks
    pub fn with_budget(mut self, ticks: u64) -> Self {
        self.budget = Some(ticks);
        self
    }

    /// Flag that ends the loop before the next tick when raised
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

impl FrameClock for RealtimeClock {
    fn next_tick(&mut self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return false;
        }
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return false;
            }
            *budget -= 1;
        }

        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        // a late tick does not try to catch up
        self.next_deadline = Some(deadline.max(now) + self.interval);
        true
    }
}

/// Invokes `tick` once per clock tick with a strictly increasing counter.
/// Returns the number of ticks run.
pub fn run_ticks<C, F, E>(clock: &mut C, mut tick: F) -> Result<u64, E>
where
    C: FrameClock + ?Sized,
    F: FnMut(u64) -> Result<ControlFlow<()>, E>,
{
    let mut count = 0u64;
    while clock.next_tick() {
        let flow = tick(count)?;
        count += 1;
        if flow.is_break() {
            break;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_clock_runs_exact_tick_count() {
        let mut seen = Vec::new();
        let ran = run_ticks(&mut OfflineClock::new(4), |t| {
            seen.push(t);
            Ok::<_, ()>(ControlFlow::Continue(()))
        })
        .unwrap();
        assert_eq!(ran, 4);
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tick_can_stop_the_loop() {
        let ran = run_ticks(&mut OfflineClock::new(100), |t| {
            Ok::<_, ()>(if t == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
        assert_eq!(ran, 3);
    }

    #[test]
    fn tick_errors_propagate() {
        let result = run_ticks(&mut OfflineClock::new(10), |t| {
            if t == 1 {
                Err("boom")
            } else {
                Ok(ControlFlow::Continue(()))
            }
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn realtime_clock_respects_budget_and_stop_flag() {
        let mut clock = RealtimeClock::new(1000).with_budget(3);
        let ran = run_ticks(&mut clock, |_| Ok::<_, ()>(ControlFlow::Continue(()))).unwrap();
        assert_eq!(ran, 3);

        let mut clock = RealtimeClock::new(1000);
        let stop = clock.stop_handle();
        let ran = run_ticks(&mut clock, |t| {
            if t == 1 {
                stop.store(true, Ordering::Relaxed);
            }
            Ok::<_, ()>(ControlFlow::Continue(()))
        })
        .unwrap();
        assert_eq!(ran, 2);
    }

    #[test]
    fn realtime_clock_paces_ticks() {
        let mut clock = RealtimeClock::new(200).with_budget(5);
        let start = Instant::now();
        run_ticks(&mut clock, |_| Ok::<_, ()>(ControlFlow::Continue(()))).unwrap();
        // first tick is immediate, four intervals of 5ms follow
        assert!(start.elapsed() >= Duration::from_millis(19));
    }
}
