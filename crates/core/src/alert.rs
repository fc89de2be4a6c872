use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Output device for the alert tone.
pub trait TonePlayer: Send + Sync {
    fn play(&self);
}

/// Rings the terminal bell on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl TonePlayer for TerminalBell {
    fn play(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

/// Repeating tone for one employee, audible while requests await their approval.
pub struct EmployeeAlert {
    employee: String,
    player: Arc<dyn TonePlayer>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EmployeeAlert {
    pub fn new(
        employee: impl Into<String>,
        player: Arc<dyn TonePlayer>,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self { employee: employee.into(), player, interval, task: Mutex::new(None) }
    }

    pub fn employee(&self) -> &str {
        &self.employee
    }

    pub fn is_active(&self) -> bool {
        self.lock_task().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts the tone loop. Returns `false` when it was already running.
    pub fn start(&self) -> bool {
        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|running| !running.is_finished()) {
            return false;
        }

        let player = Arc::clone(&self.player);
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                player.play();
            }
        }));

        info!(
            event_name = "alert.employee.started",
            employee = %self.employee,
            interval_ms = self.interval.as_millis() as u64,
            "employee approval alert started"
        );
        true
    }

    /// Stops the tone loop. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let Some(task) = self.lock_task().take() else {
            return false;
        };
        task.abort();

        info!(
            event_name = "alert.employee.stopped",
            employee = %self.employee,
            "employee approval alert stopped"
        );
        true
    }

    /// Applies the invocation rule: pending work keeps the tone on, an empty queue silences it.
    pub fn sync(&self, pending_count: usize) {
        debug!(
            event_name = "alert.employee.sync",
            employee = %self.employee,
            pending_count,
            "syncing employee alert with queue"
        );
        if pending_count > 0 {
            self.start();
        } else {
            self.stop();
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for EmployeeAlert {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

/// One alert per employee, shared by the lifecycle engine and the employee desks.
pub struct AlertRegistry {
    player: Arc<dyn TonePlayer>,
    interval: Duration,
    alerts: Mutex<HashMap<String, Arc<EmployeeAlert>>>,
}

impl AlertRegistry {
    pub fn new(player: Arc<dyn TonePlayer>, interval: Duration) -> Self {
        Self { player, interval, alerts: Mutex::new(HashMap::new()) }
    }

    pub fn for_employee(&self, employee: &str) -> Arc<EmployeeAlert> {
        let mut alerts = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        alerts
            .entry(employee.to_string())
            .or_insert_with(|| {
                Arc::new(EmployeeAlert::new(employee, Arc::clone(&self.player), self.interval))
            })
            .clone()
    }

    pub fn is_active(&self, employee: &str) -> bool {
        self.existing(employee).is_some_and(|alert| alert.is_active())
    }

    pub fn stop(&self, employee: &str) -> bool {
        self.existing(employee).is_some_and(|alert| alert.stop())
    }

    pub fn sync(&self, employee: &str, pending_count: usize) {
        self.for_employee(employee).sync(pending_count);
    }

    fn existing(&self, employee: &str) -> Option<Arc<EmployeeAlert>> {
        let alerts = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        alerts.get(employee).cloned()
    }
}

/// Counts plays instead of making noise.
#[derive(Clone, Default)]
pub struct RecordingTonePlayer {
    plays: Arc<std::sync::atomic::AtomicUsize>,
}

impl RecordingTonePlayer {
    pub fn plays(&self) -> usize {
        self.plays.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl TonePlayer for RecordingTonePlayer {
    fn play(&self) {
        self.plays.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{AlertRegistry, EmployeeAlert, RecordingTonePlayer};

    fn alert(player: &RecordingTonePlayer) -> EmployeeAlert {
        EmployeeAlert::new("emp1", Arc::new(player.clone()), Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn tone_repeats_until_stopped() {
        let player = RecordingTonePlayer::default();
        let alert = alert(&player);

        assert!(alert.start());
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(player.plays(), 3, "ticks at 0s, 2s and 4s");

        assert!(alert.stop());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(player.plays(), 3);
        assert!(!alert.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let player = RecordingTonePlayer::default();
        let alert = alert(&player);

        assert!(alert.start());
        assert!(!alert.start());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(player.plays(), 1, "a second start must not double the tone");
        assert!(alert.is_active());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let player = RecordingTonePlayer::default();
        assert!(!alert(&player).stop());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_follows_pending_count() {
        let player = RecordingTonePlayer::default();
        let alert = alert(&player);

        alert.sync(2);
        assert!(alert.is_active());
        alert.sync(1);
        assert!(alert.is_active());
        alert.sync(0);
        assert!(!alert.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn registry_hands_out_one_alert_per_employee() {
        let registry =
            AlertRegistry::new(Arc::new(RecordingTonePlayer::default()), Duration::from_secs(1));

        registry.sync("emp1", 1);
        assert!(registry.is_active("emp1"));
        assert!(!registry.is_active("emp2"));
        assert!(Arc::ptr_eq(&registry.for_employee("emp1"), &registry.for_employee("emp1")));

        assert!(registry.stop("emp1"));
        assert!(!registry.is_active("emp1"));
        assert!(!registry.stop("emp2"));
    }
}
