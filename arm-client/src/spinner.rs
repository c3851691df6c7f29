use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use arm_interface::JointTrajectoryClient;
use tracing::{debug, warn};

use crate::Error;

const STATE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Joint positions read from the controller at `stamp`
#[derive(Clone, Debug)]
pub struct JointState {
    pub names: Vec<String>,
    pub positions: Vec<f64>,
    pub stamp: Instant,
}

#[derive(Debug, Default)]
struct SharedState {
    latest: Mutex<Option<JointState>>,
    updated: Condvar,
}

/// Latest joint state published by an [`AsyncSpinner`]
#[derive(Clone, Debug, Default)]
pub struct CurrentStateMonitor {
    shared: Arc<SharedState>,
}

impl CurrentStateMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<JointState> {
        self.lock().clone()
    }

    pub fn update(&self, state: JointState) {
        *self.lock() = Some(state);
        self.shared.updated.notify_all();
    }

    /// Waits for a state read at or after `since`.
    ///
    /// Returns `None` on timeout.
    pub fn wait_for_state_since(&self, since: Instant, timeout: Duration) -> Option<JointState> {
        let deadline = Instant::now() + timeout;
        let mut latest = self.lock();
        loop {
            match latest.as_ref() {
                Some(state) if state.stamp >= since => return Some(state.clone()),
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            latest = match self.shared.updated.wait_timeout(latest, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }

    /// Same as [`wait_for_state_since`](Self::wait_for_state_since), but sleeps
    /// on the async runtime between checks instead of blocking the thread.
    pub async fn state_since(&self, since: Instant, timeout: Duration) -> Option<JointState> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.latest() {
                Some(state) if state.stamp >= since => return Some(state),
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(STATE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JointState>> {
        // The state is replaced as a whole, so a poisoned value is still consistent.
        self.shared
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Single background thread which keeps a [`CurrentStateMonitor`] up to date
///
/// [`stop`](Self::stop), or dropping the spinner, joins the thread.
#[derive(Debug)]
pub struct AsyncSpinner {
    monitor: CurrentStateMonitor,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AsyncSpinner {
    /// Starts polling `client` every `period`.
    pub fn start<C>(client: C, period: Duration) -> Result<Self, Error>
    where
        C: JointTrajectoryClient + 'static,
    {
        let monitor = CurrentStateMonitor::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let monitor = monitor.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("arm-spinner".to_owned())
                .spawn(move || spin(&client, &monitor, &shutdown, period))
                .map_err(|e| Error::Other(e.into()))?
        };
        debug!("spinner started (period={period:?})");
        Ok(Self {
            monitor,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn monitor(&self) -> CurrentStateMonitor {
        self.monitor.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("spinner thread panicked");
            }
            debug!("spinner stopped");
        }
    }
}

impl Drop for AsyncSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spin<C>(client: &C, monitor: &CurrentStateMonitor, shutdown: &AtomicBool, period: Duration)
where
    C: JointTrajectoryClient,
{
    let names = client.joint_names();
    while !shutdown.load(Ordering::Relaxed) {
        let stamp = Instant::now();
        match client.current_joint_positions() {
            Ok(positions) => monitor.update(JointState {
                names: names.clone(),
                positions,
                stamp,
            }),
            Err(e) => warn!("failed to read joint positions: {e}"),
        }
        thread::park_timeout(period);
    }
}
