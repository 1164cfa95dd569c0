//! Background refresh of every cached city.
//!
//! A `RefreshLoop` owns at most one scheduled task. Each tick runs a pass
//! over the cities cached at that moment, re-fetching weather with the
//! stored coordinates. Failures are logged per city and never stop the pass
//! or the schedule.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::WeatherCache;
use crate::provider::WeatherApi;
use crate::settings::RefreshSettings;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Cities whose snapshot was replaced
    pub refreshed: Vec<String>,
    /// Cities whose fetch failed, with the error text
    pub failed: Vec<(String, String)>,
    /// Cities evicted between enumeration and store
    pub evicted: Vec<String>,
    /// The pass stopped early because the loop was stopped
    pub cancelled: bool,
}

struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct RefreshLoop {
    cache: Arc<WeatherCache>,
    api: Arc<dyn WeatherApi>,
    settings: RefreshSettings,
    runtime: Handle,
    task: Mutex<Option<RunningTask>>,
}

impl RefreshLoop {
    /// Create a stopped loop whose task will run on `runtime`.
    pub fn new(
        cache: Arc<WeatherCache>,
        api: Arc<dyn WeatherApi>,
        settings: RefreshSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            cache,
            api,
            settings,
            runtime,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the schedule. The first pass runs immediately.
    ///
    /// Returns `false` if the loop was already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let handle = self.runtime.spawn(run_schedule(
            self.cache.clone(),
            self.api.clone(),
            self.settings,
            token.clone(),
        ));
        *task = Some(RunningTask { token, handle });

        info!(
            "Weather refresh loop started (every {:?})",
            self.settings.interval
        );
        true
    }

    /// Stop the schedule, giving an in-flight pass the configured grace
    /// period before it is aborted.
    ///
    /// Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let running = self.task.lock().take();
        let Some(RunningTask { token, handle }) = running else {
            return false;
        };

        token.cancel();
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.settings.shutdown_grace, handle).await {
            Ok(Ok(())) => info!("Weather refresh loop stopped"),
            Ok(Err(e)) if e.is_panic() => error!("Weather refresh loop panicked: {}", e),
            Ok(Err(e)) => debug!("Weather refresh loop ended: {}", e),
            Err(_) => {
                warn!(
                    "Refresh pass still running after {:?}, aborting it",
                    self.settings.shutdown_grace
                );
                abort.abort();
            }
        }
        true
    }

    /// Run one pass right now, outside the schedule.
    pub async fn refresh_now(&self) -> RefreshReport {
        refresh_pass(
            &self.cache,
            self.api.as_ref(),
            self.settings.inter_city_delay,
            &CancellationToken::new(),
        )
        .await
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.token.cancel();
            task.handle.abort();
        }
    }
}

async fn run_schedule(
    cache: Arc<WeatherCache>,
    api: Arc<dyn WeatherApi>,
    settings: RefreshSettings,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Each pass runs as its own task so a panic inside it is reported
        // here instead of ending the schedule.
        let pass = tokio::spawn({
            let cache = cache.clone();
            let api = api.clone();
            let token = token.clone();
            async move {
                refresh_pass(&cache, api.as_ref(), settings.inter_city_delay, &token).await
            }
        });

        match pass.await {
            Ok(report) => debug!(
                refreshed = report.refreshed.len(),
                failed = report.failed.len(),
                evicted = report.evicted.len(),
                "Refresh pass finished"
            ),
            Err(e) if e.is_panic() => error!("Refresh pass panicked: {}", e),
            Err(e) => warn!("Refresh pass did not complete: {}", e),
        }
    }

    debug!("Weather refresh schedule exited");
}

async fn refresh_pass(
    cache: &WeatherCache,
    api: &dyn WeatherApi,
    inter_city_delay: Duration,
    token: &CancellationToken,
) -> RefreshReport {
    let cities = cache.list_known_cities();
    let mut report = RefreshReport::default();

    for (index, (city, coordinates)) in cities.iter().enumerate() {
        if index > 0 && !inter_city_delay.is_zero() {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(inter_city_delay) => {}
            }
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                report.cancelled = true;
                break;
            }
            result = api.fetch_current_weather(coordinates) => result,
        };

        match result {
            Ok(snapshot) => {
                if cache.store_weather_only(snapshot, city) {
                    report.refreshed.push(city.clone());
                } else {
                    debug!("{} was evicted during refresh", city);
                    report.evicted.push(city.clone());
                }
            }
            Err(e) => {
                warn!("Failed to refresh weather for {}: {}", city, e);
                report.failed.push((city.clone(), e.to_string()));
            }
        }
    }

    report
}
