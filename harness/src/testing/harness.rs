//! Test lifecycle orchestrator
//!
//! A [`Harness`] ties one scheduler under test to the callback endpoint it
//! reports into. Tests build workload proxies through it, steer their health
//! through its registry, wait on the events the scheduler sends back, and
//! call [`Harness::clean_up`] between tests to return the cluster to a known
//! empty state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use shared::WorkloadId;
use tokio::sync::OnceCell;

use crate::api::{AgentResources, AppDefinition, ClusterApi, HealthCheckDefinition, SchedulerApi, TaskSummary};
use crate::config::HarnessSettings;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{
    CallbackEndpoint, CallbackEvent, DEFINITION_PORT, Deadline, EventQueue, HealthCheckRegistry, HealthProbe,
    ProxyReaper, WaitEngine,
};
use crate::testing::workloads;

pub const DEPLOYMENT_SUCCESS: &str = "deployment_success";
pub const STATUS_UPDATE: &str = "status_update_event";

pub struct Harness {
    settings: HarnessSettings,
    api: Arc<dyn SchedulerApi>,
    cluster: Arc<dyn ClusterApi>,
    events: EventQueue,
    health: HealthCheckRegistry,
    waiter: WaitEngine,
    endpoint: OnceCell<CallbackEndpoint>,
    proxy_markers: Mutex<Vec<String>>,
    reaper: ProxyReaper,
}

impl Harness {
    pub fn new(api: Arc<dyn SchedulerApi>, cluster: Arc<dyn ClusterApi>, settings: HarnessSettings) -> Self {
        Self {
            settings,
            api,
            cluster,
            events: EventQueue::new(),
            health: HealthCheckRegistry::new(),
            waiter: WaitEngine::new(),
            endpoint: OnceCell::new(),
            proxy_markers: Mutex::new(Vec::new()),
            reaper: ProxyReaper::new(),
        }
    }

    pub fn with_wait_engine(mut self, waiter: WaitEngine) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub fn api(&self) -> &Arc<dyn SchedulerApi> {
        &self.api
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn health(&self) -> &HealthCheckRegistry {
        &self.health
    }

    /// The callback endpoint, bound and subscribed on first use
    ///
    /// Concurrent first callers share one bind. If subscribing fails the
    /// endpoint is dropped and the next call tries again.
    pub async fn callback_endpoint(&self) -> HarnessResult<&CallbackEndpoint> {
        self.endpoint
            .get_or_try_init(|| async {
                let endpoint = CallbackEndpoint::bind(self.events.clone(), self.health.clone()).await?;
                self.api.subscribe(&endpoint.url()).await?;
                tracing::info!("📡 Callback endpoint {} subscribed to scheduler events", endpoint.url());
                Ok::<_, HarnessError>(endpoint)
            })
            .await
    }

    /// Unsubscribe and stop the callback endpoint, if one was ever bound
    pub async fn teardown(&mut self) {
        let Some(endpoint) = self.endpoint.take() else {
            return;
        };
        if let Err(e) = self.api.unsubscribe(&endpoint.url()).await {
            tracing::warn!("⚠️ Failed to unsubscribe {}: {}", endpoint.url(), e);
        }
        endpoint.shutdown().await;
    }

    /// Fail if the callback endpoint has seen traffic outside its contract
    pub fn assert_protocol_clean(&self) -> HarnessResult<()> {
        self.endpoint
            .get()
            .map_or(Ok(()), CallbackEndpoint::take_protocol_violation)
    }

    // Workload proxies

    /// App definition that runs `instances` workload proxies
    ///
    /// Binds the callback endpoint if needed, since the proxies' health URL
    /// points at it.
    pub async fn app_proxy(
        &self,
        app_id: &WorkloadId,
        version: &str,
        instances: u32,
        health_check: Option<HealthCheckDefinition>,
    ) -> HarnessResult<AppDefinition> {
        let endpoint = self.callback_endpoint().await?;
        let health_url = workloads::health_url(&self.settings.callback_host, endpoint.port(), app_id, version);
        let marker = workloads::new_marker();
        let command = workloads::proxy_command(&self.settings.app_mock, app_id, version, &health_url, &marker);

        self.lock_markers().push(marker.clone());
        tracing::debug!("🧩 Built app proxy {} ({} instances, marker {})", app_id, instances, marker);

        Ok(workloads::proxy_definition(app_id, command, instances, &marker, health_check))
    }

    pub fn app_proxy_health_check(&self) -> HealthCheckDefinition {
        workloads::app_proxy_health_check()
    }

    /// Health answer for every instance of `app_id`@`version`
    pub fn register_app_proxy_health_check(
        &self,
        app_id: &WorkloadId,
        version: &str,
        healthy: bool,
    ) -> Arc<HealthProbe> {
        self.health.register(app_id.clone(), version, DEFINITION_PORT, healthy)
    }

    /// Health answer for the single instance listening on `port`
    pub fn register_instance_health_check(
        &self,
        app_id: &WorkloadId,
        version: &str,
        port: u16,
        healthy: bool,
    ) -> Arc<HealthProbe> {
        self.health.register(app_id.clone(), version, port, healthy)
    }

    /// SIGKILL every proxy built by this harness that is still alive
    pub fn kill_app_proxies(&self) -> HarnessResult<usize> {
        let markers = std::mem::take(&mut *self.lock_markers());
        if markers.is_empty() {
            return Ok(0);
        }
        self.reaper.reap(&markers)
    }

    // Waits

    pub async fn wait_for_event(&self, kind: &str) -> HarnessResult<CallbackEvent> {
        self.wait_for_event_within(kind, self.settings.patience).await
    }

    pub async fn wait_for_event_within(&self, kind: &str, timeout: Duration) -> HarnessResult<CallbackEvent> {
        self.wait_for_event_with_within(kind, timeout, |_: &CallbackEvent| true)
            .await
    }

    pub async fn wait_for_event_with<P>(&self, kind: &str, predicate: P) -> HarnessResult<CallbackEvent>
    where
        P: FnMut(&CallbackEvent) -> bool,
    {
        self.wait_for_event_with_within(kind, self.settings.patience, predicate)
            .await
    }

    /// Next event of type `kind` that also satisfies `predicate`
    pub async fn wait_for_event_with_within<P>(
        &self,
        kind: &str,
        timeout: Duration,
        mut predicate: P,
    ) -> HarnessResult<CallbackEvent>
    where
        P: FnMut(&CallbackEvent) -> bool,
    {
        let description = format!("event '{kind}'");
        self.wait_for_event_matching_within(&description, timeout, move |event: &CallbackEvent| {
            event.event_type() == kind && predicate(event)
        })
        .await
    }

    pub async fn wait_for_event_matching<P>(&self, description: &str, predicate: P) -> HarnessResult<CallbackEvent>
    where
        P: FnMut(&CallbackEvent) -> bool,
    {
        self.wait_for_event_matching_within(description, self.settings.patience, predicate)
            .await
    }

    /// Drain the queue until `predicate` matches
    ///
    /// Events ahead of the match are discarded, including ones that arrive
    /// while waiting.
    pub async fn wait_for_event_matching_within<P>(
        &self,
        description: &str,
        timeout: Duration,
        mut predicate: P,
    ) -> HarnessResult<CallbackEvent>
    where
        P: FnMut(&CallbackEvent) -> bool,
    {
        self.waiter
            .wait_for(description, timeout, || self.events.drain_matching(&mut predicate))
            .await
    }

    pub async fn wait_for_events(&self, kinds: &[&str]) -> HarnessResult<HashMap<String, Vec<CallbackEvent>>> {
        self.wait_for_events_within(kinds, self.settings.patience).await
    }

    /// Wait for one occurrence per entry of `kinds`, in any order
    ///
    /// Repeated kinds need that many events. The result groups the matched
    /// events by type in arrival order. Events of kinds that are no longer
    /// outstanding are discarded.
    pub async fn wait_for_events_within(
        &self,
        kinds: &[&str],
        timeout: Duration,
    ) -> HarnessResult<HashMap<String, Vec<CallbackEvent>>> {
        let mut outstanding: Vec<String> = kinds.iter().map(|kind| kind.to_string()).collect();
        let mut found: HashMap<String, Vec<CallbackEvent>> = HashMap::new();
        let description = format!("events {kinds:?}");

        self.waiter
            .wait_for(&description, timeout, || {
                while !outstanding.is_empty() {
                    let Some(event) = self
                        .events
                        .drain_matching(|event: &CallbackEvent| outstanding.iter().any(|kind| kind == event.event_type()))
                    else {
                        break;
                    };
                    if let Some(index) = outstanding.iter().position(|kind| kind == event.event_type()) {
                        outstanding.swap_remove(index);
                    }
                    found.entry(event.event_type().to_string()).or_default().push(event);
                }
                outstanding.is_empty().then(|| std::mem::take(&mut found))
            })
            .await
    }

    pub async fn wait_for_deployment(&self, deployment_id: &str) -> HarnessResult<CallbackEvent> {
        self.wait_for_deployment_within(deployment_id, self.settings.patience)
            .await
    }

    pub async fn wait_for_deployment_within(&self, deployment_id: &str, timeout: Duration) -> HarnessResult<CallbackEvent> {
        self.wait_for_event_with_within(DEPLOYMENT_SUCCESS, timeout, |event: &CallbackEvent| {
            event.str_field("id") == Some(deployment_id)
        })
        .await
    }

    pub async fn wait_for_status_updates(&self, statuses: &[&str]) -> HarnessResult<Vec<CallbackEvent>> {
        self.wait_for_status_updates_within(statuses, self.settings.patience)
            .await
    }

    /// One status update per entry of `statuses`, in that order
    pub async fn wait_for_status_updates_within(
        &self,
        statuses: &[&str],
        timeout: Duration,
    ) -> HarnessResult<Vec<CallbackEvent>> {
        let deadline = Deadline::after(timeout);
        let mut updates = Vec::with_capacity(statuses.len());

        for status in statuses {
            let update = self
                .wait_for_event_with_within(STATUS_UPDATE, deadline.remaining(), |event: &CallbackEvent| {
                    event.str_field("taskStatus") == Some(*status)
                })
                .await?;
            updates.push(update);
        }
        Ok(updates)
    }

    pub async fn wait_for_tasks(&self, app_id: &WorkloadId, count: usize) -> HarnessResult<Vec<TaskSummary>> {
        self.wait_for_tasks_within(app_id, count, self.settings.patience)
            .await
    }

    /// Wait until exactly `count` tasks of `app_id` are launched
    pub async fn wait_for_tasks_within(
        &self,
        app_id: &WorkloadId,
        count: usize,
        timeout: Duration,
    ) -> HarnessResult<Vec<TaskSummary>> {
        let description = format!("{count} launched tasks of {app_id}");
        let api = &self.api;

        self.waiter
            .wait_for_async(&description, timeout, || async move {
                match api.list_tasks(app_id).await {
                    Ok(tasks) => {
                        let launched: Vec<TaskSummary> = tasks.into_iter().filter(TaskSummary::is_launched).collect();
                        (launched.len() == count).then_some(launched)
                    }
                    Err(e) => {
                        tracing::debug!("⏳ Listing tasks of {} failed: {}", app_id, e);
                        None
                    }
                }
            })
            .await
    }

    pub async fn wait_for_health_check(&self, probe: &HealthProbe) -> HarnessResult<()> {
        self.wait_for_health_check_within(probe, self.settings.patience)
            .await
    }

    /// Wait until a workload proxy has asked for `probe`'s answer
    pub async fn wait_for_health_check_within(&self, probe: &HealthProbe, timeout: Duration) -> HarnessResult<()> {
        let description = format!(
            "health check {}@{}:{} pinged",
            probe.workload_id(),
            probe.version_id(),
            probe.port()
        );
        self.waiter
            .wait_until(&description, timeout, || probe.pinged())
            .await
    }

    // Clean up

    /// Return the cluster to an empty state between tests
    ///
    /// The callback endpoint is bound first so the deletion can be observed.
    /// Everything under the base namespace is force-deleted and the cluster
    /// must release its resources, both within one patience timeout. Local state
    /// is reset and surviving proxies are killed even when that check fails.
    /// With `with_subscribers` every event subscriber is removed and the
    /// callback endpoint is retired; the next use binds a fresh one.
    pub async fn clean_up(&mut self, with_subscribers: bool) -> HarnessResult<()> {
        let base = self.settings.base_path.clone();
        tracing::info!("🧹 Cleaning up namespace {}", base);

        self.events.clear();
        let outcome = self.verify_clean_slate(&base).await;

        self.health.clear();
        self.events.clear();
        match self.kill_app_proxies() {
            Ok(killed) if killed > 0 => tracing::warn!("⚠️ Killed {} workload proxies left behind", killed),
            Ok(_) => {}
            Err(e) => tracing::warn!("⚠️ Failed to reap workload proxies: {}", e),
        }

        let violations = if with_subscribers {
            self.remove_all_subscribers().await;
            match self.endpoint.take() {
                Some(endpoint) => {
                    let violations = endpoint.take_protocol_violation();
                    endpoint.shutdown().await;
                    violations
                }
                None => Ok(()),
            }
        } else {
            self.assert_protocol_clean()
        };

        match &outcome {
            Ok(()) => tracing::info!("✅ Namespace {} is clean", base),
            Err(e) => tracing::error!("❌ Clean up of {} failed: {}", base, e),
        }
        outcome.and(violations)
    }

    async fn verify_clean_slate(&self, base: &WorkloadId) -> HarnessResult<()> {
        // the deletion's deployment_success only reaches a subscribed endpoint
        self.callback_endpoint().await?;
        let deadline = Deadline::after(self.settings.patience);

        match self.api.delete_group(base, true).await {
            Ok(Some(deployment)) => {
                self.wait_for_deployment_within(&deployment.deployment_id, deadline.remaining())
                    .await
                    .map_err(|e| {
                        HarnessError::cleanup(format!(
                            "deletion deployment {} of {base} did not finish: {e}",
                            deployment.deployment_id
                        ))
                    })?;
            }
            Ok(None) => tracing::debug!("Namespace {} did not exist", base),
            Err(e) => tracing::warn!("⚠️ Failed to delete namespace {}: {}", base, e),
        }

        let cluster = &self.cluster;
        self.waiter
            .wait_for_async("all agents quiescent", deadline.remaining(), || async move {
                match cluster.agents().await {
                    Ok(agents) => agents.iter().all(AgentResources::is_quiescent).then_some(()),
                    Err(e) => {
                        tracing::debug!("⏳ Reading cluster state failed: {}", e);
                        None
                    }
                }
            })
            .await
            .map_err(|e| HarnessError::cleanup(format!("cluster resources were not released: {e}")))?;

        let apps = self.api.list_apps(base).await?;
        if !apps.is_empty() {
            return Err(HarnessError::cleanup(format!("apps left under {base}: {apps:?}")));
        }
        let groups = self.api.list_groups(base).await?;
        if !groups.is_empty() {
            return Err(HarnessError::cleanup(format!("groups left under {base}: {groups:?}")));
        }
        Ok(())
    }

    async fn remove_all_subscribers(&self) {
        let subscribers = match self.api.list_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::warn!("⚠️ Failed to list event subscribers: {}", e);
                return;
            }
        };
        for url in subscribers {
            if let Err(e) = self.api.unsubscribe(&url).await {
                tracing::warn!("⚠️ Failed to unsubscribe {}: {}", url, e);
            }
        }
    }

    fn lock_markers(&self) -> MutexGuard<'_, Vec<String>> {
        self.proxy_markers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
