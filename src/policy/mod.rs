//! The network policy engine
//!
//! Consumes events from the manager, the settings store, devices, active
//! sessions, the DNS manager and the firewall manager, and decides which
//! profile to auto-activate on which device, which device carries the
//! default route and DNS per address family, which secondary (VPN)
//! profiles to chain, and what the system hostname should be.
//!
//! All decision logic runs on one event loop; the only concurrency is the
//! asynchronous submission of long-running calls (reverse DNS, transient
//! hostname commit) whose completion re-enters the loop as an event.

mod auto_activate;
mod device_state;
mod hostname;
mod retry;
mod routing;
mod secondaries;

use crate::config::PolicyConfig;
use crate::device::{Device, DeviceId};
use crate::dispatcher::Dispatcher;
use crate::dns::DnsManager;
use crate::events::{PolicyEvent, PolicyUpdate};
use crate::firewall::FirewallManager;
use crate::manager::Manager;
use crate::platform::Platform;
use crate::resolver::HostnameResolver;
use crate::route_manager::DefaultRouteManager;
use crate::scheduler::{TaskHandle, TaskScheduler, TokioScheduler};
use crate::session::ActiveSession;
use crate::settings::Settings;
use crate::types::AddrFamily;
use crate::validation::is_specific_hostname;

use auto_activate::PendingActivation;
use secondaries::PendingSecondaries;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Collaborators of the policy engine besides the manager and the settings
/// store. All are injected; the engine performs no I/O of its own.
pub struct PolicyServices {
    pub dns: Arc<dyn DnsManager>,
    pub route_manager: Arc<dyn DefaultRouteManager>,
    pub firewall: Arc<dyn FirewallManager>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub platform: Arc<dyn Platform>,
    pub resolver: Arc<dyn HostnameResolver>,
    /// Deferred-task scheduler; defaults to [`TokioScheduler`] on the
    /// engine's own event queue
    pub scheduler: Option<Arc<dyn TaskScheduler>>,
}

/// The policy engine
///
/// Owns its bookkeeping tables; devices, profiles and sessions are shared
/// handles into collaborator-owned objects and are only touched through
/// their public operations. The manager must outlive the engine.
pub struct Policy {
    manager: Arc<dyn Manager>,
    settings: Arc<dyn Settings>,
    dns: Arc<dyn DnsManager>,
    route_manager: Arc<dyn DefaultRouteManager>,
    firewall: Arc<dyn FirewallManager>,
    dispatcher: Arc<dyn Dispatcher>,
    platform: Arc<dyn Platform>,
    resolver: Arc<dyn HostnameResolver>,
    scheduler: Arc<dyn TaskScheduler>,
    config: PolicyConfig,

    events: mpsc::UnboundedReceiver<PolicyEvent>,
    events_tx: mpsc::UnboundedSender<PolicyEvent>,
    updates: broadcast::Sender<PolicyUpdate>,

    devices: HashMap<DeviceId, Arc<dyn Device>>,
    sessions: HashMap<String, Arc<dyn ActiveSession>>,
    pending_activations: HashMap<DeviceId, PendingActivation>,
    pending_secondaries: Vec<PendingSecondaries>,

    default_device4: Option<Arc<dyn Device>>,
    default_device6: Option<Arc<dyn Device>>,
    activating_device4: Option<Arc<dyn Device>>,
    activating_device6: Option<Arc<dyn Device>>,

    activate_all_task: Option<TaskHandle>,
    reset_retry_timer: Option<TaskHandle>,

    /// Hostname at engine start, kept only when it named this host
    orig_hostname: Option<String>,
    /// Hostname the engine currently wants
    cur_hostname: Option<String>,
    /// True once the engine ever changed the hostname
    hostname_changed: bool,
    /// Address a reverse lookup is or was wanted for
    lookup_addr: Option<IpAddr>,
    /// Cancellation for the in-flight reverse lookup, if any
    lookup_cancel: Option<CancellationToken>,
}

impl Policy {
    /// Creates the engine. Captures the startup hostname and seeds the DNS
    /// manager with it.
    pub fn new(
        manager: Arc<dyn Manager>,
        settings: Arc<dyn Settings>,
        services: PolicyServices,
        config: PolicyConfig,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(64);

        let scheduler = services
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new(events_tx.clone())) as Arc<dyn TaskScheduler>);

        let orig_hostname = match services.platform.hostname() {
            Ok(name) if is_specific_hostname(&name) => Some(name),
            Ok(_) => None,
            Err(e) => {
                warn!("couldn't read the system hostname: {}", e);
                None
            }
        };
        services.dns.set_initial_hostname(orig_hostname.as_deref());

        Self {
            manager,
            settings,
            dns: services.dns,
            route_manager: services.route_manager,
            firewall: services.firewall,
            dispatcher: services.dispatcher,
            platform: services.platform,
            resolver: services.resolver,
            scheduler,
            config,
            events,
            events_tx,
            updates,
            devices: HashMap::new(),
            sessions: HashMap::new(),
            pending_activations: HashMap::new(),
            pending_secondaries: Vec::new(),
            default_device4: None,
            default_device6: None,
            activating_device4: None,
            activating_device6: None,
            activate_all_task: None,
            reset_retry_timer: None,
            orig_hostname,
            cur_hostname: None,
            hostname_changed: false,
            lookup_addr: None,
            lookup_cancel: None,
        }
    }

    /// Sender through which collaborators deliver events to the engine
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PolicyEvent> {
        self.events_tx.clone()
    }

    /// Subscribes to observable property changes
    pub fn subscribe_updates(&self) -> broadcast::Receiver<PolicyUpdate> {
        self.updates.subscribe()
    }

    /// Processes events until the future is dropped. Call
    /// [`Policy::shutdown`] afterwards to release deferred tasks.
    pub async fn run(&mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle_event(event);
        }
    }

    /// Drains the event queue, letting deferred idle tasks fire, until the
    /// engine is quiescent. Timers that have not expired stay pending.
    pub async fn settle(&mut self) {
        loop {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            match self.events.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(_) => break,
            }
            while let Ok(event) = self.events.try_recv() {
                self.handle_event(event);
            }
        }
    }

    /// Handles one event to completion
    pub fn handle_event(&mut self, event: PolicyEvent) {
        match event {
            PolicyEvent::DeviceAdded(device) => self.register_device(device),
            PolicyEvent::DeviceRemoved(device) => self.unregister_device(&device),
            PolicyEvent::DeviceStateChanged {
                device,
                new_state,
                old_state,
                reason,
            } => {
                if self.device_registered(&*device) {
                    self.on_device_state_changed(&device, new_state, old_state, reason);
                }
            }
            PolicyEvent::DeviceIp4ConfigChanged {
                device,
                new_config,
                old_config,
            } => {
                if self.device_registered(&*device) {
                    self.on_device_ip_config_changed(AddrFamily::V4, &device, new_config, old_config);
                }
            }
            PolicyEvent::DeviceIp6ConfigChanged {
                device,
                new_config,
                old_config,
            } => {
                if self.device_registered(&*device) {
                    self.on_device_ip_config_changed(AddrFamily::V6, &device, new_config, old_config);
                }
            }
            PolicyEvent::DeviceAutoconnectChanged(device) => {
                if self.device_registered(&*device) && device.autoconnect_allowed() {
                    self.schedule_activate_check(&device);
                }
            }
            PolicyEvent::DeviceRecheckAutoActivate(device) => {
                if self.device_registered(&*device) {
                    self.schedule_activate_check(&device);
                }
            }
            PolicyEvent::SessionAdded(session) => self.register_session(session),
            PolicyEvent::SessionRemoved(session) => self.unregister_session(&session),
            PolicyEvent::SessionStateChanged(session) => {
                if self.session_registered(&*session) {
                    self.on_session_state_changed(&session);
                }
            }
            PolicyEvent::VpnStateChanged {
                session,
                new_state,
                old_state,
            } => {
                if self.session_registered(&*session) {
                    self.on_vpn_state_changed(&session, new_state, old_state);
                }
            }
            PolicyEvent::VpnRetryAfterFailure(session) => {
                if self.session_registered(&*session) {
                    self.on_vpn_retry_after_failure(&session);
                }
            }
            PolicyEvent::HostnameChanged => self.update_system_hostname(None, None),
            PolicyEvent::SleepingChanged => self.on_sleeping_changed(),
            PolicyEvent::ProfileAdded(_) => self.schedule_activate_all(),
            PolicyEvent::ProfileUpdated { profile, by_user } => {
                self.on_profile_updated(&profile, by_user)
            }
            PolicyEvent::ProfileRemoved(profile) => self.deactivate_if_active(&profile),
            PolicyEvent::ProfileVisibilityChanged(profile) => {
                self.on_profile_visibility_changed(&profile)
            }
            PolicyEvent::SecretAgentRegistered => self.on_secret_agent_registered(),
            PolicyEvent::DnsConfigChanged => self.on_dns_config_changed(),
            PolicyEvent::FirewallStarted => self.on_firewall_started(),
            PolicyEvent::AutoActivate(device_id) => self.on_auto_activate(device_id),
            PolicyEvent::ActivateAll => self.on_activate_all(),
            PolicyEvent::ResetRetryTimer => self.on_reset_retry_timer(),
            PolicyEvent::HostnameLookupDone { result } => self.on_hostname_lookup_done(result),
        }
    }

    /// Default device for IPv4 routing and DNS
    pub fn default_ip4_device(&self) -> Option<Arc<dyn Device>> {
        self.default_device4.clone()
    }

    /// Default device for IPv6 routing and DNS
    pub fn default_ip6_device(&self) -> Option<Arc<dyn Device>> {
        self.default_device6.clone()
    }

    /// Best IPv4 candidate regardless of activation progress
    pub fn activating_ip4_device(&self) -> Option<Arc<dyn Device>> {
        self.activating_device4.clone()
    }

    /// Best IPv6 candidate regardless of activation progress
    pub fn activating_ip6_device(&self) -> Option<Arc<dyn Device>> {
        self.activating_device6.clone()
    }

    /// Number of devices with a queued auto-activation check
    pub fn pending_activation_count(&self) -> usize {
        self.pending_activations.len()
    }

    /// Number of base devices still waiting on secondary sessions
    pub fn pending_secondaries_count(&self) -> usize {
        self.pending_secondaries.len()
    }

    /// Releases deferred tasks and the in-flight reverse lookup. Safe to
    /// call more than once; each cancellation happens exactly once.
    pub fn shutdown(&mut self) {
        if let Some(token) = self.lookup_cancel.take() {
            token.cancel();
        }
        self.lookup_addr = None;

        let ids: Vec<DeviceId> = self.pending_activations.keys().copied().collect();
        for id in ids {
            self.clear_pending_activate_check(id);
        }
        self.pending_secondaries.clear();
        self.devices.clear();
        self.sessions.clear();

        if let Some(task) = self.activate_all_task.take() {
            task.cancel();
        }
        if let Some(task) = self.reset_retry_timer.take() {
            task.cancel();
        }
    }

    fn register_device(&mut self, device: Arc<dyn Device>) {
        let id = device.id();
        if self.devices.contains_key(&id) {
            warn!("device {} is already tracked", device.iface());
            return;
        }
        debug!("tracking device {}", device.iface());
        self.devices.insert(id, device);
    }

    fn unregister_device(&mut self, device: &Arc<dyn Device>) {
        // Cancel the deferred auto-activation check, if one is queued.
        self.clear_pending_activate_check(device.id());

        if self.devices.remove(&device.id()).is_some() {
            debug!("dropped device {}", device.iface());
        }
        // Routing and DNS were already refreshed when the device left its
        // active state, so nothing further to do here.
    }

    fn device_registered(&self, device: &dyn Device) -> bool {
        self.devices.contains_key(&device.id())
    }

    fn register_session(&mut self, session: Arc<dyn ActiveSession>) {
        self.sessions.insert(session.path().to_string(), session);
    }

    fn unregister_session(&mut self, session: &Arc<dyn ActiveSession>) {
        self.sessions.remove(session.path());
    }

    fn session_registered(&self, session: &dyn ActiveSession) -> bool {
        self.sessions.contains_key(session.path())
    }

    fn on_firewall_started(&self) {
        // Move every interface into its configured zone now that the
        // firewall daemon can accept requests.
        for device in self.manager.devices() {
            self.firewall.update_firewall_zone(&*device);
        }
    }

    pub(crate) fn notify(&self, update: PolicyUpdate) {
        let _ = self.updates.send(update);
    }
}

impl Drop for Policy {
    fn drop(&mut self) {
        self.shutdown();
    }
}
