//! Mock collaborators for driving the policy engine deterministically
#![allow(dead_code)]

use async_trait::async_trait;
use netpolicy::{
    ActivationType, ActiveSession, ActiveSessionState, AddrFamily, AutoconnectMatch, BestConfig,
    BlockedReason, DefaultRouteManager, Device, DeviceId, DeviceState, DeviceStateReason,
    DhcpConfig, Dispatcher, DispatcherAction, DnsConfigTag, DnsManager, FirewallManager,
    HostnameResolver, IpConfig, Manager, Platform, PlatformLink, Policy, PolicyConfig,
    PolicyError, PolicyResult, PolicyServices, Profile, Settings, Subject, VpnSession,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const DEFAULT_RETRIES: u32 = 4;

// ---------------------------------------------------------------------------
// Profiles

pub struct MockProfile {
    uuid: Uuid,
    id: String,
    vpn: bool,
    priority: i32,
    timestamp: u64,
    master: Option<String>,
    slave_type: Option<String>,
    secondaries: Vec<Uuid>,
    visible: Mutex<bool>,
    retries: Mutex<u32>,
    retry_time: Mutex<i64>,
    blocked: Mutex<BlockedReason>,
    secrets_cleared: Mutex<u32>,
    /// Retry time installed when the counter is driven to zero
    pub retry_time_on_exhaust: i64,
}

impl MockProfile {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            uuid: Uuid::new_v4(),
            id: id.to_string(),
            vpn: false,
            priority: 0,
            timestamp: 0,
            master: None,
            slave_type: None,
            secondaries: Vec::new(),
            visible: Mutex::new(true),
            retries: Mutex::new(DEFAULT_RETRIES),
            retry_time: Mutex::new(0),
            blocked: Mutex::new(BlockedReason::None),
            secrets_cleared: Mutex::new(0),
            retry_time_on_exhaust: 300,
        })
    }

    pub fn builder(id: &str) -> MockProfileBuilder {
        MockProfileBuilder {
            id: id.to_string(),
            vpn: false,
            priority: 0,
            timestamp: 0,
            master: None,
            slave_type: None,
            secondaries: Vec::new(),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        *self.visible.lock().unwrap() = visible;
    }

    pub fn secrets_cleared(&self) -> u32 {
        *self.secrets_cleared.lock().unwrap()
    }

    pub fn set_retry_time(&self, t: i64) {
        *self.retry_time.lock().unwrap() = t;
    }
}

pub struct MockProfileBuilder {
    id: String,
    vpn: bool,
    priority: i32,
    timestamp: u64,
    master: Option<String>,
    slave_type: Option<String>,
    secondaries: Vec<Uuid>,
}

impl MockProfileBuilder {
    pub fn vpn(mut self) -> Self {
        self.vpn = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn slave_of(mut self, master: &str) -> Self {
        self.master = Some(master.to_string());
        self.slave_type = Some("bond".to_string());
        self
    }

    pub fn secondaries(mut self, secondaries: Vec<Uuid>) -> Self {
        self.secondaries = secondaries;
        self
    }

    pub fn build(self) -> Arc<MockProfile> {
        Arc::new(MockProfile {
            uuid: Uuid::new_v4(),
            id: self.id,
            vpn: self.vpn,
            priority: self.priority,
            timestamp: self.timestamp,
            master: self.master,
            slave_type: self.slave_type,
            secondaries: self.secondaries,
            visible: Mutex::new(true),
            retries: Mutex::new(DEFAULT_RETRIES),
            retry_time: Mutex::new(0),
            blocked: Mutex::new(BlockedReason::None),
            secrets_cleared: Mutex::new(0),
            retry_time_on_exhaust: 300,
        })
    }
}

impl Profile for MockProfile {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_vpn(&self) -> bool {
        self.vpn
    }

    fn autoconnect_priority(&self) -> i32 {
        self.priority
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn is_visible(&self) -> bool {
        *self.visible.lock().unwrap()
    }

    fn can_autoconnect(&self) -> bool {
        self.is_visible()
            && self.blocked_reason() == BlockedReason::None
            && self.autoconnect_retries() > 0
    }

    fn autoconnect_retries(&self) -> u32 {
        *self.retries.lock().unwrap()
    }

    fn set_autoconnect_retries(&self, retries: u32) {
        *self.retries.lock().unwrap() = retries;
        if retries == 0 {
            *self.retry_time.lock().unwrap() = self.retry_time_on_exhaust;
        }
    }

    fn reset_autoconnect_retries(&self) {
        *self.retries.lock().unwrap() = DEFAULT_RETRIES;
        *self.retry_time.lock().unwrap() = 0;
    }

    fn autoconnect_retry_time(&self) -> i64 {
        *self.retry_time.lock().unwrap()
    }

    fn blocked_reason(&self) -> BlockedReason {
        *self.blocked.lock().unwrap()
    }

    fn set_blocked_reason(&self, reason: BlockedReason) {
        *self.blocked.lock().unwrap() = reason;
    }

    fn master(&self) -> Option<String> {
        self.master.clone()
    }

    fn slave_type(&self) -> Option<String> {
        self.slave_type.clone()
    }

    fn secondaries(&self) -> Vec<Uuid> {
        self.secondaries.clone()
    }

    fn clear_secrets(&self) {
        *self.secrets_cleared.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// Devices

struct ActiveRequest {
    path: String,
    profile: Arc<dyn Profile>,
    subject: Subject,
}

pub struct MockDevice {
    id: DeviceId,
    iface: String,
    ifindex: i32,
    software: bool,
    state: Mutex<DeviceState>,
    enabled: Mutex<bool>,
    autoconnect: Mutex<bool>,
    autoconnect_allowed: Mutex<bool>,
    ip4: Mutex<Option<Arc<IpConfig>>>,
    ip6: Mutex<Option<Arc<IpConfig>>>,
    dhcp4: Mutex<Option<Arc<DhcpConfig>>>,
    dhcp6: Mutex<Option<Arc<DhcpConfig>>>,
    active: Mutex<Option<ActiveRequest>>,
    assume_uuid: Mutex<Option<Uuid>>,
    /// Profiles the device reports as auto-connectable; `None` accepts any
    /// non-VPN profile
    accepts: Mutex<Option<Vec<Uuid>>>,
    specific_object: Mutex<Option<String>>,
    pending_actions: Mutex<Vec<String>>,
    pub queued_states: Mutex<Vec<(DeviceState, DeviceStateReason)>>,
    reapply_count: Mutex<u32>,
}

impl MockDevice {
    fn build(id: u64, iface: &str, software: bool) -> Arc<Self> {
        Arc::new(Self {
            id: DeviceId(id),
            iface: iface.to_string(),
            ifindex: id as i32,
            software,
            state: Mutex::new(DeviceState::Disconnected),
            enabled: Mutex::new(true),
            autoconnect: Mutex::new(true),
            autoconnect_allowed: Mutex::new(true),
            ip4: Mutex::new(None),
            ip6: Mutex::new(None),
            dhcp4: Mutex::new(None),
            dhcp6: Mutex::new(None),
            active: Mutex::new(None),
            assume_uuid: Mutex::new(None),
            accepts: Mutex::new(None),
            specific_object: Mutex::new(None),
            pending_actions: Mutex::new(Vec::new()),
            queued_states: Mutex::new(Vec::new()),
            reapply_count: Mutex::new(0),
        })
    }

    pub fn new(id: u64, iface: &str) -> Arc<Self> {
        Self::build(id, iface, false)
    }

    pub fn new_software(id: u64, iface: &str) -> Arc<Self> {
        Self::build(id, iface, true)
    }

    pub fn set_state(&self, state: DeviceState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock().unwrap() = enabled;
    }

    pub fn set_autoconnect(&self, autoconnect: bool) {
        *self.autoconnect.lock().unwrap() = autoconnect;
    }

    pub fn set_autoconnect_allowed(&self, allowed: bool) {
        *self.autoconnect_allowed.lock().unwrap() = allowed;
    }

    pub fn set_ip_config(&self, family: AddrFamily, config: Option<Arc<IpConfig>>) {
        match family {
            AddrFamily::V4 => *self.ip4.lock().unwrap() = config,
            AddrFamily::V6 => *self.ip6.lock().unwrap() = config,
        }
    }

    pub fn set_dhcp_config(&self, family: AddrFamily, config: Option<Arc<DhcpConfig>>) {
        match family {
            AddrFamily::V4 => *self.dhcp4.lock().unwrap() = config,
            AddrFamily::V6 => *self.dhcp6.lock().unwrap() = config,
        }
    }

    pub fn set_active(&self, profile: Arc<dyn Profile>, path: &str, subject: Subject) {
        *self.active.lock().unwrap() = Some(ActiveRequest {
            path: path.to_string(),
            profile,
            subject,
        });
    }

    pub fn clear_active(&self) {
        *self.active.lock().unwrap() = None;
    }

    pub fn set_assume_uuid(&self, uuid: Uuid) {
        *self.assume_uuid.lock().unwrap() = Some(uuid);
    }

    pub fn accept_only(&self, uuids: Vec<Uuid>) {
        *self.accepts.lock().unwrap() = Some(uuids);
    }

    pub fn set_specific_object(&self, object: &str) {
        *self.specific_object.lock().unwrap() = Some(object.to_string());
    }

    pub fn pending_actions(&self) -> Vec<String> {
        self.pending_actions.lock().unwrap().clone()
    }

    pub fn reapply_count(&self) -> u32 {
        *self.reapply_count.lock().unwrap()
    }

    fn accepts_profile(&self, profile: &dyn Profile) -> bool {
        match &*self.accepts.lock().unwrap() {
            Some(uuids) => uuids.contains(&profile.uuid()),
            None => !profile.is_vpn(),
        }
    }
}

impl Device for MockDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn iface(&self) -> &str {
        &self.iface
    }

    fn ifindex(&self) -> i32 {
        self.ifindex
    }

    fn state(&self) -> DeviceState {
        *self.state.lock().unwrap()
    }

    fn is_enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    fn autoconnect(&self) -> bool {
        *self.autoconnect.lock().unwrap()
    }

    fn autoconnect_allowed(&self) -> bool {
        *self.autoconnect_allowed.lock().unwrap()
    }

    fn is_software(&self) -> bool {
        self.software
    }

    fn ip_config(&self, family: AddrFamily) -> Option<Arc<IpConfig>> {
        match family {
            AddrFamily::V4 => self.ip4.lock().unwrap().clone(),
            AddrFamily::V6 => self.ip6.lock().unwrap().clone(),
        }
    }

    fn dhcp_config(&self, family: AddrFamily) -> Option<Arc<DhcpConfig>> {
        match family {
            AddrFamily::V4 => self.dhcp4.lock().unwrap().clone(),
            AddrFamily::V6 => self.dhcp6.lock().unwrap().clone(),
        }
    }

    fn has_active_request(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    fn active_request_path(&self) -> Option<String> {
        self.active.lock().unwrap().as_ref().map(|a| a.path.clone())
    }

    fn active_profile(&self) -> Option<Arc<dyn Profile>> {
        self.active.lock().unwrap().as_ref().map(|a| a.profile.clone())
    }

    fn active_subject(&self) -> Option<Subject> {
        self.active.lock().unwrap().as_ref().map(|a| a.subject)
    }

    fn is_activating(&self) -> bool {
        (DeviceState::Prepare..=DeviceState::Secondaries).contains(&self.state())
    }

    fn take_assume_uuid(&self) -> Option<Uuid> {
        self.assume_uuid.lock().unwrap().take()
    }

    fn check_profile_available(&self, profile: &dyn Profile) -> bool {
        self.accepts_profile(profile)
    }

    fn check_profile_compatible(&self, profile: &dyn Profile) -> bool {
        self.accepts_profile(profile)
    }

    fn can_auto_connect(&self, profile: &dyn Profile) -> Option<AutoconnectMatch> {
        if self.accepts_profile(profile) {
            Some(AutoconnectMatch {
                specific_object: self.specific_object.lock().unwrap().clone(),
            })
        } else {
            None
        }
    }

    fn add_pending_action(&self, action: &str) {
        self.pending_actions.lock().unwrap().push(action.to_string());
    }

    fn remove_pending_action(&self, action: &str) {
        let mut actions = self.pending_actions.lock().unwrap();
        if let Some(pos) = actions.iter().position(|a| a == action) {
            actions.remove(pos);
        }
    }

    fn queue_state_change(&self, state: DeviceState, reason: DeviceStateReason) {
        self.queued_states.lock().unwrap().push((state, reason));
        *self.state.lock().unwrap() = state;
    }

    fn reapply_settings(&self) {
        *self.reapply_count.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// Sessions

pub type DefaultFlagLog = Arc<Mutex<Vec<(String, AddrFamily, bool)>>>;

pub struct MockSession {
    path: String,
    profile: Arc<dyn Profile>,
    device: Mutex<Option<Arc<dyn Device>>>,
    state: Mutex<ActiveSessionState>,
    subject: Subject,
    activation_type: ActivationType,
    vpn: bool,
    vpn_iface: String,
    vpn_ip4: Mutex<Option<Arc<IpConfig>>>,
    vpn_ip6: Mutex<Option<Arc<IpConfig>>>,
    default4: Mutex<bool>,
    default6: Mutex<bool>,
    flag_log: DefaultFlagLog,
}

impl MockSession {
    pub fn new(
        path: &str,
        profile: Arc<dyn Profile>,
        device: Option<Arc<dyn Device>>,
        subject: Subject,
        activation_type: ActivationType,
        flag_log: DefaultFlagLog,
    ) -> Arc<Self> {
        let vpn = profile.is_vpn();
        Arc::new(Self {
            path: path.to_string(),
            profile,
            device: Mutex::new(device),
            state: Mutex::new(ActiveSessionState::Activating),
            subject,
            activation_type,
            vpn,
            vpn_iface: "tun0".to_string(),
            vpn_ip4: Mutex::new(None),
            vpn_ip6: Mutex::new(None),
            default4: Mutex::new(false),
            default6: Mutex::new(false),
            flag_log,
        })
    }

    pub fn set_state(&self, state: ActiveSessionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_vpn_ip_config(&self, family: AddrFamily, config: Option<Arc<IpConfig>>) {
        match family {
            AddrFamily::V4 => *self.vpn_ip4.lock().unwrap() = config,
            AddrFamily::V6 => *self.vpn_ip6.lock().unwrap() = config,
        }
    }

    pub fn clear_device(&self) {
        *self.device.lock().unwrap() = None;
    }
}

impl ActiveSession for MockSession {
    fn path(&self) -> &str {
        &self.path
    }

    fn profile(&self) -> Arc<dyn Profile> {
        self.profile.clone()
    }

    fn device(&self) -> Option<Arc<dyn Device>> {
        self.device.lock().unwrap().clone()
    }

    fn set_device(&self, device: Arc<dyn Device>) {
        *self.device.lock().unwrap() = Some(device);
    }

    fn state(&self) -> ActiveSessionState {
        *self.state.lock().unwrap()
    }

    fn subject(&self) -> Subject {
        self.subject
    }

    fn activation_type(&self) -> ActivationType {
        self.activation_type
    }

    fn is_default(&self, family: AddrFamily) -> bool {
        match family {
            AddrFamily::V4 => *self.default4.lock().unwrap(),
            AddrFamily::V6 => *self.default6.lock().unwrap(),
        }
    }

    fn set_default(&self, family: AddrFamily, is_default: bool) {
        match family {
            AddrFamily::V4 => *self.default4.lock().unwrap() = is_default,
            AddrFamily::V6 => *self.default6.lock().unwrap() = is_default,
        }
        self.flag_log
            .lock()
            .unwrap()
            .push((self.path.clone(), family, is_default));
    }

    fn as_vpn(&self) -> Option<&dyn VpnSession> {
        if self.vpn {
            Some(self)
        } else {
            None
        }
    }
}

impl VpnSession for MockSession {
    fn ip_config(&self, family: AddrFamily) -> Option<Arc<IpConfig>> {
        match family {
            AddrFamily::V4 => self.vpn_ip4.lock().unwrap().clone(),
            AddrFamily::V6 => self.vpn_ip6.lock().unwrap().clone(),
        }
    }

    fn ip_iface(&self) -> String {
        self.vpn_iface.clone()
    }
}

// ---------------------------------------------------------------------------
// Manager

#[derive(Debug, Clone)]
pub struct ActivationRecord {
    pub profile: Uuid,
    pub specific_object: Option<String>,
    pub device: Option<DeviceId>,
    pub subject: Subject,
    pub activation_type: ActivationType,
}

pub struct MockManager {
    sleeping: Mutex<bool>,
    networking: Mutex<bool>,
    hostname: Mutex<Option<String>>,
    devices: Mutex<Vec<Arc<MockDevice>>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    activatable: Mutex<Vec<Arc<dyn Profile>>>,
    fail_activation: Mutex<Vec<Uuid>>,
    next_session: Mutex<u64>,
    pub activations: Mutex<Vec<ActivationRecord>>,
    pub deactivations: Mutex<Vec<(String, DeviceStateReason)>>,
    pub default_flag_log: DefaultFlagLog,
}

impl MockManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sleeping: Mutex::new(false),
            networking: Mutex::new(true),
            hostname: Mutex::new(None),
            devices: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            activatable: Mutex::new(Vec::new()),
            fail_activation: Mutex::new(Vec::new()),
            next_session: Mutex::new(0),
            activations: Mutex::new(Vec::new()),
            deactivations: Mutex::new(Vec::new()),
            default_flag_log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn set_sleeping(&self, sleeping: bool) {
        *self.sleeping.lock().unwrap() = sleeping;
    }

    pub fn set_networking_enabled(&self, enabled: bool) {
        *self.networking.lock().unwrap() = enabled;
    }

    pub fn set_hostname(&self, hostname: Option<&str>) {
        *self.hostname.lock().unwrap() = hostname.map(|s| s.to_string());
    }

    pub fn add_device(&self, device: Arc<MockDevice>) {
        self.devices.lock().unwrap().push(device);
    }

    pub fn remove_device(&self, id: DeviceId) {
        self.devices.lock().unwrap().retain(|d| d.id != id);
    }

    pub fn add_session(&self, session: Arc<MockSession>) {
        self.sessions.lock().unwrap().push(session);
    }

    pub fn remove_session(&self, path: &str) {
        self.sessions.lock().unwrap().retain(|s| s.path != path);
    }

    pub fn add_activatable(&self, profile: Arc<dyn Profile>) {
        self.activatable.lock().unwrap().push(profile);
    }

    pub fn fail_activation_of(&self, uuid: Uuid) {
        self.fail_activation.lock().unwrap().push(uuid);
    }

    pub fn activation_count(&self) -> usize {
        self.activations.lock().unwrap().len()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

impl Manager for MockManager {
    fn is_sleeping(&self) -> bool {
        *self.sleeping.lock().unwrap()
    }

    fn networking_enabled(&self) -> bool {
        *self.networking.lock().unwrap()
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.lock().unwrap().clone()
    }

    fn devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.clone() as Arc<dyn Device>)
            .collect()
    }

    fn active_sessions(&self) -> Vec<Arc<dyn ActiveSession>> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.clone() as Arc<dyn ActiveSession>)
            .collect()
    }

    fn profile_device(&self, profile: &dyn Profile) -> Option<Arc<dyn Device>> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| {
                d.active_profile()
                    .map(|p| p.uuid() == profile.uuid())
                    .unwrap_or(false)
            })
            .map(|d| d.clone() as Arc<dyn Device>)
    }

    fn activatable_profiles(&self) -> Vec<Arc<dyn Profile>> {
        self.activatable.lock().unwrap().clone()
    }

    fn activate(
        &self,
        profile: Arc<dyn Profile>,
        specific_object: Option<&str>,
        device: Option<Arc<dyn Device>>,
        subject: Subject,
        activation_type: ActivationType,
    ) -> PolicyResult<Arc<dyn ActiveSession>> {
        self.activations.lock().unwrap().push(ActivationRecord {
            profile: profile.uuid(),
            specific_object: specific_object.map(|s| s.to_string()),
            device: device.as_ref().map(|d| d.id()),
            subject,
            activation_type,
        });

        if self.fail_activation.lock().unwrap().contains(&profile.uuid()) {
            return Err(PolicyError::ActivationFailed {
                profile: profile.id().to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let mut next = self.next_session.lock().unwrap();
        *next += 1;
        let path = format!("/active/{}", *next);
        drop(next);

        let session = MockSession::new(
            &path,
            profile,
            device,
            subject,
            activation_type,
            self.default_flag_log.clone(),
        );
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session as Arc<dyn ActiveSession>)
    }

    fn deactivate(&self, session_path: &str, reason: DeviceStateReason) -> PolicyResult<()> {
        self.deactivations
            .lock()
            .unwrap()
            .push((session_path.to_string(), reason));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Settings

pub struct MockSettings {
    profiles: Mutex<Vec<Arc<dyn Profile>>>,
    pub transient_hostnames: Mutex<Vec<String>>,
    fail_transient: Mutex<bool>,
}

impl MockSettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            profiles: Mutex::new(Vec::new()),
            transient_hostnames: Mutex::new(Vec::new()),
            fail_transient: Mutex::new(false),
        })
    }

    pub fn add_profile(&self, profile: Arc<dyn Profile>) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn set_fail_transient(&self, fail: bool) {
        *self.fail_transient.lock().unwrap() = fail;
    }

    pub fn last_transient_hostname(&self) -> Option<String> {
        self.transient_hostnames.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Settings for MockSettings {
    fn profile_by_uuid(&self, uuid: Uuid) -> Option<Arc<dyn Profile>> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.uuid() == uuid)
            .cloned()
    }

    fn profiles_sorted(&self) -> Vec<Arc<dyn Profile>> {
        self.profiles.lock().unwrap().clone()
    }

    async fn set_transient_hostname(&self, name: &str) -> PolicyResult<()> {
        if *self.fail_transient.lock().unwrap() {
            return Err(PolicyError::HostnameError(
                "hostname service unavailable".to_string(),
            ));
        }
        self.transient_hostnames.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DNS

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOp {
    Begin,
    End,
    Add {
        family: AddrFamily,
        iface: String,
        tag: DnsConfigTag,
    },
    Remove {
        family: AddrFamily,
    },
    Hostname(Option<String>),
    InitialHostname(Option<String>),
}

pub struct MockDns {
    pub ops: Mutex<Vec<DnsOp>>,
}

impl MockDns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn ops(&self) -> Vec<DnsOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn begin_end_balanced(&self) -> bool {
        let mut depth: i32 = 0;
        for op in self.ops.lock().unwrap().iter() {
            match op {
                DnsOp::Begin => depth += 1,
                DnsOp::End => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0
    }

    pub fn last_hostname(&self) -> Option<Option<String>> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|op| match op {
                DnsOp::Hostname(h) => Some(h.clone()),
                _ => None,
            })
    }
}

impl DnsManager for MockDns {
    fn begin_updates(&self, _caller: &str) {
        self.ops.lock().unwrap().push(DnsOp::Begin);
    }

    fn end_updates(&self, _caller: &str) {
        self.ops.lock().unwrap().push(DnsOp::End);
    }

    fn add_ip4_config(&self, iface: &str, _config: Arc<IpConfig>, tag: DnsConfigTag) {
        self.ops.lock().unwrap().push(DnsOp::Add {
            family: AddrFamily::V4,
            iface: iface.to_string(),
            tag,
        });
    }

    fn add_ip6_config(&self, iface: &str, _config: Arc<IpConfig>, tag: DnsConfigTag) {
        self.ops.lock().unwrap().push(DnsOp::Add {
            family: AddrFamily::V6,
            iface: iface.to_string(),
            tag,
        });
    }

    fn remove_ip4_config(&self, _config: &Arc<IpConfig>) {
        self.ops.lock().unwrap().push(DnsOp::Remove {
            family: AddrFamily::V4,
        });
    }

    fn remove_ip6_config(&self, _config: &Arc<IpConfig>) {
        self.ops.lock().unwrap().push(DnsOp::Remove {
            family: AddrFamily::V6,
        });
    }

    fn set_initial_hostname(&self, hostname: Option<&str>) {
        self.ops
            .lock()
            .unwrap()
            .push(DnsOp::InitialHostname(hostname.map(|s| s.to_string())));
    }

    fn set_hostname(&self, hostname: Option<&str>) {
        self.ops
            .lock()
            .unwrap()
            .push(DnsOp::Hostname(hostname.map(|s| s.to_string())));
    }
}

// ---------------------------------------------------------------------------
// Route manager

pub struct BestEntry {
    pub config: Arc<IpConfig>,
    pub iface: String,
    pub session: Arc<MockSession>,
    pub device: Option<Arc<MockDevice>>,
}

pub struct MockRouteManager {
    best_device4: Mutex<Option<Arc<MockDevice>>>,
    best_device6: Mutex<Option<Arc<MockDevice>>>,
    best_config4: Mutex<Option<BestEntry>>,
    best_config6: Mutex<Option<BestEntry>>,
}

impl MockRouteManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            best_device4: Mutex::new(None),
            best_device6: Mutex::new(None),
            best_config4: Mutex::new(None),
            best_config6: Mutex::new(None),
        })
    }

    pub fn set_best_device(&self, family: AddrFamily, device: Option<Arc<MockDevice>>) {
        match family {
            AddrFamily::V4 => *self.best_device4.lock().unwrap() = device,
            AddrFamily::V6 => *self.best_device6.lock().unwrap() = device,
        }
    }

    pub fn set_best_config(&self, family: AddrFamily, entry: Option<BestEntry>) {
        match family {
            AddrFamily::V4 => *self.best_config4.lock().unwrap() = entry,
            AddrFamily::V6 => *self.best_config6.lock().unwrap() = entry,
        }
    }
}

impl DefaultRouteManager for MockRouteManager {
    fn best_device(
        &self,
        family: AddrFamily,
        _devices: &[Arc<dyn Device>],
        _fully_activated: bool,
        _last_best: Option<&Arc<dyn Device>>,
    ) -> Option<Arc<dyn Device>> {
        let slot = match family {
            AddrFamily::V4 => &self.best_device4,
            AddrFamily::V6 => &self.best_device6,
        };
        slot.lock()
            .unwrap()
            .clone()
            .map(|d| d as Arc<dyn Device>)
    }

    fn best_config(&self, family: AddrFamily, _ignore_never_default: bool) -> Option<BestConfig> {
        let slot = match family {
            AddrFamily::V4 => &self.best_config4,
            AddrFamily::V6 => &self.best_config6,
        };
        slot.lock().unwrap().as_ref().map(|entry| BestConfig {
            config: entry.config.clone(),
            ip_iface: entry.iface.clone(),
            session: entry.session.clone() as Arc<dyn ActiveSession>,
            device: entry.device.clone().map(|d| d as Arc<dyn Device>),
        })
    }
}

// ---------------------------------------------------------------------------
// Firewall, dispatcher, platform, resolver

pub struct MockFirewall {
    pub zone_updates: Mutex<Vec<String>>,
}

impl MockFirewall {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            zone_updates: Mutex::new(Vec::new()),
        })
    }
}

impl FirewallManager for MockFirewall {
    fn update_firewall_zone(&self, device: &dyn Device) {
        self.zone_updates
            .lock()
            .unwrap()
            .push(device.iface().to_string());
    }
}

pub struct MockDispatcher {
    pub calls: Mutex<Vec<DispatcherAction>>,
}

impl MockDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn hostname_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == DispatcherAction::Hostname)
            .count()
    }
}

impl Dispatcher for MockDispatcher {
    fn call(&self, action: DispatcherAction) {
        self.calls.lock().unwrap().push(action);
    }
}

pub struct MockPlatform {
    links: Mutex<HashMap<i32, PlatformLink>>,
    hostname: Mutex<String>,
    fail_set_hostname: Mutex<bool>,
    monotonic: Mutex<i64>,
    pub set_hostname_calls: Mutex<Vec<String>>,
}

impl MockPlatform {
    pub fn new(hostname: &str) -> Arc<Self> {
        Arc::new(Self {
            links: Mutex::new(HashMap::new()),
            hostname: Mutex::new(hostname.to_string()),
            fail_set_hostname: Mutex::new(false),
            monotonic: Mutex::new(0),
            set_hostname_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn add_link(&self, link: PlatformLink) {
        self.links.lock().unwrap().insert(link.ifindex, link);
    }

    pub fn set_fail_set_hostname(&self, fail: bool) {
        *self.fail_set_hostname.lock().unwrap() = fail;
    }

    pub fn advance(&self, seconds: i64) {
        *self.monotonic.lock().unwrap() += seconds;
    }
}

impl Platform for MockPlatform {
    fn link_get(&self, ifindex: i32) -> Option<PlatformLink> {
        self.links.lock().unwrap().get(&ifindex).copied()
    }

    fn hostname(&self) -> PolicyResult<String> {
        Ok(self.hostname.lock().unwrap().clone())
    }

    fn set_hostname(&self, name: &str) -> PolicyResult<()> {
        if *self.fail_set_hostname.lock().unwrap() {
            return Err(PolicyError::PermissionDenied("sethostname".to_string()));
        }
        self.set_hostname_calls
            .lock()
            .unwrap()
            .push(name.to_string());
        *self.hostname.lock().unwrap() = name.to_string();
        Ok(())
    }

    fn monotonic_seconds(&self) -> i64 {
        *self.monotonic.lock().unwrap()
    }
}

pub struct MockResolver {
    result: Mutex<Option<Result<String, String>>>,
    pub lookups: Mutex<Vec<IpAddr>>,
}

impl MockResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(None),
            lookups: Mutex::new(Vec::new()),
        })
    }

    /// A `None` result leaves lookups pending forever
    pub fn set_result(&self, result: Option<Result<String, String>>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl HostnameResolver for MockResolver {
    async fn lookup_by_address(&self, addr: IpAddr) -> PolicyResult<String> {
        self.lookups.lock().unwrap().push(addr);
        let result = self.result.lock().unwrap().clone();
        match result {
            Some(Ok(name)) => Ok(name),
            Some(Err(e)) => Err(PolicyError::ResolverError(e)),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test bed

pub struct TestBed {
    pub manager: Arc<MockManager>,
    pub settings: Arc<MockSettings>,
    pub dns: Arc<MockDns>,
    pub route: Arc<MockRouteManager>,
    pub firewall: Arc<MockFirewall>,
    pub dispatcher: Arc<MockDispatcher>,
    pub platform: Arc<MockPlatform>,
    pub resolver: Arc<MockResolver>,
    pub policy: Policy,
}

impl TestBed {
    /// Engine with the given kernel hostname at startup
    pub fn with_hostname(hostname: &str) -> Self {
        let manager = MockManager::new();
        let settings = MockSettings::new();
        let dns = MockDns::new();
        let route = MockRouteManager::new();
        let firewall = MockFirewall::new();
        let dispatcher = MockDispatcher::new();
        let platform = MockPlatform::new(hostname);
        let resolver = MockResolver::new();

        let policy = Policy::new(
            manager.clone(),
            settings.clone(),
            PolicyServices {
                dns: dns.clone(),
                route_manager: route.clone(),
                firewall: firewall.clone(),
                dispatcher: dispatcher.clone(),
                platform: platform.clone(),
                resolver: resolver.clone(),
                scheduler: None,
            },
            PolicyConfig::default(),
        );

        Self {
            manager,
            settings,
            dns,
            route,
            firewall,
            dispatcher,
            platform,
            resolver,
            policy,
        }
    }

    pub fn new() -> Self {
        Self::with_hostname("(none)")
    }

    /// Handles one event and lets deferred work settle
    pub async fn send(&mut self, event: netpolicy::PolicyEvent) {
        self.policy.handle_event(event);
        self.policy.settle().await;
    }
}
