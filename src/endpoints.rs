use std::{
    fmt::Display,
    ops::Deref,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        mpsc::{self, Receiver, SyncSender, TrySendError},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
};

use tracing::*;

use crate::{
    errors::{AppResult, SwitcherError},
    platform::{
        AudioEndpoints, DataFlow, DeviceRole, DeviceState, EndpointInfo, EndpointNotification,
        EndpointNotificationSink,
    },
};

/// A render endpoint tracked by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub human_name: String,
    pub guid: String,
    /// `true` iff this endpoint is the default for the Multimedia role
    pub is_default: bool,
}

impl Endpoint {
    pub fn new(human_name: String, guid: String, is_default: bool) -> Self {
        Self {
            human_name,
            guid,
            is_default,
        }
    }
}

impl From<EndpointInfo> for Endpoint {
    fn from(value: EndpointInfo) -> Self {
        Self::new(value.human_name, value.guid, false)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.guid.is_empty(), self.human_name.is_empty()) {
            // If the name's populated, just use that
            (_, false) => write!(f, "{}", self.human_name),
            // Only GUID populated
            (false, true) => write!(f, "By GUID: \"{}\"", self.guid),
            // Neither populated?
            (true, true) => write!(f, "Empty device?"),
        }
    }
}

/// Immutable, published view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    /// Bumped on every structural change
    pub version: u64,
    pub endpoints: Vec<Endpoint>,
}

impl DeviceList {
    pub fn by_guid(&self, guid: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.guid == guid)
    }
    pub fn default_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.is_default)
    }
}

impl Deref for DeviceList {
    type Target = [Endpoint];
    fn deref(&self) -> &Self::Target {
        &self.endpoints
    }
}

pub type DeviceSnapshot = Arc<DeviceList>;

/// Snapshots a subscriber may have queued before newer ones get dropped
pub const SUBSCRIBER_BACKLOG: usize = 16;

#[derive(Default)]
struct RegistryState {
    devices: Vec<Endpoint>,
    version: u64,
}

/// Live list of active render endpoints.
///
/// Mutated by OS notifications on a foreign thread; readers only ever see whole snapshots.
pub struct EndpointRegistry {
    backend: Arc<dyn AudioEndpoints>,
    /// Writer side, every mutation happens under this lock
    state: Mutex<RegistryState>,
    /// Reader side, swapped after each mutation
    published: RwLock<DeviceSnapshot>,
    /// Observers of structural changes
    subscribers: Mutex<Vec<SyncSender<DeviceSnapshot>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every critical section leaves the data consistent, so a poisoned lock is still usable
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EndpointRegistry {
    /// Builds the registry from an initial enumeration.
    ///
    /// An enumeration failure is logged and leaves the list empty.
    pub fn build(backend: Arc<dyn AudioEndpoints>) -> Self {
        let registry = Self {
            backend,
            state: Mutex::new(RegistryState::default()),
            published: RwLock::new(Arc::new(DeviceList::default())),
            subscribers: Mutex::new(Vec::new()),
        };
        if let Err(e) = registry.rebuild() {
            error!("Error getting audio devices: {e}");
        }
        registry
    }
    /// Current snapshot of the tracked endpoints, newest discoveries first.
    pub fn devices(&self) -> DeviceSnapshot {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    /// Receives a fresh snapshot after every structural change.
    ///
    /// At most [`SUBSCRIBER_BACKLOG`] snapshots are queued. While the queue is full new
    /// ones are dropped, so a receiver that falls behind should re-read [`Self::devices`].
    pub fn subscribe(&self) -> Receiver<DeviceSnapshot> {
        let (tx, rx) = mpsc::sync_channel(SUBSCRIBER_BACKLOG);
        lock(&self.subscribers).push(tx);
        rx
    }
    /// Asks the OS for the current Multimedia default, ignoring the cached flags.
    pub fn default_device(&self) -> Option<Endpoint> {
        match self.backend.default_render_endpoint(DeviceRole::Multimedia) {
            Ok(info) => {
                let mut endpoint = Endpoint::from(info);
                endpoint.is_default = true;
                Some(endpoint)
            }
            Err(e) => {
                error!("Error getting default audio device: {e}");
                None
            }
        }
    }
    /// Throws away the tracked list and enumerates again.
    ///
    /// On failure the list is left empty.
    pub fn rebuild(&self) -> AppResult<()> {
        let mut state = lock(&self.state);
        state.devices.clear();
        let result = self.enumerate().map(|devices| state.devices = devices);
        self.publish(&mut state);
        result
    }
    fn enumerate(&self) -> AppResult<Vec<Endpoint>> {
        let found = self.backend.active_render_endpoints()?;
        let default_id = self.default_id();
        Ok(found
            .into_iter()
            .map(|info| {
                let is_default = default_id.as_deref() == Some(info.guid.as_str());
                Endpoint::new(info.human_name, info.guid, is_default)
            })
            .collect())
    }
    fn default_id(&self) -> Option<String> {
        self.default_device().map(|d| d.guid)
    }
    /// Bumps the version and hands the new list to readers and subscribers.
    ///
    /// Called with the writer lock held so snapshots are published in mutation order.
    fn publish(&self, state: &mut RegistryState) {
        state.version += 1;
        let snapshot = Arc::new(DeviceList {
            version: state.version,
            endpoints: state.devices.clone(),
        });
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        lock(&self.subscribers).retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Subscriber is behind, dropping snapshot {}", snapshot.version);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
    /// Looks the endpoint up and, if it's an active render device we don't know yet,
    /// puts it at the front of the list.
    fn add_endpoint(&self, id: &str, known_to_be_active: bool) -> AppResult<()> {
        let info = self.backend.endpoint(id)?;
        if info.flow != DataFlow::Render {
            debug!("Ignoring non-render endpoint {id}");
            return Ok(());
        }
        if !known_to_be_active && !info.state.is_active() {
            debug!("Ignoring inactive endpoint {id} ({:?})", info.state);
            return Ok(());
        }
        let is_default = self.default_id().as_deref() == Some(id);
        let device = Endpoint::new(info.human_name, info.guid, is_default);

        let mut state = lock(&self.state);
        if let Some(old) = state.devices.iter().find(|d| d.guid == device.guid) {
            warn!("Device already tracked, not adding again: {old}");
            return Ok(());
        }
        info!("New playback device: {device}");
        if device.is_default {
            for other in state.devices.iter_mut() {
                other.is_default = false;
            }
        }
        state.devices.insert(0, device);
        self.publish(&mut state);
        Ok(())
    }
    fn remove_endpoint(&self, id: &str) {
        let mut state = lock(&self.state);
        if let Some(index) = state.devices.iter().position(|d| d.guid == id) {
            let removed = state.devices.remove(index);
            info!("Playback device gone: {removed}");
            self.publish(&mut state);
        }
    }
    fn mark_default(&self, id: &str) {
        let mut state = lock(&self.state);
        let mut changed = false;
        for device in state.devices.iter_mut() {
            let is_default = device.guid == id;
            if device.is_default != is_default {
                device.is_default = is_default;
                changed = true;
            }
        }
        if changed {
            self.publish(&mut state);
        }
    }
    pub fn handle_endpoint_notification(&self, notif: EndpointNotification) -> AppResult<()> {
        use EndpointNotification::*;
        debug!("Endpoint notification: {notif:?}");
        match notif {
            DeviceAdded { id } => self.add_endpoint(&id, false)?,
            DeviceRemoved { id } => self.remove_endpoint(&id),
            DeviceStateChanged { id, state } => match DeviceState::from_bits(state) {
                Some(DeviceState::Active) => self.add_endpoint(&id, true)?,
                Some(_) => self.remove_endpoint(&id),
                None => {
                    warn!("Got unexpected state from DeviceStateChanged for {id}");
                    return Err(SwitcherError::UnexpectedDeviceState(state));
                }
            },
            DefaultDeviceChanged { id, flow, role } => {
                if flow == DataFlow::Render && role == DeviceRole::Multimedia {
                    self.mark_default(&id);
                }
            }
            PropertyValueChanged { .. } => (),
        }
        Ok(())
    }
}

impl EndpointNotificationSink for EndpointRegistry {
    fn on_notification(&self, notification: EndpointNotification) {
        // Nothing may unwind back into the OS dispatcher
        match catch_unwind(AssertUnwindSafe(|| {
            self.handle_endpoint_notification(notification)
        })) {
            Ok(Ok(())) => (),
            Ok(Err(e)) => error!("Error handling endpoint notification: {e}"),
            Err(_) => error!("Panic while handling endpoint notification"),
        }
    }
}
