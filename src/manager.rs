use std::sync::{mpsc::Receiver, Arc};

use tracing::*;

use crate::{
    endpoints::{DeviceSnapshot, Endpoint, EndpointRegistry},
    errors::AppResult,
    platform::{AudioEndpoints, DefaultEndpointPolicy, NotificationHandle},
    switcher::{DefaultSwitcher, SwitchResult},
};

/// The one long-lived owner of the endpoint registry and the OS notification registration.
pub struct AudioDeviceManager {
    /// Tracked endpoints, shared with the OS callback thread
    registry: Arc<EndpointRegistry>,
    /// Interface to change endpoints through
    switcher: DefaultSwitcher,
    /// Keeps the registry subscribed to endpoint notifications from the OS
    device_callbacks: Option<NotificationHandle>,
}

impl Drop for AudioDeviceManager {
    fn drop(&mut self) {
        // Stop the OS from calling into the registry before anything else goes away
        if let Some(callbacks) = self.device_callbacks.take() {
            if let Err(e) = callbacks.release() {
                error!("Failed to unregister endpoint notifications: {e}");
            }
        }
    }
}

impl AudioDeviceManager {
    /// Builds a manager over the system's audio endpoints.
    #[cfg(target_os = "windows")]
    pub fn build() -> AppResult<Self> {
        use crate::platform::{PolicyConfigClient, WasapiEndpoints};

        let endpoints = WasapiEndpoints::build()?;
        Ok(Self::with_platform(
            Arc::new(endpoints),
            Arc::new(PolicyConfigClient),
        ))
    }
    /// Enumerates the initial device list and subscribes to endpoint notifications.
    ///
    /// Never fails: a broken enumeration gives an empty list, and a failed
    /// registration leaves the list without live updates. Both are logged.
    pub fn with_platform(
        endpoints: Arc<dyn AudioEndpoints>,
        policy: Arc<dyn DefaultEndpointPolicy>,
    ) -> Self {
        let registry = Arc::new(EndpointRegistry::build(endpoints.clone()));

        let device_callbacks = match endpoints.register_notifications(registry.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Device list won't follow system changes: {e}");
                None
            }
        };

        info!(
            "Audio device manager ready with {} playback devices",
            registry.devices().len()
        );

        Self {
            registry,
            switcher: DefaultSwitcher::new(policy),
            device_callbacks,
        }
    }
    /// Snapshot of the active playback devices, for menus and settings lists.
    pub fn devices(&self) -> DeviceSnapshot {
        self.registry.devices()
    }
    pub fn subscribe(&self) -> Receiver<DeviceSnapshot> {
        self.registry.subscribe()
    }
    pub fn default_device(&self) -> Option<Endpoint> {
        self.registry.default_device()
    }
    pub fn set_default(&self, guid: &str) -> bool {
        self.switcher.set_default(guid)
    }
    pub fn try_set_default(&self, guid: &str) -> SwitchResult {
        self.switcher.try_set_default(guid)
    }
    /// Manual switch from a user's menu choice.
    pub fn switch_to(&self, guid: &str) -> bool {
        match self.try_switch_to(guid) {
            Ok(()) => true,
            Err(e) if e.is_partial() => {
                error!("Default device only partially switched, roles are now mixed! {e}");
                false
            }
            Err(e) => {
                error!("Error switching audio device: {e}");
                false
            }
        }
    }
    /// Like [`Self::switch_to`], returning the failure instead of logging it.
    pub fn try_switch_to(&self, guid: &str) -> SwitchResult {
        let name = self
            .devices()
            .by_guid(guid)
            .map(|d| d.human_name.clone())
            .unwrap_or_else(|| guid.to_owned());
        self.try_set_default(guid)?;
        info!("Switched audio device to {name}");
        Ok(())
    }
    /// Re-enumerates from scratch, for when notifications might have been missed.
    pub fn rebuild(&self) -> AppResult<()> {
        self.registry.rebuild()
    }
    pub fn is_following_changes(&self) -> bool {
        self.device_callbacks.is_some()
    }
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::platform::{
        mock::{render, MockEndpoints, MockPolicy},
        EndpointNotification,
    };

    fn mocks() -> (Arc<MockEndpoints>, Arc<MockPolicy>) {
        let endpoints = Arc::new(MockEndpoints::with_render_devices(&[
            ("A", "Speakers"),
            ("B", "Headset"),
        ]));
        endpoints.set_default_silently(Some("A"));
        let policy = Arc::new(MockPolicy::linked(endpoints.clone()));
        (endpoints, policy)
    }

    #[test]
    fn notifications_reach_the_registry() {
        let (endpoints, policy) = mocks();
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy);
        assert!(manager.is_following_changes());

        endpoints.plug(render("C", "TV"));
        endpoints.notify(EndpointNotification::DeviceAdded { id: "C".into() });

        assert_eq!(manager.devices().first().unwrap().guid, "C");
    }

    #[test]
    fn drop_unregisters_exactly_once() {
        let (endpoints, policy) = mocks();
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy);
        assert_eq!(endpoints.registrations.load(Ordering::SeqCst), 1);

        drop(manager);

        assert_eq!(endpoints.unregistrations.load(Ordering::SeqCst), 1);
        assert!(!endpoints.is_registered());
        // Late notifications go nowhere
        endpoints.notify(EndpointNotification::DeviceRemoved { id: "A".into() });
    }

    #[test]
    fn failed_registration_still_gives_a_manager() {
        let (endpoints, policy) = mocks();
        endpoints.set_registration_failure(true);

        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy);

        assert!(!manager.is_following_changes());
        assert_eq!(manager.devices().len(), 2);
        drop(manager);
        assert_eq!(endpoints.unregistrations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_switch_moves_default() {
        let (endpoints, policy) = mocks();
        let manager = AudioDeviceManager::with_platform(endpoints.clone(), policy.clone());

        assert!(manager.switch_to("B"));
        assert_eq!(manager.default_device().unwrap().guid, "B");
        assert_eq!(policy.calls().len(), 3);

        assert!(!manager.switch_to("missing"));
    }
}
