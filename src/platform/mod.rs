//! Capability traits over the OS audio subsystem.
//!
//! Everything above this module talks to the OS only through [`AudioEndpoints`]
//! and [`DefaultEndpointPolicy`], so the undocumented policy interface never leaks
//! into the registry or the fullscreen logic.

use std::{fmt::Display, sync::Arc};

use tracing::*;

use crate::errors::AppResult;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use windows::{PolicyConfigClient, WasapiEndpoints};

#[cfg(any(test, feature = "test-mocks"))]
pub mod mock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
    Render,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

impl DeviceState {
    /// Maps the `DEVICE_STATE_XXX` constants reported by the OS.
    ///
    /// <https://learn.microsoft.com/en-us/windows/win32/coreaudio/device-state-xxx-constants>
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x1 => Some(Self::Active),
            0x2 => Some(Self::Disabled),
            0x4 => Some(Self::NotPresent),
            0x8 => Some(Self::Unplugged),
            _ => None,
        }
    }
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// The three default-device contexts the OS keeps per data flow.
///
/// Declaration order is the order a switch applies them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Multimedia,
    Console,
    Communications,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [Self::Multimedia, Self::Console, Self::Communications];
}

impl Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role_str = match self {
            Self::Multimedia => "Multimedia",
            Self::Console => "Console",
            Self::Communications => "Communications",
        };
        write!(f, "{role_str}")
    }
}

/// An endpoint as reported by the OS, before the registry decides whether to track it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub guid: String,
    pub human_name: String,
    pub flow: DataFlow,
    pub state: DeviceState,
}

impl EndpointInfo {
    pub fn is_active_render(&self) -> bool {
        self.flow == DataFlow::Render && self.state.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointNotification {
    DeviceStateChanged {
        id: String,
        state: u32,
    },
    DeviceAdded {
        id: String,
    },
    DeviceRemoved {
        id: String,
    },
    DefaultDeviceChanged {
        id: String,
        flow: DataFlow,
        role: DeviceRole,
    },
    PropertyValueChanged {
        id: String,
    },
}

/// Receiver of endpoint notifications.
///
/// Called on a thread owned by the OS audio subsystem. Implementations must not panic
/// or block for long.
pub trait EndpointNotificationSink: Send + Sync {
    fn on_notification(&self, notification: EndpointNotification);
}

/// Query side of the OS audio subsystem.
pub trait AudioEndpoints: Send + Sync {
    /// All render endpoints currently in the active state.
    fn active_render_endpoints(&self) -> AppResult<Vec<EndpointInfo>>;
    /// The current default render endpoint for `role`.
    fn default_render_endpoint(&self, role: DeviceRole) -> AppResult<EndpointInfo>;
    /// Looks up any endpoint (any flow, any state) by its id.
    fn endpoint(&self, guid: &str) -> AppResult<EndpointInfo>;
    /// Starts delivering notifications to `sink` until the returned handle is dropped.
    fn register_notifications(
        &self,
        sink: Arc<dyn EndpointNotificationSink>,
    ) -> AppResult<NotificationHandle>;
}

/// Policy side of the OS audio subsystem.
pub trait DefaultEndpointPolicy: Send + Sync {
    fn set_default_endpoint(&self, guid: &str, role: DeviceRole) -> AppResult<()>;
}

/// Platform-specific half of a notification registration.
pub trait NotificationRegistration {
    fn unregister(&mut self) -> AppResult<()>;
}

/// Live notification registration. Unregisters when dropped.
pub struct NotificationHandle {
    registration: Option<Box<dyn NotificationRegistration>>,
}

impl NotificationHandle {
    pub fn new(registration: Box<dyn NotificationRegistration>) -> Self {
        Self {
            registration: Some(registration),
        }
    }
    /// Unregisters now, reporting any failure instead of only logging it.
    pub fn release(mut self) -> AppResult<()> {
        match self.registration.take() {
            Some(mut registration) => registration.unregister(),
            None => Ok(()),
        }
    }
}

impl Drop for NotificationHandle {
    fn drop(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            if let Err(e) = registration.unregister() {
                error!("Failed to unregister endpoint notifications: {e}");
            }
        }
    }
}

impl std::fmt::Debug for NotificationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandle")
            .field("registered", &self.registration.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_state_bits() {
        assert_eq!(DeviceState::from_bits(0x1), Some(DeviceState::Active));
        assert_eq!(DeviceState::from_bits(0x8), Some(DeviceState::Unplugged));
        assert_eq!(DeviceState::from_bits(0x3), None);
        assert!(!DeviceState::Disabled.is_active());
    }

    #[test]
    fn roles_in_switch_order() {
        assert_eq!(
            DeviceRole::ALL,
            [
                DeviceRole::Multimedia,
                DeviceRole::Console,
                DeviceRole::Communications
            ]
        );
    }

    #[test]
    fn handle_unregisters_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting(Arc<AtomicUsize>);
        impl NotificationRegistration for Counting {
            fn unregister(&mut self) -> AppResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let handle = NotificationHandle::new(Box::new(Counting(count.clone())));
        handle.release().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let handle = NotificationHandle::new(Box::new(Counting(count.clone())));
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
