// "Inspired" by https://github.com/fmsyt/output-switcher/blob/1528d44747793ab4e42d23761e021976a3113d98/src-tauri/src/ipc/audio/notifier.rs#L25

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use tracing::*;
use windows::{
    core::{implement, PCWSTR},
    Win32::{
        Media::Audio::{
            eCapture, eCommunications, eConsole, eMultimedia, eRender, EDataFlow, ERole,
            IMMDeviceEnumerator, IMMNotificationClient, IMMNotificationClient_Impl, DEVICE_STATE,
        },
        UI::Shell::PropertiesSystem::PROPERTYKEY,
    },
};

use crate::{
    errors::AppResult,
    platform::{
        DataFlow, DeviceRole, EndpointNotification, EndpointNotificationSink,
        NotificationRegistration,
    },
};

fn data_flow(flow: EDataFlow) -> Option<DataFlow> {
    match flow {
        f if f == eRender => Some(DataFlow::Render),
        f if f == eCapture => Some(DataFlow::Capture),
        _ => None,
    }
}

fn device_role(role: ERole) -> Option<DeviceRole> {
    match role {
        r if r == eMultimedia => Some(DeviceRole::Multimedia),
        r if r == eConsole => Some(DeviceRole::Console),
        r if r == eCommunications => Some(DeviceRole::Communications),
        _ => None,
    }
}

fn device_id(id: &PCWSTR) -> Option<String> {
    if id.is_null() {
        return None;
    }
    match unsafe { id.to_string() } {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Dropping endpoint notification with unreadable id: {e}");
            None
        }
    }
}

/// Receives callbacks on a thread owned by the audio service.
///
/// Every method returns `Ok`, problems are logged here and never handed back to Windows.
#[implement(IMMNotificationClient)]
struct EndpointNotificationClient(Arc<dyn EndpointNotificationSink>);

impl EndpointNotificationClient {
    fn forward(&self, notification: EndpointNotification) {
        if catch_unwind(AssertUnwindSafe(|| self.0.on_notification(notification))).is_err() {
            error!("Panic in endpoint notification sink");
        }
    }
}

impl IMMNotificationClient_Impl for EndpointNotificationClient {
    fn OnDeviceStateChanged(
        &self,
        pwstrdeviceid: &PCWSTR,
        dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        if let Some(id) = device_id(pwstrdeviceid) {
            self.forward(EndpointNotification::DeviceStateChanged {
                id,
                state: dwnewstate.0,
            });
        }
        Ok(())
    }

    fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(id) = device_id(pwstrdeviceid) {
            self.forward(EndpointNotification::DeviceAdded { id });
        }
        Ok(())
    }

    fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(id) = device_id(pwstrdeviceid) {
            self.forward(EndpointNotification::DeviceRemoved { id });
        }
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        // Null id means the last device for this flow/role went away
        let id = device_id(pwstrdefaultdeviceid).unwrap_or_default();
        match (data_flow(flow), device_role(role)) {
            (Some(flow), Some(role)) => {
                self.forward(EndpointNotification::DefaultDeviceChanged { id, flow, role })
            }
            _ => warn!("Unexpected default change: flow {}, role {}", flow.0, role.0),
        }
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        if let Some(id) = device_id(pwstrdeviceid) {
            self.forward(EndpointNotification::PropertyValueChanged { id });
        }
        Ok(())
    }
}

/// A client registered with an enumerator. Created only once registration succeeded.
pub(crate) struct NotificationCallbacks {
    device_enumerator: IMMDeviceEnumerator,
    notification_client: IMMNotificationClient,
}

impl NotificationCallbacks {
    pub(crate) fn register(
        device_enumerator: IMMDeviceEnumerator,
        sink: Arc<dyn EndpointNotificationSink>,
    ) -> AppResult<Self> {
        let notification_client: IMMNotificationClient = EndpointNotificationClient(sink).into();

        // On failure both COM objects are simply released on return
        unsafe {
            device_enumerator.RegisterEndpointNotificationCallback(&notification_client)?;
        }

        Ok(Self {
            device_enumerator,
            notification_client,
        })
    }
}

impl NotificationRegistration for NotificationCallbacks {
    fn unregister(&mut self) -> AppResult<()> {
        unsafe {
            self.device_enumerator
                .UnregisterEndpointNotificationCallback(&self.notification_client)?;
        }
        debug!("Endpoint notifications unregistered");
        Ok(())
    }
}
