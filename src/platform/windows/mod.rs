use std::sync::Arc;

use tracing::*;
use wasapi::{get_default_device_for_role, Device, DeviceCollection, Direction, Role};
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        Media::Audio::*,
        System::Com::{CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED},
    },
};
use windows_core::Interface;

use crate::errors::{AppResult, SwitcherError};

use device_notifications::NotificationCallbacks;
use policy_config::{IPolicyConfig, PolicyConfig};

use super::{
    AudioEndpoints, DataFlow, DefaultEndpointPolicy, DeviceRole, DeviceState, EndpointInfo,
    EndpointNotificationSink, NotificationHandle,
};

mod device_notifications;
mod policy_config;

/// Makes sure COM is usable on the calling thread.
///
/// The host or the audio service may already have set up an apartment of a different
/// model, which is fine for everything done here.
// https://github.com/microsoft/windows-rs/issues/1169#issuecomment-926877227
// CoUninitialize is never called on purpose, the host owns the thread's lifetime.
fn ensure_com_initialized() -> AppResult<()> {
    let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if hr.is_ok() || hr == RPC_E_CHANGED_MODE {
        Ok(())
    } else {
        Err(windows_core::Error::from(hr).into())
    }
}

fn device_enumerator() -> AppResult<IMMDeviceEnumerator> {
    ensure_com_initialized()?;
    let enumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }?;
    Ok(enumerator)
}

impl From<&DeviceRole> for Role {
    fn from(value: &DeviceRole) -> Self {
        match value {
            DeviceRole::Multimedia => Self::Multimedia,
            DeviceRole::Console => Self::Console,
            DeviceRole::Communications => Self::Communications,
        }
    }
}

impl From<DeviceRole> for ERole {
    fn from(value: DeviceRole) -> Self {
        match value {
            DeviceRole::Multimedia => eMultimedia,
            DeviceRole::Console => eConsole,
            DeviceRole::Communications => eCommunications,
        }
    }
}

impl From<&Direction> for DataFlow {
    fn from(value: &Direction) -> Self {
        match value {
            Direction::Render => Self::Render,
            Direction::Capture => Self::Capture,
        }
    }
}

impl From<wasapi::DeviceState> for DeviceState {
    fn from(value: wasapi::DeviceState) -> Self {
        use wasapi::DeviceState::*;
        match value {
            Active => Self::Active,
            Disabled => Self::Disabled,
            NotPresent => Self::NotPresent,
            Unplugged => Self::Unplugged,
        }
    }
}

fn endpoint_info(device: &Device, direction: &Direction) -> AppResult<EndpointInfo> {
    Ok(EndpointInfo {
        guid: device.get_id()?,
        human_name: device.get_friendlyname()?,
        flow: direction.into(),
        state: device.get_state()?.into(),
    })
}

/// Query surface over WASAPI.
///
/// Holds no COM objects, so it can be called from the notification thread as well.
#[derive(Debug, Default)]
pub struct WasapiEndpoints;

impl WasapiEndpoints {
    /// Checks that the endpoint enumerator can be created on this system.
    pub fn build() -> AppResult<Self> {
        device_enumerator()?;
        Ok(Self)
    }
}

impl AudioEndpoints for WasapiEndpoints {
    fn active_render_endpoints(&self) -> AppResult<Vec<EndpointInfo>> {
        ensure_com_initialized()?;
        let collection = DeviceCollection::new(&Direction::Render)?;
        let mut endpoints = Vec::new();
        for device in &collection {
            let info = device
                .map_err(SwitcherError::from)
                .and_then(|device| endpoint_info(&device, &Direction::Render));
            match info {
                Ok(info) => endpoints.push(info),
                // One broken endpoint shouldn't hide the rest
                Err(e) => warn!("Skipping unreadable playback device: {e}"),
            }
        }
        Ok(endpoints)
    }

    fn default_render_endpoint(&self, role: DeviceRole) -> AppResult<EndpointInfo> {
        ensure_com_initialized()?;
        let device = get_default_device_for_role(&Direction::Render, &(&role).into())?;
        endpoint_info(&device, &Direction::Render)
    }

    fn endpoint(&self, guid: &str) -> AppResult<EndpointInfo> {
        let device_enumerator = device_enumerator()?;
        let id = guid.to_wide();
        let device: IMMDevice = unsafe { device_enumerator.GetDevice(id.as_pcwstr())? };
        let endpoint: IMMEndpoint = device.cast()?;
        let direction: Direction = unsafe { endpoint.GetDataFlow()? }.try_into()?;
        let device = Device::custom(device, direction);
        endpoint_info(&device, &direction)
    }

    fn register_notifications(
        &self,
        sink: Arc<dyn EndpointNotificationSink>,
    ) -> AppResult<NotificationHandle> {
        let callbacks = NotificationCallbacks::register(device_enumerator()?, sink)?;
        Ok(NotificationHandle::new(Box::new(callbacks)))
    }
}

/// Policy surface over the undocumented `IPolicyConfig` interface.
///
/// A fresh COM object per call, the same way Windows' own sound panel uses it.
#[derive(Debug, Default)]
pub struct PolicyConfigClient;

impl DefaultEndpointPolicy for PolicyConfigClient {
    fn set_default_endpoint(&self, guid: &str, role: DeviceRole) -> AppResult<()> {
        ensure_com_initialized()?;
        let policy_config: IPolicyConfig =
            unsafe { CoCreateInstance(&PolicyConfig, None, CLSCTX_ALL) }?;
        let wide_id = guid.to_wide();
        unsafe { policy_config.SetDefaultEndpoint(wide_id.as_pcwstr(), role.into()) }?;
        Ok(())
    }
}

// Yoinked from https://gist.github.com/dgellow/fb85229ee8aeabf3844a5f3d38eb445d

#[derive(Default)]
pub struct WideString(pub Vec<u16>);

pub trait ToWide {
    fn to_wide(&self) -> WideString;
}

impl ToWide for str {
    fn to_wide(&self) -> WideString {
        let mut result: Vec<u16> = self.encode_utf16().collect();
        result.push(0);
        WideString(result)
    }
}

impl WideString {
    /// Only valid while `self` is alive.
    pub fn as_pcwstr(&self) -> PCWSTR {
        PCWSTR(self.0.as_ptr())
    }
}
