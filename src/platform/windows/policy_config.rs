use std::ffi::c_void;

use windows::{
    core::*,
    Win32::{Foundation::*, Media::Audio::*},
};

// Layout from https://github.com/DvdGiessen/microphone-mute-indicator/blob/e1b291efff0a5f89bc1242cbd14bff8ddd1a52a1/src/main.rs#L133

// Reverse engineered COM object for changing the default audio endpoint.
// Undocumented, so it can break with any Windows update.
#[allow(non_upper_case_globals)]
pub const PolicyConfig: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

define_interface!(
    IPolicyConfig,
    IPolicyConfig_Vtbl,
    0xf8679f50_850a_41cf_9c72_430f290290c8
);
impl std::ops::Deref for IPolicyConfig {
    type Target = IUnknown;
    fn deref(&self) -> &Self::Target {
        unsafe { std::mem::transmute(self) }
    }
}
interface_hierarchy!(IPolicyConfig, IUnknown);
impl IPolicyConfig {
    #[allow(non_snake_case, clippy::missing_safety_doc)]
    pub unsafe fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: ERole) -> Result<()> {
        (Interface::vtable(self).SetDefaultEndpoint)(Interface::as_raw(self), device_id, role).ok()
    }
}

// Only SetDefaultEndpoint is called, the rest just has to hold the right slots.
#[allow(non_snake_case)]
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct IPolicyConfig_Vtbl {
    pub base__: IUnknown_Vtbl,
    pub GetMixFormat: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        format: *mut *mut c_void,
    ) -> HRESULT,
    pub GetDeviceFormat: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        default: BOOL,
        format: *mut *mut c_void,
    ) -> HRESULT,
    pub ResetDeviceFormat: unsafe extern "system" fn(this: *mut c_void, device_id: PCWSTR) -> HRESULT,
    pub SetDeviceFormat: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        endpoint_format: *mut c_void,
        mix_format: *mut c_void,
    ) -> HRESULT,
    pub GetProcessingPeriod: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        default: BOOL,
        default_period: *mut i64,
        minimum_period: *mut i64,
    ) -> HRESULT,
    pub SetProcessingPeriod:
        unsafe extern "system" fn(this: *mut c_void, device_id: PCWSTR, period: *mut i64) -> HRESULT,
    pub GetShareMode: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        mode: *mut c_void,
    ) -> HRESULT,
    pub SetShareMode: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        mode: *mut c_void,
    ) -> HRESULT,
    pub GetPropertyValue: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        fx_store: BOOL,
        key: *const c_void,
        value: *mut c_void,
    ) -> HRESULT,
    pub SetPropertyValue: unsafe extern "system" fn(
        this: *mut c_void,
        device_id: PCWSTR,
        fx_store: BOOL,
        key: *const c_void,
        value: *mut c_void,
    ) -> HRESULT,
    pub SetDefaultEndpoint:
        unsafe extern "system" fn(this: *mut c_void, device_id: PCWSTR, role: ERole) -> HRESULT,
    pub SetEndpointVisibility:
        unsafe extern "system" fn(this: *mut c_void, device_id: PCWSTR, visible: BOOL) -> HRESULT,
}
