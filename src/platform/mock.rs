//! In-process doubles of the platform layer, for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::errors::{AppResult, SwitcherError};

use super::{
    AudioEndpoints, DataFlow, DefaultEndpointPolicy, DeviceRole, DeviceState, EndpointInfo,
    EndpointNotification, EndpointNotificationSink, NotificationHandle, NotificationRegistration,
};

/// Mock OS audio subsystem with controllable endpoints and default.
#[derive(Default)]
pub struct MockEndpoints {
    pub endpoints: Mutex<Vec<EndpointInfo>>,
    pub default_id: Mutex<Option<String>>,
    pub fail_enumeration: Mutex<bool>,
    pub fail_default_query: Mutex<bool>,
    pub fail_registration: Mutex<bool>,
    pub sink: Arc<Mutex<Option<Arc<dyn EndpointNotificationSink>>>>,
    pub registrations: Arc<AtomicUsize>,
    pub unregistrations: Arc<AtomicUsize>,
}

impl MockEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mock with the given `(guid, name)` render endpoints, all active.
    pub fn with_render_devices(devices: &[(&str, &str)]) -> Self {
        let mock = Self::new();
        for (guid, name) in devices {
            mock.plug(render(guid, name));
        }
        mock
    }

    /// Makes an endpoint known to the mock without notifying anyone.
    pub fn plug(&self, info: EndpointInfo) {
        let mut endpoints = self.endpoints.lock().unwrap();
        endpoints.retain(|e| e.guid != info.guid);
        endpoints.push(info);
    }

    pub fn set_state(&self, guid: &str, state: DeviceState) {
        let mut endpoints = self.endpoints.lock().unwrap();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.guid == guid) {
            endpoint.state = state;
        }
    }

    pub fn forget(&self, guid: &str) {
        self.endpoints.lock().unwrap().retain(|e| e.guid != guid);
    }

    /// Changes the OS default without delivering a notification.
    pub fn set_default_silently(&self, guid: Option<&str>) {
        *self.default_id.lock().unwrap() = guid.map(String::from);
    }

    pub fn current_default(&self) -> Option<String> {
        self.default_id.lock().unwrap().clone()
    }

    /// Delivers a notification to the registered sink, as the OS callback thread would.
    pub fn notify(&self, notification: EndpointNotification) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink.on_notification(notification);
        }
    }

    pub fn is_registered(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub fn set_enumeration_failure(&self, fail: bool) {
        *self.fail_enumeration.lock().unwrap() = fail;
    }

    pub fn set_default_query_failure(&self, fail: bool) {
        *self.fail_default_query.lock().unwrap() = fail;
    }

    pub fn set_registration_failure(&self, fail: bool) {
        *self.fail_registration.lock().unwrap() = fail;
    }
}

impl AudioEndpoints for MockEndpoints {
    fn active_render_endpoints(&self) -> AppResult<Vec<EndpointInfo>> {
        if *self.fail_enumeration.lock().unwrap() {
            return Err(SwitcherError::Backend("Mock enumeration failure".into()));
        }
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.is_active_render())
            .cloned()
            .collect())
    }

    fn default_render_endpoint(&self, _role: DeviceRole) -> AppResult<EndpointInfo> {
        if *self.fail_default_query.lock().unwrap() {
            return Err(SwitcherError::Backend("Mock default query failure".into()));
        }
        let id = self
            .current_default()
            .ok_or_else(|| SwitcherError::EndpointNotFound("<default>".into()))?;
        self.endpoint(&id)
    }

    fn endpoint(&self, guid: &str) -> AppResult<EndpointInfo> {
        self.endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.guid == guid)
            .cloned()
            .ok_or_else(|| SwitcherError::EndpointNotFound(guid.to_owned()))
    }

    fn register_notifications(
        &self,
        sink: Arc<dyn EndpointNotificationSink>,
    ) -> AppResult<NotificationHandle> {
        if *self.fail_registration.lock().unwrap() {
            return Err(SwitcherError::NotificationRegistration(
                "Mock registration failure".into(),
            ));
        }
        *self.sink.lock().unwrap() = Some(sink);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(NotificationHandle::new(Box::new(MockRegistration {
            sink: self.sink.clone(),
            unregistrations: self.unregistrations.clone(),
        })))
    }
}

struct MockRegistration {
    sink: Arc<Mutex<Option<Arc<dyn EndpointNotificationSink>>>>,
    unregistrations: Arc<AtomicUsize>,
}

impl NotificationRegistration for MockRegistration {
    fn unregister(&mut self) -> AppResult<()> {
        self.sink.lock().unwrap().take();
        self.unregistrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock policy surface that records every role assignment.
///
/// When linked to a [`MockEndpoints`], successful Multimedia assignments move its default.
#[derive(Default)]
pub struct MockPolicy {
    pub calls: Mutex<Vec<(String, DeviceRole)>>,
    pub failing_role: Mutex<Option<DeviceRole>>,
    pub endpoints: Option<Arc<MockEndpoints>>,
}

impl MockPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn linked(endpoints: Arc<MockEndpoints>) -> Self {
        Self {
            endpoints: Some(endpoints),
            ..Self::default()
        }
    }

    /// Every assignment for `role` fails from now on.
    pub fn fail_on(&self, role: Option<DeviceRole>) {
        *self.failing_role.lock().unwrap() = role;
    }

    pub fn calls(&self) -> Vec<(String, DeviceRole)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl DefaultEndpointPolicy for MockPolicy {
    fn set_default_endpoint(&self, guid: &str, role: DeviceRole) -> AppResult<()> {
        self.calls.lock().unwrap().push((guid.to_owned(), role));
        if *self.failing_role.lock().unwrap() == Some(role) {
            return Err(SwitcherError::Backend(format!("Mock {role} failure")));
        }
        if let Some(endpoints) = self.endpoints.as_ref() {
            endpoints.endpoint(guid)?;
            if role == DeviceRole::Multimedia {
                endpoints.set_default_silently(Some(guid));
            }
        }
        Ok(())
    }
}

pub fn render(guid: &str, name: &str) -> EndpointInfo {
    EndpointInfo {
        guid: guid.to_owned(),
        human_name: name.to_owned(),
        flow: DataFlow::Render,
        state: DeviceState::Active,
    }
}

pub fn capture(guid: &str, name: &str) -> EndpointInfo {
    EndpointInfo {
        flow: DataFlow::Capture,
        ..render(guid, name)
    }
}
