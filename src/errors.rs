pub type AppResult<T> = Result<T, SwitcherError>;

#[derive(Debug, thiserror::Error)]
pub enum SwitcherError {
    #[cfg(windows)]
    #[error("Windows Error: {0}")]
    Windows(#[from] windows_result::Error),
    #[cfg(windows)]
    #[error("Windows Error: {0}")]
    WindowsCore(#[from] windows_core::Error),
    #[cfg(windows)]
    #[error("Wasapi Error: {0}")]
    Wasapi(#[from] wasapi::WasapiError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("TOML Deserialization Error: {0}")]
    TomlDe(#[from] toml::de::Error),
    // My errors
    #[error("Audio endpoint not found: {0}")]
    EndpointNotFound(String),
    #[error("Unexpected device state: {0:#x}")]
    UnexpectedDeviceState(u32),
    #[error("Audio backend failure: {0}")]
    Backend(String),
    #[error("Could not register for endpoint notifications: {0}")]
    NotificationRegistration(String),
    #[error("Required settings file is missing")]
    RequiredSettingsMissing,
    #[error("Failed to find a configuration directory")]
    ConfigDir,
    #[error("Could not install log subscriber: {0}")]
    Logging(String),
}
