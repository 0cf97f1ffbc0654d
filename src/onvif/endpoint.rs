use reqwest::Url;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::onvif::auth::ClockOffset;
use crate::onvif::error::{OnvifError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }
}

/// State shared by every endpoint of one device session.
///
/// Credentials and the clock offset live here so that an update is seen by all
/// sub-service clients at once.
#[derive(Debug, Default)]
pub struct SessionContext {
    credentials: RwLock<Credentials>,
    clock_offset: AtomicI64,
}

impl SessionContext {
    pub fn new(credentials: Credentials) -> Arc<Self> {
        Arc::new(Self {
            credentials: RwLock::new(credentials),
            clock_offset: AtomicI64::new(0),
        })
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    pub fn clock_offset(&self) -> ClockOffset {
        ClockOffset::from_millis(self.clock_offset.load(Ordering::Acquire))
    }

    pub fn set_clock_offset(&self, offset: ClockOffset) {
        self.clock_offset.store(offset.as_millis(), Ordering::Release);
    }
}

/// Address of one ONVIF service on a device, bound to its session's context.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    context: Arc<SessionContext>,
}

impl Endpoint {
    /// Builds an endpoint from a service XAddr such as
    /// `http://192.168.0.10/onvif/device_service`.
    pub fn parse(xaddr: &str, context: Arc<SessionContext>) -> Result<Self> {
        let url = Url::parse(xaddr.trim())
            .map_err(|e| OnvifError::Validation(format!("invalid xaddr {:?}: {}", xaddr, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(OnvifError::Validation(format!(
                "xaddr must be an http(s) URL with a host: {}",
                xaddr
            )));
        }
        Ok(Self { url, context })
    }

    /// Builds the device-management endpoint for a bare `host[:port]`.
    pub fn from_address(address: &str, context: Arc<SessionContext>) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OnvifError::Validation("address must not be empty".into()));
        }
        let xaddr = if address.contains(':') {
            format!("http://{}/onvif/device_service", address)
        } else {
            format!("http://{}:80/onvif/device_service", address)
        };
        Self::parse(&xaddr, context)
    }

    /// Another service endpoint that shares this endpoint's session context.
    pub fn sibling(&self, xaddr: &str) -> Result<Self> {
        Self::parse(xaddr, Arc::clone(&self.context))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn credentials(&self) -> Credentials {
        self.context.credentials()
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.context.clock_offset()
    }

    /// Updates credentials for this endpoint and every endpoint sharing its session.
    pub fn set_auth(&self, username: &str, password: &str) {
        self.context
            .set_credentials(Credentials::new(username, password));
    }
}
