//! One ONVIF device: bootstrap pipeline plus the queryable model it produces.

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};

use crate::config::ClientConfig;
use crate::onvif::auth::ClockOffset;
use crate::onvif::client::SoapClient;
use crate::onvif::device::DeviceService;
use crate::onvif::endpoint::{Credentials, Endpoint, SessionContext};
use crate::onvif::error::{OnvifError, Result};
use crate::onvif::events::EventsService;
use crate::onvif::media::{MediaService, SnapshotUriRequest, StreamUriRequest};
use crate::onvif::profile::{MediaProfile, ProfileSelector, StreamProtocol};
use crate::onvif::ptz::{ContinuousMoveRequest, PtzService, StopRequest, Velocity};
use crate::onvif::transport::HttpRequest;
use crate::onvif::types::{Capabilities, DeviceInformation};

const DEFAULT_SNAPSHOT_TYPE: &str = "image/jpeg";
const DEFAULT_PTZ_TIMEOUT_SECS: u32 = 1;

/// Image returned by [`DeviceSession::fetch_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct DeviceSession {
    endpoint: Endpoint,
    soap: SoapClient,
    device: DeviceService,
    media: Option<MediaService>,
    ptz: Option<PtzService>,
    events: Option<EventsService>,
    capabilities: Option<Capabilities>,
    information: DeviceInformation,
    profiles: Vec<MediaProfile>,
    current_profile: Option<usize>,
}

impl DeviceSession {
    /// Session for a device service XAddr such as `http://10.0.0.2/onvif/device_service`.
    pub fn new(xaddr: &str, credentials: Credentials, config: &ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(xaddr, SessionContext::new(credentials))?;
        Ok(Self::with_client(endpoint, SoapClient::new(config.request_timeout())?))
    }

    /// Session for a bare `host[:port]`.
    pub fn from_address(address: &str, credentials: Credentials, config: &ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::from_address(address, SessionContext::new(credentials))?;
        Ok(Self::with_client(endpoint, SoapClient::new(config.request_timeout())?))
    }

    pub fn with_client(endpoint: Endpoint, soap: SoapClient) -> Self {
        Self {
            device: DeviceService::new(endpoint.clone(), soap.clone()),
            endpoint,
            soap,
            media: None,
            ptz: None,
            events: None,
            capabilities: None,
            information: DeviceInformation::default(),
            profiles: Vec::new(),
            current_profile: None,
        }
    }

    /// Runs the bootstrap sequence and returns the device information.
    ///
    /// Capabilities, device information (when media is advertised) and
    /// profiles are required; their first failure is returned. Time sync,
    /// stream URIs and snapshot URIs only log on failure.
    pub async fn init(&mut self) -> Result<DeviceInformation> {
        tracing::debug!("Initializing ONVIF device at {}", self.endpoint.url());

        if let Err(e) = self.sync_time().await {
            tracing::debug!("Time sync skipped for {}: {}", self.endpoint.host(), e);
        }

        self.load_capabilities().await?;
        self.load_information().await?;
        self.load_profiles().await?;
        self.resolve_stream_uris().await;
        self.resolve_snapshot_uris().await;

        tracing::info!(
            "Initialized {} {} at {} ({} profiles)",
            self.information.manufacturer,
            self.information.model,
            self.endpoint.host(),
            self.profiles.len()
        );
        Ok(self.information.clone())
    }

    /// Queries the device clock and stores the offset for every sub-client.
    pub async fn sync_time(&self) -> Result<ClockOffset> {
        let device_time = self.device.get_system_date_and_time().await?;
        let utc = device_time
            .utc
            .ok_or_else(|| OnvifError::Parse("device did not report a UTC date and time".into()))?;

        let offset = ClockOffset::between(utc, Utc::now());
        self.endpoint.context().set_clock_offset(offset);
        tracing::debug!("Clock offset for {} is {} ms", self.endpoint.host(), offset.as_millis());
        Ok(offset)
    }

    async fn load_capabilities(&mut self) -> Result<()> {
        let capabilities = self.device.get_capabilities().await?;
        if capabilities.is_empty() {
            return Err(OnvifError::Initialization(
                "the device returned no capabilities".into(),
            ));
        }

        self.events = capabilities
            .events
            .as_ref()
            .and_then(|c| self.sibling("Events", &c.xaddr))
            .map(|e| EventsService::new(e, self.soap.clone()));
        self.media = capabilities
            .media
            .as_ref()
            .and_then(|c| self.sibling("Media", &c.xaddr))
            .map(|e| MediaService::new(e, self.soap.clone()));
        self.ptz = capabilities
            .ptz
            .as_ref()
            .and_then(|c| self.sibling("PTZ", &c.xaddr))
            .map(|e| PtzService::new(e, self.soap.clone()));

        tracing::debug!(
            "Capabilities for {}: media={} ptz={} events={}",
            self.endpoint.host(),
            self.media.is_some(),
            self.ptz.is_some(),
            self.events.is_some()
        );
        self.capabilities = Some(capabilities);
        Ok(())
    }

    fn sibling(&self, service: &str, xaddr: &str) -> Option<Endpoint> {
        match self.endpoint.sibling(xaddr) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                tracing::warn!("Ignoring {} service of {}: {}", service, self.endpoint.host(), e);
                None
            }
        }
    }

    async fn load_information(&mut self) -> Result<()> {
        match self.device.get_device_information().await {
            Ok(information) => self.information = information,
            Err(e) if self.media.is_none() => {
                tracing::warn!("Device information unavailable for {}: {}", self.endpoint.host(), e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn load_profiles(&mut self) -> Result<()> {
        let Some(media) = &self.media else {
            return Ok(());
        };

        let profiles = media.get_profiles().await?;
        if profiles.is_empty() {
            return Err(OnvifError::Initialization(
                "the device has no media profiles".into(),
            ));
        }

        let previous = self.current_profile().map(|p| p.token.clone());
        self.profiles = profiles;
        self.current_profile = previous
            .and_then(|token| self.profiles.iter().position(|p| p.token == token))
            .or(Some(0));
        Ok(())
    }

    async fn resolve_stream_uris(&mut self) {
        let Some(media) = &self.media else {
            return;
        };

        for profile in &mut self.profiles {
            for protocol in StreamProtocol::ALL {
                let result = match StreamUriRequest::new(&profile.token, protocol) {
                    Ok(request) => media.get_stream_uri(&request).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(uri) => profile.stream.set(protocol, uri),
                    Err(e) => tracing::debug!(
                        "No {} stream URI for profile {}: {}",
                        protocol,
                        profile.token,
                        e
                    ),
                }
            }
        }
    }

    async fn resolve_snapshot_uris(&mut self) {
        let Some(media) = &self.media else {
            return;
        };

        for profile in &mut self.profiles {
            let result = match SnapshotUriRequest::new(&profile.token) {
                Ok(request) => media.get_snapshot_uri(&request).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(uri) => profile.snapshot = Some(uri),
                Err(e) => tracing::debug!("No snapshot URI for profile {}: {}", profile.token, e),
            }
        }
    }

    /// Replaces the credentials of this session and all of its sub-clients.
    pub fn set_auth(&self, username: &str, password: &str) {
        self.endpoint.set_auth(username, password);
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.endpoint.clock_offset()
    }

    /// Device information, empty until [`init`](Self::init) has fetched it.
    pub fn information(&self) -> &DeviceInformation {
        &self.information
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    pub fn device(&self) -> &DeviceService {
        &self.device
    }

    pub fn media(&self) -> Option<&MediaService> {
        self.media.as_ref()
    }

    pub fn ptz(&self) -> Option<&PtzService> {
        self.ptz.as_ref()
    }

    pub fn events(&self) -> Option<&EventsService> {
        self.events.as_ref()
    }

    pub fn profiles(&self) -> &[MediaProfile] {
        &self.profiles
    }

    pub fn current_profile(&self) -> Option<&MediaProfile> {
        self.current_profile.and_then(|i| self.profiles.get(i))
    }

    /// Selects a profile by index or token. Unknown selectors leave the
    /// current profile unchanged and return `None`.
    pub fn change_profile(&mut self, selector: impl Into<ProfileSelector>) -> Option<&MediaProfile> {
        let index = match selector.into() {
            ProfileSelector::Index(i) if i < self.profiles.len() => i,
            ProfileSelector::Index(_) => return None,
            ProfileSelector::Token(token) => self.profiles.iter().position(|p| p.token == token)?,
        };
        self.current_profile = Some(index);
        self.profiles.get(index)
    }

    /// Stream URI of the current profile for `protocol`.
    pub fn stream_uri(&self, protocol: StreamProtocol) -> Option<&str> {
        self.current_profile()?.stream.get(protocol)
    }

    /// Downloads a still image from the current profile's snapshot URI.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let profile = self
            .current_profile()
            .ok_or_else(|| OnvifError::Validation("no media profile is selected".into()))?;
        let uri = profile.snapshot.as_deref().ok_or_else(|| {
            OnvifError::Validation(format!("profile {} has no snapshot URI", profile.token))
        })?;
        let url = Url::parse(uri)
            .map_err(|e| OnvifError::Validation(format!("invalid snapshot URI {:?}: {}", uri, e)))?;

        let response = self
            .soap
            .transport()
            .send(HttpRequest::new(Method::GET, url), &self.endpoint.credentials())
            .await?;

        if response.status != StatusCode::OK {
            return Err(OnvifError::HttpStatus {
                status: response.status.as_u16(),
                message: response
                    .status
                    .canonical_reason()
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        let content_type = response
            .header_str(CONTENT_TYPE.as_str())
            .unwrap_or(DEFAULT_SNAPSHOT_TYPE)
            .to_string();
        if !content_type.trim_start().to_ascii_lowercase().starts_with("image/") {
            return Err(OnvifError::UnexpectedContent(content_type));
        }

        Ok(Snapshot {
            content_type,
            body: response.body,
        })
    }

    /// Starts a continuous pan/tilt/zoom move on the current profile.
    pub async fn ptz_move(&self, velocity: Velocity, timeout_secs: Option<u32>) -> Result<()> {
        let (ptz, token) = self.ptz_target()?;
        let request = ContinuousMoveRequest::new(
            token,
            velocity,
            Some(timeout_secs.unwrap_or(DEFAULT_PTZ_TIMEOUT_SECS)),
        )?;
        ptz.continuous_move(&request).await
    }

    /// Stops pan/tilt and zoom movement on the current profile.
    pub async fn ptz_stop(&self) -> Result<()> {
        let (ptz, token) = self.ptz_target()?;
        ptz.stop(&StopRequest::new(token, true, true)?).await
    }

    fn ptz_target(&self) -> Result<(&PtzService, &str)> {
        let profile = self
            .current_profile()
            .ok_or_else(|| OnvifError::Validation("no media profile is selected".into()))?;
        let ptz = self
            .ptz
            .as_ref()
            .ok_or_else(|| OnvifError::Validation("the device does not support PTZ".into()))?;
        Ok((ptz, profile.token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onvif::transport::testing::ScriptedTransport;
    use std::sync::Arc;

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope"><SOAP-ENV:Body>{}</SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
            body
        )
    }

    fn session() -> (Arc<ScriptedTransport>, DeviceSession) {
        let scripted = Arc::new(ScriptedTransport::new());
        let endpoint = Endpoint::parse(
            "http://10.0.0.2/onvif/device_service",
            SessionContext::new(Credentials::new("admin", "pw")),
        )
        .unwrap();
        let session = DeviceSession::with_client(endpoint, SoapClient::with_transport(scripted.clone()));
        (scripted, session)
    }

    fn script_bootstrap(scripted: &ScriptedTransport, with_ptz: bool) {
        scripted.respond(
            200,
            &[],
            &envelope("<tds:GetSystemDateAndTimeResponse><tds:SystemDateAndTime><tt:UTCDateTime><tt:Time><tt:Hour>0</tt:Hour><tt:Minute>0</tt:Minute><tt:Second>0</tt:Second></tt:Time><tt:Date><tt:Year>2020</tt:Year><tt:Month>1</tt:Month><tt:Day>1</tt:Day></tt:Date></tt:UTCDateTime></tds:SystemDateAndTime></tds:GetSystemDateAndTimeResponse>"),
        );
        let ptz = if with_ptz {
            "<tt:PTZ><tt:XAddr>http://10.0.0.2/onvif/ptz_service</tt:XAddr></tt:PTZ>"
        } else {
            ""
        };
        scripted.respond(
            200,
            &[],
            &envelope(&format!(
                "<tds:GetCapabilitiesResponse><tds:Capabilities><tt:Media><tt:XAddr>http://10.0.0.2/onvif/media_service</tt:XAddr></tt:Media>{}</tds:Capabilities></tds:GetCapabilitiesResponse>",
                ptz
            )),
        );
        scripted.respond(
            200,
            &[],
            &envelope("<tds:GetDeviceInformationResponse><tds:Manufacturer>Acme</tds:Manufacturer><tds:Model>C1</tds:Model></tds:GetDeviceInformationResponse>"),
        );
        scripted.respond(
            200,
            &[],
            &envelope(r#"<trt:GetProfilesResponse><trt:Profiles token="main"><tt:Name>main</tt:Name></trt:Profiles><trt:Profiles token="sub"><tt:Name>sub</tt:Name></trt:Profiles></trt:GetProfilesResponse>"#),
        );
        for profile in ["main", "sub"] {
            for protocol in ["udp", "http", "rtsp"] {
                if protocol == "udp" {
                    scripted.respond(500, &[], "");
                } else {
                    scripted.respond(
                        200,
                        &[],
                        &envelope(&format!(
                            "<trt:GetStreamUriResponse><trt:MediaUri><tt:Uri>{}://10.0.0.2/{}</tt:Uri></trt:MediaUri></trt:GetStreamUriResponse>",
                            protocol, profile
                        )),
                    );
                }
            }
        }
        scripted.respond(
            200,
            &[],
            &envelope("<trt:GetSnapshotUriResponse><trt:MediaUri><tt:Uri>http://10.0.0.2/snap.jpg</tt:Uri></trt:MediaUri></trt:GetSnapshotUriResponse>"),
        );
        scripted.respond(404, &[], "");
    }

    #[tokio::test]
    async fn test_init_populates_model() {
        let (scripted, mut session) = session();
        script_bootstrap(&scripted, true);

        let info = session.init().await.unwrap();
        assert_eq!(info.manufacturer, "Acme");
        assert!(session.media().is_some());
        assert!(session.ptz().is_some());
        assert!(session.events().is_none());

        // The device clock is years behind the local one.
        assert!(session.clock_offset().as_millis() < 0);

        assert_eq!(session.profiles().len(), 2);
        assert_eq!(session.current_profile().unwrap().token, "main");
        assert_eq!(session.stream_uri(StreamProtocol::Rtsp), Some("rtsp://10.0.0.2/main"));
        assert_eq!(session.stream_uri(StreamProtocol::Udp), None);
        assert_eq!(session.profiles()[0].snapshot.as_deref(), Some("http://10.0.0.2/snap.jpg"));
        assert_eq!(session.profiles()[1].snapshot, None);

        // 1 time + 1 capabilities + 1 info + 1 profiles + 6 stream + 2 snapshot
        assert_eq!(scripted.requests().len(), 12);
        let media_calls = scripted
            .requests()
            .iter()
            .filter(|r| r.url.path() == "/onvif/media_service")
            .count();
        assert_eq!(media_calls, 9);
    }

    #[tokio::test]
    async fn test_change_profile() {
        let (scripted, mut session) = session();
        script_bootstrap(&scripted, false);
        session.init().await.unwrap();

        assert_eq!(session.change_profile("sub").map(|p| p.name.clone()), Some("sub".into()));
        assert_eq!(session.stream_uri(StreamProtocol::Http), Some("http://10.0.0.2/sub"));
        assert!(session.change_profile(5usize).is_none());
        assert!(session.change_profile("missing").is_none());
        assert_eq!(session.current_profile().unwrap().token, "sub");
        assert_eq!(session.change_profile(0usize).unwrap().token, "main");
    }

    #[tokio::test]
    async fn test_ptz_requires_service() {
        let (scripted, mut session) = session();
        script_bootstrap(&scripted, false);
        session.init().await.unwrap();

        let err = session.ptz_move(Velocity::new(0.5, 0.0, 0.0), None).await.unwrap_err();
        assert!(matches!(err, OnvifError::Validation(_)));
        assert!(matches!(session.ptz_stop().await, Err(OnvifError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ptz_move_and_stop() {
        let (scripted, mut session) = session();
        script_bootstrap(&scripted, true);
        session.init().await.unwrap();

        scripted.respond(200, &[], &envelope("<tptz:ContinuousMoveResponse/>"));
        scripted.respond(200, &[], &envelope("<tptz:StopResponse/>"));
        session.ptz_move(Velocity::new(0.5, -0.5, 0.0), None).await.unwrap();
        session.ptz_stop().await.unwrap();

        let requests = scripted.requests();
        let stop = String::from_utf8(requests[requests.len() - 1].body.clone()).unwrap();
        let moved = String::from_utf8(requests[requests.len() - 2].body.clone()).unwrap();
        assert_eq!(requests[requests.len() - 1].url.path(), "/onvif/ptz_service");
        assert!(moved.contains(r#"<tt:PanTilt x="0.5" y="-0.5">"#));
        assert!(moved.contains("<tptz:Timeout>PT1S</tptz:Timeout>"));
        assert!(stop.contains("<tptz:PanTilt>true</tptz:PanTilt><tptz:Zoom>true</tptz:Zoom>"));

        let err = session.ptz_move(Velocity::new(2.0, 0.0, 0.0), None).await.unwrap_err();
        assert!(matches!(err, OnvifError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let (scripted, mut session) = session();
        script_bootstrap(&scripted, false);
        session.init().await.unwrap();

        scripted.respond(200, &[], "\u{ff}\u{d8}");
        let snapshot = session.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.content_type, "image/jpeg");
        assert!(!snapshot.body.is_empty());
        assert_eq!(scripted.requests().last().unwrap().method, Method::GET);

        scripted.respond(200, &[("content-type", "text/html")], "<html/>");
        assert!(matches!(
            session.fetch_snapshot().await,
            Err(OnvifError::UnexpectedContent(ref ct)) if ct == "text/html"
        ));

        scripted.respond(503, &[], "");
        assert!(matches!(
            session.fetch_snapshot().await,
            Err(OnvifError::HttpStatus { status: 503, .. })
        ));

        session.change_profile("sub");
        assert!(matches!(session.fetch_snapshot().await, Err(OnvifError::Validation(_))));
    }

    #[tokio::test]
    async fn test_snapshot_before_init() {
        let (_, session) = session();
        assert!(matches!(session.fetch_snapshot().await, Err(OnvifError::Validation(_))));
        assert_eq!(session.information(), &DeviceInformation::default());
    }

    #[tokio::test]
    async fn test_zero_profiles_is_fatal() {
        let (scripted, mut session) = session();
        scripted.respond(200, &[], &envelope("<tds:Other/>"));
        scripted.respond(
            200,
            &[],
            &envelope("<tds:GetCapabilitiesResponse><tds:Capabilities><tt:Media><tt:XAddr>http://10.0.0.2/onvif/media_service</tt:XAddr></tt:Media></tds:Capabilities></tds:GetCapabilitiesResponse>"),
        );
        scripted.respond(200, &[], &envelope("<tds:GetDeviceInformationResponse/>"));
        scripted.respond(200, &[], &envelope("<trt:GetProfilesResponse/>"));

        let err = session.init().await.unwrap_err();
        assert!(matches!(err, OnvifError::Initialization(_)));
        assert_eq!(scripted.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_info_tolerated_without_media() {
        let (scripted, mut session) = session();
        scripted.fail(OnvifError::Transport("connection reset".into()));
        scripted.respond(
            200,
            &[],
            &envelope("<tds:GetCapabilitiesResponse><tds:Capabilities><tt:Events><tt:XAddr>http://10.0.0.2/onvif/event_service</tt:XAddr></tt:Events></tds:Capabilities></tds:GetCapabilitiesResponse>"),
        );
        scripted.respond(500, &[], "");

        let info = session.init().await.unwrap();
        assert_eq!(info, DeviceInformation::default());
        assert!(session.events().is_some());
        assert!(session.profiles().is_empty());
        assert_eq!(session.clock_offset(), ClockOffset::ZERO);
    }
}
