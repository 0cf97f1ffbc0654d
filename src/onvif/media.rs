use crate::onvif::client::{ServiceClient, SoapClient};
use crate::onvif::endpoint::Endpoint;
use crate::onvif::error::{OnvifError, Result};
use crate::onvif::profile::{parse_profiles, MediaProfile, StreamProtocol};
use crate::onvif::soap::Namespace;
use crate::onvif::types::validate_token;
use crate::onvif::xml::XmlNode;

pub const NAMESPACES: &[Namespace] = &[
    ("trt", "http://www.onvif.org/ver10/media/wsdl"),
    ("tt", "http://www.onvif.org/ver10/schema"),
];

/// Validated `GetStreamUri` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUriRequest {
    profile_token: String,
    protocol: StreamProtocol,
}

impl StreamUriRequest {
    pub fn new(profile_token: &str, protocol: StreamProtocol) -> Result<Self> {
        validate_token("profile token", profile_token)?;
        Ok(Self {
            profile_token: profile_token.to_string(),
            protocol,
        })
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    fn to_body(&self) -> String {
        format!(
            "<trt:GetStreamUri>\
               <trt:StreamSetup>\
                 <tt:Stream>RTP-Unicast</tt:Stream>\
                 <tt:Transport><tt:Protocol>{}</tt:Protocol></tt:Transport>\
               </trt:StreamSetup>\
               <trt:ProfileToken>{}</trt:ProfileToken>\
             </trt:GetStreamUri>",
            self.protocol.as_onvif(),
            self.profile_token
        )
    }
}

/// Validated `GetSnapshotUri` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotUriRequest {
    profile_token: String,
}

impl SnapshotUriRequest {
    pub fn new(profile_token: &str) -> Result<Self> {
        validate_token("profile token", profile_token)?;
        Ok(Self {
            profile_token: profile_token.to_string(),
        })
    }

    fn to_body(&self) -> String {
        format!(
            "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
            self.profile_token
        )
    }
}

/// Media service (`trt`).
#[derive(Clone)]
pub struct MediaService {
    service: ServiceClient,
}

impl MediaService {
    pub fn new(endpoint: Endpoint, soap: SoapClient) -> Self {
        Self {
            service: ServiceClient::new(endpoint, NAMESPACES, soap),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.service.endpoint()
    }

    pub async fn get_profiles(&self) -> Result<Vec<MediaProfile>> {
        let response = self.service.request("GetProfiles", "<trt:GetProfiles/>").await?;
        Ok(parse_profiles(&response.body))
    }

    pub async fn get_stream_uri(&self, request: &StreamUriRequest) -> Result<String> {
        let response = self.service.request("GetStreamUri", &request.to_body()).await?;
        media_uri(&response.body, "GetStreamUri")
    }

    pub async fn get_snapshot_uri(&self, request: &SnapshotUriRequest) -> Result<String> {
        let response = self.service.request("GetSnapshotUri", &request.to_body()).await?;
        media_uri(&response.body, "GetSnapshotUri")
    }
}

fn media_uri(response: &XmlNode, operation: &str) -> Result<String> {
    response
        .text_at(&["MediaUri", "Uri"])
        .map(str::to_string)
        .ok_or_else(|| OnvifError::Parse(format!("{}Response has no MediaUri/Uri", operation)))
}
