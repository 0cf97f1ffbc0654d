use serde::{Deserialize, Serialize};

use crate::onvif::client::{ServiceClient, SoapClient};
use crate::onvif::endpoint::Endpoint;
use crate::onvif::error::{OnvifError, Result};
use crate::onvif::soap::Namespace;
use crate::onvif::types::validate_token;

pub const NAMESPACES: &[Namespace] = &[
    ("ter", "http://www.onvif.org/ver10/error"),
    ("xs", "http://www.w3.org/2001/XMLSchema"),
    ("tt", "http://www.onvif.org/ver10/schema"),
    ("tptz", "http://www.onvif.org/ver20/ptz/wsdl"),
];

/// Pan (`x`), tilt (`y`) and zoom (`z`) speeds, each in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn validate(&self) -> Result<()> {
        for (axis, value) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(OnvifError::Validation(format!(
                    "velocity {} must be within [-1.0, 1.0], got {}",
                    axis, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousMoveRequest {
    profile_token: String,
    velocity: Velocity,
    timeout_secs: Option<u32>,
}

impl ContinuousMoveRequest {
    pub fn new(profile_token: &str, velocity: Velocity, timeout_secs: Option<u32>) -> Result<Self> {
        validate_token("profile token", profile_token)?;
        velocity.validate()?;
        Ok(Self {
            profile_token: profile_token.to_string(),
            velocity,
            timeout_secs,
        })
    }

    fn to_body(&self) -> String {
        let mut body = format!(
            r#"<tptz:ContinuousMove><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:Velocity><tt:PanTilt x="{}" y="{}"></tt:PanTilt>"#,
            self.profile_token, self.velocity.x, self.velocity.y
        );
        if self.velocity.z != 0.0 {
            body.push_str(&format!(r#"<tt:Zoom x="{}"></tt:Zoom>"#, self.velocity.z));
        }
        body.push_str("</tptz:Velocity>");
        if let Some(secs) = self.timeout_secs.filter(|s| *s > 0) {
            body.push_str(&format!("<tptz:Timeout>PT{}S</tptz:Timeout>", secs));
        }
        body.push_str("</tptz:ContinuousMove>");
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRequest {
    profile_token: String,
    pan_tilt: bool,
    zoom: bool,
}

impl StopRequest {
    pub fn new(profile_token: &str, pan_tilt: bool, zoom: bool) -> Result<Self> {
        validate_token("profile token", profile_token)?;
        Ok(Self {
            profile_token: profile_token.to_string(),
            pan_tilt,
            zoom,
        })
    }

    fn to_body(&self) -> String {
        format!(
            "<tptz:Stop><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:PanTilt>{}</tptz:PanTilt><tptz:Zoom>{}</tptz:Zoom></tptz:Stop>",
            self.profile_token, self.pan_tilt, self.zoom
        )
    }
}

/// PTZ service (`tptz`).
#[derive(Clone)]
pub struct PtzService {
    service: ServiceClient,
}

impl PtzService {
    pub fn new(endpoint: Endpoint, soap: SoapClient) -> Self {
        Self {
            service: ServiceClient::new(endpoint, NAMESPACES, soap),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.service.endpoint()
    }

    pub async fn continuous_move(&self, request: &ContinuousMoveRequest) -> Result<()> {
        self.service.request("ContinuousMove", &request.to_body()).await?;
        Ok(())
    }

    pub async fn stop(&self, request: &StopRequest) -> Result<()> {
        self.service.request("Stop", &request.to_body()).await?;
        Ok(())
    }
}
