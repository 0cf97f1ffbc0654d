//! Media profiles as returned by `GetProfiles`, plus the stream and snapshot
//! URIs resolved for them during bootstrap.
//!
//! Parsing is tolerant: a profile missing an optional section or numeric field
//! is kept with defaults rather than failing the whole listing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::onvif::xml::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    Udp,
    Http,
    Rtsp,
}

impl StreamProtocol {
    /// Resolution order used during bootstrap.
    pub const ALL: [StreamProtocol; 3] = [StreamProtocol::Udp, StreamProtocol::Http, StreamProtocol::Rtsp];

    /// Value of `tt:Transport/tt:Protocol` in `GetStreamUri`.
    pub fn as_onvif(&self) -> &'static str {
        match self {
            StreamProtocol::Udp => "UDP",
            StreamProtocol::Http => "HTTP",
            StreamProtocol::Rtsp => "RTSP",
        }
    }
}

impl fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_onvif())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUris {
    pub udp: Option<String>,
    pub http: Option<String>,
    pub rtsp: Option<String>,
}

impl StreamUris {
    pub fn get(&self, protocol: StreamProtocol) -> Option<&str> {
        match protocol {
            StreamProtocol::Udp => self.udp.as_deref(),
            StreamProtocol::Http => self.http.as_deref(),
            StreamProtocol::Rtsp => self.rtsp.as_deref(),
        }
    }

    pub fn set(&mut self, protocol: StreamProtocol, uri: String) {
        let slot = match protocol {
            StreamProtocol::Udp => &mut self.udp,
            StreamProtocol::Http => &mut self.http,
            StreamProtocol::Rtsp => &mut self.rtsp,
        };
        *slot = Some(uri);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSourceConfiguration {
    pub token: String,
    pub name: String,
    pub source_token: String,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub encoding: String,
    pub resolution: Resolution,
    pub quality: f32,
    pub framerate: i32,
    pub bitrate: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSourceConfiguration {
    pub token: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub encoding: String,
    pub bitrate: i32,
    pub sample_rate: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoConfiguration {
    pub source: Option<VideoSourceConfiguration>,
    pub encoder: Option<VideoEncoderConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfiguration {
    pub source: Option<AudioSourceConfiguration>,
    pub encoder: Option<AudioEncoderConfiguration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Pan (`x`), tilt (`y`) and zoom (`z`) limits. Zero when not advertised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PtzRange {
    pub x: Range,
    pub y: Range,
    pub z: Range,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProfile {
    pub token: String,
    pub name: String,
    pub snapshot: Option<String>,
    pub stream: StreamUris,
    pub video: VideoConfiguration,
    pub audio: AudioConfiguration,
    pub ptz: PtzRange,
}

impl MediaProfile {
    /// Builds a profile from one `Profiles` element. Returns `None` without a token.
    pub fn from_node(node: &XmlNode) -> Option<Self> {
        let token = node.attribute("token").map(str::trim).filter(|t| !t.is_empty())?;

        Some(Self {
            token: token.to_string(),
            name: text(node, &["Name"]),
            snapshot: None,
            stream: StreamUris::default(),
            video: VideoConfiguration {
                source: node.child("VideoSourceConfiguration").map(video_source),
                encoder: node.child("VideoEncoderConfiguration").map(video_encoder),
            },
            audio: AudioConfiguration {
                source: node.child("AudioSourceConfiguration").map(|n| AudioSourceConfiguration {
                    token: attr(n, "token"),
                    name: text(n, &["Name"]),
                }),
                encoder: node.child("AudioEncoderConfiguration").map(audio_encoder),
            },
            ptz: node.child("PTZConfiguration").map(ptz_range).unwrap_or_default(),
        })
    }
}

/// Which profile `DeviceSession::change_profile` should select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelector {
    Index(usize),
    Token(String),
}

impl From<usize> for ProfileSelector {
    fn from(index: usize) -> Self {
        ProfileSelector::Index(index)
    }
}

impl From<&str> for ProfileSelector {
    fn from(token: &str) -> Self {
        ProfileSelector::Token(token.to_string())
    }
}

/// Reads every profile of a `GetProfilesResponse`, in document order.
/// Profiles without a token, or repeating an earlier token, are skipped.
pub fn parse_profiles(response: &XmlNode) -> Vec<MediaProfile> {
    let mut seen = HashSet::new();
    let mut profiles = Vec::new();

    for node in response.children_named("Profiles") {
        let Some(profile) = MediaProfile::from_node(node) else {
            tracing::warn!("Skipping media profile without a token");
            continue;
        };
        if !seen.insert(profile.token.clone()) {
            tracing::warn!("Skipping duplicate media profile token {}", profile.token);
            continue;
        }
        profiles.push(profile);
    }

    profiles
}

fn video_source(node: &XmlNode) -> VideoSourceConfiguration {
    let bounds = node.child("Bounds");
    let bound = |name: &str| bounds.and_then(|b| b.attribute(name)).and_then(|v| v.trim().parse().ok()).unwrap_or(0);

    VideoSourceConfiguration {
        token: attr(node, "token"),
        name: text(node, &["Name"]),
        source_token: text(node, &["SourceToken"]),
        bounds: Bounds {
            x: bound("x"),
            y: bound("y"),
            width: bound("width"),
            height: bound("height"),
        },
    }
}

fn video_encoder(node: &XmlNode) -> VideoEncoderConfiguration {
    VideoEncoderConfiguration {
        token: attr(node, "token"),
        name: text(node, &["Name"]),
        encoding: text(node, &["Encoding"]),
        resolution: Resolution {
            width: int(node, &["Resolution", "Width"]),
            height: int(node, &["Resolution", "Height"]),
        },
        quality: node
            .text_at(&["Quality"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        framerate: int(node, &["RateControl", "FrameRateLimit"]),
        bitrate: int(node, &["RateControl", "BitrateLimit"]),
    }
}

fn audio_encoder(node: &XmlNode) -> AudioEncoderConfiguration {
    AudioEncoderConfiguration {
        token: attr(node, "token"),
        name: text(node, &["Name"]),
        encoding: text(node, &["Encoding"]),
        bitrate: int(node, &["Bitrate"]),
        sample_rate: int(node, &["SampleRate"]),
    }
}

fn ptz_range(node: &XmlNode) -> PtzRange {
    PtzRange {
        x: range(node, &["PanTiltLimits", "Range", "XRange"]),
        y: range(node, &["PanTiltLimits", "Range", "YRange"]),
        // Zoom limits only carry a single axis, which devices publish as XRange.
        z: range(node, &["ZoomLimits", "Range", "XRange"]),
    }
}

fn range(node: &XmlNode, path: &[&str]) -> Range {
    let Some(r) = node.path(path) else {
        return Range::default();
    };
    let bound = |name: &str| r.text_at(&[name]).and_then(|v| v.parse().ok()).unwrap_or(0.0);
    Range {
        min: bound("Min"),
        max: bound("Max"),
    }
}

fn attr(node: &XmlNode, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

fn text(node: &XmlNode, path: &[&str]) -> String {
    node.text_at(path).unwrap_or_default().to_string()
}

fn int(node: &XmlNode, path: &[&str]) -> i32 {
    node.text_at(path)
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as i32)
        .unwrap_or(0)
}
