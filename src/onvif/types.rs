use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::onvif::error::{OnvifError, Result};
use crate::onvif::xml::XmlNode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInformation {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub hardware_id: String,
}

impl DeviceInformation {
    /// Reads a `GetDeviceInformationResponse` element. Missing fields stay empty.
    pub fn from_node(response: &XmlNode) -> Self {
        let field = |name: &str| response.text_at(&[name]).unwrap_or_default().to_string();
        Self {
            manufacturer: field("Manufacturer"),
            model: field("Model"),
            firmware_version: field("FirmwareVersion"),
            serial_number: field("SerialNumber"),
            hardware_id: field("HardwareId"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub analytics: Option<AnalyticsCapabilities>,
    pub device: Option<DeviceCapabilities>,
    pub events: Option<EventsCapabilities>,
    pub imaging: Option<ImagingCapabilities>,
    pub media: Option<MediaCapabilities>,
    pub ptz: Option<PtzCapabilities>,
}

impl Capabilities {
    /// Reads a `GetCapabilitiesResponse` element.
    ///
    /// A service is only reported when it carries a non-empty `XAddr`.
    pub fn from_node(response: &XmlNode) -> Self {
        let Some(caps) = response.child("Capabilities") else {
            return Self::default();
        };

        Self {
            analytics: service(caps, "Analytics").map(|(node, xaddr)| AnalyticsCapabilities {
                xaddr,
                rule_support: flag(node, &["RuleSupport"]),
                analytics_module_support: flag(node, &["AnalyticsModuleSupport"]),
            }),
            device: service(caps, "Device").map(|(node, xaddr)| DeviceCapabilities {
                xaddr,
                network: NetworkCapabilities {
                    ip_filter: flag(node, &["Network", "IPFilter"]),
                    zero_configuration: flag(node, &["Network", "ZeroConfiguration"]),
                    ip_version6: flag(node, &["Network", "IPVersion6"]),
                    dyn_dns: flag(node, &["Network", "DynDNS"]),
                },
                system: SystemCapabilities {
                    discovery_resolve: flag(node, &["System", "DiscoveryResolve"]),
                    discovery_bye: flag(node, &["System", "DiscoveryBye"]),
                    remote_discovery: flag(node, &["System", "RemoteDiscovery"]),
                    system_backup: flag(node, &["System", "SystemBackup"]),
                    system_logging: flag(node, &["System", "SystemLogging"]),
                    firmware_upgrade: flag(node, &["System", "FirmwareUpgrade"]),
                },
            }),
            events: service(caps, "Events").map(|(node, xaddr)| EventsCapabilities {
                xaddr,
                ws_subscription_policy_support: flag(node, &["WSSubscriptionPolicySupport"]),
                ws_pull_point_support: flag(node, &["WSPullPointSupport"]),
                ws_pausable_subscription_manager_interface_support: flag(
                    node,
                    &["WSPausableSubscriptionManagerInterfaceSupport"],
                ),
            }),
            imaging: service(caps, "Imaging").map(|(_, xaddr)| ImagingCapabilities { xaddr }),
            media: service(caps, "Media").map(|(node, xaddr)| MediaCapabilities {
                xaddr,
                streaming_capabilities: StreamingCapabilities {
                    rtp_multicast: flag(node, &["StreamingCapabilities", "RTPMulticast"]),
                    rtp_tcp: flag(node, &["StreamingCapabilities", "RTP_TCP"]),
                    rtp_rtsp_tcp: flag(node, &["StreamingCapabilities", "RTP_RTSP_TCP"]),
                },
            }),
            ptz: service(caps, "PTZ").map(|(_, xaddr)| PtzCapabilities { xaddr }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.analytics.is_none()
            && self.device.is_none()
            && self.events.is_none()
            && self.imaging.is_none()
            && self.media.is_none()
            && self.ptz.is_none()
    }
}

fn service<'a>(caps: &'a XmlNode, name: &str) -> Option<(&'a XmlNode, String)> {
    let node = caps.child(name)?;
    let xaddr = node.text_at(&["XAddr"])?;
    Some((node, xaddr.to_string()))
}

fn flag(node: &XmlNode, path: &[&str]) -> bool {
    node.text_at(path)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsCapabilities {
    pub xaddr: String,
    pub rule_support: bool,
    pub analytics_module_support: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub xaddr: String,
    pub network: NetworkCapabilities,
    pub system: SystemCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCapabilities {
    pub ip_filter: bool,
    pub zero_configuration: bool,
    pub ip_version6: bool,
    pub dyn_dns: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCapabilities {
    pub discovery_resolve: bool,
    pub discovery_bye: bool,
    pub remote_discovery: bool,
    pub system_backup: bool,
    pub system_logging: bool,
    pub firmware_upgrade: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsCapabilities {
    pub xaddr: String,
    pub ws_subscription_policy_support: bool,
    pub ws_pull_point_support: bool,
    pub ws_pausable_subscription_manager_interface_support: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingCapabilities {
    pub xaddr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCapabilities {
    pub xaddr: String,
    pub streaming_capabilities: StreamingCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingCapabilities {
    pub rtp_multicast: bool,
    pub rtp_tcp: bool,
    pub rtp_rtsp_tcp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtzCapabilities {
    pub xaddr: String,
}

/// Device clock as reported by `GetSystemDateAndTime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDateTime {
    pub date_time_type: String,
    pub daylight_savings: Option<bool>,
    pub time_zone: String,
    pub utc: Option<DateTime<Utc>>,
}

impl SystemDateTime {
    pub fn from_node(response: &XmlNode) -> Result<Self> {
        let sdt = response.child("SystemDateAndTime").ok_or_else(|| {
            OnvifError::Parse("GetSystemDateAndTimeResponse has no SystemDateAndTime".into())
        })?;

        Ok(Self {
            date_time_type: sdt.text_at(&["DateTimeType"]).unwrap_or_default().to_string(),
            daylight_savings: sdt.text_at(&["DaylightSavings"]).map(|v| v == "true"),
            time_zone: sdt.text_at(&["TimeZone", "TZ"]).unwrap_or_default().to_string(),
            utc: sdt.child("UTCDateTime").and_then(utc_date_time),
        })
    }
}

fn utc_date_time(node: &XmlNode) -> Option<DateTime<Utc>> {
    let number = |path: &[&str]| node.text_at(path)?.parse::<u32>().ok();

    let year = node.text_at(&["Date", "Year"])?.parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(&["Date", "Month"])?, number(&["Date", "Day"])?)?;
    let time = date.and_hms_opt(
        number(&["Time", "Hour"])?,
        number(&["Time", "Minute"])?,
        number(&["Time", "Second"])?,
    )?;
    Some(time.and_utc())
}

/// Checks a profile or configuration token before it is embedded in a request body.
pub fn validate_token(kind: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(OnvifError::Validation(format!("{} must not be empty", kind)));
    }
    if let Some(c) = token
        .chars()
        .find(|c| !(c.is_ascii_graphic() || *c == ' ') || *c == '<' || *c == '>')
    {
        return Err(OnvifError::Validation(format!(
            "{} contains an invalid character {:?}",
            kind, c
        )));
    }
    Ok(())
}
