use crate::onvif::client::{ServiceClient, SoapClient};
use crate::onvif::endpoint::Endpoint;
use crate::onvif::error::Result;
use crate::onvif::soap::Namespace;
use crate::onvif::types::{Capabilities, DeviceInformation, SystemDateTime};

pub const NAMESPACES: &[Namespace] = &[
    ("tds", "http://www.onvif.org/ver10/device/wsdl"),
    ("tt", "http://www.onvif.org/ver10/schema"),
];

/// Device management service (`tds`).
#[derive(Clone)]
pub struct DeviceService {
    service: ServiceClient,
}

impl DeviceService {
    pub fn new(endpoint: Endpoint, soap: SoapClient) -> Self {
        Self {
            service: ServiceClient::new(endpoint, NAMESPACES, soap),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.service.endpoint()
    }

    pub async fn get_system_date_and_time(&self) -> Result<SystemDateTime> {
        let response = self
            .service
            .request("GetSystemDateAndTime", "<tds:GetSystemDateAndTime/>")
            .await?;
        SystemDateTime::from_node(&response.body)
    }

    pub async fn get_capabilities(&self) -> Result<Capabilities> {
        let response = self
            .service
            .request(
                "GetCapabilities",
                "<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>",
            )
            .await?;
        Ok(Capabilities::from_node(&response.body))
    }

    pub async fn get_device_information(&self) -> Result<DeviceInformation> {
        let response = self
            .service
            .request("GetDeviceInformation", "<tds:GetDeviceInformation/>")
            .await?;
        Ok(DeviceInformation::from_node(&response.body))
    }
}
