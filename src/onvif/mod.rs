pub mod auth;
pub mod client;
pub mod device;
pub mod digest;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod media;
pub mod profile;
pub mod ptz;
pub mod soap;
pub mod transport;
pub mod types;
pub mod xml;

pub use auth::{ClockOffset, UsernameToken};
pub use client::{ServiceClient, SoapClient, SoapResponse};
pub use digest::{DigestAuthTransport, DigestChallenge};
pub use endpoint::{Credentials, Endpoint, SessionContext};
pub use error::{OnvifError, Result};
pub use profile::{MediaProfile, ProfileSelector, StreamProtocol};
pub use soap::SoapCodec;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{Capabilities, DeviceInformation};
pub use xml::XmlNode;
