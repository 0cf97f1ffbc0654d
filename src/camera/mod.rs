pub mod manager;
pub mod session;

pub use manager::{CameraManager, SharedSession};
pub use session::{DeviceSession, Snapshot};
