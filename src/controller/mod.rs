//! Remote controller access: transport primitives, the scoped session, typed values,
//! discovery, composed workflows, and an in-memory simulated controller.

pub mod deploy;
pub mod discovery;
pub mod mock;
pub mod session;
pub mod transport;
pub mod value;

pub use discovery::{partition_by_kind, ControllerInfo, ControllerScanner};
pub use mock::MockController;
pub use session::{ControllerSession, SessionState};
pub use transport::{
    ControllerHandle, ControllerTransport, LoadMode, OperatingMode, PointerEvent, PointerKind,
    UserInfo,
};
pub use value::RapidValue;
