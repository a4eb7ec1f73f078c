//! Remote controller transport.
//!
//! [`ControllerTransport`] is the set of primitives a [`ControllerSession`] is built on:
//! logon, mastership, file transfer, module/program loading, named-data access, program
//! pointer control, execution start, and pointer-change notifications.
//!
//! Implementations are expected to be thin. They do not enforce session state; the
//! session does that. The in-memory [`MockController`] is the reference implementation
//! used by the test suite.
//!
//! [`ControllerSession`]: crate::controller::session::ControllerSession
//! [`MockController`]: crate::controller::mock::MockController

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppResult;
use crate::motion::target::{CartesianPose, JointPose};

/// Opaque identity of a remote controller, as produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerHandle {
    /// Controller system id.
    pub system_id: Uuid,
    /// Network address (host or host:port).
    pub address: String,
    /// Controller name as reported by the controller.
    pub name: String,
}

impl fmt::Display for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.name, self.system_id, self.address)
    }
}

/// Credentials used at logon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User name.
    pub name: String,
    /// Password.
    pub password: String,
}

impl UserInfo {
    /// Creates credentials.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

impl Default for UserInfo {
    /// The factory default user.
    fn default() -> Self {
        Self::new("Default User", "robotics")
    }
}

/// Controller operating mode (key switch position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Starting up.
    Init,
    /// Automatic: remote clients may start execution.
    Auto,
    /// Manual, reduced speed.
    Manual,
    /// Manual, full speed.
    ManualFullSpeed,
    /// Mode change pending acknowledgement.
    AutoChange,
    /// Mode could not be determined.
    Undefined,
}

impl OperatingMode {
    /// Returns the mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Init => "Init",
            OperatingMode::Auto => "Auto",
            OperatingMode::Manual => "Manual",
            OperatingMode::ManualFullSpeed => "ManualFullSpeed",
            OperatingMode::AutoChange => "AutoChange",
            OperatingMode::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a loaded module or program relates to what is already in the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Load alongside existing modules; a name clash is rejected.
    Add,
    /// Replace existing content.
    Replace,
}

/// A named data item as stored on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RapidData {
    /// Module the item is declared in.
    pub module: String,
    /// Symbol name.
    pub name: String,
    /// Declared data type, e.g. `robtarget`.
    pub rapid_type: String,
    /// Current value in literal form. Empty for uninitialised items.
    pub value: String,
}

/// Which execution cursor a pointer event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKind {
    /// Program pointer: the statement the interpreter is executing.
    Program,
    /// Motion pointer: the move the robot is physically performing.
    Motion,
}

/// Pointer-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Cursor that moved.
    pub kind: PointerKind,
    /// Module the cursor is in.
    pub module: String,
    /// Row (line) of the statement.
    pub row: usize,
}

/// Program pointer location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramPosition {
    /// Module name.
    pub module: String,
    /// Routine name.
    pub routine: String,
    /// Row (line) of the statement.
    pub row: usize,
}

/// Remote controller primitives.
///
/// All calls are remote and externally observable. Errors use the crate taxonomy:
/// unreachable controllers and bad credentials are `Session`, refusals are
/// `Protocol`/`LoadRejected`.
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Connects and authenticates.
    async fn logon(&self, handle: &ControllerHandle, user: &UserInfo) -> AppResult<()>;

    /// Disconnects. Must succeed when already disconnected.
    async fn logoff(&self) -> AppResult<()>;

    /// Acquires exclusive write access to the program/task state.
    async fn request_mastership(&self) -> AppResult<()>;

    /// Releases exclusive write access.
    async fn release_mastership(&self) -> AppResult<()>;

    /// Current operating mode.
    async fn operating_mode(&self) -> AppResult<OperatingMode>;

    /// Copies a local file into controller storage under `remote_name`.
    async fn put_file(&self, local: &Path, remote_name: &str, overwrite: bool) -> AppResult<()>;

    /// Loads a program descriptor previously transferred with [`put_file`](Self::put_file).
    async fn load_program(&self, task: &str, remote_name: &str, mode: LoadMode) -> AppResult<()>;

    /// Loads a module previously transferred with [`put_file`](Self::put_file).
    async fn load_module(&self, task: &str, remote_name: &str, mode: LoadMode) -> AppResult<()>;

    /// Looks up a named data item. `Ok(None)` when no such symbol exists.
    async fn get_data(&self, task: &str, module: &str, name: &str)
        -> AppResult<Option<RapidData>>;

    /// Overwrites the value of a named data item.
    async fn set_data(&self, task: &str, module: &str, name: &str, value: &str) -> AppResult<()>;

    /// Lists all data items declared in `module`.
    async fn search_data(&self, task: &str, module: &str) -> AppResult<Vec<RapidData>>;

    /// Current program pointer, if one is set.
    async fn program_pointer(&self, task: &str) -> AppResult<Option<ProgramPosition>>;

    /// Moves the program pointer to `row` of `module`.
    async fn set_program_pointer(&self, task: &str, module: &str, row: usize) -> AppResult<()>;

    /// Moves the program pointer to the entry routine.
    async fn reset_program_pointer(&self, task: &str) -> AppResult<()>;

    /// Starts program execution.
    async fn start(&self) -> AppResult<()>;

    /// Current TCP pose.
    async fn current_robtarget(&self, task: &str) -> AppResult<CartesianPose>;

    /// Current joint angles.
    async fn current_jointtarget(&self, task: &str) -> AppResult<JointPose>;

    /// Subscribes to program and motion pointer changes.
    fn subscribe(&self) -> broadcast::Receiver<PointerEvent>;
}
