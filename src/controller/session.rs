//! Controller session lifecycle and exclusive-write discipline.
//!
//! ```text
//! Disconnected --logon--> LoggedOn --mastership scope--> MastershipHeld
//!      ^                     |  ^                              |
//!      +------logoff---------+  +------- scope exit -----------+
//! ```
//!
//! Mastership is only ever held inside [`ControllerSession::with_mastership`], which
//! releases it on every exit path, including errors. Every state-mutating remote call
//! (module/program load, named-value write, program pointer, start) checks that the
//! session is inside such a scope before touching the controller.
//!
//! [`ControllerSession::with_logon`] gives the same guarantee for the logon itself, so
//! complete workflows nest as logon scope → mastership scope → operation.

use futures::future::BoxFuture;
use std::fmt;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::controller::transport::{
    ControllerHandle, ControllerTransport, LoadMode, OperatingMode, PointerEvent,
    ProgramPosition, RapidData, UserInfo,
};
use crate::controller::value::RapidValue;
use crate::error::{AppResult, ToroError};
use crate::motion::target::{CartesianPose, JointPose};

/// Default task name on single-robot controllers.
pub const DEFAULT_TASK: &str = "T_ROB1";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No logon, or logged off.
    Disconnected,
    /// Logged on without write access.
    LoggedOn,
    /// Logged on and holding mastership.
    MastershipHeld,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::LoggedOn => "LoggedOn",
            SessionState::MastershipHeld => "MastershipHeld",
        };
        f.write_str(name)
    }
}

/// One logical connection to one controller task.
///
/// Operations take `&mut self`, so a session serializes its own calls.
pub struct ControllerSession<T: ControllerTransport> {
    transport: T,
    user: UserInfo,
    task: String,
    state: SessionState,
    handle: Option<ControllerHandle>,
}

impl<T: ControllerTransport> ControllerSession<T> {
    /// Creates a disconnected session for `task` using `user` credentials.
    pub fn new(transport: T, user: UserInfo, task: impl Into<String>) -> Self {
        Self {
            transport,
            user,
            task: task.into(),
            state: SessionState::Disconnected,
            handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Controller this session is logged on to, if any.
    pub fn handle(&self) -> Option<&ControllerHandle> {
        self.handle.as_ref()
    }

    /// Task name used for task-scoped calls.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn require(&self, operation: &'static str, required: SessionState) -> AppResult<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(ToroError::InvalidSessionState {
                operation,
                required: match required {
                    SessionState::Disconnected => "Disconnected",
                    SessionState::LoggedOn => "LoggedOn",
                    SessionState::MastershipHeld => "MastershipHeld",
                },
                actual: self.state.to_string(),
            })
        }
    }

    fn require_connected(&self, operation: &'static str) -> AppResult<()> {
        match self.state {
            SessionState::LoggedOn | SessionState::MastershipHeld => Ok(()),
            SessionState::Disconnected => Err(ToroError::InvalidSessionState {
                operation,
                required: "LoggedOn",
                actual: self.state.to_string(),
            }),
        }
    }

    /// Logs on to `handle`.
    ///
    /// # Errors
    /// `Session` when the controller is unreachable or rejects the credentials;
    /// `InvalidSessionState` when already logged on.
    pub async fn logon(&mut self, handle: &ControllerHandle) -> AppResult<()> {
        self.require("logon", SessionState::Disconnected)?;
        self.transport.logon(handle, &self.user).await?;
        self.state = SessionState::LoggedOn;
        self.handle = Some(handle.clone());
        info!(controller = %handle, user = %self.user.name, "Logged on");
        Ok(())
    }

    /// Logs off. Always ends `Disconnected`; calling it again is a no-op.
    ///
    /// Releases mastership first if it is somehow still held. Transport failures during
    /// teardown are logged, not returned.
    pub async fn logoff(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if self.state == SessionState::MastershipHeld {
            if let Err(e) = self.transport.release_mastership().await {
                warn!(error = %e, "Mastership release failed during logoff");
            }
        }
        if let Err(e) = self.transport.logoff().await {
            warn!(error = %e, "Logoff failed; dropping session anyway");
        }
        self.state = SessionState::Disconnected;
        if let Some(handle) = self.handle.take() {
            info!(controller = %handle, "Logged off");
        }
    }

    /// Runs `op` while logged on to `handle`, logging off on every exit path.
    pub async fn with_logon<R, F>(&mut self, handle: &ControllerHandle, op: F) -> AppResult<R>
    where
        R: Send,
        F: for<'s> FnOnce(&'s mut Self) -> BoxFuture<'s, AppResult<R>> + Send,
    {
        self.logon(handle).await?;
        let result = op(self).await;
        self.logoff().await;
        result
    }

    /// Runs `op` while holding mastership, releasing it on every exit path.
    ///
    /// When `op` fails and the release fails too, the error from `op` is returned and
    /// the release failure is logged. The session is back in `LoggedOn` either way.
    pub async fn with_mastership<R, F>(&mut self, op: F) -> AppResult<R>
    where
        R: Send,
        F: for<'s> FnOnce(&'s mut Self) -> BoxFuture<'s, AppResult<R>> + Send,
    {
        self.require("acquire mastership", SessionState::LoggedOn)?;
        self.transport.request_mastership().await?;
        self.state = SessionState::MastershipHeld;
        debug!(task = %self.task, "Mastership acquired");

        let result = op(self).await;

        let released = self.transport.release_mastership().await;
        self.state = SessionState::LoggedOn;
        match (result, released) {
            (Ok(value), Ok(())) => {
                debug!(task = %self.task, "Mastership released");
                Ok(value)
            }
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(e), Ok(())) => {
                debug!(task = %self.task, error = %e, "Mastership released after failure");
                Err(e)
            }
            (Err(e), Err(release_err)) => {
                warn!(
                    error = %e,
                    release_error = %release_err,
                    "Mastership release failed after operation error"
                );
                Err(e)
            }
        }
    }

    /// Current operating mode.
    pub async fn operating_mode(&self) -> AppResult<OperatingMode> {
        self.require_connected("operating mode")?;
        self.transport.operating_mode().await
    }

    async fn transfer(&self, operation: &'static str, local: &Path) -> AppResult<String> {
        require_local_file(local).await?;
        self.require(operation, SessionState::MastershipHeld)?;
        let remote_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ToroError::FileNotFound(local.to_path_buf()))?;
        self.transport.put_file(local, &remote_name, true).await?;
        debug!(local = %local.display(), remote = %remote_name, "Transferred file");
        Ok(remote_name)
    }

    /// Transfers a module file and loads it into the task.
    ///
    /// The local file is checked before the session state or the controller.
    ///
    /// # Errors
    /// `FileNotFound` for a missing local file, `Io` when it cannot be inspected,
    /// `LoadRejected` when the controller refuses the module.
    pub async fn upload_module(&mut self, local: &Path, mode: LoadMode) -> AppResult<()> {
        let remote_name = self.transfer("upload module", local).await?;
        self.transport.load_module(&self.task, &remote_name, mode).await?;
        info!(module = %remote_name, ?mode, "Module loaded");
        Ok(())
    }

    /// Transfers a program descriptor and loads it, replacing the task's program.
    pub async fn upload_program(&mut self, local: &Path) -> AppResult<()> {
        let remote_name = self.transfer("upload program", local).await?;
        self.transport
            .load_program(&self.task, &remote_name, LoadMode::Replace)
            .await?;
        info!(program = %remote_name, "Program loaded");
        Ok(())
    }

    /// Resets the program pointer to the entry routine and starts execution.
    ///
    /// # Errors
    /// `ModeError` unless the controller is in automatic mode; remote start in manual
    /// mode is refused, not retried.
    pub async fn start_execution(&mut self) -> AppResult<()> {
        self.require("start execution", SessionState::MastershipHeld)?;
        let mode = self.transport.operating_mode().await?;
        if mode != OperatingMode::Auto {
            return Err(ToroError::ModeError(mode));
        }
        self.transport.reset_program_pointer(&self.task).await?;
        self.transport.start().await?;
        info!(task = %self.task, "Execution started");
        Ok(())
    }

    async fn lookup(&self, module: &str, name: &str) -> AppResult<RapidData> {
        self.transport
            .get_data(&self.task, module, name)
            .await?
            .ok_or_else(|| ToroError::SymbolNotFound {
                module: module.to_string(),
                name: name.to_string(),
            })
    }

    /// Writes `value` into the named data item after checking its declared type.
    ///
    /// # Errors
    /// `SymbolNotFound` when no such item exists, `TypeMismatch` when the item's type
    /// differs from the value's.
    pub async fn write_named_value(
        &mut self,
        module: &str,
        name: &str,
        value: &RapidValue,
    ) -> AppResult<()> {
        self.require("write named value", SessionState::MastershipHeld)?;
        let current = self.lookup(module, name).await?;
        if !value.fits(&current.rapid_type) {
            return Err(ToroError::TypeMismatch {
                name: name.to_string(),
                expected: current.rapid_type,
                found: value.rapid_type().to_string(),
            });
        }
        self.transport
            .set_data(&self.task, module, name, &value.to_string())
            .await?;
        debug!(module, name, rapid_type = value.rapid_type(), "Wrote named value");
        Ok(())
    }

    /// Writes a value given in literal form; its kind is inferred from the text.
    pub async fn write_named_text(&mut self, module: &str, name: &str, text: &str) -> AppResult<()> {
        let value: RapidValue = text.parse()?;
        self.write_named_value(module, name, &value).await
    }

    /// Reads and decodes a named data item.
    pub async fn read_named_value(&self, module: &str, name: &str) -> AppResult<RapidValue> {
        self.require_connected("read named value")?;
        let data = self.lookup(module, name).await?;
        RapidValue::parse_as(&data.rapid_type, &data.value)
    }

    /// Lists every data item declared in `module`.
    pub async fn search_data(&self, module: &str) -> AppResult<Vec<RapidData>> {
        self.require_connected("search data")?;
        self.transport.search_data(&self.task, module).await
    }

    /// Moves the program pointer to `row` of `module`.
    pub async fn set_program_pointer(&mut self, module: &str, row: usize) -> AppResult<()> {
        self.require("set program pointer", SessionState::MastershipHeld)?;
        self.transport
            .set_program_pointer(&self.task, module, row)
            .await?;
        debug!(module, row, "Program pointer set");
        Ok(())
    }

    /// Current program pointer.
    pub async fn program_pointer(&self) -> AppResult<Option<ProgramPosition>> {
        self.require_connected("program pointer")?;
        self.transport.program_pointer(&self.task).await
    }

    /// Current TCP pose and joint angles.
    pub async fn current_position(&self) -> AppResult<(CartesianPose, JointPose)> {
        self.require_connected("current position")?;
        let pose = self.transport.current_robtarget(&self.task).await?;
        let joints = self.transport.current_jointtarget(&self.task).await?;
        Ok((pose, joints))
    }

    /// Subscribes to pointer-change notifications.
    pub fn subscribe_pointers(&self) -> AppResult<broadcast::Receiver<PointerEvent>> {
        self.require_connected("subscribe pointers")?;
        Ok(self.transport.subscribe())
    }
}

/// Fails with `FileNotFound` when `local` does not exist; other metadata failures
/// surface as `Io`.
pub(crate) async fn require_local_file(local: &Path) -> AppResult<()> {
    match tokio::fs::metadata(local).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToroError::FileNotFound(local.to_path_buf()))
        }
        Err(e) => Err(ToroError::Io(e)),
    }
}

impl<T: ControllerTransport> fmt::Debug for ControllerSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSession")
            .field("task", &self.task)
            .field("state", &self.state)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::MockController;
    use tracing_test::traced_test;
    use uuid::Uuid;

    fn handle() -> ControllerHandle {
        ControllerHandle {
            system_id: Uuid::nil(),
            address: "127.0.0.1".into(),
            name: "sim".into(),
        }
    }

    fn session(mock: &MockController) -> ControllerSession<MockController> {
        ControllerSession::new(mock.clone(), UserInfo::default(), DEFAULT_TASK)
    }

    #[tokio::test]
    async fn mutations_outside_scope_are_refused() {
        let mock = MockController::new();
        let mut s = session(&mock);

        let err = s.start_execution().await.expect_err("disconnected");
        assert!(matches!(err, ToroError::InvalidSessionState { .. }));

        s.logon(&handle()).await.expect("logon");
        let err = s.set_program_pointer("MainModule", 1).await.expect_err("no mastership");
        assert!(matches!(
            err,
            ToroError::InvalidSessionState { required: "MastershipHeld", .. }
        ));
        assert_eq!(mock.mastership_grants().await, 0);
        s.logoff().await;
    }

    #[tokio::test]
    async fn second_logon_is_refused() {
        let mock = MockController::new();
        let mut s = session(&mock);
        s.logon(&handle()).await.expect("logon");
        let err = s.logon(&handle()).await.expect_err("already on");
        assert!(matches!(err, ToroError::InvalidSessionState { operation: "logon", .. }));
        assert_eq!(s.state(), SessionState::LoggedOn);
        s.logoff().await;
    }

    #[tokio::test]
    async fn nested_mastership_scope_is_refused() {
        let mock = MockController::new();
        let mut s = session(&mock);
        s.logon(&handle()).await.expect("logon");
        let result = s
            .with_mastership(|s| {
                Box::pin(async move { s.with_mastership(|_| Box::pin(async { Ok(()) })).await })
            })
            .await;
        assert!(matches!(result, Err(ToroError::InvalidSessionState { .. })));
        assert_eq!(s.state(), SessionState::LoggedOn);
        assert!(!mock.holds_mastership().await);
        assert_eq!(mock.mastership_grants().await, 1);
        s.logoff().await;
    }

    #[tokio::test]
    async fn missing_module_file_is_reported_before_mastership() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("Missing.mod");
        let mock = MockController::new();
        let mut s = session(&mock);
        s.logon(&handle()).await.expect("logon");

        let err = s
            .upload_module(&missing, LoadMode::Add)
            .await
            .expect_err("missing file");
        assert!(matches!(err, ToroError::FileNotFound(ref p) if *p == missing));
        assert_eq!(mock.mastership_grants().await, 0);

        let err = s
            .with_mastership(move |s| {
                Box::pin(async move { s.upload_module(&missing, LoadMode::Add).await })
            })
            .await
            .expect_err("missing file");
        assert!(matches!(err, ToroError::FileNotFound(_)));
        assert!(mock.stored_file("Missing.mod").await.is_none());
        assert!(!mock.holds_mastership().await);
        s.logoff().await;
    }

    #[tokio::test]
    async fn uninspectable_path_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "not a directory").expect("write");

        let err = require_local_file(&plain.join("MainModule.mod"))
            .await
            .expect_err("parent is a file");
        assert!(matches!(err, ToroError::Io(_)));
        assert!(require_local_file(&plain).await.is_ok());
    }

    #[tokio::test]
    async fn num_value_writes_into_dnum_item() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Counters.mod");
        std::fs::write(&path, "MODULE Counters\n\tVAR dnum total:=0;\nENDMODULE\n")
            .expect("write");
        let mock = MockController::new();
        let mut s = session(&mock);
        s.logon(&handle()).await.expect("logon");

        s.with_mastership(move |s| {
            Box::pin(async move {
                s.upload_module(&path, LoadMode::Add).await?;
                s.write_named_value("Counters", "total", &RapidValue::Num(42.0))
                    .await
            })
        })
        .await
        .expect("dnum write");

        assert_eq!(mock.data_value("Counters", "total").await.as_deref(), Some("42"));
        assert_eq!(
            s.read_named_value("Counters", "total").await.expect("read"),
            RapidValue::Num(42.0)
        );
        s.logoff().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn release_failure_behind_operation_error_is_logged() {
        let mock = MockController::new();
        mock.fail_next_release().await;
        let mut s = session(&mock);
        s.logon(&handle()).await.expect("logon");

        let err = s
            .with_mastership(|s| Box::pin(async move { s.set_program_pointer("Nowhere", 3).await }))
            .await
            .expect_err("module not loaded");

        assert!(err.to_string().contains("Nowhere"));
        assert_eq!(s.state(), SessionState::LoggedOn);
        assert!(logs_contain("Mastership release failed after operation error"));
        s.logoff().await;
    }
}
