//! In-memory simulated controller.
//!
//! `MockController` implements [`ControllerTransport`] without any network. It keeps a
//! file store, a set of loaded modules with their declared data, a program pointer and a
//! pointer-event channel. Loading a module scans its text for data declarations so that
//! named-value reads and writes behave like a real controller.
//!
//! Unlike the session, the mock enforces mastership itself, so a session that skipped its
//! scope would see the same `Protocol` refusal a real controller gives.
//!
//! Failure injection:
//! - `set_reachable(false)` makes logon fail
//! - `set_operating_mode(Manual)` makes remote start refused
//! - `reject_next_load(reason)` makes the next module/program load fail
//! - `fail_next_release()` makes the next mastership release fail

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use crate::controller::transport::{
    ControllerHandle, ControllerTransport, LoadMode, OperatingMode, PointerEvent, PointerKind,
    ProgramPosition, RapidData, UserInfo,
};
use crate::error::{AppResult, ToroError};
use crate::motion::target::{CartesianPose, JointPose};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct LoadedModule {
    name: String,
    data: Vec<RapidData>,
}

#[derive(Debug)]
struct MockState {
    reachable: bool,
    credentials: UserInfo,
    mode: OperatingMode,
    reject_next_load: Option<String>,
    fail_next_release: bool,
    logged_on: bool,
    mastership: bool,
    mastership_grants: usize,
    files: HashMap<String, String>,
    program: Option<String>,
    modules: Vec<LoadedModule>,
    pointer: Option<ProgramPosition>,
    running: bool,
    robtarget: CartesianPose,
    jointtarget: JointPose,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            reachable: true,
            credentials: UserInfo::default(),
            mode: OperatingMode::Auto,
            reject_next_load: None,
            fail_next_release: false,
            logged_on: false,
            mastership: false,
            mastership_grants: 0,
            files: HashMap::new(),
            program: None,
            modules: Vec::new(),
            pointer: None,
            running: false,
            robtarget: CartesianPose::new([600.0, 0.0, 800.0], [0.0, 0.0, 1.0, 0.0]),
            jointtarget: JointPose::new([0.0, 0.0, 0.0, 0.0, 30.0, 0.0]),
        }
    }
}

impl MockState {
    fn require_logged_on(&self) -> AppResult<()> {
        if self.logged_on {
            Ok(())
        } else {
            Err(ToroError::Session("not logged on".to_string()))
        }
    }

    fn require_mastership(&self, operation: &str) -> AppResult<()> {
        self.require_logged_on()?;
        if self.mastership {
            Ok(())
        } else {
            Err(ToroError::Protocol(format!("{operation} requires mastership")))
        }
    }

    fn module(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

fn module_header() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*MODULE\s+(\w+)").ok())
        .as_ref()
}

fn declaration() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:(?:LOCAL|TASK)\s+)?(?:CONST|VAR|PERS)\s+(\w+)\s+(\w+)\s*(?::=\s*(.*?))?;\s*$",
        )
        .ok()
    })
    .as_ref()
}

/// Parses module text into its name and declared data.
fn scan_module(text: &str) -> Result<LoadedModule, String> {
    let (Some(header), Some(declaration)) = (module_header(), declaration()) else {
        return Err("declaration scanner unavailable".to_string());
    };
    let name = header
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| "missing MODULE header".to_string())?;
    if !text.contains("ENDMODULE") {
        return Err(format!("module '{name}' is not terminated"));
    }
    let data = declaration
        .captures_iter(text)
        .map(|c| RapidData {
            module: name.clone(),
            rapid_type: c[1].to_string(),
            name: c[2].to_string(),
            value: c.get(3).map(|v| v.as_str().trim().to_string()).unwrap_or_default(),
        })
        .collect();
    Ok(LoadedModule { name, data })
}

/// Simulated controller. Clones share state.
#[derive(Clone)]
pub struct MockController {
    state: Arc<RwLock<MockState>>,
    events: broadcast::Sender<PointerEvent>,
}

impl MockController {
    /// Reachable controller in automatic mode with factory credentials.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            events,
        }
    }

    /// Makes logon succeed or fail as unreachable.
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.write().await.reachable = reachable;
    }

    /// Replaces the accepted credentials.
    pub async fn set_credentials(&self, user: UserInfo) {
        self.state.write().await.credentials = user;
    }

    /// Sets the reported operating mode.
    pub async fn set_operating_mode(&self, mode: OperatingMode) {
        self.state.write().await.mode = mode;
    }

    /// Rejects the next module or program load with `reason`.
    pub async fn reject_next_load(&self, reason: impl Into<String>) {
        self.state.write().await.reject_next_load = Some(reason.into());
    }

    /// Fails the next mastership release (mastership is still dropped).
    pub async fn fail_next_release(&self) {
        self.state.write().await.fail_next_release = true;
    }

    /// Sets the pose reported as the current position.
    pub async fn set_current_position(&self, pose: CartesianPose, joints: JointPose) {
        let mut state = self.state.write().await;
        state.robtarget = pose;
        state.jointtarget = joints;
    }

    /// Publishes a pointer event; returns the number of subscribers that received it.
    ///
    /// A program pointer event also moves the reported program pointer.
    pub async fn emit_pointer(&self, kind: PointerKind, module: &str, row: usize) -> usize {
        if kind == PointerKind::Program {
            let mut state = self.state.write().await;
            state.pointer = Some(ProgramPosition {
                module: module.to_string(),
                routine: "rStart".to_string(),
                row,
            });
        }
        trace!(?kind, module, row, "Mock pointer event");
        self.events
            .send(PointerEvent {
                kind,
                module: module.to_string(),
                row,
            })
            .unwrap_or(0)
    }

    /// Whether a client is logged on.
    pub async fn is_logged_on(&self) -> bool {
        self.state.read().await.logged_on
    }

    /// Whether mastership is currently held.
    pub async fn holds_mastership(&self) -> bool {
        self.state.read().await.mastership
    }

    /// How many times mastership has been granted.
    pub async fn mastership_grants(&self) -> usize {
        self.state.read().await.mastership_grants
    }

    /// Names of loaded modules, in load order.
    pub async fn loaded_modules(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .modules
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    /// Name of the loaded program descriptor, if any.
    pub async fn loaded_program(&self) -> Option<String> {
        self.state.read().await.program.clone()
    }

    /// Content of a file in controller storage.
    pub async fn stored_file(&self, remote_name: &str) -> Option<String> {
        self.state.read().await.files.get(remote_name).cloned()
    }

    /// Whether execution has been started.
    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    /// Raw stored value of a data item.
    pub async fn data_value(&self, module: &str, name: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .module(module)?
            .data
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.clone())
    }

    fn load_text(state: &mut MockState, remote_name: &str, mode: LoadMode) -> AppResult<()> {
        if let Some(reason) = state.reject_next_load.take() {
            return Err(ToroError::LoadRejected {
                file: remote_name.to_string(),
                reason,
            });
        }
        let text = state
            .files
            .get(remote_name)
            .ok_or_else(|| ToroError::Protocol(format!("no file '{remote_name}' in storage")))?;
        let module = scan_module(text).map_err(|reason| ToroError::LoadRejected {
            file: remote_name.to_string(),
            reason,
        })?;
        let existing = state.modules.iter().position(|m| m.name == module.name);
        match (existing, mode) {
            (Some(_), LoadMode::Add) => {
                return Err(ToroError::LoadRejected {
                    file: remote_name.to_string(),
                    reason: format!("module '{}' already loaded", module.name),
                })
            }
            (Some(i), LoadMode::Replace) => state.modules[i] = module,
            (None, _) => state.modules.push(module),
        }
        Ok(())
    }
}

impl Default for MockController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControllerTransport for MockController {
    async fn logon(&self, handle: &ControllerHandle, user: &UserInfo) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.reachable {
            return Err(ToroError::Session(format!("controller {handle} is unreachable")));
        }
        if *user != state.credentials {
            return Err(ToroError::Session(format!(
                "credentials rejected for user '{}'",
                user.name
            )));
        }
        state.logged_on = true;
        debug!(controller = %handle, "Mock logon");
        Ok(())
    }

    async fn logoff(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.logged_on = false;
        state.mastership = false;
        Ok(())
    }

    async fn request_mastership(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_logged_on()?;
        if state.mastership {
            return Err(ToroError::Protocol("mastership already held".to_string()));
        }
        state.mastership = true;
        state.mastership_grants += 1;
        Ok(())
    }

    async fn release_mastership(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.mastership = false;
        if std::mem::take(&mut state.fail_next_release) {
            return Err(ToroError::Protocol("mastership release timed out".to_string()));
        }
        Ok(())
    }

    async fn operating_mode(&self) -> AppResult<OperatingMode> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state.mode)
    }

    async fn put_file(&self, local: &Path, remote_name: &str, overwrite: bool) -> AppResult<()> {
        let text = tokio::fs::read_to_string(local).await?;
        let mut state = self.state.write().await;
        state.require_logged_on()?;
        if !overwrite && state.files.contains_key(remote_name) {
            return Err(ToroError::Protocol(format!("'{remote_name}' already exists")));
        }
        state.files.insert(remote_name.to_string(), text);
        Ok(())
    }

    async fn load_program(&self, _task: &str, remote_name: &str, mode: LoadMode) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("load program")?;
        if let Some(reason) = state.reject_next_load.take() {
            return Err(ToroError::LoadRejected {
                file: remote_name.to_string(),
                reason,
            });
        }
        if !state.files.contains_key(remote_name) {
            return Err(ToroError::Protocol(format!("no file '{remote_name}' in storage")));
        }
        if mode == LoadMode::Replace {
            state.modules.clear();
            state.pointer = None;
        }
        state.program = Some(remote_name.to_string());
        Ok(())
    }

    async fn load_module(&self, _task: &str, remote_name: &str, mode: LoadMode) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("load module")?;
        Self::load_text(&mut state, remote_name, mode)
    }

    async fn get_data(
        &self,
        _task: &str,
        module: &str,
        name: &str,
    ) -> AppResult<Option<RapidData>> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state
            .module(module)
            .and_then(|m| m.data.iter().find(|d| d.name == name))
            .cloned())
    }

    async fn set_data(&self, _task: &str, module: &str, name: &str, value: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("write data")?;
        let item = state
            .modules
            .iter_mut()
            .find(|m| m.name == module)
            .and_then(|m| m.data.iter_mut().find(|d| d.name == name))
            .ok_or_else(|| ToroError::SymbolNotFound {
                module: module.to_string(),
                name: name.to_string(),
            })?;
        item.value = value.to_string();
        Ok(())
    }

    async fn search_data(&self, _task: &str, module: &str) -> AppResult<Vec<RapidData>> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state.module(module).map(|m| m.data.clone()).unwrap_or_default())
    }

    async fn program_pointer(&self, _task: &str) -> AppResult<Option<ProgramPosition>> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state.pointer.clone())
    }

    async fn set_program_pointer(&self, _task: &str, module: &str, row: usize) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("set program pointer")?;
        if state.module(module).is_none() {
            return Err(ToroError::Protocol(format!("module '{module}' is not loaded")));
        }
        state.pointer = Some(ProgramPosition {
            module: module.to_string(),
            routine: "rStart".to_string(),
            row,
        });
        Ok(())
    }

    async fn reset_program_pointer(&self, _task: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("reset program pointer")?;
        let entry = state
            .modules
            .first()
            .map(|m| m.name.clone())
            .ok_or_else(|| ToroError::Protocol("no module loaded".to_string()))?;
        state.pointer = Some(ProgramPosition {
            module: entry,
            routine: "main".to_string(),
            row: 0,
        });
        Ok(())
    }

    async fn start(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.require_mastership("start")?;
        if state.mode != OperatingMode::Auto {
            return Err(ToroError::ModeError(state.mode));
        }
        state.running = true;
        Ok(())
    }

    async fn current_robtarget(&self, _task: &str) -> AppResult<CartesianPose> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state.robtarget)
    }

    async fn current_jointtarget(&self, _task: &str) -> AppResult<JointPose> {
        let state = self.state.read().await;
        state.require_logged_on()?;
        Ok(state.jointtarget)
    }

    fn subscribe(&self) -> broadcast::Receiver<PointerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_declarations() {
        let text = "MODULE MainModule\n\tPERS tooldata t1:=[TRUE,[[0,0,0],[1,0,0,0]],[1,[0,0,0.001],[1,0,0,0],0,0,0]];\n\tVAR shapedata zone1;\n\tCONST robtarget p0:=[[1,2,3],[1,0,0,0],[0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]];\n\tVAR num ax0:=90;\nENDMODULE\n";
        let module = scan_module(text).expect("scan");
        assert_eq!(module.name, "MainModule");
        let names: Vec<_> = module.data.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["t1", "zone1", "p0", "ax0"]);
        assert_eq!(module.data[1].value, "");
        assert_eq!(module.data[3].rapid_type, "num");
        assert_eq!(module.data[3].value, "90");
    }

    #[test]
    fn scan_rejects_headerless_text() {
        assert!(scan_module("PROC main()\nENDPROC\n").is_err());
        assert!(scan_module("MODULE Broken\n").is_err());
    }

    #[tokio::test]
    async fn mutating_calls_need_mastership() {
        let mock = MockController::new();
        let handle = ControllerHandle {
            system_id: uuid::Uuid::nil(),
            address: "127.0.0.1".into(),
            name: "mock".into(),
        };
        mock.logon(&handle, &UserInfo::default()).await.expect("logon");
        assert!(matches!(mock.start().await, Err(ToroError::Protocol(_))));
        mock.request_mastership().await.expect("grant");
        assert!(matches!(
            mock.request_mastership().await,
            Err(ToroError::Protocol(_))
        ));
    }
}
