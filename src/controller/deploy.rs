//! End-to-end controller workflows.
//!
//! Each workflow opens its own logon scope and, where it mutates controller state, a
//! mastership scope inside it. Both scopes are released on every exit path before the
//! result is returned.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::controller::session::{require_local_file, ControllerSession};
use crate::controller::transport::{ControllerHandle, ControllerTransport, LoadMode, OperatingMode};
use crate::controller::value::RapidValue;
use crate::error::{AppResult, ToroError};
use crate::motion::target::{CartesianPose, JointPose};
use crate::program::assembler::{program_descriptor, write_module};

/// Program descriptor and module file pair uploaded together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFiles {
    /// Program descriptor (`.pgf`).
    pub program: PathBuf,
    /// Module source (`.mod`).
    pub module: PathBuf,
}

impl ProgramFiles {
    /// `<dir>/<program_file>` and `<dir>/<module>.mod`.
    pub fn in_dir(dir: &Path, program_file: &str, module: &str) -> Self {
        Self {
            program: dir.join(program_file),
            module: dir.join(format!("{module}.mod")),
        }
    }

    /// Writes `module_text` and a matching program descriptor to disk.
    pub async fn write(&self, module_text: &str) -> AppResult<()> {
        let module_file = self
            .module
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ToroError::FileNotFound(self.module.clone()))?;
        write_module(&self.module, module_text).await?;
        write_module(&self.program, &program_descriptor(&[module_file.as_str()])).await
    }
}

/// A tool or work-object record read from the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramDataEntry {
    /// Declared type (`tooldata` or `wobjdata`).
    pub rapid_type: String,
    /// Symbol name.
    pub name: String,
    /// Decoded value.
    pub value: RapidValue,
}

/// Target constants read from a module, split by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetData {
    /// `robtarget` items in declaration order.
    pub robtargets: Vec<(String, CartesianPose)>,
    /// `jointtarget` items in declaration order.
    pub jointtargets: Vec<(String, JointPose)>,
}

async fn require_auto<T: ControllerTransport>(session: &ControllerSession<T>) -> AppResult<()> {
    match session.operating_mode().await? {
        OperatingMode::Auto => Ok(()),
        mode => Err(ToroError::ModeError(mode)),
    }
}

/// Uploads a program and its module, then starts execution from the entry routine.
///
/// The operating mode is checked before anything is transferred.
pub async fn send_program<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
    files: &ProgramFiles,
) -> AppResult<()> {
    for path in [&files.program, &files.module] {
        require_local_file(path).await?;
    }
    let files = files.clone();
    session
        .with_logon(handle, move |s| {
            Box::pin(async move {
                s.with_mastership(move |s| {
                    Box::pin(async move {
                        require_auto(s).await?;
                        s.upload_program(&files.program).await?;
                        s.upload_module(&files.module, LoadMode::Add).await?;
                        s.start_execution().await
                    })
                })
                .await
            })
        })
        .await?;
    info!(controller = %handle, "Program deployed and started");
    Ok(())
}

/// Overwrites a named robtarget and restarts execution.
///
/// `text` is the target literal; it must parse as a robtarget, and the remote item
/// must be declared as one.
pub async fn send_target<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
    module: &str,
    name: &str,
    text: &str,
) -> AppResult<()> {
    let value = RapidValue::RobTarget(text.parse()?);
    let module = module.to_string();
    let name = name.to_string();
    session
        .with_logon(handle, move |s| {
            Box::pin(async move {
                s.with_mastership(move |s| {
                    Box::pin(async move {
                        require_auto(s).await?;
                        s.write_named_value(&module, &name, &value).await?;
                        s.start_execution().await
                    })
                })
                .await
            })
        })
        .await
}

/// Moves the program pointer to `row` of `module`.
pub async fn set_pointer<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
    module: &str,
    row: usize,
) -> AppResult<()> {
    let module = module.to_string();
    session
        .with_logon(handle, move |s| {
            Box::pin(async move {
                s.with_mastership(move |s| {
                    Box::pin(async move { s.set_program_pointer(&module, row).await })
                })
                .await
            })
        })
        .await
}

/// Reads every robtarget and jointtarget declared in `module`.
///
/// # Errors
/// `InvalidLiteral` when a declared target's value cannot be decoded.
pub async fn read_target_data<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
    module: &str,
) -> AppResult<TargetData> {
    let module = module.to_string();
    session
        .with_logon(handle, move |s| {
            Box::pin(async move {
                let mut targets = TargetData::default();
                for item in s.search_data(&module).await? {
                    match item.rapid_type.as_str() {
                        "robtarget" => {
                            let pose = item.value.parse::<CartesianPose>()?;
                            targets.robtargets.push((item.name, pose));
                        }
                        "jointtarget" => {
                            let joints = item.value.parse::<JointPose>()?;
                            targets.jointtargets.push((item.name, joints));
                        }
                        _ => {}
                    }
                }
                Ok(targets)
            })
        })
        .await
}

/// Reads every tooldata and wobjdata declared in `module`.
pub async fn read_program_data<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
    module: &str,
) -> AppResult<Vec<ProgramDataEntry>> {
    let module = module.to_string();
    session
        .with_logon(handle, move |s| {
            Box::pin(async move {
                let mut entries = Vec::new();
                for item in s.search_data(&module).await? {
                    if item.rapid_type != "tooldata" && item.rapid_type != "wobjdata" {
                        continue;
                    }
                    let value = RapidValue::parse_as(&item.rapid_type, &item.value)?;
                    entries.push(ProgramDataEntry {
                        rapid_type: item.rapid_type,
                        name: item.name,
                        value,
                    });
                }
                Ok(entries)
            })
        })
        .await
}

/// Reads the current TCP pose and joint angles.
pub async fn current_position<T: ControllerTransport>(
    session: &mut ControllerSession<T>,
    handle: &ControllerHandle,
) -> AppResult<(CartesianPose, JointPose)> {
    session
        .with_logon(handle, |s| Box::pin(async move { s.current_position().await }))
        .await
}
