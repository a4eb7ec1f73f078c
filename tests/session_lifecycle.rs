//! Session lifecycle and deploy workflows against the simulated controller.

use std::path::Path;

use rust_toro::controller::deploy::{
    current_position, read_program_data, read_target_data, send_program, send_target,
    set_pointer, ProgramFiles,
};
use rust_toro::controller::session::DEFAULT_TASK;
use rust_toro::controller::{
    ControllerHandle, ControllerSession, LoadMode, MockController, OperatingMode, RapidValue,
    SessionState, UserInfo,
};
use rust_toro::error::{ErrorKind, ToroError};
use rust_toro::motion::{CartesianPose, JointPose};
use rust_toro::program::data::{tooldata, wobjdata};
use rust_toro::program::{Frames, ProgramModule, TargetCompiler};
use uuid::Uuid;

fn handle() -> ControllerHandle {
    ControllerHandle {
        system_id: Uuid::new_v4(),
        address: "127.0.0.1".to_string(),
        name: "sim-1".to_string(),
    }
}

fn session(mock: &MockController) -> ControllerSession<MockController> {
    ControllerSession::new(mock.clone(), UserInfo::default(), DEFAULT_TASK)
}

fn pose(x: f64, y: f64, z: f64) -> CartesianPose {
    CartesianPose::new([x, y, z], [0.0, 0.0, 1.0, 0.0])
}

fn module_text() -> String {
    let compiler = TargetCompiler::default();
    let set = compiler
        .move_l(
            &[pose(500.0, 0.0, 400.0), pose(500.0, 100.0, 400.0), pose(400.0, 100.0, 400.0)],
            &[100.0.into()],
            &[10.0.into()],
            "p",
            &Frames::new("tPen", "wTable"),
        )
        .expect("compile");
    let home = compiler
        .move_abs_j(
            &[JointPose::new([0.0, 0.0, 0.0, 0.0, 30.0, 0.0])],
            &["v1000".into()],
            &["fine".into()],
            "home",
            &Frames::default(),
        )
        .expect("compile");
    let mut module = ProgramModule::new();
    module
        .add_tool(tooldata("tPen", &pose(0.0, 0.0, 120.0), 0.5))
        .add_wobj(wobjdata("wTable", &pose(800.0, -200.0, 0.0)))
        .push_set(&set)
        .push_set(&home);
    module.render()
}

async fn program_files(dir: &Path) -> ProgramFiles {
    let files = ProgramFiles::in_dir(dir, "MainProgram.pgf", "MainModule");
    files.write(&module_text()).await.expect("write program");
    files
}

async fn deployed(mock: &MockController, dir: &Path) -> ControllerHandle {
    let h = handle();
    let files = program_files(dir).await;
    send_program(&mut session(mock), &h, &files)
        .await
        .expect("deploy");
    h
}

#[tokio::test]
async fn send_program_uploads_loads_and_starts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let files = program_files(dir.path()).await;
    let mut s = session(&mock);

    send_program(&mut s, &handle(), &files).await.expect("deploy");

    assert_eq!(mock.loaded_program().await.as_deref(), Some("MainProgram.pgf"));
    assert_eq!(mock.loaded_modules().await, vec!["MainModule".to_string()]);
    assert!(mock.stored_file("MainModule.mod").await.is_some());
    assert!(mock.is_running().await);
    assert_eq!(mock.mastership_grants().await, 1);
    assert!(!mock.holds_mastership().await);
    assert!(!mock.is_logged_on().await);
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn manual_mode_refuses_start_before_upload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    mock.set_operating_mode(OperatingMode::Manual).await;
    let files = program_files(dir.path()).await;
    let mut s = session(&mock);

    let err = send_program(&mut s, &handle(), &files)
        .await
        .expect_err("manual mode");

    assert!(matches!(err, ToroError::ModeError(OperatingMode::Manual)));
    assert_eq!(err.kind(), ErrorKind::Session);
    assert_eq!(mock.loaded_program().await, None);
    assert!(!mock.is_running().await);
    assert!(!mock.holds_mastership().await);
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn missing_files_fail_before_logon() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let files = ProgramFiles::in_dir(dir.path(), "MainProgram.pgf", "MainModule");

    let err = send_program(&mut session(&mock), &handle(), &files)
        .await
        .expect_err("nothing on disk");

    assert!(matches!(err, ToroError::FileNotFound(ref p) if p == &files.program));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(mock.mastership_grants().await, 0);
}

#[tokio::test]
async fn protocol_error_inside_scope_releases_mastership() {
    let mock = MockController::new();
    let mut s = session(&mock);
    s.logon(&handle()).await.expect("logon");

    let result = s
        .with_mastership(|s| Box::pin(async move { s.set_program_pointer("Missing", 4).await }))
        .await;

    let err = result.expect_err("module is not loaded");
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(s.state(), SessionState::LoggedOn);
    assert!(!mock.holds_mastership().await);
    assert!(mock.is_logged_on().await);

    s.logoff().await;
    assert!(!mock.is_logged_on().await);
}

#[tokio::test]
async fn release_failure_surfaces_when_operation_succeeds() {
    let mock = MockController::new();
    mock.fail_next_release().await;
    let mut s = session(&mock);
    s.logon(&handle()).await.expect("logon");

    let result = s
        .with_mastership(|s| Box::pin(async move { s.operating_mode().await }))
        .await;

    assert!(matches!(result, Err(ToroError::Protocol(_))));
    assert_eq!(s.state(), SessionState::LoggedOn);

    // The next scope works normally.
    let mode = s
        .with_mastership(|s| Box::pin(async move { s.operating_mode().await }))
        .await
        .expect("second scope");
    assert_eq!(mode, OperatingMode::Auto);
    s.logoff().await;
}

#[tokio::test]
async fn rejected_module_load_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let files = program_files(dir.path()).await;
    mock.reject_next_load("syntax error at line 12").await;

    let mut s = session(&mock);
    s.logon(&handle()).await.expect("logon");
    let module = files.module.clone();
    let err = s
        .with_mastership(move |s| {
            Box::pin(async move { s.upload_module(&module, LoadMode::Add).await })
        })
        .await
        .expect_err("rejected");

    match err {
        ToroError::LoadRejected { file, reason } => {
            assert_eq!(file, "MainModule.mod");
            assert!(reason.contains("line 12"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(mock.loaded_modules().await.is_empty());
    assert!(!mock.holds_mastership().await);
    s.logoff().await;
}

#[tokio::test]
async fn duplicate_module_in_add_mode_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = deployed(&mock, dir.path()).await;
    let module = dir.path().join("MainModule.mod");

    let mut s = session(&mock);
    let err = s
        .with_logon(&h, move |s| {
            Box::pin(async move {
                s.with_mastership(move |s| {
                    Box::pin(async move { s.upload_module(&module, LoadMode::Add).await })
                })
                .await
            })
        })
        .await
        .expect_err("already loaded");

    assert!(matches!(err, ToroError::LoadRejected { .. }));
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn logoff_is_idempotent() {
    let mock = MockController::new();
    let mut s = session(&mock);
    s.logoff().await;
    assert_eq!(s.state(), SessionState::Disconnected);

    s.logon(&handle()).await.expect("logon");
    assert_eq!(s.handle().map(|h| h.name.as_str()), Some("sim-1"));
    s.logoff().await;
    s.logoff().await;
    assert_eq!(s.state(), SessionState::Disconnected);
    assert!(s.handle().is_none());
    assert!(!mock.is_logged_on().await);
}

#[tokio::test]
async fn unreachable_controller_fails_logon() {
    let mock = MockController::new();
    mock.set_reachable(false).await;
    let mut s = session(&mock);

    let err = s.logon(&handle()).await.expect_err("unreachable");
    assert_eq!(err.kind(), ErrorKind::Session);
    assert_eq!(s.state(), SessionState::Disconnected);

    let err = current_position(&mut s, &handle())
        .await
        .expect_err("workflow needs logon");
    assert!(matches!(err, ToroError::Session(_)));
}

#[tokio::test]
async fn wrong_credentials_fail_logon() {
    let mock = MockController::new();
    let mut s = ControllerSession::new(mock.clone(), UserInfo::new("guest", "guest"), DEFAULT_TASK);
    let err = s.logon(&handle()).await.expect_err("rejected");
    assert!(err.to_string().contains("guest"));
    assert!(!mock.is_logged_on().await);
}

#[tokio::test]
async fn send_target_overwrites_named_robtarget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = deployed(&mock, dir.path()).await;

    let moved = pose(450.0, 50.0, 420.0);
    send_target(&mut session(&mock), &h, "MainModule", "p1", &moved.to_string())
        .await
        .expect("send target");

    assert_eq!(
        mock.data_value("MainModule", "p1").await,
        Some(moved.to_string())
    );
    assert!(mock.is_running().await);
    assert_eq!(mock.mastership_grants().await, 2);
}

#[tokio::test]
async fn typed_writes_check_symbol_and_type() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = deployed(&mock, dir.path()).await;
    let mut s = session(&mock);
    s.logon(&h).await.expect("logon");

    let err = s
        .with_mastership(|s| {
            Box::pin(async move {
                s.write_named_value("MainModule", "p0", &RapidValue::Num(3.0))
                    .await
            })
        })
        .await
        .expect_err("p0 is a robtarget");
    match err {
        ToroError::TypeMismatch { expected, found, .. } => {
            assert_eq!(expected, "robtarget");
            assert_eq!(found, "num");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = s
        .with_mastership(|s| {
            Box::pin(async move {
                s.write_named_text("MainModule", "p9", "[[1,2,3],[1,0,0,0],[0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]")
                    .await
            })
        })
        .await
        .expect_err("p9 does not exist");
    assert!(matches!(err, ToroError::SymbolNotFound { ref name, .. } if name == "p9"));

    assert!(!mock.holds_mastership().await);
    s.logoff().await;
}

#[tokio::test]
async fn reads_decode_declared_data() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = deployed(&mock, dir.path()).await;
    let mut s = session(&mock);

    let targets = read_target_data(&mut s, &h, "MainModule").await.expect("targets");
    let names: Vec<_> = targets.robtargets.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["p0", "p1", "p2"]);
    assert_eq!(targets.robtargets[1].1.position(), [500.0, 100.0, 400.0]);
    assert_eq!(targets.jointtargets.len(), 1);
    assert_eq!(targets.jointtargets[0].0, "home0");

    let data = read_program_data(&mut s, &h, "MainModule").await.expect("program data");
    let kinds: Vec<_> = data
        .iter()
        .map(|e| (e.rapid_type.as_str(), e.name.as_str()))
        .collect();
    assert_eq!(kinds, vec![("tooldata", "tPen"), ("wobjdata", "wTable")]);
    assert_eq!(data[0].value.rapid_type(), "tooldata");

    // Reads never take mastership.
    assert_eq!(mock.mastership_grants().await, 1);
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn malformed_target_value_fails_the_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = handle();
    let files = ProgramFiles::in_dir(dir.path(), "MainProgram.pgf", "MainModule");
    files
        .write("MODULE MainModule\n\tCONST robtarget p0:=[[1,2,3],[1,0,0,0]];\nENDMODULE\n")
        .await
        .expect("write program");
    send_program(&mut session(&mock), &h, &files)
        .await
        .expect("deploy");

    let mut s = session(&mock);
    let err = read_target_data(&mut s, &h, "MainModule")
        .await
        .expect_err("robtarget needs four groups");
    assert!(matches!(err, ToroError::InvalidLiteral { .. }));
    assert_eq!(s.state(), SessionState::Disconnected);
    assert!(!mock.is_logged_on().await);
}

#[tokio::test]
async fn pointer_and_position_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mock = MockController::new();
    let h = deployed(&mock, dir.path()).await;
    let mut s = session(&mock);

    set_pointer(&mut s, &h, "MainModule", 5).await.expect("set pointer");
    let pointer = s
        .with_logon(&h, |s| Box::pin(async move { s.program_pointer().await }))
        .await
        .expect("read pointer")
        .expect("pointer set");
    assert_eq!(pointer.module, "MainModule");
    assert_eq!(pointer.row, 5);

    let (tcp, joints) = current_position(&mut s, &h).await.expect("position");
    assert_eq!(tcp.position(), [600.0, 0.0, 800.0]);
    assert_eq!(joints.joints()[4], 30.0);

    mock.set_current_position(pose(1.0, 2.0, 3.0), JointPose::new([10.0; 6]))
        .await;
    let (tcp, joints) = current_position(&mut s, &h).await.expect("position");
    assert_eq!(tcp.position(), [1.0, 2.0, 3.0]);
    assert_eq!(joints.joints(), [10.0; 6]);
}
