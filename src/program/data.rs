//! Builders for program-data declarations: speed, zone, load, tool, work-object,
//! motion-settings and stop-point records, plus work-zone shape definitions.
//!
//! Every builder returns a statement in the same `"\n\t<decl>;"` shape the compiler
//! emits, so the results can be concatenated straight into the data section.

use crate::motion::literal::format_number;
use crate::motion::target::{number_list, CartesianPose, JointPose};
use serde::{Deserialize, Serialize};

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// `VAR speeddata` with TCP, reorientation and external-axis speeds.
pub fn speeddata(name: &str, v_tcp: f64, v_ori: f64, v_leax: f64, v_reax: f64) -> String {
    format!(
        "\n\tVAR speeddata {name}:={};",
        number_list(&[v_tcp, v_ori, v_leax, v_reax])
    )
}

/// Fields of a `zonedata` record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneData {
    /// Fine point: the robot stops at the target.
    pub finep: bool,
    /// TCP path zone radius, mm.
    pub pzone_tcp: f64,
    /// Zone radius for tool reorientation, mm.
    pub pzone_ori: f64,
    /// Zone radius for external axes, mm.
    pub pzone_eax: f64,
    /// Reorientation zone, degrees.
    pub zone_ori: f64,
    /// Linear external axis zone, mm.
    pub zone_leax: f64,
    /// Rotating external axis zone, degrees.
    pub zone_reax: f64,
}

/// `VAR zonedata` declaration.
pub fn zonedata(name: &str, zone: &ZoneData) -> String {
    format!(
        "\n\tVAR zonedata {name}:=[{},{},{},{},{},{},{}];",
        flag(zone.finep),
        format_number(zone.pzone_tcp),
        format_number(zone.pzone_ori),
        format_number(zone.pzone_eax),
        format_number(zone.zone_ori),
        format_number(zone.zone_leax),
        format_number(zone.zone_reax),
    )
}

/// `PERS loaddata`: mass in kg, centre of gravity, axes of moment and inertia.
pub fn loaddata(name: &str, mass: f64, cog: [f64; 3], aom: [f64; 4], inertia: [f64; 3]) -> String {
    format!(
        "\n\tPERS loaddata {name}:=[{},{},{},{},{},{}];",
        format_number(mass),
        number_list(&cog),
        number_list(&aom),
        format_number(inertia[0]),
        format_number(inertia[1]),
        format_number(inertia[2]),
    )
}

/// `PERS confdata` declaration.
pub fn confdata(name: &str, cf1: i32, cf4: i32, cf6: i32, cfx: i32) -> String {
    format!("\n\tPERS confdata {name}:=[{cf1},{cf4},{cf6},{cfx}];")
}

/// `PERS tooldata` for a robot-held tool whose TCP sits at `frame`.
pub fn tooldata(name: &str, frame: &CartesianPose, mass: f64) -> String {
    format!(
        "\n\tPERS tooldata {name}:=[TRUE,{},[{},[0,0,0.001],[1,0,0,0],0,0,0]];",
        frame.frame_literal(),
        format_number(mass)
    )
}

/// `TASK PERS wobjdata` for a fixed work object with its user frame at `frame`.
pub fn wobjdata(name: &str, frame: &CartesianPose) -> String {
    format!(
        "\n\tTASK PERS wobjdata {name}:=[FALSE,TRUE,\"\",{},[[0,0,0],[1,0,0,0]]];",
        frame.frame_literal()
    )
}

/// Fields of a `motsetdata` record. `Default` matches the controller's power-on settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Velocity override, percent of programmed velocity.
    pub vel_oride: f64,
    /// Maximum TCP velocity, mm/s.
    pub vel_max: f64,
    /// Acceleration and deceleration, percent of normal.
    pub acc_acc: f64,
    /// Acceleration ramp, percent of normal.
    pub acc_ramp: f64,
    /// Wrist singularity avoidance.
    pub sing_wrist: bool,
    /// Arm singularity avoidance.
    pub sing_arm: bool,
    /// Base frame orientation kept fixed.
    pub sing_base: bool,
    /// Joint configuration supervision during joint moves.
    pub conf_jsup: bool,
    /// Joint configuration supervision during linear and circular moves.
    pub conf_lsup: bool,
    /// Permitted deviation of axis 1, degrees.
    pub conf_ax1: f64,
    /// Permitted deviation of axis 4, degrees.
    pub conf_ax4: f64,
    /// Permitted deviation of axis 6, degrees.
    pub conf_ax6: f64,
    /// Path resolution, percent of configured.
    pub pathresol: f64,
    /// Motion supervision on.
    pub motionsup: bool,
    /// Motion supervision tune value, percent.
    pub tunevalue: f64,
    /// TCP acceleration limit along the path, m/s². `None` disables it.
    pub accmax: Option<f64>,
    /// TCP deceleration limit along the path, m/s². `None` disables it.
    pub decelmax: Option<f64>,
    /// Circle reorientation mode (0 path frame, 1 object frame, 2 programmed).
    pub cirpathreori: u8,
    /// Acceleration limit in world coordinates, m/s². `None` disables it.
    pub worldaccmax: Option<f64>,
    /// Event buffer active.
    pub evtbufferact: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            vel_oride: 100.0,
            vel_max: 5000.0,
            acc_acc: 100.0,
            acc_ramp: 100.0,
            sing_wrist: false,
            sing_arm: false,
            sing_base: false,
            conf_jsup: true,
            conf_lsup: true,
            conf_ax1: 30.0,
            conf_ax4: 45.0,
            conf_ax6: 90.0,
            pathresol: 100.0,
            motionsup: true,
            tunevalue: 100.0,
            accmax: None,
            decelmax: None,
            cirpathreori: 0,
            worldaccmax: None,
            evtbufferact: true,
        }
    }
}

// Disabled limits are written as FALSE with a value of -1.
fn limit(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("TRUE,{}", format_number(v)),
        None => "FALSE,-1".to_string(),
    }
}

/// `VAR motsetdata` declaration.
pub fn motsetdata(name: &str, m: &MotionSettings) -> String {
    format!(
        "\n\tVAR motsetdata {name}:=[{},{},[{},{},{}],[{},{},{},{},{}],{},{},{},{},{},{},{},{}];",
        number_list(&[m.vel_oride, m.vel_max]),
        number_list(&[m.acc_acc, m.acc_ramp]),
        flag(m.sing_wrist),
        flag(m.sing_arm),
        flag(m.sing_base),
        flag(m.conf_jsup),
        flag(m.conf_lsup),
        format_number(m.conf_ax1),
        format_number(m.conf_ax4),
        format_number(m.conf_ax6),
        format_number(m.pathresol),
        flag(m.motionsup),
        format_number(m.tunevalue),
        limit(m.accmax),
        limit(m.decelmax),
        m.cirpathreori,
        limit(m.worldaccmax),
        flag(m.evtbufferact),
    )
}

/// How a stop point ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopPointKind {
    /// Stop when the in-position conditions hold.
    InPosition,
    /// Stop for a fixed time.
    StopTime,
    /// Follow time for fine points of a coordinated unit.
    FollowTime,
}

impl StopPointKind {
    fn keyword(self) -> &'static str {
        match self {
            StopPointKind::InPosition => "inpos",
            StopPointKind::StopTime => "stoptime",
            StopPointKind::FollowTime => "fllwtime",
        }
    }
}

/// Fields of a `stoppointdata` record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopPoint {
    /// End condition.
    pub kind: StopPointKind,
    /// Synchronize with program execution.
    pub progsynch: bool,
    /// In-position TCP distance condition, percent of fine.
    pub inpos_position: f64,
    /// In-position TCP speed condition, percent of fine.
    pub inpos_speed: f64,
    /// Minimum wait time, s.
    pub inpos_mintime: f64,
    /// Maximum wait time, s.
    pub inpos_maxtime: f64,
    /// Standstill time, s.
    pub stoptime: f64,
    /// Follow time, s.
    pub followtime: f64,
}

/// `VAR stoppointdata` declaration, without a signal condition.
pub fn stoppointdata(name: &str, stop: &StopPoint) -> String {
    format!(
        "\n\tVAR stoppointdata {name}:=[{},{},{},{},{},\"\",0,0];",
        stop.kind.keyword(),
        flag(stop.progsynch),
        number_list(&[
            stop.inpos_position,
            stop.inpos_speed,
            stop.inpos_mintime,
            stop.inpos_maxtime
        ]),
        format_number(stop.stoptime),
        format_number(stop.followtime),
    )
}

/// Whether a work zone guards its inside or its outside volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneSide {
    /// Supervise the volume inside the shape.
    Inside,
    /// Supervise the volume outside the shape.
    Outside,
}

impl ZoneSide {
    fn switch(self) -> &'static str {
        match self {
            ZoneSide::Inside => "\\Inside",
            ZoneSide::Outside => "\\Outside",
        }
    }
}

/// Declarations plus the instruction(s) that define one work zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkZone {
    /// Shape and point declarations for the data section.
    pub declarations: String,
    /// Definition statements for the routine body.
    pub instructions: String,
}

/// Box-shaped zone between two corner points.
pub fn wz_box(name: &str, side: ZoneSide, low: [f64; 3], high: [f64; 3]) -> WorkZone {
    WorkZone {
        declarations: format!(
            "\n\tVAR shapedata {name};\n\tCONST pos lo{name}:={};\n\tCONST pos hi{name}:={};",
            number_list(&low),
            number_list(&high)
        ),
        instructions: format!("\n\t\tWZBoxDef {},{name},lo{name},hi{name};", side.switch()),
    }
}

/// Vertical cylinder with its base centre at `center`.
pub fn wz_cylinder(name: &str, side: ZoneSide, center: [f64; 3], radius: f64, height: f64) -> WorkZone {
    WorkZone {
        declarations: format!(
            "\n\tVAR shapedata {name};\n\tCONST pos c{name}:={};\n\tCONST num r{name}:={};\n\tCONST num h{name}:={};",
            number_list(&center),
            format_number(radius),
            format_number(height)
        ),
        instructions: format!(
            "\n\t\tWZCylDef {},{name},c{name},r{name},h{name};",
            side.switch()
        ),
    }
}

/// Sphere around `center`.
pub fn wz_sphere(name: &str, side: ZoneSide, center: [f64; 3], radius: f64) -> WorkZone {
    WorkZone {
        declarations: format!(
            "\n\tVAR shapedata {name};\n\tCONST pos c{name}:={};\n\tCONST num r{name}:={};",
            number_list(&center),
            format_number(radius)
        ),
        instructions: format!("\n\t\tWZSphDef {},{name},c{name},r{name};", side.switch()),
    }
}

/// Joint-space limit zone, activated as a stationary supervision.
pub fn wz_lim_joint(name: &str, side: ZoneSide, low: &JointPose, high: &JointPose) -> WorkZone {
    WorkZone {
        declarations: format!(
            "\n\tVAR wzstationary wl{name};\n\tVAR shapedata js{name};\n\tCONST jointtarget lo{name}:={low};\n\tCONST jointtarget hi{name}:={high};"
        ),
        instructions: format!(
            "\n\t\tWZLimJointDef {},js{name},lo{name},hi{name};\n\t\tWZLimSup \\Stat,wl{name},js{name};",
            side.switch()
        ),
    }
}

/// Left-pads the rendered number with zeros up to `width` characters.
pub fn zero_pad_left(value: f64, width: usize) -> String {
    format!("{:0>width$}", format_number(value))
}

/// Right-pads the rendered number with zeros up to `width` characters.
pub fn zero_pad_right(value: f64, width: usize) -> String {
    format!("{:0<width$}", format_number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_records() {
        assert_eq!(
            speeddata("vSlow", 50.0, 500.0, 5000.0, 1000.0),
            "\n\tVAR speeddata vSlow:=[50,500,5000,1000];"
        );
        assert_eq!(confdata("c0", 0, -1, 1, 0), "\n\tPERS confdata c0:=[0,-1,1,0];");
        let zone = ZoneData {
            finep: false,
            pzone_tcp: 25.0,
            pzone_ori: 40.0,
            pzone_eax: 40.0,
            zone_ori: 10.0,
            zone_leax: 35.0,
            zone_reax: 5.0,
        };
        assert_eq!(
            zonedata("zCustom", &zone),
            "\n\tVAR zonedata zCustom:=[FALSE,25,40,40,10,35,5];"
        );
    }

    #[test]
    fn loaddata_groups_vectors() {
        assert_eq!(
            loaddata("load1", 5.0, [0.0, 0.0, 50.0], [1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
            "\n\tPERS loaddata load1:=[5,[0,0,50],[1,0,0,0],0,0,0];"
        );
    }

    #[test]
    fn tool_and_wobj_use_frame_only() {
        let frame = CartesianPose::new([0.0, 0.0, 150.0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            tooldata("tGripper", &frame, 2.5),
            "\n\tPERS tooldata tGripper:=[TRUE,[[0,0,150],[1,0,0,0]],[2.5,[0,0,0.001],[1,0,0,0],0,0,0]];"
        );
        assert_eq!(
            wobjdata("wTable", &frame),
            "\n\tTASK PERS wobjdata wTable:=[FALSE,TRUE,\"\",[[0,0,150],[1,0,0,0]],[[0,0,0],[1,0,0,0]]];"
        );
    }

    #[test]
    fn motion_settings_render_nested_groups() {
        assert_eq!(
            motsetdata("mSet", &MotionSettings::default()),
            "\n\tVAR motsetdata mSet:=[[100,5000],[100,100],[FALSE,FALSE,FALSE],[TRUE,TRUE,30,45,90],100,TRUE,100,FALSE,-1,FALSE,-1,0,FALSE,-1,TRUE];"
        );
        let limited = MotionSettings {
            vel_max: 1500.0,
            accmax: Some(2.5),
            cirpathreori: 1,
            ..MotionSettings::default()
        };
        let text = motsetdata("mSlow", &limited);
        assert!(text.starts_with("\n\tVAR motsetdata mSlow:=[[100,1500],"));
        assert!(text.contains(",100,TRUE,100,TRUE,2.5,FALSE,-1,1,FALSE,-1,TRUE];"));
        assert_eq!(text.matches('[').count(), text.matches(']').count());
    }

    #[test]
    fn stop_point_uses_keyword_and_empty_signal() {
        let stop = StopPoint {
            kind: StopPointKind::InPosition,
            progsynch: true,
            inpos_position: 25.0,
            inpos_speed: 40.0,
            inpos_mintime: 0.1,
            inpos_maxtime: 5.0,
            stoptime: 0.0,
            followtime: 0.0,
        };
        assert_eq!(
            stoppointdata("spInpos", &stop),
            "\n\tVAR stoppointdata spInpos:=[inpos,TRUE,[25,40,0.1,5],0,0,\"\",0,0];"
        );
        let timed = StopPoint {
            kind: StopPointKind::StopTime,
            progsynch: false,
            stoptime: 1.5,
            ..stop
        };
        assert!(stoppointdata("spWait", &timed).contains(":=[stoptime,FALSE,"));
        assert!(stoppointdata("spWait", &timed).contains("],1.5,0,"));
    }

    #[test]
    fn work_zones_reference_their_own_declarations() {
        let zone = wz_cylinder("Col", ZoneSide::Outside, [100.0, 0.0, 0.0], 50.0, 800.0);
        assert!(zone.declarations.contains("CONST pos cCol:=[100,0,0];"));
        assert!(zone.declarations.contains("CONST num hCol:=800;"));
        assert_eq!(zone.instructions, "\n\t\tWZCylDef \\Outside,Col,cCol,rCol,hCol;");

        let boxed = wz_box("Cell", ZoneSide::Inside, [0.0; 3], [1.0, 2.0, 3.0]);
        assert_eq!(boxed.instructions, "\n\t\tWZBoxDef \\Inside,Cell,loCell,hiCell;");

        let sphere = wz_sphere("Ball", ZoneSide::Inside, [0.0; 3], 10.0);
        assert!(sphere.instructions.starts_with("\n\t\tWZSphDef "));

        let lim = wz_lim_joint(
            "A1",
            ZoneSide::Outside,
            &JointPose::new([-90.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            &JointPose::new([90.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        );
        assert!(lim.declarations.contains("VAR wzstationary wlA1;"));
        assert!(lim.instructions.contains("WZLimSup \\Stat,wlA1,jsA1;"));
    }

    #[test]
    fn zero_padding() {
        assert_eq!(zero_pad_left(7.0, 3), "007");
        assert_eq!(zero_pad_right(0.5, 5), "0.500");
        assert_eq!(zero_pad_left(12345.0, 3), "12345");
    }
}
