//! Target compilation: one declaration and one instruction per target.
//!
//! The [`TargetCompiler`] walks a target list in order and pairs each target with a
//! speed and zone drawn from parallel parameter lists. Short parameter lists cycle to
//! their first entry (see [`broadcast`](crate::program::broadcast::broadcast)). Numeric
//! parameters are quantized through the compiler's catalogs; symbolic ones pass through.
//!
//! Every declaration and instruction produced for index `i` names its data
//! `<set_name><i>` (`MoveC` declares a `cir`/`to` prefixed pair), so the two lists stay
//! index-aligned with the input targets. Targets are validated before anything is emitted.

use crate::error::{AppResult, ToroError};
use crate::motion::catalog::{MotionCatalog, MotionParameter};
use crate::motion::literal::format_number;
use crate::motion::target::{CartesianPose, JointPose, MotionTarget};
use crate::program::broadcast::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Instruction kinds the compiler can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Linear TCP move.
    MoveL,
    /// Joint-interpolated move to a Cartesian pose.
    MoveJ,
    /// Absolute joint move.
    MoveAbsJ,
    /// Circular move through a via point.
    MoveC,
    /// Independent axis absolute move.
    IndAMove,
    /// Independent axis reset.
    IndReset,
    /// Caller-supplied statement.
    Custom,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::MoveL => "MoveL",
            Opcode::MoveJ => "MoveJ",
            Opcode::MoveAbsJ => "MoveAbsJ",
            Opcode::MoveC => "MoveC",
            Opcode::IndAMove => "IndAMove",
            Opcode::IndReset => "IndReset",
            Opcode::Custom => "Custom",
        };
        f.write_str(name)
    }
}

/// A data declaration emitted alongside an instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    /// Sequence index shared with the paired instruction.
    pub index: usize,
    /// Symbols declared by `text`, in order: `<set_name><index>`, or the
    /// `cir`/`to` pair for `MoveC`.
    pub names: Vec<String>,
    /// Declaration statement text, ready for the data section.
    pub text: String,
}

/// A single instruction statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    /// Sequence index within its compiled set.
    pub index: usize,
    /// Instruction kind.
    pub opcode: Opcode,
    /// Resolved speed symbol, where the instruction takes one.
    pub speed: Option<String>,
    /// Resolved zone symbol, where the instruction takes one.
    pub zone: Option<String>,
    /// Statement text, ready for the routine body.
    pub text: String,
}

/// Index-aligned declarations and instructions produced from one target list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledSet {
    /// One entry per target, in target order. Empty for reset/custom sets.
    pub declarations: Vec<Declaration>,
    /// One entry per target, in target order.
    pub instructions: Vec<Instruction>,
}

impl CompiledSet {
    /// Declaration statement texts in order.
    pub fn declaration_texts(&self) -> Vec<String> {
        self.declarations.iter().map(|d| d.text.clone()).collect()
    }

    /// Instruction statement texts in order.
    pub fn instruction_texts(&self) -> Vec<String> {
        self.instructions.iter().map(|i| i.text.clone()).collect()
    }

    /// Appends another set after this one.
    pub fn extend(&mut self, other: CompiledSet) {
        self.declarations.extend(other.declarations);
        self.instructions.extend(other.instructions);
    }
}

/// Active tool and work object for a block of moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frames {
    /// Tool data name, e.g. `tool0`.
    pub tool: String,
    /// Work-object data name, e.g. `wobj0`.
    pub wobj: String,
}

impl Frames {
    /// Convenience constructor.
    pub fn new(tool: impl Into<String>, wobj: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            wobj: wobj.into(),
        }
    }
}

impl Default for Frames {
    fn default() -> Self {
        Self::new("tool0", "wobj0")
    }
}

/// Compiles target lists into declaration/instruction pairs.
#[derive(Debug, Clone)]
pub struct TargetCompiler {
    speeds: MotionCatalog,
    zones: MotionCatalog,
}

impl Default for TargetCompiler {
    fn default() -> Self {
        Self::new(MotionCatalog::standard_speeds(), MotionCatalog::standard_zones())
    }
}

impl TargetCompiler {
    /// Creates a compiler quantizing through the given catalogs.
    pub fn new(speeds: MotionCatalog, zones: MotionCatalog) -> Self {
        Self { speeds, zones }
    }

    /// Speed catalog in use.
    pub fn speed_catalog(&self) -> &MotionCatalog {
        &self.speeds
    }

    /// Zone catalog in use.
    pub fn zone_catalog(&self) -> &MotionCatalog {
        &self.zones
    }

    /// Linear moves to Cartesian targets.
    pub fn move_l(
        &self,
        targets: &[CartesianPose],
        speeds: &[MotionParameter],
        zones: &[MotionParameter],
        set_name: &str,
        frames: &Frames,
    ) -> AppResult<CompiledSet> {
        let targets: Vec<MotionTarget> = targets.iter().copied().map(Into::into).collect();
        self.compile_moves(Opcode::MoveL, &targets, speeds, zones, set_name, frames)
    }

    /// Joint-interpolated moves to Cartesian targets.
    pub fn move_j(
        &self,
        targets: &[CartesianPose],
        speeds: &[MotionParameter],
        zones: &[MotionParameter],
        set_name: &str,
        frames: &Frames,
    ) -> AppResult<CompiledSet> {
        let targets: Vec<MotionTarget> = targets.iter().copied().map(Into::into).collect();
        self.compile_moves(Opcode::MoveJ, &targets, speeds, zones, set_name, frames)
    }

    /// Absolute joint moves.
    pub fn move_abs_j(
        &self,
        targets: &[JointPose],
        speeds: &[MotionParameter],
        zones: &[MotionParameter],
        set_name: &str,
        frames: &Frames,
    ) -> AppResult<CompiledSet> {
        let targets: Vec<MotionTarget> = targets.iter().copied().map(Into::into).collect();
        self.compile_moves(Opcode::MoveAbsJ, &targets, speeds, zones, set_name, frames)
    }

    /// Circular moves; `via[i]` and `to[i]` form the arc for index `i`.
    ///
    /// # Errors
    /// `MismatchedTargets` when the two lists differ in length.
    pub fn move_c(
        &self,
        via: &[CartesianPose],
        to: &[CartesianPose],
        speeds: &[MotionParameter],
        zones: &[MotionParameter],
        set_name: &str,
        frames: &Frames,
    ) -> AppResult<CompiledSet> {
        if to.is_empty() {
            return Err(ToroError::EmptyTargetList);
        }
        if via.len() != to.len() {
            return Err(ToroError::MismatchedTargets(via.len(), to.len()));
        }
        for pose in via.iter().chain(to) {
            pose.validate()?;
        }
        let speeds = broadcast(speeds, to.len(), "speed")?;
        let zones = broadcast(zones, to.len(), "zone")?;

        let mut set = CompiledSet::default();
        for (i, (via, to)) in via.iter().zip(to).enumerate() {
            let speed = speeds[i].resolve(&self.speeds)?;
            let zone = zones[i].resolve(&self.zones)?;
            let (cir, dest) = (format!("cir{set_name}{i}"), format!("to{set_name}{i}"));
            set.declarations.push(Declaration {
                index: i,
                text: format!(
                    "\n\tCONST robtarget {cir}:={via};\n\tCONST robtarget {dest}:={to};"
                ),
                names: vec![cir.clone(), dest.clone()],
            });
            set.instructions.push(Instruction {
                index: i,
                opcode: Opcode::MoveC,
                text: format!(
                    "\n\t\tMoveC {cir},{dest},{speed},{zone},{}\\WObj:={};",
                    frames.tool, frames.wobj
                ),
                speed: Some(speed),
                zone: Some(zone),
            });
        }
        debug!(set = set_name, count = set.instructions.len(), "Compiled MoveC set");
        Ok(set)
    }

    /// Independent axis moves of `mec_unit`; one per entry of `positions` (degrees).
    ///
    /// `axes` and `speeds` cycle to their first entry when shorter than `positions`.
    /// Each index declares a `num` variable holding the angle.
    pub fn ind_a_move(
        &self,
        mec_unit: &str,
        axes: &[u8],
        positions: &[f64],
        speeds: &[MotionParameter],
        set_name: &str,
    ) -> AppResult<CompiledSet> {
        if positions.is_empty() {
            return Err(ToroError::EmptyTargetList);
        }
        let axes = broadcast(axes, positions.len(), "axis")?;
        let speeds = broadcast(speeds, positions.len(), "speed")?;

        let mut set = CompiledSet::default();
        for (i, position) in positions.iter().enumerate() {
            let speed = speeds[i].resolve(&self.speeds)?;
            let name = format!("{set_name}{i}");
            set.declarations.push(Declaration {
                index: i,
                text: format!("\n\tVAR num {name}:={};", format_number(*position)),
                names: vec![name.clone()],
            });
            set.instructions.push(Instruction {
                index: i,
                opcode: Opcode::IndAMove,
                text: format!(
                    "\n\t\tIndAMove {mec_unit},{}\\ToAbsNum:={name},{speed};",
                    axes[i]
                ),
                speed: Some(speed),
                zone: None,
            });
        }
        debug!(set = set_name, count = set.instructions.len(), "Compiled IndAMove set");
        Ok(set)
    }

    /// Independent axis resets, one per entry of `axes`. Emits no declarations.
    pub fn ind_reset(
        &self,
        mec_unit: &str,
        axes: &[u8],
        reference_angles: &[f64],
    ) -> AppResult<CompiledSet> {
        if axes.is_empty() {
            return Err(ToroError::EmptyTargetList);
        }
        let references = broadcast(reference_angles, axes.len(), "reference")?;
        let instructions = axes
            .iter()
            .enumerate()
            .map(|(i, axis)| Instruction {
                index: i,
                opcode: Opcode::IndReset,
                speed: None,
                zone: None,
                text: format!(
                    "\n\t\tIndReset {mec_unit},{axis}\\RefNum:={}\\Old;",
                    format_number(references[i])
                ),
            })
            .collect();
        Ok(CompiledSet {
            declarations: Vec::new(),
            instructions,
        })
    }

    /// Wraps arbitrary statement bodies verbatim, terminating each with `;`.
    pub fn custom<S: AsRef<str>>(&self, bodies: &[S]) -> CompiledSet {
        let instructions = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Instruction {
                index: i,
                opcode: Opcode::Custom,
                speed: None,
                zone: None,
                text: statement(body.as_ref()),
            })
            .collect();
        CompiledSet {
            declarations: Vec::new(),
            instructions,
        }
    }

    fn compile_moves(
        &self,
        opcode: Opcode,
        targets: &[MotionTarget],
        speeds: &[MotionParameter],
        zones: &[MotionParameter],
        set_name: &str,
        frames: &Frames,
    ) -> AppResult<CompiledSet> {
        if targets.is_empty() {
            return Err(ToroError::EmptyTargetList);
        }
        for target in targets {
            target.validate()?;
        }
        let speeds = broadcast(speeds, targets.len(), "speed")?;
        let zones = broadcast(zones, targets.len(), "zone")?;

        let mut set = CompiledSet::default();
        for (i, target) in targets.iter().enumerate() {
            let speed = speeds[i].resolve(&self.speeds)?;
            let zone = zones[i].resolve(&self.zones)?;
            let name = format!("{set_name}{i}");
            set.declarations.push(Declaration {
                index: i,
                text: format!("\n\tCONST {} {name}:={target};", target.rapid_type()),
                names: vec![name.clone()],
            });
            set.instructions.push(Instruction {
                index: i,
                opcode,
                text: format!(
                    "\n\t\t{opcode} {name},{speed},{zone},{}\\WObj:={};",
                    frames.tool, frames.wobj
                ),
                speed: Some(speed),
                zone: Some(zone),
            });
        }
        debug!(
            set = set_name,
            opcode = %opcode,
            count = set.instructions.len(),
            "Compiled move set"
        );
        Ok(set)
    }
}

/// Formats a raw body as a routine statement.
pub fn statement(body: &str) -> String {
    format!("\n\t\t{body};")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poses(n: usize) -> Vec<CartesianPose> {
        (0..n)
            .map(|i| CartesianPose::new([100.0 * i as f64, 0.0, 500.0], [1.0, 0.0, 0.0, 0.0]))
            .collect()
    }

    #[test]
    fn one_pair_per_target_sharing_the_index() {
        let compiler = TargetCompiler::default();
        let set = compiler
            .move_l(&poses(4), &[100.into()], &[50.into()], "p", &Frames::default())
            .expect("compile");
        assert_eq!(set.declarations.len(), 4);
        assert_eq!(set.instructions.len(), 4);
        for (i, (decl, inst)) in set.declarations.iter().zip(&set.instructions).enumerate() {
            assert_eq!(decl.index, i);
            assert_eq!(inst.index, i);
            assert_eq!(decl.names, vec![format!("p{i}")]);
            assert!(decl.text.contains(&format!("CONST robtarget p{i}:=")));
            assert!(inst.text.contains(&format!("MoveL p{i},")));
        }
    }

    #[test]
    fn exhausted_speed_list_cycles_to_first_entry() {
        let compiler = TargetCompiler::default();
        let speeds = vec![MotionParameter::from(5), MotionParameter::from(1000)];
        let set = compiler
            .move_j(&poses(4), &speeds, &["fine".into()], "p", &Frames::default())
            .expect("compile");
        let resolved: Vec<_> = set
            .instructions
            .iter()
            .map(|i| i.speed.clone().unwrap_or_default())
            .collect();
        assert_eq!(resolved, vec!["v5", "v1000", "v5", "v5"]);
        assert!(set.instructions.iter().all(|i| i.zone.as_deref() == Some("fine")));
    }

    #[test]
    fn single_speed_applies_to_every_target() {
        let compiler = TargetCompiler::default();
        let set = compiler
            .move_l(&poses(3), &[5.into()], &[0.into()], "t", &Frames::default())
            .expect("compile");
        for inst in &set.instructions {
            assert_eq!(inst.speed.as_deref(), Some("v5"));
        }
    }

    #[test]
    fn instruction_text_matches_controller_syntax() {
        let compiler = TargetCompiler::default();
        let set = compiler
            .move_l(
                &poses(1),
                &[97.0.into()],
                &[48.into()],
                "path",
                &Frames::new("tGripper", "wobjTable"),
            )
            .expect("compile");
        assert_eq!(
            set.instructions[0].text,
            "\n\t\tMoveL path0,v100,z50,tGripper\\WObj:=wobjTable;"
        );
        assert_eq!(
            set.declarations[0].text,
            "\n\tCONST robtarget path0:=[[0,0,500],[1,0,0,0],[0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]];"
        );
    }

    #[test]
    fn move_abs_j_declares_jointtargets() {
        let compiler = TargetCompiler::default();
        let joints = [JointPose::new([0.0, 0.0, 0.0, 0.0, 30.0, 0.0])];
        let set = compiler
            .move_abs_j(&joints, &[200.into()], &[10.into()], "home", &Frames::default())
            .expect("compile");
        assert!(set.declarations[0].text.starts_with("\n\tCONST jointtarget home0:=[[0,0,0,0,30,0],"));
        assert_eq!(
            set.instructions[0].text,
            "\n\t\tMoveAbsJ home0,v200,z10,tool0\\WObj:=wobj0;"
        );
    }

    #[test]
    fn move_c_pairs_via_and_destination() {
        let compiler = TargetCompiler::default();
        let set = compiler
            .move_c(&poses(2), &poses(2), &[100.into()], &[1.into()], "arc", &Frames::default())
            .expect("compile");
        assert_eq!(set.instructions.len(), 2);
        assert!(set.declarations[1].text.contains("CONST robtarget cirarc1:="));
        assert!(set.declarations[1].text.contains("CONST robtarget toarc1:="));
        assert_eq!(set.declarations[1].names, vec!["cirarc1", "toarc1"]);
        assert_eq!(
            set.instructions[1].text,
            "\n\t\tMoveC cirarc1,toarc1,v100,z1,tool0\\WObj:=wobj0;"
        );
        assert!(matches!(
            compiler.move_c(&poses(1), &poses(2), &[100.into()], &[1.into()], "arc", &Frames::default()),
            Err(ToroError::MismatchedTargets(1, 2))
        ));
    }

    #[test]
    fn invalid_poses_fail_before_any_output() {
        let compiler = TargetCompiler::default();
        let nan = CartesianPose::new([f64::NAN, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]);
        let mut targets = poses(2);
        targets.push(nan);
        assert!(matches!(
            compiler.move_l(&targets, &[100.into()], &[10.into()], "p", &Frames::default()),
            Err(ToroError::InvalidPose(_))
        ));

        let zero = CartesianPose::new([0.0, 0.0, 500.0], [0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            compiler.move_c(&[zero], &poses(1), &[100.into()], &[1.into()], "arc", &Frames::default()),
            Err(ToroError::InvalidPose(_))
        ));

        let joints = [JointPose::new([0.0, 0.0, f64::INFINITY, 0.0, 0.0, 0.0])];
        assert!(compiler
            .move_abs_j(&joints, &[100.into()], &[10.into()], "j", &Frames::default())
            .is_err());
    }

    #[test]
    fn ind_a_move_cycles_axes_and_declares_angles() {
        let compiler = TargetCompiler::default();
        let set = compiler
            .ind_a_move("STN1", &[1, 2], &[90.0, 180.0, 270.0], &[50.into()], "ax")
            .expect("compile");
        assert_eq!(set.declarations[2].text, "\n\tVAR num ax2:=270;");
        assert_eq!(
            set.instructions[2].text,
            "\n\t\tIndAMove STN1,1\\ToAbsNum:=ax2,v50;"
        );
        assert_eq!(
            set.instructions[1].text,
            "\n\t\tIndAMove STN1,2\\ToAbsNum:=ax1,v50;"
        );
    }

    #[test]
    fn ind_reset_emits_instructions_only() {
        let compiler = TargetCompiler::default();
        let set = compiler.ind_reset("STN1", &[1, 2], &[0.0]).expect("compile");
        assert!(set.declarations.is_empty());
        assert_eq!(
            set.instruction_texts(),
            vec![
                "\n\t\tIndReset STN1,1\\RefNum:=0\\Old;".to_string(),
                "\n\t\tIndReset STN1,2\\RefNum:=0\\Old;".to_string(),
            ]
        );
    }

    #[test]
    fn custom_bodies_become_statements() {
        let compiler = TargetCompiler::default();
        let set = compiler.custom(&["WaitTime 1", "SetDO doGrip,1"]);
        assert_eq!(set.instructions[1].text, "\n\t\tSetDO doGrip,1;");
        assert_eq!(set.instructions[1].opcode, Opcode::Custom);
    }

    #[test]
    fn empty_inputs_fail_fast() {
        let compiler = TargetCompiler::default();
        assert!(matches!(
            compiler.move_l(&[], &[100.into()], &[50.into()], "p", &Frames::default()),
            Err(ToroError::EmptyTargetList)
        ));
        assert!(matches!(
            compiler.move_l(&poses(2), &[], &[50.into()], "p", &Frames::default()),
            Err(ToroError::ParameterListEmpty("speed"))
        ));
        assert!(matches!(
            compiler.move_l(&poses(2), &[100.into()], &[], "p", &Frames::default()),
            Err(ToroError::ParameterListEmpty("zone"))
        ));
        assert!(matches!(
            compiler.ind_a_move("STN1", &[], &[10.0], &[50.into()], "ax"),
            Err(ToroError::ParameterListEmpty("axis"))
        ));
    }
}
