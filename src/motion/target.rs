//! Motion targets: Cartesian poses and joint poses.
//!
//! Targets are immutable once built. Their `Display` output is the controller literal
//! used in `CONST robtarget`/`CONST jointtarget` declarations, and `FromStr` reads the
//! same literal back.

use crate::error::{AppResult, ToroError};
use crate::motion::literal::{format_number, Literal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel value the controller uses for an external axis that is not in use.
pub const EXTERNAL_AXIS_UNSET: f64 = 9e9;

/// Largest accepted deviation of an orientation quaternion's norm from 1.
pub const QUATERNION_NORM_TOLERANCE: f64 = 1e-6;

/// Arm configuration quadrants (`confdata`) carried by a Cartesian pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArmConfiguration {
    /// Quadrant of axis 1.
    pub cf1: i32,
    /// Quadrant of axis 4.
    pub cf4: i32,
    /// Quadrant of axis 6.
    pub cf6: i32,
    /// Arm configuration bit.
    pub cfx: i32,
}

impl ArmConfiguration {
    fn from_literal(lit: &Literal) -> Option<Self> {
        let [cf1, cf4, cf6, cfx] = lit.numbers::<4>()?.map(quadrant);
        Some(Self {
            cf1: cf1?,
            cf4: cf4?,
            cf6: cf6?,
            cfx: cfx?,
        })
    }
}

// Quadrants are integers; fractional or out-of-range values are rejected, not truncated.
fn quadrant(value: f64) -> Option<i32> {
    let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
    (value.fract() == 0.0 && in_range).then_some(value as i32)
}

impl fmt::Display for ArmConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{},{}]", self.cf1, self.cf4, self.cf6, self.cfx)
    }
}

/// Positions of up to six external axes; `None` marks an unused axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalAxes(pub [Option<f64>; 6]);

impl ExternalAxes {
    fn from_literal(lit: &Literal) -> Option<Self> {
        let values = lit.numbers::<6>()?;
        Some(Self(values.map(|v| {
            // Anything at or beyond the sentinel is "not in use".
            if v >= EXTERNAL_AXIS_UNSET {
                None
            } else {
                Some(v)
            }
        })))
    }

    fn validate(&self) -> AppResult<()> {
        match self.0.iter().flatten().find(|v| !v.is_finite()) {
            Some(v) => Err(ToroError::InvalidPose(format!(
                "external axis value {v} is not finite"
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ExternalAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|axis| match axis {
                Some(v) => format_number(*v),
                None => "9E+09".to_string(),
            })
            .collect();
        write!(f, "[{}]", parts.join(","))
    }
}

/// A tool-centre-point pose: position, orientation quaternion, arm configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPose {
    position: [f64; 3],
    orientation: [f64; 4],
    #[serde(default)]
    config: ArmConfiguration,
    #[serde(default)]
    external: ExternalAxes,
}

impl CartesianPose {
    /// Creates a pose with default arm configuration and no external axes.
    ///
    /// `orientation` is `[q1, q2, q3, q4]` with the scalar part first.
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
            config: ArmConfiguration::default(),
            external: ExternalAxes::default(),
        }
    }

    /// Creates a pose and checks it with [`validate`](Self::validate).
    ///
    /// # Errors
    /// `InvalidPose` for non-finite components or a non-unit orientation.
    pub fn try_new(position: [f64; 3], orientation: [f64; 4]) -> AppResult<Self> {
        let pose = Self::new(position, orientation);
        pose.validate()?;
        Ok(pose)
    }

    /// Checks that every component is finite and the orientation is a unit quaternion
    /// (norm within [`QUATERNION_NORM_TOLERANCE`] of 1).
    pub fn validate(&self) -> AppResult<()> {
        if let Some(v) = self
            .position
            .iter()
            .chain(&self.orientation)
            .find(|v| !v.is_finite())
        {
            return Err(ToroError::InvalidPose(format!(
                "component {v} is not finite in {self}"
            )));
        }
        let norm = self.orientation.iter().map(|q| q * q).sum::<f64>().sqrt();
        if (norm - 1.0).abs() > QUATERNION_NORM_TOLERANCE {
            return Err(ToroError::InvalidPose(format!(
                "orientation norm {norm} is not 1 in {self}"
            )));
        }
        self.external.validate()
    }

    /// Returns a copy with the given arm configuration.
    pub fn with_config(mut self, config: ArmConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Returns a copy with the given external axis positions.
    pub fn with_external_axes(mut self, external: ExternalAxes) -> Self {
        self.external = external;
        self
    }

    /// `[x, y, z]` in millimetres.
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// `[q1, q2, q3, q4]`.
    pub fn orientation(&self) -> [f64; 4] {
        self.orientation
    }

    /// Arm configuration quadrants.
    pub fn config(&self) -> ArmConfiguration {
        self.config
    }

    /// External axis positions.
    pub fn external_axes(&self) -> ExternalAxes {
        self.external
    }

    /// Renders only the `[[x,y,z],[q1,q2,q3,q4]]` frame part (used by tool/work-object data).
    pub fn frame_literal(&self) -> String {
        format!(
            "[{},{}]",
            number_list(&self.position),
            number_list(&self.orientation)
        )
    }
}

impl fmt::Display for CartesianPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{}]",
            number_list(&self.position),
            number_list(&self.orientation),
            self.config,
            self.external
        )
    }
}

impl FromStr for CartesianPose {
    type Err = ToroError;

    fn from_str(s: &str) -> AppResult<Self> {
        let lit = Literal::parse(s)?;
        let parts = lit
            .as_list()
            .filter(|p| p.len() == 4)
            .ok_or_else(|| ToroError::invalid_literal(s, "robtarget needs 4 groups"))?;
        let position = parts[0]
            .numbers::<3>()
            .ok_or_else(|| ToroError::invalid_literal(s, "position needs 3 numbers"))?;
        let orientation = parts[1]
            .numbers::<4>()
            .ok_or_else(|| ToroError::invalid_literal(s, "orientation needs 4 numbers"))?;
        let config = ArmConfiguration::from_literal(&parts[2])
            .ok_or_else(|| ToroError::invalid_literal(s, "configuration needs 4 numbers"))?;
        let external = ExternalAxes::from_literal(&parts[3])
            .ok_or_else(|| ToroError::invalid_literal(s, "external axes need 6 numbers"))?;
        Ok(Self {
            position,
            orientation,
            config,
            external,
        })
    }
}

/// An absolute joint-space pose: six axis angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPose {
    joints: [f64; 6],
    #[serde(default)]
    external: ExternalAxes,
}

impl JointPose {
    /// Creates a joint pose with no external axes.
    pub fn new(joints: [f64; 6]) -> Self {
        Self {
            joints,
            external: ExternalAxes::default(),
        }
    }

    /// Returns a copy with the given external axis positions.
    pub fn with_external_axes(mut self, external: ExternalAxes) -> Self {
        self.external = external;
        self
    }

    /// Checks that every axis angle is finite.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(v) = self.joints.iter().find(|v| !v.is_finite()) {
            return Err(ToroError::InvalidPose(format!(
                "joint angle {v} is not finite in {self}"
            )));
        }
        self.external.validate()
    }

    /// Axis angles `j1..j6`.
    pub fn joints(&self) -> [f64; 6] {
        self.joints
    }

    /// External axis positions.
    pub fn external_axes(&self) -> ExternalAxes {
        self.external
    }
}

impl fmt::Display for JointPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", number_list(&self.joints), self.external)
    }
}

impl FromStr for JointPose {
    type Err = ToroError;

    fn from_str(s: &str) -> AppResult<Self> {
        let lit = Literal::parse(s)?;
        let parts = lit
            .as_list()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| ToroError::invalid_literal(s, "jointtarget needs 2 groups"))?;
        let joints = parts[0]
            .numbers::<6>()
            .ok_or_else(|| ToroError::invalid_literal(s, "joint group needs 6 numbers"))?;
        let external = ExternalAxes::from_literal(&parts[1])
            .ok_or_else(|| ToroError::invalid_literal(s, "external axes need 6 numbers"))?;
        Ok(Self { joints, external })
    }
}

/// Either kind of motion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionTarget {
    /// Tool-centre-point pose.
    Cartesian(CartesianPose),
    /// Joint-space pose.
    Joint(JointPose),
}

impl MotionTarget {
    /// Controller data type name used in declarations.
    pub fn rapid_type(&self) -> &'static str {
        match self {
            MotionTarget::Cartesian(_) => "robtarget",
            MotionTarget::Joint(_) => "jointtarget",
        }
    }

    /// Validates the wrapped pose.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            MotionTarget::Cartesian(p) => p.validate(),
            MotionTarget::Joint(j) => j.validate(),
        }
    }
}

impl fmt::Display for MotionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionTarget::Cartesian(p) => fmt::Display::fmt(p, f),
            MotionTarget::Joint(j) => fmt::Display::fmt(j, f),
        }
    }
}

impl From<CartesianPose> for MotionTarget {
    fn from(pose: CartesianPose) -> Self {
        MotionTarget::Cartesian(pose)
    }
}

impl From<JointPose> for MotionTarget {
    fn from(pose: JointPose) -> Self {
        MotionTarget::Joint(pose)
    }
}

pub(crate) fn number_list(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format_number(*v)).collect();
    format!("[{}]", parts.join(","))
}
