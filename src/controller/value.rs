//! Typed values exchanged with controller data items.
//!
//! [`RapidValue`] is a closed set of the record kinds this crate reads and writes. A
//! write is only applied when the value's kind matches the declared type of the remote
//! item, so every case is matched explicitly rather than inspected at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ToroError};
use crate::motion::literal::{format_number, Literal};
use crate::motion::target::{number_list, CartesianPose, JointPose};

/// Payload carried by a tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadData {
    /// Mass in kg.
    pub mass: f64,
    /// Centre of gravity in the tool frame, mm.
    pub cog: [f64; 3],
    /// Axes of moment as a quaternion.
    pub aom: [f64; 4],
    /// Moments of inertia around the aom axes, kgm².
    pub inertia: [f64; 3],
}

impl LoadData {
    fn from_literal(lit: &Literal) -> Option<Self> {
        let parts = lit.as_list().filter(|p| p.len() == 6)?;
        Some(Self {
            mass: parts[0].as_num()?,
            cog: parts[1].numbers::<3>()?,
            aom: parts[2].numbers::<4>()?,
            inertia: [parts[3].as_num()?, parts[4].as_num()?, parts[5].as_num()?],
        })
    }
}

impl fmt::Display for LoadData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{},{},{}]",
            format_number(self.mass),
            number_list(&self.cog),
            number_list(&self.aom),
            format_number(self.inertia[0]),
            format_number(self.inertia[1]),
            format_number(self.inertia[2])
        )
    }
}

/// `tooldata` record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolData {
    /// Whether the robot holds the tool.
    pub robhold: bool,
    /// Tool centre point frame.
    pub tframe: CartesianPose,
    /// Tool load.
    pub load: LoadData,
}

/// `wobjdata` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WobjData {
    /// Whether the robot holds the work object.
    pub robhold: bool,
    /// Fixed user coordinate system.
    pub ufprog: bool,
    /// Mechanical unit moving the user frame, empty when fixed.
    pub ufmec: String,
    /// User frame.
    pub uframe: CartesianPose,
    /// Object frame, relative to the user frame.
    pub oframe: CartesianPose,
}

fn frame_from(lit: &Literal) -> Option<CartesianPose> {
    let parts = lit.as_list().filter(|p| p.len() == 2)?;
    Some(CartesianPose::new(parts[0].numbers::<3>()?, parts[1].numbers::<4>()?))
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// A value of one of the supported controller data types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RapidValue {
    /// `robtarget`
    RobTarget(CartesianPose),
    /// `jointtarget`
    JointTarget(JointPose),
    /// `tooldata`
    ToolData(ToolData),
    /// `wobjdata`
    WobjData(WobjData),
    /// `num`
    Num(f64),
    /// `bool`
    Bool(bool),
    /// `string`
    Str(String),
}

impl RapidValue {
    /// Controller type name of this value.
    pub fn rapid_type(&self) -> &'static str {
        match self {
            RapidValue::RobTarget(_) => "robtarget",
            RapidValue::JointTarget(_) => "jointtarget",
            RapidValue::ToolData(_) => "tooldata",
            RapidValue::WobjData(_) => "wobjdata",
            RapidValue::Num(_) => "num",
            RapidValue::Bool(_) => "bool",
            RapidValue::Str(_) => "string",
        }
    }

    /// Whether this value can be stored in an item declared as `declared`.
    ///
    /// `num` values also fit `dnum` items.
    pub fn fits(&self, declared: &str) -> bool {
        declared == self.rapid_type() || (declared == "dnum" && matches!(self, RapidValue::Num(_)))
    }

    /// Parses `text` as a value of the declared `rapid_type`.
    ///
    /// # Errors
    /// `InvalidLiteral` when the text does not fit the type, `Protocol` for a type this
    /// crate does not model.
    pub fn parse_as(rapid_type: &str, text: &str) -> AppResult<Self> {
        match rapid_type {
            "robtarget" => text.parse().map(RapidValue::RobTarget),
            "jointtarget" => text.parse().map(RapidValue::JointTarget),
            "tooldata" | "wobjdata" | "num" | "dnum" | "bool" | "string" => {
                let value: RapidValue = text.parse()?;
                if value.fits(rapid_type) {
                    Ok(value)
                } else {
                    Err(ToroError::invalid_literal(
                        text,
                        format!("not a {rapid_type} value"),
                    ))
                }
            }
            other => Err(ToroError::Protocol(format!("unsupported data type '{other}'"))),
        }
    }

    fn from_literal(text: &str, lit: &Literal) -> AppResult<Self> {
        let items = match lit {
            Literal::Num(n) => return Ok(RapidValue::Num(*n)),
            Literal::Bool(b) => return Ok(RapidValue::Bool(*b)),
            Literal::Str(s) => return Ok(RapidValue::Str(s.clone())),
            Literal::List(items) => items,
        };
        let value = match (items.len(), items.first()) {
            (4, Some(Literal::List(_))) => Some(RapidValue::RobTarget(text.parse()?)),
            (2, Some(Literal::List(_))) => Some(RapidValue::JointTarget(text.parse()?)),
            (3, Some(Literal::Bool(robhold))) => frame_from(&items[1])
                .zip(LoadData::from_literal(&items[2]))
                .map(|(tframe, load)| {
                    RapidValue::ToolData(ToolData {
                        robhold: *robhold,
                        tframe,
                        load,
                    })
                }),
            (5, Some(Literal::Bool(robhold))) => match (&items[1], &items[2]) {
                (Literal::Bool(ufprog), Literal::Str(ufmec)) => {
                    frame_from(&items[3]).zip(frame_from(&items[4])).map(|(uframe, oframe)| {
                        RapidValue::WobjData(WobjData {
                            robhold: *robhold,
                            ufprog: *ufprog,
                            ufmec: ufmec.clone(),
                            uframe,
                            oframe,
                        })
                    })
                }
                _ => None,
            },
            _ => None,
        };
        value.ok_or_else(|| ToroError::invalid_literal(text, "unrecognised record shape"))
    }
}

impl FromStr for RapidValue {
    type Err = ToroError;

    /// Infers the kind from the literal's shape.
    fn from_str(s: &str) -> AppResult<Self> {
        let lit = Literal::parse(s)?;
        Self::from_literal(s, &lit)
    }
}

impl fmt::Display for RapidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RapidValue::RobTarget(p) => fmt::Display::fmt(p, f),
            RapidValue::JointTarget(j) => fmt::Display::fmt(j, f),
            RapidValue::ToolData(t) => write!(
                f,
                "[{},{},{}]",
                flag(t.robhold),
                t.tframe.frame_literal(),
                t.load
            ),
            RapidValue::WobjData(w) => write!(
                f,
                "[{},{},\"{}\",{},{}]",
                flag(w.robhold),
                flag(w.ufprog),
                w.ufmec,
                w.uframe.frame_literal(),
                w.oframe.frame_literal()
            ),
            RapidValue::Num(n) => f.write_str(&format_number(*n)),
            RapidValue::Bool(b) => f.write_str(flag(*b)),
            RapidValue::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<CartesianPose> for RapidValue {
    fn from(pose: CartesianPose) -> Self {
        RapidValue::RobTarget(pose)
    }
}

impl From<JointPose> for RapidValue {
    fn from(pose: JointPose) -> Self {
        RapidValue::JointTarget(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOL: &str = "[TRUE,[[0,0,150],[1,0,0,0]],[2.5,[0,0,0.001],[1,0,0,0],0,0,0]]";
    const WOBJ: &str = "[FALSE,TRUE,\"\",[[800,0,200],[1,0,0,0]],[[0,0,0],[1,0,0,0]]]";

    #[test]
    fn infers_kind_from_shape() {
        let target = "[[500,0,600],[1,0,0,0],[0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]";
        assert_eq!(target.parse::<RapidValue>().map(|v| v.rapid_type()).ok(), Some("robtarget"));
        assert_eq!(
            "[[0,0,0,0,90,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]"
                .parse::<RapidValue>()
                .map(|v| v.rapid_type())
                .ok(),
            Some("jointtarget")
        );
        assert_eq!(TOOL.parse::<RapidValue>().map(|v| v.rapid_type()).ok(), Some("tooldata"));
        assert_eq!(WOBJ.parse::<RapidValue>().map(|v| v.rapid_type()).ok(), Some("wobjdata"));
        assert_eq!("42".parse::<RapidValue>().ok(), Some(RapidValue::Num(42.0)));
        assert_eq!("TRUE".parse::<RapidValue>().ok(), Some(RapidValue::Bool(true)));
    }

    #[test]
    fn records_render_back_to_their_literal() {
        let tool: RapidValue = TOOL.parse().expect("tooldata");
        assert_eq!(tool.to_string(), TOOL);
        let wobj: RapidValue = WOBJ.parse().expect("wobjdata");
        assert_eq!(wobj.to_string(), WOBJ);
    }

    #[test]
    fn parse_as_checks_declared_type() {
        assert!(RapidValue::parse_as("num", "3.5").is_ok());
        assert!(RapidValue::parse_as("dnum", "3.5").is_ok());
        assert!(RapidValue::Num(1.0).fits("dnum"));
        assert!(!RapidValue::Bool(true).fits("dnum"));
        assert!(!RapidValue::Num(1.0).fits("bool"));
        assert!(matches!(
            RapidValue::parse_as("num", TOOL),
            Err(ToroError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            RapidValue::parse_as("robtarget", "[[0,0,0,0,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]"),
            Err(ToroError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            RapidValue::parse_as("speeddata", "[1,2,3,4]"),
            Err(ToroError::Protocol(_))
        ));
    }

    #[test]
    fn unknown_shape_is_rejected() {
        assert!("[1,2,3]".parse::<RapidValue>().is_err());
    }
}
