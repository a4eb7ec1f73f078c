//! Motion vocabulary: targets, their literal text form, and speed/zone catalogs.

pub mod catalog;
pub mod literal;
pub mod target;

pub use catalog::{MotionCatalog, MotionParameter};
pub use target::{ArmConfiguration, CartesianPose, ExternalAxes, JointPose, MotionTarget};
