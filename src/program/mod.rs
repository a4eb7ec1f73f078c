//! Program synthesis: compile targets into statements, splice, and assemble modules.
//!
//! ```text
//! targets + params ──► TargetCompiler ──► CompiledSet ──► (splice) ──► ProgramModule::render
//! ```

pub mod assembler;
pub mod broadcast;
pub mod compiler;
pub mod data;
pub mod splice;

pub use assembler::{assemble, program_descriptor, read_module, write_module, ProgramModule};
pub use compiler::{CompiledSet, Declaration, Frames, Instruction, Opcode, TargetCompiler};
pub use splice::{insert_at_index, insert_instructions};
