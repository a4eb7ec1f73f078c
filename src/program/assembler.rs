//! Rendering of a complete program module from declaration and instruction blocks.
//!
//! The document layout is fixed:
//!
//! ```text
//! MODULE MainModule
//!     ! Program data
//!     <tool declarations>
//!     <work-object declarations>
//!
//!     ! Target data<constant declarations>
//!
//!     ! Routine
//!     PROC main()
//!         ConfL\Off;
//!         SingArea\Wrist;
//!         rStart;
//!         RETURN;
//!     ENDPROC
//!
//!     PROC rStart()
//!
//!         ! instructions<instruction statements>
//!         RETURN;
//!     ENDPROC
//!
//! ENDMODULE
//! ```
//!
//! Blocks are concatenated in the order given; the assembler never reorders or
//! deduplicates.

use crate::error::{AppResult, ToroError};
use crate::program::compiler::CompiledSet;
use std::path::Path;
use tracing::{debug, info};

/// Name of the module every assembled document declares.
pub const MODULE_NAME: &str = "MainModule";

/// Renders a module from its four text blocks.
pub fn assemble<S: AsRef<str>>(
    declarations: &[S],
    instructions: &[S],
    tools: &[S],
    wobjs: &[S],
) -> String {
    let consts = concat(declarations);
    let insts = concat(instructions);
    let tools = concat(tools);
    let wobjs = concat(wobjs);
    format!(
        "MODULE {MODULE_NAME}\n\
         \t! Program data\n\
         {tools}\n\
         {wobjs}\n\
         \n\t! Target data{consts}\n\
         \n\
         \t! Routine\n\
         \tPROC main()\n\
         \t\tConfL\\Off;\n\
         \t\tSingArea\\Wrist;\n\
         \t\trStart;\n\
         \t\tRETURN;\n\
         \tENDPROC\n\
         \n\
         \tPROC rStart()\n\
         \n\
         \t\t! instructions{insts}\n\
         \t\tRETURN;\n\
         \tENDPROC\n\
         \n\
         ENDMODULE\n"
    )
}

fn concat<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect()
}

/// Accumulates compiled sets and frame declarations before rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramModule {
    tools: Vec<String>,
    wobjs: Vec<String>,
    declarations: Vec<String>,
    instructions: Vec<String>,
}

impl ProgramModule {
    /// Empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool declaration.
    pub fn add_tool(&mut self, declaration: impl Into<String>) -> &mut Self {
        self.tools.push(declaration.into());
        self
    }

    /// Adds a work-object declaration.
    pub fn add_wobj(&mut self, declaration: impl Into<String>) -> &mut Self {
        self.wobjs.push(declaration.into());
        self
    }

    /// Adds a free-standing declaration to the data section.
    pub fn add_declaration(&mut self, declaration: impl Into<String>) -> &mut Self {
        self.declarations.push(declaration.into());
        self
    }

    /// Adds a free-standing statement to the routine body.
    pub fn add_instruction(&mut self, instruction: impl Into<String>) -> &mut Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Appends a compiled set's declarations and instructions.
    pub fn push_set(&mut self, set: &CompiledSet) -> &mut Self {
        self.declarations.extend(set.declaration_texts());
        self.instructions.extend(set.instruction_texts());
        self
    }

    /// Declarations currently in the data section.
    pub fn declarations(&self) -> &[String] {
        &self.declarations
    }

    /// Statements currently in the routine body.
    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Replaces the routine body, e.g. after splicing.
    pub fn set_instructions(&mut self, instructions: Vec<String>) {
        self.instructions = instructions;
    }

    /// Renders the module document.
    pub fn render(&self) -> String {
        assemble(&self.declarations, &self.instructions, &self.tools, &self.wobjs)
    }
}

/// Renders a program descriptor (`.pgf`) listing module files to load with the program.
pub fn program_descriptor(module_files: &[&str]) -> String {
    let modules: String = module_files
        .iter()
        .map(|m| format!("\t<Module>{m}</Module>\n"))
        .collect();
    format!("<?xml version=\"1.0\" encoding=\"ISO-8859-1\" ?>\n<Program>\n{modules}</Program>\n")
}

/// Writes module text to `path`, replacing any existing file.
pub async fn write_module(path: &Path, text: &str) -> AppResult<()> {
    tokio::fs::write(path, text).await?;
    info!(path = %path.display(), bytes = text.len(), "Wrote program module");
    Ok(())
}

/// Reads module text back from `path`.
///
/// # Errors
/// `FileNotFound` when `path` does not exist; other I/O failures as `Io`.
pub async fn read_module(path: &Path) -> AppResult<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            debug!(path = %path.display(), bytes = text.len(), "Read program module");
            Ok(text)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToroError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
