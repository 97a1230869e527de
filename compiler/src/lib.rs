//! Compiler from a restricted C dialect to Crumb stack machine bytecode.
//!
//! The pipeline is source text -> tokens -> AST with validated scopes ->
//! instruction invocations -> encoded program bytes. The encoded image
//! runs on the `crumb` virtual machine.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod utils;

use thiserror::Error;

pub use codegen::CodegenError;
pub use lexer::LexError;
pub use parser::ParseError;

/// Any compile-time failure, by pipeline stage.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Compilation knobs an embedder can adjust.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Size in bytes of pointer types, as configured into the parser.
    pub pointer_size: u16,
    /// Runtime memory size the generated image will be laid out for;
    /// global variables live at its top end.
    pub memory_size: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pointer_size: parser::DEFAULT_POINTER_SIZE,
            memory_size: crumb::MAX_MEMORY_SIZE,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pointer_size(mut self, pointer_size: u16) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }
}

/// Compile a source file into an encoded program image.
pub fn compile(source: &str) -> Result<Vec<u8>, CompileError> {
    compile_with(source, &CompileOptions::default())
}

pub fn compile_with(source: &str, options: &CompileOptions) -> Result<Vec<u8>, CompileError> {
    let program = parser::parse_with(source, options.pointer_size)?;
    let image = codegen::generate(&program, options.memory_size)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_minimal_program() {
        let image = compile("int main() { return 0; }").unwrap();
        assert!(!image.is_empty());
    }

    #[test]
    fn test_compile_surfaces_parse_errors() {
        match compile("int main() { return }") {
            Err(CompileError::Parse(_)) => {}
            other => panic!("expected a parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_compile_surfaces_codegen_errors() {
        match compile("int main() { switch (1) { default: ; } return 0; }") {
            Err(CompileError::Codegen(_)) => {}
            other => panic!("expected a codegen error, got {:?}", other.map(|_| ())),
        }
    }
}
