//! Unified compiler error and warning types used across all phases.

/// Pipeline phase a diagnostic originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Merge,
    Analyze,
    Codegen,
    Wasm,
    Build,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Parse => write!(f, "Parse"),
            Phase::Merge => write!(f, "Merge"),
            Phase::Analyze => write!(f, "Analyze"),
            Phase::Codegen => write!(f, "Codegen"),
            Phase::Wasm => write!(f, "Wasm"),
            Phase::Build => write!(f, "Build"),
        }
    }
}

/// A fatal diagnostic. Fatal errors unwind to the build orchestrator, which
/// reports them and exits non-zero without committing any output.
#[derive(Debug, Clone)]
pub struct CompilerError {
    pub code: String,
    pub phase: Phase,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.phase, self.code, self.message)?;
        if let Some(ref file) = self.file {
            write!(f, " ({}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(col) = self.column {
                    write!(f, ":{}", col)?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

impl CompilerError {
    fn new(code: &str, phase: Phase, message: impl Into<String>) -> Self {
        CompilerError {
            code: code.into(),
            phase,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn parse(code: &str, message: impl Into<String>, file: Option<String>) -> Self {
        CompilerError {
            file,
            ..Self::new(code, Phase::Parse, message)
        }
    }

    pub fn merge(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Phase::Merge, message)
    }

    pub fn codegen(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Phase::Codegen, message)
    }

    pub fn wasm(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Phase::Wasm, message)
    }

    pub fn build(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Phase::Build, message)
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// A non-fatal finding from the analyzer. Collected per directory and
/// printed at the end of that directory's compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning[{}]: {}", self.code, self.message)?;
        if let Some(ref file) = self.file {
            write!(f, " ({}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl Warning {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Warning {
            code,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

/// Orchestrator-level failure: either diagnostics from the pipeline or an
/// I/O problem while reading sources or committing outputs.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("compilation failed with {} error(s)", .0.len())]
    Compile(Vec<CompilerError>),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// All compiler diagnostics carried by this failure, if any.
    pub fn diagnostics(&self) -> &[CompilerError] {
        match self {
            BuildError::Compile(errors) => errors,
            BuildError::Io { .. } => &[],
        }
    }
}

impl From<Vec<CompilerError>> for BuildError {
    fn from(errors: Vec<CompilerError>) -> Self {
        BuildError::Compile(errors)
    }
}

impl From<CompilerError> for BuildError {
    fn from(error: CompilerError) -> Self {
        BuildError::Compile(vec![error])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_with_location() {
        let e = CompilerError::merge("M001", "Duplicate declaration of 'count'")
            .at("src/app.tova", 12, 3);
        assert_eq!(
            e.to_string(),
            "[Merge:M001] Duplicate declaration of 'count' (src/app.tova:12:3)"
        );
    }

    #[test]
    fn error_display_without_location() {
        let e = CompilerError::build("B001", "No source files found");
        assert_eq!(e.to_string(), "[Build:B001] No source files found");
    }

    #[test]
    fn warning_display() {
        let w = Warning::new("W003", "protect without auth").at("src/sec.tova", 4);
        assert_eq!(
            w.to_string(),
            "warning[W003]: protect without auth (src/sec.tova:4)"
        );
    }
}
