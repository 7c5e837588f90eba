//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::build::{compile_ast, BuildOptions};
use crate::error::{CompilerError, Warning};

/// Check a directory's worth of parsed sources: merge validation plus
/// analyzer warnings, no code generation.
/// `files_json` is a JSON array of `{path, blocks}` objects.
#[wasm_bindgen]
pub fn check_source(files_json: &str) -> JsValue {
    let result = check_source_inner(files_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn check_source_inner(files_json: &str) -> CheckResult {
    let files = match parse_files(files_json) {
        Ok(files) => files,
        Err(errors) => {
            return CheckResult {
                errors,
                warnings: vec![],
            }
        }
    };
    match crate::merge::merge_files(&files) {
        Ok(unit) => CheckResult {
            errors: vec![],
            warnings: crate::analyze::analyze(&unit)
                .iter()
                .map(WarningDto::from)
                .collect(),
        },
        Err(errors) => CheckResult {
            errors: errors.iter().map(ErrorDto::from).collect(),
            warnings: vec![],
        },
    }
}

/// Full pipeline: merge → analyze → codegen.
/// Returns `{status: "success", files, warnings}` or
/// `{status: "errors", errors}`.
#[wasm_bindgen]
pub fn compile_source(files_json: &str, dir_name: &str) -> JsValue {
    let result = compile_source_inner(files_json, dir_name);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn compile_source_inner(files_json: &str, dir_name: &str) -> CompileResult {
    let files = match parse_files(files_json) {
        Ok(files) => files,
        Err(errors) => return CompileResult::Errors { errors },
    };
    let contents: Vec<String> = files.iter().map(|_| String::new()).collect();
    match compile_ast(&files, dir_name, &contents, &BuildOptions::default()) {
        Ok((output, warnings)) => CompileResult::Success {
            files: output
                .files
                .into_iter()
                .map(|f| FileDto {
                    content: f.content_str().to_string(),
                    path: f.path,
                })
                .collect(),
            warnings: warnings.iter().map(WarningDto::from).collect(),
        },
        Err(errors) => CompileResult::Errors {
            errors: errors.iter().map(ErrorDto::from).collect(),
        },
    }
}

fn parse_files(files_json: &str) -> Result<Vec<crate::ast::SourceFile>, Vec<ErrorDto>> {
    serde_json::from_str(files_json).map_err(|e| {
        vec![ErrorDto {
            code: "P001".into(),
            phase: "Parse".into(),
            message: format!("Failed to parse files JSON: {}", e),
            file: None,
            line: None,
        }]
    })
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize)]
struct ErrorDto {
    code: String,
    phase: String,
    message: String,
    file: Option<String>,
    line: Option<u32>,
}

impl From<&CompilerError> for ErrorDto {
    fn from(e: &CompilerError) -> Self {
        ErrorDto {
            code: e.code.clone(),
            phase: e.phase.to_string(),
            message: e.message.clone(),
            file: e.file.clone(),
            line: e.line,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WarningDto {
    code: String,
    message: String,
    file: Option<String>,
    line: Option<u32>,
}

impl From<&Warning> for WarningDto {
    fn from(w: &Warning) -> Self {
        WarningDto {
            code: w.code.to_string(),
            message: w.message.clone(),
            file: w.file.clone(),
            line: w.line,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FileDto {
    path: String,
    content: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CheckResult {
    errors: Vec<ErrorDto>,
    warnings: Vec<WarningDto>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum CompileResult {
    #[serde(rename = "success")]
    Success {
        files: Vec<FileDto>,
        warnings: Vec<WarningDto>,
    },
    #[serde(rename = "errors")]
    Errors { errors: Vec<ErrorDto> },
}
