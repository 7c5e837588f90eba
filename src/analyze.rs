//! Analyzer pass: non-fatal findings over a merged compilation unit.
//!
//! Warnings are collected and printed at the end of each directory's
//! compilation; none of them aborts the build.

use std::collections::HashSet;

use crate::ast::*;
use crate::error::Warning;
use crate::merge::MergedUnit;

/// Run every analyzer rule over the unit.
pub fn analyze(unit: &MergedUnit) -> Vec<Warning> {
    let mut warnings = Vec::new();
    check_security(unit, &mut warnings);
    check_cors(unit, &mut warnings);
    check_cli(unit, &mut warnings);
    check_forms(unit, &mut warnings);
    warnings
}

// ---------------------------------------------------------------------------
// Security rules
// ---------------------------------------------------------------------------

fn check_security(unit: &MergedUnit, warnings: &mut Vec<Warning>) {
    let Some(sec) = &unit.security else { return };

    let mut roles = HashSet::new();
    for role in &sec.roles {
        if !roles.insert(role.name.as_str()) {
            warnings.push(Warning::new(
                "W002",
                format!("Duplicate role '{}'", role.name),
            ));
        }
    }

    for rule in &sec.protect {
        if sec.auth.is_none() {
            warnings.push(Warning::new(
                "W003",
                format!("protect \"{}\" without an auth declaration", rule.pattern),
            ));
        }
        match &rule.require {
            None => warnings.push(Warning::new(
                "W004",
                format!("protect \"{}\" without a require clause", rule.pattern),
            )),
            Some(role) if !roles.contains(role.as_str()) => warnings.push(Warning::new(
                "W001",
                format!(
                    "protect \"{}\" requires undefined role '{}'",
                    rule.pattern, role
                ),
            )),
            Some(_) => {}
        }
    }

    if let Some(auth) = &sec.auth {
        if let SecretSource::Literal { .. } = auth.secret {
            warnings.push(Warning::new(
                "W005",
                "Hardcoded auth secret; read it from an environment variable",
            ));
        }
    }
}

fn check_cors(unit: &MergedUnit, warnings: &mut Vec<Warning>) {
    for edge in &unit.edges {
        if let Some(cors) = &edge.config.cors {
            if cors.origins.is_empty() {
                warnings.push(Warning::new(
                    "W006",
                    "CORS allows any origin; list allowed origins explicitly",
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CLI rules
// ---------------------------------------------------------------------------

const KNOWN_CLI_KEYS: &[&str] = &["name", "version", "description"];

fn check_cli(unit: &MergedUnit, warnings: &mut Vec<Warning>) {
    let Some(cli) = &unit.cli else { return };

    for (key, _) in &cli.config {
        if !KNOWN_CLI_KEYS.contains(&key.as_str()) {
            warnings.push(Warning::new(
                "W007",
                format!("Unknown cli config key '{}'", key),
            ));
        }
    }
    if !cli.config.iter().any(|(k, _)| k == "name") {
        warnings.push(Warning::new("W010", "cli block has no name"));
    }

    let mut commands = HashSet::new();
    for merged in &cli.commands {
        if let StmtKind::FunctionDeclaration(decl) = &merged.stmt.kind {
            if !commands.insert(decl.name.as_str()) {
                warnings.push(
                    Warning::new("W008", format!("Duplicate cli command '{}'", decl.name)).at(
                        unit.source_path(merged.source),
                        merged.stmt.loc.line,
                    ),
                );
            }
            // Positionals after a flag cannot be bound unambiguously.
            let mut seen_flag = false;
            for param in &decl.params {
                if param.is_flag {
                    seen_flag = true;
                } else if seen_flag {
                    warnings.push(Warning::new(
                        "W009",
                        format!(
                            "Command '{}': positional argument '{}' after a flag",
                            decl.name, param.name
                        ),
                    ));
                }
            }
        }
    }

    if !unit.servers.is_empty() {
        warnings.push(Warning::new(
            "W011",
            "cli block combined with server blocks in one directory",
        ));
    }
}

// ---------------------------------------------------------------------------
// Form rules
// ---------------------------------------------------------------------------

fn check_forms(unit: &MergedUnit, warnings: &mut Vec<Warning>) {
    for (_, form) in &unit.forms {
        let mut names: HashSet<&str> =
            form.fields.iter().map(|f| f.name.as_str()).collect();
        for group in &form.groups {
            for field in &group.fields {
                names.insert(field.name.as_str());
            }
        }

        let all_fields = form
            .fields
            .iter()
            .chain(form.groups.iter().flat_map(|g| g.fields.iter()))
            .chain(form.arrays.iter().flat_map(|a| a.fields.iter()));
        for field in all_fields {
            for validator in &field.validators {
                if matches!(validator, FieldValidator::Unknown) {
                    warnings.push(Warning::new(
                        "W012",
                        format!(
                            "Form '{}': unknown validator on field '{}'",
                            form.name, field.name
                        ),
                    ));
                }
            }
        }

        for step in &form.steps {
            for field in &step.fields {
                if !names.contains(field.as_str()) {
                    warnings.push(Warning::new(
                        "W013",
                        format!(
                            "Form '{}': step '{}' references unknown field '{}'",
                            form.name, step.name, field
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergedBlock, MergedCli, MergedStmt};

    fn codes(warnings: &[Warning]) -> Vec<&'static str> {
        warnings.iter().map(|w| w.code).collect()
    }

    #[test]
    fn protect_without_auth_and_require() {
        let unit = MergedUnit {
            security: Some(SecurityBlock {
                protect: vec![ProtectRule {
                    pattern: "/admin/**".into(),
                    require: None,
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let warnings = analyze(&unit);
        assert!(codes(&warnings).contains(&"W003"));
        assert!(codes(&warnings).contains(&"W004"));
    }

    #[test]
    fn undefined_and_duplicate_roles() {
        let unit = MergedUnit {
            security: Some(SecurityBlock {
                auth: Some(AuthConfig::default()),
                roles: vec![
                    RoleDecl {
                        name: "admin".into(),
                        permissions: vec![],
                    },
                    RoleDecl {
                        name: "admin".into(),
                        permissions: vec![],
                    },
                ],
                protect: vec![ProtectRule {
                    pattern: "/x".into(),
                    require: Some("ghost".into()),
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let warnings = analyze(&unit);
        assert!(codes(&warnings).contains(&"W001"));
        assert!(codes(&warnings).contains(&"W002"));
    }

    #[test]
    fn hardcoded_secret_flagged() {
        let unit = MergedUnit {
            security: Some(SecurityBlock {
                auth: Some(AuthConfig {
                    secret: SecretSource::Literal {
                        value: "hunter2".into(),
                    },
                    expiry_seconds: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(codes(&analyze(&unit)).contains(&"W005"));
    }

    #[test]
    fn cli_rules() {
        let command = |name: &str, params: Vec<Param>| MergedStmt {
            source: 0,
            stmt: Stmt::of(StmtKind::FunctionDeclaration(FunctionDecl {
                name: name.into(),
                params,
                body: vec![],
                is_async: false,
                is_public: false,
                return_type: None,
                is_wasm: false,
            })),
        };
        let flag = Param {
            name: "loud".into(),
            type_annotation: Some("Bool".into()),
            default: None,
            pattern: None,
            is_flag: true,
        };
        let unit = MergedUnit {
            sources: vec!["cli.tova".into()],
            cli: Some(MergedCli {
                config: vec![("colour".into(), "always".into())],
                commands: vec![
                    command("greet", vec![flag, Param::simple("name")]),
                    command("greet", vec![]),
                ],
            }),
            servers: vec![MergedBlock::default()],
            ..Default::default()
        };
        let warnings = analyze(&unit);
        let found = codes(&warnings);
        assert!(found.contains(&"W007"), "unknown config key");
        assert!(found.contains(&"W008"), "duplicate command");
        assert!(found.contains(&"W009"), "positional after flag");
        assert!(found.contains(&"W010"), "missing name");
        assert!(found.contains(&"W011"), "cli with server");
    }

    #[test]
    fn form_step_unknown_field() {
        let unit = MergedUnit {
            forms: vec![(
                0,
                FormDeclaration {
                    name: "signup".into(),
                    type_name: None,
                    fields: vec![FormField {
                        name: "email".into(),
                        initial: None,
                        validators: vec![FieldValidator::Unknown],
                    }],
                    groups: vec![],
                    arrays: vec![],
                    steps: vec![FormStep {
                        name: "one".into(),
                        fields: vec!["email".into(), "ghost".into()],
                    }],
                },
            )],
            ..Default::default()
        };
        let warnings = analyze(&unit);
        let found = codes(&warnings);
        assert!(found.contains(&"W012"));
        assert!(found.contains(&"W013"));
    }

    #[test]
    fn clean_unit_no_warnings() {
        assert!(analyze(&MergedUnit::default()).is_empty());
    }
}
