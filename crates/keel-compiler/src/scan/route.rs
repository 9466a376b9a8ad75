//! Route and job metadata parsing.
//!
//! Metadata is read syntactically from exported constants:
//!
//! ```typescript
//! export const Route: RouteProps = {
//!   method: HttpMethod.get,
//!   path: "/car/:id",
//!   permissions: ["car:get"],
//! };
//!
//! export const Job: JobProps = { id: "cleanup", cron: "0 3 * * *", singleton: true };
//! ```
//!
//! Only literal values are understood. Short-hand properties (`{ path }`)
//! refer to variables whose values are unknown at build time, so they are
//! reported as warnings and ignored.

use crate::diagnostic::{CompilerWarning, Span};
use crate::frontend::typescript::ast::{Expr, ObjectEntry, ParsedFile};
use crate::ir::{HttpMethod, JobProps, ParamMetadata, RouteProps};

/// Reads `export const Route = { ... }` from a handler module.
pub fn route_props(file: &ParsedFile, warnings: &mut Vec<CompilerWarning>) -> Option<RouteProps> {
    let (span, entries) = exported_object(file, "Route")?;
    let mut route = RouteProps::default();

    for (key, value) in pairs(span, entries, "Route", warnings) {
        match key {
            "method" => {
                route.method = method_value(value);
                if route.method.is_none() {
                    warnings.push(CompilerWarning::at(
                        span,
                        format!("unrecognized route method `{}`", expr_text(value)),
                    ));
                }
            }
            "path" => route.path = string_value(value),
            "permissions" => route.permissions = string_list(value),
            "skipAutoRegister" => route.skip_auto_register = bool_value(value),
            "mockApi" => route.mock_api = bool_value(value),
            "docs" => route.docs = string_value(value),
            "queryMetadata" => route.query_metadata = param_list(value),
            "paramsMetadata" => route.params_metadata = param_list(value),
            _ => {}
        }
    }

    Some(route)
}

/// Reads `export const Job = { ... }` from a job module.
pub fn job_props(file: &ParsedFile, warnings: &mut Vec<CompilerWarning>) -> Option<JobProps> {
    let (span, entries) = exported_object(file, "Job")?;
    let mut job = JobProps::default();

    for (key, value) in pairs(span, entries, "Job", warnings) {
        match key {
            "id" => job.id = string_value(value).unwrap_or_default(),
            "cron" => job.cron = string_value(value),
            "interval" => job.interval_ms = duration_value(value),
            "afterDelay" => job.after_delay_ms = duration_value(value),
            "singleton" => job.singleton = bool_value(value),
            _ => {}
        }
    }

    Some(job)
}

fn exported_object<'a>(file: &'a ParsedFile, name: &str) -> Option<(&'a Span, &'a [ObjectEntry])> {
    let variable = file.variable(name).filter(|v| v.exported)?;
    match &variable.initializer {
        Some(Expr::Object(entries)) => Some((&variable.span, entries)),
        _ => None,
    }
}

/// Key/value pairs of an object literal, warning about short-hand entries.
fn pairs<'a>(
    span: &Span,
    entries: &'a [ObjectEntry],
    object: &str,
    warnings: &mut Vec<CompilerWarning>,
) -> Vec<(&'a str, &'a Expr)> {
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            ObjectEntry::Pair { key, value } => out.push((key.as_str(), value)),
            ObjectEntry::Shorthand(name) => warnings.push(CompilerWarning::at(
                span,
                format!(
                    "short-hand property `{}` in {} is not supported, write `{}: <value>`",
                    name, object, name
                ),
            )),
        }
    }
    out
}

/// `HttpMethod.get`, `"get"` or `"GET"`.
fn method_value(value: &Expr) -> Option<HttpMethod> {
    match value {
        Expr::Member { property, .. } => HttpMethod::parse(property),
        Expr::String(s) => HttpMethod::parse(s),
        _ => None,
    }
}

fn string_value(value: &Expr) -> Option<String> {
    match value {
        Expr::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn bool_value(value: &Expr) -> bool {
    matches!(value, Expr::Bool(true))
}

/// A single string or an array of strings.
fn string_list(value: &Expr) -> Vec<String> {
    match value {
        Expr::String(s) => vec![s.clone()],
        Expr::Array(items) => items.iter().filter_map(string_value).collect(),
        _ => Vec::new(),
    }
}

fn param_list(value: &Expr) -> Vec<ParamMetadata> {
    let Expr::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Expr::Object(entries) => Some(entries),
            _ => None,
        })
        .map(|entries| {
            let mut param = ParamMetadata::default();
            for entry in entries {
                if let ObjectEntry::Pair { key, value } = entry {
                    match key.as_str() {
                        "name" => param.name = string_value(value).unwrap_or_default(),
                        "description" => param.description = string_value(value),
                        "required" => param.required = bool_value(value),
                        "type" => param.param_type = string_value(value),
                        _ => {}
                    }
                }
            }
            param
        })
        .collect()
}

/// Milliseconds from a number or a duration string like `"90s"` or `"1h30m"`.
fn duration_value(value: &Expr) -> Option<u64> {
    match value {
        Expr::Number(n) if *n >= 0.0 => Some(*n as u64),
        Expr::String(s) => parse_duration(s),
        _ => None,
    }
}

/// Parses `ms`, `s`, `m`, `h` and `d` units, which may be combined.
/// A bare number is taken as milliseconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ms) = text.parse::<u64>() {
        return Some(ms);
    }

    let mut total: u64 = 0;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let factor = match rest[..unit_len].trim() {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total = total.checked_add(amount.checked_mul(factor)?)?;
    }
    Some(total)
}

fn expr_text(value: &Expr) -> String {
    match value {
        Expr::Identifier(name) | Expr::Other(name) => name.clone(),
        Expr::Member { object, property } => format!("{}.{}", object, property),
        other => format!("{:?}", other),
    }
}
