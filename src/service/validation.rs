//! Request validation: column-derived constraints plus per-column rules from config.

use crate::config::{ResolvedEntity, ValidationRule, ValueKind};
use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Full validation (create, PUT). Every required column must be present.
    pub fn validate(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        let mut errors = FieldErrors::default();
        for col in &entity.columns {
            let val = body.get(&col.name);
            let missing = val.map_or(true, Value::is_null);
            if missing && is_required(entity, &col.name) {
                errors.push(&col.name, "This field is required.");
            }
        }
        for (col, rule) in &entity.validation {
            let val = body.get(col);
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                errors.push(col, "This field is required.");
            }
        }
        for (col, v) in body {
            check_field(entity, col, v, &mut errors);
        }
        errors.finish()
    }

    /// Only the fields present in body (PATCH). Required is not enforced for missing fields.
    pub fn validate_partial(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        let mut errors = FieldErrors::default();
        for (col, v) in body {
            if v.is_null() && entity.column(col).is_some() && is_required(entity, col) {
                errors.push(col, "This field may not be null.");
            }
            check_field(entity, col, v, &mut errors);
        }
        errors.finish()
    }
}

/// Non-nullable without a default; a primary key is exempt when derived (`key_from`) or generated.
fn is_required(entity: &ResolvedEntity, column: &str) -> bool {
    let Some(col) = entity.column(column) else {
        return false;
    };
    if col.nullable || col.has_default {
        return false;
    }
    if col.name == entity.pk_column {
        return entity.key_from.is_empty() && entity.pk_kind != ValueKind::Integer;
    }
    true
}

#[derive(Default)]
struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    fn push(&mut self, col: &str, message: impl Into<String>) {
        let messages = self.fields.entry(col.to_string()).or_default();
        let message = message.into();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    fn finish(self) -> Result<(), AppError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let summary = self.fields.keys().cloned().collect::<Vec<_>>().join(", ");
        Err(AppError::Validation {
            message: format!("invalid fields: {}", summary),
            details: Some(serde_json::to_value(&self.fields).unwrap_or(Value::Null)),
        })
    }
}

fn check_field(entity: &ResolvedEntity, col: &str, v: &Value, errors: &mut FieldErrors) {
    if v.is_null() {
        return;
    }
    if let Some(info) = entity.column(col) {
        if let (Some(max), Some(s)) = (info.max_length, v.as_str()) {
            if s.chars().count() > max as usize {
                errors.push(col, format!("Ensure this field has no more than {} characters.", max));
            }
        }
        if info.kind == ValueKind::Integer && v.as_i64().is_none() && !v.is_boolean() {
            let parses = v.as_str().map_or(false, |s| s.trim().parse::<i64>().is_ok());
            if !parses {
                errors.push(col, "A valid integer is required.");
            }
        }
    }
    if let Some(rule) = entity.validation.get(col) {
        check_rule(col, v, rule, errors);
    }
}

fn check_rule(col: &str, v: &Value, rule: &ValidationRule, errors: &mut FieldErrors) {
    if let Some(format) = &rule.format {
        check_format(col, v, format, errors);
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            errors.push(col, format!("Ensure this field has no more than {} characters.", max));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            errors.push(col, format!("Ensure this field has at least {} characters.", min));
        }
    }
    if let Some(ref pattern) = rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        errors.push(col, "Enter a valid value.");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(column = %col, error = %e, "invalid validation pattern");
                errors.push(col, "Enter a valid value.");
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(col, format!("\"{}\" is not a valid choice.", display(v)));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            errors.push(col, format!("Ensure this value is greater than or equal to {}.", min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            errors.push(col, format!("Ensure this value is less than or equal to {}.", max));
        }
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str, errors: &mut FieldErrors) {
    let Some(s) = v.as_str() else {
        return;
    };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                errors.push(col, "Enter a valid email address.");
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                errors.push(col, "Must be a valid UUID.");
            }
        }
        "ip" => {
            if s.parse::<std::net::IpAddr>().is_err() {
                errors.push(col, "Enter a valid IPv4 or IPv6 address.");
            }
        }
        _ => {}
    }
}
