//! Reading logic, formulas and inputs from the command line

use anyhow::{bail, Context, Result};
use dose_calc::{inputs_from_value, logic_from_value, Formula, InputMap, LogicDefinition};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

/// Document found in a JSON file given to `validate`
#[derive(Debug)]
pub enum Document {
    Logic(LogicDefinition),
    Formula(Box<Formula>),
}

/// Read a file, or stdin when the path is `-`
pub fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = read_source(path)?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn load_logic(path: &Path) -> Result<LogicDefinition> {
    logic_from_value(read_json(path)?)
        .with_context(|| format!("Invalid logic definition in {}", path.display()))
}

pub fn load_formula(path: &Path) -> Result<Formula> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Invalid formula in {}", path.display()))
}

/// A JSON array is a logic definition, an object is a formula
pub fn load_document(path: &Path) -> Result<Document> {
    let value = read_json(path)?;
    match value {
        Value::Array(_) => Ok(Document::Logic(logic_from_value(value).with_context(
            || format!("Invalid logic definition in {}", path.display()),
        )?)),
        Value::Object(_) => Ok(Document::Formula(Box::new(
            serde_json::from_value(value)
                .with_context(|| format!("Invalid formula in {}", path.display()))?,
        ))),
        _ => bail!(
            "{} must hold a logic array or a formula object",
            path.display()
        ),
    }
}

/// Split a `name=value` argument
pub fn parse_pair(arg: &str) -> Result<(String, String)> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("Expected name=value, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing input name in '{}'", arg);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Merge an optional inputs JSON file with `name=value` pairs
///
/// Pairs override the file. Values go through the same parsing as
/// submitted form data, so blank values are dropped.
pub fn collect_inputs(pairs: &[String], json_file: Option<&Path>) -> Result<InputMap> {
    let mut merged = match json_file {
        Some(path) => match read_json(path)? {
            Value::Object(object) => object,
            _ => bail!("{} must hold a JSON object of inputs", path.display()),
        },
        None => Map::new(),
    };

    for arg in pairs {
        let (name, value) = parse_pair(arg)?;
        merged.insert(name, Value::String(value));
    }

    Ok(inputs_from_value(&Value::Object(merged))?)
}
