//! Layer resolution: which enabled locals belong to each category stack.
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;

use crate::cli::{OutputFormat, PathSourceArg, ResolveLayersArgs};
use crate::config::{process_env, Lookup};

mod literal;
mod output;

pub use literal::parse_string_list;

/// Category stack variables in output order.
pub const STACK_VARIABLES: [&str; 7] = [
    "metadata_stack",
    "datadog_stack",
    "baseline_stack",
    "networking_stack",
    "tableau_stack",
    "abc_stack",
    "datalake_stack",
];

/// Which locals entry a layer's `path` is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    /// Always the first entry, even when the layer is declared in a later one.
    First,
    /// The entry that declares the layer.
    Own,
}

impl From<PathSourceArg> for PathSource {
    fn from(arg: PathSourceArg) -> Self {
        match arg {
            PathSourceArg::First => PathSource::First,
            PathSourceArg::Own => PathSource::Own,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    pub variable: &'static str,
    pub entries: Vec<String>,
}

impl LayerStack {
    /// `metadata_stack` prints as `metadata_layers`.
    pub fn label(&self) -> String {
        format!("{}_layers", self.variable.trim_end_matches("_stack"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStacks(pub Vec<LayerStack>);

impl LayerStacks {
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self> {
        let mut stacks = Vec::with_capacity(STACK_VARIABLES.len());
        for variable in STACK_VARIABLES {
            let raw = lookup(variable).ok_or_else(|| anyhow!("{variable} is not set"))?;
            let entries =
                parse_string_list(&raw).with_context(|| format!("parse {variable}"))?;
            stacks.push(LayerStack { variable, entries });
        }
        Ok(Self(stacks))
    }
}

/// The `locals` entries of an input document, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalsDocument {
    pub entries: Vec<serde_json::Map<String, Value>>,
}

impl LocalsDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text).context("parse locals document")?;
        let locals = document
            .get("locals")
            .ok_or_else(|| anyhow!("document has no `locals` section"))?;
        let entries = match locals {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(anyhow!(
                        "locals[{index}] must be an object, found {}",
                        kind(other)
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            Value::Object(map) => vec![map.clone()],
            other => {
                return Err(anyhow!(
                    "`locals` must be an array or object, found {}",
                    kind(other)
                ))
            }
        };
        Ok(Self { entries })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnabledLayers {
    /// Enabled keys in discovery order; a key enabled in two entries appears twice.
    pub keys: Vec<String>,
    /// Key to `path`, first discovery wins.
    pub paths: Vec<(String, Option<Value>)>,
}

/// Python truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub fn enabled_layers(doc: &LocalsDocument, source: PathSource) -> EnabledLayers {
    let mut enabled = EnabledLayers::default();
    let first = doc.entries.first();
    for entry in &doc.entries {
        for (key, value) in entry {
            let Value::Object(layer) = value else {
                continue;
            };
            if !layer.get("enabled").is_some_and(is_truthy) {
                continue;
            }
            enabled.keys.push(key.clone());
            if enabled.paths.iter().any(|(seen, _)| seen == key) {
                continue;
            }
            let path_holder = match source {
                PathSource::First => first.and_then(|first| first.get(key)),
                PathSource::Own => Some(value),
            };
            let path = path_holder
                .and_then(Value::as_object)
                .and_then(|holder| holder.get("path"))
                .cloned();
            enabled.paths.push((key.clone(), path));
        }
    }
    enabled
}

/// Stack entries that are enabled, in stack order.
pub fn intersect(stack: &[String], enabled: &[String]) -> Vec<String> {
    stack
        .iter()
        .filter(|entry| enabled.contains(*entry))
        .cloned()
        .collect()
}

/// The eight labeled lines: the path map first, then one line per stack.
pub fn render(
    stacks: &LayerStacks,
    enabled: &EnabledLayers,
    format: OutputFormat,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(stacks.0.len() + 1);
    lines.push(output::line(
        "filepath_map",
        &output::path_map(&enabled.paths),
        format,
    ));
    for stack in &stacks.0 {
        let layers = intersect(&stack.entries, &enabled.keys);
        lines.push(output::line(
            &stack.label(),
            &output::string_list(&layers),
            format,
        ));
    }
    lines
}

pub fn run_resolve_layers(args: &ResolveLayersArgs) -> Result<()> {
    let stacks = LayerStacks::from_lookup(&process_env)?;
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let doc = LocalsDocument::parse(&text)
        .with_context(|| format!("load {}", args.file.display()))?;
    let enabled = enabled_layers(&doc, args.path_source.into());
    tracing::debug!(
        entries = doc.entries.len(),
        enabled = enabled.keys.len(),
        "resolved enabled layers"
    );
    for line in render(&stacks, &enabled, args.format) {
        println!("{line}");
    }
    Ok(())
}
