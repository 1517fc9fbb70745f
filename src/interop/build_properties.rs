// src/interop/build_properties.rs

//! PDE `build.properties`
//!
//! Values are comma separated and trimmed. Unknown keys are ignored and a
//! missing file yields empty properties.

use std::collections::BTreeMap;
use std::path::Path;

use crate::ee::ExecutionEnvironment;
use crate::error::{Error, Result};

pub const BUILD_PROPERTIES_FILE: &str = "build.properties";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProperties {
    pub javac_source: Option<String>,
    pub javac_target: Option<String>,
    pub jre_compilation_profile: Option<String>,
    pub force_context_qualifier: Option<String>,
    pub additional_bundles: Option<String>,
    pub root_files_use_default_excludes: bool,

    pub bin_includes: Vec<String>,
    pub bin_excludes: Vec<String>,
    pub source_includes: Vec<String>,
    pub source_excludes: Vec<String>,
    pub jars_extra_classpath: Vec<String>,
    pub jars_compile_order: Vec<String>,

    /// `source.<jar>`
    pub jar_to_source_folders: BTreeMap<String, Vec<String>>,
    /// `extra.<jar>`
    pub jar_to_extra_classpath: BTreeMap<String, Vec<String>>,
    /// `javacDefaultEncoding.<jar>`
    pub jar_to_javac_default_encoding: BTreeMap<String, String>,
    /// `output.<jar>`
    pub jar_to_output_folder: BTreeMap<String, String>,
    /// `exclude.<jar>`
    pub jar_to_exclude_files: BTreeMap<String, Vec<String>>,
    /// `manifest.<jar>`
    pub jar_to_manifest: BTreeMap<String, String>,
    /// `root` and `root.*` keys with their raw values
    pub root_entries: BTreeMap<String, String>,
}

impl Default for BuildProperties {
    fn default() -> Self {
        Self::from_properties(&BTreeMap::new())
    }
}

fn split_and_trim(value: Option<&String>) -> Vec<String> {
    match value {
        Some(value) if !value.trim().is_empty() => value.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

impl BuildProperties {
    /// Interpret parsed key/value pairs
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let trimmed = |key: &str| properties.get(key).map(|v| v.trim().to_string());
        let mut props = Self {
            javac_source: trimmed("javacSource"),
            javac_target: trimmed("javacTarget"),
            jre_compilation_profile: trimmed("jre.compilation.profile"),
            force_context_qualifier: trimmed("forceContextQualifier"),
            additional_bundles: trimmed("additional.bundles"),
            root_files_use_default_excludes: properties
                .get("rootFiles.useDefaultExcludes")
                .is_none_or(|v| v.trim().eq_ignore_ascii_case("true")),
            bin_includes: split_and_trim(properties.get("bin.includes")),
            bin_excludes: split_and_trim(properties.get("bin.excludes")),
            source_includes: split_and_trim(properties.get("src.includes")),
            source_excludes: split_and_trim(properties.get("src.excludes")),
            jars_extra_classpath: split_and_trim(properties.get("jars.extra.classpath")),
            jars_compile_order: split_and_trim(properties.get("jars.compile.order")),
            jar_to_source_folders: BTreeMap::new(),
            jar_to_extra_classpath: BTreeMap::new(),
            jar_to_javac_default_encoding: BTreeMap::new(),
            jar_to_output_folder: BTreeMap::new(),
            jar_to_exclude_files: BTreeMap::new(),
            jar_to_manifest: BTreeMap::new(),
            root_entries: BTreeMap::new(),
        };

        for (key, value) in properties {
            let key = key.trim();
            if let Some(jar) = key.strip_prefix("source.") {
                props.jar_to_source_folders.insert(jar.to_string(), split_and_trim(Some(value)));
            } else if let Some(jar) = key.strip_prefix("extra.") {
                props.jar_to_extra_classpath.insert(jar.to_string(), split_and_trim(Some(value)));
            } else if let Some(jar) = key.strip_prefix("javacDefaultEncoding.") {
                props.jar_to_javac_default_encoding.insert(jar.to_string(), value.clone());
            } else if let Some(jar) = key.strip_prefix("output.") {
                props.jar_to_output_folder.insert(jar.to_string(), value.clone());
            } else if let Some(jar) = key.strip_prefix("exclude.") {
                props.jar_to_exclude_files.insert(jar.to_string(), split_and_trim(Some(value)));
            } else if let Some(jar) = key.strip_prefix("manifest.") {
                props.jar_to_manifest.insert(jar.to_string(), value.clone());
            } else if key == "root" || key.starts_with("root.") {
                props.root_entries.insert(key.to_string(), value.clone());
            }
        }
        props
    }

    pub fn parse(text: &str) -> Self {
        Self::from_properties(&parse_properties(text))
    }

    /// Read `build.properties` from a project directory
    pub fn load(basedir: &Path) -> Result<Self> {
        let file = basedir.join(BUILD_PROPERTIES_FILE);
        if !file.is_file() {
            return Ok(Self::default());
        }
        Ok(Self::parse(&std::fs::read_to_string(file)?))
    }

    /// Fail if `javacTarget` produces classes `environment` cannot run
    pub fn check_target_level(&self, environment: &ExecutionEnvironment) -> Result<()> {
        match &self.javac_target {
            Some(target) if !environment.is_compatible_compiler_target_level(target) => {
                Err(Error::InvalidArgument(format!(
                    "Target level {} is incompatible with the execution environment {}",
                    target,
                    environment.profile_name()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Parse `.properties` text: `#`/`!` comments, `=`, `:` or whitespace
/// separators, backslash line continuations and escapes
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut logical = String::new();
    for line in text.lines() {
        let line = line.trim_start();
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }
        logical.push_str(line);
        let (key, value) = split_entry(&logical);
        properties.insert(key, value);
        logical.clear();
    }
    if !logical.is_empty() {
        let (key, value) = split_entry(&logical);
        properties.insert(key, value);
    }
    properties
}

fn split_entry(line: &str) -> (String, String) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }
    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\x0c']);
    }
    (unescape(key), unescape(rest))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
