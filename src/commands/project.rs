// src/commands/project.rs
//! Commands that print project metadata

use std::path::Path;

use anyhow::Result;
use tpforge::gav::Gav;
use tpforge::interop::{BuildProperties, ClasspathEntry, classpath};

/// Print the Maven repository path of a GAV
pub fn cmd_gav(coordinates: &str, classifier: Option<&str>, extension: Option<&str>) -> Result<()> {
    let gav = Gav::parse(coordinates)?;
    println!("{}", gav.relative_path(classifier, extension));
    Ok(())
}

fn print_attributes(entry: &ClasspathEntry) {
    for (name, value) in entry.attributes() {
        println!("      {} = {}", name, value);
    }
}

/// Print the entries of a project's `.classpath`
pub fn cmd_classpath(project: &Path) -> Result<()> {
    let entries = classpath::parse_project(project)?;
    if entries.is_empty() {
        println!("No classpath entries in {}", project.display());
        return Ok(());
    }
    for entry in &entries {
        match entry {
            ClasspathEntry::SourceFolder { path, output, .. } => {
                println!("  src  {} -> {}", path.display(), output.display())
            }
            ClasspathEntry::JUnitContainer { junit, .. } => {
                let bundles: Vec<&str> = entry.junit_bundles().iter().map(|b| b.id).collect();
                println!("  junit {} ({})", junit, bundles.join(", "));
            }
            ClasspathEntry::JreContainer { path, .. } => match entry.jre_name() {
                Some(name) => println!("  jre  {}", name),
                None => println!("  jre  {}", path),
            },
            ClasspathEntry::Container { path, .. } => println!("  con  {}", path),
            ClasspathEntry::Library { path, .. } => println!("  lib  {}", path.display()),
            ClasspathEntry::M2Variable { repository_path, .. } => match entry.gav() {
                Some(gav) => println!("  m2   {}", gav),
                None => println!("  m2   {}", repository_path),
            },
        }
        print_attributes(entry);
    }
    Ok(())
}

fn print_list(key: &str, values: &[String]) {
    if !values.is_empty() {
        println!("{} = {}", key, values.join(","));
    }
}

fn print_value(key: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("{} = {}", key, value);
    }
}

/// Print the recognized keys of a project's `build.properties`
pub fn cmd_build_properties(project: &Path) -> Result<()> {
    let props = BuildProperties::load(project)?;
    print_list("bin.includes", &props.bin_includes);
    print_list("bin.excludes", &props.bin_excludes);
    print_list("src.includes", &props.source_includes);
    print_list("src.excludes", &props.source_excludes);
    print_list("jars.extra.classpath", &props.jars_extra_classpath);
    print_list("jars.compile.order", &props.jars_compile_order);
    print_value("javacSource", props.javac_source.as_deref());
    print_value("javacTarget", props.javac_target.as_deref());
    print_value("jre.compilation.profile", props.jre_compilation_profile.as_deref());
    print_value("forceContextQualifier", props.force_context_qualifier.as_deref());
    print_value("additional.bundles", props.additional_bundles.as_deref());
    println!("rootFiles.useDefaultExcludes = {}", props.root_files_use_default_excludes);
    for (jar, folders) in &props.jar_to_source_folders {
        print_list(&format!("source.{jar}"), folders);
    }
    for (jar, folder) in &props.jar_to_output_folder {
        println!("output.{} = {}", jar, folder);
    }
    for (jar, entries) in &props.jar_to_extra_classpath {
        print_list(&format!("extra.{jar}"), entries);
    }
    for (jar, encoding) in &props.jar_to_javac_default_encoding {
        println!("javacDefaultEncoding.{} = {}", jar, encoding);
    }
    for (jar, excludes) in &props.jar_to_exclude_files {
        print_list(&format!("exclude.{jar}"), excludes);
    }
    for (jar, manifest) in &props.jar_to_manifest {
        println!("manifest.{} = {}", jar, manifest);
    }
    for (key, value) in &props.root_entries {
        println!("{} = {}", key, value);
    }
    Ok(())
}
