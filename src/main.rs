//! Command-line interface for xmlschema-idc

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use xmlschema_idc::documents::DocumentValidator;
#[cfg(feature = "cli")]
use xmlschema_idc::limits::Limits;
#[cfg(feature = "cli")]
use xmlschema_idc::loaders::{LoadedSchema, SchemaLoader};
#[cfg(feature = "cli")]
use xmlschema_idc::validators::CollectingReporter;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmlschema-idc")]
#[command(author, version, about = "XML Schema identity constraint validator", long_about = None)]
struct Cli {
    /// Log verbosity when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// List the identity constraints declared in an XSD schema
    Inspect {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Check XML documents against the identity constraints of a schema
    Validate {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// XML files to validate
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Output violations as JSON
        #[arg(short, long)]
        json: bool,

        /// JSON file with resource limits
        #[arg(long, value_name = "LIMITS")]
        limits: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Inspect { schema, json } => cmd_inspect(schema, json),
        Commands::Validate {
            schema,
            files,
            json,
            limits,
        } => cmd_validate(schema, files, json, limits),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

#[cfg(feature = "cli")]
fn init_tracing(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn load_schema(path: &Path, limits: &Limits) -> Result<LoadedSchema, Box<dyn std::error::Error>> {
    Ok(SchemaLoader::new().with_limits(limits.clone()).load_file(path)?)
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema_path: PathBuf, json_output: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let schema = load_schema(&schema_path, &Limits::default())?;
    let table = schema.table()?;

    if json_output {
        let constraints: Vec<serde_json::Value> = table
            .constraints()
            .map(|c| {
                serde_json::json!({
                    "name": c.name.to_string(),
                    "kind": c.kind.to_string(),
                    "element": c.element.to_string(),
                    "selector": c.selector.xpath,
                    "fields": c.fields.iter().map(|f| f.xpath.clone()).collect::<Vec<_>>(),
                    "refer": c.refer.as_ref().map(|r| r.to_string()),
                    "resolved": c.refer.is_none() || table.target_of(&c.name).is_some(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "targetNamespace": schema.target_namespace,
            "constraints": constraints,
            "typeHints": schema.type_hints.len(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(true);
    }

    println!("xmlschema-idc v{}", xmlschema_idc::VERSION);
    println!();
    println!("Schema: {}", schema_path.display());
    match &schema.target_namespace {
        Some(ns) => println!("  Target Namespace: {}", ns),
        None => println!("  Target Namespace: (none)"),
    }
    println!("  Type Hints: {}", schema.type_hints.len());
    println!();
    println!("=== Identity Constraints ===");
    for c in table.constraints() {
        println!("  {} {} on {}", c.kind, c.name, c.element);
        println!("    selector: {}", c.selector.xpath);
        for field in &c.fields {
            println!("    field:    {}", field.xpath);
        }
        if let Some(refer) = &c.refer {
            let status = if table.target_of(&c.name).is_some() { "" } else { " (unresolved)" };
            println!("    refer:    {}{}", refer, status);
        }
    }

    Ok(true)
}

#[cfg(feature = "cli")]
fn cmd_validate(
    schema_path: PathBuf,
    files: Vec<PathBuf>,
    json_output: bool,
    limits_path: Option<PathBuf>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let limits = match limits_path {
        Some(path) => Limits::from_json(&fs::read_to_string(path)?)?,
        None => Limits::default(),
    };

    let mut reporter = CollectingReporter::new();
    let schema = SchemaLoader::new()
        .with_limits(limits.clone())
        .load_file(&schema_path)
        .or_else(|_| -> xmlschema_idc::Result<LoadedSchema> {
            // Fall back to lenient loading so bad patterns show up as violations
            let content = fs::read_to_string(&schema_path)?;
            SchemaLoader::new()
                .with_limits(limits.clone())
                .load_str_reporting(&content, &mut reporter)
        })?;
    let schema_violations = reporter.take();

    let mut validator = DocumentValidator::new(schema.table()?, CollectingReporter::new())
        .with_type_hints(schema.type_hints.clone())
        .with_limits(limits);

    let mut all_valid = schema_violations.is_empty();
    let mut reports = Vec::new();

    for violation in &schema_violations {
        if !json_output {
            println!("{}: {}", schema_path.display(), violation);
        }
    }

    for file in &files {
        let outcome = validator.validate_file(file);
        let violations = validator.reporter_mut().take();
        let valid = violations.is_empty() && outcome.is_ok();
        all_valid &= valid;

        if json_output {
            reports.push(serde_json::json!({
                "file": file.display().to_string(),
                "valid": valid,
                "error": outcome.as_ref().err().map(|e| e.to_string()),
                "violations": violations,
            }));
            continue;
        }

        match &outcome {
            Err(e) => println!("✗ {}: {}", file.display(), e),
            Ok(_) if valid => println!("✓ {} is valid", file.display()),
            Ok(_) => println!("✗ {} is invalid", file.display()),
        }
        for violation in &violations {
            println!("  - {}", violation);
        }
    }

    if json_output {
        let output = serde_json::json!({
            "schema": schema_path.display().to_string(),
            "schemaViolations": schema_violations,
            "documents": reports,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(all_valid)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
