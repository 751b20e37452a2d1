//! Main binary entry point for the oscal-converter.

use clap::{Parser, Subcommand};
use colored::*;
use log::{info, warn};
use oscal_converter::batch::BatchFile;
use oscal_converter::collaborators::{InMemoryRuleStore, NoopArtifactStore, NoopHistory};
use oscal_converter::conversion::output_file_name;
use oscal_converter::errors::ConverterError;
use oscal_converter::rules::{RuleCatalog, ValidationRulesResponse};
use oscal_converter::{
    BatchOperationKind, BatchOperationRequest, BatchOrchestrator, ConversionRequest,
    EngineConfig, Format, ModelType, OscalService, ValidationRequest,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Engine config (JSON)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document to another serialization
    Convert {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, value_enum)]
        from: Option<Format>,

        #[arg(long, value_enum)]
        to: Option<Format>,

        #[arg(long, value_enum)]
        model_type: Option<ModelType>,
    },

    /// Validate a document
    Validate {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_enum)]
        format: Option<Format>,

        #[arg(long, value_enum)]
        model_type: Option<ModelType>,

        #[arg(long, help = "Also evaluate built-in and custom rules")]
        rules: bool,

        #[arg(long, value_name = "FILE", help = "Custom rules (JSON array)")]
        custom_rules: Option<PathBuf>,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    /// List validation rules
    Rules {
        #[arg(long, value_enum)]
        model_type: Option<ModelType>,

        #[arg(long, value_name = "FILE", help = "Custom rules (JSON array)")]
        custom_rules: Option<PathBuf>,

        #[arg(long, help = "Print the rules as JSON")]
        json: bool,
    },

    /// Validate or convert many documents concurrently
    Batch {
        #[arg(long, value_enum)]
        operation: BatchOperationKind,

        #[arg(long, value_enum)]
        to: Option<Format>,

        #[arg(long, value_name = "DIR", help = "Where converted documents are written")]
        out_dir: Option<PathBuf>,

        #[arg(long, value_enum)]
        model_type: Option<ModelType>,

        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,
    },
}

fn setup_logging(verbose: bool) {
    let filter_level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter(None, filter_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn actor() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_service(
    config: EngineConfig,
    custom_rules: Option<&Path>,
) -> Result<OscalService, ConverterError> {
    let store = match custom_rules {
        Some(path) => InMemoryRuleStore::from_file(path)?,
        None => InMemoryRuleStore::default(),
    };
    Ok(OscalService::new(
        Arc::new(RuleCatalog::builtin()),
        Arc::new(store),
        Arc::new(NoopHistory),
        Arc::new(NoopArtifactStore),
        config,
    ))
}

fn resolve_model_type(
    declared: Option<ModelType>,
    content: &str,
    format: Option<Format>,
    name: &str,
) -> Result<ModelType, ConverterError> {
    if let Some(model_type) = declared {
        return Ok(model_type);
    }
    let format = Format::resolve(format, Some(name), content)?;
    oscal_converter::detect_model_type(content, format)
}

fn run_convert(
    config: EngineConfig,
    input: PathBuf,
    output: PathBuf,
    from: Option<Format>,
    to: Option<Format>,
    model_type: Option<ModelType>,
) -> Result<ExitCode, ConverterError> {
    let content = oscal_converter::read_document(&input)?;
    let name = file_name(&input);
    let model_type = resolve_model_type(model_type, &content, from, &name)?;
    let to = to.or_else(|| Format::from_extension(&output).ok());

    let service = build_service(config, None)?;
    let request = ConversionRequest {
        content,
        model_type,
        from_format: from,
        to_format: to,
        file_name: Some(name.clone()),
    };
    let result = service.convert(&request, &actor());

    let Some(converted) = result.content else {
        return Err(ConverterError::InvalidInput(format!(
            "Conversion of {} failed: {}",
            name,
            result.error.unwrap_or_default()
        )));
    };

    std::fs::write(&output, converted).map_err(|e| {
        ConverterError::Io(e, format!("Failed to write {}", output.display()))
    })?;
    info!(
        "Converted {} ({} -> {}) to {}",
        name,
        result.from_format,
        result.to_format,
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_validate(
    config: EngineConfig,
    input: PathBuf,
    format: Option<Format>,
    model_type: Option<ModelType>,
    rules: bool,
    custom_rules: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode, ConverterError> {
    let content = oscal_converter::read_document(&input)?;
    let name = file_name(&input);
    let model_type = match resolve_model_type(model_type, &content, format, &name) {
        Ok(model_type) => model_type,
        Err(e) => {
            warn!("{}; validating as a catalog", e);
            ModelType::Catalog
        }
    };

    let service = build_service(config, custom_rules.as_deref())?;
    let request = ValidationRequest {
        content,
        model_type,
        format,
        file_name: Some(name),
        include_rules: rules,
    };
    let result = service.validate(&request, &actor());

    if json {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|e| ConverterError::Serialization(e.to_string()))?;
        println!("{}", rendered);
    } else if std::io::stdout().is_terminal() {
        result.print_colored();
    } else {
        result.print_plain();
    }

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_rules(response: &ValidationRulesResponse) {
    for category in &response.categories {
        if category.rules.is_empty() {
            continue;
        }
        println!("\n{} {}", category.name.bold(), format!("({})", category.id).dimmed());
        for rule in &category.rules {
            let severity = match rule.severity {
                oscal_converter::Severity::Error => rule.severity.as_str().red(),
                oscal_converter::Severity::Warning => rule.severity.as_str().yellow(),
                oscal_converter::Severity::Info => rule.severity.as_str().cyan(),
            };
            let origin = if rule.is_built_in { "" } else { " [custom]" };
            println!("  [{}] {} - {}{}", severity, rule.id.bright_blue(), rule.name, origin);
        }
    }
    println!("\n{} {}", "Total:".bold(), response.rules.len());
}

fn run_rules(
    config: EngineConfig,
    model_type: Option<ModelType>,
    custom_rules: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode, ConverterError> {
    let service = build_service(config, custom_rules.as_deref())?;
    let response = match model_type {
        Some(model_type) => service.get_rules_for_model_type(model_type),
        None => service.get_all_rules(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&response)
            .map_err(|e| ConverterError::Serialization(e.to_string()))?;
        println!("{}", rendered);
    } else {
        print_rules(&response);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_batch(
    config: EngineConfig,
    operation: BatchOperationKind,
    to: Option<Format>,
    out_dir: Option<PathBuf>,
    model_type: Option<ModelType>,
    files: Vec<PathBuf>,
) -> Result<ExitCode, ConverterError> {
    let target = to.unwrap_or(config.default_output_format);
    let mut batch_files = Vec::with_capacity(files.len());
    for path in &files {
        let content = oscal_converter::read_document(path)?;
        let name = file_name(path);
        let model_type = resolve_model_type(model_type, &content, None, &name).unwrap_or_else(|e| {
            warn!("{}: {}; treating as a catalog", name, e);
            ModelType::Catalog
        });
        batch_files.push(BatchFile {
            file_name: name,
            content,
            model_type,
            format: None,
        });
    }

    let service = Arc::new(build_service(config, None)?);
    let orchestrator = BatchOrchestrator::new(service);
    let request = BatchOperationRequest {
        operation,
        files: batch_files,
        target_format: Some(target),
    };

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ConverterError::Io(e, "Failed to start the batch runtime".to_string()))?;
    let result = runtime.block_on(async {
        let accepted = orchestrator.process_batch(request, &actor());
        orchestrator
            .wait_for_completion(&accepted.operation_id, Duration::from_millis(20))
            .await
    });
    let Some(result) = result else {
        return Err(ConverterError::InvalidInput(
            "Batch result disappeared before completion".to_string(),
        ));
    };

    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir).map_err(|e| {
            ConverterError::Io(e, format!("Failed to create {}", dir.display()))
        })?;
    }

    for file in result.results.iter().flatten() {
        if file.success {
            println!("{} {} ({} ms)", "✓".green().bold(), file.file_name, file.duration_ms);
        } else {
            println!(
                "{} {}: {}",
                "✗".red().bold(),
                file.file_name,
                file.error.as_deref().unwrap_or("failed")
            );
        }

        if let (Some(dir), Some(output)) = (&out_dir, &file.output) {
            let name = output_file_name(Some(&file.file_name), ModelType::Catalog, target);
            let path = dir.join(name);
            std::fs::write(&path, output).map_err(|e| {
                ConverterError::Io(e, format!("Failed to write {}", path.display()))
            })?;
        }
    }

    println!(
        "{} {} succeeded, {} failed ({} ms)",
        "Summary:".bold(),
        result.success_count,
        result.failure_count,
        result.total_duration_ms
    );

    Ok(if result.failure_count == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_app() -> Result<ExitCode, ConverterError> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Convert {
            input,
            output,
            from,
            to,
            model_type,
        } => run_convert(config, input, output, from, to, model_type),
        Command::Validate {
            input,
            format,
            model_type,
            rules,
            custom_rules,
            json,
        } => run_validate(config, input, format, model_type, rules, custom_rules, json),
        Command::Rules {
            model_type,
            custom_rules,
            json,
        } => run_rules(config, model_type, custom_rules, json),
        Command::Batch {
            operation,
            to,
            out_dir,
            model_type,
            files,
        } => run_batch(config, operation, to, out_dir, model_type, files),
    }
}

fn main() -> ExitCode {
    match run_app() {
        Ok(code) => code,
        Err(e) => {
            log::error!("A fatal error occurred:");
            log::error!("{}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(s) = source {
                log::error!("  Caused by: {}", s);
                source = std::error::Error::source(s);
            }
            ExitCode::FAILURE
        }
    }
}
