use anyhow::Result;
use bundle_patcher::tree::{check_tree, plan_tree, write_plan, TreeError};
use bundle_patcher::{
    builtin, extend_registry, Anchor, OutputGuard, TargetEnvironment, TransformDescriptor,
    TransformError, TransformPipeline,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundle-patcher")]
#[command(about = "Specialize compiled module scaffolding per build target", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TransformSource {
    /// Extra transform definitions (TOML); may be repeated
    #[arg(short, long = "config")]
    configs: Vec<PathBuf>,

    /// Do not register the built-in transforms
    #[arg(long)]
    no_builtin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a compiled module tree for one target
    Apply {
        /// Build target: server, browser or browser-vendored
        #[arg(short, long)]
        target: TargetEnvironment,

        /// Root of the compiled module tree
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the patched tree to
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        source: TransformSource,

        /// Write a .map file next to every patched module
        #[arg(long)]
        source_maps: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Dry run - report what would change without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Check that every applicable transform still finds its anchor
    Check {
        /// Build target: server, browser or browser-vendored
        #[arg(short, long)]
        target: TargetEnvironment,

        /// Root of the compiled module tree
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        source: TransformSource,
    },

    /// List registered transforms and the targets they cover
    List {
        /// Show the registry for this target only
        #[arg(short, long)]
        target: Option<TargetEnvironment>,

        #[command(flatten)]
        source: TransformSource,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            target,
            input,
            output,
            source,
            source_maps,
            diff,
            dry_run,
        } => cmd_apply(target, &input, &output, &source, source_maps, diff, dry_run),

        Commands::Check {
            target,
            input,
            source,
        } => cmd_check(target, &input, &source),

        Commands::List { target, source } => cmd_list(target, &source),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "bundle_patcher=debug"
    } else {
        "bundle_patcher=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Helper: Build the descriptor list for `target`.
///
/// Built-ins come first, then each config file in command-line order. A
/// config transform with the same id as an earlier one takes its place in
/// the order instead of running twice.
fn load_descriptors(
    target: TargetEnvironment,
    source: &TransformSource,
) -> Result<Vec<TransformDescriptor>> {
    let mut descriptors = if source.no_builtin {
        Vec::new()
    } else {
        builtin::registry(target)
    };

    for path in &source.configs {
        extend_registry(&mut descriptors, path)?;
    }

    Ok(descriptors)
}

/// Helper: Show unified diff between original and patched content
fn display_diff(id: &str, original: &str, patched: &str) {
    println!("\n{}", format!("--- {id} (original)").dimmed());
    println!("{}", format!("+++ {id} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, patched);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Helper: Explain a fatal transform error, with a drift hint when the
/// module text is at hand.
fn report_transform_error(err: &TransformError, module_text: Option<&str>) {
    eprintln!("{} {}: {}", "✗".red(), err.module_id(), err.transform());
    match err {
        TransformError::MissingAnchor { anchor, .. } => {
            eprintln!("  {}", "CONFLICT: Anchor not found".red());
            eprintln!("  Expected literal text:");
            for line in anchor.lines() {
                eprintln!("    {}", line.dimmed());
            }
            if let Some(hint) = module_text.and_then(|text| err.drift_hint(text)) {
                eprintln!(
                    "  Closest line ({:.0}% similar) at line {}:",
                    hint.similarity * 100.0,
                    hint.line
                );
                eprintln!("    {}", hint.text.yellow());
            }
            eprintln!("  Possible causes:");
            eprintln!("    - Upstream scaffolding changed shape");
            eprintln!("    - Compiler output formatting changed");
            eprintln!("  Action: Update the transform's anchor to match the new output");
        }
        TransformError::UnsupportedTarget { target, .. } => {
            eprintln!(
                "  {}",
                format!("CONFLICT: No replacement registered for target '{target}'").red()
            );
            eprintln!("  Action: Add a replacement for this target or drop the transform from its registry");
        }
        TransformError::Edit { source, .. } => {
            eprintln!("  Edit error: {}", source);
        }
    }
}

fn cmd_apply(
    target: TargetEnvironment,
    input: &Path,
    output: &Path,
    source: &TransformSource,
    source_maps: bool,
    show_diff: bool,
    dry_run: bool,
) -> Result<()> {
    let pipeline = TransformPipeline::new(target, load_descriptors(target, source)?);

    println!("Input: {}", input.display());
    println!("Target: {}", target);
    println!("Transforms: {}", pipeline.descriptors().len());
    println!();

    // Nothing is written unless every module succeeds.
    let plan = match plan_tree(&pipeline, input) {
        Ok(plan) => plan,
        Err(TreeError::Transform(err)) => {
            let module_text = fs::read_to_string(input.join(err.module_id())).ok();
            report_transform_error(&err, module_text.as_deref());
            eprintln!();
            eprintln!("{}", "Build aborted; no output was written.".red().bold());
            std::process::exit(1);
        }
        Err(other) => return Err(other.into()),
    };

    let mut patched_count = 0;
    for (module, patched) in plan.patched() {
        let verb = if dry_run { "Would patch" } else { "Patched" };
        println!(
            "{} {}: {} ({})",
            "✓".green(),
            module.id,
            verb,
            patched.applied.join(", ")
        );
        if show_diff {
            display_diff(&module.id, &module.original, &patched.text);
        }
        patched_count += 1;
    }

    let module_count = plan.module_count();
    if dry_run {
        println!();
        println!("{}", "[DRY RUN - nothing written]".cyan());
    } else {
        let guard = OutputGuard::new(input, output)?;
        let summary = write_plan(&plan, &guard, source_maps)?;
        println!();
        println!("Output: {}", guard.output_root().display());
        if source_maps {
            println!("  {} source maps", summary.source_maps);
        }
        if summary.stale_maps > 0 {
            println!(
                "  {} stale input maps left out",
                format!("{}", summary.stale_maps).yellow()
            );
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} patched", format!("{}", patched_count).green());
    println!(
        "  {} passed through",
        format!("{}", module_count - patched_count).dimmed()
    );

    Ok(())
}

fn cmd_check(target: TargetEnvironment, input: &Path, source: &TransformSource) -> Result<()> {
    let pipeline = TransformPipeline::new(target, load_descriptors(target, source)?);
    let reports = check_tree(&pipeline, input)?;

    println!("{}", "Checking transforms...".bold());
    println!("Input: {}", input.display());
    println!("Target: {}", target);
    println!();

    let mut verified = 0;
    let mut failed = 0;
    let mut matched: BTreeSet<&str> = BTreeSet::new();

    for report in &reports {
        for descriptor in pipeline.applicable(&report.id) {
            matched.insert(descriptor.name.as_str());
        }
        match &report.outcome {
            Ok(Some(patched)) => {
                println!(
                    "{} {}: Verified ({})",
                    "✓".green(),
                    report.id,
                    patched.applied.join(", ")
                );
                verified += 1;
            }
            Ok(None) => {}
            Err(err) => {
                report_transform_error(err, Some(&report.original));
                failed += 1;
            }
        }
    }

    let unmatched: Vec<&str> = pipeline
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.name.as_str())
        .filter(|name| !matched.contains(name))
        .collect();
    for name in &unmatched {
        println!(
            "{} {}: matched no modules",
            "⊘".yellow(),
            name
        );
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} failed", format!("{}", failed).red());
    println!("  {} unmatched transforms", format!("{}", unmatched.len()).yellow());

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(target: Option<TargetEnvironment>, source: &TransformSource) -> Result<()> {
    let targets: Vec<TargetEnvironment> = match target {
        Some(target) => vec![target],
        None => TargetEnvironment::ALL.to_vec(),
    };

    for target in targets {
        let descriptors = load_descriptors(target, source)?;
        println!("{} ({} transforms)", target.to_string().bold(), descriptors.len());
        for descriptor in &descriptors {
            let anchor = match &descriptor.anchor {
                Anchor::Literal(text) => format!("literal, {} bytes", text.len()),
                Anchor::Prepend => "prepend".to_string(),
            };
            let covered: Vec<String> = descriptor.targets().map(|t| t.to_string()).collect();
            println!("  - {}", descriptor.name.cyan());
            if let Some(description) = &descriptor.description {
                println!("    {}", description.dimmed());
            }
            println!("    modules: {}", descriptor.applies_to);
            println!("    anchor: {}", anchor);
            println!("    targets: {}", covered.join(", "));
        }
        println!();
    }

    Ok(())
}
