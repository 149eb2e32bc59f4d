//! rust_limma command-line interface

use std::path::Path;

use clap::Parser;
use log::{info, warn, LevelFilter};

use rust_limma::cli::{Cli, Commands};
use rust_limma::io::write_design;
use rust_limma::run_pipeline;
use rust_limma::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "normalize", "design", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_limma {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            intensities,
            groups,
            probe_map,
            annotation,
            config,
            output,
            numerator,
            denominator,
            adj_p,
            lfc,
            proportion,
            adjust,
            join_policy,
            exclude,
            threads,
        }) => run_analysis(
            &intensities,
            &groups,
            probe_map.as_deref(),
            annotation.as_deref(),
            config.as_deref(),
            &output,
            numerator,
            denominator,
            adj_p,
            lfc,
            proportion,
            adjust.as_deref(),
            join_policy.as_deref(),
            exclude,
            threads,
        ),
        Some(Commands::Normalize {
            intensities,
            probe_map,
            config,
            output,
        }) => run_normalize(&intensities, probe_map.as_deref(), config.as_deref(), &output),
        Some(Commands::Design {
            groups,
            intensities,
            config,
        }) => run_design(&groups, intensities.as_deref(), config.as_deref()),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.stage(), e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_limma v{}", VERSION);
    println!("Run `rust_limma -h` for usage or `rust_limma --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_limma v{}", VERSION);
    println!();
    println!("Usage: rust_limma <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run        Run full differential expression analysis");
    println!("  normalize  Normalize raw intensities only");
    println!("  design     Print the design matrix of a group string");
    println!();
    println!("Run `rust_limma <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_limma v{}", VERSION);
    println!(
        "Pure Rust microarray differential expression analysis (linear models + empirical Bayes)"
    );
    println!();
    println!("Usage: rust_limma <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run        Run full differential expression analysis");
    println!("               - Background adjustment, quantile normalization, median polish");
    println!("               - Per-feature linear model for a two-group design");
    println!("               - Empirical Bayes moderated t-statistics and B-statistics");
    println!("               - Benjamini-Hochberg or Bonferroni correction");
    println!("               - DEG selection and annotation join");
    println!("  normalize  Write the log2 expression matrix");
    println!("  design     Print the design matrix of a group string");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_limma run -i intensities.tsv -g 100111000 -o results");
    println!();
    println!("  rust_limma run -i probes.tsv -p probe_map.tsv -g 100111000 \\");
    println!("    -a annotation.tsv --adj-p 0.1 --lfc 1");
    println!();
    println!("  rust_limma design -g 100111000");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::from_json_file(p),
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_adjust_method(name: &str) -> Result<AdjustMethod> {
    match name.to_ascii_lowercase().as_str() {
        "bh" | "fdr" | "benjamini_hochberg" => Ok(AdjustMethod::BenjaminiHochberg),
        "bonferroni" => Ok(AdjustMethod::Bonferroni),
        other => Err(LimmaError::InvalidConfig {
            reason: format!("Unknown adjustment method '{}'. Use 'bh' or 'bonferroni'.", other),
        }),
    }
}

fn parse_join_policy(name: &str) -> Result<JoinPolicy> {
    match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "fan-out" => Ok(JoinPolicy::FanOut),
        "first" => Ok(JoinPolicy::First),
        "concatenate" => Ok(JoinPolicy::Concatenate),
        "strict" => Ok(JoinPolicy::Strict),
        other => Err(LimmaError::InvalidConfig {
            reason: format!(
                "Unknown join policy '{}'. Use 'fan-out', 'first', 'concatenate' or 'strict'.",
                other
            ),
        }),
    }
}

/// Read the intensity matrix and attach the probe map when one is given
fn load_intensities(path: &str, probe_map: Option<&str>) -> Result<RawIntensities> {
    info!("Loading intensities from: {}", path);
    let raw = read_intensity_matrix(path)?;
    info!("  {} probes, {} samples", raw.n_probes(), raw.n_samples());

    match probe_map {
        Some(map_path) => {
            info!("Loading probe map from: {}", map_path);
            let map = read_probe_map(map_path)?;
            let raw = raw.with_probe_map(&map)?;
            info!("  {} probes in {} features", raw.n_probes(), raw.n_features());
            Ok(raw)
        }
        None => Ok(raw),
    }
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_analysis(
    intensities_path: &str,
    group_string: &str,
    probe_map_path: Option<&str>,
    annotation_path: Option<&str>,
    config_path: Option<&str>,
    output_dir: &str,
    numerator: Option<String>,
    denominator: Option<String>,
    adj_p: Option<f64>,
    lfc: Option<f64>,
    proportion: Option<f64>,
    adjust: Option<&str>,
    join_policy: Option<&str>,
    exclude: Vec<String>,
    threads: Option<usize>,
) -> Result<()> {
    // Command-line flags override the configuration file
    let mut config = load_config(config_path)?;
    if let Some(num) = numerator {
        config.contrast.numerator = num;
    }
    if let Some(den) = denominator {
        config.contrast.denominator = den;
    }
    if let Some(p) = adj_p {
        config.selection.adj_p_threshold = p;
    }
    if let Some(fc) = lfc {
        config.selection.fold_change_threshold = fc;
    }
    if let Some(prop) = proportion {
        config.ebayes.proportion = prop;
    }
    if let Some(name) = adjust {
        config.adjust_method = parse_adjust_method(name)?;
    }
    if let Some(name) = join_policy {
        config.join_policy = parse_join_policy(name)?;
    }
    config.exclude_samples.extend(exclude);
    if let Some(t) = threads {
        config.threads = t;
    }
    config.validate()?;
    configure_threads(config.threads);

    let raw = load_intensities(intensities_path, probe_map_path)?;

    // Load the annotation before the analysis so a bad file fails fast
    let annotation = match annotation_path {
        Some(path) => {
            info!("Loading annotation from: {}", path);
            let table = read_annotation(path)?;
            info!("  {} annotation records", table.len());
            Some(table)
        }
        None => None,
    };

    info!(
        "Contrast {} with groups {}",
        config.contrast.describe(),
        config.groups.describe()
    );
    let output = run_pipeline(&raw, group_string, &config)?;

    let out_dir = Path::new(output_dir);
    std::fs::create_dir_all(out_dir)?;

    let results_path = out_dir.join("results.tsv");
    info!("Writing full results to: {}", results_path.display());
    write_results(&results_path, &output.results)?;

    let degs_path = out_dir.join("degs.tsv");
    info!("Writing DEGs to: {}", degs_path.display());
    write_results(&degs_path, &output.degs)?;

    if let Some(table) = annotation {
        let (rows, report) = merge_annotations(&output.degs, &table, config.join_policy)?;
        if !report.unmatched.is_empty() {
            warn!("{} DEGs have no annotation entry", report.unmatched.len());
        }
        let annotated_path = out_dir.join("degs_annotated.tsv");
        info!("Writing annotated DEGs to: {}", annotated_path.display());
        write_annotated(&annotated_path, &rows)?;
    }

    let summary = output.summary(&config);
    println!("\n{}", summary);
    println!(
        "Prior: d0 = {:.3}, s0^2 = {:.5}",
        output.moderated.prior.df_prior, output.moderated.prior.s2_prior
    );

    Ok(())
}

fn run_normalize(
    intensities_path: &str,
    probe_map_path: Option<&str>,
    config_path: Option<&str>,
    output_path: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;
    configure_threads(config.threads);

    let raw = load_intensities(intensities_path, probe_map_path)?;
    let kept = SampleSubset::new(&raw, &config.exclude_samples)?;
    if !config.exclude_samples.is_empty() {
        info!("Excluded {} samples", config.exclude_samples.len());
    }

    let expression = normalize(&kept, &config.normalization)?;

    info!("Writing expression matrix to: {}", output_path);
    write_expression(output_path, &expression)?;

    Ok(())
}

fn run_design(
    group_string: &str,
    intensities_path: Option<&str>,
    config_path: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let sample_ids: Vec<String> = match intensities_path {
        Some(path) => read_intensity_matrix(path)?.sample_ids().to_vec(),
        None => (1..=group_string.trim().chars().count())
            .map(|j| format!("S{}", j))
            .collect(),
    };

    let design = design_from_group_string(&sample_ids, group_string, &config.groups)?;
    info!(
        "Design: {} samples, residual df {}",
        design.n_samples(),
        design.residual_df()
    );

    write_design(std::io::stdout().lock(), &design)?;
    Ok(())
}
