//! Command-line interface for rust_limma

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_limma")]
#[command(author = "SunJu Kim")]
#[command(version)]
#[command(about = "Microarray differential expression analysis in Rust")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run full differential expression analysis
    #[command(
        about = "Run full differential expression analysis",
        long_about = "Run full differential expression analysis\n\n\
            Performs the complete pipeline: background adjustment, quantile\n\
            normalization, log2 and probeset summarization, per-feature linear\n\
            model fit, empirical Bayes moderated t-statistics, multiple testing\n\
            correction and DEG selection by adjusted p-value and fold change.\n\n\
            Writes the full results table, the DEG table and, when an annotation\n\
            file is given, the annotated DEG table.",
        after_long_help = "\
Examples:
  # Two-group comparison, 9 samples, '1' = case, '0' = control
  rust_limma run -i intensities.tsv -g 100111000 -o results

  # Probe-level input with a probe-to-probeset map and gene annotation
  rust_limma run -i probes.tsv -p probe_map.tsv -g 100111000 \\
    -a annotation.tsv -o results

  # Looser thresholds, Bonferroni correction, one sample excluded
  rust_limma run -i intensities.tsv -g 100111000 --adj-p 0.1 --lfc 1 \\
    --adjust bonferroni --exclude GSM4

  # All parameters from a JSON configuration file
  rust_limma run -i intensities.tsv -g NNTTTNNNT -c analysis.json"
    )]
    Run {
        /// Path to raw intensity matrix (CSV or TSV)
        #[arg(short, long,
            long_help = "Path to raw intensity matrix.\n\
                Format: first column = probe IDs, remaining columns = raw intensities per sample.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
        intensities: String,

        /// Group membership string, one character per sample
        #[arg(short, long,
            long_help = "Group membership string, one character per sample in column order.\n\
                With the default groups '0' = control and '1' = case (e.g. 100111000).\n\
                Group codes and names can be changed in the configuration file.")]
        groups: String,

        /// Probe-to-feature map (probe_id, feature_id)
        #[arg(short, long,
            long_help = "Two-column file mapping probe IDs to feature (probeset) IDs.\n\
                Probes sharing a feature are summarized together.\n\
                Without it, every probe row is its own feature.")]
        probe_map: Option<String>,

        /// Annotation table for DEG output
        #[arg(short, long,
            long_help = "Annotation table with columns feature_id, gene_symbol,\n\
                entrez_id and description. DEGs are left-joined on feature_id.")]
        annotation: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Output directory [default: .]
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Numerator group of the contrast
        #[arg(long)]
        numerator: Option<String>,

        /// Denominator group of the contrast
        #[arg(long)]
        denominator: Option<String>,

        /// Adjusted p-value threshold for DEG selection [default: 0.05]
        #[arg(long, value_name = "P")]
        adj_p: Option<f64>,

        /// Absolute log2 fold-change threshold for DEG selection [default: 2.0]
        #[arg(long, value_name = "LFC")]
        lfc: Option<f64>,

        /// Expected proportion of differentially expressed features [default: 0.01]
        #[arg(long,
            long_help = "Expected proportion of differentially expressed features.\n\
                Used by the log-odds (B) statistic and the fold-change prior.")]
        proportion: Option<f64>,

        /// P-value adjustment [default: bh]
        #[arg(long,
            long_help = "Multiple testing correction.\n\
                bh:         Benjamini-Hochberg false discovery rate (default)\n\
                bonferroni: Bonferroni family-wise error rate")]
        adjust: Option<String>,

        /// Duplicate annotation handling [default: fan-out]
        #[arg(long,
            long_help = "Handling of features with more than one annotation row.\n\
                fan-out:     one output row per annotation row (default)\n\
                first:       keep the first annotation row\n\
                concatenate: join distinct values with ' /// '\n\
                strict:      fail on a duplicated key")]
        join_policy: Option<String>,

        /// Sample to drop before normalization
        #[arg(long, value_name = "SAMPLE",
            long_help = "Sample ID to exclude before normalization. The matching character\n\
                of the group string is dropped as well.\n\
                Can be specified multiple times: --exclude GSM4 --exclude GSM7")]
        exclude: Vec<String>,

        /// Number of threads (0 = auto)
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },

    /// Normalize raw intensities only
    #[command(
        long_about = "Normalize raw intensities into a log2 expression matrix.\n\n\
            Background adjustment, quantile normalization, log2 and probeset\n\
            summarization, with the parameters of the configuration file.",
        after_long_help = "\
Examples:
  rust_limma normalize -i intensities.tsv -o expression.tsv
  rust_limma normalize -i probes.tsv -p probe_map.tsv -o expression.tsv -c analysis.json"
    )]
    Normalize {
        /// Path to raw intensity matrix (CSV or TSV)
        #[arg(short, long)]
        intensities: String,

        /// Probe-to-feature map (probe_id, feature_id)
        #[arg(short, long)]
        probe_map: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Output file path [default: expression.tsv]
        #[arg(short, long, default_value = "expression.tsv")]
        output: String,
    },

    /// Print the design matrix of a group string
    #[command(
        long_about = "Print the indicator design matrix built from a group string.\n\n\
            Sample IDs are taken from the intensity file when given, otherwise\n\
            samples are numbered S1, S2, ...",
        after_long_help = "\
Examples:
  rust_limma design -g 100111000
  rust_limma design -g 100111000 -i intensities.tsv"
    )]
    Design {
        /// Group membership string, one character per sample
        #[arg(short, long)]
        groups: String,

        /// Intensity matrix to take sample IDs from
        #[arg(short, long)]
        intensities: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}
