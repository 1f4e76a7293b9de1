//! Cardmine CLI
//!
//! Batch pipeline over a fact base:
//! - load facts and cardinality assertions (whitespace-separated TSV)
//! - mine ranked cardinality rules
//! - apply the rules and export inferred exact cardinalities
//!
//! Progress goes to stderr; all data lands in the requested output files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use cardmine_graph::{
    apply_rules, derive_exact_cardinalities, KnowledgeBase, Loader, MiningConfig, RuleMiner,
};

mod report;

#[derive(Parser)]
#[command(name = "cardmine")]
#[command(
    author,
    version,
    about = "Cardmine: cardinality rule mining over fact bases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine cardinality rules and export inferred exact cardinalities.
    Mine {
        /// Input facts file (`subject property object` per line)
        facts: PathBuf,
        /// Input cardinality assertions file
        cardinalities: PathBuf,
        /// Output rules TSV
        #[arg(long)]
        rules_out: PathBuf,
        /// Output directory for the per-confidence-threshold cardinality TSVs
        #[arg(long)]
        cardinalities_out: PathBuf,
        /// Also dump the ranked rules as JSON
        #[arg(long)]
        rules_json: Option<PathBuf>,
        /// Ranked rules to keep
        #[arg(long, default_value_t = 1000)]
        top_k: usize,
        /// Minimum supporting bindings per rule
        #[arg(long, default_value_t = 200)]
        min_support: u64,
        /// Minimum rule confidence (percent)
        #[arg(long, default_value_t = 1)]
        min_confidence: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Mine {
            facts,
            cardinalities,
            rules_out,
            cardinalities_out,
            rules_json,
            top_k,
            min_support,
            min_confidence,
        } => {
            let mut kb = KnowledgeBase::new();
            let mut loader = Loader::new(&mut kb);
            eprintln!("{} {}", "loading".green().bold(), facts.display());
            loader.load_path(&facts)?;
            eprintln!("{} {}", "loading".green().bold(), cardinalities.display());
            loader.load_path(&cardinalities)?;
            let stats = loader.finish();
            eprintln!(
                "{} properties and {} individuals loaded ({} facts, {} bound assertions, {} lines skipped, {} assertions dropped)",
                kb.facts.property_count().to_string().bold(),
                kb.facts.individual_count().to_string().bold(),
                stats.facts,
                stats.bound_assertions,
                stats.skipped_lines,
                stats.dropped_assertions,
            );

            let config = MiningConfig {
                min_support,
                min_confidence,
                top_k,
            };
            eprintln!(
                "{} (support >= {}, confidence >= {}%)",
                "mining rules".green().bold(),
                config.min_support,
                config.min_confidence,
            );
            let miner = RuleMiner::new(&kb, config);
            let rules = miner.mine()?;
            eprintln!("{} ranked rules retained", rules.len().to_string().bold());

            report::write_rules_report(&rules_out, &rules, &kb.interner)?;
            eprintln!("{} {}", "wrote".green().bold(), rules_out.display());
            if let Some(path) = rules_json {
                let rows = report::rule_report_rows(&rules, &kb.interner);
                fs::write(&path, serde_json::to_string_pretty(&rows)?)?;
                eprintln!("{} {}", "wrote".green().bold(), path.display());
            }

            eprintln!("{}", "applying rules".green().bold());
            let outcome = apply_rules(&kb, &rules);
            eprintln!(
                "{} contradictions across {} rules",
                outcome.total_contradictions.to_string().bold(),
                rules.len(),
            );
            let exact = derive_exact_cardinalities(&outcome.lower, &outcome.upper);
            eprintln!(
                "{} exact cardinalities derived",
                exact.len().to_string().bold()
            );
            report::write_cardinality_reports(&cardinalities_out, &kb, &outcome, &exact)?;
            eprintln!("{} {}", "wrote".green().bold(), cardinalities_out.display());
            Ok(())
        }
    }
}
