//! cinebot CLI: conversational movie recommender.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use cinebot::config::RecommenderConfig;
use cinebot::corpus::Corpus;
use cinebot::graph::{InteractionGraph, KnowledgeGraph, MovieId, PropertyValue};
use cinebot::rank::PropertyScore;
use cinebot::session::{
    MovieOutcome, OraclePrompter, PropertyChoice, Prompter, Recommendation, run_dialogue,
};
use cinebot::stats::GlobalStatistics;

#[derive(Parser)]
#[command(name = "cinebot", version, about = "Conversational movie recommender")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bandit seed (overrides the config).
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Properties offered per question (overrides the config).
    #[arg(long, global = true)]
    top_n: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show corpus counts.
    Info,

    /// Build or inspect the global statistics table.
    Stats {
        #[command(subcommand)]
        action: StatsAction,
    },

    /// Rank properties and movies after the given preferences.
    Rank {
        /// Accepted preference as `property=value`; the first seeds the session.
        #[arg(long = "pref", required = true, value_parser = parse_pair)]
        prefs: Vec<PropertyValue>,

        /// Movies to list.
        #[arg(long, default_value = "10")]
        movies: usize,

        /// Session user id.
        #[arg(long, default_value = "0")]
        user: u64,
    },

    /// Most frequent values of a property among all movies.
    Popular {
        property: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Run a dialogue against a simulated user looking for one movie.
    Simulate {
        /// Movie the simulated user wants.
        #[arg(long)]
        target: u64,

        /// Opening preference as `property=value`.
        #[arg(long, value_parser = parse_pair)]
        initial: PropertyValue,

        /// Movies the simulated user has already seen.
        #[arg(long, value_delimiter = ',')]
        history: Vec<u64>,
    },

    /// Interactive dialogue on the terminal.
    Chat {
        /// Opening preference as `property=value`.
        #[arg(long, value_parser = parse_pair)]
        initial: PropertyValue,

        #[arg(long, default_value = "0")]
        user: u64,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Subcommand)]
enum StatsAction {
    /// Compute the table from facts and ratings and write it.
    Build {
        /// Output path (defaults to `data.stats`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the table, optionally for one property.
    Show {
        #[arg(long)]
        property: Option<String>,
    },
}

fn parse_pair(s: &str) -> std::result::Result<PropertyValue, String> {
    PropertyValue::parse(s).ok_or_else(|| format!("expected `property=value`, got `{s}`"))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RecommenderConfig::load(path)?,
        None => RecommenderConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.session.seed = Some(seed);
    }
    if let Some(top_n) = cli.top_n {
        config.ranking.top_n = top_n;
    }
    let walk = config.ranking.walk();

    match cli.command {
        Commands::Info => {
            let corpus = Corpus::load(&config.data, &walk)?;
            println!("{}", corpus.info());
        }

        Commands::Stats { action } => match action {
            StatsAction::Build { out } => {
                let kg = KnowledgeGraph::load_csv(&config.data.facts)?;
                let ratings =
                    InteractionGraph::load_ratings(&config.data.ratings, config.data.min_rating)?;
                let stats = GlobalStatistics::build(&kg, &ratings, &walk)?;
                let out = out.unwrap_or_else(|| config.data.stats.clone());
                stats.save_csv(&out)?;
                println!("Wrote {} pairs to {}", stats.len(), out.display());
            }
            StatsAction::Show { property } => {
                let stats = GlobalStatistics::load_csv(&config.data.stats)?;
                println!(
                    "{:<24} {:<32} {:>7} {:>9} {:>11} {:>9}",
                    "property", "value", "count", "z", "salience", "sal-z"
                );
                for (pair, entry) in stats.sorted() {
                    if property.as_ref().is_some_and(|p| *p != pair.property) {
                        continue;
                    }
                    println!(
                        "{:<24} {:<32} {:>7} {:>9.3} {:>11.3e} {:>9.3}",
                        pair.property,
                        pair.value,
                        entry.count,
                        entry.zscore,
                        entry.salience,
                        entry.salience_zscore
                    );
                }
            }
        },

        Commands::Rank {
            prefs,
            movies,
            user,
        } => {
            let corpus = Corpus::load(&config.data, &walk)?;
            let mut prefs = prefs.into_iter();
            let Some(initial) = prefs.next() else {
                miette::bail!("at least one --pref is required");
            };
            let mut session = corpus.create_session(user, initial, config.session_config())?;
            for pair in prefs {
                session.accept_preference(&pair.property, &pair.value)?;
            }

            let (mut properties, mut ranked) = if session.is_terminal() {
                (Vec::new(), Vec::new())
            } else {
                session.rankings()?
            };
            properties.truncate(config.ranking.top_n);
            ranked.truncate(movies);

            let kg = corpus.knowledge_graph();
            let movies: Vec<_> = ranked
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "movie": m.movie,
                        "title": kg.title(m.movie),
                        "score": m.score,
                    })
                })
                .collect();
            let report = serde_json::json!({
                "status": session.status(),
                "candidates": session.candidates().movie_count(),
                "preferences": session.preferences(),
                "properties": properties,
                "movies": movies,
            });
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }

        Commands::Popular { property, limit } => {
            let corpus = Corpus::load(&config.data, &walk)?;
            let all = cinebot::graph::CandidateGraph::full(corpus.knowledge_graph().clone());
            let values = all.most_popular_values(&property, limit);
            if values.is_empty() {
                println!("No values for property \"{property}\".");
            } else {
                for (value, count) in values {
                    println!("  {count:>6}  {value}");
                }
            }
        }

        Commands::Simulate {
            target,
            initial,
            history,
        } => {
            let corpus = Corpus::load(&config.data, &walk)?;
            let mut session = corpus.create_session(0, initial, config.session_config())?;
            let mut oracle = OraclePrompter::new(corpus.knowledge_graph().clone(), MovieId(target))
                .with_history(history.into_iter().map(MovieId));
            let transcript = run_dialogue(&mut session, &mut oracle, config.session.max_turns)?;
            println!("{}", serde_json::to_string_pretty(&transcript).into_diagnostic()?);
        }

        Commands::Chat { initial, user } => {
            let corpus = Corpus::load(&config.data, &walk)?;
            let mut session = corpus.create_session(user, initial, config.session_config())?;
            let mut prompter = TerminalPrompter::new();
            let transcript = run_dialogue(&mut session, &mut prompter, config.session.max_turns)?;
            println!(
                "Finished after {} turns ({} questions): {:?}",
                transcript.turns(),
                transcript.questions(),
                transcript.outcome
            );
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Reads answers from stdin.
struct TerminalPrompter {
    stdin: std::io::StdinLock<'static>,
}

impl TerminalPrompter {
    fn new() -> Self {
        Self {
            stdin: std::io::stdin().lock(),
        }
    }

    fn read_line(&mut self, prompt: &str) -> String {
        print!("{prompt}");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        if self.stdin.read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim().to_string()
    }
}

impl Prompter for TerminalPrompter {
    fn choose_property(&mut self, options: &[PropertyScore]) -> PropertyChoice {
        println!("Which of these do you like?");
        for (i, option) in options.iter().enumerate() {
            println!("  [{i}] {}", option.pair);
        }
        loop {
            let answer = self.read_line("number, or 'none': ");
            if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
                return PropertyChoice::RejectAll;
            }
            match answer.parse::<usize>() {
                Ok(i) if i < options.len() => return PropertyChoice::Select(i),
                _ => println!("Please answer with 0-{} or 'none'.", options.len().saturating_sub(1)),
            }
        }
    }

    fn judge_movie(&mut self, recommendation: &Recommendation) -> MovieOutcome {
        let name = recommendation
            .title
            .clone()
            .unwrap_or_else(|| recommendation.movie.to_string());
        println!("How about {name}?");
        if !recommendation.because.is_empty() {
            let reasons: Vec<String> = recommendation.because.iter().map(|p| p.to_string()).collect();
            println!("  because you like: {}", reasons.join(", "));
        }
        loop {
            let answer = self.read_line("yes / no / watched: ");
            if answer.is_empty() {
                return MovieOutcome::Rejected;
            }
            if let Some(outcome) = MovieOutcome::from_str_loose(&answer) {
                return outcome;
            }
        }
    }
}
