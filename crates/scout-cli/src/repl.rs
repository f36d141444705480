//! REPL – Read-Eval-Print Loop for the Scout interactive shell.
//!
//! Supported slash-commands:
//!   /help                          – show this list
//!   /research [options] <query>    – run a new research project
//!   /enrich <id> [+source ...] [variation; ...]
//!                                  – add results to an existing project
//!   /recommend <query>             – what memory suggests for a query
//!   /insights [project_id]         – memory, learning and project insights
//!   /projects                      – list stored projects
//!   /methodologies                 – list research methodologies
//!   /cleanup [days]                – archive old projects
//!   /schema [result]               – JSON Schema of a crawl-export record
//!   /quit | /exit                  – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scout_memory::memory_system::{MemoryInsights, ResearchRecommendations};
use scout_runtime::researcher::{EnrichmentReport, ResearchInsights, ResearchReport};
use scout_runtime::{ResearchRequest, Researcher};
use scout_scoring::report::TopResult;
use scout_types::{FeedRecord, SearchResult};

use crate::config::Config;

/// Known research types. Keys without an entry in `methodologies.toml`
/// run with the default methodology.
pub const RESEARCH_TYPES: [&str; 6] = [
    "technology_analysis",
    "market_research",
    "competitive_analysis",
    "trend_analysis",
    "academic_research",
    "product_research",
];

/// Everything a command needs.
pub struct Shell {
    pub runtime: tokio::runtime::Runtime,
    pub researcher: Researcher,
    pub config: Config,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, shell: &Shell) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "scout>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        let (name, rest) = split_command(cmd);
        match name {
            "/help" => cmd_help(),
            "/research" => cmd_research(shell, rest),
            "/enrich" => cmd_enrich(shell, rest),
            "/recommend" => cmd_recommend(shell, rest),
            "/insights" => cmd_insights(shell, rest),
            "/projects" => cmd_projects(shell),
            "/methodologies" => cmd_methodologies(shell),
            "/cleanup" => cmd_cleanup(shell, rest),
            "/schema" => cmd_schema(rest),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────────────────────────────────────

/// `"/research rust web"` → `("/research", "rust web")`.
fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    }
}

/// Parse `[--type <key>] [--sources a,b] [--no-learning] <query>`.
/// Returns `None` when no query is left.
fn parse_research_args(args: &str, cfg: &Config) -> Option<ResearchRequest> {
    let mut research_type = cfg.default_research_type.clone();
    let mut sources = None;
    let mut use_learning = cfg.use_learning;
    let mut words = Vec::new();

    let mut tokens = args.split_whitespace();
    while let Some(token) = tokens.next() {
        match token {
            "--type" => {
                if let Some(t) = tokens.next() {
                    research_type = t.to_string();
                }
            }
            "--sources" => {
                if let Some(list) = tokens.next() {
                    sources = Some(
                        list.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect(),
                    );
                }
            }
            "--no-learning" => use_learning = false,
            word => words.push(word),
        }
    }

    if words.is_empty() {
        return None;
    }
    let mut request = ResearchRequest::new(&words.join(" "));
    request.research_type = research_type;
    request.sources = sources;
    request.use_learning = use_learning;
    request.limit_per_source = cfg.limit_per_source;
    Some(request)
}

/// Parsed `/enrich` arguments.
#[derive(Debug, PartialEq)]
struct EnrichArgs {
    project_id: String,
    sources: Vec<String>,
    variations: Vec<String>,
}

/// Parse `<id> [+source ...] [variation; variation ...]`.
fn parse_enrich_args(args: &str) -> Option<EnrichArgs> {
    let mut tokens = args.split_whitespace();
    let project_id = tokens.next()?.to_string();

    let mut sources = Vec::new();
    let mut rest = Vec::new();
    for token in tokens {
        match token.strip_prefix('+') {
            Some(source) if !source.is_empty() && rest.is_empty() => {
                sources.push(source.to_string())
            }
            _ => rest.push(token),
        }
    }
    let variations = rest
        .join(" ")
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    Some(EnrichArgs {
        project_id,
        sources,
        variations,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Scout Commands".bold().underline());
    println!("  {}  – run a new research project", "/research [--type t] [--sources a,b] [--no-learning] <query>".bold().cyan());
    println!("  {}  – enrich a project", "/enrich <id> [+source ...] [variation; ...]".bold().cyan());
    println!("  {}  – learned recommendations for a query", "/recommend <query>".bold().cyan());
    println!("  {}  – memory and project insights", "/insights [project_id]".bold().cyan());
    println!("  {}  – list stored projects", "/projects".bold().cyan());
    println!("  {}  – list research methodologies", "/methodologies".bold().cyan());
    println!("  {}  – archive projects older than N days", "/cleanup [days]".bold().cyan());
    println!("  {}  – JSON Schema of a crawl-export record", "/schema [result]".bold().cyan());
    println!("  {}  – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_research(shell: &Shell, args: &str) {
    let Some(request) = parse_research_args(args, &shell.config) else {
        println!("{} /research [--type t] [--sources a,b] [--no-learning] <query>", "Usage:".yellow());
        return;
    };

    println!(
        "  Researching {} ({}) …",
        request.query.bold(),
        request.research_type.dimmed()
    );
    match shell
        .runtime
        .block_on(shell.researcher.conduct_research(&request))
    {
        Ok(report) => print_research_report(&report),
        Err(e) => println!("{}: {}", "Research failed".red(), e),
    }
}

fn cmd_enrich(shell: &Shell, args: &str) {
    let Some(parsed) = parse_enrich_args(args) else {
        println!("{} /enrich <id> [+source ...] [variation; ...]", "Usage:".yellow());
        return;
    };
    if parsed.sources.is_empty() && parsed.variations.is_empty() {
        println!("  {}", "Nothing to enrich with: give +sources or query variations.".yellow());
        return;
    }

    match shell.runtime.block_on(shell.researcher.enrich_research(
        &parsed.project_id,
        &parsed.sources,
        &parsed.variations,
    )) {
        Ok(report) => print_enrichment_report(&report),
        Err(e) => println!("{}: {}", "Enrichment failed".red(), e),
    }
}

fn cmd_recommend(shell: &Shell, query: &str) {
    if query.is_empty() {
        println!("{} /recommend <query>", "Usage:".yellow());
        return;
    }
    match shell
        .researcher
        .memory()
        .get_research_recommendations(query, Some(&shell.config.default_research_type))
    {
        Ok(recs) => print_recommendations(&recs),
        Err(e) => println!("{}: {}", "Recommendation failed".red(), e),
    }
}

fn cmd_insights(shell: &Shell, args: &str) {
    let project_id = (!args.is_empty()).then_some(args);
    match shell.researcher.research_insights(project_id) {
        Ok(insights) => print_insights(&insights),
        Err(e) => println!("{}: {}", "Insights failed".red(), e),
    }
}

fn cmd_projects(shell: &Shell) {
    let projects = match shell.researcher.memory().list_projects(None) {
        Ok(p) => p,
        Err(e) => {
            println!("{}: {}", "Failed to list projects".red(), e);
            return;
        }
    };
    println!("{}", "Projects".bold().underline());
    if projects.is_empty() {
        println!("  {}", "none yet – try /research".dimmed());
    }
    for p in &projects {
        println!(
            "  {}  {:<11} {:>4} results  avg {:.2}  {}",
            p.project_id.bold(),
            p.status.as_str(),
            p.results_count,
            p.avg_relevance_score.unwrap_or(0.0),
            p.query
        );
    }
}

fn cmd_methodologies(shell: &Shell) {
    let configs = shell.researcher.configs();
    let keys = match configs.available_methodologies() {
        Ok(k) => k,
        Err(e) => {
            println!("{}: {}", "Failed to read methodologies".red(), e);
            return;
        }
    };
    println!("{}", "Methodologies".bold().underline());
    for key in keys {
        let marker = if key == shell.config.default_research_type { "▶" } else { " " };
        match configs.load_methodology(&key) {
            Ok(Some(m)) => println!(
                "  {} {} – {} [{}]",
                marker.green(),
                key.bold(),
                m.description,
                m.sources.join(", ").dimmed()
            ),
            _ => println!("  {} {}", marker.green(), key.bold()),
        }
    }
}

fn cmd_cleanup(shell: &Shell, args: &str) {
    let days = if args.is_empty() {
        shell.config.retention_days
    } else {
        match args.parse::<u32>() {
            Ok(d) => d,
            Err(_) => {
                println!("{} '{}' is not a number of days", "Warning:".yellow(), args);
                return;
            }
        }
    };
    match shell.researcher.memory().cleanup_old_data(days) {
        Ok(report) => println!(
            "{} archived {} project(s), removed {} result(s) older than {} days",
            "✓".green().bold(),
            report.archived_projects,
            report.deleted_results,
            days
        ),
        Err(e) => println!("{}: {}", "Cleanup failed".red(), e),
    }
}

fn cmd_schema(args: &str) {
    let schema = if args == "result" {
        schemars::schema_for!(SearchResult)
    } else {
        schemars::schema_for!(FeedRecord)
    };
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("{}: {}", "Schema error".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_top_results(results: &[TopResult]) {
    for r in results.iter().take(5) {
        println!(
            "    {} {:<8} {}",
            format!("{:.2}", r.quality_score).green(),
            r.source.dimmed(),
            r.title
        );
    }
}

fn print_research_report(report: &ResearchReport) {
    println!();
    println!("{} {}", "Project".bold().underline(), report.project_id.bold());
    println!("  Methodology : {}", report.methodology_used);
    println!("  Sources     : {}", report.sources_searched.join(", "));
    println!(
        "  Results     : {} total, {} at or above {:.2}",
        report.total_results,
        report.high_quality_results.to_string().green(),
        report.quality_threshold
    );
    if report.learning_applied {
        println!(
            "  Learning    : {} (confidence {:.2})",
            report.strategy_used.yellow(),
            report.recommendations_confidence
        );
    }
    if !report.results_summary.top_results.is_empty() {
        println!("  Top results:");
        print_top_results(&report.results_summary.top_results);
    }
    for insight in &report.insights {
        println!("  {} {}", "•".cyan(), insight.description);
    }
    println!("  Dataset     : {}", report.dataset_path.display().to_string().dimmed());
    println!();
}

fn print_enrichment_report(report: &EnrichmentReport) {
    println!();
    println!("{} {}", "Enriched".bold().underline(), report.project_id.bold());
    println!(
        "  Results : {} → {} ({} new at or above {:.2})",
        report.original_results_count,
        report.total_results_count,
        report.new_results_count.to_string().green(),
        report.quality_threshold
    );
    if report.new_results_count == 0 {
        println!("  {}", "No new results found.".yellow());
    } else {
        print_top_results(&report.new_results_summary.top_results);
    }
    if let Some(path) = &report.dataset_path {
        println!("  Dataset : {}", path.display().to_string().dimmed());
    }
    println!();
}

fn print_recommendations(recs: &ResearchRecommendations) {
    println!("{}", "Recommendations".bold().underline());
    println!(
        "  Confidence {:.2}, expected quality {:.2}",
        recs.confidence, recs.expected_quality
    );
    if recs.source_priorities.is_empty() {
        println!("  {}", "No learned source priorities yet.".dimmed());
    }
    for source in recs.ranked_sources() {
        let priority = recs.source_priorities.get(&source).copied().unwrap_or(0.0);
        println!("    {:<10} {:.2}", source.bold(), priority);
    }
    if !recs.similar_topics.is_empty() {
        println!("  Similar topics: {}", recs.similar_topics.join(", "));
    }
    for suggestion in &recs.query_suggestions {
        println!("  {} {}", "•".cyan(), suggestion);
    }
    if let Some(strategy) = &recs.optimized_strategy {
        println!("  Strategy: {} (used {}×)", strategy.name.yellow(), strategy.usage_count);
    }
}

fn print_memory_insights(m: &MemoryInsights) {
    println!(
        "  {} projects, {} results, avg quality {:.2}",
        m.total_projects, m.total_results, m.avg_project_quality
    );
    println!(
        "  {} learning insights, {} knowledge entities",
        m.learning_insights_count, m.knowledge_entities
    );
    for s in &m.most_successful_sources {
        println!("    {:<10} avg {:.2} over {}", s.source.bold(), s.avg_score, s.count);
    }
    if !m.research_trends.is_empty() {
        let trend: Vec<String> = m
            .research_trends
            .iter()
            .map(|d| format!("{} ({})", d.date, d.count))
            .collect();
        println!("  Recent activity: {}", trend.join(", ").dimmed());
    }
}

fn print_insights(insights: &ResearchInsights) {
    println!("{}", "Memory".bold().underline());
    print_memory_insights(&insights.memory_insights);

    if let Some(p) = &insights.project {
        println!("{} {}", "Project".bold().underline(), p.project_id.bold());
        println!("  {} – {} results, avg {:.2}", p.query, p.total_results, p.avg_quality);
        let q = &p.quality_distribution;
        println!(
            "  Quality : {} high, {} medium, {} low",
            q.high_quality.to_string().green(),
            q.medium_quality.to_string().yellow(),
            q.low_quality.to_string().red()
        );
        if let Some(best) = &p.source_distribution.highest_quality {
            println!("  Best source : {}", best.bold());
        }
        for r in &p.recommendations {
            println!("  {} {}", "•".cyan(), r);
        }
    }

    let lp = &insights.learning_patterns;
    if !lp.most_effective_sources.is_empty() {
        println!("{}", "Learning".bold().underline());
        println!(
            "  Confidence {:.2}, {} similar topic(s)",
            lp.confidence_level, lp.similar_topics_found
        );
        for (source, priority) in &lp.most_effective_sources {
            println!("    {:<10} {:.2}", source.bold(), priority);
        }
    }

    for r in &insights.recommendations {
        println!("  {} {}", "•".cyan(), r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_separates_name_and_args() {
        assert_eq!(split_command("/research  rust web"), ("/research", "rust web"));
        assert_eq!(split_command("/help"), ("/help", ""));
    }

    #[test]
    fn research_args_use_config_defaults() {
        let cfg = Config {
            limit_per_source: 4,
            use_learning: true,
            default_research_type: "market_research".to_string(),
            ..Config::default()
        };
        let req = parse_research_args("rust web frameworks", &cfg).unwrap();
        assert_eq!(req.query, "rust web frameworks");
        assert_eq!(req.research_type, "market_research");
        assert_eq!(req.limit_per_source, 4);
        assert!(req.use_learning);
        assert!(req.sources.is_none());
    }

    #[test]
    fn research_args_accept_options_anywhere() {
        let cfg = Config::default();
        let req = parse_research_args(
            "--type trend_analysis rust --sources github,reddit, --no-learning async",
            &cfg,
        )
        .unwrap();
        assert_eq!(req.query, "rust async");
        assert_eq!(req.research_type, "trend_analysis");
        assert_eq!(
            req.sources,
            Some(vec!["github".to_string(), "reddit".to_string()])
        );
        assert!(!req.use_learning);
    }

    #[test]
    fn research_args_need_a_query() {
        assert!(parse_research_args("--type trend_analysis", &Config::default()).is_none());
        assert!(parse_research_args("", &Config::default()).is_none());
    }

    #[test]
    fn enrich_args_split_sources_and_variations() {
        let parsed = parse_enrich_args("ab12cd +reddit +web rust async; tokio runtime ;").unwrap();
        assert_eq!(
            parsed,
            EnrichArgs {
                project_id: "ab12cd".to_string(),
                sources: vec!["reddit".to_string(), "web".to_string()],
                variations: vec!["rust async".to_string(), "tokio runtime".to_string()],
            }
        );
    }

    #[test]
    fn enrich_args_plus_after_variation_is_text() {
        let parsed = parse_enrich_args("ab12cd c +plus").unwrap();
        assert!(parsed.sources.is_empty());
        assert_eq!(parsed.variations, vec!["c +plus".to_string()]);
    }

    #[test]
    fn enrich_args_need_a_project() {
        assert!(parse_enrich_args("   ").is_none());
        let bare = parse_enrich_args("ab12cd").unwrap();
        assert!(bare.sources.is_empty() && bare.variations.is_empty());
    }

    #[test]
    fn research_types_are_parseable() {
        for key in RESEARCH_TYPES {
            assert!(scout_types::ResearchType::parse(key).is_some(), "{key}");
        }
    }
}
