//! CLI entry point for Scholar.
//!
//! Designed for subprocess invocation from an agent: reads a request from
//! stdin, writes a JSON result to stdout. Logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use scholar_core::Settings;
use scholar_cypher::QueryPlan;
use scholar_graph::{GraphClient, GraphConfig};
use scholar_rank::{AuthorRelation, DiscoveryEngine, DiscoveryRequest, QueryRequest, WorkQuery};

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Safe, schema-validated queries and relationship discovery over a research graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: scholar).
    #[arg(short, long, default_value = scholar_core::config::DEFAULT_CONFIG_FILE, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Validate Cypher text (reads the query from stdin).
    Validate,
    /// Compile a query plan (reads plan JSON from stdin).
    Compile,
    /// Validate and run a query (reads `{"text"|"plan", "params"}` JSON from stdin).
    Query,
    /// Rank works related to a target work.
    Discover {
        /// Target work id; reads a JSON request from stdin when neither flag is given.
        #[arg(long, conflicts_with = "title")]
        work_id: Option<String>,
        /// Keyword contained in the target work's title.
        #[arg(long)]
        title: Option<String>,
        /// Maximum candidates returned.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List author pairs linked by coauthorship, shared topics or a common coauthor.
    Relations {
        #[arg(value_enum)]
        kind: RelationKind,
        /// Name keyword (topic name for `shared-topics`).
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List authors by number of distinct coauthors.
    Collaborators {
        #[arg(long, default_value_t = 2)]
        min: u64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Find works by award number, author name or topic.
    Works {
        #[arg(long, conflicts_with_all = ["author", "topic"])]
        award: Option<String>,
        #[arg(long, conflicts_with = "topic")]
        author: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Detect communities of works over the projection.
    Communities,
    /// Manage the centrality graph projection.
    Projection {
        #[command(subcommand)]
        action: ProjectionAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RelationKind {
    Coauthorship,
    SharedTopics,
    Indirect,
}

impl From<RelationKind> for AuthorRelation {
    fn from(kind: RelationKind) -> Self {
        match kind {
            RelationKind::Coauthorship => Self::Coauthorship,
            RelationKind::SharedTopics => Self::SharedTopics,
            RelationKind::Indirect => Self::IndirectCollaboration,
        }
    }
}

#[derive(Subcommand)]
enum ProjectionAction {
    /// Create the projection unless it exists.
    Ensure,
    /// Drop the projection.
    Drop,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    let registry = settings.install_schema()?;

    match cli.command {
        Command::Validate => {
            let text = std::io::read_to_string(std::io::stdin())?;
            let validator = scholar_cypher::Validator::new(registry)
                .with_max_result_limit(settings.query.max_result_limit);
            println!("{}", serde_json::to_string(&validator.validate(&text))?);
        }
        Command::Compile => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let plan: QueryPlan = serde_json::from_str(&input)?;
            let validator = scholar_cypher::Validator::new(registry)
                .with_max_result_limit(settings.query.max_result_limit);
            let outcome = scholar_cypher::PlanCompiler::new(validator).compile(&plan);
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Query => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: QueryRequest = serde_json::from_str(&input)?;
            let engine = connect(&settings, registry).await?;
            let response = engine.run_query(&request.input, &request.params).await?;
            println!("{}", serde_json::to_string(&response)?);
        }
        Command::Discover {
            work_id,
            title,
            limit,
        } => {
            let mut request = match (work_id, title) {
                (Some(id), _) => DiscoveryRequest::for_work(id),
                (None, Some(keyword)) => DiscoveryRequest::for_title(keyword),
                (None, None) => {
                    let input = std::io::read_to_string(std::io::stdin())?;
                    serde_json::from_str(&input)?
                }
            };
            if let Some(limit) = limit {
                request = request.with_limit(limit);
            }
            let engine = connect(&settings, registry).await?;
            let result = engine.discover_related(request).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Relations {
            kind,
            keyword,
            limit,
        } => {
            let engine = connect(&settings, registry).await?;
            let links = engine
                .author_relations(kind.into(), keyword.as_deref(), limit)
                .await?;
            println!("{}", serde_json::to_string(&links)?);
        }
        Command::Collaborators { min, limit } => {
            let engine = connect(&settings, registry).await?;
            let authors = engine.collaboration_networks(min, limit).await?;
            println!("{}", serde_json::to_string(&authors)?);
        }
        Command::Works {
            award,
            author,
            topic,
            limit,
        } => {
            let query = match (award, author, topic) {
                (Some(award), _, _) => WorkQuery::Award(award),
                (None, Some(author), _) => WorkQuery::Author(author),
                (None, None, Some(topic)) => WorkQuery::Topic(topic),
                (None, None, None) => anyhow::bail!("one of --award, --author or --topic is required"),
            };
            let engine = connect(&settings, registry).await?;
            let result = engine.discover_works(query, limit).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Communities => {
            let engine = connect(&settings, registry).await?;
            let report = engine.detect_communities().await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Projection { action } => {
            let engine = connect(&settings, registry).await?;
            let name = engine.projection().name().to_string();
            let result = match action {
                ProjectionAction::Ensure => {
                    engine.ensure_projection().await?;
                    serde_json::json!({"projection": name, "ready": true})
                }
                ProjectionAction::Drop => {
                    let dropped = engine.drop_projection().await?;
                    serde_json::json!({"projection": name, "dropped": dropped})
                }
            };
            println!("{result}");
        }
    }

    Ok(())
}

async fn connect(
    settings: &Settings,
    registry: &'static scholar_core::SchemaRegistry,
) -> anyhow::Result<DiscoveryEngine<GraphClient>> {
    let graph = GraphClient::connect(&GraphConfig::from(&settings.neo4j))
        .await?
        .with_schema(registry);
    Ok(DiscoveryEngine::from_settings(graph, settings, registry))
}
