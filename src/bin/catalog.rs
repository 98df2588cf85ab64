use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use manga_catalog::catalog::consolidate::ConsolidationPolicy;
use manga_catalog::catalog::model::SourceTag;
use manga_catalog::catalog::{ContentFilter, SeriesMap};
use manga_catalog::logging::init_tracing;
use manga_catalog::normalization::{RatingRange, TagMode, TagPolicy};
use manga_catalog::pipeline::{self, CatalogTarget, Ingestor, RetryPolicy};
use manga_catalog::providers::rakuten::{RakutenConfig, RakutenEndpoint, RakutenProvider};
use manga_catalog::providers::{SearchProvider, SearchQuery, SortOrder};
use manga_catalog::sitemap::{self, SitemapConfig};
use manga_catalog::util::env::{self, preflight_check};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "catalog", version, about = "Manga catalog generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Scan the search API, consolidate series and write the catalog JSON
    Generate {
        /// Entries wanted (defaults to CATALOG_TARGET_COUNT / 15500)
        #[arg(long)]
        target: Option<usize>,
        /// Output path (defaults to CATALOG_OUTPUT)
        #[arg(long)]
        output: Option<String>,
        /// Comma-separated endpoints to scan
        #[arg(long, value_enum, value_delimiter = ',', default_value = "books")]
        sources: Vec<Source>,
        /// Seed for ratings and shuffle; random when omitted
        #[arg(long)]
        seed: Option<u64>,
        /// Keep ingestion order instead of shuffling
        #[arg(long, default_value_t = false)]
        no_shuffle: bool,
        #[arg(long, value_enum, default_value_t = TagModeArg::Rich)]
        tag_policy: TagModeArg,
        /// Score bonus for listings from this endpoint
        #[arg(long, value_enum)]
        prefer_source: Option<Source>,
        #[arg(long, default_value_t = 500)]
        prefer_bonus: i64,
    },
    /// Write sitemap.xml from an existing catalog JSON
    Sitemap {
        /// Catalog path (defaults to CATALOG_OUTPUT)
        #[arg(long)]
        input: Option<String>,
        /// Sitemap path (defaults to SITEMAP_OUTPUT)
        #[arg(long)]
        output: Option<String>,
        /// Site origin (defaults to SITEMAP_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Issue one small search against each endpoint and print what comes back
    Probe {
        #[arg(long, default_value = "ONE PIECE")]
        keyword: String,
        #[arg(long, default_value_t = 5)]
        hits: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Books,
    Ebook,
}

impl Source {
    fn endpoint(self) -> RakutenEndpoint {
        match self {
            Source::Books => RakutenEndpoint::Books,
            Source::Ebook => RakutenEndpoint::Ebook,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TagModeArg {
    Rich,
    AuthorOnly,
}

impl From<TagModeArg> for TagMode {
    fn from(arg: TagModeArg) -> Self {
        match arg {
            TagModeArg::Rich => TagMode::Rich,
            TagModeArg::AuthorOnly => TagMode::AuthorOnly,
        }
    }
}

fn build_providers(cfg: &RakutenConfig, sources: &[Source]) -> Result<Vec<Box<dyn SearchProvider>>> {
    let mut endpoints: Vec<RakutenEndpoint> = Vec::new();
    for ep in sources.iter().map(|s| s.endpoint()) {
        if !endpoints.contains(&ep) {
            endpoints.push(ep);
        }
    }
    endpoints
        .into_iter()
        .map(|ep| {
            RakutenProvider::new(cfg.clone(), ep).map(|p| Box::new(p) as Box<dyn SearchProvider>)
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing("info")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            target,
            output,
            sources,
            seed,
            no_shuffle,
            tag_policy,
            prefer_source,
            prefer_bonus,
        } => {
            preflight_check(
                "generate",
                &["RAKUTEN_APP_ID"],
                &[
                    "CATALOG_TARGET_COUNT",
                    "CATALOG_OVERSHOOT",
                    "CATALOG_OUTPUT",
                    "CATALOG_EXTRA_DENY",
                    "CATALOG_RATING_MIN",
                    "CATALOG_RATING_MAX",
                    "RAKUTEN_HITS",
                    "RAKUTEN_MAX_ATTEMPTS",
                    "RAKUTEN_RATE_LIMIT_DELAY_MS",
                    "RAKUTEN_REQUEST_DELAY_MS",
                ],
            )?;
            let providers = build_providers(&RakutenConfig::from_env()?, &sources)?;
            let rating = RatingRange::from_env().context("invalid CATALOG_RATING_MIN/MAX")?;

            let mut target_cfg = CatalogTarget::from_env();
            if let Some(t) = target {
                target_cfg.entries = t;
            }
            let ingestor = Ingestor {
                filter: ContentFilter::from_env(),
                retry: RetryPolicy::from_env(),
                target: target_cfg,
                ..Ingestor::default()
            };

            let mut map = SeriesMap::new();
            ingestor.run(&providers, &mut map).await;

            let mut policy = ConsolidationPolicy {
                tags: TagPolicy::for_mode(tag_policy.into()),
                rating,
                ..ConsolidationPolicy::default()
            };
            if let Some(src) = prefer_source {
                let tag: SourceTag = src.endpoint().source();
                policy.scoring.source_bonus = Some((tag, prefer_bonus));
            }

            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let (entries, _stats) =
                pipeline::build_catalog(&map, &policy, Some(target_cfg.entries), !no_shuffle, &mut rng);

            let output = output.unwrap_or_else(pipeline::default_output_path);
            pipeline::write_catalog(&output, &entries)?;
            if entries.len() < target_cfg.entries {
                warn!(
                    entries = entries.len(),
                    target = target_cfg.entries,
                    "catalog is smaller than target"
                );
            }
            println!("wrote {} entries to {}", entries.len(), output);
        }
        Commands::Sitemap {
            input,
            output,
            base_url,
        } => {
            preflight_check("sitemap", &[], &["CATALOG_OUTPUT", "SITEMAP_BASE_URL", "SITEMAP_OUTPUT"])?;
            let mut cfg = SitemapConfig::from_env();
            if let Some(o) = output {
                cfg.output = o;
            }
            if let Some(b) = base_url {
                cfg.base_url = b;
            }
            let input = input.unwrap_or_else(pipeline::default_output_path);
            let count = sitemap::generate_from_catalog(&input, &cfg)
                .with_context(|| format!("building sitemap from {input}"))?;
            println!("wrote {} urls to {}", count, cfg.output);
        }
        Commands::Probe { keyword, hits } => {
            preflight_check("probe", &["RAKUTEN_APP_ID"], &[])?;
            let mut cfg = RakutenConfig::from_env()?;
            cfg.hits = hits.clamp(1, 30);
            let query = SearchQuery::keyword(keyword, SortOrder::Standard, 1);
            let providers = [RakutenEndpoint::Books, RakutenEndpoint::Ebook]
                .into_iter()
                .map(|ep| RakutenProvider::new(cfg.clone(), ep))
                .collect::<Result<Vec<_>>>()?;
            for provider in &providers {
                let endpoint = provider.endpoint();
                info!(endpoint = endpoint.name(), url = endpoint.url(), "probing");
                match provider.search(&query).await {
                    Ok(items) => {
                        println!("{}: {} item(s)", endpoint.name(), items.len());
                        if let Some(first) = items.first() {
                            println!("  title: {}", first.title);
                            println!("  image: {}", first.image_url);
                        }
                    }
                    Err(e) => {
                        warn!(endpoint = endpoint.name(), error = %e, "probe failed");
                        println!("{}: error: {}", endpoint.name(), e);
                    }
                }
            }
        }
    }

    Ok(())
}
