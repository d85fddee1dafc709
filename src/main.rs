use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use aws_sdk_s3::config::Credentials;
use blog::{
    hero::{Hero, MetMuseum, Quotable},
    shell::{Shell, ShellConfig},
};
use repository::{
    memory::{self, MemoryAuth},
    storage::S3Storage,
    Repository, SupabaseConfig,
};
use tokio::net::TcpListener;
use toml::{map::Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;
use util::{get_integer, get_str, load_config, load_env};
use web::{SiteConfig, WebState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let secrets = load_env()?;
    let config_suffix = secret(&secrets, "CONFIG").unwrap_or_default();
    let config = load_config(&format!("Config{config_suffix}.toml"))?;

    let repository = init_repository(&secrets, &config).await?;
    let hero = init_hero(&config)?;
    let shell_config = ShellConfig {
        bucket: get_str(&config, "storage", "bucket")?,
        placeholder_image: get_str(&config, "site", "placeholder_image")?,
    };
    let shell = Arc::new(Shell::mount(repository, hero, shell_config));

    let mut site = SiteConfig {
        contact_form_action: get_str(&config, "site", "contact_form_action")?,
        ..Default::default()
    };
    if let Ok(instagram_url) = get_str(&config, "site", "instagram_url") {
        site.instagram_url = instagram_url;
    }

    let router = web::router(WebState::new(shell.clone(), site));

    let address: SocketAddr = get_str(&config, "server", "address")?
        .parse()
        .context("failed to parse server.address")?;
    let listener = TcpListener::bind(&address).await?;
    info!(task = "serve", address = %address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shell.shutdown().await;

    Ok(())
}

async fn init_repository(
    secrets: &Map<String, Value>,
    config: &Map<String, Value>,
) -> anyhow::Result<Repository> {
    let public_base_url = get_str(config, "storage", "public_base_url")?;
    Url::parse(&public_base_url)
        .context("failed to parse storage.public_base_url")?;

    let kind = get_str(config, "backend", "kind")?;
    info!(task = "init repository", kind = kind.as_str());

    match kind.as_str() {
        "memory" => {
            let mut auth = MemoryAuth::default();
            if let (Some(email), Some(password)) = (
                secret(secrets, "ADMIN_EMAIL"),
                secret(secrets, "ADMIN_PASSWORD"),
            ) {
                auth = auth.with_account(&email, &password);
            }

            Ok(memory::init_repository(auth, &public_base_url))
        }
        "supabase" => {
            let url = secret(secrets, "SUPABASE_URL")
                .context("failed to load SUPABASE_URL")?;
            Url::parse(&url).context("failed to parse SUPABASE_URL")?;
            let anon_key = secret(secrets, "SUPABASE_ANON_KEY")
                .context("failed to load SUPABASE_ANON_KEY")?;
            let timeout_secs =
                get_integer(config, "backend", "timeout_secs").unwrap_or(10);

            let storage = init_storage(secrets, config, &public_base_url).await?;
            let supabase = SupabaseConfig {
                url,
                anon_key,
                timeout: Duration::from_secs(timeout_secs.unsigned_abs()),
            };

            repository::init_repository(&supabase, storage)
                .context("failed to build supabase repository")
        }
        other => anyhow::bail!("unknown backend.kind {other}"),
    }
}

async fn init_storage(
    secrets: &Map<String, Value>,
    config: &Map<String, Value>,
    public_base_url: &str,
) -> anyhow::Result<Arc<S3Storage>> {
    let access_key_id = secret(secrets, "STORAGE_ACCESS_KEY_ID")
        .context("failed to load STORAGE_ACCESS_KEY_ID")?;
    let secret_access_key = secret(secrets, "STORAGE_SECRET_ACCESS_KEY")
        .context("failed to load STORAGE_SECRET_ACCESS_KEY")?;
    let endpoint = get_str(config, "storage", "endpoint")?;
    let region = get_str(config, "storage", "region")?;

    let credentials =
        Credentials::new(access_key_id, secret_access_key, None, None, "");
    let cfg = aws_config::from_env()
        .endpoint_url(endpoint)
        .region(aws_config::Region::new(region))
        .credentials_provider(credentials)
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&cfg)
        .force_path_style(true)
        .build();
    let s3 = aws_sdk_s3::Client::from_conf(s3_config);

    Ok(Arc::new(S3Storage::new(s3, public_base_url)))
}

fn init_hero(config: &Map<String, Value>) -> anyhow::Result<Hero> {
    let enabled = config
        .get("hero")
        .and_then(|hero| hero.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if !enabled {
        info!(task = "init hero", "offline");
        return Ok(Hero::offline());
    }

    let timeout_secs = get_integer(config, "hero", "timeout_secs").unwrap_or(5);
    let timeout = Duration::from_secs(timeout_secs.unsigned_abs());
    let art_base_url = get_str(config, "hero", "art_base_url")
        .unwrap_or_else(|_| MetMuseum::BASE_URL.to_string());
    let quote_url = get_str(config, "hero", "quote_url")
        .unwrap_or_else(|_| Quotable::URL.to_string());

    let art = MetMuseum::new(&art_base_url, timeout)
        .context("failed to build art client")?;
    let quotes = Quotable::new(&quote_url, timeout)
        .context("failed to build quote client")?;

    let mut hero = Hero::new(Arc::new(art), Arc::new(quotes));
    if let Ok(deadline_secs) = get_integer(config, "hero", "deadline_secs") {
        hero = hero
            .with_deadline(Duration::from_secs(deadline_secs.unsigned_abs()));
    }

    Ok(hero)
}

fn secret(secrets: &Map<String, Value>, key: &str) -> Option<String> {
    secrets.get(key)?.as_str().map(str::to_string)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(task = "wait for shutdown", error = e.to_string());
    }
    info!(task = "shutdown");
}
