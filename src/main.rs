use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use pbw_installer::bundle::{BundleReader, PbwBundle};
use pbw_installer::core::record::AppRecord;
use pbw_installer::fetch::{BundleFetcher, BundleSource, FetchContext};
use pbw_installer::{planned_parts, planned_total};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    let inspect = Command::new("inspect")
        .about("Show what installing a bundle would register and transfer")
        .arg(
            Arg::new("bundle")
                .help("Path or http(s) URL of a .pbw bundle")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("platform")
                .long("platform")
                .help("Hardware platform subdirectory to read (e.g. basalt)")
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Where downloaded bundles are stored")
                .default_value("./bundles")
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help_heading("HTTP")
                .help("HTTP User-Agent")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help_heading("HTTP")
                .help("HTTP timeout in seconds")
                .default_value("60")
                .num_args(1),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .help_heading("HTTP")
                .help("HTTP retries for transient errors")
                .default_value("2")
                .num_args(1),
        )
        .arg(
            Arg::new("retry_backoff_ms")
                .long("retry-backoff-ms")
                .help_heading("HTTP")
                .help("Retry backoff base in milliseconds")
                .default_value("400")
                .num_args(1),
        );

    Command::new("pbw-installer")
        .about("Pebble app bundle installer tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(inspect)
}

fn fetch_context(m: &ArgMatches) -> anyhow::Result<FetchContext> {
    let mut ctx = FetchContext::default();
    if let Some(ua) = m.get_one::<String>("user_agent") {
        ctx.user_agent = ua.clone();
    }
    if let Some(s) = m.get_one::<String>("timeout_secs") {
        ctx.timeout_secs = s.parse().context("--timeout-secs")?;
    }
    if let Some(s) = m.get_one::<String>("retries") {
        ctx.retries = s.parse().context("--retries")?;
    }
    if let Some(s) = m.get_one::<String>("retry_backoff_ms") {
        ctx.retry_backoff_ms = s.parse().context("--retry-backoff-ms")?;
    }
    Ok(ctx)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    if let Some(("inspect", m)) = matches.subcommand() {
        inspect(m).await?;
    }
    Ok(())
}

async fn inspect(m: &ArgMatches) -> anyhow::Result<()> {
    let raw = m.get_one::<String>("bundle").context("missing bundle argument")?;
    let platform = m.get_one::<String>("platform").map(String::as_str);
    let out_dir: PathBuf = m
        .get_one::<String>("out_dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./bundles"));
    let ctx = fetch_context(m)?;

    let source = BundleSource::parse(raw);
    let pb = match &source {
        BundleSource::Remote(url) => {
            let pb = ProgressBar::new(0);
            pb.set_style(ProgressStyle::with_template(
                "{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})",
            )?);
            pb.set_prefix(format!("[{}]", url));
            pb
        }
        BundleSource::Local(_) => ProgressBar::hidden(),
    };

    let path = BundleFetcher::new(&ctx)?
        .resolve(&source, &out_dir, &ctx, &pb)
        .await
        .with_context(|| format!("fetch {}", raw))?;

    let mut bundle = PbwBundle::open(&path, platform).with_context(|| format!("open bundle {}", path.display()))?;
    if !bundle.is_app_bundle() {
        anyhow::bail!("{} is not an app bundle", path.display());
    }
    let meta = bundle.metadata()?;
    let parts = planned_parts(&bundle)?;
    let record = AppRecord::from_metadata(&meta).serialise();
    let total = planned_total(&parts)?;

    let dir = match bundle.platform_dir() {
        "" => "root",
        d => d,
    };
    println!("bundle:   {} ({})", path.display(), dir);
    println!("app:      {}", meta.app_name);
    println!("uuid:     {}", meta.uuid);
    println!("version:  app {} / sdk {}", meta.app_version, meta.sdk_version);
    println!("flags:    0x{:08x}", meta.flags);
    println!("icon:     {}", meta.icon_resource_id);
    println!("record:   {} bytes", record.len());
    println!("parts (transfer order):");
    for (kind, size) in &parts {
        println!("  {:<10} tag {}  {} ({} B)", kind.to_string(), kind.transfer_tag(), fmt_bytes(*size), size);
    }
    println!("total:    {} ({} B)", fmt_bytes(total), total);

    Ok(())
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let f = n as f64;
    if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
