// src/main.rs

use clap::Parser;
use depotprep::cli::Cli;
use depotprep::depot::restrict_to_ids;
use depotprep::fetch::{validate_token_template, HttpManifestSource, ManifestSource};
use depotprep::{bundle, catalog, downloader, output, reconcile, script};
use depotprep::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Check up front that a directory the pipeline will write into exists
fn require_dir(path: &Path, role: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(Error::Usage(format!(
            "{role} directory {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let state_dir = cli.state_dir.clone().unwrap_or_else(|| cli.out_dir.clone());
    let download_dir = cli
        .download_dir
        .clone()
        .unwrap_or_else(|| cli.out_dir.clone());

    require_dir(&cli.out_dir, "output")?;
    require_dir(&state_dir, "state")?;
    require_dir(&download_dir, "download")?;
    if let Some(config) = &cli.config {
        if !config.is_file() {
            return Err(Error::Usage(format!(
                "config file {} does not exist",
                config.display()
            )));
        }
    }
    if let Some(template) = &cli.token_url {
        validate_token_template(template)?;
    }
    let extra_args = match &cli.downloader_args {
        Some(args) => shell_words::split(args)
            .map_err(|e| Error::Usage(format!("bad --downloader-args: {e}")))?,
        None => Vec::new(),
    };

    let input = bundle::load_input(&cli.input)?;
    let (app_id, mut keys) = script::extract(&input.script)?;
    info!("app {app_id}: {} depot key(s) in script", keys.len());

    if !cli.depots.is_empty() {
        let allowed: BTreeSet<_> = cli.depots.iter().map(|&id| depotprep::depot::DepotId(id)).collect();
        keys = restrict_to_ids(keys, &allowed);
    }

    let (reconciled, app) = if cli.offline {
        (reconcile::reconcile_offline(keys, input.manifests)?, None)
    } else {
        let base_url = cli.catalog_url.as_deref().ok_or_else(|| {
            Error::Usage("--catalog-url is required unless --offline is set".to_string())
        })?;
        let catalog = catalog::CatalogClient::new(base_url)?;
        let (app, records) = catalog.fetch_metadata(app_id)?;

        let holder;
        let source: Option<&dyn ManifestSource> = match &cli.token_url {
            Some(template) => {
                let server = catalog.content_server()?;
                holder = HttpManifestSource::new(app_id, template.clone(), server)?;
                Some(&holder)
            }
            None => None,
        };

        let reconciled =
            reconcile::reconcile_online(keys, input.manifests, records, source, cli.update)?;
        (reconciled, Some(app))
    };

    let keylist = output::write_keylist(&cli.out_dir, app_id, &reconciled.keys)?;
    output::write_manifests(&cli.out_dir, &reconciled.manifests)?;
    info!(
        "wrote {} and {} manifest file(s)",
        keylist.display(),
        reconciled.manifests.len()
    );

    if let Some(app) = &app {
        let path = output::write_app_state(&state_dir, app, &reconciled.records)?;
        info!("wrote {}", path.display());
    }

    if let Some(config) = &cli.config {
        match output::merge_config(config, &reconciled.keys) {
            Ok(backup) => info!(
                "merged {} key(s) into {} (backup at {})",
                reconciled.keys.len(),
                config.display(),
                backup.display()
            ),
            Err(e @ Error::ConfigBackupFailed(_)) => return Err(e),
            Err(e) => warn!(
                "failed to update {}: {e}; restore from {}",
                config.display(),
                config.with_extension("bak.vdf").display()
            ),
        }
    }

    let install_name: PathBuf = match &app {
        Some(app) => app.install_dir.clone(),
        None => PathBuf::from(app_id.to_string()),
    };
    let install_dir = download_dir.join(install_name);
    let gids: Vec<_> = reconciled
        .manifests
        .iter()
        .map(|(depot, manifest)| (*depot, manifest.gid))
        .collect();
    downloader::run(
        &cli.downloader,
        app_id,
        &gids,
        &keylist,
        &cli.out_dir,
        &install_dir,
        &extra_args,
        cli.dry_download,
    )
}
