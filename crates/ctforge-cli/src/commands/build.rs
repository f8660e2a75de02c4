//! `ctforge <distro>`: build one customized template.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use ctforge_common::config::{self, BuildConfig};
use ctforge_common::constants::{
    AUTH_KEY_ENV, DEFAULT_TEMPLATE_LABEL, HOST_RESOLV_CONF, PVE_SHARED_STORAGE_ROOT,
    PVE_TEMPLATE_CACHE,
};
use ctforge_common::distro::Distro;
use ctforge_core::filesystem::workspace::DEFAULT_WORKSPACE_BASE;
use ctforge_core::filesystem::{Mounter, ScratchWorkspace, SystemMounter};
use ctforge_core::process::{CommandRunner, SystemRunner};
use ctforge_core::{interrupt, nameserver, preflight};
use ctforge_image::archive;
use ctforge_image::catalog::{self, PveamCatalog};
use ctforge_image::repack::{self, Artifact};
use ctforge_image::storage::TemplateStore;
use ctforge_rootfs::Customizer;

use crate::output;

/// Arguments shared by every distribution subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Target distribution release [default: per distribution].
    #[arg(short, long)]
    pub release: Option<String>,

    /// Template label used in the default output name.
    #[arg(short = 't', long = "template", default_value = DEFAULT_TEMPLATE_LABEL)]
    pub template: String,

    /// Output file name; the archive suffix is normalized.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Public SSH key authorized for root.
    #[arg(short = 'k', long, env = AUTH_KEY_ENV, hide_env_values = true)]
    pub ssh_key: Option<String>,

    /// Nameserver used inside the chroot [default: detected from the host].
    #[arg(short, long)]
    pub nameserver: Option<String>,

    /// Directory receiving the finished template.
    #[arg(short, long)]
    pub cache_dir: Option<PathBuf>,
}

/// Host locations consulted while resolving options.
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Resolver configuration for nameserver detection.
    pub resolv_conf: PathBuf,
    /// Root of shared storage mounts.
    pub shared_root: PathBuf,
    /// Local template cache.
    pub local_cache: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            resolv_conf: PathBuf::from(HOST_RESOLV_CONF),
            shared_root: PathBuf::from(PVE_SHARED_STORAGE_ROOT),
            local_cache: PathBuf::from(PVE_TEMPLATE_CACHE),
        }
    }
}

/// Resolves the command-line arguments into an immutable [`BuildConfig`].
///
/// The cache directory is checked first so a bad target fails before
/// anything else happens.
///
/// # Errors
///
/// Returns a configuration error if the cache directory does not exist or
/// the output name is not a plain file name.
pub fn resolve_config(
    distro: Distro,
    args: &BuildArgs,
    today: NaiveDate,
    host: &HostPaths,
) -> ctforge_common::error::Result<BuildConfig> {
    let profile = distro.profile();
    let cache_dir =
        config::resolve_cache_dir(args.cache_dir.as_deref(), &host.shared_root, &host.local_cache)?;
    let release = args
        .release
        .clone()
        .unwrap_or_else(|| profile.default_release.to_string());
    let output_name = config::resolve_output_name(
        profile,
        &release,
        &args.template,
        args.output.as_deref(),
        today,
    )?;
    let nameserver = nameserver::resolve(args.nameserver.as_deref(), &host.resolv_conf);

    let ssh_key = args
        .ssh_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);
    if ssh_key.is_none() {
        tracing::warn!("no SSH key given; root will have no authorized keys");
    }

    Ok(BuildConfig {
        distro,
        release,
        template_label: args.template.clone(),
        output_name,
        ssh_key,
        nameserver,
        cache_dir,
    })
}

/// Collaborators and host locations one build runs against.
pub struct Pipeline<'a> {
    /// Runs `pveam`, the chroot script and the repack pipe.
    pub runner: &'a dyn CommandRunner,
    /// Mounts pseudo-filesystems for the chroot.
    pub mounter: &'a dyn Mounter,
    /// Platform cache that `pveam download` writes into.
    pub primary_cache: PathBuf,
    /// Directory scratch workspaces are created under.
    pub workspace_base: PathBuf,
    /// Require root and the host tools before the first stage.
    pub preflight: bool,
}

impl Pipeline<'_> {
    /// The pipeline against the real host.
    #[must_use]
    pub fn system() -> Pipeline<'static> {
        Pipeline {
            runner: &SystemRunner,
            mounter: &SystemMounter,
            primary_cache: PathBuf::from(PVE_TEMPLATE_CACHE),
            workspace_base: PathBuf::from(DEFAULT_WORKSPACE_BASE),
            preflight: true,
        }
    }

    /// Resolves `args` and runs every stage, returning the configuration
    /// used and the packed template.
    ///
    /// # Errors
    ///
    /// Returns an error if option resolution or any stage fails. Option
    /// errors surface before any external command runs.
    pub fn build(
        &self,
        distro: Distro,
        args: &BuildArgs,
        today: NaiveDate,
        host: &HostPaths,
    ) -> anyhow::Result<(BuildConfig, Artifact)> {
        let config =
            resolve_config(distro, args, today, host).context("invalid build options")?;
        tracing::info!(
            distro = %config.distro,
            release = %config.release,
            output = %config.output_path().display(),
            "starting build"
        );
        let artifact = self.run(&config)?;
        Ok((config, artifact))
    }

    /// Locates, extracts, customizes and repacks one template.
    ///
    /// # Errors
    ///
    /// Returns an error if a preflight check or any stage fails.
    pub fn run(&self, config: &BuildConfig) -> anyhow::Result<Artifact> {
        let profile = config.profile();

        if self.preflight {
            preflight::require_root()?;
            preflight::check_required_tools(preflight::REQUIRED_TOOLS)?;
            let compression = profile.compression;
            let _ = preflight::find_tool(compression.tool(), compression.package())?;
        }
        interrupt::check()?;

        let catalog = PveamCatalog::new(self.runner);
        let store = TemplateStore::open(self.primary_cache.clone(), config.cache_dir.clone());
        let template = catalog::locate(&catalog, &store, profile, &config.release)
            .context("failed to locate base template")?;
        interrupt::check()?;

        let workspace = ScratchWorkspace::create_in(&self.workspace_base)?;
        let rootfs = workspace.rootfs();
        let _ = archive::extract_template(&template.path, &rootfs)
            .with_context(|| format!("failed to extract {}", template.path.display()))?;
        interrupt::check()?;

        Customizer::new(self.runner, self.mounter)
            .run(&workspace, config)
            .context("customization failed")?;
        interrupt::check()?;

        let artifact =
            repack::repack(self.runner, &rootfs, &config.output_path(), profile.compression)
                .context("failed to repack template")?;
        Ok(artifact)
    }
}

/// Executes a build for `distro` on this host.
///
/// # Errors
///
/// Returns an error if option resolution or any pipeline stage fails.
pub fn execute(distro: Distro, args: &BuildArgs) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let (config, artifact) =
        Pipeline::system().build(distro, args, today, &HostPaths::default())?;
    output::print_report(&artifact, &config.cache_dir);
    Ok(())
}
