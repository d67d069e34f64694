pub mod app;
pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod observer;
pub mod render;
pub mod seed;
pub mod shell;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io::IsTerminal;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{
  debug,
  info,
  warn
};

use crate::app::{
  AppContext,
  SeedMode
};
use crate::render::Renderer;
use crate::shell::Shell;

#[tracing::instrument(skip_all)]
pub async fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  let settings =
    config::Settings::from_config(&cfg)
      .context(
        "invalid configuration"
      )?;

  let mode = if cli.no_seed {
    SeedMode::Disabled
  } else if cli.offline {
    SeedMode::Offline
  } else {
    SeedMode::Remote
  };
  let color = settings.color
    && std::io::stdout().is_terminal();
  let app =
    AppContext::new(settings, mode)
      .context(
        "failed to set up seed source"
      )?;

  let renderer = Renderer::new(
    color,
    app.theme.clone()
  );
  let batch = !cli.commands.is_empty();
  let mut shell = Shell::new(
    app.clone(),
    renderer,
    std::io::stdout()
  )
  .with_await_seed(batch)
  .with_prompt(
    !batch
      && std::io::stdin().is_terminal()
  );

  let seed = app.start_seed();

  if batch {
    if let Some(handle) = seed
      && let Err(err) = handle.await
    {
      warn!(error = %err, "seed task did not finish");
    }
    let script =
      cli.commands.join("\n");
    shell.run(script.as_bytes()).await?;
  } else {
    shell
      .run(BufReader::new(
        tokio::io::stdin()
      ))
      .await?;
  }

  info!("done");
  Ok(())
}
