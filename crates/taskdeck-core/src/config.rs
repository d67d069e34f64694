use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::seed::{
  DEFAULT_SEED_LIMIT,
  DEFAULT_SEED_URL,
  SeedOptions,
  SeedPolicy
};
use crate::store::auth::{
  AuthSettings,
  DEMO_AVATAR,
  DEMO_EMAIL,
  DEMO_NAME,
  DEMO_PASSWORD,
  DemoAccount
};
use crate::store::theme::ThemeMode;

pub const RC_ENV: &str = "TASKDECKRC";
pub const RC_FILE_NAME: &str =
  ".taskdeckrc";

/// Raw `key = value` configuration, layered from built-in defaults, an rc
/// file (with includes) and overrides.
#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("seed.enabled", "on"),
      ("seed.url", DEFAULT_SEED_URL),
      ("seed.limit", "20"),
      ("seed.timeout_secs", "10"),
      ("seed.policy", "fill-if-empty"),
      ("auth.email", DEMO_EMAIL),
      ("auth.password", DEMO_PASSWORD),
      ("auth.name", DEMO_NAME),
      ("auth.avatar", DEMO_AVATAR),
      ("auth.latency_ms", "500"),
      ("theme", "light"),
      ("color", "on")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(
        &path,
        &mut Vec::new()
      )?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Parses `key` with `FromStr`, naming the key in the error.
  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|err| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({err})"
        )
      })
  }

  /// `chain` holds the canonical paths of the files currently being
  /// read, outermost first.
  #[tracing::instrument(skip(
    self, chain
  ))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical = fs::canonicalize(
      &path
    )
    .unwrap_or_else(|_| path.clone());
    if chain.contains(&canonical) {
      bail!(
        "include cycle at {}",
        path.display()
      );
    }
    chain.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file(
            &include_path,
            chain
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    chain.pop();
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSettings {
  pub enabled: bool,
  pub url:     String,
  pub timeout: Duration,
  pub options: SeedOptions
}

/// Typed view over [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub seed:  SeedSettings,
  pub auth:  AuthSettings,
  pub theme: ThemeMode,
  pub color: bool
}

impl Settings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let limit = cfg
      .get_parsed::<usize>(
        "seed.limit"
      )?
      .unwrap_or(DEFAULT_SEED_LIMIT);
    if limit == 0 {
      return Err(anyhow!(
        "seed.limit must be at least 1"
      ));
    }

    let seed = SeedSettings {
      enabled: cfg
        .get_bool("seed.enabled")
        .unwrap_or(true),
      url:     cfg
        .get("seed.url")
        .unwrap_or_else(|| {
          DEFAULT_SEED_URL.to_string()
        }),
      timeout: Duration::from_secs(
        cfg
          .get_parsed::<u64>(
            "seed.timeout_secs"
          )?
          .unwrap_or(10)
      ),
      options: SeedOptions {
        limit,
        policy: cfg
          .get_parsed::<SeedPolicy>(
            "seed.policy"
          )?
          .unwrap_or_default()
      }
    };

    let defaults = DemoAccount::default();
    let account = DemoAccount {
      email:    cfg
        .get("auth.email")
        .unwrap_or(defaults.email),
      password: cfg
        .get("auth.password")
        .unwrap_or(defaults.password),
      name:     cfg
        .get("auth.name")
        .unwrap_or(defaults.name),
      avatar:   cfg
        .get("auth.avatar")
        .unwrap_or(defaults.avatar)
    };
    let auth = AuthSettings {
      account,
      latency: Duration::from_millis(
        cfg
          .get_parsed::<u64>(
            "auth.latency_ms"
          )?
          .unwrap_or(500)
      )
    };

    Ok(Self {
      seed,
      auth,
      theme: cfg
        .get_parsed::<ThemeMode>(
          "theme"
        )?
        .unwrap_or_default(),
      color: cfg
        .get_bool("color")
        .unwrap_or(true)
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn defaults_give_demo_settings() {
    let settings = Settings::from_config(
      &Config::default()
    )
    .expect("default settings");
    assert!(settings.seed.enabled);
    assert_eq!(
      settings.seed.options,
      SeedOptions::default()
    );
    assert_eq!(
      settings.auth.account.email,
      "demo@example.com"
    );
    assert_eq!(
      settings.auth.latency,
      Duration::from_millis(500)
    );
    assert_eq!(
      settings.theme,
      ThemeMode::Light
    );
  }

  #[test]
  fn rc_file_includes_and_overrides() {
    let dir = tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "theme = dark\nseed.limit = 5\n"
    )
    .expect("write include");
    let main = dir.path().join("main.rc");
    fs::write(
      &main,
      "# taskdeck settings\n\
       include extra.rc\n\
       seed.policy = replace # keep it simple\n\
       auth.latency_ms = 0\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(main.as_path()))
      .expect("load rc");
    cfg.apply_overrides([(
      "rc.seed.limit".to_string(),
      "7".to_string()
    )]);
    assert_eq!(cfg.loaded_files.len(), 2);

    let settings =
      Settings::from_config(&cfg)
        .expect("settings");
    assert_eq!(
      settings.theme,
      ThemeMode::Dark
    );
    assert_eq!(
      settings.seed.options.policy,
      SeedPolicy::Replace
    );
    assert_eq!(
      settings.seed.options.limit,
      7
    );
    assert!(settings.auth.latency.is_zero());
  }

  #[test]
  fn invalid_values_name_the_key() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "seed.limit".to_string(),
      "many".to_string()
    )]);
    let err = Settings::from_config(&cfg)
      .expect_err("bad limit");
    assert!(
      err.to_string().contains("seed.limit"),
      "{err}"
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("bad.rc");
    fs::write(&rc, "theme dark\n")
      .expect("write rc");
    assert!(Config::load(Some(rc.as_path())).is_err());
  }

  #[test]
  fn include_cycles_are_an_error() {
    let dir = tempdir().expect("tempdir");
    let own = dir.path().join("a.rc");
    fs::write(&own, "include a.rc\n")
      .expect("write rc");
    let err = Config::load(Some(own.as_path()))
      .expect_err("self include");
    assert!(
      err.to_string().contains("include cycle"),
      "{err:#}"
    );

    let a = dir.path().join("ping.rc");
    let b = dir.path().join("pong.rc");
    fs::write(&a, "theme = dark\ninclude pong.rc\n")
      .expect("write ping");
    fs::write(&b, "include ping.rc\n")
      .expect("write pong");
    assert!(Config::load(Some(a.as_path())).is_err());
  }

  #[test]
  fn shared_include_is_not_a_cycle() {
    let dir = tempdir().expect("tempdir");
    fs::write(
      dir.path().join("common.rc"),
      "color = off\n"
    )
    .expect("write common");
    fs::write(
      dir.path().join("left.rc"),
      "include common.rc\n"
    )
    .expect("write left");
    let main = dir.path().join("main.rc");
    fs::write(
      &main,
      "include left.rc\ninclude common.rc\n"
    )
    .expect("write main");

    let cfg = Config::load(Some(main.as_path()))
      .expect("diamond include");
    assert_eq!(cfg.loaded_files.len(), 4);
    assert_eq!(cfg.get_bool("color"), Some(false));
  }
}
