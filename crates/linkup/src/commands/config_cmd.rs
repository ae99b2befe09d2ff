//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use linkup_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const REGIONS: &[&str] = &["eu", "eu2", "us", "de", "fr", "jp", "ap", "au", "ae", "ca", "la"];

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<SecretString, CliError> {
    let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(pass))
}

/// Render the config with the plaintext password masked.
fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let mut shown = cfg.clone();
    if shown.password.is_some() {
        shown.password = Some("********".into());
    }
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&shown)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(&shown)?),
        OutputFormat::Table | OutputFormat::Plain => {
            toml::to_string_pretty(&shown).map_err(|e| CliError::Config {
                message: format!("failed to serialize config: {e}"),
            })
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = crate::config_file(global);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            eprintln!("linkup configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let username: String = Input::new()
                .with_prompt("LibreLinkUp e-mail")
                .interact_text()
                .map_err(prompt_err)?;
            if username.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "username".into(),
                    reason: "username cannot be empty".into(),
                });
            }

            let region_idx = Select::new()
                .with_prompt("Region")
                .items(REGIONS)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let password = prompt_password()?;

            let store_choices = &[
                "Store password in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Where to store the password?")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let plaintext = if store_selection == 0 {
                linkup_config::store_password(&username, &password)?;
                eprintln!("   Password stored in system keyring");
                None
            } else {
                use secrecy::ExposeSecret;
                Some(password.expose_secret().to_owned())
            };

            let mut cfg = crate::load_config(global).unwrap_or_default();
            cfg.username = Some(username.trim().to_owned());
            cfg.password = plaintext;
            cfg.region = REGIONS.get(region_idx).copied().unwrap_or("eu").to_owned();

            linkup_config::save_config_to(&cfg, &path)?;
            eprintln!("\nConfiguration written to {}", path.display());
            eprintln!("  Test it: linkup devices");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = crate::load_config(global)?;
            let out = render_config(&cfg, global.output)?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { username } => {
            let username = match username {
                Some(u) => u,
                None => {
                    let cfg = crate::load_config(global)?;
                    linkup_config::resolve_username(&cfg).map_err(|_| CliError::NoCredentials {
                        path: path.display().to_string(),
                    })?
                }
            };

            let password = prompt_password()?;
            linkup_config::store_password(&username, &password)?;
            eprintln!("Password stored in system keyring for '{username}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_password() {
        let cfg = Config {
            username: Some("follower@example.com".into()),
            password: Some("hunter2".into()),
            ..Config::default()
        };
        let out = render_config(&cfg, OutputFormat::Plain).unwrap();
        assert!(out.contains("follower@example.com"));
        assert!(!out.contains("hunter2"));
        assert!(out.contains("********"));

        let json = render_config(&cfg, OutputFormat::JsonCompact).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn show_without_password_has_no_mask() {
        let out = render_config(&Config::default(), OutputFormat::Plain).unwrap();
        assert!(!out.contains("password ="));
        assert!(out.contains("region = \"eu\""));
    }
}
