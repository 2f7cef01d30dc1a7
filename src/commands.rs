use crate::{emit_success, BackupCommand, ContactCommand, OutputMode, ProfileCommand};
use rolodex::backup::{restore_backup, BackupManager};
use rolodex::bridge::{serve_stdio, Bridge};
use rolodex::config::{ensure_db_dir, load_config, write_config, RolodexConfig};
use rolodex::duplicate::InsertOutcome;
use rolodex::models::{NewContact, NewProfile, ProfileUpdate, SortOrder};
use rolodex::storage::SqliteStore;
use rolodex::ui::{self, Icons};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded configuration plus the directory relative paths resolve against
struct Context {
    config: RolodexConfig,
    base: PathBuf,
}

impl Context {
    fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = load_config(Some(config_path))?;
        let base = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { config, base })
    }

    fn database_path(&self) -> PathBuf {
        if self.config.database.is_absolute() {
            self.config.database.clone()
        } else {
            self.base.join(&self.config.database)
        }
    }

    fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let db = self.database_path();
        ensure_db_dir(&db)?;
        Ok(SqliteStore::open(&db)?)
    }

    fn backup_manager(&self) -> anyhow::Result<BackupManager> {
        if !self.config.backup.enabled {
            return Err(rolodex::Error::BackupDisabled.into());
        }
        Ok(BackupManager::from_config(&self.config.backup, &self.base))
    }
}

fn blank_to_none(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

pub fn run_init(mode: OutputMode, config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = RolodexConfig::default();
    write_config(config_path, &config, force)?;

    let ctx = Context::load(config_path)?;
    let store = ctx.open_store()?;
    store.close()?;

    if mode.is_human() {
        ui::success(&format!("Wrote {}", config_path.display()));
        ui::info("Database", &ctx.database_path().display().to_string());
    } else {
        emit_success(mode, "init", serde_json::json!({
            "config": config_path,
            "database": ctx.database_path(),
        }))?;
    }
    Ok(())
}

pub fn run_profile(mode: OutputMode, config_path: &Path, cmd: ProfileCommand) -> anyhow::Result<()> {
    let ctx = Context::load(config_path)?;
    let store = ctx.open_store()?;

    match cmd {
        ProfileCommand::Add { first_name, last_name, company, email, phone, address, role, status, notes } => {
            let profile = NewProfile {
                first_name,
                last_name,
                company,
                email,
                phone,
                address,
                role,
                status,
                notes,
            };
            match store.insert_profile_checked(&profile)? {
                InsertOutcome::Inserted(id) => {
                    if mode.is_human() {
                        ui::success(&format!("Added profile #{}", id));
                    } else {
                        emit_success(mode, "profile.add", serde_json::json!({ "id": id, "duplicate": false }))?;
                    }
                }
                InsertOutcome::Duplicate(existing) => {
                    if mode.is_human() {
                        ui::warn(&format!(
                            "{} already exists as profile #{}",
                            existing.display_name(),
                            existing.id
                        ));
                    } else {
                        emit_success(mode, "profile.add", serde_json::json!({ "id": existing.id, "duplicate": true }))?;
                    }
                }
            }
        }

        ProfileCommand::List => {
            let profiles = store.list_profiles()?;
            if mode.is_human() {
                ui::header(Icons::PERSON, &format!("{} profiles", profiles.len()));
                println!("{}", ui::profiles_table(&profiles));
            } else {
                emit_success(mode, "profile.list", serde_json::to_value(&profiles)?)?;
            }
        }

        ProfileCommand::Search { term } => {
            let profiles = store.search_profiles(&term)?;
            if mode.is_human() {
                if profiles.is_empty() {
                    ui::warn(&format!("No profiles match '{}'", term));
                } else {
                    println!("{}", ui::profiles_table(&profiles));
                }
            } else {
                emit_success(mode, "profile.search", serde_json::to_value(&profiles)?)?;
            }
        }

        ProfileCommand::Update { id, first_name, last_name, company, email, phone, address, role, status, notes } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                company,
                email: email.map(blank_to_none),
                phone: phone.map(blank_to_none),
                address: address.map(blank_to_none),
                role: role.map(blank_to_none),
                status,
                notes: notes.map(blank_to_none),
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update");
            }
            let changed = store.update_profile(id, &update)?;
            if changed == 0 {
                return Err(rolodex::Error::NotFound(format!("profile {}", id)).into());
            }
            if mode.is_human() {
                ui::success(&format!("Updated profile #{}", id));
            } else {
                emit_success(mode, "profile.update", serde_json::json!({ "id": id }))?;
            }
        }

        ProfileCommand::Delete { id, cascade } => {
            let removed = if cascade {
                store.delete_profile_cascade(id)?
            } else {
                store.delete_profile(id)?
            };
            if removed == 0 {
                return Err(rolodex::Error::NotFound(format!("profile {}", id)).into());
            }
            if mode.is_human() {
                ui::success(&format!("{} Deleted profile #{}", Icons::DEL, id));
            } else {
                emit_success(mode, "profile.delete", serde_json::json!({ "id": id, "cascade": cascade }))?;
            }
        }
    }

    store.close()?;
    Ok(())
}

pub fn run_contact(mode: OutputMode, config_path: &Path, cmd: ContactCommand) -> anyhow::Result<()> {
    let ctx = Context::load(config_path)?;
    let store = ctx.open_store()?;

    match cmd {
        ContactCommand::Log { profile_id, date, kind, details, value } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
            let mut contact = NewContact::new(profile_id, date, kind, details);
            if let Some(value) = value {
                contact = contact.with_value(value);
            }
            let id = store.insert_contact(&contact)?;
            if mode.is_human() {
                ui::success(&format!("{} Logged contact #{} for profile #{}", Icons::PHONE, id, profile_id));
            } else {
                emit_success(mode, "contact.log", serde_json::json!({ "id": id }))?;
            }
        }

        ContactCommand::List { profile_id, order } => {
            let order: SortOrder = order.parse()?;
            let contacts = store.contacts_for_profile(profile_id, order)?;
            if mode.is_human() {
                let total = store.total_value_for_profile(profile_id)?;
                ui::header(Icons::PHONE, &format!("{} contacts", contacts.len()));
                println!("{}", ui::contacts_table(&contacts));
                ui::info("Total value (EUR)", &format!("{:.2}", total));
            } else {
                emit_success(mode, "contact.list", serde_json::to_value(&contacts)?)?;
            }
        }
    }

    store.close()?;
    Ok(())
}

pub fn run_backup(mode: OutputMode, config_path: &Path, cmd: BackupCommand) -> anyhow::Result<()> {
    let ctx = Context::load(config_path)?;
    let manager = ctx.backup_manager()?;

    match cmd {
        BackupCommand::Create => {
            let store = ctx.open_store()?;
            let path = manager.create_backup(&store)?;
            store.close()?;
            if mode.is_human() {
                ui::success(&format!("{} Backup written to {}", Icons::DATABASE, path.display()));
            } else {
                emit_success(mode, "backup.create", serde_json::json!({ "path": path }))?;
            }
        }

        BackupCommand::List => {
            let backups = manager.list_backups()?;
            if mode.is_human() {
                ui::header(Icons::DATABASE, &format!("{} backups in {}", backups.len(), manager.directory().display()));
                for path in &backups {
                    println!("  {}", path.display());
                }
            } else {
                emit_success(mode, "backup.list", serde_json::to_value(&backups)?)?;
            }
        }

        BackupCommand::Prune { keep } => {
            let report = manager.prune_old_backups(keep.unwrap_or(manager.keep()))?;
            if mode.is_human() {
                ui::success(&format!(
                    "Kept {}, removed {}",
                    report.kept.len(),
                    report.removed.len()
                ));
                for path in &report.failed {
                    ui::warn(&format!("Could not remove {}", path.display()));
                }
            } else {
                emit_success(mode, "backup.prune", serde_json::to_value(&report)?)?;
            }
        }
    }
    Ok(())
}

pub fn run_restore(mode: OutputMode, snapshot: &Path, target: &Path) -> anyhow::Result<()> {
    let store = restore_backup(snapshot, target)?;
    let stats = store.stats()?;
    store.close()?;

    if mode.is_human() {
        ui::success(&format!("Restored {} into {}", snapshot.display(), target.display()));
        println!("{}", ui::stats_table(&stats));
    } else {
        emit_success(mode, "restore", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub fn run_stats(mode: OutputMode, config_path: &Path) -> anyhow::Result<()> {
    let ctx = Context::load(config_path)?;
    let store = ctx.open_store()?;
    let stats = store.stats()?;
    store.close()?;

    if mode.is_human() {
        ui::header(Icons::STATS, &format!("Rolodex Statistics ({})", ctx.database_path().display()));
        println!("{}", ui::stats_table(&stats));
    } else {
        emit_success(mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub fn run_serve(config_path: &Path) -> anyhow::Result<()> {
    let ctx = Context::load(config_path)?;
    let store = Arc::new(ctx.open_store()?);
    let bridge = Bridge::from_config(store, &ctx.config.backup, &ctx.base);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tracing::info!("Serving requests on stdio");
        let served = serve_stdio(&bridge).await;
        if let Some(path) = bridge.shutdown().await? {
            tracing::info!("Backup on close: {}", path.display());
        }
        served
    })
}
