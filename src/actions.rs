// Action handlers: one function per CLI action, layered on the client,
// the resolver and the renderer. Expected user-level outcomes (unknown
// machine, nothing spawned) print a message and return Ok; only transport
// and decode failures bubble up as errors.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use tracing::debug;

use crate::api::{ApiBody, ApiClient, Config};
use crate::cache;
use crate::model::{ActiveInstance, Group, ReviewAccess};
use crate::resolve;
use crate::ui;

const NO_ACTIVE_MACHINE: &str = "no currently active machine";
const NO_SUCH_MACHINE: &str = "error: no such machine";
const SPAWN_SUCCESS_MESSAGE: &str = "Machine deployed to lab.";

/// Print a machine's profile. Without a target this shows whatever is
/// currently spawned.
pub fn machine_info(api: &ApiClient, config: &Config, target: Option<&str>) -> Result<()> {
    let resolved = match target {
        Some(ident) => resolve::resolve(api, &config.cache_file, ident)?,
        None => {
            let Some(active) = api.active_machine()? else {
                println!("{NO_ACTIVE_MACHINE}");
                return Ok(());
            };
            // /machine/active returns very little, so go back for the
            // full profile by id.
            resolve::resolve_live(api, &active.id.to_string())?
        }
    };
    let Some((machine, group)) = resolved else {
        println!("{NO_SUCH_MACHINE}");
        return Ok(());
    };
    // Reviews only exist for lab machines.
    let reviews = match group {
        Group::StartingPoint => ReviewAccess::Denied,
        Group::Active | Group::Retired => api.reviews(machine.id)?,
    };
    let rendered = ui::render_machine(&machine, group, &reviews, Local::now().date_naive())?;
    print!("{rendered}");
    Ok(())
}

/// Show the currently spawned machine: name, id, time to expiry, and (if
/// the slow listing scan cooperates) its IP.
pub fn show_active(api: &ApiClient) -> Result<()> {
    let Some(active) = api.active_machine()? else {
        println!("{NO_ACTIVE_MACHINE}");
        return Ok(());
    };
    println!("\n      Active machine: {} ID {}", active.name, active.id);
    if let Some(expires_at) = &active.expires_at {
        if let Ok(expiry) = NaiveDateTime::parse_from_str(expires_at, "%Y-%m-%d %H:%M:%S") {
            let remaining = expiry - Local::now().naive_local();
            println!("      Expires in {}", ui::format_countdown(remaining));
        }
    }
    println!("      Getting IP: ");
    let spinner = ui::spinner("scanning machine listings...");
    let ip = resolve::lookup_ip(api, &active.id.to_string());
    spinner.finish_and_clear();
    match ip {
        Ok(Some(ip)) => println!("      {ip}"),
        Ok(None) => {}
        Err(err) => debug!(%err, "IP lookup failed"),
    }
    Ok(())
}

/// Download the official pdf writeup to `<name>-writeup.pdf` in the
/// current directory. Defaults to the active machine.
pub fn fetch_writeup(api: &ApiClient, config: &Config, target: Option<&str>) -> Result<()> {
    let (id, name) = match target {
        None => {
            let Some(active) = api.active_machine()? else {
                println!("{NO_ACTIVE_MACHINE}");
                return Ok(());
            };
            (active.id, active.name)
        }
        Some(ident) => {
            let Some((machine, _)) = resolve::resolve(api, &config.cache_file, ident)? else {
                println!("{NO_SUCH_MACHINE}");
                return Ok(());
            };
            (machine.id, machine.name)
        }
    };
    println!("requesting pdf writeup for {name}");
    match api.writeup(id)? {
        ApiBody::Raw { status, bytes } if status.is_success() => {
            let filename = format!("{name}-writeup.pdf");
            println!("writing pdf data to {filename}");
            fs::write(&filename, bytes).with_context(|| format!("writing {filename}"))?;
        }
        // a JSON body or an error status both mean there is no writeup
        // to be had for this id
        _ => println!("{NO_SUCH_MACHINE}"),
    }
    Ok(())
}

/// Print the to-do list.
pub fn show_todo(api: &ApiClient) -> Result<()> {
    let entries = api.todo_list()?;
    println!("https://app.hackthebox.com/machines/list/todo");
    if entries.is_empty() {
        println!("no to-do machines found");
        return Ok(());
    }
    let today = Local::now().date_naive();
    for entry in &entries {
        println!("{}", ui::render_todo_line(entry, today)?);
    }
    Ok(())
}

/// Toggle a machine in or out of the to-do list, reporting which of the
/// two actually happened by comparing list sizes around the update.
pub fn toggle_todo(api: &ApiClient, config: &Config, ident: &str) -> Result<()> {
    let Some(id) = resolve::resolve_id(api, &config.cache_file, ident)? else {
        println!("{NO_SUCH_MACHINE}");
        return Ok(());
    };
    println!("updating to-do for machine ID {id}...");
    let size_before = api.todo_list()?.len();
    let Some(updated) = api.todo_update(id)? else {
        println!("{NO_SUCH_MACHINE}");
        return Ok(());
    };
    let size_after = updated.len();
    if size_after > size_before {
        println!("added machine to to-do list");
    } else if size_after < size_before {
        println!("removed machine from to-do list");
    } else {
        // the server can answer success without changing the list;
        // surface that instead of guessing which way it went
        println!("to-do list unchanged (the server accepted the update but nothing moved)");
    }
    Ok(())
}

/// Spawn an instance. On the lab's literal success message, follow up
/// with the IP and permalink so the target is usable immediately.
pub fn spawn_machine(api: &ApiClient, config: &Config, ident: &str) -> Result<()> {
    let Some(id) = resolve::resolve_id(api, &config.cache_file, ident)? else {
        println!("{NO_SUCH_MACHINE}");
        return Ok(());
    };
    println!("spawning machine ID {id}... (may take a while)");
    let spinner = ui::spinner("waiting for the lab...");
    let message = api.spawn(id)?;
    spinner.finish_and_clear();
    if message == SPAWN_SUCCESS_MESSAGE {
        let spinner = ui::spinner("looking up the instance IP...");
        let ip = resolve::lookup_ip(api, &id.to_string()).ok().flatten();
        spinner.finish_and_clear();
        let permalink = format!("https://app.hackthebox.com/machines/{id}");
        match ip {
            Some(ip) => println!("{message}\n{permalink}\n{ip}"),
            None => println!("{message}\n{permalink}"),
        }
    } else {
        println!("{message}");
    }
    Ok(())
}

/// Kill the currently spawned instance.
pub fn kill_machine(api: &ApiClient) -> Result<()> {
    let Some(active) = require_active(api)? else {
        return Ok(());
    };
    println!("killing {}...", active.name);
    let message = api.terminate(active.id)?;
    println!("{message}");
    Ok(())
}

/// Request a reset for the currently spawned instance.
pub fn reset_machine(api: &ApiClient) -> Result<()> {
    let Some(active) = require_active(api)? else {
        return Ok(());
    };
    println!("requesting reset for {}...", active.name);
    let message = api.reset(active.id)?;
    println!("{message}");
    Ok(())
}

/// Submit a flag for the currently spawned instance. The argument is
/// either the flag text itself or a path to a file holding it; the
/// self-rated difficulty is prompted for interactively.
pub fn submit_flag(api: &ApiClient, flag_arg: &str) -> Result<()> {
    let Some(active) = require_active(api)? else {
        return Ok(());
    };
    let Some(flag) = read_flag_input(flag_arg) else {
        println!("error: invalid flag format or couldn't read flag file");
        return Ok(());
    };
    let difficulty = ui::prompt_difficulty()?;
    println!(
        "submitting flag {flag} with difficulty {difficulty}/10 for machine {}",
        active.name
    );
    let response = api.own(&flag, active.id, difficulty * 10)?;
    println!("{} {}", response.status_text(), response.message);
    Ok(())
}

/// Re-download all three machine listings into the cache file.
pub fn refresh_cache(api: &ApiClient, config: &Config) -> Result<()> {
    let spinner = ui::spinner("fetching machine listings...");
    let snapshot = cache::refresh(api, &config.cache_file)?;
    spinner.finish_and_clear();
    println!(
        "cached {} active, {} retired and {} starting point machines to {}",
        snapshot.active.len(),
        snapshot.retired.len(),
        snapshot.starting_point.len(),
        config.cache_file.display()
    );
    Ok(())
}

fn require_active(api: &ApiClient) -> Result<Option<ActiveInstance>> {
    let active = api.active_machine()?;
    if active.is_none() {
        println!("{NO_ACTIVE_MACHINE}");
    }
    Ok(active)
}

/// Classify the flag argument: a string of lowercase hex digits is the
/// flag itself, anything else is a path to read and trim. `None` means
/// neither worked.
fn read_flag_input(arg: &str) -> Option<String> {
    let is_hex = !arg.is_empty() && arg.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
    if is_hex {
        return Some(arg.to_string());
    }
    fs::read_to_string(arg).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::read_flag_input;
    use std::io::Write;

    #[test]
    fn hex_input_is_the_flag_itself() {
        assert_eq!(
            read_flag_input("e0d0a3d75aae2526566b0892d28de23c").as_deref(),
            Some("e0d0a3d75aae2526566b0892d28de23c")
        );
    }

    #[test]
    fn file_input_is_read_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "abc123\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(read_flag_input(&path).as_deref(), Some("abc123"));
    }

    #[test]
    fn nonexistent_non_hex_input_is_rejected() {
        assert!(read_flag_input("./root.txt").is_none());
        assert!(read_flag_input("").is_none());
        // uppercase hex is not a flag, and (presumably) not a file either
        assert!(read_flag_input("E0D0A3D75AAE2526566B0892D28DE23C").is_none());
    }
}
