use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use crate::{
    cli::RunOptions,
    config::{self, loader, Config, OffPolicy},
    feeds::{self, forecast::Provider, validate},
    Error, Result,
};

/// Line-mode settings console. Each accepted change is validated (live
/// against the services where that is possible) and persisted immediately,
/// so quitting mid-way never loses finished answers.
pub fn run_setup(opts: RunOptions) -> Result<()> {
    if !io::stdin().is_terminal() {
        return Err(Error::Config(
            "setup needs an interactive terminal; edit the config file directly instead".into(),
        ));
    }
    let path = match opts.config_path.as_deref() {
        Some(p) => PathBuf::from(p),
        None => loader::config_path()?,
    };
    let mut cfg = Config::load_from_path(&path)?;
    let client = feeds::client()?;

    loop {
        print_menu(&cfg);
        let choice = prompt("Select an option (0-8, L)")?;
        match choice.to_ascii_uppercase().as_str() {
            "1" => match serde_json::to_string_pretty(&cfg) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => println!("cannot render settings: {err}"),
            },
            "2" => update_device(&mut cfg)?,
            "3" => update_zip(&mut cfg, &client)?,
            "4" => update_window(&mut cfg)?,
            "5" => update_provider(&mut cfg)?,
            "6" => update_api_key(&mut cfg, &client)?,
            "7" => update_zone(&mut cfg, &client)?,
            "8" => update_off_policy(&mut cfg)?,
            "L" => {
                cfg.logging_on = !cfg.logging_on;
                println!("Logging is now {}", if cfg.logging_on { "ON" } else { "OFF" });
            }
            "0" => {
                cfg.save_to_path(&path)?;
                println!("Saved {}", path.display());
                return Ok(());
            }
            other => {
                println!("Invalid choice '{other}', try again.");
                continue;
            }
        }
        cfg.save_to_path(&path)?;
    }
}

fn print_menu(cfg: &Config) {
    println!();
    println!("==================================================");
    println!("          SIGNWX WEATHER DISPLAY SETUP");
    println!("==================================================");
    println!("1. View current settings");
    println!("2. Serial device          [{}]", cfg.device);
    println!("3. ZIP code               [{}]", display_or_unset(&cfg.zip_code));
    println!("4. Display ON/OFF times   [{} - {}]", cfg.on_time, cfg.off_time);
    println!("5. Forecast provider      [{}]", cfg.provider);
    println!("6. API key                [{}]", mask(&cfg.api_key));
    println!("7. NWS forecast zone      [{}]", display_or_unset(&cfg.forecast_zone));
    println!("8. Off-window policy      [{}]", cfg.off_policy);
    println!("L. Toggle logging         [{}]", if cfg.logging_on { "ON" } else { "OFF" });
    println!("0. Save and exit");
    println!("==================================================");
}

fn update_device(cfg: &mut Config) -> Result<()> {
    let available: Vec<String> = serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default();
    if available.is_empty() {
        println!("No serial ports detected; enter a device path manually.");
    } else {
        println!("Detected serial ports:");
        for (idx, name) in available.iter().enumerate() {
            println!("  [{}] {}", idx + 1, name);
        }
    }
    let answer = prompt(&format!("Device path or number [{}]", cfg.device))?;
    match pick_device(&answer, &available, &cfg.device) {
        Some(device) => cfg.device = device,
        None => println!("'{answer}' is not a listed number or device path."),
    }
    Ok(())
}

/// Resolve a device answer: empty keeps the current value, a number picks
/// from the detected list, anything else is taken as a literal path.
fn pick_device(answer: &str, available: &[String], current: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(current.to_string());
    }
    if let Ok(index) = answer.parse::<usize>() {
        return available.get(index.checked_sub(1)?).cloned();
    }
    Some(answer.to_string())
}

fn update_zip(cfg: &mut Config, client: &reqwest::blocking::Client) -> Result<()> {
    if cfg.api_key.trim().is_empty() {
        println!("Set the API key first so the ZIP can be verified.");
        return Ok(());
    }
    let answer = prompt_or(&format!("ZIP code [{}]", cfg.zip_code), &cfg.zip_code)?;
    if validate::validate_zip(client, cfg.provider, &cfg.api_key, &answer) {
        cfg.zip_code = answer;
    } else {
        println!("'{answer}' was not accepted by {}.", cfg.provider);
    }
    Ok(())
}

fn update_window(cfg: &mut Config) -> Result<()> {
    loop {
        let on = prompt_or(&format!("ON time, 24h HH:MM [{}]", cfg.on_time), &cfg.on_time)?;
        let off = prompt_or(&format!("OFF time, 24h HH:MM [{}]", cfg.off_time), &cfg.off_time)?;
        let parsed = config::parse_hhmm(&on).and_then(|a| Ok((a, config::parse_hhmm(&off)?)));
        match parsed {
            Ok((a, b)) if a == b => println!("ON and OFF must differ."),
            Ok(_) => {
                cfg.on_time = on;
                cfg.off_time = off;
                return Ok(());
            }
            Err(err) => println!("{err}"),
        }
    }
}

fn update_provider(cfg: &mut Config) -> Result<()> {
    let answer = prompt("Provider (1-OpenWeather, 2-Tomorrow.io)")?;
    match answer.as_str() {
        "1" => cfg.provider = Provider::OpenWeather,
        "2" => cfg.provider = Provider::TomorrowIo,
        "" => {}
        other => println!("'{other}' is not 1 or 2."),
    }
    Ok(())
}

fn update_api_key(cfg: &mut Config, client: &reqwest::blocking::Client) -> Result<()> {
    let answer = prompt_or(&format!("API key [{}]", mask(&cfg.api_key)), &cfg.api_key)?;
    if validate::validate_api_key(client, cfg.provider, &answer) {
        cfg.api_key = answer;
    } else {
        println!("Key was rejected by {}.", cfg.provider);
    }
    Ok(())
}

fn update_zone(cfg: &mut Config, client: &reqwest::blocking::Client) -> Result<()> {
    let answer = prompt_or(
        &format!("NWS forecast zone [{}]", cfg.forecast_zone),
        &cfg.forecast_zone,
    )?;
    let answer = answer.to_ascii_uppercase();
    if validate::validate_forecast_zone(client, &answer) {
        cfg.forecast_zone = answer;
    } else {
        println!("'{answer}' is not a known forecast zone.");
    }
    Ok(())
}

fn update_off_policy(cfg: &mut Config) -> Result<()> {
    let answer = prompt_or(
        &format!("Off-window policy, blank or suppress [{}]", cfg.off_policy),
        cfg.off_policy.as_str(),
    )?;
    match answer.parse::<OffPolicy>() {
        Ok(policy) => cfg.off_policy = policy,
        Err(err) => println!("{err}"),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_or(label: &str, current: &str) -> Result<String> {
    let answer = prompt(label)?;
    if answer.is_empty() {
        Ok(current.to_string())
    } else {
        Ok(answer)
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "unset"
    } else {
        value
    }
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        "unset".to_string()
    } else if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        let head: String = key.chars().take(4).collect();
        format!("{head}****")
    }
}
