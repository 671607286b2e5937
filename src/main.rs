/*!
 * smartsched - Main Entry Point
 *
 * Thin command-line front over the daemon:
 * - `smartsched get_cpu` / `get_mem` print one-shot readings
 * - `smartsched <mode>` starts with the given mode active
 * - no argument starts with the configured default mode
 */

use log::info;
use smartsched::{Daemon, Settings};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/etc/smartsched.conf";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut command = None;
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                config_path = path;
            }
        } else {
            command = Some(arg);
        }
    }

    let settings = match Settings::load(Path::new(&config_path)) {
        Ok(settings) => settings,
        Err(_) => Settings::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_filter()),
    )
    .init();

    let daemon = Daemon::new(settings);

    match command.as_deref() {
        Some("get_cpu") => {
            let _ = daemon.observer().poll_once();
            std::thread::sleep(std::time::Duration::from_millis(250));
            let _ = daemon.observer().poll_once();
            let cpu = daemon
                .system_snapshot()
                .map(|s| s.cpu_total_pct)
                .unwrap_or(0.0);
            println!("{:.1}", cpu);
            return;
        }
        Some("get_mem") => {
            let _ = daemon.observer().poll_once();
            let mem = daemon
                .system_snapshot()
                .map(|s| s.mem_used_pct())
                .unwrap_or(0.0);
            println!("{:.1}", mem);
            return;
        }
        Some(mode) => {
            daemon.start();
            if let Err(e) = daemon.switch_mode(mode) {
                log::warn!("requested mode not applied: {}", e);
            }
        }
        None => daemon.start(),
    }

    info!("smartsched running (mode {})", daemon.current_mode());
    loop {
        std::thread::park();
    }
}
