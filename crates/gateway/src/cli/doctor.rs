use pb_catalog::DeviceCatalog;
use pb_domain::config::{Config, ConfigSeverity, ProtocolBackend};
use pb_protocol::AddressSpace;

/// Run all diagnostic checks and print a summary.
///
/// Returns `true` when every check passes.
pub fn run(config: &Config, config_path: &str) -> bool {
    println!("plcbridge doctor");
    println!("================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Catalog
    check_catalog(config, &mut all_passed);

    // 4. Protocol backend
    check_address_space(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
        return;
    }

    print_check(
        "Config validation",
        error_count == 0,
        format!("{} issue(s) ({} error(s))", issues.len(), error_count),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_catalog(config: &Config, all_passed: &mut bool) {
    let path = &config.catalog.path;
    let result = DeviceCatalog::open(path).and_then(|catalog| {
        let devices = catalog.count_devices()?;
        let heartbeat = catalog.list_devices_with_heartbeat()?.len();
        Ok((devices, heartbeat))
    });

    match result {
        Ok((devices, heartbeat)) => print_check(
            "Device catalog",
            true,
            format!(
                "{} ({devices} device(s), {heartbeat} polled)",
                path.display()
            ),
        ),
        Err(e) => {
            print_check("Device catalog", false, format!("{}: {e}", path.display()));
            *all_passed = false;
        }
    }
}

fn check_address_space(config: &Config, all_passed: &mut bool) {
    match config.protocol.backend {
        ProtocolBackend::Simulated => {
            let path = &config.protocol.address_space;
            if !path.exists() {
                print_check(
                    "Address space fixture",
                    false,
                    format!("{} not found", path.display()),
                );
                *all_passed = false;
                return;
            }
            match AddressSpace::load(path) {
                Ok(space) => print_check(
                    "Address space fixture",
                    true,
                    format!("{} ({} server(s))", path.display(), space.servers.len()),
                ),
                Err(e) => {
                    print_check("Address space fixture", false, format!("{}: {e}", path.display()));
                    *all_passed = false;
                }
            }
        }
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
