//! `--check-config` diagnostics (SPEC_FULL §C.2), grounded on the teacher's
//! `cli/doctor.rs`: a handful of independent `check_*` functions, each
//! folding into a shared pass/fail summary via [`print_check`].

use sa_domain::config::{Config, ConfigSeverity};

fn print_check(name: &str, passed: bool, detail: &str) {
    let tag = if passed { "PASS" } else { "FAIL" };
    println!("  [{tag}] {name}: {detail}");
}

/// Run every check against `config` (loaded from `config_path`) and print a
/// pass/fail report. Returns `true` iff every check passed.
pub fn run(config: &Config, config_path: &str) -> bool {
    println!("sa-cli config check ({config_path})");

    let mut all_passed = true;
    check_config_validation(config, &mut all_passed);
    check_llm_providers(config, &mut all_passed);
    check_workspace(config, &mut all_passed);
    check_sessions_dir(config, &mut all_passed);

    if all_passed {
        println!("all checks passed");
    } else {
        println!("one or more checks failed");
    }
    all_passed
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .collect();
    let warnings: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Warning)
        .collect();

    if errors.is_empty() {
        let detail = if warnings.is_empty() {
            "no issues".to_string()
        } else {
            format!("{} warning(s)", warnings.len())
        };
        print_check("config validation", true, &detail);
    } else {
        *all_passed = false;
        let detail = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        print_check("config validation", false, &detail);
    }

    for warning in &warnings {
        println!("    warn: {warning}");
    }
}

fn check_llm_providers(config: &Config, all_passed: &mut bool) {
    if config.llm.providers.is_empty() {
        print_check("llm providers", true, "none configured (warning only)");
        return;
    }

    let missing_creds: Vec<&str> = config
        .llm
        .providers
        .iter()
        .filter(|p| p.auth.resolve_key().is_none() && p.auth.mode == sa_domain::config::AuthMode::ApiKey)
        .map(|p| p.id.as_str())
        .collect();

    if missing_creds.is_empty() {
        print_check(
            "llm providers",
            true,
            &format!("{} provider(s) configured", config.llm.providers.len()),
        );
    } else {
        *all_passed = false;
        print_check(
            "llm providers",
            false,
            &format!("missing credentials for: {}", missing_creds.join(", ")),
        );
    }
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    match std::fs::create_dir_all(&config.tools.file_ops.workdir) {
        Ok(()) => print_check(
            "workspace directory",
            true,
            &config.tools.file_ops.workdir.display().to_string(),
        ),
        Err(e) => {
            *all_passed = false;
            print_check("workspace directory", false, &e.to_string());
        }
    }
}

fn check_sessions_dir(config: &Config, all_passed: &mut bool) {
    match std::fs::create_dir_all(&config.sessions.state_path) {
        Ok(()) => print_check(
            "sessions directory",
            true,
            &config.sessions.state_path.display().to_string(),
        ),
        Err(e) => {
            *all_passed = false;
            print_check("sessions directory", false, &e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_in_a_writable_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tools.file_ops.workdir = dir.path().join("workspace");
        config.sessions.state_path = dir.path().join("sessions");

        assert!(run(&config, "config.toml"));
    }
}
