//! Interactive prompt detection

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the password prompt printed by `sudo`
static SUDO_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[sudo\] password for .+: .*").expect("sudo prompt pattern is valid")
});

/// Whether a line of remote output is a sudo password prompt
pub fn is_sudo_prompt(line: &str) -> bool {
    SUDO_PROMPT.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_prompt_matches() {
        assert!(is_sudo_prompt("[sudo] password for deploy: "));
        assert!(is_sudo_prompt("[sudo] password for ec2-user: typed"));
    }

    #[test]
    fn test_sudo_prompt_rejects_other_lines() {
        assert!(!is_sudo_prompt("[sudo] password for deploy:"));
        assert!(!is_sudo_prompt("echo [sudo] password for deploy: "));
        assert!(!is_sudo_prompt("Password: "));
    }
}
