//! Environment variable harvesting
//!
//! A harvested command is followed by a suffix that dumps the requested
//! variables as `NAME=value` lines into a file, then exits with the
//! command's own status. The file is read back after the command ends.

use std::collections::HashMap;

use dlg_protocol::shell_quote;
use uuid::Uuid;

use crate::error::ExecError;

/// Prefix of the per-run variable dump file
pub const ENV_FILE_PREFIX: &str = ".dlg-env-";

/// Whether `name` can be used as a shell variable
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject names that would break the dump suffix
pub fn check_variable_names(names: &[String]) -> Result<(), ExecError> {
    match names.iter().find(|n| !is_valid_variable_name(n)) {
        Some(bad) => Err(ExecError::InvalidVariableName(bad.clone())),
        None => Ok(()),
    }
}

/// Fresh dump file name
pub fn env_file_name() -> String {
    format!("{}{}", ENV_FILE_PREFIX, Uuid::new_v4().simple())
}

/// Bourne-shell suffix writing `names` to `env_file`, preserving `$?`
pub fn shell_suffix(names: &[String], env_file: &str) -> String {
    let mut suffix = String::from("\n__dlg_rc=$?\n{\n");
    for name in names {
        suffix.push_str(&format!("printf '%s=%s\\n' '{name}' \"${{{name}}}\"\n"));
    }
    suffix.push_str(&format!("}} > {}\nexit $__dlg_rc\n", shell_quote(env_file)));
    suffix
}

/// PowerShell suffix writing `names` to `env_file`, preserving `$LASTEXITCODE`
pub fn powershell_suffix(names: &[String], env_file: &str) -> String {
    let env_file = env_file.replace('\'', "''");
    let mut suffix = String::from("\n$__dlgRc = $LASTEXITCODE\n");
    suffix.push_str(&format!(
        "New-Item -ItemType File -Force -Path '{}' | Out-Null\n",
        env_file
    ));
    for name in names {
        suffix.push_str(&format!(
            "\"{name}=$(if ($null -ne ${name}) {{ ${name} }} else {{ $env:{name} }})\" | Out-File -FilePath '{file}' -Append -Encoding ascii\n",
            name = name,
            file = env_file
        ));
    }
    suffix.push_str("exit $__dlgRc\n");
    suffix
}

/// Parse dump output, keeping only requested names
pub fn parse_env_output(output: &str, names: &[String]) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let (name, value) = line.split_once('=')?;
            names
                .iter()
                .any(|n| n == name)
                .then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}
