use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    Windows,
    Linux,
    Macos,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShellFamily {
    Cmd,
    Posix,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRuntimeContext {
    pub os: HostOs,
    pub shell_family: ShellFamily,
}

impl HostRuntimeContext {
    pub fn detect() -> Self {
        let os = if cfg!(windows) {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::Macos
        } else {
            HostOs::Linux
        };
        let shell_family = match os {
            HostOs::Windows => ShellFamily::Cmd,
            HostOs::Linux | HostOs::Macos => ShellFamily::Posix,
        };
        Self { os, shell_family }
    }

    /// Program and leading arguments that run `line` through the host shell.
    pub fn shell_invocation(&self, line: &str) -> (String, Vec<String>) {
        match self.shell_family {
            ShellFamily::Cmd => ("cmd".to_string(), vec!["/C".to_string(), line.to_string()]),
            ShellFamily::Posix => ("sh".to_string(), vec!["-c".to_string(), line.to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_shell_wraps_line_in_dash_c() {
        let ctx = HostRuntimeContext {
            os: HostOs::Linux,
            shell_family: ShellFamily::Posix,
        };
        let (program, args) = ctx.shell_invocation("npm run build");
        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-c".to_string(), "npm run build".to_string()]);
    }
}
