//! Risk gate for agent-proposed commands
//!
//! Keywords only count in command position (start of the line or after a
//! shell separator, optionally behind `sudo`), so `perform` or `/tmp/rm.log`
//! do not trip the `rm` rule. An absolute path (`/bin/rm`), quoting
//! (`"rm"`) or a leading backslash (`\rm`) still names the same program.

use std::sync::OnceLock;

use regex::RegexSet;

const PREFIX: &str = r"(?:^|[;&|(`$]\s*|\s)(?:(?:\S*/)?sudo\s+(?:-\S+\s+)*)?";

/// Directory path, quote or backslash in front of the program name
const HEAD: &str = r#"(?:\S*/)?["'\\]?"#;

/// (label, command pattern) pairs; patterns are appended to [`PREFIX`] and
/// [`HEAD`]. A quote may close the program name.
const RULES: &[(&str, &str)] = &[
    ("file removal", r#"(?:rm|rmdir|unlink|shred)["']?(?:\s|$)"#),
    ("process kill", r#"(?:kill|killall|pkill|xkill)["']?(?:\s|$)"#),
    ("reboot or shutdown", r#"(?:reboot|shutdown|poweroff|halt)["']?(?:\s|$)"#),
    ("runlevel change", r#"(?:init|telinit)["']?\s+[06](?:\s|$)"#),
    (
        "filesystem format",
        r#"(?:mkfs(?:\.\w+)?|mkswap|wipefs|fdisk|sfdisk|parted)["']?(?:\s|$)"#,
    ),
    ("raw disk write", r#"dd["']?\s.*\bof="#),
    (
        "ownership or permission change",
        r#"(?:chown|chmod|chgrp|chattr|setfacl)["']?(?:\s|$)"#,
    ),
    (
        "service stop",
        r#"systemctl["']?\s+(?:\S+\s+)*(?:stop|disable|mask|kill)(?:\s|$)"#,
    ),
    ("service stop", r#"service["']?\s+\S+\s+stop(?:\s|$)"#),
    ("user removal", r#"(?:userdel|groupdel|deluser)["']?(?:\s|$)"#),
    ("firewall flush", r#"iptables["']?\s+(?:\S+\s+)*-F(?:\s|$)"#),
    ("crontab removal", r#"crontab["']?\s+(?:\S+\s+)*-r(?:\s|$)"#),
    ("file truncation", r#"truncate["']?\s"#),
];

/// Redirection onto a device node; matched anywhere in the line
const DEVICE_REDIRECT: &str = r">\s*/dev/(?:sd|hd|vd|xvd|nvme|mmcblk|disk|mapper/)";

fn rules() -> Option<&'static RegexSet> {
    static SET: OnceLock<Option<RegexSet>> = OnceLock::new();
    SET.get_or_init(|| {
        let patterns = RULES
            .iter()
            .map(|(_, pattern)| format!("(?i){}{}{}", PREFIX, HEAD, pattern))
            .chain(std::iter::once(DEVICE_REDIRECT.to_string()));
        RegexSet::new(patterns).ok()
    })
    .as_ref()
}

/// Why a command needs confirmation, or `None` if it looks safe.
///
/// If the rule set fails to build every command is treated as risky.
pub fn assess(command: &str) -> Option<&'static str> {
    let Some(set) = rules() else {
        return Some("unverifiable command");
    };

    set.matches(command.trim())
        .iter()
        .next()
        .map(|index| RULES.get(index).map_or("device redirection", |(label, _)| *label))
}

pub fn is_risky(command: &str) -> bool {
    assess(command).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_compiles() {
        assert!(rules().is_some());
    }

    #[test]
    fn test_flags_destructive_commands() {
        for command in [
            "rm -rf /var/log/app",
            "sudo rm /etc/hosts",
            "cd /tmp && rm old.txt",
            "kill -9 1234",
            "pkill nginx",
            "reboot",
            "sudo shutdown -h now",
            "mkfs.ext4 /dev/sdb1",
            "dd if=/dev/zero of=/dev/sda bs=1M",
            "chmod 777 /etc/passwd",
            "chown -R www-data /srv",
            "systemctl stop nginx",
            "service apache2 stop",
            "echo hi > /dev/sda",
            "iptables -F",
            "/bin/rm -rf /srv/data",
            "sudo /usr/bin/rm -r /opt/app",
            "/usr/bin/sudo rm x",
            "/sbin/reboot",
            "/usr/bin/kill -9 1",
            "/sbin/mkfs.ext4 /dev/sdb1",
            "/bin/chmod 777 /etc/shadow",
            "echo x | xargs /bin/rm",
            "\"rm\" -rf /",
            "'rm' -rf /",
            "\"/bin/rm\" -rf /",
            "\\rm -rf /",
            "/usr/bin/systemctl stop sshd",
        ] {
            assert!(is_risky(command), "expected risky: {}", command);
        }
    }

    #[test]
    fn test_allows_read_only_commands() {
        for command in [
            "ls -la /tmp",
            "cat /var/log/syslog | grep perform",
            "tail -n 50 /tmp/rm.log",
            "df -h",
            "systemctl status nginx",
            "ps aux | grep killer",
            "echo done > /dev/null",
            "ls /usr/local/bin/rmate",
            "/usr/bin/uptime",
            "\"ls\" /srv",
        ] {
            assert!(!is_risky(command), "expected safe: {}", command);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(assess("rm -f x"), Some("file removal"));
        assert_eq!(assess("echo x > /dev/sda"), Some("device redirection"));
        assert_eq!(assess("/sbin/shutdown -r now"), Some("reboot or shutdown"));
    }
}
