//! Address extraction from `Thread.print` output.
//!
//! A pattern names one capture group holding the hex digits of an address.
//! Lines are scanned in order and the first match wins.

use regex::Regex;
use tracing::{debug, info};

use crate::address::Address;
use crate::error::HarnessError;

/// A named regex plus the 1-based capture group that holds the address.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    name: String,
    regex: Regex,
    group: usize,
}

impl ExtractionPattern {
    pub fn new(name: &str, pattern: &str, group: usize) -> Result<Self, HarnessError> {
        let regex = Regex::new(pattern).map_err(|e| HarnessError::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        // captures_len() counts the implicit whole-match group 0.
        if group == 0 || group >= regex.captures_len() {
            return Err(HarnessError::InvalidPattern {
                name: name.to_string(),
                reason: format!(
                    "group {group} out of range (pattern has {} capture groups)",
                    regex.captures_len() - 1
                ),
            });
        }
        Ok(Self {
            name: name.to_string(),
            regex,
            group,
        })
    }

    /// Matches the thread header, e.g. `"main" #1 ... tid=0x0000153418029c20 nid=...`.
    pub fn thread_id() -> Self {
        Self {
            name: "thread id".to_string(),
            regex: Regex::new(r" tid=0x([0-9a-fA-F]+) ").unwrap(),
            group: 1,
        }
    }

    /// Matches a monitor wait line, e.g. `- waiting on <0x00000007dd0135e8> (a MyLock)`.
    pub fn waiting_on(class: &str) -> Self {
        let pattern = format!(
            r"- waiting on <0x([0-9a-fA-F]+)> \(a {}\)",
            regex::escape(class)
        );
        Self {
            name: format!("waiting on {class}"),
            regex: Regex::new(&pattern).unwrap(),
            group: 1,
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Return the address captured by the first line of `text` matching `pattern`.
pub fn extract(text: &str, pattern: &ExtractionPattern) -> Result<Address, HarnessError> {
    for line in text.lines() {
        let Some(caps) = pattern.regex.captures(line) else {
            continue;
        };
        debug!(pattern = %pattern.name, line = %line, "matched line");

        let digits = caps.get(pattern.group).map(|m| m.as_str()).unwrap_or("");
        let address = Address::parse_hex(digits).map_err(|_| HarnessError::ExtractionFailure {
            pattern: pattern.as_str().to_string(),
            text: text.to_string(),
        })?;
        info!(pattern = %pattern.name, address = %address, "found pointer");
        return Ok(address);
    }

    Err(HarnessError::ExtractionFailure {
        pattern: pattern.as_str().to_string(),
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD_PRINT: &str = r#"2026-10-17 09:14:02
Full thread dump OpenJDK 64-Bit Server VM (24-internal mixed mode, sharing):

"main" #1 [17235] prio=5 os_prio=0 cpu=1265.79ms elapsed=6.12s tid=0x000014e37802bd80 nid=17235 in Object.wait()  [0x000014e3817d4000]
   java.lang.Thread.State: WAITING (on object monitor)
	at java.lang.Object.wait0(java.base@24-internal/Native Method)

"Thread-0" #31 [17270] prio=5 os_prio=0 cpu=0.35ms elapsed=0.12s tid=0x000014e3780f4a30 nid=17270 in Object.wait()  [0x000014e35c2fe000]
   java.lang.Thread.State: WAITING (on object monitor)
	at java.lang.Object.wait0(java.base@24-internal/Native Method)
	- waiting on <0x00000007dd0135e8> (a MyLock)
	at java.lang.Object.wait(java.base@24-internal/Object.java:378)
	- locked <0x00000007dd0135e8> (a MyLock)
"#;

    #[test]
    fn thread_id_takes_first_match() {
        let addr = extract(THREAD_PRINT, &ExtractionPattern::thread_id()).unwrap();
        assert_eq!(addr, Address::from(0x14e3_7802_bd80));
    }

    #[test]
    fn waiting_on_lock_class() {
        let addr = extract(THREAD_PRINT, &ExtractionPattern::waiting_on("MyLock")).unwrap();
        assert_eq!(addr, Address::from(0x7_dd01_35e8));
    }

    #[test]
    fn short_tid_line() {
        let text = "\"worker\" #7 prio=5 tid=0x1a2b3c nid=0x42 waiting\n";
        let addr = extract(text, &ExtractionPattern::thread_id()).unwrap();
        assert_eq!(addr.to_string(), "0x1a2b3c");
    }

    #[test]
    fn waiting_on_short_form() {
        let text = "\t- waiting on <0x7ffe0010> (a MyLock)\n";
        let addr = extract(text, &ExtractionPattern::waiting_on("MyLock")).unwrap();
        assert_eq!(addr, Address::from(0x7ffe_0010));
    }

    #[test]
    fn other_lock_class_does_not_match() {
        let err = extract(THREAD_PRINT, &ExtractionPattern::waiting_on("OtherLock")).unwrap_err();
        match err {
            HarnessError::ExtractionFailure { pattern, text } => {
                assert!(pattern.contains("OtherLock"));
                assert_eq!(text, THREAD_PRINT);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lock_class_is_escaped() {
        let pattern = ExtractionPattern::waiting_on("java.lang.Object");
        let text = "- waiting on <0x10> (a javaXlangXObject)\n- waiting on <0x20> (a java.lang.Object)";
        assert_eq!(extract(text, &pattern).unwrap(), Address::from(0x20));
    }

    #[test]
    fn extraction_is_deterministic() {
        let pattern = ExtractionPattern::thread_id();
        let first = extract(THREAD_PRINT, &pattern).unwrap();
        for _ in 0..10 {
            assert_eq!(extract(THREAD_PRINT, &pattern).unwrap(), first);
        }
    }

    #[test]
    fn custom_pattern_group_index() {
        let pattern = ExtractionPattern::new("owner", r"owner=(\w+) at 0x([0-9a-f]+)", 2).unwrap();
        let addr = extract("owner=gc at 0xbeef", &pattern).unwrap();
        assert_eq!(addr, Address::from(0xbeef));
    }

    #[test]
    fn custom_pattern_rejects_bad_group() {
        assert!(matches!(
            ExtractionPattern::new("none", r"tid=0x[0-9a-f]+", 1),
            Err(HarnessError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ExtractionPattern::new("zero", r"tid=0x([0-9a-f]+)", 0),
            Err(HarnessError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ExtractionPattern::new("broken", r"tid=(", 1),
            Err(HarnessError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn empty_text_fails() {
        assert!(matches!(
            extract("", &ExtractionPattern::thread_id()),
            Err(HarnessError::ExtractionFailure { .. })
        ));
    }
}
