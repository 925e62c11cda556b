//! Scenario replay from a TOML transcript.

use vmprobe::channel::ScriptedChannel;
use vmprobe::error::HarnessError;
use vmprobe::scenario::{ScenarioRunner, ScenarioSettings, ScenarioState};
use vmprobe::sweep::SweepSettings;

const TRANSCRIPT: &str = r#"
[[rule]]
command = "Thread.print"
output = """
"Thread-0" #31 [17270] prio=5 os_prio=0 tid=0x1a2b3c nid=17270 in Object.wait()
   java.lang.Thread.State: WAITING (on object monitor)
	- waiting on <0x7ffe0010> (a MyLock)
	- locked <0x7ffe0010> (a MyLock)
"""

[[rule]]
command = "VM.debug find 0x1a2b3c"
output = "0x1a2b3c is a thread\n"

[[rule]]
command = "VM.debug find -verbose 0x1a2b3c"
output = """
0x1a2b3c is a thread
"Thread-0" #31 [17270] prio=5 os_prio=0 tid=0x1a2b3c nid=17270 in Object.wait()
   java.lang.Thread.State: WAITING (on object monitor)
"""

[[rule]]
command = "VM.debug find 0x0"
output = "address not safe\n"

[[rule]]
command = "VM.debug find -1"
output = "address not safe\n"

[[rule]]
command = "VM.debug find 0x7ffe0010"
output = """
0x7ffe0010 is an oop: MyLock
{0x7ffe0010} - klass: 'MyLock'
 - ---- fields (total size 2 words):
 - private 'myInt' 'I' @12  12345 (0x3039)
"""

[[rule]]
prefix = "VM.debug find 0x"
output = "is an unknown value\n"
"#;

fn small_sweeps() -> ScenarioSettings {
    ScenarioSettings {
        sweep: SweepSettings {
            lookback: 4,
            count: 8,
            reject_empty: true,
        },
        ..ScenarioSettings::default()
    }
}

#[test]
fn transcript_file_replays_full_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("session.toml");
    std::fs::write(&path, TRANSCRIPT).unwrap();

    let mut channel = ScriptedChannel::from_transcript(&path).unwrap();
    let report = ScenarioRunner::new(&mut channel, small_sweeps()).run().unwrap();

    assert_eq!(report.thread.unwrap().to_string(), "0x1a2b3c");
    assert_eq!(report.object.unwrap().to_string(), "0x7ffe0010");
    assert_eq!(report.commands, 1 + 2 + 8 + 2 + 1 + 1 + 8);
    let sweep = report.object_sweep.unwrap();
    assert_eq!(sweep.first.unwrap().to_string(), "0x7ffe000c");
    assert_eq!(sweep.last.unwrap().to_string(), "0x7ffe0013");
    assert_eq!(sweep.tally.object, 1);
    assert_eq!(sweep.tally.unknown, 7);
}

#[test]
fn incomplete_transcript_fails_at_channel_level() {
    let truncated = TRANSCRIPT
        .split("[[rule]]\ncommand = \"VM.debug find -1\"")
        .next()
        .unwrap();
    let mut channel = ScriptedChannel::parse_transcript("truncated", truncated).unwrap();
    let settings = ScenarioSettings {
        sweep_thread: false,
        ..small_sweeps()
    };
    let abort = ScenarioRunner::new(&mut channel, settings).run().unwrap_err();
    assert_eq!(abort.state, ScenarioState::ThreadClassified);
    match abort.error {
        HarnessError::ChannelFailure { command, .. } => assert_eq!(command, "VM.debug find -1"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(channel.history().last().unwrap(), "VM.debug find -1");
}
