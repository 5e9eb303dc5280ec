//! Target chooser cascade: which output (or, once window sharing support
//! lands, which region) to hand PipeWire. Ported from
//! `examples/original_source/src/screencast/chooser.c`.
//!
//! The default cascade (`ChooserType::Default`) is the interesting part:
//! when no `chooser_cmd` is configured, the original tries a short list of
//! well-known dmenu-alikes in order and uses whichever one is actually
//! installed, falling back to "just pick the first output" if none are.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::config::ChooserType;
use crate::wayland::output::OutputInfo;

struct DefaultChooser {
    kind: ChooserType,
    cmd: &'static str,
}

const DEFAULT_CHOOSERS: &[DefaultChooser] = &[
    DefaultChooser { kind: ChooserType::Simple, cmd: "slurp -f %o -or" },
    DefaultChooser { kind: ChooserType::Dmenu, cmd: "wmenu -p 'Select the monitor to share:'" },
    DefaultChooser { kind: ChooserType::Dmenu, cmd: "wofi -d -n --prompt='Select the monitor to share:'" },
    DefaultChooser { kind: ChooserType::Dmenu, cmd: "rofi -dmenu -p 'Select the monitor to share:'" },
    DefaultChooser { kind: ChooserType::Dmenu, cmd: "bemenu --prompt='Select the monitor to share:'" },
];

/// Spawn `cmd` under `/bin/sh -c`, feed it an output list on stdin for
/// dmenu-style choosers, and read back one line of its stdout.
fn run_chooser(kind: ChooserType, cmd: &str, outputs: &[Arc<OutputInfo>]) -> Option<Option<String>> {
    trace!("chooser: spawning '{cmd}'");
    let mut child = match Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            debug!("chooser: '{cmd}' not found or failed to start: {e}");
            return None;
        }
    };

    if matches!(kind, ChooserType::Dmenu) {
        if let Some(stdin) = child.stdin.as_mut() {
            for output in outputs {
                let _ = writeln!(stdin, "{}", output.display_name());
            }
        }
    }
    drop(child.stdin.take());

    let status = match child.wait() {
        Ok(s) => s,
        Err(e) => {
            error!("chooser: '{cmd}' failed to exit cleanly: {e}");
            return None;
        }
    };
    // 127 is /bin/sh's "command not found" exit code.
    if status.code() == Some(127) {
        return None;
    }

    let mut line = String::new();
    if let Some(stdout) = child.stdout {
        let _ = BufReader::new(stdout).read_line(&mut line);
    }
    let trimmed = line.trim_end_matches('\n').trim();
    Some(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
}

fn find_output_named<'a>(outputs: &'a [Arc<OutputInfo>], name: &str) -> Option<Arc<OutputInfo>> {
    outputs.iter().find(|o| o.display_name() == name).cloned()
}

fn default_chooser_cascade(outputs: &[Arc<OutputInfo>]) -> Option<Arc<OutputInfo>> {
    for chooser in DEFAULT_CHOOSERS {
        debug!("chooser: trying default chooser '{}'", chooser.cmd);
        match run_chooser(chooser.kind, chooser.cmd, outputs) {
            None => {
                debug!("chooser: '{}' not available, trying next", chooser.cmd);
                continue;
            }
            Some(None) => {
                debug!("chooser: '{}' ran but selection was cancelled", chooser.cmd);
                return None;
            }
            Some(Some(name)) => return find_output_named(outputs, &name),
        }
    }
    outputs.first().cloned()
}

/// Resolve the output to capture for a `Start` call with no prior
/// `SelectSources` narrowing, per spec §4.C.1 and `chooser.c`'s
/// `xdpw_wlr_target_chooser`.
pub fn choose_output(
    chooser_type: ChooserType,
    chooser_cmd: Option<&str>,
    configured_output: Option<&str>,
    outputs: &[Arc<OutputInfo>],
) -> Option<Arc<OutputInfo>> {
    match chooser_type {
        ChooserType::Default => default_chooser_cascade(outputs),
        ChooserType::None => match configured_output {
            Some(name) => find_output_named(outputs, name),
            None => outputs.first().cloned(),
        },
        ChooserType::Simple | ChooserType::Dmenu => {
            let Some(cmd) = chooser_cmd else {
                error!("chooser: chooser_type set but no chooser_cmd configured");
                return None;
            };
            match run_chooser(chooser_type, cmd, outputs) {
                None | Some(None) => None,
                Some(Some(name)) => find_output_named(outputs, &name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_chooser_with_configured_name_looks_it_up() {
        // `find_output_named` is exercised indirectly through `choose_output`
        // with an empty output list, since constructing a real `OutputInfo`
        // requires a live Wayland connection.
        let outputs: Vec<Arc<OutputInfo>> = Vec::new();
        assert!(choose_output(ChooserType::None, None, Some("DP-1"), &outputs).is_none());
    }

    #[test]
    fn dmenu_without_cmd_configured_returns_none() {
        let outputs: Vec<Arc<OutputInfo>> = Vec::new();
        assert!(choose_output(ChooserType::Dmenu, None, None, &outputs).is_none());
    }
}
