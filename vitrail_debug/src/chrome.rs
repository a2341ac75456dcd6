// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//! Each output is a process; whole-screen passes use process 0 and output
//! `n` uses process `n + 1`.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};
use vitrail_core::output::OutputId;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Phase events carry no output; they belong to the pass that began last.
    let mut pass_pid = 0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::PassBegin(e) => {
                pass_pid = pid(e.output);
                events.push(json!({
                    "ph": "i",
                    "name": "Pass",
                    "cat": "Pass",
                    "ts": us(e.timestamp.0),
                    "pid": pass_pid,
                    "tid": 0,
                    "s": "p",
                    "args": { "pass_index": e.pass_index }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Pass",
                    "ts": us(e.timestamp.0),
                    "pid": pass_pid,
                    "tid": 0,
                    "args": { "pass_index": e.pass_index }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Pass",
                    "ts": us(e.timestamp.0),
                    "pid": pass_pid,
                    "tid": 0,
                    "args": { "pass_index": e.pass_index }
                }));
            }
            RecordedEvent::TimerArmed(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}Timer", e.kind),
                    "cat": "Scheduler",
                    "ts": us(e.armed_at.0),
                    "pid": pid(e.output),
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "deadline_us": us(e.deadline.0),
                    }
                }));
            }
            RecordedEvent::SwapComplete(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "SwapComplete",
                    "cat": "Scheduler",
                    "ts": us(e.timestamp.0),
                    "pid": pid(e.output),
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "next_delay_us": us(e.next_delay.0),
                    }
                }));
            }
            RecordedEvent::PresentFeedback(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PresentFeedback",
                    "cat": "Presentation",
                    "ts": us(e.data.timestamp.0),
                    "pid": pid(Some(e.output)),
                    "tid": 2,
                    "s": "t",
                    "args": {
                        "sequence": e.data.sequence,
                        "refresh_us": us(e.data.refresh.0),
                        "kinds": e.data.kinds.bits(),
                        "surfaces": e.surfaces,
                    }
                }));
            }
            RecordedEvent::PassSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PassSummary",
                    "cat": "Summary",
                    "ts": us(s.started.0),
                    "pid": pid(s.output),
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "pass_index": s.pass_index,
                        "fetch_us": us(s.fetch_nanos),
                        "paint_us": us(s.paint_nanos),
                        "present_us": us(s.present_nanos),
                        "window_count": s.window_count,
                        "damage_area": s.damage_area,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn pid(output: Option<OutputId>) -> u64 {
    output.map_or(0, |o| u64::from(o.0) + 1)
}

fn us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}
