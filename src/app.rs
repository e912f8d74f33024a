//! Application loop: capture, filter, dispatch, react to keys.

use crate::capture::{CaptureManager, FrameSource, OutputConfig};
use crate::filters::{recolor_rc_in_place, ChannelFilter};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Consecutive empty cycles after which the source is treated as finished.
const END_OF_STREAM_CYCLES: u32 = 30;

/// What a key press asks the application to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Save the next frame as a still image.
    WriteImage,
    /// Start or stop video recording.
    ToggleRecording,
    /// Leave the loop.
    Quit,
}

/// Key codes bound to commands. Only the low byte of a code is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    /// Saves a still image (Space).
    pub write_image: u8,
    /// Starts or stops recording (Tab).
    pub toggle_recording: u8,
    /// Leaves the loop (Escape).
    pub quit: u8,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            write_image: 32,
            toggle_recording: 9,
            quit: 27,
        }
    }
}

impl KeyMap {
    /// The command bound to `keycode`. Negative codes mean no key.
    pub fn command(&self, keycode: i32) -> Option<Command> {
        if keycode < 0 {
            return None;
        }
        match (keycode & 0xFF) as u8 {
            k if k == self.write_image => Some(Command::WriteImage),
            k if k == self.toggle_recording => Some(Command::ToggleRecording),
            k if k == self.quit => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Supplies key presses, polled once after every cycle.
pub trait KeySource {
    /// The key pressed during cycle `cycle` (0-based), if any.
    fn poll(&mut self, cycle: u64) -> Option<i32>;
}

/// No keyboard attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self, _cycle: u64) -> Option<i32> {
        None
    }
}

/// Replays `(cycle, keycode)` pairs.
///
/// Parses from `CYCLE:KEY[,CYCLE:KEY...]`, where `KEY` is a number or one of
/// `space`, `tab`, `esc`/`escape`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedKeys {
    keys: VecDeque<(u64, i32)>,
}

impl ScriptedKeys {
    /// Creates a script from `(cycle, keycode)` pairs in any order.
    pub fn new(mut keys: Vec<(u64, i32)>) -> Self {
        keys.sort_by_key(|(cycle, _)| *cycle);
        Self { keys: keys.into() }
    }

    /// Keys not yet delivered.
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self, cycle: u64) -> Option<i32> {
        // Keys scheduled for cycles that already passed are dropped.
        while self.keys.front().is_some_and(|(at, _)| *at < cycle) {
            self.keys.pop_front();
        }
        match self.keys.front() {
            Some((at, _)) if *at == cycle => self.keys.pop_front().map(|(_, key)| key),
            _ => None,
        }
    }
}

fn parse_key(name: &str) -> Result<i32, String> {
    match name.to_ascii_lowercase().as_str() {
        "space" => Ok(32),
        "tab" => Ok(9),
        "esc" | "escape" => Ok(27),
        other => other
            .parse()
            .map_err(|_| format!("unknown key '{name}'")),
    }
}

impl FromStr for ScriptedKeys {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keys = s
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (cycle, key) = entry
                    .split_once(':')
                    .ok_or_else(|| format!("expected CYCLE:KEY, got '{entry}'"))?;
                let cycle = cycle
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid cycle '{cycle}'"))?;
                Ok((cycle, parse_key(key.trim())?))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self::new(keys))
    }
}

/// Replaces `{timestamp}` in `path` with the local time.
pub fn expand_timestamp(path: &Path, now: DateTime<Local>) -> PathBuf {
    let raw = path.to_string_lossy();
    if !raw.contains("{timestamp}") {
        return path.to_path_buf();
    }
    let stamp = now.format("%Y%m%d-%H%M%S%.3f").to_string();
    PathBuf::from(raw.replace("{timestamp}", &stamp))
}

/// Owns the capture manager and runs the per-frame loop.
pub struct App<S: FrameSource> {
    manager: CaptureManager<S>,
    filter: Option<ChannelFilter>,
    recolor_rc: bool,
    output: OutputConfig,
    keymap: KeyMap,
    running: bool,
    cycles: u64,
    filter_failed: bool,
}

impl<S: FrameSource> App<S> {
    /// Creates an app with no filter and the default key map.
    pub fn new(manager: CaptureManager<S>, output: OutputConfig) -> Self {
        Self {
            manager,
            filter: None,
            recolor_rc: false,
            output,
            keymap: KeyMap::default(),
            running: false,
            cycles: 0,
            filter_failed: false,
        }
    }

    /// Sets the curve filter applied to every frame.
    pub fn with_filter(mut self, filter: Option<ChannelFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Enables the red/cyan recolor after the curves.
    pub fn with_recolor_rc(mut self, enabled: bool) -> Self {
        self.recolor_rc = enabled;
        self
    }

    /// Replaces the key bindings.
    pub fn with_keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    /// The capture manager.
    pub fn manager(&self) -> &CaptureManager<S> {
        &self.manager
    }

    /// Mutable access to the capture manager.
    pub fn manager_mut(&mut self) -> &mut CaptureManager<S> {
        &mut self.manager
    }

    /// True while [`run`](Self::run) is looping.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Cycles completed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs one enter/filter/exit cycle.
    pub fn run_cycle(&mut self) {
        self.manager.enter_frame();
        if let Some(frame) = self.manager.frame_mut() {
            if let Some(filter) = &self.filter {
                if let Err(e) = filter.apply_in_place(frame) {
                    if !self.filter_failed {
                        tracing::warn!(error = %e, "Curve filter skipped");
                        self.filter_failed = true;
                    }
                }
            }
            if self.recolor_rc {
                if let Err(e) = recolor_rc_in_place(frame) {
                    tracing::debug!(error = %e, "Recolor skipped");
                }
            }
        }
        self.manager.exit_frame();
        self.cycles += 1;
    }

    /// Executes the command bound to `keycode`, if any.
    pub fn handle_key(&mut self, keycode: i32) -> Option<Command> {
        let command = self.keymap.command(keycode)?;
        match command {
            Command::WriteImage => {
                let path = expand_timestamp(&self.output.screenshot_path, Local::now());
                tracing::info!(path = %path.display(), "Still image requested");
                self.manager.write_image(path);
            }
            Command::ToggleRecording => {
                if self.manager.is_writing_video() {
                    self.manager.stop_writing_video();
                } else {
                    self.manager
                        .start_writing_video(self.output.screencast_path.clone(), self.output.codec);
                }
            }
            Command::Quit => {
                tracing::info!("Quit requested");
                self.running = false;
            }
        }
        Some(command)
    }

    /// Loops until quit, the frame budget, the shutdown flag or the end of
    /// the source. Returns the number of cycles run.
    pub fn run(&mut self, keys: &mut impl KeySource, shutdown: &AtomicBool) -> u64 {
        self.running = true;
        let start = self.cycles;
        let mut empty_cycles = 0;

        while self.running {
            if shutdown.load(Ordering::SeqCst) {
                tracing::info!("Shutdown requested");
                break;
            }
            if !self.output.continuous && self.cycles - start >= self.output.frame_count {
                break;
            }

            let frames_before = self.manager.stats().frames;
            self.run_cycle();
            if self.manager.stats().frames == frames_before {
                empty_cycles += 1;
                if empty_cycles >= END_OF_STREAM_CYCLES {
                    tracing::info!(cycles = self.cycles, "Source exhausted");
                    break;
                }
            } else {
                empty_cycles = 0;
            }

            if let Some(key) = keys.poll(self.cycles - 1) {
                self.handle_key(key);
            }
        }

        self.running = false;
        if self.manager.is_writing_video() {
            self.manager.stop_writing_video();
        }

        let stats = self.manager.stats();
        tracing::info!(
            cycles = self.cycles - start,
            frames = stats.frames,
            dropped = stats.frames_dropped,
            fps = ?self.manager.fps_estimate(),
            "Capture loop finished"
        );
        self.cycles - start
    }
}

impl<S: FrameSource> std::fmt::Debug for App<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("manager", &self.manager)
            .field("filter", &self.filter.is_some())
            .field("recolor_rc", &self.recolor_rc)
            .field("running", &self.running)
            .field("cycles", &self.cycles)
            .finish()
    }
}
