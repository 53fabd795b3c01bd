pub mod assets;
pub mod bell;

use assets::{CueLibrary, CueSound};
use bell::BellTone;

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use serde::{Deserialize, Serialize};
use std::{
    io::Cursor,
    sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};
use tokio::time;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Delay between consecutive bells of one sequence.
pub const CUE_SPACING: Duration = Duration::from_millis(1500);
pub const START_BELLS: u32 = 3;
pub const INTERVAL_BELLS: u32 = 1;
pub const END_BELLS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    Start,
    Interval,
    End,
}

impl Cue {
    pub const ALL: [Cue; 3] = [Cue::Start, Cue::Interval, Cue::End];

    pub fn asset_stem(self) -> &'static str {
        match self {
            Cue::Start => "start",
            Cue::Interval => "interval",
            Cue::End => "end",
        }
    }
}

/// Something that can sound a single cue right now.
pub trait CueOutput: Send + Sync {
    fn play(&self, cue: Cue);
}

/// Schedules bell sequences without waiting for them.
#[derive(Clone)]
pub struct CuePlayer {
    output: Arc<dyn CueOutput>,
    spacing: Duration,
    enabled: bool,
}

impl CuePlayer {
    pub fn new(output: Arc<dyn CueOutput>) -> Self {
        Self {
            output,
            spacing: CUE_SPACING,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Spawns one task per bell; must be called from within a tokio runtime.
    /// Scheduled bells are not cancelled if the session stops.
    pub fn play_sequence(&self, count: u32, cue: Cue) {
        if !self.enabled {
            log_debug!("Bells disabled; skipping {count} {cue:?} cue(s)");
            return;
        }

        for index in 0..count {
            let output = Arc::clone(&self.output);
            let delay = self.spacing * index;
            tokio::spawn(async move {
                time::sleep(delay).await;
                output.play(cue);
            });
        }
    }
}

struct PlayRequest {
    sound: CueSound,
    volume: f32,
}

/// Plays cues on the default output device from a dedicated thread,
/// since rodio's output stream cannot move between threads.
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<PlayRequest>>>>,
    library: Arc<CueLibrary>,
    volume: f32,
}

impl AudioEngineHandle {
    pub fn new(library: CueLibrary, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            library: Arc::new(library),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<PlayRequest>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio sender lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<PlayRequest>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;

                while let Ok(request) = rx.recv() {
                    if output.is_none() {
                        match OutputStream::try_default() {
                            Ok(opened) => {
                                log_info!("Audio output device opened");
                                output = Some(opened);
                            }
                            Err(err) => {
                                log_error!("Failed to open audio output device: {err}");
                                continue;
                            }
                        }
                    }

                    if let Some((_, handle)) = output.as_ref() {
                        if let Err(err) = play_on(handle, request) {
                            log_warn!("Cue playback failed: {err:#}");
                        }
                    }
                }

                log_debug!("Audio engine thread exiting");
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

fn play_on(handle: &OutputStreamHandle, request: PlayRequest) -> Result<()> {
    let sink = Sink::try_new(handle)?;
    sink.set_volume(request.volume);

    match request.sound {
        CueSound::Recorded(bytes) => match Decoder::new(Cursor::new(bytes)) {
            Ok(decoder) => sink.append(decoder),
            Err(err) => {
                log_warn!("Recorded cue failed to decode ({err}); using synthesized bell");
                sink.append(BellTone::new());
            }
        },
        CueSound::Tone => sink.append(BellTone::new()),
    }

    // One sink per cue so overlapping bells mix instead of queueing.
    sink.detach();
    Ok(())
}

impl CueOutput for AudioEngineHandle {
    fn play(&self, cue: Cue) {
        let request = PlayRequest {
            sound: self.library.sound_for(cue),
            volume: self.volume,
        };
        let sent = self
            .ensure_thread()
            .and_then(|tx| tx.send(request).map_err(|err| anyhow!("{err}")));
        if let Err(err) = sent {
            log_error!("Could not schedule {cue:?} cue: {err:#}");
        }
    }
}
