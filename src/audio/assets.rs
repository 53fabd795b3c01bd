use std::{
    collections::HashMap,
    fs,
    io::{Cursor, ErrorKind},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use rodio::Decoder;

use super::Cue;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Tried in order for every cue.
pub const ASSET_FORMATS: [&str; 2] = ["mp3", "wav"];

/// Source of recorded cue sounds.
pub trait AssetLoader: Send + Sync {
    /// `Ok(None)` means the asset does not exist.
    fn fetch_audio_asset(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl AssetLoader for FsAssetLoader {
    fn fetch_audio_asset(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read sound {}", path.display()))
            }
        }
    }
}

/// What to play for a cue.
#[derive(Clone)]
pub enum CueSound {
    Recorded(Arc<[u8]>),
    Tone,
}

impl std::fmt::Debug for CueSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CueSound::Recorded(bytes) => write!(f, "Recorded({} bytes)", bytes.len()),
            CueSound::Tone => write!(f, "Tone"),
        }
    }
}

/// Recorded cue sounds, resolved once and kept for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct CueLibrary {
    sounds: HashMap<Cue, Arc<[u8]>>,
}

impl CueLibrary {
    /// Cues that cannot be resolved are left out and will use the synthesized tone.
    pub fn load(loader: &dyn AssetLoader) -> Self {
        let mut sounds = HashMap::new();
        for cue in Cue::ALL {
            if let Some(bytes) = resolve(loader, cue) {
                sounds.insert(cue, bytes);
            }
        }
        log_info!(
            "Cue library ready: {} recorded, {} synthesized",
            sounds.len(),
            Cue::ALL.len() - sounds.len()
        );
        Self { sounds }
    }

    pub fn sound_for(&self, cue: Cue) -> CueSound {
        self.sounds
            .get(&cue)
            .map(|bytes| CueSound::Recorded(Arc::clone(bytes)))
            .unwrap_or(CueSound::Tone)
    }
}

fn resolve(loader: &dyn AssetLoader, cue: Cue) -> Option<Arc<[u8]>> {
    for format in ASSET_FORMATS {
        let name = format!("{}.{}", cue.asset_stem(), format);
        match loader.fetch_audio_asset(&name) {
            Ok(Some(bytes)) => {
                let bytes: Arc<[u8]> = bytes.into();
                if decodes(&bytes) {
                    log_debug!("Loaded cue sound {name}");
                    return Some(bytes);
                }
                log_warn!("Cue sound {name} could not be decoded; trying next format");
            }
            Ok(None) => log_debug!("Cue sound {name} not found"),
            Err(err) => log_warn!("Failed to load cue sound {name}: {err:#}"),
        }
    }
    log_warn!("No recorded sound for {} cue; using synthesized bell", cue.asset_stem());
    None
}

pub fn decodes(bytes: &Arc<[u8]>) -> bool {
    Decoder::new(Cursor::new(Arc::clone(bytes))).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mono 16-bit PCM WAV with `samples` zero samples.
    fn silent_wav(samples: u32) -> Vec<u8> {
        let sample_rate: u32 = 8000;
        let data_len = samples * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(44 + data_len as usize, 0);
        out
    }

    #[derive(Default)]
    struct MapLoader {
        files: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl AssetLoader for MapLoader {
        fn fetch_audio_asset(&self, name: &str) -> Result<Option<Vec<u8>>> {
            self.requests.lock().unwrap().push(name.to_string());
            Ok(self.files.get(name).cloned())
        }
    }

    #[test]
    fn falls_back_to_second_format() {
        let mut loader = MapLoader::default();
        loader.files.insert("end.wav".into(), silent_wav(100));

        let library = CueLibrary::load(&loader);

        assert!(matches!(library.sound_for(Cue::End), CueSound::Recorded(_)));
        assert!(matches!(library.sound_for(Cue::Start), CueSound::Tone));
        let requests = loader.requests.lock().unwrap();
        assert!(requests.contains(&"end.mp3".to_string()));
        assert!(requests.contains(&"end.wav".to_string()));
    }

    #[test]
    fn undecodable_asset_uses_tone() {
        let mut loader = MapLoader::default();
        loader
            .files
            .insert("start.mp3".into(), b"definitely not audio".to_vec());

        let library = CueLibrary::load(&loader);

        assert!(matches!(library.sound_for(Cue::Start), CueSound::Tone));
    }

    #[test]
    fn fs_loader_reports_missing_files_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("interval.wav"), silent_wav(10)).unwrap();
        let loader = FsAssetLoader::new(dir.path().to_path_buf());

        assert!(loader.fetch_audio_asset("start.mp3").unwrap().is_none());
        assert!(loader.fetch_audio_asset("interval.wav").unwrap().is_some());

        let library = CueLibrary::load(&loader);
        assert!(matches!(library.sound_for(Cue::Interval), CueSound::Recorded(_)));
    }
}
