//! Background image loading for the two texture slots.
//!
//! Every [`TextureLoader::request`] starts a new generation and spawns one
//! worker per slot. Workers fetch and decode on their own thread and report
//! back over a channel; the render loop drains that channel with
//! [`TextureLoader::poll`] once per frame and never blocks on it. Outcomes
//! from an older generation are dropped on the floor.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use thiserror::Error;

use crate::types::{ImageSource, SourcePair, TextureSlot};

/// Upper bound for a remote fetch, connect plus body.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read image file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("data URI payload is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image from {label}")]
    Decode {
        label: String,
        #[source]
        source: image::ImageError,
    },
    #[error("could not start loader worker for the {slot} slot")]
    Spawn {
        slot: TextureSlot,
        #[source]
        source: std::io::Error,
    },
    #[error("loader worker for the {slot} slot exited without reporting")]
    Disconnected { slot: TextureSlot },
}

/// Reads the raw encoded bytes behind a source.
pub fn fetch_bytes(source: &ImageSource, timeout: Duration) -> Result<Vec<u8>, LoadError> {
    match source {
        ImageSource::Path(path) => fs::read(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        }),
        ImageSource::Url(url) => {
            let http_error = |source| LoadError::Http {
                url: url.clone(),
                source,
            };
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(http_error)?;
            tracing::debug!(%url, "fetching remote image");
            let response = client
                .get(url.as_str())
                .send()
                .and_then(|response| response.error_for_status())
                .map_err(http_error)?;
            let bytes = response.bytes().map_err(http_error)?;
            Ok(bytes.to_vec())
        }
        ImageSource::Data { payload, .. } => {
            let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(base64::engine::general_purpose::STANDARD.decode(cleaned)?)
        }
    }
}

/// Decodes encoded bytes into straight RGBA8 pixels, top row first.
pub fn decode_image(bytes: &[u8], label: &str) -> Result<RgbaImage, LoadError> {
    let image = image::load_from_memory(bytes).map_err(|source| LoadError::Decode {
        label: label.to_string(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// Fetch + decode on the calling thread.
pub fn load_image(source: &ImageSource, timeout: Duration) -> Result<RgbaImage, LoadError> {
    let bytes = fetch_bytes(source, timeout)?;
    decode_image(&bytes, &source.to_string())
}

/// One slot's completion as reported by a worker.
#[derive(Debug)]
pub struct LoadOutcome {
    pub generation: u64,
    pub slot: TextureSlot,
    pub result: Result<RgbaImage, LoadError>,
}

/// Both slots of a generation, resolved either way.
#[derive(Debug)]
pub struct ResolvedPair {
    pub generation: u64,
    pub old: Result<RgbaImage, LoadError>,
    pub new: Result<RgbaImage, LoadError>,
}

impl ResolvedPair {
    pub fn get(&self, slot: TextureSlot) -> &Result<RgbaImage, LoadError> {
        match slot {
            TextureSlot::Old => &self.old,
            TextureSlot::New => &self.new,
        }
    }
}

pub struct TextureLoader {
    generation: u64,
    timeout: Duration,
    in_flight: bool,
    sender: Sender<LoadOutcome>,
    receiver: Receiver<LoadOutcome>,
    resolved: [Option<Result<RgbaImage, LoadError>>; 2],
}

impl TextureLoader {
    pub fn new(timeout: Duration) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            generation: 0,
            timeout,
            in_flight: false,
            sender,
            receiver,
            resolved: [None, None],
        }
    }

    /// Current generation; outcomes tagged with anything else are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the current generation still has unresolved slots.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Starts loading both sources concurrently and returns the generation.
    pub fn request(&mut self, sources: &SourcePair) -> u64 {
        self.cancel();
        self.in_flight = true;
        let generation = self.generation;
        for slot in TextureSlot::BOTH {
            let source = sources.get(slot).clone();
            let sender = self.sender.clone();
            let timeout = self.timeout;
            tracing::debug!(generation, %slot, %source, "spawning texture load");
            let spawned = thread::Builder::new()
                .name(format!("inkcrystal-load-{slot}"))
                .spawn(move || {
                    let result = load_image(&source, timeout);
                    // The receiver only disappears with the loader itself.
                    let _ = sender.send(LoadOutcome {
                        generation,
                        slot,
                        result,
                    });
                });
            if let Err(source) = spawned {
                self.resolved[slot.index()] = Some(Err(LoadError::Spawn { slot, source }));
            }
        }
        generation
    }

    /// Invalidates anything in flight. Late completions are discarded on the
    /// next poll. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if self.in_flight {
            tracing::debug!(generation = self.generation, "cancelling texture loads");
        }
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = false;
        self.resolved = [None, None];
    }

    /// Drains completions without blocking. Returns the pair once both slots
    /// of the current generation have resolved.
    pub fn poll(&mut self) -> Option<ResolvedPair> {
        while let Ok(outcome) = self.receiver.try_recv() {
            self.accept(outcome);
        }
        self.take_resolved()
    }

    /// Blocking variant of [`TextureLoader::poll`] for callers without a
    /// frame loop.
    pub fn wait(&mut self, timeout: Duration) -> Option<ResolvedPair> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pair) = self.poll() {
                return Some(pair);
            }
            if !self.in_flight {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(outcome) => self.accept(outcome),
                Err(_) => return None,
            }
        }
    }

    fn accept(&mut self, outcome: LoadOutcome) {
        if !self.in_flight || outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                slot = %outcome.slot,
                "discarding stale texture load"
            );
            return;
        }
        self.resolved[outcome.slot.index()] = Some(outcome.result);
    }

    fn take_resolved(&mut self) -> Option<ResolvedPair> {
        if !self.in_flight || self.resolved.iter().any(Option::is_none) {
            return None;
        }
        let [old, new] = std::mem::replace(&mut self.resolved, [None, None]);
        self.in_flight = false;
        Some(ResolvedPair {
            generation: self.generation,
            old: old.unwrap_or(Err(LoadError::Disconnected {
                slot: TextureSlot::Old,
            })),
            new: new.unwrap_or(Err(LoadError::Disconnected {
                slot: TextureSlot::New,
            })),
        })
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub(crate) fn data_source(width: u32, height: u32, color: [u8; 4]) -> ImageSource {
        ImageSource::Data {
            mime: "image/png".into(),
            payload: base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height, color)),
        }
    }

    #[test]
    fn loads_file_and_data_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.png");
        fs::write(&path, png_bytes(3, 2, [10, 20, 30, 255])).unwrap();

        let from_file = load_image(&ImageSource::Path(path), DEFAULT_FETCH_TIMEOUT).unwrap();
        assert_eq!(from_file.dimensions(), (3, 2));
        assert_eq!(from_file.get_pixel(0, 0).0, [10, 20, 30, 255]);

        let from_data = load_image(&data_source(4, 4, [1, 2, 3, 4]), DEFAULT_FETCH_TIMEOUT).unwrap();
        assert_eq!(from_data.dimensions(), (4, 4));
    }

    #[test]
    fn reports_missing_and_corrupt_inputs() {
        let missing = load_image(
            &ImageSource::Path(PathBuf::from("/definitely/not/here.png")),
            DEFAULT_FETCH_TIMEOUT,
        );
        assert!(matches!(missing, Err(LoadError::Io { .. })));

        let corrupt = ImageSource::Data {
            mime: "image/png".into(),
            payload: base64::engine::general_purpose::STANDARD.encode(b"not an image"),
        };
        assert!(matches!(
            load_image(&corrupt, DEFAULT_FETCH_TIMEOUT),
            Err(LoadError::Decode { .. })
        ));

        let bad_base64 = ImageSource::Data {
            mime: "image/png".into(),
            payload: "%%%".into(),
        };
        assert!(matches!(
            load_image(&bad_base64, DEFAULT_FETCH_TIMEOUT),
            Err(LoadError::Base64(_))
        ));
    }

    #[test]
    fn resolves_pair_only_after_both_slots() {
        let mut loader = TextureLoader::default();
        let pair = SourcePair::new(data_source(2, 2, [255, 0, 0, 255]), data_source(5, 1, [0, 0, 255, 255]));
        let generation = loader.request(&pair);
        let resolved = loader.wait(Duration::from_secs(5)).expect("pair resolves");
        assert_eq!(resolved.generation, generation);
        assert_eq!(resolved.old.as_ref().unwrap().dimensions(), (2, 2));
        assert_eq!(resolved.new.as_ref().unwrap().dimensions(), (5, 1));
        assert!(!loader.in_flight());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn failed_slot_still_resolves_the_pair() {
        let mut loader = TextureLoader::default();
        let pair = SourcePair::new(
            data_source(2, 2, [255, 0, 0, 255]),
            ImageSource::Path(PathBuf::from("/missing/new.png")),
        );
        loader.request(&pair);
        let resolved = loader.wait(Duration::from_secs(5)).expect("pair resolves");
        assert!(resolved.old.is_ok());
        assert!(resolved.new.is_err());
    }

    #[test]
    fn stale_generations_are_discarded() {
        let mut loader = TextureLoader::default();
        let first = SourcePair::new(data_source(1, 1, [1, 1, 1, 255]), data_source(1, 1, [2, 2, 2, 255]));
        let second = SourcePair::new(data_source(7, 7, [3, 3, 3, 255]), data_source(7, 7, [4, 4, 4, 255]));
        let stale = loader.request(&first);
        let current = loader.request(&second);
        assert_ne!(stale, current);

        let resolved = loader.wait(Duration::from_secs(5)).expect("second pair resolves");
        assert_eq!(resolved.generation, current);
        assert_eq!(resolved.old.unwrap().dimensions(), (7, 7));
    }

    #[test]
    fn cancel_drops_late_completions() {
        let mut loader = TextureLoader::default();
        loader.request(&SourcePair::new(
            data_source(1, 1, [0, 0, 0, 255]),
            data_source(1, 1, [0, 0, 0, 255]),
        ));
        loader.cancel();
        loader.cancel();
        assert!(loader.wait(Duration::from_millis(200)).is_none());
        thread::sleep(Duration::from_millis(100));
        assert!(loader.poll().is_none());
    }
}
