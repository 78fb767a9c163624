//! In-memory media caches for the practice session
//!
//! Audio is keyed by exact text so identical words across levels share one
//! decoded clip; images are keyed by level index and fetched exactly once,
//! negative results included. Entries are write-once within a session.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::providers::{ImageGenerator, LevelImage, SpeechSynthesizer};
use crate::voice::{AudioClip, decode_mp3};
use crate::Result;

/// Default bound on distinct cached audio texts
pub const DEFAULT_AUDIO_CACHE_SIZE: usize = 64;

/// State of one image slot
enum ImageSlot {
    /// A fetch is in flight; the receiver resolves when it lands
    Pending(watch::Receiver<bool>),
    /// Fetch finished; `None` means no image for this level
    Ready(Option<LevelImage>),
}

/// Who performs the fetch for an uncached index
enum ImageClaim {
    /// This caller fetches and publishes
    Owner(watch::Sender<bool>),
    /// Another caller is fetching; wait on its channel
    Waiter(watch::Receiver<bool>),
}

/// Shared media caches backed by the synthesis and illustration providers
pub struct MediaCache {
    synth: Arc<dyn SpeechSynthesizer>,
    illustrator: Arc<dyn ImageGenerator>,
    audio: Mutex<LruCache<String, Arc<AudioClip>>>,
    images: Mutex<HashMap<usize, ImageSlot>>,
}

impl MediaCache {
    /// Create a cache over the given providers
    #[must_use]
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        illustrator: Arc<dyn ImageGenerator>,
        audio_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(audio_capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_AUDIO_CACHE_SIZE).unwrap());
        Self {
            synth,
            illustrator,
            audio: Mutex::new(LruCache::new(capacity)),
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Decoded audio for `text`: cached clip, or synthesize-and-decode
    ///
    /// `Ok(None)` means the synthesizer has no voice for this text and the
    /// caller should fall back to local synthesis. Only real clips are
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or decoding fails; callers treat this
    /// like `None` and fall back.
    pub async fn audio_for(&self, text: &str) -> Result<Option<Arc<AudioClip>>> {
        if let Some(clip) = self.audio.lock().await.get(text) {
            tracing::trace!(text, "audio cache hit");
            return Ok(Some(Arc::clone(clip)));
        }

        let Some(payload) = self.synth.synthesize(text).await? else {
            return Ok(None);
        };

        let clip = Arc::new(decode_mp3(&payload)?);
        self.audio
            .lock()
            .await
            .put(text.to_string(), Arc::clone(&clip));

        tracing::debug!(text, ms = clip.duration_ms(), "audio cached");
        Ok(Some(clip))
    }

    /// Illustration for level `index`, fetching at most once per index
    ///
    /// Failures resolve to `None` (placeholder) and are cached like any
    /// other result, so a level's image is requested exactly once. A call
    /// racing an in-flight fetch for the same index waits for that fetch
    /// instead of issuing another.
    pub async fn image_for(&self, index: usize, text: &str) -> Option<LevelImage> {
        loop {
            let claim = {
                let mut images = self.images.lock().await;
                match images.get(&index) {
                    Some(ImageSlot::Ready(image)) => return image.clone(),
                    Some(ImageSlot::Pending(rx)) => ImageClaim::Waiter(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(false);
                        images.insert(index, ImageSlot::Pending(rx));
                        ImageClaim::Owner(tx)
                    }
                }
            };

            match claim {
                ImageClaim::Owner(tx) => {
                    let image = self.fetch_image(index, text).await;
                    self.images
                        .lock()
                        .await
                        .insert(index, ImageSlot::Ready(image.clone()));
                    let _ = tx.send(true);
                    return image;
                }
                ImageClaim::Waiter(mut rx) => {
                    // Another fetch owns this index; wait for it to finish
                    let _ = rx.changed().await;
                }
            }
        }
    }

    /// Call the illustrator; failures degrade to "no image"
    async fn fetch_image(&self, index: usize, text: &str) -> Option<LevelImage> {
        match self.illustrator.illustrate(text).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(index, error = %e, "illustration failed");
                None
            }
        }
    }

    /// Speculative background fetch for an upcoming level's image
    ///
    /// Fire-and-forget: failures are logged inside [`Self::image_for`] and
    /// never surface; nothing blocks the current level's render path.
    pub fn prefetch_image(self: &Arc<Self>, index: usize, text: String) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let _ = cache.image_for(index, &text).await;
            tracing::trace!(index, "image prefetch settled");
        })
    }

    /// Whether an image result (including `None`) is already cached
    pub async fn image_cached(&self, index: usize) -> bool {
        matches!(
            self.images.lock().await.get(&index),
            Some(ImageSlot::Ready(_))
        )
    }
}
