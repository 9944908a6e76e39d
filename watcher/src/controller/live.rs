use image::DynamicImage;
use motion_watch_capture::CaptureSource;
use tracing::{debug, info, warn};

use crate::display::{DisplaySink, EFFECTS_SURFACE};
use crate::keys::KeySource;
use crate::render::effects::{dispatch, Effect, EffectRenderer, KeyAction};

/// Live view with a key-selected effect. No reference frame is kept.
pub struct EffectsLoop<C, D, K> {
    capture: C,
    display: D,
    keys: K,
    renderer: EffectRenderer,
    effect: Effect,
    frames: u64,
}

impl<C, D, K> EffectsLoop<C, D, K>
where
    C: CaptureSource,
    D: DisplaySink,
    K: KeySource,
{
    pub fn new(capture: C, display: D, keys: K) -> Self {
        Self {
            capture,
            display,
            keys,
            renderer: EffectRenderer::new(),
            effect: Effect::None,
            frames: 0,
        }
    }

    /// Run until the source is exhausted or a quit key arrives. Returns the
    /// number of frames shown.
    pub async fn run(&mut self) -> u64 {
        info!("effects loop started, keys: g=gray b=blur e=edges n=none q=quit");
        loop {
            let frame = match self.capture.next_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    info!(reason = %e, "capture exhausted");
                    break;
                }
            };
            self.frames += 1;

            let out = self.renderer.apply(self.effect, &frame.image);
            if let Err(e) = self
                .display
                .show(EFFECTS_SURFACE, &DynamicImage::ImageRgb8(out))
                .await
            {
                warn!(error = %e, "failed to update surface");
            }

            tokio::task::yield_now().await;
            let Some(key) = self.keys.poll_key() else {
                continue;
            };
            match dispatch(key) {
                KeyAction::Select(effect) => {
                    debug!(?effect, "effect selected");
                    self.effect = effect;
                }
                KeyAction::Quit => {
                    info!("quit key received");
                    break;
                }
                KeyAction::Ignore => {}
            }
        }

        self.capture.release().await;
        self.display.release().await;
        info!(frames = self.frames, "effects loop stopped");
        self.frames
    }
}
