use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::bird::Pose;
use crate::episode::{ControlMode, Episode};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct FrameWorldMeta {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct BirdView {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub tilt_deg: f64,
    pub pose: Pose,
}

#[derive(Clone, Debug, Serialize)]
pub struct PipeView {
    pub id: u32,
    pub x: f64,
    pub gap_top: f64,
    pub gap_bottom: f64,
    pub scored: bool,
}

/// One tick's render snapshot, emitted as a single NDJSON line.
///
/// The generation number is present for training episodes only; manual play
/// omits the key entirely.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub t: u64,
    pub mode: ControlMode,
    pub generation: Option<u32>,
    pub score: u32,
    pub world: FrameWorldMeta,
    pub floor_offset: f64,
    pub birds: Vec<BirdView>,
    pub pipes: Vec<PipeView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chronicle: Vec<String>,
    pub ended: bool,
}

/// Snapshot the episode as seen after its most recent tick.
pub fn make_frame(episode: &Episode, chronicle: Vec<String>) -> Frame {
    let config = episode.config();
    let birds = episode
        .birds()
        .iter()
        .map(|bird| BirdView {
            id: bird.id.0,
            x: bird.x,
            y: bird.y,
            tilt_deg: bird.tilt_deg,
            pose: bird.pose,
        })
        .collect();
    let pipes = episode
        .pipes()
        .iter()
        .map(|pipe| PipeView {
            id: pipe.id,
            x: pipe.x,
            gap_top: pipe.gap_top,
            gap_bottom: pipe.gap_bottom(&config.pipe),
            scored: pipe.scored,
        })
        .collect();

    Frame {
        t: episode.tick_count(),
        mode: episode.mode(),
        generation: episode.generation(),
        score: episode.score(),
        world: FrameWorldMeta {
            width: config.world.width,
            height: config.world.height,
        },
        floor_offset: episode.floor_offset(),
        birds,
        pipes,
        chronicle,
        ended: episode.is_ended(),
    }
}

impl Frame {
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}
